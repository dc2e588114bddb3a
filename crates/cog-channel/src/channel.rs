use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::buffer::{Dispatch, MessageBuffer};
use crate::config::ChannelConfig;
use crate::connection::Connection;
use crate::endpoint::Endpoint;
use crate::error::{ChannelError, ChannelResult};
use crate::message::Message;
use crate::stats::ChannelStats;

thread_local! {
    /// The channel this thread is a worker of, if any.
    static WORKER_OF: RefCell<Weak<Shared>> = RefCell::new(Weak::new());
    /// Origin of the dispatch whose handler is running on this worker.
    static ORIGIN: Cell<Option<u64>> = const { Cell::new(None) };
}

fn is_worker_of(shared: &Arc<Shared>) -> bool {
    WORKER_OF.with(|w| std::ptr::eq(w.borrow().as_ptr(), Arc::as_ptr(shared)))
}

/// Origin to tag new work with. Only work queued on the worker's own
/// channel inherits it; tickets of another channel mean nothing here.
fn current_origin(shared: &Arc<Shared>) -> Option<u64> {
    if is_worker_of(shared) {
        ORIGIN.with(Cell::get)
    } else {
        None
    }
}

struct Shared {
    buffer: MessageBuffer,
    open_socks: Arc<AtomicUsize>,
    endpoint: Endpoint,
    addrs: Vec<SocketAddr>,
    config: ChannelConfig,
}

/// A pool of worker threads, each owning one connection to the server,
/// draining a shared [`MessageBuffer`].
///
/// Reply handlers run on the worker that received the reply. They may
/// enqueue further work (which never stalls on a worker) but must not
/// call [`synchro`](Self::synchro), [`barrier`](Self::barrier) or
/// [`flush`](Self::flush).
pub struct CogChannel {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CogChannel {
    /// Parse `uri`, resolve it, probe the server once and start the pool.
    pub fn open(uri: &str, config: ChannelConfig) -> ChannelResult<Self> {
        Self::open_endpoint(Endpoint::parse(uri)?, config)
    }

    pub fn open_endpoint(endpoint: Endpoint, config: ChannelConfig) -> ChannelResult<Self> {
        config.validate()?;
        let addrs = endpoint.resolve()?;
        let open_socks = Arc::new(AtomicUsize::new(0));

        // Liveness probe; the connection is dropped straight away.
        drop(Connection::open(&endpoint, &addrs, &config, Arc::clone(&open_socks))?);

        let shared = Arc::new(Shared {
            buffer: MessageBuffer::new(config.low_watermark, config.high_watermark),
            open_socks,
            endpoint,
            addrs,
            config,
        });

        let mut workers = Vec::with_capacity(shared.config.workers);
        for id in 0..shared.config.workers {
            let worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("cog-worker-{id}"))
                .spawn(move || run_worker(worker, id));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shared.buffer.shutdown();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }
        info!(uri = %shared.endpoint, workers = workers.len(), "cogserver channel open");

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    pub fn uri(&self) -> &str {
        self.shared.endpoint.uri()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// Whether the calling thread is one of this channel's workers.
    fn on_worker(&self) -> bool {
        is_worker_of(&self.shared)
    }

    pub fn connected(&self) -> bool {
        !self.shared.buffer.is_shutdown()
    }

    /// Queue a request; `handler` gets the reply text on a worker thread.
    ///
    /// Stalls while the queue is above the high watermark, except when
    /// called from a worker.
    pub fn enqueue<F>(&self, request: impl Into<String>, handler: F) -> ChannelResult<()>
    where
        F: FnOnce(&str) -> ChannelResult<()> + Send + 'static,
    {
        let msg = Message::new(
            request,
            Box::new(move |outcome| match outcome? {
                Some(reply) => handler(&reply),
                None => handler(""),
            }),
        );
        self.shared
            .buffer
            .insert(msg, current_origin(&self.shared), !self.on_worker())?;
        Ok(())
    }

    /// Queue a request whose reply is never read.
    pub fn enqueue_noreply(&self, request: impl Into<String>) -> ChannelResult<()> {
        self.shared
            .buffer
            .insert(Message::noreply(request), current_origin(&self.shared), !self.on_worker())?;
        Ok(())
    }

    /// Send a request and block until its reply has been handled.
    ///
    /// The request is never collapsed with a pending duplicate. Errors from
    /// the transport or from `handler` are returned here rather than
    /// reported at the next barrier.
    pub fn synchro<T, F>(&self, request: impl Into<String>, handler: F) -> ChannelResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&str) -> ChannelResult<T> + Send + 'static,
    {
        if self.on_worker() {
            return Err(ChannelError::Reentrant("synchro"));
        }
        let request = request.into();
        let label = request.trim_end().to_string();
        let (tx, rx) = mpsc::sync_channel(1);
        let msg = Message::unique(
            request,
            Box::new(move |outcome| {
                let result = outcome.and_then(|reply| {
                    panic::catch_unwind(AssertUnwindSafe(|| handler(reply.as_deref().unwrap_or(""))))
                        .unwrap_or_else(|_| {
                            Err(ChannelError::Handler(format!("reply handler panicked on {label}")))
                        })
                });
                let _ = tx.send(result);
                Ok(())
            }),
        );
        self.shared.buffer.insert(msg, None, true)?;
        rx.recv()
            .map_err(|_| ChannelError::Handler("synchro reply was never delivered".into()))?
    }

    /// Block until everything queued before this call has been sent and
    /// its reply handled, including requests those handlers queued in turn.
    pub fn barrier(&self) -> ChannelResult<()> {
        if self.on_worker() {
            return Err(ChannelError::Reentrant("barrier"));
        }
        self.shared.buffer.barrier()
    }

    /// Block until everything queued before this call has been handed to
    /// a worker.
    pub fn flush(&self) -> ChannelResult<()> {
        if self.on_worker() {
            return Err(ChannelError::Reentrant("flush"));
        }
        self.shared.buffer.flush();
        Ok(())
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats::new(
            self.uri(),
            self.shared.open_socks.load(Ordering::SeqCst),
            self.shared.config.workers,
            self.shared.buffer.stats(),
        )
    }

    pub fn print_stats(&self) -> String {
        self.stats().to_string()
    }

    pub fn clear_stats(&self) {
        self.shared.buffer.clear_stats();
    }

    /// Drain, stop the workers and close their connections.
    ///
    /// Returns the drain's result; closing an already closed channel is a
    /// no-op.
    pub fn close(&self) -> ChannelResult<()> {
        if self.on_worker() {
            return Err(ChannelError::Reentrant("close"));
        }
        let handles = std::mem::take(&mut *self.workers.lock().expect("worker list lock poisoned"));
        if handles.is_empty() {
            return Ok(());
        }
        let drained = self.shared.buffer.barrier();
        self.shared.buffer.shutdown();
        for handle in handles {
            if handle.join().is_err() {
                error!(uri = %self.shared.endpoint, "channel worker panicked");
            }
        }
        info!(uri = %self.shared.endpoint, "cogserver channel closed");
        drained
    }
}

impl Drop for CogChannel {
    fn drop(&mut self) {
        if self.on_worker() {
            // Cannot join ourselves; workers exit once the queue empties.
            self.shared.buffer.shutdown();
            return;
        }
        if let Err(e) = self.close() {
            warn!(uri = %self.shared.endpoint, error = %e, "error while closing channel");
        }
    }
}

fn run_worker(shared: Arc<Shared>, id: usize) {
    WORKER_OF.with(|w| *w.borrow_mut() = Arc::downgrade(&shared));
    let mut conn: Option<Connection> = None;
    while let Some(Dispatch {
        ticket,
        origin,
        message: mut msg,
    }) = shared.buffer.take()
    {
        ORIGIN.with(|o| o.set(Some(origin)));
        let outcome = dispatch(&shared, &mut conn, &msg);
        if let Err(e) = &outcome {
            debug!(worker = id, error = %e, "dropping connection after failure");
            conn = None;
        }
        let serial = msg.is_serial();
        let finished = panic::catch_unwind(AssertUnwindSafe(|| msg.finish(outcome)));
        let failure = match finished {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                error!(worker = id, request = %msg.request().trim_end(), error = %e, "request failed");
                Some(e.to_string())
            }
            Err(_) => {
                error!(worker = id, request = %msg.request().trim_end(), "reply handler panicked");
                Some(format!("reply handler panicked on {}", msg.request().trim_end()))
            }
        };
        ORIGIN.with(|o| o.set(None));
        shared.buffer.complete(ticket, serial, failure);
    }
    debug!(worker = id, "channel worker exiting");
}

/// Send one request on this worker's connection, opening it on first use
/// or after a failure.
fn dispatch(shared: &Shared, conn: &mut Option<Connection>, msg: &Message) -> ChannelResult<Option<String>> {
    if !conn.as_ref().is_some_and(Connection::is_open) {
        *conn = Some(Connection::open(
            &shared.endpoint,
            &shared.addrs,
            &shared.config,
            Arc::clone(&shared.open_socks),
        )?);
    }
    let Some(c) = conn.as_mut() else {
        return Err(ChannelError::NotConnected);
    };
    c.send(msg.request())?;
    if !msg.expects_reply() {
        return Ok(None);
    }
    c.recv(false).map(Some)
}
