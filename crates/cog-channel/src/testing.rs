//! In-process CogServer stand-in for channel tests.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub(crate) const BANNER: &str = "sexpr mode enabled";

pub(crate) enum MockReply {
    Line(String),
    Silent,
    Close,
}

type Responder = dyn Fn(&str) -> MockReply + Send + Sync;

struct Inner {
    received: Mutex<Vec<String>>,
    gate: Mutex<bool>,
    gate_cv: Condvar,
    stop: AtomicBool,
    responder: Box<Responder>,
}

pub(crate) struct MockServer {
    addr: SocketAddr,
    inner: Arc<Inner>,
}

impl MockServer {
    /// Every request is answered with `()`.
    pub(crate) fn start() -> Self {
        Self::with_responder(|_| MockReply::Line("()\n".into()))
    }

    pub(crate) fn with_responder(
        responder: impl Fn(&str) -> MockReply + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let inner = Arc::new(Inner {
            received: Mutex::new(Vec::new()),
            gate: Mutex::new(false),
            gate_cv: Condvar::new(),
            stop: AtomicBool::new(false),
            responder: Box::new(responder),
        });
        let accept = Arc::clone(&inner);
        thread::spawn(move || {
            for stream in listener.incoming() {
                if accept.stop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let inner = Arc::clone(&accept);
                thread::spawn(move || serve(stream, inner));
            }
        });
        Self { addr, inner }
    }

    pub(crate) fn uri(&self) -> String {
        format!("cog://127.0.0.1:{}", self.addr.port())
    }

    /// Requests received so far, handshakes excluded, in arrival order.
    pub(crate) fn received(&self) -> Vec<String> {
        self.inner.received.lock().unwrap().clone()
    }

    /// Hold replies until [`release`](Self::release).
    pub(crate) fn hold(&self) {
        *self.inner.gate.lock().unwrap() = true;
    }

    pub(crate) fn release(&self) {
        *self.inner.gate.lock().unwrap() = false;
        self.inner.gate_cv.notify_all();
    }

    /// Poll until `n` requests have arrived.
    pub(crate) fn wait_for(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.received().len() < n {
            assert!(Instant::now() < deadline, "timed out waiting for {n} requests");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        self.release();
        let _ = TcpStream::connect(self.addr);
    }
}

fn is_handshake(line: &str) -> bool {
    matches!(line, "sexpr\n" | "scm hush\n" | "(cog-set-server-mode! #t)\n")
}

fn serve(stream: TcpStream, inner: Arc<Inner>) {
    let Ok(mut writer) = stream.try_clone() else { return };
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        if is_handshake(&line) {
            if writer.write_all(BANNER.as_bytes()).is_err() {
                return;
            }
            continue;
        }
        inner.received.lock().unwrap().push(line.clone());
        {
            let mut held = inner.gate.lock().unwrap();
            while *held {
                held = inner.gate_cv.wait(held).unwrap();
            }
        }
        match (inner.responder)(&line) {
            MockReply::Line(reply) => {
                if writer.write_all(reply.as_bytes()).is_err() {
                    return;
                }
            }
            MockReply::Silent => {}
            MockReply::Close => return,
        }
    }
}
