use std::sync::{Arc, RwLock};

use cog_channel::{ChannelConfig, ChannelStats, CogChannel, Endpoint};
use cog_sexpr::decode_frame;
use cog_types::atom::{ATOM, LINK, NODE};
use cog_types::{Atom, AtomSpace, Handle, Value};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::frames::FrameCache;
use crate::replies::{decode_alist, decode_atom_list, decode_value_reply, is_known};
use crate::requests;

pub const MONITOR_HEADER: &str = "CogStorageNode I/O Queue Stats:\n";

/// Storage backend that mirrors atomspaces to a remote CogServer.
///
/// Writes are fire-and-continue: they are queued on the channel and
/// become visible remotely by the next [`barrier`](Self::barrier). Fetches
/// queue their follow-up key/value requests the same way, so callers
/// barrier before reading what a fetch brought in.
pub struct CogStorage {
    endpoint: Endpoint,
    config: ChannelConfig,
    channel: RwLock<Option<Arc<CogChannel>>>,
    frames: FrameCache,
}

impl CogStorage {
    /// Validate `uri` without touching the network.
    pub fn new(uri: &str) -> StorageResult<Self> {
        Self::with_config(uri, ChannelConfig::default())
    }

    pub fn with_config(uri: &str, config: ChannelConfig) -> StorageResult<Self> {
        config.validate()?;
        Ok(Self {
            endpoint: Endpoint::parse(uri)?,
            config,
            channel: RwLock::new(None),
            frames: FrameCache::new(),
        })
    }

    pub fn uri(&self) -> &str {
        self.endpoint.uri()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn frames(&self) -> &FrameCache {
        &self.frames
    }

    pub fn open(&self) -> StorageResult<()> {
        let mut slot = self.channel.write().expect("storage channel lock poisoned");
        if slot.is_some() {
            return Err(StorageError::AlreadyOpen(self.uri().to_string()));
        }
        let channel = CogChannel::open_endpoint(self.endpoint.clone(), self.config.clone())?;
        *slot = Some(Arc::new(channel));
        info!(uri = %self.endpoint, "storage opened");
        Ok(())
    }

    pub fn connected(&self) -> bool {
        self.channel
            .read()
            .expect("storage channel lock poisoned")
            .as_ref()
            .is_some_and(|c| c.connected())
    }

    /// Close any proxy, drain, and shut the channel down.
    pub fn close(&self) -> StorageResult<()> {
        let channel = self
            .channel
            .write()
            .expect("storage channel lock poisoned")
            .take()
            .ok_or_else(|| StorageError::NotOpen(self.uri().to_string()))?;
        let proxy = channel
            .enqueue(requests::proxy_close(), |_| Ok(()))
            .and_then(|()| channel.barrier());
        let closed = channel.close();
        info!(uri = %self.endpoint, "storage closed");
        proxy?;
        closed?;
        Ok(())
    }

    fn channel(&self) -> StorageResult<Arc<CogChannel>> {
        self.channel
            .read()
            .expect("storage channel lock poisoned")
            .clone()
            .ok_or_else(|| StorageError::NotOpen(self.uri().to_string()))
    }

    pub fn proxy_open(&self) -> StorageResult<()> {
        let channel = self.channel()?;
        channel.enqueue(requests::proxy_open(), |_| Ok(()))?;
        channel.barrier()?;
        Ok(())
    }

    pub fn proxy_close(&self) -> StorageResult<()> {
        let channel = self.channel()?;
        channel.enqueue(requests::proxy_close(), |_| Ok(()))?;
        channel.barrier()?;
        Ok(())
    }

    /// Install `proxy` on the server. The proxy atom and its values are
    /// stored first, since some proxies read their configuration from them.
    pub fn set_proxy(&self, proxy: &Handle) -> StorageResult<()> {
        let channel = self.channel()?;
        self.store_atom(proxy)?;
        channel.barrier()?;
        channel.enqueue(requests::set_proxy(proxy.atom()), |_| Ok(()))?;
        channel.barrier()?;
        Ok(())
    }

    pub fn store_atom(&self, handle: &Handle) -> StorageResult<()> {
        self.channel()?
            .enqueue(requests::store_atom(handle), |_| Ok(()))?;
        Ok(())
    }

    pub fn remove_atom(&self, atom: &Atom, recursive: bool) -> StorageResult<()> {
        self.channel()?
            .enqueue(requests::remove_atom(atom, recursive), |_| Ok(()))?;
        Ok(())
    }

    /// Store the handle's current value at `key`; a missing value clears
    /// the remote one.
    pub fn store_value(&self, handle: &Handle, key: &Atom) -> StorageResult<()> {
        let value = handle.value(key);
        self.channel()?.enqueue(
            requests::store_value(handle.atom(), key, value.as_ref()),
            |_| Ok(()),
        )?;
        Ok(())
    }

    /// Apply `delta` to the remote value. Every call reaches the server, in
    /// call order.
    pub fn update_value(&self, handle: &Handle, key: &Atom, delta: &Value) -> StorageResult<()> {
        self.channel()?
            .enqueue(requests::update_value(handle.atom(), key, delta), |_| Ok(()))?;
        Ok(())
    }

    /// Fetch the remote value at `key`, set it on `handle` and return it.
    pub fn load_value(&self, handle: &Handle, key: &Atom) -> StorageResult<Option<Value>> {
        let reply = self
            .channel()?
            .synchro(requests::load_value(handle.atom(), key), |r| Ok(r.to_string()))?;
        let value = decode_value_reply(&reply)?;
        handle.set_value(key.clone(), value.clone());
        Ok(value)
    }

    /// Ask whether the server knows `atom`; if so, add it to `space` and
    /// queue a request for its key/value pairs.
    pub fn fetch_atom(&self, space: &Arc<AtomSpace>, atom: &Atom) -> StorageResult<Option<Handle>> {
        let channel = self.channel()?;
        let reply = channel.synchro(requests::probe_atom(atom), |r| Ok(r.to_string()))?;
        if !is_known(&reply) {
            debug!(atom = %atom, "atom unknown to server");
            return Ok(None);
        }
        let handle = local_handle(space, atom)?;
        fetch_values(&channel, space, atom, handle.clone())?;
        Ok(Some(handle))
    }

    pub fn fetch_incoming_set(&self, space: &Arc<AtomSpace>, atom: &Atom) -> StorageResult<()> {
        let channel = self.channel()?;
        fetch_atom_list(&channel, space, requests::incoming_set(atom))
    }

    pub fn fetch_incoming_by_type(&self, space: &Arc<AtomSpace>, atom: &Atom, ty: &str) -> StorageResult<()> {
        let channel = self.channel()?;
        fetch_atom_list(&channel, space, requests::incoming_by_type(atom, ty))
    }

    /// Queue a fetch of every remote atom of type `ty`.
    pub fn load_type(&self, space: &Arc<AtomSpace>, ty: &str) -> StorageResult<()> {
        let channel = self.channel()?;
        fetch_atom_list(&channel, space, requests::get_atoms(ty, false))
    }

    /// Load the whole remote atomspace: nodes first, then links, then wait
    /// for every value to arrive.
    pub fn load_atomspace(&self, space: &Arc<AtomSpace>) -> StorageResult<()> {
        let channel = self.channel()?;
        fetch_atom_list(&channel, space, requests::get_atoms(NODE, true))?;
        channel.flush()?;
        fetch_atom_list(&channel, space, requests::get_atoms(LINK, true))?;
        channel.barrier()?;
        Ok(())
    }

    pub fn store_atomspace(&self, space: &AtomSpace) -> StorageResult<()> {
        let channel = self.channel()?;
        for handle in space.atoms_of_type(ATOM) {
            channel.enqueue(requests::store_atom(&handle), |_| Ok(()))?;
        }
        channel.barrier()?;
        Ok(())
    }

    /// Queue a cached query run; the result lands on `query` under `key`.
    pub fn run_query(&self, query: &Handle, key: &Atom, meta: Option<&Atom>, fresh: bool) -> StorageResult<()> {
        let target = query.clone();
        let key_atom = key.clone();
        self.channel()?.enqueue(
            requests::execute_cache(query.atom(), key, meta, fresh),
            move |reply| {
                let value = decode_value_reply(reply).map_err(StorageError::into_handler)?;
                target.set_value(key_atom, value);
                Ok(())
            },
        )?;
        Ok(())
    }

    /// Drain pending writes, then clear the remote atomspace.
    pub fn erase(&self) -> StorageResult<()> {
        let channel = self.channel()?;
        channel.barrier()?;
        channel.synchro(requests::clear_space(), |_| Ok(()))?;
        warn!(uri = %self.endpoint, "remote atomspace erased");
        Ok(())
    }

    /// Erase the remote contents and close.
    pub fn destroy(&self) -> StorageResult<()> {
        self.erase()?;
        self.close()
    }

    pub fn barrier(&self) -> StorageResult<()> {
        self.channel()?.barrier()?;
        Ok(())
    }

    /// Announce `space` and its ancestry to the server.
    pub fn store_frames(&self, space: &Arc<AtomSpace>) -> StorageResult<()> {
        let channel = self.channel()?;
        let name = self.frames.remember(space)?;
        channel.synchro(requests::define_top_space(space), |_| Ok(()))?;
        debug!(frame = %name, "frames stored");
        Ok(())
    }

    /// Fetch the server's frame stack and map it onto local frames.
    pub fn load_frames(&self) -> StorageResult<Arc<AtomSpace>> {
        let reply = self
            .channel()?
            .synchro(requests::current_space(), |r| Ok(r.to_string()))?;
        let mut pos = 0;
        let expr = decode_frame(&reply, &mut pos)?;
        Ok(self.frames.resolve(&expr))
    }

    pub fn stats(&self) -> StorageResult<ChannelStats> {
        Ok(self.channel()?.stats())
    }

    pub fn monitor(&self) -> StorageResult<String> {
        Ok(format!("{MONITOR_HEADER}{}", self.channel()?.print_stats()))
    }

    pub fn clear_stats(&self) -> StorageResult<()> {
        self.channel()?.clear_stats();
        Ok(())
    }
}

impl Drop for CogStorage {
    fn drop(&mut self) {
        if self.connected() {
            if let Err(e) = self.close() {
                warn!(uri = %self.endpoint, error = %e, "error while closing storage");
            }
        }
    }
}

/// The handle for `atom` in `space`. A read-only space is not modified;
/// atoms it lacks get a detached handle.
fn local_handle(space: &AtomSpace, atom: &Atom) -> StorageResult<Handle> {
    if space.is_read_only() {
        return Ok(space.get(atom).unwrap_or_else(|| Handle::new(atom.clone())));
    }
    Ok(space.add(atom.clone())?)
}

fn fetch_values(channel: &CogChannel, space: &Arc<AtomSpace>, atom: &Atom, handle: Handle) -> StorageResult<()> {
    let target = Arc::clone(space);
    channel.enqueue(requests::keys_alist(atom), move |reply| {
        decode_alist(Some(&target), &handle, reply)
            .map(|_| ())
            .map_err(StorageError::into_handler)
    })?;
    Ok(())
}

/// Queue `request`, whose reply lists atoms; each listed atom is added to
/// `space` and gets its own key/value fetch.
fn fetch_atom_list(channel: &Arc<CogChannel>, space: &Arc<AtomSpace>, request: String) -> StorageResult<()> {
    let worker_channel = Arc::clone(channel);
    let target = Arc::clone(space);
    channel.enqueue(request, move |reply| {
        absorb_atom_list(&worker_channel, &target, reply).map_err(StorageError::into_handler)
    })?;
    Ok(())
}

fn absorb_atom_list(channel: &CogChannel, space: &Arc<AtomSpace>, reply: &str) -> StorageResult<()> {
    let atoms = decode_atom_list(reply)?;
    debug!(count = atoms.len(), "atom list received");
    for atom in atoms {
        let handle = local_handle(space, &atom)?;
        fetch_values(channel, space, &atom, handle)?;
    }
    Ok(())
}
