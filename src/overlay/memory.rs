//! In-process overlay.
//!
//! A [`MemoryHub`] connects any number of [`MemoryOverlay`] endpoints living
//! in the same process. Senders push into the receiver's arrival queue;
//! the receiver moves arrivals through its session bookkeeping when it runs
//! its callbacks, the same way a network overlay surfaces events once per
//! tick.

use crate::overlay::inbox::Inbox;
use crate::overlay::{Overlay, SendMode};
use crate::protocol::peer_id::PeerId;
use crate::protocol::MAX_PACKET_SIZE;
use bytes::Bytes;
use crossbeam_queue::SegQueue;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::io;
use std::sync::Arc;

type Arrivals = Arc<SegQueue<(PeerId, Bytes)>>;

#[derive(Clone, Default)]
pub struct MemoryHub {
    endpoints: Arc<DashMap<PeerId, Arrivals>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }
    /// Register an endpoint named `id`. Fails if the id is the nil id or
    /// already taken on this hub.
    pub fn endpoint(&self, id: PeerId) -> io::Result<MemoryOverlay> {
        if id.is_unspecified() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "the nil id cannot name an endpoint",
            ));
        }
        let arrivals = Arrivals::default();
        match self.endpoints.entry(id) {
            Entry::Occupied(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("endpoint {id} already exists"),
                ));
            }
            Entry::Vacant(entry) => {
                entry.insert(arrivals.clone());
            }
        }
        Ok(MemoryOverlay {
            id,
            hub: self.clone(),
            arrivals,
            inbox: Inbox::default(),
        })
    }
    pub fn contains(&self, id: &PeerId) -> bool {
        self.endpoints.contains_key(id)
    }
}

pub struct MemoryOverlay {
    id: PeerId,
    hub: MemoryHub,
    arrivals: Arrivals,
    inbox: Inbox,
}

impl MemoryOverlay {
    pub fn local_id(&self) -> PeerId {
        self.id
    }
    pub fn is_accepted(&self, peer: &PeerId) -> bool {
        self.inbox.is_accepted(peer)
    }
}

impl Overlay for MemoryOverlay {
    fn send_packet(&mut self, peer: PeerId, buf: &[u8], mode: SendMode) -> io::Result<()> {
        if buf.len() > MAX_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("packet of {} bytes exceeds {MAX_PACKET_SIZE}", buf.len()),
            ));
        }
        let arrivals = self
            .hub
            .endpoints
            .get(&peer)
            .map(|v| v.value().clone())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, format!("no endpoint {peer}"))
            })?;
        self.inbox.accept(peer);
        log::trace!("{} -> {peer} {} bytes {mode:?}", self.id, buf.len());
        arrivals.push((self.id, Bytes::copy_from_slice(buf)));
        Ok(())
    }

    fn packet_available(&mut self) -> Option<usize> {
        self.inbox.peek_len()
    }

    fn read_packet(&mut self, max_size: usize) -> Option<(Bytes, PeerId)> {
        self.inbox.pop(max_size)
    }

    fn accept_session(&mut self, peer: PeerId) -> bool {
        self.inbox.accept(peer)
    }

    fn close_session(&mut self, peer: PeerId) -> bool {
        self.inbox.close(peer)
    }

    fn next_session_request(&mut self) -> Option<PeerId> {
        self.inbox.next_request()
    }

    fn run_callbacks(&mut self) -> io::Result<()> {
        while let Some((from, packet)) = self.arrivals.pop() {
            self.inbox.deliver(from, packet);
        }
        Ok(())
    }
}

impl Drop for MemoryOverlay {
    fn drop(&mut self) {
        self.hub.endpoints.remove(&self.id);
    }
}
