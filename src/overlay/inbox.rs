use crate::protocol::peer_id::PeerId;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};

/// Packets held per peer whose session is not accepted yet. Later ones are
/// dropped.
pub(crate) const MAX_HELD_PACKETS: usize = 256;

/// Session bookkeeping on the receiving side of an overlay endpoint.
///
/// Packets from accepted peers are ready to read. Packets from any other
/// peer are held, and the first one raises a session request; accepting the
/// session releases the held packets in arrival order.
#[derive(Default)]
pub(crate) struct Inbox {
    accepted: HashSet<PeerId>,
    held: HashMap<PeerId, Vec<Bytes>>,
    ready: VecDeque<(Bytes, PeerId)>,
    requests: VecDeque<PeerId>,
}

impl Inbox {
    pub(crate) fn deliver(&mut self, from: PeerId, packet: Bytes) {
        if self.accepted.contains(&from) {
            self.ready.push_back((packet, from));
            return;
        }
        let held = self.held.entry(from).or_insert_with(|| {
            log::debug!("session request from {from}");
            self.requests.push_back(from);
            Vec::new()
        });
        if held.len() >= MAX_HELD_PACKETS {
            log::debug!("drop {} bytes from {from}, session not accepted", packet.len());
            return;
        }
        held.push(packet);
    }
    pub(crate) fn accept(&mut self, peer: PeerId) -> bool {
        if self.accepted.insert(peer) {
            if let Some(held) = self.held.remove(&peer) {
                self.ready.extend(held.into_iter().map(|packet| (packet, peer)));
            }
        }
        true
    }
    pub(crate) fn close(&mut self, peer: PeerId) -> bool {
        let accepted = self.accepted.remove(&peer);
        let held = self.held.remove(&peer).is_some();
        self.requests.retain(|v| *v != peer);
        accepted || held
    }
    pub(crate) fn is_accepted(&self, peer: &PeerId) -> bool {
        self.accepted.contains(peer)
    }
    pub(crate) fn peek_len(&self) -> Option<usize> {
        self.ready.front().map(|(packet, _)| packet.len())
    }
    pub(crate) fn pop(&mut self, max_size: usize) -> Option<(Bytes, PeerId)> {
        let (mut packet, from) = self.ready.pop_front()?;
        packet.truncate(max_size);
        Some((packet, from))
    }
    pub(crate) fn next_request(&mut self) -> Option<PeerId> {
        self.requests.pop_front()
    }
}
