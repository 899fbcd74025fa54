use crate::overlay::Overlay;
use crate::protocol::peer_id::PeerId;
use std::collections::HashSet;

/// Decides which overlay peers may open a session with this tunnel.
pub trait SessionPolicy: Send {
    fn admits(&self, peer: &PeerId) -> bool;
}

/// Accept every session request. The overlay's own identity guarantees are
/// the only check.
#[derive(Copy, Clone, Debug, Default)]
pub struct AcceptAll;

impl SessionPolicy for AcceptAll {
    fn admits(&self, _peer: &PeerId) -> bool {
        true
    }
}

/// Accept only the listed peers. Packets from anyone else are discarded
/// before they can bind a host's remote peer.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    peers: HashSet<PeerId>,
}

impl AllowList {
    pub fn new<I: IntoIterator<Item = PeerId>>(peers: I) -> Self {
        Self {
            peers: peers.into_iter().collect(),
        }
    }
    pub fn insert(&mut self, peer: PeerId) -> bool {
        self.peers.insert(peer)
    }
}

impl SessionPolicy for AllowList {
    fn admits(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }
}

/// Reacts to inbound session requests. Lives as long as the controller,
/// across any number of start/stop cycles.
pub(crate) struct SessionRequestHandler {
    policy: Box<dyn SessionPolicy>,
}

impl SessionRequestHandler {
    pub(crate) fn new(policy: Box<dyn SessionPolicy>) -> Self {
        Self { policy }
    }
    pub(crate) fn admits(&self, peer: &PeerId) -> bool {
        self.policy.admits(peer)
    }
    pub(crate) fn on_session_request<O: Overlay>(&self, overlay: &mut O, peer: PeerId) {
        if self.policy.admits(&peer) {
            log::info!("accept session request from {peer}");
            overlay.accept_session(peer);
        } else {
            log::warn!("reject session request from {peer}");
            overlay.close_session(peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AcceptAll, AllowList, SessionPolicy, SessionRequestHandler};
    use crate::overlay::memory::MemoryHub;
    use crate::overlay::{Overlay, SendMode};
    use crate::protocol::peer_id::PeerId;

    #[test]
    fn policies() {
        let peer = PeerId::from(77u64);
        assert!(AcceptAll.admits(&peer));
        let mut list = AllowList::new([PeerId::from(1u64)]);
        assert!(!list.admits(&peer));
        list.insert(peer);
        assert!(list.admits(&peer));
    }

    #[test]
    fn handler_applies_policy() {
        let hub = MemoryHub::new();
        let (a, b, c) = (PeerId::from(1u64), PeerId::from(2u64), PeerId::from(3u64));
        let mut ea = hub.endpoint(a).unwrap();
        let mut eb = hub.endpoint(b).unwrap();
        let mut ec = hub.endpoint(c).unwrap();
        eb.send_packet(a, b"b", SendMode::Reliable).unwrap();
        ec.send_packet(a, b"c", SendMode::Reliable).unwrap();
        ea.run_callbacks().unwrap();

        let handler = SessionRequestHandler::new(Box::new(AllowList::new([b])));
        while let Some(peer) = ea.next_session_request() {
            handler.on_session_request(&mut ea, peer);
        }
        assert!(ea.is_accepted(&b));
        assert!(!ea.is_accepted(&c));
        let (packet, from) = ea.read_packet(16).unwrap();
        assert_eq!((&packet[..], from), (&b"b"[..], b));
        assert_eq!(ea.packet_available(), None);
    }
}
