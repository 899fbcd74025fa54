//! The overlay transport surface.
//!
//! An overlay delivers discrete packets between endpoints named by
//! [`PeerId`]. It handles NAT traversal and reliability itself; the tunnel
//! only moves opaque payloads through it. Event delivery is polled: the
//! driver calls [`Overlay::run_callbacks`] once per tick, then drains
//! [`Overlay::next_session_request`] and the packet queue.

use crate::protocol::peer_id::PeerId;
use bytes::Bytes;
use std::io;

mod inbox;
pub mod memory;
pub mod p2p;

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum SendMode {
    Unreliable,
    /// Reliable, ordered delivery. The only mode the tunnel uses.
    Reliable,
}

pub trait Overlay {
    /// Queue `buf` as one packet to `peer`. Sending to a peer implicitly
    /// accepts its session.
    fn send_packet(&mut self, peer: PeerId, buf: &[u8], mode: SendMode) -> io::Result<()>;

    /// Size of the next queued inbound packet, if any.
    fn packet_available(&mut self) -> Option<usize>;

    /// Dequeue the next inbound packet, truncated to `max_size` bytes.
    fn read_packet(&mut self, max_size: usize) -> Option<(Bytes, PeerId)>;

    /// Accept the session with `peer`, releasing any packets held for it.
    /// Idempotent.
    fn accept_session(&mut self, peer: PeerId) -> bool;

    /// Close the session with `peer`. Returns false when there was none.
    fn close_session(&mut self, peer: PeerId) -> bool;

    /// Next pending "peer wants to open a session" notification.
    fn next_session_request(&mut self) -> Option<PeerId>;

    /// Advance the overlay's own I/O and event delivery.
    fn run_callbacks(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Overlay + ?Sized> Overlay for Box<T> {
    fn send_packet(&mut self, peer: PeerId, buf: &[u8], mode: SendMode) -> io::Result<()> {
        (**self).send_packet(peer, buf, mode)
    }
    fn packet_available(&mut self) -> Option<usize> {
        (**self).packet_available()
    }
    fn read_packet(&mut self, max_size: usize) -> Option<(Bytes, PeerId)> {
        (**self).read_packet(max_size)
    }
    fn accept_session(&mut self, peer: PeerId) -> bool {
        (**self).accept_session(peer)
    }
    fn close_session(&mut self, peer: PeerId) -> bool {
        (**self).close_session(peer)
    }
    fn next_session_request(&mut self) -> Option<PeerId> {
        (**self).next_session_request()
    }
    fn run_callbacks(&mut self) -> io::Result<()> {
        (**self).run_callbacks()
    }
}
