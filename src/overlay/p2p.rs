//! Overlay on a rustp2p endpoint.
//!
//! rustp2p names nodes by 32-bit ids, punches through NAT and relays
//! through other nodes of the same group when no direct path exists. The
//! endpoint lives on a tokio runtime: a receive task moves every inbound
//! datagram into an arrival queue, and [`Overlay::run_callbacks`] drains it
//! into the session bookkeeping on the caller's thread.
//!
//! Sends never block the tick. A reliable packet the endpoint cannot take
//! yet (no route to the node so far, full send queue) waits in a bounded
//! backlog and is retried in order on later sends and callbacks.

use crate::overlay::inbox::Inbox;
use crate::overlay::{Overlay, SendMode};
use crate::protocol::peer_id::PeerId;
use crate::protocol::MAX_PACKET_SIZE;
use bytes::Bytes;
use crossbeam_queue::SegQueue;
use rustp2p::protocol::node_id::{GroupCode, NodeID};
use rustp2p::tunnel::PeerNodeAddress;
use rustp2p::{Builder, EndPoint};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Bytes of reliable packets that may wait for the endpoint before sends
/// are refused.
pub const MAX_BACKLOG_BYTES: usize = 64 * MAX_PACKET_SIZE;

pub const DEFAULT_OVERLAY_PORT: u16 = 23333;

type Arrivals = Arc<SegQueue<(PeerId, Bytes)>>;

/// The rustp2p node id of `peer`. Only ids that fit in 32 bits name a node.
pub fn node_id(peer: PeerId) -> io::Result<NodeID> {
    let id = u32::try_from(u64::from(peer)).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("peer id {peer} does not fit a 32-bit node id"),
        )
    })?;
    Ok(NodeID::from(id))
}

pub fn peer_id(node: NodeID) -> PeerId {
    PeerId::from(u32::from(node) as u64)
}

/// Nodes with the same group code form one network. Longer names are cut
/// to the 16 bytes a group code holds.
pub fn group_code(name: &str) -> GroupCode {
    let mut array = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(16);
    array[..len].copy_from_slice(&bytes[..len]);
    array.into()
}

pub struct P2pOverlayConfig {
    pub local_id: PeerId,
    /// TCP and UDP port of the endpoint. 0 picks ephemeral ports.
    pub port: u16,
    /// Nodes to contact at startup, e.g. `tcp://192.168.10.13:23333`.
    pub peers: Vec<PeerNodeAddress>,
    pub group_code: Option<GroupCode>,
}

impl P2pOverlayConfig {
    pub fn new(local_id: PeerId) -> Self {
        Self {
            local_id,
            port: DEFAULT_OVERLAY_PORT,
            peers: Vec::new(),
            group_code: None,
        }
    }
    pub fn set_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
    pub fn set_peers(mut self, peers: Vec<PeerNodeAddress>) -> Self {
        self.peers = peers;
        self
    }
    pub fn set_group_code(mut self, group_code: GroupCode) -> Self {
        self.group_code = Some(group_code);
        self
    }
}

/// Reliable packets waiting for the endpoint, in send order.
#[derive(Default)]
struct Backlog {
    packets: VecDeque<(PeerId, Bytes)>,
    bytes: usize,
}

impl Backlog {
    fn len(&self) -> usize {
        self.packets.len()
    }
    fn push(&mut self, peer: PeerId, packet: Bytes) -> io::Result<()> {
        if self.bytes + packet.len() > MAX_BACKLOG_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!(
                    "send backlog full, {} packets ({} bytes) waiting",
                    self.packets.len(),
                    self.bytes
                ),
            ));
        }
        self.bytes += packet.len();
        self.packets.push_back((peer, packet));
        Ok(())
    }
    /// Hand waiting packets to `send` in order, stopping at the first one it
    /// refuses.
    fn flush<F>(&mut self, mut send: F) -> io::Result<()>
    where
        F: FnMut(PeerId, &[u8]) -> io::Result<()>,
    {
        while let Some((peer, packet)) = self.packets.front() {
            let len = packet.len();
            send(*peer, packet)?;
            self.bytes -= len;
            self.packets.pop_front();
        }
        Ok(())
    }
    fn remove_peer(&mut self, peer: PeerId) -> bool {
        let before = self.packets.len();
        self.packets.retain(|(v, _)| *v != peer);
        self.bytes = self.packets.iter().map(|(_, packet)| packet.len()).sum();
        before != self.packets.len()
    }
}

pub struct P2pOverlay {
    local_id: PeerId,
    runtime: Handle,
    endpoint: Arc<EndPoint>,
    arrivals: Arrivals,
    receiver: JoinHandle<()>,
    inbox: Inbox,
    backlog: Backlog,
}

impl P2pOverlay {
    /// Build a rustp2p endpoint on `runtime` and start receiving from it.
    /// Blocks until the endpoint is up; must not be called from inside the
    /// runtime.
    pub fn bind(runtime: &Handle, config: P2pOverlayConfig) -> io::Result<P2pOverlay> {
        let mut builder = Builder::new()
            .node_id(node_id(config.local_id)?)
            .tcp_port(config.port)
            .udp_port(config.port)
            .peers(config.peers);
        if let Some(group_code) = config.group_code {
            builder = builder.group_code(group_code);
        }
        let endpoint = runtime.block_on(builder.build())?;
        log::info!("overlay node {} up on port {}", config.local_id, config.port);
        P2pOverlay::new(runtime, endpoint, config.local_id)
    }

    /// Wrap an endpoint built elsewhere. `local_id` must be the id it was
    /// built with.
    pub fn new(runtime: &Handle, endpoint: EndPoint, local_id: PeerId) -> io::Result<P2pOverlay> {
        node_id(local_id)?;
        let endpoint = Arc::new(endpoint);
        let arrivals = Arrivals::default();
        let receiver = runtime.spawn(receive_loop(endpoint.clone(), arrivals.clone()));
        Ok(P2pOverlay {
            local_id,
            runtime: runtime.clone(),
            endpoint,
            arrivals,
            receiver,
            inbox: Inbox::default(),
            backlog: Backlog::default(),
        })
    }

    pub fn local_id(&self) -> PeerId {
        self.local_id
    }
    pub fn endpoint(&self) -> &EndPoint {
        &self.endpoint
    }
    pub fn is_accepted(&self, peer: &PeerId) -> bool {
        self.inbox.is_accepted(peer)
    }
    /// Reliable packets still waiting for the endpoint.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    fn flush_backlog(&mut self) {
        let endpoint = &self.endpoint;
        let _guard = self.runtime.enter();
        let rs = self
            .backlog
            .flush(|peer, buf| endpoint.try_send_to(buf, node_id(peer)?));
        if let Err(e) = rs {
            log::debug!("{} packets wait for the overlay: {e:?}", self.backlog.len());
        }
    }
}

async fn receive_loop(endpoint: Arc<EndPoint>, arrivals: Arrivals) {
    loop {
        match endpoint.recv_from().await {
            Ok((data, metadata)) => {
                let from = peer_id(metadata.src_id());
                log::trace!(
                    "{from} -> {} bytes, relay={}",
                    data.payload().len(),
                    metadata.is_relay()
                );
                arrivals.push((from, Bytes::copy_from_slice(data.payload())));
            }
            Err(e) => {
                log::warn!("overlay receive stopped {e:?}");
                return;
            }
        }
    }
}

impl Overlay for P2pOverlay {
    fn send_packet(&mut self, peer: PeerId, buf: &[u8], mode: SendMode) -> io::Result<()> {
        if buf.len() > MAX_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("packet of {} bytes exceeds {MAX_PACKET_SIZE}", buf.len()),
            ));
        }
        let node = node_id(peer)?;
        self.inbox.accept(peer);
        match mode {
            SendMode::Unreliable => {
                let _guard = self.runtime.enter();
                self.endpoint.try_send_to(buf, node)
            }
            SendMode::Reliable => {
                self.flush_backlog();
                self.backlog.push(peer, Bytes::copy_from_slice(buf))?;
                self.flush_backlog();
                Ok(())
            }
        }
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
        let dropped = self.backlog.remove_peer(peer);
        self.inbox.close(peer) || dropped
    }

    fn next_session_request(&mut self) -> Option<PeerId> {
        self.inbox.next_request()
    }

    fn run_callbacks(&mut self) -> io::Result<()> {
        while let Some((from, packet)) = self.arrivals.pop() {
            self.inbox.deliver(from, packet);
        }
        self.flush_backlog();
        if self.receiver.is_finished() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "overlay endpoint stopped receiving",
            ));
        }
        Ok(())
    }
}

impl Drop for P2pOverlay {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}
