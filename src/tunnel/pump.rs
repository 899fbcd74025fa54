//! The per-tick packet pump.
//!
//! Steps run in a fixed order:
//! 1. a joiner accepts a pending local connection and greets the host;
//! 2. every queued overlay packet is written to the local connection, one
//!    local write per packet;
//! 3. at most one bounded read from the local connection is forwarded to
//!    the peer as one reliable packet.

use super::{Event, Role, Session, Tunnel, TunnelState};
use crate::overlay::{Overlay, SendMode};
use crate::protocol::peer_id::PeerId;
use crate::protocol::HANDSHAKE;
use crate::Error;

impl<O: Overlay> Tunnel<O> {
    pub(super) fn pump(&mut self) -> crate::Result<()> {
        self.accept_local()?;
        self.drain_overlay()?;
        self.forward_local()
    }

    fn accept_local(&mut self) -> crate::Result<()> {
        if !matches!(self.session, Session::ListeningLocal { .. }) {
            return Ok(());
        }
        let (mut listener, peer) = match self.take_session() {
            Session::ListeningLocal { listener, peer } => (listener, peer),
            other => {
                self.session = other;
                return Ok(());
            }
        };
        let local = match listener.try_accept() {
            Ok(Some(local)) => local,
            Ok(None) => {
                self.session = Session::ListeningLocal { listener, peer };
                return Ok(());
            }
            Err(e) => {
                self.session = Session::ListeningLocal { listener, peer };
                return Err(Error::Accept(e));
            }
        };
        self.status = format!(
            "[{}] local application {} connected, tunnel to {peer} active",
            Role::Joiner,
            local.peer_addr()
        );
        log::info!("{}", self.status);
        drop(listener);
        self.enter(
            TunnelState::ListeningLocal,
            Event::LocalAccepted,
            Session::Active {
                role: Role::Joiner,
                local,
                peer,
            },
        );
        match self.overlay.send_packet(peer, &HANDSHAKE, SendMode::Reliable) {
            Ok(()) => log::debug!("sent handshake to {peer}"),
            Err(e) => self.send_failed(peer, e),
        }
        Ok(())
    }

    fn drain_overlay(&mut self) -> crate::Result<()> {
        while let Some(size) = self.overlay.packet_available() {
            let (packet, sender) = match self.overlay.read_packet(size) {
                Some(v) => v,
                None => break,
            };
            if !self.sessions.admits(&sender) {
                log::warn!("drop {} bytes from rejected peer {sender}", packet.len());
                continue;
            }
            self.bind_remote_peer(sender);
            match self.session.peer() {
                Some(peer) if peer == sender => {}
                _ => {
                    log::debug!("drop {} bytes from unbound peer {sender}", packet.len());
                    continue;
                }
            }
            if let Some(local) = self.session.local_mut() {
                log::trace!("{sender} -> local {} bytes", packet.len());
                local.write_packet(&packet).map_err(Error::LocalIo)?;
            }
        }
        Ok(())
    }

    /// A host waiting for its peer takes the first sender as that peer.
    fn bind_remote_peer(&mut self, sender: PeerId) {
        if !matches!(self.session, Session::AwaitingRemotePeer { .. }) {
            return;
        }
        let local = match self.take_session() {
            Session::AwaitingRemotePeer { local } => local,
            other => {
                self.session = other;
                return;
            }
        };
        self.enter(
            TunnelState::AwaitingRemotePeer,
            Event::PeerBound,
            Session::Active {
                role: Role::Host,
                local,
                peer: sender,
            },
        );
        self.overlay.accept_session(sender);
        self.status = format!("[{}] peer {sender} connected, tunnel active", Role::Host);
        log::info!("{}", self.status);
    }

    fn forward_local(&mut self) -> crate::Result<()> {
        let (local, peer) = match &mut self.session {
            Session::Active { local, peer, .. } => (local, *peer),
            // unbound: leave the bytes queued, but notice a closed application
            Session::AwaitingRemotePeer { local } => {
                return local.check_open().map_err(Error::LocalIo)
            }
            _ => return Ok(()),
        };
        let n = match local.try_read(&mut self.scratch).map_err(Error::LocalIo)? {
            Some(n) => n,
            None => return Ok(()),
        };
        log::trace!("local -> {peer} {n} bytes");
        if let Err(e) = self
            .overlay
            .send_packet(peer, &self.scratch[..n], SendMode::Reliable)
        {
            self.send_failed(peer, e);
        }
        Ok(())
    }
}
