//! The tunnel controller.
//!
//! One [`Tunnel`] bridges one local byte-stream connection to one remote
//! peer on an [`Overlay`]. It is driven by ticks: each tick the driver calls
//! [`Tunnel::run_callbacks`] and then [`Tunnel::update`] (or [`Tunnel::tick`],
//! which does both in that order), and afterwards polls [`Tunnel::is_running`]
//! and [`Tunnel::status_info`]. Nothing in a tick blocks except writing an
//! inbound packet to the local application; the host's connect in
//! [`Tunnel::start_host`] is the one blocking call and is made once.
//!
//! ```text
//!   Idle/Stopped/Faulted
//!     │ start_host               │ start_client
//!     ▼                          ▼
//!   AwaitingLocalConnection    ListeningLocal ──local accept──┐
//!     │ connected                                             │
//!     ▼                                                       ▼
//!   AwaitingRemotePeer ──first packet from a peer──────────▶ Active
//! ```
//! `stop` reaches `Stopped` from anywhere; a failed start ends in `Faulted`.

mod local;
mod pump;
mod session;
mod state;


pub use session::{AcceptAll, AllowList, SessionPolicy};
pub use state::{Event, Role, TunnelState};

use crate::config::TunnelConfig;
use crate::overlay::Overlay;
use crate::protocol::peer_id::PeerId;
use local::{LocalLink, LocalListener};
use session::SessionRequestHandler;
use std::net::SocketAddr;

/// Lifecycle state together with the resources each state owns.
enum Session {
    Idle,
    AwaitingLocalConnection,
    AwaitingRemotePeer {
        local: LocalLink,
    },
    ListeningLocal {
        listener: LocalListener,
        peer: PeerId,
    },
    Active {
        role: Role,
        local: LocalLink,
        peer: PeerId,
    },
    Faulted,
    Stopped,
}

impl Session {
    fn state(&self) -> TunnelState {
        match self {
            Session::Idle => TunnelState::Idle,
            Session::AwaitingLocalConnection => TunnelState::AwaitingLocalConnection,
            Session::AwaitingRemotePeer { .. } => TunnelState::AwaitingRemotePeer,
            Session::ListeningLocal { .. } => TunnelState::ListeningLocal,
            Session::Active { .. } => TunnelState::Active,
            Session::Faulted => TunnelState::Faulted,
            Session::Stopped => TunnelState::Stopped,
        }
    }
    fn role(&self) -> Option<Role> {
        match self {
            Session::AwaitingLocalConnection | Session::AwaitingRemotePeer { .. } => {
                Some(Role::Host)
            }
            Session::ListeningLocal { .. } => Some(Role::Joiner),
            Session::Active { role, .. } => Some(*role),
            _ => None,
        }
    }
    fn peer(&self) -> Option<PeerId> {
        match self {
            Session::ListeningLocal { peer, .. } | Session::Active { peer, .. } => Some(*peer),
            _ => None,
        }
    }
    fn local_mut(&mut self) -> Option<&mut LocalLink> {
        match self {
            Session::AwaitingRemotePeer { local } | Session::Active { local, .. } => Some(local),
            _ => None,
        }
    }
    fn close(self) {
        match self {
            Session::AwaitingRemotePeer { local } | Session::Active { local, .. } => local.close(),
            Session::ListeningLocal { listener, .. } => {
                log::debug!("close local listener {}", listener.local_addr())
            }
            _ => {}
        }
    }
}

pub struct Tunnel<O: Overlay> {
    config: TunnelConfig,
    overlay: O,
    sessions: SessionRequestHandler,
    session: Session,
    status: String,
    scratch: Vec<u8>,
}

impl<O: Overlay> Tunnel<O> {
    /// A controller that accepts every session request.
    pub fn new(overlay: O, config: TunnelConfig) -> crate::Result<Tunnel<O>> {
        Tunnel::with_policy(overlay, config, AcceptAll)
    }

    pub fn with_policy<P: SessionPolicy + 'static>(
        overlay: O,
        config: TunnelConfig,
        policy: P,
    ) -> crate::Result<Tunnel<O>> {
        config.check()?;
        let scratch = vec![0u8; config.buffer_size];
        Ok(Tunnel {
            config,
            overlay,
            sessions: SessionRequestHandler::new(Box::new(policy)),
            session: Session::Idle,
            status: "Ready".to_string(),
            scratch,
        })
    }

    /// Connect to the local application at `port` and wait for a remote peer.
    /// Any running session is stopped first.
    pub fn start_host(&mut self, port: u16) -> crate::Result<()> {
        self.stop();
        let rs = self.open_host(port);
        if let Err(e) = &rs {
            self.fail(format!("host start failed: {e}"));
        }
        rs
    }

    fn open_host(&mut self, port: u16) -> crate::Result<()> {
        let addr = self.config.local_addr(port)?;
        let from = self.session.state();
        self.enter(from, Event::StartHost, Session::AwaitingLocalConnection);
        let local = LocalLink::connect(addr, self.config.connect_timeout, self.config.write_timeout)
            .map_err(|source| crate::Error::Connect { addr, source })?;
        self.status = format!("[{}] connected to local {addr}, waiting for a peer", Role::Host);
        log::info!("{}", self.status);
        self.enter(
            TunnelState::AwaitingLocalConnection,
            Event::LocalConnected,
            Session::AwaitingRemotePeer { local },
        );
        Ok(())
    }

    /// Listen locally on `port` for the application and relay it to
    /// `host`. Any running session is stopped first.
    pub fn start_client(&mut self, host: PeerId, port: u16) -> crate::Result<()> {
        self.stop();
        let rs = self.open_client(host, port);
        if let Err(e) = &rs {
            self.fail(format!("client start failed: {e}"));
        }
        rs
    }

    /// [`Tunnel::start_client`] on the configured listen port.
    pub fn start_client_default(&mut self, host: PeerId) -> crate::Result<()> {
        self.start_client(host, self.config.listen_port)
    }

    fn open_client(&mut self, host: PeerId, port: u16) -> crate::Result<()> {
        if host.is_unspecified() {
            return Err(crate::Error::InvalidPeerId(
                "the nil id cannot name a host".to_string(),
            ));
        }
        let addr = self.config.local_addr(port)?;
        let listener = LocalListener::bind(addr, self.config.write_timeout)
            .map_err(|source| crate::Error::Listen { addr, source })?;
        self.status = format!(
            "[{}] listening on {}, connect the local application",
            Role::Joiner,
            listener.local_addr()
        );
        log::info!("{}", self.status);
        let from = self.session.state();
        self.enter(
            from,
            Event::StartClient,
            Session::ListeningLocal {
                listener,
                peer: host,
            },
        );
        Ok(())
    }

    /// Stop whatever is running. Safe in every state, any number of times.
    pub fn stop(&mut self) {
        self.shutdown(Event::Stop, "Stopped".to_string());
    }

    /// Deliver pending overlay events: advance the overlay and answer
    /// session requests. Must run before [`Tunnel::update`] in a tick.
    pub fn run_callbacks(&mut self) {
        if let Err(e) = self.overlay.run_callbacks() {
            log::warn!("overlay run_callbacks {e:?}");
        }
        while let Some(peer) = self.overlay.next_session_request() {
            self.sessions.on_session_request(&mut self.overlay, peer);
        }
    }

    /// Run the packet pump once.
    pub fn update(&mut self) {
        if !self.state().is_running() {
            return;
        }
        if let Err(e) = self.pump() {
            match e {
                crate::Error::Accept(_) => self.fail(e.to_string()),
                e => {
                    log::warn!("tunnel fault: {e}");
                    self.shutdown(Event::Stop, format!("Stopped: {e}"));
                }
            }
        }
    }

    /// One whole tick: callbacks, then the pump.
    pub fn tick(&mut self) {
        self.run_callbacks();
        self.update();
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }
    pub fn status_info(&self) -> &str {
        &self.status
    }
    pub fn state(&self) -> TunnelState {
        self.session.state()
    }
    pub fn role(&self) -> Option<Role> {
        self.session.role()
    }
    pub fn remote_peer(&self) -> Option<PeerId> {
        self.session.peer()
    }
    /// Address of the joiner's local listener while it waits.
    pub fn local_listen_addr(&self) -> Option<SocketAddr> {
        match &self.session {
            Session::ListeningLocal { listener, .. } => Some(listener.local_addr()),
            _ => None,
        }
    }
    /// Address of the local application once connected.
    pub fn local_peer_addr(&self) -> Option<SocketAddr> {
        match &self.session {
            Session::AwaitingRemotePeer { local } | Session::Active { local, .. } => {
                Some(local.peer_addr())
            }
            _ => None,
        }
    }
    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }
    pub fn overlay(&self) -> &O {
        &self.overlay
    }
    pub fn overlay_mut(&mut self) -> &mut O {
        &mut self.overlay
    }

    /// A refused outbound packet is reported but changes no state: the
    /// peer may become reachable again.
    fn send_failed(&mut self, peer: PeerId, e: std::io::Error) {
        let e = crate::Error::Overlay(e);
        log::warn!("send to {peer}: {e}");
        self.status = format!("{e} (peer {peer})");
    }

    fn fail(&mut self, status: String) {
        log::warn!("{status}");
        self.shutdown(Event::Failed, status);
    }

    /// Release everything the current session owns, close the overlay
    /// session with the bound peer, and settle in the state `event` leads to.
    fn shutdown(&mut self, event: Event, status: String) {
        let from = self.session.state();
        let old = self.take_session();
        if let Some(peer) = old.peer() {
            self.overlay.close_session(peer);
        }
        old.close();
        self.status = status;
        let next = match event {
            Event::Failed => Session::Faulted,
            _ => Session::Stopped,
        };
        self.enter(from, event, next);
    }

    fn take_session(&mut self) -> Session {
        std::mem::replace(&mut self.session, Session::Idle)
    }

    fn enter(&mut self, from: TunnelState, event: Event, next: Session) {
        let to = next.state();
        debug_assert_eq!(from.on(event), to, "{event:?} from {from}");
        if from != to {
            log::info!("tunnel {from} -> {to}");
        }
        self.session = next;
    }
}

impl<O: Overlay> Drop for Tunnel<O> {
    fn drop(&mut self) {
        let session = std::mem::replace(&mut self.session, Session::Stopped);
        if let Some(peer) = session.peer() {
            self.overlay.close_session(peer);
        }
        session.close();
    }
}
