use std::fmt::{Display, Formatter};

/// Which side of the bridge this tunnel plays. Fixed from `start_*` until
/// the session stops.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Role {
    /// Fronts the real local application and exposes it to one peer.
    Host,
    /// Listens locally and impersonates the application of the remote host.
    Joiner,
}

#[derive(Eq, PartialEq, Copy, Clone, Debug, Default)]
pub enum TunnelState {
    #[default]
    Idle,
    /// Host is connecting to the local application.
    AwaitingLocalConnection,
    /// Host is connected locally; no peer has spoken yet.
    AwaitingRemotePeer,
    /// Joiner is listening for the local application.
    ListeningLocal,
    Active,
    Faulted,
    Stopped,
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Event {
    StartHost,
    LocalConnected,
    StartClient,
    LocalAccepted,
    PeerBound,
    Failed,
    Stop,
}

impl TunnelState {
    /// The state reached from `self` when `event` happens. Events that do not
    /// apply to the current state leave it unchanged.
    pub fn on(self, event: Event) -> TunnelState {
        match (self, event) {
            (_, Event::Stop) => TunnelState::Stopped,
            (_, Event::Failed) => TunnelState::Faulted,
            (_, Event::StartHost) => TunnelState::AwaitingLocalConnection,
            (_, Event::StartClient) => TunnelState::ListeningLocal,
            (TunnelState::AwaitingLocalConnection, Event::LocalConnected) => {
                TunnelState::AwaitingRemotePeer
            }
            (TunnelState::ListeningLocal, Event::LocalAccepted) => TunnelState::Active,
            (TunnelState::AwaitingRemotePeer, Event::PeerBound) => TunnelState::Active,
            (state, _) => state,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            TunnelState::AwaitingRemotePeer | TunnelState::ListeningLocal | TunnelState::Active
        )
    }
}

impl Display for TunnelState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => f.write_str("HOST"),
            Role::Joiner => f.write_str("JOIN"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Event, TunnelState};

    #[test]
    fn host_lifecycle() {
        let state = TunnelState::Idle
            .on(Event::StartHost)
            .on(Event::LocalConnected);
        assert_eq!(state, TunnelState::AwaitingRemotePeer);
        assert!(state.is_running());
        assert_eq!(state.on(Event::PeerBound), TunnelState::Active);
        assert_eq!(state.on(Event::Stop), TunnelState::Stopped);
    }

    #[test]
    fn joiner_lifecycle() {
        let state = TunnelState::Stopped.on(Event::StartClient);
        assert_eq!(state, TunnelState::ListeningLocal);
        assert_eq!(state.on(Event::LocalAccepted), TunnelState::Active);
        assert_eq!(state.on(Event::Failed), TunnelState::Faulted);
    }

    #[test]
    fn stray_events_are_ignored() {
        assert_eq!(TunnelState::Idle.on(Event::PeerBound), TunnelState::Idle);
        assert_eq!(
            TunnelState::ListeningLocal.on(Event::PeerBound),
            TunnelState::ListeningLocal
        );
        assert_eq!(TunnelState::Active.on(Event::LocalAccepted), TunnelState::Active);
        assert!(!TunnelState::Faulted.is_running());
        assert!(!TunnelState::Stopped.is_running());
        assert_eq!(TunnelState::Stopped.on(Event::Stop), TunnelState::Stopped);
    }
}
