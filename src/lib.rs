//! Bridge a local byte-stream application to one remote peer over a
//! peer-to-peer overlay.
//!
//! The host side connects to the real local application; the joiner side
//! listens locally and impersonates it. Between them, every chunk of the
//! stream travels as one reliable overlay packet, with no framing of our own.
//!
//! ```text
//!  local app ──TCP── [Tunnel: Host] ══ overlay packets ══ [Tunnel: Joiner] ──TCP── local app
//! ```
//!
//! ```rust
//! use rustp2p_tunnel::overlay::memory::MemoryHub;
//! use rustp2p_tunnel::{Tunnel, TunnelConfig, TunnelState};
//!
//! let hub = MemoryHub::new();
//! let overlay = hub.endpoint(77u64.into()).unwrap();
//! let mut tunnel = Tunnel::new(overlay, TunnelConfig::default()).unwrap();
//! tunnel.stop();
//! assert_eq!(tunnel.state(), TunnelState::Stopped);
//! assert!(!tunnel.is_running());
//! ```

pub mod config;
pub mod error;
pub mod overlay;
pub mod protocol;
mod socket;
pub mod tunnel;

pub use config::TunnelConfig;
pub use error::{Error, Result};
pub use protocol::peer_id::PeerId;
pub use tunnel::{AcceptAll, AllowList, Role, SessionPolicy, Tunnel, TunnelState};
