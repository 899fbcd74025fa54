pub mod peer_id;

/// The joiner's opening packet: one zero byte, sent reliably to the host
/// as soon as the local application connects.
pub const HANDSHAKE: [u8; 1] = [0];

/// Largest payload a single overlay packet may carry.
pub const MAX_PACKET_SIZE: usize = u16::MAX as usize;
