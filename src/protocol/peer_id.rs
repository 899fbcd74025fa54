use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Opaque identifier of an endpoint on the overlay transport.
///
/// `PeerId` is an 8-byte identifier, carried big-endian so it maps onto
/// the 64-bit account ids overlay services hand out. The all-zero id is the
/// overlay's nil id and never names a real peer.
///
/// # Examples
///
/// ```rust
/// use rustp2p_tunnel::PeerId;
///
/// let peer: PeerId = "77".parse().unwrap();
/// assert_eq!(u64::from(peer), 77);
/// assert_eq!(peer.to_string(), "77");
/// ```
#[repr(transparent)]
#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
pub struct PeerId([u8; ID_LEN]);
pub const ID_LEN: usize = 8;

impl AsRef<[u8]> for PeerId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PeerId {
    /// Returns the nil id (all zeros).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rustp2p_tunnel::PeerId;
    ///
    /// assert!(PeerId::unspecified().is_unspecified());
    /// ```
    pub fn unspecified() -> PeerId {
        PeerId([0u8; ID_LEN])
    }

    /// Checks if this id is the nil id.
    pub fn is_unspecified(&self) -> bool {
        self.0.iter().all(|v| *v == 0)
    }
}

impl From<PeerId> for [u8; ID_LEN] {
    fn from(value: PeerId) -> Self {
        value.0
    }
}
impl From<PeerId> for u64 {
    fn from(value: PeerId) -> Self {
        u64::from_be_bytes(value.0)
    }
}

impl From<[u8; ID_LEN]> for PeerId {
    fn from(value: [u8; ID_LEN]) -> Self {
        PeerId(value)
    }
}
impl From<u64> for PeerId {
    fn from(value: u64) -> Self {
        PeerId(value.to_be_bytes())
    }
}
impl TryFrom<&[u8]> for PeerId {
    type Error = std::io::Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let buf: [u8; ID_LEN] = value
            .try_into()
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidData))?;
        Ok(PeerId(buf))
    }
}

impl FromStr for PeerId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let id = s
            .parse::<u64>()
            .map_err(|e| crate::Error::InvalidPeerId(format!("{s:?}: {e}")))?;
        if id == 0 {
            return Err(crate::Error::InvalidPeerId(format!(
                "{s:?}: the nil id cannot name a peer"
            )));
        }
        Ok(id.into())
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u64::from(*self))
    }
}

#[cfg(test)]
mod test {
    use super::PeerId;

    #[test]
    fn parse_peer_id() {
        let peer: PeerId = " 76561198000000077 ".parse().unwrap();
        assert_eq!(u64::from(peer), 76561198000000077);
        assert_eq!(peer.to_string(), "76561198000000077");
    }

    #[test]
    fn reject_malformed_peer_id() {
        assert!("".parse::<PeerId>().is_err());
        assert!("abc".parse::<PeerId>().is_err());
        assert!("-7".parse::<PeerId>().is_err());
        assert!("0".parse::<PeerId>().is_err());
    }

    #[test]
    fn peer_id_bytes() {
        let peer = PeerId::from(0x0102u64);
        assert_eq!(peer.as_ref(), &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(PeerId::try_from(peer.as_ref()).unwrap(), peer);
        assert!(PeerId::try_from(&[1u8, 2][..]).is_err());
        assert!(PeerId::unspecified().is_unspecified());
    }
}
