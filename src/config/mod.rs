use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_LISTEN_PORT: u16 = 25565;
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
pub(crate) const LOCAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings of one tunnel controller. Held in memory only.
#[derive(Clone, Debug)]
pub struct TunnelConfig {
    /// Address the host connects to and the joiner listens on.
    pub local_ip: IpAddr,
    /// Joiner listen port used by `start_client_default`.
    pub listen_port: u16,
    /// Capacity of the scratch buffer, the upper bound of one local read.
    pub buffer_size: usize,
    /// Bound on the host's blocking connect. `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// Bound on writing one inbound packet to the local connection.
    pub write_timeout: Option<Duration>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            local_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            listen_port: DEFAULT_LISTEN_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: Some(LOCAL_TIMEOUT),
            write_timeout: Some(LOCAL_TIMEOUT),
        }
    }
}

impl TunnelConfig {
    pub fn empty() -> Self {
        Self::default()
    }
    pub fn set_local_ip(mut self, local_ip: IpAddr) -> Self {
        self.local_ip = local_ip;
        self
    }
    pub fn set_listen_port(mut self, listen_port: u16) -> Self {
        self.listen_port = listen_port;
        self
    }
    pub fn set_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
    pub fn set_connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
    pub fn set_write_timeout(mut self, write_timeout: Option<Duration>) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn check(&self) -> crate::Result<()> {
        if self.buffer_size == 0 {
            return Err(crate::Error::Config("buffer_size must not be 0".into()));
        }
        if self.buffer_size > crate::protocol::MAX_PACKET_SIZE {
            return Err(crate::Error::Config(format!(
                "buffer_size {} exceeds the largest overlay packet {}",
                self.buffer_size,
                crate::protocol::MAX_PACKET_SIZE
            )));
        }
        if self.listen_port == 0 {
            return Err(crate::Error::Config("listen_port must not be 0".into()));
        }
        if matches!(self.connect_timeout, Some(v) if v.is_zero())
            || matches!(self.write_timeout, Some(v) if v.is_zero())
        {
            return Err(crate::Error::Config("timeouts must not be zero".into()));
        }
        Ok(())
    }

    /// The local endpoint for `port`.
    pub fn local_addr(&self, port: u16) -> crate::Result<SocketAddr> {
        if port == 0 {
            return Err(crate::Error::Config("local port must not be 0".into()));
        }
        Ok(SocketAddr::new(self.local_ip, port))
    }
}

#[cfg(test)]
mod tests {
    use super::TunnelConfig;
    use std::time::Duration;

    #[test]
    fn default_config() {
        let config = TunnelConfig::default();
        assert!(config.check().is_ok());
        assert_eq!(config.listen_port, 25565);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(
            config.local_addr(25566).unwrap(),
            "127.0.0.1:25566".parse::<std::net::SocketAddr>().unwrap()
        );
    }

    #[test]
    fn reject_invalid_config() {
        assert!(TunnelConfig::empty().set_buffer_size(0).check().is_err());
        assert!(TunnelConfig::empty().set_buffer_size(70000).check().is_err());
        assert!(TunnelConfig::empty().set_listen_port(0).check().is_err());
        assert!(TunnelConfig::empty()
            .set_write_timeout(Some(Duration::ZERO))
            .check()
            .is_err());
        assert!(TunnelConfig::default().local_addr(0).is_err());
    }
}
