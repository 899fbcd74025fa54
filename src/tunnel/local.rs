//! Local side of the bridge: the one byte-stream connection to the local
//! application, and the joiner's listener waiting for it.

use crate::socket;
use std::io;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

pub(crate) struct LocalLink {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl LocalLink {
    /// The host's single blocking connect to the local application.
    pub(crate) fn connect(
        addr: SocketAddr,
        connect_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> io::Result<LocalLink> {
        let stream = socket::connect_tcp(addr, connect_timeout)?;
        LocalLink::new(stream, addr, write_timeout)
    }

    fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        write_timeout: Option<Duration>,
    ) -> io::Result<LocalLink> {
        socket::set_stream_options(&stream)?;
        stream.set_write_timeout(write_timeout)?;
        Ok(LocalLink { stream, peer_addr })
    }

    pub(crate) fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// One bounded read. `Ok(None)` when nothing is waiting; the local
    /// application closing its end is reported as `UnexpectedEof`.
    pub(crate) fn try_read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        loop {
            return match self.stream.read(buf) {
                Ok(0) => Err(closed_by_application()),
                Ok(n) => Ok(Some(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
        }
    }

    /// Notice the local application closing its end without consuming any
    /// of the bytes it sent.
    pub(crate) fn check_open(&self) -> io::Result<()> {
        let mut buf = [0u8; 1];
        loop {
            return match self.stream.peek(&mut buf) {
                Ok(0) => Err(closed_by_application()),
                Ok(_) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
        }
    }

    /// Write one whole packet. The socket blocks for the duration of the
    /// write, bounded by the write timeout.
    pub(crate) fn write_packet(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.set_nonblocking(false)?;
        let rs = self.stream.write_all(buf);
        self.stream.set_nonblocking(true)?;
        rs
    }

    pub(crate) fn close(self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("shutdown local connection {} {e:?}", self.peer_addr);
        }
    }
}

fn closed_by_application() -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "local application closed the connection",
    )
}

pub(crate) struct LocalListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    write_timeout: Option<Duration>,
}

impl LocalListener {
    pub(crate) fn bind(addr: SocketAddr, write_timeout: Option<Duration>) -> io::Result<Self> {
        let listener = socket::create_tcp_listener(addr, 1)?;
        let local_addr = listener.local_addr()?;
        Ok(LocalListener {
            listener,
            local_addr,
            write_timeout,
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept a pending local connection without blocking.
    pub(crate) fn try_accept(&mut self) -> io::Result<Option<LocalLink>> {
        loop {
            return match self.listener.accept() {
                Ok((stream, addr)) => Ok(Some(LocalLink::new(stream, addr, self.write_timeout)?)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
        }
    }
}
