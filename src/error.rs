use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid peer id {0}")]
    InvalidPeerId(String),
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("listen on {addr} failed: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("accept local connection failed: {0}")]
    Accept(#[source] io::Error),
    #[error("local connection error: {0}")]
    LocalIo(#[source] io::Error),
    #[error("overlay send failed: {0}")]
    Overlay(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
