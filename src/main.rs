use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use env_logger::Env;
use rustp2p::tunnel::PeerNodeAddress;
use rustp2p_tunnel::overlay::p2p::{group_code, P2pOverlay, P2pOverlayConfig};
use rustp2p_tunnel::{PeerId, Tunnel, TunnelConfig};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Id of this node on the overlay, at most 4294967295.
    /// example: --id 1
    #[arg(short, long)]
    id: PeerId,
    /// Overlay TCP and UDP port
    #[arg(short, long, default_value_t = 23333)]
    overlay_port: u16,
    /// Peer node address.
    /// example: --peer tcp://192.168.10.13:23333 --peer udp://192.168.10.23:23333
    #[arg(short, long)]
    peer: Vec<PeerNodeAddress>,
    /// Nodes with the same group_code can form a network
    #[arg(short, long, default_value = "rustp2p-tunnel")]
    group_code: String,
    /// Milliseconds between ticks
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,
    /// Size of one local read
    #[arg(long)]
    buffer_size: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a local application and wait for a peer to join.
    Host {
        /// Port of the local application
        #[arg(short = 'P', long)]
        port: u16,
    },
    /// Listen locally and relay the local application to a hosting node.
    Join {
        /// Id of the hosting node
        #[arg(long)]
        host: PeerId,
        /// Local listen port
        #[arg(short = 'P', long)]
        port: Option<u16>,
    },
}

pub fn main() -> anyhow::Result<()> {
    let Args {
        id,
        overlay_port,
        peer,
        group_code: group,
        tick_ms,
        buffer_size,
        command,
    } = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let quit = Arc::new(AtomicBool::new(false));
    let flag = quit.clone();
    let _handle = ctrlc2::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        true
    })?;

    // the overlay runs on tokio; the tunnel itself is ticked from this thread
    let runtime = tokio::runtime::Runtime::new()?;
    let overlay = P2pOverlay::bind(
        runtime.handle(),
        P2pOverlayConfig::new(id)
            .set_port(overlay_port)
            .set_peers(peer)
            .set_group_code(group_code(&group)),
    )?;
    let mut config = TunnelConfig::default();
    if let Some(buffer_size) = buffer_size {
        config = config.set_buffer_size(buffer_size);
    }
    let mut tunnel = Tunnel::new(overlay, config)?;
    match command {
        Command::Host { port } => tunnel.start_host(port)?,
        Command::Join {
            host,
            port: Some(port),
        } => tunnel.start_client(host, port)?,
        Command::Join { host, port: None } => tunnel.start_client_default(host)?,
    }

    let mut status = String::new();
    let interval = Duration::from_millis(tick_ms.max(1));
    while !quit.load(Ordering::SeqCst) {
        tunnel.tick();
        if tunnel.status_info() != status {
            status = tunnel.status_info().to_string();
            println!("{status}");
        }
        if !tunnel.is_running() {
            break;
        }
        std::thread::sleep(interval);
    }
    tunnel.stop();
    log::info!("exit: {}", tunnel.status_info());
    Ok(())
}
