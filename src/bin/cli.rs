use clap::{Parser, Subcommand};
use std::error::Error;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use peerwire::session::Session;
use peerwire::wire::Services;

#[derive(Parser)]
#[command(name = "peerwire-cli")]
struct Cli {
    /// Node to connect to, e.g. seed.bitcoin.sipa.be:8333
    #[arg(long)]
    node: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform the version/verack handshake and report the peer.
    Handshake,
    /// Handshake, then measure a ping/pong round trip.
    Ping,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let addr = cli
        .node
        .to_socket_addrs()?
        .next()
        .ok_or("could not resolve address")?;

    let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(30))?;
    let mut session = Session::new(stream)?;

    let peer = session.handshake(Services::NONE)?;
    println!(
        "connected to {}: {} (protocol {}, services {:?})",
        cli.node, peer.user_agent, peer.version, peer.services
    );

    match cli.command {
        Commands::Handshake => {}
        Commands::Ping => {
            let started = Instant::now();
            session.ping()?;
            println!("pong in {:?}", started.elapsed());
        }
    }

    Ok(())
}
