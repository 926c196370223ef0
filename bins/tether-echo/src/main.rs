#![forbid(unsafe_code)]

//! Encrypted echo demo: one peer listens, one connects, and the two
//! exchange a greeting over an established channel.

use std::net::{TcpListener, TcpStream};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tether_channel::SecureChannel;
use tether_vault::Vault;

#[derive(Parser, Debug)]
#[command(name = "tether-echo", about = "Encrypted echo over a Tether channel")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept one channel and answer the greeting.
    Listen {
        #[arg(long, default_value = "127.0.0.1:4004")]
        addr: String,
    },
    /// Connect, send the greeting, and print the reply.
    Connect {
        #[arg(long, default_value = "127.0.0.1:4004")]
        addr: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Listen { addr } => listen(&addr),
        Command::Connect { addr } => connect(&addr),
    }
}

fn listen(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).with_context(|| format!("bind {addr}"))?;
    info!(%addr, "listening");

    let (stream, peer_addr) = listener.accept().context("accept")?;
    info!(%peer_addr, "transport connected");

    let vault = Vault::software();
    let reader = stream.try_clone().context("clone stream")?;
    let (mut reader, mut writer) = SecureChannel::new(vault)
        .accept(reader, stream)
        .context("channel accept")?;
    info!(peer = %reader.peer_public_key(), "channel established");

    let mut buf = [0u8; 1024];
    let n = reader.read(&mut buf).context("channel read")?;
    info!(
        received = %String::from_utf8_lossy(&buf[..n]),
        bytes = n,
        "greeting received"
    );

    writer.write(b"OK").context("channel write")?;
    info!("replied OK");
    Ok(())
}

fn connect(addr: &str) -> Result<()> {
    let stream = TcpStream::connect(addr).with_context(|| format!("connect {addr}"))?;
    info!(%addr, "transport connected");

    let vault = Vault::software();
    let reader = stream.try_clone().context("clone stream")?;
    let (mut reader, mut writer) = SecureChannel::new(vault)
        .connect(reader, stream)
        .context("channel connect")?;
    info!(peer = %reader.peer_public_key(), "channel established");

    writer.write(b"Hello Channel!").context("channel write")?;
    info!("sent greeting");

    let mut buf = [0u8; 1024];
    let n = reader.read(&mut buf).context("channel read")?;
    info!(
        received = %String::from_utf8_lossy(&buf[..n]),
        bytes = n,
        "reply received"
    );
    Ok(())
}
