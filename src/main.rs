use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use babble::chat::server::{Config, Server, DEFAULT_HISTORY_PATH, DEFAULT_PORT};

/// Multi-user line-oriented chat server.
#[derive(Parser, Debug)]
#[command(name = "babble", version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "BABBLE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "BABBLE_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Path of the append-only chat history file.
    #[arg(long, env = "BABBLE_HISTORY_PATH", default_value = DEFAULT_HISTORY_PATH)]
    history_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let server = Server::bind(Config {
        bind: SocketAddr::new(args.bind, args.port),
        history_path: args.history_path,
    })
    .await?;
    server.run().await
}
