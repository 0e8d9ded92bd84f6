/// Chat server — owns the listen socket and the shared collaborators.
use std::error::Error;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::history::History;
use super::registry::{Registry, SharedRegistry};
use super::session;

pub const DEFAULT_PORT: u16 = 12345;
pub const DEFAULT_HISTORY_PATH: &str = "chat_history.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub history_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            history_path: DEFAULT_HISTORY_PATH.into(),
        }
    }
}

/// A bound chat server. Registry and history are owned per instance, so
/// several servers can coexist in one process (tests bind port 0).
pub struct Server {
    listener: TcpListener,
    state: SharedRegistry,
    history: Arc<History>,
}

impl Server {
    /// Bind the listen socket and open the history file. Failing to bind
    /// is the only fatal startup error.
    pub async fn bind(config: Config) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind).await?;
        let history = Arc::new(History::open(config.history_path).await?);
        Ok(Self {
            listener,
            state: Arc::new(RwLock::new(Registry::new())),
            history,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listen socket is closed. Each accepted
    /// connection runs as its own task; a failed session never takes the
    /// listener or its peers down.
    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!("chat server listening on {}", self.listener.local_addr()?);

        loop {
            let (socket, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            info!(%addr, "new connection");
            let state = Arc::clone(&self.state);
            let history = Arc::clone(&self.history);
            tokio::spawn(async move {
                if let Err(e) = session::handle_client(socket, addr, state, history).await {
                    warn!(%addr, "client error: {e}");
                }
                info!(%addr, "disconnected");
            });
        }
    }
}
