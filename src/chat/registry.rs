/// Shared server state — the authoritative mapping of active names to
/// sessions.
///
/// One map carries both halves of the bookkeeping: its keys are the names
/// in use, its values the live client handles, so a name is registered
/// exactly while its session is. Fan-out only enqueues to each peer's
/// sink; the actual socket write happens on the peer's own task.
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use super::codec::Outbound;

/// Handle to send frames to a connected client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub name: String,
    pub tx: mpsc::UnboundedSender<Outbound>,
}

impl ClientHandle {
    /// Enqueue one line. A closed queue means the session is already
    /// shutting down; the frame is dropped.
    pub fn send_line(&self, line: &str) {
        let _ = self.tx.send(Outbound::Line(line.to_owned()));
    }

    /// Enqueue raw bytes (file-body relay).
    pub fn send_data(&self, bytes: Bytes) {
        let _ = self.tx.send(Outbound::Data(bytes));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("name is already in use")]
    NameInUse,
    #[error("name is empty or contains a line break")]
    InvalidName,
}

/// Registered clients, keyed by display name.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<String, ClientHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under its name. Rejection has no side effects.
    pub fn try_register(&mut self, handle: ClientHandle) -> Result<(), RegisterError> {
        if handle.name.is_empty() || handle.name.contains('\n') {
            return Err(RegisterError::InvalidName);
        }
        if self.clients.contains_key(&handle.name) {
            return Err(RegisterError::NameInUse);
        }
        self.clients.insert(handle.name.clone(), handle);
        Ok(())
    }

    /// Remove a client, freeing its name. Idempotent.
    pub fn unregister(&mut self, name: &str) -> Option<ClientHandle> {
        self.clients.remove(name)
    }

    pub fn find(&self, name: &str) -> Option<&ClientHandle> {
        self.clients.get(name)
    }

    /// Active names, lexicographic by code point.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// The `USERS:` presence payload.
    pub fn roster_line(&self) -> String {
        format!("USERS:{}", self.names().join(","))
    }

    /// Enqueue `line` to every active client, the sender included.
    pub fn broadcast(&self, line: &str) {
        for handle in self.clients.values() {
            handle.send_line(line);
        }
    }

    /// Enqueue `line` to every active client except `skip`.
    pub fn broadcast_except(&self, skip: &str, line: &str) {
        for handle in self.clients.values().filter(|h| h.name != skip) {
            handle.send_line(line);
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Shared, thread-safe registry.
pub type SharedRegistry = Arc<RwLock<Registry>>;
