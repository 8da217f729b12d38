use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub name: String,
    pub url: String,
}

/// Name to base-URL table. Iteration follows first registration order.
#[derive(Clone, Debug, Default)]
pub struct PeerRegistry {
    peers: Vec<Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a known name replaces its URL in place.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let (name, url) = (name.into(), url.into());
        if name.is_empty() || url.is_empty() {
            return Err(LedgerError::MissingPeerField);
        }
        info!(%name, %url, "registered peer");
        match self.peers.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.url = url,
            None => self.peers.push(Peer { name, url }),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.peers
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.url.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
