use crate::constants::CHAIN_PATH;
use ledger_core::{ChainFetcher, FetchError, RemoteBlock};
use reqwest::{blocking::Client, StatusCode};
use std::time::Duration;

/// Fetches `GET {url}/api/chain` from peers.
///
/// Uses the blocking client: build, use and drop it off the async runtime
/// (inside `spawn_blocking`).
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ChainFetcher for HttpFetcher {
    fn fetch_chain(&self, url: &str) -> Result<Vec<RemoteBlock>, FetchError> {
        let endpoint = format!("{}{CHAIN_PATH}", url.trim_end_matches('/'));
        let res = self
            .client
            .get(&endpoint)
            .send()
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        if res.status() != StatusCode::OK {
            return Err(FetchError::Status(res.status().as_u16()));
        }
        res.json::<Vec<RemoteBlock>>()
            .map_err(|e| FetchError::Payload(e.to_string()))
    }
}
