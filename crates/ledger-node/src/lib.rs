//! HTTP request layer over a single [`Ledger`] instance.
pub mod config;
mod constants;
pub mod error;
pub mod fetch;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Form, Json, Router,
};
use config::NodeConfig;
use error::ApiError;
use fetch::HttpFetcher;
use ledger_core::{
    fetch_peer_chains, merge_fetched, BlockRecord, Ledger, MineOutcome, Peer, PeerRegistry,
    SyncReport, TransactionRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Every ledger operation runs under the one `ledger` lock. Peer chains are
/// fetched before it is taken, so a node may sync against itself or a peer
/// that is syncing back.
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Mutex<Ledger>>,
    peers: Arc<Mutex<PeerRegistry>>,
    config: NodeConfig,
}

impl AppState {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(config.ledger))),
            peers: Arc::new(Mutex::new(PeerRegistry::new())),
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<Mutex<Ledger>> {
        &self.ledger
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
}

impl ApiMessage {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            index: None,
        }
    }

    fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            index: None,
        }
    }
}

#[derive(Deserialize)]
struct PeerForm {
    name: Option<String>,
    url: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/api/chain", get(get_chain))
        .route("/api/send", post(send_transaction))
        .route("/api/mine", post(mine_block))
        .route("/api/register_peer", post(register_peer))
        .route("/api/peers", get(list_peers))
        .route("/api/sync_chains", get(sync_chains))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_chain(State(state): State<AppState>) -> Result<Json<Vec<BlockRecord>>, ApiError> {
    Ok(Json(state.ledger.lock().await.get_chain()))
}

async fn send_transaction(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiMessage>, ApiError> {
    let request: TransactionRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let tx = request.into_transaction()?;
    state.ledger.lock().await.add_new_transaction(tx);
    Ok(Json(ApiMessage::ok("Transaction added.")))
}

async fn mine_block(State(state): State<AppState>) -> Result<Json<ApiMessage>, ApiError> {
    let limits = state.config.mining_limits();
    let ledger = state.ledger.clone();
    let outcome =
        tokio::task::spawn_blocking(move || ledger.blocking_lock().mine_with(&limits)).await??;

    let reply = match outcome {
        MineOutcome::Mined { index, .. } => ApiMessage {
            index: Some(index),
            ..ApiMessage::ok(format!("Block #{index} mined!"))
        },
        MineOutcome::NothingToMine => ApiMessage::declined("No transactions to mine."),
        MineOutcome::Rejected => ApiMessage::declined("Mined block no longer extends the chain."),
    };
    Ok(Json(reply))
}

async fn register_peer(
    State(state): State<AppState>,
    Form(form): Form<PeerForm>,
) -> Result<Json<ApiMessage>, ApiError> {
    let name = form.name.unwrap_or_default();
    let url = form.url.unwrap_or_default();
    state
        .peers
        .lock()
        .await
        .register(name.clone(), url.clone())?;
    Ok(Json(ApiMessage::ok(format!("Registered {name} at {url}."))))
}

async fn list_peers(State(state): State<AppState>) -> Result<Json<Vec<Peer>>, ApiError> {
    let peers = state.peers.lock().await;
    Ok(Json(peers.iter().cloned().collect()))
}

async fn sync_chains(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    let peers = state.peers.lock().await.clone();
    let timeout = state.config.peer_timeout;
    let fetched = tokio::task::spawn_blocking(move || {
        let fetcher = HttpFetcher::new(timeout).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok::<_, ApiError>(fetch_peer_chains(&peers, &fetcher))
    })
    .await??;
    let report = merge_fetched(&mut *state.ledger.lock().await, fetched);
    info!(peers = report.len(), "sync round finished");
    Ok(Json(report))
}
