use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use ledger_core::{Difficulty, LedgerConfig};
use ledger_node::{config::NodeConfig, router, AppState};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn test_config() -> NodeConfig {
    NodeConfig {
        ledger: LedgerConfig {
            difficulty: Difficulty::new(2),
            ..LedgerConfig::default()
        },
        mine_timeout: Some(Duration::from_secs(30)),
        peer_timeout: Duration::from_secs(2),
    }
}

fn app() -> Router {
    router(AppState::new(test_config()))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Serve `app` on an ephemeral port and return a `url=` form value for it.
async fn serve(app: &Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = app.clone();
    tokio::spawn(async move { axum::serve(listener, server).await });
    format!("http%3A%2F%2F{}", addr.to_string().replace(':', "%3A"))
}

#[tokio::test]
async fn health_and_genesis_chain() {
    let app = app();
    let (status, body) = call(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let (status, chain) = call(&app, get("/api/chain")).await;
    assert_eq!(status, StatusCode::OK);
    let chain = chain.as_array().unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0]["index"], 0);
    assert_eq!(chain[0]["previous_hash"], "0");
    assert!(chain[0]["hash"].is_string());
    assert_eq!(chain[0]["transactions"], json!([]));
}

#[tokio::test]
async fn send_then_mine() {
    let app = app();
    let (status, idle) = call(&app, Request::post("/api/mine").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(idle["success"], false);
    assert_eq!(idle["message"], "No transactions to mine.");

    let tx = json!({ "sender": "A", "recipient": "B", "amount": 10 });
    let (status, body) = call(&app, post_json("/api/send", tx)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Transaction added." }));

    let (status, body) = call(&app, Request::post("/api/mine").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Block #1 mined!");
    assert_eq!(body["index"], 1);

    let (_, chain) = call(&app, get("/api/chain")).await;
    let chain = chain.as_array().unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[1]["previous_hash"], chain[0]["hash"]);
    assert!(chain[1]["hash"].as_str().unwrap().starts_with("00"));
    assert_eq!(
        chain[1]["transactions"],
        json!([{ "sender": "A", "recipient": "B", "amount": 10 }])
    );
}

#[tokio::test]
async fn malformed_transactions_are_rejected() {
    let state = AppState::new(test_config());
    let app = router(state.clone());
    for body in [
        json!({ "sender": "A", "amount": 10 }),
        json!({ "sender": "A", "recipient": "B", "amount": "lots" }),
    ] {
        let (status, reply) = call(&app, post_json("/api/send", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["success"], false);
    }
    let bad = Request::post("/api/send").body(Body::from("not json")).unwrap();
    let (status, _) = call(&app, bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(state.ledger().lock().await.pending().is_empty());
}

#[tokio::test]
async fn register_and_list_peers() {
    let app = app();
    let (status, reply) = call(&app, post_form("/api/register_peer", "name=x&url=http%3A%2F%2F127.0.0.1%3A8001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["message"], "Registered x at http://127.0.0.1:8001.");

    let (status, reply) = call(&app, post_form("/api/register_peer", "name=y")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["message"], "Missing name or URL.");

    let (_, peers) = call(&app, get("/api/peers")).await;
    assert_eq!(peers, json!([{ "name": "x", "url": "http://127.0.0.1:8001" }]));
}

#[tokio::test]
async fn sync_reports_unreachable_peer() {
    let app = app();
    call(&app, post_form("/api/register_peer", "name=ghost&url=http%3A%2F%2F127.0.0.1%3A1")).await;
    let (status, report) = call(&app, get("/api/sync_chains")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["ghost"]["status"], "error");
    assert!(report["ghost"]["error"].is_string());

    let (_, chain) = call(&app, get("/api/chain")).await;
    assert_eq!(chain.as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn node_adopts_longer_chain_over_http() {
    let x = app();
    for amount in [1, 2] {
        let tx = json!({ "sender": "X", "recipient": "Y", "amount": amount });
        call(&x, post_json("/api/send", tx)).await;
        let (_, mined) = call(&x, Request::post("/api/mine").body(Body::empty()).unwrap()).await;
        assert_eq!(mined["success"], true);
    }

    let url = serve(&x).await;

    let y = app();
    call(&y, post_form("/api/register_peer", &format!("name=x&url={url}"))).await;

    let (_, report) = call(&y, get("/api/sync_chains")).await;
    assert_eq!(report["x"], json!({ "status": "success", "length": 3 }));

    let (_, theirs) = call(&x, get("/api/chain")).await;
    let (_, ours) = call(&y, get("/api/chain")).await;
    let (theirs, ours) = (theirs.as_array().unwrap(), ours.as_array().unwrap());
    assert_eq!(ours.len(), 3);
    for (a, b) in ours.iter().zip(theirs) {
        assert_eq!(a["index"], b["index"]);
        assert_eq!(a["transactions"], b["transactions"]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn node_can_sync_against_itself() {
    let node = app();
    let url = serve(&node).await;
    call(&node, post_form("/api/register_peer", &format!("name=me&url={url}"))).await;

    let (status, report) = tokio::time::timeout(Duration::from_secs(10), call(&node, get("/api/sync_chains")))
        .await
        .expect("self sync stalled");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["me"], json!({ "status": "success", "length": 1 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mutually_registered_nodes_sync_concurrently() {
    let (a, b) = (app(), app());
    let (a_url, b_url) = (serve(&a).await, serve(&b).await);
    call(&a, post_form("/api/register_peer", &format!("name=b&url={b_url}"))).await;
    call(&b, post_form("/api/register_peer", &format!("name=a&url={a_url}"))).await;

    let both = async { tokio::join!(call(&a, get("/api/sync_chains")), call(&b, get("/api/sync_chains"))) };
    let ((a_status, a_report), (b_status, b_report)) = tokio::time::timeout(Duration::from_secs(10), both)
        .await
        .expect("mutual sync stalled");
    assert_eq!(a_status, StatusCode::OK);
    assert_eq!(b_status, StatusCode::OK);
    assert_eq!(a_report["b"], json!({ "status": "success", "length": 1 }));
    assert_eq!(b_report["a"], json!({ "status": "success", "length": 1 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn chain_stays_readable_while_mining() {
    let config = NodeConfig {
        ledger: LedgerConfig {
            difficulty: Difficulty::new(5),
            ..LedgerConfig::default()
        },
        mine_timeout: Some(Duration::from_secs(3)),
        ..test_config()
    };
    let app = router(AppState::new(config));
    let tx = json!({ "sender": "A", "recipient": "B", "amount": 1 });
    call(&app, post_json("/api/send", tx)).await;

    let miner = app.clone();
    let mining = tokio::spawn(async move {
        call(&miner, Request::post("/api/mine").body(Body::empty()).unwrap()).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Readers wait on the ledger lock without pinning a runtime worker, so a
    // health check still answers while both the miner and a reader are parked.
    let reader = tokio::spawn({
        let app = app.clone();
        async move { call(&app, get("/api/chain")).await }
    });
    let health = tokio::spawn({
        let app = app.clone();
        async move { call(&app, get("/health")).await }
    });
    let (status, _) = tokio::time::timeout(Duration::from_secs(1), health)
        .await
        .expect("runtime starved during mining")
        .unwrap();
    assert_eq!(status, StatusCode::OK);

    mining.await.unwrap();
    let (status, chain) = reader.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(!chain.as_array().unwrap().is_empty());
}
