use clap::Parser;
use ledger_node::{
    config::{Args, NodeConfig},
    router, AppState,
};
use std::net::SocketAddr;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = NodeConfig::from(&args);
    info!(
        difficulty = config.ledger.difficulty.zeros(),
        strategy = ?config.ledger.strategy,
        policy = ?config.ledger.policy,
        "starting ledger"
    );
    let app = router(AppState::new(config));

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
