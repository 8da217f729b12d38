use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's chain
    Chain,
    /// Submit a transaction
    Submit {
        /// Sender
        #[arg(long)]
        sender: String,
        /// Recipient
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
    },
    /// Mine pending transactions into a block
    Mine,
    /// Register a peer node under a name
    RegisterPeer {
        #[arg(long)]
        name: String,
        /// Peer base URL
        #[arg(long)]
        url: String,
    },
    /// List registered peers
    Peers,
    /// Adopt the longest chain among registered peers
    Sync,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    let request = match cli.cmd {
        Command::Chain => client.get(format!("{node}/api/chain")),
        Command::Submit {
            sender,
            recipient,
            amount,
        } => client.post(format!("{node}/api/send")).json(&Tx {
            sender,
            recipient,
            amount,
        }),
        Command::Mine => client.post(format!("{node}/api/mine")),
        Command::RegisterPeer { name, url } => client
            .post(format!("{node}/api/register_peer"))
            .form(&[("name", name), ("url", url)]),
        Command::Peers => client.get(format!("{node}/api/peers")),
        Command::Sync => client.get(format!("{node}/api/sync_chains")),
    };

    let res = request.send().await?;
    let status = res.status();
    let body = res.text().await?;
    debug!(%status, "node replied");
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
