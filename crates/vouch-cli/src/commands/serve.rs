use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use vouch_network::Network;
use vouch_server::AppState;
use vouch_store::BlockStore;

use crate::config::VouchConfig;

pub async fn handle(db: Option<PathBuf>, listen: Option<String>, config: &VouchConfig) -> Result<()> {
    let db_path = db.unwrap_or_else(|| PathBuf::from(&config.db_path));
    let listen = listen.unwrap_or_else(|| config.listen.clone());
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address: {listen}"))?;

    let store = BlockStore::open(&db_path)
        .with_context(|| format!("Failed to open block store at {}", db_path.display()))?;
    let network = Network::from_store_with_config(&store, config.ranking.clone())?;

    println!(
        "Serving {} agents ({} blocks) on http://{addr}",
        network.agent_count(),
        network.interactions().len()
    );
    let state = AppState::new(network, config.max_audit_hops);
    vouch_server::serve(addr, state).await?;
    Ok(())
}
