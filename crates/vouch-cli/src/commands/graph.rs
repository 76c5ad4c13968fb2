use std::path::Path;

use anyhow::{Context, Result};
use petgraph::dot::Dot;
use vouch_network::Network;
use vouch_store::BlockStore;

pub async fn handle(db: &Path, out: &Path) -> Result<()> {
    let store = BlockStore::open(db)?;
    let network = Network::from_store(&store)?;
    let graph = network.interaction_graph();

    let dot = format!("{}", Dot::new(&graph));
    std::fs::write(out, dot)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!(
        "Wrote {} nodes, {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        out.display()
    );
    Ok(())
}
