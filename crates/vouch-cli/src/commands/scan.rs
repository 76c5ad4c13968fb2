use std::path::Path;

use anyhow::Result;
use vouch_network::Network;
use vouch_store::BlockStore;

pub async fn handle(db: &Path) -> Result<()> {
    let store = BlockStore::open(db)?;
    let network = Network::from_store(&store)?;
    let report = network.clean_data();

    println!("Scanned {} blocks across {} agents", report.blocks_scanned, network.agent_count());
    println!("  Complete chains:   {}", report.complete);
    println!("  Incomplete chains: {}", report.incomplete.len());
    for key in &report.incomplete {
        println!("    @{key}");
    }
    Ok(())
}
