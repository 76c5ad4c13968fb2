use std::path::Path;

use anyhow::Result;
use vouch_store::BlockStore;

pub async fn handle(db: &Path) -> Result<()> {
    let store = BlockStore::open(db)?;
    let stats = store.stats()?;

    println!("Block store: {}", db.display());
    println!("  Blocks:      {}", stats.block_count);
    println!("  Identities:  {}", stats.unique_keys);
    if let Some(earliest) = stats.earliest {
        println!("  Earliest:    {earliest}");
    }
    if let Some(latest) = stats.latest {
        println!("  Latest:      {latest}");
    }
    Ok(())
}
