use std::path::Path;

use anyhow::{Context, Result, bail};
use vouch_network::{AgentLookup, Network};
use vouch_store::BlockStore;
use vouch_types::{PublicKey, VouchError};

use crate::ExperimentAction;
use crate::config::VouchConfig;

pub async fn handle(action: ExperimentAction, config: &VouchConfig) -> Result<()> {
    match action {
        ExperimentAction::AuditGrowth { db, agent, rounds } => {
            audit_growth(&db, &agent, rounds, config)
        }
        ExperimentAction::DataCoverage { db, hops } => data_coverage(&db, hops, config),
    }
}

/// Repeat `pairwise_audit` from one agent and watch its knowledge grow.
fn audit_growth(db: &Path, agent: &str, rounds: usize, config: &VouchConfig) -> Result<()> {
    let store = BlockStore::open(db)?;
    let mut network = Network::from_store_with_config(&store, config.ranking.clone())?;
    let initiator = resolve(&network, agent)?;
    let total = network.interactions().len();

    println!(
        "Audit growth for @{initiator}: {} agents, {total} blocks",
        network.agent_count()
    );
    println!("  round  audited   blocks");
    for round in 1..=rounds {
        match network.pairwise_audit(&initiator, None, config.max_audit_hops) {
            Ok(audited) => {
                let me = network
                    .get_agent(&initiator)
                    .context("Agent not found after audit")?;
                println!("  {round:>5}  @{audited}  {:>6}", me.interactions().len());
            }
            Err(VouchError::NoAuditPartner { .. }) => {
                println!(
                    "  no unaudited partner within {} hops after {} rounds",
                    config.max_audit_hops,
                    round - 1
                );
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Knowledge coverage across all agents, before and after chain pulls.
fn data_coverage(db: &Path, hops: usize, config: &VouchConfig) -> Result<()> {
    let store = BlockStore::open(db)?;
    let mut network = Network::from_store_with_config(&store, config.ranking.clone())?;

    println!(
        "{} agents, {} blocks",
        network.agent_count(),
        network.interactions().len()
    );
    println!("  coverage before:       {:.3}", average_coverage(&network));
    network.increase_data_to_hops(hops)?;
    println!(
        "  coverage after {hops} hops: {:.3}",
        average_coverage(&network)
    );
    Ok(())
}

/// Mean fraction of all identities each agent has seen.
fn average_coverage(network: &Network) -> f64 {
    let total = network.agent_count();
    if total == 0 {
        return 0.0;
    }
    let sum: f64 = network
        .agents()
        .map(|agent| agent.known_agents().len() as f64 / total as f64)
        .sum();
    sum / total as f64
}

fn resolve(network: &Network, query: &str) -> Result<PublicKey> {
    match network.find_agent(query) {
        AgentLookup::Found(agent) => Ok(agent.public_key()),
        AgentLookup::NotFound => bail!("No agent matches: {query}"),
        AgentLookup::Ambiguous(candidates) => Err(VouchError::AmbiguousIdentifier {
            query: query.to_string(),
            matches: candidates.len(),
        }
        .into()),
    }
}
