use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block::{HalfBlock, UNLINKED_SEQUENCE};
use crate::identity::PublicKey;

/// An agent's personal ledger: half-blocks kept sorted by sequence number.
///
/// The sort order is maintained on every insertion, so aggregate queries
/// and completeness checks never need to re-sort. A chain is also used as
/// a throwaway view over another identity's blocks when walking the
/// interaction graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<HalfBlock>", from = "Vec<HalfBlock>")]
pub struct Chain {
    transactions: Vec<HalfBlock>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from blocks in arbitrary order.
    pub fn from_blocks(blocks: impl IntoIterator<Item = HalfBlock>) -> Self {
        let mut chain = Self::new();
        for block in blocks {
            chain.add(block);
        }
        chain
    }

    /// Insert a block at its sorted position.
    ///
    /// Blocks with equal sequence numbers keep their arrival order.
    pub fn add(&mut self, block: HalfBlock) {
        let at = self
            .transactions
            .partition_point(|b| b.sequence_number <= block.sequence_number);
        self.transactions.insert(at, block);
    }

    pub fn get_blocks(&self) -> &[HalfBlock] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Counterparty identities in first-seen chain order, without duplicates.
    pub fn partner_agents(&self) -> Vec<PublicKey> {
        let mut partners = Vec::new();
        for block in &self.transactions {
            if !partners.contains(&block.link_public_key) {
                partners.push(block.link_public_key);
            }
        }
        partners
    }

    /// Whether the chain is an unbroken run of sequence numbers.
    ///
    /// Leading unlinked sentinels are skipped; the remainder must count up
    /// from zero without gaps. A chain of only sentinels is not complete,
    /// and neither is an empty one.
    pub fn is_complete(&self) -> bool {
        let mut start = 0;
        while start < self.transactions.len()
            && self.transactions[start].sequence_number == UNLINKED_SEQUENCE
        {
            start += 1;
        }
        if start == self.transactions.len() {
            return false;
        }
        self.transactions[start..]
            .iter()
            .enumerate()
            .all(|(i, block)| block.sequence_number == i as i64)
    }

    /// Total contribution the owner put in across all blocks.
    pub fn up(&self) -> u64 {
        self.transactions.iter().map(|b| b.contribution).sum()
    }

    /// Total contribution the owner received across all blocks.
    pub fn down(&self) -> i64 {
        self.transactions
            .iter()
            .map(|b| b.contribution as i64 - b.net_contribution)
            .sum()
    }

    /// Net balance of the owner: contributed minus received.
    pub fn net_contribution(&self) -> i64 {
        self.transactions.iter().map(|b| b.net_contribution).sum()
    }
}

impl From<Vec<HalfBlock>> for Chain {
    fn from(blocks: Vec<HalfBlock>) -> Self {
        Self::from_blocks(blocks)
    }
}

impl From<Chain> for Vec<HalfBlock> {
    fn from(chain: Chain) -> Self {
        chain.transactions
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.transactions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{block}")?;
        }
        Ok(())
    }
}
