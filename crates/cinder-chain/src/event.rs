//! Chain mutation events.

use cinder_types::{Block, Transaction};

/// Describes the effect of one committed `append`.
///
/// Events are handed to observers synchronously, in the exact order their
/// appends were serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockAddedEvent {
    /// The block extends the canonical tip.
    HeadAdvanced { block: Block },

    /// The block landed on a side chain; the canonical head is unchanged.
    Fork { block: Block },

    /// The canonical chain switched to the branch ending in `new_head`.
    ChainReorg {
        new_head: Block,
        /// Transactions newly canonical, in ancestor-to-tip order.
        added_transactions: Vec<Transaction>,
        /// Demoted transactions, in the order they were walked back from
        /// the old tip. Transactions also present on the new branch are
        /// excluded.
        removed_transactions: Vec<Transaction>,
    },
}

impl BlockAddedEvent {
    /// The block whose append produced this event.
    pub fn block(&self) -> &Block {
        match self {
            BlockAddedEvent::HeadAdvanced { block } => block,
            BlockAddedEvent::Fork { block } => block,
            BlockAddedEvent::ChainReorg { new_head, .. } => new_head,
        }
    }

    /// Whether this event changed the canonical head.
    pub fn is_canonical_change(&self) -> bool {
        !matches!(self, BlockAddedEvent::Fork { .. })
    }
}
