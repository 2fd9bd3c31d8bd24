//! The mutable blockchain index.
//!
//! `Blockchain` accepts already-validated blocks, persists them, and keeps
//! the canonical chain pointed at the tip of greatest total difficulty.
//! Every append is one atomic batch: hash-keyed rows for the new block plus
//! whatever canonical-index surgery the append implies (advance, fork
//! bookkeeping, or a full reorganization walk).

use crate::metrics::{MetricsSystem, CHAIN_HEIGHT_GAUGE, TOTAL_DIFFICULTY_GAUGE};
use crate::observers::{BlockAddedObserver, Subscribers, SubscriptionId};
use crate::store::{ChainStorage, Updater};
use crate::{BlockAddedEvent, ChainError, ChainResult};
use cinder_storage::Storage;
use cinder_types::{
    Block, BlockBody, BlockHeader, ChainHead, Hash, TotalDifficulty, Transaction,
    TransactionLocation, TransactionReceipt,
};
use num_traits::ToPrimitive;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cached canonical tip, updated only after a committed batch.
#[derive(Debug, Clone)]
struct HeadInfo {
    hash: Hash,
    number: u64,
    total_difficulty: TotalDifficulty,
}

/// How an append changed the canonical chain.
enum Outcome {
    Advanced,
    Forked,
    Reorged {
        added: Vec<Transaction>,
        removed: Vec<Transaction>,
    },
}

/// The mutable blockchain index.
///
/// Shared by concurrent readers and a single logical writer: `append` and
/// genesis installation are serialized under an engine-wide mutex, while
/// reads go to the backend (or the cached head) without taking it.
pub struct Blockchain {
    storage: ChainStorage,
    head: Arc<RwLock<HeadInfo>>,
    observers: Subscribers,
    write_lock: Mutex<()>,
}

impl Blockchain {
    /// Install or verify the genesis block, then open the index.
    ///
    /// On an empty store the genesis block is written and becomes the chain
    /// head. On an initialized store the supplied genesis must match the
    /// stored one (`InvalidGenesis` otherwise); a store with a head but no
    /// genesis index entry is reported as `DataCorruption`.
    pub fn new(
        genesis: Block,
        storage: Arc<dyn Storage>,
        metrics: &dyn MetricsSystem,
    ) -> ChainResult<Self> {
        if !genesis.header.is_genesis() {
            return Err(ChainError::InvalidGenesis(format!(
                "genesis block number must be {}, got {}",
                BlockHeader::GENESIS_NUMBER,
                genesis.header.number
            )));
        }

        let storage = ChainStorage::new(storage);
        let genesis_hash = genesis.hash();

        let head = match storage.chain_head()? {
            None => Self::install_genesis(&storage, &genesis, genesis_hash)?,
            Some(head_hash) => Self::load_head(&storage, genesis_hash, head_hash)?,
        };

        let head = Arc::new(RwLock::new(head));
        Self::register_gauges(metrics, &head);

        Ok(Self {
            storage,
            head,
            observers: Subscribers::new(),
            write_lock: Mutex::new(()),
        })
    }

    fn install_genesis(
        storage: &ChainStorage,
        genesis: &Block,
        genesis_hash: Hash,
    ) -> ChainResult<HeadInfo> {
        let td = genesis.header.difficulty.clone();

        let mut updater = storage.updater();
        updater.put_header(&genesis_hash, &genesis.header);
        updater.put_body(&genesis_hash, &genesis.body);
        updater.put_receipts(&genesis_hash, &[]);
        updater.put_total_difficulty(&genesis_hash, &td);
        updater.put_block_hash(genesis.header.number, &genesis_hash);
        updater.set_chain_head(&genesis_hash);
        updater.commit()?;

        info!(hash = %genesis_hash, "Installed genesis block");
        Ok(HeadInfo {
            hash: genesis_hash,
            number: genesis.header.number,
            total_difficulty: td,
        })
    }

    fn load_head(
        storage: &ChainStorage,
        genesis_hash: Hash,
        head_hash: Hash,
    ) -> ChainResult<HeadInfo> {
        let stored_genesis = storage
            .block_hash(BlockHeader::GENESIS_NUMBER)?
            .ok_or_else(|| {
                ChainError::DataCorruption(
                    "initialized store is missing its genesis index entry".into(),
                )
            })?;
        if stored_genesis != genesis_hash {
            return Err(ChainError::InvalidGenesis(format!(
                "supplied genesis block {genesis_hash} does not match stored genesis \
                 {stored_genesis}; point the node at the data directory initialized with \
                 this genesis, or supply the original genesis block"
            )));
        }

        let header = storage.header(&head_hash)?.ok_or_else(|| {
            ChainError::DataCorruption(format!("missing header for chain head {head_hash}"))
        })?;
        let td = storage.total_difficulty(&head_hash)?.ok_or_else(|| {
            ChainError::DataCorruption(format!(
                "missing total difficulty for chain head {head_hash}"
            ))
        })?;

        debug!(number = header.number, hash = %head_hash, "Loaded chain head");
        Ok(HeadInfo {
            hash: head_hash,
            number: header.number,
            total_difficulty: td,
        })
    }

    fn register_gauges(metrics: &dyn MetricsSystem, head: &Arc<RwLock<HeadInfo>>) {
        let height = Arc::clone(head);
        metrics.register_gauge(
            CHAIN_HEIGHT_GAUGE,
            "Height of the chain head",
            Box::new(move || height.read().number as f64),
        );
        let difficulty = Arc::clone(head);
        metrics.register_gauge(
            TOTAL_DIFFICULTY_GAUGE,
            "Total difficulty of the chain head",
            Box::new(move || {
                difficulty
                    .read()
                    .total_difficulty
                    .to_f64()
                    .unwrap_or(f64::INFINITY)
            }),
        );
    }

    /// The canonical tip with its total difficulty.
    pub fn chain_head(&self) -> ChainHead {
        let head = self.head.read();
        ChainHead::new(head.hash, head.total_difficulty.clone())
    }

    /// Hash of the canonical tip.
    pub fn chain_head_hash(&self) -> Hash {
        self.head.read().hash
    }

    /// Height of the canonical tip.
    pub fn chain_head_number(&self) -> u64 {
        self.head.read().number
    }

    /// Header at a canonical height.
    pub fn header_by_number(&self, number: u64) -> ChainResult<Option<BlockHeader>> {
        match self.storage.block_hash(number)? {
            Some(hash) => self.storage.header(&hash),
            None => Ok(None),
        }
    }

    /// Header of any known block, canonical or fork.
    pub fn header_by_hash(&self, hash: &Hash) -> ChainResult<Option<BlockHeader>> {
        self.storage.header(hash)
    }

    /// Body of any known block.
    pub fn body(&self, hash: &Hash) -> ChainResult<Option<BlockBody>> {
        self.storage.body(hash)
    }

    /// Receipt bundle of any known block.
    pub fn receipts(&self, hash: &Hash) -> ChainResult<Option<Vec<TransactionReceipt>>> {
        self.storage.receipts(hash)
    }

    /// Canonical hash at a height.
    pub fn hash_by_number(&self, number: u64) -> ChainResult<Option<Hash>> {
        self.storage.block_hash(number)
    }

    /// Total difficulty of any known block.
    pub fn total_difficulty(&self, hash: &Hash) -> ChainResult<Option<TotalDifficulty>> {
        self.storage.total_difficulty(hash)
    }

    /// Look up a canonical transaction by hash.
    ///
    /// Only transactions on the canonical chain are findable; the location
    /// index does not cover side chains.
    pub fn transaction(&self, tx_hash: &Hash) -> ChainResult<Option<Transaction>> {
        let Some(location) = self.storage.tx_location(tx_hash)? else {
            return Ok(None);
        };
        let Some(body) = self.storage.body(&location.block_hash)? else {
            return Ok(None);
        };
        Ok(body.transactions.into_iter().nth(location.index as usize))
    }

    /// Location of a canonical transaction.
    pub fn transaction_location(&self, tx_hash: &Hash) -> ChainResult<Option<TransactionLocation>> {
        self.storage.tx_location(tx_hash)
    }

    /// Snapshot of the tracked fork heads.
    pub fn forks(&self) -> ChainResult<HashSet<Hash>> {
        self.storage.fork_heads()
    }

    /// Register an observer; returns the id to unsubscribe with.
    pub fn subscribe(&self, observer: Arc<dyn BlockAddedObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    /// Remove an observer. Returns whether an entry was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.count()
    }

    /// Append a validated block with its execution receipts.
    ///
    /// Re-appending a known block is a silent no-op. A block whose parent
    /// header is unknown is rejected with `DisconnectedBlock` and leaves no
    /// trace. On success exactly one event is delivered to every observer
    /// before this returns.
    pub fn append(&self, block: Block, receipts: Vec<TransactionReceipt>) -> ChainResult<()> {
        let _guard = self.write_lock.lock();

        let tx_count = block.body.transactions.len();
        if receipts.len() != tx_count {
            return Err(ChainError::ReceiptCountMismatch {
                expected: tx_count,
                actual: receipts.len(),
            });
        }

        let hash = block.hash();
        if self.storage.header(&hash)?.is_some() {
            debug!(number = block.header.number, %hash, "Block already tracked, skipping");
            return Ok(());
        }

        let parent_hash = block.header.parent_hash;
        if self.storage.header(&parent_hash)?.is_none() {
            return Err(ChainError::DisconnectedBlock(parent_hash));
        }
        let parent_td = self
            .storage
            .total_difficulty(&parent_hash)?
            .ok_or_else(|| {
                ChainError::DataCorruption(format!(
                    "missing total difficulty for parent {parent_hash}"
                ))
            })?;
        let td = parent_td + &block.header.difficulty;

        let mut updater = self.storage.updater();
        updater.put_header(&hash, &block.header);
        updater.put_body(&hash, &block.body);
        updater.put_receipts(&hash, &receipts);
        updater.put_total_difficulty(&hash, &td);

        let head = self.head.read().clone();
        let (outcome, new_head) =
            match self.update_canonical_chain(&mut updater, &block, hash, &td, &head) {
                Ok(result) => result,
                Err(err) => {
                    updater.rollback();
                    return Err(err);
                }
            };
        updater.commit()?;

        if let Some(info) = new_head {
            *self.head.write() = info;
        }

        let event = match outcome {
            Outcome::Advanced => BlockAddedEvent::HeadAdvanced { block },
            Outcome::Forked => BlockAddedEvent::Fork { block },
            Outcome::Reorged { added, removed } => BlockAddedEvent::ChainReorg {
                new_head: block,
                added_transactions: added,
                removed_transactions: removed,
            },
        };
        self.observers.notify(&event, self);
        Ok(())
    }

    /// Decide among advance, reorg and fork, and buffer the canonical-index
    /// updates for the chosen case.
    fn update_canonical_chain(
        &self,
        updater: &mut Updater<'_>,
        block: &Block,
        hash: Hash,
        td: &TotalDifficulty,
        head: &HeadInfo,
    ) -> ChainResult<(Outcome, Option<HeadInfo>)> {
        if block.header.parent_hash == head.hash {
            updater.put_block_hash(block.header.number, &hash);
            updater.set_chain_head(&hash);
            index_transactions(updater, hash, &block.body.transactions);
            info!(
                number = block.header.number,
                %hash,
                total_difficulty = %td,
                "Chain head advanced"
            );
            let info = HeadInfo {
                hash,
                number: block.header.number,
                total_difficulty: td.clone(),
            };
            Ok((Outcome::Advanced, Some(info)))
        } else if *td > head.total_difficulty {
            self.handle_reorg(updater, block, hash, td, head)
        } else {
            // Equal total difficulty stays with the incumbent.
            self.handle_fork(updater, block, hash)
        }
    }

    fn handle_fork(
        &self,
        updater: &mut Updater<'_>,
        block: &Block,
        hash: Hash,
    ) -> ChainResult<(Outcome, Option<HeadInfo>)> {
        let mut fork_heads = self.storage.fork_heads()?;
        // A block extending a tracked fork replaces its parent as the head
        // of that fork.
        fork_heads.remove(&block.header.parent_hash);
        fork_heads.insert(hash);
        updater.set_fork_heads(&fork_heads);

        debug!(number = block.header.number, %hash, "Block added on side chain");
        Ok((Outcome::Forked, None))
    }

    /// Rewrite the canonical indices for a switch to the branch ending in
    /// `block`.
    ///
    /// Walks the new and old branches back to their common ancestor in three
    /// phases, keyed by height. After commit the number index agrees with
    /// the new canonical chain exactly on `[0, block.number]` and has no
    /// entries above it.
    fn handle_reorg(
        &self,
        updater: &mut Updater<'_>,
        block: &Block,
        new_head_hash: Hash,
        td: &TotalDifficulty,
        old_head: &HeadInfo,
    ) -> ChainResult<(Outcome, Option<HeadInfo>)> {
        updater.set_chain_head(&new_head_hash);

        let mut old_chain = self.expect_header(&old_head.hash)?;
        let mut new_chain = block.header.clone();

        // New-branch blocks collected tip-down, reversed later for
        // canonical order.
        let mut added: Vec<(Hash, Vec<Transaction>)> = Vec::new();
        let mut removed: Vec<Transaction> = Vec::new();

        // Phase A: bring the new branch down to the old head's height,
        // indexing it along the way.
        while new_chain.number > old_chain.number {
            let block_hash = new_chain.hash();
            updater.put_block_hash(new_chain.number, &block_hash);
            added.push((
                block_hash,
                self.branch_transactions(&block_hash, block, new_head_hash)?,
            ));
            new_chain = self.expect_header(&new_chain.parent_hash)?;
        }

        // Phase B: unindex old-chain heights above the new head.
        while old_chain.number > new_chain.number {
            let block_hash = old_chain.hash();
            updater.remove_block_hash(old_chain.number);
            removed.extend(self.expect_transactions(&block_hash)?);
            old_chain = self.expect_header(&old_chain.parent_hash)?;
        }

        // Phase C: walk both branches in lockstep to the common ancestor.
        while old_chain.hash() != new_chain.hash() {
            let new_hash = new_chain.hash();
            updater.put_block_hash(new_chain.number, &new_hash);
            added.push((
                new_hash,
                self.branch_transactions(&new_hash, block, new_head_hash)?,
            ));
            removed.extend(self.expect_transactions(&old_chain.hash())?);

            new_chain = self.expect_header(&new_chain.parent_hash)?;
            old_chain = self.expect_header(&old_chain.parent_hash)?;
        }

        added.reverse();

        // Re-index the new branch, then drop re-added transactions from the
        // removal set: a transaction reappearing on the new canonical chain
        // keeps its location.
        let mut readded: HashSet<Hash> = HashSet::new();
        for (block_hash, transactions) in &added {
            index_transactions(updater, *block_hash, transactions);
            readded.extend(transactions.iter().map(|tx| tx.hash()));
        }
        removed.retain(|tx| !readded.contains(&tx.hash()));
        for tx in &removed {
            updater.remove_tx_location(&tx.hash());
        }

        // The demoted head becomes a fork; the promoted branch's parent
        // stops being one.
        let mut fork_heads = self.storage.fork_heads()?;
        fork_heads.insert(old_head.hash);
        fork_heads.remove(&block.header.parent_hash);
        updater.set_fork_heads(&fork_heads);

        warn!(
            old_head = %old_head.hash,
            new_head = %new_head_hash,
            number = block.header.number,
            common_ancestor = %new_chain.hash(),
            "Chain reorganization"
        );

        let added: Vec<Transaction> = added
            .into_iter()
            .flat_map(|(_, transactions)| transactions)
            .collect();
        let info = HeadInfo {
            hash: new_head_hash,
            number: block.header.number,
            total_difficulty: td.clone(),
        };
        Ok((Outcome::Reorged { added, removed }, Some(info)))
    }

    fn expect_header(&self, hash: &Hash) -> ChainResult<BlockHeader> {
        self.storage.header(hash)?.ok_or_else(|| {
            ChainError::DataCorruption(format!("missing header for block {hash}"))
        })
    }

    fn expect_transactions(&self, hash: &Hash) -> ChainResult<Vec<Transaction>> {
        self.storage
            .body(hash)?
            .map(|body| body.transactions)
            .ok_or_else(|| ChainError::DataCorruption(format!("missing body for block {hash}")))
    }

    /// Transactions of a block on the new canonical branch. The appended
    /// block's body is not yet committed, so it is served from memory.
    fn branch_transactions(
        &self,
        hash: &Hash,
        appended: &Block,
        appended_hash: Hash,
    ) -> ChainResult<Vec<Transaction>> {
        if *hash == appended_hash {
            Ok(appended.body.transactions.clone())
        } else {
            self.expect_transactions(hash)
        }
    }
}

fn index_transactions(updater: &mut Updater<'_>, block_hash: Hash, transactions: &[Transaction]) {
    for (index, tx) in transactions.iter().enumerate() {
        let location = TransactionLocation::new(block_hash, index as u32);
        updater.put_tx_location(&tx.hash(), &location);
    }
}
