//! Property-based tests using proptest.
//!
//! Random append sequences (fork trees rooted at genesis) are replayed
//! against the engine and checked against a simple in-memory model.

use crate::generators::*;
use crate::harness::*;
use cinder_types::{Hash, TotalDifficulty, TransactionLocation};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A fork tree as a pick sequence: each entry attaches a block to an
/// already-known parent with a difficulty and a small transaction load.
fn arb_tree() -> impl Strategy<Value = Vec<(prop::sample::Index, u64, usize)>> {
    prop::collection::vec((any::<prop::sample::Index>(), 1u64..=50, 0usize..3), 1..32)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn append_sequences_preserve_chain_invariants(picks in arb_tree()) {
        let g = genesis(5);
        let chain = memory_chain(g.clone());

        let mut blocks = vec![g.clone()];
        let mut difficulty_of: HashMap<Hash, TotalDifficulty> = HashMap::new();
        difficulty_of.insert(g.hash(), TotalDifficulty::from(5u64));

        // First-seen maximum total difficulty: (hash, number, td).
        let mut best = (g.hash(), 0u64, TotalDifficulty::from(5u64));
        let mut next_nonce = 0u64;

        for (i, (parent_index, difficulty, tx_count)) in picks.iter().enumerate() {
            let parent = blocks[parent_index.index(blocks.len())].clone();
            let transactions: Vec<_> = (0..*tx_count)
                .map(|_| {
                    next_nonce += 1;
                    tx(next_nonce)
                })
                .collect();
            let block = child_with_txs(&parent, *difficulty, &format!("b{i}"), transactions);
            chain.append(block.clone(), receipts_for(&block)).unwrap();

            let block_td =
                difficulty_of[&parent.hash()].clone() + TotalDifficulty::from(*difficulty);
            if block_td > best.2 {
                best = (block.hash(), block.number(), block_td.clone());
            }
            difficulty_of.insert(block.hash(), block_td);
            blocks.push(block);
        }

        // P2: the head carries the first-seen maximum total difficulty.
        prop_assert_eq!(chain.chain_head_hash(), best.0);
        prop_assert_eq!(chain.chain_head_number(), best.1);
        prop_assert_eq!(chain.chain_head().total_difficulty, best.2.clone());

        // P1: the number index traces an unbroken ancestry chain from
        // genesis to the head, and nothing above the head.
        let mut canonical = Vec::new();
        for number in 0..=best.1 {
            let hash = chain.hash_by_number(number).unwrap();
            prop_assert!(hash.is_some(), "missing canonical entry at height {}", number);
            canonical.push(hash.unwrap());
        }
        prop_assert_eq!(canonical[0], g.hash());
        prop_assert_eq!(*canonical.last().unwrap(), best.0);
        for number in 1..canonical.len() {
            let header = chain.header_by_hash(&canonical[number]).unwrap().unwrap();
            prop_assert_eq!(header.parent_hash, canonical[number - 1]);
        }
        for number in best.1 + 1..best.1 + 4 {
            prop_assert_eq!(chain.hash_by_number(number).unwrap(), None);
        }

        let canonical_set: HashSet<Hash> = canonical.iter().copied().collect();

        // P3: the transaction index covers exactly the canonical bodies.
        for block in &blocks {
            let is_canonical = canonical_set.contains(&block.hash());
            for (index, transaction) in block.transactions().iter().enumerate() {
                let location = chain.transaction_location(&transaction.hash()).unwrap();
                if is_canonical {
                    prop_assert_eq!(
                        location,
                        Some(TransactionLocation::new(block.hash(), index as u32))
                    );
                    prop_assert_eq!(
                        chain.transaction(&transaction.hash()).unwrap().as_ref(),
                        Some(transaction)
                    );
                } else if let Some(location) = location {
                    prop_assert!(canonical_set.contains(&location.block_hash));
                }
            }
        }

        // P4: no fork head is canonical, and none has a known child.
        let forks = chain.forks().unwrap();
        prop_assert!(forks.is_disjoint(&canonical_set));
        for block in blocks.iter().skip(1) {
            prop_assert!(!forks.contains(&block.parent_hash()));
        }

        // P5: re-appending a known block changes nothing and emits nothing.
        let observer = RecordingObserver::new();
        chain.subscribe(Arc::clone(&observer));
        let replay = blocks.last().unwrap().clone();
        chain.append(replay.clone(), receipts_for(&replay)).unwrap();
        prop_assert_eq!(chain.chain_head_hash(), best.0);
        prop_assert_eq!(chain.forks().unwrap(), forks);
        prop_assert!(observer.is_empty());
    }
}
