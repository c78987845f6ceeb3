//! The pool of random primers.
//! Every sequence of length `primer_length` over the alphabet is a distinct primer,
//! and each of them starts with the same number of copies.
//! The trie is fixed after construction. Only the leaf counts change,
//! and they are guarded by a single lock together with the running total.
use std::sync::{Mutex, PoisonError};

const NOT_A_BASE: u8 = u8::MAX;

#[derive(Debug, Clone)]
struct PrimerNode {
    /// Children in the order of the alphabet.
    /// On the last level, these are indices of leaf counts instead of nodes.
    children: Vec<usize>,
}

#[derive(Debug, Clone)]
struct PrimerCounts {
    leaves: Vec<u32>,
    remaining: u64,
}

#[derive(Debug)]
pub struct PrimerPool {
    primer_length: usize,
    base_index: [u8; 256],
    nodes: Vec<PrimerNode>,
    initial: u64,
    counts: Mutex<PrimerCounts>,
}

impl PrimerPool {
    /// Enumerate all the primers and give each of them `per_primer` copies.
    pub fn new(alphabet: &[u8], primer_length: usize, per_primer: u32) -> Self {
        assert!(!alphabet.is_empty() && alphabet.len() < NOT_A_BASE as usize);
        assert!(0 < primer_length);
        let mut base_index = [NOT_A_BASE; 256];
        for (i, &b) in alphabet.iter().enumerate() {
            base_index[b as usize] = i as u8;
        }
        let size = alphabet.len();
        // Internal nodes, level by level. The root is the 0-th node.
        let mut nodes = vec![];
        let mut level_width = 1;
        let mut level_start = 0;
        for depth in 0..primer_length {
            let next_start = level_start + level_width;
            for i in 0..level_width {
                let children = if depth + 1 < primer_length {
                    (0..size).map(|c| next_start + i * size + c).collect()
                } else {
                    (0..size).map(|c| i * size + c).collect()
                };
                nodes.push(PrimerNode { children });
            }
            level_start = next_start;
            level_width *= size;
        }
        let num_of_leaves = level_width;
        let initial = num_of_leaves as u64 * per_primer as u64;
        debug!("PRIMERPOOL\t{}\t{}\t{}", nodes.len(), num_of_leaves, initial);
        let counts = PrimerCounts {
            leaves: vec![per_primer; num_of_leaves],
            remaining: initial,
        };
        Self {
            primer_length,
            base_index,
            nodes,
            initial,
            counts: Mutex::new(counts),
        }
    }
    /// The number of distinct primers.
    pub fn distinct(&self) -> usize {
        self.counts_guard().leaves.len()
    }
    /// The number of primers at construction.
    pub fn initial(&self) -> u64 {
        self.initial
    }
    /// The number of primers not consumed yet.
    pub fn remaining(&self) -> u64 {
        self.counts_guard().remaining
    }
    /// The remaining copies of `primer`. None if it is not a primer.
    pub fn remaining_of(&self, primer: &[u8]) -> Option<u32> {
        let leaf = self.leaf(primer)?;
        Some(self.counts_guard().leaves[leaf])
    }
    /// Consume one copy of the primer at the head of `site`, if any copy is left.
    /// A site with a base outside of the alphabet never binds.
    pub fn try_consume(&self, site: &[u8]) -> bool {
        let leaf = match self.leaf(site) {
            Some(leaf) => leaf,
            None => return false,
        };
        let mut counts = self.counts_guard();
        if 0 < counts.leaves[leaf] {
            counts.leaves[leaf] -= 1;
            counts.remaining -= 1;
            true
        } else {
            false
        }
    }
    fn leaf(&self, site: &[u8]) -> Option<usize> {
        if site.len() < self.primer_length {
            return None;
        }
        let mut node = 0;
        for (depth, &base) in site.iter().take(self.primer_length).enumerate() {
            let index = self.base_index[base as usize];
            if index == NOT_A_BASE {
                return None;
            }
            let child = self.nodes[node].children[index as usize];
            if depth + 1 == self.primer_length {
                return Some(child);
            }
            node = child;
        }
        None
    }
    fn counts_guard(&self) -> std::sync::MutexGuard<'_, PrimerCounts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
