//! A pool where the workers deposit the amplicons of a round.
//! Each worker fills its own [Batch] without any synchronization,
//! and splices it into the pool at once when it finishes its task.
//! After all the workers finished, the pool is flattened by [AmpliconPool::into_amplicons]
//! in the order of the batch ids, and appended to the stable vector of the orchestrator.
//! Indices never change afterwards.
use definitions::Amplicon;
use std::collections::LinkedList;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Amplicons produced by one task.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    id: usize,
    amplicons: Vec<Amplicon>,
}

impl Batch {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            amplicons: vec![],
        }
    }
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn push(&mut self, amplicon: Amplicon) {
        self.amplicons.push(amplicon);
    }
    pub fn len(&self) -> usize {
        self.amplicons.len()
    }
    pub fn is_empty(&self) -> bool {
        self.amplicons.is_empty()
    }
}

impl std::iter::Extend<Amplicon> for Batch {
    fn extend<I: IntoIterator<Item = Amplicon>>(&mut self, iter: I) {
        self.amplicons.extend(iter);
    }
}

#[derive(Debug, Default)]
pub struct AmpliconPool {
    batches: Mutex<LinkedList<Batch>>,
    count: AtomicUsize,
}

impl AmpliconPool {
    pub fn new() -> Self {
        Self::default()
    }
    /// Splice a batch into the pool. The lock is held only for the splice.
    pub fn merge(&self, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        let len = batch.len();
        let mut node = LinkedList::new();
        node.push_back(batch);
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.append(&mut node);
        self.count.fetch_add(len, Ordering::SeqCst);
    }
    /// The number of the amplicons merged so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
    pub fn into_amplicons(self) -> Vec<Amplicon> {
        let count = self.count.into_inner();
        let batches = self.batches.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut batches: Vec<_> = batches.into_iter().collect();
        batches.sort_by_key(|batch| batch.id);
        let mut amplicons = Vec::with_capacity(count);
        for batch in batches {
            amplicons.extend(batch.amplicons);
        }
        amplicons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use definitions::ErrorList;
    use rayon::prelude::*;
    fn dummy(template: usize) -> Amplicon {
        Amplicon::new(true, template, ErrorList::empty(4), 0, 10, 5)
    }
    #[test]
    fn merge() {
        let pool = AmpliconPool::new();
        assert!(pool.is_empty());
        pool.merge(Batch::new(0));
        assert!(pool.is_empty());
        let mut batch = Batch::new(1);
        batch.push(dummy(2));
        pool.merge(batch);
        let mut batch = Batch::new(0);
        batch.push(dummy(0));
        batch.push(dummy(1));
        pool.merge(batch);
        assert_eq!(pool.count(), 3);
        let amplicons = pool.into_amplicons();
        let templates: Vec<_> = amplicons.iter().map(|a| a.template()).collect();
        assert_eq!(templates, vec![0, 1, 2]);
    }
    #[test]
    fn concurrent_merge() {
        let pool = AmpliconPool::new();
        (0..64).into_par_iter().for_each(|i| {
            let mut batch = Batch::new(i);
            batch.extend((0..i).map(|j| dummy(i * 100 + j)));
            pool.merge(batch);
        });
        assert_eq!(pool.count(), (0..64).sum::<usize>());
        let templates: Vec<_> = pool.into_amplicons().iter().map(|a| a.template()).collect();
        let mut sorted = templates.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(templates, sorted);
        assert_eq!(templates.len(), (0..64).sum::<usize>());
    }
}
