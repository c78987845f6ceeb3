//! Split a pool into contiguous tasks and run them on a fixed set of threads.
//! Each task carries its own seed drawn from the caller's generator.
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use std::ops::Range;

/// Smallest number of items in a task.
pub const MIN_LOAD: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: usize,
    pub range: Range<usize>,
    pub seed: u64,
}

impl Task {
    pub fn rng(&self) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(self.seed)
    }
}

#[derive(Debug)]
pub struct WorkerPool {
    threads: usize,
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(Self { threads, pool })
    }
    /// Split `0..len` into tasks of `max(MIN_LOAD, len/threads)` items.
    pub fn partition<R: Rng>(&self, len: usize, rng: &mut R) -> Vec<Task> {
        let load = (len / self.threads).max(MIN_LOAD);
        (0..len)
            .step_by(load)
            .enumerate()
            .map(|(id, start)| Task {
                id,
                range: start..(start + load).min(len),
                seed: rng.gen(),
            })
            .collect()
    }
    /// Run all the tasks and wait until every one of them finishes.
    pub fn run<T, F>(&self, tasks: &[Task], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&Task) -> T + Sync + Send,
    {
        self.pool.install(|| tasks.par_iter().map(&f).collect())
    }
    /// Same as [WorkerPool::run], but each task owns the items in its range exclusively.
    /// The tasks should be contiguous and cover `items` from the beginning.
    pub fn run_mut<I, T, F>(&self, items: &mut [I], tasks: &[Task], f: F) -> Vec<T>
    where
        I: Send,
        T: Send,
        F: Fn(&Task, &mut [I]) -> T + Sync + Send,
    {
        let mut chunks = Vec::with_capacity(tasks.len());
        let mut rest = items;
        for task in tasks {
            assert!(task.range.end <= task.range.start + rest.len());
            let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(task.range.len());
            chunks.push((task, chunk));
            rest = tail;
        }
        self.pool.install(|| {
            chunks
                .into_par_iter()
                .map(|(task, chunk)| f(task, chunk))
                .collect()
        })
    }
}
