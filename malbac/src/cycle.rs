//! The MALBAC reaction: a pre-amplification of the fragments followed by five cycles
//! where fragments and semi amplicons are copied by the primers distributed to them.
use crate::amplicon_pool::{AmpliconPool, Batch};
use crate::engine::{amplify, Template};
use crate::genome::FragmentSource;
use crate::primer_pool::PrimerPool;
use crate::profile::SequencingProfile;
use crate::read_sampler::{read_counts, ReadSampler};
use crate::reconstruct::TemplateStore;
use crate::seq::poisson;
use crate::workers::WorkerPool;
use crate::writer::ReadSink;
use definitions::{Amplicon, Fragment, MalbacConfig, MAX_PRIMERS, PRIMER_LENGTH};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::io::Write;

/// The number of cycles after the pre-amplification.
pub const CYCLES: usize = 5;
/// Width of the FASTA output.
const FASTA_WIDTH: usize = 100;

/// The state of a run. Pools only grow during amplification,
/// so an index into them stays valid until the reads are sampled.
pub struct Malbac {
    config: MalbacConfig,
    workers: WorkerPool,
    primer_pool: PrimerPool,
    fragments: Vec<Fragment>,
    semi_amplicons: Vec<Amplicon>,
    full_amplicons: Vec<Amplicon>,
    rng: Xoshiro256PlusPlus,
}

impl Malbac {
    pub fn new(config: MalbacConfig) -> std::io::Result<Self> {
        config.validate()?;
        let workers = WorkerPool::new(config.threads)?;
        let primer_pool = PrimerPool::new(config.bases(), PRIMER_LENGTH, config.primers);
        let rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        Ok(Self {
            config,
            workers,
            primer_pool,
            fragments: vec![],
            semi_amplicons: vec![],
            full_amplicons: vec![],
            rng,
        })
    }
    pub fn config(&self) -> &MalbacConfig {
        &self.config
    }
    pub fn primer_pool(&self) -> &PrimerPool {
        &self.primer_pool
    }
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
    pub fn semi_amplicons(&self) -> &[Amplicon] {
        &self.semi_amplicons
    }
    pub fn full_amplicons(&self) -> &[Amplicon] {
        &self.full_amplicons
    }
    pub fn template_store(&self) -> TemplateStore<'_> {
        TemplateStore::new(&self.fragments, &self.semi_amplicons, self.config.bases())
    }
    pub fn create_fragments<G: FragmentSource>(&mut self, genome: &G) {
        let (min, max) = (self.config.frag_min_size, self.config.frag_max_size);
        self.fragments = genome.split_to_frags(min, max, &mut self.rng);
        info!("FRAGMENTS\t{}", self.fragments.len());
    }
    /// Run the whole reaction. Stops early if the primers are used up.
    pub fn amplify(&mut self) {
        info!(
            "MALBAC\t{}\t{}",
            self.fragments.len(),
            self.primer_pool.remaining()
        );
        self.set_primers(true);
        self.amplify_fragments();
        info!("PRE\t{}\t{}", self.semi_amplicons.len(), self.primer_pool.remaining());
        for cycle in 1..=CYCLES {
            if self.primer_pool.remaining() == 0 {
                info!("CYCLE\t{}\tPrimers are exhausted", cycle);
                break;
            }
            self.set_primers(false);
            self.amplify_semi_amplicons();
            if cycle < CYCLES {
                self.amplify_fragments();
            }
            info!(
                "CYCLE\t{}\t{}\t{}\t{}",
                cycle,
                self.semi_amplicons.len(),
                self.full_amplicons.len(),
                self.primer_pool.remaining()
            );
        }
    }
    /// Distribute a `gamma` fraction of the remaining primers over the templates,
    /// in proportion to their lengths. Returns the number of primers assigned.
    pub fn set_primers(&mut self, only_fragments: bool) -> u64 {
        let usable = (self.primer_pool.remaining() as f64 * self.config.gamma).floor() as u64;
        let mut lengths: Vec<usize> = self.fragments.iter().map(|f| f.length()).collect();
        if !only_fragments {
            lengths.extend(self.semi_amplicons.iter().map(|a| a.length()));
        }
        let total_length: usize = lengths.iter().sum();
        let mut draws: Vec<u64> = lengths
            .iter()
            .map(|&len| {
                let lambda = match total_length {
                    0 => 0f64,
                    total => usable as f64 * len as f64 / total as f64,
                };
                poisson(&mut self.rng, lambda).min(MAX_PRIMERS as u64)
            })
            .collect();
        let drawn: u64 = draws.iter().sum();
        if usable < drawn {
            draws
                .iter_mut()
                .for_each(|x| *x = (*x as u128 * usable as u128 / drawn as u128) as u64);
        }
        let (frag_draws, semi_draws) = draws.split_at(self.fragments.len());
        for (fragment, &primers) in self.fragments.iter_mut().zip(frag_draws) {
            fragment.set_primers(primers as u16);
        }
        let semi_draws = semi_draws.iter().copied().chain(std::iter::repeat(0));
        for (semi, primers) in self.semi_amplicons.iter_mut().zip(semi_draws) {
            semi.set_primers(primers as u16);
        }
        let assigned = draws.iter().sum();
        debug!("PRIMERS\t{}\t{}\t{}", only_fragments, usable, assigned);
        assigned
    }
    /// Copy every fragment. The copies are appended to the semi amplicons.
    pub fn amplify_fragments(&mut self) {
        let tasks = self.workers.partition(self.fragments.len(), &mut self.rng);
        let store = TemplateStore::new(&self.fragments, &self.semi_amplicons, self.config.bases());
        let produced = run_amplification(&self.workers, &tasks, &self.fragments, &store, &self.primer_pool, &self.config);
        debug!("FRAGMENTS\tAMPLIFIED\t{}", produced.len());
        self.semi_amplicons.extend(produced);
    }
    /// Copy every semi amplicon. The copies are appended to the full amplicons.
    pub fn amplify_semi_amplicons(&mut self) {
        let tasks = self.workers.partition(self.semi_amplicons.len(), &mut self.rng);
        let store = TemplateStore::new(&self.fragments, &self.semi_amplicons, self.config.bases());
        let produced = run_amplification(
            &self.workers,
            &tasks,
            &self.semi_amplicons,
            &store,
            &self.primer_pool,
            &self.config,
        );
        debug!("SEMI\tAMPLIFIED\t{}", produced.len());
        self.full_amplicons.extend(produced);
    }
    /// Sample `total` reads from the full amplicons and write them to `sink`.
    /// The full amplicons are consumed. Returns the number of reads written.
    pub fn yield_reads<P, W>(&mut self, profile: &P, sink: &W, total: u64) -> std::io::Result<u64>
    where
        P: SequencingProfile + Sync,
        W: ReadSink + Sync,
    {
        let (read_length, layout) = (self.config.read_length, self.config.layout);
        let counts = read_counts(&self.full_amplicons, total, read_length, layout, profile, &mut self.rng);
        let expected: u64 = counts.iter().sum();
        let tasks = self.workers.partition(self.full_amplicons.len(), &mut self.rng);
        let mut full_amplicons = std::mem::take(&mut self.full_amplicons);
        let store = TemplateStore::new(&self.fragments, &self.semi_amplicons, self.config.bases());
        let written = self.workers.run_mut(&mut full_amplicons, &tasks, |task, amplicons| -> std::io::Result<u64> {
            let mut rng = task.rng();
            let mut sampler = ReadSampler::new(profile, sink, read_length, layout);
            let mut written = 0;
            for (offset, amplicon) in amplicons.iter_mut().enumerate() {
                let id = task.range.start + offset;
                if 0 < counts[id] {
                    let seq = store.sequence_of(amplicon);
                    written += sampler.sample(id, seq, counts[id], &mut rng)?;
                }
                amplicon.release_sequence();
            }
            sampler.finish()?;
            Ok(written)
        });
        let written = written.into_iter().sum::<std::io::Result<u64>>()?;
        info!("READS\t{}\t{}", total, written);
        let target = if self.config.is_paired_end() {
            total - total % 2
        } else {
            total
        };
        if written < expected || expected < target {
            warn!("READS\tOnly {} of {} reads were written", written, total);
        }
        Ok(written)
    }
    /// Write the full amplicons in FASTA format, named by their indices.
    pub fn write_full_amplicons<W: Write>(&self, mut wtr: W) -> std::io::Result<()> {
        let store = self.template_store();
        for (i, amplicon) in self.full_amplicons.iter().enumerate() {
            writeln!(wtr, ">amp_{}", i)?;
            for line in store.sequence_of(amplicon).chunks(FASTA_WIDTH) {
                wtr.write_all(line)?;
                writeln!(wtr)?;
            }
        }
        Ok(())
    }
}

fn run_amplification<T: Template + Sync>(
    workers: &WorkerPool,
    tasks: &[crate::workers::Task],
    templates: &[T],
    store: &TemplateStore<'_>,
    primers: &PrimerPool,
    config: &MalbacConfig,
) -> Vec<Amplicon> {
    let pool = AmpliconPool::new();
    workers.run(tasks, |task| {
        let mut rng = task.rng();
        let mut batch = Batch::new(task.id);
        for index in task.range.clone() {
            batch.extend(amplify(&templates[index], index, store, primers, config, &mut rng));
        }
        pool.merge(batch);
    });
    pool.into_amplicons()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;
    use crate::profile::Profile;
    use crate::writer::SeqWriter;
    use definitions::{ErrorModel, ReadLayout};
    use rand::Rng;
    fn genome(seed: u64, len: usize) -> Genome {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let seq: Vec<u8> = (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
        Genome::new(vec![("chr1".to_string(), seq)])
    }
    fn small_config() -> MalbacConfig {
        MalbacConfig {
            primers: 1,
            gamma: 0.5,
            amplicon_min_len: 200,
            amplicon_max_len: 400,
            frag_min_size: 2000,
            frag_max_size: 4000,
            read_length: 50,
            threads: 2,
            ..Default::default()
        }
    }
    #[test]
    fn invalid_config() {
        let config = MalbacConfig {
            gamma: 2f64,
            ..Default::default()
        };
        assert!(Malbac::new(config).is_err());
    }
    #[test]
    fn set_primers() {
        let mut malbac = Malbac::new(small_config()).unwrap();
        malbac.create_fragments(&genome(1, 30_000));
        let remaining = malbac.primer_pool().remaining();
        let assigned = malbac.set_primers(true);
        let usable = (remaining as f64 * 0.5).floor() as u64;
        assert!(assigned <= usable);
        let sum: u64 = malbac.fragments().iter().map(|f| f.primers() as u64).sum();
        assert_eq!(sum, assigned);
        // Nothing is consumed by the distribution itself.
        assert_eq!(malbac.primer_pool().remaining(), remaining);
    }
    #[test]
    fn set_primers_on_semi_amplicons() {
        let mut malbac = Malbac::new(small_config()).unwrap();
        malbac.create_fragments(&genome(7, 30_000));
        malbac.set_primers(true);
        malbac.amplify_fragments();
        assert!(!malbac.semi_amplicons().is_empty());
        for _ in 0..3 {
            let remaining = malbac.primer_pool().remaining();
            let usable = (remaining as f64 * 0.5).floor() as u64;
            let assigned = malbac.set_primers(false);
            assert!(assigned <= usable, "{} > {}", assigned, usable);
            let on_fragments: u64 = malbac.fragments().iter().map(|f| f.primers() as u64).sum();
            let on_semis: u64 = malbac.semi_amplicons().iter().map(|a| a.primers() as u64).sum();
            assert!(0 < on_semis);
            assert_eq!(on_fragments + on_semis, assigned);
            assert_eq!(malbac.primer_pool().remaining(), remaining);
            malbac.amplify_semi_amplicons();
            assert!(malbac.primer_pool().remaining() <= remaining);
        }
    }
    #[test]
    fn set_primers_without_templates() {
        let mut malbac = Malbac::new(small_config()).unwrap();
        assert_eq!(malbac.set_primers(false), 0);
    }
    #[test]
    fn amplify() {
        let mut malbac = Malbac::new(small_config()).unwrap();
        malbac.create_fragments(&genome(2, 30_000));
        let initial = malbac.primer_pool().initial();
        malbac.amplify();
        assert!(!malbac.semi_amplicons().is_empty());
        assert!(!malbac.full_amplicons().is_empty());
        let consumed = initial - malbac.primer_pool().remaining();
        let products = malbac.semi_amplicons().len() + malbac.full_amplicons().len();
        assert_eq!(consumed, products as u64);
        let store = malbac.template_store();
        for semi in malbac.semi_amplicons() {
            assert!(semi.is_semi());
            let fragment = &malbac.fragments()[semi.template()];
            assert!(semi.start() + semi.span() <= fragment.length());
            assert_eq!(store.sequence_of(semi).len(), semi.length());
        }
        for full in malbac.full_amplicons() {
            assert!(!full.is_semi());
            let semi = &malbac.semi_amplicons()[full.template()];
            assert!(full.start() + full.span() <= semi.length());
            let seq = store.sequence_of(full);
            assert_eq!(seq.len(), full.length());
            assert!((200..=400).contains(&(full.span())));
        }
    }
    #[test]
    fn reproducible() {
        let config = MalbacConfig {
            threads: 1,
            ..small_config()
        };
        let run = || {
            let mut malbac = Malbac::new(config.clone()).unwrap();
            malbac.create_fragments(&genome(3, 20_000));
            malbac.amplify();
            let mut fasta = vec![];
            malbac.write_full_amplicons(&mut fasta).unwrap();
            fasta
        };
        let first = run();
        assert!(!first.is_empty());
        assert_eq!(first, run());
    }
    #[test]
    fn error_free_amplicons_are_genomic() {
        let config = MalbacConfig {
            error_model: ErrorModel::Substitution { ber: 0f64 },
            ..small_config()
        };
        let genome = genome(4, 20_000);
        let mut malbac = Malbac::new(config).unwrap();
        malbac.create_fragments(&genome);
        malbac.amplify();
        let mut fasta = vec![];
        malbac.write_full_amplicons(&mut fasta).unwrap();
        assert_eq!(bytecount::count(&fasta, b'>'), malbac.full_amplicons().len());
        let reference = &genome.chromosomes()[0].1;
        let reverse = crate::seq::revcmp(reference);
        let fasta = String::from_utf8(fasta).unwrap();
        for record in fasta.split('>').filter(|r| !r.is_empty()).take(100) {
            let mut lines = record.lines();
            assert!(lines.next().unwrap().starts_with("amp_"));
            let seq: String = lines.collect();
            let found = |genome: &[u8]| genome.windows(seq.len()).any(|w| w == seq.as_bytes());
            assert!(found(reference) || found(&reverse));
        }
    }
    #[test]
    fn yield_reads() {
        let config = MalbacConfig {
            layout: ReadLayout::PE,
            ..small_config()
        };
        let mut malbac = Malbac::new(config).unwrap();
        malbac.create_fragments(&genome(5, 20_000));
        malbac.amplify();
        let profile = Profile {
            insert_mean: 120f64,
            insert_sd: 10f64,
            ..Default::default()
        };
        let writer = SeqWriter::paired(Vec::<u8>::new(), Vec::new());
        let written = malbac.yield_reads(&profile, &writer, 1001).unwrap();
        assert_eq!(written, 1000);
        assert!(malbac.full_amplicons().is_empty());
        let (first, second) = writer.into_inner();
        let (first, second) = (String::from_utf8(first).unwrap(), String::from_utf8(second.unwrap()).unwrap());
        assert_eq!(first.lines().count(), 4 * 500);
        assert_eq!(second.lines().count(), 4 * 500);
        let names1: Vec<_> = first.lines().step_by(4).map(|l| l.trim_end_matches("/1")).collect();
        let names2: Vec<_> = second.lines().step_by(4).map(|l| l.trim_end_matches("/2")).collect();
        assert_eq!(names1, names2);
    }
    #[test]
    fn reads_come_from_long_amplicons() {
        let config = MalbacConfig {
            amplicon_min_len: 100,
            amplicon_max_len: 300,
            read_length: 200,
            layout: ReadLayout::SE,
            error_model: ErrorModel::Substitution { ber: 0f64 },
            ..small_config()
        };
        let mut malbac = Malbac::new(config).unwrap();
        malbac.create_fragments(&genome(6, 20_000));
        malbac.amplify();
        let lengths: Vec<_> = malbac.full_amplicons().iter().map(|a| a.length()).collect();
        assert!(lengths.iter().any(|&len| len < 200));
        assert!(lengths.iter().any(|&len| 200 <= len));
        let profile = Profile::default();
        let writer = SeqWriter::single(Vec::<u8>::new());
        let written = malbac.yield_reads(&profile, &writer, 500).unwrap();
        assert_eq!(written, 500);
        let (out, _) = writer.into_inner();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 4 * 500);
        assert!(out.lines().skip(1).step_by(4).all(|l| l.len() == 200));
    }
    #[test]
    fn yield_reads_without_amplicons() {
        let mut malbac = Malbac::new(small_config()).unwrap();
        let profile = Profile::default();
        let writer = SeqWriter::paired(Vec::<u8>::new(), Vec::new());
        assert_eq!(malbac.yield_reads(&profile, &writer, 100).unwrap(), 0);
    }
}
