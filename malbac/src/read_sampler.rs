//! Sample sequencing reads from the full amplicons.
use crate::profile::SequencingProfile;
use crate::seq::revcmp;
use crate::writer::ReadSink;
use definitions::{Amplicon, ReadLayout};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::io::Write;

/// Consecutive failures to draw a fitting insert size before the rest of an amplicon is skipped.
pub const INSERT_RETRY: usize = 1000;
/// Capacity of the buffer of a worker, per output file.
pub const OUTPUT_BUFFER: usize = 1 << 22;

/// The number of reads to reach `coverage` on a genome of `genome_length` bases.
pub fn total_reads(genome_length: u64, coverage: f64, read_length: usize) -> u64 {
    (genome_length as f64 * coverage / read_length as f64).floor() as u64
}

/// Distribute `total` reads over the amplicons in proportion to their GC-biased, length-normalized weights.
/// Amplicons shorter than `read_length` get no reads.
/// For paired-end reads, every count is made even and the sum is `total` rounded down to an even number.
/// If no amplicon is as long as a read, every count is zero.
pub fn read_counts<P: SequencingProfile, R: Rng>(
    amplicons: &[Amplicon],
    total: u64,
    read_length: usize,
    layout: ReadLayout,
    profile: &P,
    rng: &mut R,
) -> Vec<u64> {
    let sampleable: Vec<usize> = amplicons
        .iter()
        .enumerate()
        .filter(|(_, amp)| read_length <= amp.length())
        .map(|(i, _)| i)
        .collect();
    if sampleable.is_empty() {
        if !amplicons.is_empty() {
            warn!("READCOUNT	No amplicon is longer than {} bp", read_length);
        }
        return vec![0; amplicons.len()];
    }
    let target = match layout {
        ReadLayout::SE => total,
        ReadLayout::PE => total - total % 2,
    };
    let norm = (profile.frag_size() as f64).powi(2);
    let mut weights = vec![0f64; amplicons.len()];
    for &i in sampleable.iter() {
        let amp = &amplicons[i];
        weights[i] = profile.gc_factor(amp.gc_percent()) * amp.length() as f64 / norm;
    }
    let sum: f64 = weights.iter().sum();
    if !(0f64 < sum && sum.is_finite()) {
        warn!("All amplicons have zero weight. Reads are distributed uniformly.");
        weights.iter_mut().for_each(|w| *w = 0f64);
        sampleable.iter().for_each(|&i| weights[i] = 1f64);
    }
    let sum: f64 = weights.iter().sum();
    let mut counts: Vec<u64> = weights
        .iter()
        .map(|w| (w / sum * target as f64).floor() as u64)
        .collect();
    let mut assigned: u64 = counts.iter().sum();
    while target < assigned {
        let i = rng.gen_range(0..counts.len());
        if 0 < counts[i] {
            counts[i] -= 1;
            assigned -= 1;
        }
    }
    match WeightedIndex::new(&weights) {
        Ok(dist) => (assigned..target).for_each(|_| counts[dist.sample(rng)] += 1),
        Err(_) => (assigned..target).for_each(|_| counts[sampleable[rng.gen_range(0..sampleable.len())]] += 1),
    }
    if layout == ReadLayout::PE {
        let mut round_up = true;
        for count in counts.iter_mut().filter(|c| **c % 2 == 1) {
            if round_up {
                *count += 1;
            } else {
                *count -= 1;
            }
            round_up = !round_up;
        }
    }
    debug!("READCOUNT\t{}\t{}", amplicons.len(), counts.iter().sum::<u64>());
    counts
}

/// Sampler owned by a worker. Records are buffered and handed to the sink in bulk.
pub struct ReadSampler<'a, P, W> {
    profile: &'a P,
    sink: &'a W,
    read_length: usize,
    layout: ReadLayout,
    capacity: usize,
    first: Vec<u8>,
    second: Vec<u8>,
}

impl<'a, P: SequencingProfile, W: ReadSink> ReadSampler<'a, P, W> {
    pub fn new(profile: &'a P, sink: &'a W, read_length: usize, layout: ReadLayout) -> Self {
        Self::with_capacity(profile, sink, read_length, layout, OUTPUT_BUFFER)
    }
    pub fn with_capacity(
        profile: &'a P,
        sink: &'a W,
        read_length: usize,
        layout: ReadLayout,
        capacity: usize,
    ) -> Self {
        let second = match layout {
            ReadLayout::SE => vec![],
            ReadLayout::PE => Vec::with_capacity(capacity),
        };
        Self {
            profile,
            sink,
            read_length,
            layout,
            capacity,
            first: Vec::with_capacity(capacity),
            second,
        }
    }
    /// Sample `count` reads from the amplicon `id` with sequence `seq`. Returns the number of reads sampled.
    /// Amplicons shorter than the read length yield nothing.
    pub fn sample<R: Rng>(&mut self, id: usize, seq: &[u8], count: u64, rng: &mut R) -> std::io::Result<u64> {
        if seq.len() < self.read_length || count == 0 {
            return Ok(0);
        }
        match self.layout {
            ReadLayout::SE => self.sample_single(id, seq, count, rng),
            ReadLayout::PE => self.sample_paired(id, seq, count / 2, rng),
        }
    }
    fn sample_single<R: Rng>(&mut self, id: usize, seq: &[u8], count: u64, rng: &mut R) -> std::io::Result<u64> {
        let rl = self.read_length;
        let mut record = vec![];
        for k in 1..=count {
            let pos = rng.gen_range(0..=seq.len() - rl);
            let (bases, quals) = self.profile.predict(&seq[pos..pos + rl], true, rng);
            record.clear();
            write_fastq(&mut record, format_args!("{}_{}", id, k), &bases, &quals)?;
            if self.capacity < self.first.len() + record.len() {
                self.flush()?;
            }
            self.first.extend_from_slice(&record);
        }
        Ok(count)
    }
    fn sample_paired<R: Rng>(&mut self, id: usize, seq: &[u8], pairs: u64, rng: &mut R) -> std::io::Result<u64> {
        let rl = self.read_length;
        let (mut record1, mut record2) = (vec![], vec![]);
        for k in 1..=pairs {
            let insert = match self.draw_insert(seq.len(), rng) {
                Some(insert) => insert,
                None => {
                    debug!("INSERT\t{}\t{}\t{}", id, seq.len(), pairs - k + 1);
                    return Ok(2 * (k - 1));
                }
            };
            let pos = rng.gen_range(0..=seq.len() - insert);
            let (bases1, quals1) = self.profile.predict(&seq[pos..pos + rl], true, rng);
            let mate = revcmp(&seq[pos + insert - rl..pos + insert]);
            let (bases2, quals2) = self.profile.predict(&mate, false, rng);
            record1.clear();
            record2.clear();
            write_fastq(&mut record1, format_args!("{}_{}/1", id, k), &bases1, &quals1)?;
            write_fastq(&mut record2, format_args!("{}_{}/2", id, k), &bases2, &quals2)?;
            let overflow1 = self.capacity < self.first.len() + record1.len();
            let overflow2 = self.capacity < self.second.len() + record2.len();
            if overflow1 || overflow2 {
                self.flush()?;
            }
            self.first.extend_from_slice(&record1);
            self.second.extend_from_slice(&record2);
        }
        Ok(2 * pairs)
    }
    fn draw_insert<R: Rng>(&self, len: usize, rng: &mut R) -> Option<usize> {
        (0..INSERT_RETRY)
            .map(|_| self.profile.yield_insert_size(rng))
            .find(|&insert| self.read_length <= insert && insert <= len)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self.layout {
            ReadLayout::SE if !self.first.is_empty() => self.sink.write_single(&self.first)?,
            ReadLayout::PE if !self.first.is_empty() => self.sink.write_pair(&self.first, &self.second)?,
            _ => {}
        }
        self.first.clear();
        self.second.clear();
        Ok(())
    }
    /// Hand the remaining records to the sink.
    pub fn finish(mut self) -> std::io::Result<()> {
        self.flush()
    }
}

fn write_fastq(buf: &mut Vec<u8>, name: std::fmt::Arguments, seq: &[u8], qual: &[u8]) -> std::io::Result<()> {
    writeln!(buf, "@{}", name)?;
    buf.extend_from_slice(seq);
    buf.extend_from_slice(b"\n+\n");
    buf.extend_from_slice(qual);
    buf.push(b'\n');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use crate::writer::SeqWriter;
    use definitions::ErrorList;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    fn amplicon(length: u32, gc: u32) -> Amplicon {
        Amplicon::new(false, 0, ErrorList::empty(4), 0, length, gc)
    }
    fn error_free() -> Profile {
        Profile {
            error_rate: 0f64,
            insert_sd: 0f64,
            insert_mean: 30f64,
            ..Default::default()
        }
    }
    #[test]
    fn total() {
        assert_eq!(total_reads(1_000_000, 5f64, 150), 33333);
        assert_eq!(total_reads(0, 5f64, 150), 0);
    }
    #[test]
    fn counts_sum_up() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        let amplicons: Vec<_> = (0..50).map(|i| amplicon(1000 + 10 * i, 450)).collect();
        let profile = Profile::default();
        let counts = read_counts(&amplicons, 1001, 150, ReadLayout::SE, &profile, &mut rng);
        assert_eq!(counts.iter().sum::<u64>(), 1001);
        let counts = read_counts(&amplicons, 1001, 150, ReadLayout::PE, &profile, &mut rng);
        assert_eq!(counts.iter().sum::<u64>(), 1000);
        assert!(counts.iter().all(|c| c % 2 == 0));
        assert!(read_counts(&[], 100, 150, ReadLayout::SE, &profile, &mut rng).is_empty());
    }
    #[test]
    fn counts_follow_weights() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(2);
        let amplicons = vec![amplicon(1000, 450), amplicon(3000, 1350), amplicon(1000, 0)];
        let mut profile = Profile::default();
        profile.gc_factors[0] = 0f64;
        let counts = read_counts(&amplicons, 4000, 150, ReadLayout::SE, &profile, &mut rng);
        assert_eq!(counts.iter().sum::<u64>(), 4000);
        assert!((999..=1001).contains(&counts[0]), "{:?}", counts);
        assert_eq!(counts[2], 0);
    }
    #[test]
    fn zero_weights() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(3);
        let amplicons = vec![amplicon(1000, 0), amplicon(1000, 0)];
        let profile = Profile {
            gc_factors: vec![0f64; 101],
            ..Default::default()
        };
        let counts = read_counts(&amplicons, 10, 150, ReadLayout::SE, &profile, &mut rng);
        assert_eq!(counts, vec![5, 5]);
    }
    #[test]
    fn short_amplicons_get_no_reads() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(7);
        let amplicons: Vec<_> = (0..20).map(|i| amplicon(100 + 10 * i, 45 + 4 * i)).collect();
        let profile = Profile::default();
        for layout in [ReadLayout::SE, ReadLayout::PE] {
            let counts = read_counts(&amplicons, 1000, 200, layout, &profile, &mut rng);
            assert_eq!(counts.iter().sum::<u64>(), 1000);
            for (amp, &count) in amplicons.iter().zip(counts.iter()) {
                if amp.length() < 200 {
                    assert_eq!(count, 0, "{:?}", counts);
                }
            }
        }
        // Uniform fallback also skips short amplicons.
        let flat = Profile {
            gc_factors: vec![0f64; 101],
            ..Default::default()
        };
        let counts = read_counts(&amplicons, 30, 250, ReadLayout::SE, &flat, &mut rng);
        assert_eq!(counts.iter().sum::<u64>(), 30);
        assert!(counts[..15].iter().all(|&c| c == 0));
        assert!(counts[15..].iter().all(|&c| 5 <= c), "{:?}", counts);
        let counts = read_counts(&amplicons, 30, 1000, ReadLayout::SE, &profile, &mut rng);
        assert_eq!(counts, vec![0; 20]);
    }
    #[test]
    fn single_end() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(4);
        let profile = error_free();
        let writer = SeqWriter::single(Vec::<u8>::new());
        let seq = b"ACGTACGTTTGGCCAAACGT";
        let mut sampler = ReadSampler::with_capacity(&profile, &writer, 10, ReadLayout::SE, 64);
        assert_eq!(sampler.sample(3, seq, 5, &mut rng).unwrap(), 5);
        assert_eq!(sampler.sample(4, b"ACGT", 5, &mut rng).unwrap(), 0);
        sampler.finish().unwrap();
        let (out, _) = writer.into_inner();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 20);
        for (k, record) in lines.chunks(4).enumerate() {
            assert_eq!(record[0], format!("@3_{}", k + 1));
            assert_eq!(record[1].len(), 10);
            assert!(String::from_utf8_lossy(seq).contains(record[1]));
            assert_eq!(record[2], "+");
            assert_eq!(record[3].len(), 10);
        }
    }
    #[test]
    fn paired_end() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(5);
        let profile = error_free();
        let writer = SeqWriter::paired(Vec::<u8>::new(), Vec::new());
        let seq: Vec<u8> = (0..60).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
        let mut sampler = ReadSampler::with_capacity(&profile, &writer, 10, ReadLayout::PE, 100);
        assert_eq!(sampler.sample(0, &seq, 8, &mut rng).unwrap(), 8);
        sampler.finish().unwrap();
        let (first, second) = writer.into_inner();
        let first = String::from_utf8(first).unwrap();
        let second = String::from_utf8(second.unwrap()).unwrap();
        let first: Vec<_> = first.lines().collect();
        let second: Vec<_> = second.lines().collect();
        assert_eq!(first.len(), 16);
        assert_eq!(second.len(), 16);
        for (r1, r2) in first.chunks(4).zip(second.chunks(4)) {
            assert!(r1[0].ends_with("/1") && r2[0].ends_with("/2"));
            assert_eq!(r1[0].trim_end_matches("/1"), r2[0].trim_end_matches("/2"));
            // With an insert of exactly 30 bases, mate 2 starts 20 bases after mate 1.
            let pos = seq.windows(10).position(|w| w == r1[1].as_bytes()).unwrap();
            let mate = revcmp(&seq[pos + 20..pos + 30]);
            assert_eq!(r2[1].as_bytes(), mate.as_slice());
        }
    }
    #[test]
    fn insert_too_long() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(6);
        let profile = error_free();
        let writer = SeqWriter::paired(Vec::<u8>::new(), Vec::new());
        let mut sampler = ReadSampler::new(&profile, &writer, 10, ReadLayout::PE);
        assert_eq!(sampler.sample(0, &[b'A'; 20], 10, &mut rng).unwrap(), 0);
        sampler.finish().unwrap();
        let (first, second) = writer.into_inner();
        assert!(first.is_empty() && second.unwrap().is_empty());
    }
}
