//! Reference genome and its fragmentation.
use crate::seq::revcmp;
use definitions::{Fragment, Strand};
use rand::Rng;
use std::path::Path;

pub trait FragmentSource {
    /// Break every chromosome into pieces of random lengths in `[min, max]`,
    /// emitting both strands of each piece. The tail shorter than the drawn length is kept as well.
    fn split_to_frags<R: Rng>(&self, min: usize, max: usize, rng: &mut R) -> Vec<Fragment>;
    fn genome_length(&self) -> u64;
}

#[derive(Debug, Clone, Default)]
pub struct Genome {
    chromosomes: Vec<(String, Vec<u8>)>,
}

impl Genome {
    pub fn new(chromosomes: Vec<(String, Vec<u8>)>) -> Self {
        let chromosomes = chromosomes
            .into_iter()
            .map(|(id, mut seq)| {
                seq.make_ascii_uppercase();
                (id, seq)
            })
            .collect();
        Self { chromosomes }
    }
    pub fn from_fasta<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let reader = std::fs::File::open(path).map(std::io::BufReader::new)?;
        let chromosomes: Vec<(String, Vec<u8>)> = bio_utils::fasta::parse_into_vec_from(reader)?
            .into_iter()
            .map(|record| {
                let (id, _, seq) = record.into();
                (id, seq.into_bytes())
            })
            .collect();
        debug!("GENOME\t{}", chromosomes.len());
        Ok(Self::new(chromosomes))
    }
    pub fn chromosomes(&self) -> &[(String, Vec<u8>)] {
        &self.chromosomes
    }
}

impl FragmentSource for Genome {
    fn split_to_frags<R: Rng>(&self, min: usize, max: usize, rng: &mut R) -> Vec<Fragment> {
        assert!(0 < min && min <= max);
        let mut fragments = vec![];
        for (id, seq) in self.chromosomes.iter() {
            let mut start = 0;
            while start < seq.len() {
                let len = rng.gen_range(min..=max);
                let end = (start + len).min(seq.len());
                let forward = seq[start..end].to_vec();
                let reverse = revcmp(&forward);
                let start_pos = start as u64 + 1;
                fragments.push(Fragment::new(id, start_pos, Strand::Forward, forward));
                fragments.push(Fragment::new(id, start_pos, Strand::Reverse, reverse));
                start = end;
            }
        }
        debug!("FRAGMENTS\t{}", fragments.len());
        fragments
    }
    fn genome_length(&self) -> u64 {
        self.chromosomes.iter().map(|(_, seq)| seq.len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    #[test]
    fn split() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        let chr1: Vec<u8> = (0..1050).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
        let genome = Genome::new(vec![("chr1".to_string(), chr1.clone()), ("chr2".to_string(), b"acgt".to_vec())]);
        assert_eq!(genome.genome_length(), 1054);
        let fragments = genome.split_to_frags(100, 200, &mut rng);
        assert_eq!(fragments.len() % 2, 0);
        let forward: Vec<_> = fragments
            .iter()
            .filter(|f| f.chromosome == "chr1" && f.strand == Strand::Forward)
            .collect();
        let concat: Vec<u8> = forward.iter().flat_map(|f| f.sequence().to_vec()).collect();
        assert_eq!(concat, chr1);
        assert_eq!(forward[0].start_pos, 1);
        for pair in fragments.chunks(2) {
            assert_eq!(pair[0].start_pos, pair[1].start_pos);
            assert_eq!(pair[1].sequence(), revcmp(pair[0].sequence()).as_slice());
        }
        for f in forward.iter().take(forward.len() - 1) {
            assert!((100..=200).contains(&f.length()));
        }
        let chr2: Vec<_> = fragments.iter().filter(|f| f.chromosome == "chr2").collect();
        assert_eq!(chr2.len(), 2);
        assert_eq!(chr2[0].sequence(), b"ACGT");
    }
}
