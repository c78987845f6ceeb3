//! Sequencing profile: GC bias of the library, insert size, and the error model of the sequencer.
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Error, ErrorKind};
use std::path::Path;

const BASES: &[u8] = b"ACGT";
const PHRED_OFFSET: u8 = 33;
/// Quality of a base which can not be called.
const N_QUALITY: u8 = 2;

pub trait SequencingProfile {
    /// Relative yield of an amplicon with the given GC percent.
    fn gc_factor(&self, gc_percent: usize) -> f64;
    /// The length used to normalize the weight of an amplicon.
    fn frag_size(&self) -> usize;
    fn yield_insert_size<R: Rng>(&self, rng: &mut R) -> usize;
    /// Sequence `seq`, returning the bases and the Phred+33 qualities.
    /// `is_first` is false for the second mate.
    fn predict<R: Rng>(&self, seq: &[u8], is_first: bool, rng: &mut R) -> (Vec<u8>, Vec<u8>);
}

/// A profile loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub frag_size: usize,
    /// Indexed by the GC percent, 0 to 100.
    pub gc_factors: Vec<f64>,
    pub insert_mean: f64,
    pub insert_sd: f64,
    /// Error rate at the first cycle.
    pub error_rate: f64,
    /// The error rate at the last cycle is `error_rate * error_growth`.
    pub error_growth: f64,
    /// Multiplier of the error rate on the second mate.
    pub reverse_penalty: f64,
    pub max_quality: u8,
}

impl std::default::Default for Profile {
    fn default() -> Self {
        let gc_factors = (0..=100)
            .map(|gc| {
                let diff = (gc as f64 - 45f64) / 25f64;
                (-diff * diff).exp()
            })
            .collect();
        Self {
            frag_size: 1000,
            gc_factors,
            insert_mean: 260f64,
            insert_sd: 26f64,
            error_rate: 0.001,
            error_growth: 5f64,
            reverse_penalty: 1.5,
            max_quality: 41,
        }
    }
}

impl Profile {
    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let reader = std::fs::File::open(path).map(BufReader::new)?;
        let profile: Self = serde_json::from_reader(reader).map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
        profile.validate()?;
        Ok(profile)
    }
    pub fn with_insert_mean(mut self, insert_mean: usize) -> Self {
        self.insert_mean = insert_mean as f64;
        self
    }
    pub fn validate(&self) -> std::io::Result<()> {
        let invalid = |msg: String| Err(Error::new(ErrorKind::InvalidData, msg));
        if self.gc_factors.len() != 101 {
            return invalid(format!("{} GC factors, not 101", self.gc_factors.len()));
        }
        if self.gc_factors.iter().any(|&f| !(f.is_finite() && 0f64 <= f)) {
            return invalid("GC factors should be non-negative".to_string());
        }
        if self.frag_size == 0 {
            return invalid("frag_size should be positive".to_string());
        }
        if !(0f64 <= self.insert_sd && self.insert_sd.is_finite()) {
            return invalid(format!("insert_sd:{}", self.insert_sd));
        }
        if !(0f64..=0.75).contains(&self.error_rate) {
            return invalid(format!("error_rate:{}", self.error_rate));
        }
        if self.error_growth < 0f64 || self.reverse_penalty < 0f64 {
            return invalid("error_growth and reverse_penalty should be non-negative".to_string());
        }
        Ok(())
    }
    /// Error rate at the `i`-th cycle of `len` cycles.
    fn error_rate_at(&self, i: usize, len: usize, is_first: bool) -> f64 {
        let progress = match len {
            0 | 1 => 0f64,
            _ => i as f64 / (len - 1) as f64,
        };
        let rate = self.error_rate * (1f64 + (self.error_growth - 1f64) * progress);
        let rate = if is_first { rate } else { rate * self.reverse_penalty };
        rate.clamp(0f64, 0.75)
    }
    fn quality(&self, rate: f64) -> u8 {
        if rate <= 0f64 {
            return self.max_quality;
        }
        let phred = (-10f64 * rate.log10()).round().max(0f64) as u8;
        phred.min(self.max_quality)
    }
}

impl SequencingProfile for Profile {
    fn gc_factor(&self, gc_percent: usize) -> f64 {
        self.gc_factors.get(gc_percent.min(100)).copied().unwrap_or(1f64)
    }
    fn frag_size(&self) -> usize {
        self.frag_size
    }
    fn yield_insert_size<R: Rng>(&self, rng: &mut R) -> usize {
        let size = match Normal::new(self.insert_mean, self.insert_sd) {
            Ok(dist) => dist.sample(rng),
            Err(_) => self.insert_mean,
        };
        size.round().max(0f64) as usize
    }
    fn predict<R: Rng>(&self, seq: &[u8], is_first: bool, rng: &mut R) -> (Vec<u8>, Vec<u8>) {
        let len = seq.len();
        seq.iter()
            .enumerate()
            .map(|(i, &base)| {
                if !BASES.contains(&base) {
                    return (b'N', N_QUALITY + PHRED_OFFSET);
                }
                let rate = self.error_rate_at(i, len, is_first);
                let quality = self.quality(rate) + PHRED_OFFSET;
                if rng.gen_bool(rate) {
                    let alt = loop {
                        let alt = BASES[rng.gen_range(0..BASES.len())];
                        if alt != base {
                            break alt;
                        }
                    };
                    (alt, quality)
                } else {
                    (base, quality)
                }
            })
            .unzip()
    }
}
