use serde::{Deserialize, Serialize};
use std::io::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadLayout {
    /// Single end.
    SE,
    /// Paired end.
    PE,
}

impl std::str::FromStr for ReadLayout {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SE" => Ok(ReadLayout::SE),
            "PE" => Ok(ReadLayout::PE),
            _ => Err(format!("{} is not a layout. SE or PE.", s)),
        }
    }
}

/// How errors are introduced while copying a template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorModel {
    /// Each base is substituted with probability `ber`.
    Substitution { ber: f64 },
    /// Each base is dropped with probability `ador`,
    /// otherwise substituted with probability `fpr`.
    DropoutAndFalsePositive { ador: f64, fpr: f64 },
}

impl std::default::Default for ErrorModel {
    fn default() -> Self {
        ErrorModel::Substitution { ber: 3.4e-4 }
    }
}

/// The configuration of the amplification and the read sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MalbacConfig {
    /// The number of copies of each distinct primer at the beginning.
    pub primers: u32,
    /// The fraction of the remaining primers available in a cycle.
    pub gamma: f64,
    pub error_model: ErrorModel,
    pub amplicon_min_len: usize,
    pub amplicon_max_len: usize,
    /// The alphabet. Primers are enumerated over it.
    pub bases: String,
    pub read_length: usize,
    pub layout: ReadLayout,
    pub coverage: f64,
    /// Mean insert size for paired-end reads.
    pub isize: usize,
    pub threads: usize,
    pub frag_min_size: usize,
    pub frag_max_size: usize,
    pub seed: u64,
}

impl std::default::Default for MalbacConfig {
    fn default() -> Self {
        Self {
            primers: 10,
            gamma: 0.02,
            error_model: ErrorModel::default(),
            amplicon_min_len: 1000,
            amplicon_max_len: 2000,
            bases: "ACGT".to_string(),
            read_length: 150,
            layout: ReadLayout::PE,
            coverage: 5f64,
            isize: 260,
            threads: 1,
            frag_min_size: 10_000,
            frag_max_size: 100_000,
            seed: 7,
        }
    }
}

impl MalbacConfig {
    pub fn bases(&self) -> &[u8] {
        self.bases.as_bytes()
    }
    pub fn is_paired_end(&self) -> bool {
        self.layout == ReadLayout::PE
    }
    /// Check the ranges of the parameters.
    pub fn validate(&self) -> std::io::Result<()> {
        fn invalid(msg: String) -> std::io::Result<()> {
            Err(Error::new(ErrorKind::InvalidInput, msg))
        }
        let max = crate::MAX_FIELD as usize;
        let min_len = crate::PRIMER_LENGTH + 1;
        let bases = self.bases();
        if self.primers < 1 {
            return invalid(format!("primers should be positive:{}", self.primers));
        }
        if !(0f64 < self.gamma && self.gamma <= 1f64) {
            return invalid(format!("gamma should be in (0,1]:{}", self.gamma));
        }
        let rates = match self.error_model {
            ErrorModel::Substitution { ber } => vec![("ber", ber)],
            ErrorModel::DropoutAndFalsePositive { ador, fpr } => vec![("ador", ador), ("fpr", fpr)],
        };
        for (name, rate) in rates {
            if !(0f64..=0.5).contains(&rate) {
                return invalid(format!("{} should be in [0,0.5]:{}", name, rate));
            }
        }
        if self.amplicon_min_len < min_len || self.amplicon_max_len < self.amplicon_min_len {
            let (min, max) = (self.amplicon_min_len, self.amplicon_max_len);
            return invalid(format!("amplicon length [{},{}] is invalid", min, max));
        }
        if max < self.amplicon_max_len {
            return invalid(format!("amplicon_max_len should be < {}", max + 1));
        }
        if bases.len() < 2 || (crate::MAX_ALT_INDEX as usize) < bases.len() {
            return invalid(format!("{} bases are not supported", bases.len()));
        }
        if bases.iter().enumerate().any(|(i, b)| bases[..i].contains(b)) {
            return invalid(format!("{} has duplicated bases", self.bases));
        }
        if self.read_length < 1 {
            return invalid("read_length should be positive".to_string());
        }
        if self.amplicon_max_len < self.read_length {
            let (read, amp) = (self.read_length, self.amplicon_max_len);
            return invalid(format!("read_length {} exceeds amplicon_max_len {}", read, amp));
        }
        if self.coverage <= 0f64 {
            return invalid(format!("coverage should be positive:{}", self.coverage));
        }
        if self.threads < 1 {
            return invalid("threads should be positive".to_string());
        }
        if self.frag_max_size < self.frag_min_size || max < self.frag_max_size {
            let (min, max) = (self.frag_min_size, self.frag_max_size);
            return invalid(format!("fragment size [{},{}] is invalid", min, max));
        }
        Ok(())
    }
}
