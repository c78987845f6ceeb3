//! Pipelines -- the whole run of the simulator.
//!
//! This module defines the runs from a reference genome to the amplicons or to the sequencing reads.
use definitions::MalbacConfig;
use malbac::read_sampler::total_reads;
use malbac::{FragmentSource, Genome, Malbac, Profile, SeqWriter, Stats};
use serde::{Deserialize, Serialize};
extern crate log;
use log::*;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// The configuration of the pipeline.
/// The parameters of the amplification and the sequencing are given at the top level, along with the paths.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PipelineConfig {
    /// The path to the reference genome.
    pub input_file: PathBuf,
    /// The prefix of the output reads.
    pub out_prefix: PathBuf,
    /// The path to the sequencing profile. The built-in profile is used if not given.
    #[serde(default)]
    pub profile: Option<PathBuf>,
    #[serde(default)]
    pub verbose: usize,
    #[serde(flatten)]
    pub malbac: MalbacConfig,
}

pub fn run_pipeline(config: &PipelineConfig) -> std::io::Result<()> {
    let level = match config.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    let profile = config.profile.as_deref();
    generate_reads(&config.input_file, &config.out_prefix, profile, &config.malbac)?;
    Ok(())
}

/// Amplify the genome and sample reads from the amplicons. Returns the number of reads written.
pub fn generate_reads(
    input: &Path,
    prefix: &Path,
    profile: Option<&Path>,
    config: &MalbacConfig,
) -> std::io::Result<u64> {
    let profile = match profile {
        Some(path) => {
            debug!("PROFILE\t{:?}", path);
            Profile::from_path(path)?
        }
        None => Profile::default().with_insert_mean(config.isize),
    };
    let genome = Genome::from_fasta(input)?;
    let mut malbac = simulate_amplification(&genome, config)?;
    let total = total_reads(genome.genome_length(), config.coverage, config.read_length);
    let writer = SeqWriter::create(prefix, config.layout)?;
    let written = malbac.yield_reads(&profile, &writer, total)?;
    writer.flush()?;
    Ok(written)
}

/// Amplify the genome and write the full amplicons in FASTA. Returns the number of the amplicons.
pub fn amplify(input: &Path, output: &Path, config: &MalbacConfig) -> std::io::Result<usize> {
    let genome = Genome::from_fasta(input)?;
    let malbac = simulate_amplification(&genome, config)?;
    let mut wtr = std::fs::File::create(output).map(BufWriter::new)?;
    malbac.write_full_amplicons(&mut wtr)?;
    wtr.flush()?;
    Ok(malbac.full_amplicons().len())
}

fn simulate_amplification<G: FragmentSource>(genome: &G, config: &MalbacConfig) -> std::io::Result<Malbac> {
    let mut malbac = Malbac::new(config.clone())?;
    malbac.create_fragments(genome);
    malbac.amplify();
    if log_enabled!(Level::Info) {
        let mut stats = vec![];
        malbac.stats(&mut stats)?;
        info!("STATS\n{}", String::from_utf8_lossy(&stats));
    }
    Ok(malbac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use definitions::{ErrorModel, ReadLayout};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;
    fn write_reference(name: &str) -> PathBuf {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let path = std::env::temp_dir().join(format!("scsim_{}_{}.fa", name, std::process::id()));
        let mut wtr = std::fs::File::create(&path).map(BufWriter::new).unwrap();
        for chr in 0..2 {
            let seq: Vec<u8> = (0..8000).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
            writeln!(wtr, ">chr{}", chr).unwrap();
            wtr.write_all(&seq).unwrap();
            writeln!(wtr).unwrap();
        }
        wtr.flush().unwrap();
        path
    }
    fn small_config() -> MalbacConfig {
        MalbacConfig {
            primers: 1,
            amplicon_min_len: 300,
            amplicon_max_len: 600,
            frag_min_size: 2000,
            frag_max_size: 4000,
            gamma: 0.2,
            read_length: 100,
            coverage: 2f64,
            isize: 200,
            threads: 2,
            ..Default::default()
        }
    }
    #[test]
    fn parse_config() {
        let toml = r#"
input_file = "ref.fa"
out_prefix = "out/reads"
verbose = 1
primers = 5
layout = "SE"
seed = 42
[error_model]
kind = "dropout_and_false_positive"
ador = 0.02
fpr = 0.05
"#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.input_file, PathBuf::from("ref.fa"));
        assert!(config.profile.is_none());
        assert_eq!(config.verbose, 1);
        assert_eq!(config.malbac.primers, 5);
        assert_eq!(config.malbac.layout, ReadLayout::SE);
        assert_eq!(config.malbac.seed, 42);
        assert_eq!(config.malbac.read_length, 150);
        let model = ErrorModel::DropoutAndFalsePositive { ador: 0.02, fpr: 0.05 };
        assert_eq!(config.malbac.error_model, model);
    }
    #[test]
    fn genreads() {
        let reference = write_reference("genreads");
        let prefix = std::env::temp_dir().join(format!("scsim_reads_{}", std::process::id()));
        let config = small_config();
        let written = generate_reads(&reference, &prefix, None, &config).unwrap();
        // 16000 bases at 2x by 100 bp reads.
        assert_eq!(written, 320);
        let first = prefix.with_file_name(format!("scsim_reads_{}_1.fq", std::process::id()));
        let second = prefix.with_file_name(format!("scsim_reads_{}_2.fq", std::process::id()));
        let first = std::fs::read_to_string(&first).unwrap();
        let second = std::fs::read_to_string(&second).unwrap();
        assert_eq!(first.lines().count(), 4 * 160);
        assert_eq!(second.lines().count(), 4 * 160);
    }
    #[test]
    fn amplify_to_fasta() {
        let reference = write_reference("amplify");
        let output = std::env::temp_dir().join(format!("scsim_amplicons_{}.fa", std::process::id()));
        let config = MalbacConfig {
            error_model: ErrorModel::DropoutAndFalsePositive { ador: 0.01, fpr: 0.01 },
            ..small_config()
        };
        let count = amplify(&reference, &output, &config).unwrap();
        assert!(0 < count);
        let fasta = std::fs::read_to_string(&output).unwrap();
        assert_eq!(fasta.lines().filter(|l| l.starts_with('>')).count(), count);
        assert!(fasta.lines().all(|l| l.len() <= 100));
    }
    #[test]
    fn missing_input() {
        let config = small_config();
        let missing = Path::new("/nonexistent/scsim/ref.fa");
        assert!(amplify(missing, Path::new("/nonexistent/out.fa"), &config).is_err());
    }
}
