use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use definitions::{ErrorModel, MalbacConfig, ReadLayout};
use log::warn;

/// Default rates of the dropout model, used when it is chosen without explicit rates.
const DEFAULT_ADOR: f64 = 0.01;
const DEFAULT_FPR: f64 = 0.05;

fn verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Debug mode")
}

/// Arguments shared by every subcommand running the amplification.
fn amplification_args(command: Command) -> Command {
    command
        .arg(verbose())
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FASTA")
                .required(true)
                .help("Reference genome."),
        )
        .arg(
            Arg::new("primers")
                .short('p')
                .long("primers")
                .value_parser(value_parser!(u32))
                .help("Copies of each distinct primer [10]"),
        )
        .arg(
            Arg::new("gamma")
                .short('r')
                .long("gamma")
                .value_parser(value_parser!(f64))
                .help("Fraction of the remaining primers used in a cycle [0.02]"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .value_parser(["substitution", "dropout"])
                .help("Error model while copying a template [substitution]"),
        )
        .arg(
            Arg::new("ber")
                .short('b')
                .long("ber")
                .value_parser(value_parser!(f64))
                .conflicts_with_all(["ador", "fpr"])
                .help("Base substitution rate of the substitution model [3.4e-4]"),
        )
        .arg(
            Arg::new("ador")
                .long("ador")
                .value_parser(value_parser!(f64))
                .help("Dropout rate of the dropout model. Selects the dropout model if --model is not given [0.01]"),
        )
        .arg(
            Arg::new("fpr")
                .long("fpr")
                .value_parser(value_parser!(f64))
                .help("Substitution rate of the dropout model. Selects the dropout model if --model is not given [0.05]"),
        )
        .arg(
            Arg::new("amplicon_min_len")
                .long("amplicon_min_len")
                .value_parser(value_parser!(usize))
                .help("Shortest amplicon [1000]"),
        )
        .arg(
            Arg::new("amplicon_max_len")
                .long("amplicon_max_len")
                .value_parser(value_parser!(usize))
                .help("Longest amplicon [2000]"),
        )
        .arg(
            Arg::new("frag_min_size")
                .long("frag_min_size")
                .value_parser(value_parser!(usize))
                .help("Shortest genomic fragment [10000]"),
        )
        .arg(
            Arg::new("frag_max_size")
                .long("frag_max_size")
                .value_parser(value_parser!(usize))
                .help("Longest genomic fragment [100000]"),
        )
        .arg(
            Arg::new("bases")
                .long("bases")
                .help("Alphabet of the primers [ACGT]"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(value_parser!(usize))
                .help("number of threads [1]"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Seed of the random number generator [7]"),
        )
}

fn subcommand_genreads() -> Command {
    let command = Command::new("genreads")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Amplify the genome by MALBAC and sequence the amplicons.");
    amplification_args(command)
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PREFIX")
                .required(true)
                .help("Output prefix. PREFIX.fq, or PREFIX_1.fq and PREFIX_2.fq."),
        )
        .arg(
            Arg::new("profile")
                .short('m')
                .long("profile")
                .value_name("JSON")
                .help("Sequencing profile. A built-in profile is used if not given."),
        )
        .arg(
            Arg::new("layout")
                .short('l')
                .long("layout")
                .value_parser(["SE", "PE"])
                .help("Single-end or paired-end reads [PE]"),
        )
        .arg(
            Arg::new("coverage")
                .short('c')
                .long("coverage")
                .value_parser(value_parser!(f64))
                .help("Sequencing depth [5]"),
        )
        .arg(
            Arg::new("read_length")
                .short('L')
                .long("read_length")
                .value_parser(value_parser!(usize))
                .help("Read length [150]"),
        )
        .arg(
            Arg::new("isize")
                .short('s')
                .long("isize")
                .value_parser(value_parser!(usize))
                .help("Mean insert size of paired-end reads [260]"),
        )
}

fn subcommand_amplify() -> Command {
    let command = Command::new("amplify")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Amplify the genome by MALBAC and write the full amplicons in FASTA.");
    amplification_args(command).arg(
        Arg::new("output")
            .short('o')
            .long("output")
            .value_name("FASTA")
            .required(true)
            .help("Output FASTA file."),
    )
}

fn subcommand_pipeline() -> Command {
    Command::new("pipeline")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Run genreads based on the given TOML file.")
        .arg(
            Arg::new("profile")
                .short('p')
                .long("profile")
                .required(true)
                .help("TOML configuration file."),
        )
}

pub fn scsim_parser() -> Command {
    Command::new("scsim")
        .version("0.1")
        .author("Bansho Masutani <ban-m@g.ecc.u-tokyo.ac.jp>")
        .about("Single cell sequencing simulator with MALBAC amplification")
        .arg_required_else_help(true)
        .subcommand(subcommand_genreads())
        .subcommand(subcommand_amplify())
        .subcommand(subcommand_pipeline())
}

/// Build the configuration from the arguments of `genreads` or `amplify`.
/// Arguments not given keep their default values.
pub fn malbac_config(matches: &ArgMatches) -> MalbacConfig {
    let mut config = MalbacConfig::default();
    if let Some(&primers) = matches.get_one::<u32>("primers") {
        config.primers = primers;
    }
    if let Some(&gamma) = matches.get_one::<f64>("gamma") {
        config.gamma = gamma;
    }
    config.error_model = error_model(matches, config.error_model);
    if let Some(&len) = matches.get_one::<usize>("amplicon_min_len") {
        config.amplicon_min_len = len;
    }
    if let Some(&len) = matches.get_one::<usize>("amplicon_max_len") {
        config.amplicon_max_len = len;
    }
    if let Some(&size) = matches.get_one::<usize>("frag_min_size") {
        config.frag_min_size = size;
    }
    if let Some(&size) = matches.get_one::<usize>("frag_max_size") {
        config.frag_max_size = size;
    }
    if let Some(bases) = matches.get_one::<String>("bases") {
        config.bases = bases.clone();
    }
    if let Some(&threads) = matches.get_one::<usize>("threads") {
        config.threads = threads;
    }
    if let Some(&seed) = matches.get_one::<u64>("seed") {
        config.seed = seed;
    }
    // Sequencing parameters exist only in `genreads`.
    if let Ok(Some(layout)) = matches.try_get_one::<String>("layout") {
        config.layout = layout.parse().unwrap_or(ReadLayout::PE);
    }
    if let Ok(Some(&coverage)) = matches.try_get_one::<f64>("coverage") {
        config.coverage = coverage;
    }
    if let Ok(Some(&len)) = matches.try_get_one::<usize>("read_length") {
        config.read_length = len;
    }
    if let Ok(Some(&isize)) = matches.try_get_one::<usize>("isize") {
        config.isize = isize;
    }
    config
}

/// The error model from `--model` and the rates. Rates the chosen model does not use are reported and ignored.
fn error_model(matches: &ArgMatches, default: ErrorModel) -> ErrorModel {
    let model = matches.get_one::<String>("model").map(|x| x.as_str());
    let ber = matches.get_one::<f64>("ber").copied();
    let ador = matches.get_one::<f64>("ador").copied();
    let fpr = matches.get_one::<f64>("fpr").copied();
    let has_dropout_rates = ador.is_some() || fpr.is_some();
    let dropout = ErrorModel::DropoutAndFalsePositive {
        ador: ador.unwrap_or(DEFAULT_ADOR),
        fpr: fpr.unwrap_or(DEFAULT_FPR),
    };
    match model {
        Some("dropout") => {
            if ber.is_some() {
                warn!("--ber is ignored by the dropout model");
            }
            dropout
        }
        Some(_) => {
            if has_dropout_rates {
                warn!("--ador and --fpr are ignored by the substitution model");
            }
            ber.map(|ber| ErrorModel::Substitution { ber }).unwrap_or(default)
        }
        None if has_dropout_rates => dropout,
        None => ber.map(|ber| ErrorModel::Substitution { ber }).unwrap_or(default),
    }
}
