use std::path::Path;
#[macro_use]
extern crate log;

fn main() -> std::io::Result<()> {
    let matches = scsim_cli::scsim_commands::scsim_parser().get_matches();
    let start = std::time::Instant::now();
    if let Some(("pipeline", sub_m)) = matches.subcommand() {
        let path = get_path(sub_m, "profile")?;
        let file = std::fs::read_to_string(path)?;
        let config: scsim_cli::pipeline::PipelineConfig = toml::from_str(&file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        scsim_cli::pipeline::run_pipeline(&config)?;
        info!("ELAPSED\t{:.3}s", start.elapsed().as_secs_f64());
        return Ok(());
    }
    if let Some((_, sub_m)) = matches.subcommand() {
        let level = match sub_m.get_count("verbose") {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }
    match matches.subcommand() {
        Some(("genreads", sub_m)) => genreads(sub_m)?,
        Some(("amplify", sub_m)) => amplify(sub_m)?,
        _ => unreachable!(),
    }
    info!("ELAPSED\t{:.3}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn get_path<'a>(matches: &'a clap::ArgMatches, id: &str) -> std::io::Result<&'a Path> {
    matches
        .get_one::<String>(id)
        .map(Path::new)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{} is required", id)))
}

fn genreads(matches: &clap::ArgMatches) -> std::io::Result<()> {
    debug!("START\tGenreads");
    let config = scsim_cli::scsim_commands::malbac_config(matches);
    let input = get_path(matches, "input")?;
    let prefix = get_path(matches, "output")?;
    let profile = matches.get_one::<String>("profile").map(Path::new);
    let written = scsim_cli::pipeline::generate_reads(input, prefix, profile, &config)?;
    info!("WRITTEN\t{}", written);
    Ok(())
}

fn amplify(matches: &clap::ArgMatches) -> std::io::Result<()> {
    debug!("START\tAmplify");
    let config = scsim_cli::scsim_commands::malbac_config(matches);
    let input = get_path(matches, "input")?;
    let output = get_path(matches, "output")?;
    let amplicons = scsim_cli::pipeline::amplify(input, output, &config)?;
    info!("AMPLICONS\t{}", amplicons);
    Ok(())
}
