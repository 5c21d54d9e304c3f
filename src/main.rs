use anyhow::Context;
use clap::{Parser, Subcommand};
use radar_rainfall::config::PipelineConfig;
use radar_rainfall::core::{AccumulationEngine, BatchDispatcher};
use radar_rainfall::io::OdimReader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert every raw scan into a rainfall-intensity raster
    Process(DirArgs),

    /// Sum existing intensity rasters into accumulation windows
    Accumulate {
        /// Output root holding the intensity rasters
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Window length in hours; may be given more than once
        #[arg(short, long = "window")]
        windows: Vec<u32>,
    },

    /// Process, then accumulate
    Run(DirArgs),

    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(clap::Args)]
struct DirArgs {
    /// Directory of raw ODIM_H5 scans
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output root; intensities and accumulations go in sub-directories
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worker threads for scan processing
    #[arg(short, long)]
    workers: Option<usize>,
}

impl DirArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(input) = &self.input {
            config.paths.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            config.paths.output_dir = output.clone();
        }
        if self.workers.is_some() {
            config.batch.workers = self.workers;
        }
    }
}

/// `RUST_LOG` applies unless verbosity flags are given
fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.init();
}

fn process(config: &PipelineConfig) -> anyhow::Result<()> {
    let dispatcher = BatchDispatcher::new(
        OdimReader::new(),
        config.cleaning.clone(),
        config.conversion,
        config.batch.clone(),
    );
    let report = dispatcher
        .run(&config.paths.input_dir, &config.paths.intensity_dir())
        .context("Scan processing failed")?;

    for (file, reason) in &report.failed {
        log::warn!("  {}: {}", file.display(), reason);
    }
    println!(
        "Processed {} scans: {} written, {} already present, {} non-conforming, {} failed",
        report.total(),
        report.written,
        report.already_processed,
        report.non_conforming,
        report.failed.len()
    );
    Ok(())
}

fn accumulate(config: &PipelineConfig) -> anyhow::Result<()> {
    let engine = AccumulationEngine::new(config.accumulation.clone());
    let report = engine
        .run(&config.paths.intensity_dir(), &config.paths.accumulation_dir())
        .context("Accumulation failed")?;

    println!(
        "Accumulated {} products ({} anchors lacked history, {} failed)",
        report.written.len(),
        report.insufficient_history,
        report.failed.len()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match &cli.command {
        Command::Process(args) => {
            args.apply(&mut config);
            config.validate()?;
            process(&config)
        }
        Command::Accumulate { output, windows } => {
            if let Some(output) = output {
                config.paths.output_dir = output.clone();
            }
            if !windows.is_empty() {
                config.accumulation.windows_hours = windows.clone();
            }
            config.validate()?;
            accumulate(&config)
        }
        Command::Run(args) => {
            args.apply(&mut config);
            config.validate()?;
            process(&config)?;
            accumulate(&config)
        }
        Command::DefaultConfig => {
            print!("{}", PipelineConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}
