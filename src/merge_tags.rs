/*
cargo run --bin merge_tags

cargo run --bin merge_tags -- \
    --root /srv/game/external_tags \
    --report-collisions \
    --collisions-out external_tags/collisions.json \
    --log-dir logs
*/

mod merger;

use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use log::info;
use simplelog::{
    ColorChoice, CombinedLogger, Config as LogConfig, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

use merger::{MergeConfig, RunOutcome};

// the tag tooling lives next to the client it publishes into
const DEFAULT_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/external_tags");

/// Merge the tag fragments in a directory into one JSON file and publish a copy.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Base directory the default paths are resolved against
    #[arg(long, value_name = "PATH", default_value = DEFAULT_ROOT)]
    root: PathBuf,

    /// Directory holding the *.json fragments (default: <root>/extracted_data)
    #[arg(long = "input-dir", value_name = "PATH")]
    input_dir: Option<PathBuf>,

    /// Merged output file (default: <root>/extra_tags.json)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Client copy of the merged file
    /// (default: <root>/../client_v3/public/data/extra_tags.json)
    #[arg(short, long, value_name = "PATH")]
    publish: Option<PathBuf>,

    /// Log a warning for every key a later fragment overwrites
    #[arg(long)]
    report_collisions: bool,

    /// Also write the overwritten keys to this JSON file
    #[arg(long, value_name = "PATH")]
    collisions_out: Option<PathBuf>,

    /// Write a timestamped log file into this directory
    #[arg(long, value_name = "PATH")]
    log_dir: Option<PathBuf>,

    /// Debug-level console output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn merge_config(&self) -> MergeConfig {
        let mut config = MergeConfig::from_root(&self.root);
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(out) = &self.output {
            config.output_file = out.clone();
        }
        if let Some(dest) = &self.publish {
            config.publish_file = dest.clone();
        }
        config.report_collisions = self.report_collisions;
        config.collisions_out = self.collisions_out.clone();
        config
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(dir) = &cli.log_dir {
        create_dir_all(dir)?;
        let ts = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = dir.join(format!("merge_tags_{ts}.log"));
        loggers.push(WriteLogger::new(
            LevelFilter::Debug,
            LogConfig::default(),
            File::create(&log_path)?,
        ));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = cli.merge_config();
    info!("Input dir: {:?}", config.input_dir);
    info!("Output file: {:?}", config.output_file);
    info!("Publish to: {:?}", config.publish_file);

    match merger::run(&config)? {
        RunOutcome::InputDirCreated(dir) => info!("Nothing merged, {} was just created", dir.display()),
        RunOutcome::NoFragments(dir) => info!("Nothing merged, {} has no fragments", dir.display()),
        RunOutcome::Published {
            fragments,
            keys,
            collisions,
        } => info!(
            "Merged {fragments} file(s) into {keys} tag(s), {collisions} key(s) overwritten"
        ),
    }
    Ok(())
}
