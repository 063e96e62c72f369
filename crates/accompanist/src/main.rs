//! accompanist - chord inference for sung melodies
//!
//! Subcommands:
//! - `accompanist build-model` - Build (or refresh) the cached corpus model
//! - `accompanist pitch-table` - Count melody pitch classes per corpus chord
//! - `accompanist infer <wav>` - Pick a chord for every measure of a recording
//! - `accompanist config` - Show the effective configuration

use std::path::PathBuf;

use accompanist_conf::AccompanistConfig;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;
mod model;

#[derive(Parser)]
#[command(name = "accompanist")]
#[command(about = "Infer a chord per measure for a sung melody")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ./accompanist.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the corpus model and store it in the model cache
    BuildModel {
        /// Rebuild even if the cache already holds this corpus
        #[arg(short, long)]
        force: bool,

        /// Also write transition matrices as percentage CSVs into this directory
        #[arg(long)]
        diagnostics: Option<PathBuf>,
    },

    /// Build the per-chord pitch-class table from corpus melodies
    PitchTable {
        /// Output CSV (defaults to paths.pitch_table)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Infer chords for a vocal recording
    Infer {
        /// Mono or stereo WAV of the vocal take
        audio: PathBuf,

        /// Transcribed melody MIDI (defaults to the audio path with .mid)
        #[arg(short, long)]
        midi: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = AccompanistConfig::load_with_sources_from(cli.config.as_deref())
        .context("loading configuration")?;

    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.telemetry.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::BuildModel { force, diagnostics } => {
            commands::build_model(&config, force, diagnostics.as_deref())?;
        }
        Commands::PitchTable { output } => {
            commands::pitch_table(&config, output.as_deref())?;
        }
        Commands::Infer { audio, midi, json } => {
            commands::infer(&config, &audio, midi.as_deref(), json)?;
        }
        Commands::Config => {
            commands::show_config(&config, &sources);
        }
    }

    Ok(())
}
