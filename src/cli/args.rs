//! Clap argument types and config overrides.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use gpgenie::analyzer::AnalysisReport;
use gpgenie::config::Config;
use gpgenie::constants::DEFAULT_EXPORT_DIR;
use gpgenie::models::KeySummary;
use gpgenie::output::OutputRenderer;
use gpgenie::output::json::JsonRenderer;
use gpgenie::output::terminal::TerminalRenderer;
use gpgenie::pipeline::RunSummary;

/// Vanity ED25519 OpenPGP key miner.
#[derive(Parser, Debug)]
#[command(name = "gpgenie", version = gpgenie::constants::VERSION)]
pub struct Cli {
    /// Config file to use instead of ./gpgenie.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides config and GPGENIE_DATABASE_URL).
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Generate keys and store the ones that clear the acceptance policy.
    Generate(GenerateArgs),

    /// List stored keys.
    Show {
        #[command(subcommand)]
        query: ShowQuery,
    },

    /// Write a stored key pair to disk.
    Export(ExportArgs),

    /// Print aggregate statistics over stored keys.
    Analyze(AnalyzeArgs),

    /// Print version information.
    Version,
}

/// Arguments for the `generate` subcommand.
#[derive(Parser, Debug, Default)]
pub struct GenerateArgs {
    /// Number of candidates to generate.
    #[arg(long)]
    pub total: Option<u64>,

    /// Keys persisted per transaction.
    #[arg(long)]
    pub batch: Option<usize>,

    /// Generator worker count.
    #[arg(long)]
    pub generators: Option<usize>,

    /// Scorer worker count.
    #[arg(long)]
    pub scorers: Option<usize>,

    /// Score threshold of the acceptance policy.
    #[arg(long, allow_negative_numbers = true)]
    pub min_score: Option<i32>,

    /// Unique digit threshold of the acceptance policy.
    #[arg(long)]
    pub max_unique: Option<i32>,

    /// Store private keys unencrypted even when a key is configured.
    #[arg(long, default_value_t = false)]
    pub no_encrypt: bool,

    /// Disable the live progress line.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    /// Format of the final run summary.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,
}

/// `show` subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum ShowQuery {
    /// Highest scoring keys first.
    Top(ListArgs),
    /// Keys with the fewest distinct digits first.
    Minimal(ListArgs),
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Number of keys to list.
    #[arg(short = 'n', long = "limit", default_value_t = 10)]
    pub limit: usize,

    /// Output format.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,
}

/// Arguments for the `export` subcommand.
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Fingerprint or a unique suffix of it (case-insensitive).
    #[arg(long)]
    pub fingerprint: String,

    /// Directory the key files are written to.
    #[arg(long, default_value = DEFAULT_EXPORT_DIR)]
    pub output_dir: PathBuf,

    /// Decrypt the stored private key with the configured encryption key.
    #[arg(long, default_value_t = false)]
    pub decrypt: bool,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Output format.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl OutputFormat {
    fn renderer(&self) -> &'static dyn OutputRenderer {
        match self {
            OutputFormat::Terminal => &TerminalRenderer,
            OutputFormat::Json => &JsonRenderer,
        }
    }

    pub fn render_keys(&self, keys: &[KeySummary]) -> String {
        self.renderer().render_keys(keys)
    }

    pub fn render_analysis(&self, report: &AnalysisReport) -> String {
        self.renderer().render_analysis(report)
    }

    pub fn render_run(&self, summary: &RunSummary) -> String {
        self.renderer().render_run(summary)
    }
}

/// Apply the global `--database` flag.
pub fn apply_global(cli: &Cli, config: &mut Config) {
    if let Some(ref url) = cli.database {
        config.database.url = url.clone();
    }
}

impl GenerateArgs {
    /// Layer the flags that were given on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        let generation = &mut config.generation;
        if let Some(total) = self.total {
            generation.total_keys = total;
        }
        if let Some(batch) = self.batch {
            generation.batch_size = batch;
        }
        if let Some(generators) = self.generators {
            generation.generator_workers = generators;
        }
        if let Some(scorers) = self.scorers {
            generation.scorer_workers = scorers;
        }
        if let Some(min_score) = self.min_score {
            config.acceptance.min_score = min_score;
        }
        if let Some(max_unique) = self.max_unique {
            config.acceptance.max_unique_digits = max_unique;
        }
    }
}
