//! gpgenie: vanity ED25519 OpenPGP key miner.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use gpgenie::analyzer::Analyzer;
use gpgenie::config::{Config, EncryptionSource};
use gpgenie::constants;
use gpgenie::entity::EntityFactory;
use gpgenie::entity::encryptor::{PgpRecipientEncryptor, XChaChaEncryptor};
use gpgenie::env::Env;
use gpgenie::export::{self, Exporter};
use gpgenie::logging;
use gpgenie::models::KeySummary;
use gpgenie::pipeline::Pipeline;
use gpgenie::progress::{self, ProgressReporter};
use gpgenie::repository::{KeyQueries, KeyStore};
use gpgenie::scoring::ScoreTables;

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::args::{AnalyzeArgs, Cli, Command, ExportArgs, GenerateArgs, ShowQuery};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::Version) {
        return run_version();
    }

    let env = Env::real();
    let work_dir = std::env::current_dir().context("failed to resolve working directory")?;
    let mut config = Config::load(cli.config.as_deref(), &work_dir, &env)
        .context("failed to load configuration")?;
    cli::args::apply_global(&cli, &mut config);
    if let Command::Generate(ref args) = cli.command {
        args.apply(&mut config);
    }
    config.validate().context("invalid configuration")?;

    let directive = logging::resolve_directive(cli.verbose, &config.logging.level, &env);
    logging::init(&directive).context("failed to initialize logging")?;

    match cli.command {
        Command::Generate(args) => run_generate(args, &config).await,
        Command::Show { query } => run_show(query, &config),
        Command::Export(args) => run_export(args, &config),
        Command::Analyze(args) => run_analyze(args, &config),
        Command::Version => run_version(),
    }
}

/// Print version information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    Ok(())
}

fn open_store(config: &Config) -> Result<KeyStore> {
    let backend = config.database.resolved_backend();
    KeyStore::open(Some(backend), &config.database.url)
        .with_context(|| format!("failed to open {backend} key store"))
}

/// Mine keys until the configured total is reached or Ctrl-C is pressed.
async fn run_generate(args: GenerateArgs, config: &Config) -> Result<()> {
    let mut factory = EntityFactory::new(config.identity());
    let source = if args.no_encrypt {
        EncryptionSource::None
    } else {
        config
            .encryption_source()
            .context("failed to read encryption key")?
    };
    match source {
        EncryptionSource::Symmetric(key) => {
            let encryptor =
                XChaChaEncryptor::from_hex(&key).context("invalid encryption key")?;
            factory = factory.with_encryptor(Arc::new(encryptor));
        }
        EncryptionSource::Recipient(path) => {
            let encryptor = PgpRecipientEncryptor::from_file(&path)
                .with_context(|| format!("invalid recipient certificate {}", path.display()))?;
            tracing::info!(
                recipient = %encryptor.recipient_fingerprint(),
                "sealing private keys to OpenPGP recipient"
            );
            factory = factory.with_encryptor(Arc::new(encryptor));
        }
        EncryptionSource::None => {
            tracing::warn!("no encryption key configured; private keys are stored unencrypted")
        }
    }

    let store = open_store(config)?;
    let mut pipeline = Pipeline::new(
        config.pipeline_config(),
        factory,
        Arc::new(ScoreTables::new()),
    )
    .context("failed to set up pipeline")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing current batch");
                cancel.cancel();
            }
        });
    }

    let stop_progress = CancellationToken::new();
    let reporter = ProgressReporter::new(
        pipeline.counters(),
        config.generation.total_keys,
        !args.no_progress,
    )
    .spawn(progress::DEFAULT_INTERVAL, stop_progress.clone());

    let result = pipeline.run(store, &cancel).await;
    progress::shutdown(reporter, &stop_progress).await;

    let summary = result.context("key generation failed")?;
    print!("{}", args.format.render_run(&summary));
    Ok(())
}

fn run_show(query: ShowQuery, config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    let (records, format) = match query {
        ShowQuery::Top(args) => (store.top_by_score(args.limit), args.format),
        ShowQuery::Minimal(args) => (store.by_uniqueness_ascending(args.limit), args.format),
    };
    let records = records.context("failed to query keys")?;
    let keys: Vec<KeySummary> = records.iter().map(KeySummary::from).collect();
    print!("{}", format.render_keys(&keys));
    Ok(())
}

fn run_export(args: ExportArgs, config: &Config) -> Result<()> {
    use colored::Colorize;

    let mut exporter = Exporter::new(&args.output_dir);
    if args.decrypt {
        let key = config.encryption_key().context("failed to read encryption key")?;
        exporter = exporter.with_decryptor(export::decryptor(key.as_deref())?);
    }

    let mut store = open_store(config)?;
    let files = exporter
        .export(&mut store, &args.fingerprint)
        .context("export failed")?;

    println!(
        "  {} exported {}",
        "✔".green().bold(),
        files.fingerprint.bold()
    );
    println!("    {}  {}", "public:".dimmed(), files.public_key.display());
    println!("    {} {}", "private:".dimmed(), files.private_key.display());
    Ok(())
}

fn run_analyze(args: AnalyzeArgs, config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    let report = Analyzer::new(&mut store)
        .analyze()
        .context("failed to analyze keys")?;
    print!("{}", args.format.render_analysis(&report));
    Ok(())
}
