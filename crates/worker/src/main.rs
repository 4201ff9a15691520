use anyhow::Context;
use clap::Parser;
use pricetargets_core::ingest::manager::FinanceDataManager;
use pricetargets_core::progress::ConsoleProgress;
use pricetargets_core::run::{Pipeline, RetryPolicy};
use pricetargets_core::storage::cache::FileStockInfoCache;
use pricetargets_core::storage::lock;
use pricetargets_core::storage::report::FileReportStorage;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod universe;

#[derive(Debug, Parser)]
#[command(name = "pricetargets_worker")]
struct Args {
    /// Comma separated tickers. Overrides the tickers file.
    #[arg(long)]
    tickers: Option<String>,

    /// File with one ticker per line.
    #[arg(long)]
    tickers_file: Option<PathBuf>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Attempts per ticker on transient failures; 0 retries forever.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Remove a lock left behind by a run that died without releasing it.
    #[arg(long)]
    break_lock: bool,

    /// Load settings and the ticker universe, then exit without fetching.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = pricetargets_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Some(dir) = args.cache_dir.clone() {
        settings.cache_dir = dir;
    }
    if let Some(dir) = args.report_dir.clone() {
        settings.report_dir = dir;
    }
    if let Some(n) = args.max_attempts {
        settings.retry_max_attempts = (n != 0).then_some(n);
    }

    let mut universe_opts = universe::UniverseOptions::from_env();
    if let Some(t) = args.tickers.clone() {
        universe_opts.inline = Some(t);
    }
    if let Some(f) = args.tickers_file.clone() {
        universe_opts.tickers_file = f;
    }

    let tickers = match universe::load_tickers(&universe_opts) {
        Ok(t) => t,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "failed to load ticker universe");
            return Err(err);
        }
    };

    if args.dry_run {
        tracing::info!(
            dry_run = true,
            tickers_len = tickers.len(),
            cache_dir = %settings.cache_dir.display(),
            report_dir = %settings.report_dir.display(),
            finnhub_token = settings.finnhub_token.is_some(),
            "price target run (dry-run)"
        );
        return Ok(());
    }

    if args.break_lock {
        tracing::warn!(cache_dir = %settings.cache_dir.display(), "breaking run lock");
        lock::release_run_lock(&settings.cache_dir).await?;
    }

    let acquired = lock::try_acquire_run_lock(&settings.cache_dir).await?;
    if !acquired {
        tracing::warn!(cache_dir = %settings.cache_dir.display(), "run lock not acquired; another run in progress");
        return Ok(());
    }

    let result = run(&settings, &tickers).await;

    let _ = lock::release_run_lock(&settings.cache_dir).await;

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "price target run failed; cache kept for resume");
    }
    result
}

async fn run(settings: &pricetargets_core::config::Settings, tickers: &[String]) -> anyhow::Result<()> {
    let manager = FinanceDataManager::from_settings(settings)?;
    let cache = FileStockInfoCache::open(&settings.cache_dir).await?;
    let storage = FileReportStorage::new(&settings.report_dir);
    let progress = ConsoleProgress;
    let retry = RetryPolicy::from_settings(settings);

    let pipeline = Pipeline::new(&manager, &cache, &storage, &progress, retry);

    let summary = until_interrupted(pipeline.run(tickers), tokio::signal::ctrl_c()).await?;
    tracing::info!(
        report = %summary.report_location,
        items = summary.items,
        fetched = summary.fetched,
        from_cache = summary.from_cache,
        unavailable = summary.unavailable.len(),
        "report persisted"
    );
    Ok(())
}

/// Races the run against an interrupt. An interrupt is an error so the process
/// exits non-zero; whatever the run already cached stays on disk.
async fn until_interrupted<T>(
    work: impl std::future::Future<Output = anyhow::Result<T>>,
    interrupt: impl std::future::Future<Output = std::io::Result<()>>,
) -> anyhow::Result<T> {
    tokio::select! {
        res = work => res,
        signal = interrupt => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::warn!("interrupted; cached tickers will be skipped on the next run");
            anyhow::bail!("interrupted before the report was saved")
        }
    }
}

fn init_sentry(settings: &pricetargets_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
