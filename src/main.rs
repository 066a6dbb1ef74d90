//! SharpXch value-betting bot.
//!
//! Entry point. Loads `.env` and `config.toml`, initialises structured
//! logging, wires the backoffice client, then performs one
//! fetch → scan → execute run. Exits non-zero if the run aborts.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use sharpxch::config::AppConfig;
use sharpxch::diagnostics;
use sharpxch::engine::{Executor, Pipeline, PipelineOptions, RunReport};
use sharpxch::exchange::{ApiGateway, HttpTransport, ReqwestTransport, SessionManager};
use sharpxch::storage::snapshots::load_estimates;
use sharpxch::storage::{JsonFileArchive, NullArchive, ResponseArchive, SnapshotStore};
use sharpxch::strategy::{DailyLossGuard, EstimateBook, ValueBettingStrategy};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();
    init_logging();

    match run().await {
        Ok(report) if !report.aborted => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = format!("{e:#}"), "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RunReport> {
    let config_path =
        std::env::var("SHARPXCH_CONFIG").map_or_else(|_| PathBuf::from("config.toml"), PathBuf::from);
    let mut cfg = AppConfig::load(&config_path)?;
    cfg.apply_env_overrides()?;

    info!(
        agent_name = %cfg.agent.name,
        base_url = %cfg.api.base_url,
        dry_run = cfg.betting.dry_run,
        max_stake = %cfg.betting.max_stake,
        max_daily_loss = %cfg.betting.max_daily_loss,
        "SharpXch bot starting up"
    );

    // -- Initialise components -------------------------------------------

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);

    let archive: Arc<dyn ResponseArchive> = if cfg.storage.save_responses {
        Arc::new(JsonFileArchive::new(&cfg.storage.responses_dir)?)
    } else {
        Arc::new(NullArchive)
    };

    let session = Arc::new(
        SessionManager::new(
            transport.clone(),
            archive.clone(),
            &cfg.api.base_url,
            &cfg.api.auth_endpoint,
            cfg.credentials().context("API credentials are not configured")?,
        )
        .with_token_lifetime(cfg.token_lifetime()),
    );

    let gateway = Arc::new(ApiGateway::new(&cfg.api.base_url, session, transport, archive));
    let snapshots = Arc::new(SnapshotStore::new(&cfg.storage.data_dir)?);

    let estimates = match &cfg.strategy.estimates_path {
        Some(path) if path.exists() => load_estimates(path)?,
        Some(path) => {
            warn!(path = %path.display(), "Estimates file not found, no value scan this run");
            EstimateBook::new()
        }
        None => EstimateBook::new(),
    };

    // Bets already placed today count against the daily limit.
    let committed = snapshots.committed_stake(Utc::now().date_naive())?;
    if !committed.is_zero() {
        info!(committed = %committed, "Stakes already committed today");
    }

    let executor = Executor::new(
        gateway.clone(),
        DailyLossGuard::with_committed(cfg.betting.max_daily_loss, committed),
        cfg.betting.dry_run,
    )
    .with_snapshots(snapshots.clone());

    let mut pipeline = Pipeline::new(
        gateway.clone(),
        ValueBettingStrategy::new(cfg.value_config()),
        estimates,
        executor,
        PipelineOptions {
            sport_id: cfg.strategy.sport_id,
            request_delay: cfg.request_delay(),
        },
    )
    .with_snapshots(snapshots);

    // -- Run ---------------------------------------------------------------

    if cfg.agent.explore_endpoints {
        match diagnostics::explore_endpoints(&gateway).await {
            Ok(results) => {
                for (path, check) in &results {
                    info!(path = %path, status = ?check.status, available = check.available, "Endpoint");
                }
            }
            Err(e) => warn!(error = %e, "Endpoint exploration failed"),
        }
    }

    let report = tokio::select! {
        report = pipeline.run() => report,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping");
            anyhow::bail!("interrupted");
        }
    };

    for step in &report.steps {
        let status = if step.success { "ok" } else { "FAILED" };
        info!(step = %step.name, status, detail = %step.detail, "Step");
    }
    if let Some(execution) = &report.execution {
        info!(
            placed = execution.executed.len(),
            failed = execution.failed.len(),
            staked = %execution.total_staked,
            "Execution summary"
        );
    }

    gateway.session().logout().await;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sharpxch=info"));

    let json_logging = std::env::var("SHARPXCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
