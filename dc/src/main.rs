//! Duncall - collections call orchestrator
//!
//! CLI entry point for ingesting borrowers, running call batches, and
//! projecting reports.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result, bail};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use duncall::analysis::{ConversationAnalyzer, GroqClassifier};
use duncall::cli::{Cli, Command};
use duncall::config::Config;
use duncall::dispatch::CallDispatcher;
use duncall::domain::{BorrowerProfile, Category};
use duncall::report::{self, ReportProjector};
use duncall::store::{BorrowerStore, ResetTarget};
use duncall::telephony::{CallPlacer, Scenario, SimulatedPlacer};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("duncall")
        .join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file =
        fs::File::create(log_dir.join("duncall.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref())
        .context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Ingest { owner, file } => cmd_ingest(&config, &owner, &file).await,
        Command::Dispatch {
            owner,
            category,
            max_parallel,
        } => cmd_dispatch(&config, &owner, category.as_deref(), max_parallel).await,
        Command::Report { owner, csv, output } => {
            cmd_report(&config, &owner, csv, output.as_deref()).await
        }
        Command::Reset {
            owner,
            borrower,
            all,
        } => cmd_reset(&config, &owner, borrower, all).await,
    }
}

fn open_store(config: &Config) -> Result<BorrowerStore> {
    let db_path = config.db_path()?;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    debug!("open_store: opening {}", db_path.display());
    Ok(BorrowerStore::open(&db_path)?)
}

fn build_placer(config: &Config) -> Result<Arc<dyn CallPlacer>> {
    let scenario = match &config.telephony.scenario {
        Some(name) => Some(
            Scenario::parse(name)
                .ok_or_else(|| eyre::eyre!("unknown telephony scenario {:?}", name))?,
        ),
        None => None,
    };
    Ok(Arc::new(
        SimulatedPlacer::new(scenario).with_failure_rate(config.telephony.failure_rate),
    ))
}

fn build_analyzer(config: &Config) -> Result<ConversationAnalyzer> {
    let api_key = config.resolve_api_key()?;
    let classifier = GroqClassifier::new(&config.llm.base_url, &config.llm.model, &api_key)?;
    Ok(ConversationAnalyzer::new(Arc::new(classifier)))
}

/// Load borrower profiles from a JSON file
async fn cmd_ingest(config: &Config, owner: &str, file: &std::path::Path) -> Result<()> {
    debug!("cmd_ingest: called with {}", file.display());
    let content = fs::read_to_string(file)
        .wrap_err_with(|| format!("reading borrower file {}", file.display()))?;
    let profiles: Vec<BorrowerProfile> = serde_json::from_str(&content)
        .wrap_err_with(|| format!("parsing borrower file {}", file.display()))?;

    let store = open_store(config)?;
    let count = store.ingest(owner, profiles).await?;
    store.shutdown().await;

    println!("Ingested {} borrower(s) for owner '{}'", count, owner);
    Ok(())
}

/// Run a call batch
async fn cmd_dispatch(
    config: &Config,
    owner: &str,
    category: Option<&str>,
    max_parallel: Option<usize>,
) -> Result<()> {
    debug!(?category, ?max_parallel, "cmd_dispatch: called");
    let category = match category {
        Some(raw) => match Category::parse(raw) {
            Some(c) => Some(c),
            None => bail!("unknown category {:?} (use consistent, inconsistent, or overdue)", raw),
        },
        None => None,
    };

    let store = open_store(config)?;
    let placer = build_placer(config)?;
    let analyzer = build_analyzer(config)?;
    let dispatcher = CallDispatcher::new(
        store.clone(),
        placer,
        analyzer,
        config.dispatch.clone(),
    );

    // Ctrl+C cancels the batch; in-flight claims are released before exit
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cmd_dispatch: interrupt received, cancelling batch");
            let _ = cancel_tx.send(true);
        }
    });

    println!("Dispatching calls for owner '{}'...", owner);
    let summary = dispatcher
        .dispatch_with_cancel(owner, category, max_parallel, cancel_rx)
        .await?;
    store.shutdown().await;

    println!();
    println!("Batch finished: {}", summary);
    Ok(())
}

/// Project the borrower table
async fn cmd_report(
    config: &Config,
    owner: &str,
    csv: bool,
    output: Option<&std::path::Path>,
) -> Result<()> {
    debug!(csv, ?output, "cmd_report: called");
    let store = open_store(config)?;
    let projector = ReportProjector::new(store.clone());
    let records = projector.project(owner).await?;
    store.shutdown().await;

    if records.is_empty() {
        println!("No borrowers found for owner '{}'", owner);
        return Ok(());
    }

    let rendered = if csv {
        report::to_csv(&records)
    } else {
        render_table(&records)
    };

    match output {
        Some(path) => {
            fs::write(path, &rendered)
                .wrap_err_with(|| format!("writing report to {}", path.display()))?;
            println!("Wrote {} record(s) to {}", records.len(), path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn render_table(records: &[duncall::domain::BorrowerRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:<20} {:<12} {:<16} {:<12} {}\n",
        "ID", "NAME", "STATUS", "INTENT", "FOLLOW-UP", "SUMMARY"
    ));
    out.push_str(&format!("{}\n", "-".repeat(90)));
    for record in records {
        let intent = record.intent.map(|i| i.to_string()).unwrap_or_default();
        let follow_up = record
            .follow_up_date
            .map(|d| d.to_string())
            .unwrap_or_default();
        let summary = record.ai_summary.as_deref().unwrap_or("");
        let summary: String = summary.chars().take(40).collect();
        out.push_str(&format!(
            "{:<12} {:<20} {:<12} {:<16} {:<12} {}\n",
            record.id, record.name, record.call_status, intent, follow_up, summary
        ));
    }
    out
}

/// Reset borrower call state
async fn cmd_reset(config: &Config, owner: &str, borrower: Option<String>, all: bool) -> Result<()> {
    debug!(?borrower, all, "cmd_reset: called");
    let target = match borrower {
        Some(id) => ResetTarget::One(id),
        None if all => ResetTarget::All,
        // clap's arg group guarantees one of the two
        None => bail!("nothing to reset: pass --borrower <ID> or --all"),
    };

    let store = open_store(config)?;
    let count = store.reset(owner, target).await?;
    store.shutdown().await;

    println!("Reset {} borrower(s) for owner '{}'", count, owner);
    Ok(())
}
