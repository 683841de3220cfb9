#![forbid(unsafe_code)]

//! `inbox-relay` runs one watcher, the plan scheduler, or a log rotation
//! pass against a vault directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use inbox_relay::config::GlobalConfig;
use inbox_relay::poll::{LoopSummary, PollLoop, PollWorker};
use inbox_relay::source::FixtureReplay;
use inbox_relay::watchers;
use inbox_relay::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch the drop folder and create a review task per new file.
    Files,
    /// Poll the mailbox and create a response task per unread message.
    Mail {
        /// Replay the built-in demo messages instead of a live mailbox.
        #[arg(long)]
        demo: bool,
    },
    /// Inject a planning task whenever the queue holds unplanned work.
    Scheduler,
    /// Rotate oversized operational logs once and exit.
    RotateLogs,
}

#[derive(Debug, Parser)]
#[command(name = "inbox-relay", about = "Task queue producers for a vault directory", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the vault root.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(root) = args.root {
        config.root = root;
    }
    config.mail.apply_env()?;
    info!(
        root = %config.root.display(),
        queue = %config.queue_dir().display(),
        "configuration loaded"
    );

    match args.command {
        Command::Files => {
            run_until_shutdown(watchers::file_watcher(&config)).await;
        }
        Command::Mail { demo } => run_mail(&config, demo).await?,
        Command::Scheduler => {
            run_until_shutdown(watchers::plan_scheduler(&config)).await;
        }
        Command::RotateLogs => {
            let report = watchers::rotate_logs(&config);
            info!(
                checked = report.checked,
                rotated = report.rotated.len(),
                failed = report.failed.len(),
                "rotation pass finished"
            );
            if !report.failed.is_empty() {
                return Err(AppError::Rotation(format!(
                    "{} log(s) could not be rotated",
                    report.failed.len()
                )));
            }
        }
    }

    Ok(())
}

async fn run_mail(config: &GlobalConfig, demo: bool) -> Result<()> {
    if !demo {
        match config.mail.resolve_auth().await {
            Ok(auth) => {
                // The binary links no IMAP transport.
                error!(
                    user = %auth.user(),
                    scheme = auth.scheme(),
                    "mailbox credentials found but no mail transport is linked into this binary"
                );
                return Err(AppError::Config(
                    "live mailbox polling requires an embedding application to supply a MailTransport"
                        .into(),
                ));
            }
            Err(err) if err.is_fallback() => {
                warn!(%err, "mailbox credentials not configured, running in demo mode");
            }
            Err(err) => return Err(err),
        }
    }

    run_until_shutdown(watchers::mail_watcher(config, FixtureReplay::demo())).await;
    Ok(())
}

async fn run_until_shutdown<W: PollWorker + 'static>(mut poll: PollLoop<W>) -> LoopSummary {
    let ct = CancellationToken::new();
    let loop_ct = ct.clone();
    let handle = tokio::spawn(async move { poll.run(loop_ct).await });

    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    match handle.await {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                recoveries = summary.recoveries,
                created = summary.created,
                "shutdown complete"
            );
            summary
        }
        Err(err) => {
            error!(%err, "poll loop task failed");
            LoopSummary::default()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
