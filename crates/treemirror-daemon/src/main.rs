//! treemirror daemon - one-way mirroring of source trees into targets
//!
//! This binary:
//! - Loads the root list (YAML, or the legacy `source => target` list)
//! - Checks each root and skips the ones that cannot be mirrored
//! - Starts one watcher per root and the shared action queue
//! - Prints the status log to stdout (coloured text or JSON lines)
//! - Wipes roots on `--wipe` and on SIGUSR1
//! - Shuts down gracefully on SIGTERM/SIGINT
//!
//! Diagnostics go to stderr through `tracing`; the status log on stdout is
//! the user-facing output.

mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use treemirror_core::config::Config;
use treemirror_core::domain::RootDescriptor;
use treemirror_core::ports::{IStatusDisplay, TextStyle};
use treemirror_sync::service::MirrorService;

use display::{ConsoleDisplay, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "treemirrord", version, about = "Mirror folders one way as they change")]
struct Cli {
    /// Configuration file (YAML, or a legacy `source => target` list)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose diagnostics (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the status log as JSON lines
    #[arg(long)]
    json: bool,

    /// Wipe and recopy root INDEX once watching has started (repeatable)
    #[arg(long, value_name = "INDEX")]
    wipe: Vec<usize>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Loads the configuration the way the CLI asked for it
///
/// Without `--config`, the YAML file at [`Config::default_path`] is used if
/// present, then the legacy list at [`Config::legacy_path`].
fn load_config(explicit: Option<&Path>, display: &dyn IStatusDisplay) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = Config::default_path();
            if default.exists() {
                default
            } else {
                let legacy = Config::legacy_path();
                if !legacy.exists() {
                    anyhow::bail!(
                        "No configuration found at {} or {}",
                        default.display(),
                        legacy.display()
                    );
                }
                legacy
            }
        }
    };

    if is_yaml(&path) {
        return Config::load(&path)
            .with_context(|| format!("Unable to load configuration file: {}", path.display()));
    }

    let (config, malformed) = Config::load_arrow_list(&path)
        .with_context(|| format!("Unable to load configuration file: {}", path.display()))?;
    for problem in malformed {
        display.append_error(
            "Settings line does not match pattern (source => target): ",
            &problem.field,
        );
    }
    Ok(config)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Roots that pass their on-disk checks, keeping configured indices
fn checked_roots(config: &Config, display: &dyn IStatusDisplay) -> Vec<RootDescriptor> {
    config
        .roots
        .iter()
        .zip(config.descriptors())
        .filter_map(|(root, descriptor)| match root.check() {
            Ok(()) => Some(descriptor),
            Err(e) => {
                warn!(root = descriptor.index, error = %e, "Skipping root");
                display.append_error("", &e.to_string());
                None
            }
        })
        .collect()
}

fn show_banner(display: &dyn IStatusDisplay) {
    display.append_plain("treemirror ");
    display.append_text(env!("CARGO_PKG_VERSION"), TextStyle::Highlight);
    display.append_plain("\n");
}

fn show_root(display: &dyn IStatusDisplay, descriptor: &RootDescriptor) {
    let index = descriptor.index;
    display.append_text(&format!("{} ", index), TextStyle::Root(index));
    display.append_text(&descriptor.source.display().to_string(), TextStyle::Key);
    display.append_plain(" => ");
    display.append_text(&descriptor.target.display().to_string(), TextStyle::Key);
    display.append_plain("\n");
}

fn init_tracing(verbose: u8, configured: &str) {
    let level = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Signals
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// Resolves on each SIGUSR1; never resolves where that signal is unknown
struct WipeSignal {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl WipeSignal {
    fn install() -> Self {
        #[cfg(unix)]
        {
            let signal =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())
                    .map_err(|e| warn!(error = %e, "Failed to install SIGUSR1 handler"))
                    .ok();
            Self { signal }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            if let Some(signal) = self.signal.as_mut() {
                if signal.recv().await.is_some() {
                    return;
                }
            }
        }
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// Main loop
// ============================================================================

/// Why the main loop stopped
enum Stop {
    Shutdown,
    WorkerEnded(Result<(), treemirror_sync::QueueError>),
}

async fn run(cli: Cli, display: Arc<ConsoleDisplay>, shutdown: CancellationToken) -> Result<()> {
    show_banner(display.as_ref());

    let config = load_config(cli.config.as_deref(), display.as_ref())?;
    init_tracing(cli.verbose, &config.logging.level);

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            display.append_error("Invalid configuration: ", &problem.to_string());
        }
        anyhow::bail!("Configuration has {} problem(s)", problems.len());
    }

    let roots = checked_roots(&config, display.as_ref());
    if roots.is_empty() {
        anyhow::bail!("No usable roots configured");
    }
    for descriptor in &roots {
        show_root(display.as_ref(), descriptor);
    }
    display.expect_startup(roots.iter().map(|r| r.index));

    let mut service = MirrorService::start(&config, roots, display.clone(), shutdown.clone());
    for index in &cli.wipe {
        if !service.wipe(*index) {
            display.append_error("No such root to wipe: ", &index.to_string());
        }
    }

    let mut wipe_signal = WipeSignal::install();
    let stop = loop {
        let wipe_all = tokio::select! {
            _ = shutdown.cancelled() => break Stop::Shutdown,
            result = service.join_worker() => break Stop::WorkerEnded(result),
            _ = wipe_signal.recv() => true,
        };
        if wipe_all {
            info!("Received SIGUSR1, wiping every root");
            service.wipe_all();
        }
    };

    match stop {
        Stop::Shutdown => {
            service
                .shutdown()
                .await
                .context("Action queue failed while shutting down")?;
            let errors = display.status().errors;
            info!(errors, "treemirror shut down gracefully");
            Ok(())
        }
        Stop::WorkerEnded(result) => {
            result.context("Action queue stopped")?;
            anyhow::bail!("Action queue stopped unexpectedly")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let display = Arc::new(ConsoleDisplay::stdout(format));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = run(cli, display.clone(), shutdown).await;
    if let Err(e) = &result {
        display.append_error("Error: ", &format!("{e:#}"));
        error!(error = %e, "treemirror exiting with error");
    }
    result
}

// ============================================================================
// Tests
// ============================================================================
