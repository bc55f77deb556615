//! `logsift`: route JSON-lines log events from stdin.
//!
//! Each input line is one event:
//!
//! ```text
//! {"level":"INFO","message":"sync started","context":{"workspace_app_root":"/data/ws-1"}}
//! ```
//!
//! `timestamp` (epoch millis) is optional. Input ends at EOF, SIGINT or
//! SIGTERM, after which the ordered shutdown runs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use logsift::config::{load_config, load_from_env, LogRoutingConfig};
use logsift::event::{Event, Level};
use logsift::lifecycle::{shutdown_signal, LifecycleManager};
use logsift::observability::{init_logging, RoutingLayer};
use logsift::storage::{LocalDirectoryStore, ObjectStore};

#[derive(Parser)]
#[command(name = "logsift")]
#[command(about = "Route log events to per-workspace and per-job destinations", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults plus LOG_* environment variables when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root level, overriding configuration and LOG_LEVEL.
    #[arg(short, long)]
    level: Option<Level>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Diagnostics go to stderr from the start; routing is bound once the
    // destinations exist.
    let routing = RoutingLayer::unbound();
    init_logging(Some(routing.clone()))?;

    let mut config: LogRoutingConfig = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };
    if let Some(level) = cli.level {
        config.root_level = level;
    }

    let store: Option<Arc<dyn ObjectStore>> = config
        .remote
        .enabled
        .then(|| Arc::new(LocalDirectoryStore::new(&config.storage.root_dir)) as Arc<dyn ObjectStore>);

    let manager = LifecycleManager::start(config, store)?;
    routing.bind(manager.dispatcher());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        root_level = %manager.config().root_level,
        "logsift reading events from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut routed = 0u64;
    let mut rejected = 0u64;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match serde_json::from_str::<Event>(&line) {
                        Ok(event) => {
                            for error in manager.dispatch(&event) {
                                tracing::warn!(error = %error, "Event not delivered");
                            }
                            routed += 1;
                        }
                        Err(e) => {
                            rejected += 1;
                            tracing::warn!(error = %e, "Skipping malformed event line");
                        }
                    },
                    Ok(None) => {
                        tracing::info!("End of input");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }

    let report = manager.shutdown().await;
    tracing::info!(
        routed,
        rejected,
        sinks_stopped = report.sinks_stopped,
        "Shutdown complete"
    );
    Ok(())
}
