//! `limefrog` -- command-line client for the site-check service.
//!
//! Submits URL lists as jobs, follows them until they finish, survives
//! restarts by resuming the saved job, and downloads the results.
//!
//! # Environment variables
//!
//! | Variable                | Default                 | Description                          |
//! |-------------------------|-------------------------|--------------------------------------|
//! | `LIMEFROG_BASE_URL`     | `http://localhost:5000` | Service root URL                     |
//! | `LIMEFROG_STATE_DIR`    | `.limefrog`             | Directory for the saved job and form |
//! | `POLL_INTERVAL_MS`      | `2000`                  | Job status polling interval          |
//! | `HEARTBEAT_INTERVAL_MS` | `5000`                  | Session heartbeat interval           |
//! | `STATS_INTERVAL_MS`     | `3000`                  | Shared statistics interval           |
//! | `RESOURCE_INTERVAL_MS`  | `5000`                  | Host resource usage interval         |
//! | `REQUEST_TIMEOUT_SECS`  | `30`                    | Per-request HTTP timeout             |
//! | `RUST_LOG`              | `limefrog=info,...`     | Log filter (logs go to stderr)       |

mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use limefrog_client::config::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::App;
use crate::commands::{DownloadArgs, SubmitArgs};

#[derive(Parser)]
#[command(name = "limefrog")]
#[command(about = "Submit and track site-check jobs", long_about = None)]
struct Cli {
    /// Service root URL (overrides LIMEFROG_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory for saved client state (overrides LIMEFROG_STATE_DIR)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit URLs for checking and follow the job until it finishes
    Submit(SubmitArgs),
    /// Follow the job saved by an earlier run, if any
    Resume,
    /// Ask the service to stop the saved job (or the given one)
    Stop {
        /// Job id; defaults to the saved job
        job: Option<String>,
    },
    /// Download the results of the saved job
    Download(DownloadArgs),
    /// Follow the saved job and show service activity until interrupted
    Watch,
    /// Forget the saved job and the saved form
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "limefrog=info,limefrog_client=info,limefrog_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(state_dir) = cli.state_dir {
        config.state_dir = state_dir;
    }

    tracing::debug!(
        base_url = %config.base_url,
        state_dir = %config.state_dir.display(),
        "Starting limefrog",
    );

    let app = App::new(config)?;

    let result = match cli.command {
        Command::Submit(args) => commands::submit(&app, args).await,
        Command::Resume => commands::resume(&app).await,
        Command::Stop { job } => commands::stop(&app, job).await,
        Command::Download(args) => commands::download(&app, args).await,
        Command::Watch => commands::watch(&app).await,
        Command::Clear => commands::clear(&app),
    };

    app.shutdown().await;
    result
}
