//! Command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use limefrog_client::download::{DownloadDispatcher, FileDownloadSink};
use limefrog_client::events::ClientEvent;
use limefrog_core::download::DownloadFormat;
use limefrog_core::types::JobHandle;
use limefrog_store::draft::{self, FormDraft};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::app::App;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// URLs to check; replaces the saved URL list when given
    urls: Vec<String>,

    /// Read the URL list (one per line) from a file
    #[arg(long, conflicts_with = "urls")]
    file: Option<PathBuf>,

    /// Parallel requests (1-10)
    #[arg(long)]
    concurrency: Option<u32>,

    /// Per-URL timeout in seconds (3-120)
    #[arg(long)]
    timeout: Option<u32>,

    /// Retries per URL (0-5)
    #[arg(long)]
    retries: Option<u32>,

    /// Preferred name for downloaded results
    #[arg(long)]
    filename: Option<String>,

    /// Enable a check flag, e.g. `--enable collect_h4`
    #[arg(long, value_name = "FLAG")]
    enable: Vec<String>,

    /// Disable a check flag, e.g. `--disable check_robots`
    #[arg(long, value_name = "FLAG")]
    disable: Vec<String>,

    /// Return right after submitting instead of following the job
    #[arg(long)]
    detach: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Raw table
    Csv,
    /// Spreadsheet
    Xlsx,
    /// Spreadsheet of extracted headings
    Headings,
    /// Job execution log
    Log,
}

impl From<FormatArg> for DownloadFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => Self::Csv,
            FormatArg::Xlsx => Self::Xlsx,
            FormatArg::Headings => Self::HeadingsXlsx,
            FormatArg::Log => Self::JobLog,
        }
    }
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[arg(long, value_enum, default_value = "csv")]
    format: FormatArg,

    /// Directory to save into
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// File name override; defaults to the saved form's filename
    #[arg(long)]
    filename: Option<String>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub async fn submit(app: &App, args: SubmitArgs) -> anyhow::Result<()> {
    let mut form = draft::load_all(app.store.as_ref());
    apply_submit_args(&mut form, &args)?;
    if let Err(e) = draft::save_all(app.store.as_ref(), &form) {
        tracing::warn!(error = %e, "Failed to save form draft");
    }

    let mut events = app.controller.events().subscribe();
    app.start_signals();

    let job = match app.controller.submit(form.to_request()).await {
        Ok(job) => job,
        Err(e) => bail!("{e}"),
    };
    println!("Job {job} submitted");

    if args.detach {
        return Ok(());
    }
    follow(&mut events).await;
    Ok(())
}

pub async fn resume(app: &App) -> anyhow::Result<()> {
    let mut events = app.controller.events().subscribe();
    app.start_signals();

    if app.controller.resume_if_persisted().is_none() {
        println!("No saved job to resume");
        return Ok(());
    }
    follow(&mut events).await;
    Ok(())
}

pub async fn stop(app: &App, job: Option<String>) -> anyhow::Result<()> {
    let job = match job {
        Some(id) => JobHandle::new(id),
        None => match app.controller.persisted_job() {
            Some(job) => job,
            None => bail!("No saved job to stop"),
        },
    };

    app.controller
        .stop(&job)
        .await
        .with_context(|| format!("Failed to stop job {job}"))?;
    println!("Stop requested for job {job}");
    Ok(())
}

pub async fn download(app: &App, args: DownloadArgs) -> anyhow::Result<()> {
    let mut events = app.controller.events().subscribe();
    let Some(job) = app.controller.resume_if_persisted() else {
        bail!("No saved job to download");
    };

    // Results only exist once the job is terminal.
    let last = follow(&mut events).await;
    if !app.controller.download_ready() {
        match last {
            Some(ClientEvent::JobNotFound { .. }) => bail!("Job {job} no longer exists"),
            _ => bail!("Job {job} has no downloadable results"),
        }
    }

    let form = draft::load_all(app.store.as_ref());
    let filename = args.filename.or_else(|| form.runtime.filename.clone());
    let sink = Arc::new(FileDownloadSink::new(app.http.clone(), &args.out_dir));
    let dispatcher = DownloadDispatcher::new(app.config.base_url.clone(), sink.clone());

    let request = dispatcher
        .dispatch(
            &app.controller,
            args.format.into(),
            filename.as_deref(),
            &form.check_options(),
        )
        .await
        .context("Download failed")?;

    println!("Saved {}", sink.target_path(&request).display());
    Ok(())
}

pub async fn watch(app: &App) -> anyhow::Result<()> {
    let mut events = app.controller.events().subscribe();
    app.start_signals();

    if app.controller.resume_if_persisted().is_none() {
        println!("No saved job; showing service activity only");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            received = events.recv() => match received {
                Ok(event) => render(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

pub fn clear(app: &App) -> anyhow::Result<()> {
    app.controller.forget();
    draft::clear_all(app.store.as_ref()).context("Failed to clear saved form")?;
    println!("Cleared saved job and form");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn apply_submit_args(form: &mut FormDraft, args: &SubmitArgs) -> anyhow::Result<()> {
    if let Some(path) = &args.file {
        form.urls = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read URL list from {}", path.display()))?;
    } else if !args.urls.is_empty() {
        form.urls = args.urls.join("\n");
    }

    if args.concurrency.is_some() {
        form.runtime.concurrency = args.concurrency;
    }
    if args.timeout.is_some() {
        form.runtime.timeout = args.timeout;
    }
    if args.retries.is_some() {
        form.runtime.retries = args.retries;
    }
    if let Some(filename) = &args.filename {
        form.runtime.filename = Some(filename.clone());
    }

    for flag in &args.enable {
        form.settings.insert(flag.clone(), true);
    }
    for flag in &args.disable {
        form.settings.insert(flag.clone(), false);
    }
    Ok(())
}

/// Print events until the job finishes, disappears, or the user
/// interrupts. Returns the event that ended the job, if any.
async fn follow(events: &mut broadcast::Receiver<ClientEvent>) -> Option<ClientEvent> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                println!("Interrupted. The job keeps running; `limefrog resume` follows it again.");
                return None;
            }
            received = events.recv() => match received {
                Ok(event) => {
                    render(&event);
                    if matches!(event, ClientEvent::Finished { .. } | ClientEvent::JobNotFound { .. }) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => return None,
            },
        }
    }
}

fn render(event: &ClientEvent) {
    match event {
        ClientEvent::Stats(stats) => {
            println!("Active users: {} | Queue: {}", stats.active_users, stats.queued);
        }
        ClientEvent::Resource(usage) => println!("{}", usage.summary()),
        ClientEvent::Finished { snapshot, .. } if snapshot.has_results() => {
            println!("{snapshot}");
            println!("Results ready: `limefrog download --format csv|xlsx|headings|log`");
        }
        // Already printed by the submit command itself.
        ClientEvent::Submitted { .. } => {}
        other => {
            if let Some(line) = other.status_line() {
                println!("{line}");
            }
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
