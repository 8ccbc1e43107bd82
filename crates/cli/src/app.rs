//! Wiring shared by all commands.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use limefrog_client::api::ServiceApi;
use limefrog_client::background::BackgroundTasks;
use limefrog_client::config::ClientConfig;
use limefrog_client::controller::JobController;
use limefrog_client::events::EventHub;
use limefrog_core::types::SessionIdentity;
use limefrog_store::identity::get_or_create_session_id;
use limefrog_store::{FileStore, MemoryStore};
use tokio_util::sync::CancellationToken;

pub struct App {
    pub config: ClientConfig,
    /// Durable store: saved job id and form draft.
    pub store: Arc<FileStore>,
    pub session: SessionIdentity,
    /// Shared HTTP client honouring the configured request timeout.
    pub http: reqwest::Client,
    pub service: Arc<ServiceApi>,
    pub controller: JobController,
    cancel: CancellationToken,
    signals: Mutex<Option<BackgroundTasks>>,
}

impl App {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let store = FileStore::open(&config.state_dir).with_context(|| {
            format!(
                "Failed to open state directory {}",
                config.state_dir.display()
            )
        })?;
        let store = Arc::new(store);

        // The session id lives only as long as this process.
        let session = get_or_create_session_id(&MemoryStore::new());

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let service = Arc::new(ServiceApi::with_client(http.clone(), &config.base_url));

        let controller = JobController::new(
            service.clone(),
            store.clone(),
            EventHub::default(),
            config.poll_interval,
        );

        Ok(Self {
            config,
            store,
            session,
            http,
            service,
            controller,
            cancel: CancellationToken::new(),
            signals: Mutex::new(None),
        })
    }

    /// Start heartbeat, shared-stats and resource polling. Idempotent.
    pub fn start_signals(&self) {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        if signals.is_none() {
            *signals = Some(BackgroundTasks::spawn(
                self.service.clone(),
                self.session.clone(),
                self.controller.events().clone(),
                &self.config,
                &self.cancel,
            ));
        }
    }

    /// Stop polling and every background signal.
    pub async fn shutdown(&self) {
        let signals = self
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(signals) = signals {
            signals.shutdown().await;
        }
        self.controller.shutdown().await;
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use limefrog_client::download::{build_request, DownloadError, DownloadSink, FileDownloadSink};
    use limefrog_core::download::DownloadFormat;
    use limefrog_core::options::CheckOptions;
    use limefrog_core::types::JobHandle;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn downloads_use_configured_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/job/j1/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("url,status")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let state = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let app = App::new(ClientConfig {
            base_url: server.uri(),
            state_dir: state.path().to_path_buf(),
            request_timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        })
        .unwrap();

        let sink = FileDownloadSink::new(app.http.clone(), out.path());
        let request = build_request(
            &server.uri(),
            &JobHandle::new("j1"),
            DownloadFormat::Csv,
            None,
            &CheckOptions::default(),
        )
        .unwrap();

        let err = sink.deliver(&request).await.unwrap_err();

        assert!(matches!(err, DownloadError::Request(ref e) if e.is_timeout()), "{err:?}");
        app.shutdown().await;
    }
}
