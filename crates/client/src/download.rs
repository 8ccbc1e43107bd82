//! Download dispatcher.
//!
//! Builds the retrieval URL for a finished job's results and hands it to a
//! [`DownloadSink`]. The engine never parses the exported files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use limefrog_core::download::{enabled_heading_tags, suggested_file_name, DownloadFormat};
use limefrog_core::options::CheckOptions;
use limefrog_core::types::JobHandle;
use reqwest::Url;
use tokio::io::AsyncWriteExt;

use crate::controller::JobController;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The current job is not finished with results.
    #[error("No finished job with results to download")]
    NotReady,

    #[error("Invalid download URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Download failed with status {status}")]
    Status { status: u16 },

    #[error("Failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully built retrieval request for one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub format: DownloadFormat,
    pub job: JobHandle,
    pub url: Url,
    /// Trimmed custom name, if one was given.
    pub filename: Option<String>,
}

impl DownloadRequest {
    /// Name the service will attach to the file.
    pub fn file_name(&self) -> String {
        suggested_file_name(self.format, &self.job, self.filename.as_deref())
    }
}

/// Build the retrieval URL for `format` of `job`.
///
/// `filename` is trimmed and omitted when blank. The headings export also
/// carries the enabled heading levels as a comma-joined `headings`
/// parameter, omitted when no level is enabled.
pub fn build_request(
    base_url: &str,
    job: &JobHandle,
    format: DownloadFormat,
    filename: Option<&str>,
    options: &CheckOptions,
) -> Result<DownloadRequest, DownloadError> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), format.path(job));
    let mut url = Url::parse(&raw).map_err(|e| DownloadError::InvalidUrl(format!("{raw}: {e}")))?;

    let filename = filename
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let headings = match format {
        DownloadFormat::HeadingsXlsx => enabled_heading_tags(options),
        _ => Vec::new(),
    };

    if filename.is_some() || !headings.is_empty() {
        let mut query = url.query_pairs_mut();
        if let Some(name) = &filename {
            query.append_pair("filename", name);
        }
        if !headings.is_empty() {
            query.append_pair("headings", &headings.join(","));
        }
    }

    Ok(DownloadRequest {
        format,
        job: job.clone(),
        url,
        filename,
    })
}

/// Receives built download requests, e.g. by fetching them to disk or
/// opening them in a browser.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, request: &DownloadRequest) -> Result<(), DownloadError>;
}

/// Hands download requests for the controller's ready job to a sink.
pub struct DownloadDispatcher {
    base_url: String,
    sink: Arc<dyn DownloadSink>,
}

impl DownloadDispatcher {
    pub fn new(base_url: impl Into<String>, sink: Arc<dyn DownloadSink>) -> Self {
        Self {
            base_url: base_url.into(),
            sink,
        }
    }

    /// Dispatch an export of the controller's current job.
    ///
    /// Refuses with [`DownloadError::NotReady`] unless the job is terminal
    /// with results.
    pub async fn dispatch(
        &self,
        controller: &JobController,
        format: DownloadFormat,
        filename: Option<&str>,
        options: &CheckOptions,
    ) -> Result<DownloadRequest, DownloadError> {
        let job = controller.ready_job().ok_or(DownloadError::NotReady)?;
        let request = build_request(&self.base_url, &job, format, filename, options)?;

        tracing::info!(job_id = %job, url = %request.url, "Dispatching download");
        self.sink.deliver(&request).await?;
        Ok(request)
    }
}

/// Streams each export into a file under `out_dir`.
pub struct FileDownloadSink {
    client: reqwest::Client,
    out_dir: PathBuf,
}

impl FileDownloadSink {
    pub fn new(client: reqwest::Client, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Where `request` will be written.
    pub fn target_path(&self, request: &DownloadRequest) -> PathBuf {
        self.out_dir.join(request.file_name())
    }
}

#[async_trait]
impl DownloadSink for FileDownloadSink {
    async fn deliver(&self, request: &DownloadRequest) -> Result<(), DownloadError> {
        let mut response = self.client.get(request.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
            });
        }

        tokio::fs::create_dir_all(&self.out_dir).await?;
        let path = self.target_path(request);
        let mut file = tokio::fs::File::create(&path).await?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        tracing::info!(path = %path.display(), bytes = written, "Download saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn job() -> JobHandle {
        JobHandle::new("job-7")
    }

    #[test]
    fn csv_url_without_parameters() {
        let request = build_request(
            "http://localhost:5000/",
            &job(),
            DownloadFormat::Csv,
            None,
            &CheckOptions::default(),
        )
        .unwrap();
        assert_eq!(request.url.as_str(), "http://localhost:5000/api/job/job-7/download");
        assert_eq!(request.file_name(), "seo-check-job-7.csv");
    }

    #[test]
    fn blank_filename_is_omitted() {
        let request = build_request(
            "http://localhost:5000",
            &job(),
            DownloadFormat::Xlsx,
            Some("   "),
            &CheckOptions::default(),
        )
        .unwrap();
        assert_eq!(request.url.query(), None);
        assert_eq!(request.filename, None);
    }

    #[test]
    fn filename_is_trimmed_and_encoded() {
        let request = build_request(
            "http://localhost:5000",
            &job(),
            DownloadFormat::Xlsx,
            Some("  march audit "),
            &CheckOptions::default(),
        )
        .unwrap();
        assert_eq!(request.url.query(), Some("filename=march+audit"));
        assert_eq!(request.file_name(), "march audit.xlsx");
    }

    #[test]
    fn headings_export_lists_enabled_levels() {
        let mut options = CheckOptions::empty();
        options.set("collect_h1", true);
        options.set("collect_h3", true);
        options.set("collect_h2", false);
        let request = build_request(
            "http://localhost:5000",
            &job(),
            DownloadFormat::HeadingsXlsx,
            Some("site"),
            &options,
        )
        .unwrap();
        assert_eq!(request.url.path(), "/api/job/job-7/download-headings-xlsx");
        assert_eq!(request.url.query(), Some("filename=site&headings=H1%2CH3"));
    }

    #[test]
    fn headings_parameter_omitted_when_none_enabled() {
        let request = build_request(
            "http://localhost:5000",
            &job(),
            DownloadFormat::HeadingsXlsx,
            None,
            &CheckOptions::empty(),
        )
        .unwrap();
        assert_eq!(request.url.query(), None);
    }

    #[test]
    fn other_formats_ignore_heading_flags() {
        let request = build_request(
            "http://localhost:5000",
            &job(),
            DownloadFormat::Csv,
            None,
            &CheckOptions::default(),
        )
        .unwrap();
        assert_eq!(request.url.query(), None);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = build_request(
            "not a url",
            &job(),
            DownloadFormat::Csv,
            None,
            &CheckOptions::default(),
        );
        assert_matches!(result, Err(DownloadError::InvalidUrl(_)));
    }
}
