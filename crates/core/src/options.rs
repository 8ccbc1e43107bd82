//! Submission options: runtime limits and named check flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Runtime options
// ---------------------------------------------------------------------------

pub const DEFAULT_CONCURRENCY: u32 = 3;
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 15;
pub const DEFAULT_RETRIES: u32 = 2;

/// Per-job execution limits sent with the submission.
///
/// The ranges mirror the clamping the service applies, so a request that
/// passes validation is executed with exactly these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RuntimeOptions {
    #[validate(range(min = 1, max = 10))]
    pub concurrency: u32,
    #[validate(range(min = 3, max = 120))]
    pub timeout_seconds: u32,
    #[validate(range(max = 5))]
    pub retries: u32,
    /// Preferred download filename (without extension). Not sent to the
    /// service on submission; used when building download requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retries: DEFAULT_RETRIES,
            filename: None,
        }
    }
}

impl RuntimeOptions {
    /// Validate the numeric ranges, returning a readable error on failure.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }

    /// The trimmed filename, or `None` when blank.
    pub fn custom_filename(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Check options
// ---------------------------------------------------------------------------

/// Check flags enabled by default on the service.
pub const DEFAULT_ENABLED_CHECKS: &[&str] = &[
    "check_status_codes",
    "check_redirects",
    "check_html_lang",
    "check_indexability",
    "check_titles",
    "check_sitemap",
    "check_robots",
    "check_404",
    "check_h1",
    "check_images",
    "check_html_structure",
    "check_heading_duplicates",
    "html_track_headings",
    "html_track_paragraphs",
    "html_track_semantic",
    "collect_h1",
    "collect_h2",
    "collect_h3",
];

/// Check flags known to the service but disabled by default.
pub const DEFAULT_DISABLED_CHECKS: &[&str] = &[
    "follow_redirects_for_checks",
    "html_track_media",
    "html_track_other",
    "collect_h4",
    "collect_h5",
    "collect_h6",
];

/// Named boolean feature flags submitted with a job.
///
/// Ordered by name so the serialized map is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckOptions(BTreeMap<String, bool>);

impl Default for CheckOptions {
    fn default() -> Self {
        let flags = DEFAULT_ENABLED_CHECKS
            .iter()
            .map(|name| (name.to_string(), true))
            .chain(
                DEFAULT_DISABLED_CHECKS
                    .iter()
                    .map(|name| (name.to_string(), false)),
            )
            .collect();
        Self(flags)
    }
}

impl CheckOptions {
    /// An empty flag set; the service fills in its own defaults.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    /// Apply saved flags on top of these, ignoring names this set does
    /// not know about.
    pub fn merge_known(&mut self, saved: &BTreeMap<String, bool>) {
        for (name, enabled) in saved {
            if let Some(slot) = self.0.get_mut(name) {
                *slot = *enabled;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }

    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.0
    }
}

impl From<BTreeMap<String, bool>> for CheckOptions {
    fn from(flags: BTreeMap<String, bool>) -> Self {
        Self(flags)
    }
}

// ---------------------------------------------------------------------------
// Job request
// ---------------------------------------------------------------------------

/// Everything needed to submit a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub urls: Vec<String>,
    pub options: CheckOptions,
    pub runtime: RuntimeOptions,
}

impl JobRequest {
    /// Build a request from newline-separated URL text, dropping blank
    /// lines and surrounding whitespace.
    pub fn from_text(urls: &str, options: CheckOptions, runtime: RuntimeOptions) -> Self {
        Self {
            urls: parse_url_list(urls),
            options,
            runtime,
        }
    }

    /// Local checks performed before anything is sent.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.urls.is_empty() {
            return Err(CoreError::Validation(
                "Add at least one URL".to_string(),
            ));
        }
        self.runtime.check()
    }
}

/// Split newline-separated text into trimmed, non-empty URL lines.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
