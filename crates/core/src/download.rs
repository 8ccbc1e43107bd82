//! Result download formats.

use crate::options::CheckOptions;
use crate::types::JobHandle;

/// Prefix of the check flags that select heading levels for the
/// heading-extraction export.
pub const HEADING_FLAG_PREFIX: &str = "collect_h";

/// Result export variants offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFormat {
    /// Raw tabular export (`.csv`).
    Csv,
    /// Spreadsheet export (`.xlsx`).
    Xlsx,
    /// Spreadsheet of extracted headings, filtered by enabled levels.
    HeadingsXlsx,
    /// Plain-text execution log of the job.
    JobLog,
}

impl DownloadFormat {
    /// Request path for this format, relative to the service base URL.
    pub fn path(&self, job: &JobHandle) -> String {
        match self {
            Self::Csv => format!("/api/job/{job}/download"),
            Self::Xlsx => format!("/api/job/{job}/download-xlsx"),
            Self::HeadingsXlsx => format!("/api/job/{job}/download-headings-xlsx"),
            Self::JobLog => format!("/api/job/{job}/log"),
        }
    }

    /// File extension the service uses for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx | Self::HeadingsXlsx => "xlsx",
            Self::JobLog => "log",
        }
    }
}

/// Heading tags (`H1`..`H6`) whose `collect_hN` flag is enabled, in
/// level order.
pub fn enabled_heading_tags(options: &CheckOptions) -> Vec<String> {
    let mut levels: Vec<(u8, String)> = options
        .iter()
        .filter(|(_, enabled)| *enabled)
        .filter_map(|(name, _)| {
            let suffix = name.strip_prefix(HEADING_FLAG_PREFIX)?;
            let level: u8 = suffix.parse().ok()?;
            Some((level, format!("H{level}")))
        })
        .collect();
    levels.sort_by_key(|(level, _)| *level);
    levels.into_iter().map(|(_, tag)| tag).collect()
}

/// Local file name for a downloaded export, mirroring the name the service
/// attaches to the response.
///
/// The custom name and the job id keep only alphanumerics, `-`, `_` and
/// spaces. If nothing of the custom name survives, the job-derived default
/// is used.
pub fn suggested_file_name(format: DownloadFormat, job: &JobHandle, custom: Option<&str>) -> String {
    let safe = file_name_chars(custom.unwrap_or_default());
    let safe = safe.trim();
    let job = file_name_chars(job.as_str());

    match (format, safe.is_empty()) {
        (DownloadFormat::JobLog, _) => format!("seo_{job}.log"),
        (DownloadFormat::HeadingsXlsx, true) => format!("seo-headings-{job}.xlsx"),
        (DownloadFormat::HeadingsXlsx, false) => format!("{safe}-headings.xlsx"),
        (_, true) => format!("seo-check-{job}.{}", format.extension()),
        (_, false) => format!("{safe}.{}", format.extension()),
    }
}

fn file_name_chars(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_per_format() {
        let job = JobHandle::new("abc");
        assert_eq!(DownloadFormat::Csv.path(&job), "/api/job/abc/download");
        assert_eq!(DownloadFormat::Xlsx.path(&job), "/api/job/abc/download-xlsx");
        assert_eq!(
            DownloadFormat::HeadingsXlsx.path(&job),
            "/api/job/abc/download-headings-xlsx"
        );
        assert_eq!(DownloadFormat::JobLog.path(&job), "/api/job/abc/log");
    }

    #[test]
    fn default_heading_levels() {
        assert_eq!(
            enabled_heading_tags(&CheckOptions::default()),
            vec!["H1", "H2", "H3"]
        );
    }

    #[test]
    fn heading_levels_sorted_numerically() {
        let mut options = CheckOptions::empty();
        options.set("collect_h6", true);
        options.set("collect_h2", true);
        options.set("collect_h4", false);
        options.set("check_h1", true);
        options.set("collect_hx", true);
        assert_eq!(enabled_heading_tags(&options), vec!["H2", "H6"]);
    }

    #[test]
    fn no_heading_levels_enabled() {
        assert!(enabled_heading_tags(&CheckOptions::empty()).is_empty());
    }

    #[test]
    fn file_names_default_to_job_id() {
        let job = JobHandle::new("j1");
        assert_eq!(suggested_file_name(DownloadFormat::Csv, &job, None), "seo-check-j1.csv");
        assert_eq!(suggested_file_name(DownloadFormat::Xlsx, &job, Some("  ")), "seo-check-j1.xlsx");
        assert_eq!(
            suggested_file_name(DownloadFormat::HeadingsXlsx, &job, None),
            "seo-headings-j1.xlsx"
        );
        assert_eq!(suggested_file_name(DownloadFormat::JobLog, &job, Some("x")), "seo_j1.log");
    }

    #[test]
    fn custom_file_name_is_sanitized() {
        let job = JobHandle::new("j1");
        assert_eq!(
            suggested_file_name(DownloadFormat::Csv, &job, Some("../audit: march/2024")),
            "audit march2024.csv"
        );
        assert_eq!(
            suggested_file_name(DownloadFormat::HeadingsXlsx, &job, Some("site_a")),
            "site_a-headings.xlsx"
        );
        assert_eq!(suggested_file_name(DownloadFormat::Xlsx, &job, Some("/../")), "seo-check-j1.xlsx");
    }

    #[test]
    fn job_id_cannot_leave_output_directory() {
        let job = JobHandle::new("../../etc/passwd");
        assert_eq!(suggested_file_name(DownloadFormat::Csv, &job, None), "seo-check-etcpasswd.csv");
        assert_eq!(suggested_file_name(DownloadFormat::JobLog, &job, None), "seo_etcpasswd.log");
        assert_eq!(
            suggested_file_name(DownloadFormat::HeadingsXlsx, &JobHandle::new("a/b"), None),
            "seo-headings-ab.xlsx"
        );
    }
}
