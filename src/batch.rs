//! Per-run orchestration: parse the submitted entries, download each URL in
//! turn, and stage whatever came out.
//!
//! Failures are isolated per URL; one broken link never aborts the batch and
//! files collected from earlier URLs stay staged. The whole run is
//! synchronous by design, one yt-dlp process at a time.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::options::DownloadOptions;
use crate::staging::{RunReport, UrlFailure, collect_outputs};
use crate::timecode::ClipRange;
use crate::ytdlp::{self, FFMPEG_PROGRAM, download_with_retry};

/// One user-submitted line: a URL plus optional raw time strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub url: String,
    pub start: String,
    pub end: String,
}

impl Entry {
    pub fn plain(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start: String::new(),
            end: String::new(),
        }
    }
}

/// Splits the textarea contents into entries, dropping blank lines.
///
/// In timed mode each line is `URL [start [end]]`, whitespace-separated, the
/// way clip requests are typed into the form's second tab.
pub fn parse_entries(text: &str, with_times: bool) -> Vec<Entry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if !with_times {
                return Entry::plain(line);
            }
            let mut fields = line.split_whitespace();
            let url = fields.next().unwrap_or_default().to_owned();
            let start = fields.next().unwrap_or_default().to_owned();
            let end = fields.next().unwrap_or_default().to_owned();
            Entry { url, start, end }
        })
        .collect()
}

/// Downloads every entry sequentially and returns an explicit report.
///
/// A missing yt-dlp aborts before any download is attempted. A missing
/// ffmpeg only degrades the run (merging and trimming will fail for videos
/// that need them) and is surfaced as a warning.
pub fn run_batch(entries: &[Entry], config: &RuntimeConfig) -> Result<RunReport> {
    if entries.is_empty() {
        bail!("no URLs were submitted");
    }

    ytdlp::ensure_program_available(&config.ytdlp_path)?;

    let mut report = RunReport {
        started_at: Some(Utc::now()),
        ..RunReport::default()
    };

    if let Err(err) = ytdlp::ensure_program_available(FFMPEG_PROGRAM) {
        warn!("ffmpeg probe failed: {err}");
        report.warnings.push(format!(
            "ffmpeg was not found; merged MP4 output and clip trimming may fail ({err})"
        ));
    }

    let scratch = TempDir::new().context("creating run directory")?;
    let backoff = Duration::from_secs(config.backoff_secs);

    for entry in entries {
        info!(url = %entry.url, "processing entry");

        let clip = match ClipRange::from_strings(&entry.start, &entry.end) {
            Ok(clip) => clip,
            Err(err) => {
                report.failures.push(UrlFailure {
                    url: entry.url.clone(),
                    category: "invalid-range".to_owned(),
                    detail: err.to_string(),
                });
                continue;
            }
        };

        let options = DownloadOptions::from_config(config, clip);
        if let Err(err) = download_with_retry(
            &entry.url,
            &options,
            scratch.path(),
            config.attempts,
            backoff,
        ) {
            warn!(url = %entry.url, category = err.category(), "download failed");
            report.failures.push(UrlFailure {
                url: entry.url.clone(),
                category: err.category().to_owned(),
                detail: err.to_string(),
            });
            continue;
        }

        // Stage right away so a later entry's failure cannot disturb files
        // this one produced.
        match collect_outputs(scratch.path()) {
            Ok(mut files) => report.files.append(&mut files),
            Err(err) => {
                report.failures.push(UrlFailure {
                    url: entry.url.clone(),
                    category: "failed".to_owned(),
                    detail: format!("collecting output files: {err:#}"),
                });
            }
        }
    }

    report.files.sort_by(|a, b| a.name.cmp(&b.name));
    info!(
        files = report.files.len(),
        failures = report.failures.len(),
        "run finished"
    );
    Ok(report)
}
