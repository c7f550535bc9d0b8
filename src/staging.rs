//! In-memory staging of produced files.
//!
//! Each run downloads into a throwaway directory, then the bytes are moved
//! into process memory so they survive page re-renders after the directory
//! is gone. The session store holds exactly one run report; publishing a new
//! one replaces the previous report wholesale.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;
use walkdir::WalkDir;

/// Containers yt-dlp can leave behind that we are willing to hand to the
/// browser. Everything else in the run directory is discarded.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "m4a", "webm", "mkv"];

/// One produced media file, fully buffered.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A categorized per-URL failure. `category` is one of the stable labels
/// from [`crate::ytdlp::DownloadError::category`] plus `"invalid-range"`.
#[derive(Debug, Clone, Serialize)]
pub struct UrlFailure {
    pub url: String,
    pub category: String,
    pub detail: String,
}

/// Explicit result of one orchestration run, returned to the caller instead
/// of being tucked into shared mutable UI state.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub started_at: Option<DateTime<Utc>>,
    pub files: Vec<StagedFile>,
    pub failures: Vec<UrlFailure>,
    /// Non-fatal preconditions, e.g. a missing ffmpeg binary.
    pub warnings: Vec<String>,
    /// Set when the run stopped before any download (missing yt-dlp, empty
    /// submission). Mutually exclusive with staged files in practice.
    pub aborted: Option<String>,
}

impl RunReport {
    /// Abandoned-run report shown in place of per-URL results.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            started_at: Some(Utc::now()),
            aborted: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.failures.is_empty()
            && self.warnings.is_empty()
            && self.aborted.is_none()
    }

    pub fn file_by_name(&self, name: &str) -> Option<&StagedFile> {
        self.files.iter().find(|file| file.name == name)
    }
}

fn extension_allowed(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Moves every allow-listed file under `dir` into memory, deleting the
/// on-disk copy. Returns files sorted by name so re-renders are stable.
pub fn collect_outputs(dir: &Path) -> Result<Vec<StagedFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || !extension_allowed(path) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        std::fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
        info!(name, size = bytes.len(), "staged download");
        files.push(StagedFile { name, bytes });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Holds the most recent run report for the presentation layer.
///
/// Writes replace the whole report; there is no accumulation and no history,
/// so a page re-render always shows exactly the latest run.
#[derive(Default)]
pub struct SessionStore {
    current: RwLock<Arc<RunReport>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, report: RunReport) {
        *self.current.write() = Arc::new(report);
    }

    pub fn current(&self) -> Arc<RunReport> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn collect_outputs_moves_allowed_files_into_memory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b video.mp4"), b"bbbb").unwrap();
        fs::write(dir.path().join("a video.mp4"), b"aaaa").unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();
        fs::write(dir.path().join(".bot-attempts"), b"x").unwrap();

        let files = collect_outputs(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        // Sorted by name.
        assert_eq!(files[0].name, "a video.mp4");
        assert_eq!(files[1].name, "b video.mp4");
        assert_eq!(files[0].bytes, b"aaaa");

        // On-disk copies were deleted; the stray text file stays.
        assert!(!dir.path().join("a video.mp4").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn collect_outputs_is_case_insensitive_on_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("CLIP.MP4"), b"x").unwrap();
        let files = collect_outputs(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "CLIP.MP4");
    }

    #[test]
    fn session_store_replaces_wholesale() {
        let store = SessionStore::new();
        assert!(store.current().is_empty());

        store.publish(RunReport {
            files: vec![StagedFile {
                name: "one.mp4".into(),
                bytes: vec![1],
            }],
            ..RunReport::default()
        });
        assert_eq!(store.current().files.len(), 1);
        assert!(store.current().file_by_name("one.mp4").is_some());

        // The next run wins outright; nothing accumulates.
        store.publish(RunReport {
            files: vec![StagedFile {
                name: "two.mp4".into(),
                bytes: vec![2],
            }],
            ..RunReport::default()
        });
        let current = store.current();
        assert_eq!(current.files.len(), 1);
        assert!(current.file_by_name("one.mp4").is_none());
        assert!(current.file_by_name("two.mp4").is_some());
    }

    #[test]
    fn rerenders_see_the_same_report_until_replaced() {
        let store = SessionStore::new();
        store.publish(RunReport {
            files: vec![StagedFile {
                name: "keep.mp4".into(),
                bytes: vec![0; 16],
            }],
            ..RunReport::default()
        });

        let first = store.current();
        let second = store.current();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
