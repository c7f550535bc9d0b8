//! Boundary to the external yt-dlp tool.
//!
//! yt-dlp does not report failures in a machine-readable way, so this module
//! classifies its stderr into an explicit error enumeration instead of
//! letting raw message text leak upward. The `Failed` variant carries the
//! original detail for anything we do not recognize.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Result, bail};
use thiserror::Error;
use tracing::warn;

use crate::options::DownloadOptions;

pub const YTDLP_PROGRAM: &str = "yt-dlp";
pub const FFMPEG_PROGRAM: &str = "ffmpeg";

/// Structured failure for one download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("video is private")]
    PrivateVideo,
    #[error("video is unavailable")]
    Unavailable,
    #[error("the site flagged the request as automated")]
    BotDetected,
    #[error("no matching format under the resolution cap")]
    FormatUnavailable,
    #[error("could not launch downloader: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("download failed ({status}): {detail}")]
    Failed { status: String, detail: String },
}

impl DownloadError {
    /// Short label used in the UI and the JSON status endpoint.
    pub fn category(&self) -> &'static str {
        match self {
            Self::PrivateVideo => "private",
            Self::Unavailable => "unavailable",
            Self::BotDetected => "bot-detected",
            Self::FormatUnavailable => "no-format",
            Self::Spawn(_) => "tool-missing",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Maps known yt-dlp stderr phrasings onto error variants. The wording comes
/// from yt-dlp's YouTube extractor; anything unrecognized stays generic.
pub fn classify_stderr(stderr: &str, status: &str) -> DownloadError {
    if stderr.contains("Private video") {
        DownloadError::PrivateVideo
    } else if stderr.contains("Video unavailable") || stderr.contains("This video is not available")
    {
        DownloadError::Unavailable
    } else if stderr.contains("Sign in to confirm") || stderr.contains("not a bot") {
        DownloadError::BotDetected
    } else if stderr.contains("Requested format is not available") {
        DownloadError::FormatUnavailable
    } else {
        let detail = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("no error output")
            .trim()
            .to_owned();
        DownloadError::Failed {
            status: status.to_owned(),
            detail,
        }
    }
}

/// Runs `<program> --version` to fail loudly when dependencies such as
/// yt-dlp are missing.
pub fn ensure_program_available(program: impl AsRef<OsStr>) -> Result<()> {
    let program = program.as_ref();
    let status = Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    let name = program.to_string_lossy();
    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!("{} is installed but returned a failure status", name),
        Err(err) => bail!("{} is not installed or not in PATH: {}", name, err),
    }
}

/// One yt-dlp invocation for one URL, producing files under `out_dir`.
pub fn download(url: &str, options: &DownloadOptions, out_dir: &Path) -> Result<(), DownloadError> {
    let mut command = Command::new(&options.program);
    command.args(options.to_args(out_dir)).arg(url);

    let output = command.output()?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(classify_stderr(&stderr, &output.status.to_string()))
}

/// Bounded retry wrapper around [`download`].
///
/// Only bot-detection failures are retried; the site usually relents after a
/// short pause, while every other category is deterministic and retrying
/// just burns time. The sleep is a fixed duration, not exponential. After
/// the budget is spent the last error is returned as an ordinary failure.
pub fn download_with_retry(
    url: &str,
    options: &DownloadOptions,
    out_dir: &Path,
    attempts: u32,
    backoff: Duration,
) -> Result<(), DownloadError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match download(url, options, out_dir) {
            Ok(()) => return Ok(()),
            Err(DownloadError::BotDetected) if attempt < attempts => {
                warn!(url, attempt, "bot detection reported, backing off");
                std::thread::sleep(backoff);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! A fake yt-dlp used across the crate's tests. It inspects the URL it
    //! is handed and either produces a file in the `--output` directory or
    //! fails with a chosen stderr phrasing.

    use std::fs;
    use std::path::{Path, PathBuf};

    pub const SCRIPT: &str = r#"#!/usr/bin/env bash
set -u
url="${@: -1}"
outdir=""
prev=""
for arg in "$@"; do
    if [[ "$prev" == "--output" ]]; then
        outdir="$(dirname "$arg")"
    fi
    prev="$arg"
done
if [[ "$url" == "--version" ]]; then
    echo "2025.01.01"
    exit 0
fi
if [[ "$url" == *"private"* ]]; then
    echo "ERROR: [youtube] xyz: Private video. Sign in if you've been granted access" >&2
    exit 1
fi
if [[ "$url" == *"gone"* ]]; then
    echo "ERROR: [youtube] xyz: Video unavailable" >&2
    exit 1
fi
if [[ "$url" == *"strange"* ]]; then
    echo "ERROR: something entirely new broke" >&2
    exit 1
fi
if [[ "$url" == *"bot"* ]]; then
    marker="${outdir}/.bot-attempts"
    echo x >> "$marker"
    if [[ "$(wc -l < "$marker")" -lt 2 ]]; then
        echo "ERROR: Sign in to confirm you're not a bot" >&2
        exit 1
    fi
    rm -f "$marker"
fi
name="$(basename "$url").mp4"
echo "video bytes for $url" > "${outdir}/${name}"
exit 0
"#;

    /// Writes the stub into `dir` and returns its absolute path, ready to be
    /// used as `RuntimeConfig::ytdlp_path`.
    pub fn install(dir: &Path) -> PathBuf {
        let script_path = dir.join("yt-dlp-stub");
        fs::write(&script_path, SCRIPT).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&script_path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script_path, perms).unwrap();
        }
        script_path
    }
}
