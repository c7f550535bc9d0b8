//! Per-download options bundle.
//!
//! Built fresh for every URL and turned into a flat yt-dlp argument vector.
//! The bundle never outlives the URL it was built for.

use std::path::{Path, PathBuf};

use crate::config::RuntimeConfig;
use crate::timecode::ClipRange;

/// User agent sent when header spoofing is enabled. Some extractors refuse
/// obviously scripted clients, so we present as a current desktop browser.
const SPOOFED_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const SPOOFED_ACCEPT_LANGUAGE: &str = "Accept-Language:en-US,en;q=0.9";

/// Everything one yt-dlp invocation needs besides the URL itself.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// yt-dlp executable, from config (bare name searches PATH).
    pub program: PathBuf,
    /// Resolution cap for the format-selection expression.
    pub max_height: u32,
    /// Optional clip bounds, applied as ffmpeg trim postprocessor args.
    pub clip: ClipRange,
    /// Present browser-looking request headers.
    pub spoof_headers: bool,
    /// yt-dlp's internal retry budget for whole files and fragments.
    pub tool_retries: u32,
    /// Cookies file forwarded when it exists on disk.
    pub cookies_file: Option<PathBuf>,
}

impl DownloadOptions {
    pub fn from_config(config: &RuntimeConfig, clip: ClipRange) -> Self {
        Self {
            program: config.ytdlp_path.clone(),
            max_height: config.max_height,
            clip,
            spoof_headers: config.spoof_headers,
            tool_retries: config.tool_retries,
            cookies_file: config.cookies_file.clone(),
        }
    }

    /// Best mp4 video stream under the cap merged with m4a audio, falling
    /// back to the best pre-muxed mp4 under the cap.
    pub fn format_expression(&self) -> String {
        format!(
            "bestvideo[ext=mp4][height<={h}]+bestaudio[ext=m4a]/best[ext=mp4][height<={h}]",
            h = self.max_height
        )
    }

    /// Assembles the full argument vector for one download into `out_dir`.
    pub fn to_args(&self, out_dir: &Path) -> Vec<String> {
        let output_template = out_dir.join("%(title)s.%(ext)s");
        let mut args = vec![
            "--format".to_owned(),
            self.format_expression(),
            "--merge-output-format".to_owned(),
            "mp4".to_owned(),
            "--output".to_owned(),
            output_template.to_string_lossy().into_owned(),
            "--no-playlist".to_owned(),
            "--no-progress".to_owned(),
            "--no-warnings".to_owned(),
        ];

        if let Some(trim) = self.clip.trim_args() {
            args.push("--postprocessor-args".to_owned());
            args.push(format!("ffmpeg:{}", trim.join(" ")));
        }

        if self.spoof_headers {
            args.push("--user-agent".to_owned());
            args.push(SPOOFED_USER_AGENT.to_owned());
            args.push("--add-headers".to_owned());
            args.push(SPOOFED_ACCEPT_LANGUAGE.to_owned());
        }

        if self.tool_retries > 0 {
            args.push("--retries".to_owned());
            args.push(self.tool_retries.to_string());
            args.push("--fragment-retries".to_owned());
            args.push(self.tool_retries.to_string());
        }

        if let Some(cookies) = &self.cookies_file
            && cookies.exists()
        {
            args.push("--cookies".to_owned());
            args.push(cookies.to_string_lossy().into_owned());
        }

        args
    }
}
