//! Human time-string parsing for clip bounds.
//!
//! Users type clip times the way YouTube displays them: plain seconds,
//! `M:SS`, or `H:MM:SS`. Anything else means "no bound". Components are not
//! range-checked (`99:99` is accepted as 99 minutes and 99 seconds) because
//! yt-dlp/ffmpeg tolerate overshooting the video duration anyway.

use anyhow::{Result, bail};

/// Parses a time string into whole seconds.
///
/// Three shapes are tried in order: all-digits (raw seconds), two
/// colon-separated integers (minutes, seconds), three colon-separated
/// integers (hours, minutes, seconds). A blank string or any other shape
/// yields `None`, meaning the bound is unspecified.
pub fn parse_timecode(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse().ok();
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let field = |s: &str| -> Option<u64> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            None
        } else {
            s.parse().ok()
        }
    };

    match parts.as_slice() {
        [minutes, seconds] => Some(field(minutes)? * 60 + field(seconds)?),
        [hours, minutes, seconds] => {
            Some(field(hours)? * 3600 + field(minutes)? * 60 + field(seconds)?)
        }
        _ => None,
    }
}

/// Renders seconds as `H:MM:SS`, or `M:SS` for anything under an hour.
pub fn format_timecode(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Optional clip bounds for a single download, in whole seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ClipRange {
    /// Builds a range from raw user strings, failing only on an inverted
    /// range. Unparseable strings degrade to "unspecified".
    pub fn from_strings(start: &str, end: &str) -> Result<Self> {
        let range = Self {
            start: parse_timecode(start),
            end: parse_timecode(end),
        };
        range.validate()?;
        Ok(range)
    }

    /// A bound-less range asks for the whole video.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Fails only when both bounds are present and start is not strictly
    /// before end.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end)
            && start >= end
        {
            bail!(
                "clip start {} must be before end {}",
                format_timecode(start),
                format_timecode(end)
            );
        }
        Ok(())
    }

    /// ffmpeg trim arguments handed to yt-dlp as postprocessor args.
    ///
    /// A missing start defaults to 0; a missing end means "until the end of
    /// the video", so only `-ss` is emitted. `start=60, end=120` becomes
    /// `-ss 60 -t 60`.
    pub fn trim_args(&self) -> Option<Vec<String>> {
        if self.is_unbounded() {
            return None;
        }
        let start = self.start.unwrap_or(0);
        let mut args = vec!["-ss".to_owned(), start.to_string()];
        if let Some(end) = self.end {
            args.push("-t".to_owned());
            args.push((end - start).to_string());
        }
        Some(args)
    }
}
