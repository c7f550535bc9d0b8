#![forbid(unsafe_code)]

//! Shared library for the clipstage binaries.
//!
//! All real video work (extraction, stream selection, muxing, trimming) is
//! delegated to the external `yt-dlp` tool and, transitively, `ffmpeg`. The
//! modules here cover the first-party glue: parsing user input, assembling
//! yt-dlp invocations, classifying failures, and staging the produced files
//! in memory so the web frontend can hand them back to the browser.

pub mod batch;
pub mod config;
pub mod options;
pub mod security;
pub mod staging;
pub mod timecode;
pub mod ytdlp;
