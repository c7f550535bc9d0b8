//! Shared security helpers used by the clipstage binaries.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Fails fast when a binary is started as root. The service shells out to
/// yt-dlp with user-controlled URLs and buffers downloads in memory, so it
/// is expected to run under a dedicated unprivileged account.
pub fn ensure_not_root(process: &str) -> Result<()> {
    if Uid::current().is_root() {
        bail!("{process} must not be run as root; use a dedicated service account");
    }
    Ok(())
}
