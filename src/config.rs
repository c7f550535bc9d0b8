use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/clipstage-env";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;
pub const DEFAULT_ATTEMPTS: u32 = 2;
pub const DEFAULT_BACKOFF_SECS: u64 = 5;
pub const DEFAULT_TOOL_RETRIES: u32 = 10;

/// Raw key/value view of the env file. Every field is optional so partial
/// files merge cleanly with the defaults.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_height: Option<u32>,
    pub attempts: Option<u32>,
    pub backoff_secs: Option<u64>,
    pub spoof_headers: Option<bool>,
    pub tool_retries: Option<u32>,
    pub cookies_file: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
}

/// Fully resolved runtime settings shared by the backend and the CLI.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    /// Resolution cap passed into the yt-dlp format expression.
    pub max_height: u32,
    /// Attempts per URL when the failure looks like bot detection.
    pub attempts: u32,
    /// Fixed sleep between those attempts.
    pub backoff_secs: u64,
    /// Send browser-looking request headers with every download.
    pub spoof_headers: bool,
    /// yt-dlp's own `--retries`/`--fragment-retries` budget.
    pub tool_retries: u32,
    /// Cookies file handed to yt-dlp when it exists on disk.
    pub cookies_file: Option<PathBuf>,
    /// Location of the yt-dlp executable; bare name means "search PATH".
    pub ytdlp_path: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        EnvConfig::default().resolve()
    }
}

impl EnvConfig {
    /// Applies defaults for every missing key.
    pub fn resolve(self) -> RuntimeConfig {
        RuntimeConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            max_height: self.max_height.unwrap_or(DEFAULT_MAX_HEIGHT),
            attempts: self.attempts.unwrap_or(DEFAULT_ATTEMPTS).max(1),
            backoff_secs: self.backoff_secs.unwrap_or(DEFAULT_BACKOFF_SECS),
            spoof_headers: self.spoof_headers.unwrap_or(true),
            tool_retries: self.tool_retries.unwrap_or(DEFAULT_TOOL_RETRIES),
            cookies_file: self.cookies_file,
            ytdlp_path: self
                .ytdlp_path
                .unwrap_or_else(|| PathBuf::from(crate::ytdlp::YTDLP_PROGRAM)),
        }
    }
}

/// Parses a `KEY="value"` env file. Returns `None` when the file is absent so
/// the caller can fall back to pure defaults.
pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            match key {
                "CLIPSTAGE_HOST" => {
                    if !value.is_empty() {
                        cfg.host = Some(value.to_string());
                    }
                }
                "CLIPSTAGE_PORT" => {
                    let port: u16 = value.parse().with_context(|| {
                        format!("Parsing CLIPSTAGE_PORT from {}", path.display())
                    })?;
                    cfg.port = Some(port);
                }
                "MAX_HEIGHT" => {
                    let height: u32 = value
                        .parse()
                        .with_context(|| format!("Parsing MAX_HEIGHT from {}", path.display()))?;
                    cfg.max_height = Some(height);
                }
                "RETRY_ATTEMPTS" => {
                    let attempts: u32 = value.parse().with_context(|| {
                        format!("Parsing RETRY_ATTEMPTS from {}", path.display())
                    })?;
                    cfg.attempts = Some(attempts);
                }
                "RETRY_BACKOFF_SECS" => {
                    let secs: u64 = value.parse().with_context(|| {
                        format!("Parsing RETRY_BACKOFF_SECS from {}", path.display())
                    })?;
                    cfg.backoff_secs = Some(secs);
                }
                "SPOOF_HEADERS" => {
                    cfg.spoof_headers = Some(matches!(value, "1" | "true" | "yes"));
                }
                "YTDLP_RETRIES" => {
                    let retries: u32 = value
                        .parse()
                        .with_context(|| format!("Parsing YTDLP_RETRIES from {}", path.display()))?;
                    cfg.tool_retries = Some(retries);
                }
                "COOKIES_FILE" => {
                    if !value.is_empty() {
                        cfg.cookies_file = Some(PathBuf::from(value));
                    }
                }
                "YTDLP_PATH" => {
                    if !value.is_empty() {
                        cfg.ytdlp_path = Some(PathBuf::from(value));
                    }
                }
                _ => {}
            }
        }
    }
    Ok(Some(cfg))
}

pub fn load_runtime_config() -> Result<RuntimeConfig> {
    load_runtime_config_from(Path::new(DEFAULT_CONFIG_PATH))
}

pub fn load_runtime_config_from(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let cfg = read_env_config(path.as_ref())?.unwrap_or_default();
    Ok(cfg.resolve())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn read_env_config_extracts_port() {
        let cfg = make_config("CLIPSTAGE_PORT=\"4242\"\nMAX_HEIGHT=\"720\"\n");
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.port, Some(4242));
        assert_eq!(parsed.max_height, Some(720));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let runtime = load_runtime_config_from("/nonexistent/clipstage-env").unwrap();
        assert_eq!(runtime.port, DEFAULT_PORT);
        assert_eq!(runtime.host, DEFAULT_HOST);
        assert_eq!(runtime.max_height, DEFAULT_MAX_HEIGHT);
        assert!(runtime.spoof_headers);
        assert!(runtime.cookies_file.is_none());
        assert_eq!(runtime.ytdlp_path, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn spoof_headers_accepts_boolean_spellings() {
        let cfg = make_config("SPOOF_HEADERS=\"no\"\n");
        let runtime = load_runtime_config_from(cfg.path()).unwrap();
        assert!(!runtime.spoof_headers);

        let cfg = make_config("SPOOF_HEADERS=\"true\"\n");
        let runtime = load_runtime_config_from(cfg.path()).unwrap();
        assert!(runtime.spoof_headers);
    }

    #[test]
    fn attempts_never_resolve_to_zero() {
        let cfg = make_config("RETRY_ATTEMPTS=\"0\"\n");
        let runtime = load_runtime_config_from(cfg.path()).unwrap();
        assert_eq!(runtime.attempts, 1);
    }

    #[test]
    fn comments_and_unknown_keys_are_ignored() {
        let cfg = make_config("# comment\nSOMETHING_ELSE=\"x\"\nCLIPSTAGE_HOST=\"0.0.0.0\"\n");
        let runtime = load_runtime_config_from(cfg.path()).unwrap();
        assert_eq!(runtime.host, "0.0.0.0");
    }
}
