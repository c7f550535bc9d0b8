//! Web frontend for clipstage.
//!
//! Serves a single-page form where the user pastes YouTube URLs (optionally
//! with per-entry clip times), runs the download batch on submit, and hands
//! the staged MP4s back as browser downloads. The staged bytes live purely
//! in process memory; each submission replaces the previous results.

use std::{io::Cursor, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use clipstage::{
    batch::{parse_entries, run_batch},
    config::{RuntimeConfig, load_runtime_config},
    security::ensure_not_root,
    staging::{RunReport, SessionStore},
};
use mime_guess::MimeGuess;
use serde::Deserialize;
use tokio::{signal, task};
use tokio_util::io::ReaderStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    store: Arc<SessionStore>,
    config: Arc<RuntimeConfig>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct DownloadForm {
    /// `bulk` (URLs only) or `clips` (`URL [start [end]]` per line).
    #[serde(default)]
    mode: String,
    #[serde(default)]
    urls: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    ensure_not_root("clipstage backend")?;

    let config = load_runtime_config().context("loading configuration")?;
    let addr = SocketAddr::new(config.host.parse().context("parsing bind host")?, config.port);

    let state = AppState {
        store: Arc::new(SessionStore::new()),
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/download", post(submit))
        .route("/files/{name}", get(download_file))
        .route("/api/status", get(status))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("serving on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {}", err);
    }
}

/// Always re-renders whatever the session store currently holds.
async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state.store.current()))
}

/// Runs the batch synchronously on a blocking thread, publishes the report,
/// and redirects back to `/` so a refresh cannot resubmit the form.
async fn submit(
    State(state): State<AppState>,
    Form(form): Form<DownloadForm>,
) -> ApiResult<Redirect> {
    let with_times = form.mode == "clips";
    let entries = parse_entries(&form.urls, with_times);
    let config = state.config.clone();

    let report = task::spawn_blocking(move || run_batch(&entries, &config))
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))?;

    let report = match report {
        Ok(report) => report,
        Err(err) => {
            error!("run aborted: {err:#}");
            RunReport::aborted(format!("{err:#}"))
        }
    };

    state.store.publish(report);
    Ok(Redirect::to("/"))
}

/// Streams one staged file out of memory.
async fn download_file(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> ApiResult<Response> {
    let report = state.store.current();
    let file = report
        .file_by_name(&name)
        .ok_or_else(|| ApiError::not_found("no such staged file"))?;

    let mime = MimeGuess::from_path(&file.name)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!("attachment; filename=\"{}\"", file.name.replace('"', ""));

    let stream = ReaderStream::new(Cursor::new(file.bytes.clone()));
    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = mime.parse() {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = disposition.parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// JSON summary of the current run, mostly for health checks and scripting.
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report = state.store.current();
    let files: Vec<_> = report
        .files
        .iter()
        .map(|file| {
            serde_json::json!({
                "name": file.name,
                "size": file.bytes.len(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "started_at": report.started_at.map(|t| t.to_rfc3339()),
        "files": files,
        "failures": report.failures,
        "warnings": report.warnings,
        "aborted": report.aborted,
    }))
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Percent-encodes the handful of characters that would break an href.
fn encode_href(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '"' => out.push_str("%22"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            '+' => out.push_str("%2B"),
            _ => out.push(c),
        }
    }
    out
}

fn render_page(report: &RunReport) -> String {
    let mut body = String::from(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>clipstage</title>
<style>
body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
textarea { width: 100%; height: 9rem; font-family: monospace; }
fieldset { margin-bottom: 1.5rem; }
.failure { color: #a40000; }
.warning { color: #8a6d00; }
.files a { display: block; margin: 0.25rem 0; }
</style>
</head>
<body>
<h1>clipstage</h1>
<p>Paste YouTube URLs, one per line. Files come back as 1080p MP4 downloads.</p>
<form method="post" action="/download">
<fieldset>
<legend>Bulk</legend>
<input type="hidden" name="mode" value="bulk">
<textarea name="urls" placeholder="https://youtu.be/...&#10;https://www.youtube.com/watch?v=..."></textarea>
<p><button type="submit">Download</button></p>
</fieldset>
</form>
<form method="post" action="/download">
<fieldset>
<legend>Clips</legend>
<input type="hidden" name="mode" value="clips">
<textarea name="urls" placeholder="https://youtu.be/... 1:00 2:00"></textarea>
<p>Each line: URL, optional start time, optional end time (H:MM:SS, M:SS or seconds).</p>
<p><button type="submit">Download clips</button></p>
</fieldset>
</form>
"#,
    );

    if let Some(aborted) = &report.aborted {
        body.push_str(&format!(
            "<p class=\"failure\">Run aborted: {}</p>\n",
            escape_html(aborted)
        ));
    }

    for warning in &report.warnings {
        body.push_str(&format!(
            "<p class=\"warning\">{}</p>\n",
            escape_html(warning)
        ));
    }

    if !report.failures.is_empty() {
        body.push_str("<h2>Failures</h2>\n<ul>\n");
        for failure in &report.failures {
            body.push_str(&format!(
                "<li class=\"failure\"><code>{}</code> — {} ({})</li>\n",
                escape_html(&failure.url),
                escape_html(&failure.detail),
                escape_html(&failure.category),
            ));
        }
        body.push_str("</ul>\n");
    }

    if !report.files.is_empty() {
        body.push_str("<h2>Downloads</h2>\n<div class=\"files\">\n");
        for file in &report.files {
            body.push_str(&format!(
                "<a href=\"/files/{}\" download>&#11015; {} ({})</a>\n",
                encode_href(&file.name),
                escape_html(&file.name),
                human_size(file.bytes.len()),
            ));
        }
        body.push_str("</div>\n");
    }

    if let Some(started) = report.started_at {
        body.push_str(&format!(
            "<p><small>Last run started {}</small></p>\n",
            started.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }

    body.push_str("</body>\n</html>\n");
    body
}

fn human_size(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipstage::staging::{StagedFile, UrlFailure};

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<script>\"&\"</script>"),
            "&lt;script&gt;&quot;&amp;&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn encode_href_handles_spaces_and_reserved() {
        assert_eq!(encode_href("My Clip #1.mp4"), "My%20Clip%20%231.mp4");
        assert_eq!(encode_href("a&b?.mp4"), "a%26b%3F.mp4");
    }

    #[test]
    fn page_lists_staged_files_and_failures() {
        let report = RunReport {
            files: vec![StagedFile {
                name: "My Video.mp4".into(),
                bytes: vec![0; 2048],
            }],
            failures: vec![UrlFailure {
                url: "https://youtu.be/x".into(),
                category: "private".into(),
                detail: "video is private".into(),
            }],
            ..RunReport::default()
        };

        let page = render_page(&report);
        assert!(page.contains("/files/My%20Video.mp4"));
        assert!(page.contains("My Video.mp4"));
        assert!(page.contains("video is private"));
        assert!(page.contains("2.0 KiB"));
    }

    #[test]
    fn aborted_runs_render_a_banner() {
        let report = RunReport::aborted("yt-dlp is not installed");
        let page = render_page(&report);
        assert!(page.contains("Run aborted"));
        assert!(page.contains("yt-dlp is not installed"));
    }

    #[test]
    fn empty_report_renders_only_the_form() {
        let page = render_page(&RunReport::default());
        assert!(page.contains("<form"));
        assert!(!page.contains("Downloads</h2>"));
        assert!(!page.contains("Failures</h2>"));
    }

    #[test]
    fn human_size_scales() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
