#![forbid(unsafe_code)]

//! Command-line companion to the web backend. Feeds a URL list through the
//! same orchestration and writes the produced files to a directory instead
//! of staging them in memory.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use clipstage::{
    batch::{parse_entries, run_batch},
    config::{DEFAULT_CONFIG_PATH, load_runtime_config_from},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Download YouTube URLs as MP4 files.")]
struct Cli {
    /// File with one URL per line, or `-` for stdin.
    #[arg(value_name = "URL_LIST")]
    url_list: PathBuf,

    /// Treat each line as `URL [start [end]]` and trim to the clip range.
    #[arg(long)]
    clips: bool,

    /// Directory the downloaded files are written into.
    #[arg(long = "out-dir", value_name = "PATH", default_value = ".")]
    out_dir: PathBuf,

    /// Env-file configuration to load.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let text = if cli.url_list.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading URL list from stdin")?;
        buffer
    } else {
        fs::read_to_string(&cli.url_list)
            .with_context(|| format!("reading {}", cli.url_list.display()))?
    };

    let entries = parse_entries(&text, cli.clips);
    if entries.is_empty() {
        bail!("{} contains no URLs", cli.url_list.display());
    }

    let config = load_runtime_config_from(&cli.config)?;

    println!("Downloading {} URL(s)...", entries.len());
    let report = run_batch(&entries, &config)?;

    for warning in &report.warnings {
        eprintln!("Warning: {}", warning);
    }

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;

    for file in &report.files {
        let target = cli.out_dir.join(&file.name);
        fs::write(&target, &file.bytes)
            .with_context(|| format!("writing {}", target.display()))?;
        println!("  Saved {}", target.display());
    }

    for failure in &report.failures {
        eprintln!(
            "  Failed {} [{}]: {}",
            failure.url, failure.category, failure.detail
        );
    }

    println!(
        "Done: {} file(s), {} failure(s)",
        report.files.len(),
        report.failures.len()
    );

    if report.files.is_empty() && !report.failures.is_empty() {
        bail!("every URL failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "fetch_batch",
            "urls.txt",
            "--clips",
            "--out-dir",
            "/tmp/out",
        ]);
        assert_eq!(cli.url_list, PathBuf::from("urls.txt"));
        assert!(cli.clips);
        assert_eq!(cli.out_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
