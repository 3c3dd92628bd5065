//! Reqtape CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use bytes::Bytes;
use http::Request;
use reqtape::fingerprint::{fingerprint_request, DEFAULT_LENGTH, MAX_LENGTH, MIN_LENGTH};
use reqtape::wire::{decode_request, DEFAULT_MAX_HEADERS};
use reqtape::{Config, DirStore, FixtureStore, Recorder, Transport};
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!("Reqtape v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: reqtape <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  ls <dir>                        List fixtures in a directory");
    eprintln!("  fingerprint <req-file> [len]    Fingerprint a request snapshot");
    eprintln!("  fetch <config.toml> <url>       GET a URL through the configured mode");
    process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let result = match (args[1].as_str(), &args[2..]) {
        ("ls", [dir]) => list(Path::new(dir)),
        ("fingerprint", [file]) => fingerprint(Path::new(file), DEFAULT_LENGTH),
        ("fingerprint", [file, length]) => match length.parse() {
            Ok(length) => fingerprint(Path::new(file), length),
            Err(_) => Err(anyhow::anyhow!("Invalid length: {length}")),
        },
        ("fetch", [config, url]) => fetch(PathBuf::from(config), url).await,
        ("ls" | "fingerprint" | "fetch", _) => usage(),
        (command, _) => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'reqtape' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn list(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!("Directory not found: {}", dir.display());
    }

    let store = DirStore::new(dir);
    let entries = store.list()?;

    println!("Fixture directory: {}", dir.display());
    println!();

    let mut partial = 0;
    for entry in &entries {
        let note = if entry.is_partial() {
            partial += 1;
            "  (no response)"
        } else if entry.is_ambiguous() {
            "  (several responses, first one wins)"
        } else {
            ""
        };
        println!("{}{note}", entry.fingerprint);
        for name in entry.requests.iter().chain(&entry.responses) {
            println!("    {name}");
        }
    }

    println!();
    println!("{} fixtures, {partial} without a response", entries.len());
    Ok(())
}

fn fingerprint(file: &Path, length: usize) -> anyhow::Result<()> {
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
        bail!("Length must be in {MIN_LENGTH}..={MAX_LENGTH}, got {length}");
    }

    let data = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let request = decode_request(&data, DEFAULT_MAX_HEADERS)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    println!("{}", fingerprint_request(&request, length));
    Ok(())
}

async fn fetch(config: PathBuf, url: &str) -> anyhow::Result<()> {
    let config = Config::from_file(&config)?;
    let recorder = Recorder::from_config(&config, None);

    let request = Request::get(url)
        .body(Bytes::new())
        .with_context(|| format!("Invalid URL: {url}"))?;
    let response = recorder.round_trip(request).await?;

    println!("{:?} {}", response.version(), response.status());
    for (name, value) in response.headers() {
        println!("{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
    println!();
    println!("{}", String::from_utf8_lossy(response.body()));

    let stats = recorder.stats();
    tracing::info!(
        "{} mode: {} hits, {} misses, {} recorded",
        recorder.mode(),
        stats.hits,
        stats.misses,
        stats.recorded
    );
    Ok(())
}
