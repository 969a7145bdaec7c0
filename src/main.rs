//! Main entry point for the mediazip CLI application.
//!
//! This binary downloads media URLs into a single ZIP archive, downloads
//! them one by one with `-s`, or lists an existing archive with `-l`.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use mediazip::cli::parse_url_list;
use mediazip::{
    Cli, DiskSaver, DownloadItem, DownloadStatus, Downloader, HttpFetcher, ProgressEvent,
    ProgressPhase, ProgressSink, ZipReader,
};

/// Application entry point.
///
/// Parses command-line arguments, wires the HTTP fetcher and disk saver into
/// a [`Downloader`], and dispatches to the requested mode.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.list {
        return list_archive(&cli).await;
    }

    let items = collect_items(&cli).await?;
    if items.is_empty() {
        bail!("No URLs given (pass them as arguments or with -i FILE)");
    }

    let mut options = cli.download_options();
    options.progress = progress_sink(&cli);

    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(10))?);
    let saver = Arc::new(
        DiskSaver::new(&cli.output_dir)
            .with_direct_downloads(fetcher.clone(), options.request_timeout),
    );
    let downloader = Downloader::new(fetcher.clone(), saver.clone());

    // Ctrl-C cancels cooperatively; in-flight work is discarded
    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            cancel.cancel();
        }
    });

    if cli.single {
        download_each(&downloader, &items, &options, &cli).await?;
    } else {
        download_archive(&downloader, &items, &options, &cli, saver.dir()).await?;
    }

    // Display network transfer statistics
    if !cli.is_quiet() {
        eprintln!(
            "\nTotal bytes transferred: {}",
            format_size(fetcher.transferred_bytes())
        );
    }

    Ok(())
}

/// Install the tracing subscriber; `RUST_LOG` wins over `-v`.
fn init_tracing(cli: &Cli) {
    let default = if cli.verbose { "mediazip=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Build the item list from positional URLs followed by the `-i` file.
async fn collect_items(cli: &Cli) -> Result<Vec<DownloadItem>> {
    let mut items: Vec<DownloadItem> = cli.inputs.iter().map(DownloadItem::from_url).collect();

    if let Some(ref path) = cli.input_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read URL list {path}"))?;
        items.extend(parse_url_list(&text).into_iter().map(|(url, name)| match name {
            Some(name) => DownloadItem::new(url, name),
            None => DownloadItem::from_url(url),
        }));
    }

    Ok(items)
}

/// Print per-file progress lines to stderr unless quiet.
fn progress_sink(cli: &Cli) -> Option<ProgressSink> {
    if cli.is_quiet() {
        return None;
    }

    let sink: ProgressSink = Arc::new(|event: ProgressEvent| match event.phase {
        ProgressPhase::Downloading => eprintln!(
            "  downloading: {} [{}/{}]",
            event.filename, event.current, event.total
        ),
        ProgressPhase::Complete => eprintln!("  saved: {}", event.filename),
        ProgressPhase::Preparing | ProgressPhase::Error => {}
    });
    Some(sink)
}

/// Bulk mode: everything into one archive.
async fn download_archive(
    downloader: &Downloader,
    items: &[DownloadItem],
    options: &mediazip::DownloadOptions,
    cli: &Cli,
    out_dir: &Path,
) -> Result<()> {
    let result = downloader.download_bulk(items, options).await?;

    if !cli.is_very_quiet() {
        for failure in &result.failures {
            eprintln!("Failed: {} ({})", failure.url, failure.error);
        }
    }

    match result.status {
        DownloadStatus::Success | DownloadStatus::Partial => {
            if !cli.is_quiet() {
                println!(
                    "{}: {}/{} files, {} written to {}",
                    result.status,
                    result.files_successful,
                    result.files_processed,
                    format_size(result.archive_size() as u64),
                    out_dir.join(&options.archive_name).display()
                );
            }
            Ok(())
        }
        DownloadStatus::Cancelled => bail!("Download cancelled, no archive written"),
        DownloadStatus::Error => bail!("All {} downloads failed", result.files_processed),
    }
}

/// Single mode: each URL saved on its own through the direct-download path.
async fn download_each(
    downloader: &Downloader,
    items: &[DownloadItem],
    options: &mediazip::DownloadOptions,
    cli: &Cli,
) -> Result<()> {
    let mut failed = 0usize;

    for item in items {
        match downloader.download_single(item, options).await {
            Ok(_) => {}
            Err(mediazip::DownloadError::Cancelled) => bail!("Download cancelled"),
            Err(e) => {
                failed += 1;
                if !cli.is_very_quiet() {
                    eprintln!("Failed: {} ({})", item.url, e);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} downloads failed", failed, items.len());
    }
    Ok(())
}

/// List files in an archive, verifying each entry's CRC-32.
async fn list_archive(cli: &Cli) -> Result<()> {
    let Some(path) = cli.inputs.first() else {
        bail!("-l needs an archive path");
    };
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {path}"))?;
    let reader = ZipReader::new(&data)?;
    let entries = reader.entries()?;

    println!("{:>10}  {:>8}  Name", "Length", "CRC-32");
    println!("{}", "-".repeat(40));

    let mut total = 0u64;
    for entry in &entries {
        println!(
            "{:>10}  {:08x}  {}",
            entry.uncompressed_size, entry.crc32, entry.file_name
        );
        total += entry.uncompressed_size;
    }

    println!("{}", "-".repeat(40));
    println!("{:>10}  {:>8}  {} files", total, "", entries.len());

    reader.verify()?;
    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
