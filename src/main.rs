//! CLI entry point for the Dewey Data client.

use std::cell::Cell;
use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Parser;
use dewey::{Client, DataApi, Downloader, Reporter, list_files, load_config};
use tracing::{debug, info};

mod cli;

use cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG, when set, replaces the -v/-q level.
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(command = ?args.command, product = %args.product, "CLI arguments parsed");

    let cfg = load_config(args.url.clone(), args.key.clone())
        .context("failed to resolve API configuration")?
        .with_delay(args.sleep)
        .with_timeout(args.timeout);
    let client = Client::new(cfg).context("failed to create API client")?;

    let product = args.product.as_str();
    let params = args.params.clone().unwrap_or_default();

    match &args.command {
        Command::Meta => {
            let meta = client
                .fetch_metadata(product)
                .with_context(|| format!("failed to fetch metadata for product {product}"))?;
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &meta)?;
            writeln!(stdout)?;
        }

        Command::List(output) => {
            let format = output.output_format()?;
            let listing = list_files(&client, product, &params)
                .with_context(|| format!("failed to fetch metadata for product {product}"))?;

            let mut reporter = Reporter::new(io::stdout().lock(), format);
            for record in listing {
                let record = record
                    .with_context(|| format!("failed to fetch listing page for product {product}"))?;
                reporter.write(&record)?;
            }
            info!(product, files = reporter.written(), "listed files");
            reporter.finish()?;
        }

        Command::Download {
            dirpath,
            no_partition,
            no_progress,
            output,
        } => {
            let format = output.output_format()?;
            let listing = list_files(&client, product, &params)
                .with_context(|| format!("failed to fetch metadata for product {product}"))?;

            let listing_failed = Cell::new(false);
            let listing = listing.inspect(|r| listing_failed.set(r.is_err()));

            let downloader = Downloader::new(dirpath)
                .with_partition(!no_partition)
                .with_progress(!no_progress && io::stderr().is_terminal());

            let mut reporter = Reporter::new(io::stdout().lock(), format);
            let outcome = downloader.download_all(&client, listing, |record| reporter.write(record));
            reporter.finish()?;

            let summary = outcome.with_context(|| {
                if listing_failed.get() {
                    format!("failed to fetch listing page for product {product}")
                } else {
                    format!("file download failed for product {product}")
                }
            })?;
            info!(
                product,
                files = summary.files,
                bytes = summary.bytes,
                dest = %dirpath.display(),
                "downloaded files"
            );
        }
    }

    Ok(())
}
