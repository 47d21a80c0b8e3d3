//! A small blocking client for the Dewey Data API.
//!
//! The crate walks a product's cursor-paginated file listing lazily and can
//! stream every listed file to disk, grouped by partition key or flattened.
//!
//! ## Quick start
//! - Configure the key via `DEWEY_API_KEY` or a `.deweyrc` file (current
//!   directory or home directory), or pass it to [`ClientConfig::new`].
//! - Call [`list_files`] and hand the listing to a [`Downloader`].
//!
//! ```no_run
//! use dewey::{Client, Downloader, RequestParams, list_files};
//!
//! fn main() -> dewey::Result<()> {
//!     let client = Client::from_env()?;
//!     let listing = list_files(&client, "978cz-306w", &RequestParams::new())?;
//!     let summary = Downloader::new("out")
//!         .with_partition(true)
//!         .download_all(&client, listing, |record| {
//!             println!("{}", record.url);
//!             Ok(())
//!         })?;
//!     println!("{} files, {} bytes", summary.files, summary.bytes);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;
mod download;
mod error;
mod lister;
mod model;
mod report;
mod util;
mod wire;

pub use client::{API_KEY_HEADER, Client, DataApi};
pub use config::{ClientConfig, DEFAULT_URL, ENV_KEY, ENV_RC, ENV_URL, load_config};
pub use download::{DownloadSummary, Downloader, FailurePolicy};
pub use error::{Error, Result};
pub use lister::{
    DATE_PARTITION_AFTER, DATE_PARTITION_BEFORE, FileListing, default_params, list_files,
};
pub use model::{Cursor, FileRecord, Page, ProductMetadata, RequestParams};
pub use report::{OutputFormat, Reporter};
