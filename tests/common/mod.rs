//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use std::time::Duration;

use dewey::{Client, ClientConfig};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const KEY: &str = "test-key";

/// Products endpoint served by `server`.
pub fn products_url(server: &MockServer) -> String {
    format!("{}/v3/products", server.uri())
}

pub fn client(base: &str, delay: Duration) -> Client {
    Client::new(ClientConfig::new(KEY).with_url(base).with_delay(delay))
        .expect("client should build")
}

/// Runs blocking client code off the async test runtime.
pub async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

/// Listing body for `page` of `total`.
pub fn listing_page(page: u64, total: u64, links: Vec<Value>) -> Value {
    json!({
        "page": page,
        "total_pages": total,
        "total_files": links.len() as u64 * total,
        "total_size": 0,
        "expires_at": "2030-01-01T00:00:00Z",
        "number_of_files_for_page": links.len(),
        "download_links": links,
    })
}

pub fn link(url: &str, size: u64, partition_key: &str) -> Value {
    json!({
        "link": url,
        "file_size_bytes": size,
        "partition_key": partition_key,
    })
}
