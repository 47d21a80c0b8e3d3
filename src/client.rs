use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::config::{ClientConfig, load_config};
use crate::error::{Error, Result};
use crate::model::{Cursor, Page, ProductMetadata, RequestParams};
use crate::wire::{ListingResponse, page_number, query_value};

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// The three calls the retrieval engine makes against the API.
///
/// [`Client`] is the HTTP implementation; the lister and the downloader only
/// depend on this trait.
pub trait DataApi {
    /// Descriptive metadata of `product`.
    fn fetch_metadata(&self, product: &str) -> Result<ProductMetadata>;

    /// One listing page of `product`. `cursor` is `None` for the first page.
    fn fetch_page(
        &self,
        product: &str,
        params: &RequestParams,
        cursor: Option<&Cursor>,
    ) -> Result<Page>;

    /// Streaming read of the file content at a server-supplied absolute URL.
    fn stream_file(&self, url: &str) -> Result<Box<dyn Read + '_>>;
}

impl<A: DataApi + ?Sized> DataApi for &A {
    fn fetch_metadata(&self, product: &str) -> Result<ProductMetadata> {
        (**self).fetch_metadata(product)
    }

    fn fetch_page(
        &self,
        product: &str,
        params: &RequestParams,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        (**self).fetch_page(product, params, cursor)
    }

    fn stream_file(&self, url: &str) -> Result<Box<dyn Read + '_>> {
        (**self).stream_file(url)
    }
}

/// Blocking API session: base URL, key, delay and the HTTP transport.
#[derive(Debug, Clone)]
pub struct Client {
    base: Url,
    key: String,
    delay: Duration,
    http: HttpClient,
}

impl Client {
    /// Creates a client from `DEWEY_API_URL` / `DEWEY_API_KEY` and the rc file.
    pub fn from_env() -> Result<Self> {
        Self::new(load_config(None, None)?)
    }

    pub fn new(cfg: ClientConfig) -> Result<Self> {
        let key = cfg.key.trim().to_string();
        if key.is_empty() {
            return Err(Error::Auth {
                status: None,
                url: None,
                message: "API key is empty".to_string(),
            });
        }

        let base = Url::parse(cfg.url.trim())
            .map_err(|e| Error::Config(format!("invalid API url {:?}: {e}", cfg.url)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("API url {:?} cannot be a base", cfg.url)));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dewey-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("dewey-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base,
            key,
            delay: cfg.delay,
            http,
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn product_url(&self, product: &str, tail: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(product).extend(tail);
        }
        url
    }

    /// Shared wrapper for every request: waits the configured delay, then
    /// issues a GET, attaching the key when `with_key` is set, and maps
    /// transport failures and non-2xx statuses onto [`Error`].
    fn send(&self, url: &str, query: &[(String, String)], with_key: bool) -> Result<Response> {
        if !self.delay.is_zero() {
            trace!(delay = ?self.delay, "sleeping before request");
            thread::sleep(self.delay);
        }

        let mut req = self.http.get(url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if with_key {
            req = req
                .header(API_KEY_HEADER, self.key.as_str())
                .header(ACCEPT, "application/json");
        }

        debug!(url, params = query.len(), "GET");
        let resp = req.send().map_err(|e| Error::transport(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::from_status(status, url, &body));
        }
        Ok(resp)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url, query: &[(String, String)]) -> Result<T> {
        let url = url.as_str();
        let text = self
            .send(url, query, true)?
            .text()
            .map_err(|e| Error::transport(url, e))?;
        serde_json::from_str(&text).map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })
    }

    // The key only goes to the API host; file links usually point at
    // pre-signed storage URLs on another origin.
    fn same_origin(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|u| u.origin() == self.base.origin())
    }
}

impl DataApi for Client {
    fn fetch_metadata(&self, product: &str) -> Result<ProductMetadata> {
        debug!(product, "fetching metadata");
        let url = self.product_url(product, &["files", "metadata"]);
        self.get_json(&url, &[])
    }

    fn fetch_page(
        &self,
        product: &str,
        params: &RequestParams,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        let url = self.product_url(product, &["files"]);

        let mut query: Vec<(String, String)> = params
            .iter()
            .filter_map(|(k, v)| query_value(v).map(|v| (k.clone(), v)))
            .collect();
        if let Some(cursor) = cursor {
            query.retain(|(k, _)| k != "page");
            query.push(("page".to_string(), cursor.to_string()));
        }

        let resp: ListingResponse = self.get_json(&url, &query)?;
        Ok(resp.into_page(product, page_number(cursor)))
    }

    fn stream_file(&self, url: &str) -> Result<Box<dyn Read + '_>> {
        let resp = self.send(url, &[], self.same_origin(url))?;
        Ok(Box::new(resp))
    }
}
