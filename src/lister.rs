//! Lazy walk over a product's paginated file listing.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use serde_json::Value;
use tracing::{debug, info};

use crate::client::DataApi;
use crate::error::Result;
use crate::model::{Cursor, FileRecord, ProductMetadata, RequestParams};

/// Lower/upper partition bounds requested by default for date-partitioned products.
pub const DATE_PARTITION_AFTER: &str = "1900-01-01";
pub const DATE_PARTITION_BEFORE: &str = "2099-12-31";

/// Iterator over every [`FileRecord`] of a product, in page order then
/// within-page order.
///
/// Page `k + 1` is requested only once every record of page `k` has been
/// yielded, so consumers can act on early records before the rest of the
/// listing exists. The walk ends when a page carries no next cursor. A failed
/// page request is yielded as a single `Err` after all earlier records, and
/// the iterator is exhausted from then on.
pub struct FileListing<'p, A> {
    api: A,
    product: &'p str,
    params: RequestParams,
    cursor: Option<Cursor>,
    buffered: VecDeque<FileRecord>,
    pages: u64,
    yielded: u64,
    done: bool,
}

impl<'p, A: DataApi> FileListing<'p, A> {
    pub fn new(api: A, product: &'p str, params: RequestParams) -> Self {
        Self {
            api,
            product,
            params,
            cursor: None,
            buffered: VecDeque::new(),
            pages: 0,
            yielded: 0,
            done: false,
        }
    }

    /// Listing requests issued so far.
    pub fn pages_fetched(&self) -> u64 {
        self.pages
    }

    /// Parameters sent with every page request.
    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    fn fetch_next_page(&mut self) -> Result<()> {
        let page = self
            .api
            .fetch_page(self.product, &self.params, self.cursor.as_ref())?;
        self.pages += 1;

        debug!(
            product = self.product,
            page = self.pages,
            records = page.records.len(),
            more = page.next.is_some(),
            "absorbed listing page"
        );

        self.buffered.extend(page.records);
        match page.next {
            Some(next) => self.cursor = Some(next),
            None => {
                self.done = true;
                info!(
                    product = self.product,
                    pages = self.pages,
                    files = self.yielded + self.buffered.len() as u64,
                    "listing complete"
                );
            }
        }
        Ok(())
    }
}

impl<A: DataApi> Iterator for FileListing<'_, A> {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                self.yielded += 1;
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_next_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

impl<A: DataApi> FusedIterator for FileListing<'_, A> {}

/// Default listing parameters implied by the product metadata.
///
/// Date-partitioned products only list files inside the requested partition
/// range, so the widest range is asked for unless the caller overrides it.
pub fn default_params(meta: &ProductMetadata) -> RequestParams {
    let mut params = RequestParams::new();
    if meta.is_date_partitioned() {
        params.insert(
            "partition_key_after".to_string(),
            Value::from(DATE_PARTITION_AFTER),
        );
        params.insert(
            "partition_key_before".to_string(),
            Value::from(DATE_PARTITION_BEFORE),
        );
    }
    params
}

/// Fetches the product metadata, merges its defaults under `params` and
/// returns the lazy listing. Metadata failures abort before any listing request.
pub fn list_files<'p, A: DataApi>(
    api: A,
    product: &'p str,
    params: &RequestParams,
) -> Result<FileListing<'p, A>> {
    let meta = api.fetch_metadata(product)?;
    let mut merged = default_params(&meta);
    merged.extend(params.clone());
    debug!(product, params = ?merged, "listing files");
    Ok(FileListing::new(api, product, merged))
}
