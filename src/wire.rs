use serde_json::Value;
use tracing::debug;

use crate::model::{Cursor, FileRecord, Page};

/// Body of `GET {base}/{product}/files`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ListingResponse {
    #[serde(default)]
    pub(crate) page: Option<u64>,
    #[serde(default)]
    pub(crate) total_pages: Option<u64>,
    #[serde(default)]
    pub(crate) total_files: Option<u64>,
    #[serde(default)]
    pub(crate) total_size: Option<u64>,
    #[serde(default)]
    pub(crate) expires_at: Option<String>,
    #[serde(default)]
    pub(crate) number_of_files_for_page: Option<u64>,
    #[serde(default)]
    pub(crate) download_links: Vec<FileRecord>,
}

impl ListingResponse {
    /// Converts the body into a [`Page`], deriving the next cursor from
    /// `page`/`total_pages`.
    ///
    /// `requested` is the page number the request asked for. It drives the
    /// cursor; the echoed `page` field is only logged.
    pub(crate) fn into_page(self, product: &str, requested: u64) -> Page {
        let current = requested;
        let total = self.total_pages.unwrap_or(current);

        debug!(
            product,
            page = current,
            echoed_page = ?self.page,
            total_pages = total,
            total_files = ?self.total_files,
            total_size = ?self.total_size,
            expires_at = self.expires_at.as_deref().unwrap_or(""),
            page_files = self
                .number_of_files_for_page
                .unwrap_or(self.download_links.len() as u64),
            "fetched listing page"
        );

        let next = (current < total).then(|| Cursor::new((current + 1).to_string()));
        Page {
            records: self.download_links,
            next,
        }
    }
}

/// Page number a cursor refers to. Cursors are minted by [`ListingResponse::into_page`]
/// so anything unparsable is treated as the first page.
pub(crate) fn page_number(cursor: Option<&Cursor>) -> u64 {
    cursor
        .and_then(|c| c.as_str().parse::<u64>().ok())
        .unwrap_or(1)
}

/// Renders a JSON parameter value as query-string text. `None` means "omit".
pub(crate) fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
