use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extra query parameters merged into every listing request.
pub type RequestParams = Map<String, Value>;

/// One downloadable file in a product's listing.
///
/// `url`, `size`, `partition_key` and `file_name` are interpreted by the
/// downloader; every other server field is kept in `extra` and written out
/// untouched by the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(alias = "link")]
    pub url: String,
    #[serde(default, alias = "file_size_bytes", alias = "file_size")]
    pub size: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub partition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileRecord {
    pub fn new(url: impl Into<String>, size: u64, partition_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            size,
            partition_key: partition_key.into(),
            file_name: None,
            extra: Map::new(),
        }
    }

    /// Partition key, or `None` when the server left it absent or empty.
    pub fn partition(&self) -> Option<&str> {
        let key = self.partition_key.trim();
        if key.is_empty() { None } else { Some(key) }
    }

    /// Flat `(column, value)` view used for delimited output.
    pub fn columns(&self) -> Vec<(String, String)> {
        let mut cols = vec![
            ("url".to_string(), self.url.clone()),
            ("size".to_string(), self.size.to_string()),
            ("partition_key".to_string(), self.partition_key.clone()),
        ];
        if let Some(name) = &self.file_name {
            cols.push(("file_name".to_string(), name.clone()));
        }
        for (k, v) in &self.extra {
            let text = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            cols.push((k.clone(), text));
        }
        cols
    }
}

fn null_as_empty<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

/// Opaque token naming the next listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One listing response: its records plus the cursor of the following page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<FileRecord>,
    pub next: Option<Cursor>,
}

/// Descriptive metadata of a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProductMetadata {
    pub fn is_date_partitioned(&self) -> bool {
        self.partition_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("DATE"))
    }
}
