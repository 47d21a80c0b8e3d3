use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the API session, the lister, the downloader and the reporter.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or rejected API key (HTTP 401/403, or an empty key).
    #[error("authentication failed{}: {message}", status_suffix(.status))]
    Auth {
        status: Option<u16>,
        url: Option<String>,
        message: String,
    },

    /// Unknown product or missing resource (HTTP 404).
    #[error("not found (HTTP 404) for url ({url}){}", message_suffix(.message))]
    NotFound { url: String, message: String },

    /// Any other non-2xx response.
    #[error("API request failed: HTTP {status} for url ({url}){}", message_suffix(.message))]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    /// Connection, TLS, DNS or body read failure.
    #[error("transport error for url ({url}): {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A 2xx response whose body is not the expected JSON.
    #[error("failed to parse API JSON (url={url}): {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A partition key or file name that cannot be used as a path component.
    #[error("refusing to write outside the destination: {reason} ({value:?})")]
    InvalidPath { value: String, reason: &'static str },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write listing: {0}")]
    Report(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transport(
        url: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            url: url.to_string(),
            source: source.into(),
        }
    }

    /// Maps a non-2xx status and its body onto the error taxonomy.
    pub(crate) fn from_status(status: StatusCode, url: &str, body: &str) -> Self {
        let message = server_message(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth {
                status: Some(status.as_u16()),
                url: Some(url.to_string()),
                message: if message.is_empty() {
                    "check the API key (--key, DEWEY_API_KEY or the rc file)".to_string()
                } else {
                    message
                },
            },
            StatusCode::NOT_FOUND => Self::NotFound {
                url: url.to_string(),
                message,
            },
            _ => Self::Api {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            },
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// Error payloads come as {"message": ...}, {"detail": ...} or {"error": ...};
// anything else is shown as raw text.
fn server_message(body: &str) -> String {
    let body = body.trim();
    if let Ok(e) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(m) = e.message.or(e.detail).or(e.error) {
            return m;
        }
    }
    body.chars().take(512).collect()
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn message_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!("\n{message}")
    }
}
