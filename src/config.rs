use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Products endpoint of the public API.
pub const DEFAULT_URL: &str = "https://app.deweydata.io/external-api/v3/products";

pub const ENV_URL: &str = "DEWEY_API_URL";
pub const ENV_KEY: &str = "DEWEY_API_KEY";
pub const ENV_RC: &str = "DEWEY_RC";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Products endpoint; product paths are appended to it.
    pub url: String,
    /// API key sent as `X-API-KEY`.
    pub key: String,
    /// Pause before every request.
    pub delay: Duration,
    /// Whole-request timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            key: key.into(),
            delay: Duration::ZERO,
            timeout: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    url: Option<String>,
    key: Option<String>,
}

/// Resolves url and key (in order of precedence):
/// - explicit arguments
/// - environment variables `DEWEY_API_URL` / `DEWEY_API_KEY`
/// - rc file from `DEWEY_RC`, `./.deweyrc` or `~/.deweyrc`
///
/// The url falls back to [`DEFAULT_URL`]; a missing key is an [`Error::Auth`].
pub fn load_config(url: Option<String>, key: Option<String>) -> Result<ClientConfig> {
    let mut url = non_empty(url).or_else(|| non_empty(std::env::var(ENV_URL).ok()));
    let mut key = non_empty(key).or_else(|| non_empty(std::env::var(ENV_KEY).ok()));

    let candidates = rc_candidates();
    if url.is_none() || key.is_none() {
        for rc_path in &candidates {
            if rc_path.exists() {
                let cfg = read_rc(rc_path)?;
                url = url.or(cfg.url);
                key = key.or(cfg.key);
                break;
            }
        }
    }

    let Some(key) = key else {
        let searched = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::Auth {
            status: None,
            url: None,
            message: format!(
                "missing API key (pass --key, set {ENV_KEY} or put `key:` in one of: {searched})"
            ),
        });
    };

    Ok(ClientConfig::new(key).with_url(url.unwrap_or_else(|| DEFAULT_URL.to_string())))
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // `key:` may stand alone with the value on the following line.
    let mut pending: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(field) = pending.take() {
            let names_field = line
                .split_once(':')
                .is_some_and(|(k, _)| matches!(k.trim(), "url" | "key"));
            if !names_field {
                cfg.set(field, strip_quotes(line));
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v);
            if v.is_empty() {
                pending = match k {
                    "url" => Some("url"),
                    "key" => Some("key"),
                    _ => None,
                };
            } else {
                cfg.set(k, v);
            }
        }
    }

    cfg
}

impl RcConfig {
    fn set(&mut self, field: &str, value: &str) {
        match field {
            "url" => self.url = Some(value.to_string()),
            "key" => self.key = Some(value.to_string()),
            _ => {}
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    if let Ok(p) = std::env::var(ENV_RC) {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".deweyrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".deweyrc"));
    }
    v
}
