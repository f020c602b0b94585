//! A bearer-grade webhook credential.
//!
//! Webhook URLs authorize posting into someone else's chat channel; they
//! must never be logged in full. `WebhookUrl` wraps the raw string so an
//! accidental `{:?}` or `{}` in a log line only ever shows the host, never
//! the path/query that carries the token.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A webhook URL, redacted by default in `Display`/`Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookUrl(String);

impl WebhookUrl {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The full URL, for the HTTP client actually sending the request.
    /// Never pass the result of this call to a `tracing` field.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for WebhookUrl {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for WebhookUrl {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn redact(raw: &str) -> String {
    let Some(scheme_end) = raw.find("://") else {
        return "***".to_owned();
    };
    let after_scheme = &raw[scheme_end + 3..];
    let host_end = after_scheme.find('/').unwrap_or(after_scheme.len());
    format!("{}://{}/***", &raw[..scheme_end], &after_scheme[..host_end])
}

impl fmt::Debug for WebhookUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WebhookUrl({})", redact(&self.0))
    }
}

impl fmt::Display for WebhookUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_redacts_path_and_query() {
        let url = WebhookUrl::from("https://discord.com/api/webhooks/123/secret-token");
        assert_eq!(format!("{url}"), "https://discord.com/***");
        assert_eq!(format!("{url:?}"), "WebhookUrl(https://discord.com/***)");
    }

    #[test]
    fn expose_returns_full_url() {
        let url = WebhookUrl::from("https://example.com/hook?token=abc");
        assert_eq!(url.expose(), "https://example.com/hook?token=abc");
    }

    #[test]
    fn malformed_url_redacts_entirely() {
        let url = WebhookUrl::from("not-a-url");
        assert_eq!(format!("{url}"), "***");
    }

    #[test]
    fn empty_is_detected() {
        assert!(WebhookUrl::from("").is_empty());
        assert!(WebhookUrl::from("   ").is_empty());
        assert!(!WebhookUrl::from("https://x").is_empty());
    }
}
