//! Helpers shared by the reqwest-backed provider adapters.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

/// Default request timeout for provider calls that have no dedicated setting.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client with an explicit request timeout.
///
/// # Errors
///
/// Returns an error when the TLS backend cannot be initialised.
pub fn client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("songsmith-backend/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Resolve `path` below `base`, treating `base` as a directory even when it
/// lacks a trailing slash.
///
/// # Errors
///
/// Returns an error when the joined URL is invalid.
pub fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut directory = base.clone();
    if !directory.path().ends_with('/') {
        let with_slash = format!("{}/", directory.path());
        directory.set_path(&with_slash);
    }
    directory.join(path.trim_start_matches('/'))
}

/// Single-line, length-capped rendering of a provider response body for
/// error messages and logs.
pub fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

/// `status N` or `status N: <preview>`.
pub fn status_message(status: StatusCode, body: &[u8]) -> String {
    let preview = body_preview(body);
    if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {preview}", status.as_u16())
    }
}
