//! Shared HTTP helpers: URL joining, Basic auth and streamed downloads.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::ClientError;

pub fn build_http_client(timeout: Duration) -> Result<Client, ClientError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("romhaul/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Append path segments to `base`. Segments may contain `/`; empty parts are
/// skipped. With `directory` set the result ends in a slash.
pub fn join_url(base: &str, parts: &[&str], directory: bool) -> Result<Url, ClientError> {
    let mut url = Url::parse(base)
        .map_err(|e| ClientError::Configuration(format!("invalid root URL '{}': {}", base, e)))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ClientError::Configuration(format!("URL cannot be a base: {}", base)))?;
        segments.pop_if_empty();
        for part in parts {
            segments.extend(part.split('/').filter(|s| !s.is_empty()));
        }
        if directory {
            segments.push("");
        }
    }
    Ok(url)
}

/// `Authorization` header value for HTTP Basic auth.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", username, password))
    )
}

/// GET a URL and return the body, failing on non-success status.
pub async fn get_text(
    http: &Client,
    url: &str,
    authorization: Option<&str>,
) -> Result<String, ClientError> {
    let mut request = http.get(url);
    if let Some(auth) = authorization {
        request = request.header(AUTHORIZATION, auth);
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.text().await?)
}

/// Stream a URL into `dest`, creating parent directories. Returns bytes
/// written. A failed transfer may leave a partial file behind.
pub async fn fetch_to_path(
    http: &Client,
    url: &str,
    authorization: Option<&str>,
    dest: &Path,
) -> Result<u64, ClientError> {
    debug!(url = %url, dest = %dest.display(), "Downloading");

    let mut request = http.get(url);
    if let Some(auth) = authorization {
        request = request.header(AUTHORIZATION, auth);
    }
    let mut response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}
