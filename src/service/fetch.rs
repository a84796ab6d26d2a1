//! Single-document downloads for URL imports.
use std::time::Duration;

use thiserror::Error;

/// Errors raised while downloading a document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or has no usable scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection, DNS or body read failure.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP error: status {status}")]
    Http { status: u16 },
}

/// Downloads a document as text.
///
/// Implemented over HTTP by [`HttpFetcher`]; tests substitute their own.
pub trait DocumentFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP implementation of [`DocumentFetcher`].
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self { client })
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        parse_url(url)?;

        let response = self.client.get(url).send().map_err(FetchError::Network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        response.text().map_err(FetchError::Network)
    }
}

fn parse_url(url: &str) -> Result<reqwest::Url, FetchError> {
    let parsed =
        reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FetchError::InvalidUrl(format!(
            "{url}: unsupported scheme '{other}'"
        ))),
    }
}

/// Derives the import path for a downloaded document from its URL.
///
/// Uses the last path segment; documents without a supported extension are
/// treated as markdown.
///
/// # Examples
///
/// ```
/// use mindtree::service::file_name_from_url;
///
/// assert_eq!(file_name_from_url("https://host/notes/Plan.md").unwrap(), "Plan.md");
/// assert_eq!(file_name_from_url("https://host/board.canvas?raw=1").unwrap(), "board.canvas");
/// assert_eq!(file_name_from_url("https://host/wiki/Page").unwrap(), "Page.md");
/// assert_eq!(file_name_from_url("https://host/").unwrap(), "host.md");
/// ```
pub fn file_name_from_url(url: &str) -> Result<String, FetchError> {
    let parsed = parse_url(url)?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| s.replace("%20", " "))
        .or_else(|| parsed.host_str().map(String::from))
        .unwrap_or_else(|| "document".to_string());

    if crate::importer::classify(&segment, "").is_some() {
        Ok(segment)
    } else {
        Ok(format!("{segment}.md"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        let err = file_name_from_url("ftp://host/a.md").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(matches!(
            file_name_from_url("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn decodes_spaces_in_file_names() {
        assert_eq!(
            file_name_from_url("https://host/My%20Note.md").unwrap(),
            "My Note.md"
        );
    }

    #[test]
    fn http_error_display_includes_status() {
        let err = FetchError::Http { status: 404 };
        assert_eq!(err.to_string(), "HTTP error: status 404");
    }

    #[test]
    fn http_fetcher_rejects_invalid_url_without_network() {
        let fetcher = HttpFetcher::new().expect("client should build");
        assert!(matches!(
            fetcher.fetch("mailto:someone@example.org"),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
