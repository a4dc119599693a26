use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported link scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Check an article link before handing it to the system browser.
///
/// Only http and https are allowed; `file:`, `javascript:` and custom
/// handlers coming from feed content are refused.
pub fn validate_url_for_open(link: &str) -> Result<Url, LinkError> {
    let url = Url::parse(link.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LinkError::UnsupportedScheme(other.to_string())),
    }
}
