//! Utility functions and helpers.

pub mod http;
pub mod process;

use url::Url;

/// Replace the password component of a URL so it can be logged.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => raw.to_string(),
    }
}
