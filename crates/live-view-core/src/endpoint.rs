//! Connection endpoint derivation.
//!
//! The endpoint is computed from the page's own location: the scheme is
//! upgraded to its WebSocket equivalent, the path is replaced with the
//! reserved live view path, and host, port and query are kept.

use url::Url;

use crate::error::{LiveViewError, Result};

/// Reserved path the server listens on for live view connections.
pub const LIVE_VIEW_PATH: &str = "/live-view";

/// Map a page scheme to its connection-layer equivalent.
fn upgrade_scheme(scheme: &str) -> Option<&'static str> {
    match scheme {
        "http" | "ws" => Some("ws"),
        "https" | "wss" => Some("wss"),
        _ => None,
    }
}

/// Derive the live view endpoint for a page location.
pub fn derive_endpoint(page: &Url, path: &str) -> Result<Url> {
    let scheme = upgrade_scheme(page.scheme())
        .ok_or_else(|| LiveViewError::UnsupportedScheme(page.scheme().to_string()))?;

    let mut endpoint = page.clone();
    endpoint
        .set_scheme(scheme)
        .map_err(|()| LiveViewError::UnsupportedScheme(page.scheme().to_string()))?;
    endpoint.set_path(path);
    endpoint.set_fragment(None);
    Ok(endpoint)
}

/// Parse a page location and derive its live view endpoint.
pub fn derive_endpoint_str(page: &str, path: &str) -> Result<Url> {
    let page = Url::parse(page)?;
    derive_endpoint(&page, path)
}
