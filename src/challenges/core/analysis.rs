//! URL helpers shared by the classifier, the poller, and the session backends.
//!
//! Challenge gates are served from the site origin, not from the API path the
//! token exchange targets, so most helpers here strip a URL back to
//! `scheme://host[:port]/`.

use url::Url;

/// Reduce a URL to its origin (`scheme://host[:port]/`), dropping credentials,
/// path, query, and fragment.
pub fn origin_url(url: &Url) -> Url {
    let mut origin = url.clone();
    let _ = origin.set_username("");
    let _ = origin.set_password(None);
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

/// Build origin header value from URL (`scheme://host[:port]`).
pub fn origin_from_url(url: &Url) -> String {
    let mut origin = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));
    if let Some(port) = url.port() {
        origin.push(':');
        origin.push_str(&port.to_string());
    }
    origin
}

/// Token endpoint for a base URL: `oauth2/token` appended to the base path.
pub fn token_endpoint(base_url: &Url) -> Url {
    let mut endpoint = base_url.clone();
    let mut path = endpoint.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str("oauth2/token");
    endpoint.set_path(&path);
    endpoint
}

/// Resolve a PerimeterX `blockScript` / `altBlockScript` pair into the page the
/// rendered session should open.
///
/// A root-relative `blockScript` is joined onto the origin; otherwise an
/// absolute `altBlockScript` is taken verbatim.
pub fn resolve_block_script(
    origin: &Url,
    block_script: Option<&str>,
    alt_block_script: Option<&str>,
) -> Option<Url> {
    if let Some(relative) = block_script.filter(|s| s.starts_with('/')) {
        return origin_url(origin).join(relative).ok();
    }

    alt_block_script
        .filter(|s| s.starts_with("http"))
        .and_then(|absolute| Url::parse(absolute).ok())
}
