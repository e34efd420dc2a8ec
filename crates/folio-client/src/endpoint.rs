//! Live channel endpoint resolution.

use folio_core::{Error, Result};
use url::Url;

/// Resolve the live channel URL for a client running under `origin`.
///
/// Without a configured URL the channel lives at the origin's root. A
/// configured URL may be absolute or relative to the origin. Either way the
/// scheme follows the origin: `https` pages use `wss`, `http` pages use `ws`.
pub fn resolve_endpoint(origin: &Url, configured: Option<&str>) -> Result<Url> {
    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(Error::Config(format!(
                "Unsupported origin scheme '{}' in {}",
                other, origin
            )))
        }
    };

    let mut url = match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => origin
            .join(raw)
            .map_err(|e| Error::Config(format!("Invalid live channel URL '{}': {}", raw, e)))?,
        None => {
            let mut root = origin.clone();
            root.set_path("/");
            root.set_query(None);
            root.set_fragment(None);
            root
        }
    };

    if url.set_scheme(scheme).is_err() {
        return Err(Error::Config(format!(
            "Cannot use '{}' as a live channel URL",
            url
        )));
    }
    Ok(url)
}
