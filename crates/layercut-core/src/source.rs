use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, Result};

/// Characters left untouched when a URL is embedded as a query value.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Where a clip's media comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum MediaSource {
    /// A session-local object reference. Never valid in a later session.
    LocalBlob(String),
    /// A URL reachable from any session.
    Remote(String),
}

impl MediaSource {
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        if url.starts_with("blob:") {
            MediaSource::LocalBlob(url)
        } else {
            MediaSource::Remote(url)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MediaSource::LocalBlob(url) | MediaSource::Remote(url) => url,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, MediaSource::LocalBlob(_))
    }

    /// The URL to hand to a media handle. Cross-origin http(s) media is
    /// routed through `proxy_endpoint`.
    pub fn playable_url(&self, proxy_endpoint: &str) -> String {
        match self {
            MediaSource::LocalBlob(url) => url.clone(),
            MediaSource::Remote(url) => proxied_url(url, proxy_endpoint),
        }
    }
}

/// Rewrite `raw` as `<endpoint>?url=<encoded raw>` when it is an http(s) URL.
pub fn proxied_url(raw: &str, proxy_endpoint: &str) -> String {
    if raw.starts_with("http") {
        format!(
            "{proxy_endpoint}?url={}",
            utf8_percent_encode(raw, QUERY_VALUE)
        )
    } else {
        raw.to_string()
    }
}

/// Undo [`proxied_url`]. URLs that were not proxied come back unchanged.
pub fn unwrap_proxied(url: &str, proxy_endpoint: &str) -> String {
    let marker = format!("{proxy_endpoint}?url=");
    let Some(idx) = url.find(&marker) else {
        return url.to_string();
    };
    let encoded = &url[idx + marker.len()..];
    let encoded = encoded.split('&').next().unwrap_or(encoded);
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

/// Whether two possibly proxied URLs point at the same media.
///
/// Absolute URLs compare by path only, so re-signed URLs for the same object
/// are treated as one source.
pub fn is_same_source(a: &str, b: &str, proxy_endpoint: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let a = unwrap_proxied(a, proxy_endpoint);
    let b = unwrap_proxied(b, proxy_endpoint);
    match (Url::parse(&a), Url::parse(&b)) {
        (Ok(ua), Ok(ub)) => ua.path() == ub.path(),
        _ => a == b,
    }
}

/// An asset dragged in from an external library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub platform: Option<String>,
}

impl AssetDescriptor {
    pub fn is_storage(&self) -> bool {
        self.platform.as_deref() == Some("storage")
    }
}

/// Exchanges a storage path for a time-limited URL.
pub trait SignedUrlProvider {
    /// `Ok(None)` means the store had no URL to give; callers fall back to
    /// the asset's own URL.
    fn signed_url(&self, storage_path: &str) -> std::result::Result<Option<String>, String>;
}

/// Extract the object path from a `.../videos/<path>` storage URL.
pub fn storage_path_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();
    let idx = path.find("/videos/")?;
    let rest = &path[idx + "/videos/".len()..];
    if rest.is_empty() {
        return None;
    }
    Some(percent_decode_str(rest).decode_utf8_lossy().into_owned())
}

/// Turn a dropped asset into a playable source.
pub fn resolve_asset(
    asset: &AssetDescriptor,
    provider: &dyn SignedUrlProvider,
) -> Result<MediaSource> {
    if asset.url.is_empty() {
        return Err(CoreError::AssetResolution(format!(
            "asset {} has no url",
            asset.id
        )));
    }
    if asset.is_storage() {
        if let Some(path) = storage_path_from_url(&asset.url) {
            let signed = provider
                .signed_url(&path)
                .map_err(CoreError::AssetResolution)?;
            if let Some(signed) = signed {
                tracing::debug!(asset_id = %asset.id, path = %path, "Using signed URL for storage asset");
                return Ok(MediaSource::Remote(signed));
            }
        }
    }
    Ok(MediaSource::from_url(asset.url.clone()))
}
