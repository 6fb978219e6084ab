// ============================================
// share.rs - Shareable report links
// ============================================
// A shared link carries the full report markdown,
// gzip-compressed and URL-safe base64 encoded, in
// the fragment: <base>#view-report?data=<payload>

use std::io::{Read, Write};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::{LeafError, LeafResult};

pub const SHARE_FRAGMENT: &str = "#view-report?";

/// Compress and encode a report for embedding in a URL.
pub fn encode_share_payload(markdown: &str) -> LeafResult<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(markdown.as_bytes())
        .map_err(|e| LeafError::InvalidShareLink(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| LeafError::InvalidShareLink(e.to_string()))?;

    debug!("Share payload: {} bytes -> {} gzipped", markdown.len(), compressed.len());
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Reverse of [`encode_share_payload`]. Trailing `=` padding is tolerated.
pub fn decode_share_payload(payload: &str) -> LeafResult<String> {
    let trimmed = payload.trim().trim_end_matches('=');
    let compressed = URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| LeafError::InvalidShareLink(format!("bad encoding: {}", e)))?;

    let mut markdown = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut markdown)
        .map_err(|e| LeafError::InvalidShareLink(format!("bad payload: {}", e)))?;

    Ok(markdown)
}

/// Build the full share URL for a payload.
pub fn share_url(base: &str, payload: &str) -> String {
    let base = base.split('#').next().unwrap_or(base);
    format!("{}{}data={}", base, SHARE_FRAGMENT, payload)
}

/// Pull the payload out of a share URL. Input that is not a URL is
/// assumed to be a bare payload.
pub fn payload_from_url(url: &str) -> LeafResult<&str> {
    let Some(idx) = url.find(SHARE_FRAGMENT) else {
        if url.contains('#') || url.contains("://") {
            return Err(LeafError::InvalidShareLink("no #view-report fragment".to_string()));
        }
        return Ok(url.trim());
    };

    let query = &url[idx + SHARE_FRAGMENT.len()..];
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("data="))
        .filter(|data| !data.is_empty())
        .ok_or_else(|| LeafError::InvalidShareLink("missing data parameter".to_string()))
}

/// Decode the report carried by a share URL or bare payload.
pub fn open_shared(url_or_payload: &str) -> LeafResult<String> {
    decode_share_payload(payload_from_url(url_or_payload)?)
}
