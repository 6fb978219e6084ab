// ============================================
// error.rs - Library Error Types
// ============================================
// Errors callers are expected to branch on. Plumbing
// (I/O, HTTP, SQLite) stays on anyhow.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeafError {
    /// A prompt or request was built without a value it cannot do without.
    #[error("{0} must be provided")]
    MissingInput(&'static str),

    #[error("the shared report link is invalid or corrupted: {0}")]
    InvalidShareLink(String),

    #[error("unsupported image type: {0}")]
    UnsupportedImage(String),

    #[error("Gemini API key not configured")]
    ApiKeyMissing,
}

pub type LeafResult<T> = std::result::Result<T, LeafError>;
