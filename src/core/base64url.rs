//! Validating base64url decoding for token segments and embedded blobs.
//!
//! The wire format is unpadded base64url, but some emitters pad anyway, so
//! trailing `=` is tolerated and stripped before decoding. Everything else
//! is strict: a character outside the url-safe alphabet or an impossible
//! length is an error, which callers treat as a structural non-match.

use base64::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum Base64UrlError {
    /// The input length (after stripping padding) cannot be produced by a
    /// base64 encoder.
    #[error("invalid base64url length: {0}")]
    InvalidLength(usize),

    /// A byte outside the base64url alphabet.
    #[error("invalid base64url character at offset {0}")]
    InvalidCharacter(usize),
}

/// Decode unpadded base64url, tolerating trailing padding.
pub fn decode(input: &str) -> Result<Vec<u8>, Base64UrlError> {
    let trimmed = input.trim_end_matches('=');
    if trimmed.len() % 4 == 1 {
        return Err(Base64UrlError::InvalidLength(trimmed.len()));
    }
    BASE64_URL_SAFE_NO_PAD.decode(trimmed).map_err(|e| match e {
        base64::DecodeError::InvalidByte(offset, _) => Base64UrlError::InvalidCharacter(offset),
        base64::DecodeError::InvalidLastSymbol(offset, _) => {
            Base64UrlError::InvalidCharacter(offset)
        }
        base64::DecodeError::InvalidLength | base64::DecodeError::InvalidPadding => {
            Base64UrlError::InvalidLength(trimmed.len())
        }
    })
}
