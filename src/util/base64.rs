use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::engine::Engine as _;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeBase64Error;

impl fmt::Display for DecodeBase64Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode base64 string")
    }
}

impl std::error::Error for DecodeBase64Error {}

/// Encode a byte slice with the URL-safe alphabet and no padding, as JWT segments require.
pub fn base64_url_encode_bytes(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Encode a string with the URL-safe alphabet and no padding.
pub fn base64_url_encode(input: &str) -> String {
    base64_url_encode_bytes(input.as_bytes())
}

/// Decode a URL-safe base64 string into raw bytes. Trailing `=` padding is tolerated.
pub fn base64_url_decode_bytes(input: &str) -> Result<Vec<u8>, DecodeBase64Error> {
    URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('=').as_bytes())
        .map_err(|_err| DecodeBase64Error)
}

/// Decode a URL-safe base64 string, returning UTF-8 text on success.
pub fn base64_url_decode(input: &str) -> Result<String, DecodeBase64Error> {
    let bytes = base64_url_decode_bytes(input)?;
    String::from_utf8(bytes).map_err(|_err| DecodeBase64Error)
}

/// Decode the standard-alphabet body of a PEM document.
pub fn base64_decode_bytes(input: &str) -> Result<Vec<u8>, DecodeBase64Error> {
    STANDARD
        .decode(input.as_bytes())
        .map_err(|_err| DecodeBase64Error)
}
