//! Body compression.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Gzip `data`.
pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let buf = Vec::with_capacity(data.len() / 2 + 32);
    let mut encoder = GzEncoder::new(buf, Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Gunzip `data`.
pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Decode a response body per its `Content-Encoding` header.
///
/// Only gzip and identity are supported; anything else is an error.
pub fn decode_body(content_encoding: Option<&str>, body: &[u8]) -> Result<Vec<u8>, String> {
    let encoding = content_encoding
        .map(|e| e.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match encoding.as_str() {
        "gzip" => gunzip(body).map_err(|e| format!("decompress gzip response: {e}")),
        "" | "identity" => Ok(body.to_vec()),
        other => Err(format!("unsupported response content encoding: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip() {
        let data = b"{\"hello\":\"world\"}".repeat(20);
        let compressed = gzip(&data).unwrap();
        assert_ne!(compressed, data);
        assert_eq!(gunzip(&compressed).unwrap(), data);
    }

    #[test]
    fn test_decode_body() {
        let compressed = gzip(b"pong").unwrap();
        assert_eq!(decode_body(Some(" GZIP "), &compressed).unwrap(), b"pong");
        assert_eq!(decode_body(None, b"raw").unwrap(), b"raw");
        assert!(decode_body(Some("br"), b"raw").unwrap_err().contains("br"));
        assert!(decode_body(Some("gzip"), b"not gzip").is_err());
    }
}
