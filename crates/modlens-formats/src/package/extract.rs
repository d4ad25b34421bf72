//! Payload decompression

use flate2::read::ZlibDecoder;
use std::io::Read;

/// Tag for zlib-compressed payloads
pub const COMPRESSION_ZLIB: u16 = 0x5A42;

/// Tag for internally compressed payloads
pub const COMPRESSION_INTERNAL: u16 = 0xFFFF;

/// Tag for uncompressed payloads
pub const COMPRESSION_NONE: u16 = 0x0000;

/// Maximum allowed decompression size (256 MiB)
///
/// Security: caps inflate output so a crafted payload cannot exhaust memory.
pub const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// Inflate a zlib stream, enforcing [`MAX_DECOMPRESSED_SIZE`]
pub fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();

    // Read in chunks to enforce size limit
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = decoder.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        if decompressed.len() + bytes_read > MAX_DECOMPRESSED_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("decompressed size exceeds limit of {MAX_DECOMPRESSED_SIZE} bytes"),
            ));
        }

        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    Ok(decompressed)
}

/// Decode a stored payload according to its compression tag
///
/// Zlib-tagged payloads that fail to inflate are returned unchanged because
/// some producers tag raw data as compressed. Internally compressed payloads
/// have no such fallback and yield `None`.
pub fn decode_payload(raw: Vec<u8>, compression_tag: u16) -> Option<Vec<u8>> {
    match compression_tag {
        COMPRESSION_ZLIB => match inflate(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::debug!("zlib payload failed to inflate, using raw bytes: {e}");
                Some(raw)
            }
        },
        COMPRESSION_INTERNAL => match inflate(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::debug!("internally compressed payload failed to inflate: {e}");
                None
            }
        },
        _ => Some(raw),
    }
}
