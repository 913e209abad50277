//! Bounded decompression of pixel payloads
//!
//! Every method decompresses into a buffer sized from the caller's expected
//! length, never from the compressed stream. A well-formed stream comes back
//! as decoded, capped at one byte past the expected length; comparing that
//! length against the pixel layout is left to the caller.

use std::io::Read;

use tracing::trace;

use crate::error::{TextureError, TextureResult};
use crate::format::Compression;

/// Decompress `data`, expected to expand to `expected` bytes.
///
/// `limit` caps `expected` before anything is allocated. Only malformed
/// streams are errors; the returned length may differ from `expected`.
pub fn decompress(
    method: Compression,
    data: &[u8],
    expected: usize,
    limit: usize,
) -> TextureResult<Vec<u8>> {
    if expected > limit {
        return Err(TextureError::TooLarge {
            needed: expected as u64,
            limit: limit as u64,
        });
    }

    trace!(?method, compressed = data.len(), expected, "decompressing");

    let output = match method {
        Compression::Zlib => read_bounded(flate2::read::ZlibDecoder::new(data), expected, "zlib")?,
        Compression::Deflate => {
            read_bounded(flate2::read::DeflateDecoder::new(data), expected, "deflate")?
        }
        Compression::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(data)
                .map_err(|e| TextureError::DecompressionError(format!("zstd: {}", e)))?;
            read_bounded(decoder, expected, "zstd")?
        }
        Compression::Lz4Block => decompress_lz4_block(data, expected)?,
    };

    if output.len() != expected {
        trace!(?method, expected, actual = output.len(), "decompressed length differs");
    }
    Ok(output)
}

/// Read at most `expected + 1` bytes so overlong streams are detected
/// without unbounded growth.
fn read_bounded(reader: impl Read, expected: usize, name: &str) -> TextureResult<Vec<u8>> {
    let mut output = Vec::with_capacity(expected);
    reader
        .take(expected as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| TextureError::DecompressionError(format!("{}: {}", name, e)))?;
    Ok(output)
}

fn decompress_lz4_block(data: &[u8], expected: usize) -> TextureResult<Vec<u8>> {
    let size = i32::try_from(expected).map_err(|_| TextureError::TooLarge {
        needed: expected as u64,
        limit: i32::MAX as u64,
    })?;
    lz4::block::decompress(data, Some(size))
        .map_err(|e| TextureError::DecompressionError(format!("lz4: {}", e)))
}
