// Compression backends for the .ktks container

use crate::core::constants::CompressionType;
use crate::core::error::{Result, TsError};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

// Upper bound on the expansion of an LZ4 block
const LZ4_MAX_RATIO: usize = 255;
// Preallocation cap for streaming decoders; the vector still grows past it
const ZLIB_PREALLOC_RATIO: usize = 16;

pub fn compress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),

        CompressionType::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }

        #[cfg(feature = "lz4")]
        CompressionType::Lz4 => Ok(lz4::block::compress(data, None, false)?),

        #[cfg(not(feature = "lz4"))]
        CompressionType::Lz4 => Err(TsError::UnsupportedCompression(2)),

        #[cfg(feature = "zstd")]
        CompressionType::Zstd => Ok(zstd::encode_all(data, 0)?),

        #[cfg(not(feature = "zstd"))]
        CompressionType::Zstd => Err(TsError::UnsupportedCompression(3)),
    }
}

/// Inverse of [`compress`]. `raw_len` is the expected decompressed size as
/// read from a file header, so it is never trusted for allocation.
pub fn decompress(data: &[u8], compression: CompressionType, raw_len: usize) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),

        CompressionType::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut decompressed =
                Vec::with_capacity(raw_len.min(data.len().saturating_mul(ZLIB_PREALLOC_RATIO)));
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| TsError::DecompressionFailed(format!("Zlib: {}", e)))?;
            Ok(decompressed)
        }

        #[cfg(feature = "lz4")]
        CompressionType::Lz4 => {
            if raw_len > data.len().saturating_mul(LZ4_MAX_RATIO) {
                return Err(TsError::DecompressionFailed(format!(
                    "LZ4: {} bytes cannot expand to {} bytes",
                    data.len(),
                    raw_len
                )));
            }
            let size = i32::try_from(raw_len).map_err(|_| {
                TsError::DecompressionFailed(format!("LZ4: payload of {} bytes is too large", raw_len))
            })?;
            lz4::block::decompress(data, Some(size))
                .map_err(|e| TsError::DecompressionFailed(format!("LZ4: {}", e)))
        }

        #[cfg(not(feature = "lz4"))]
        CompressionType::Lz4 => Err(TsError::UnsupportedCompression(2)),

        #[cfg(feature = "zstd")]
        CompressionType::Zstd => {
            zstd::decode_all(data).map_err(|e| TsError::DecompressionFailed(format!("Zstd: {}", e)))
        }

        #[cfg(not(feature = "zstd"))]
        CompressionType::Zstd => Err(TsError::UnsupportedCompression(3)),
    }
}
