//! Icon bitmap compression
//!
//! Icons travel as a zlib stream split into 60-byte chunks. The controller
//! only ever decompresses; compression is used by the host peer.

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fmt;
use std::io::{Read, Write};

use crate::constants::{ICON_BYTES, ICON_CHUNK_SIZE, ICON_SIZE};
use crate::error::IconCodecError;

/// A 128x128 RGB565 bitmap, row-major, each pixel little-endian
#[derive(Clone, PartialEq, Eq)]
pub struct IconBitmap(Bytes);

impl IconBitmap {
    /// Wrap raw pixel data; must be exactly [`ICON_BYTES`] long
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, IconCodecError> {
        let bytes = bytes.into();
        if bytes.len() != ICON_BYTES {
            return Err(IconCodecError::SizeMismatch {
                expected: ICON_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    /// Bitmap filled with one color
    pub fn solid(color: u16) -> Self {
        let pixels = color.to_le_bytes().repeat(ICON_BYTES / 2);
        Self(Bytes::from(pixels))
    }

    /// Build a bitmap from a per-pixel function
    pub fn from_fn(mut f: impl FnMut(usize, usize) -> u16) -> Self {
        let mut pixels = Vec::with_capacity(ICON_BYTES);
        for y in 0..ICON_SIZE {
            for x in 0..ICON_SIZE {
                pixels.extend_from_slice(&f(x, y).to_le_bytes());
            }
        }
        Self(Bytes::from(pixels))
    }

    /// RGB565 value at `(x, y)`, or `None` outside the bitmap
    pub fn pixel(&self, x: usize, y: usize) -> Option<u16> {
        if x >= ICON_SIZE || y >= ICON_SIZE {
            return None;
        }
        let at = (y * ICON_SIZE + x) * 2;
        Some(u16::from_le_bytes([self.0[at], self.0[at + 1]]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for IconBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconBitmap")
            .field("bytes", &self.0.len())
            .finish()
    }
}

/// Compress a bitmap into the transfer format
pub fn compress(icon: &IconBitmap) -> Result<Vec<u8>, IconCodecError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(ICON_BYTES / 4), Compression::best());
    encoder
        .write_all(icon.as_bytes())
        .map_err(|e| IconCodecError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| IconCodecError::Compression(e.to_string()))
}

/// Decompress a received icon stream
///
/// The stream must inflate to exactly one bitmap. Output is bounded so a
/// hostile stream cannot inflate without limit; the reported size is capped
/// at twice the bitmap size.
pub fn decompress(compressed: &[u8]) -> Result<IconBitmap, IconCodecError> {
    let limit = (ICON_BYTES * 2) as u64;
    let mut pixels = Vec::with_capacity(ICON_BYTES);
    ZlibDecoder::new(compressed)
        .take(limit)
        .read_to_end(&mut pixels)
        .map_err(|e| IconCodecError::Corrupt(e.to_string()))?;

    IconBitmap::from_bytes(pixels)
}

/// Number of chunks needed to carry `byte_count` bytes
pub fn packet_count(byte_count: usize) -> usize {
    byte_count.div_ceil(ICON_CHUNK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COMPRESSION_BUFFER_SIZE;

    fn gradient() -> IconBitmap {
        IconBitmap::from_fn(|x, y| ((x as u16) << 11) | ((y as u16) << 5) | (x ^ y) as u16 & 0x1F)
    }

    #[test]
    fn test_compress_then_decompress() {
        let icon = gradient();
        let compressed = compress(&icon).unwrap();

        assert!(compressed.len() <= COMPRESSION_BUFFER_SIZE);
        assert_eq!(decompress(&compressed).unwrap(), icon);
    }

    #[test]
    fn test_pixel_is_little_endian() {
        let icon = IconBitmap::solid(0xF800);
        assert_eq!(&icon.as_bytes()[..2], &[0x00, 0xF8]);
        assert_eq!(icon.pixel(127, 127), Some(0xF800));
        assert_eq!(icon.pixel(128, 0), None);
    }

    #[test]
    fn test_wrong_size_is_reported() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0u8; 1000]).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(
            decompress(&compressed),
            Err(IconCodecError::SizeMismatch {
                expected: ICON_BYTES,
                actual: 1000
            })
        );
    }

    #[test]
    fn test_corrupt_stream_is_reported() {
        let result = decompress(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11]);
        assert!(matches!(result, Err(IconCodecError::Corrupt(_))));
    }

    #[test]
    fn test_packet_count() {
        assert_eq!(packet_count(0), 0);
        assert_eq!(packet_count(1), 1);
        assert_eq!(packet_count(60), 1);
        assert_eq!(packet_count(61), 2);
        assert_eq!(packet_count(COMPRESSION_BUFFER_SIZE), 575);
    }
}
