//! Minimal PNG writer: RGBA8, single IDAT, no interlace, filter type 0.
//!
//! The container is serialised byte by byte. Only the DEFLATE stream itself
//! comes from `flate2`; the zlib envelope around it (header, Adler-32 trailer)
//! and every chunk's length/tag/CRC framing are written here so the output
//! is fully determined by this module.
//!
//! ```text
//! 89 50 4E 47 0D 0A 1A 0A                      signature
//! [len][IHDR][w h 8 6 0 0 0][crc]              header
//! [len][IDAT][78 9C <deflate> <adler32>][crc]  rows, each prefixed by 0x00
//! [0  ][IEND][crc]                             trailer
//! ```

use crate::error::EncodeError;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;
use tracing::debug;

/// PNG file signature.
pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// zlib CMF/FLG pair for a 32K window at default compression.
const ZLIB_HEADER: [u8; 2] = [0x78, 0x9C];

const BIT_DEPTH: u8 = 8;
const COLOR_TYPE_RGBA: u8 = 6;
const BYTES_PER_PIXEL: usize = 4;
const FILTER_NONE: u8 = 0;

/// Encode tightly packed RGBA8 pixels as a PNG byte stream.
///
/// Fails without producing output if either dimension is zero or if
/// `rgba.len() != width * height * 4`.
pub fn encode(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::ZeroDimension { width, height });
    }

    let stride = (width as usize)
        .checked_mul(BYTES_PER_PIXEL)
        .ok_or(EncodeError::TooLarge { width, height })?;
    let expected = stride
        .checked_mul(height as usize)
        .ok_or(EncodeError::TooLarge { width, height })?;
    if rgba.len() != expected {
        return Err(EncodeError::LengthMismatch {
            width,
            height,
            expected,
            actual: rgba.len(),
        });
    }

    let filtered = filter_rows(rgba, stride);
    let idat = zlib_compress(&filtered)?;

    let mut out = Vec::with_capacity(SIGNATURE.len() + 3 * 12 + 13 + idat.len());
    out.extend_from_slice(&SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr_payload(width, height));
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);

    debug!(
        "PNG {}x{}: {} raw bytes → {} encoded",
        width,
        height,
        rgba.len(),
        out.len()
    );
    Ok(out)
}

fn ihdr_payload(width: u32, height: u32) -> [u8; 13] {
    let mut p = [0u8; 13];
    p[0..4].copy_from_slice(&width.to_be_bytes());
    p[4..8].copy_from_slice(&height.to_be_bytes());
    p[8] = BIT_DEPTH;
    p[9] = COLOR_TYPE_RGBA;
    // compression, filter method, interlace: all 0
    p
}

/// Prefix every scanline with filter byte 0.
fn filter_rows(rgba: &[u8], stride: usize) -> Vec<u8> {
    let rows = rgba.len() / stride;
    let mut buf = Vec::with_capacity(rgba.len() + rows);
    for row in rgba.chunks_exact(stride) {
        buf.push(FILTER_NONE);
        buf.extend_from_slice(row);
    }
    buf
}

/// Wrap a raw DEFLATE stream in a zlib envelope.
fn zlib_compress(data: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        Compression::default(),
    );
    encoder
        .write_all(data)
        .map_err(|e| EncodeError::Compression(e.to_string()))?;
    let deflated = encoder
        .finish()
        .map_err(|e| EncodeError::Compression(e.to_string()))?;

    let mut out = Vec::with_capacity(ZLIB_HEADER.len() + deflated.len() + 4);
    out.extend_from_slice(&ZLIB_HEADER);
    out.extend_from_slice(&deflated);
    out.extend_from_slice(&adler32(data).to_be_bytes());
    Ok(out)
}

/// Append `len | tag | payload | crc32(tag ++ payload)`.
fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
    // PNG caps chunk length at 2^31-1; a single page bitmap never gets near it.
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(payload);

    let crc = Crc32::new().update(tag).update(payload).finish();
    out.extend_from_slice(&crc.to_be_bytes());
}

// ── Checksums ────────────────────────────────────────────────────────────

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// Reflected CRC-32 (ISO-HDLC / PNG / zlib flavour).
#[derive(Debug, Clone, Copy)]
pub struct Crc32(u32);

impl Crc32 {
    pub fn new() -> Self {
        Crc32(0xFFFF_FFFF)
    }

    pub fn update(mut self, bytes: &[u8]) -> Self {
        for &b in bytes {
            self.0 = CRC_TABLE[((self.0 ^ b as u32) & 0xFF) as usize] ^ (self.0 >> 8);
        }
        self
    }

    pub fn finish(self) -> u32 {
        self.0 ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-32 of a single byte slice.
pub fn crc32(bytes: &[u8]) -> u32 {
    Crc32::new().update(bytes).finish()
}

/// Adler-32 as used in the zlib trailer.
pub fn adler32(bytes: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65_521;
    // Largest n such that 255n(n+1)/2 + (n+1)(MOD-1) fits in u32.
    const NMAX: usize = 5552;

    let (mut a, mut b) = (1u32, 0u32);
    for block in bytes.chunks(NMAX) {
        for &byte in block {
            a += byte as u32;
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }
    (b << 16) | a
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    /// Split a PNG stream into `(tag, payload, stored_crc)` triples.
    fn chunks(png: &[u8]) -> Vec<([u8; 4], Vec<u8>, u32)> {
        assert_eq!(&png[..8], &SIGNATURE);
        let mut out = Vec::new();
        let mut pos = 8;
        while pos < png.len() {
            let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
            let tag: [u8; 4] = png[pos + 4..pos + 8].try_into().unwrap();
            let payload = png[pos + 8..pos + 8 + len].to_vec();
            let crc = u32::from_be_bytes(png[pos + 8 + len..pos + 12 + len].try_into().unwrap());
            out.push((tag, payload, crc));
            pos += 12 + len;
        }
        assert_eq!(pos, png.len(), "trailing bytes after IEND");
        out
    }

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        let mut px = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                px.extend_from_slice(&[
                    (x * 7) as u8,
                    (y * 5) as u8,
                    (x ^ y) as u8,
                    (255 - x) as u8,
                ]);
            }
        }
        px
    }

    #[test]
    fn crc32_reference_vectors() {
        assert_eq!(crc32(b""), 0);
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        // Every PNG in existence ends with this CRC.
        assert_eq!(crc32(b"IEND"), 0xAE42_6082);
    }

    #[test]
    fn crc32_incremental_matches_one_shot() {
        let split = Crc32::new().update(b"IHDR").update(&[0, 0, 0, 1]).finish();
        assert_eq!(split, crc32(b"IHDR\0\0\0\x01"));
    }

    #[test]
    fn adler32_reference_vectors() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn adler32_handles_long_runs_of_ff() {
        // Exercises the deferred-modulo block boundary.
        let data = vec![0xFFu8; 100_000];
        let (mut a, mut b) = (1u64, 0u64);
        for &byte in &data {
            a = (a + byte as u64) % 65_521;
            b = (b + a) % 65_521;
        }
        assert_eq!(adler32(&data), ((b << 16) | a) as u32);
    }

    #[test]
    fn chunk_layout_is_signature_ihdr_idat_iend() {
        let png = encode(&gradient(3, 2), 3, 2).unwrap();
        let parsed = chunks(&png);
        let tags: Vec<&[u8; 4]> = parsed.iter().map(|(t, _, _)| t).collect();
        assert_eq!(tags, vec![b"IHDR", b"IDAT", b"IEND"]);

        for (tag, payload, stored) in &parsed {
            let expect = Crc32::new().update(tag).update(payload).finish();
            assert_eq!(*stored, expect, "bad CRC on {:?}", std::str::from_utf8(tag));
        }

        let ihdr = &parsed[0].1;
        assert_eq!(ihdr.len(), 13);
        assert_eq!(&ihdr[0..4], &3u32.to_be_bytes());
        assert_eq!(&ihdr[4..8], &2u32.to_be_bytes());
        assert_eq!(&ihdr[8..], &[8, 6, 0, 0, 0]);
        assert!(parsed[2].1.is_empty());
    }

    #[test]
    fn idat_is_zlib_with_adler_of_filtered_rows() {
        let px = gradient(5, 4);
        let png = encode(&px, 5, 4).unwrap();
        let idat = &chunks(&png)[1].1;

        assert_eq!(&idat[..2], &[0x78, 0x9C]);

        let mut inflated = Vec::new();
        ZlibDecoder::new(&idat[..])
            .read_to_end(&mut inflated)
            .expect("zlib stream must decode and pass its checksum");

        let expected = filter_rows(&px, 5 * 4);
        assert_eq!(inflated, expected);
        assert_eq!(inflated.len(), 4 * (1 + 5 * 4));
        assert!(inflated.chunks(21).all(|row| row[0] == 0));

        let trailer = &idat[idat.len() - 4..];
        assert_eq!(trailer, &adler32(&expected).to_be_bytes());
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = encode(&[0u8; 15], 2, 2).unwrap_err();
        assert_eq!(
            err,
            EncodeError::LengthMismatch {
                width: 2,
                height: 2,
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn rejects_zero_dimension() {
        assert!(matches!(
            encode(&[], 0, 10),
            Err(EncodeError::ZeroDimension { .. })
        ));
        assert!(matches!(
            encode(&[], 10, 0),
            Err(EncodeError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn encoding_is_deterministic() {
        let px = gradient(9, 9);
        assert_eq!(encode(&px, 9, 9).unwrap(), encode(&px, 9, 9).unwrap());
    }

    // Round trips through an independent decoder.

    fn decode(png: &[u8]) -> (u32, u32, Vec<u8>) {
        let img = image::load_from_memory_with_format(png, image::ImageFormat::Png)
            .expect("conformant decoder must accept the stream")
            .to_rgba8();
        (img.width(), img.height(), img.into_raw())
    }

    #[test]
    fn round_trip_single_pixel() {
        let px = [12u8, 34, 56, 78];
        let (w, h, back) = decode(&encode(&px, 1, 1).unwrap());
        assert_eq!((w, h), (1, 1));
        assert_eq!(back, px);
    }

    #[test]
    fn round_trip_odd_dimensions() {
        let px = gradient(37, 51);
        let (w, h, back) = decode(&encode(&px, 37, 51).unwrap());
        assert_eq!((w, h), (37, 51));
        assert_eq!(back, px);
    }

    #[test]
    fn round_trip_all_zero_and_all_ff() {
        for fill in [0x00u8, 0xFF] {
            let px = vec![fill; 16 * 8 * 4];
            let (w, h, back) = decode(&encode(&px, 16, 8).unwrap());
            assert_eq!((w, h), (16, 8));
            assert_eq!(back, px, "fill={fill:#04x}");
        }
    }
}
