// ---------------------------------------------------------------------------
// codec – binary raster format with magic bytes, version and checksum
// ---------------------------------------------------------------------------
//
// Header format (24 bytes, fixed-size, little-endian):
//   [0..4]   Magic bytes: "BCRS"
//   [4..8]   Format version (u32)
//   [8..12]  Rows (u32)
//   [12..16] Columns (u32)
//   [16..20] Nodata sentinel (f32)
//   [20..24] xxHash32 checksum of the payload
//
// Payload: rows * cols f32 values, row-major, little-endian.
//
// Encoding carries no timestamp, so equal rasters always encode to equal bytes.

use crate::errors::{CarbonError, CarbonResult};
use crate::raster::{Raster, NODATA};
use xxhash_rust::xxh32::xxh32;

/// Magic bytes identifying a raster file.
pub const MAGIC: [u8; 4] = *b"BCRS";

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Current raster format version.
pub const FORMAT_VERSION: u32 = 1;

const XXHASH_SEED: u32 = 0;

/// Encode a raster to bytes.
pub fn encode(raster: &Raster) -> Vec<u8> {
    let (n_rows, n_cols) = raster.shape();
    let mut payload = Vec::with_capacity(n_rows * n_cols * 4);
    // iter() walks in logical (row-major) order regardless of memory layout
    for value in raster.values().iter() {
        payload.extend_from_slice(&value.to_le_bytes());
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(n_rows as u32).to_le_bytes());
    out.extend_from_slice(&(n_cols as u32).to_le_bytes());
    out.extend_from_slice(&NODATA.to_le_bytes());
    out.extend_from_slice(&xxh32(&payload, XXHASH_SEED).to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Decode bytes produced by [`encode`], verifying the checksum.
pub fn decode(bytes: &[u8]) -> CarbonResult<Raster> {
    if bytes.len() < HEADER_SIZE {
        return Err(CarbonError::Codec(format!(
            "file too small for header: {} bytes",
            bytes.len()
        )));
    }
    if bytes[0..4] != MAGIC {
        return Err(CarbonError::Codec("bad magic bytes".to_string()));
    }
    let version = read_u32(bytes, 4);
    if version != FORMAT_VERSION {
        return Err(CarbonError::Codec(format!(
            "unsupported format version {}",
            version
        )));
    }
    let n_rows = read_u32(bytes, 8) as usize;
    let n_cols = read_u32(bytes, 12) as usize;
    let nodata = f32::from_bits(read_u32(bytes, 16));
    let checksum = read_u32(bytes, 20);

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != n_rows * n_cols * 4 {
        return Err(CarbonError::Codec(format!(
            "payload is {} bytes, expected {} for a {}x{} raster",
            payload.len(),
            n_rows * n_cols * 4,
            n_rows,
            n_cols
        )));
    }
    let computed = xxh32(payload, XXHASH_SEED);
    if computed != checksum {
        return Err(CarbonError::Codec(format!(
            "checksum mismatch: header says {:#010x}, payload hashes to {:#010x}",
            checksum, computed
        )));
    }

    let values = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        // Files written with a foreign sentinel are normalised to ours
        .map(|v| if v == nodata { NODATA } else { v })
        .collect();
    Raster::from_shape_vec((n_rows, n_cols), values)
}
