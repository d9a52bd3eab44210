//! GI list files
//!
//! Binary lists start with the magic `0xFFFFFFFF`, followed by a big-endian
//! `u32` count and that many big-endian `u32` GIs. Anything else is read as
//! text: one decimal GI per line, blank lines and `#` comments ignored.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use memchr::memchr_iter;
use tracing::debug;

use crate::error::{CorruptionError, FormatError, Result};
use crate::region::RegionStore;

const BINARY_MAGIC: u32 = u32::MAX;

/// Reads a GI list file in either layout
pub fn read_gi_list<P: AsRef<Path>>(store: &RegionStore, path: P) -> Result<Vec<u64>> {
    let path = path.as_ref();
    let file = store.open(path)?;
    let bytes = file.get_region(0, file.len())?;
    let gis = if bytes.len() >= 4 && BigEndian::read_u32(&bytes) == BINARY_MAGIC {
        parse_binary(&bytes)
    } else {
        parse_text(&bytes)
    }
    .map_err(|e| e.in_file(path))?;
    debug!(path = %path.display(), count = gis.len(), "read GI list");
    Ok(gis)
}

fn parse_binary(bytes: &[u8]) -> Result<Vec<u64>> {
    if bytes.len() < 8 {
        return Err(FormatError::Truncated {
            needed: 8,
            len: bytes.len() as u64,
        }
        .into());
    }
    let count = BigEndian::read_u32(&bytes[4..8]) as usize;
    let needed = 8 + 4 * count as u64;
    if (bytes.len() as u64) < needed {
        return Err(CorruptionError::RegionOutOfRange {
            start: 8,
            end: needed,
            len: bytes.len() as u64,
        }
        .into());
    }
    Ok(bytes[8..8 + 4 * count]
        .chunks_exact(4)
        .map(|chunk| u64::from(BigEndian::read_u32(chunk)))
        .collect())
}

fn parse_text(bytes: &[u8]) -> Result<Vec<u64>> {
    let mut gis = Vec::new();
    let mut start = 0;
    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for end in ends {
        let line = std::str::from_utf8(&bytes[start..end])?.trim();
        start = end + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let gi = line.parse().map_err(|_| FormatError::InvalidValue {
            what: "GI",
            value: line.to_string(),
        })?;
        gis.push(gi);
    }
    Ok(gis)
}
