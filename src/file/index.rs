//! Index file reader
//!
//! ```text
//! u32    format version (4)
//! u32    sequence type (1 = protein, 0 = nucleotide)
//! u32+.. title (length-prefixed)
//! u32+.. date (length-prefixed)
//! u32    number of sequences N
//! u64    total residue count
//! u32    maximum sequence length
//! u32 x (N+1)  header offsets
//! u32 x (N+1)  sequence offsets
//! u32 x (N+1)  ambiguity offsets
//! ```

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use super::SeqType;
use crate::error::{CorruptionError, FormatError, Result};
use crate::region::{RawFile, RegionStore};

/// The only index format version this crate reads
pub const FORMAT_VERSION: u32 = 4;

/// Parsed header and offset tables of an index file.
#[derive(Debug)]
pub struct IndexFile {
    raw: RawFile,
    seq_type: SeqType,
    title: String,
    date: String,
    num_oids: usize,
    total_length: u64,
    max_length: u32,
    hdr_offsets: u64,
    seq_offsets: u64,
    amb_offsets: Option<u64>,
}
impl IndexFile {
    /// Opens and validates an index file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be opened
    /// * The format version is not [`FORMAT_VERSION`]
    /// * The sequence type is unknown or differs from `expected`
    /// * The file is too short for the offset tables it declares
    pub fn open<P: AsRef<Path>>(store: &RegionStore, path: P, expected: SeqType) -> Result<Self> {
        let path = path.as_ref();
        let raw = store.open(path)?;
        Self::parse(raw, expected).map_err(|e| e.in_file(path))
    }

    fn parse(raw: RawFile, expected: SeqType) -> Result<Self> {
        let mut cursor = 0;
        let version = raw.read_u32(&mut cursor)?;
        if version != FORMAT_VERSION {
            return Err(FormatError::VersionMismatch {
                found: version,
                expected: FORMAT_VERSION,
            }
            .into());
        }
        let code = raw.read_u32(&mut cursor)?;
        let seq_type = SeqType::from_code(code).ok_or(FormatError::InvalidSeqType(code))?;
        if seq_type != expected {
            return Err(FormatError::SeqTypeMismatch {
                found: seq_type.tag(),
                expected: expected.tag(),
            }
            .into());
        }
        let title = raw.read_string(&mut cursor)?;
        let date = raw.read_string(&mut cursor)?;
        let num_oids = raw.read_u32(&mut cursor)? as usize;
        let total_length = raw.read_u64(&mut cursor)?;
        let max_length = raw.read_u32(&mut cursor)?;

        let table_bytes = 4 * (num_oids as u64 + 1);
        let hdr_offsets = cursor;
        let seq_offsets = hdr_offsets + table_bytes;
        let amb_end = seq_offsets + 2 * table_bytes;

        // Protein indices may omit the (unused) ambiguity table
        let amb_offsets = if raw.len() >= amb_end {
            Some(seq_offsets + table_bytes)
        } else if seq_type == SeqType::Protein && raw.len() >= seq_offsets + table_bytes {
            None
        } else {
            return Err(FormatError::Truncated {
                needed: amb_end,
                len: raw.len(),
            }
            .into());
        };

        Ok(Self {
            raw,
            seq_type,
            title,
            date,
            num_oids,
            total_length,
            max_length,
            hdr_offsets,
            seq_offsets,
            amb_offsets,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.raw.path()
    }

    #[must_use]
    pub fn seq_type(&self) -> SeqType {
        self.seq_type
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Number of sequences declared in the header
    #[must_use]
    pub fn num_oids(&self) -> usize {
        self.num_oids
    }

    /// Total residue count declared in the header
    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Longest sequence length declared in the header
    #[must_use]
    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    fn check_oid(&self, oid: usize) -> Result<()> {
        if oid >= self.num_oids {
            return Err(CorruptionError::OidOutOfRange {
                oid,
                num_oids: self.num_oids,
            }
            .into());
        }
        Ok(())
    }

    /// Reads entries `oid` and `oid + 1` of the table at `table`
    fn pair(&self, table: u64, oid: usize) -> Result<(u64, u64)> {
        let pos = table + 4 * oid as u64;
        let region = self.raw.get_region(pos, pos + 8)?;
        Ok((
            u64::from(BigEndian::read_u32(&region[..4])),
            u64::from(BigEndian::read_u32(&region[4..])),
        ))
    }

    fn entry(&self, table: u64, oid: usize) -> Result<u64> {
        let mut cursor = table + 4 * oid as u64;
        Ok(u64::from(self.raw.read_u32(&mut cursor)?))
    }

    fn ordered(start: u64, end: u64) -> Result<(u64, u64)> {
        if start > end {
            return Err(CorruptionError::NonMonotonicOffsets { start, end }.into());
        }
        Ok((start, end))
    }

    /// Byte range of the encoded deflines of `oid` in the header file
    pub fn hdr_start_end(&self, oid: usize) -> Result<(u64, u64)> {
        self.check_oid(oid)?;
        let (start, end) = self.pair(self.hdr_offsets, oid)?;
        Self::ordered(start, end)
    }

    /// Byte range of the packed residues of `oid` in the sequence file.
    ///
    /// For protein this includes the trailing separator byte. For nucleotide the
    /// range stops where the ambiguity records of `oid` begin.
    pub fn seq_start_end(&self, oid: usize) -> Result<(u64, u64)> {
        self.check_oid(oid)?;
        let (start, end) = match (self.seq_type, self.amb_offsets) {
            (SeqType::Nucleotide, Some(amb)) => {
                (self.entry(self.seq_offsets, oid)?, self.entry(amb, oid)?)
            }
            _ => self.pair(self.seq_offsets, oid)?,
        };
        Self::ordered(start, end)
    }

    /// Byte range of the ambiguity records of `oid`, or `None` if there are none.
    pub fn amb_start_end(&self, oid: usize) -> Result<Option<(u64, u64)>> {
        self.check_oid(oid)?;
        let Some(amb) = self.amb_offsets.filter(|_| self.seq_type.is_nucleotide()) else {
            return Ok(None);
        };
        let start = self.entry(amb, oid)?;
        let end = self.entry(self.seq_offsets, oid + 1)?;
        let (start, end) = Self::ordered(start, end)?;
        Ok((end > start).then_some((start, end)))
    }
}
