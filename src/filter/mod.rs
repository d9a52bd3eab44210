//! OID inclusion bitmaps
//!
//! A filter holds one bit per OID, most significant bit first within each byte
//! (the same packing as OID bitmap files on disk). Filters are assembled with an
//! [`OidFilterBuilder`], which can only set bits, and then frozen into an
//! immutable [`OidFilter`] that is shared between readers.

mod gilist;
mod plan;

pub use gilist::read_gi_list;
pub use plan::{MaskPlan, PlanEntry, VolumeMask};

use std::ops::Range;
use std::path::Path;

use bytemuck::{cast_slice, cast_slice_mut};
use tracing::debug;

use crate::error::{CorruptionError, Error, Result};
use crate::region::RegionStore;

const WORD_BITS: usize = 32;
const WORD_BYTES: usize = 4;

/// How a source bitmap is folded into the destination at a given bit offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldPath {
    /// Offset is a multiple of 32: interior bytes are OR-ed a word at a time
    Word,
    /// Offset is a multiple of 8
    Byte,
    /// Any other offset: each source byte is split across two destination bytes
    Shifted,
}
impl FoldPath {
    #[must_use]
    pub fn for_offset(bit_offset: usize) -> Self {
        if bit_offset % WORD_BITS == 0 {
            Self::Word
        } else if bit_offset % 8 == 0 {
            Self::Byte
        } else {
            Self::Shifted
        }
    }
}

/// Mutable, set-only bitmap under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidFilterBuilder {
    words: Vec<u32>,
    num_oids: usize,
}
impl OidFilterBuilder {
    #[must_use]
    pub fn new(num_oids: usize) -> Self {
        Self {
            words: vec![0; num_oids.div_ceil(WORD_BITS)],
            num_oids,
        }
    }

    #[must_use]
    pub fn num_oids(&self) -> usize {
        self.num_oids
    }

    fn byte_len(&self) -> usize {
        self.num_oids.div_ceil(8)
    }

    /// The bitmap in on-disk byte order
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &cast_slice::<u32, u8>(&self.words)[..self.byte_len()]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.byte_len();
        &mut cast_slice_mut::<u32, u8>(&mut self.words)[..len]
    }

    /// Sets the bit for `oid`
    pub fn set(&mut self, oid: usize) -> Result<()> {
        if oid >= self.num_oids {
            return Err(CorruptionError::OidOutOfRange {
                oid,
                num_oids: self.num_oids,
            }
            .into());
        }
        self.bytes_mut()[oid / 8] |= 0x80 >> (oid % 8);
        Ok(())
    }

    /// Sets every bit in `range`, clipped to the filter size
    pub fn set_range(&mut self, range: Range<usize>) {
        let start = range.start;
        let end = range.end.min(self.num_oids);
        if start >= end {
            return;
        }
        let bytes = self.bytes_mut();
        let first = start / 8;
        let last = (end - 1) / 8;
        let head = 0xFFu8 >> (start % 8);
        let tail = if end % 8 == 0 {
            0xFF
        } else {
            !(0xFFu8 >> (end % 8))
        };
        if first == last {
            bytes[first] |= head & tail;
            return;
        }
        bytes[first] |= head;
        bytes[first + 1..last].fill(0xFF);
        bytes[last] |= tail;
    }

    /// ORs bits `bits` of `src` (MSB-first) into this filter, source bit `i`
    /// landing on OID `bit_offset + i`.
    ///
    /// Source bits that would land beyond the filter are ignored.
    pub fn or_bits(&mut self, src: &[u8], bits: Range<usize>, bit_offset: usize) {
        self.or_bits_with(FoldPath::for_offset(bit_offset), src, bits, bit_offset);
    }

    /// [`Self::or_bits`] with an explicit fold path.
    ///
    /// Any path may be used at an offset it is slower for; a path that requires
    /// more alignment than `bit_offset` provides falls back to the next one.
    pub fn or_bits_with(
        &mut self,
        path: FoldPath,
        src: &[u8],
        bits: Range<usize>,
        bit_offset: usize,
    ) {
        let start = bits.start;
        let end = bits
            .end
            .min(src.len() * 8)
            .min(self.num_oids.saturating_sub(bit_offset));
        if start >= end {
            return;
        }
        let first = start / 8;
        let last = (end - 1) / 8;
        let masked = |k: usize| {
            let mut b = src[k];
            if k == first {
                b &= 0xFF >> (start % 8);
            }
            if k == last && end % 8 != 0 {
                b &= !(0xFF >> (end % 8));
            }
            b
        };

        let path = match path {
            FoldPath::Word if bit_offset % WORD_BITS != 0 => FoldPath::for_offset(bit_offset),
            FoldPath::Byte if bit_offset % 8 != 0 => FoldPath::Shifted,
            other => other,
        };
        let dst0 = bit_offset / 8;
        match path {
            FoldPath::Word => {
                let mut k = first;
                while k <= last {
                    if k > first && k % WORD_BYTES == 0 && k + WORD_BYTES <= last {
                        let word = u32::from_ne_bytes([src[k], src[k + 1], src[k + 2], src[k + 3]]);
                        self.words[(dst0 + k) / WORD_BYTES] |= word;
                        k += WORD_BYTES;
                    } else {
                        let b = masked(k);
                        self.bytes_mut()[dst0 + k] |= b;
                        k += 1;
                    }
                }
            }
            FoldPath::Byte => {
                let bytes = self.bytes_mut();
                for k in first..=last {
                    bytes[dst0 + k] |= masked(k);
                }
            }
            FoldPath::Shifted => {
                let shift = bit_offset % 8;
                let bytes = self.bytes_mut();
                for k in first..=last {
                    let b = masked(k);
                    if b == 0 {
                        continue;
                    }
                    let spread = u16::from(b) << (8 - shift);
                    bytes[dst0 + k] |= (spread >> 8) as u8;
                    if let Some(next) = bytes.get_mut(dst0 + k + 1) {
                        *next |= spread as u8;
                    }
                }
            }
        }
    }

    /// Folds an OID bitmap file into this filter at `bit_offset`.
    ///
    /// Only source bits in `bits` are used; this is how a range-restricted
    /// OIDLIST is applied. The number of bits read is bounded by the file header,
    /// the bytes present and the filter size.
    pub fn or_bitmap_file<P: AsRef<Path>>(
        &mut self,
        store: &RegionStore,
        path: P,
        bits: Range<usize>,
        bit_offset: usize,
    ) -> Result<()> {
        let path = path.as_ref();
        let file = store.open(path)?;
        let mut cursor = 0;
        let highest = file.read_u32(&mut cursor).map_err(|e| e.in_file(path))? as usize;
        let body = file
            .get_region(cursor, file.len())
            .map_err(|e| e.in_file(path))?;
        let nbits = (highest + 1).min(body.len() * 8);
        debug!(
            path = %path.display(),
            nbits,
            bit_offset,
            fold = ?FoldPath::for_offset(bit_offset),
            "folding OID bitmap"
        );
        self.or_bits(&body, bits.start..bits.end.min(nbits), bit_offset);
        Ok(())
    }

    /// Sets the bit of every id that `translate` maps to a local OID.
    ///
    /// Local OIDs outside `local` are ignored; the rest land at `bit_offset + oid`.
    pub fn or_numeric_id_list<F>(
        &mut self,
        ids: &[u64],
        mut translate: F,
        local: Range<usize>,
        bit_offset: usize,
    ) -> Result<usize>
    where
        F: FnMut(u64) -> Result<Option<usize>>,
    {
        let mut hits = 0;
        for &id in ids {
            let Some(oid) = translate(id)? else {
                continue;
            };
            if !local.contains(&oid) || bit_offset + oid >= self.num_oids {
                continue;
            }
            self.set(bit_offset + oid)?;
            hits += 1;
        }
        Ok(hits)
    }

    /// ORs another builder of the same size into this one
    pub fn union(&mut self, other: &Self) -> Result<()> {
        if other.num_oids != self.num_oids {
            return Err(Error::External(format!(
                "cannot combine filters of {} and {} OIDs",
                self.num_oids, other.num_oids
            )));
        }
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= src;
        }
        Ok(())
    }

    /// Freezes the bitmap, caching its effective size
    #[must_use]
    pub fn build(self) -> OidFilter {
        let effective = highest_set_bit(&self.words, self.as_bytes()).map_or(0, |bit| bit + 1);
        OidFilter {
            words: self.words,
            num_oids: self.num_oids,
            effective,
        }
    }
}

fn highest_set_bit(words: &[u32], bytes: &[u8]) -> Option<usize> {
    let word = words.iter().rposition(|&w| w != 0)?;
    let from = word * WORD_BYTES;
    let to = (from + WORD_BYTES).min(bytes.len());
    (from..to)
        .rev()
        .find(|&k| bytes[k] != 0)
        .map(|k| k * 8 + 7 - bytes[k].trailing_zeros() as usize)
}

/// Immutable OID bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidFilter {
    words: Vec<u32>,
    num_oids: usize,
    effective: usize,
}
impl OidFilter {
    /// A filter over `num_oids` OIDs with every bit set
    #[must_use]
    pub fn all(num_oids: usize) -> Self {
        let mut builder = OidFilterBuilder::new(num_oids);
        builder.set_range(0..num_oids);
        builder.build()
    }

    /// Number of OIDs the bitmap was sized for
    #[must_use]
    pub fn num_oids(&self) -> usize {
        self.num_oids
    }

    /// Index of the highest set bit plus one; no OID at or beyond it is included
    #[must_use]
    pub fn effective_count(&self) -> usize {
        self.effective
    }

    /// Number of set bits
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effective == 0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &cast_slice::<u32, u8>(&self.words)[..self.num_oids.div_ceil(8)]
    }

    #[must_use]
    pub fn contains(&self, oid: usize) -> bool {
        oid < self.effective && self.as_bytes()[oid / 8] & (0x80 >> (oid % 8)) != 0
    }

    /// Returns the first set OID at or after `from`.
    ///
    /// Whole zero words are skipped before scanning bytes, then bits.
    #[must_use]
    pub fn next_set(&self, from: usize) -> Option<usize> {
        if from >= self.effective {
            return None;
        }
        let bytes = self.as_bytes();
        let mut k = from / 8;
        let head = bytes[k] & (0xFF >> (from % 8));
        if head != 0 {
            return Some(k * 8 + head.leading_zeros() as usize);
        }
        k += 1;
        while k < bytes.len() {
            if k % WORD_BYTES == 0 && self.words[k / WORD_BYTES] == 0 {
                k += WORD_BYTES;
                continue;
            }
            if bytes[k] != 0 {
                return Some(k * 8 + bytes[k].leading_zeros() as usize);
            }
            k += 1;
        }
        None
    }

    /// Leaves `oid` alone and returns true if it is set; otherwise moves it to
    /// the next set OID and returns true, or returns false if none remains.
    pub fn contains_or_advance(&self, oid: &mut usize) -> bool {
        match self.next_set(*oid) {
            Some(next) => {
                *oid = next;
                true
            }
            None => false,
        }
    }

    /// Iterates over set OIDs in increasing order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.next_set(0), move |&oid| self.next_set(oid + 1))
    }
}
