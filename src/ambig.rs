//! Ambiguity records of nucleotide sequences
//!
//! Residues that are not one of A/C/G/T are replaced by a random base when the
//! sequence is packed. The true residue is kept as a list of runs stored right
//! after the packed bytes, as an array of big-endian `u32` elements:
//!
//! ```text
//! element 0     count (top bit set => new layout)
//!
//! old layout, one element per run (count = number of runs):
//!   [31..28] residue  [27..24] length - 1  [23..0] position
//!
//! new layout, two elements per run (count = number of elements):
//!   [31..28] residue  [27..16] length - 1  [15..0] unused
//!   [31..0]  position
//! ```

use byteorder::{BigEndian, ByteOrder};

use crate::error::{CorruptionError, Result};
use crate::nuc;

/// Flag marking the new (two element) layout in the count element
pub const NEW_LAYOUT_FLAG: u32 = 0x8000_0000;

/// Longest run the old layout can describe
pub const OLD_MAX_RUN: u32 = 1 << 4;

/// Largest position the old layout can describe
pub const OLD_MAX_POSITION: u32 = (1 << 24) - 1;

/// Longest run the new layout can describe
pub const NEW_MAX_RUN: u32 = 1 << 12;

/// The two binary layouts of an ambiguity record array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityLayout {
    Old,
    New,
}
impl AmbiguityLayout {
    /// Detects the layout from the count element
    #[must_use]
    pub fn detect(count: u32) -> Self {
        if count & NEW_LAYOUT_FLAG != 0 {
            Self::New
        } else {
            Self::Old
        }
    }

    /// Number of `u32` elements consumed per run
    #[must_use]
    pub fn stride(self) -> usize {
        match self {
            Self::Old => 1,
            Self::New => 2,
        }
    }
}

/// One run of identical ambiguous residues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbiguityRun {
    /// NCBI4na residue code written over the run
    pub residue: u8,
    /// Number of positions covered (at least 1)
    pub length: u32,
    /// First position covered
    pub position: u32,
}
impl AmbiguityRun {
    #[must_use]
    pub fn new(residue: u8, position: u32, length: u32) -> Self {
        Self {
            residue,
            length,
            position,
        }
    }

    /// Position one past the end of the run
    #[must_use]
    pub fn end(&self) -> usize {
        self.position as usize + self.length as usize
    }

    fn decode_old(word: u32) -> Self {
        Self {
            residue: (word >> 28) as u8,
            length: ((word >> 24) & 0xF) + 1,
            position: word & 0x00FF_FFFF,
        }
    }

    fn decode_new(word: u32, position: u32) -> Self {
        Self {
            residue: (word >> 28) as u8,
            length: ((word >> 16) & 0xFFF) + 1,
            position,
        }
    }

    /// Returns whether the old layout can describe this run
    #[must_use]
    pub fn fits_old(&self) -> bool {
        (1..=OLD_MAX_RUN).contains(&self.length) && self.position <= OLD_MAX_POSITION
    }
}

fn invalid(msg: String) -> crate::Error {
    CorruptionError::InvalidAmbiguity(msg).into()
}

/// Parses an ambiguity record array.
///
/// An empty slice means the sequence has no ambiguous residues.
pub fn parse_runs(bytes: &[u8]) -> Result<Vec<AmbiguityRun>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes.len() % 4 != 0 {
        return Err(invalid(format!(
            "record length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let elements = bytes.len() / 4;
    let element = |i: usize| BigEndian::read_u32(&bytes[4 * i..4 * i + 4]);

    let head = element(0);
    let layout = AmbiguityLayout::detect(head);
    let count = (head & !NEW_LAYOUT_FLAG) as usize;
    if count + 1 > elements {
        return Err(invalid(format!(
            "count {count} exceeds the {} elements present",
            elements - 1
        )));
    }
    if layout == AmbiguityLayout::New && count % 2 != 0 {
        return Err(invalid(format!("new layout with odd element count {count}")));
    }

    let mut runs = Vec::with_capacity(count / layout.stride());
    let mut i = 1;
    while i <= count {
        let run = match layout {
            AmbiguityLayout::Old => AmbiguityRun::decode_old(element(i)),
            AmbiguityLayout::New => AmbiguityRun::decode_new(element(i), element(i + 1)),
        };
        runs.push(run);
        i += layout.stride();
    }
    Ok(runs)
}

/// Encodes runs using `layout`.
///
/// Runs that do not fit the old layout force the caller to choose [`AmbiguityLayout::New`].
pub fn encode_runs(runs: &[AmbiguityRun], layout: AmbiguityLayout) -> Result<Vec<u8>> {
    let count = runs.len() * layout.stride();
    let mut out = vec![0u8; 4 * (count + 1)];
    let head = match layout {
        AmbiguityLayout::Old => count as u32,
        AmbiguityLayout::New => count as u32 | NEW_LAYOUT_FLAG,
    };
    BigEndian::write_u32(&mut out[..4], head);
    let mut pos = 4;
    for run in runs {
        let residue = u32::from(run.residue & 0xF) << 28;
        match layout {
            AmbiguityLayout::Old => {
                if !run.fits_old() {
                    return Err(invalid(format!("{run:?} does not fit the old layout")));
                }
                let word = residue | ((run.length - 1) << 24) | run.position;
                BigEndian::write_u32(&mut out[pos..pos + 4], word);
                pos += 4;
            }
            AmbiguityLayout::New => {
                if !(1..=NEW_MAX_RUN).contains(&run.length) {
                    return Err(invalid(format!("{run:?} does not fit the new layout")));
                }
                let word = residue | ((run.length - 1) << 16);
                BigEndian::write_u32(&mut out[pos..pos + 4], word);
                BigEndian::write_u32(&mut out[pos + 4..pos + 8], run.position);
                pos += 8;
            }
        }
    }
    Ok(out)
}

fn check_bounds(runs: &[AmbiguityRun], len: usize) -> Result<()> {
    match runs.iter().find(|run| run.end() > len) {
        Some(run) => Err(invalid(format!(
            "{run:?} extends past sequence length {len}"
        ))),
        None => Ok(()),
    }
}

/// Writes each run's residue over a buffer holding one NCBI4na code per byte
pub fn overlay_na8(buf: &mut [u8], runs: &[AmbiguityRun]) -> Result<()> {
    check_bounds(runs, buf.len())?;
    for run in runs {
        buf[run.position as usize..run.end()].fill(run.residue);
    }
    Ok(())
}

/// Writes each run's residue over an `NA4` buffer holding `len` bases
pub fn overlay_na4(buf: &mut [u8], len: usize, runs: &[AmbiguityRun]) -> Result<()> {
    check_bounds(runs, len)?;
    for run in runs {
        for pos in run.position as usize..run.end() {
            nuc::na4_set(buf, pos, run.residue);
        }
    }
    Ok(())
}
