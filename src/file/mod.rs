//! Typed readers for the physical files of a volume
//!
//! A volume is stored as three files sharing a base name:
//!
//! ```text
//! <base>.pin / .nin   index: fixed header + offset tables
//! <base>.psq / .nsq   sequence: packed residues (+ ambiguity records for nucleotides)
//! <base>.phr / .nhr   header: encoded deflines
//! ```
//!
//! The index file is opened eagerly; the sequence and header files are opened on
//! first access.

mod index;
mod lazy;

pub use index::{IndexFile, FORMAT_VERSION};
pub use lazy::{HeaderFile, LazyFile, SequenceFile};

use std::fmt;
use std::path::{Path, PathBuf};

/// The residue alphabet of a volume or database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqType {
    Protein,
    Nucleotide,
}
impl SeqType {
    /// Single-character tag used in file extensions (`p` or `n`)
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            Self::Protein => 'p',
            Self::Nucleotide => 'n',
        }
    }

    /// Decodes the sequence-type field of an index header
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Protein),
            0 => Some(Self::Nucleotide),
            _ => None,
        }
    }

    /// The on-disk code for this sequence type
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Protein => 1,
            Self::Nucleotide => 0,
        }
    }

    #[must_use]
    pub fn is_nucleotide(self) -> bool {
        self == Self::Nucleotide
    }
}
impl fmt::Display for SeqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protein => write!(f, "protein"),
            Self::Nucleotide => write!(f, "nucleotide"),
        }
    }
}

/// The kinds of file that make up a database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Index,
    Sequence,
    Header,
    Alias,
}
impl FileKind {
    fn suffix(self) -> char {
        match self {
            Self::Index => 'n',
            Self::Sequence => 'q',
            Self::Header => 'r',
            Self::Alias => 'l',
        }
    }

    fn middle(self) -> char {
        match self {
            Self::Index => 'i',
            Self::Sequence => 's',
            Self::Header => 'h',
            Self::Alias => 'a',
        }
    }

    /// The three-letter extension for this kind of file, e.g. `nsq`
    #[must_use]
    pub fn extension(self, seq_type: SeqType) -> String {
        let mut ext = String::with_capacity(3);
        ext.push(seq_type.tag());
        ext.push(self.middle());
        ext.push(self.suffix());
        ext
    }
}

/// Appends the extension for `kind` to a base path without replacing dotted
/// components already present in the name (`nt.00` becomes `nt.00.nin`).
#[must_use]
pub fn with_extension(base: &Path, kind: FileKind, seq_type: SeqType) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(kind.extension(seq_type));
    PathBuf::from(name)
}
