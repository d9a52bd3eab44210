use std::path::{Path, PathBuf};

/// Custom Result type for seqdb operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the seqdb library, encompassing all possible error cases
/// that can occur while opening and reading a sequence database.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors related to the fixed layout of the index file
    #[error("Error processing format: {0}")]
    FormatError(#[from] FormatError),

    /// Offsets or records that point outside of the data they describe
    #[error("File corruption: {0}")]
    CorruptionError(#[from] CorruptionError),

    /// Errors raised while building the alias tree
    #[error("Error processing alias: {0}")]
    AliasError(#[from] AliasError),

    /// A component file could not be located
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// UTF-8 conversion errors
    #[error("Error with UTF8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Errors raised by an external collaborator (id index, defline codec, taxonomy)
    #[error("Collaborator error: {0}")]
    External(String),

    /// An error attributed to a specific component file
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// An error attributed to a specific OID of a volume
    #[error("OID {oid} of volume {volume}: {source}")]
    Oid {
        oid: usize,
        volume: String,
        #[source]
        source: Box<Error>,
    },
}
impl Error {
    /// Wraps this error with the component file that caused it.
    ///
    /// Already attributed errors are returned unchanged so the innermost file wins.
    #[must_use]
    pub fn in_file<P: AsRef<Path>>(self, path: P) -> Self {
        match self {
            Self::File { .. } | Self::NotFound(_) => self,
            other => Self::File {
                path: path.as_ref().to_path_buf(),
                source: Box::new(other),
            },
        }
    }

    /// Wraps this error with the OID and volume being served.
    #[must_use]
    pub fn at_oid(self, oid: usize, volume: &str) -> Self {
        match self {
            Self::Oid { .. } => self,
            other => Self::Oid {
                oid,
                volume: volume.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping over file and OID attribution.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::File { source, .. } | Self::Oid { source, .. } => source.root(),
            other => other,
        }
    }

    /// Checks if the error reports on-disk data that is out of bounds or malformed
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self.root(), Self::CorruptionError(_))
    }

    /// Checks if the error reports an alias file that references itself
    #[must_use]
    pub fn is_recursive_alias(&self) -> bool {
        matches!(self.root(), Self::AliasError(AliasError::Recursive { .. }))
    }

    /// Checks if the error reports an alias filter that cannot be assigned to one volume
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self.root(), Self::AliasError(AliasError::AmbiguousFilter { .. }))
    }

    /// Checks if the error reports a missing file or database name
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self.root() {
            Self::NotFound(_) | Self::AliasError(AliasError::UnresolvedName(_)) => true,
            Self::IoError(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Checks if the error reports an unsupported index format version
    #[must_use]
    pub fn is_version_mismatch(&self) -> bool {
        matches!(
            self.root(),
            Self::FormatError(FormatError::VersionMismatch { .. })
        )
    }
}

/// Errors specific to the fixed header of an index file
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The format version in the header is not supported
    #[error("Unsupported format version: {found}. Expected: {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    /// The sequence type field is neither protein nor nucleotide
    #[error("Invalid sequence type in header: {0}")]
    InvalidSeqType(u32),

    /// The sequence type in the header disagrees with the file extension
    #[error("Sequence type mismatch: file declares {found}, opened as {expected}")]
    SeqTypeMismatch { found: char, expected: char },

    /// The index file is shorter than its header declares
    #[error("Index truncated: {needed} bytes needed but file holds {len}")]
    Truncated { needed: u64, len: u64 },

    /// The contents of a text file could not be interpreted
    #[error("Invalid {what}: {value:?}")]
    InvalidValue { what: &'static str, value: String },
}

/// Errors raised when offsets read from disk do not fit the data they describe
#[derive(thiserror::Error, Debug)]
pub enum CorruptionError {
    /// A byte range falls outside the file
    #[error("Region {start}..{end} is out of range for file of length {len}")]
    RegionOutOfRange { start: u64, end: u64, len: u64 },

    /// Attempted to access an OID beyond the available range
    #[error("Requested OID ({oid}) is out of OID range ({num_oids})")]
    OidOutOfRange { oid: usize, num_oids: usize },

    /// An offset table entry runs backwards
    #[error("Offset table is not monotonic: {start} > {end}")]
    NonMonotonicOffsets { start: u64, end: u64 },

    /// An ambiguity run does not fit the sequence or the record array
    #[error("Invalid ambiguity record: {0}")]
    InvalidAmbiguity(String),

    /// A sequence region is missing its final separator or length byte
    #[error("Sequence region has no trailing separator or length byte")]
    EmptyPackedSequence,
}

/// Errors raised while parsing and resolving alias files
#[derive(thiserror::Error, Debug)]
pub enum AliasError {
    /// An alias file lists itself, directly or through a descendant
    #[error("Recursive alias file: {path} (stack: {chain:?})")]
    Recursive { path: PathBuf, chain: Vec<PathBuf> },

    /// OIDLIST / GILIST / FIRST_OID / LAST_OID used on a node owning several volumes
    #[error("Alias {path} filters with {key} but owns {volumes} volumes (exactly one required)")]
    AmbiguousFilter {
        path: PathBuf,
        key: &'static str,
        volumes: usize,
    },

    /// A database name matched neither an alias file nor a volume
    #[error("Could not resolve database name: {0}")]
    UnresolvedName(String),

    /// An alias file does not contain a DBLIST entry
    #[error("Alias file has no DBLIST: {0}")]
    MissingDbList(PathBuf),

    /// A recognized key carries a value that cannot be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// No database names were supplied
    #[error("Empty database name list")]
    EmptyNameList,
}

/// Trait for converting collaborator errors into `Error`
pub trait IntoSeqDbError {
    fn into_seqdb_error(self) -> Error;
}

impl<E> IntoSeqDbError for E
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_seqdb_error(self) -> Error {
        Error::External(self.to_string())
    }
}
