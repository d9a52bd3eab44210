use std::ops::Range;
use std::path::PathBuf;

/// Environment variable listing extra database directories, colon separated
pub const SEARCH_PATH_ENV: &str = "BLASTDB";

/// Options for [`SeqDb::open`](crate::SeqDb::open)
///
/// ```
/// use seqdb::OpenOptions;
///
/// let options = OpenOptions::new()
///     .mmap(false)
///     .search_path(["/data/blast"])
///     .gi_list(vec![129295, 3091])
///     .oid_range(0..1000);
/// assert!(!options.prefers_mmap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    pub(crate) mmap: bool,
    pub(crate) search_path: Vec<PathBuf>,
    pub(crate) gi_list: Option<Vec<u64>>,
    pub(crate) negative_gi_list: Option<Vec<u64>>,
    pub(crate) seqid_list: Option<Vec<String>>,
    pub(crate) oid_range: Option<Range<usize>>,
}
impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            mmap: true,
            search_path: Vec::new(),
            gi_list: None,
            negative_gi_list: None,
            seqid_list: None,
            oid_range: None,
        }
    }
}
impl OpenOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default options with the search path seeded from `BLASTDB`
    #[must_use]
    pub fn from_env() -> Self {
        let search_path = std::env::var_os(SEARCH_PATH_ENV)
            .map(|value| {
                std::env::split_paths(&value)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            search_path,
            ..Self::default()
        }
    }

    /// Whether files should be memory mapped (the default) or read into pooled buffers
    #[must_use]
    pub fn mmap(mut self, mmap: bool) -> Self {
        self.mmap = mmap;
        self
    }

    /// Appends directories searched for database names not found relative to the working directory
    #[must_use]
    pub fn search_path<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_path.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Restricts the database to OIDs whose GIs appear in `gis`
    #[must_use]
    pub fn gi_list(mut self, gis: Vec<u64>) -> Self {
        self.gi_list = Some(gis);
        self
    }

    /// Excludes OIDs all of whose GIs appear in `gis`
    #[must_use]
    pub fn negative_gi_list(mut self, gis: Vec<u64>) -> Self {
        self.negative_gi_list = Some(gis);
        self
    }

    /// Restricts the database to OIDs matching any of `accessions`
    #[must_use]
    pub fn seqid_list<I, S>(mut self, accessions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seqid_list = Some(accessions.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts iteration to a global OID window
    #[must_use]
    pub fn oid_range(mut self, range: Range<usize>) -> Self {
        self.oid_range = Some(range);
        self
    }

    #[must_use]
    pub fn prefers_mmap(&self) -> bool {
        self.mmap
    }

    #[must_use]
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// True if a user GI or accession list restricts the database
    #[must_use]
    pub fn has_user_list(&self) -> bool {
        self.gi_list.is_some() || self.seqid_list.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = OpenOptions::new();
        assert!(options.prefers_mmap());
        assert!(options.search_dirs().is_empty());
        assert!(!options.has_user_list());
        assert!(options.oid_range.is_none());
    }

    #[test]
    fn test_builder() {
        let options = OpenOptions::new()
            .mmap(false)
            .search_path(["/a", "/b"])
            .search_path([PathBuf::from("/c")])
            .seqid_list(["NP_1.1"])
            .negative_gi_list(vec![3]);
        assert!(!options.prefers_mmap());
        assert_eq!(options.search_dirs().len(), 3);
        assert!(options.has_user_list());
        assert_eq!(options.negative_gi_list, Some(vec![3]));
    }
}
