//! Collaborators injected into a database
//!
//! Numeric/string id lookup, taxonomy names and defline decoding are not part of
//! the volume files this crate reads. They are supplied through the traits in
//! this module and bundled into one shared [`SeqDbContext`].

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use auto_impl::auto_impl;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::defline::{split_version, DeflineSet, TextDeflineCodec};
use crate::error::Result;
use crate::file::SeqType;

/// Default number of taxonomy entries kept by the context cache
pub const DEFAULT_TAXONOMY_CACHE: usize = 1024;

/// Kinds of numeric identifier a volume index can map to OIDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// GenInfo identifier
    Gi,
    /// Protein identity group
    Pig,
    /// Trace identifier
    Ti,
    /// Sequence hash
    Hash,
}

/// Per-volume id index mapping identifiers to volume-local OIDs
#[auto_impl(&, Box, Arc)]
pub trait IdIndex: Send + Sync {
    /// Returns the OID holding numeric id `id` of kind `kind`
    fn lookup(&self, kind: IdKind, id: u64) -> Result<Option<usize>>;

    /// Returns candidate OIDs for a string accession.
    ///
    /// Candidates are re-checked against the decoded deflines, so an index
    /// may return false positives (e.g. when it ignores versions).
    fn lookup_string(&self, accession: &str) -> Result<Vec<usize>>;
}

/// Opens the id index belonging to a volume, if one exists
#[auto_impl(&, Box, Arc)]
pub trait IdIndexSource: Send + Sync {
    fn open(&self, volume: &Path, seq_type: SeqType) -> Result<Option<Arc<dyn IdIndex>>>;
}

/// Scientific and common names for a taxonomy id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyNames {
    pub scientific_name: String,
    pub common_name: Option<String>,
}

/// Taxonomy name service
#[auto_impl(&, Box, Arc)]
pub trait TaxonomyLookup: Send + Sync {
    fn names(&self, taxid: u32) -> Result<Option<TaxonomyNames>>;
}

/// Encodes and decodes the per-OID defline blobs of the header file
#[auto_impl(&, Box, Arc)]
pub trait DeflineCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DeflineSet>;
    fn encode(&self, set: &DeflineSet) -> Result<Vec<u8>>;
}

/// Shared collaborators for one or more databases.
///
/// Cloning is cheap; clones share the same collaborators and taxonomy cache.
#[derive(Clone)]
pub struct SeqDbContext {
    id_indices: Option<Arc<dyn IdIndexSource>>,
    taxonomy: Option<Arc<dyn TaxonomyLookup>>,
    codec: Arc<dyn DeflineCodec>,
    taxonomy_cache: Arc<Mutex<LruCache<u32, Option<TaxonomyNames>>>>,
}
impl Default for SeqDbContext {
    fn default() -> Self {
        Self::builder().build()
    }
}
impl std::fmt::Debug for SeqDbContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeqDbContext")
            .field("id_indices", &self.id_indices.is_some())
            .field("taxonomy", &self.taxonomy.is_some())
            .field("taxonomy_cache", &self.taxonomy_cache.lock().len())
            .finish()
    }
}
impl SeqDbContext {
    #[must_use]
    pub fn builder() -> SeqDbContextBuilder {
        SeqDbContextBuilder::default()
    }

    #[must_use]
    pub fn codec(&self) -> &dyn DeflineCodec {
        self.codec.as_ref()
    }

    #[must_use]
    pub fn has_taxonomy(&self) -> bool {
        self.taxonomy.is_some()
    }

    /// Opens the id index for `volume`; `None` when no source is configured
    pub fn open_id_index(
        &self,
        volume: &Path,
        seq_type: SeqType,
    ) -> Result<Option<Arc<dyn IdIndex>>> {
        match &self.id_indices {
            Some(source) => source.open(volume, seq_type),
            None => Ok(None),
        }
    }

    /// Looks up taxonomy names, caching both hits and misses
    pub fn taxonomy_names(&self, taxid: u32) -> Result<Option<TaxonomyNames>> {
        let Some(taxonomy) = &self.taxonomy else {
            return Ok(None);
        };
        if let Some(cached) = self.taxonomy_cache.lock().get(&taxid) {
            return Ok(cached.clone());
        }
        trace!(taxid, "taxonomy cache miss");
        let names = taxonomy.names(taxid)?;
        self.taxonomy_cache.lock().put(taxid, names.clone());
        Ok(names)
    }
}

/// Builder for [`SeqDbContext`]
pub struct SeqDbContextBuilder {
    id_indices: Option<Arc<dyn IdIndexSource>>,
    taxonomy: Option<Arc<dyn TaxonomyLookup>>,
    codec: Arc<dyn DeflineCodec>,
    cache_capacity: usize,
}
impl Default for SeqDbContextBuilder {
    fn default() -> Self {
        Self {
            id_indices: None,
            taxonomy: None,
            codec: Arc::new(TextDeflineCodec),
            cache_capacity: DEFAULT_TAXONOMY_CACHE,
        }
    }
}
impl SeqDbContextBuilder {
    #[must_use]
    pub fn with_id_indices<S: IdIndexSource + 'static>(mut self, source: S) -> Self {
        self.id_indices = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn with_taxonomy<T: TaxonomyLookup + 'static>(mut self, taxonomy: T) -> Self {
        self.taxonomy = Some(Arc::new(taxonomy));
        self
    }

    #[must_use]
    pub fn with_codec<C: DeflineCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Sets the taxonomy cache size; zero is treated as one
    #[must_use]
    pub fn with_taxonomy_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn build(self) -> SeqDbContext {
        let capacity = NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        SeqDbContext {
            id_indices: self.id_indices,
            taxonomy: self.taxonomy,
            codec: self.codec,
            taxonomy_cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }
}

/// In-memory [`IdIndex`], mostly useful for tests and small tools
#[derive(Debug, Default, Clone)]
pub struct MemoryIdIndex {
    numeric: HashMap<(IdKind, u64), usize>,
    strings: HashMap<String, Vec<usize>>,
}
impl MemoryIdIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: IdKind, id: u64, oid: usize) {
        self.numeric.insert((kind, id), oid);
    }

    /// Registers an accession; lookups ignore case and version
    pub fn insert_accession(&mut self, accession: &str, oid: usize) {
        let key = split_version(accession).0.to_ascii_lowercase();
        let oids = self.strings.entry(key).or_default();
        if !oids.contains(&oid) {
            oids.push(oid);
        }
    }
}
impl IdIndex for MemoryIdIndex {
    fn lookup(&self, kind: IdKind, id: u64) -> Result<Option<usize>> {
        Ok(self.numeric.get(&(kind, id)).copied())
    }

    fn lookup_string(&self, accession: &str) -> Result<Vec<usize>> {
        let key = split_version(accession).0.to_ascii_lowercase();
        Ok(self.strings.get(&key).cloned().unwrap_or_default())
    }
}

/// [`IdIndexSource`] serving [`MemoryIdIndex`]es keyed by volume file name
#[derive(Default, Clone)]
pub struct MemoryIdIndexSource {
    indices: HashMap<String, Arc<dyn IdIndex>>,
}
impl MemoryIdIndexSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `index` for every volume whose base file name is `volume`
    #[must_use]
    pub fn with_volume<I: IdIndex + 'static>(mut self, volume: &str, index: I) -> Self {
        self.indices.insert(volume.to_string(), Arc::new(index));
        self
    }
}
impl IdIndexSource for MemoryIdIndexSource {
    fn open(&self, volume: &Path, _seq_type: SeqType) -> Result<Option<Arc<dyn IdIndex>>> {
        let Some(name) = volume.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        Ok(self.indices.get(name).cloned())
    }
}
