use crate::context::TaxonomyNames;
use crate::defline::SeqId;

/// Prefix of the local id synthesized for sequences without stored deflines
pub const ORDINAL_ID_PREFIX: &str = "BL_ORD_ID|";

/// Residue encodings a record can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residues {
    /// Bytes as stored: packed 2-bit nucleotides, or NCBIstdaa protein codes
    Raw,
    /// NCBI4na codes, two per byte
    Ncbi4na,
    /// NCBI4na codes, one per byte
    Ncbi8na,
    /// Blast-native codes framed by sentinel bytes
    BlastNa8,
    /// IUPAC letters
    Iupac,
}

/// Which parts of a [`SequenceRecord`] to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOptions {
    pub ids: bool,
    pub residues: Option<Residues>,
    pub title: bool,
    pub taxonomy: bool,
}
impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            ids: true,
            residues: None,
            title: false,
            taxonomy: false,
        }
    }
}
impl RecordOptions {
    /// Ids only
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids, IUPAC residues, title and taxonomy
    #[must_use]
    pub fn all() -> Self {
        Self {
            ids: true,
            residues: Some(Residues::Iupac),
            title: true,
            taxonomy: true,
        }
    }

    #[must_use]
    pub fn with_residues(mut self, residues: Residues) -> Self {
        self.residues = Some(residues);
        self
    }

    #[must_use]
    pub fn with_title(mut self) -> Self {
        self.title = true;
        self
    }

    #[must_use]
    pub fn with_taxonomy(mut self) -> Self {
        self.taxonomy = true;
        self
    }

    #[must_use]
    pub fn without_ids(mut self) -> Self {
        self.ids = false;
        self
    }

    /// True if building the record needs the decoded deflines
    #[must_use]
    pub fn needs_deflines(&self) -> bool {
        self.ids || self.title || self.taxonomy
    }
}

/// Taxonomy id of a record with its names, when a taxonomy service knows them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyInfo {
    pub taxid: u32,
    pub names: Option<TaxonomyNames>,
}

/// One sequence with the parts requested by [`RecordOptions`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceRecord {
    pub(crate) oid: usize,
    pub(crate) ids: Vec<SeqId>,
    pub(crate) residues: Option<Vec<u8>>,
    pub(crate) title: Option<String>,
    pub(crate) taxonomy: Vec<TaxonomyInfo>,
}
impl SequenceRecord {
    #[must_use]
    pub fn oid(&self) -> usize {
        self.oid
    }

    #[must_use]
    pub fn ids(&self) -> &[SeqId] {
        &self.ids
    }

    #[must_use]
    pub fn residues(&self) -> Option<&[u8]> {
        self.residues.as_deref()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn taxonomy(&self) -> &[TaxonomyInfo] {
        &self.taxonomy
    }

    /// First GI among the ids
    #[must_use]
    pub fn gi(&self) -> Option<u64> {
        self.ids.iter().find_map(SeqId::gi)
    }
}

/// Local id standing in for the deflines of a sequence that has none
#[must_use]
pub fn ordinal_id(oid: usize) -> SeqId {
    let mut buffer = itoa::Buffer::new();
    let mut id = String::with_capacity(ORDINAL_ID_PREFIX.len() + 20);
    id.push_str(ORDINAL_ID_PREFIX);
    id.push_str(buffer.format(oid));
    SeqId::Local(id)
}
