//! Sequence identifiers and deflines
//!
//! The header file stores, per OID, an encoded set of deflines. The encoding is
//! owned by a [`DeflineCodec`](crate::DeflineCodec); [`TextDeflineCodec`] is a
//! plain-text codec with one defline per line:
//!
//! ```text
//! <seqids> TAB <title> [TAB <taxid> [TAB <membership bits, comma separated>]]
//! ```
//!
//! where `<seqids>` uses FASTA bar syntax, e.g. `gi|129295|ref|NP_000001.2|lcl|x`.

use std::fmt;

use crate::error::{FormatError, Result};
use crate::DeflineCodec;

/// A sequence identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeqId {
    /// Legacy numeric GenInfo identifier
    Gi(u64),
    /// Local identifier (`lcl|...`, or a synthesized ordinal id)
    Local(String),
    /// Accession in some database namespace (`ref`, `gb`, `sp`, ...), with optional version
    Accession { db: String, accession: String },
}
impl SeqId {
    /// Parses one `tag|value` pair
    #[must_use]
    pub fn from_pair(tag: &str, value: &str) -> Option<Self> {
        match tag {
            "gi" => value.parse().ok().map(Self::Gi),
            "lcl" => Some(Self::Local(value.to_string())),
            "" => None,
            _ => Some(Self::Accession {
                db: tag.to_string(),
                accession: value.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn gi(&self) -> Option<u64> {
        match self {
            Self::Gi(gi) => Some(*gi),
            _ => None,
        }
    }

    /// Returns whether this id answers to `query`.
    ///
    /// A query with a version (`NP_000001.2`) must match exactly; a query without
    /// one matches any version of the same accession. Comparison ignores case.
    #[must_use]
    pub fn matches_accession(&self, query: &str) -> bool {
        let candidate = match self {
            Self::Accession { accession, .. } => accession.as_str(),
            Self::Local(id) => id.as_str(),
            Self::Gi(_) => return false,
        };
        if candidate.eq_ignore_ascii_case(query) {
            return true;
        }
        if split_version(query).1.is_none() {
            return split_version(candidate).0.eq_ignore_ascii_case(query);
        }
        false
    }
}
impl fmt::Display for SeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gi(gi) => write!(f, "gi|{gi}"),
            Self::Local(id) => write!(f, "lcl|{id}"),
            Self::Accession { db, accession } => write!(f, "{db}|{accession}"),
        }
    }
}

/// Splits `NP_000001.2` into (`NP_000001`, `Some(2)`)
#[must_use]
pub fn split_version(accession: &str) -> (&str, Option<u32>) {
    match accession.rsplit_once('.') {
        Some((base, version)) if !base.is_empty() => match version.parse() {
            Ok(v) => (base, Some(v)),
            Err(_) => (accession, None),
        },
        _ => (accession, None),
    }
}

/// Parses FASTA bar syntax (`gi|1|ref|NP_1.1|`) into ids; unknown pairs are skipped
#[must_use]
pub fn parse_seqids(text: &str) -> Vec<SeqId> {
    let mut parts = text.split('|');
    let mut ids = Vec::new();
    while let Some(tag) = parts.next() {
        let value = parts.next().unwrap_or_default();
        if let Some(id) = SeqId::from_pair(tag.trim(), value.trim()) {
            ids.push(id);
        }
    }
    ids
}

/// One defline: the ids, title and annotations of one source record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defline {
    pub ids: Vec<SeqId>,
    pub title: String,
    pub taxid: Option<u32>,
    pub memberships: Vec<u32>,
}
impl Defline {
    #[must_use]
    pub fn has_membership(&self, bit: u32) -> bool {
        self.memberships.contains(&bit)
    }

    pub fn gis(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.iter().filter_map(SeqId::gi)
    }
}

/// All deflines stored for one OID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeflineSet(pub Vec<Defline>);
impl DeflineSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Defline> {
        self.0.iter()
    }

    /// All ids, in defline order
    #[must_use]
    pub fn ids(&self) -> Vec<SeqId> {
        self.iter().flat_map(|d| d.ids.iter().cloned()).collect()
    }

    /// All GIs, in defline order
    #[must_use]
    pub fn gis(&self) -> Vec<u64> {
        self.iter().flat_map(Defline::gis).collect()
    }

    /// Distinct taxids, in first-seen order
    #[must_use]
    pub fn taxids(&self) -> Vec<u32> {
        let mut taxids = Vec::new();
        for taxid in self.iter().filter_map(|d| d.taxid) {
            if !taxids.contains(&taxid) {
                taxids.push(taxid);
            }
        }
        taxids
    }

    /// Titles of all deflines joined with `"; "`
    #[must_use]
    pub fn joined_title(&self) -> String {
        self.iter()
            .map(|d| d.title.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Keeps deflines carrying membership `bit`; returns the set unchanged if none do
    #[must_use]
    pub fn with_membership(self, bit: u32) -> Self {
        if !self.iter().any(|d| d.has_membership(bit)) {
            return self;
        }
        Self(self.0.into_iter().filter(|d| d.has_membership(bit)).collect())
    }
}
impl IntoIterator for DeflineSet {
    type Item = Defline;
    type IntoIter = std::vec::IntoIter<Defline>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Plain-text defline codec; see the module documentation for the layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDeflineCodec;
impl TextDeflineCodec {
    fn parse_line(line: &str) -> Result<Defline> {
        let mut fields = line.split('\t');
        let ids = parse_seqids(fields.next().unwrap_or_default());
        let title = fields.next().unwrap_or_default().to_string();
        let taxid = match fields.next().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(value.parse().map_err(|_| FormatError::InvalidValue {
                what: "taxid",
                value: value.to_string(),
            })?),
        };
        let memberships = match fields.next().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(value) => value
                .split(',')
                .map(|bit| {
                    bit.trim().parse().map_err(|_| {
                        FormatError::InvalidValue {
                            what: "membership bit",
                            value: bit.to_string(),
                        }
                        .into()
                    })
                })
                .collect::<Result<Vec<u32>>>()?,
        };
        Ok(Defline {
            ids,
            title,
            taxid,
            memberships,
        })
    }
}
impl DeflineCodec for TextDeflineCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DeflineSet> {
        let text = std::str::from_utf8(bytes)?;
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(Self::parse_line)
            .collect::<Result<Vec<_>>>()
            .map(DeflineSet)
    }

    fn encode(&self, set: &DeflineSet) -> Result<Vec<u8>> {
        let mut out = String::new();
        for defline in set.iter() {
            let ids: Vec<String> = defline.ids.iter().map(ToString::to_string).collect();
            out.push_str(&ids.join("|"));
            out.push('\t');
            out.push_str(&defline.title);
            if defline.taxid.is_some() || !defline.memberships.is_empty() {
                out.push('\t');
                if let Some(taxid) = defline.taxid {
                    out.push_str(&taxid.to_string());
                }
            }
            if !defline.memberships.is_empty() {
                let bits: Vec<String> = defline.memberships.iter().map(u32::to_string).collect();
                out.push('\t');
                out.push_str(&bits.join(","));
            }
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}
