//! A single on-disk volume: index, sequence and header files sharing a base name

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::alias::VolumeSummary;
use crate::ambig::{self, AmbiguityRun};
use crate::context::{IdIndex, IdKind, SeqDbContext};
use crate::defline::{split_version, DeflineSet};
use crate::error::{CorruptionError, Result};
use crate::file::{with_extension, FileKind, HeaderFile, IndexFile, SeqType, SequenceFile};
use crate::nuc::{self, NUCLEOTIDE_SENTINEL};
use crate::record::{ordinal_id, RecordOptions, Residues, SequenceRecord, TaxonomyInfo};
use crate::region::{Region, RegionStore};

/// Byte framing protein buffers in the blast-native layout
const PROTEIN_SENTINEL: u8 = 0;

/// Decoded residue layouts produced by [`Volume::decode_ambiguous`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// NCBI4na, two bases per byte, high nibble first
    Ncbi4na,
    /// NCBI4na, one base per byte
    Ncbi8na,
    /// Blast-native codes, one per byte, with a sentinel before and after
    BlastNa8,
}

/// Positions to keep when decoding; every other residue is overwritten with `fill`
#[derive(Debug, Clone, Copy)]
pub struct Mask<'a> {
    pub include: &'a [Range<usize>],
    pub fill: u8,
}
impl Mask<'_> {
    /// Residue ranges not covered by any included range
    #[must_use]
    pub fn gaps(&self, len: usize) -> Vec<Range<usize>> {
        let mut include: Vec<Range<usize>> = self
            .include
            .iter()
            .map(|r| r.start.min(len)..r.end.min(len))
            .filter(|r| !r.is_empty())
            .collect();
        include.sort_by_key(|r| r.start);

        let mut gaps = Vec::new();
        let mut pos = 0;
        for range in include {
            if range.start > pos {
                gaps.push(pos..range.start);
            }
            pos = pos.max(range.end);
        }
        if pos < len {
            gaps.push(pos..len);
        }
        gaps
    }
}

/// An open volume.
///
/// The index file is read when the volume is opened; the sequence and header
/// files and the id index are opened on first use.
pub struct Volume {
    name: String,
    base: PathBuf,
    index: IndexFile,
    seq: SequenceFile,
    hdr: HeaderFile,
    id_index: OnceLock<Option<Arc<dyn IdIndex>>>,
    id_index_lock: Mutex<()>,
}
impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("name", &self.name)
            .field("seq_type", &self.seq_type())
            .field("num_oids", &self.num_oids())
            .finish_non_exhaustive()
    }
}
impl Volume {
    /// Opens the volume at `base` (the path without extension)
    pub fn open(store: &RegionStore, base: &Path, seq_type: SeqType) -> Result<Self> {
        let index = IndexFile::open(store, with_extension(base, FileKind::Index, seq_type), seq_type)?;
        let name = base.file_name().map_or_else(
            || base.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        debug!(
            volume = %name,
            %seq_type,
            num_oids = index.num_oids(),
            "opened volume"
        );
        Ok(Self {
            name,
            base: base.to_path_buf(),
            seq: SequenceFile::new(store, with_extension(base, FileKind::Sequence, seq_type)),
            hdr: HeaderFile::new(store, with_extension(base, FileKind::Header, seq_type)),
            index,
            id_index: OnceLock::new(),
            id_index_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn seq_type(&self) -> SeqType {
        self.index.seq_type()
    }

    #[must_use]
    pub fn num_oids(&self) -> usize {
        self.index.num_oids()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.index.title()
    }

    #[must_use]
    pub fn date(&self) -> &str {
        self.index.date()
    }

    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.index.total_length()
    }

    #[must_use]
    pub fn max_length(&self) -> u32 {
        self.index.max_length()
    }

    /// The header values alias aggregation starts from
    #[must_use]
    pub fn summary(&self) -> VolumeSummary {
        VolumeSummary {
            title: self.title().to_string(),
            num_seqs: self.num_oids() as u64,
            total_length: self.total_length(),
            max_length: u64::from(self.max_length()),
        }
    }

    /// Returns whether the sequence file has been opened yet
    #[must_use]
    pub fn is_sequence_open(&self) -> bool {
        self.seq.is_open()
    }

    fn at<T>(&self, oid: usize, result: Result<T>) -> Result<T> {
        result.map_err(|e| e.at_oid(oid, &self.name))
    }

    fn seq_range(&self, oid: usize) -> Result<(u64, u64)> {
        let (start, end) = self.index.seq_start_end(oid)?;
        if start == end {
            return Err(CorruptionError::EmptyPackedSequence.into());
        }
        Ok((start, end))
    }

    /// Exact residue count of `oid`.
    ///
    /// For nucleotides this reads the final packed byte.
    pub fn seq_length_exact(&self, oid: usize) -> Result<usize> {
        self.at(oid, self.seq_length_exact_inner(oid))
    }

    fn seq_length_exact_inner(&self, oid: usize) -> Result<usize> {
        let (start, end) = self.seq_range(oid)?;
        let bytes = (end - start) as usize;
        match self.seq_type() {
            SeqType::Protein => Ok(bytes - 1),
            SeqType::Nucleotide => {
                let last = self.seq.get_region(end - 1, end)?;
                Ok((bytes - 1) * nuc::BASES_PER_BYTE + usize::from(last[0] & 0x3))
            }
        }
    }

    /// Residue count of `oid` computed from the offset table alone.
    ///
    /// Nucleotide lengths estimate the final byte as holding `oid & 3` bases, so
    /// the result may be off by up to 3; protein lengths are exact.
    pub fn seq_length_approx(&self, oid: usize) -> Result<usize> {
        self.at(oid, self.seq_length_approx_inner(oid))
    }

    fn seq_length_approx_inner(&self, oid: usize) -> Result<usize> {
        let (start, end) = self.seq_range(oid)?;
        let bytes = (end - start) as usize;
        Ok(match self.seq_type() {
            SeqType::Protein => bytes - 1,
            SeqType::Nucleotide => nuc::na2_length_approx(bytes, oid),
        })
    }

    /// Stored residue bytes of `oid`, undecoded.
    ///
    /// Protein regions exclude the separator byte; nucleotide regions are the
    /// packed bytes including the final length byte.
    pub fn raw_sequence(&self, oid: usize) -> Result<Region<'_>> {
        let result = self.seq_range(oid).and_then(|(start, end)| match self.seq_type() {
            SeqType::Protein => self.seq.get_region(start, end - 1),
            SeqType::Nucleotide => self.seq.get_region(start, end),
        });
        self.at(oid, result)
    }

    /// Ambiguity runs recorded for `oid`; always empty for protein
    pub fn ambiguity_runs(&self, oid: usize) -> Result<Vec<AmbiguityRun>> {
        let result = self.index.amb_start_end(oid).and_then(|range| match range {
            Some((start, end)) => ambig::parse_runs(&self.seq.get_region(start, end)?),
            None => Ok(Vec::new()),
        });
        self.at(oid, result)
    }

    /// Decodes `oid` into `representation`, restoring ambiguous residues.
    ///
    /// Runs are overlaid after expansion, then remapped, then `mask` is applied,
    /// so masked positions always end up as `mask.fill`. Protein residues are
    /// returned as stored, framed by zero bytes for [`Representation::BlastNa8`].
    pub fn decode_ambiguous(
        &self,
        oid: usize,
        representation: Representation,
        mask: Option<&Mask<'_>>,
    ) -> Result<Vec<u8>> {
        let result = match self.seq_type() {
            SeqType::Protein => self.decode_protein(oid, representation, mask),
            SeqType::Nucleotide => self.decode_nucleotide(oid, representation, mask),
        };
        self.at(oid, result)
    }

    fn decode_protein(
        &self,
        oid: usize,
        representation: Representation,
        mask: Option<&Mask<'_>>,
    ) -> Result<Vec<u8>> {
        let raw = self.raw_sequence(oid)?;
        let framed = representation == Representation::BlastNa8;
        let mut buf = Vec::with_capacity(raw.len() + 2);
        if framed {
            buf.push(PROTEIN_SENTINEL);
        }
        buf.extend_from_slice(&raw);
        if framed {
            buf.push(PROTEIN_SENTINEL);
        }
        if let Some(mask) = mask {
            let offset = usize::from(framed);
            for gap in mask.gaps(raw.len()) {
                buf[offset + gap.start..offset + gap.end].fill(mask.fill);
            }
        }
        Ok(buf)
    }

    fn decode_nucleotide(
        &self,
        oid: usize,
        representation: Representation,
        mask: Option<&Mask<'_>>,
    ) -> Result<Vec<u8>> {
        let (start, end) = self.seq_range(oid)?;
        let packed = self.seq.get_region(start, end)?;
        let len = nuc::na2_length_exact(&packed).ok_or(CorruptionError::EmptyPackedSequence)?;
        let runs = self.ambiguity_runs(oid)?;
        let gaps = mask.map(|m| (m.gaps(len), m.fill));

        let mut buf = Vec::new();
        match representation {
            Representation::Ncbi4na => {
                nuc::expand_na4(&packed, len, &mut buf);
                ambig::overlay_na4(&mut buf, len, &runs)?;
                if let Some((gaps, fill)) = gaps {
                    for pos in gaps.into_iter().flatten() {
                        nuc::na4_set(&mut buf, pos, fill);
                    }
                }
            }
            Representation::Ncbi8na => {
                nuc::expand_na8(&packed, len, &mut buf);
                ambig::overlay_na8(&mut buf, &runs)?;
                if let Some((gaps, fill)) = gaps {
                    for gap in gaps {
                        buf[gap].fill(fill);
                    }
                }
            }
            Representation::BlastNa8 => {
                buf.reserve(len + 2);
                buf.push(NUCLEOTIDE_SENTINEL);
                nuc::expand_na8(&packed, len, &mut buf);
                ambig::overlay_na8(&mut buf[1..], &runs)?;
                nuc::to_blastna(&mut buf[1..]);
                buf.push(NUCLEOTIDE_SENTINEL);
                if let Some((gaps, fill)) = gaps {
                    for gap in gaps {
                        buf[gap.start + 1..gap.end + 1].fill(fill);
                    }
                }
            }
        }
        Ok(buf)
    }

    /// IUPAC text of `oid`
    pub fn sequence_ascii(&self, oid: usize) -> Result<Vec<u8>> {
        match self.seq_type() {
            SeqType::Nucleotide => Ok(nuc::na8_to_iupac(&self.decode_ambiguous(
                oid,
                Representation::Ncbi8na,
                None,
            )?)),
            SeqType::Protein => Ok(nuc::stdaa_to_iupac(&self.raw_sequence(oid)?)),
        }
    }

    /// Residues of `oid` in the requested encoding
    pub fn residues(&self, oid: usize, residues: Residues) -> Result<Vec<u8>> {
        match residues {
            Residues::Raw => Ok(self.raw_sequence(oid)?.to_vec()),
            Residues::Ncbi4na => self.decode_ambiguous(oid, Representation::Ncbi4na, None),
            Residues::Ncbi8na => self.decode_ambiguous(oid, Representation::Ncbi8na, None),
            Residues::BlastNa8 => self.decode_ambiguous(oid, Representation::BlastNa8, None),
            Residues::Iupac => self.sequence_ascii(oid),
        }
    }

    /// Decoded deflines of `oid`; empty if the volume stores none for it
    pub fn deflines(&self, ctx: &SeqDbContext, oid: usize) -> Result<DeflineSet> {
        let result = self.index.hdr_start_end(oid).and_then(|(start, end)| {
            if start == end {
                return Ok(DeflineSet::default());
            }
            let bytes = self.hdr.get_region(start, end)?;
            ctx.codec()
                .decode(&bytes)
                .map_err(|e| e.in_file(self.hdr.path()))
        });
        self.at(oid, result)
    }

    fn id_index(&self, ctx: &SeqDbContext) -> Result<Option<Arc<dyn IdIndex>>> {
        if let Some(index) = self.id_index.get() {
            return Ok(index.clone());
        }
        let _guard = self.id_index_lock.lock();
        if let Some(index) = self.id_index.get() {
            return Ok(index.clone());
        }
        trace!(volume = %self.name, "opening id index");
        let index = ctx.open_id_index(&self.base, self.seq_type())?;
        Ok(self.id_index.get_or_init(|| index).clone())
    }

    /// Volume-local OID of a numeric id; `None` when unknown or no index exists
    pub fn lookup_by_numeric_id(
        &self,
        ctx: &SeqDbContext,
        kind: IdKind,
        id: u64,
    ) -> Result<Option<usize>> {
        let Some(index) = self.id_index(ctx)? else {
            return Ok(None);
        };
        Ok(index
            .lookup(kind, id)?
            .filter(|&oid| oid < self.num_oids()))
    }

    /// Volume-local OIDs of an accession.
    ///
    /// A versioned query (`NP_000001.2`) is re-checked against each candidate's
    /// stored ids, since the index may match on the unversioned key.
    pub fn lookup_by_string(&self, ctx: &SeqDbContext, accession: &str) -> Result<Vec<usize>> {
        let Some(index) = self.id_index(ctx)? else {
            return Ok(Vec::new());
        };
        let mut oids: Vec<usize> = index
            .lookup_string(accession)?
            .into_iter()
            .filter(|&oid| oid < self.num_oids())
            .collect();
        oids.sort_unstable();
        oids.dedup();
        if split_version(accession).1.is_none() {
            return Ok(oids);
        }
        let mut matched = Vec::with_capacity(oids.len());
        for oid in oids {
            let deflines = self.deflines(ctx, oid)?;
            if deflines
                .iter()
                .flat_map(|d| d.ids.iter())
                .any(|id| id.matches_accession(accession))
            {
                matched.push(oid);
            }
        }
        Ok(matched)
    }

    /// Builds a record for `oid`.
    ///
    /// `global_oid` names the record when it has no stored ids; `membership`
    /// restricts the deflines used to those carrying that bit.
    pub fn build_record(
        &self,
        ctx: &SeqDbContext,
        oid: usize,
        options: &RecordOptions,
        global_oid: usize,
        membership: Option<u32>,
    ) -> Result<SequenceRecord> {
        let deflines = if options.needs_deflines() {
            let set = self.deflines(ctx, oid)?;
            match membership {
                Some(bit) => set.with_membership(bit),
                None => set,
            }
        } else {
            DeflineSet::default()
        };

        let ids = if options.ids {
            let ids = deflines.ids();
            if ids.is_empty() {
                vec![ordinal_id(global_oid)]
            } else {
                ids
            }
        } else {
            Vec::new()
        };
        let residues = options
            .residues
            .map(|residues| self.residues(oid, residues))
            .transpose()?;
        let title = options.title.then(|| deflines.joined_title());
        let taxonomy = if options.taxonomy {
            deflines
                .taxids()
                .into_iter()
                .map(|taxid| {
                    Ok(TaxonomyInfo {
                        taxid,
                        names: ctx.taxonomy_names(taxid)?,
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map_err(|e| e.at_oid(oid, &self.name))?
        } else {
            Vec::new()
        };

        Ok(SequenceRecord {
            oid: global_oid,
            ids,
            residues,
            title,
            taxonomy,
        })
    }
}
