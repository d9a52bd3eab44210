use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::alias::{AliasSummary, AliasTree};
use crate::ambig::AmbiguityRun;
use crate::config::OpenOptions;
use crate::context::{IdKind, SeqDbContext};
use crate::defline::DeflineSet;
use crate::error::{CorruptionError, Result};
use crate::file::SeqType;
use crate::filter::{MaskPlan, OidFilter, OidFilterBuilder};
use crate::record::{RecordOptions, Residues, SequenceRecord};
use crate::region::{Region, RegionStore};
use crate::volume::{Mask, Representation, Volume};

/// A logical sequence database: the volumes of one alias tree behind a single
/// global OID space, with the tree's filters and any user lists applied.
///
/// Per-OID accessors take global OIDs and accept any OID below
/// [`num_oids`](Self::num_oids), filtered or not. Iteration
/// ([`iter_oids`](Self::iter_oids), [`check_or_find_oid`](Self::check_or_find_oid),
/// [`next_oid_chunk`](Self::next_oid_chunk)) only visits included OIDs.
#[derive(Debug)]
pub struct SeqDb {
    seq_type: SeqType,
    ctx: Arc<SeqDbContext>,
    volumes: Vec<Volume>,

    /// Global OID of each volume's first sequence
    starts: Vec<usize>,
    num_oids: usize,

    /// Every filter must include an OID for it to be visited
    filters: Vec<OidFilter>,
    /// OIDs excluded by a negative GI list
    excluded: Option<OidFilter>,
    window: Range<usize>,

    summary: AliasSummary,
    chunk_cursor: AtomicUsize,
}
impl SeqDb {
    /// Opens the databases named in `names` (whitespace separated).
    ///
    /// With `seq_type` of `None` the names are resolved as protein first and as
    /// nucleotide if no protein database is found.
    pub fn open(
        names: &str,
        seq_type: Option<SeqType>,
        options: &OpenOptions,
        ctx: Arc<SeqDbContext>,
    ) -> Result<Self> {
        match seq_type {
            Some(seq_type) => Self::open_typed(names, seq_type, options, ctx),
            None => match Self::open_typed(names, SeqType::Protein, options, Arc::clone(&ctx)) {
                Err(err) if err.is_not_found() => {
                    debug!(names, "no protein database found, trying nucleotide");
                    Self::open_typed(names, SeqType::Nucleotide, options, ctx)
                }
                other => other,
            },
        }
    }

    fn open_typed(
        names: &str,
        seq_type: SeqType,
        options: &OpenOptions,
        ctx: Arc<SeqDbContext>,
    ) -> Result<Self> {
        let tree = AliasTree::build(names, seq_type, &options.search_path)?;
        let store = RegionStore::new(options.mmap);

        let volumes = tree
            .volumes()
            .iter()
            .map(|base| Volume::open(&store, base, seq_type))
            .collect::<Result<Vec<_>>>()?;
        let mut starts = Vec::with_capacity(volumes.len());
        let mut num_oids = 0;
        for volume in &volumes {
            starts.push(num_oids);
            num_oids += volume.num_oids();
        }

        let by_base: HashMap<&Path, &Volume> = volumes.iter().map(|v| (v.base(), v)).collect();
        let summary = tree.summary(|path| by_base.get(path).map(|v| v.summary()))?;

        let mut db = Self {
            seq_type,
            ctx,
            volumes,
            starts,
            num_oids,
            filters: Vec::new(),
            excluded: None,
            window: 0..num_oids,
            summary,
            chunk_cursor: AtomicUsize::new(0),
        };

        let plan = tree.set_masks()?;
        if !plan.is_unfiltered() {
            let filter = db.alias_filter(&plan, &store)?;
            db.filters.push(filter);
        }
        if options.has_user_list() {
            let filter = db.user_list_filter(options)?;
            db.filters.push(filter);
        }
        if let Some(gis) = &options.negative_gi_list {
            db.excluded = Some(db.negative_filter(gis)?);
        }
        if let Some(range) = &options.oid_range {
            db.window = range.start.min(num_oids)..range.end.min(num_oids);
        }

        debug!(
            names,
            %seq_type,
            volumes = db.volumes.len(),
            num_oids,
            filters = db.filters.len(),
            "opened database"
        );
        Ok(db)
    }

    fn alias_filter(&self, plan: &MaskPlan, store: &RegionStore) -> Result<OidFilter> {
        let mut builder = OidFilterBuilder::new(self.num_oids);
        for (volume, &start) in self.volumes.iter().zip(&self.starts) {
            match plan.entry(volume.base()) {
                Some(entry) => entry.apply(&mut builder, store, start, volume.num_oids(), |gi| {
                    volume.lookup_by_numeric_id(&self.ctx, IdKind::Gi, gi)
                })?,
                None => builder.set_range(start..start + volume.num_oids()),
            }
        }
        let filter = builder.build();
        debug!(included = filter.count(), "built alias filter");
        Ok(filter)
    }

    fn user_list_filter(&self, options: &OpenOptions) -> Result<OidFilter> {
        let mut builder = OidFilterBuilder::new(self.num_oids);
        for (volume, &start) in self.volumes.iter().zip(&self.starts) {
            if let Some(gis) = &options.gi_list {
                builder.or_numeric_id_list(
                    gis,
                    |gi| volume.lookup_by_numeric_id(&self.ctx, IdKind::Gi, gi),
                    0..volume.num_oids(),
                    start,
                )?;
            }
            for accession in options.seqid_list.iter().flatten() {
                for oid in volume.lookup_by_string(&self.ctx, accession)? {
                    builder.set(start + oid)?;
                }
            }
        }
        let filter = builder.build();
        debug!(included = filter.count(), "built user list filter");
        Ok(filter)
    }

    /// OIDs whose every GI is listed; OIDs without GIs are never excluded
    fn negative_filter(&self, gis: &[u64]) -> Result<OidFilter> {
        let listed: HashSet<u64> = gis.iter().copied().collect();
        let mut builder = OidFilterBuilder::new(self.num_oids);
        for (volume, &start) in self.volumes.iter().zip(&self.starts) {
            for oid in 0..volume.num_oids() {
                let oid_gis = volume.deflines(&self.ctx, oid)?.gis();
                if !oid_gis.is_empty() && oid_gis.iter().all(|gi| listed.contains(gi)) {
                    builder.set(start + oid)?;
                }
            }
        }
        let filter = builder.build();
        debug!(excluded = filter.count(), "built negative GI filter");
        Ok(filter)
    }

    /// Maps a global OID to its volume and volume-local OID
    pub fn locate(&self, oid: usize) -> Result<(&Volume, usize)> {
        if oid >= self.num_oids {
            return Err(CorruptionError::OidOutOfRange {
                oid,
                num_oids: self.num_oids,
            }
            .into());
        }
        let idx = self.starts.partition_point(|&start| start <= oid) - 1;
        Ok((&self.volumes[idx], oid - self.starts[idx]))
    }

    /// Returns true if `oid` is included; otherwise moves it to the next
    /// included OID, returning false once none remain
    pub fn check_or_find_oid(&self, oid: &mut usize) -> bool {
        if *oid < self.window.start {
            *oid = self.window.start;
        }
        loop {
            if *oid >= self.window.end {
                return false;
            }
            // leapfrog until every filter agrees on the same OID
            let mut moved = false;
            for filter in &self.filters {
                let before = *oid;
                if !filter.contains_or_advance(oid) {
                    return false;
                }
                moved |= *oid != before;
            }
            if moved {
                continue;
            }
            if *oid >= self.window.end {
                return false;
            }
            if self.excluded.as_ref().is_some_and(|ex| ex.contains(*oid)) {
                *oid += 1;
                continue;
            }
            return true;
        }
    }

    /// Included OIDs in increasing order
    pub fn iter_oids(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.window.start;
        std::iter::from_fn(move || {
            if !self.check_or_find_oid(&mut next) {
                return None;
            }
            let oid = next;
            next += 1;
            Some(oid)
        })
    }

    /// Claims the next range of at most `max` raw OIDs for a cooperative scan.
    ///
    /// Ranges are disjoint across callers and threads; OIDs inside them still
    /// need [`check_or_find_oid`](Self::check_or_find_oid) to skip filtered ones.
    pub fn next_oid_chunk(&self, max: usize) -> Option<Range<usize>> {
        // clamped so the cursor cannot wrap and hand out claimed ranges again
        let max = max.clamp(1, self.window.len().max(1));
        let offset = self.chunk_cursor.fetch_add(max, Ordering::Relaxed);
        let start = self.window.start.checked_add(offset)?;
        if start >= self.window.end {
            return None;
        }
        Some(start..(start + max).min(self.window.end))
    }

    /// Rewinds [`next_oid_chunk`](Self::next_oid_chunk) to the start of the database
    pub fn reset_oid_chunks(&self) {
        self.chunk_cursor.store(0, Ordering::Relaxed);
    }

    #[must_use]
    pub fn seq_type(&self) -> SeqType {
        self.seq_type
    }

    /// Size of the raw OID space across all volumes
    #[must_use]
    pub fn num_oids(&self) -> usize {
        self.num_oids
    }

    /// Global OID window iteration is restricted to
    #[must_use]
    pub fn oid_window(&self) -> Range<usize> {
        self.window.clone()
    }

    /// True if any alias, user-list or negative filter applies
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty() || self.excluded.is_some()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.summary.title
    }

    /// Build date of the first volume
    #[must_use]
    pub fn date(&self) -> &str {
        self.volumes.first().map_or("", Volume::date)
    }

    /// Sequence count, from alias overrides or summed over volumes
    #[must_use]
    pub fn num_seqs(&self) -> u64 {
        self.summary.num_seqs
    }

    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.summary.total_length
    }

    #[must_use]
    pub fn max_length(&self) -> u64 {
        self.summary.max_length
    }

    #[must_use]
    pub fn membership_bit(&self) -> Option<u32> {
        self.summary.membership_bit
    }

    #[must_use]
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    #[must_use]
    pub fn volume_names(&self) -> Vec<&str> {
        self.volumes.iter().map(Volume::name).collect()
    }

    #[must_use]
    pub fn context(&self) -> &SeqDbContext {
        &self.ctx
    }

    pub fn seq_length(&self, oid: usize) -> Result<usize> {
        let (volume, local) = self.locate(oid)?;
        volume.seq_length_exact(local)
    }

    pub fn seq_length_approx(&self, oid: usize) -> Result<usize> {
        let (volume, local) = self.locate(oid)?;
        volume.seq_length_approx(local)
    }

    pub fn raw_sequence(&self, oid: usize) -> Result<Region<'_>> {
        let (volume, local) = self.locate(oid)?;
        volume.raw_sequence(local)
    }

    pub fn ambiguity_runs(&self, oid: usize) -> Result<Vec<AmbiguityRun>> {
        let (volume, local) = self.locate(oid)?;
        volume.ambiguity_runs(local)
    }

    pub fn decode_ambiguous(
        &self,
        oid: usize,
        representation: Representation,
        mask: Option<&Mask<'_>>,
    ) -> Result<Vec<u8>> {
        let (volume, local) = self.locate(oid)?;
        volume.decode_ambiguous(local, representation, mask)
    }

    pub fn residues(&self, oid: usize, residues: Residues) -> Result<Vec<u8>> {
        let (volume, local) = self.locate(oid)?;
        volume.residues(local, residues)
    }

    /// IUPAC text of a nucleotide, or ASCII letters of a protein
    pub fn sequence_ascii(&self, oid: usize) -> Result<Vec<u8>> {
        let (volume, local) = self.locate(oid)?;
        volume.sequence_ascii(local)
    }

    /// Deflines of `oid`, restricted to the database membership bit when one is set
    pub fn deflines(&self, oid: usize) -> Result<DeflineSet> {
        let (volume, local) = self.locate(oid)?;
        let set = volume.deflines(&self.ctx, local)?;
        Ok(match self.summary.membership_bit {
            Some(bit) => set.with_membership(bit),
            None => set,
        })
    }

    pub fn build_record(&self, oid: usize, options: &RecordOptions) -> Result<SequenceRecord> {
        let (volume, local) = self.locate(oid)?;
        volume.build_record(&self.ctx, local, options, oid, self.summary.membership_bit)
    }

    /// Global OID of a numeric id in any volume
    pub fn lookup_numeric(&self, kind: IdKind, id: u64) -> Result<Option<usize>> {
        for (volume, &start) in self.volumes.iter().zip(&self.starts) {
            if let Some(local) = volume.lookup_by_numeric_id(&self.ctx, kind, id)? {
                return Ok(Some(start + local));
            }
        }
        Ok(None)
    }

    pub fn gi_to_oid(&self, gi: u64) -> Result<Option<usize>> {
        self.lookup_numeric(IdKind::Gi, gi)
    }

    /// Global OIDs matching an accession, in increasing order
    pub fn accession_to_oids(&self, accession: &str) -> Result<Vec<usize>> {
        let mut oids = Vec::new();
        for (volume, &start) in self.volumes.iter().zip(&self.starts) {
            oids.extend(
                volume
                    .lookup_by_string(&self.ctx, accession)?
                    .into_iter()
                    .map(|local| start + local),
            );
        }
        Ok(oids)
    }

    /// GIs of all deflines stored for `oid`
    pub fn oid_to_gis(&self, oid: usize) -> Result<Vec<u64>> {
        let (volume, local) = self.locate(oid)?;
        Ok(volume.deflines(&self.ctx, local)?.gis())
    }

    /// Distinct taxids of the deflines of `oid`
    pub fn taxids(&self, oid: usize) -> Result<Vec<u32>> {
        Ok(self.deflines(oid)?.taxids())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::context::{MemoryIdIndex, MemoryIdIndexSource};
    use crate::testing::{write_alias, write_binary_gi_list, write_oid_mask, VolumeBuilder};

    fn ctx() -> Arc<SeqDbContext> {
        Arc::new(SeqDbContext::default())
    }

    fn name(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    /// Protein volume whose OID `i` has GI `first_gi + i`, with a matching id index
    fn gi_volume(dir: &Path, vol: &str, n: usize, first_gi: u64) -> (PathBuf, MemoryIdIndex) {
        let base = VolumeBuilder::protein(vol)
            .push_proteins(n, first_gi)
            .write(dir, vol)
            .unwrap();
        let mut index = MemoryIdIndex::new();
        for i in 0..n {
            index.insert(IdKind::Gi, first_gi + i as u64, i);
        }
        (base, index)
    }

    #[test]
    fn test_first_last_oid_window() {
        let dir = tempfile::tempdir().unwrap();
        VolumeBuilder::protein("ten")
            .push_proteins(10, 1)
            .write(dir.path(), "ten")
            .unwrap();
        let alias = write_alias(
            dir.path(),
            "window",
            SeqType::Protein,
            &["DBLIST ten", "FIRST_OID 2", "LAST_OID 5"],
        );
        let db = SeqDb::open(
            name(&alias.with_extension("")),
            Some(SeqType::Protein),
            &OpenOptions::new(),
            ctx(),
        )
        .unwrap();
        assert_eq!(db.num_oids(), 10);
        assert!(db.is_filtered());

        let mut oid = 0;
        assert!(db.check_or_find_oid(&mut oid));
        assert_eq!(oid, 1);
        assert_eq!(db.iter_oids().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        let mut oid = 5;
        assert!(!db.check_or_find_oid(&mut oid));
        // unfiltered access still works
        assert_eq!(db.seq_length(9).unwrap(), 10);
    }

    #[test]
    fn test_multi_volume_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let (_, a_index) = gi_volume(dir.path(), "a", 3, 100);
        let (_, b_index) = gi_volume(dir.path(), "b", 4, 200);
        let ctx = Arc::new(
            SeqDbContext::builder()
                .with_id_indices(
                    MemoryIdIndexSource::new()
                        .with_volume("a", a_index)
                        .with_volume("b", b_index),
                )
                .build(),
        );
        let names = format!("{} {}", name(&dir.path().join("a")), name(&dir.path().join("b")));
        let db = SeqDb::open(&names, Some(SeqType::Protein), &OpenOptions::new(), ctx).unwrap();

        assert_eq!(db.num_oids(), 7);
        assert_eq!(db.num_seqs(), 7);
        assert_eq!(db.title(), "a; b");
        assert_eq!(db.volume_names(), vec!["a", "b"]);
        assert!(!db.is_filtered());

        let (volume, local) = db.locate(4).unwrap();
        assert_eq!((volume.name(), local), ("b", 1));
        assert!(db.locate(7).unwrap_err().is_corruption());

        assert_eq!(db.seq_length(4).unwrap(), 2);
        assert_eq!(db.gi_to_oid(201).unwrap(), Some(4));
        assert_eq!(db.gi_to_oid(102).unwrap(), Some(2));
        assert_eq!(db.gi_to_oid(999).unwrap(), None);
        assert_eq!(db.oid_to_gis(4).unwrap(), vec![201]);

        let record = db.build_record(5, &RecordOptions::new().with_title()).unwrap();
        assert_eq!(record.oid(), 5);
        assert_eq!(record.gi(), Some(202));
        assert_eq!(record.title(), Some("protein 2"));
    }

    #[test]
    fn test_alias_title_override() {
        let dir = tempfile::tempdir().unwrap();
        VolumeBuilder::protein("vol")
            .push_proteins(2, 1)
            .write(dir.path(), "vol")
            .unwrap();
        write_alias(dir.path(), "child", SeqType::Protein, &["DBLIST vol", "TITLE B"]);
        write_alias(dir.path(), "parent", SeqType::Protein, &["DBLIST child"]);
        write_alias(
            dir.path(),
            "titled",
            SeqType::Protein,
            &["DBLIST child", "TITLE A", "NSEQ 42"],
        );

        let open = |alias: &str| {
            SeqDb::open(
                name(&dir.path().join(alias)),
                Some(SeqType::Protein),
                &OpenOptions::new(),
                ctx(),
            )
            .unwrap()
        };
        assert_eq!(open("parent").title(), "B");
        let titled = open("titled");
        assert_eq!(titled.title(), "A");
        assert_eq!(titled.num_seqs(), 42);
        assert_eq!(titled.num_oids(), 2);
    }

    #[test]
    fn test_recursive_alias_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_alias(dir.path(), "x", SeqType::Nucleotide, &["DBLIST y"]);
        write_alias(dir.path(), "y", SeqType::Nucleotide, &["DBLIST x"]);
        let err = SeqDb::open(
            name(&dir.path().join("x")),
            Some(SeqType::Nucleotide),
            &OpenOptions::new(),
            ctx(),
        )
        .unwrap_err();
        assert!(err.is_recursive_alias());
    }

    #[test]
    fn test_filter_on_multi_volume_alias_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        gi_volume(dir.path(), "a", 2, 1);
        gi_volume(dir.path(), "b", 2, 10);
        write_alias(
            dir.path(),
            "both",
            SeqType::Protein,
            &["DBLIST a b", "OIDLIST both.msk"],
        );
        let err = SeqDb::open(
            name(&dir.path().join("both")),
            Some(SeqType::Protein),
            &OpenOptions::new(),
            ctx(),
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_probe_sequence_type() {
        let dir = tempfile::tempdir().unwrap();
        let base = VolumeBuilder::nucleotide("nt")
            .push_nucleotide(b"ACGTA", &[], "gi|5\tfive")
            .write(dir.path(), "nt")
            .unwrap();
        let db = SeqDb::open(name(&base), None, &OpenOptions::new().mmap(false), ctx()).unwrap();
        assert_eq!(db.seq_type(), SeqType::Nucleotide);
        assert_eq!(db.sequence_ascii(0).unwrap(), b"ACGTA".to_vec());
        assert_eq!(db.date(), "Jan 1, 2024  12:00 AM");

        let missing = SeqDb::open(
            name(&dir.path().join("nothing")),
            None,
            &OpenOptions::new(),
            ctx(),
        )
        .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[test]
    fn test_masked_volumes_union() {
        let dir = tempfile::tempdir().unwrap();
        let (_, index) = gi_volume(dir.path(), "p", 12, 1000);
        write_oid_mask(&dir.path().join("p.msk"), 12, &[0, 11]);
        write_binary_gi_list(&dir.path().join("p.gil"), &[1005]);
        write_alias(dir.path(), "bits", SeqType::Protein, &["DBLIST p", "OIDLIST p.msk"]);
        write_alias(dir.path(), "gis", SeqType::Protein, &["DBLIST p", "GILIST p.gil"]);
        write_alias(dir.path(), "tail", SeqType::Protein, &["DBLIST p", "FIRST_OID 9"]);
        let ctx = Arc::new(
            SeqDbContext::builder()
                .with_id_indices(MemoryIdIndexSource::new().with_volume("p", index))
                .build(),
        );
        let names = ["bits", "gis", "tail"]
            .map(|alias| name(&dir.path().join(alias)).to_string())
            .join(" ");
        let db = SeqDb::open(&names, Some(SeqType::Protein), &OpenOptions::new(), ctx).unwrap();
        assert_eq!(db.volumes().len(), 1);
        assert_eq!(db.iter_oids().collect::<Vec<_>>(), vec![0, 5, 8, 9, 10, 11]);

        // an unfiltered reference to the same volume includes everything
        let names = format!("{names} {}", name(&dir.path().join("p")));
        let db = SeqDb::open(&names, Some(SeqType::Protein), &OpenOptions::new(), self::ctx())
            .unwrap();
        assert_eq!(db.iter_oids().count(), 12);
        assert!(!db.is_filtered());
    }

    #[test]
    fn test_volume_reached_through_parent_dir_opened_once() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        gi_volume(dir.path(), "p", 5, 1);
        write_alias(&sub, "x", SeqType::Protein, &["DBLIST ../p"]);
        write_alias(dir.path(), "both", SeqType::Protein, &["DBLIST sub/x p"]);
        let db = SeqDb::open(
            name(&dir.path().join("both")),
            Some(SeqType::Protein),
            &OpenOptions::new(),
            ctx(),
        )
        .unwrap();
        assert_eq!(db.volumes().len(), 1);
        assert_eq!(db.num_oids(), 5);
        assert!(!db.is_filtered());

        // masks reached through either path land on the same volume
        write_alias(&sub, "tail", SeqType::Protein, &["DBLIST ../p", "FIRST_OID 4"]);
        write_alias(dir.path(), "head", SeqType::Protein, &["DBLIST p", "LAST_OID 1"]);
        let names = format!(
            "{} {}",
            name(&sub.join("tail")),
            name(&dir.path().join("head"))
        );
        let db = SeqDb::open(&names, Some(SeqType::Protein), &OpenOptions::new(), ctx()).unwrap();
        assert_eq!(db.volumes().len(), 1);
        assert_eq!(db.iter_oids().collect::<Vec<_>>(), vec![0, 3, 4]);
    }

    #[test]
    fn test_user_lists_intersect_alias_filter() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut index) = gi_volume(dir.path(), "p", 8, 50);
        index.insert_accession("NP_7.1", 7);
        write_alias(dir.path(), "half", SeqType::Protein, &["DBLIST p", "FIRST_OID 3"]);
        let ctx = Arc::new(
            SeqDbContext::builder()
                .with_id_indices(MemoryIdIndexSource::new().with_volume("p", index))
                .build(),
        );
        let options = OpenOptions::new()
            .gi_list(vec![50, 53, 54, 99])
            .seqid_list(["NP_7"]);
        let db = SeqDb::open(
            name(&dir.path().join("half")),
            Some(SeqType::Protein),
            &options,
            ctx,
        )
        .unwrap();
        // alias keeps 2..8; the lists keep 0, 3, 4 and 7
        assert_eq!(db.iter_oids().collect::<Vec<_>>(), vec![3, 4, 7]);
        assert_eq!(db.accession_to_oids("NP_7").unwrap(), vec![7]);
    }

    #[test]
    fn test_negative_gi_list() {
        let dir = tempfile::tempdir().unwrap();
        let base = VolumeBuilder::protein("neg")
            .push_protein(&[1, 2], "gi|1\tone")
            .push_protein(&[1, 2], "gi|2\ttwo\ngi|3\talso two")
            .push_protein(&[1, 2], "gi|4\tfour\ngi|5\tfive")
            .push_protein(&[1, 2], "lcl|x\tno gi")
            .write(dir.path(), "neg")
            .unwrap();
        let options = OpenOptions::new()
            .negative_gi_list(vec![1, 2, 3, 4])
            .oid_range(0..4);
        let db = SeqDb::open(name(&base), Some(SeqType::Protein), &options, ctx()).unwrap();
        assert!(db.is_filtered());
        assert_eq!(db.iter_oids().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_membership_bit() {
        let dir = tempfile::tempdir().unwrap();
        VolumeBuilder::protein("memb")
            .push_protein(&[1], "gi|1\tplain\t\t1\ngi|2\tsubset\t9606\t2")
            .push_protein(&[1], "gi|3\tother\t\t1")
            .write(dir.path(), "memb")
            .unwrap();
        write_alias(dir.path(), "subset", SeqType::Protein, &["DBLIST memb", "MEMB_BIT 2"]);
        let db = SeqDb::open(
            name(&dir.path().join("subset")),
            Some(SeqType::Protein),
            &OpenOptions::new(),
            ctx(),
        )
        .unwrap();
        assert_eq!(db.membership_bit(), Some(2));
        assert_eq!(db.deflines(0).unwrap().gis(), vec![2]);
        assert_eq!(db.taxids(0).unwrap(), vec![9606]);
        // no defline carries the bit
        assert_eq!(db.deflines(1).unwrap().gis(), vec![3]);
        assert_eq!(db.oid_to_gis(0).unwrap(), vec![1, 2]);

        let record = db.build_record(0, &RecordOptions::new().with_title()).unwrap();
        assert_eq!(record.title(), Some("subset"));
    }

    #[test]
    fn test_oid_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let (base, _) = gi_volume(dir.path(), "c", 10, 1);
        let db = SeqDb::open(
            name(&base),
            Some(SeqType::Protein),
            &OpenOptions::new().oid_range(2..20),
            ctx(),
        )
        .unwrap();
        assert_eq!(db.oid_window(), 2..10);
        assert_eq!(db.next_oid_chunk(3), Some(2..5));
        assert_eq!(db.next_oid_chunk(3), Some(5..8));
        assert_eq!(db.next_oid_chunk(3), Some(8..10));
        assert_eq!(db.next_oid_chunk(3), None);
        db.reset_oid_chunks();
        assert_eq!(db.next_oid_chunk(100), Some(2..10));

        db.reset_oid_chunks();
        assert_eq!(db.next_oid_chunk(usize::MAX), Some(2..10));
        assert_eq!(db.next_oid_chunk(usize::MAX), None);
        assert_eq!(db.next_oid_chunk(usize::MAX), None);
    }

    #[test]
    fn test_empty_volume_in_list() {
        let dir = tempfile::tempdir().unwrap();
        VolumeBuilder::protein("empty")
            .write(dir.path(), "empty")
            .unwrap();
        gi_volume(dir.path(), "full", 2, 1);
        let names = format!(
            "{} {}",
            name(&dir.path().join("empty")),
            name(&dir.path().join("full"))
        );
        let db = SeqDb::open(&names, Some(SeqType::Protein), &OpenOptions::new(), ctx()).unwrap();
        assert_eq!(db.num_oids(), 2);
        let (volume, local) = db.locate(0).unwrap();
        assert_eq!((volume.name(), local), ("full", 0));
        assert_eq!(db.iter_oids().collect::<Vec<_>>(), vec![0, 1]);
    }
}
