//! Alias files and the tree they form
//!
//! An alias file (`.pal` / `.nal`) is a small text file of `KEY VALUE` lines.
//! `DBLIST` names volumes or further alias files; the remaining recognized keys
//! override aggregate metadata or restrict which OIDs of a volume are visible.
//!
//! ```text
//! # comment
//! TITLE    Swissprot subset
//! DBLIST   swissprot "other db"
//! NSEQ     1234
//! OIDLIST  subset.msk
//! ```
//!
//! The user's own list of database names is parsed into a synthetic root node,
//! so a plain volume and an alias file are opened the same way.

use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut, Range};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{AliasError, Error, Result};
use crate::file::{with_extension, FileKind, SeqType};
use crate::filter::{MaskPlan, VolumeMask};

pub const DBLIST: &str = "DBLIST";
pub const TITLE: &str = "TITLE";
pub const NSEQ: &str = "NSEQ";
pub const LENGTH: &str = "LENGTH";
pub const MAX_SEQ_LENGTH: &str = "MAX_SEQ_LENGTH";
pub const MEMB_BIT: &str = "MEMB_BIT";
pub const OIDLIST: &str = "OIDLIST";
pub const GILIST: &str = "GILIST";
pub const FIRST_OID: &str = "FIRST_OID";
pub const LAST_OID: &str = "LAST_OID";

/// Keys stored from an alias file; anything else is ignored
pub const RECOGNIZED_KEYS: [&str; 10] = [
    DBLIST,
    TITLE,
    NSEQ,
    LENGTH,
    MAX_SEQ_LENGTH,
    MEMB_BIT,
    OIDLIST,
    GILIST,
    FIRST_OID,
    LAST_OID,
];

/// Keys that restrict OIDs and so must apply to exactly one volume
const FILTER_KEYS: [&str; 4] = [OIDLIST, GILIST, FIRST_OID, LAST_OID];

/// Splits a `DBLIST` value on whitespace, keeping double-quoted names whole
#[must_use]
pub fn tokenize_names(value: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    names.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        names.push(current);
    }
    names
}

/// Parses alias text into its recognized key/value pairs
pub fn parse_alias_text(text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.replace('\t', " ");
        let (key, value) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        if RECOGNIZED_KEYS.contains(&key) {
            values.insert(key.to_string(), value.trim().to_string());
        } else {
            trace!(key, "ignoring unrecognized alias key");
        }
    }
    values
}

/// Paths of the alias files currently being expanded.
///
/// Entering a file returns an [`AliasFrame`] guard that pops the file again when
/// dropped, so the stack unwinds on every return path including errors.
#[derive(Debug, Default)]
pub struct AliasStack {
    frames: Vec<PathBuf>,
}
impl AliasStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes `path`, failing if it is already being expanded
    pub fn enter(&mut self, path: &Path) -> Result<AliasFrame<'_>> {
        let canonical = path
            .canonicalize()
            .map_err(|e| Error::from(e).in_file(path))?;
        if self.frames.contains(&canonical) {
            return Err(AliasError::Recursive {
                path: canonical,
                chain: self.frames.clone(),
            }
            .into());
        }
        self.frames.push(canonical);
        Ok(AliasFrame { stack: self })
    }
}

/// Scope guard for one entry of an [`AliasStack`]
#[derive(Debug)]
pub struct AliasFrame<'a> {
    stack: &'a mut AliasStack,
}
impl Deref for AliasFrame<'_> {
    type Target = AliasStack;
    fn deref(&self) -> &AliasStack {
        self.stack
    }
}
impl DerefMut for AliasFrame<'_> {
    fn deref_mut(&mut self) -> &mut AliasStack {
        self.stack
    }
}
impl Drop for AliasFrame<'_> {
    fn drop(&mut self) {
        self.stack.frames.pop();
    }
}

/// A `DBLIST` entry after resolution
#[derive(Debug, Clone)]
pub enum AliasEntry {
    /// Base path of a volume (`<base>.pin` etc.)
    Volume(PathBuf),
    /// A nested alias file
    Alias(AliasNode),
}

/// One alias file, or the root built from the user's name list
#[derive(Debug, Clone)]
pub struct AliasNode {
    path: Option<PathBuf>,
    dir: PathBuf,
    db_list: Vec<String>,
    values: HashMap<String, String>,
    entries: Vec<AliasEntry>,
}
impl AliasNode {
    /// Reads and parses an alias file without resolving its entries
    pub fn parse_self(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(path.to_path_buf())
            } else {
                Error::from(e).in_file(path)
            }
        })?;
        let mut values = parse_alias_text(&text);
        let Some(db_list) = values.remove(DBLIST) else {
            return Err(AliasError::MissingDbList(path.to_path_buf()).into());
        };
        let db_list = tokenize_names(&db_list);
        debug!(path = %path.display(), entries = db_list.len(), "parsed alias file");
        Ok(Self {
            path: Some(path.to_path_buf()),
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            db_list,
            values,
            entries: Vec::new(),
        })
    }

    /// Parses `path` and everything it references
    pub fn load(path: &Path, seq_type: SeqType, stack: &mut AliasStack) -> Result<Self> {
        let mut frame = stack.enter(path)?;
        let mut node = Self::parse_self(path)?;
        node.resolve_children(seq_type, &mut frame)
            .map_err(|e| e.in_file(path))?;
        Ok(node)
    }

    /// The alias file path; `None` for the root
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn db_list(&self) -> &[String] {
        &self.db_list
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    /// Base path shared by this alias file and a same-named volume
    fn own_base(&self) -> Option<PathBuf> {
        self.path
            .as_ref()
            .map(|p| normalize_base(&p.with_extension("")))
    }

    /// Turns each `DBLIST` name into a volume or a recursively loaded alias.
    ///
    /// A name equal to this file's own base name is its volume, not a self-reference.
    pub fn resolve_children(&mut self, seq_type: SeqType, stack: &mut AliasStack) -> Result<()> {
        let own_base = self.own_base();
        let mut entries = Vec::with_capacity(self.db_list.len());
        for name in &self.db_list {
            let candidate = normalize_base(&self.dir.join(name));
            if own_base.as_ref() == Some(&candidate) {
                entries.push(AliasEntry::Volume(candidate));
                continue;
            }
            let alias = with_extension(&candidate, FileKind::Alias, seq_type);
            if alias.is_file() {
                entries.push(AliasEntry::Alias(Self::load(&alias, seq_type, stack)?));
            } else {
                entries.push(AliasEntry::Volume(candidate));
            }
        }
        self.entries = entries;
        Ok(())
    }

    fn volume_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, AliasEntry::Volume(_)))
            .count()
    }

    fn parse_number<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.value(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| {
                AliasError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }
                .into()
            }),
        }
    }

    /// 0-based half-open OID range from 1-based inclusive FIRST_OID / LAST_OID
    fn oid_range(&self) -> Result<Range<usize>> {
        let first = self.parse_number::<usize>(FIRST_OID)?.unwrap_or(1);
        let last = self.parse_number::<usize>(LAST_OID)?.unwrap_or(usize::MAX);
        if first == 0 || first > last {
            return Err(AliasError::InvalidValue {
                key: format!("{FIRST_OID}/{LAST_OID}"),
                value: format!("{first}..={last}"),
            }
            .into());
        }
        Ok(first - 1..last)
    }

    /// Records the filters of this subtree into `plan`
    pub fn set_masks(&self, plan: &mut MaskPlan) -> Result<()> {
        let Some(key) = FILTER_KEYS.into_iter().find(|k| self.values.contains_key(*k)) else {
            for entry in &self.entries {
                match entry {
                    AliasEntry::Volume(volume) => plan.include_all(volume),
                    AliasEntry::Alias(child) => child.set_masks(plan)?,
                }
            }
            return Ok(());
        };

        let path = self.path.clone().unwrap_or_default();
        let volume = match self.entries.as_slice() {
            [AliasEntry::Volume(volume)] => volume,
            _ => {
                return Err(AliasError::AmbiguousFilter {
                    path,
                    key,
                    volumes: self.volume_count(),
                }
                .into())
            }
        };
        let range = self.oid_range().map_err(|e| e.in_file(&path))?;
        let mut listed = false;
        if let Some(list) = self.value(OIDLIST) {
            plan.add_mask(
                volume,
                VolumeMask::OidList {
                    path: self.dir.join(list),
                    range: range.clone(),
                },
            );
            listed = true;
        }
        if let Some(list) = self.value(GILIST) {
            plan.add_mask(
                volume,
                VolumeMask::GiList {
                    path: self.dir.join(list),
                    range: range.clone(),
                },
            );
            listed = true;
        }
        if !listed {
            plan.add_mask(volume, VolumeMask::Range(range));
        }
        Ok(())
    }

    /// Resolves `key` over this subtree.
    ///
    /// A value present on this node is used verbatim. Otherwise the results of
    /// child aliases and owned volumes are combined in `DBLIST` order.
    pub fn walk_aggregate<T, P, V, C>(
        &self,
        key: &str,
        parse: &P,
        volume: &V,
        combine: &C,
    ) -> Result<Option<T>>
    where
        P: Fn(&str) -> Result<T>,
        V: Fn(&Path) -> Option<T>,
        C: Fn(T, T) -> T,
    {
        if let Some(value) = self.value(key) {
            return parse(value).map(Some);
        }
        let mut acc: Option<T> = None;
        for entry in &self.entries {
            let item = match entry {
                AliasEntry::Volume(path) => volume(path),
                AliasEntry::Alias(child) => child.walk_aggregate(key, parse, volume, combine)?,
            };
            if let Some(item) = item {
                acc = Some(match acc {
                    Some(prev) => combine(prev, item),
                    None => item,
                });
            }
        }
        Ok(acc)
    }

    fn collect_volumes(&self, seen: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>) {
        for entry in &self.entries {
            match entry {
                AliasEntry::Volume(path) => {
                    if seen.insert(path.clone()) {
                        out.push(path.clone());
                    }
                }
                AliasEntry::Alias(child) => child.collect_volumes(seen, out),
            }
        }
    }
}

/// Native metadata of one volume, as read from its index file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSummary {
    pub title: String,
    pub num_seqs: u64,
    pub total_length: u64,
    pub max_length: u64,
}

/// Metadata aggregated over the alias tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasSummary {
    pub title: String,
    pub num_seqs: u64,
    pub total_length: u64,
    pub max_length: u64,
    pub membership_bit: Option<u32>,
}

/// The resolved alias tree of one database
#[derive(Debug, Clone)]
pub struct AliasTree {
    root: AliasNode,
    seq_type: SeqType,
}
impl AliasTree {
    /// Builds the tree for a whitespace-separated list of database names.
    ///
    /// Each name is looked up relative to the working directory and then in each
    /// `search_path` directory, as an alias file or a volume.
    pub fn build(names: &str, seq_type: SeqType, search_path: &[PathBuf]) -> Result<Self> {
        let names = tokenize_names(names);
        if names.is_empty() {
            return Err(AliasError::EmptyNameList.into());
        }
        let resolved = names
            .iter()
            .map(|name| resolve_name(name, seq_type, search_path))
            .collect::<Result<Vec<_>>>()?;
        let dir = common_dir(&resolved);
        let db_list = resolved
            .iter()
            .map(|path| {
                path.strip_prefix(&dir)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        debug!(base = %dir.display(), ?names, %seq_type, "resolving database names");

        let mut root = AliasNode {
            path: None,
            dir,
            db_list,
            values: HashMap::new(),
            entries: Vec::new(),
        };
        root.resolve_children(seq_type, &mut AliasStack::new())?;
        Ok(Self { root, seq_type })
    }

    #[must_use]
    pub fn root(&self) -> &AliasNode {
        &self.root
    }

    #[must_use]
    pub fn seq_type(&self) -> SeqType {
        self.seq_type
    }

    /// Directory all root names were made relative to
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.root.dir
    }

    /// All distinct volumes, in depth-first `DBLIST` order
    #[must_use]
    pub fn volumes(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        self.root.collect_volumes(&mut HashSet::new(), &mut out);
        out
    }

    /// Collects the per-volume filters of the whole tree
    pub fn set_masks(&self) -> Result<MaskPlan> {
        let mut plan = MaskPlan::new();
        self.root.set_masks(&mut plan)?;
        Ok(plan)
    }

    /// Aggregates metadata, using `volume` for volumes' native values
    pub fn summary<F>(&self, volume: F) -> Result<AliasSummary>
    where
        F: Fn(&Path) -> Option<VolumeSummary>,
    {
        let root = &self.root;
        let parse_u64 = |key: &'static str| {
            move |value: &str| {
                value.trim().parse::<u64>().map_err(|_| {
                    Error::from(AliasError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                })
            }
        };

        let title = root.walk_aggregate(
            TITLE,
            &|value: &str| Ok(value.to_string()),
            &|path: &Path| volume(path).map(|v| v.title),
            &|a: String, b: String| format!("{a}; {b}"),
        )?;
        let num_seqs = root.walk_aggregate(
            NSEQ,
            &parse_u64(NSEQ),
            &|path: &Path| volume(path).map(|v| v.num_seqs),
            &u64::saturating_add,
        )?;
        let total_length = root.walk_aggregate(
            LENGTH,
            &parse_u64(LENGTH),
            &|path: &Path| volume(path).map(|v| v.total_length),
            &u64::saturating_add,
        )?;
        let max_length = root.walk_aggregate(
            MAX_SEQ_LENGTH,
            &parse_u64(MAX_SEQ_LENGTH),
            &|path: &Path| volume(path).map(|v| v.max_length),
            &|a: u64, b: u64| a.max(b),
        )?;
        let membership_bit = root.walk_aggregate(
            MEMB_BIT,
            &|value: &str| {
                value.trim().parse::<u32>().map_err(|_| {
                    Error::from(AliasError::InvalidValue {
                        key: MEMB_BIT.to_string(),
                        value: value.to_string(),
                    })
                })
            },
            &|_: &Path| None,
            &|_, last| last,
        )?;

        Ok(AliasSummary {
            title: title.unwrap_or_default(),
            num_seqs: num_seqs.unwrap_or_default(),
            total_length: total_length.unwrap_or_default(),
            max_length: max_length.unwrap_or_default(),
            membership_bit: membership_bit.filter(|&bit| bit != 0),
        })
    }
}

fn exists_as_db(candidate: &Path, seq_type: SeqType) -> bool {
    [FileKind::Alias, FileKind::Index]
        .into_iter()
        .any(|kind| with_extension(candidate, kind, seq_type).is_file())
}

/// Canonical form of a volume base path.
///
/// The base itself has no extension and is not a file, so only its directory is
/// canonicalized. A directory that cannot be resolved leaves the path as given.
fn normalize_base(base: &Path) -> PathBuf {
    let (Some(parent), Some(file_name)) = (base.parent(), base.file_name()) else {
        return base.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    match parent.canonicalize() {
        Ok(dir) => dir.join(file_name),
        Err(_) => base.to_path_buf(),
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Finds the base path of a user-supplied database name
fn resolve_name(name: &str, seq_type: SeqType, search_path: &[PathBuf]) -> Result<PathBuf> {
    let direct = PathBuf::from(name);
    if exists_as_db(&direct, seq_type) {
        return absolute(direct);
    }
    if direct.is_relative() {
        for dir in search_path {
            let candidate = dir.join(name);
            if exists_as_db(&candidate, seq_type) {
                return absolute(candidate);
            }
        }
    }
    Err(AliasError::UnresolvedName(name.to_string()).into())
}

/// Longest directory prefix shared by the parents of `paths`
fn common_dir(paths: &[PathBuf]) -> PathBuf {
    let mut iter = paths.iter().filter_map(|p| p.parent());
    let Some(first) = iter.next() else {
        return PathBuf::new();
    };
    let mut prefix: Vec<Component<'_>> = first.components().collect();
    for parent in iter {
        let shared = prefix
            .iter()
            .zip(parent.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
    }
    prefix.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_alias, VolumeBuilder};

    fn summary_of(tree: &AliasTree) -> AliasSummary {
        tree.summary(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some(VolumeSummary {
                title: format!("vol {name}"),
                num_seqs: 10,
                total_length: 100,
                max_length: name.len() as u64,
            })
        })
        .unwrap()
    }

    fn protein_volume(dir: &Path, name: &str) -> PathBuf {
        VolumeBuilder::protein(name)
            .push_proteins(3, 1)
            .write(dir, name)
            .unwrap()
    }

    #[test]
    fn test_tokenize_names() {
        assert_eq!(
            tokenize_names(r#"nr  "my db"	swissprot"#),
            vec!["nr", "my db", "swissprot"]
        );
        assert!(tokenize_names("   ").is_empty());
    }

    #[test]
    fn test_parse_alias_text() {
        let values = parse_alias_text(
            "# header comment\nTITLE\tMy\tdatabase\n\nDBLIST a b\nUNKNOWN x\nNSEQ 12\n",
        );
        assert_eq!(values.get(TITLE).map(String::as_str), Some("My database"));
        assert_eq!(values.get(DBLIST).map(String::as_str), Some("a b"));
        assert_eq!(values.get(NSEQ).map(String::as_str), Some("12"));
        assert!(!values.contains_key("UNKNOWN"));
    }

    #[test]
    fn test_missing_dblist() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_alias(dir.path(), "bad", SeqType::Protein, &["TITLE nothing"]);
        let err = AliasNode::parse_self(&path).unwrap_err();
        assert!(matches!(
            err.root(),
            Error::AliasError(AliasError::MissingDbList(_))
        ));
    }

    #[test]
    fn test_title_override() {
        let dir = tempfile::tempdir().unwrap();
        protein_volume(dir.path(), "v1");
        write_alias(dir.path(), "child", SeqType::Protein, &["TITLE B", "DBLIST v1"]);
        write_alias(dir.path(), "parent", SeqType::Protein, &["DBLIST child"]);
        let root = dir.path().join("parent");
        let tree = AliasTree::build(&root.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        assert_eq!(summary_of(&tree).title, "B");

        write_alias(
            dir.path(),
            "parent",
            SeqType::Protein,
            &["TITLE A", "DBLIST child"],
        );
        let tree = AliasTree::build(&root.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        assert_eq!(summary_of(&tree).title, "A");
    }

    #[test]
    fn test_aggregates_combine_children() {
        let dir = tempfile::tempdir().unwrap();
        protein_volume(dir.path(), "a");
        protein_volume(dir.path(), "bbb");
        write_alias(
            dir.path(),
            "sub",
            SeqType::Protein,
            &["DBLIST bbb", "NSEQ 4", "MEMB_BIT 2"],
        );
        write_alias(dir.path(), "top", SeqType::Protein, &["DBLIST a sub a"]);
        let top = dir.path().join("top");
        let tree = AliasTree::build(&top.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        let summary = summary_of(&tree);
        assert_eq!(summary.title, "vol a; vol bbb; vol a");
        assert_eq!(summary.num_seqs, 10 + 4 + 10);
        assert_eq!(summary.total_length, 300);
        assert_eq!(summary.max_length, 3);
        assert_eq!(summary.membership_bit, Some(2));
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(tree.volumes(), vec![root.join("a"), root.join("bbb")]);
    }

    #[test]
    fn test_recursive_alias_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_alias(dir.path(), "loop_a", SeqType::Nucleotide, &["DBLIST loop_b"]);
        write_alias(dir.path(), "loop_b", SeqType::Nucleotide, &["DBLIST loop_a"]);
        let name = dir.path().join("loop_a");
        let err = AliasTree::build(&name.to_string_lossy(), SeqType::Nucleotide, &[]).unwrap_err();
        assert!(err.is_recursive_alias());
        assert!(err.to_string().contains("loop_"));
    }

    #[test]
    fn test_self_named_volume_is_not_recursion() {
        let dir = tempfile::tempdir().unwrap();
        protein_volume(dir.path(), "same");
        write_alias(dir.path(), "same", SeqType::Protein, &["DBLIST same", "NSEQ 2"]);
        let name = dir.path().join("same");
        let tree = AliasTree::build(&name.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        assert_eq!(
            tree.volumes(),
            vec![dir.path().canonicalize().unwrap().join("same")]
        );
        assert_eq!(summary_of(&tree).num_seqs, 2);
    }

    #[test]
    fn test_stack_guard_pops_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_alias(dir.path(), "a", SeqType::Protein, &["DBLIST x"]);
        let mut stack = AliasStack::new();
        {
            let mut frame = stack.enter(&a).unwrap();
            assert_eq!(frame.depth(), 1);
            assert!(frame.enter(&a).unwrap_err().is_recursive_alias());
            assert_eq!(frame.depth(), 1);
        }
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_first_last_oid_masks() {
        let dir = tempfile::tempdir().unwrap();
        protein_volume(dir.path(), "v");
        write_alias(
            dir.path(),
            "window",
            SeqType::Protein,
            &["DBLIST v", "FIRST_OID 2", "LAST_OID 5"],
        );
        write_alias(dir.path(), "tail", SeqType::Protein, &["DBLIST v", "FIRST_OID 3"]);
        let names = format!(
            "{} {}",
            dir.path().join("window").display(),
            dir.path().join("tail").display()
        );
        let tree = AliasTree::build(&names, SeqType::Protein, &[]).unwrap();
        let plan = tree.set_masks().unwrap();
        let v = dir.path().canonicalize().unwrap().join("v");
        let entry = plan.entry(&v).unwrap();
        assert_eq!(
            entry.masks(),
            &[VolumeMask::Range(1..5), VolumeMask::Range(2..usize::MAX)]
        );
        assert_eq!(tree.volumes().len(), 1);
    }

    #[test]
    fn test_list_keys_resolve_relative_to_alias() {
        let dir = tempfile::tempdir().unwrap();
        protein_volume(dir.path(), "v");
        write_alias(
            dir.path(),
            "masked",
            SeqType::Protein,
            &["DBLIST v", "OIDLIST v.msk", "GILIST v.gil", "LAST_OID 2"],
        );
        let name = dir.path().join("masked");
        let tree = AliasTree::build(&name.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        let plan = tree.set_masks().unwrap();
        let v = dir.path().canonicalize().unwrap().join("v");
        let masks = plan.entry(&v).unwrap().masks().to_vec();
        assert_eq!(
            masks,
            vec![
                VolumeMask::OidList {
                    path: dir.path().join("v.msk"),
                    range: 0..2
                },
                VolumeMask::GiList {
                    path: dir.path().join("v.gil"),
                    range: 0..2
                },
            ]
        );
    }

    #[test]
    fn test_filter_on_multiple_volumes_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        protein_volume(dir.path(), "v1");
        protein_volume(dir.path(), "v2");
        write_alias(
            dir.path(),
            "both",
            SeqType::Protein,
            &["DBLIST v1 v2", "OIDLIST both.msk"],
        );
        let name = dir.path().join("both");
        let tree = AliasTree::build(&name.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        let err = tree.set_masks().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("OIDLIST"));
    }

    #[test]
    fn test_invalid_oid_window() {
        let dir = tempfile::tempdir().unwrap();
        protein_volume(dir.path(), "v");
        write_alias(
            dir.path(),
            "bad",
            SeqType::Protein,
            &["DBLIST v", "FIRST_OID 0"],
        );
        let name = dir.path().join("bad");
        let tree = AliasTree::build(&name.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        assert!(tree.set_masks().is_err());
    }

    #[test]
    fn test_search_path_and_common_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sub_a = dir.path().join("a");
        let sub_b = dir.path().join("b");
        std::fs::create_dir_all(&sub_a).unwrap();
        std::fs::create_dir_all(&sub_b).unwrap();
        protein_volume(&sub_a, "one");
        protein_volume(&sub_b, "two");

        let names = format!("{} two", sub_a.join("one").display());
        let tree = AliasTree::build(&names, SeqType::Protein, &[sub_b.clone()]).unwrap();
        assert_eq!(tree.base_dir(), dir.path());
        assert_eq!(tree.root().db_list(), &["a/one".to_string(), "b/two".to_string()]);
        assert_eq!(
            tree.volumes(),
            vec![
                sub_a.canonicalize().unwrap().join("one"),
                sub_b.canonicalize().unwrap().join("two"),
            ]
        );

        let err = AliasTree::build("missing_db", SeqType::Protein, &[sub_b]).unwrap_err();
        assert!(err.is_not_found());
        assert!(AliasTree::build("  ", SeqType::Protein, &[]).is_err());
    }

    #[test]
    fn test_parent_dir_entry_is_same_volume() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        protein_volume(dir.path(), "p");
        write_alias(&sub, "x", SeqType::Protein, &["DBLIST ../p", "FIRST_OID 2"]);
        write_alias(dir.path(), "both", SeqType::Protein, &["DBLIST sub/x p"]);
        let name = dir.path().join("both");
        let tree = AliasTree::build(&name.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        let p = dir.path().canonicalize().unwrap().join("p");
        assert_eq!(tree.volumes(), vec![p.clone()]);
        let plan = tree.set_masks().unwrap();
        assert!(plan.entry(&p).is_some());
        assert!(plan.is_unfiltered());
    }

    #[test]
    fn test_oversized_counts_saturate() {
        let dir = tempfile::tempdir().unwrap();
        protein_volume(dir.path(), "v");
        let huge = format!("NSEQ {}", u64::MAX);
        let long = format!("LENGTH {}", u64::MAX - 1);
        write_alias(dir.path(), "h1", SeqType::Protein, &["DBLIST v", &huge, &long]);
        write_alias(dir.path(), "h2", SeqType::Protein, &["DBLIST v", &huge, &long]);
        write_alias(dir.path(), "top", SeqType::Protein, &["DBLIST h1 h2"]);
        let name = dir.path().join("top");
        let tree = AliasTree::build(&name.to_string_lossy(), SeqType::Protein, &[]).unwrap();
        let summary = summary_of(&tree);
        assert_eq!(summary.num_seqs, u64::MAX);
        assert_eq!(summary.total_length, u64::MAX);
    }
}
