//! Writers for synthetic databases used by the unit tests

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, WriteBytesExt};

use crate::ambig::{encode_runs, AmbiguityLayout, AmbiguityRun};
use crate::file::{with_extension, FileKind, SeqType, FORMAT_VERSION};

/// Packs ACGT text into the on-disk 2-bit layout (other letters pack as A)
pub fn pack_na2(seq: &[u8]) -> Vec<u8> {
    let code = |b: u8| match b {
        b'C' | b'c' => 1u8,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => 0,
    };
    let mut out = Vec::with_capacity(seq.len() / 4 + 1);
    let mut chunks = seq.chunks_exact(4);
    for chunk in &mut chunks {
        out.push(chunk.iter().fold(0u8, |acc, &b| (acc << 2) | code(b)));
    }
    let rem = chunks.remainder();
    let mut last = 0u8;
    for (i, &b) in rem.iter().enumerate() {
        last |= code(b) << (6 - 2 * i);
    }
    out.push(last | rem.len() as u8);
    out
}

struct Entry {
    residues: Vec<u8>,
    runs: Vec<AmbiguityRun>,
    header: Vec<u8>,
}

/// Builds the three files of a volume in memory and writes them out
pub struct VolumeBuilder {
    seq_type: SeqType,
    title: String,
    date: String,
    version: u32,
    layout: AmbiguityLayout,
    entries: Vec<Entry>,
}
impl VolumeBuilder {
    pub fn protein(title: &str) -> Self {
        Self::new(SeqType::Protein, title)
    }

    pub fn nucleotide(title: &str) -> Self {
        Self::new(SeqType::Nucleotide, title)
    }

    fn new(seq_type: SeqType, title: &str) -> Self {
        Self {
            seq_type,
            title: title.to_string(),
            date: "Jan 1, 2024  12:00 AM".to_string(),
            version: FORMAT_VERSION,
            layout: AmbiguityLayout::Old,
            entries: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    pub fn new_ambiguity_layout(mut self) -> Self {
        self.layout = AmbiguityLayout::New;
        self
    }

    /// Adds a protein sequence given as NCBIstdaa codes
    pub fn push_protein(mut self, residues: &[u8], header: &str) -> Self {
        self.entries.push(Entry {
            residues: residues.to_vec(),
            runs: Vec::new(),
            header: header.as_bytes().to_vec(),
        });
        self
    }

    /// Adds a nucleotide sequence given as ACGT text with `(residue, position, length)` runs
    pub fn push_nucleotide(mut self, bases: &[u8], runs: &[(u8, u32, u32)], header: &str) -> Self {
        self.entries.push(Entry {
            residues: bases.to_vec(),
            runs: runs
                .iter()
                .map(|&(residue, position, length)| AmbiguityRun::new(residue, position, length))
                .collect(),
            header: header.as_bytes().to_vec(),
        });
        self
    }

    /// Adds `n` protein sequences of increasing length with GI-style headers starting at `first_gi`
    pub fn push_proteins(mut self, n: usize, first_gi: u64) -> Self {
        for i in 0..n {
            let residues: Vec<u8> = (0..=i).map(|j| (j % 20) as u8 + 1).collect();
            let header = format!("gi|{}\tprotein {i}", first_gi + i as u64);
            self = self.push_protein(&residues, &header);
        }
        self
    }

    /// Writes `<dir>/<name>.?in`, `.?sq` and `.?hr`; returns the base path `<dir>/<name>`
    pub fn write(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let base = dir.join(name);
        let n = self.entries.len();

        let mut seq = Vec::new();
        let mut hdr = Vec::new();
        let mut hdr_offsets = Vec::with_capacity(n + 1);
        let mut seq_offsets = Vec::with_capacity(n + 1);
        let mut amb_offsets = Vec::with_capacity(n + 1);
        let mut total_length = 0u64;
        let mut max_length = 0u32;

        if self.seq_type == SeqType::Protein && n > 0 {
            seq.push(0);
        }
        for entry in &self.entries {
            hdr_offsets.push(hdr.len() as u32);
            hdr.extend_from_slice(&entry.header);

            seq_offsets.push(seq.len() as u32);
            match self.seq_type {
                SeqType::Protein => {
                    seq.extend_from_slice(&entry.residues);
                    seq.push(0);
                    amb_offsets.push(seq.len() as u32);
                }
                SeqType::Nucleotide => {
                    seq.extend_from_slice(&pack_na2(&entry.residues));
                    amb_offsets.push(seq.len() as u32);
                    if !entry.runs.is_empty() {
                        let bytes = encode_runs(&entry.runs, self.layout)
                            .map_err(|e| io::Error::other(e.to_string()))?;
                        seq.extend_from_slice(&bytes);
                    }
                }
            }
            total_length += entry.residues.len() as u64;
            max_length = max_length.max(entry.residues.len() as u32);
        }
        hdr_offsets.push(hdr.len() as u32);
        seq_offsets.push(seq.len() as u32);
        amb_offsets.push(seq.len() as u32);

        let mut index = BufWriter::new(File::create(with_extension(
            &base,
            FileKind::Index,
            self.seq_type,
        ))?);
        index.write_u32::<BigEndian>(self.version)?;
        index.write_u32::<BigEndian>(self.seq_type.code())?;
        index.write_u32::<BigEndian>(self.title.len() as u32)?;
        index.write_all(self.title.as_bytes())?;
        index.write_u32::<BigEndian>(self.date.len() as u32)?;
        index.write_all(self.date.as_bytes())?;
        index.write_u32::<BigEndian>(n as u32)?;
        index.write_u64::<BigEndian>(total_length)?;
        index.write_u32::<BigEndian>(max_length)?;
        for table in [&hdr_offsets, &seq_offsets, &amb_offsets] {
            table
                .iter()
                .try_for_each(|&x| index.write_u32::<BigEndian>(x))?;
        }
        index.flush()?;

        if n > 0 {
            std::fs::write(with_extension(&base, FileKind::Sequence, self.seq_type), &seq)?;
            std::fs::write(with_extension(&base, FileKind::Header, self.seq_type), &hdr)?;
        }
        Ok(base)
    }
}

/// Writes an alias file `<dir>/<name>.?al` with the given lines
pub fn write_alias(dir: &Path, name: &str, seq_type: SeqType, lines: &[&str]) -> PathBuf {
    let path = with_extension(&dir.join(name), FileKind::Alias, seq_type);
    let mut text = lines.join("\n");
    text.push('\n');
    std::fs::write(&path, text).unwrap();
    path
}

/// Writes an OID bitmap file with the given bits set
pub fn write_oid_mask(path: &Path, num_oids: usize, set: &[usize]) {
    let mut bits = vec![0u8; num_oids.div_ceil(8)];
    for &oid in set {
        bits[oid / 8] |= 0x80 >> (oid % 8);
    }
    let mut out = Vec::new();
    out.write_u32::<BigEndian>(num_oids.saturating_sub(1) as u32).unwrap();
    out.extend_from_slice(&bits);
    std::fs::write(path, out).unwrap();
}

/// Writes a binary GI list file
pub fn write_binary_gi_list(path: &Path, gis: &[u32]) {
    let mut out = Vec::new();
    out.write_u32::<BigEndian>(u32::MAX).unwrap();
    out.write_u32::<BigEndian>(gis.len() as u32).unwrap();
    for &gi in gis {
        out.write_u32::<BigEndian>(gi).unwrap();
    }
    std::fs::write(path, out).unwrap();
}

#[test]
fn test_pack_na2_layout() {
    assert_eq!(pack_na2(b"ACGT"), vec![0b00_01_10_11, 0]);
    assert_eq!(pack_na2(b"ACGTG"), vec![0b00_01_10_11, 0b10_00_00_01]);
    assert_eq!(pack_na2(b""), vec![0]);
}
