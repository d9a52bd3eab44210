//! # seqdb
//!
//! Read-only access to BLAST-style sequence databases.
//!
//! A database is one or more *volumes*, each a triple of files sharing a base
//! name: an index (`.pin` / `.nin`), packed residues (`.psq` / `.nsq`) and
//! deflines (`.phr` / `.nhr`). Alias files (`.pal` / `.nal`) combine volumes and
//! other alias files, override aggregate metadata and restrict the visible OIDs.
//!
//! [`SeqDb`] joins every volume of an alias tree into one dense OID space:
//!
//! ```no_run
//! use std::sync::Arc;
//! use seqdb::{OpenOptions, RecordOptions, SeqDb, SeqDbContext, SeqType};
//!
//! let db = SeqDb::open(
//!     "swissprot",
//!     Some(SeqType::Protein),
//!     &OpenOptions::from_env(),
//!     Arc::new(SeqDbContext::default()),
//! )?;
//! for oid in db.iter_oids().take(10) {
//!     let record = db.build_record(oid, &RecordOptions::all())?;
//!     println!("{:?} {}", record.gi(), db.seq_length(oid)?);
//! }
//! # Ok::<(), seqdb::Error>(())
//! ```
//!
//! Files are memory mapped when possible and otherwise read into pooled
//! buffers (see [`region`]). Identifier indices, taxonomy names and the defline
//! encoding are supplied by the caller through a [`SeqDbContext`].

pub mod alias;
pub mod ambig;
pub mod context;
pub mod defline;
pub mod file;
pub mod filter;
pub mod nuc;
pub mod record;
pub mod region;
pub mod volume;

mod config;
mod db;
mod error;
mod parallel;

#[cfg(test)]
mod testing;

pub use config::{OpenOptions, SEARCH_PATH_ENV};
pub use context::{
    DeflineCodec, IdIndex, IdIndexSource, IdKind, SeqDbContext, SeqDbContextBuilder,
    TaxonomyLookup, TaxonomyNames,
};
pub use db::SeqDb;
pub use defline::{Defline, DeflineSet, SeqId, TextDeflineCodec};
pub use error::{AliasError, CorruptionError, Error, FormatError, IntoSeqDbError, Result};
pub use file::SeqType;
pub use filter::OidFilter;
pub use parallel::{ParallelProcessor, ParallelReader, BATCH_SIZE};
pub use record::{RecordOptions, Residues, SequenceRecord, TaxonomyInfo};
pub use volume::{Mask, Representation, Volume};
