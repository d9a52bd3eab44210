use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::Result;
use crate::region::{RawFile, Region, RegionStore};

/// A file that is opened on first access and then shared read-only.
///
/// The mutex only guards the open-once step and the open counter; once the file
/// is open, regions are served without taking it.
#[derive(Debug)]
pub struct LazyFile {
    path: PathBuf,
    store: RegionStore,
    file: OnceLock<RawFile>,
    opens: Mutex<usize>,
}
impl LazyFile {
    #[must_use]
    pub fn new(store: &RegionStore, path: PathBuf) -> Self {
        Self {
            path,
            store: store.clone(),
            file: OnceLock::new(),
            opens: Mutex::new(0),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the file has been opened
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.file.get().is_some()
    }

    /// Number of times an open was attempted
    #[must_use]
    pub fn open_attempts(&self) -> usize {
        *self.opens.lock()
    }

    /// Returns the open file, opening it if this is the first access.
    pub fn get(&self) -> Result<&RawFile> {
        if let Some(file) = self.file.get() {
            return Ok(file);
        }
        let mut opens = self.opens.lock();
        if let Some(file) = self.file.get() {
            return Ok(file);
        }
        *opens += 1;
        trace!(path = %self.path.display(), "opening on first access");
        let file = self.store.open(&self.path)?;
        Ok(self.file.get_or_init(|| file))
    }

    pub fn get_region(&self, start: u64, end: u64) -> Result<Region<'_>> {
        self.get()?.get_region(start, end)
    }

    /// Copies the bytes in `start..end` into an owned buffer
    pub fn read_bytes(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        Ok(self.get_region(start, end)?.to_vec())
    }
}

/// The packed-residue file of a volume
#[derive(Debug)]
pub struct SequenceFile(LazyFile);
impl SequenceFile {
    #[must_use]
    pub fn new(store: &RegionStore, path: PathBuf) -> Self {
        Self(LazyFile::new(store, path))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.0.path()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.0.is_open()
    }

    pub fn get_region(&self, start: u64, end: u64) -> Result<Region<'_>> {
        self.0.get_region(start, end)
    }

    pub fn read_bytes(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        self.0.read_bytes(start, end)
    }
}

/// The encoded-defline file of a volume
#[derive(Debug)]
pub struct HeaderFile(LazyFile);
impl HeaderFile {
    #[must_use]
    pub fn new(store: &RegionStore, path: PathBuf) -> Self {
        Self(LazyFile::new(store, path))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.0.path()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.0.is_open()
    }

    pub fn get_region(&self, start: u64, end: u64) -> Result<Region<'_>> {
        self.0.get_region(start, end)
    }

    pub fn read_bytes(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        self.0.read_bytes(start, end)
    }
}
