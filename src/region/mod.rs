//! Byte-range access to database files
//!
//! A [`RegionStore`] opens files either by memory mapping them or, when mapping is
//! disabled or fails, by reading requested ranges into buffers taken from a shared
//! [`BufferPool`]. Both paths hand out [`Region`] values that deref to `&[u8]`.
//!
//! All multi-byte integers in the database format are big-endian; the
//! `read_*` methods of [`RawFile`] are the only place they are decoded.

mod pool;

pub use pool::{BufferPool, PooledBuffer};

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{CorruptionError, Error, Result};

/// Opens database files and shares one buffer pool between them.
#[derive(Debug, Clone)]
pub struct RegionStore {
    mmap: bool,
    pool: Arc<BufferPool>,
}
impl Default for RegionStore {
    fn default() -> Self {
        Self::new(true)
    }
}
impl RegionStore {
    #[must_use]
    pub fn new(mmap: bool) -> Self {
        Self {
            mmap,
            pool: BufferPool::new(),
        }
    }

    /// Returns whether files are memory mapped when possible
    #[must_use]
    pub fn prefers_mmap(&self) -> bool {
        self.mmap
    }

    /// Returns the pool backing unmapped regions
    #[must_use]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Opens a file for region access.
    ///
    /// Memory mapping is attempted first (unless disabled); any mapping failure falls
    /// back to pooled reads. A missing file is reported as [`Error::NotFound`].
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<RawFile> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_path_buf()))
            }
            Err(err) => return Err(Error::from(err).in_file(path)),
        };
        let len = file.metadata().map_err(|e| Error::from(e).in_file(path))?.len();

        let backing = if self.mmap {
            // Safety: database files are immutable once built and are never written while open
            match unsafe { Mmap::map(&file) } {
                Ok(mmap) => Backing::Mapped(mmap),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "mmap failed, using pooled reads");
                    self.pooled(file)
                }
            }
        } else {
            self.pooled(file)
        };
        debug!(path = %path.display(), len, mapped = backing.is_mapped(), "opened file");

        Ok(RawFile {
            path: path.to_path_buf(),
            len,
            backing,
        })
    }

    fn pooled(&self, file: File) -> Backing {
        Backing::Pooled {
            file: Mutex::new(file),
            pool: Arc::clone(&self.pool),
        }
    }
}

enum Backing {
    Mapped(Mmap),
    Pooled {
        file: Mutex<File>,
        pool: Arc<BufferPool>,
    },
}
impl Backing {
    fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

/// An open database file.
pub struct RawFile {
    path: PathBuf,
    len: u64,
    backing: Backing,
}
impl std::fmt::Debug for RawFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFile")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("mapped", &self.backing.is_mapped())
            .finish()
    }
}
impl RawFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.backing.is_mapped()
    }

    /// Returns a view of the bytes in `start..end`.
    ///
    /// Fails with [`CorruptionError::RegionOutOfRange`] if `start > end` or
    /// `end > len`. Mapped files return a borrowed slice; pooled files read the
    /// range into a buffer owned by the returned region.
    pub fn get_region(&self, start: u64, end: u64) -> Result<Region<'_>> {
        if start > end || end > self.len {
            return Err(Error::from(CorruptionError::RegionOutOfRange {
                start,
                end,
                len: self.len,
            })
            .in_file(&self.path));
        }
        let data = match &self.backing {
            Backing::Mapped(mmap) => RegionData::Mapped(&mmap[start as usize..end as usize]),
            Backing::Pooled { file, pool } => {
                let mut buf = pool.take((end - start) as usize);
                {
                    let mut file = file.lock();
                    file.seek(SeekFrom::Start(start))
                        .and_then(|_| file.read_exact(buf.as_mut_slice()))
                        .map_err(|e| Error::from(e).in_file(&self.path))?;
                }
                RegionData::Pooled(buf)
            }
        };
        Ok(Region { start, end, data })
    }

    /// Reads a big-endian `u32` at `cursor` and advances the cursor by 4.
    pub fn read_u32(&self, cursor: &mut u64) -> Result<u32> {
        let region = self.get_region(*cursor, *cursor + 4)?;
        *cursor += 4;
        Ok(BigEndian::read_u32(&region))
    }

    /// Reads a big-endian `u64` at `cursor` and advances the cursor by 8.
    pub fn read_u64(&self, cursor: &mut u64) -> Result<u64> {
        let region = self.get_region(*cursor, *cursor + 8)?;
        *cursor += 8;
        Ok(BigEndian::read_u64(&region))
    }

    /// Reads a string prefixed by its big-endian `u32` byte length.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; titles of older
    /// databases are not guaranteed to be UTF-8.
    pub fn read_string(&self, cursor: &mut u64) -> Result<String> {
        let len = u64::from(self.read_u32(cursor)?);
        let region = self.get_region(*cursor, *cursor + len)?;
        *cursor += len;
        Ok(String::from_utf8_lossy(&region).into_owned())
    }
}

enum RegionData<'a> {
    Mapped(&'a [u8]),
    Pooled(PooledBuffer),
}

/// A bounded view into a [`RawFile`].
///
/// Regions borrow their file and so cannot outlive it. Dropping a pooled region
/// returns its buffer to the pool; dropping a mapped region is free.
pub struct Region<'a> {
    start: u64,
    end: u64,
    data: RegionData<'a>,
}
impl Region<'_> {
    /// Byte offset of the first byte of this region within its file
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Byte offset one past the last byte of this region within its file
    #[must_use]
    pub fn end(&self) -> u64 {
        self.end
    }

    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(self.data, RegionData::Mapped(_))
    }

    /// Releases the region. Equivalent to dropping it.
    pub fn release(self) {}
}
impl Deref for Region<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match &self.data {
            RegionData::Mapped(bytes) => bytes,
            RegionData::Pooled(buf) => buf,
        }
    }
}
impl AsRef<[u8]> for Region<'_> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}
impl std::fmt::Debug for Region<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use byteorder::WriteBytesExt;

    use super::*;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    fn sample_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(0xDEAD_BEEF).unwrap();
        buf.write_u64::<BigEndian>(1 << 40).unwrap();
        buf.write_u32::<BigEndian>(5).unwrap();
        buf.extend_from_slice(b"hello");
        buf
    }

    #[test]
    fn test_mapped_and_pooled_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.bin", &sample_bytes());
        for mmap in [true, false] {
            let store = RegionStore::new(mmap);
            let file = store.open(&path).unwrap();
            assert_eq!(file.is_mapped(), mmap);
            let mut cursor = 0;
            assert_eq!(file.read_u32(&mut cursor).unwrap(), 0xDEAD_BEEF);
            assert_eq!(file.read_u64(&mut cursor).unwrap(), 1 << 40);
            assert_eq!(file.read_string(&mut cursor).unwrap(), "hello");
            assert_eq!(cursor, file.len());
        }
    }

    #[test]
    fn test_region_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "b.bin", &[1, 2, 3, 4]);
        let file = RegionStore::default().open(&path).unwrap();
        assert_eq!(&*file.get_region(1, 3).unwrap(), &[2, 3]);
        assert!(file.get_region(4, 4).unwrap().is_empty());
        let err = file.get_region(2, 5).unwrap_err();
        assert!(err.is_corruption());
        assert!(file.get_region(3, 2).unwrap_err().is_corruption());
    }

    #[test]
    fn test_read_past_end_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "c.bin", &[0, 0, 0]);
        let file = RegionStore::new(false).open(&path).unwrap();
        let mut cursor = 0;
        assert!(file.read_u32(&mut cursor).unwrap_err().is_corruption());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_pooled_region_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "d.bin", &[9; 64]);
        let store = RegionStore::new(false);
        let file = store.open(&path).unwrap();
        let a = file.get_region(0, 32).unwrap();
        let b = file.get_region(32, 64).unwrap();
        assert!(!a.is_mapped());
        assert_eq!(store.pool().outstanding(), 2);
        a.release();
        assert_eq!(store.pool().outstanding(), 1);
        drop(b);
        assert_eq!(store.pool().outstanding(), 0);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RegionStore::default()
            .open(dir.path().join("nope.pin"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
