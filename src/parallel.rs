use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{CorruptionError, Error, Result};
use crate::SeqDb;

/// Number of raw OIDs a thread claims at a time
pub const BATCH_SIZE: usize = 1024;

/// Trait for databases whose included OIDs can be walked in parallel
///
/// This is implemented by the **database** not by the **processor**.
/// For the **processor**, see the [`ParallelProcessor`] trait.
pub trait ParallelReader {
    /// Visits every included OID of the database
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;

    /// Visits the included OIDs within a global OID range
    ///
    /// Threads claim batches of [`BATCH_SIZE`] raw OIDs from a shared cursor, so
    /// filtered regions do not leave one thread idle while another works.
    ///
    /// # Arguments
    ///
    /// * `processor` - The processor to use for each OID; cloned once per thread
    /// * `num_threads` - The number of threads to spawn (`0` uses every core)
    /// * `range` - The range of global OIDs to visit
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If all OIDs were processed successfully
    /// * `Err(Error)` - If the range is invalid or a processor failed
    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<usize>,
    ) -> Result<()>;

    /// Checks that `range` lies within `0..num_oids`
    fn validate_range(&self, num_oids: usize, range: &Range<usize>) -> Result<()> {
        if range.end > num_oids {
            Err(CorruptionError::OidOutOfRange {
                oid: range.end,
                num_oids,
            }
            .into())
        } else if range.start > range.end {
            Err(CorruptionError::OidOutOfRange {
                oid: range.start,
                num_oids: range.end,
            }
            .into())
        } else {
            Ok(())
        }
    }
}

/// Trait for types that can process OIDs in parallel.
///
/// This is implemented by the **processor** not by the **database**.
/// For the **database**, see the [`ParallelReader`] trait.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single included OID
    fn process_oid(&mut self, db: &SeqDb, oid: usize) -> Result<()>;

    /// Called when a thread finishes processing its batch
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread should call this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

impl ParallelReader for Arc<SeqDb> {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let window = self.oid_window();
        self.process_parallel_range(processor, num_threads, window)
    }

    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<usize>,
    ) -> Result<()> {
        self.validate_range(self.num_oids(), &range)?;
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads
        };
        debug!(num_threads, start = range.start, end = range.end, "starting parallel walk");

        // cursor local to this walk so concurrent walks do not share batches
        let cursor = Arc::new(AtomicUsize::new(range.start));

        let mut handles = Vec::with_capacity(num_threads);
        for tid in 0..num_threads {
            let mut processor = processor.clone();
            let db = Arc::clone(&self);
            let cursor = Arc::clone(&cursor);
            let end = range.end;
            processor.set_tid(tid);

            let handle = std::thread::spawn(move || -> Result<()> {
                loop {
                    let batch_start = cursor.fetch_add(BATCH_SIZE, Ordering::Relaxed);
                    if batch_start >= end {
                        return Ok(());
                    }
                    let batch_end = (batch_start + BATCH_SIZE).min(end);

                    let mut oid = batch_start;
                    while db.check_or_find_oid(&mut oid) && oid < batch_end {
                        processor.process_oid(&db, oid)?;
                        oid += 1;
                    }

                    processor.on_batch_complete()?;
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle
                .join()
                .map_err(|_| Error::External("parallel worker panicked".to_string()))??;
        }
        Ok(())
    }
}

impl ParallelReader for SeqDb {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        Arc::new(self).process_parallel(processor, num_threads)
    }

    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<usize>,
    ) -> Result<()> {
        Arc::new(self).process_parallel_range(processor, num_threads, range)
    }
}
