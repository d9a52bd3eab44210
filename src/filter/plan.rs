use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{read_gi_list, OidFilterBuilder};
use crate::error::Result;
use crate::region::RegionStore;

/// One restriction an alias file places on a volume.
///
/// Ranges are volume-local, 0-based and half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeMask {
    /// FIRST_OID / LAST_OID without a list
    Range(Range<usize>),
    /// OIDLIST bitmap file, restricted to `range`
    OidList { path: PathBuf, range: Range<usize> },
    /// GILIST file, restricted to `range`
    GiList { path: PathBuf, range: Range<usize> },
}

/// Everything the alias tree says about one volume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanEntry {
    include_all: bool,
    masks: Vec<VolumeMask>,
}
impl PlanEntry {
    /// True if some reference to the volume carries no filter
    #[must_use]
    pub fn includes_all(&self) -> bool {
        self.include_all
    }

    #[must_use]
    pub fn masks(&self) -> &[VolumeMask] {
        &self.masks
    }

    /// Sets the bits this entry selects for a volume of `num_oids` OIDs whose
    /// first OID sits at `bit_offset`.
    ///
    /// `translate` maps a GI to a volume-local OID.
    pub fn apply<F>(
        &self,
        builder: &mut OidFilterBuilder,
        store: &RegionStore,
        bit_offset: usize,
        num_oids: usize,
        mut translate: F,
    ) -> Result<()>
    where
        F: FnMut(u64) -> Result<Option<usize>>,
    {
        let clip = |range: &Range<usize>| range.start..range.end.min(num_oids);
        if self.include_all {
            builder.set_range(bit_offset..bit_offset + num_oids);
            return Ok(());
        }
        for mask in &self.masks {
            match mask {
                VolumeMask::Range(range) => {
                    let range = clip(range);
                    builder.set_range(bit_offset + range.start..bit_offset + range.end);
                }
                VolumeMask::OidList { path, range } => {
                    builder.or_bitmap_file(store, path, clip(range), bit_offset)?;
                }
                VolumeMask::GiList { path, range } => {
                    let gis = read_gi_list(store, path)?;
                    let hits =
                        builder.or_numeric_id_list(&gis, &mut translate, clip(range), bit_offset)?;
                    debug!(path = %path.display(), gis = gis.len(), hits, "applied GI list");
                }
            }
        }
        Ok(())
    }
}

/// Per-volume filters collected from an alias tree.
///
/// A volume referenced several times accumulates all of its masks (their
/// union is used); a single unfiltered reference includes the whole volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskPlan {
    entries: HashMap<PathBuf, PlanEntry>,
}
impl MaskPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `volume` as fully included
    pub fn include_all(&mut self, volume: &Path) {
        let entry = self.entries.entry(volume.to_path_buf()).or_default();
        entry.include_all = true;
        entry.masks.clear();
    }

    /// Adds a restriction to `volume`; ignored if the volume is already fully included
    pub fn add_mask(&mut self, volume: &Path, mask: VolumeMask) {
        let entry = self.entries.entry(volume.to_path_buf()).or_default();
        if !entry.include_all && !entry.masks.contains(&mask) {
            entry.masks.push(mask);
        }
    }

    #[must_use]
    pub fn entry(&self, volume: &Path) -> Option<&PlanEntry> {
        self.entries.get(volume)
    }

    /// True if no volume carries a restriction
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.entries.values().all(PlanEntry::includes_all)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
