//! Per-team segment registry (spec §4.B): maps a segment id to the window
//! binding, displacements, datatype and flags that let the RMA engine
//! resolve `(unit, segment, offset)` into addressable memory.
//!
//! The spec's design notes call out the registry as "an interface with
//! two implementations (sorted-list or hash-map); the RMA engine depends
//! on the interface only", matching the differing choices the original
//! MPI/GASPI/shmem backends made. We model that directly as the
//! `SegmentDirectory` trait, with `SortedSegmentRegistry` (a `BTreeMap`,
//! the default) and `HashSegmentRegistry` as the two implementations.

use dart_datatype::DatatypeHandle;
use dart_error::{DartError, DartResult};
use dart_types::SegmentFlags;
use hashbrown::HashMap;
use std::collections::BTreeMap;

/// Opaque handle to a transport window, minted and owned by whatever team
/// layer sits above this crate (kept numeric here to avoid a dependency on
/// the transport crate, which is built after segments in the component
/// order: A → C → D → K → B → E/F → ...).
pub type WindowId = u64;

/// How a segment's per-unit addresses are resolved.
#[derive(Debug, Clone)]
pub enum Binding {
    /// A dynamic window: `disp[u]` is the displacement of unit `u`'s
    /// portion within the window, indexed by team-local unit id.
    Dynamic { disp: Vec<u64> },
    /// An intra-node shared-memory window: `base[u]` is the local virtual
    /// address of unit `u`'s portion, indexed by intra-node rank, plus the
    /// per-unit byte size.
    Shared { base: Vec<usize>, size: usize },
}

/// A registered segment.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    /// Bytes contributed by the local unit (informational; addressing
    /// goes through `binding`).
    pub local_size: usize,
    pub datatype: DatatypeHandle,
    pub flags: SegmentFlags,
    pub window: WindowId,
    pub binding: Binding,
}

/// The interface the RMA engine and everything above it programs against.
pub trait SegmentDirectory: Default {
    fn add(&mut self, segment_id: i16, entry: SegmentEntry) -> DartResult<()>;
    fn remove(&mut self, segment_id: i16) -> DartResult<SegmentEntry>;
    fn get(&self, segment_id: i16) -> DartResult<&SegmentEntry>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup_window(&self, segment_id: i16) -> DartResult<WindowId> {
        self.get(segment_id).map(|e| e.window)
    }

    fn lookup_disp(&self, segment_id: i16, local_unit: usize) -> DartResult<u64> {
        match &self.get(segment_id)?.binding {
            Binding::Dynamic { disp } => disp
                .get(local_unit)
                .copied()
                .ok_or(DartError::Inval("local unit out of range for segment")),
            Binding::Shared { .. } => Err(DartError::Inval(
                "segment uses a shared-memory binding; displacement lookup does not apply",
            )),
        }
    }

    /// Forcibly frees all entries, warning if any are still registered.
    fn destroy(&mut self);
}

/// Sorted-list implementation, ordered by segment id (the default, and the
/// closest match to the original's per-team translation table).
#[derive(Debug, Default)]
pub struct SortedSegmentRegistry {
    entries: BTreeMap<i16, SegmentEntry>,
}

impl SegmentDirectory for SortedSegmentRegistry {
    fn add(&mut self, segment_id: i16, entry: SegmentEntry) -> DartResult<()> {
        if self.entries.contains_key(&segment_id) {
            return Err(DartError::Inval("duplicate segment id"));
        }
        self.entries.insert(segment_id, entry);
        Ok(())
    }

    fn remove(&mut self, segment_id: i16) -> DartResult<SegmentEntry> {
        self.entries
            .remove(&segment_id)
            .ok_or(DartError::NotFound("unknown segment id"))
    }

    fn get(&self, segment_id: i16) -> DartResult<&SegmentEntry> {
        self.entries
            .get(&segment_id)
            .ok_or(DartError::NotFound("unknown segment id"))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn destroy(&mut self) {
        if !self.entries.is_empty() {
            log::warn!(
                "segment registry: destroy called with {} segment(s) still registered",
                self.entries.len()
            );
        }
        self.entries.clear();
    }
}

/// Hash-map implementation, for backends where lookup-by-id dominates over
/// lookup-by-offset.
#[derive(Debug, Default)]
pub struct HashSegmentRegistry {
    entries: HashMap<i16, SegmentEntry>,
}

impl SegmentDirectory for HashSegmentRegistry {
    fn add(&mut self, segment_id: i16, entry: SegmentEntry) -> DartResult<()> {
        if self.entries.contains_key(&segment_id) {
            return Err(DartError::Inval("duplicate segment id"));
        }
        self.entries.insert(segment_id, entry);
        Ok(())
    }

    fn remove(&mut self, segment_id: i16) -> DartResult<SegmentEntry> {
        self.entries
            .remove(&segment_id)
            .ok_or(DartError::NotFound("unknown segment id"))
    }

    fn get(&self, segment_id: i16) -> DartResult<&SegmentEntry> {
        self.entries
            .get(&segment_id)
            .ok_or(DartError::NotFound("unknown segment id"))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn destroy(&mut self) {
        if !self.entries.is_empty() {
            log::warn!(
                "segment registry: destroy called with {} segment(s) still registered",
                self.entries.len()
            );
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dart_types::BaseType;

    fn sample_entry(window: WindowId) -> SegmentEntry {
        SegmentEntry {
            local_size: 64,
            datatype: DatatypeHandle::Base(BaseType::Int),
            flags: SegmentFlags::ALIGNED,
            window,
            binding: Binding::Dynamic {
                disp: vec![0, 64, 128, 192],
            },
        }
    }

    #[test]
    fn rejects_duplicate_segment_ids() {
        let mut reg = SortedSegmentRegistry::default();
        reg.add(1, sample_entry(10)).unwrap();
        assert!(reg.add(1, sample_entry(11)).is_err());
    }

    #[test]
    fn lookup_disp_respects_local_unit_index() {
        let mut reg = HashSegmentRegistry::default();
        reg.add(5, sample_entry(42)).unwrap();
        assert_eq!(reg.lookup_disp(5, 2).unwrap(), 128);
        assert!(reg.lookup_disp(5, 9).is_err());
    }

    #[test]
    fn remove_then_lookup_not_found() {
        let mut reg = SortedSegmentRegistry::default();
        reg.add(1, sample_entry(10)).unwrap();
        reg.remove(1).unwrap();
        assert!(reg.get(1).is_err());
    }
}
