//! A unit's local, non-collective memory (spec §4.A/§4.C): a fixed byte
//! arena backing `dart-mempool`'s free-list allocator. `memalloc`/
//! `memfree` (spec §6) operate here; RMA never resolves into this pool
//! (`dart-rma::resolve` rejects `SEGMENT_LOCAL`), matching the
//! "non-collective" framing of §4.C.

use dart_error::{DartError, DartResult};
use dart_mempool::MemPool;

/// Default capacity of each unit's local, non-collective memory arena when
/// the launcher does not supply a `--dart-syncarea_size=` override. The
/// original's shmem backend sizes its sync area similarly from a launch
/// parameter (`examples/original_source/dart-impl/shmem/dart-shmem/dartrun.c`).
pub const DEFAULT_LOCAL_POOL_SIZE: usize = 16 * 1024 * 1024;

/// Fixed arena plus the free-list allocator tracking it.
pub struct LocalMemory {
    arena: Box<[u8]>,
    pool: MemPool,
}

impl LocalMemory {
    pub fn new(size: usize) -> Self {
        LocalMemory {
            arena: vec![0u8; size].into_boxed_slice(),
            pool: MemPool::create(0, size),
        }
    }

    /// First-fit allocation; returns the offset (not address) within this
    /// arena, matching `MemPool::alloc`'s base-relative convention.
    pub fn alloc(&mut self, nbytes: usize) -> DartResult<u64> {
        self.pool
            .alloc(nbytes)
            .map(|p| p as u64)
            .ok_or(DartError::Other("local memory pool exhausted"))
    }

    pub fn free(&mut self, offset: u64) -> DartResult<()> {
        self.pool.free(offset as usize)
    }

    pub fn read(&self, offset: u64, len: usize) -> DartResult<&[u8]> {
        let start = offset as usize;
        self.arena
            .get(start..start + len)
            .ok_or(DartError::Inval("offset/length out of range for local pool"))
    }

    pub fn write(&mut self, offset: u64, len: usize) -> DartResult<&mut [u8]> {
        let start = offset as usize;
        let end = start + len;
        if end > self.arena.len() {
            return Err(DartError::Inval("offset/length out of range for local pool"));
        }
        Ok(&mut self.arena[start..end])
    }

    /// The arena's base address, as seen by this process. `getaddr`
    /// (spec §4.C) adds an allocation's offset to this to produce a
    /// dereferenceable local pointer; carries no meaning outside this
    /// process, which matches the local pool's non-collective framing.
    pub fn base(&self) -> usize {
        self.arena.as_ptr() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_free_then_realloc_reuses_offset() {
        let mut mem = LocalMemory::new(64);
        let a = mem.alloc(16).unwrap();
        mem.free(a).unwrap();
        let b = mem.alloc(16).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn write_then_read_roundtrips() {
        let mut mem = LocalMemory::new(64);
        let off = mem.alloc(4).unwrap();
        mem.write(off, 4).unwrap().copy_from_slice(&42i32.to_le_bytes());
        assert_eq!(i32::from_le_bytes(mem.read(off, 4).unwrap().try_into().unwrap()), 42);
    }

    #[test]
    fn exhaustion_is_reported_as_other() {
        let mut mem = LocalMemory::new(8);
        assert!(mem.alloc(8).is_ok());
        assert!(matches!(mem.alloc(1), Err(DartError::Other(_))));
    }
}
