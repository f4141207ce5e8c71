//! Process-facing runtime core (spec §4.L): wires the memory pool,
//! segment registry, team registry, transport, handle store, datatype
//! registry, collective layer and lock service into the single object
//! `dart-abi`'s C surface drives.
//!
//! Grounded in `dart_init`/`dart_init_thread`/`dart_exit`/`dart_initialized`/
//! `dart_abort`
//! (`examples/original_source/dart-if/include/dash/dart/if/dart_initialization.h`,
//! `examples/original_source/dart-impl/mpi/dart-mpi/dart_initialization.c`):
//! the original keeps its subsystems as file-scope globals reached through
//! a handful of `extern` tables, initialized in a fixed order by
//! `dart_init` and torn down by `dart_exit`. We keep the same fixed
//! subsystem set and ordering but own them as fields of a single `Runtime`
//! value instead of process globals, so more than one can coexist (one per
//! simulated unit-thread over the local transport, exactly as
//! `dart-team`/`dart-rma`/`dart-collective`/`dart-lock`'s own tests already
//! do).

pub mod config;
pub mod memory;

use config::RuntimeConfig;
use dart_collective as collective;
use dart_datatype::{DatatypeHandle, DatatypeRegistry};
use dart_error::{DartError, DartResult};
use dart_group::Group;
use dart_handle::{HandleId, HandleStore};
use dart_lock::{LockId, TeamLockRegistry};
use dart_rma as rma;
use dart_segment::{Binding, SegmentEntry, SortedSegmentRegistry};
use dart_team::TeamRegistry;
use dart_transport::Communicator;
use dart_types::{
    BaseType, GlobalPtr, GlobalUnit, Operation, SegmentFlags, TeamId, TeamUnit,
    ThreadSupportLevel, SEGMENT_LOCAL,
};
use memory::{LocalMemory, DEFAULT_LOCAL_POOL_SIZE};
use std::sync::Arc;

/// The segment-directory implementation every team in this runtime uses
/// (spec's registry design note: "an interface with two implementations;
/// callers depend on the interface only"). `dart-segment`'s
/// `HashSegmentRegistry` remains available to callers building their own
/// `TeamRegistry<HashSegmentRegistry>` directly.
type Teams = TeamRegistry<SortedSegmentRegistry>;

/// One unit's live runtime state. Exactly one should exist per unit: one
/// per OS process in a real multi-process deployment, or one per OS
/// thread over this workspace's in-process local transport.
pub struct Runtime {
    teams: Teams,
    handles: HandleStore,
    datatypes: DatatypeRegistry,
    locks: TeamLockRegistry,
    local: LocalMemory,
    thread_support: ThreadSupportLevel,
}

impl Runtime {
    /// Brings up the runtime over an already-constructed communicator
    /// (spec §4.L `init`/`init_thread`): initializes the logger, registers
    /// `TEAM_ALL` over it, and reserves this unit's local memory pool.
    ///
    /// The communicator is supplied by the caller rather than built here:
    /// only the caller knows how its units rendezvous. Over the local
    /// in-process transport that's `LocalCommunicator::new_team`, handed
    /// out one handle per OS thread; a real deployment would hand in a
    /// communicator wrapping its MPI/GASPI/shmem backend instead (those
    /// drivers are out of scope here, spec §1).
    pub fn init(
        comm: Arc<dyn Communicator>,
        config: &RuntimeConfig,
        thread_support: ThreadSupportLevel,
    ) -> DartResult<Runtime> {
        config.init_logger();
        log::debug!(
            "dart_init: unit {} of {}, thread support {:?}",
            comm.rank(),
            comm.size(),
            thread_support
        );
        let my_global = GlobalUnit::new(comm.rank() as i32);
        let teams = TeamRegistry::new(my_global, comm);
        let pool_size = config.syncarea_size.unwrap_or(DEFAULT_LOCAL_POOL_SIZE);
        Ok(Runtime {
            teams,
            handles: HandleStore::new(),
            datatypes: DatatypeRegistry::new(),
            locks: TeamLockRegistry::new(),
            local: LocalMemory::new(pool_size),
            thread_support,
        })
    }

    /// `dart_init`: requests no particular thread-support level.
    pub fn init_single(comm: Arc<dyn Communicator>, config: &RuntimeConfig) -> DartResult<Runtime> {
        Self::init(comm, config, ThreadSupportLevel::Single)
    }

    /// The thread-support level this runtime was brought up with
    /// (`dart_init_thread`'s out-parameter).
    pub fn thread_support(&self) -> ThreadSupportLevel {
        self.thread_support
    }

    /// `dart_exit`: tears down every team (warning, not erroring, about
    /// leaked segments or outstanding handles, matching §7's "benign
    /// condition" logging policy) and consumes the runtime.
    pub fn finalize(mut self) -> DartResult<()> {
        if self.handles.outstanding() > 0 {
            log::warn!(
                "dart_exit: {} handle(s) still outstanding at finalize",
                self.handles.outstanding()
            );
        }
        match self.teams.destroy(TeamId::ALL) {
            Ok(()) => Ok(()),
            // TEAM_ALL is never destroyable by design; that's expected here.
            Err(DartError::Inval(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// `dart_abort`: logs at ERROR, invokes the transport's fail-fast
    /// primitive, and never returns.
    pub fn abort(&self, code: i32) -> ! {
        log::error!("dart_abort: code {code}");
        match self.teams.get(TeamId::ALL) {
            Ok(entry) => entry.communicator().abort(code),
            Err(_) => std::process::abort(),
        }
    }

    // -- identity ---------------------------------------------------------

    /// `dart_myid`: this unit's id within `TEAM_ALL`.
    pub fn myid(&self) -> TeamUnit {
        self.teams.myid(TeamId::ALL).expect("TEAM_ALL always exists")
    }

    /// `dart_size`: the number of units in `TEAM_ALL`.
    pub fn size(&self) -> usize {
        self.teams.size(TeamId::ALL).expect("TEAM_ALL always exists")
    }

    // -- teams (spec §4.E) --------------------------------------------------

    pub fn team_create(&mut self, parent: TeamId, group: &Group) -> DartResult<TeamId> {
        self.teams.create(parent, group)
    }

    pub fn team_destroy(&mut self, team: TeamId) -> DartResult<()> {
        self.teams.destroy(team)
    }

    pub fn team_myid(&self, team: TeamId) -> DartResult<TeamUnit> {
        self.teams.myid(team)
    }

    pub fn team_size(&self, team: TeamId) -> DartResult<usize> {
        self.teams.size(team)
    }

    pub fn team_get_group(&self, team: TeamId) -> DartResult<Group> {
        self.teams.get_group(team)
    }

    pub fn team_unit_l2g(&self, team: TeamId, local: TeamUnit) -> DartResult<GlobalUnit> {
        self.teams.unit_l2g(team, local)
    }

    pub fn team_unit_g2l(&self, team: TeamId, global: GlobalUnit) -> DartResult<TeamUnit> {
        self.teams.unit_g2l(team, global)
    }

    /// Collective barrier over every member of `team`.
    pub fn team_barrier(&self, team: TeamId) -> DartResult<()> {
        self.teams.barrier(team)
    }

    // -- memory (spec §4.A/§4.C and the memory portion of §6) --------------

    /// `memalloc`: local, non-collective allocation from this unit's own
    /// arena, addressed only by this unit.
    pub fn memalloc(&mut self, nbytes: usize) -> DartResult<GlobalPtr> {
        let offset = self.local.alloc(nbytes)?;
        Ok(GlobalPtr {
            unit: self.myid().raw(),
            flags: 0,
            segment_id: SEGMENT_LOCAL,
            team_id: TeamId::ALL,
            addr_or_offset: offset,
        })
    }

    /// `memfree`: frees a local, non-collective allocation made by this
    /// unit.
    pub fn memfree(&mut self, gptr: GlobalPtr) -> DartResult<()> {
        if gptr.segment_id != SEGMENT_LOCAL {
            return Err(DartError::Inval("memfree requires a gptr from the local pool"));
        }
        if gptr.unit != self.myid().raw() {
            return Err(DartError::Inval("memfree of a gptr owned by another unit"));
        }
        self.local.free(gptr.addr_or_offset)
    }

    /// `team_memalloc_aligned`: every member contributes `nbytes`,
    /// producing a gptr to this unit's own chunk; any member can retarget
    /// it to another unit's identically-offset chunk via `setunit` alone
    /// (spec §8's aligned-gptr testable property), since every unit's
    /// chunk starts at the same offset within its own window region.
    /// Collective over `team`.
    pub fn team_memalloc_aligned(&mut self, team: TeamId, nbytes: usize) -> DartResult<GlobalPtr> {
        self.team_alloc_segment(team, nbytes, SegmentFlags::ALIGNED)
    }

    /// `team_memfree`: the collective counterpart of `memfree`, for an
    /// allocation made by `team_memalloc_aligned`/`team_memregister*`.
    pub fn team_memfree(&mut self, team: TeamId, gptr: GlobalPtr) -> DartResult<()> {
        self.team_deregister(team, gptr)
    }

    /// `team_memregister`: registers an externally sized, not necessarily
    /// symmetric buffer contributed by this unit. Collective over `team`.
    pub fn team_memregister(&mut self, team: TeamId, nbytes: usize) -> DartResult<GlobalPtr> {
        self.team_alloc_segment(team, nbytes, SegmentFlags::EXTERNAL)
    }

    /// `team_memregister_aligned`: `team_memregister`, additionally marked
    /// team-aligned. Every member must in fact contribute the same
    /// `nbytes`; this is a caller obligation, not locally verified, as in
    /// the original.
    pub fn team_memregister_aligned(&mut self, team: TeamId, nbytes: usize) -> DartResult<GlobalPtr> {
        self.team_alloc_segment(team, nbytes, SegmentFlags::EXTERNAL | SegmentFlags::ALIGNED)
    }

    /// `team_memderegister`: rejects (spec §9 Open Question, resolved)
    /// while any issued-but-unconsumed handle still references the
    /// segment.
    pub fn team_memderegister(&mut self, team: TeamId, gptr: GlobalPtr) -> DartResult<()> {
        self.team_deregister(team, gptr)
    }

    fn team_alloc_segment(
        &mut self,
        team: TeamId,
        nbytes: usize,
        flags: SegmentFlags,
    ) -> DartResult<GlobalPtr> {
        let entry = self.teams.get_mut(team)?;
        let window = entry.communicator().create_dynamic_window(nbytes);
        let window_id = entry.register_window(window);
        let segment_id = entry.alloc_segment_id();
        let team_size = entry.communicator().size();
        entry.segments_mut().add(
            segment_id,
            SegmentEntry {
                local_size: nbytes,
                datatype: DatatypeHandle::Base(BaseType::Byte),
                flags,
                window: window_id,
                // Every unit's chunk starts at offset 0 within its own
                // window region under this workspace's local transport
                // (`LocalWindow` indexes one region per unit directly, see
                // `dart-transport::local`), so the displacement table is
                // uniformly zero regardless of `nbytes` symmetry.
                binding: Binding::Dynamic {
                    disp: vec![0u64; team_size],
                },
            },
        )?;
        Ok(GlobalPtr {
            unit: self.teams.myid(team)?.raw(),
            flags: (flags.bits() & 0xFF) as u8,
            segment_id,
            team_id: team,
            addr_or_offset: 0,
        })
    }

    fn team_deregister(&mut self, team: TeamId, gptr: GlobalPtr) -> DartResult<()> {
        if self.handles.outstanding_for_segment(team.raw(), gptr.segment_id) > 0 {
            return Err(DartError::Inval(
                "team_memderegister: segment still has outstanding RMA handles",
            ));
        }
        let entry = self.teams.get_mut(team)?;
        entry.segments_mut().remove(gptr.segment_id)?;
        Ok(())
    }

    // -- gptr accessors needing runtime context (spec §4.C) -----------------
    // `getflags`/`setflags`/`setunit`/`incaddr` are pure, allocation-free
    // operations on `GlobalPtr` itself (`dart-types`); only `getaddr` needs
    // a segment lookup, and `setaddr` needs this unit's arena base.

    /// `getaddr`: this process's local address for `gptr`, when
    /// resolvable without any remote communication — the local
    /// non-collective pool addressed at oneself, or a collective segment
    /// whose window exposes a locally queryable base on the caller.
    /// Returns `Ok(None)` (not an error) otherwise, per spec §4.C.
    pub fn getaddr(&self, gptr: GlobalPtr) -> DartResult<Option<usize>> {
        if gptr.unit != self.myid().raw() {
            return Ok(None);
        }
        if gptr.segment_id == SEGMENT_LOCAL {
            return Ok(Some(self.local.base() + gptr.addr_or_offset as usize));
        }
        let entry = self.teams.get(gptr.team_id)?;
        let segment = entry.segments().get(gptr.segment_id)?;
        Ok(match &segment.binding {
            Binding::Shared { base, .. } => {
                let local_rank = self.teams.myid(gptr.team_id)?.raw() as usize;
                base.get(local_rank).map(|b| b + gptr.addr_or_offset as usize)
            }
            // Dynamic windows never expose a locally dereferenceable base
            // in this workspace's transport (spec's intra-node fast path
            // applies to shared windows only).
            Binding::Dynamic { .. } => None,
        })
    }

    /// `setaddr`: wraps an already-held local address (not necessarily
    /// from `memalloc`) as a gptr over the local non-collective segment.
    pub fn setaddr(&self, addr: usize) -> GlobalPtr {
        GlobalPtr {
            unit: self.myid().raw(),
            flags: 0,
            segment_id: SEGMENT_LOCAL,
            team_id: TeamId::ALL,
            addr_or_offset: addr.wrapping_sub(self.local.base()) as u64,
        }
    }

    // -- datatypes (spec §4.K) ----------------------------------------------

    pub fn type_create_strided(
        &mut self,
        base: BaseType,
        stride: usize,
        blocklen: usize,
    ) -> DartResult<DatatypeHandle> {
        self.datatypes.create_strided(base, stride, blocklen)
    }

    pub fn type_create_indexed(
        &mut self,
        base: BaseType,
        blocklen: Vec<usize>,
        offset: Vec<usize>,
    ) -> DartResult<DatatypeHandle> {
        self.datatypes.create_indexed(base, blocklen, offset)
    }

    pub fn type_destroy(&mut self, handle: DatatypeHandle) -> DartResult<()> {
        self.datatypes.destroy(handle)
    }

    // -- RMA (spec §4.G) -----------------------------------------------------

    pub fn put(
        &self,
        gptr: GlobalPtr,
        buf: &[u8],
        nelem: usize,
        src_type: BaseType,
        dst_type: BaseType,
    ) -> DartResult<()> {
        rma::put(&self.teams, gptr, buf, nelem, src_type, dst_type)
    }

    pub fn get(
        &self,
        gptr: GlobalPtr,
        buf: &mut [u8],
        nelem: usize,
        src_type: BaseType,
        dst_type: BaseType,
    ) -> DartResult<()> {
        rma::get(&self.teams, gptr, buf, nelem, src_type, dst_type)
    }

    pub fn put_blocking(
        &self,
        gptr: GlobalPtr,
        buf: &[u8],
        nelem: usize,
        src_type: BaseType,
        dst_type: BaseType,
    ) -> DartResult<()> {
        rma::put_blocking(&self.teams, gptr, buf, nelem, src_type, dst_type)
    }

    pub fn get_blocking(
        &self,
        gptr: GlobalPtr,
        buf: &mut [u8],
        nelem: usize,
        src_type: BaseType,
        dst_type: BaseType,
    ) -> DartResult<()> {
        rma::get_blocking(&self.teams, gptr, buf, nelem, src_type, dst_type)
    }

    pub fn put_handle(
        &mut self,
        gptr: GlobalPtr,
        buf: &[u8],
        nelem: usize,
        src_type: BaseType,
        dst_type: BaseType,
    ) -> DartResult<HandleId> {
        rma::put_handle(&self.teams, &mut self.handles, gptr, buf, nelem, src_type, dst_type)
    }

    pub fn get_handle(
        &mut self,
        gptr: GlobalPtr,
        buf: &mut [u8],
        nelem: usize,
        src_type: BaseType,
        dst_type: BaseType,
    ) -> DartResult<HandleId> {
        rma::get_handle(&self.teams, &mut self.handles, gptr, buf, nelem, src_type, dst_type)
    }

    pub fn flush(&self, gptr: GlobalPtr) -> DartResult<()> {
        rma::flush(&self.teams, gptr)
    }

    pub fn flush_local(&self, gptr: GlobalPtr) -> DartResult<()> {
        rma::flush_local(&self.teams, gptr)
    }

    pub fn flush_all(&self, gptr: GlobalPtr) -> DartResult<()> {
        rma::flush_all(&self.teams, gptr)
    }

    pub fn flush_local_all(&self, gptr: GlobalPtr) -> DartResult<()> {
        rma::flush_local_all(&self.teams, gptr)
    }

    pub fn accumulate(
        &self,
        gptr: GlobalPtr,
        values: &[u8],
        nelem: usize,
        ty: BaseType,
        op: Operation,
    ) -> DartResult<()> {
        rma::accumulate(&self.teams, gptr, values, nelem, ty, op)
    }

    pub fn accumulate_blocking_local(
        &self,
        gptr: GlobalPtr,
        values: &[u8],
        nelem: usize,
        ty: BaseType,
        op: Operation,
    ) -> DartResult<()> {
        rma::accumulate_blocking_local(&self.teams, gptr, values, nelem, ty, op)
    }

    pub fn fetch_and_op(
        &self,
        gptr: GlobalPtr,
        value: &[u8],
        result: &mut [u8],
        ty: BaseType,
        op: Operation,
    ) -> DartResult<()> {
        rma::fetch_and_op(&self.teams, gptr, value, result, ty, op)
    }

    pub fn compare_and_swap(
        &self,
        gptr: GlobalPtr,
        value: &[u8],
        compare: &[u8],
        result: &mut [u8],
        ty: BaseType,
    ) -> DartResult<()> {
        rma::compare_and_swap(&self.teams, gptr, value, compare, result, ty)
    }

    // -- handles (spec §4.H) --------------------------------------------------

    pub fn wait(&mut self, handle: HandleId) -> DartResult<()> {
        self.handles.wait(handle)
    }

    pub fn wait_local(&mut self, handle: HandleId) -> DartResult<()> {
        self.handles.wait_local(handle)
    }

    pub fn test(&mut self, handle: HandleId) -> DartResult<bool> {
        self.handles.test(handle)
    }

    pub fn test_local(&mut self, handle: HandleId) -> DartResult<bool> {
        self.handles.test_local(handle)
    }

    pub fn waitall(&mut self, handles: &[HandleId]) -> DartResult<()> {
        self.handles.waitall(handles)
    }

    pub fn waitall_local(&mut self, handles: &[HandleId]) -> DartResult<()> {
        self.handles.waitall_local(handles)
    }

    pub fn testall(&mut self, handles: &[HandleId]) -> DartResult<bool> {
        self.handles.testall(handles)
    }

    pub fn testall_local(&mut self, handles: &[HandleId]) -> DartResult<bool> {
        self.handles.testall_local(handles)
    }

    pub fn handle_free(&mut self, handle: HandleId) -> DartResult<()> {
        self.handles.free(handle)
    }

    // -- collectives (spec §4.I) ----------------------------------------------

    pub fn barrier(&self, team: TeamId) -> DartResult<()> {
        collective::barrier(self.comm(team)?);
        Ok(())
    }

    pub fn bcast(&self, team: TeamId, root: usize, buf: &mut [u8]) -> DartResult<()> {
        collective::bcast(self.comm(team)?, root, buf);
        Ok(())
    }

    pub fn scatter(
        &self,
        team: TeamId,
        root: usize,
        sendbuf: &[u8],
        recvbuf: &mut [u8],
        chunk_size: usize,
    ) -> DartResult<()> {
        collective::scatter(self.comm(team)?, root, sendbuf, recvbuf, chunk_size)
    }

    pub fn gather(
        &self,
        team: TeamId,
        root: usize,
        sendbuf: &[u8],
        recvbuf: &mut [u8],
        chunk_size: usize,
    ) -> DartResult<()> {
        collective::gather(self.comm(team)?, root, sendbuf, recvbuf, chunk_size)
    }

    pub fn allgather(
        &self,
        team: TeamId,
        sendbuf: &[u8],
        recvbuf: &mut [u8],
        chunk_size: usize,
    ) -> DartResult<()> {
        collective::allgather(self.comm(team)?, sendbuf, recvbuf, chunk_size)
    }

    pub fn allgatherv(
        &self,
        team: TeamId,
        sendbuf: &[u8],
        recvbuf: &mut [u8],
        recvcounts: &[usize],
        displs: &[usize],
    ) -> DartResult<()> {
        collective::allgatherv(self.comm(team)?, sendbuf, recvbuf, recvcounts, displs)
    }

    pub fn alltoall(
        &self,
        team: TeamId,
        sendbuf: &[u8],
        recvbuf: &mut [u8],
        nbytes: usize,
    ) -> DartResult<()> {
        collective::alltoall(self.comm(team)?, sendbuf, recvbuf, nbytes)
    }

    pub fn reduce(
        &self,
        team: TeamId,
        root: usize,
        sendbuf: &[u8],
        recvbuf: &mut [u8],
        nelem: usize,
        ty: BaseType,
        op: Operation,
    ) -> DartResult<()> {
        collective::reduce(self.comm(team)?, root, sendbuf, recvbuf, nelem, ty, op)
    }

    pub fn allreduce(
        &self,
        team: TeamId,
        sendbuf: &[u8],
        recvbuf: &mut [u8],
        nelem: usize,
        ty: BaseType,
        op: Operation,
    ) -> DartResult<()> {
        collective::allreduce(self.comm(team)?, sendbuf, recvbuf, nelem, ty, op)
    }

    fn comm(&self, team: TeamId) -> DartResult<&dyn Communicator> {
        Ok(&**self.teams.get(team)?.communicator())
    }

    // -- locks (spec §4.J) ---------------------------------------------------

    /// `team_lock_init`: collectively creates a lock over `team`, on its
    /// own duplicated communication context (isolated from user traffic,
    /// same rationale as `dart-lock::Lock::new`'s own doc comment).
    pub fn team_lock_init(&mut self, team: TeamId) -> DartResult<LockId> {
        let comm = self.teams.get(team)?.communicator().dup();
        Ok(self.locks.init(comm))
    }

    pub fn lock_acquire(&mut self, lock: LockId) -> DartResult<()> {
        self.locks.acquire(lock)
    }

    pub fn lock_try_acquire(&mut self, lock: LockId) -> DartResult<bool> {
        self.locks.try_acquire(lock)
    }

    pub fn lock_release(&mut self, lock: LockId) -> DartResult<()> {
        self.locks.release(lock)
    }

    pub fn team_lock_free(&mut self, lock: LockId) -> DartResult<()> {
        self.locks.free(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dart_transport::LocalCommunicator;
    use std::thread;

    fn runtimes(size: usize) -> Vec<Runtime> {
        LocalCommunicator::new_team(size)
            .into_iter()
            .map(|c| Runtime::init_single(c, &RuntimeConfig::default()).unwrap())
            .collect()
    }

    #[test]
    fn myid_and_size_match_the_communicator() {
        let rts = runtimes(3);
        for (i, rt) in rts.iter().enumerate() {
            assert_eq!(rt.myid(), TeamUnit::new(i as i32));
            assert_eq!(rt.size(), 3);
        }
    }

    #[test]
    fn local_memalloc_getaddr_roundtrips() {
        let mut rt = runtimes(1).pop().unwrap();
        let gptr = rt.memalloc(16).unwrap();
        let addr = rt.getaddr(gptr).unwrap().expect("local alloc must resolve");
        // SAFETY: `addr` points inside the arena `memalloc` just carved
        // this allocation from, and no other reference to it exists here.
        unsafe {
            std::ptr::write(addr as *mut i32, 99);
            assert_eq!(std::ptr::read(addr as *const i32), 99);
        }
        rt.memfree(gptr).unwrap();
    }

    #[test]
    fn team_memalloc_aligned_lets_every_unit_retarget_by_setunit_alone() {
        let rts = runtimes(4);
        let handles: Vec<_> = rts
            .into_iter()
            .map(|mut rt| {
                thread::spawn(move || {
                    let mut gptr = rt.team_memalloc_aligned(TeamId::ALL, 8).unwrap();
                    rt.put(gptr, &(rt.myid().raw() + 1).to_le_bytes(), 1, BaseType::Int, BaseType::Int)
                        .unwrap();
                    rt.team_barrier(TeamId::ALL).unwrap();
                    gptr.setunit((rt.myid().raw() + 1) % 4);
                    let mut out = [0u8; 4];
                    rt.get(gptr, &mut out, 1, BaseType::Int, BaseType::Int).unwrap();
                    i32::from_le_bytes(out)
                })
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), (i as i32 + 1) % 4 + 1);
        }
    }

    #[test]
    fn memderegister_rejects_while_handle_outstanding() {
        let mut rt = runtimes(1).pop().unwrap();
        let gptr = rt.team_memalloc_aligned(TeamId::ALL, 8).unwrap();
        let h = rt.put_handle(gptr, &1i32.to_le_bytes(), 1, BaseType::Int, BaseType::Int).unwrap();
        assert!(rt.team_memderegister(TeamId::ALL, gptr).is_err());
        rt.wait(h).unwrap();
        assert!(rt.team_memderegister(TeamId::ALL, gptr).is_ok());
    }

    #[test]
    fn finalize_tears_down_team_all() {
        let rt = runtimes(1).pop().unwrap();
        assert!(rt.finalize().is_ok());
    }
}
