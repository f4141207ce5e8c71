//! The abstract transport contract (spec §4.F). The RMA engine, collective
//! layer and lock service speak only these two traits; MPI-3 RMA, GASPI,
//! and POSIX shared-memory are interchangeable backends behind them. A
//! backend that offers only a subset of the surface emulates the rest over
//! its own primitives, or returns `DartError::Inval` for operations it
//! fundamentally cannot support (e.g. two-sided `send`/`recv` on a
//! GASPI-style backend).

use dart_error::DartResult;
use dart_types::{BaseType, Operation};
use std::sync::Arc;

/// A communication context: barrier/broadcast, node-local splitting,
/// duplication, window creation, and (for backends that support it)
/// two-sided point-to-point messaging used by the lock service's wakeups.
pub trait Communicator: Send + Sync {
    /// This process's rank within the communicator.
    fn rank(&self) -> usize;
    /// Number of ranks in the communicator.
    fn size(&self) -> usize;

    /// No rank returns until all have entered.
    fn barrier(&self);

    /// `buf` on `root` is replicated to every rank.
    fn broadcast(&self, root: usize, buf: &mut [u8]);

    /// Duplicates the communicator, yielding an independent context over
    /// the same membership (used to give the lock service its own
    /// channel for wakeups, isolated from user traffic).
    fn dup(&self) -> Arc<dyn Communicator>;

    /// Splits off the sub-communicator of ranks that share memory with
    /// this one (node-local peers).
    fn split_shared(&self) -> Arc<dyn Communicator>;

    /// Collectively builds the sub-communicator over exactly `ranks`
    /// (sorted ascending, identical on every calling rank), used by
    /// `dart-team` to give an arbitrary group its own communication
    /// context. Only ranks present in `ranks` may call this.
    fn split_group(&self, ranks: &[usize]) -> Arc<dyn Communicator>;

    /// Collectively creates a dynamic window: every rank supplies the
    /// byte size of its own contribution (sizes may differ, e.g. for
    /// `team_memregister` of pre-existing, non-symmetric buffers).
    fn create_dynamic_window(&self, local_size: usize) -> Arc<dyn Window>;

    /// Collectively creates an intra-node shared-memory window, every rank
    /// supplying the same `local_size`. Returns the window plus a
    /// base-address-equivalent table queryable by intra-node rank (the
    /// local backend's bases carry no meaning beyond identifying rank
    /// order, since everything already lives in one process).
    fn allocate_shared_window(&self, local_size: usize) -> (Arc<dyn Window>, Vec<usize>);

    /// Two-sided send, used only by the lock service's wakeup protocol.
    /// Backends without two-sided messaging return `DartError::Inval`.
    fn send(&self, to: usize, tag: u32, data: &[u8]) -> DartResult<()>;

    /// Blocking two-sided receive, matching `send`'s tag.
    fn recv(&self, from: usize, tag: u32) -> DartResult<Vec<u8>>;

    /// The transport's fail-fast primitive (e.g. `MPI_Abort`). Never
    /// returns.
    fn abort(&self, code: i32) -> !;
}

/// A window: the RMA surface over memory contributed by every rank.
///
/// All RMA here runs inside an implicit `lock_all` epoch established at
/// team init and released at team destroy (spec §4.G); `lock_all`/
/// `unlock_all` exist on the trait so a backend can establish/release that
/// epoch, but no user-visible epoch API is exposed above this layer.
pub trait Window: Send + Sync {
    /// Writes `data` into rank `unit`'s region at `offset`. Neither local
    /// nor remote completion is guaranteed until a `flush`.
    fn put(&self, unit: usize, offset: u64, data: &[u8]) -> DartResult<()>;

    /// Reads `out.len()` bytes from rank `unit`'s region at `offset`.
    fn get(&self, unit: usize, offset: u64, out: &mut [u8]) -> DartResult<()>;

    /// Atomic element-wise accumulate of `data` (interpreted as a run of
    /// `ty`-sized elements) into rank `unit`'s region at `offset`.
    fn accumulate(
        &self,
        unit: usize,
        offset: u64,
        data: &[u8],
        ty: BaseType,
        op: Operation,
    ) -> DartResult<()>;

    /// Atomic single-element fetch-and-op; returns the pre-update value.
    fn fetch_and_op(
        &self,
        unit: usize,
        offset: u64,
        value: &[u8],
        ty: BaseType,
        op: Operation,
    ) -> DartResult<Vec<u8>>;

    /// Atomic single-element compare-and-swap (integral types only);
    /// returns the value observed before the swap attempt.
    fn compare_and_swap(
        &self,
        unit: usize,
        offset: u64,
        value: &[u8],
        compare: &[u8],
        ty: BaseType,
    ) -> DartResult<Vec<u8>>;

    /// Remote completion for pending ops on rank `unit`.
    fn flush(&self, unit: usize);
    /// Remote completion for pending ops across every rank.
    fn flush_all(&self);
    /// Local completion only (buffer re-usable) for rank `unit`.
    fn flush_local(&self, unit: usize);
    /// Local completion only, across every rank.
    fn flush_local_all(&self);

    /// Establishes the window's lock-all epoch.
    fn lock_all(&self);
    /// Releases the window's lock-all epoch.
    fn unlock_all(&self);
}
