//! C ABI surface (spec §6): a flat, `#[no_mangle] extern "C"` namespace
//! over one process-wide [`dart_runtime::Runtime`], matching the original
//! `dart.h`/`dart_types.h` header surface
//! (`examples/original_source/dart-if/include/dash/dart/if/`).
//!
//! The runtime lives behind a single [`Mutex`], matching the original's
//! file-scope global state; every call here is a lock, a lookup, and a
//! delegation to the safe Rust API in `dart-runtime`. None of the
//! synchronization or RMA logic lives in this crate — it exists purely to
//! translate between C calling convention and the safe core.

mod collective;
mod datatype;
mod group;
mod init;
mod lock;
mod memory;
mod rma;
mod team;
mod types;

pub use types::{
    DartBaseType, DartDatatype, DartGptr, DartHandle, DartLock, DartOp, DartRet, DartThreadSupport,
};

use dart_runtime::Runtime;
use std::sync::{Mutex, MutexGuard, OnceLock};

static RUNTIME: OnceLock<Mutex<Option<Runtime>>> = OnceLock::new();

fn runtime_cell() -> &'static Mutex<Option<Runtime>> {
    RUNTIME.get_or_init(|| Mutex::new(None))
}

fn lock_runtime() -> MutexGuard<'static, Option<Runtime>> {
    runtime_cell().lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs `f` against the live runtime, translating `ERR_NOTINIT` when none is
/// installed (before `init`, after `exit`, or from a failed prior `init`).
fn with_runtime<T>(f: impl FnOnce(&mut Runtime) -> dart_error::DartResult<T>) -> Result<T, DartRet> {
    let mut guard = lock_runtime();
    match guard.as_mut() {
        Some(rt) => f(rt).map_err(DartRet::from),
        None => Err(DartRet::ErrNotInit),
    }
}

/// Every test in this crate that touches `RUNTIME` — directly or through
/// `dart_init`/`dart_exit` — must hold this guard for the duration of its
/// `dart_init ..= dart_exit` span. `cargo test` runs a binary's tests
/// concurrently by default, and `RUNTIME` is one process-wide singleton;
/// without this, one test's `dart_init`/`dart_exit` races another's and
/// either spuriously reports `ERR_OTHER` ("already initialized") or pulls
/// the runtime out from under an in-flight call. The lock carries no data
/// of its own — `RUNTIME` stays the single source of truth — it only
/// orders access to it.
#[cfg(test)]
static TEST_SERIAL: Mutex<()> = Mutex::new(());

#[cfg(test)]
pub(crate) fn test_guard() -> MutexGuard<'static, ()> {
    TEST_SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
