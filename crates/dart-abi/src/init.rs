//! Lifecycle entry points: `init`/`init_thread`/`exit`/`initialized`/
//! `abort`, plus the two identity queries `myid`/`size` (spec §6),
//! grounded on `dart_init`/`dart_init_thread`/`dart_exit`/
//! `dart_initialized`/`dart_abort`
//! (`examples/original_source/dart-if/include/dash/dart/if/dart_initialization.h`).

use crate::{lock_runtime, DartRet, DartThreadSupport};
use dart_runtime::config::RuntimeConfig;
use dart_runtime::Runtime;
use dart_transport::LocalCommunicator;
use dart_types::TeamUnit;
use std::os::raw::{c_char, c_int};

/// Brings up the runtime with no particular thread-support request,
/// equivalent to `dart_init_thread` with `required = DART_THREAD_SINGLE`.
///
/// `argv`/`argc` are scanned for the launcher's `--dart-id=`/
/// `--dart-size=`/`--dart-syncarea_id=`/`--dart-syncarea_size=` flags
/// (spec §6); this workspace's only transport is in-process, so those
/// values configure the local memory pool size but cannot rendezvous
/// across OS processes the way a real shared-memory/MPI backend's would.
/// A second `init` without an intervening `exit` is a no-op that reports
/// `ERR_OTHER`.
///
/// # Safety
/// `argv`, if non-null, must point to `argc` valid, NUL-terminated C
/// strings, each valid for the duration of this call.
#[no_mangle]
pub unsafe extern "C" fn dart_init(argc: c_int, argv: *const *const c_char) -> DartRet {
    // SAFETY: forwarded verbatim to `collect_argv`, which re-states and
    // relies on the same precondition documented above.
    unsafe { dart_init_thread(argc, argv, std::ptr::null_mut()) }
}

/// `dart_init_thread`: like `dart_init`, additionally reporting the
/// granted thread-support level through `provided` (may be null).
///
/// # Safety
/// Same as `dart_init` for `argc`/`argv`; `provided`, if non-null, must be
/// a valid, properly aligned `DartThreadSupport` write target.
#[no_mangle]
pub unsafe extern "C" fn dart_init_thread(
    argc: c_int,
    argv: *const *const c_char,
    provided: *mut DartThreadSupport,
) -> DartRet {
    let mut guard = lock_runtime();
    if guard.is_some() {
        log::error!("dart_init_thread: runtime already initialized");
        return DartRet::ErrOther;
    }

    // SAFETY: caller guarantees `argv` points to `argc` valid C strings.
    let args = unsafe { collect_argv(argc, argv) };
    let config = RuntimeConfig::from_env_and_args(&args);
    let size = config.dart_size.unwrap_or(1);
    let id = config.dart_id.unwrap_or(0);

    // This workspace ships one transport, an in-process backend with no
    // way to rendezvous across the separate OS processes a real launcher
    // spawns (spec §6's CLI surface). A single `dart_init` therefore only
    // ever sees its own unit; true multi-unit runs go through the safe
    // Rust API directly (`Runtime::init` over `LocalCommunicator::new_team`,
    // one OS thread per unit), as every crate below this one already tests.
    let comms = LocalCommunicator::new_team(size.max(1));
    let comm = comms
        .into_iter()
        .nth(id)
        .unwrap_or_else(|| panic!("dart-id {id} out of range for dart-size {size}"));

    match Runtime::init(comm, &config, dart_types::ThreadSupportLevel::Single) {
        Ok(rt) => {
            *guard = Some(rt);
            if !provided.is_null() {
                // SAFETY: caller guarantees `provided` is a valid,
                // properly aligned write target for one `DartThreadSupport`.
                unsafe {
                    *provided = dart_types::ThreadSupportLevel::Single.into();
                }
            }
            DartRet::Ok
        }
        Err(err) => DartRet::from(err),
    }
}

/// `dart_exit`: tears down the runtime. Idempotent: calling `exit` with no
/// runtime installed reports `ERR_NOTINIT` rather than aborting.
#[no_mangle]
pub extern "C" fn dart_exit() -> DartRet {
    let mut guard = lock_runtime();
    match guard.take() {
        Some(rt) => crate::status(rt.finalize().map_err(DartRet::from)),
        None => DartRet::ErrNotInit,
    }
}

/// `dart_initialized`: whether a runtime is currently installed.
#[no_mangle]
pub extern "C" fn dart_initialized() -> bool {
    lock_runtime().is_some()
}

/// `dart_abort`: logs, invokes the transport's fail-fast primitive, and
/// never returns. With no runtime installed, aborts the process directly.
#[no_mangle]
pub extern "C" fn dart_abort(errorcode: c_int) -> ! {
    let guard = lock_runtime();
    match guard.as_ref() {
        Some(rt) => rt.abort(errorcode),
        None => {
            log::error!("dart_abort: code {errorcode} (no runtime installed)");
            std::process::abort()
        }
    }
}

/// `dart_myid`: this unit's id within `TEAM_ALL`.
#[no_mangle]
pub extern "C" fn dart_myid(out: *mut TeamUnit) -> DartRet {
    crate::status(crate::with_runtime(|rt| {
        let id = rt.myid();
        if !out.is_null() {
            // SAFETY: caller guarantees `out` is a valid, properly aligned
            // write target for one `TeamUnit` (a transparent `i32`).
            unsafe {
                *out = id;
            }
        }
        Ok(())
    }))
}

/// `dart_size`: the number of units in `TEAM_ALL`.
#[no_mangle]
pub extern "C" fn dart_size(out: *mut usize) -> DartRet {
    crate::status(crate::with_runtime(|rt| {
        let size = rt.size();
        if !out.is_null() {
            // SAFETY: caller guarantees `out` is a valid, properly aligned
            // write target for one `usize`.
            unsafe {
                *out = size;
            }
        }
        Ok(())
    }))
}

/// Reads `argc` NUL-terminated C strings from `argv` into owned `String`s,
/// lossily on invalid UTF-8 (launcher flags and program names are always
/// plain ASCII in practice).
///
/// # Safety
/// `argv` must be null or point to `argc` valid, NUL-terminated C strings.
unsafe fn collect_argv(argc: c_int, argv: *const *const c_char) -> Vec<String> {
    if argv.is_null() || argc <= 0 {
        return Vec::new();
    }
    (0..argc as isize)
        .map(|i| {
            // SAFETY: caller guarantees `argv` has at least `argc` valid
            // entries, each a valid NUL-terminated C string.
            unsafe {
                let ptr = *argv.offset(i);
                std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_exit_roundtrips_and_rejects_double_init() {
        // Runs in-process against the shared, process-wide singleton;
        // serialized with every other test across this crate that touches
        // it via `crate::test_guard()`. Leaves the runtime uninitialized
        // on exit.
        let _guard = crate::test_guard();
        assert!(!dart_initialized());
        assert_eq!(
            // SAFETY: `argv` is null, `argc` is 0: no strings are read.
            unsafe { dart_init(0, std::ptr::null()) },
            DartRet::Ok
        );
        assert!(dart_initialized());
        assert_eq!(
            // SAFETY: same as above.
            unsafe { dart_init(0, std::ptr::null()) },
            DartRet::ErrOther
        );
        assert_eq!(dart_exit(), DartRet::Ok);
        assert!(!dart_initialized());
        assert_eq!(dart_exit(), DartRet::ErrNotInit);
    }

    #[test]
    fn myid_and_size_report_the_single_unit_default() {
        let _guard = crate::test_guard();
        // SAFETY: `argv` is null, `argc` is 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let mut id = TeamUnit::UNDEFINED;
        let mut size = 0usize;
        assert_eq!(dart_myid(&mut id as *mut _), DartRet::Ok);
        assert_eq!(dart_size(&mut size as *mut _), DartRet::Ok);
        assert_eq!(id, TeamUnit::new(0));
        assert_eq!(size, 1);
        dart_exit();
    }
}
