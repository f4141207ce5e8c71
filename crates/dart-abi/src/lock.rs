//! Team-scoped MCS lock (spec §4.J), grounded on `dart_team_lock_init`/
//! `dart_lock_acquire`/`dart_lock_try_acquire`/`dart_lock_release`/
//! `dart_team_lock_free`
//! (`examples/original_source/dart-impl/mpi/dart-mpi/dart_synchronization.c`).

use dart_lock::LockId;
use dart_types::TeamId;

use crate::{status, with_runtime, DartLock, DartRet};

/// `dart_team_lock_init`: collectively creates a lock over `teamid`.
///
/// # Safety
/// `lock`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_lock_init(teamid: i16, lock: *mut DartLock) -> DartRet {
    status(with_runtime(|rt| {
        let id = rt.team_lock_init(TeamId::new(teamid))?;
        if !lock.is_null() {
            // SAFETY: caller guarantees `lock` is a valid write target.
            unsafe {
                *lock = id.to_raw();
            }
        }
        Ok(())
    }))
}

/// `dart_lock_acquire`: blocks until this unit holds `lock`.
#[no_mangle]
pub extern "C" fn dart_lock_acquire(lock: DartLock) -> DartRet {
    status(with_runtime(|rt| rt.lock_acquire(LockId::from_raw(lock))))
}

/// `dart_lock_try_acquire`: non-blocking acquire; writes whether it
/// succeeded to `*result`.
///
/// # Safety
/// `result`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_lock_try_acquire(lock: DartLock, result: *mut i32) -> DartRet {
    status(with_runtime(|rt| {
        let acquired = rt.lock_try_acquire(LockId::from_raw(lock))?;
        if !result.is_null() {
            // SAFETY: caller guarantees `result` is a valid write target.
            unsafe {
                *result = acquired as i32;
            }
        }
        Ok(())
    }))
}

/// `dart_lock_release`: releases a lock held by this unit.
#[no_mangle]
pub extern "C" fn dart_lock_release(lock: DartLock) -> DartRet {
    status(with_runtime(|rt| rt.lock_release(LockId::from_raw(lock))))
}

/// `dart_team_lock_free`: destroys a lock created by
/// `dart_team_lock_init`.
#[no_mangle]
pub extern "C" fn dart_team_lock_free(lock: DartLock) -> DartRet {
    status(with_runtime(|rt| rt.team_lock_free(LockId::from_raw(lock))))
}
