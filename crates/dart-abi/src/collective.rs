//! Collective operations (spec §4.I), built atop point-to-point
//! send/recv where no native collective exists, grounded on `dart_barrier`/
//! `dart_bcast`/`dart_scatter`/`dart_gather`/`dart_allgather`/
//! `dart_allgatherv`/`dart_alltoall`/`dart_reduce`/`dart_allreduce`
//! (`examples/original_source/dart-if/include/dash/dart/if/dart_communication.h`).
//!
//! `dart_barrier` lives on `team.rs` (spec groups it with team lifecycle
//! in the original header); this module covers the data-moving
//! collectives. None of these take an explicit unit count: like the
//! original, they look `teamid`'s size up themselves rather than trusting
//! a caller-supplied redundant parameter.

use dart_types::TeamId;

use crate::{status, with_runtime, DartBaseType, DartOp, DartRet};

fn team_size(teamid: i16) -> Result<usize, DartRet> {
    with_runtime(|rt| rt.team_size(TeamId::new(teamid)))
}

/// # Safety
/// `buf` must point to at least `nbytes` readable-and-writable bytes.
#[no_mangle]
pub unsafe extern "C" fn dart_bcast(
    teamid: i16,
    root: usize,
    buf: *mut std::ffi::c_void,
    nbytes: usize,
) -> DartRet {
    // SAFETY: caller guarantees `buf` holds at least `nbytes` bytes.
    let bytes = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, nbytes) };
    status(with_runtime(|rt| rt.bcast(TeamId::new(teamid), root, bytes)))
}

/// # Safety
/// `sendbuf` must point to at least `team_size(teamid) * chunk_size`
/// readable bytes (only read on `root`); `recvbuf` to at least
/// `chunk_size` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn dart_scatter(
    teamid: i16,
    root: usize,
    sendbuf: *const std::ffi::c_void,
    recvbuf: *mut std::ffi::c_void,
    chunk_size: usize,
) -> DartRet {
    let size = match team_size(teamid) {
        Ok(n) => n,
        Err(e) => return e,
    };
    // SAFETY: caller guarantees `sendbuf`/`recvbuf` hold the documented
    // number of bytes for a team of this size.
    let (send, recv) = unsafe {
        (
            std::slice::from_raw_parts(sendbuf as *const u8, size * chunk_size),
            std::slice::from_raw_parts_mut(recvbuf as *mut u8, chunk_size),
        )
    };
    status(with_runtime(|rt| rt.scatter(TeamId::new(teamid), root, send, recv, chunk_size)))
}

/// # Safety
/// `sendbuf` must point to at least `chunk_size` readable bytes;
/// `recvbuf` to at least `team_size(teamid) * chunk_size` writable bytes
/// (only written on `root`).
#[no_mangle]
pub unsafe extern "C" fn dart_gather(
    teamid: i16,
    root: usize,
    sendbuf: *const std::ffi::c_void,
    recvbuf: *mut std::ffi::c_void,
    chunk_size: usize,
) -> DartRet {
    let size = match team_size(teamid) {
        Ok(n) => n,
        Err(e) => return e,
    };
    // SAFETY: caller guarantees `sendbuf`/`recvbuf` hold the documented
    // number of bytes for a team of this size.
    let (send, recv) = unsafe {
        (
            std::slice::from_raw_parts(sendbuf as *const u8, chunk_size),
            std::slice::from_raw_parts_mut(recvbuf as *mut u8, size * chunk_size),
        )
    };
    status(with_runtime(|rt| rt.gather(TeamId::new(teamid), root, send, recv, chunk_size)))
}

/// # Safety
/// `sendbuf` must point to at least `chunk_size` readable bytes;
/// `recvbuf` to at least `team_size(teamid) * chunk_size` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn dart_allgather(
    teamid: i16,
    sendbuf: *const std::ffi::c_void,
    recvbuf: *mut std::ffi::c_void,
    chunk_size: usize,
) -> DartRet {
    let size = match team_size(teamid) {
        Ok(n) => n,
        Err(e) => return e,
    };
    // SAFETY: caller guarantees `sendbuf`/`recvbuf` hold the documented
    // number of bytes for a team of this size.
    let (send, recv) = unsafe {
        (
            std::slice::from_raw_parts(sendbuf as *const u8, chunk_size),
            std::slice::from_raw_parts_mut(recvbuf as *mut u8, size * chunk_size),
        )
    };
    status(with_runtime(|rt| rt.allgather(TeamId::new(teamid), send, recv, chunk_size)))
}

/// # Safety
/// `sendbuf` must point to at least `sendbytes` readable bytes; `recvbuf`
/// to at least `sum(recvcounts)` writable bytes; `recvcounts`/`displs`
/// must each point to at least `team_size(teamid)` valid `usize`s.
#[no_mangle]
pub unsafe extern "C" fn dart_allgatherv(
    teamid: i16,
    sendbuf: *const std::ffi::c_void,
    sendbytes: usize,
    recvbuf: *mut std::ffi::c_void,
    recvcounts: *const usize,
    displs: *const usize,
) -> DartRet {
    let size = match team_size(teamid) {
        Ok(n) => n,
        Err(e) => return e,
    };
    // SAFETY: caller guarantees `recvcounts`/`displs` hold at least
    // `team_size(teamid)` entries each.
    let (counts, displs) = unsafe {
        (
            std::slice::from_raw_parts(recvcounts, size),
            std::slice::from_raw_parts(displs, size),
        )
    };
    let total: usize = counts.iter().sum();
    // SAFETY: caller guarantees `sendbuf` holds `sendbytes` bytes and
    // `recvbuf` holds `total` bytes, per `recvcounts`' declared sizes.
    let (send, recv) = unsafe {
        (
            std::slice::from_raw_parts(sendbuf as *const u8, sendbytes),
            std::slice::from_raw_parts_mut(recvbuf as *mut u8, total),
        )
    };
    status(with_runtime(|rt| rt.allgatherv(TeamId::new(teamid), send, recv, counts, displs)))
}

/// # Safety
/// `sendbuf`/`recvbuf` must each point to at least
/// `team_size(teamid) * nbytes` readable/writable bytes respectively.
#[no_mangle]
pub unsafe extern "C" fn dart_alltoall(
    teamid: i16,
    sendbuf: *const std::ffi::c_void,
    recvbuf: *mut std::ffi::c_void,
    nbytes: usize,
) -> DartRet {
    let size = match team_size(teamid) {
        Ok(n) => n,
        Err(e) => return e,
    };
    // SAFETY: caller guarantees `sendbuf`/`recvbuf` hold the documented
    // number of bytes for a team of this size.
    let (send, recv) = unsafe {
        (
            std::slice::from_raw_parts(sendbuf as *const u8, size * nbytes),
            std::slice::from_raw_parts_mut(recvbuf as *mut u8, size * nbytes),
        )
    };
    status(with_runtime(|rt| rt.alltoall(TeamId::new(teamid), send, recv, nbytes)))
}

/// # Safety
/// `sendbuf`/`recvbuf` must each point to at least `nelem * ty.size()`
/// readable/writable bytes respectively (`recvbuf` only written on
/// `root`).
#[no_mangle]
pub unsafe extern "C" fn dart_reduce(
    teamid: i16,
    root: usize,
    sendbuf: *const std::ffi::c_void,
    recvbuf: *mut std::ffi::c_void,
    nelem: usize,
    ty: DartBaseType,
    op: DartOp,
) -> DartRet {
    let ty: dart_types::BaseType = ty.into();
    let size = nelem * ty.size();
    // SAFETY: caller guarantees `sendbuf`/`recvbuf` each hold `size` bytes.
    let (send, recv) = unsafe {
        (
            std::slice::from_raw_parts(sendbuf as *const u8, size),
            std::slice::from_raw_parts_mut(recvbuf as *mut u8, size),
        )
    };
    status(with_runtime(|rt| rt.reduce(TeamId::new(teamid), root, send, recv, nelem, ty, op.into())))
}

/// # Safety
/// Same as `dart_reduce`, written on every unit.
#[no_mangle]
pub unsafe extern "C" fn dart_allreduce(
    teamid: i16,
    sendbuf: *const std::ffi::c_void,
    recvbuf: *mut std::ffi::c_void,
    nelem: usize,
    ty: DartBaseType,
    op: DartOp,
) -> DartRet {
    let ty: dart_types::BaseType = ty.into();
    let size = nelem * ty.size();
    // SAFETY: caller guarantees `sendbuf`/`recvbuf` each hold `size` bytes.
    let (send, recv) = unsafe {
        (
            std::slice::from_raw_parts(sendbuf as *const u8, size),
            std::slice::from_raw_parts_mut(recvbuf as *mut u8, size),
        )
    };
    status(with_runtime(|rt| rt.allreduce(TeamId::new(teamid), send, recv, nelem, ty, op.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{dart_exit, dart_init};

    #[test]
    fn bcast_from_a_single_unit_is_a_no_op() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let mut value: i32 = 5;
        let rc = unsafe {
            dart_bcast(
                dart_types::TeamId::ALL.raw(),
                0,
                &mut value as *mut i32 as *mut std::ffi::c_void,
                4,
            )
        };
        assert_eq!(rc, DartRet::Ok);
        assert_eq!(value, 5);
        dart_exit();
    }

    #[test]
    fn allgather_over_a_single_unit_copies_the_one_chunk() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let send: i32 = 11;
        let mut recv: i32 = 0;
        let rc = unsafe {
            dart_allgather(
                dart_types::TeamId::ALL.raw(),
                &send as *const i32 as *const std::ffi::c_void,
                &mut recv as *mut i32 as *mut std::ffi::c_void,
                4,
            )
        };
        assert_eq!(rc, DartRet::Ok);
        assert_eq!(recv, 11);
        dart_exit();
    }

    #[test]
    fn allreduce_sum_over_a_single_unit_is_identity() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let send: i32 = 3;
        let mut recv: i32 = 0;
        let rc = unsafe {
            dart_allreduce(
                dart_types::TeamId::ALL.raw(),
                &send as *const i32 as *const std::ffi::c_void,
                &mut recv as *mut i32 as *mut std::ffi::c_void,
                1,
                DartBaseType::Int,
                DartOp::Sum,
            )
        };
        assert_eq!(rc, DartRet::Ok);
        assert_eq!(recv, 3);
        dart_exit();
    }
}
