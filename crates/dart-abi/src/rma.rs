//! One-sided RMA transfer (spec §4.G), grounded on `dart_put`/`dart_get`/
//! `dart_put_blocking`/`dart_get_blocking`/`dart_put_handle`/
//! `dart_get_handle`/`dart_flush*`/`dart_accumulate`/`dart_fetch_and_op`/
//! `dart_compare_and_swap`
//! (`examples/original_source/dart-if/include/dash/dart/if/dart_globmem.h`).

use dart_handle::HandleId;

use crate::{status, with_runtime, DartBaseType, DartGptr, DartHandle, DartOp, DartRet};

/// # Safety
/// `buf` must point to at least `nelem * src_type.size()` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn dart_put(
    gptr: DartGptr,
    buf: *const std::ffi::c_void,
    nelem: usize,
    src_type: DartBaseType,
    dst_type: DartBaseType,
) -> DartRet {
    let src: dart_types::BaseType = src_type.into();
    // SAFETY: caller guarantees `buf` holds at least `nelem * src.size()`
    // readable bytes.
    let bytes = unsafe { std::slice::from_raw_parts(buf as *const u8, nelem * src.size()) };
    status(with_runtime(|rt| rt.put(gptr.into(), bytes, nelem, src, dst_type.into())))
}

/// # Safety
/// `buf` must point to at least `nelem * dst_type.size()` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn dart_get(
    gptr: DartGptr,
    buf: *mut std::ffi::c_void,
    nelem: usize,
    src_type: DartBaseType,
    dst_type: DartBaseType,
) -> DartRet {
    let dst: dart_types::BaseType = dst_type.into();
    // SAFETY: caller guarantees `buf` holds at least `nelem * dst.size()`
    // writable bytes.
    let bytes = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, nelem * dst.size()) };
    status(with_runtime(|rt| rt.get(gptr.into(), bytes, nelem, src_type.into(), dst)))
}

/// # Safety
/// Same as `dart_put`.
#[no_mangle]
pub unsafe extern "C" fn dart_put_blocking(
    gptr: DartGptr,
    buf: *const std::ffi::c_void,
    nelem: usize,
    src_type: DartBaseType,
    dst_type: DartBaseType,
) -> DartRet {
    let src: dart_types::BaseType = src_type.into();
    // SAFETY: caller guarantees `buf` holds at least `nelem * src.size()`
    // readable bytes.
    let bytes = unsafe { std::slice::from_raw_parts(buf as *const u8, nelem * src.size()) };
    status(with_runtime(|rt| rt.put_blocking(gptr.into(), bytes, nelem, src, dst_type.into())))
}

/// # Safety
/// Same as `dart_get`.
#[no_mangle]
pub unsafe extern "C" fn dart_get_blocking(
    gptr: DartGptr,
    buf: *mut std::ffi::c_void,
    nelem: usize,
    src_type: DartBaseType,
    dst_type: DartBaseType,
) -> DartRet {
    let dst: dart_types::BaseType = dst_type.into();
    // SAFETY: caller guarantees `buf` holds at least `nelem * dst.size()`
    // writable bytes.
    let bytes = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, nelem * dst.size()) };
    status(with_runtime(|rt| rt.get_blocking(gptr.into(), bytes, nelem, src_type.into(), dst)))
}

/// # Safety
/// `buf` must point to at least `nelem * src_type.size()` readable bytes,
/// valid until the returned handle is waited/tested complete; `handle`, if
/// non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_put_handle(
    gptr: DartGptr,
    buf: *const std::ffi::c_void,
    nelem: usize,
    src_type: DartBaseType,
    dst_type: DartBaseType,
    handle: *mut DartHandle,
) -> DartRet {
    let src: dart_types::BaseType = src_type.into();
    // SAFETY: caller guarantees `buf` holds at least `nelem * src.size()`
    // readable bytes, valid for the operation's lifetime.
    let bytes = unsafe { std::slice::from_raw_parts(buf as *const u8, nelem * src.size()) };
    status(with_runtime(|rt| {
        let h = rt.put_handle(gptr.into(), bytes, nelem, src, dst_type.into())?;
        if !handle.is_null() {
            // SAFETY: caller guarantees `handle` is a valid write target.
            unsafe {
                *handle = h.to_raw();
            }
        }
        Ok(())
    }))
}

/// # Safety
/// `buf` must point to at least `nelem * dst_type.size()` writable bytes,
/// valid until the returned handle is waited/tested complete; `handle`, if
/// non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_get_handle(
    gptr: DartGptr,
    buf: *mut std::ffi::c_void,
    nelem: usize,
    src_type: DartBaseType,
    dst_type: DartBaseType,
    handle: *mut DartHandle,
) -> DartRet {
    let dst: dart_types::BaseType = dst_type.into();
    // SAFETY: caller guarantees `buf` holds at least `nelem * dst.size()`
    // writable bytes, valid for the operation's lifetime.
    let bytes = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, nelem * dst.size()) };
    status(with_runtime(|rt| {
        let h = rt.get_handle(gptr.into(), bytes, nelem, src_type.into(), dst)?;
        if !handle.is_null() {
            // SAFETY: caller guarantees `handle` is a valid write target.
            unsafe {
                *handle = h.to_raw();
            }
        }
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn dart_flush(gptr: DartGptr) -> DartRet {
    status(with_runtime(|rt| rt.flush(gptr.into())))
}

#[no_mangle]
pub extern "C" fn dart_flush_local(gptr: DartGptr) -> DartRet {
    status(with_runtime(|rt| rt.flush_local(gptr.into())))
}

#[no_mangle]
pub extern "C" fn dart_flush_all(gptr: DartGptr) -> DartRet {
    status(with_runtime(|rt| rt.flush_all(gptr.into())))
}

#[no_mangle]
pub extern "C" fn dart_flush_local_all(gptr: DartGptr) -> DartRet {
    status(with_runtime(|rt| rt.flush_local_all(gptr.into())))
}

/// # Safety
/// `values` must point to at least `nelem * ty.size()` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn dart_accumulate(
    gptr: DartGptr,
    values: *const std::ffi::c_void,
    nelem: usize,
    ty: DartBaseType,
    op: DartOp,
) -> DartRet {
    let ty: dart_types::BaseType = ty.into();
    // SAFETY: caller guarantees `values` holds at least `nelem * ty.size()`
    // readable bytes.
    let bytes = unsafe { std::slice::from_raw_parts(values as *const u8, nelem * ty.size()) };
    status(with_runtime(|rt| rt.accumulate(gptr.into(), bytes, nelem, ty, op.into())))
}

/// # Safety
/// Same as `dart_accumulate`.
#[no_mangle]
pub unsafe extern "C" fn dart_accumulate_blocking_local(
    gptr: DartGptr,
    values: *const std::ffi::c_void,
    nelem: usize,
    ty: DartBaseType,
    op: DartOp,
) -> DartRet {
    let ty: dart_types::BaseType = ty.into();
    // SAFETY: caller guarantees `values` holds at least `nelem * ty.size()`
    // readable bytes.
    let bytes = unsafe { std::slice::from_raw_parts(values as *const u8, nelem * ty.size()) };
    status(with_runtime(|rt| rt.accumulate_blocking_local(gptr.into(), bytes, nelem, ty, op.into())))
}

/// # Safety
/// `value` must point to one readable `ty`-sized element; `result` to one
/// writable `ty`-sized element.
#[no_mangle]
pub unsafe extern "C" fn dart_fetch_and_op(
    gptr: DartGptr,
    value: *const std::ffi::c_void,
    result: *mut std::ffi::c_void,
    ty: DartBaseType,
    op: DartOp,
) -> DartRet {
    let ty: dart_types::BaseType = ty.into();
    let size = ty.size();
    // SAFETY: caller guarantees `value`/`result` each hold one `ty`-sized
    // element, readable and writable respectively.
    let (value, result) = unsafe {
        (
            std::slice::from_raw_parts(value as *const u8, size),
            std::slice::from_raw_parts_mut(result as *mut u8, size),
        )
    };
    status(with_runtime(|rt| rt.fetch_and_op(gptr.into(), value, result, ty, op.into())))
}

/// # Safety
/// `value`, `compare` must each point to one readable `ty`-sized element;
/// `result` to one writable `ty`-sized element.
#[no_mangle]
pub unsafe extern "C" fn dart_compare_and_swap(
    gptr: DartGptr,
    value: *const std::ffi::c_void,
    compare: *const std::ffi::c_void,
    result: *mut std::ffi::c_void,
    ty: DartBaseType,
) -> DartRet {
    let ty: dart_types::BaseType = ty.into();
    let size = ty.size();
    // SAFETY: caller guarantees `value`/`compare`/`result` each hold one
    // `ty`-sized element, readable/readable/writable respectively.
    let (value, compare, result) = unsafe {
        (
            std::slice::from_raw_parts(value as *const u8, size),
            std::slice::from_raw_parts(compare as *const u8, size),
            std::slice::from_raw_parts_mut(result as *mut u8, size),
        )
    };
    status(with_runtime(|rt| rt.compare_and_swap(gptr.into(), value, compare, result, ty)))
}

// -- handles (spec §4.H) -----------------------------------------------------

#[no_mangle]
pub extern "C" fn dart_wait(handle: DartHandle) -> DartRet {
    status(with_runtime(|rt| rt.wait(HandleId::from_raw(handle))))
}

#[no_mangle]
pub extern "C" fn dart_wait_local(handle: DartHandle) -> DartRet {
    status(with_runtime(|rt| rt.wait_local(HandleId::from_raw(handle))))
}

/// # Safety
/// `result`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_test(handle: DartHandle, result: *mut i32) -> DartRet {
    status(with_runtime(|rt| {
        let done = rt.test(HandleId::from_raw(handle))?;
        if !result.is_null() {
            // SAFETY: caller guarantees `result` is a valid write target.
            unsafe {
                *result = done as i32;
            }
        }
        Ok(())
    }))
}

/// # Safety
/// Same as `dart_test`.
#[no_mangle]
pub unsafe extern "C" fn dart_test_local(handle: DartHandle, result: *mut i32) -> DartRet {
    status(with_runtime(|rt| {
        let done = rt.test_local(HandleId::from_raw(handle))?;
        if !result.is_null() {
            // SAFETY: caller guarantees `result` is a valid write target.
            unsafe {
                *result = done as i32;
            }
        }
        Ok(())
    }))
}

/// # Safety
/// `handles` must point to at least `n` valid `DartHandle`s.
#[no_mangle]
pub unsafe extern "C" fn dart_waitall(handles: *const DartHandle, n: usize) -> DartRet {
    // SAFETY: caller guarantees `handles` holds at least `n` entries.
    let ids: Vec<HandleId> = unsafe { std::slice::from_raw_parts(handles, n) }
        .iter()
        .map(|&h| HandleId::from_raw(h))
        .collect();
    status(with_runtime(|rt| rt.waitall(&ids)))
}

/// # Safety
/// Same as `dart_waitall`.
#[no_mangle]
pub unsafe extern "C" fn dart_waitall_local(handles: *const DartHandle, n: usize) -> DartRet {
    // SAFETY: caller guarantees `handles` holds at least `n` entries.
    let ids: Vec<HandleId> = unsafe { std::slice::from_raw_parts(handles, n) }
        .iter()
        .map(|&h| HandleId::from_raw(h))
        .collect();
    status(with_runtime(|rt| rt.waitall_local(&ids)))
}

/// # Safety
/// `handles` must point to at least `n` valid `DartHandle`s; `result`, if
/// non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_testall(handles: *const DartHandle, n: usize, result: *mut i32) -> DartRet {
    // SAFETY: caller guarantees `handles` holds at least `n` entries.
    let ids: Vec<HandleId> = unsafe { std::slice::from_raw_parts(handles, n) }
        .iter()
        .map(|&h| HandleId::from_raw(h))
        .collect();
    status(with_runtime(|rt| {
        let done = rt.testall(&ids)?;
        if !result.is_null() {
            // SAFETY: caller guarantees `result` is a valid write target.
            unsafe {
                *result = done as i32;
            }
        }
        Ok(())
    }))
}

/// # Safety
/// Same as `dart_testall`.
#[no_mangle]
pub unsafe extern "C" fn dart_testall_local(handles: *const DartHandle, n: usize, result: *mut i32) -> DartRet {
    // SAFETY: caller guarantees `handles` holds at least `n` entries.
    let ids: Vec<HandleId> = unsafe { std::slice::from_raw_parts(handles, n) }
        .iter()
        .map(|&h| HandleId::from_raw(h))
        .collect();
    status(with_runtime(|rt| {
        let done = rt.testall_local(&ids)?;
        if !result.is_null() {
            // SAFETY: caller guarantees `result` is a valid write target.
            unsafe {
                *result = done as i32;
            }
        }
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn dart_handle_free(handle: DartHandle) -> DartRet {
    status(with_runtime(|rt| rt.handle_free(HandleId::from_raw(handle))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{dart_exit, dart_init};
    use crate::memory::{dart_team_memalloc_aligned, dart_team_memfree};

    // RMA only applies to team/collective segments (`dart-rma::resolve`
    // rejects `SEGMENT_LOCAL` outright), so these allocate over `TEAM_ALL`
    // rather than through `dart_memalloc`.

    #[test]
    fn put_get_roundtrips_through_a_local_allocation() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let mut gptr = DartGptr { bytes: [0u8; 16] };
        unsafe {
            dart_team_memalloc_aligned(dart_types::TeamId::ALL.raw(), 4, &mut gptr as *mut _);
        }

        let value: i32 = 42;
        unsafe {
            dart_put(
                gptr,
                &value as *const i32 as *const std::ffi::c_void,
                1,
                DartBaseType::Int,
                DartBaseType::Int,
            );
        }
        assert_eq!(dart_flush(gptr), DartRet::Ok);

        let mut out: i32 = 0;
        unsafe {
            dart_get(
                gptr,
                &mut out as *mut i32 as *mut std::ffi::c_void,
                1,
                DartBaseType::Int,
                DartBaseType::Int,
            );
        }
        assert_eq!(out, 42);

        dart_team_memfree(dart_types::TeamId::ALL.raw(), gptr);
        dart_exit();
    }

    #[test]
    fn put_handle_completes_under_wait() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let mut gptr = DartGptr { bytes: [0u8; 16] };
        unsafe {
            dart_team_memalloc_aligned(dart_types::TeamId::ALL.raw(), 4, &mut gptr as *mut _);
        }

        let value: i32 = 7;
        let mut handle: DartHandle = dart_handle::HandleId::NULL.to_raw();
        unsafe {
            dart_put_handle(
                gptr,
                &value as *const i32 as *const std::ffi::c_void,
                1,
                DartBaseType::Int,
                DartBaseType::Int,
                &mut handle as *mut _,
            );
        }
        assert_eq!(dart_wait(handle), DartRet::Ok);

        dart_team_memfree(dart_types::TeamId::ALL.raw(), gptr);
        dart_exit();
    }
}
