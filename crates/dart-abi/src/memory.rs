//! Memory allocation and global-pointer accessors (spec §4.A/§4.C),
//! grounded on `dart_memalloc`/`dart_memfree`/`dart_team_memalloc_aligned`/
//! `dart_team_memfree`/`dart_team_memregister`/`dart_team_memderegister`/
//! `dart_gptr_getaddr`/`dart_gptr_setaddr`
//! (`examples/original_source/dart-if/include/dash/dart/if/dart_globmem.h`).

use crate::{status, with_runtime, DartGptr, DartRet};
use dart_types::TeamId;

/// `dart_memalloc`: local, non-collective allocation from this unit's own
/// arena.
///
/// # Safety
/// `gptr`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_memalloc(nbytes: usize, gptr: *mut DartGptr) -> DartRet {
    status(with_runtime(|rt| {
        let g = rt.memalloc(nbytes)?;
        if !gptr.is_null() {
            // SAFETY: caller guarantees `gptr` is a valid write target.
            unsafe {
                *gptr = g.into();
            }
        }
        Ok(())
    }))
}

/// `dart_memfree`: frees an allocation made by `dart_memalloc`.
#[no_mangle]
pub extern "C" fn dart_memfree(gptr: DartGptr) -> DartRet {
    status(with_runtime(|rt| rt.memfree(gptr.into())))
}

/// `dart_team_memalloc_aligned`: collective allocation over `teamid`,
/// symmetric across every member.
///
/// # Safety
/// `gptr`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_memalloc_aligned(
    teamid: i16,
    nbytes: usize,
    gptr: *mut DartGptr,
) -> DartRet {
    status(with_runtime(|rt| {
        let g = rt.team_memalloc_aligned(TeamId::new(teamid), nbytes)?;
        if !gptr.is_null() {
            // SAFETY: caller guarantees `gptr` is a valid write target.
            unsafe {
                *gptr = g.into();
            }
        }
        Ok(())
    }))
}

/// `dart_team_memfree`: frees an allocation made by
/// `dart_team_memalloc_aligned`/`dart_team_memregister*`.
#[no_mangle]
pub extern "C" fn dart_team_memfree(teamid: i16, gptr: DartGptr) -> DartRet {
    status(with_runtime(|rt| rt.team_memfree(TeamId::new(teamid), gptr.into())))
}

/// `dart_team_memregister`: registers an externally-sized, not
/// necessarily symmetric buffer contributed by this unit.
///
/// # Safety
/// `gptr`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_memregister(
    teamid: i16,
    nbytes: usize,
    gptr: *mut DartGptr,
) -> DartRet {
    status(with_runtime(|rt| {
        let g = rt.team_memregister(TeamId::new(teamid), nbytes)?;
        if !gptr.is_null() {
            // SAFETY: caller guarantees `gptr` is a valid write target.
            unsafe {
                *gptr = g.into();
            }
        }
        Ok(())
    }))
}

/// `dart_team_memregister_aligned`: `dart_team_memregister`, additionally
/// marked team-aligned. Every member must in fact contribute the same
/// `nbytes`; this is a caller obligation, not locally verified.
///
/// # Safety
/// `gptr`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_memregister_aligned(
    teamid: i16,
    nbytes: usize,
    gptr: *mut DartGptr,
) -> DartRet {
    status(with_runtime(|rt| {
        let g = rt.team_memregister_aligned(TeamId::new(teamid), nbytes)?;
        if !gptr.is_null() {
            // SAFETY: caller guarantees `gptr` is a valid write target.
            unsafe {
                *gptr = g.into();
            }
        }
        Ok(())
    }))
}

/// `dart_team_memderegister`: deregisters a buffer registered by
/// `dart_team_memregister*`. Rejects while any issued-but-unconsumed
/// handle still references the segment.
#[no_mangle]
pub extern "C" fn dart_team_memderegister(teamid: i16, gptr: DartGptr) -> DartRet {
    status(with_runtime(|rt| rt.team_memderegister(TeamId::new(teamid), gptr.into())))
}

/// `dart_gptr_getaddr`: this process's local address for `gptr`, when
/// resolvable without remote communication. Writes `NULL` (not an error)
/// to `*addr` when the pointer cannot be resolved locally.
///
/// # Safety
/// `addr`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_gptr_getaddr(gptr: DartGptr, addr: *mut *mut std::ffi::c_void) -> DartRet {
    status(with_runtime(|rt| {
        let local = rt.getaddr(gptr.into())?;
        if !addr.is_null() {
            // SAFETY: caller guarantees `addr` is a valid write target.
            unsafe {
                *addr = local.map_or(std::ptr::null_mut(), |a| a as *mut std::ffi::c_void);
            }
        }
        Ok(())
    }))
}

/// `dart_gptr_setaddr`: wraps an already-held local address as a gptr
/// over the local non-collective segment.
///
/// # Safety
/// `gptr`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_gptr_setaddr(addr: *mut std::ffi::c_void, gptr: *mut DartGptr) -> DartRet {
    status(with_runtime(|rt| {
        let g = rt.setaddr(addr as usize);
        if !gptr.is_null() {
            // SAFETY: caller guarantees `gptr` is a valid write target.
            unsafe {
                *gptr = g.into();
            }
        }
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{dart_exit, dart_init};

    #[test]
    fn memalloc_memfree_roundtrip() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let mut gptr = DartGptr { bytes: [0u8; 16] };
        assert_eq!(unsafe { dart_memalloc(64, &mut gptr as *mut _) }, DartRet::Ok);
        assert_eq!(dart_memfree(gptr), DartRet::Ok);
        dart_exit();
    }

    #[test]
    fn getaddr_resolves_a_local_allocation() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let mut gptr = DartGptr { bytes: [0u8; 16] };
        unsafe {
            dart_memalloc(32, &mut gptr as *mut _);
        }
        let mut addr = std::ptr::null_mut();
        assert_eq!(unsafe { dart_gptr_getaddr(gptr, &mut addr as *mut _) }, DartRet::Ok);
        assert!(!addr.is_null());
        dart_memfree(gptr);
        dart_exit();
    }
}
