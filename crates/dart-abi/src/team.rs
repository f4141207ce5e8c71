//! Team operations (spec §4.E), grounded on `dart_team_create`/
//! `dart_team_destroy`/`dart_team_myid`/`dart_team_size`/
//! `dart_team_get_group`/`dart_team_unit_l2g`/`dart_team_unit_g2l`/
//! `dart_barrier`
//! (`examples/original_source/dart-if/include/dash/dart/if/dart_team_group.h`).

use crate::group::DartGroup;
use crate::{status, with_runtime, DartRet};
use dart_types::{GlobalUnit, TeamId, TeamUnit};

/// `dart_team_create`: collectively derives a new team from `group`'s
/// members, a subset of `teamid`'s own. Writes the new team's id to
/// `newteam`.
///
/// # Safety
/// `group` must reference an initialized `DartGroup`; `newteam`, if
/// non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_create(
    teamid: i16,
    group: *const DartGroup,
    newteam: *mut i16,
) -> DartRet {
    if group.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `group` is initialized.
    let group = unsafe { (*group).group() };
    status(with_runtime(|rt| {
        let id = rt.team_create(TeamId::new(teamid), group)?;
        if !newteam.is_null() {
            // SAFETY: caller guarantees `newteam` is a valid write target.
            unsafe {
                *newteam = id.raw();
            }
        }
        Ok(())
    }))
}

/// `dart_team_destroy`: tears down a team created by `dart_team_create`.
/// `TEAM_ALL` may never be destroyed this way.
#[no_mangle]
pub extern "C" fn dart_team_destroy(teamid: i16) -> DartRet {
    status(with_runtime(|rt| rt.team_destroy(TeamId::new(teamid))))
}

/// `dart_team_myid`: this unit's id within `teamid`.
///
/// # Safety
/// `out`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_myid(teamid: i16, out: *mut TeamUnit) -> DartRet {
    status(with_runtime(|rt| {
        let id = rt.team_myid(TeamId::new(teamid))?;
        if !out.is_null() {
            // SAFETY: caller guarantees `out` is a valid write target.
            unsafe {
                *out = id;
            }
        }
        Ok(())
    }))
}

/// `dart_team_size`: the number of units in `teamid`.
///
/// # Safety
/// `out`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_size(teamid: i16, out: *mut usize) -> DartRet {
    status(with_runtime(|rt| {
        let size = rt.team_size(TeamId::new(teamid))?;
        if !out.is_null() {
            // SAFETY: caller guarantees `out` is a valid write target.
            unsafe {
                *out = size;
            }
        }
        Ok(())
    }))
}

/// `dart_team_get_group`: writes `teamid`'s member group into `group`,
/// which must already be `dart_group_init`'d.
///
/// # Safety
/// `group` must reference an initialized `DartGroup`.
#[no_mangle]
pub unsafe extern "C" fn dart_team_get_group(teamid: i16, group: *mut DartGroup) -> DartRet {
    if group.is_null() {
        return DartRet::ErrInval;
    }
    status(with_runtime(|rt| {
        let g = rt.team_get_group(TeamId::new(teamid))?;
        // SAFETY: caller guarantees `group` is initialized.
        unsafe {
            *(*group).group_mut() = g;
        }
        Ok(())
    }))
}

/// `dart_team_unit_l2g`: maps a unit id local to `teamid` to its
/// program-wide global id.
///
/// # Safety
/// `globalunit`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_unit_l2g(
    teamid: i16,
    localunit: TeamUnit,
    globalunit: *mut GlobalUnit,
) -> DartRet {
    status(with_runtime(|rt| {
        let g = rt.team_unit_l2g(TeamId::new(teamid), localunit)?;
        if !globalunit.is_null() {
            // SAFETY: caller guarantees `globalunit` is a valid write target.
            unsafe {
                *globalunit = g;
            }
        }
        Ok(())
    }))
}

/// `dart_team_unit_g2l`: maps a program-wide global unit id to its id
/// local to `teamid`.
///
/// # Safety
/// `localunit`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_team_unit_g2l(
    teamid: i16,
    globalunit: GlobalUnit,
    localunit: *mut TeamUnit,
) -> DartRet {
    status(with_runtime(|rt| {
        let l = rt.team_unit_g2l(TeamId::new(teamid), globalunit)?;
        if !localunit.is_null() {
            // SAFETY: caller guarantees `localunit` is a valid write target.
            unsafe {
                *localunit = l;
            }
        }
        Ok(())
    }))
}

/// `dart_barrier`: collective barrier over every member of `teamid`.
#[no_mangle]
pub extern "C" fn dart_barrier(teamid: i16) -> DartRet {
    status(with_runtime(|rt| rt.team_barrier(TeamId::new(teamid))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{dart_group_addmember, dart_group_fini, dart_group_init};
    use crate::init::{dart_exit, dart_init};

    #[test]
    fn create_split_team_then_destroy_it() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }

        let mut group = DartGroup { ptr: std::ptr::null_mut() };
        unsafe {
            dart_group_init(&mut group as *mut _);
            dart_group_addmember(&mut group as *mut _, 0);
        }

        let mut newteam: i16 = -1;
        let rc = unsafe { dart_team_create(TeamId::ALL.raw(), &group as *const _, &mut newteam as *mut _) };
        assert_eq!(rc, DartRet::Ok);
        assert_ne!(newteam, TeamId::ALL.raw());

        let mut size = 0usize;
        assert_eq!(unsafe { dart_team_size(newteam, &mut size as *mut _) }, DartRet::Ok);
        assert_eq!(size, 1);

        assert_eq!(dart_team_destroy(newteam), DartRet::Ok);

        unsafe {
            dart_group_fini(&mut group as *mut _);
        }
        dart_exit();
    }
}
