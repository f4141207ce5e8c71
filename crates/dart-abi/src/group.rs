//! Group operations (spec §4.D), the ten functions enumerated in spec §6,
//! grounded on `dart_group_init`/`dart_group_union`/`dart_group_split`/…
//! (`examples/original_source/spec/dart_groups.h`).
//!
//! `dart_group_t` is opaque to C callers and carries local state only (no
//! communication context, spec §3). We back it with a boxed
//! [`dart_group::Group`] reached through a raw pointer stored in the
//! fixed-size `DartGroup` handle, mirroring the original's "opaque struct,
//! `dart_group_sizeof()` tells the caller how much storage to reserve"
//! contract without relying on `Group`'s Rust layout being stable.

use dart_group::Group;
use dart_types::GlobalUnit;

use crate::DartRet;

/// Opaque group handle. Must be `dart_group_init`'d before any other use
/// and `dart_group_fini`'d exactly once to reclaim its backing `Group`.
#[repr(C)]
pub struct DartGroup {
    pub(crate) ptr: *mut Group,
}

impl DartGroup {
    /// # Safety
    /// `self.ptr` must have been produced by `dart_group_init` and not yet
    /// `dart_group_fini`'d.
    pub(crate) unsafe fn group(&self) -> &Group {
        // SAFETY: forwarded from the caller's own precondition.
        unsafe { &*self.ptr }
    }

    /// # Safety
    /// Same as `group`.
    pub(crate) unsafe fn group_mut(&mut self) -> &mut Group {
        // SAFETY: forwarded from the caller's own precondition.
        unsafe { &mut *self.ptr }
    }
}

/// `dart_group_init`: must precede any other call on `group`.
///
/// # Safety
/// `group` must be a valid, properly aligned write target for one
/// `DartGroup`.
#[no_mangle]
pub unsafe extern "C" fn dart_group_init(group: *mut DartGroup) -> DartRet {
    if group.is_null() {
        return DartRet::ErrInval;
    }
    let boxed = Box::new(Group::new());
    // SAFETY: caller guarantees `group` is a valid write target.
    unsafe {
        (*group).ptr = Box::into_raw(boxed);
    }
    DartRet::Ok
}

/// `dart_group_fini`: reclaims the group's backing storage.
///
/// # Safety
/// `group` must point to a `DartGroup` previously initialized by
/// `dart_group_init` and not yet finalized.
#[no_mangle]
pub unsafe extern "C" fn dart_group_fini(group: *mut DartGroup) -> DartRet {
    if group.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `group` was produced by `dart_group_init`.
    unsafe {
        drop(Box::from_raw((*group).ptr));
        (*group).ptr = std::ptr::null_mut();
    }
    DartRet::Ok
}

/// `dart_group_copy`: value-copies `gin` into `gout`, which must already
/// be initialized.
///
/// # Safety
/// Both pointers must reference initialized `DartGroup`s; they may not
/// alias.
#[no_mangle]
pub unsafe extern "C" fn dart_group_copy(gin: *const DartGroup, gout: *mut DartGroup) -> DartRet {
    if gin.is_null() || gout.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees both are initialized, non-aliasing.
    unsafe {
        *(*gout).group_mut() = (*gin).group().clone();
    }
    DartRet::Ok
}

/// `dart_group_union`: ordered union of `g1` and `g2` into `gout`.
///
/// # Safety
/// All three pointers must reference initialized `DartGroup`s.
#[no_mangle]
pub unsafe extern "C" fn dart_group_union(
    g1: *const DartGroup,
    g2: *const DartGroup,
    gout: *mut DartGroup,
) -> DartRet {
    if g1.is_null() || g2.is_null() || gout.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees all three are initialized.
    unsafe {
        let u = (*g1).group().union((*g2).group());
        *(*gout).group_mut() = u;
    }
    DartRet::Ok
}

/// `dart_group_intersect`: ordered intersection of `g1` and `g2` into
/// `gout`.
///
/// # Safety
/// Same as `dart_group_union`.
#[no_mangle]
pub unsafe extern "C" fn dart_group_intersect(
    g1: *const DartGroup,
    g2: *const DartGroup,
    gout: *mut DartGroup,
) -> DartRet {
    if g1.is_null() || g2.is_null() || gout.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees all three are initialized.
    unsafe {
        let i = (*g1).group().intersect((*g2).group());
        *(*gout).group_mut() = i;
    }
    DartRet::Ok
}

/// `dart_group_addmember`: inserts `unitid`, preserving order, idempotent.
///
/// # Safety
/// `g` must reference an initialized `DartGroup`.
#[no_mangle]
pub unsafe extern "C" fn dart_group_addmember(g: *mut DartGroup, unitid: i32) -> DartRet {
    if g.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `g` is initialized.
    unsafe {
        (*g).group_mut().addmember(GlobalUnit::new(unitid));
    }
    DartRet::Ok
}

/// `dart_group_delmember`: removes `unitid`; a no-op if absent.
///
/// # Safety
/// Same as `dart_group_addmember`.
#[no_mangle]
pub unsafe extern "C" fn dart_group_delmember(g: *mut DartGroup, unitid: i32) -> DartRet {
    if g.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `g` is initialized.
    unsafe {
        (*g).group_mut().delmember(GlobalUnit::new(unitid));
    }
    DartRet::Ok
}

/// `dart_group_ismember`: writes a boolean predicate into `*ismember`.
///
/// # Safety
/// `g` must reference an initialized `DartGroup`; `ismember`, if
/// non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_group_ismember(
    g: *const DartGroup,
    unitid: i32,
    ismember: *mut i32,
) -> DartRet {
    if g.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `g` is initialized.
    let is_member = unsafe { (*g).group().ismember(GlobalUnit::new(unitid)) };
    if !ismember.is_null() {
        // SAFETY: caller guarantees `ismember` is a valid write target.
        unsafe {
            *ismember = is_member as i32;
        }
    }
    DartRet::Ok
}

/// `dart_group_size`: `|g|`.
///
/// # Safety
/// `g` must reference an initialized `DartGroup`; `size`, if non-null,
/// must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_group_size(g: *const DartGroup, size: *mut usize) -> DartRet {
    if g.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `g` is initialized.
    let n = unsafe { (*g).group().size() };
    if !size.is_null() {
        // SAFETY: caller guarantees `size` is a valid write target.
        unsafe {
            *size = n;
        }
    }
    DartRet::Ok
}

/// `dart_group_getmembers`: fills `unitids` with the group's members in
/// order. `unitids` must be large enough to hold `dart_group_size()`
/// entries.
///
/// # Safety
/// `g` must reference an initialized `DartGroup`; `unitids` must point to
/// at least `(*g).size()` writable `i32`s.
#[no_mangle]
pub unsafe extern "C" fn dart_group_getmembers(g: *const DartGroup, unitids: *mut i32) -> DartRet {
    if g.is_null() || unitids.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `g` is initialized and `unitids` holds
    // at least `size()` entries.
    unsafe {
        for (i, member) in (*g).group().getmembers().iter().enumerate() {
            *unitids.add(i) = member.raw();
        }
    }
    DartRet::Ok
}

/// `dart_group_split`: partitions `g` into at most `n` contiguous,
/// near-equal sub-groups, written into the first `*nout` entries of
/// `gout` (each already `dart_group_init`'d by the caller, per the
/// original's "`gout` must be an array of `dart_group_t` objects of size
/// at least n" contract).
///
/// # Safety
/// `g` must reference an initialized `DartGroup`; `gout` must point to at
/// least `n` initialized `DartGroup`s; `nout`, if non-null, must be a
/// valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_group_split(
    g: *const DartGroup,
    n: usize,
    nout: *mut usize,
    gout: *mut DartGroup,
) -> DartRet {
    if g.is_null() || gout.is_null() {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `g` is initialized and `gout` holds at
    // least `n` initialized `DartGroup`s.
    let parts = unsafe { (*g).group().split(n) };
    if !nout.is_null() {
        // SAFETY: caller guarantees `nout` is a valid write target.
        unsafe {
            *nout = parts.len();
        }
    }
    for (i, part) in parts.into_iter().enumerate() {
        // SAFETY: `i < parts.len() <= n`, within `gout`'s guaranteed bound.
        unsafe {
            *(*gout.add(i)).group_mut() = part;
        }
    }
    DartRet::Ok
}

/// `dart_group_sizeof`: the opaque handle's size, for callers that
/// allocate `DartGroup` storage themselves.
#[no_mangle]
pub extern "C" fn dart_group_sizeof() -> usize {
    std::mem::size_of::<DartGroup>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_group() -> DartGroup {
        let mut g = DartGroup { ptr: std::ptr::null_mut() };
        assert_eq!(unsafe { dart_group_init(&mut g as *mut _) }, DartRet::Ok);
        g
    }

    #[test]
    fn addmember_then_ismember() {
        let mut g = init_group();
        unsafe {
            dart_group_addmember(&mut g as *mut _, 3);
            let mut is_member = 0i32;
            dart_group_ismember(&g as *const _, 3, &mut is_member as *mut _);
            assert_eq!(is_member, 1);
            dart_group_ismember(&g as *const _, 4, &mut is_member as *mut _);
            assert_eq!(is_member, 0);
            dart_group_fini(&mut g as *mut _);
        }
    }

    #[test]
    fn union_and_getmembers_roundtrip() {
        unsafe {
            let mut g1 = init_group();
            let mut g2 = init_group();
            dart_group_addmember(&mut g1 as *mut _, 0);
            dart_group_addmember(&mut g1 as *mut _, 2);
            dart_group_addmember(&mut g2 as *mut _, 1);

            let mut out = init_group();
            dart_group_union(&g1 as *const _, &g2 as *const _, &mut out as *mut _);

            let mut size = 0usize;
            dart_group_size(&out as *const _, &mut size as *mut _);
            assert_eq!(size, 3);

            let mut members = vec![0i32; 3];
            dart_group_getmembers(&out as *const _, members.as_mut_ptr());
            assert_eq!(members, vec![0, 1, 2]);

            dart_group_fini(&mut g1 as *mut _);
            dart_group_fini(&mut g2 as *mut _);
            dart_group_fini(&mut out as *mut _);
        }
    }

    #[test]
    fn split_covers_every_member() {
        unsafe {
            let mut g = init_group();
            for u in 0..8 {
                dart_group_addmember(&mut g as *mut _, u);
            }
            let mut parts: Vec<DartGroup> = (0..4).map(|_| init_group()).collect();
            let mut nout = 0usize;
            dart_group_split(&g as *const _, 4, &mut nout as *mut _, parts.as_mut_ptr());
            assert_eq!(nout, 4);
            let mut total = 0usize;
            for part in &parts {
                let mut sz = 0usize;
                dart_group_size(part as *const _, &mut sz as *mut _);
                total += sz;
            }
            assert_eq!(total, 8);

            dart_group_fini(&mut g as *mut _);
            for mut p in parts {
                dart_group_fini(&mut p as *mut _);
            }
        }
    }

    #[test]
    fn sizeof_is_one_pointer() {
        assert_eq!(dart_group_sizeof(), std::mem::size_of::<*mut Group>());
    }
}
