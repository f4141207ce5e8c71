//! Derived datatype operations (spec §4.K), grounded on
//! `dart_type_create_strided`/`dart_type_create_indexed`/`dart_type_destroy`
//! (`examples/original_source/dart-if/include/dash/dart/if/dart_types.h`).

use crate::types::{datatype_from_raw, datatype_to_raw};
use crate::{status, with_runtime, DartBaseType, DartDatatype, DartRet};

/// `dart_type_create_strided`: a repeating `blocklen`-element run of
/// `basetype` every `stride` elements.
///
/// # Safety
/// `newtype`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_type_create_strided(
    basetype: DartBaseType,
    stride: usize,
    blocklen: usize,
    newtype: *mut DartDatatype,
) -> DartRet {
    status(with_runtime(|rt| {
        let handle = rt.type_create_strided(basetype.into(), stride, blocklen)?;
        if !newtype.is_null() {
            // SAFETY: caller guarantees `newtype` is a valid write target.
            unsafe {
                *newtype = datatype_to_raw(handle);
            }
        }
        Ok(())
    }))
}

/// `dart_type_create_indexed`: `nblocks` runs of `basetype`, each with its
/// own length and start offset (in elements).
///
/// # Safety
/// `blocklen` and `offset` must each point to at least `nblocks` valid
/// `usize`s; `newtype`, if non-null, must be a valid write target.
#[no_mangle]
pub unsafe extern "C" fn dart_type_create_indexed(
    basetype: DartBaseType,
    nblocks: usize,
    blocklen: *const usize,
    offset: *const usize,
    newtype: *mut DartDatatype,
) -> DartRet {
    if (nblocks > 0 && (blocklen.is_null() || offset.is_null())) {
        return DartRet::ErrInval;
    }
    // SAFETY: caller guarantees `blocklen`/`offset` hold at least
    // `nblocks` valid entries each.
    let (blocklen, offset) = unsafe {
        (
            std::slice::from_raw_parts(blocklen, nblocks).to_vec(),
            std::slice::from_raw_parts(offset, nblocks).to_vec(),
        )
    };
    status(with_runtime(|rt| {
        let handle = rt.type_create_indexed(basetype.into(), blocklen.clone(), offset.clone())?;
        if !newtype.is_null() {
            // SAFETY: caller guarantees `newtype` is a valid write target.
            unsafe {
                *newtype = datatype_to_raw(handle);
            }
        }
        Ok(())
    }))
}

/// `dart_type_destroy`: releases a handle created by
/// `dart_type_create_strided`/`dart_type_create_indexed`. Destroying a
/// predefined base type is an invalid argument.
#[no_mangle]
pub extern "C" fn dart_type_destroy(dtype: DartDatatype) -> DartRet {
    let Some(handle) = datatype_from_raw(dtype) else {
        return DartRet::ErrInval;
    };
    status(with_runtime(|rt| rt.type_destroy(handle)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{dart_exit, dart_init};

    #[test]
    fn strided_type_roundtrips_through_destroy() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let mut dtype: DartDatatype = 0;
        let rc = unsafe {
            dart_type_create_strided(DartBaseType::Int, 4, 2, &mut dtype as *mut _)
        };
        assert_eq!(rc, DartRet::Ok);
        assert_eq!(dart_type_destroy(dtype), DartRet::Ok);
        dart_exit();
    }

    #[test]
    fn indexed_type_roundtrips_through_destroy() {
        let _guard = crate::test_guard();
        // SAFETY: null argv, argc 0.
        unsafe {
            dart_init(0, std::ptr::null());
        }
        let blocklen = [2usize, 3usize];
        let offset = [0usize, 5usize];
        let mut dtype: DartDatatype = 0;
        let rc = unsafe {
            dart_type_create_indexed(
                DartBaseType::Double,
                2,
                blocklen.as_ptr(),
                offset.as_ptr(),
                &mut dtype as *mut _,
            )
        };
        assert_eq!(rc, DartRet::Ok);
        assert_eq!(dart_type_destroy(dtype), DartRet::Ok);
        dart_exit();
    }

    #[test]
    fn destroying_a_predefined_base_type_is_invalid() {
        assert_eq!(dart_type_destroy(DartBaseType::Int as u64), DartRet::ErrInval);
    }
}
