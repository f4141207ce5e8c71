//! Plain-old-data types crossing the C boundary: the status enum, the
//! packed global pointer, and the C-facing mirrors of the base type and
//! operator enums (spec §6's wire layout,
//! `examples/original_source/dart-if/include/dash/dart/if/dart_types.h`'s
//! `dart_ret_t`/`dart_operation_t` ordering).

use dart_datatype::DatatypeHandle;
use dart_error::DartError;
use dart_types::{BaseType, GlobalPtr, Operation, ThreadSupportLevel};

/// Mirrors `dart_ret_t`. `ErrOther` keeps the original's `999` value; the
/// rest are assigned in the original's declaration order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DartRet {
    Ok = 0,
    Pending = 1,
    ErrInval = 2,
    ErrNotFound = 3,
    ErrNotInit = 4,
    ErrOther = 999,
}

impl From<DartError> for DartRet {
    fn from(err: DartError) -> Self {
        log::error!("{err}");
        match err {
            DartError::Inval(_) => DartRet::ErrInval,
            DartError::NotFound(_) => DartRet::ErrNotFound,
            DartError::NotInit => DartRet::ErrNotInit,
            DartError::Other(_) => DartRet::ErrOther,
        }
    }
}

/// Flattens a `Result<T, DartRet>` (the internal convenience alias
/// `with_runtime` returns) to the bare status code every ABI function
/// hands back, discarding `T`. Call sites that need `T` extract it first
/// and write it through an out-pointer before falling through to this.
pub(crate) fn status<T>(r: Result<T, DartRet>) -> DartRet {
    match r {
        Ok(_) => DartRet::Ok,
        Err(code) => code,
    }
}

/// The 128-bit global pointer's 16-byte wire layout, passed by value
/// across the ABI exactly as specified in spec §6.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DartGptr {
    pub bytes: [u8; 16],
}

impl From<GlobalPtr> for DartGptr {
    fn from(g: GlobalPtr) -> Self {
        DartGptr { bytes: g.to_bytes() }
    }
}

impl From<DartGptr> for GlobalPtr {
    fn from(g: DartGptr) -> Self {
        GlobalPtr::from_bytes(g.bytes)
    }
}

/// C-facing thread support level (`dart_thread_support_level_t`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DartThreadSupport {
    Single = 0,
    Multiple = 1,
}

impl From<DartThreadSupport> for ThreadSupportLevel {
    fn from(t: DartThreadSupport) -> Self {
        match t {
            DartThreadSupport::Single => ThreadSupportLevel::Single,
            DartThreadSupport::Multiple => ThreadSupportLevel::Multiple,
        }
    }
}

impl From<ThreadSupportLevel> for DartThreadSupport {
    fn from(t: ThreadSupportLevel) -> Self {
        match t {
            ThreadSupportLevel::Single => DartThreadSupport::Single,
            ThreadSupportLevel::Multiple => DartThreadSupport::Multiple,
        }
    }
}

/// C-facing predefined base type (`dart_datatype_t`'s predefined range),
/// in `dart_types::BaseType`'s declaration order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DartBaseType {
    Byte = 0,
    Short = 1,
    Int = 2,
    UInt = 3,
    Long = 4,
    ULong = 5,
    LongLong = 6,
    ULongLong = 7,
    Float = 8,
    Double = 9,
    LongDouble = 10,
}

impl From<DartBaseType> for BaseType {
    fn from(t: DartBaseType) -> Self {
        match t {
            DartBaseType::Byte => BaseType::Byte,
            DartBaseType::Short => BaseType::Short,
            DartBaseType::Int => BaseType::Int,
            DartBaseType::UInt => BaseType::UInt,
            DartBaseType::Long => BaseType::Long,
            DartBaseType::ULong => BaseType::ULong,
            DartBaseType::LongLong => BaseType::LongLong,
            DartBaseType::ULongLong => BaseType::ULongLong,
            DartBaseType::Float => BaseType::Float,
            DartBaseType::Double => BaseType::Double,
            DartBaseType::LongDouble => BaseType::LongDouble,
        }
    }
}

impl From<BaseType> for DartBaseType {
    fn from(t: BaseType) -> Self {
        match t {
            BaseType::Byte => DartBaseType::Byte,
            BaseType::Short => DartBaseType::Short,
            BaseType::Int => DartBaseType::Int,
            BaseType::UInt => DartBaseType::UInt,
            BaseType::Long => DartBaseType::Long,
            BaseType::ULong => DartBaseType::ULong,
            BaseType::LongLong => DartBaseType::LongLong,
            BaseType::ULongLong => DartBaseType::ULongLong,
            BaseType::Float => DartBaseType::Float,
            BaseType::Double => DartBaseType::Double,
            BaseType::LongDouble => DartBaseType::LongDouble,
        }
    }
}

/// C-facing reduction operator (`dart_operation_t`), in the original's
/// declaration order
/// (`examples/original_source/dart-if/include/dash/dart/if/dart_types.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DartOp {
    Min = 0,
    Max = 1,
    Sum = 2,
    Prod = 3,
    Band = 4,
    Land = 5,
    Bor = 6,
    Lor = 7,
    Bxor = 8,
    Lxor = 9,
    Replace = 10,
    NoOp = 11,
    MinMax = 12,
}

impl From<DartOp> for Operation {
    fn from(op: DartOp) -> Self {
        match op {
            DartOp::Min => Operation::Min,
            DartOp::Max => Operation::Max,
            DartOp::Sum => Operation::Sum,
            DartOp::Prod => Operation::Prod,
            DartOp::Band => Operation::Band,
            DartOp::Land => Operation::Land,
            DartOp::Bor => Operation::Bor,
            DartOp::Lor => Operation::Lor,
            DartOp::Bxor => Operation::Bxor,
            DartOp::Lxor => Operation::Lxor,
            DartOp::Replace => Operation::Replace,
            DartOp::NoOp => Operation::NoOp,
            DartOp::MinMax => Operation::MinMax,
        }
    }
}

/// Opaque non-blocking-operation handle, packed into a `u64` (`HandleId`'s
/// own `to_raw`/`from_raw`; `NULL` is `u64::MAX`).
pub type DartHandle = u64;

/// Opaque team-lock handle, packed into a `u64` (`LockId`'s own
/// `to_raw`/`from_raw`).
pub type DartLock = u64;

/// Opaque datatype handle, packed into a `u64`: predefined base types are
/// their `DartBaseType` discriminant, derived types set the top bit and
/// carry their registry id in the rest (ids never approach 2^63 in
/// practice, matching the original's pointer-sized opaque handle).
pub type DartDatatype = u64;

const DERIVED_TAG: u64 = 1 << 63;

pub(crate) fn datatype_to_raw(handle: DatatypeHandle) -> DartDatatype {
    match handle {
        DatatypeHandle::Base(b) => DartBaseType::from(b) as u64,
        DatatypeHandle::Derived(id) => id | DERIVED_TAG,
    }
}

pub(crate) fn datatype_from_raw(raw: DartDatatype) -> Option<DatatypeHandle> {
    if raw & DERIVED_TAG != 0 {
        Some(DatatypeHandle::Derived(raw & !DERIVED_TAG))
    } else {
        let base = match raw {
            0 => DartBaseType::Byte,
            1 => DartBaseType::Short,
            2 => DartBaseType::Int,
            3 => DartBaseType::UInt,
            4 => DartBaseType::Long,
            5 => DartBaseType::ULong,
            6 => DartBaseType::LongLong,
            7 => DartBaseType::ULongLong,
            8 => DartBaseType::Float,
            9 => DartBaseType::Double,
            10 => DartBaseType::LongDouble,
            _ => return None,
        };
        Some(DatatypeHandle::Base(base.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gptr_roundtrips_through_the_c_layout() {
        let g = GlobalPtr {
            unit: 3,
            flags: 0x12,
            segment_id: 5,
            team_id: dart_types::TeamId::new(1),
            addr_or_offset: 0xABCD,
        };
        let c: DartGptr = g.into();
        assert_eq!(GlobalPtr::from(c), g);
    }

    #[test]
    fn datatype_packing_distinguishes_base_from_derived() {
        let base = datatype_to_raw(DatatypeHandle::Base(BaseType::Int));
        assert_eq!(datatype_from_raw(base), Some(DatatypeHandle::Base(BaseType::Int)));

        let derived = datatype_to_raw(DatatypeHandle::Derived(7));
        assert_eq!(datatype_from_raw(derived), Some(DatatypeHandle::Derived(7)));
    }
}
