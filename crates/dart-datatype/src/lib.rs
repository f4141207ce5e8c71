//! Predefined base types plus dynamically created strided/indexed derived
//! types (spec §4.K), grounded in `dart_type_create_strided` /
//! `dart_type_create_indexed` / `dart_type_destroy`
//! (`examples/original_source/dart-if/include/dash/dart/if/dart_types.h`).

use dart_error::{DartError, DartResult};
use dart_types::{BaseType, Operation};
use hashbrown::HashMap;

/// Layout of a derived datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Blocks of `blocklen` elements of `base`, `stride` elements apart.
    Strided {
        base: BaseType,
        stride: usize,
        blocklen: usize,
    },
    /// `blocklen[i]`-element blocks of `base` starting at `offset[i]`.
    Indexed {
        base: BaseType,
        blocklen: Vec<usize>,
        offset: Vec<usize>,
    },
}

impl Layout {
    /// The innermost base type blocks are made of.
    pub fn base(&self) -> BaseType {
        match self {
            Layout::Strided { base, .. } => *base,
            Layout::Indexed { base, .. } => *base,
        }
    }

    /// Sum of all block lengths, in base-type elements: a transfer of `n`
    /// elements over this type must have `n` be a multiple of this value.
    pub fn block_unit(&self) -> usize {
        match self {
            Layout::Strided { blocklen, .. } => *blocklen,
            Layout::Indexed { blocklen, .. } => blocklen.iter().sum(),
        }
    }
}

/// An opaque datatype handle, either a predefined base type or a derived
/// type minted by this registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatatypeHandle {
    Base(BaseType),
    Derived(u64),
}

impl DatatypeHandle {
    /// Size in bytes of one base-type element addressed through this
    /// handle (for a derived type, its innermost base type's size).
    pub fn element_size(self, registry: &DatatypeRegistry) -> DartResult<usize> {
        match self {
            DatatypeHandle::Base(b) => Ok(b.size()),
            DatatypeHandle::Derived(id) => registry
                .lookup(id)
                .map(|layout| layout.base().size()),
        }
    }
}

/// Process-wide table of live derived datatypes. Base types need no
/// registration; they are `DatatypeHandle::Base` directly.
#[derive(Debug, Default)]
pub struct DatatypeRegistry {
    next_id: u64,
    derived: HashMap<u64, Layout>,
}

impl DatatypeRegistry {
    pub fn new() -> Self {
        DatatypeRegistry::default()
    }

    /// Creates a strided derived type. `blocklen` must be nonzero.
    pub fn create_strided(
        &mut self,
        base: BaseType,
        stride: usize,
        blocklen: usize,
    ) -> DartResult<DatatypeHandle> {
        if blocklen == 0 {
            return Err(DartError::Inval("strided datatype blocklen must be nonzero"));
        }
        Ok(self.insert(Layout::Strided {
            base,
            stride,
            blocklen,
        }))
    }

    /// Creates an indexed derived type. `blocklen` and `offset` must have
    /// matching, nonzero length.
    pub fn create_indexed(
        &mut self,
        base: BaseType,
        blocklen: Vec<usize>,
        offset: Vec<usize>,
    ) -> DartResult<DatatypeHandle> {
        if blocklen.is_empty() || blocklen.len() != offset.len() {
            return Err(DartError::Inval(
                "indexed datatype requires matching, nonempty blocklen/offset",
            ));
        }
        Ok(self.insert(Layout::Indexed {
            base,
            blocklen,
            offset,
        }))
    }

    fn insert(&mut self, layout: Layout) -> DatatypeHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.derived.insert(id, layout);
        DatatypeHandle::Derived(id)
    }

    /// Destroys a derived type. Callable while operations using it are
    /// still in flight (they already resolved their layout at issue time);
    /// this only prevents *new* operations from resolving the handle.
    pub fn destroy(&mut self, handle: DatatypeHandle) -> DartResult<()> {
        match handle {
            DatatypeHandle::Base(_) => {
                Err(DartError::Inval("predefined base types cannot be destroyed"))
            }
            DatatypeHandle::Derived(id) => {
                self.derived
                    .remove(&id)
                    .map(|_| ())
                    .ok_or(DartError::NotFound("unknown derived datatype handle"))
            }
        }
    }

    fn lookup(&self, id: u64) -> DartResult<&Layout> {
        self.derived
            .get(&id)
            .ok_or(DartError::NotFound("unknown derived datatype handle"))
    }

    /// Resolves a handle to its full layout; `None` for base types, which
    /// have no further structure beyond their element size.
    pub fn resolve(&self, handle: DatatypeHandle) -> DartResult<Option<&Layout>> {
        match handle {
            DatatypeHandle::Base(_) => Ok(None),
            DatatypeHandle::Derived(id) => self.lookup(id).map(Some),
        }
    }
}

/// Checks that `src` and `dst` are base types of identical size, the rule
/// enforced by every RMA put/get (spec §4.G): no runtime conversion is
/// performed.
pub fn check_rma_types_compatible(src: BaseType, dst: BaseType) -> DartResult<()> {
    if src.size() != dst.size() {
        return Err(DartError::Inval(
            "RMA source and destination types must be base types of identical size",
        ));
    }
    Ok(())
}

/// Interprets `dst`/`src` as a single value of `ty` and combines them with
/// `op`, writing the result back into `dst`. Shared by the RMA atomics
/// (accumulate/fetch-and-op, on a single element) and the collective
/// reduce/allreduce family (element-wise over a whole buffer); `NoOp`
/// leaves `dst` untouched, `Replace` always takes `src`.
pub fn apply_reduction(dst: &mut [u8], src: &[u8], ty: BaseType, op: Operation) -> DartResult<()> {
    macro_rules! numeric_op {
        ($t:ty, $from:ident, $to:ident) => {{
            let a = <$t>::$from(dst.try_into().unwrap());
            let b = <$t>::$from(src.try_into().unwrap());
            let r = match op {
                Operation::Min => a.min(b),
                Operation::Max => a.max(b),
                Operation::MinMax => a.min(b),
                Operation::Sum => a.wrapping_add(b),
                Operation::Prod => a.wrapping_mul(b),
                Operation::Band => a & b,
                Operation::Bor => a | b,
                Operation::Bxor => a ^ b,
                Operation::Land => (((a != 0) && (b != 0)) as $t),
                Operation::Lor => (((a != 0) || (b != 0)) as $t),
                Operation::Lxor => (((a != 0) != (b != 0)) as $t),
                Operation::Replace => b,
                Operation::NoOp => a,
            };
            dst.copy_from_slice(&r.$to());
        }};
    }
    macro_rules! float_op {
        ($t:ty, $from:ident, $to:ident) => {{
            let a = <$t>::$from(dst.try_into().unwrap());
            let b = <$t>::$from(src.try_into().unwrap());
            let r = match op {
                Operation::Min | Operation::MinMax => a.min(b),
                Operation::Max => a.max(b),
                Operation::Sum => a + b,
                Operation::Prod => a * b,
                Operation::Replace => b,
                Operation::NoOp => a,
                _ => return Err(DartError::Inval("operation not valid for floating-point type")),
            };
            dst.copy_from_slice(&r.$to());
        }};
    }
    match ty {
        BaseType::Byte => numeric_op!(u8, from_le_bytes, to_le_bytes),
        BaseType::Short => numeric_op!(i16, from_le_bytes, to_le_bytes),
        BaseType::Int => numeric_op!(i32, from_le_bytes, to_le_bytes),
        BaseType::UInt => numeric_op!(u32, from_le_bytes, to_le_bytes),
        BaseType::Long | BaseType::LongLong => numeric_op!(i64, from_le_bytes, to_le_bytes),
        BaseType::ULong | BaseType::ULongLong => numeric_op!(u64, from_le_bytes, to_le_bytes),
        BaseType::Float => float_op!(f32, from_le_bytes, to_le_bytes),
        BaseType::Double => float_op!(f64, from_le_bytes, to_le_bytes),
        BaseType::LongDouble => {
            return Err(DartError::Inval(
                "long double reduction is not supported by this backend",
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_roundtrips() {
        let mut reg = DatatypeRegistry::new();
        let h = reg.create_strided(BaseType::Int, 4, 2).unwrap();
        assert_eq!(h.element_size(&reg).unwrap(), 4);
        let Layout::Strided { stride, blocklen, .. } = reg.resolve(h).unwrap().unwrap() else {
            panic!("expected strided layout");
        };
        assert_eq!(*stride, 4);
        assert_eq!(*blocklen, 2);
    }

    #[test]
    fn destroy_then_lookup_fails_but_does_not_panic() {
        let mut reg = DatatypeRegistry::new();
        let h = reg.create_strided(BaseType::Byte, 1, 1).unwrap();
        reg.destroy(h).unwrap();
        assert!(reg.resolve(h).is_err());
    }

    #[test]
    fn rma_types_compatible_iff_same_size() {
        assert!(check_rma_types_compatible(BaseType::Int, BaseType::Float).is_ok());
        assert!(check_rma_types_compatible(BaseType::Int, BaseType::Long).is_err());
    }

    #[test]
    fn apply_reduction_sum_and_replace() {
        let mut dst = 4i32.to_le_bytes();
        apply_reduction(&mut dst, &3i32.to_le_bytes(), BaseType::Int, Operation::Sum).unwrap();
        assert_eq!(i32::from_le_bytes(dst), 7);

        apply_reduction(&mut dst, &9i32.to_le_bytes(), BaseType::Int, Operation::Replace).unwrap();
        assert_eq!(i32::from_le_bytes(dst), 9);
    }

    #[test]
    fn apply_reduction_rejects_bitwise_on_float() {
        let mut dst = 1.0f32.to_le_bytes();
        assert!(apply_reduction(&mut dst, &2.0f32.to_le_bytes(), BaseType::Float, Operation::Bxor).is_err());
    }
}
