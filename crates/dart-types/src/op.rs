use crate::BaseType;
use dart_error::DartError;

/// Reduction/accumulate operator, shared by RMA atomics (§4.G) and the
/// collective reduce/allreduce family (§4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Min,
    Max,
    Sum,
    Prod,
    Band,
    Land,
    Bor,
    Lor,
    Bxor,
    Lxor,
    Replace,
    NoOp,
    /// Extension beyond the core nine DART operations, present in one
    /// reference backend only (spec.md Open Questions). Exposed but not
    /// otherwise distinguished from the rest of the enum.
    MinMax,
}

impl Operation {
    const fn is_logical_or_bitwise(self) -> bool {
        matches!(
            self,
            Operation::Band
                | Operation::Land
                | Operation::Bor
                | Operation::Lor
                | Operation::Bxor
                | Operation::Lxor
        )
    }

    /// Enforces the operation x type compatibility rule from spec §4.G:
    /// logical/bitwise ops require integer types; floating-point
    /// `MIN`/`MAX`/`SUM`/`PROD` are permitted; `REPLACE`/`NO_OP` apply to
    /// all types.
    pub fn check_compatible(self, ty: BaseType) -> Result<(), DartError> {
        if self.is_logical_or_bitwise() && ty.is_float() {
            return Err(DartError::Inval(
                "logical/bitwise operation requires an integer type",
            ));
        }
        Ok(())
    }
}
