use core::fmt;

/// Raw `DART_UNDEFINED_UNIT_ID` sentinel shared by both id kinds.
const UNDEFINED: i32 = -1;

/// A unit's stable, program-wide identifier (0..N-1).
///
/// Global and team-local ids share the same underlying integer width but
/// must never be mixed: the only sanctioned way to cross between them is
/// `Team::unit_l2g`/`Team::unit_g2l`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalUnit(i32);

/// A unit's identifier relative to a particular team (0..|team|-1).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeamUnit(i32);

macro_rules! unit_id {
    ($ty:ident) => {
        impl $ty {
            /// The undefined/sentinel unit id.
            pub const UNDEFINED: $ty = $ty(UNDEFINED);

            /// Wraps a raw integer id.
            pub const fn new(id: i32) -> Self {
                $ty(id)
            }

            /// The raw integer id.
            pub const fn raw(self) -> i32 {
                self.0
            }

            /// Whether this is the undefined sentinel.
            pub const fn is_undefined(self) -> bool {
                self.0 < 0
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({})"), self.0)
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::UNDEFINED
            }
        }
    };
}

unit_id!(GlobalUnit);
unit_id!(TeamUnit);
