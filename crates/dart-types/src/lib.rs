//! Fundamental, allocation-free types shared by every component of the
//! runtime: unit/team identifiers, the packed global pointer, base
//! datatypes, and the reduction operator enum.

mod datatype;
mod gptr;
mod op;
mod team;
mod unit;

pub use datatype::BaseType;
pub use gptr::{GlobalPtr, SEGMENT_LOCAL};
pub use op::Operation;
pub use team::{TeamId, ThreadSupportLevel};
pub use unit::{GlobalUnit, TeamUnit};

bitflags::bitflags! {
    /// User-settable flags on a segment, the full 16-bit value queried via
    /// `dart_gptr_getflags`/`dart_gptr_setflags` (spec §4.C); the low byte
    /// is mirrored inline on `GlobalPtr::flags` for cheap access.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u16 {
        /// The segment is team-aligned: unit offsets agree across members.
        const ALIGNED = 0b0000_0001;
        /// The segment was created via `team_memregister` (externally
        /// supplied memory) rather than `team_memalloc_aligned`.
        const EXTERNAL = 0b0000_0010;
        /// Every member contributed the same byte count (symmetric).
        const SYMMETRIC = 0b0000_0100;
    }
}
