use crate::team::TeamId;

/// Segment id denoting the per-unit, non-collective local pool (§3).
pub const SEGMENT_LOCAL: i16 = 0;

/// The 128-bit global pointer.
///
/// Wire layout (little-endian, 16 bytes, spec §6):
///
/// ```text
///  byte  0   1   2    3    4 5   6 7    8..15
///        +---unit (24)---+flg+seg (16)+team (16)+ offset / addr (64) +
/// ```
///
/// Only the low 24 bits of `unit` and the low 8 bits of `flags` are
/// significant; the rest of each in-memory field is zero-extended so that
/// field-wise equality (`PartialEq`) matches the wire-level comparison in
/// `DART_GPTR_EQUAL`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalPtr {
    /// Unit holding the referenced memory, relative to `team_id`.
    pub unit: i32,
    /// Low 8 bits of the segment's user flags, mirrored here for fast
    /// access (full 16 bits live on the segment entry, see `dart-segment`).
    pub flags: u8,
    /// Segment id of the allocation; `SEGMENT_LOCAL` for the non-collective
    /// pool.
    pub segment_id: i16,
    /// Team the allocation is associated with.
    pub team_id: TeamId,
    /// Absolute address (unregistered local memory) or byte offset within
    /// the addressed segment.
    pub addr_or_offset: u64,
}

impl GlobalPtr {
    /// The null sentinel: `unit=-1 ∧ segment=0 ∧ team=NULL ∧ offset=0`.
    pub const NULL: GlobalPtr = GlobalPtr {
        unit: -1,
        flags: 0,
        segment_id: SEGMENT_LOCAL,
        team_id: TeamId::NULL,
        addr_or_offset: 0,
    };

    /// Whether this pointer is the null sentinel.
    pub const fn is_null(self) -> bool {
        self.unit < 0
            && self.segment_id == SEGMENT_LOCAL
            && self.team_id.is_null()
            && self.addr_or_offset == 0
    }

    /// Adds a signed byte delta to the offset, wrapping modulo 2^64. No
    /// overflow check is performed; callers own bounds (spec §4.C).
    pub fn incaddr(&mut self, delta: i64) {
        self.addr_or_offset = self.addr_or_offset.wrapping_add(delta as u64);
    }

    /// Sets the unit field from a raw (team-relative) id.
    pub fn setunit(&mut self, unit: i32) {
        self.unit = unit;
    }

    /// Reads the inline flag byte. The full 16-bit flag set for a segment
    /// lives on its `SegmentEntry`; this is the cheap, allocation-free
    /// mirror a caller can inspect without a registry lookup (spec §4.C).
    pub fn getflags(self) -> u8 {
        self.flags
    }

    /// Overwrites the inline flag byte.
    pub fn setflags(&mut self, flags: u8) {
        self.flags = flags;
    }

    /// Packs the pointer into its 16-byte, little-endian wire layout.
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        let unit_bits = (self.unit as u32) & 0x00FF_FFFF;
        out[0] = unit_bits as u8;
        out[1] = (unit_bits >> 8) as u8;
        out[2] = (unit_bits >> 16) as u8;
        out[3] = self.flags;
        out[4..6].copy_from_slice(&self.segment_id.to_le_bytes());
        out[6..8].copy_from_slice(&self.team_id.raw().to_le_bytes());
        out[8..16].copy_from_slice(&self.addr_or_offset.to_le_bytes());
        out
    }

    /// Unpacks a pointer from its 16-byte, little-endian wire layout.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut unit_bits = bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16;
        // sign-extend the 24-bit field
        if unit_bits & 0x0080_0000 != 0 {
            unit_bits |= 0xFF00_0000;
        }
        let segment_id = i16::from_le_bytes([bytes[4], bytes[5]]);
        let team_id = i16::from_le_bytes([bytes[6], bytes[7]]);
        let mut offset_bytes = [0u8; 8];
        offset_bytes.copy_from_slice(&bytes[8..16]);
        GlobalPtr {
            unit: unit_bits as i32,
            flags: bytes[3],
            segment_id,
            team_id: TeamId::new(team_id),
            addr_or_offset: u64::from_le_bytes(offset_bytes),
        }
    }
}

impl core::fmt::Debug for GlobalPtr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GlobalPtr")
            .field("unit", &self.unit)
            .field("flags", &self.flags)
            .field("segment_id", &self.segment_id)
            .field("team_id", &self.team_id)
            .field("addr_or_offset", &self.addr_or_offset)
            .finish()
    }
}
