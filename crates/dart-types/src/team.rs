/// A team's program-wide identifier. Per-team, not per-unit: the team id
/// uniqueness rule (spec §3) guarantees that for any unit belonging to two
/// distinct teams, the two team ids differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeamId(i16);

impl TeamId {
    /// `DART_UNDEFINED_TEAM_ID`.
    pub const NULL: TeamId = TeamId(-1);

    /// The predefined team containing every unit.
    pub const ALL: TeamId = TeamId(0);

    /// Wraps a raw team id.
    pub const fn new(id: i16) -> Self {
        TeamId(id)
    }

    /// The raw integer id.
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Whether this is `TeamId::NULL`.
    pub const fn is_null(self) -> bool {
        self.0 < 0
    }
}

impl Default for TeamId {
    fn default() -> Self {
        TeamId::NULL
    }
}

/// Thread-support level reported by `init_thread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadSupportLevel {
    /// No support for thread-based concurrency is provided.
    Single,
    /// RMA on distinct segments may be issued concurrently from different
    /// threads of the same unit.
    Multiple,
}
