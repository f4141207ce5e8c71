//! Shared error taxonomy for the PGAS runtime core.
//!
//! Every internal crate returns `DartResult<T>`. The ABI layer (`dart-abi`)
//! is the only place that flattens this into the C `dart_ret_t` enum.

/// The runtime's error taxonomy, matching `dart_ret_t`'s non-OK variants.
#[derive(Debug, onlyerror::Error)]
pub enum DartError {
    /// Unknown team id, incompatible datatypes, malformed group spec,
    /// out-of-bounds local free, CAS on a non-integral type, or an
    /// operation unsupported by the active transport backend.
    #[error("invalid argument: {0}")]
    Inval(&'static str),

    /// Segment lookup miss or unknown handle.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// Called before `init` or after `exit`.
    #[error("runtime not initialized")]
    NotInit,

    /// Transport failure, exhausted team table, or exhausted local pool.
    #[error("{0}")]
    Other(&'static str),
}

/// Result alias used throughout the internal (non-ABI) API surface.
pub type DartResult<T> = Result<T, DartError>;
