//! Non-blocking-operation handle store (spec §4.H).
//!
//! ```text
//! INIT → POSTED → successful (test|wait) → CONSUMED
//!           ↓
//!      handle_free → freed
//! ```
//!
//! Every handle tracks local and remote completion separately, since
//! `wait_local`/`test_local` only care about buffer re-use while
//! `wait`/`test` require full remote visibility. The one transport this
//! workspace ships (`dart-transport`'s in-process backend) completes both
//! synchronously inside `put`/`get`/etc. themselves, so handles minted by
//! `dart-rma` are always born already fully done; the state machine below
//! is kept general so a future asynchronous backend can post a handle
//! before its operation resolves.

use dart_error::{DartError, DartResult};
use hashbrown::HashMap;

/// A handle into the store, or the NULL handle, which every wait/test
/// treats as already complete and every free treats as a no-op (spec
/// §4.H: "Passing a NULL handle is legal and treated as already
/// complete").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Option<u64>);

impl HandleId {
    pub const NULL: HandleId = HandleId(None);

    pub fn is_null(self) -> bool {
        self.0.is_none()
    }

    /// Packs this id for transport across the C ABI; `NULL` becomes
    /// `u64::MAX`, which `post`/`post_for_segment` never hand out (`next_id`
    /// starts at 0 and only increments).
    pub fn to_raw(self) -> u64 {
        self.0.unwrap_or(u64::MAX)
    }

    /// Inverse of `to_raw`.
    pub fn from_raw(raw: u64) -> Self {
        if raw == u64::MAX {
            HandleId::NULL
        } else {
            HandleId(Some(raw))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Posted,
    /// Consumed by a successful `wait`/`wait_local`/`test`/`test_local`/
    /// `waitall`/`testall`/`testall_local`. Kept as a tombstone (rather
    /// than removed outright) so a subsequent `wait`/`test` on the same id
    /// reports `ERR_INVAL` per spec §8, distinct from the `ERR_NOTFOUND`
    /// reported for an id that was never issued or was explicitly
    /// `handle_free`'d.
    Consumed,
}

struct Entry {
    local_done: bool,
    remote_done: bool,
    phase: Phase,
    /// `(team_id, segment_id)` this handle's operation targeted, if known.
    /// Lets `team_memderegister` (spec §9 Open Question) reject
    /// deregistration while an issued-but-unconsumed handle still
    /// references the segment.
    segment: Option<(i16, i16)>,
}

/// Process-wide table of outstanding non-blocking operations.
#[derive(Default)]
pub struct HandleStore {
    next_id: u64,
    entries: HashMap<u64, Entry>,
}

impl HandleStore {
    pub fn new() -> Self {
        HandleStore::default()
    }

    /// Posts a new handle, `local_done`/`remote_done` reflecting whatever
    /// the issuing operation already knows about its own completion (for
    /// this workspace's synchronous transport, both are `true` by the
    /// time `post` is called).
    pub fn post(&mut self, local_done: bool, remote_done: bool) -> HandleId {
        self.post_inner(local_done, remote_done, None)
    }

    /// Posts a handle tagged with the `(team, segment)` its operation
    /// targeted, so `outstanding_for_segment` can see it until it is
    /// consumed or freed.
    pub fn post_for_segment(
        &mut self,
        local_done: bool,
        remote_done: bool,
        team_id: i16,
        segment_id: i16,
    ) -> HandleId {
        self.post_inner(local_done, remote_done, Some((team_id, segment_id)))
    }

    fn post_inner(&mut self, local_done: bool, remote_done: bool, segment: Option<(i16, i16)>) -> HandleId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                local_done,
                remote_done,
                phase: Phase::Posted,
                segment,
            },
        );
        HandleId(Some(id))
    }

    /// Number of currently posted (not yet consumed or freed) handles
    /// tagged as targeting `(team_id, segment_id)`. A handle already
    /// tombstoned by a successful `wait`/`test` no longer counts, even
    /// though its entry lingers in the table until `handle_free`.
    pub fn outstanding_for_segment(&self, team_id: i16, segment_id: i16) -> usize {
        self.entries
            .values()
            .filter(|e| e.segment == Some((team_id, segment_id)) && e.phase != Phase::Consumed)
            .count()
    }

    fn entry(&self, id: HandleId) -> DartResult<&Entry> {
        let raw = id.0.ok_or(DartError::Inval("unreachable: NULL handle has no entry"))?;
        let entry = self
            .entries
            .get(&raw)
            .ok_or(DartError::NotFound("unknown or already-freed handle"))?;
        if entry.phase == Phase::Consumed {
            return Err(DartError::Inval("handle already consumed by a prior wait"));
        }
        Ok(entry)
    }

    fn entry_mut(&mut self, id: HandleId) -> DartResult<&mut Entry> {
        let raw = id.0.ok_or(DartError::Inval("unreachable: NULL handle has no entry"))?;
        let entry = self
            .entries
            .get_mut(&raw)
            .ok_or(DartError::NotFound("unknown or already-freed handle"))?;
        if entry.phase == Phase::Consumed {
            return Err(DartError::Inval("handle already consumed by a prior wait"));
        }
        Ok(entry)
    }

    /// Blocks (in this backend, simply checks) until remote completion;
    /// consumes the handle so that any later `wait`/`test` on the same id
    /// reports `ERR_INVAL` (spec §8).
    pub fn wait(&mut self, id: HandleId) -> DartResult<()> {
        if id.is_null() {
            return Ok(());
        }
        let entry = self.entry_mut(id)?;
        if !entry.remote_done {
            return Err(DartError::Other(
                "wait on a handle whose operation has not completed remotely",
            ));
        }
        entry.phase = Phase::Consumed;
        Ok(())
    }

    /// Blocks until local completion only (buffer re-usable); consumes the
    /// handle on success, same as `wait`.
    pub fn wait_local(&mut self, id: HandleId) -> DartResult<()> {
        if id.is_null() {
            return Ok(());
        }
        let entry = self.entry_mut(id)?;
        if !entry.local_done {
            return Err(DartError::Other(
                "wait_local on a handle whose operation has not completed locally",
            ));
        }
        entry.phase = Phase::Consumed;
        Ok(())
    }

    /// Non-blocking check for remote completion; `Ok(true)` consumes the
    /// handle, `Ok(false)` leaves it `POSTED`.
    pub fn test(&mut self, id: HandleId) -> DartResult<bool> {
        if id.is_null() {
            return Ok(true);
        }
        let entry = self.entry_mut(id)?;
        if entry.remote_done {
            entry.phase = Phase::Consumed;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Non-blocking check for local completion only; consumes the handle
    /// on success, same as `test`.
    pub fn test_local(&mut self, id: HandleId) -> DartResult<bool> {
        if id.is_null() {
            return Ok(true);
        }
        let entry = self.entry_mut(id)?;
        if entry.local_done {
            entry.phase = Phase::Consumed;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Element-wise `wait` over every handle in `ids`.
    pub fn waitall(&mut self, ids: &[HandleId]) -> DartResult<()> {
        for &id in ids {
            self.wait(id)?;
        }
        Ok(())
    }

    /// Element-wise `wait_local` over every handle in `ids`.
    pub fn waitall_local(&mut self, ids: &[HandleId]) -> DartResult<()> {
        for &id in ids {
            self.wait_local(id)?;
        }
        Ok(())
    }

    /// All-or-nothing remote-completion check: `Ok(true)` iff every
    /// handle in `ids` was remotely complete, in which case all are
    /// consumed; otherwise none are touched.
    pub fn testall(&mut self, ids: &[HandleId]) -> DartResult<bool> {
        for &id in ids {
            if id.is_null() {
                continue;
            }
            if !self.entry(id)?.remote_done {
                return Ok(false);
            }
        }
        for &id in ids {
            if !id.is_null() {
                self.entry_mut(id)?.phase = Phase::Consumed;
            }
        }
        Ok(true)
    }

    /// All-or-nothing local-completion check: `Ok(true)` iff every handle
    /// in `ids` was locally complete, in which case all are consumed;
    /// otherwise none are touched.
    pub fn testall_local(&mut self, ids: &[HandleId]) -> DartResult<bool> {
        for &id in ids {
            if !id.is_null() && !self.entry(id)?.local_done {
                return Ok(false);
            }
        }
        for &id in ids {
            if !id.is_null() {
                self.entry_mut(id)?.phase = Phase::Consumed;
            }
        }
        Ok(true)
    }

    /// Frees a handle, legal from either `POSTED` or `COMPLETED`.
    pub fn free(&mut self, id: HandleId) -> DartResult<()> {
        if id.is_null() {
            return Ok(());
        }
        let raw = id.0.unwrap();
        self.entries
            .remove(&raw)
            .map(|_| ())
            .ok_or(DartError::NotFound("unknown or already-freed handle"))
    }

    /// Number of outstanding (unfree'd) handles, for diagnostics and tests.
    pub fn outstanding(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_is_always_already_complete() {
        let mut store = HandleStore::new();
        assert!(store.test(HandleId::NULL).unwrap());
        assert!(store.wait(HandleId::NULL).is_ok());
        assert!(store.free(HandleId::NULL).is_ok());
    }

    #[test]
    fn synchronous_handle_completes_immediately() {
        let mut store = HandleStore::new();
        let h = store.post(true, true);
        store.wait(h).unwrap();
        store.free(h).unwrap();
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn successful_test_consumes_the_handle() {
        let mut store = HandleStore::new();
        let h = store.post(true, true);
        assert!(store.test(h).unwrap());
        assert!(store.wait(h).is_err());
    }

    #[test]
    fn successful_test_local_consumes_the_handle() {
        let mut store = HandleStore::new();
        let h = store.post(true, true);
        assert!(store.test_local(h).unwrap());
        assert!(store.wait_local(h).is_err());
    }

    #[test]
    fn pending_remote_blocks_wait_but_not_wait_local() {
        let mut store = HandleStore::new();
        let h = store.post(true, false);
        assert!(store.wait(h).is_err());
        assert!(!store.test(h).unwrap());
        // neither the failed wait nor the incomplete test consumed `h`
        assert!(store.wait_local(h).is_ok());
        // wait_local's success did consume it
        assert!(store.wait(h).is_err());
    }

    #[test]
    fn testall_is_all_or_nothing() {
        let mut store = HandleStore::new();
        let a = store.post(true, true);
        let b = store.post(true, false);
        assert!(!store.testall(&[a, b]).unwrap());
        // neither handle should have been consumed by the failed testall
        assert!(store.test(a).unwrap());
    }

    #[test]
    fn double_free_is_an_error() {
        let mut store = HandleStore::new();
        let h = store.post(true, true);
        store.free(h).unwrap();
        assert!(store.free(h).is_err());
    }
}
