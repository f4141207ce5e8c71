//! Team-scoped MCS distributed lock (spec §4.J).
//!
//! Grounded on `dart_team_lock_init`/`dart_lock_acquire`/
//! `dart_lock_try_acquire`/`dart_lock_release`/`dart_team_lock_free`
//! (`examples/original_source/dart-impl/mpi/dart-mpi/dart_synchronization.c`):
//! a single-word `tail` cell (who's at the end of the queue, `-1` when
//! free) plus one `next` cell per unit. Acquire swaps itself into `tail`
//! via fetch-and-op; if it displaced a predecessor, it publishes its own
//! id into the predecessor's `next` cell and blocks on a wakeup message.
//! Release compare-and-swaps `tail` back to `-1`; if that fails (someone
//! queued behind it), it spins on its own `next` cell until the successor
//! publishes itself, then sends the wakeup.
//!
//! `tail` and the `next` table are modeled as two dynamic windows built
//! directly over the team's communicator rather than through `dart-rma`
//! (the lock service is infrastructure the RMA engine itself does not
//! depend on, mirroring the component build order's `K → ... → G` before
//! `J`... we only need the `Window`/`Communicator` primitives, not a
//! segment registration).

use dart_error::{DartError, DartResult};
use dart_transport::{Communicator, Window};
use dart_types::{BaseType, Operation};
use hashbrown::HashMap;
use std::sync::Arc;

const WAKEUP_TAG: u32 = 0xD0c4_0001;
const UNQUEUED: i32 = -1;

/// A single lock instance, bound to one team's communicator.
pub struct Lock {
    comm: Arc<dyn Communicator>,
    tail: Arc<dyn Window>,
    next: Arc<dyn Window>,
    acquired: bool,
}

impl Lock {
    /// Collectively initializes a lock over every unit of `comm`: unit 0
    /// seeds the single-word tail cell, every unit seeds its own `next`
    /// cell, both in `-1` (free/unqueued).
    pub fn new(comm: Arc<dyn Communicator>) -> Self {
        let rank = comm.rank();

        let tail = comm.create_dynamic_window(if rank == 0 { 4 } else { 0 });
        if rank == 0 {
            tail.put(0, 0, &UNQUEUED.to_le_bytes())
                .expect("lock: seeding tail cell");
        }
        comm.barrier();

        let next = comm.create_dynamic_window(4);
        next.put(rank, 0, &UNQUEUED.to_le_bytes())
            .expect("lock: seeding this unit's next cell");
        comm.barrier();

        Lock {
            comm,
            tail,
            next,
            acquired: false,
        }
    }

    /// Blocking acquire: returns once this unit holds the lock.
    pub fn acquire(&mut self) -> DartResult<()> {
        if self.acquired {
            log::warn!(
                "lock: unit {} called acquire while already holding the lock",
                self.comm.rank()
            );
            return Ok(());
        }
        let me = self.comm.rank() as i32;
        let predecessor = self.swap_tail(me)?;
        if predecessor != UNQUEUED {
            self.next
                .fetch_and_op(predecessor as usize, 0, &me.to_le_bytes(), BaseType::Int, Operation::Replace)?;
            self.comm.recv(predecessor as usize, WAKEUP_TAG)?;
        }
        self.acquired = true;
        Ok(())
    }

    /// Non-blocking acquire: returns `true` iff the lock was free and is
    /// now held by this unit.
    pub fn try_acquire(&mut self) -> DartResult<bool> {
        if self.acquired {
            log::warn!(
                "lock: unit {} called try_acquire while already holding the lock",
                self.comm.rank()
            );
            return Ok(true);
        }
        let me = self.comm.rank() as i32;
        let prev = self
            .tail
            .compare_and_swap(0, 0, &me.to_le_bytes(), &UNQUEUED.to_le_bytes(), BaseType::Int)?;
        let prev = i32::from_le_bytes(prev.try_into().unwrap());
        if prev == UNQUEUED {
            self.acquired = true;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Releases the lock. If another unit has queued behind this one, it
    /// is woken with a point-to-point message once it publishes itself.
    pub fn release(&mut self) -> DartResult<()> {
        if !self.acquired {
            log::warn!(
                "lock: unit {} called release without holding the lock",
                self.comm.rank()
            );
            return Ok(());
        }
        let me = self.comm.rank() as i32;
        let prev = self
            .tail
            .compare_and_swap(0, 0, &UNQUEUED.to_le_bytes(), &me.to_le_bytes(), BaseType::Int)?;
        let prev = i32::from_le_bytes(prev.try_into().unwrap());

        if prev != me {
            // A successor has (or is about to) queue behind us: spin on
            // our own next cell until it publishes its id.
            loop {
                let next_bytes =
                    self.next
                        .fetch_and_op(me as usize, 0, &0i32.to_le_bytes(), BaseType::Int, Operation::NoOp)?;
                let successor = i32::from_le_bytes(next_bytes.try_into().unwrap());
                if successor != UNQUEUED {
                    self.comm.send(successor as usize, WAKEUP_TAG, &[])?;
                    self.next.put(me as usize, 0, &UNQUEUED.to_le_bytes())?;
                    break;
                }
                std::thread::yield_now();
            }
        }
        self.acquired = false;
        Ok(())
    }

    fn swap_tail(&self, me: i32) -> DartResult<i32> {
        let prev = self
            .tail
            .fetch_and_op(0, 0, &me.to_le_bytes(), BaseType::Int, Operation::Replace)?;
        Ok(i32::from_le_bytes(prev.try_into().unwrap()))
    }
}

/// A handle into a `TeamLockRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockId(u64);

impl LockId {
    /// Packs this id for transport across the C ABI.
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Inverse of `to_raw`.
    pub fn from_raw(raw: u64) -> Self {
        LockId(raw)
    }
}

/// Process-wide table of live locks, mirroring `dart_team_lock_init`'s
/// heap-allocated `dart_lock_t` handed back to the caller.
#[derive(Default)]
pub struct TeamLockRegistry {
    next_id: u64,
    locks: HashMap<u64, Lock>,
}

impl TeamLockRegistry {
    pub fn new() -> Self {
        TeamLockRegistry::default()
    }

    /// Collectively creates a lock over `comm` and registers it.
    pub fn init(&mut self, comm: Arc<dyn Communicator>) -> LockId {
        let id = self.next_id;
        self.next_id += 1;
        self.locks.insert(id, Lock::new(comm));
        LockId(id)
    }

    fn lock_mut(&mut self, id: LockId) -> DartResult<&mut Lock> {
        self.locks
            .get_mut(&id.0)
            .ok_or(DartError::NotFound("unknown lock id"))
    }

    pub fn acquire(&mut self, id: LockId) -> DartResult<()> {
        self.lock_mut(id)?.acquire()
    }

    pub fn try_acquire(&mut self, id: LockId) -> DartResult<bool> {
        self.lock_mut(id)?.try_acquire()
    }

    pub fn release(&mut self, id: LockId) -> DartResult<()> {
        self.lock_mut(id)?.release()
    }

    /// Frees a lock. Collective over the lock's team in a real deployment
    /// (every unit must stop referencing it); this only drops the local
    /// handle and the windows it owns.
    pub fn free(&mut self, id: LockId) -> DartResult<()> {
        self.locks
            .remove(&id.0)
            .map(|_| ())
            .ok_or(DartError::NotFound("unknown lock id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dart_transport::LocalCommunicator;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn mutual_exclusion_under_contention() {
        let comms = LocalCommunicator::new_team(6);
        let counter = Arc::new(AtomicU32::new(0));
        let overlap_detected = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let in_critical_section = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                let counter = counter.clone();
                let overlap_detected = overlap_detected.clone();
                let in_critical_section = in_critical_section.clone();
                thread::spawn(move || {
                    let mut lock = Lock::new(c as Arc<dyn Communicator>);
                    for _ in 0..50 {
                        lock.acquire().unwrap();
                        if in_critical_section.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlap_detected.store(true, Ordering::SeqCst);
                        }
                        counter.fetch_add(1, Ordering::SeqCst);
                        in_critical_section.fetch_sub(1, Ordering::SeqCst);
                        lock.release().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 300);
        assert!(!overlap_detected.load(Ordering::SeqCst));
    }

    #[test]
    fn try_acquire_fails_while_held() {
        let comms = LocalCommunicator::new_team(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| thread::spawn(move || Lock::new(c as Arc<dyn Communicator>)))
            .collect();
        let mut locks: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        locks[0].acquire().unwrap();
        assert!(!locks[1].try_acquire().unwrap());
        locks[0].release().unwrap();
        assert!(locks[1].try_acquire().unwrap());
    }

    #[test]
    fn release_without_acquire_warns_but_does_not_error() {
        let comms = LocalCommunicator::new_team(1);
        let comm = comms.into_iter().next().unwrap();
        let mut lock = Lock::new(comm as Arc<dyn Communicator>);
        assert!(lock.release().is_ok());
    }
}
