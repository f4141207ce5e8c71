//! In-process, multi-unit transport backend.
//!
//! Stands in for the out-of-scope MPI-3 RMA / GASPI / POSIX-shmem backends
//! (spec §4.F Non-goals), grounded on the original's single-node
//! `dart-impl/shmem.old` backend: every unit is one OS thread in this
//! process rather than a separate process, and "remote" memory is a plain
//! `Mutex`-guarded byte buffer rather than a mapped shared segment. This
//! keeps the whole backend in safe Rust; the tradeoff is that a real
//! multi-process backend would avoid the lock-per-access overhead via
//! actual shared memory, which this backend does not attempt to model.

use crate::port::{Communicator, Window};
use dart_datatype::apply_reduction;
use dart_error::{DartError, DartResult};
use dart_types::{BaseType, Operation};
use std::collections::HashMap as StdHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};

/// Shared state every unit's `LocalCommunicator` handle points into.
struct Shared {
    size: usize,
    barrier: Mutex<BarrierState>,
    barrier_cv: Condvar,
    /// Per (destination, source, tag) message queue, addressed precisely
    /// enough to support the collective layer's pairwise exchanges
    /// (`alltoall`) as well as the lock service's wakeup protocol.
    mailboxes: Mutex<StdHashMap<(usize, usize, u32), Vec<Vec<u8>>>>,
    mailbox_cv: Condvar,
    /// Scratch buffer for `broadcast`; safe to share across calls because
    /// the surrounding barriers already serialize every use of it.
    broadcast_slot: OnceLock<Arc<Mutex<Vec<u8>>>>,
}

struct BarrierState {
    generation: u64,
    arrived: usize,
}

/// One unit's view of an in-process team, used both as the root
/// communicator created by `dart-launcher`'s local harness and as the
/// result of `split_shared`/`dup`.
pub struct LocalCommunicator {
    shared: Arc<Shared>,
    rank: usize,
}

impl Shared {
    fn new(size: usize) -> Arc<Shared> {
        Arc::new(Shared {
            size,
            barrier: Mutex::new(BarrierState {
                generation: 0,
                arrived: 0,
            }),
            barrier_cv: Condvar::new(),
            mailboxes: Mutex::new(StdHashMap::new()),
            mailbox_cv: Condvar::new(),
            broadcast_slot: OnceLock::new(),
        })
    }
}

/// Process-wide table of in-flight sub-team handoffs, the in-process
/// analogue of the original's static `team_impl_struct teams[MAXNUM_TEAMS]`
/// table: `split_group`'s coordinator publishes a freshly built `Shared`
/// here under a fresh id, and every other member of the new group looks it
/// up once it learns the id over the parent communicator's mailbox.
static SUBTEAM_HANDOFF: OnceLock<Mutex<StdHashMap<u64, Arc<Shared>>>> = OnceLock::new();
static NEXT_SUBTEAM_ID: AtomicU64 = AtomicU64::new(1);

fn subteam_handoff() -> &'static Mutex<StdHashMap<u64, Arc<Shared>>> {
    SUBTEAM_HANDOFF.get_or_init(|| Mutex::new(StdHashMap::new()))
}

impl LocalCommunicator {
    /// Builds a fresh `size`-unit communicator; one handle per unit, meant
    /// to be handed one-per-thread.
    pub fn new_team(size: usize) -> Vec<Arc<LocalCommunicator>> {
        let shared = Shared::new(size);
        (0..size)
            .map(|rank| {
                Arc::new(LocalCommunicator {
                    shared: shared.clone(),
                    rank,
                })
            })
            .collect()
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) {
        let mut state = self.shared.barrier.lock().unwrap();
        let my_generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.shared.size {
            state.arrived = 0;
            state.generation += 1;
            self.shared.barrier_cv.notify_all();
        } else {
            while state.generation == my_generation {
                state = self.shared.barrier_cv.wait(state).unwrap();
            }
        }
    }

    fn broadcast(&self, root: usize, buf: &mut [u8]) {
        // A shared cell carrying the root's bytes, protected by the same
        // barrier used to separate "root writes" from "everyone reads".
        // Implemented with a plain Mutex<Vec<u8>> keyed by generation so
        // repeated broadcasts on the same communicator don't race.
        static_assert_root_in_range(root, self.shared.size);
        let slot: Arc<Mutex<Vec<u8>>> = self.broadcast_slot();
        if self.rank == root {
            *slot.lock().unwrap() = buf.to_vec();
        }
        self.barrier();
        if self.rank != root {
            let payload = slot.lock().unwrap();
            buf.copy_from_slice(&payload);
        }
        self.barrier();
    }

    fn dup(&self) -> Arc<dyn Communicator> {
        Arc::new(LocalCommunicator {
            shared: self.shared.clone(),
            rank: self.rank,
        })
    }

    fn split_shared(&self) -> Arc<dyn Communicator> {
        // Everything lives in one process, so the whole team is "shared".
        Arc::new(LocalCommunicator {
            shared: self.shared.clone(),
            rank: self.rank,
        })
    }

    fn split_group(&self, ranks: &[usize]) -> Arc<dyn Communicator> {
        const HANDOFF_TAG: u32 = 0xD487_0001;
        let coordinator = ranks[0];
        let my_pos = ranks
            .iter()
            .position(|&r| r == self.rank)
            .expect("split_group called by a rank absent from its own group");

        if self.rank == coordinator {
            let shared = Shared::new(ranks.len());
            let id = NEXT_SUBTEAM_ID.fetch_add(1, Ordering::Relaxed);
            subteam_handoff().lock().unwrap().insert(id, shared.clone());
            for &peer in &ranks[1..] {
                Communicator::send(self, peer, HANDOFF_TAG, &id.to_le_bytes())
                    .expect("split_group handoff send");
            }
            Arc::new(LocalCommunicator {
                shared,
                rank: my_pos,
            })
        } else {
            let bytes = Communicator::recv(self, coordinator, HANDOFF_TAG)
                .expect("split_group handoff recv");
            let id = u64::from_le_bytes(bytes.try_into().unwrap());
            let shared = subteam_handoff()
                .lock()
                .unwrap()
                .get(&id)
                .expect("split_group handoff id missing from registry")
                .clone();
            Arc::new(LocalCommunicator {
                shared,
                rank: my_pos,
            })
        }
    }

    fn create_dynamic_window(&self, local_size: usize) -> Arc<dyn Window> {
        let sizes = self.allgather_sizes(local_size);
        let regions = sizes
            .into_iter()
            .map(|n| Mutex::new(vec![0u8; n]))
            .collect();
        Arc::new(LocalWindow { regions })
    }

    fn allocate_shared_window(&self, local_size: usize) -> (Arc<dyn Window>, Vec<usize>) {
        let win = self.create_dynamic_window(local_size);
        // Base "addresses" carry no meaning in-process beyond identifying
        // rank order; expose the rank itself.
        let bases = (0..self.shared.size).collect();
        (win, bases)
    }

    fn send(&self, to: usize, tag: u32, data: &[u8]) -> DartResult<()> {
        let mut boxes = self.shared.mailboxes.lock().unwrap();
        boxes
            .entry((to, self.rank, tag))
            .or_default()
            .push(data.to_vec());
        self.shared.mailbox_cv.notify_all();
        Ok(())
    }

    fn recv(&self, from: usize, tag: u32) -> DartResult<Vec<u8>> {
        let mut boxes = self.shared.mailboxes.lock().unwrap();
        loop {
            if let Some(queue) = boxes.get_mut(&(self.rank, from, tag)) {
                if !queue.is_empty() {
                    return Ok(queue.remove(0));
                }
            }
            boxes = self.shared.mailbox_cv.wait(boxes).unwrap();
        }
    }

    fn abort(&self, code: i32) -> ! {
        log::error!("unit {} aborting with code {code}", self.rank);
        std::process::abort();
    }
}

fn static_assert_root_in_range(root: usize, size: usize) {
    debug_assert!(root < size, "broadcast root out of range");
}

impl LocalCommunicator {
    /// Collects every unit's proposed window size via a ring of sends
    /// through the mailbox channel, keyed off rank 0 as a temporary
    /// collection point. Simpler than standing up a second barrier
    /// primitive for a single allgather of usize.
    fn allgather_sizes(&self, local_size: usize) -> Vec<usize> {
        let tag = 0xD487_0000;
        if self.rank == 0 {
            let mut sizes = vec![0usize; self.shared.size];
            sizes[0] = local_size;
            for peer in 1..self.shared.size {
                let bytes = Communicator::recv(self, peer, tag).expect("allgather recv");
                let rank = usize::from_le_bytes(bytes[0..8].try_into().unwrap());
                let size = usize::from_le_bytes(bytes[8..16].try_into().unwrap());
                sizes[rank] = size;
            }
            let mut buf = Vec::with_capacity(sizes.len() * 8);
            for s in &sizes {
                buf.extend_from_slice(&s.to_le_bytes());
            }
            let mut broadcast_buf = buf;
            self.broadcast(0, &mut broadcast_buf);
            broadcast_buf
                .chunks_exact(8)
                .map(|c| usize::from_le_bytes(c.try_into().unwrap()))
                .collect()
        } else {
            let mut payload = Vec::with_capacity(16);
            payload.extend_from_slice(&self.rank.to_le_bytes());
            payload.extend_from_slice(&local_size.to_le_bytes());
            Communicator::send(self, 0, tag, &payload).expect("allgather send");
            let mut broadcast_buf = vec![0u8; self.shared.size * 8];
            self.broadcast(0, &mut broadcast_buf);
            broadcast_buf
                .chunks_exact(8)
                .map(|c| usize::from_le_bytes(c.try_into().unwrap()))
                .collect()
        }
    }

    fn broadcast_slot(&self) -> Arc<Mutex<Vec<u8>>> {
        // One lazily-created slot per communicator instance would race
        // across concurrent broadcasts on independently-`dup`'d handles;
        // a single slot keyed to this `Shared` is sufficient because the
        // two `barrier()` calls around its use already serialize access.
        self.shared
            .broadcast_slot
            .get_or_init(|| Mutex::new(Vec::new()))
            .clone()
    }
}

/// A dynamic window: one `Mutex<Vec<u8>>` region per unit, sized once at
/// creation and never resized.
struct LocalWindow {
    regions: Vec<Mutex<Vec<u8>>>,
}

impl LocalWindow {
    fn region(&self, unit: usize) -> DartResult<&Mutex<Vec<u8>>> {
        self.regions
            .get(unit)
            .ok_or(DartError::Inval("unit out of range for window"))
    }

    fn slice<'a>(
        region: &'a [u8],
        offset: u64,
        len: usize,
    ) -> DartResult<&'a [u8]> {
        let start = offset as usize;
        region
            .get(start..start + len)
            .ok_or(DartError::Inval("offset/length out of range for segment"))
    }

    fn slice_mut(
        region: &mut [u8],
        offset: u64,
        len: usize,
    ) -> DartResult<&mut [u8]> {
        let start = offset as usize;
        let end = start + len;
        if end > region.len() {
            return Err(DartError::Inval("offset/length out of range for segment"));
        }
        Ok(&mut region[start..end])
    }
}

impl Window for LocalWindow {
    fn put(&self, unit: usize, offset: u64, data: &[u8]) -> DartResult<()> {
        let region = self.region(unit)?;
        let mut region = region.lock().unwrap();
        let dst = Self::slice_mut(&mut region, offset, data.len())?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn get(&self, unit: usize, offset: u64, out: &mut [u8]) -> DartResult<()> {
        let region = self.region(unit)?;
        let region = region.lock().unwrap();
        let src = Self::slice(&region, offset, out.len())?;
        out.copy_from_slice(src);
        Ok(())
    }

    fn accumulate(
        &self,
        unit: usize,
        offset: u64,
        data: &[u8],
        ty: BaseType,
        op: Operation,
    ) -> DartResult<()> {
        op.check_compatible(ty)?;
        let elem = ty.size();
        if data.len() % elem != 0 {
            return Err(DartError::Inval("accumulate buffer not a multiple of element size"));
        }
        let region = self.region(unit)?;
        let mut region = region.lock().unwrap();
        let dst = Self::slice_mut(&mut region, offset, data.len())?;
        for (d, s) in dst.chunks_exact_mut(elem).zip(data.chunks_exact(elem)) {
            apply_reduction(d, s, ty, op)?;
        }
        Ok(())
    }

    fn fetch_and_op(
        &self,
        unit: usize,
        offset: u64,
        value: &[u8],
        ty: BaseType,
        op: Operation,
    ) -> DartResult<Vec<u8>> {
        op.check_compatible(ty)?;
        let elem = ty.size();
        if value.len() != elem {
            return Err(DartError::Inval("fetch_and_op value must be one element"));
        }
        let region = self.region(unit)?;
        let mut region = region.lock().unwrap();
        let dst = Self::slice_mut(&mut region, offset, elem)?;
        let prev = dst.to_vec();
        apply_reduction(dst, value, ty, op)?;
        Ok(prev)
    }

    fn compare_and_swap(
        &self,
        unit: usize,
        offset: u64,
        value: &[u8],
        compare: &[u8],
        ty: BaseType,
    ) -> DartResult<Vec<u8>> {
        if ty.is_float() {
            return Err(DartError::Inval("compare_and_swap requires an integer type"));
        }
        let elem = ty.size();
        if value.len() != elem || compare.len() != elem {
            return Err(DartError::Inval("compare_and_swap value/compare must be one element"));
        }
        let region = self.region(unit)?;
        let mut region = region.lock().unwrap();
        let dst = Self::slice_mut(&mut region, offset, elem)?;
        let prev = dst.to_vec();
        if dst == compare {
            dst.copy_from_slice(value);
        }
        Ok(prev)
    }

    fn flush(&self, _unit: usize) {}
    fn flush_all(&self) {}
    fn flush_local(&self, _unit: usize) {}
    fn flush_local_all(&self) {}
    fn lock_all(&self) {}
    fn unlock_all(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn barrier_releases_every_unit() {
        let comms = LocalCommunicator::new_team(4);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| thread::spawn(move || c.barrier()))
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn broadcast_replicates_root_buffer() {
        let comms = LocalCommunicator::new_team(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                thread::spawn(move || {
                    let mut buf = if c.rank() == 0 {
                        vec![7u8, 8, 9]
                    } else {
                        vec![0u8; 3]
                    };
                    c.broadcast(0, &mut buf);
                    buf
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![7, 8, 9]);
        }
    }

    #[test]
    fn put_get_roundtrip_across_units() {
        let comms = LocalCommunicator::new_team(2);
        let win = comms[0].create_dynamic_window(16);
        win.put(1, 0, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 4];
        win.get(1, 0, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn accumulate_sum_is_applied_in_place() {
        let comms = LocalCommunicator::new_team(1);
        let win = comms[0].create_dynamic_window(4);
        win.put(0, 0, &5i32.to_le_bytes()).unwrap();
        win.accumulate(0, 0, &3i32.to_le_bytes(), BaseType::Int, Operation::Sum)
            .unwrap();
        let mut out = [0u8; 4];
        win.get(0, 0, &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 8);
    }

    #[test]
    fn compare_and_swap_only_swaps_on_match() {
        let comms = LocalCommunicator::new_team(1);
        let win = comms[0].create_dynamic_window(4);
        win.put(0, 0, &5i32.to_le_bytes()).unwrap();
        let prev = win
            .compare_and_swap(0, 0, &9i32.to_le_bytes(), &1i32.to_le_bytes(), BaseType::Int)
            .unwrap();
        assert_eq!(i32::from_le_bytes(prev.try_into().unwrap()), 5);
        let mut out = [0u8; 4];
        win.get(0, 0, &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 5, "mismatched compare must not swap");

        let prev = win
            .compare_and_swap(0, 0, &9i32.to_le_bytes(), &5i32.to_le_bytes(), BaseType::Int)
            .unwrap();
        assert_eq!(i32::from_le_bytes(prev.try_into().unwrap()), 5);
        win.get(0, 0, &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 9, "matching compare must swap");
    }

    #[test]
    fn split_group_builds_independent_subcommunicator() {
        let comms = LocalCommunicator::new_team(4);
        let ranks = vec![1usize, 3];
        let handles: Vec<_> = comms
            .into_iter()
            .filter(|c| ranks.contains(&c.rank()))
            .map(|c| {
                let ranks = ranks.clone();
                thread::spawn(move || {
                    let sub = c.split_group(&ranks);
                    (sub.rank(), sub.size())
                })
            })
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort();
        assert_eq!(results, vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn allgather_sizes_supports_non_symmetric_registration() {
        let comms = LocalCommunicator::new_team(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                let size = 10 * (c.rank() + 1);
                thread::spawn(move || c.allgather_sizes(size))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![10, 20, 30]);
        }
    }
}
