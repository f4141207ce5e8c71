//! End-to-end scenarios from spec §8, driven over the in-process local
//! transport: one OS thread per unit, synchronized only through
//! `dart-runtime`'s public API (`init`, `team_create`, RMA, collectives,
//! locks) — never by reaching into a transport or registry directly.

use dart_group::Group;
use dart_runtime::config::RuntimeConfig;
use dart_runtime::Runtime;
use dart_transport::LocalCommunicator;
use dart_types::{BaseType, GlobalUnit, Operation, TeamId};
use std::thread;

fn runtimes(size: usize) -> Vec<Runtime> {
    LocalCommunicator::new_team(size)
        .into_iter()
        .map(|c| Runtime::init_single(c, &RuntimeConfig::default()).unwrap())
        .collect()
}

/// Scenario 1: broadcast of a 1024-int buffer from unit 0.
#[test]
fn broadcast_of_a_1024_int_buffer() {
    const N: usize = 1024;
    let rts = runtimes(4);
    let handles: Vec<_> = rts
        .into_iter()
        .map(|rt| {
            thread::spawn(move || {
                let myid = rt.myid().raw();
                let mut ints = [0i32; N];
                if myid == 0 {
                    for (i, v) in ints.iter_mut().enumerate() {
                        *v = i as i32;
                    }
                }
                let mut bytes = vec![0u8; N * 4];
                for (i, v) in ints.iter().enumerate() {
                    bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
                }
                rt.bcast(TeamId::ALL, 0, &mut bytes).unwrap();
                rt.team_barrier(TeamId::ALL).unwrap();
                for (i, chunk) in bytes.chunks_exact(4).enumerate() {
                    let v = i32::from_le_bytes(chunk.try_into().unwrap());
                    assert_eq!(v, i as i32);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

/// Scenario 2: blocked allgather, `nelem=3`, `sendbuf[j] = myid*100+j`.
#[test]
fn blocked_allgather() {
    const NELEM: usize = 3;
    let rts = runtimes(4);
    let handles: Vec<_> = rts
        .into_iter()
        .map(|rt| {
            thread::spawn(move || {
                let myid = rt.myid().raw();
                let mut sendbuf = vec![0u8; NELEM * 4];
                for j in 0..NELEM {
                    let v = myid * 100 + j as i32;
                    sendbuf[j * 4..j * 4 + 4].copy_from_slice(&v.to_le_bytes());
                }
                let mut recvbuf = vec![0u8; NELEM * 4 * 4];
                rt.allgather(TeamId::ALL, &sendbuf, &mut recvbuf, NELEM * 4).unwrap();
                for u in 0..4 {
                    for j in 0..NELEM {
                        let off = (u * NELEM + j) * 4;
                        let v = i32::from_le_bytes(recvbuf[off..off + 4].try_into().unwrap());
                        assert_eq!(v, u as i32 * 100 + j as i32);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

/// Scenario 3: put + flush + allreduce sum.
#[test]
fn put_flush_and_allreduce_sum() {
    let rts = runtimes(4);
    let handles: Vec<_> = rts
        .into_iter()
        .map(|mut rt| {
            thread::spawn(move || {
                let myid = rt.myid().raw();
                let mut gptr = rt.team_memalloc_aligned(TeamId::ALL, 4).unwrap();
                rt.team_barrier(TeamId::ALL).unwrap();

                let target = (myid + 1) % 4;
                gptr.setunit(target);
                rt.put(gptr, &(myid + 1).to_le_bytes(), 1, BaseType::Int, BaseType::Int)
                    .unwrap();
                rt.flush(gptr).unwrap();
                rt.team_barrier(TeamId::ALL).unwrap();

                gptr.setunit(myid);
                let mut mine = [0u8; 4];
                rt.get(gptr, &mut mine, 1, BaseType::Int, BaseType::Int).unwrap();

                let mut total = [0u8; 4];
                rt.allreduce(TeamId::ALL, &mine, &mut total, 1, BaseType::Int, Operation::Sum)
                    .unwrap();
                assert_eq!(i32::from_le_bytes(total), 10);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

/// Scenario 4: lock-protected counter, 1000 acquire/increment/release
/// cycles per unit, final value `4000`.
#[test]
fn lock_protected_counter() {
    const ITERS: i32 = 1000;
    let rts = runtimes(4);
    let handles: Vec<_> = rts
        .into_iter()
        .map(|mut rt| {
            thread::spawn(move || {
                let mut counter = rt.team_memalloc_aligned(TeamId::ALL, 4).unwrap();
                counter.setunit(0);
                let lock = rt.team_lock_init(TeamId::ALL).unwrap();
                rt.team_barrier(TeamId::ALL).unwrap();

                for _ in 0..ITERS {
                    rt.lock_acquire(lock).unwrap();
                    let mut cur = [0u8; 4];
                    rt.get(counter, &mut cur, 1, BaseType::Int, BaseType::Int).unwrap();
                    let next = i32::from_le_bytes(cur) + 1;
                    rt.put_blocking(counter, &next.to_le_bytes(), 1, BaseType::Int, BaseType::Int)
                        .unwrap();
                    rt.lock_release(lock).unwrap();
                }

                rt.team_barrier(TeamId::ALL).unwrap();
                rt.team_lock_free(lock).unwrap();

                let mut fin = [0u8; 4];
                rt.get(counter, &mut fin, 1, BaseType::Int, BaseType::Int).unwrap();
                i32::from_le_bytes(fin)
            })
        })
        .collect();
    let finals: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(finals.iter().all(|&v| v == 4000));
}

/// Scenario 5: compare-and-swap contention. Exactly one unit wins.
#[test]
fn compare_and_swap_contention() {
    let rts = runtimes(4);
    let handles: Vec<_> = rts
        .into_iter()
        .map(|rt| {
            thread::spawn(move || {
                let myid = rt.myid().raw();
                let mut gptr = rt.team_memalloc_aligned(TeamId::ALL, 4).unwrap();
                gptr.setunit(0);
                rt.team_barrier(TeamId::ALL).unwrap();

                let mut result = [0u8; 4];
                rt.compare_and_swap(
                    gptr,
                    &(myid + 1).to_le_bytes(),
                    &0i32.to_le_bytes(),
                    &mut result,
                    BaseType::Int,
                )
                .unwrap();
                rt.team_barrier(TeamId::ALL).unwrap();

                let mut fin = [0u8; 4];
                rt.get(gptr, &mut fin, 1, BaseType::Int, BaseType::Int).unwrap();
                (myid, i32::from_le_bytes(result), i32::from_le_bytes(fin))
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = outcomes.iter().filter(|&&(_, observed, _)| observed == 0).collect();
    assert_eq!(winners.len(), 1);
    let (winner_id, _, _) = winners[0];
    let final_value = outcomes[0].2;
    assert_eq!(final_value, winner_id + 1);
    for &(_, _, fin) in &outcomes {
        assert_eq!(fin, final_value);
    }
    for &(id, observed, _) in &outcomes {
        if id != *winner_id {
            assert_ne!(observed, 0);
        }
    }
}

/// Scenario 6: split `TEAM_ALL` by `myid mod 2`, `allreduce SUM` of
/// `myid` within each sub-team.
#[test]
fn team_split_and_intra_team_collective() {
    let rts = runtimes(4);
    let handles: Vec<_> = rts
        .into_iter()
        .map(|mut rt| {
            thread::spawn(move || {
                let myid = rt.myid().raw();
                let parity = myid % 2;
                let members: Vec<_> = (0..4)
                    .filter(|u| u % 2 == parity)
                    .map(GlobalUnit::new)
                    .collect();
                let subgroup = Group::from_units(&members);
                let sub = rt.team_create(TeamId::ALL, &subgroup).unwrap();
                assert_ne!(sub, TeamId::NULL);

                let mut total = [0u8; 4];
                rt.allreduce(sub, &myid.to_le_bytes(), &mut total, 1, BaseType::Int, Operation::Sum)
                    .unwrap();

                rt.team_destroy(sub).unwrap();
                (parity, i32::from_le_bytes(total))
            })
        })
        .collect();

    for h in handles {
        let (parity, total) = h.join().unwrap();
        if parity == 0 {
            assert_eq!(total, 2);
        } else {
            assert_eq!(total, 4);
        }
    }
}
