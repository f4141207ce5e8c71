//! Collective layer (spec §4.I): barrier, bcast, scatter, gather,
//! allgather(v), alltoall, reduce, allreduce, built entirely atop the
//! transport's `barrier`/`broadcast`/`send`/`recv` primitives.
//!
//! Per the spec's stated implementation freedom ("when the transport
//! provides a native collective, use it; otherwise linear root-to-all...
//! is acceptable"), every multi-unit exchange here is a linear,
//! root-coordinated algorithm built from point-to-point messages. A
//! transport that exposes true collective hardware support would
//! override these at the `Communicator` layer instead; the one backend
//! this workspace ships has no such hardware to exploit.

use dart_datatype::apply_reduction;
use dart_error::{DartError, DartResult};
use dart_transport::Communicator;
use dart_types::{BaseType, Operation};

const SCATTER_TAG: u32 = 0xC011_0001;
const GATHER_TAG: u32 = 0xC011_0002;
const ALLGATHERV_TAG: u32 = 0xC011_0003;
const ALLTOALL_TAG: u32 = 0xC011_0004;
const REDUCE_TAG: u32 = 0xC011_0005;

/// No unit returns until all have entered.
pub fn barrier(comm: &dyn Communicator) {
    comm.barrier();
}

/// `buf` on `root` is replicated to every unit.
pub fn bcast(comm: &dyn Communicator, root: usize, buf: &mut [u8]) {
    comm.broadcast(root, buf);
}

/// Equal-sized chunks of `sendbuf` on `root` distributed one per unit.
/// `sendbuf` is only read on `root`; `recvbuf` must be `chunk_size` bytes
/// everywhere.
pub fn scatter(
    comm: &dyn Communicator,
    root: usize,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    chunk_size: usize,
) -> DartResult<()> {
    if recvbuf.len() != chunk_size {
        return Err(DartError::Inval("scatter recvbuf must be exactly one chunk"));
    }
    if comm.rank() == root {
        if sendbuf.len() != chunk_size * comm.size() {
            return Err(DartError::Inval("scatter sendbuf must hold size() chunks on root"));
        }
        for dest in 0..comm.size() {
            let chunk = &sendbuf[dest * chunk_size..(dest + 1) * chunk_size];
            if dest == root {
                recvbuf.copy_from_slice(chunk);
            } else {
                comm.send(dest, SCATTER_TAG, chunk)?;
            }
        }
    } else {
        let data = comm.recv(root, SCATTER_TAG)?;
        recvbuf.copy_from_slice(&data);
    }
    Ok(())
}

/// Inverse of `scatter`: each unit's `chunk_size`-byte `sendbuf` lands
/// concatenated, in rank order, in `root`'s `recvbuf`.
pub fn gather(
    comm: &dyn Communicator,
    root: usize,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    chunk_size: usize,
) -> DartResult<()> {
    if sendbuf.len() != chunk_size {
        return Err(DartError::Inval("gather sendbuf must be exactly one chunk"));
    }
    if comm.rank() == root {
        if recvbuf.len() != chunk_size * comm.size() {
            return Err(DartError::Inval("gather recvbuf must hold size() chunks on root"));
        }
        for src in 0..comm.size() {
            let slot = &mut recvbuf[src * chunk_size..(src + 1) * chunk_size];
            if src == root {
                slot.copy_from_slice(sendbuf);
            } else {
                let data = comm.recv(src, GATHER_TAG)?;
                slot.copy_from_slice(&data);
            }
        }
    } else {
        comm.send(root, GATHER_TAG, sendbuf)?;
    }
    Ok(())
}

/// Every unit receives every unit's `chunk_size`-byte contribution, in
/// rank order. Implemented as `gather` to unit 0 followed by `bcast`.
pub fn allgather(
    comm: &dyn Communicator,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    chunk_size: usize,
) -> DartResult<()> {
    gather(comm, 0, sendbuf, recvbuf, chunk_size)?;
    bcast(comm, 0, recvbuf);
    Ok(())
}

/// `allgather` with per-unit send counts and receive displacements:
/// unit `u` contributes `sendbuf` (`recvcounts[u]` bytes) which lands at
/// `recvbuf[displs[u]..displs[u]+recvcounts[u]]` on every unit.
pub fn allgatherv(
    comm: &dyn Communicator,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    recvcounts: &[usize],
    displs: &[usize],
) -> DartResult<()> {
    if recvcounts.len() != comm.size() || displs.len() != comm.size() {
        return Err(DartError::Inval(
            "allgatherv recvcounts/displs must have one entry per unit",
        ));
    }
    if sendbuf.len() != recvcounts[comm.rank()] {
        return Err(DartError::Inval("allgatherv sendbuf must match this unit's recvcounts entry"));
    }
    let total: usize = recvcounts.iter().sum();
    if recvbuf.len() != total {
        return Err(DartError::Inval("allgatherv recvbuf must hold the sum of recvcounts"));
    }

    if comm.rank() == 0 {
        for src in 0..comm.size() {
            let slot = &mut recvbuf[displs[src]..displs[src] + recvcounts[src]];
            if src == 0 {
                slot.copy_from_slice(sendbuf);
            } else {
                let data = comm.recv(src, ALLGATHERV_TAG)?;
                slot.copy_from_slice(&data);
            }
        }
    } else {
        comm.send(0, ALLGATHERV_TAG, sendbuf)?;
    }
    bcast(comm, 0, recvbuf);
    Ok(())
}

/// Pairwise exchange: unit `u` sends `sendbuf[v*nbytes..(v+1)*nbytes]` to
/// unit `v` and receives unit `v`'s contribution into
/// `recvbuf[v*nbytes..(v+1)*nbytes]`.
pub fn alltoall(
    comm: &dyn Communicator,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    nbytes: usize,
) -> DartResult<()> {
    let size = comm.size();
    if sendbuf.len() != nbytes * size || recvbuf.len() != nbytes * size {
        return Err(DartError::Inval("alltoall buffers must hold size() chunks"));
    }
    for dest in 0..size {
        let chunk = &sendbuf[dest * nbytes..(dest + 1) * nbytes];
        if dest == comm.rank() {
            recvbuf[dest * nbytes..(dest + 1) * nbytes].copy_from_slice(chunk);
        } else {
            comm.send(dest, ALLTOALL_TAG, chunk)?;
        }
    }
    for src in 0..size {
        if src == comm.rank() {
            continue;
        }
        let data = comm.recv(src, ALLTOALL_TAG)?;
        recvbuf[src * nbytes..(src + 1) * nbytes].copy_from_slice(&data);
    }
    Ok(())
}

/// Element-wise reduction of every unit's `sendbuf` into `root`'s
/// `recvbuf`. `recvbuf` is meaningful only on `root`.
pub fn reduce(
    comm: &dyn Communicator,
    root: usize,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    nelem: usize,
    ty: BaseType,
    op: Operation,
) -> DartResult<()> {
    op.check_compatible(ty)?;
    let nbytes = ty.size() * nelem;
    if sendbuf.len() != nbytes || recvbuf.len() != nbytes {
        return Err(DartError::Inval("reduce buffers must be nelem*sizeof(type) bytes"));
    }
    if comm.rank() == root {
        recvbuf.copy_from_slice(sendbuf);
        for src in 0..comm.size() {
            if src == root {
                continue;
            }
            let data = comm.recv(src, REDUCE_TAG)?;
            for (dst, src_elem) in recvbuf.chunks_exact_mut(ty.size()).zip(data.chunks_exact(ty.size()))
            {
                apply_reduction(dst, src_elem, ty, op)?;
            }
        }
    } else {
        comm.send(root, REDUCE_TAG, sendbuf)?;
    }
    Ok(())
}

/// `reduce` whose result lands in every unit's `recvbuf` (reduce to unit
/// 0 followed by a broadcast).
pub fn allreduce(
    comm: &dyn Communicator,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    nelem: usize,
    ty: BaseType,
    op: Operation,
) -> DartResult<()> {
    reduce(comm, 0, sendbuf, recvbuf, nelem, ty, op)?;
    bcast(comm, 0, recvbuf);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dart_transport::LocalCommunicator;
    use std::thread;

    #[test]
    fn scatter_then_gather_roundtrips() {
        let comms = LocalCommunicator::new_team(4);
        let send_on_root: Vec<u8> = (0..4u8).collect();
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                let send_on_root = send_on_root.clone();
                thread::spawn(move || {
                    let mut mine = [0u8; 1];
                    scatter(&*c, 0, &send_on_root, &mut mine, 1).unwrap();
                    assert_eq!(mine[0], c.rank() as u8);

                    let mut gathered = if c.rank() == 0 { vec![0u8; 4] } else { vec![] };
                    gather(&*c, 0, &mine, &mut gathered, 1).unwrap();
                    if c.rank() == 0 {
                        assert_eq!(gathered, vec![0, 1, 2, 3]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn allgather_replicates_every_contribution() {
        let comms = LocalCommunicator::new_team(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                thread::spawn(move || {
                    let mine = [c.rank() as u8 * 10];
                    let mut all = vec![0u8; 3];
                    allgather(&*c, &mine, &mut all, 1).unwrap();
                    all
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![0, 10, 20]);
        }
    }

    #[test]
    fn alltoall_delivers_each_pairs_chunk() {
        let comms = LocalCommunicator::new_team(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                thread::spawn(move || {
                    // unit `rank` sends `rank*10 + dest` to `dest`
                    let send: Vec<u8> = (0..3u8).map(|dest| c.rank() as u8 * 10 + dest).collect();
                    let mut recv = vec![0u8; 3];
                    alltoall(&*c, &send, &mut recv, 1).unwrap();
                    recv
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for (rank, recv) in results.iter().enumerate() {
            for (src, &val) in recv.iter().enumerate() {
                assert_eq!(val, (src as u8) * 10 + rank as u8);
            }
        }
    }

    #[test]
    fn allreduce_sums_every_contribution() {
        let comms = LocalCommunicator::new_team(4);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                thread::spawn(move || {
                    let mine = ((c.rank() + 1) as i32).to_le_bytes();
                    let mut out = [0u8; 4];
                    allreduce(&*c, &mine, &mut out, 1, BaseType::Int, Operation::Sum).unwrap();
                    i32::from_le_bytes(out)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 1 + 2 + 3 + 4);
        }
    }

    #[test]
    fn allgatherv_honors_nonuniform_counts() {
        let comms = LocalCommunicator::new_team(3);
        let counts = vec![1usize, 2, 3];
        let displs = vec![0usize, 1, 3];
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                let counts = counts.clone();
                let displs = displs.clone();
                thread::spawn(move || {
                    let send = vec![(c.rank() as u8) + 1; counts[c.rank()]];
                    let mut recv = vec![0u8; 6];
                    allgatherv(&*c, &send, &mut recv, &counts, &displs).unwrap();
                    recv
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![1, 2, 2, 3, 3, 3]);
        }
    }
}
