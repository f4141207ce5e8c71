//! One-sided transfer engine (spec §4.G): regular, blocking, and handle
//! put/get, flush variants, and atomics, all resolving a `GlobalPtr`
//! through a team's segment directory into a concrete `(window, unit,
//! offset)` triple before handing off to the transport.
//!
//! The local-unit degenerate case and the shared-memory-vs-dynamic-window
//! fast path the spec calls out are both handled uniformly by the
//! transport's `Window` implementation (its `Mutex`-guarded regions make
//! same-unit and cross-unit access equally cheap), so this engine itself
//! never special-cases them.

use dart_datatype::check_rma_types_compatible;
use dart_error::{DartError, DartResult};
use dart_handle::{HandleId, HandleStore};
use dart_segment::{Binding, SegmentDirectory, SortedSegmentRegistry};
use dart_team::TeamRegistry;
use dart_transport::Window;
use dart_types::{BaseType, GlobalPtr, Operation, SEGMENT_LOCAL};
use std::sync::Arc;

/// Resolves a global pointer to the concrete window, team-local target
/// unit, and byte offset an RMA operation must address.
fn resolve<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
) -> DartResult<(Arc<dyn Window>, usize, u64)> {
    if gptr.segment_id == SEGMENT_LOCAL {
        return Err(DartError::Inval(
            "RMA does not apply to the non-collective local segment; access it directly",
        ));
    }
    if gptr.unit < 0 {
        return Err(DartError::Inval("RMA target unit is undefined"));
    }
    let team = teams.get(gptr.team_id)?;
    let segment = team.segments().get(gptr.segment_id)?;
    let window = team.window(segment.window)?.clone();
    let target = gptr.unit as usize;

    let offset = match &segment.binding {
        Binding::Dynamic { disp } => {
            let base = disp
                .get(target)
                .copied()
                .ok_or(DartError::Inval("gptr unit out of range for its segment"))?;
            base + gptr.addr_or_offset
        }
        Binding::Shared { size, .. } => {
            if gptr.addr_or_offset as usize >= *size {
                return Err(DartError::Inval("offset out of range for segment"));
            }
            gptr.addr_or_offset
        }
    };
    Ok((window, target, offset))
}

fn nbytes(ty: BaseType, nelem: usize) -> usize {
    ty.size() * nelem
}

/// Regular (non-blocking-completion) put: returns once issued, not once
/// complete; pair with `flush`/`flush_all` for remote visibility.
pub fn put<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
    buf: &[u8],
    nelem: usize,
    src_type: BaseType,
    dst_type: BaseType,
) -> DartResult<()> {
    check_rma_types_compatible(src_type, dst_type)?;
    let n = nbytes(dst_type, nelem);
    let data = buf
        .get(..n)
        .ok_or(DartError::Inval("source buffer shorter than nelem*sizeof(type)"))?;
    let (window, unit, offset) = resolve(teams, gptr)?;
    window.put(unit, offset, data)
}

/// Regular get; see `put`.
pub fn get<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
    buf: &mut [u8],
    nelem: usize,
    src_type: BaseType,
    dst_type: BaseType,
) -> DartResult<()> {
    check_rma_types_compatible(src_type, dst_type)?;
    let n = nbytes(dst_type, nelem);
    if buf.len() < n {
        return Err(DartError::Inval("destination buffer shorter than nelem*sizeof(type)"));
    }
    let (window, unit, offset) = resolve(teams, gptr)?;
    window.get(unit, offset, &mut buf[..n])
}

/// Blocking put: on return, both local buffer re-usability and remote
/// visibility hold.
pub fn put_blocking<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
    buf: &[u8],
    nelem: usize,
    src_type: BaseType,
    dst_type: BaseType,
) -> DartResult<()> {
    put(teams, gptr, buf, nelem, src_type, dst_type)?;
    let (window, unit, _) = resolve(teams, gptr)?;
    window.flush(unit);
    Ok(())
}

/// Blocking get; see `put_blocking`.
pub fn get_blocking<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
    buf: &mut [u8],
    nelem: usize,
    src_type: BaseType,
    dst_type: BaseType,
) -> DartResult<()> {
    get(teams, gptr, buf, nelem, src_type, dst_type)?;
    let (window, unit, _) = resolve(teams, gptr)?;
    window.flush_local(unit);
    Ok(())
}

/// Handle put: returns immediately with a handle resolving via
/// `wait`/`wait_local`/`test`/`test_local`.
pub fn put_handle<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    handles: &mut HandleStore,
    gptr: GlobalPtr,
    buf: &[u8],
    nelem: usize,
    src_type: BaseType,
    dst_type: BaseType,
) -> DartResult<HandleId> {
    put(teams, gptr, buf, nelem, src_type, dst_type)?;
    Ok(handles.post_for_segment(true, true, gptr.team_id.raw(), gptr.segment_id))
}

/// Handle get; see `put_handle`.
pub fn get_handle<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    handles: &mut HandleStore,
    gptr: GlobalPtr,
    buf: &mut [u8],
    nelem: usize,
    src_type: BaseType,
    dst_type: BaseType,
) -> DartResult<HandleId> {
    get(teams, gptr, buf, nelem, src_type, dst_type)?;
    Ok(handles.post_for_segment(true, true, gptr.team_id.raw(), gptr.segment_id))
}

/// Remote completion for pending ops on the segment+unit denoted by
/// `gptr`.
pub fn flush<D: SegmentDirectory>(teams: &TeamRegistry<D>, gptr: GlobalPtr) -> DartResult<()> {
    let (window, unit, _) = resolve(teams, gptr)?;
    window.flush(unit);
    Ok(())
}

/// Local completion only (buffer re-usable) for the segment+unit denoted
/// by `gptr`.
pub fn flush_local<D: SegmentDirectory>(teams: &TeamRegistry<D>, gptr: GlobalPtr) -> DartResult<()> {
    let (window, unit, _) = resolve(teams, gptr)?;
    window.flush_local(unit);
    Ok(())
}

/// Remote completion for the segment across every target unit.
pub fn flush_all<D: SegmentDirectory>(teams: &TeamRegistry<D>, gptr: GlobalPtr) -> DartResult<()> {
    let (window, _, _) = resolve(teams, gptr)?;
    window.flush_all();
    Ok(())
}

/// Local completion across every target unit of the segment.
pub fn flush_local_all<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
) -> DartResult<()> {
    let (window, _, _) = resolve(teams, gptr)?;
    window.flush_local_all();
    Ok(())
}

/// Element-wise atomic update; non-blocking, local buffer not guaranteed
/// free on return.
pub fn accumulate<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
    values: &[u8],
    nelem: usize,
    ty: BaseType,
    op: Operation,
) -> DartResult<()> {
    op.check_compatible(ty)?;
    let n = nbytes(ty, nelem);
    let data = values
        .get(..n)
        .ok_or(DartError::Inval("accumulate buffer shorter than nelem*sizeof(type)"))?;
    let (window, unit, offset) = resolve(teams, gptr)?;
    window.accumulate(unit, offset, data, ty, op)
}

/// `accumulate`, blocking until the local buffer is free to reuse.
pub fn accumulate_blocking_local<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
    values: &[u8],
    nelem: usize,
    ty: BaseType,
    op: Operation,
) -> DartResult<()> {
    accumulate(teams, gptr, values, nelem, ty, op)?;
    let (window, unit, _) = resolve(teams, gptr)?;
    window.flush_local(unit);
    Ok(())
}

/// Single-element atomic fetch-and-op; writes the pre-update value into
/// `result`.
pub fn fetch_and_op<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
    value: &[u8],
    result: &mut [u8],
    ty: BaseType,
    op: Operation,
) -> DartResult<()> {
    op.check_compatible(ty)?;
    let elem = ty.size();
    if value.len() != elem || result.len() != elem {
        return Err(DartError::Inval("fetch_and_op value/result must be exactly one element"));
    }
    let (window, unit, offset) = resolve(teams, gptr)?;
    let prev = window.fetch_and_op(unit, offset, value, ty, op)?;
    result.copy_from_slice(&prev);
    Ok(())
}

/// Single-element atomic compare-and-swap (integral types only); writes
/// the pre-swap-attempt value into `result`.
pub fn compare_and_swap<D: SegmentDirectory>(
    teams: &TeamRegistry<D>,
    gptr: GlobalPtr,
    value: &[u8],
    compare: &[u8],
    result: &mut [u8],
    ty: BaseType,
) -> DartResult<()> {
    if ty.is_float() {
        return Err(DartError::Inval("compare_and_swap requires an integer type"));
    }
    let elem = ty.size();
    if value.len() != elem || compare.len() != elem || result.len() != elem {
        return Err(DartError::Inval(
            "compare_and_swap value/compare/result must be exactly one element",
        ));
    }
    let (window, unit, offset) = resolve(teams, gptr)?;
    let prev = window.compare_and_swap(unit, offset, value, compare, ty)?;
    result.copy_from_slice(&prev);
    Ok(())
}

/// Type alias for callers that only need the default, sorted-list segment
/// directory (the common case outside of `dart-runtime`'s generic glue).
pub type DefaultTeamRegistry = TeamRegistry<SortedSegmentRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use dart_datatype::DatatypeHandle;
    use dart_segment::SegmentEntry;
    use dart_transport::LocalCommunicator;
    use dart_types::{GlobalUnit, SegmentFlags, TeamId};

    fn single_unit_team_with_segment(
        local_size: usize,
    ) -> (TeamRegistry<SortedSegmentRegistry>, GlobalPtr) {
        let comms = LocalCommunicator::new_team(1);
        let comm = comms.into_iter().next().unwrap();
        let mut teams = TeamRegistry::<SortedSegmentRegistry>::new(GlobalUnit::new(0), comm);

        let team = teams.get_mut(TeamId::ALL).unwrap();
        let window = team.communicator().create_dynamic_window(local_size);
        let window_id = team.register_window(window);
        let segment_id = team.alloc_segment_id();
        team.segments_mut()
            .add(
                segment_id,
                SegmentEntry {
                    local_size,
                    datatype: DatatypeHandle::Base(BaseType::Int),
                    flags: SegmentFlags::ALIGNED,
                    window: window_id,
                    binding: Binding::Dynamic { disp: vec![0] },
                },
            )
            .unwrap();

        let gptr = GlobalPtr {
            unit: 0,
            flags: 0,
            segment_id,
            team_id: TeamId::ALL,
            addr_or_offset: 0,
        };
        (teams, gptr)
    }

    #[test]
    fn put_then_get_roundtrips() {
        let (teams, gptr) = single_unit_team_with_segment(16);
        put(&teams, gptr, &42i32.to_le_bytes(), 1, BaseType::Int, BaseType::Int).unwrap();
        let mut out = [0u8; 4];
        get(&teams, gptr, &mut out, 1, BaseType::Int, BaseType::Int).unwrap();
        assert_eq!(i32::from_le_bytes(out), 42);
    }

    #[test]
    fn mismatched_type_sizes_rejected() {
        let (teams, gptr) = single_unit_team_with_segment(16);
        let err = put(&teams, gptr, &[0u8; 4], 1, BaseType::Int, BaseType::Long).unwrap_err();
        assert!(matches!(err, DartError::Inval(_)));
    }

    #[test]
    fn handle_put_completes_synchronously() {
        let (teams, gptr) = single_unit_team_with_segment(16);
        let mut handles = HandleStore::new();
        let h = put_handle(
            &teams,
            &mut handles,
            gptr,
            &7i32.to_le_bytes(),
            1,
            BaseType::Int,
            BaseType::Int,
        )
        .unwrap();
        assert!(handles.test(h).unwrap());
        handles.wait(h).unwrap();
        handles.free(h).unwrap();
    }

    #[test]
    fn fetch_and_op_returns_preupdate_value() {
        let (teams, gptr) = single_unit_team_with_segment(16);
        put(&teams, gptr, &10i32.to_le_bytes(), 1, BaseType::Int, BaseType::Int).unwrap();
        let mut prev = [0u8; 4];
        fetch_and_op(
            &teams,
            gptr,
            &5i32.to_le_bytes(),
            &mut prev,
            BaseType::Int,
            Operation::Sum,
        )
        .unwrap();
        assert_eq!(i32::from_le_bytes(prev), 10);
        let mut out = [0u8; 4];
        get(&teams, gptr, &mut out, 1, BaseType::Int, BaseType::Int).unwrap();
        assert_eq!(i32::from_le_bytes(out), 15);
    }

    #[test]
    fn rma_on_local_segment_is_rejected() {
        let (teams, mut gptr) = single_unit_team_with_segment(16);
        gptr.segment_id = SEGMENT_LOCAL;
        assert!(put(&teams, gptr, &[0u8; 4], 1, BaseType::Int, BaseType::Int).is_err());
    }
}
