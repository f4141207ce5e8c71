//! Team registry (spec §4.E): the predefined `TEAM_ALL` plus subteams
//! created by `dart_team_create`, each owning its own communication
//! context, unit translation table, and per-team segment id allocator.
//!
//! Grounded on `dart_team_create`/`dart_team_myid`/`dart_team_size`/
//! `dart_team_l2g`/`dart_team_g2l`
//! (`examples/original_source/dart-impl/shmem.old/dart-shmem-base/src/dart_teams.c`):
//! the original keeps a fixed `teams[MAXNUM_TEAMS]` table indexed by team
//! id, built by reducing over the next-free id and bouncing a barrier
//! index through the parent team. We keep the same "process-wide table,
//! ids minted in increasing order" shape with a `HashMap<TeamId, _>`
//! instead of a fixed-size array, and hand the id-minting + rendezvous
//! work to `Communicator::split_group` rather than a bespoke multicast
//! group allocator.

use dart_error::{DartError, DartResult};
use dart_group::Group;
use dart_segment::{SegmentDirectory, SegmentEntry, SortedSegmentRegistry, WindowId};
use dart_transport::{Communicator, Window};
use dart_types::{GlobalUnit, TeamId, TeamUnit};
use hashbrown::HashMap;
use std::sync::Arc;

/// A single team's state.
pub struct TeamEntry<D: SegmentDirectory = SortedSegmentRegistry> {
    group: Group,
    comm: Arc<dyn Communicator>,
    segments: D,
    next_segment_id: i16,
    windows: HashMap<WindowId, Arc<dyn Window>>,
    next_window_id: WindowId,
}

impl<D: SegmentDirectory> TeamEntry<D> {
    /// This team's per-team segment directory.
    pub fn segments(&self) -> &D {
        &self.segments
    }

    /// Mutable access to the segment directory, for `dart-rma`'s
    /// allocate/register/deregister calls.
    pub fn segments_mut(&mut self) -> &mut D {
        &mut self.segments
    }

    /// The transport communication context backing this team.
    pub fn communicator(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    /// Allocates the next unused segment id for this team (spec §4.B:
    /// ids are team-scoped, minted in increasing order, `SEGMENT_LOCAL`
    /// reserved).
    pub fn alloc_segment_id(&mut self) -> i16 {
        let id = self.next_segment_id;
        self.next_segment_id += 1;
        id
    }

    /// Registers a freshly created transport window under a new id,
    /// minted separately from segment ids since one window can in
    /// principle back several segments (the local backend never shares
    /// one, but the interface does not assume that).
    pub fn register_window(&mut self, window: Arc<dyn Window>) -> WindowId {
        let id = self.next_window_id;
        self.next_window_id += 1;
        self.windows.insert(id, window);
        id
    }

    /// Looks up a previously registered window.
    pub fn window(&self, id: WindowId) -> DartResult<&Arc<dyn Window>> {
        self.windows
            .get(&id)
            .ok_or(DartError::NotFound("unknown window id"))
    }
}

/// Process-wide table of live teams, generic over the segment directory
/// implementation every team uses internally (spec's registry design
/// note: "an interface with two implementations; callers depend on the
/// interface only").
pub struct TeamRegistry<D: SegmentDirectory = SortedSegmentRegistry> {
    my_global: GlobalUnit,
    next_team_id: i16,
    entries: HashMap<TeamId, TeamEntry<D>>,
}

impl<D: SegmentDirectory> TeamRegistry<D> {
    /// Registers `TEAM_ALL` over every unit in `root_comm`, as
    /// `dart_teams_init` does with `superteam_id == -1`.
    pub fn new(my_global: GlobalUnit, root_comm: Arc<dyn Communicator>) -> Self {
        let all_group = Group::from_units(
            &(0..root_comm.size() as i32)
                .map(GlobalUnit::new)
                .collect::<Vec<_>>(),
        );
        let mut entries = HashMap::new();
        entries.insert(
            TeamId::ALL,
            TeamEntry {
                group: all_group,
                comm: root_comm,
                segments: D::default(),
                next_segment_id: dart_types::SEGMENT_LOCAL + 1,
                windows: HashMap::new(),
                next_window_id: 0,
            },
        );
        TeamRegistry {
            my_global,
            next_team_id: TeamId::ALL.raw() + 1,
            entries,
        }
    }

    fn entry(&self, team: TeamId) -> DartResult<&TeamEntry<D>> {
        self.entries
            .get(&team)
            .ok_or(DartError::NotFound("unknown team id"))
    }

    fn entry_mut(&mut self, team: TeamId) -> DartResult<&mut TeamEntry<D>> {
        self.entries
            .get_mut(&team)
            .ok_or(DartError::NotFound("unknown team id"))
    }

    /// Borrows the team's entry, for `dart-rma`/`dart-lock` to reach its
    /// segment directory and communicator.
    pub fn get(&self, team: TeamId) -> DartResult<&TeamEntry<D>> {
        self.entry(team)
    }

    /// Mutably borrows the team's entry.
    pub fn get_mut(&mut self, team: TeamId) -> DartResult<&mut TeamEntry<D>> {
        self.entry_mut(team)
    }

    /// Creates a subteam of `parent` from `group` (spec §4.E), collective
    /// over every unit of `parent`. Units absent from `group` take no
    /// part in the underlying transport rendezvous and receive
    /// `TeamId::NULL` back, matching the original's convention that only
    /// members of the new team get a meaningful id.
    pub fn create(&mut self, parent: TeamId, group: &Group) -> DartResult<TeamId> {
        let parent_entry = self.entry(parent)?;

        if !group.ismember(self.my_global) {
            return Ok(TeamId::NULL);
        }

        let mut ranks = Vec::with_capacity(group.size());
        for &unit in group.getmembers() {
            let rank = parent_entry
                .group
                .getmembers()
                .iter()
                .position(|&m| m == unit)
                .ok_or(DartError::Inval("group is not a subset of its parent team"))?;
            ranks.push(rank);
        }
        ranks.sort_unstable();

        let comm = parent_entry.comm.split_group(&ranks);

        // Every unit independently tracks `next_team_id` as it creates
        // teams; members of a *new* team may have taken different paths
        // to get here (e.g. one was already a member of an unrelated,
        // disjoint subteam the other never joined), so their local
        // counters can disagree. Spec §3/§4.E requires every member of
        // the new team to land on the *same* id, so we run a small
        // collective max-reduction over the freshly split communicator
        // (coordinator = its rank 0) before minting the id, mirroring
        // the "reduce max(next_free_team_id)... take max+1" algorithm.
        let agreed = agree_on_next_team_id(&*comm, self.next_team_id);
        let id = TeamId::new(agreed);
        self.next_team_id = agreed + 1;

        self.entries.insert(
            id,
            TeamEntry {
                group: group.clone(),
                comm,
                segments: D::default(),
                next_segment_id: dart_types::SEGMENT_LOCAL + 1,
                windows: HashMap::new(),
                next_window_id: 0,
            },
        );
        Ok(id)
    }

    /// Tears down a team, warning (via the segment directory's own
    /// `destroy`) if segments are still registered.
    pub fn destroy(&mut self, team: TeamId) -> DartResult<()> {
        if team == TeamId::ALL {
            return Err(DartError::Inval("TEAM_ALL cannot be destroyed"));
        }
        let mut entry = self
            .entries
            .remove(&team)
            .ok_or(DartError::NotFound("unknown team id"))?;
        entry.segments.destroy();
        Ok(())
    }

    /// This unit's team-local id within `team`.
    pub fn myid(&self, team: TeamId) -> DartResult<TeamUnit> {
        Ok(TeamUnit::new(self.entry(team)?.comm.rank() as i32))
    }

    /// Number of units in `team`.
    pub fn size(&self, team: TeamId) -> DartResult<usize> {
        Ok(self.entry(team)?.comm.size())
    }

    /// A copy of `team`'s member group.
    pub fn get_group(&self, team: TeamId) -> DartResult<Group> {
        Ok(self.entry(team)?.group.clone())
    }

    /// Translates a team-local unit id to its global id.
    pub fn unit_l2g(&self, team: TeamId, local: TeamUnit) -> DartResult<GlobalUnit> {
        let entry = self.entry(team)?;
        entry
            .group
            .getmembers()
            .get(local.raw() as usize)
            .copied()
            .ok_or(DartError::Inval("local unit id out of range for team"))
    }

    /// Translates a global unit id to its id local to `team`.
    pub fn unit_g2l(&self, team: TeamId, global: GlobalUnit) -> DartResult<TeamUnit> {
        let entry = self.entry(team)?;
        entry
            .group
            .getmembers()
            .iter()
            .position(|&m| m == global)
            .map(|idx| TeamUnit::new(idx as i32))
            .ok_or(DartError::Inval("unit is not a member of team"))
    }

    /// Collective barrier over every member of `team`.
    pub fn barrier(&self, team: TeamId) -> DartResult<()> {
        self.entry(team)?.comm.barrier();
        Ok(())
    }
}

/// Collectively agrees, among every member of the freshly split
/// sub-communicator `comm`, on the highest locally proposed next-team-id
/// candidate, then returns `max + 1` to everyone. Rank 0 of the new
/// sub-communicator acts as coordinator; the exchange uses two-sided
/// send/recv plus the communicator's own broadcast, so it works over any
/// `Communicator` implementation, not just the local one.
const TEAM_ID_AGREEMENT_TAG: u32 = 0xD487_7EA4;

fn agree_on_next_team_id(comm: &dyn Communicator, candidate: i16) -> i16 {
    let rank = comm.rank();
    let size = comm.size();
    let agreed = if rank == 0 {
        let mut max_candidate = candidate;
        for peer in 1..size {
            let bytes = comm
                .recv(peer, TEAM_ID_AGREEMENT_TAG)
                .expect("team id agreement recv");
            let peer_candidate = i16::from_le_bytes(bytes.try_into().unwrap());
            max_candidate = max_candidate.max(peer_candidate);
        }
        max_candidate
    } else {
        comm.send(0, TEAM_ID_AGREEMENT_TAG, &candidate.to_le_bytes())
            .expect("team id agreement send");
        0
    };
    let mut buf = agreed.to_le_bytes();
    comm.broadcast(0, &mut buf);
    i16::from_le_bytes(buf)
}

/// Used only by `dart-segment`'s `SegmentEntry` when a team registers its
/// own arbitrary buffer; re-exported here for convenience of callers that
/// only depend on `dart-team`.
pub type SegmentHandle = SegmentEntry;
