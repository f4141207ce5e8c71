//! Local, purely in-memory unit groups (spec §4.D). Groups carry no
//! communication context; they are ordinary value types, freely copied and
//! combined on a single unit without coordinating with anyone else.

use dart_types::GlobalUnit;

/// An ordered set of global unit ids, `|g| <= N`. Members are always kept
/// strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    members: Vec<GlobalUnit>,
}

impl Group {
    /// An empty group.
    pub fn new() -> Self {
        Group::default()
    }

    /// Builds a group from an arbitrary slice of units, sorting and
    /// deduplicating as the ordering invariant requires.
    pub fn from_units(units: &[GlobalUnit]) -> Self {
        let mut members = units.to_vec();
        members.sort_unstable();
        members.dedup();
        Group { members }
    }

    /// Number of members, `|g|`.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Inserts `u`, preserving order; idempotent.
    pub fn addmember(&mut self, u: GlobalUnit) {
        if let Err(idx) = self.members.binary_search(&u) {
            self.members.insert(idx, u);
        }
    }

    /// Removes `u`; a no-op if absent.
    pub fn delmember(&mut self, u: GlobalUnit) {
        if let Ok(idx) = self.members.binary_search(&u) {
            self.members.remove(idx);
        }
    }

    /// Whether `u` is a member.
    pub fn ismember(&self, u: GlobalUnit) -> bool {
        self.members.binary_search(&u).is_ok()
    }

    /// Fills `out` with the members in order, truncating/resizing to fit.
    pub fn getmembers(&self) -> &[GlobalUnit] {
        &self.members
    }

    /// Ordered union, no duplicates.
    pub fn union(&self, other: &Group) -> Group {
        let mut members = Vec::with_capacity(self.members.len() + other.members.len());
        let (mut i, mut j) = (0, 0);
        while i < self.members.len() && j < other.members.len() {
            match self.members[i].cmp(&other.members[j]) {
                std::cmp::Ordering::Less => {
                    members.push(self.members[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    members.push(other.members[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    members.push(self.members[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        members.extend_from_slice(&self.members[i..]);
        members.extend_from_slice(&other.members[j..]);
        Group { members }
    }

    /// Ordered intersection.
    pub fn intersect(&self, other: &Group) -> Group {
        let mut members = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.members.len() && j < other.members.len() {
            match self.members[i].cmp(&other.members[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    members.push(self.members[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        Group { members }
    }

    /// Partitions into at most `n` contiguous, near-equal sized subgroups:
    /// each sub-group has size `ceil(|g|/n)` or `floor(|g|/n)`, and their
    /// union equals `self` (spec §8).
    pub fn split(&self, n: usize) -> Vec<Group> {
        if n == 0 || self.members.is_empty() {
            return Vec::new();
        }
        let n = n.min(self.members.len());
        let base = self.members.len() / n;
        let remainder = self.members.len() % n;

        let mut out = Vec::with_capacity(n);
        let mut start = 0;
        for i in 0..n {
            let chunk_len = base + usize::from(i < remainder);
            out.push(Group {
                members: self.members[start..start + chunk_len].to_vec(),
            });
            start += chunk_len;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(id: i32) -> GlobalUnit {
        GlobalUnit::new(id)
    }

    #[test]
    fn addmember_preserves_order_and_is_idempotent() {
        let mut g = Group::new();
        g.addmember(u(3));
        g.addmember(u(1));
        g.addmember(u(3));
        g.addmember(u(2));
        assert_eq!(g.getmembers(), &[u(1), u(2), u(3)]);
    }

    #[test]
    fn union_dedupes_and_orders() {
        let a = Group::from_units(&[u(0), u(2), u(4)]);
        let b = Group::from_units(&[u(1), u(2), u(3)]);
        assert_eq!(a.union(&b).getmembers(), &[u(0), u(1), u(2), u(3), u(4)]);
    }

    #[test]
    fn intersect_keeps_only_common_members() {
        let a = Group::from_units(&[u(0), u(2), u(4)]);
        let b = Group::from_units(&[u(1), u(2), u(3), u(4)]);
        assert_eq!(a.intersect(&b).getmembers(), &[u(2), u(4)]);
    }

    #[test]
    fn split_covers_group_with_near_equal_sizes() {
        let g = Group::from_units(&(0..10).map(u).collect::<Vec<_>>());
        let parts = g.split(4);
        assert_eq!(parts.len(), 4);
        let sizes: Vec<_> = parts.iter().map(Group::size).collect();
        assert!(sizes.iter().all(|&s| s == 2 || s == 3));
        let rejoined = parts
            .iter()
            .fold(Group::new(), |acc, p| acc.union(p));
        assert_eq!(rejoined, g);
    }
}
