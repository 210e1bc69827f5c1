use std::collections::{HashMap, HashSet};

use tracing::debug;

use santa_types::UserId;
use santa_types::models::Exclusion;

/// Forbidden receivers per giver.
///
/// Self-assignment is always forbidden and is not stored; `forbids` answers
/// it directly.
#[derive(Debug, Clone, Default)]
pub struct ExclusionIndex {
    forbidden: HashMap<UserId, HashSet<UserId>>,
}

impl ExclusionIndex {
    /// Pairs naming someone outside `participants`, and self pairs, are
    /// dropped.
    pub fn build(participants: &[UserId], exclusions: &[Exclusion]) -> Self {
        let members: HashSet<UserId> = participants.iter().copied().collect();
        let mut forbidden: HashMap<UserId, HashSet<UserId>> = HashMap::new();
        let mut ignored = 0usize;

        for ex in exclusions {
            if ex.user_id == ex.excluded_user_id
                || !members.contains(&ex.user_id)
                || !members.contains(&ex.excluded_user_id)
            {
                ignored += 1;
                continue;
            }
            forbidden
                .entry(ex.user_id)
                .or_default()
                .insert(ex.excluded_user_id);
        }

        if ignored > 0 {
            debug!(ignored, "Ignored exclusions outside the participant set");
        }

        Self { forbidden }
    }

    pub fn forbids(&self, giver: UserId, receiver: UserId) -> bool {
        giver == receiver
            || self
                .forbidden
                .get(&giver)
                .is_some_and(|set| set.contains(&receiver))
    }

    /// Explicitly forbidden receivers of `giver`.
    pub fn forbidden_for(&self, giver: UserId) -> impl Iterator<Item = UserId> + '_ {
        self.forbidden.get(&giver).into_iter().flatten().copied()
    }

    /// Number of explicit (non-self) exclusions kept.
    pub fn len(&self) -> usize {
        self.forbidden.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True iff some participant may not give to any other participant.
    ///
    /// Necessary but not sufficient for infeasibility.
    pub fn is_trivially_impossible(&self, participants: &[UserId]) -> bool {
        let members: HashSet<UserId> = participants.iter().copied().collect();
        let others = members.len().saturating_sub(1);

        members.iter().any(|p| {
            let blocked = self
                .forbidden_for(*p)
                .filter(|r| r != p && members.contains(r))
                .count();
            blocked >= others
        })
    }

    /// True iff some participant may not receive from any other participant.
    pub fn has_unreachable_receiver(&self, participants: &[UserId]) -> bool {
        let members: HashSet<UserId> = participants.iter().copied().collect();
        members.iter().any(|r| {
            members
                .iter()
                .filter(|g| *g != r)
                .all(|g| self.forbids(*g, *r))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex(pairs: &[(UserId, UserId)]) -> Vec<Exclusion> {
        pairs.iter().map(|&(a, b)| Exclusion::new(a, b)).collect()
    }

    #[test]
    fn self_is_always_forbidden() {
        let index = ExclusionIndex::build(&[1, 2, 3], &[]);
        assert!(index.forbids(1, 1));
        assert!(!index.forbids(1, 2));
        assert!(index.is_empty());
    }

    #[test]
    fn exclusions_are_directional() {
        let index = ExclusionIndex::build(&[1, 2, 3], &ex(&[(1, 2)]));
        assert!(index.forbids(1, 2));
        assert!(!index.forbids(2, 1));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn unknown_and_self_pairs_ignored() {
        let index = ExclusionIndex::build(&[1, 2, 3], &ex(&[(1, 9), (9, 1), (2, 2), (3, 1)]));
        assert_eq!(index.len(), 1);
        assert!(index.forbids(3, 1));
        assert_eq!(index.forbidden_for(1).count(), 0);
    }

    #[test]
    fn two_people_one_exclusion_is_trivial() {
        let index = ExclusionIndex::build(&[1, 2], &ex(&[(1, 2)]));
        assert!(index.is_trivially_impossible(&[1, 2]));
    }

    #[test]
    fn excluding_everyone_else_is_trivial() {
        let index = ExclusionIndex::build(&[1, 2, 3, 4], &ex(&[(2, 1), (2, 3), (2, 4)]));
        assert!(index.is_trivially_impossible(&[1, 2, 3, 4]));
    }

    #[test]
    fn partial_exclusions_are_not_trivial() {
        let index = ExclusionIndex::build(&[1, 2, 3, 4], &ex(&[(2, 1), (2, 3), (1, 2)]));
        assert!(!index.is_trivially_impossible(&[1, 2, 3, 4]));
        assert!(!index.has_unreachable_receiver(&[1, 2, 3, 4]));
    }

    #[test]
    fn nobody_may_give_to_one_participant() {
        let index = ExclusionIndex::build(&[1, 2, 3], &ex(&[(2, 1), (3, 1)]));
        assert!(!index.is_trivially_impossible(&[1, 2, 3]));
        assert!(index.has_unreachable_receiver(&[1, 2, 3]));
    }
}
