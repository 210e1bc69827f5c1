use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use santa_types::UserId;
use santa_types::models::Pairing;

use crate::error::SolverError;
use crate::exclusion::ExclusionIndex;

/// Search limits. Together they are the solver's only timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    /// Full reshuffle-and-search attempts before giving up.
    pub max_attempts: u32,
    /// Candidate receivers examined per attempt before reshuffling. Never
    /// taken below `n * n`, the cost of one pass without backtracking.
    pub step_budget: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            step_budget: 20_000,
        }
    }
}

/// A complete giver -> receiver assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matching(BTreeMap<UserId, UserId>);

impl Matching {
    pub fn receiver_of(&self, giver: UserId) -> Option<UserId> {
        self.0.get(&giver).copied()
    }

    /// (giver, receiver) in ascending giver order.
    pub fn iter(&self) -> impl Iterator<Item = (UserId, UserId)> + '_ {
        self.0.iter().map(|(g, r)| (*g, *r))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairings(&self) -> Vec<Pairing> {
        self.iter()
            .map(|(giver, receiver)| Pairing { giver, receiver })
            .collect()
    }

    /// Bijection over `participants`, no fixed points, nothing forbidden.
    pub fn is_valid_for(&self, participants: &[UserId], index: &ExclusionIndex) -> bool {
        let members: HashSet<UserId> = participants.iter().copied().collect();
        let receivers: HashSet<UserId> = self.0.values().copied().collect();

        self.0.len() == members.len()
            && receivers == members
            && self
                .iter()
                .all(|(g, r)| members.contains(&g) && !index.forbids(g, r))
    }
}

enum Attempt {
    Found(Vec<usize>),
    /// Every branch was explored: no assignment exists.
    Exhausted,
    OverBudget,
}

/// Randomized backtracking search for an assignment that respects an
/// `ExclusionIndex`.
#[derive(Debug, Clone, Default)]
pub struct MatchingSolver {
    config: SolverConfig,
}

impl MatchingSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn solve(
        &self,
        participants: &[UserId],
        index: &ExclusionIndex,
    ) -> Result<Option<Matching>, SolverError> {
        self.solve_with_rng(participants, index, &mut rand::rng())
    }

    /// `Ok(None)` means no assignment was found: either infeasibility was
    /// proven, or every attempt ran out of budget.
    pub fn solve_with_rng<R: Rng + ?Sized>(
        &self,
        participants: &[UserId],
        index: &ExclusionIndex,
        rng: &mut R,
    ) -> Result<Option<Matching>, SolverError> {
        let n = participants.len();
        if n < 2 {
            return Err(SolverError::TooFewParticipants(n));
        }
        let mut seen = HashSet::with_capacity(n);
        for p in participants {
            if !seen.insert(*p) {
                return Err(SolverError::DuplicateParticipant(*p));
            }
        }

        if index.is_trivially_impossible(participants) || index.has_unreachable_receiver(participants)
        {
            debug!(participants = n, "Draw trivially impossible, skipping search");
            return Ok(None);
        }

        // allowed[g] = receiver positions giver g may draw
        let allowed: Vec<Vec<usize>> = participants
            .iter()
            .map(|g| {
                participants
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| !index.forbids(*g, **r))
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        let budget = self.config.step_budget.max(n.saturating_mul(n));

        for attempt in 1..=self.config.max_attempts.max(1) {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(rng);

            match search(&order, &allowed, budget, rng) {
                Attempt::Found(receiver_at) => {
                    debug!(participants = n, attempt, "Draw solution found");
                    let map = order
                        .iter()
                        .zip(receiver_at)
                        .map(|(&g, r)| (participants[g], participants[r]))
                        .collect();
                    return Ok(Some(Matching(map)));
                }
                Attempt::Exhausted => {
                    debug!(participants = n, attempt, "Search space exhausted, draw infeasible");
                    return Ok(None);
                }
                Attempt::OverBudget => {
                    debug!(participants = n, attempt, "Search over budget, reshuffling");
                }
            }
        }

        debug!(
            participants = n,
            attempts = self.config.max_attempts,
            "No draw found within budget"
        );
        Ok(None)
    }
}

/// Depth-first search over givers in `order`. Each level draws from a
/// freshly shuffled copy of its candidates, so the first untried candidate
/// is a uniform pick among those left.
fn search<R: Rng + ?Sized>(
    order: &[usize],
    allowed: &[Vec<usize>],
    budget: usize,
    rng: &mut R,
) -> Attempt {
    const NONE: usize = usize::MAX;

    let n = order.len();
    let mut used = vec![false; n];
    let mut receiver_at = vec![NONE; n];
    let mut stack: Vec<(Vec<usize>, usize)> = Vec::with_capacity(n);
    let mut steps = 0usize;

    stack.push(shuffled(&allowed[order[0]], rng));

    loop {
        let depth = stack.len() - 1;

        // Release this level's previous pick before trying the next one.
        if receiver_at[depth] != NONE {
            used[receiver_at[depth]] = false;
            receiver_at[depth] = NONE;
        }

        let (candidates, cursor) = match stack.last_mut() {
            Some(level) => level,
            None => return Attempt::Exhausted,
        };
        let mut chosen = None;
        while *cursor < candidates.len() {
            let r = candidates[*cursor];
            *cursor += 1;
            steps += 1;
            if !used[r] {
                chosen = Some(r);
                break;
            }
        }

        if steps > budget {
            return Attempt::OverBudget;
        }

        match chosen {
            Some(r) => {
                used[r] = true;
                receiver_at[depth] = r;
                if depth + 1 == n {
                    return Attempt::Found(receiver_at);
                }
                stack.push(shuffled(&allowed[order[depth + 1]], rng));
            }
            None => {
                stack.pop();
                if stack.is_empty() {
                    return Attempt::Exhausted;
                }
            }
        }
    }
}

fn shuffled<R: Rng + ?Sized>(candidates: &[usize], rng: &mut R) -> (Vec<usize>, usize) {
    let mut v = candidates.to_vec();
    v.shuffle(rng);
    (v, 0)
}
