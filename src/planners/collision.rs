//! Collision semantics shared by the search, the fallback planner, the
//! committed transition and the simulated environment.

use std::collections::{HashMap, HashSet};

use crate::infra::error::{PlannerError, Result};
use crate::infra::{CollisionSystem, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionResolver {
    system: CollisionSystem,
}

impl CollisionResolver {
    pub fn new(system: CollisionSystem) -> Self {
        Self { system }
    }

    pub fn system(&self) -> CollisionSystem {
        self.system
    }

    /// Final positions for agents at `from` that want to reach `targets`.
    /// Rejected agents stay where they are.
    pub fn resolve(&self, from: &[Position], targets: &[Position]) -> Vec<Position> {
        debug_assert_eq!(from.len(), targets.len());
        let mut finals = match self.system {
            CollisionSystem::BlockBoth => Self::resolve_block_both(from, targets),
            CollisionSystem::BlockFollower => Self::resolve_sequential(from, targets),
            CollisionSystem::AllowSwap => Self::resolve_allow_swap(from, targets),
        };
        Self::settle(from, &mut finals);
        finals
    }

    /// True iff `resolve` accepts every proposed move.
    pub fn is_legal(&self, from: &[Position], targets: &[Position]) -> bool {
        self.resolve(from, targets) == targets
    }

    fn resolve_block_both(from: &[Position], targets: &[Position]) -> Vec<Position> {
        #[derive(PartialEq)]
        enum Mark {
            Visited,
            Blocked,
        }

        let mut used: HashMap<Position, Mark> = HashMap::new();
        for (pos, target) in from.iter().zip(targets) {
            let mark = if used.contains_key(target) {
                Mark::Blocked
            } else {
                Mark::Visited
            };
            used.insert(*target, mark);
            used.insert(*pos, Mark::Blocked);
        }

        from.iter()
            .zip(targets)
            .map(|(pos, target)| {
                if target != pos && used.get(target) == Some(&Mark::Visited) {
                    *target
                } else {
                    *pos
                }
            })
            .collect()
    }

    fn resolve_sequential(from: &[Position], targets: &[Position]) -> Vec<Position> {
        let mut occupied: HashSet<Position> = from.iter().copied().collect();
        let mut finals = from.to_vec();

        for (agent, target) in targets.iter().enumerate() {
            if *target == from[agent] || occupied.contains(target) {
                continue;
            }
            occupied.remove(&from[agent]);
            occupied.insert(*target);
            finals[agent] = *target;
        }

        finals
    }

    fn resolve_allow_swap(from: &[Position], targets: &[Position]) -> Vec<Position> {
        let mut target_counts: HashMap<Position, usize> = HashMap::new();
        for target in targets {
            *target_counts.entry(*target).or_insert(0) += 1;
        }
        let occupant: HashMap<Position, usize> =
            from.iter().enumerate().map(|(agent, pos)| (*pos, agent)).collect();

        from.iter()
            .zip(targets)
            .enumerate()
            .map(|(agent, (pos, target))| {
                if target == pos || target_counts.get(target).copied().unwrap_or(0) > 1 {
                    return *pos;
                }
                match occupant.get(target) {
                    Some(&other) if other != agent && targets[other] != *pos => *pos,
                    _ => *target,
                }
            })
            .collect()
    }

    /// Reverts moved agents that still share a cell until none do.
    fn settle(from: &[Position], finals: &mut [Position]) {
        loop {
            let mut revert = Vec::new();
            for i in 0..finals.len() {
                for j in (i + 1)..finals.len() {
                    if finals[i] == finals[j] {
                        if finals[i] != from[i] {
                            revert.push(i);
                        }
                        if finals[j] != from[j] {
                            revert.push(j);
                        }
                    }
                }
            }
            if revert.is_empty() {
                return;
            }
            tracing::trace!(agents = ?revert, "Settling residual collisions");
            for agent in revert {
                finals[agent] = from[agent];
            }
        }
    }

    /// Incremental check used while a joint action is assembled agent by
    /// agent. `decided[j]` holds the target already chosen for agent `j` this
    /// step (done agents are passed as staying). Staying is admitted unless an
    /// earlier agent is moving into this agent's cell under `AllowSwap`; the
    /// only admitted answer then is the swap.
    pub fn admits(
        &self,
        from: &[Position],
        decided: &[Option<Position>],
        agent: usize,
        target: Position,
    ) -> bool {
        if self.system == CollisionSystem::AllowSwap
            && let Some(entering) =
                (0..from.len()).find(|&other| other != agent && decided[other] == Some(from[agent]))
            && target != from[entering]
        {
            return false;
        }
        if target == from[agent] {
            return true;
        }

        for other in 0..from.len() {
            if other == agent {
                continue;
            }
            let other_target = decided[other];
            if other_target == Some(target) {
                return false;
            }

            match self.system {
                CollisionSystem::BlockBoth => {
                    if from[other] == target {
                        return false;
                    }
                }
                CollisionSystem::BlockFollower => {
                    let occupied = if other < agent {
                        other_target.unwrap_or(from[other])
                    } else {
                        from[other]
                    };
                    if occupied == target {
                        return false;
                    }
                }
                CollisionSystem::AllowSwap => {
                    if from[other] == target {
                        // Undecided occupants may still swap with us.
                        if let Some(t) = other_target
                            && t != from[agent]
                        {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Fails if two agents share a cell.
    pub fn validate(positions: &[Position]) -> Result<()> {
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                if positions[i] == positions[j] {
                    return Err(PlannerError::CollisionViolation {
                        cell: positions[i],
                        first: i,
                        second: j,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(row: i32, col: i32) -> Position {
        Position::new(row, col)
    }

    fn resolver(system: CollisionSystem) -> CollisionResolver {
        CollisionResolver::new(system)
    }

    const ALL_SYSTEMS: [CollisionSystem; 3] = [
        CollisionSystem::BlockBoth,
        CollisionSystem::BlockFollower,
        CollisionSystem::AllowSwap,
    ];

    #[test]
    fn test_same_target_blocks_both_agents() {
        let from = [p(0, 0), p(0, 2)];
        let targets = [p(0, 1), p(0, 1)];
        for system in [CollisionSystem::BlockBoth, CollisionSystem::AllowSwap] {
            assert_eq!(resolver(system).resolve(&from, &targets), from.to_vec());
        }
    }

    #[test]
    fn test_block_follower_first_agent_wins_contested_cell() {
        let from = [p(0, 0), p(0, 2)];
        let targets = [p(0, 1), p(0, 1)];
        let finals = resolver(CollisionSystem::BlockFollower).resolve(&from, &targets);
        assert_eq!(finals, vec![p(0, 1), p(0, 2)]);
    }

    #[test]
    fn test_swap_rules() {
        let from = [p(0, 0), p(0, 1)];
        let targets = [p(0, 1), p(0, 0)];
        assert_eq!(
            resolver(CollisionSystem::BlockBoth).resolve(&from, &targets),
            from.to_vec()
        );
        assert_eq!(
            resolver(CollisionSystem::BlockFollower).resolve(&from, &targets),
            from.to_vec()
        );
        assert_eq!(
            resolver(CollisionSystem::AllowSwap).resolve(&from, &targets),
            targets.to_vec()
        );
    }

    #[test]
    fn test_following_rules() {
        // Agent 1 follows agent 0 along a row.
        let from = [p(0, 1), p(0, 0)];
        let targets = [p(0, 2), p(0, 1)];
        assert_eq!(
            resolver(CollisionSystem::BlockBoth).resolve(&from, &targets),
            vec![p(0, 2), p(0, 0)]
        );
        assert_eq!(
            resolver(CollisionSystem::BlockFollower).resolve(&from, &targets),
            targets.to_vec()
        );

        // Leader has the higher index: it has not moved yet when the
        // follower is processed.
        let from = [p(0, 0), p(0, 1)];
        let targets = [p(0, 1), p(0, 2)];
        assert_eq!(
            resolver(CollisionSystem::BlockFollower).resolve(&from, &targets),
            vec![p(0, 0), p(0, 2)]
        );
    }

    #[test]
    fn test_allow_swap_with_third_agent_settles() {
        // 0 and 1 swap, 2 contests agent 1's target cell.
        let from = [p(1, 0), p(1, 1), p(0, 0)];
        let targets = [p(1, 1), p(1, 0), p(1, 0)];
        let finals = resolver(CollisionSystem::AllowSwap).resolve(&from, &targets);
        assert!(CollisionResolver::validate(&finals).is_ok());
        assert_eq!(finals[1], p(1, 1));
        assert_eq!(finals[2], p(0, 0));
    }

    #[test]
    fn test_resolved_states_never_share_cells() {
        // Dense cluster where every agent pushes into its neighbour.
        let from = [p(0, 0), p(0, 1), p(1, 1), p(1, 0), p(2, 1)];
        let moves = [
            [p(0, 1), p(1, 1), p(1, 0), p(0, 0), p(1, 1)],
            [p(1, 0), p(0, 0), p(0, 1), p(1, 1), p(2, 0)],
            [p(0, 0), p(0, 2), p(2, 1), p(2, 0), p(1, 1)],
        ];
        for system in ALL_SYSTEMS {
            for targets in &moves {
                let finals = resolver(system).resolve(&from, targets);
                assert!(
                    CollisionResolver::validate(&finals).is_ok(),
                    "{:?} produced {:?}",
                    system,
                    finals
                );
            }
        }
    }

    #[test]
    fn test_is_legal() {
        let from = [p(0, 0), p(2, 2)];
        let r = resolver(CollisionSystem::BlockBoth);
        assert!(r.is_legal(&from, &[p(0, 1), p(2, 1)]));
        assert!(!r.is_legal(&from, &[p(1, 1), p(1, 1)]));
    }

    #[test]
    fn test_admits_block_both() {
        let from = [p(0, 0), p(0, 2), p(2, 2)];
        let r = resolver(CollisionSystem::BlockBoth);
        let decided = [None, Some(p(0, 1)), None];
        assert!(!r.admits(&from, &decided, 0, p(0, 1)));
        assert!(r.admits(&from, &decided, 0, p(1, 0)));
        assert!(r.admits(&from, &decided, 0, p(0, 0)));
        // Occupied by agent 2, whichever way it moves.
        assert!(!r.admits(&from, &[None, None, None], 1, p(2, 2)));
    }

    #[test]
    fn test_admits_block_follower() {
        let from = [p(0, 1), p(0, 0)];
        let r = resolver(CollisionSystem::BlockFollower);
        // Agent 0 vacated (0,1), agent 1 may follow.
        assert!(r.admits(&from, &[Some(p(0, 2)), None], 1, p(0, 1)));
        // Agent 0 stays, so (0,1) is still taken.
        assert!(!r.admits(&from, &[Some(p(0, 1)), None], 1, p(0, 1)));
        // Agent 0 may not enter the cell of a later agent.
        assert!(!r.admits(&from, &[None, None], 0, p(0, 0)));
    }

    #[test]
    fn test_admits_allow_swap() {
        let from = [p(0, 0), p(0, 1)];
        let r = resolver(CollisionSystem::AllowSwap);
        assert!(r.admits(&from, &[None, None], 0, p(0, 1)));
        assert!(r.admits(&from, &[Some(p(0, 1)), None], 1, p(0, 0)));
        assert!(!r.admits(&from, &[Some(p(1, 0)), None], 1, p(0, 0)));
    }

    #[test]
    fn test_allow_swap_entered_agent_must_swap() {
        let from = [p(0, 0), p(0, 1)];
        let r = resolver(CollisionSystem::AllowSwap);
        let decided = [Some(p(0, 1)), None];
        assert!(r.admits(&from, &decided, 1, p(0, 0)));
        assert!(!r.admits(&from, &decided, 1, p(0, 1)));
        assert!(!r.admits(&from, &decided, 1, p(1, 1)));
        assert!(!r.admits(&from, &decided, 1, p(0, 2)));
    }

    #[test]
    fn test_admitted_joints_are_legal() {
        // Agents in a row with a free cell on every side.
        let from = [p(1, 1), p(1, 2), p(2, 1)];
        let cells = |pos: Position| {
            [
                pos,
                p(pos.row - 1, pos.col),
                p(pos.row + 1, pos.col),
                p(pos.row, pos.col - 1),
                p(pos.row, pos.col + 1),
            ]
        };
        for system in ALL_SYSTEMS {
            let r = resolver(system);
            for a in cells(from[0]) {
                if !r.admits(&from, &[None, None, None], 0, a) {
                    continue;
                }
                for b in cells(from[1]) {
                    if !r.admits(&from, &[Some(a), None, None], 1, b) {
                        continue;
                    }
                    for c in cells(from[2]) {
                        if !r.admits(&from, &[Some(a), Some(b), None], 2, c) {
                            continue;
                        }
                        let targets = [a, b, c];
                        assert!(
                            r.is_legal(&from, &targets),
                            "{:?} admitted {:?}",
                            system,
                            targets
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_validate_reports_pair() {
        let err = CollisionResolver::validate(&[p(0, 0), p(1, 1), p(0, 0)]).unwrap_err();
        assert_eq!(
            err,
            PlannerError::CollisionViolation {
                cell: p(0, 0),
                first: 0,
                second: 2
            }
        );
    }
}
