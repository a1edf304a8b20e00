//! Prioritized A* replanning, used as the fallback when the search cannot
//! produce an action and as a standalone strategy.

use std::collections::HashSet;

use crate::infra::{AStar, Action, Position, format_joint};
use crate::planners::{CollisionResolver, HeuristicEvaluator};
use crate::state::{GridModel, GridState, ObservationWindow};

#[derive(Debug, Clone)]
pub struct ReactivePlanner {
    obs_radius: i32,
}

impl ReactivePlanner {
    pub fn new(obs_radius: i32) -> Self {
        Self { obs_radius }
    }

    /// One action per agent. Agents are handled in index order and each one
    /// only detours around agents that were handled before it or are done.
    /// The joint action is accepted unchanged by `resolver`.
    pub fn plan(
        &self,
        grid: &GridModel,
        heuristic: &HeuristicEvaluator,
        resolver: &CollisionResolver,
        state: &GridState,
    ) -> Vec<Action> {
        let from = state.positions();
        let mut decided: Vec<Option<Position>> = from
            .iter()
            .enumerate()
            .map(|(agent, pos)| state.is_done(agent).then_some(*pos))
            .collect();
        let mut actions = vec![Action::Stay; from.len()];

        for agent in 0..from.len() {
            if state.is_done(agent) {
                continue;
            }
            let target = self
                .choose(grid, heuristic, resolver, state, &decided, agent)
                .unwrap_or(from[agent]);
            decided[agent] = Some(target);
            actions[agent] = Action::between(from[agent], target).unwrap_or(Action::Stay);
        }

        tracing::debug!(joint = %format_joint(&actions), "Reactive plan");
        actions
    }

    fn choose(
        &self,
        grid: &GridModel,
        heuristic: &HeuristicEvaluator,
        resolver: &CollisionResolver,
        state: &GridState,
        decided: &[Option<Position>],
        agent: usize,
    ) -> Option<Position> {
        let from = state.positions();
        let pos = from[agent];
        let window = ObservationWindow::extract(grid, state, agent, self.obs_radius);
        let blocked: HashSet<Position> = window
            .visible_agents()
            .into_iter()
            .filter(|&other| other < agent || state.is_done(other))
            .flat_map(|other| [Some(from[other]), decided[other]])
            .flatten()
            .collect();

        let step = AStar::find_path(grid, pos, grid.goal(agent), |p| !blocked.contains(p))
            .and_then(|path| path.get(1).copied());
        if let Some(next) = step
            && Self::accepts(resolver, from, decided, agent, next)
        {
            return Some(next);
        }

        let here = heuristic.distance(agent, &pos)?;
        let mut greedy: Vec<(u32, Position)> = grid
            .neighbors(&pos)
            .into_iter()
            .filter_map(|next| {
                heuristic
                    .distance(agent, &next)
                    .filter(|d| *d < here)
                    .map(|d| (d, next))
            })
            .collect();
        greedy.sort_by_key(|(d, _)| *d);
        tracing::trace!(agent, ?step, candidates = greedy.len(), "Detour unusable, trying greedy steps");

        greedy
            .into_iter()
            .map(|(_, next)| next)
            .find(|next| Self::accepts(resolver, from, decided, agent, *next))
    }

    fn accepts(
        resolver: &CollisionResolver,
        from: &[Position],
        decided: &[Option<Position>],
        agent: usize,
        target: Position,
    ) -> bool {
        if !resolver.admits(from, decided, agent, target) {
            return false;
        }
        if from[agent + 1..].contains(&target) {
            return false;
        }
        // No swaps with earlier agents, even where the rules would allow one.
        !(0..agent).any(|earlier| from[earlier] == target && decided[earlier] == Some(from[agent]))
    }
}
