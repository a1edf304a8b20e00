//! Leaf evaluation by heuristic-biased random playouts.

use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use super::node::NodeId;
use super::tree::SearchTree;
use crate::infra::Action;
use crate::state::{GridState, ObservationWindow};

impl SearchTree<'_> {
    /// Mean return of `rollouts_per_leaf` playouts from `leaf`. `partial`
    /// holds the actions already fixed for the leaf's step.
    pub(super) fn rollout(&mut self, leaf: NodeId, partial: &[Action]) -> f64 {
        let runs = self.ctx.config.rollouts_per_leaf.max(1);
        let total: f64 = (0..runs).map(|_| self.rollout_once(leaf, partial)).sum();
        total / runs as f64
    }

    fn rollout_once(&mut self, leaf: NodeId, partial: &[Action]) -> f64 {
        let node = self.arena.get(leaf);
        let mut state = node.state.clone();
        let mut depth = node.depth;
        let mut first_slot = node.slot;
        let mut slot_actions = partial.to_vec();

        let gamma = self.ctx.config.gamma;
        let mut ret = 0.0;
        let mut discount = 1.0;

        while depth < self.horizon && !self.all_live_done(&state) {
            for slot in first_slot..self.live.len() {
                let action = self.sample_action(&state, slot, &slot_actions);
                slot_actions.push(action);
            }
            let next = self
                .ctx
                .grid
                .apply(&state, &self.joint(&slot_actions), self.ctx.resolver);
            ret += discount * self.step_reward(&state, &next);
            discount *= gamma;
            state = next;
            depth += 1;
            first_slot = 0;
            slot_actions.clear();
        }

        ret + self.shaping(&state)
    }

    /// Samples an admissible action, favouring moves that shorten the
    /// agent's distance to its goal.
    pub(super) fn sample_action(&mut self, state: &GridState, slot: usize, partial: &[Action]) -> Action {
        let agent = self.live[slot];
        if state.is_done(agent) {
            return Action::Stay;
        }

        let pos = state.position(agent);
        let mut candidates = self.admissible(state, slot, partial);
        if self.ctx.config.agents_as_obstacles {
            let window =
                ObservationWindow::extract(self.ctx.grid, state, agent, self.ctx.config.obs_radius);
            candidates.retain(|action| window.agent_at(&pos.offset(*action)).is_none());
        }

        let here = self.ctx.heuristic.distance(agent, &pos);
        let bonus = self.ctx.config.heuristic_coef;
        let weights: Vec<f64> = candidates
            .iter()
            .map(|action| {
                let there = self.ctx.heuristic.distance(agent, &pos.offset(*action));
                match (here, there) {
                    (Some(here), Some(there)) if there < here => 1.0 + bonus,
                    _ => 1.0,
                }
            })
            .collect();

        match WeightedIndex::new(&weights) {
            Ok(dist) => candidates[dist.sample(&mut self.rng)],
            Err(_) => Action::Stay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SearchContext;
    use super::*;
    use crate::infra::{CollisionSystem, PlannerConfig, Position};
    use crate::planners::{CollisionResolver, HeuristicEvaluator};
    use crate::state::GridModel;

    fn with_tree<F>(grid: GridModel, config: PlannerConfig, f: F)
    where
        F: FnOnce(&mut SearchTree<'_>, &GridState),
    {
        let heuristic = HeuristicEvaluator::new(&grid);
        let resolver = CollisionResolver::new(config.collision_system);
        let ctx = SearchContext {
            grid: &grid,
            heuristic: &heuristic,
            resolver: &resolver,
            config: &config,
        };
        let state = grid.state();
        let mut tree = SearchTree::new(ctx, &state, ctx.horizon(0), 11);
        f(&mut tree, &state);
    }

    #[test]
    fn test_rollout_value_is_bounded() {
        let mut grid = GridModel::new(4, 4).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(3, 3)).unwrap();
        grid.add_agent(Position::new(3, 0), Position::new(0, 3)).unwrap();
        let config = PlannerConfig {
            rollouts_per_leaf: 4,
            ..PlannerConfig::default()
        };
        let coef = config.heuristic_coef;
        with_tree(grid, config, |tree, _| {
            for _ in 0..20 {
                let value = tree.rollout(0, &[]);
                assert!(value >= 0.0);
                assert!(value <= 2.0 + 2.0 * coef + 1e-9);
            }
        });
    }

    #[test]
    fn test_short_horizon_rollout_is_shaping_only() {
        let mut grid = GridModel::new(1, 3).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(0, 2)).unwrap();
        let config = PlannerConfig {
            steps_limit: 1,
            ..PlannerConfig::default()
        };
        with_tree(grid, config, |tree, state| {
            // One step cannot reach the goal two cells away.
            let value = tree.rollout(0, &[]);
            assert!(value == 0.0 || (value - 0.25).abs() < 1e-9);
            assert_eq!(tree.shaping(state), 0.0);
        });
    }

    #[test]
    fn test_sampled_actions_are_admissible() {
        let mut grid = GridModel::new(2, 2).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(1, 1)).unwrap();
        grid.add_agent(Position::new(0, 1), Position::new(1, 0)).unwrap();
        with_tree(grid, PlannerConfig::default(), |tree, state| {
            for _ in 0..50 {
                let first = tree.sample_action(state, 0, &[]);
                assert!(tree.admissible(state, 0, &[]).contains(&first));
                let second = tree.sample_action(state, 1, &[first]);
                assert!(tree.admissible(state, 1, &[first]).contains(&second));
            }
        });
    }

    #[test]
    fn test_agents_as_obstacles_avoids_visible_agents() {
        let mut grid = GridModel::new(1, 3).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(0, 2)).unwrap();
        grid.add_agent(Position::new(0, 1), Position::new(0, 0)).unwrap();
        let config = PlannerConfig {
            agents_as_obstacles: true,
            collision_system: CollisionSystem::AllowSwap,
            ..PlannerConfig::default()
        };
        with_tree(grid, config, |tree, state| {
            for _ in 0..20 {
                assert_eq!(tree.sample_action(state, 0, &[]), Action::Stay);
            }
        });
    }
}
