use rayon::prelude::*;

use super::SearchContext;
use super::tree::SearchTree;
use crate::infra::error::{PlannerError, Result};
use crate::infra::{Action, format_joint};
use crate::state::GridState;

/// Outcome of one ensemble decision.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleResult {
    /// One action per agent. Agents that were already done stay.
    pub actions: Vec<Action>,
    /// Pooled child visits per decided agent, in decision order.
    pub histograms: Vec<(usize, [u64; Action::COUNT])>,
    /// Nodes created across all trees.
    pub expansions: usize,
}

/// Independent trees over the same root state, searched in parallel.
pub struct TreeEnsemble<'a> {
    trees: Vec<SearchTree<'a>>,
    live: Vec<usize>,
    num_agents: usize,
}

impl<'a> TreeEnsemble<'a> {
    pub fn new(ctx: SearchContext<'a>, state: &GridState, episode_step: usize) -> Self {
        let horizon = ctx.horizon(episode_step);
        let trees = (0..ctx.config.num_parallel_trees)
            .map(|index| {
                SearchTree::new(
                    ctx,
                    state,
                    horizon,
                    tree_seed(ctx.config.seed, episode_step, index),
                )
            })
            .collect();

        Self {
            trees,
            live: state.live_agents(),
            num_agents: state.num_agents(),
        }
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Decides every live agent in index order. For each agent all trees
    /// search in parallel, their child visits are summed and the action with
    /// the highest total is committed in every tree.
    pub fn decide(&mut self) -> Result<EnsembleResult> {
        let mut actions = vec![Action::Stay; self.num_agents];
        let mut histograms = Vec::with_capacity(self.live.len());

        for &agent in &self.live {
            let outcomes: Vec<Result<usize>> =
                self.trees.par_iter_mut().map(|tree| tree.search()).collect();

            let mut histogram = [0u64; Action::COUNT];
            let mut preferences = Vec::with_capacity(self.trees.len());
            for (index, (tree, outcome)) in self.trees.iter().zip(&outcomes).enumerate() {
                match outcome {
                    Ok(_) => {
                        for (total, visits) in histogram.iter_mut().zip(tree.child_visits()) {
                            *total += u64::from(visits);
                        }
                        preferences.push(tree.best_action());
                    }
                    Err(e) => tracing::debug!(agent, tree = index, error = %e, "Tree failed"),
                }
            }

            let Some(action) = vote(&histogram, &preferences) else {
                return Err(PlannerError::NoLegalAction { agent });
            };
            tracing::debug!(agent, ?action, ?histogram, "Ensemble decision");

            for tree in &mut self.trees {
                tree.advance(action);
            }
            actions[agent] = action;
            histograms.push((agent, histogram));
        }

        let expansions: usize = self.trees.iter().map(SearchTree::expansions).sum();
        let nodes: usize = self.trees.iter().map(SearchTree::num_nodes).sum();
        tracing::debug!(
            trees = self.trees.len(),
            expansions,
            nodes,
            joint = %format_joint(&actions),
            "Ensemble finished"
        );

        Ok(EnsembleResult {
            actions,
            histograms,
            expansions,
        })
    }
}

/// Highest pooled visit count wins. Ties go to the first tree whose own
/// best action is among the tied ones, then to the lowest action index.
fn vote(histogram: &[u64; Action::COUNT], preferences: &[Option<Action>]) -> Option<Action> {
    let max = histogram.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return None;
    }
    let tied: Vec<Action> = Action::ALL
        .into_iter()
        .filter(|action| histogram[action.index()] == max)
        .collect();
    preferences
        .iter()
        .flatten()
        .find(|action| tied.contains(*action))
        .or(tied.first())
        .copied()
}

/// Per-tree seed, distinct across trees and steps.
fn tree_seed(seed: u64, episode_step: usize, index: usize) -> u64 {
    seed ^ (episode_step as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (index as u64 + 1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{CollisionSystem, PlannerConfig, Position};
    use crate::planners::{CollisionResolver, HeuristicEvaluator};
    use crate::state::GridModel;
    use std::time::Duration;

    fn decide(grid: &GridModel, config: &PlannerConfig, step: usize) -> Result<EnsembleResult> {
        let heuristic = HeuristicEvaluator::new(grid);
        let resolver = CollisionResolver::new(config.collision_system);
        let ctx = SearchContext {
            grid,
            heuristic: &heuristic,
            resolver: &resolver,
            config,
        };
        TreeEnsemble::new(ctx, &grid.state(), step).decide()
    }

    fn assert_chosen_actions_were_visited(result: &EnsembleResult) {
        for (agent, histogram) in &result.histograms {
            let action = result.actions[*agent];
            assert!(
                histogram[action.index()] > 0,
                "agent {agent} took {action:?} with {histogram:?}"
            );
        }
    }

    fn two_agent_grid() -> GridModel {
        let mut grid = GridModel::new(4, 4).unwrap();
        grid.add_agent(Position::new(1, 0), Position::new(1, 3)).unwrap();
        grid.add_agent(Position::new(0, 1), Position::new(2, 1)).unwrap();
        grid
    }

    #[test]
    fn test_vote_highest_total_wins() {
        let histogram = [1, 7, 0, 3, 7];
        assert_eq!(vote(&[1, 2, 9, 0, 0], &[]), Some(Action::Down));
        // Tie between Up and Right: the first tree preferring a tied action
        // decides.
        assert_eq!(
            vote(&histogram, &[Some(Action::Left), Some(Action::Right), Some(Action::Up)]),
            Some(Action::Right)
        );
        assert_eq!(vote(&histogram, &[None, Some(Action::Stay)]), Some(Action::Up));
        assert_eq!(vote(&[0; Action::COUNT], &[Some(Action::Up)]), None);
    }

    #[test]
    fn test_single_agent_moves_towards_goal() {
        let mut grid = GridModel::new(1, 5).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(0, 4)).unwrap();
        let config = PlannerConfig {
            num_parallel_trees: 4,
            num_expansions: 200,
            steps_limit: 4,
            heuristic_coef: 1.0,
            ..PlannerConfig::default()
        };
        let result = decide(&grid, &config, 0).unwrap();
        assert_eq!(result.actions, vec![Action::Right]);
        assert_chosen_actions_were_visited(&result);
        assert_eq!(result.histograms.len(), 1);
        let (agent, histogram) = result.histograms[0];
        assert_eq!(agent, 0);
        assert_eq!(histogram.iter().sum::<u64>(), 4 * 200);
        assert!(result.expansions > 0);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let grid = two_agent_grid();
        let config = PlannerConfig {
            num_parallel_trees: 3,
            num_expansions: 100,
            seed: 5,
            ..PlannerConfig::default()
        };
        let first = decide(&grid, &config, 2).unwrap();
        let second = decide(&grid, &config, 2).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.histograms.len(), 2);
        assert_chosen_actions_were_visited(&first);
    }

    #[test]
    fn test_joint_action_is_legal() {
        let grid = two_agent_grid();
        for system in [
            CollisionSystem::BlockBoth,
            CollisionSystem::BlockFollower,
            CollisionSystem::AllowSwap,
        ] {
            let config = PlannerConfig {
                num_parallel_trees: 2,
                num_expansions: 100,
                collision_system: system,
                ..PlannerConfig::default()
            };
            let result = decide(&grid, &config, 0).unwrap();
            assert_chosen_actions_were_visited(&result);
            let from = grid.positions();
            let targets: Vec<Position> = from
                .iter()
                .zip(&result.actions)
                .map(|(pos, action)| pos.offset(*action))
                .collect();
            for target in &targets {
                assert!(grid.is_free(target));
            }
            assert!(CollisionResolver::new(system).is_legal(&from, &targets));
        }
    }

    #[test]
    fn test_adjacent_agents_get_legal_joint() {
        let mut grid = GridModel::new(2, 3).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(0, 2)).unwrap();
        grid.add_agent(Position::new(0, 1), Position::new(0, 0)).unwrap();
        for system in [
            CollisionSystem::BlockBoth,
            CollisionSystem::BlockFollower,
            CollisionSystem::AllowSwap,
        ] {
            let config = PlannerConfig {
                num_parallel_trees: 2,
                num_expansions: 150,
                collision_system: system,
                ..PlannerConfig::default()
            };
            let result = decide(&grid, &config, 0).unwrap();
            assert_chosen_actions_were_visited(&result);
            let from = grid.positions();
            let targets: Vec<Position> = from
                .iter()
                .zip(&result.actions)
                .map(|(pos, action)| pos.offset(*action))
                .collect();
            assert!(
                CollisionResolver::new(system).is_legal(&from, &targets),
                "{system}: {:?}",
                result.actions
            );
        }
    }

    #[test]
    fn test_done_agents_stay_and_are_skipped() {
        let mut grid = GridModel::new(3, 3).unwrap();
        grid.add_agent(Position::new(1, 1), Position::new(1, 1)).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(0, 2)).unwrap();
        let config = PlannerConfig {
            num_expansions: 50,
            ..PlannerConfig::default()
        };
        let result = decide(&grid, &config, 0).unwrap();
        assert_eq!(result.actions[0], Action::Stay);
        assert_eq!(result.histograms.len(), 1);
        assert_eq!(result.histograms[0].0, 1);
        assert_chosen_actions_were_visited(&result);
    }

    #[test]
    fn test_exhausted_budget_fails_for_first_agent() {
        let grid = two_agent_grid();
        let config = PlannerConfig {
            num_parallel_trees: 2,
            time_budget: Some(Duration::ZERO),
            ..PlannerConfig::default()
        };
        assert_eq!(
            decide(&grid, &config, 0),
            Err(PlannerError::NoLegalAction { agent: 0 })
        );
    }
}
