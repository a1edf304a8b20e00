//! Decision-time Monte Carlo tree search over joint actions.
//!
//! Every step builds fresh trees rooted at the committed state. A tree
//! decides one live agent per level; the ensemble pools the trees' visit
//! counts per agent and commits the winning action in all of them before the
//! next agent is searched.

mod ensemble;
mod node;
mod rollout;
mod tree;

pub use ensemble::{EnsembleResult, TreeEnsemble};
pub use node::{NodeArena, NodeId, SearchNode};
pub use tree::SearchTree;

use crate::infra::error::Result;
use crate::infra::PlannerConfig;
use crate::planners::{CollisionResolver, HeuristicEvaluator};
use crate::state::{GridModel, GridState};

/// Read-only inputs shared by every tree of a decision.
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    pub grid: &'a GridModel,
    pub heuristic: &'a HeuristicEvaluator,
    pub resolver: &'a CollisionResolver,
    pub config: &'a PlannerConfig,
}

impl<'a> SearchContext<'a> {
    /// Remaining rollout horizon at `episode_step`. Never below one step so a
    /// decision is still possible past the limit.
    pub fn horizon(&self, episode_step: usize) -> usize {
        self.config.steps_limit.saturating_sub(episode_step).max(1)
    }
}

/// Ensemble MCTS strategy.
#[derive(Debug, Clone, Default)]
pub struct MctsPlanner;

impl MctsPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(
        &self,
        ctx: SearchContext<'_>,
        state: &GridState,
        episode_step: usize,
    ) -> Result<EnsembleResult> {
        let mut ensemble = TreeEnsemble::new(ctx, state, episode_step);
        ensemble.decide()
    }
}
