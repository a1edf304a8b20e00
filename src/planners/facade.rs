use std::fmt;

use crate::infra::error::{PlannerError, Result};
use crate::infra::{Action, PlannerConfig, Position, SimulationType, format_joint};
use crate::planners::mcts::{MctsPlanner, SearchContext};
use crate::planners::{CollisionResolver, HeuristicEvaluator, ReactivePlanner};
use crate::state::GridModel;

/// Decision strategy, selected once from the configuration.
#[derive(Debug, Clone)]
pub enum Strategy {
    Mcts(MctsPlanner),
    Replan(ReactivePlanner),
}

/// Where the last joint action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionSource {
    #[default]
    Idle,
    AllDone,
    Mcts,
    Fallback,
    Replan,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecisionSource::Idle => "idle",
            DecisionSource::AllDone => "all-done",
            DecisionSource::Mcts => "mcts",
            DecisionSource::Fallback => "fallback",
            DecisionSource::Replan => "replan",
        };
        write!(f, "{}", name)
    }
}

/// Statistics of the most recent [`PlannerFacade::act`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanningStats {
    pub step: usize,
    pub expansions: usize,
    pub used_fallback: bool,
    pub source: DecisionSource,
    pub fallback_reason: Option<PlannerError>,
}

/// Entry point of the planner: owns the world model and turns the committed
/// state into one joint action per call.
pub struct PlannerFacade {
    config: PlannerConfig,
    grid: GridModel,
    heuristic: HeuristicEvaluator,
    resolver: CollisionResolver,
    strategy: Strategy,
    fallback: ReactivePlanner,
    step: usize,
    stats: PlanningStats,
}

impl PlannerFacade {
    pub fn new(config: PlannerConfig, grid: GridModel) -> Result<Self> {
        config.validate()?;

        let strategy = match config.simulation_type {
            SimulationType::Mcts => Strategy::Mcts(MctsPlanner::new()),
            SimulationType::Replan => Strategy::Replan(ReactivePlanner::new(config.obs_radius)),
        };
        tracing::info!(
            agents = grid.num_agents(),
            height = grid.height(),
            width = grid.width(),
            strategy = %config.simulation_type,
            collisions = %config.collision_system,
            trees = config.num_parallel_trees,
            "Planner ready"
        );

        Ok(Self {
            heuristic: HeuristicEvaluator::new(&grid),
            resolver: CollisionResolver::new(config.collision_system),
            fallback: ReactivePlanner::new(config.obs_radius),
            strategy,
            grid,
            config,
            step: 0,
            stats: PlanningStats::default(),
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn stats(&self) -> &PlanningStats {
        &self.stats
    }

    /// Plans, applies and commits one joint action. Returns the actions that
    /// were executed; a move blocked by the collision rules shows as `Stay`.
    pub fn act(&mut self) -> Result<Vec<Action>> {
        let state = self.grid.state();
        let mut stats = PlanningStats {
            step: self.step,
            ..PlanningStats::default()
        };

        if state.all_done() {
            stats.source = DecisionSource::AllDone;
            self.stats = stats;
            self.step += 1;
            return Ok(vec![Action::Stay; state.num_agents()]);
        }

        let requested = match &self.strategy {
            Strategy::Mcts(planner) => {
                let ctx = SearchContext {
                    grid: &self.grid,
                    heuristic: &self.heuristic,
                    resolver: &self.resolver,
                    config: &self.config,
                };
                match planner.plan(ctx, &state, self.step) {
                    Ok(result) => {
                        stats.expansions = result.expansions;
                        stats.source = DecisionSource::Mcts;
                        result.actions
                    }
                    Err(e @ PlannerError::NoLegalAction { .. }) => {
                        tracing::warn!(step = self.step, error = %e, "Search failed, replanning");
                        stats.used_fallback = true;
                        stats.source = DecisionSource::Fallback;
                        stats.fallback_reason = Some(e);
                        self.fallback
                            .plan(&self.grid, &self.heuristic, &self.resolver, &state)
                    }
                    Err(e) => return Err(e),
                }
            }
            Strategy::Replan(planner) => {
                stats.source = DecisionSource::Replan;
                planner.plan(&self.grid, &self.heuristic, &self.resolver, &state)
            }
        };

        let next = self.grid.apply(&state, &requested, &self.resolver);
        CollisionResolver::validate(next.positions())?;
        let executed: Vec<Action> = state
            .positions()
            .iter()
            .zip(next.positions())
            .map(|(from, to)| Action::between(*from, *to).unwrap_or(Action::Stay))
            .collect();
        self.grid.commit(next)?;

        tracing::debug!(
            step = self.step,
            source = %stats.source,
            expansions = stats.expansions,
            requested = %format_joint(&requested),
            executed = %format_joint(&executed),
            "Joint action"
        );

        self.stats = stats;
        self.step += 1;
        Ok(executed)
    }

    /// Adopts the positions reported by the environment.
    pub fn observe(&mut self, positions: &[Position]) -> Result<()> {
        if positions.len() != self.grid.num_agents() {
            return Err(PlannerError::invalid_config(format!(
                "observed {} agents, planner tracks {}",
                positions.len(),
                self.grid.num_agents()
            )));
        }
        self.grid.sync_positions(positions)
    }
}
