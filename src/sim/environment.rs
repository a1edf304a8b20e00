use crate::infra::error::{PlannerError, Result};
use crate::infra::{Action, CollisionSystem, Position};
use crate::planners::CollisionResolver;
use crate::state::{GridModel, GridState, ObservationWindow};

/// Bookkeeping of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    pub step: usize,
    pub all_done: bool,
    /// The step cap was hit before every agent arrived.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observations: Vec<ObservationWindow>,
    /// 1.0 for each agent that reached its goal in this step.
    pub rewards: Vec<f64>,
    pub done: Vec<bool>,
    pub info: StepInfo,
}

/// Multi-agent grid world the planner acts in.
pub trait Environment {
    fn height(&self) -> i32;

    fn width(&self) -> i32;

    fn num_agents(&self) -> usize;

    fn is_obstacle(&self, pos: &Position) -> bool;

    fn positions(&self) -> Vec<Position>;

    fn goals(&self) -> Vec<Position>;

    fn done_flags(&self) -> Vec<bool>;

    /// Steps taken so far.
    fn elapsed_steps(&self) -> usize;

    fn max_episode_steps(&self) -> usize;

    fn observe(&self) -> Vec<ObservationWindow>;

    fn step(&mut self, actions: &[Action]) -> Result<StepResult>;

    fn render(&self) -> String;

    fn all_done(&self) -> bool {
        self.done_flags().iter().all(|done| *done)
    }

    fn is_finished(&self) -> bool {
        self.all_done() || self.elapsed_steps() >= self.max_episode_steps()
    }
}

/// Ground-truth simulator built on the same transition rules as the planner.
pub struct GridEnvironment {
    grid: GridModel,
    resolver: CollisionResolver,
    obs_radius: i32,
    max_episode_steps: usize,
    elapsed: usize,
}

impl GridEnvironment {
    pub fn new(
        grid: GridModel,
        collision_system: CollisionSystem,
        obs_radius: i32,
        max_episode_steps: usize,
    ) -> Self {
        Self {
            grid,
            resolver: CollisionResolver::new(collision_system),
            obs_radius,
            max_episode_steps,
            elapsed: 0,
        }
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn state(&self) -> GridState {
        self.grid.state()
    }
}

impl Environment for GridEnvironment {
    fn height(&self) -> i32 {
        self.grid.height()
    }

    fn width(&self) -> i32 {
        self.grid.width()
    }

    fn num_agents(&self) -> usize {
        self.grid.num_agents()
    }

    fn is_obstacle(&self, pos: &Position) -> bool {
        self.grid.is_obstacle(pos)
    }

    fn positions(&self) -> Vec<Position> {
        self.grid.positions()
    }

    fn goals(&self) -> Vec<Position> {
        self.grid.goals()
    }

    fn done_flags(&self) -> Vec<bool> {
        self.grid.state().done_flags().to_vec()
    }

    fn elapsed_steps(&self) -> usize {
        self.elapsed
    }

    fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }

    fn observe(&self) -> Vec<ObservationWindow> {
        let state = self.grid.state();
        (0..state.num_agents())
            .map(|agent| ObservationWindow::extract(&self.grid, &state, agent, self.obs_radius))
            .collect()
    }

    fn step(&mut self, actions: &[Action]) -> Result<StepResult> {
        if actions.len() != self.grid.num_agents() {
            return Err(PlannerError::invalid_config(format!(
                "got {} actions for {} agents",
                actions.len(),
                self.grid.num_agents()
            )));
        }

        let before = self.grid.state();
        let after = self.grid.apply(&before, actions, &self.resolver);
        let rewards = (0..after.num_agents())
            .map(|agent| {
                if !before.is_done(agent) && after.is_done(agent) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        self.grid.commit(after)?;
        self.elapsed += 1;

        let done = self.done_flags();
        let all_done = done.iter().all(|d| *d);
        let info = StepInfo {
            step: self.elapsed,
            all_done,
            truncated: !all_done && self.elapsed >= self.max_episode_steps,
        };
        tracing::trace!(step = info.step, all_done, truncated = info.truncated, "Environment step");

        Ok(StepResult {
            observations: self.observe(),
            rewards,
            done,
            info,
        })
    }

    fn render(&self) -> String {
        self.grid.render(&self.grid.state())
    }
}
