use crate::infra::{Action, PlannerConfig, PlannerError};
use crate::sim::{Environment, EpisodeSummary, StepResult};

/// Trait for observing episode events during a closed-loop run
pub trait EpisodeObserver {
    /// Called once before the first step
    fn on_episode_start(&mut self, env: &dyn Environment, config: &PlannerConfig);

    /// Called after the environment executed a joint action
    fn on_step(&mut self, actions: &[Action], result: &StepResult, env: &dyn Environment);

    /// Called when the search gave up and the reactive planner acted instead
    fn on_fallback(&mut self, _step: usize, _reason: &PlannerError) {
        // Default implementation does nothing
    }

    /// Called when the episode is over
    fn on_episode_finished(&mut self, summary: &EpisodeSummary);
}
