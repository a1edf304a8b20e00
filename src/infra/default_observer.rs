use std::io::{self, Write};

use tracing::{info, warn};

use crate::infra::{Action, EpisodeObserver, PlannerConfig, PlannerError, format_joint};
use crate::sim::{Environment, EpisodeSummary, StepResult};

/// Logs episode progress and, when rendering is on, prints the grid after
/// every step.
pub struct DefaultObserver {
    render: bool,
}

impl DefaultObserver {
    pub fn new(render: bool) -> Self {
        Self { render }
    }

    fn draw(&self, env: &dyn Environment) {
        if self.render {
            let _ = writeln!(io::stdout(), "{}", env.render());
        }
    }
}

impl EpisodeObserver for DefaultObserver {
    fn on_episode_start(&mut self, env: &dyn Environment, config: &PlannerConfig) {
        info!("Episode started");
        info!("- map size: {}x{}", env.height(), env.width());
        info!("- agents: {}", env.num_agents());
        info!("- strategy: {}", config.simulation_type);
        info!("- collision system: {}", config.collision_system);
        info!(
            "- trees: {}, expansions: {}, seed: {}",
            config.num_parallel_trees, config.num_expansions, config.seed
        );
        self.draw(env);
    }

    fn on_step(&mut self, actions: &[Action], result: &StepResult, env: &dyn Environment) {
        let arrived = result.done.iter().filter(|d| **d).count();
        info!(
            "step: {}, actions: {}, done: {}/{}",
            result.info.step,
            format_joint(actions),
            arrived,
            result.done.len()
        );
        self.draw(env);
    }

    fn on_fallback(&mut self, step: usize, reason: &PlannerError) {
        warn!("step {}: reactive fallback ({})", step, reason);
    }

    fn on_episode_finished(&mut self, summary: &EpisodeSummary) {
        info!(
            "Episode finished after {} steps: {}/{} agents arrived{}",
            summary.steps,
            summary.num_arrived(),
            summary.arrivals.len(),
            if summary.truncated { " (truncated)" } else { "" }
        );
        info!(
            "sum of costs: {}, makespan: {}, fallbacks: {}",
            summary.sum_of_costs(),
            summary.makespan(),
            summary.fallback_steps
        );
    }
}
