use crate::infra::error::Result;
use crate::infra::{Action, EpisodeObserver};
use crate::planners::PlannerFacade;
use crate::sim::{Environment, StepResult};

/// Outcome of a finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub all_done: bool,
    pub truncated: bool,
    /// Step at which each agent reached its goal; `Some(0)` if it started there.
    pub arrivals: Vec<Option<usize>>,
    pub total_reward: f64,
    pub fallback_steps: usize,
    /// Executed joint action of every step.
    pub history: Vec<Vec<Action>>,
}

impl EpisodeSummary {
    fn new(done: &[bool]) -> Self {
        Self {
            steps: 0,
            all_done: done.iter().all(|d| *d),
            truncated: false,
            arrivals: done.iter().map(|d| d.then_some(0)).collect(),
            total_reward: 0.0,
            fallback_steps: 0,
            history: Vec::new(),
        }
    }

    fn record(&mut self, actions: &[Action], result: &StepResult) {
        self.steps = result.info.step;
        self.total_reward += result.rewards.iter().sum::<f64>();
        for (arrival, done) in self.arrivals.iter_mut().zip(&result.done) {
            if arrival.is_none() && *done {
                *arrival = Some(result.info.step);
            }
        }
        self.history.push(actions.to_vec());
    }

    pub fn num_arrived(&self) -> usize {
        self.arrivals.iter().flatten().count()
    }

    /// Sum over agents of the arrival step, counting unfinished agents at
    /// the episode length.
    pub fn sum_of_costs(&self) -> usize {
        self.arrivals
            .iter()
            .map(|arrival| arrival.unwrap_or(self.steps))
            .sum()
    }

    pub fn makespan(&self) -> usize {
        self.arrivals
            .iter()
            .map(|arrival| arrival.unwrap_or(self.steps))
            .max()
            .unwrap_or(0)
    }
}

/// Drives `facade` against `env` until every agent is done or the
/// environment's step cap is reached.
pub fn run_episode<E: Environment>(
    env: &mut E,
    facade: &mut PlannerFacade,
    observer: &mut dyn EpisodeObserver,
) -> Result<EpisodeSummary> {
    observer.on_episode_start(&*env, facade.config());
    let mut summary = EpisodeSummary::new(&env.done_flags());

    while !env.is_finished() {
        let actions = facade.act()?;
        let stats = facade.stats();
        if let Some(reason) = &stats.fallback_reason {
            summary.fallback_steps += 1;
            observer.on_fallback(stats.step, reason);
        }

        let result = env.step(&actions)?;
        facade.observe(&env.positions())?;
        summary.record(&actions, &result);
        observer.on_step(&actions, &result, &*env);

        if result.info.all_done || result.info.truncated {
            break;
        }
    }

    summary.all_done = env.all_done();
    summary.truncated = !summary.all_done && env.elapsed_steps() >= env.max_episode_steps();
    observer.on_episode_finished(&summary);
    Ok(summary)
}
