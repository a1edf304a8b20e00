//! Ground-truth simulation used to drive the planner in closed loop.

mod environment;
mod episode;
mod scenario;

pub use environment::{Environment, GridEnvironment, StepInfo, StepResult};
pub use episode::{EpisodeSummary, run_episode};
pub use scenario::Scenario;
