pub mod infra;
pub mod planners;
pub mod sim;
pub mod state;

// Re-export commonly used types for convenience
pub use infra::{Action, CollisionSystem, PlannerConfig, PlannerError, Position, SimulationType};
pub use planners::{PlannerFacade, PlanningStats};
pub use sim::{Environment, GridEnvironment, Scenario, run_episode};
pub use state::{GridModel, GridState, ObservationWindow};
