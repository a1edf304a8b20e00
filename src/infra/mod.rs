mod config;
mod default_observer;
mod episode_observer;
pub mod error;
mod pathfinding;
mod types;

pub use config::{CollisionSystem, PlannerConfig, SimulationType, get_env_parsed};
pub use default_observer::DefaultObserver;
pub use episode_observer::EpisodeObserver;
pub use error::PlannerError;
pub use pathfinding::AStar;
pub use types::{Action, Bounds, Position, format_joint};
