mod collision;
mod facade;
mod heuristic;
pub mod mcts;
mod replan;

pub use collision::CollisionResolver;
pub use facade::{DecisionSource, PlannerFacade, PlanningStats, Strategy};
pub use heuristic::HeuristicEvaluator;
pub use replan::ReactivePlanner;
