use std::error::Error;
use std::fmt;

use crate::infra::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// A coordinate lies outside the grid. Fatal at setup.
    OutOfBounds {
        pos: Position,
        height: i32,
        width: i32,
    },
    /// No legal action could be found for an agent at the search root.
    /// Recovered by the reactive fallback.
    NoLegalAction { agent: usize },
    /// Two agents would share a cell in a committed state.
    CollisionViolation {
        cell: Position,
        first: usize,
        second: usize,
    },
    /// An agent would stand on an obstacle cell.
    BlockedCell { agent: usize, cell: Position },
    InvalidConfig { reason: String },
}

impl PlannerError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        PlannerError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlannerError::OutOfBounds { pos, height, width } => {
                write!(formatter, "Position {} is outside the {}x{} grid", pos, height, width)
            }
            PlannerError::NoLegalAction { agent } => {
                write!(formatter, "No legal action for agent {}", agent)
            }
            PlannerError::CollisionViolation {
                cell,
                first,
                second,
            } => write!(
                formatter,
                "Agents {} and {} would both occupy {}",
                first, second, cell
            ),
            PlannerError::BlockedCell { agent, cell } => {
                write!(formatter, "Agent {} would stand on obstacle {}", agent, cell)
            }
            PlannerError::InvalidConfig { reason } => {
                write!(formatter, "Invalid configuration: {}", reason)
            }
        }
    }
}

impl Error for PlannerError {}

pub type Result<T> = std::result::Result<T, PlannerError>;
