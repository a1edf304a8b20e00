use crate::infra::Position;

/// Snapshot of every agent's position and done flag at one step.
///
/// Immutable once built. The obstacle map is run-constant and lives in
/// [`GridModel`](crate::state::GridModel), so it takes no part in equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridState {
    positions: Vec<Position>,
    done: Vec<bool>,
}

impl GridState {
    pub fn new(positions: Vec<Position>, done: Vec<bool>) -> Self {
        debug_assert_eq!(positions.len(), done.len());
        Self { positions, done }
    }

    pub fn num_agents(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, agent: usize) -> Position {
        self.positions[agent]
    }

    pub fn done_flags(&self) -> &[bool] {
        &self.done
    }

    pub fn is_done(&self, agent: usize) -> bool {
        self.done[agent]
    }

    pub fn all_done(&self) -> bool {
        self.done.iter().all(|d| *d)
    }

    pub fn num_done(&self) -> usize {
        self.done.iter().filter(|d| **d).count()
    }

    /// Indices of agents that have not reached their goal, in agent order.
    pub fn live_agents(&self) -> Vec<usize> {
        (0..self.num_agents()).filter(|&i| !self.done[i]).collect()
    }

    /// Agent standing on `pos`, if any.
    pub fn agent_at(&self, pos: &Position) -> Option<usize> {
        self.positions.iter().position(|p| p == pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_covers_positions_and_done() {
        let a = GridState::new(vec![Position::new(0, 0)], vec![false]);
        let b = GridState::new(vec![Position::new(0, 0)], vec![false]);
        let c = GridState::new(vec![Position::new(0, 0)], vec![true]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_live_agents_and_lookup() {
        let state = GridState::new(
            vec![Position::new(0, 0), Position::new(1, 1), Position::new(2, 2)],
            vec![false, true, false],
        );
        assert_eq!(state.live_agents(), vec![0, 2]);
        assert_eq!(state.num_done(), 1);
        assert!(!state.all_done());
        assert_eq!(state.agent_at(&Position::new(1, 1)), Some(1));
        assert_eq!(state.agent_at(&Position::new(3, 3)), None);
    }
}
