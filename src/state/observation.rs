use crate::infra::{Bounds, Position};
use crate::state::{GridModel, GridState};

/// What one agent sees: the `(2k+1)×(2k+1)` square around it.
///
/// Cells outside the grid read as obstacles.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationWindow {
    pub agent: usize,
    pub center: Position,
    pub radius: i32,
    obstacles: Vec<bool>,
    agents: Vec<Option<usize>>,
}

impl ObservationWindow {
    pub fn extract(grid: &GridModel, state: &GridState, agent: usize, radius: i32) -> Self {
        let radius = radius.max(0);
        let center = state.position(agent);
        let side = (2 * radius + 1) as usize;
        let mut obstacles = Vec::with_capacity(side * side);
        let mut agents = vec![None; side * side];

        for dr in -radius..=radius {
            for dc in -radius..=radius {
                let pos = Position::new(center.row + dr, center.col + dc);
                obstacles.push(grid.is_obstacle(&pos));
            }
        }

        let bounds = Bounds::from_center_and_range(center, radius);
        for (other, pos) in state.positions().iter().enumerate() {
            if other != agent && bounds.contains(pos) {
                let idx = Self::local_index(center, radius, pos);
                agents[idx] = Some(other);
            }
        }

        Self {
            agent,
            center,
            radius,
            obstacles,
            agents,
        }
    }

    fn local_index(center: Position, radius: i32, pos: &Position) -> usize {
        let side = 2 * radius + 1;
        let r = pos.row - center.row + radius;
        let c = pos.col - center.col + radius;
        (r * side + c) as usize
    }

    pub fn side(&self) -> usize {
        (2 * self.radius + 1) as usize
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_center_and_range(self.center, self.radius)
    }

    pub fn contains(&self, pos: &Position) -> bool {
        self.bounds().contains(pos)
    }

    /// Obstacle flag for a global position. Cells outside the window are
    /// unknown and reported as free.
    pub fn is_obstacle(&self, pos: &Position) -> bool {
        self.contains(pos) && self.obstacles[Self::local_index(self.center, self.radius, pos)]
    }

    /// Other agent standing on a global position inside the window.
    pub fn agent_at(&self, pos: &Position) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        self.agents[Self::local_index(self.center, self.radius, pos)]
    }

    /// Ids of the other agents inside the window, in agent order.
    pub fn visible_agents(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.agents.iter().flatten().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Local view as text: `@` observer, `#` obstacle, `A`.. other agents.
    pub fn to_ascii(&self) -> String {
        let side = self.side();
        let mut out = String::with_capacity(side * (side + 1));
        for r in 0..side {
            for c in 0..side {
                let idx = r * side + c;
                let symbol = if r == c && r == self.radius as usize {
                    '@'
                } else if let Some(other) = self.agents[idx] {
                    if other < 26 { (b'A' + other as u8) as char } else { '?' }
                } else if self.obstacles[idx] {
                    '#'
                } else {
                    '.'
                };
                out.push(symbol);
            }
            out.push('\n');
        }
        out
    }
}
