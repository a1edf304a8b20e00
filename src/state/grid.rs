use crate::infra::error::{PlannerError, Result};
use crate::infra::{Action, Position};
use crate::planners::CollisionResolver;
use crate::state::GridState;

#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    pub id: usize,
    pub start: Position,
    pub goal: Position,
    pub position: Position,
    pub done: bool,
}

/// Obstacle map plus the authoritative (committed) agent positions.
///
/// Obstacles are only added during setup. Search code works on [`GridState`]
/// values through [`GridModel::apply`], which never mutates the model, so a
/// single `&GridModel` can be shared by concurrently searched trees.
#[derive(Clone, Debug)]
pub struct GridModel {
    height: i32,
    width: i32,
    obstacles: Vec<bool>,
    agents: Vec<Agent>,
}

impl GridModel {
    pub fn new(height: i32, width: i32) -> Result<Self> {
        if height <= 0 || width <= 0 {
            return Err(PlannerError::invalid_config(format!(
                "grid dimensions must be positive, got {}x{}",
                height, width
            )));
        }
        let cells = (height as usize)
            .checked_mul(width as usize)
            .filter(|cells| *cells <= i32::MAX as usize)
            .ok_or_else(|| {
                PlannerError::invalid_config(format!("grid {}x{} is too large", height, width))
            })?;
        Ok(Self {
            height,
            width,
            obstacles: vec![false; cells],
            agents: Vec::new(),
        })
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn in_bounds(&self, pos: &Position) -> bool {
        pos.row >= 0 && pos.row < self.height && pos.col >= 0 && pos.col < self.width
    }

    fn index(&self, pos: &Position) -> usize {
        (pos.row * self.width + pos.col) as usize
    }

    fn check_bounds(&self, pos: Position) -> Result<()> {
        if self.in_bounds(&pos) {
            Ok(())
        } else {
            Err(PlannerError::OutOfBounds {
                pos,
                height: self.height,
                width: self.width,
            })
        }
    }

    /// Marks a cell as obstacle. Returns `false` if it already was one.
    pub fn add_obstacle(&mut self, pos: Position) -> Result<bool> {
        self.check_bounds(pos)?;
        let idx = self.index(&pos);
        let added = !self.obstacles[idx];
        self.obstacles[idx] = true;
        Ok(added)
    }

    pub fn is_obstacle(&self, pos: &Position) -> bool {
        !self.in_bounds(pos) || self.obstacles[self.index(pos)]
    }

    /// In bounds and not an obstacle. Agents are not considered.
    pub fn is_free(&self, pos: &Position) -> bool {
        self.in_bounds(pos) && !self.obstacles[self.index(pos)]
    }

    pub fn num_obstacles(&self) -> usize {
        self.obstacles.iter().filter(|o| **o).count()
    }

    /// Free neighbours of `pos`, in action order.
    pub fn neighbors(&self, pos: &Position) -> Vec<Position> {
        pos.neighbors()
            .into_iter()
            .filter(|n| self.is_free(n))
            .collect()
    }

    /// Registers an agent and returns its id. Agents are indexed in the order
    /// they are added.
    pub fn add_agent(&mut self, start: Position, goal: Position) -> Result<usize> {
        self.check_bounds(start)?;
        self.check_bounds(goal)?;
        if let Some(other) = self.agents.iter().find(|agent| agent.start == start) {
            return Err(PlannerError::invalid_config(format!(
                "agents {} and {} both start at {}",
                other.id,
                self.agents.len(),
                start
            )));
        }
        let id = self.agents.len();
        self.agents.push(Agent {
            id,
            start,
            goal,
            position: start,
            done: start == goal,
        });
        Ok(id)
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn positions(&self) -> Vec<Position> {
        self.agents.iter().map(|a| a.position).collect()
    }

    pub fn goals(&self) -> Vec<Position> {
        self.agents.iter().map(|a| a.goal).collect()
    }

    pub fn goal(&self, agent: usize) -> Position {
        self.agents[agent].goal
    }

    /// Snapshot of the committed positions.
    pub fn state(&self) -> GridState {
        GridState::new(
            self.positions(),
            self.agents.iter().map(|a| a.done).collect(),
        )
    }

    /// Successor of `state` under `joint`. Pure: the model is not touched.
    ///
    /// Done agents stay. A move off the grid or onto an obstacle leaves the
    /// agent in place. The remaining moves are settled by `resolver`. Missing
    /// trailing actions count as `Stay`.
    pub fn apply(
        &self,
        state: &GridState,
        joint: &[Action],
        resolver: &CollisionResolver,
    ) -> GridState {
        debug_assert!(joint.len() <= state.num_agents());
        let from = state.positions();

        let targets: Vec<Position> = from
            .iter()
            .enumerate()
            .map(|(agent, pos)| {
                if state.is_done(agent) {
                    return *pos;
                }
                let action = joint.get(agent).copied().unwrap_or(Action::Stay);
                let target = pos.offset(action);
                if self.is_free(&target) { target } else { *pos }
            })
            .collect();

        let finals = resolver.resolve(from, &targets);
        let done = finals
            .iter()
            .enumerate()
            .map(|(agent, pos)| state.is_done(agent) || *pos == self.agents[agent].goal)
            .collect();

        GridState::new(finals, done)
    }

    fn validate_state(&self, state: &GridState) -> Result<()> {
        if state.num_agents() != self.agents.len() {
            return Err(PlannerError::invalid_config(format!(
                "state has {} agents, grid has {}",
                state.num_agents(),
                self.agents.len()
            )));
        }
        for (agent, pos) in state.positions().iter().enumerate() {
            self.check_bounds(*pos)?;
            if self.is_obstacle(pos) {
                return Err(PlannerError::BlockedCell { agent, cell: *pos });
            }
        }
        CollisionResolver::validate(state.positions())
    }

    /// Replaces the committed positions. A rejected state leaves the model
    /// unchanged.
    pub fn commit(&mut self, state: GridState) -> Result<()> {
        self.validate_state(&state)?;
        for (agent, record) in self.agents.iter_mut().enumerate() {
            record.position = state.position(agent);
            record.done = record.done || state.is_done(agent) || record.position == record.goal;
        }
        Ok(())
    }

    /// Adopts positions reported by the external environment. Done flags stay
    /// sticky.
    pub fn sync_positions(&mut self, positions: &[Position]) -> Result<()> {
        let done = self
            .agents
            .iter()
            .zip(positions)
            .map(|(a, p)| a.done || *p == a.goal)
            .collect();
        self.commit(GridState::new(positions.to_vec(), done))
    }

    /// One character per cell: `#` obstacle, `.` free, `A`.. agents and
    /// `a`.. the goals of agents that are still live.
    pub fn render(&self, state: &GridState) -> String {
        let mut out = String::new();
        for row in 0..self.height {
            for col in 0..self.width {
                let pos = Position::new(row, col);
                let symbol = if let Some(agent) = state.agent_at(&pos) {
                    agent_symbol(agent, true)
                } else if let Some(agent) = self
                    .agents
                    .iter()
                    .position(|a| a.goal == pos && !state.is_done(a.id))
                {
                    agent_symbol(agent, false)
                } else if self.is_obstacle(&pos) {
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

fn agent_symbol(agent: usize, start: bool) -> char {
    let base = if start { b'A' } else { b'a' };
    if agent < 26 {
        (base + agent as u8) as char
    } else {
        '@'
    }
}
