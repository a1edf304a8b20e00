use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::infra::Position;
use crate::infra::error::{PlannerError, Result};
use crate::state::GridModel;

/// Static map plus agent start and goal cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub height: i32,
    pub width: i32,
    pub obstacles: Vec<Position>,
    /// `(start, goal)` per agent.
    pub agents: Vec<(Position, Position)>,
}

impl Scenario {
    /// Parses a text map: `.` free, `#` obstacle, `A`..`Z` agent starts and
    /// the matching `a`..`z` goals. Blank lines are ignored.
    pub fn from_ascii(text: &str) -> Result<Self> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.chars().count());
        if height == 0 || width == 0 {
            return Err(PlannerError::invalid_config("empty map"));
        }

        let mut obstacles = Vec::new();
        let mut starts: BTreeMap<u8, Position> = BTreeMap::new();
        let mut goals: BTreeMap<u8, Position> = BTreeMap::new();

        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != width {
                return Err(PlannerError::invalid_config(format!(
                    "map row {} has {} cells, expected {}",
                    row,
                    line.chars().count(),
                    width
                )));
            }
            for (col, cell) in line.chars().enumerate() {
                let pos = Position::new(row as i32, col as i32);
                match cell {
                    '.' => {}
                    '#' => obstacles.push(pos),
                    'A'..='Z' => {
                        if starts.insert(cell as u8 - b'A', pos).is_some() {
                            return Err(PlannerError::invalid_config(format!(
                                "agent {} placed twice",
                                cell
                            )));
                        }
                    }
                    'a'..='z' => {
                        if goals.insert(cell as u8 - b'a', pos).is_some() {
                            return Err(PlannerError::invalid_config(format!(
                                "goal {} placed twice",
                                cell
                            )));
                        }
                    }
                    other => {
                        return Err(PlannerError::invalid_config(format!(
                            "unknown map symbol '{}' at {}",
                            other, pos
                        )));
                    }
                }
            }
        }

        let mut agents = Vec::with_capacity(starts.len());
        for (expected, (&id, &start)) in starts.iter().enumerate() {
            if id as usize != expected {
                return Err(PlannerError::invalid_config(format!(
                    "agent letters must be contiguous from A, missing {}",
                    (b'A' + expected as u8) as char
                )));
            }
            // An agent without a goal letter starts on its goal.
            agents.push((start, goals.get(&id).copied().unwrap_or(start)));
        }
        if let Some(id) = goals.keys().find(|id| !starts.contains_key(*id)) {
            return Err(PlannerError::invalid_config(format!(
                "goal {} has no agent",
                (b'a' + id) as char
            )));
        }

        Ok(Self {
            height: height as i32,
            width: width as i32,
            obstacles,
            agents,
        })
    }

    /// Random square map. Each cell is an obstacle with probability
    /// `density`; starts and goals are distinct cells of the largest free
    /// region, so every goal is reachable.
    pub fn random(size: i32, num_agents: usize, density: f64, seed: u64) -> Result<Self> {
        if size <= 0 {
            return Err(PlannerError::invalid_config("map size must be positive"));
        }
        if !(0.0..1.0).contains(&density) {
            return Err(PlannerError::invalid_config("density must be in [0, 1)"));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut grid = GridModel::new(size, size)?;
        let mut obstacles = Vec::new();
        for row in 0..size {
            for col in 0..size {
                if rng.random::<f64>() < density {
                    let pos = Position::new(row, col);
                    grid.add_obstacle(pos)?;
                    obstacles.push(pos);
                }
            }
        }

        let mut region = largest_region(&grid);
        if region.len() < num_agents {
            return Err(PlannerError::invalid_config(format!(
                "largest free region has {} cells, need {}",
                region.len(),
                num_agents
            )));
        }

        region.shuffle(&mut rng);
        let starts: Vec<Position> = region[..num_agents].to_vec();
        region.shuffle(&mut rng);
        let goals = &region[..num_agents];

        tracing::debug!(
            size,
            obstacles = obstacles.len(),
            agents = num_agents,
            seed,
            "Generated random scenario"
        );

        Ok(Self {
            height: size,
            width: size,
            obstacles,
            agents: starts.into_iter().zip(goals.iter().copied()).collect(),
        })
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn build_grid(&self) -> Result<GridModel> {
        let mut grid = GridModel::new(self.height, self.width)?;
        for pos in &self.obstacles {
            grid.add_obstacle(*pos)?;
        }
        for (start, goal) in &self.agents {
            if grid.is_obstacle(start) || grid.is_obstacle(goal) {
                return Err(PlannerError::invalid_config(format!(
                    "agent {} -> {} touches an obstacle",
                    start, goal
                )));
            }
            grid.add_agent(*start, *goal)?;
        }
        Ok(grid)
    }
}

/// Cells of the largest 4-connected free region, in discovery order.
fn largest_region(grid: &GridModel) -> Vec<Position> {
    let mut seen = vec![false; grid.height() as usize * grid.width() as usize];
    let index = |pos: &Position| (pos.row * grid.width() + pos.col) as usize;
    let mut best: Vec<Position> = Vec::new();

    for row in 0..grid.height() {
        for col in 0..grid.width() {
            let origin = Position::new(row, col);
            if !grid.is_free(&origin) || seen[index(&origin)] {
                continue;
            }
            seen[index(&origin)] = true;
            let mut region = vec![origin];
            let mut queue = VecDeque::from([origin]);
            while let Some(current) = queue.pop_front() {
                for next in grid.neighbors(&current) {
                    if !seen[index(&next)] {
                        seen[index(&next)] = true;
                        region.push(next);
                        queue.push_back(next);
                    }
                }
            }
            if region.len() > best.len() {
                best = region;
            }
        }
    }
    best
}
