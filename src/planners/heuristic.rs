//! Goal distance fields on the static obstacle map.
//!
//! Manhattan distance misleads rollouts next to obstacle clusters, so each
//! goal gets a breadth-first distance field once per episode.

use std::collections::{HashMap, VecDeque};

use crate::infra::Position;
use crate::state::{GridModel, GridState};

const UNREACHABLE: u32 = u32::MAX;

#[derive(Clone, Debug)]
struct DistanceField {
    height: i32,
    width: i32,
    dist: Vec<u32>,
}

impl DistanceField {
    fn from_goal(grid: &GridModel, goal: Position) -> Self {
        let height = grid.height();
        let width = grid.width();
        let mut dist = vec![UNREACHABLE; height as usize * width as usize];
        let mut queue = VecDeque::new();

        if grid.is_free(&goal) {
            dist[(goal.row * width + goal.col) as usize] = 0;
            queue.push_back(goal);
        }

        while let Some(current) = queue.pop_front() {
            let next = dist[(current.row * width + current.col) as usize] + 1;
            for neighbor in grid.neighbors(&current) {
                let idx = (neighbor.row * width + neighbor.col) as usize;
                if dist[idx] == UNREACHABLE {
                    dist[idx] = next;
                    queue.push_back(neighbor);
                }
            }
        }

        Self {
            height,
            width,
            dist,
        }
    }

    fn get(&self, pos: &Position) -> Option<u32> {
        if pos.row < 0 || pos.row >= self.height || pos.col < 0 || pos.col >= self.width {
            return None;
        }
        match self.dist[(pos.row * self.width + pos.col) as usize] {
            UNREACHABLE => None,
            d => Some(d),
        }
    }
}

/// Shortest-path distances from every cell to every agent's goal.
#[derive(Clone, Debug)]
pub struct HeuristicEvaluator {
    fields: Vec<DistanceField>,
    agent_field: Vec<usize>,
}

impl HeuristicEvaluator {
    pub fn new(grid: &GridModel) -> Self {
        let mut fields = Vec::new();
        let mut by_goal: HashMap<Position, usize> = HashMap::new();
        let mut agent_field = Vec::with_capacity(grid.num_agents());

        for agent in grid.agents() {
            let idx = *by_goal.entry(agent.goal).or_insert_with(|| {
                fields.push(DistanceField::from_goal(grid, agent.goal));
                fields.len() - 1
            });
            agent_field.push(idx);
        }

        tracing::debug!(
            agents = grid.num_agents(),
            fields = fields.len(),
            "Built goal distance fields"
        );

        Self {
            fields,
            agent_field,
        }
    }

    /// Recomputes all fields, e.g. after obstacles were added.
    pub fn rebuild(&mut self, grid: &GridModel) {
        *self = Self::new(grid);
    }

    /// True shortest-path length from `cell` to the agent's goal, `None` if
    /// the goal cannot be reached or `cell` is off the grid.
    pub fn distance(&self, agent: usize, cell: &Position) -> Option<u32> {
        self.fields[self.agent_field[agent]].get(cell)
    }

    /// Shaping term `1 - d_after / d_before`, or 0 when undefined.
    pub fn progress(&self, agent: usize, before: &Position, after: &Position) -> f64 {
        match (self.distance(agent, before), self.distance(agent, after)) {
            (Some(d_before), Some(d_after)) if d_before > 0 => {
                1.0 - d_after as f64 / d_before as f64
            }
            _ => 0.0,
        }
    }

    /// Sum of [`progress`](Self::progress) over `agents` between two states.
    pub fn total_progress(&self, agents: &[usize], before: &GridState, after: &GridState) -> f64 {
        agents
            .iter()
            .map(|&agent| self.progress(agent, &before.position(agent), &after.position(agent)))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_grid_distance_is_manhattan() {
        let mut grid = GridModel::new(5, 5).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(4, 4)).unwrap();
        let heuristic = HeuristicEvaluator::new(&grid);
        for row in 0..5 {
            for col in 0..5 {
                let pos = Position::new(row, col);
                assert_eq!(
                    heuristic.distance(0, &pos),
                    Some(pos.distance(&Position::new(4, 4)) as u32)
                );
            }
        }
    }

    #[test]
    fn test_distance_routes_around_wall() {
        // Wall in column 1 except the bottom row.
        let mut grid = GridModel::new(3, 3).unwrap();
        grid.add_obstacle(Position::new(0, 1)).unwrap();
        grid.add_obstacle(Position::new(1, 1)).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(0, 2)).unwrap();
        let heuristic = HeuristicEvaluator::new(&grid);
        assert_eq!(heuristic.distance(0, &Position::new(0, 0)), Some(6));
        assert_eq!(heuristic.distance(0, &Position::new(0, 1)), None);
        assert_eq!(heuristic.distance(0, &Position::new(5, 5)), None);
    }

    #[test]
    fn test_unreachable_goal() {
        let mut grid = GridModel::new(3, 3).unwrap();
        for pos in [Position::new(0, 1), Position::new(1, 0), Position::new(1, 1)] {
            grid.add_obstacle(pos).unwrap();
        }
        grid.add_agent(Position::new(0, 0), Position::new(2, 2)).unwrap();
        let heuristic = HeuristicEvaluator::new(&grid);
        assert_eq!(heuristic.distance(0, &Position::new(0, 0)), None);
        assert_eq!(
            heuristic.progress(0, &Position::new(0, 0), &Position::new(0, 0)),
            0.0
        );
    }

    #[test]
    fn test_progress_shaping() {
        let mut grid = GridModel::new(1, 5).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(0, 4)).unwrap();
        let heuristic = HeuristicEvaluator::new(&grid);
        let start = Position::new(0, 0);
        assert_eq!(heuristic.progress(0, &start, &Position::new(0, 2)), 0.5);
        assert_eq!(heuristic.progress(0, &start, &Position::new(0, 4)), 1.0);
        assert_eq!(heuristic.progress(0, &Position::new(0, 4), &start), 0.0);
    }

    #[test]
    fn test_rebuild_after_new_obstacle() {
        let mut grid = GridModel::new(1, 3).unwrap();
        grid.add_agent(Position::new(0, 0), Position::new(0, 2)).unwrap();
        let mut heuristic = HeuristicEvaluator::new(&grid);
        assert_eq!(heuristic.distance(0, &Position::new(0, 0)), Some(2));
        grid.add_obstacle(Position::new(0, 1)).unwrap();
        heuristic.rebuild(&grid);
        assert_eq!(heuristic.distance(0, &Position::new(0, 0)), None);
    }
}
