use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::infra::Position;
use crate::state::GridModel;

#[derive(Clone, Eq, PartialEq)]
struct Node {
    pos: Position,
    f_score: i32,
    g_score: i32,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on f, deeper nodes first on ties, then position for a
        // stable order.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| self.g_score.cmp(&other.g_score))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct AStar;

impl AStar {
    const MAX_EXPANSIONS: usize = 5000;

    /// Shortest 4-connected path from `start` to `goal` over free cells for
    /// which `is_walkable` holds. The returned path includes both endpoints.
    /// The goal itself must be walkable.
    pub fn find_path<F>(
        grid: &GridModel,
        start: Position,
        goal: Position,
        is_walkable: F,
    ) -> Option<Vec<Position>>
    where
        F: Fn(&Position) -> bool,
    {
        if start == goal {
            return Some(vec![goal]);
        }
        if !grid.is_free(&goal) || !is_walkable(&goal) {
            return None;
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut g_score: HashMap<Position, i32> = HashMap::new();
        let mut closed_set: HashSet<Position> = HashSet::new();

        g_score.insert(start, 0);
        open_set.push(Node {
            pos: start,
            f_score: heuristic(start, goal),
            g_score: 0,
        });

        let mut expansions = 0;

        while let Some(Node { pos: current, .. }) = open_set.pop() {
            if current == goal {
                return Some(reconstruct_path(&came_from, current));
            }

            if !closed_set.insert(current) {
                continue;
            }

            expansions += 1;
            if expansions > Self::MAX_EXPANSIONS {
                tracing::warn!(
                    start = %start,
                    goal = %goal,
                    "A*: exceeded {} expansions",
                    Self::MAX_EXPANSIONS
                );
                return None;
            }

            let current_g_score = *g_score.get(&current).unwrap_or(&0);

            for neighbor in grid.neighbors(&current) {
                if closed_set.contains(&neighbor) || !is_walkable(&neighbor) {
                    continue;
                }

                let tentative_g = current_g_score + 1;
                if tentative_g < *g_score.get(&neighbor).unwrap_or(&i32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g);
                    open_set.push(Node {
                        pos: neighbor,
                        f_score: tentative_g + heuristic(neighbor, goal),
                        g_score: tentative_g,
                    });
                }
            }
        }

        None
    }
}

fn heuristic(a: Position, b: Position) -> i32 {
    a.distance(&b)
}

fn reconstruct_path(came_from: &HashMap<Position, Position>, mut current: Position) -> Vec<Position> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_astar_open_grid_is_shortest() {
        let grid = GridModel::new(5, 5).unwrap();
        let path = AStar::find_path(&grid, Position::new(0, 0), Position::new(4, 3), |_| true)
            .expect("path exists");
        assert_eq!(path.len(), 8);
        assert_eq!(path[0], Position::new(0, 0));
        assert_eq!(*path.last().unwrap(), Position::new(4, 3));
        for pair in path.windows(2) {
            assert_eq!(pair[0].distance(&pair[1]), 1);
        }
    }

    #[test]
    fn test_astar_avoids_unwalkable_cells() {
        let grid = GridModel::new(3, 3).unwrap();
        let blocked = Position::new(1, 1);
        let path = AStar::find_path(&grid, Position::new(1, 0), Position::new(1, 2), |p| {
            *p != blocked
        })
        .expect("detour exists");
        assert_eq!(path.len(), 5);
        assert!(!path.contains(&blocked));
    }

    #[test]
    fn test_astar_no_path() {
        let mut grid = GridModel::new(3, 3).unwrap();
        for pos in [Position::new(0, 1), Position::new(1, 1), Position::new(2, 1)] {
            grid.add_obstacle(pos).unwrap();
        }
        assert!(AStar::find_path(&grid, Position::new(0, 0), Position::new(0, 2), |_| true).is_none());
    }

    #[test]
    fn test_astar_start_is_goal() {
        let grid = GridModel::new(2, 2).unwrap();
        let pos = Position::new(1, 1);
        assert_eq!(AStar::find_path(&grid, pos, pos, |_| false), Some(vec![pos]));
    }

    #[test]
    fn test_astar_unwalkable_goal() {
        let grid = GridModel::new(2, 2).unwrap();
        let goal = Position::new(1, 1);
        assert!(AStar::find_path(&grid, Position::new(0, 0), goal, |p| *p != goal).is_none());
    }
}
