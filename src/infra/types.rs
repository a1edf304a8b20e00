use std::fmt;

/// Grid coordinate. Rows grow downwards, columns grow to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn distance(&self, other: &Position) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    /// Neighbours in action order (up, down, left, right).
    pub fn neighbors(&self) -> [Position; 4] {
        [
            self.offset(Action::Up),
            self.offset(Action::Down),
            self.offset(Action::Left),
            self.offset(Action::Right),
        ]
    }

    pub fn offset(&self, action: Action) -> Position {
        let (dr, dc) = action.delta();
        Position::new(self.row + dr, self.col + dc)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_row: i32,
    pub max_row: i32,
    pub min_col: i32,
    pub max_col: i32,
}

impl Bounds {
    pub fn from_center_and_range(center: Position, range: i32) -> Self {
        Self {
            min_row: center.row - range,
            max_row: center.row + range,
            min_col: center.col - range,
            max_col: center.col + range,
        }
    }

    pub fn contains(&self, pos: &Position) -> bool {
        pos.row >= self.min_row
            && pos.row <= self.max_row
            && pos.col >= self.min_col
            && pos.col <= self.max_col
    }
}

/// Per-agent move. The discriminant is the action index used by the
/// environment interface and by the search tree's child slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Stay = 0,
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
}

impl Action {
    pub const COUNT: usize = 5;

    pub const ALL: [Action; Action::COUNT] = [
        Action::Stay,
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Action> {
        Action::ALL.get(index).copied()
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Action::Stay => (0, 0),
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
        }
    }

    /// Action that moves an agent from `from` to `to`, if they are at most one
    /// step apart.
    pub fn between(from: Position, to: Position) -> Option<Action> {
        Action::ALL.into_iter().find(|action| from.offset(*action) == to)
    }

    pub fn symbol(self) -> char {
        match self {
            Action::Stay => 'S',
            Action::Up => 'U',
            Action::Down => 'D',
            Action::Left => 'L',
            Action::Right => 'R',
        }
    }
}

/// Renders a joint action compactly, e.g. `[S U R]`.
pub fn format_joint(actions: &[Action]) -> String {
    let symbols: Vec<String> = actions.iter().map(|a| a.symbol().to_string()).collect();
    format!("[{}]", symbols.join(" "))
}
