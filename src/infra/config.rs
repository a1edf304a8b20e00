use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::infra::error::{PlannerError, Result};
use crate::infra::Action;

/// Rule set deciding which simultaneous moves are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionSystem {
    /// Moves into occupied or contested cells are rejected for every agent
    /// involved.
    #[default]
    BlockBoth,
    /// Agents move in index order; an agent may follow into a cell an
    /// earlier agent has already vacated.
    BlockFollower,
    /// Like `BlockBoth`, but two agents may exchange cells.
    AllowSwap,
}

impl FromStr for CollisionSystem {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block_both" => Ok(CollisionSystem::BlockBoth),
            "block_follower" => Ok(CollisionSystem::BlockFollower),
            "allow_swap" => Ok(CollisionSystem::AllowSwap),
            other => Err(PlannerError::invalid_config(format!(
                "unknown collision system '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CollisionSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CollisionSystem::BlockBoth => "block_both",
            CollisionSystem::BlockFollower => "block_follower",
            CollisionSystem::AllowSwap => "allow_swap",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationType {
    #[default]
    Mcts,
    Replan,
}

impl FromStr for SimulationType {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mcts" => Ok(SimulationType::Mcts),
            "replan" => Ok(SimulationType::Replan),
            other => Err(PlannerError::invalid_config(format!(
                "unknown simulation type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SimulationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationType::Mcts => f.write_str("mcts"),
            SimulationType::Replan => f.write_str("replan"),
        }
    }
}

/// Immutable configuration for one run. Built once and passed by reference
/// to every component.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub num_parallel_trees: usize,
    /// Search iterations per tree per agent decision.
    pub num_expansions: usize,
    /// Optional wall-clock cap per agent decision, checked once per iteration.
    pub time_budget: Option<Duration>,
    pub heuristic_coef: f64,
    pub obs_radius: i32,
    pub collision_system: CollisionSystem,
    pub simulation_type: SimulationType,
    /// Episode cap. Only bounds the rollout horizon.
    pub steps_limit: usize,
    pub render: bool,
    pub gamma: f64,
    pub uct_c: f64,
    pub rollouts_per_leaf: usize,
    /// Restrict tree and rollout moves to in-bounds, obstacle-free cells.
    pub use_move_limits: bool,
    /// Rollouts avoid cells occupied by agents visible in the observation
    /// window.
    pub agents_as_obstacles: bool,
    pub num_actions: usize,
    pub seed: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            num_parallel_trees: 1,
            num_expansions: 1000,
            time_budget: None,
            heuristic_coef: 0.5,
            obs_radius: 5,
            collision_system: CollisionSystem::BlockBoth,
            simulation_type: SimulationType::Mcts,
            steps_limit: 64,
            render: false,
            gamma: 0.99,
            uct_c: std::f64::consts::SQRT_2,
            rollouts_per_leaf: 1,
            use_move_limits: true,
            agents_as_obstacles: false,
            num_actions: Action::COUNT,
            seed: 0,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_parallel_trees == 0 {
            return Err(PlannerError::invalid_config("num_parallel_trees must be >= 1"));
        }
        if self.num_expansions == 0 {
            return Err(PlannerError::invalid_config("num_expansions must be >= 1"));
        }
        if self.obs_radius < 0 {
            return Err(PlannerError::invalid_config("obs_radius must be >= 0"));
        }
        if !self.heuristic_coef.is_finite() || self.heuristic_coef < 0.0 {
            return Err(PlannerError::invalid_config("heuristic_coef must be finite and >= 0"));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(PlannerError::invalid_config("gamma must be in (0, 1]"));
        }
        if !self.uct_c.is_finite() || self.uct_c < 0.0 {
            return Err(PlannerError::invalid_config("uct_c must be finite and >= 0"));
        }
        if self.rollouts_per_leaf == 0 {
            return Err(PlannerError::invalid_config("rollouts_per_leaf must be >= 1"));
        }
        if self.num_actions == 0 || self.num_actions > Action::COUNT {
            return Err(PlannerError::invalid_config(format!(
                "num_actions must be in 1..={}",
                Action::COUNT
            )));
        }
        Ok(())
    }

    /// Configured action set. Always starts with `Stay`.
    pub fn actions(&self) -> &[Action] {
        &Action::ALL[..self.num_actions.clamp(1, Action::COUNT)]
    }

    /// Reads `GRIDPLAN_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = PlannerConfig::default();

        if let Some(v) = get_env_parsed("GRIDPLAN_PARALLEL_TREES")? {
            config.num_parallel_trees = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_EXPANSIONS")? {
            config.num_expansions = v;
        }
        if let Some(ms) = get_env_parsed::<u64>("GRIDPLAN_TIME_BUDGET_MS")? {
            config.time_budget = Some(Duration::from_millis(ms));
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_HEURISTIC_COEF")? {
            config.heuristic_coef = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_OBS_RADIUS")? {
            config.obs_radius = v;
        }
        if let Ok(v) = env::var("GRIDPLAN_COLLISION_SYSTEM") {
            config.collision_system = v.parse()?;
        }
        if let Ok(v) = env::var("GRIDPLAN_SIMULATION_TYPE") {
            config.simulation_type = v.parse()?;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_STEPS_LIMIT")? {
            config.steps_limit = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_RENDER")? {
            config.render = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_GAMMA")? {
            config.gamma = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_UCT_C")? {
            config.uct_c = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_ROLLOUTS_PER_LEAF")? {
            config.rollouts_per_leaf = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_USE_MOVE_LIMITS")? {
            config.use_move_limits = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_AGENTS_AS_OBSTACLES")? {
            config.agents_as_obstacles = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_NUM_ACTIONS")? {
            config.num_actions = v;
        }
        if let Some(v) = get_env_parsed("GRIDPLAN_SEED")? {
            config.seed = v;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Parses an optional environment variable. Unset is `Ok(None)`, a value that
/// does not parse is an error rather than a silent default.
pub fn get_env_parsed<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(val) => val.trim().parse::<T>().map(Some).map_err(|_| {
            PlannerError::invalid_config(format!("cannot parse {}='{}'", key, val))
        }),
        Err(_) => Ok(None),
    }
}
