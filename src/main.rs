use std::env;
use std::fs;

use dotenv::dotenv;
use gridplan::infra::{DefaultObserver, get_env_parsed};
use gridplan::{GridEnvironment, PlannerConfig, PlannerFacade, Scenario, run_episode};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridplan=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn load_scenario() -> Result<Scenario, Box<dyn std::error::Error>> {
    if let Ok(path) = env::var("GRIDPLAN_MAP_FILE") {
        tracing::info!("Loading map from {}", path);
        let text = fs::read_to_string(&path)?;
        return Ok(Scenario::from_ascii(&text)?);
    }

    let size = get_env_parsed("GRIDPLAN_MAP_SIZE")?.unwrap_or(8);
    let num_agents = get_env_parsed("GRIDPLAN_NUM_AGENTS")?.unwrap_or(4);
    let density = get_env_parsed("GRIDPLAN_DENSITY")?.unwrap_or(0.2);
    let seed = get_env_parsed("GRIDPLAN_MAP_SEED")?.unwrap_or(0);
    Ok(Scenario::random(size, num_agents, density, seed)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = PlannerConfig::from_env()?;
    let scenario = load_scenario()?;

    let mut env = GridEnvironment::new(
        scenario.build_grid()?,
        config.collision_system,
        config.obs_radius,
        config.steps_limit,
    );
    let mut observer = DefaultObserver::new(config.render);
    let mut facade = PlannerFacade::new(config, scenario.build_grid()?)?;

    let summary = run_episode(&mut env, &mut facade, &mut observer)?;
    if !summary.all_done {
        tracing::warn!(
            arrived = summary.num_arrived(),
            agents = summary.arrivals.len(),
            "Not every agent reached its goal"
        );
    }

    Ok(())
}
