mod grid;
mod grid_state;
mod observation;

pub use grid::{Agent, GridModel};
pub use grid_state::GridState;
pub use observation::ObservationWindow;
