/// Training and evaluation drivers for stateful pose models
pub mod evaluate;
pub mod state;
pub mod trainer;

pub use evaluate::{generate_trajectory, Trajectory};
pub use state::RecurrentState;
pub use trainer::{LossHistory, Trainer, TrainingConfig};
