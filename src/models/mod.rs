/// Model seam for stateful pose regression
///
/// Network architecture, losses and optimizers live behind [`StatefulModel`];
/// the training and evaluation drivers only move batches and recurrent state.
use candle_core::Tensor;

use crate::data::StatefulBatch;
use crate::training::RecurrentState;

pub mod baseline;

pub use baseline::StaticPoseBaseline;

/// Result of one optimization step
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Scalar loss of the step
    pub loss: f32,
    /// State after consuming the batch
    pub state: RecurrentState,
}

/// Result of an inference pass
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Absolute poses, translation + quaternion (w, x, y, z): [timesteps + 1, batch, 7]
    pub se3: Tensor,
    /// State after consuming the frames
    pub state: RecurrentState,
}

/// Recurrent pose regressor trained on stateful batches
pub trait StatefulModel {
    /// Optimize the absolute-pose head against `batch.se3_ground_truth`
    fn se3_step(&mut self, batch: &StatefulBatch, state: &RecurrentState, lr: f64) -> crate::Result<StepOutput>;

    /// Optimize the relative-pose head against `batch.fc_ground_truth`
    fn fc_step(&mut self, batch: &StatefulBatch, state: &RecurrentState, lr: f64) -> crate::Result<StepOutput>;

    /// Predict absolute poses for `frames` starting from `init_poses` [batch, 7]
    fn predict(&mut self, frames: &Tensor, state: &RecurrentState, init_poses: &Tensor) -> crate::Result<Prediction>;
}
