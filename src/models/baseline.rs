/// Zero-motion baseline
///
/// Predicts that the camera stays at its initial pose for the whole window.
/// It has no parameters; its losses are the floor any learned model must
/// beat and it exercises the training and evaluation drivers end to end.
use candle_core::Tensor;

use super::{Prediction, StatefulModel, StepOutput};
use crate::data::StatefulBatch;
use crate::training::RecurrentState;

#[derive(Debug, Clone, Default)]
pub struct StaticPoseBaseline {
    steps: usize,
}

impl StaticPoseBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Optimization steps taken so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Initial poses repeated over `timesteps` rows: [timesteps, batch, 7]
    fn hold(init_poses: &Tensor, timesteps: usize) -> candle_core::Result<Tensor> {
        let (batch, dim) = init_poses.dims2()?;
        init_poses
            .unsqueeze(0)?
            .broadcast_as((timesteps, batch, dim))?
            .contiguous()
    }
}

fn mse(prediction: &Tensor, target: &Tensor) -> candle_core::Result<f32> {
    target
        .broadcast_sub(prediction)?
        .sqr()?
        .mean_all()?
        .to_scalar::<f32>()
}

impl StatefulModel for StaticPoseBaseline {
    fn se3_step(&mut self, batch: &StatefulBatch, state: &RecurrentState, _lr: f64) -> crate::Result<StepOutput> {
        let loss = mse(&batch.init_poses.unsqueeze(0)?, &batch.se3_ground_truth)?;
        self.steps += 1;
        Ok(StepOutput {
            loss,
            state: state.clone(),
        })
    }

    fn fc_step(&mut self, batch: &StatefulBatch, state: &RecurrentState, _lr: f64) -> crate::Result<StepOutput> {
        let zero_motion = batch.fc_ground_truth.zeros_like()?;
        let loss = mse(&zero_motion, &batch.fc_ground_truth)?;
        self.steps += 1;
        Ok(StepOutput {
            loss,
            state: state.clone(),
        })
    }

    fn predict(&mut self, frames: &Tensor, state: &RecurrentState, init_poses: &Tensor) -> crate::Result<Prediction> {
        let timesteps = frames.dim(0)?;
        Ok(Prediction {
            se3: Self::hold(init_poses, timesteps)?,
            state: state.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn batch(device: &Device) -> candle_core::Result<StatefulBatch> {
        // two rows, one column; second pose moved 2 along z
        let se3 = Tensor::from_vec(
            vec![0f32, 0., 0., 1., 0., 0., 0., 0., 0., 2., 1., 0., 0., 0.],
            (2, 1, 7),
            device,
        )?;
        let fc = Tensor::from_vec(vec![0f32, 0., 0., 0., 0., 0., 0., 0., 2., 0., 0., 0.], (2, 1, 6), device)?;

        Ok(StatefulBatch {
            init_poses: se3.get(0)?,
            reset_state: Tensor::zeros(1, DType::U8, device)?,
            frames: Tensor::zeros((2, 1, 1, 2, 2), DType::F32, device)?,
            fc_ground_truth: fc,
            se3_ground_truth: se3,
        })
    }

    #[test]
    fn test_losses() -> crate::Result<()> {
        let device = Device::Cpu;
        let batch = batch(&device)?;
        let state = RecurrentState::zeros(1, 1, 4, &device)?;
        let mut model = StaticPoseBaseline::new();

        // one of 14 values off by 2
        let se3 = model.se3_step(&batch, &state, 1e-3)?;
        assert!((se3.loss - 4.0 / 14.0).abs() < 1e-6);

        // one of 12 values off by 2
        let fc = model.fc_step(&batch, &state, 1e-3)?;
        assert!((fc.loss - 4.0 / 12.0).abs() < 1e-6);

        assert_eq!(model.steps(), 2);
        Ok(())
    }

    #[test]
    fn test_predict_holds_initial_pose() -> crate::Result<()> {
        let device = Device::Cpu;
        let batch = batch(&device)?;
        let state = RecurrentState::zeros(1, 1, 4, &device)?;
        let mut model = StaticPoseBaseline::new();

        let prediction = model.predict(&batch.frames, &state, &batch.init_poses)?;
        let se3 = prediction.se3.to_vec3::<f32>()?;
        assert_eq!(se3.len(), 2);
        assert_eq!(se3[1][0], vec![0., 0., 0., 1., 0., 0., 0.]);
        Ok(())
    }
}
