/// Trajectory generation for a trained model
use std::path::Path;

use candle_core::{Device, Tensor};
use ndarray::Array2;
use ndarray_npy::write_npy;

use super::state::RecurrentState;
use super::trainer::TrainingConfig;
use crate::data::StatefulBatchSource;
use crate::geometry::SE3_DIM;
use crate::models::StatefulModel;

/// Predicted and ground-truth poses, one row per batch boundary: [batches + 1, 7]
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub prediction: Array2<f32>,
    pub ground_truth: Array2<f32>,
}

impl Trajectory {
    /// Write `trajectory_<sequence>.npy` and `ground_truth_<sequence>.npy` into `dir`
    pub fn save_npy<P: AsRef<Path>>(&self, dir: P, sequence: &str) -> crate::Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let prediction_path = dir.join(format!("trajectory_{}.npy", sequence));
        write_npy(&prediction_path, &self.prediction)?;

        let ground_truth_path = dir.join(format!("ground_truth_{}.npy", sequence));
        write_npy(&ground_truth_path, &self.ground_truth)?;

        log::info!("Saved trajectories to {:?}", dir);
        Ok(())
    }
}

fn last_row(t: &Tensor) -> crate::Result<Tensor> {
    match t.dim(0)? {
        0 => Err(crate::VOError::Data("Model returned no pose rows".to_string())),
        rows => Ok(t.get(rows - 1)?),
    }
}

fn copy_row(dst: &mut Array2<f32>, row: usize, pose: &Tensor) -> crate::Result<()> {
    let values = pose.flatten_all()?.to_vec1::<f32>()?;
    if values.len() != SE3_DIM {
        return Err(crate::VOError::Data(format!(
            "Expected a {}-value pose, got {}",
            SE3_DIM,
            values.len()
        )));
    }
    for (k, v) in values.into_iter().enumerate() {
        dst[[row, k]] = v;
    }
    Ok(())
}

/// Run `model` over every batch of a single-column stream
///
/// The stream holds a single sequence, so the recurrent state is carried
/// through every batch and reset flags are not applied. The first window
/// starts from the ground-truth initial pose, each later one from the last
/// pose predicted for the previous window.
pub fn generate_trajectory<M, S>(
    model: &mut M,
    data: &mut S,
    config: &TrainingConfig,
    device: &Device,
) -> crate::Result<Trajectory>
where
    M: StatefulModel,
    S: StatefulBatchSource,
{
    if data.batch_size() != 1 {
        return Err(crate::VOError::Config(format!(
            "Trajectory generation needs batch_size 1, got {}",
            data.batch_size()
        )));
    }

    let total_batches = data.total_batches();
    let mut prediction = Array2::zeros((total_batches + 1, SE3_DIM));
    let mut ground_truth = Array2::zeros((total_batches + 1, SE3_DIM));

    data.next_epoch();
    let mut state = RecurrentState::zeros(config.lstm_layers, 1, config.lstm_size, device)?;
    let mut init_pose: Option<Tensor> = None;

    log::info!("Start evaluation loop over {} batches...", total_batches);
    while data.has_next_batch() {
        let j_batch = data.curr_batch();
        let batch = data.next_batch(device)?;

        let start = match init_pose {
            Some(pose) => pose,
            None => batch.init_poses.clone(),
        };
        if j_batch == 0 {
            copy_row(&mut prediction, 0, &start)?;
            copy_row(&mut ground_truth, 0, &batch.init_poses)?;
        }

        let output = model.predict(&batch.frames, &state, &start)?;
        state = output.state;

        let predicted = last_row(&output.se3)?;
        copy_row(&mut prediction, j_batch + 1, &predicted)?;
        copy_row(&mut ground_truth, j_batch + 1, &last_row(&batch.se3_ground_truth)?)?;
        init_pose = Some(predicted);

        if j_batch % 100 == 0 {
            log::info!(
                "Processed {:.2}%",
                data.curr_batch() as f64 / total_batches as f64 * 100.0
            );
        }
    }

    Ok(Trajectory {
        prediction,
        ground_truth,
    })
}
