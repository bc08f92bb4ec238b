/// Stateful training loop
use candle_core::Device;

use super::state::RecurrentState;
use crate::data::StatefulBatchSource;
use crate::models::StatefulModel;

/// Training configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub num_epochs: usize,
    /// LSTM layers in the model's recurrent state
    pub lstm_layers: usize,
    /// LSTM state size per layer
    pub lstm_size: usize,
    /// Learning rate of the absolute-pose step
    pub se3_lr: f64,
    /// Learning rate of the relative-pose step
    pub fc_lr: f64,
    /// Log every N batches
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            lstm_layers: 2,
            lstm_size: 1024,
            se3_lr: 1e-3,
            fc_lr: 1e-3,
            log_every: 100,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.lstm_layers == 0 || self.lstm_size == 0 {
            return Err(crate::VOError::Config(
                "lstm_layers and lstm_size must be > 0".to_string(),
            ));
        }
        if self.log_every == 0 {
            return Err(crate::VOError::Config("log_every must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Per-batch losses of a run
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LossHistory {
    pub se3: Vec<f32>,
    pub fc: Vec<f32>,
}

impl LossHistory {
    fn mean(values: &[f32]) -> f32 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f32>() / values.len() as f32
        }
    }

    pub fn mean_se3(&self) -> f32 {
        Self::mean(&self.se3)
    }

    pub fn mean_fc(&self) -> f32 {
        Self::mean(&self.fc)
    }
}

/// Drives a [`StatefulModel`] over a stateful batch stream
pub struct Trainer<M: StatefulModel> {
    model: M,
    config: TrainingConfig,
    device: Device,
    step: usize,
}

impl<M: StatefulModel> Trainer<M> {
    /// Create new trainer
    pub fn new(model: M, config: TrainingConfig, device: Device) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            device,
            step: 0,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Batches trained so far
    pub fn step(&self) -> usize {
        self.step
    }

    /// Train for one epoch
    ///
    /// State starts at zero, columns are reset where the batch flags them,
    /// and the state returned by each step feeds the next one.
    pub fn train_epoch(&mut self, data: &mut impl StatefulBatchSource) -> crate::Result<LossHistory> {
        let mut history = LossHistory::default();

        data.next_epoch();
        let mut state = RecurrentState::zeros(
            self.config.lstm_layers,
            data.batch_size(),
            self.config.lstm_size,
            &self.device,
        )?;

        while data.has_next_batch() {
            let batch = data.next_batch(&self.device)?;
            state = state.reset_select(&batch.reset_state)?;

            let se3 = self.model.se3_step(&batch, &state, self.config.se3_lr)?;
            state = se3.state;

            let fc = self.model.fc_step(&batch, &state, self.config.fc_lr)?;
            state = fc.state;

            history.se3.push(se3.loss);
            history.fc.push(fc.loss);
            self.step += 1;

            if self.step % self.config.log_every == 0 {
                log::info!(
                    "Step {}: se3_loss={:.6}, fc_loss={:.6}",
                    self.step,
                    se3.loss,
                    fc.loss
                );
            }
        }

        Ok(history)
    }

    /// Full training loop
    pub fn train(&mut self, data: &mut impl StatefulBatchSource) -> crate::Result<LossHistory> {
        log::info!("Starting training for {} epochs", self.config.num_epochs);
        log::info!("Total batches per epoch: {}", data.total_batches());

        let mut history = LossHistory::default();
        for epoch in 0..self.config.num_epochs {
            let epoch_history = self.train_epoch(data)?;

            log::info!(
                "Epoch {}/{} complete: se3_loss={:.6}, fc_loss={:.6}, step={}",
                epoch + 1,
                self.config.num_epochs,
                epoch_history.mean_se3(),
                epoch_history.mean_fc(),
                self.step
            );

            history.se3.extend(epoch_history.se3);
            history.fc.extend(epoch_history.fc);
        }

        log::info!("Training complete!");
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryLoader, InMemorySequence, StatefulBatch};
    use crate::models::{Prediction, StaticPoseBaseline, StepOutput};
    use crate::{DataConfig, StatefulBatchGenerator};
    use candle_core::Tensor;

    fn generator() -> StatefulBatchGenerator {
        let loader = InMemoryLoader::new()
            .with_sequence("a", InMemorySequence::synthetic(11, 4, 2, 0))
            .with_sequence("b", InMemorySequence::synthetic(21, 4, 2, 50));
        let config = DataConfig {
            timesteps: 5,
            batch_size: 2,
            input_channels: 1,
            input_height: 2,
            input_width: 4,
            ..DataConfig::default()
        };
        StatefulBatchGenerator::new(&config, &loader, &["a", "b"]).unwrap()
    }

    fn small_config(num_epochs: usize) -> TrainingConfig {
        TrainingConfig {
            num_epochs,
            lstm_layers: 1,
            lstm_size: 3,
            se3_lr: 0.01,
            fc_lr: 0.02,
            log_every: 1,
        }
    }

    /// Adds one to the state every step and records what it was handed
    #[derive(Default)]
    struct RecordingModel {
        seen_states: Vec<Vec<f32>>,
        seen_resets: Vec<Vec<u8>>,
        lrs: Vec<f64>,
    }

    impl RecordingModel {
        fn step(&mut self, batch: &StatefulBatch, state: &RecurrentState, lr: f64) -> crate::Result<StepOutput> {
            // column-wise first entry of layer 0 cell state
            let cols = state.tensor.get(0)?.get(0)?.to_vec2::<f32>()?;
            self.seen_states.push(cols.iter().map(|c| c[0]).collect());
            self.seen_resets.push(batch.reset_flags()?);
            self.lrs.push(lr);
            Ok(StepOutput {
                loss: lr as f32,
                state: RecurrentState::new((&state.tensor + 1.0)?),
            })
        }
    }

    impl StatefulModel for RecordingModel {
        fn se3_step(&mut self, batch: &StatefulBatch, state: &RecurrentState, lr: f64) -> crate::Result<StepOutput> {
            self.step(batch, state, lr)
        }

        fn fc_step(&mut self, batch: &StatefulBatch, state: &RecurrentState, lr: f64) -> crate::Result<StepOutput> {
            self.step(batch, state, lr)
        }

        fn predict(&mut self, _frames: &Tensor, state: &RecurrentState, init_poses: &Tensor) -> crate::Result<Prediction> {
            Ok(Prediction {
                se3: init_poses.unsqueeze(0)?,
                state: state.clone(),
            })
        }
    }

    #[test]
    fn test_state_carried_and_reset() {
        let mut data = generator();
        let mut trainer = Trainer::new(RecordingModel::default(), small_config(1), Device::Cpu).unwrap();

        let history = trainer.train_epoch(&mut data).unwrap();
        assert_eq!(history.se3.len(), 3);
        assert_eq!(trainer.step(), 3);

        let model = trainer.into_model();
        // reset flags per batch: [0, 1], [1, 1], [0, 1]
        // se3 / fc steps each add one; flagged columns are zeroed before the batch
        assert_eq!(
            model.seen_resets,
            vec![vec![0, 1], vec![0, 1], vec![1, 1], vec![1, 1], vec![0, 1], vec![0, 1]]
        );
        assert_eq!(
            model.seen_states,
            vec![
                vec![0.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
                vec![1.0, 1.0],
                vec![2.0, 0.0],
                vec![3.0, 1.0],
            ]
        );
        assert_eq!(model.lrs, vec![0.01, 0.02, 0.01, 0.02, 0.01, 0.02]);
    }

    #[test]
    fn test_each_epoch_restarts_from_zero_state() {
        let mut data = generator();
        let mut trainer = Trainer::new(RecordingModel::default(), small_config(2), Device::Cpu).unwrap();

        let history = trainer.train(&mut data).unwrap();
        assert_eq!(history.se3.len(), 6);
        assert_eq!(history.fc.len(), 6);

        let model = trainer.into_model();
        assert_eq!(model.seen_states[6], vec![0.0, 0.0]);
    }

    #[test]
    fn test_baseline_losses_recorded() {
        let mut data = generator();
        let mut trainer = Trainer::new(StaticPoseBaseline::new(), small_config(1), Device::Cpu).unwrap();

        let history = trainer.train(&mut data).unwrap();
        assert_eq!(history.se3.len(), 3);
        assert!(history.se3.iter().all(|l| l.is_finite() && *l >= 0.0));
        assert!(history.mean_fc() > 0.0);
        assert_eq!(trainer.model().steps(), 6);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrainingConfig {
            lstm_size: 0,
            ..TrainingConfig::default()
        };
        assert!(Trainer::new(StaticPoseBaseline::new(), config, Device::Cpu).is_err());
    }
}
