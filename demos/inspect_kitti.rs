/// Load KITTI sequences, inspect the stateful batches and run the zero-motion baseline
///
/// Usage: inspect_kitti <kitti_dataset_dir> [sequence ...]
/// Set DATA_CONFIG to a JSON file to override the default data configuration.
use candle_core::Device;
use stateful_vo::data::KittiOdometry;
use stateful_vo::models::StaticPoseBaseline;
use stateful_vo::training::{generate_trajectory, Trainer, TrainingConfig};
use stateful_vo::{DataConfig, StatefulBatchGenerator};

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let base_dir = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: inspect_kitti <kitti_dataset_dir> [sequence ...]"))?;
    let mut sequences: Vec<String> = args.collect();
    if sequences.is_empty() {
        sequences.push("00".to_string());
    }

    let data_config = match std::env::var("DATA_CONFIG") {
        Ok(path) => DataConfig::from_json_file(path)?,
        Err(_) => DataConfig {
            timesteps: 10,
            batch_size: 4,
            input_channels: 1,
            input_height: 94,
            input_width: 310,
            ..DataConfig::default()
        },
    };
    log::info!("Data configuration: {:#?}", data_config);

    let device = if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)?
    } else {
        Device::Cpu
    };
    log::info!("Using device: {:?}", device);

    let loader = KittiOdometry::new(&base_dir);
    let mut data = StatefulBatchGenerator::new(&data_config, &loader, &sequences[..])?;

    log::info!("Truncated sequence sizes: {:?}", data.truncated_seq_sizes());
    log::info!("Batches per epoch: {}", data.total_batches());

    while data.has_next_batch() {
        let j_batch = data.curr_batch();
        let batch = data.next_batch(&device)?;
        let reset = batch.reset_flags()?;
        if reset.iter().any(|&r| r == 1) {
            log::info!("Batch {}: state reset in columns {:?}", j_batch, reset);
        }
    }

    let training_config = TrainingConfig {
        num_epochs: 1,
        lstm_layers: 2,
        lstm_size: 32,
        ..TrainingConfig::default()
    };

    let mut trainer = Trainer::new(StaticPoseBaseline::new(), training_config.clone(), device.clone())?;
    let history = trainer.train(&mut data)?;
    log::info!(
        "Baseline losses: se3={:.6}, fc={:.6}",
        history.mean_se3(),
        history.mean_fc()
    );

    // trajectories need a single column per batch
    let eval_config = DataConfig {
        batch_size: 1,
        ..data_config
    };
    let mut model = trainer.into_model();
    for sequence in &sequences {
        let mut eval_data = StatefulBatchGenerator::new(&eval_config, &loader, &[sequence.as_str()])?;
        let trajectory = generate_trajectory(&mut model, &mut eval_data, &training_config, &device)?;
        trajectory.save_npy("trajectory_results", sequence)?;
    }

    log::info!("Done");
    Ok(())
}
