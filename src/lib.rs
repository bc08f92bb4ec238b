//! Stateful visual odometry data pipeline
//!
//! Packs KITTI odometry sequences into a time-major batch grid for a stateful
//! recurrent pose regressor, and drives training and trajectory evaluation
//! against any model implementing [`models::StatefulModel`].
//!
//! # Pipeline
//!
//! - **Loading**: a [`data::SequenceLoader`] yields frame counts, images and 4x4 poses
//! - **Packing**: sequences are truncated to whole examples and laid out column by column
//! - **Ground truth**: absolute (translation + quaternion) and relative (translation + Euler z-y-x)
//! - **Serving**: batches of `timesteps + 1` rows with per-column state reset flags
//!
//! # Example
//!
//! ```ignore
//! use stateful_vo::{DataConfig, StatefulBatchGenerator};
//! use stateful_vo::data::KittiOdometry;
//!
//! let loader = KittiOdometry::new("/data/KITTI/dataset");
//! let mut gen = StatefulBatchGenerator::new(&DataConfig::default(), &loader, &["00"])?;
//! while gen.has_next_batch() {
//!     let batch = gen.next_batch(&device)?;
//! }
//! ```

pub mod config;
pub mod data;
pub mod geometry;
pub mod models;
pub mod training;

// Re-export commonly used items
pub use config::DataConfig;
pub use data::{GridIndex, StatefulBatch, StatefulBatchGenerator, StatefulBatchSource};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum VOError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    /// The packed grid does not hold exactly `total_timesteps * batch_size` frames
    #[error("Grid consistency violated: {0}")]
    Consistency(String),

    /// `next_batch` was called after the last batch of the epoch
    #[error("Batch iterator exhausted: cursor {cursor} of {total} batches")]
    Exhausted { cursor: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NumPy write error: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),
}

pub type Result<T> = std::result::Result<T, VOError>;
