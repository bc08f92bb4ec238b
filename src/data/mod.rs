/// Data loading and stateful batching for visual odometry training
pub mod generator;
pub mod kitti;
pub mod memory;
pub mod packing;

pub use generator::{StatefulBatch, StatefulBatchGenerator};
pub use kitti::{KittiOdometry, KittiSequence};
pub use memory::{InMemoryLoader, InMemorySequence};
pub use packing::{GridIndex, PackingPlan};

use std::sync::Arc;

use candle_core::Device;
use image::DynamicImage;

use crate::geometry::Pose;

/// One recorded drive: frame count, and per frame an image and a pose
pub trait SequenceHandle {
    /// Number of frames (and poses) in the sequence
    fn frame_count(&self) -> usize;

    /// Pose of frame `i` in the common ground frame
    fn pose(&self, i: usize) -> crate::Result<Pose>;

    /// Raw image of frame `i`
    fn image(&self, i: usize) -> crate::Result<DynamicImage>;
}

impl<T: SequenceHandle + ?Sized> SequenceHandle for Arc<T> {
    fn frame_count(&self) -> usize {
        (**self).frame_count()
    }

    fn pose(&self, i: usize) -> crate::Result<Pose> {
        (**self).pose(i)
    }

    fn image(&self, i: usize) -> crate::Result<DynamicImage> {
        (**self).image(i)
    }
}

/// Opens sequences by identifier
pub trait SequenceLoader {
    type Sequence: SequenceHandle;

    fn open(&self, sequence: &str) -> crate::Result<Self::Sequence>;
}

/// Sequential, stateful batch stream consumed by training drivers
pub trait StatefulBatchSource {
    /// Serve the next batch; fails with `VOError::Exhausted` past the last one
    fn next_batch(&mut self, device: &Device) -> crate::Result<StatefulBatch>;

    /// Whether another batch remains in this epoch
    fn has_next_batch(&self) -> bool;

    /// Rewind to the first batch
    fn next_epoch(&mut self);

    /// Index of the batch the next call to `next_batch` serves
    fn curr_batch(&self) -> usize;

    /// Batches per epoch
    fn total_batches(&self) -> usize;

    /// Columns per batch
    fn batch_size(&self) -> usize;
}
