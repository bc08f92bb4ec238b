/// In-memory sequences, used for synthetic data and tests
use std::collections::HashMap;
use std::sync::Arc;

use image::{DynamicImage, GrayImage, Luma};

use super::{SequenceHandle, SequenceLoader};
use crate::geometry::{Pose, PoseConvention, ZyxConvention};

/// Sequence held entirely in memory
#[derive(Debug, Clone)]
pub struct InMemorySequence {
    images: Vec<DynamicImage>,
    poses: Vec<Pose>,
}

impl InMemorySequence {
    pub fn new(images: Vec<DynamicImage>, poses: Vec<Pose>) -> crate::Result<Self> {
        if images.len() != poses.len() {
            return Err(crate::VOError::Data(format!(
                "Image/pose count mismatch: {} images, {} poses",
                images.len(),
                poses.len()
            )));
        }
        Ok(Self { images, poses })
    }

    /// Smooth forward drive with a slow left turn
    ///
    /// Frame `i` is a grayscale gradient offset by `seed + i`, so frames are
    /// distinguishable after packing. Poses are exact rigid transforms.
    pub fn synthetic(frames: usize, width: u32, height: u32, seed: u8) -> Self {
        let mut images = Vec::with_capacity(frames);
        let mut poses = Vec::with_capacity(frames);

        for i in 0..frames {
            let offset = (seed as usize + i) % 256;
            let img = GrayImage::from_fn(width, height, |x, y| {
                Luma([((offset + x as usize + y as usize) % 256) as u8])
            });
            images.push(DynamicImage::ImageLuma8(img));

            let t = i as f64;
            poses.push(ZyxConvention.from_euler(
                [0.3 * t.sin(), 0.01 * t, 1.2 * t],
                [0.02 * t, 0.005 * (0.5 * t).sin(), -0.003 * t],
            ));
        }

        Self { images, poses }
    }
}

impl SequenceHandle for InMemorySequence {
    fn frame_count(&self) -> usize {
        self.poses.len()
    }

    fn pose(&self, i: usize) -> crate::Result<Pose> {
        self.poses
            .get(i)
            .copied()
            .ok_or_else(|| crate::VOError::Data(format!("Pose {} out of range", i)))
    }

    fn image(&self, i: usize) -> crate::Result<DynamicImage> {
        self.images
            .get(i)
            .cloned()
            .ok_or_else(|| crate::VOError::Data(format!("Image {} out of range", i)))
    }
}

/// Loader over named in-memory sequences
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    sequences: HashMap<String, Arc<InMemorySequence>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, sequence: InMemorySequence) {
        self.sequences.insert(id.into(), Arc::new(sequence));
    }

    pub fn with_sequence(mut self, id: impl Into<String>, sequence: InMemorySequence) -> Self {
        self.insert(id, sequence);
        self
    }
}

impl SequenceLoader for InMemoryLoader {
    type Sequence = Arc<InMemorySequence>;

    fn open(&self, sequence: &str) -> crate::Result<Self::Sequence> {
        self.sequences
            .get(sequence)
            .cloned()
            .ok_or_else(|| crate::VOError::Data(format!("Unknown sequence: {}", sequence)))
    }
}
