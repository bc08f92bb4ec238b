/// Stateful batch generator
///
/// Packs sequences column by column into a `[total_timesteps, batch_size]`
/// grid of frames so that each column is a continuous stream of examples.
/// Consecutive batches are consecutive row blocks, which lets a stateful
/// recurrent model carry its state per column from one batch to the next.
///
/// Some frames at the end of each sequence, and whole trailing sequences,
/// may be dropped so the grid holds whole examples and whole batches.
use std::collections::HashSet;

use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use ndarray::{s, Array2, Array3, Array5};

use super::packing::{GridIndex, PackingPlan};
use super::{SequenceHandle, SequenceLoader, StatefulBatchSource};
use crate::config::DataConfig;
use crate::geometry::{self, Pose, PoseConvention, ZyxConvention, FC_DIM, SE3_DIM};

/// One time-major batch
#[derive(Debug, Clone)]
pub struct StatefulBatch {
    /// Absolute pose of the first row per column: [batch, 7]
    pub init_poses: Tensor,
    /// 1 where the column's carried state must be zeroed: [batch], u8
    pub reset_state: Tensor,
    /// Normalized frames in [0, 1]: [timesteps + 1, batch, channels, height, width]
    pub frames: Tensor,
    /// Frame-to-frame translation + Euler z-y-x: [timesteps + 1, batch, 6]
    pub fc_ground_truth: Tensor,
    /// Absolute translation + quaternion (w, x, y, z): [timesteps + 1, batch, 7]
    pub se3_ground_truth: Tensor,
}

impl StatefulBatch {
    /// Reset flags as host values
    pub fn reset_flags(&self) -> crate::Result<Vec<u8>> {
        Ok(self.reset_state.to_vec1::<u8>()?)
    }
}

/// Eagerly loaded, read-only batch grid with a batch cursor
pub struct StatefulBatchGenerator {
    config: DataConfig,
    plan: PackingPlan,
    input_frames: Array5<u8>,
    poses: Array2<Pose>,
    se3_ground_truth: Array3<f32>,
    fc_ground_truth: Array3<f32>,
    end_of_sequence_indices: HashSet<GridIndex>,
    sequence_start_indices: HashSet<GridIndex>,
    curr_batch_idx: usize,
}

impl StatefulBatchGenerator {
    /// Load and pack `sequences` using the default pose convention
    pub fn new<L, S>(config: &DataConfig, loader: &L, sequences: &[S]) -> crate::Result<Self>
    where
        L: SequenceLoader,
        S: AsRef<str>,
    {
        Self::with_convention(config, loader, sequences, &ZyxConvention)
    }

    /// Load and pack `sequences`, decomposing ground truth with `convention`
    pub fn with_convention<L, S, C>(
        config: &DataConfig,
        loader: &L,
        sequences: &[S],
        convention: &C,
    ) -> crate::Result<Self>
    where
        L: SequenceLoader,
        S: AsRef<str>,
        C: PoseConvention + ?Sized,
    {
        config.validate()?;

        let handles = sequences
            .iter()
            .map(|id| loader.open(id.as_ref()))
            .collect::<crate::Result<Vec<_>>>()?;
        let frame_counts: Vec<usize> = handles.iter().map(|h| h.frame_count()).collect();

        let plan = PackingPlan::compute(&frame_counts, config.timesteps, config.batch_size)?;
        if plan.total_batch_count == 0 {
            return Err(crate::VOError::Config(format!(
                "Not enough data for one batch: {} examples of {} timesteps, batch_size {}",
                plan.total_examples, config.timesteps, config.batch_size
            )));
        }

        let buffer_bytes = config
            .frame_bytes()
            .and_then(|bytes| plan.grid_cells().checked_mul(bytes))
            .ok_or_else(|| crate::VOError::Config("Frame buffer size overflows usize".to_string()))?;
        if buffer_bytes > config.max_buffer_bytes {
            return Err(crate::VOError::Config(format!(
                "Frame buffer needs {} bytes, limit is {}",
                buffer_bytes, config.max_buffer_bytes
            )));
        }

        log::info!(
            "Packing {} sequences: {} examples -> {} batches, {} timesteps, {} MB of frames",
            sequences.len(),
            plan.total_examples,
            plan.total_batch_count,
            plan.total_timesteps,
            buffer_bytes / (1024 * 1024)
        );
        log::debug!("Truncated sequence sizes: {:?}", plan.truncated_seq_sizes);

        let mut generator = Self {
            config: config.clone(),
            input_frames: Array5::zeros((
                plan.total_timesteps,
                config.batch_size,
                config.input_channels,
                config.input_height,
                config.input_width,
            )),
            poses: Array2::from_elem((plan.total_timesteps, config.batch_size), Pose::identity()),
            se3_ground_truth: Array3::zeros((plan.total_timesteps, config.batch_size, SE3_DIM)),
            fc_ground_truth: Array3::zeros((plan.total_timesteps, config.batch_size, FC_DIM)),
            end_of_sequence_indices: HashSet::new(),
            sequence_start_indices: HashSet::new(),
            curr_batch_idx: 0,
            plan,
        };

        let mut num_image_loaded = 0;
        for (i_seq, handle) in handles.iter().enumerate() {
            let id = sequences[i_seq].as_ref();
            num_image_loaded = generator.populate_sequence(id, i_seq, handle, num_image_loaded)?;
        }

        // every slot of the grid must hold exactly one frame
        if num_image_loaded != generator.plan.grid_cells() {
            return Err(crate::VOError::Consistency(format!(
                "Loaded {} frames into a grid of {} cells",
                num_image_loaded,
                generator.plan.grid_cells()
            )));
        }

        generator.derive_ground_truth(convention)?;

        log::info!(
            "All data loaded, batch_size={}, timesteps={}, num_batches={}",
            generator.config.batch_size,
            generator.config.timesteps,
            generator.plan.total_batch_count
        );

        Ok(generator)
    }

    /// Place the truncated frames of one sequence starting at `slot`; returns the next free slot
    fn populate_sequence<H: SequenceHandle>(
        &mut self,
        id: &str,
        i_seq: usize,
        handle: &H,
        mut slot: usize,
    ) -> crate::Result<usize> {
        let length = self.plan.truncated_seq_sizes[i_seq];
        if length == 0 {
            log::warn!("Sequence {} contributes no examples, skipping", id);
            return Ok(slot);
        }

        for i_img in 0..length {
            if i_img % 100 == 0 {
                log::info!(
                    "Loading sequence {} {:.1}%",
                    id,
                    i_img as f64 / length as f64 * 100.0
                );
            }

            let frame = load_frame(handle, i_img, &self.config)?;
            let pose = handle.pose(i_img)?;

            let cell = self.place(slot, &frame, &pose)?;
            if i_img == 0 {
                self.sequence_start_indices.insert(cell);
            }
            slot += 1;

            // example boundary inside the sequence: the anchor also opens the next example
            if self.plan.is_anchor(i_img, length) {
                let cell = self.place(slot, &frame, &pose)?;
                self.end_of_sequence_indices.insert(cell);
                slot += 1;
            }
        }

        Ok(slot)
    }

    fn place(&mut self, slot: usize, frame: &Array3<u8>, pose: &Pose) -> crate::Result<GridIndex> {
        if slot >= self.plan.grid_cells() {
            return Err(crate::VOError::Consistency(format!(
                "Frame slot {} exceeds grid of {} cells",
                slot,
                self.plan.grid_cells()
            )));
        }

        let cell = GridIndex::from_slot(slot, self.plan.total_timesteps);
        self.input_frames
            .slice_mut(s![cell.row, cell.col, .., .., ..])
            .assign(frame);
        self.poses[[cell.row, cell.col]] = *pose;
        Ok(cell)
    }

    fn derive_ground_truth<C: PoseConvention + ?Sized>(&mut self, convention: &C) -> crate::Result<()> {
        let n = self.config.frames_per_example();
        let identity = geometry::fc_vector(convention, &Pose::identity());

        for ((row, col), pose) in self.poses.indexed_iter() {
            let se3 = geometry::se3_vector(convention, pose);
            for (k, v) in se3.iter().enumerate() {
                self.se3_ground_truth[[row, col, k]] = *v as f32;
            }

            let fc = if row % n == 0 {
                identity
            } else {
                let rel = geometry::relative(&self.poses[[row - 1, col]], pose)?;
                geometry::fc_vector(convention, &rel)
            };
            for (k, v) in fc.iter().enumerate() {
                self.fc_ground_truth[[row, col, k]] = *v as f32;
            }
        }

        Ok(())
    }

    /// Serve the next batch and advance the cursor
    pub fn next_batch(&mut self, device: &Device) -> crate::Result<StatefulBatch> {
        if !self.has_next_batch() {
            return Err(crate::VOError::Exhausted {
                cursor: self.curr_batch_idx,
                total: self.plan.total_batch_count,
            });
        }

        let n = self.config.frames_per_example();
        let batch_size = self.config.batch_size;
        let start = self.curr_batch_idx * n;
        let end = start + n;

        let frames: Vec<f32> = self
            .input_frames
            .slice(s![start..end, .., .., .., ..])
            .iter()
            .map(|&p| p as f32 / 255.0)
            .collect();
        let frames = Tensor::from_vec(
            frames,
            (
                n,
                batch_size,
                self.config.input_channels,
                self.config.input_height,
                self.config.input_width,
            ),
            device,
        )?;

        let se3: Vec<f32> = self.se3_ground_truth.slice(s![start..end, .., ..]).iter().copied().collect();
        let fc: Vec<f32> = self.fc_ground_truth.slice(s![start..end, .., ..]).iter().copied().collect();
        let init: Vec<f32> = self.se3_ground_truth.slice(s![start, .., ..]).iter().copied().collect();

        let reset: Vec<u8> = (0..batch_size)
            .map(|j| u8::from(self.end_of_sequence_indices.contains(&GridIndex::new(start, j))))
            .collect();

        self.curr_batch_idx += 1;

        Ok(StatefulBatch {
            init_poses: Tensor::from_vec(init, (batch_size, SE3_DIM), device)?,
            reset_state: Tensor::from_vec(reset, batch_size, device)?,
            frames,
            fc_ground_truth: Tensor::from_vec(fc, (n, batch_size, FC_DIM), device)?,
            se3_ground_truth: Tensor::from_vec(se3, (n, batch_size, SE3_DIM), device)?,
        })
    }

    pub fn has_next_batch(&self) -> bool {
        self.curr_batch_idx < self.plan.total_batch_count
    }

    pub fn next_epoch(&mut self) {
        self.curr_batch_idx = 0;
    }

    pub fn curr_batch(&self) -> usize {
        self.curr_batch_idx
    }

    pub fn total_batches(&self) -> usize {
        self.plan.total_batch_count
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn plan(&self) -> &PackingPlan {
        &self.plan
    }

    pub fn truncated_seq_sizes(&self) -> &[usize] {
        &self.plan.truncated_seq_sizes
    }

    /// Raw frame grid: [total_timesteps, batch_size, channels, height, width]
    pub fn input_frames(&self) -> &Array5<u8> {
        &self.input_frames
    }

    /// Pose placed at a grid cell
    pub fn pose_at(&self, cell: GridIndex) -> Option<&Pose> {
        self.poses.get([cell.row, cell.col])
    }

    pub fn se3_ground_truth(&self) -> &Array3<f32> {
        &self.se3_ground_truth
    }

    pub fn fc_ground_truth(&self) -> &Array3<f32> {
        &self.fc_ground_truth
    }

    /// Cells holding the second copy of a duplicated anchor frame; drives the reset flags
    pub fn end_of_sequence_indices(&self) -> &HashSet<GridIndex> {
        &self.end_of_sequence_indices
    }

    /// Cells holding the first frame of each sequence
    pub fn sequence_start_indices(&self) -> &HashSet<GridIndex> {
        &self.sequence_start_indices
    }
}

impl StatefulBatchSource for StatefulBatchGenerator {
    fn next_batch(&mut self, device: &Device) -> crate::Result<StatefulBatch> {
        StatefulBatchGenerator::next_batch(self, device)
    }

    fn has_next_batch(&self) -> bool {
        StatefulBatchGenerator::has_next_batch(self)
    }

    fn next_epoch(&mut self) {
        StatefulBatchGenerator::next_epoch(self)
    }

    fn curr_batch(&self) -> usize {
        StatefulBatchGenerator::curr_batch(self)
    }

    fn total_batches(&self) -> usize {
        StatefulBatchGenerator::total_batches(self)
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }
}

/// Decode, resize and reorder one frame to channel-first
fn load_frame<H: SequenceHandle>(handle: &H, i: usize, config: &DataConfig) -> crate::Result<Array3<u8>> {
    let img = handle.image(i)?;
    let (width, height) = (config.input_width as u32, config.input_height as u32);
    let img = if img.width() == width && img.height() == height {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    let raw = match config.input_channels {
        1 => img.into_luma8().into_raw(),
        _ => img.into_rgb8().into_raw(),
    };

    let hwc = Array3::from_shape_vec(
        (config.input_height, config.input_width, config.input_channels),
        raw,
    )
    .map_err(|e| crate::VOError::Data(format!("Frame {} has unexpected size: {}", i, e)))?;

    Ok(hwc.permuted_axes([2, 0, 1]))
}
