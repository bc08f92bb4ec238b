/// Truncation and sizing of sequences into the batch grid
use std::fmt;

/// Cell of the packed grid: `row` is the time index, `col` the batch slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridIndex {
    pub row: usize,
    pub col: usize,
}

impl GridIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Grid cell receiving the `slot`-th placed frame (column-wise fill)
    pub fn from_slot(slot: usize, total_timesteps: usize) -> Self {
        Self {
            row: slot % total_timesteps,
            col: slot / total_timesteps,
        }
    }
}

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// How a list of sequences is cut into whole examples and whole batches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackingPlan {
    /// Frames per example, excluding the anchor
    pub timesteps: usize,
    /// Columns of the grid
    pub batch_size: usize,
    /// Frames used from each sequence, in input order
    pub truncated_seq_sizes: Vec<usize>,
    /// Examples available before the partial batch was dropped
    pub total_examples: usize,
    /// Full batches in the grid
    pub total_batch_count: usize,
    /// Rows of the grid: `total_batch_count * (timesteps + 1)`
    pub total_timesteps: usize,
}

impl PackingPlan {
    /// Plan the grid for the given per-sequence frame counts
    ///
    /// Sequences shorter than `timesteps + 1` frames yield nothing. Examples
    /// that do not fill a whole batch are removed from the tail of the
    /// sequence list, whole examples at a time.
    pub fn compute(frame_counts: &[usize], timesteps: usize, batch_size: usize) -> crate::Result<Self> {
        if timesteps == 0 || batch_size == 0 {
            return Err(crate::VOError::Config(format!(
                "timesteps ({}) and batch_size ({}) must be > 0",
                timesteps, batch_size
            )));
        }

        let mut examples: Vec<usize> = frame_counts
            .iter()
            .map(|&frames| frames.saturating_sub(1) / timesteps)
            .collect();
        let total_examples: usize = examples.iter().sum();

        let total_batch_count = total_examples / batch_size;
        let total_timesteps = total_batch_count * (timesteps + 1);

        // drop the partial batch from the end of the sequence list
        let mut deleted = total_examples - total_batch_count * batch_size;
        for count in examples.iter_mut().rev() {
            if deleted == 0 {
                break;
            }
            let removed = deleted.min(*count);
            *count -= removed;
            deleted -= removed;
        }

        let truncated_seq_sizes = examples
            .iter()
            .map(|&n| if n == 0 { 0 } else { n * timesteps + 1 })
            .collect();

        Ok(Self {
            timesteps,
            batch_size,
            truncated_seq_sizes,
            total_examples,
            total_batch_count,
            total_timesteps,
        })
    }

    /// Frames removed from the tail to discard the partial batch
    pub fn deleted_frames(&self) -> usize {
        (self.total_examples - self.total_batch_count * self.batch_size) * self.timesteps
    }

    /// Examples kept for sequence `i`
    pub fn examples_in(&self, i: usize) -> usize {
        self.truncated_seq_sizes[i].saturating_sub(1) / self.timesteps
    }

    /// Grid cells, `total_timesteps * batch_size`
    pub fn grid_cells(&self) -> usize {
        self.total_timesteps * self.batch_size
    }

    /// Grid cells a sequence occupies once anchors are duplicated
    pub fn slots_in(&self, i: usize) -> usize {
        self.examples_in(i) * (self.timesteps + 1)
    }

    /// Whether frame `i_img` of a sequence with `length` truncated frames is placed twice
    pub fn is_anchor(&self, i_img: usize, length: usize) -> bool {
        i_img != 0 && i_img + 1 != length && i_img % self.timesteps == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_two_sequence_scenario() {
        let plan = PackingPlan::compute(&[11, 21], 5, 2).unwrap();

        assert_eq!(plan.total_examples, 6);
        assert_eq!(plan.total_batch_count, 3);
        assert_eq!(plan.total_timesteps, 18);
        assert_eq!(plan.truncated_seq_sizes, vec![11, 21]);
        assert_eq!(plan.deleted_frames(), 0);
        assert_eq!(plan.examples_in(0), 2);
        assert_eq!(plan.examples_in(1), 4);
    }

    #[test]
    fn test_remainder_frames_dropped() {
        // 13 frames -> 2 examples of 5, two trailing frames unused
        let plan = PackingPlan::compute(&[13], 5, 1).unwrap();
        assert_eq!(plan.truncated_seq_sizes, vec![11]);
        assert_eq!(plan.total_batch_count, 2);
    }

    #[test]
    fn test_partial_batch_trimmed_from_last_sequence() {
        // 2 + 3 examples, batch of 2 -> one example removed from the tail
        let plan = PackingPlan::compute(&[11, 16], 5, 2).unwrap();
        assert_eq!(plan.total_examples, 5);
        assert_eq!(plan.total_batch_count, 2);
        assert_eq!(plan.deleted_frames(), 5);
        assert_eq!(plan.truncated_seq_sizes, vec![11, 11]);
    }

    #[test]
    fn test_trim_spills_into_previous_sequence() {
        // 3 + 1 + 1 examples, batch of 4 -> the last sequence vanishes
        let plan = PackingPlan::compute(&[16, 6, 6], 5, 4).unwrap();
        assert_eq!(plan.total_batch_count, 1);
        assert_eq!(plan.truncated_seq_sizes, vec![16, 6, 0]);

        let plan = PackingPlan::compute(&[11, 6, 6], 5, 3).unwrap();
        assert_eq!(plan.truncated_seq_sizes, vec![11, 6, 0]);

        // 3 + 1 + 1 examples, batch of 3 -> two removed, spilling past the last sequence
        let plan = PackingPlan::compute(&[16, 6, 6], 5, 3).unwrap();
        assert_eq!(plan.truncated_seq_sizes, vec![16, 0, 0]);
    }

    #[test]
    fn test_short_sequences_contribute_nothing() {
        let plan = PackingPlan::compute(&[0, 3, 6], 5, 1).unwrap();
        assert_eq!(plan.truncated_seq_sizes, vec![0, 0, 6]);
        assert_eq!(plan.total_batch_count, 1);
    }

    #[test]
    fn test_not_enough_data_gives_zero_batches() {
        let plan = PackingPlan::compute(&[11], 5, 4).unwrap();
        assert_eq!(plan.total_batch_count, 0);
        assert_eq!(plan.truncated_seq_sizes, vec![0]);
    }

    #[test]
    fn test_zero_config_rejected() {
        assert!(PackingPlan::compute(&[11], 0, 1).is_err());
        assert!(PackingPlan::compute(&[11], 5, 0).is_err());
    }

    #[test]
    fn test_anchor_positions() {
        let plan = PackingPlan::compute(&[11], 5, 1).unwrap();
        let anchors: Vec<usize> = (0..11).filter(|&i| plan.is_anchor(i, 11)).collect();
        assert_eq!(anchors, vec![5]);
    }

    #[test]
    fn test_slots_always_fill_grid() {
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let timesteps = rng.gen_range(1..8);
            let batch_size = rng.gen_range(1..6);
            let num_seqs = rng.gen_range(1..6);
            let counts: Vec<usize> = (0..num_seqs).map(|_| rng.gen_range(0..60)).collect();

            let plan = PackingPlan::compute(&counts, timesteps, batch_size).unwrap();

            let slots: usize = (0..counts.len()).map(|i| plan.slots_in(i)).sum();
            assert_eq!(slots, plan.grid_cells(), "counts {:?} T={} B={}", counts, timesteps, batch_size);

            // anchors account for the difference between frames used and slots
            let placed: usize = plan
                .truncated_seq_sizes
                .iter()
                .map(|&len| len + (0..len).filter(|&i| plan.is_anchor(i, len)).count())
                .sum();
            assert_eq!(placed, plan.grid_cells());

            for (i, &len) in plan.truncated_seq_sizes.iter().enumerate() {
                assert!(len <= counts[i]);
            }
        }
    }
}
