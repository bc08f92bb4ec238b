/// Recurrent state carried across batches
use candle_core::{DType, Device, Tensor};

/// LSTM cell and hidden states: [2, layers, batch, size]
#[derive(Debug, Clone)]
pub struct RecurrentState {
    pub tensor: Tensor,
}

impl RecurrentState {
    pub fn new(tensor: Tensor) -> Self {
        Self { tensor }
    }

    /// All-zero state, as at the start of an epoch
    pub fn zeros(layers: usize, batch_size: usize, size: usize, device: &Device) -> candle_core::Result<Self> {
        let tensor = Tensor::zeros((2, layers, batch_size, size), DType::F32, device)?;
        Ok(Self { tensor })
    }

    pub fn batch_size(&self) -> candle_core::Result<usize> {
        self.tensor.dim(2)
    }

    /// Zero the state of every column whose reset flag is set
    ///
    /// # Arguments
    /// * `reset_flag` - u8 tensor [batch_size], 1 where the column state must be zeroed
    pub fn reset_select(&self, reset_flag: &Tensor) -> candle_core::Result<Self> {
        let dims = self.tensor.dims4()?;

        // Reshape reset_flag to [1, 1, batch, 1] for broadcasting
        let mask = reset_flag
            .to_dtype(DType::U8)?
            .reshape((1, 1, dims.2, 1))?
            .broadcast_as(dims)?;
        let zeros = self.tensor.zeros_like()?;

        let tensor = mask.where_cond(&zeros, &self.tensor)?;
        Ok(Self { tensor })
    }
}
