use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Configuration for the stateful batch generator
///
/// Fixed for the lifetime of a generator instance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DataConfig {
    /// Frames per example, excluding the leading anchor frame
    pub timesteps: usize,

    /// Number of columns (parallel example streams) per batch
    pub batch_size: usize,

    /// Image channels after conversion: 1 (grayscale) or 3 (RGB)
    pub input_channels: usize,

    /// Image height after resize
    pub input_height: usize,

    /// Image width after resize
    pub input_width: usize,

    /// Upper bound on the frame buffer allocation in bytes
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,
}

fn default_max_buffer_bytes() -> usize {
    16 * 1024 * 1024 * 1024
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            timesteps: 10,
            batch_size: 8,
            input_channels: 1,
            input_height: 376,
            input_width: 1241,
            max_buffer_bytes: default_max_buffer_bytes(),
        }
    }
}

impl DataConfig {
    /// Read configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let config: DataConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.timesteps == 0 {
            return Err(crate::VOError::Config(
                "timesteps must be > 0".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(crate::VOError::Config(
                "batch_size must be > 0".to_string(),
            ));
        }

        if ![1, 3].contains(&self.input_channels) {
            return Err(crate::VOError::Config(format!(
                "Invalid input_channels: {}. Must be 1 or 3",
                self.input_channels
            )));
        }

        if self.input_height == 0 || self.input_width == 0 {
            return Err(crate::VOError::Config(
                "input_height and input_width must be > 0".to_string(),
            ));
        }

        if self.input_height > u32::MAX as usize || self.input_width > u32::MAX as usize {
            return Err(crate::VOError::Config(format!(
                "Image size {}x{} exceeds the decoder limit",
                self.input_width, self.input_height
            )));
        }

        if self.frame_bytes().is_none() {
            return Err(crate::VOError::Config(format!(
                "Frame of {}x{}x{} overflows usize",
                self.input_channels, self.input_height, self.input_width
            )));
        }

        Ok(())
    }

    /// Number of frames in one example (rows per batch)
    pub fn frames_per_example(&self) -> usize {
        self.timesteps + 1
    }

    /// Bytes taken by one channel-first frame, `None` on overflow
    pub fn frame_bytes(&self) -> Option<usize> {
        self.input_channels
            .checked_mul(self.input_height)?
            .checked_mul(self.input_width)
    }
}
