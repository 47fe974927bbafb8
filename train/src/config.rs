//! Training program configuration format.

use crate::common::*;

pub use dataset::*;
pub use model::*;
pub use training::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub dataset: DatasetConfig,
    pub logging: LoggingConfig,
    pub training: TrainingConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }
}

mod model {
    use super::*;

    /// The model configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ModelConfig {
        /// The TorchScript module that provides `forward` and `loss` methods.
        pub module_file: PathBuf,
    }
}

/// Data logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    /// If set, losses are written as TensorBoard scalars.
    #[serde(default)]
    pub enable_tensorboard: bool,
}

mod dataset {
    use super::*;

    /// Dataset options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DatasetConfig {
        pub image_dir: PathBuf,
        pub label_dir: PathBuf,
        /// Images are resized to this square size.
        pub image_size: NonZeroUsize,
    }
}

mod training {
    use super::*;

    /// The training options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TrainingConfig {
        /// The batch size.
        pub batch_size: NonZeroUsize,
        /// If set, records are re-shuffled every epoch.
        #[serde(default = "default_shuffle")]
        pub shuffle: bool,
        /// The seed for shuffling. Each run gets a random seed if unset.
        pub seed: Option<u64>,
        /// The number of concurrent record loaders. Defaults to the number of CPUs.
        pub num_workers: Option<NonZeroUsize>,
        /// The number of batches loaded ahead of training.
        pub prefetch: NonZeroUsize,
        /// The learning rate of the Adam optimizer.
        pub lr: R64,
        #[serde(with = "tch_serde::serde_device")]
        pub device: Device,
        /// Checkpoint file loading method.
        pub load_checkpoint: LoadCheckpoint,
        /// If set, a checkpoint file is saved after every epoch.
        #[serde(default)]
        pub save_checkpoint: bool,
    }

    /// Checkpoint file loading method.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LoadCheckpoint {
        /// Disable checkpoint file loading.
        Disabled,
        /// Load the most recent checkpoint file.
        FromRecent,
        /// Load the checkpoint file at specified path.
        FromFile { file: PathBuf },
    }

    fn default_shuffle() -> bool {
        true
    }
}
