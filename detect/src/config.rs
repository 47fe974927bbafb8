use crate::common::*;

pub use camera::*;
pub use display::*;
pub use model::*;

/// The configuration format versions this program accepts.
pub const CONFIG_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_version")]
    pub version: Version,
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub display: DisplayConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }
}

mod camera {
    use super::*;

    /// Camera device options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct CameraConfig {
        /// The OpenCV device index.
        pub index: i32,
        /// The requested frame width. The device may ignore it.
        pub width: NonZeroUsize,
        /// The requested frame height. The device may ignore it.
        pub height: NonZeroUsize,
        /// The number of consecutive failed captures tolerated before stopping.
        #[serde(default)]
        pub max_capture_retries: usize,
    }
}

mod model {
    use super::*;

    /// Model configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ModelConfig {
        /// The TorchScript module file.
        pub module_file: PathBuf,
        /// Trained parameters loaded into the module.
        pub checkpoint_file: Option<PathBuf>,
        /// The device where the model runs on.
        #[serde(with = "tch_serde::serde_device")]
        pub device: Device,
        /// Frames are resized to this square size before inference.
        pub image_size: NonZeroUsize,
        /// Detections with lower scores are not drawn.
        pub confidence_threshold: R64,
    }
}

mod display {
    use super::*;

    /// Display window options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DisplayConfig {
        pub window_name: String,
        /// Pressing this key stops the program.
        pub cancel_key: char,
    }
}

pub fn deserialize_version<'de, D>(deserializer: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    let requirement = VersionReq::parse(CONFIG_VERSION).map_err(D::Error::custom)?;
    let text = String::deserialize(deserializer)?;
    let version = Version::parse(&text).map_err(|err| {
        D::Error::custom(format!(
            "failed to parse version number '{}': {:?}",
            text, err
        ))
    })?;

    if !requirement.matches(&version) {
        return Err(D::Error::custom(format!(
            "incompatible version: get '{}', but it is incompatible with requirement '{}'",
            version, requirement,
        )));
    }

    Ok(version)
}
