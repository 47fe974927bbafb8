pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use aster_dl::{
    detector::FrameDetector,
    error::CaptureError,
    inference::{DisplaySink, InferenceLoop, Termination},
    model::ScriptedDetector,
    stream::{Capture, FrameStream},
};
pub use derivative::Derivative;
pub use noisy_float::prelude::*;
pub use opencv::{
    core::{Mat, Point, Rect, Scalar, Size},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
pub use semver::{Version, VersionReq};
pub use serde::{de::Error as DeserializeError, Deserialize, Deserializer, Serialize};
pub use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
pub use tch::{nn, Device, Kind, Tensor};
pub use tracing::{error, info, warn};
