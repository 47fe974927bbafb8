//! Typed failures of the pipeline.
//!
//! Application code transports these inside [anyhow::Error]. Use
//! `error.downcast_ref::<DatasetError>()` and friends to inspect them.

use label::LabelError;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures raised by dataset enumeration and record loading.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to access '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode image '{}'", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: tch::TchError,
    },
    #[error("failed to transform image '{}'", path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: tch::TchError,
    },
    #[error("image '{}' has {channels} channels, which cannot be converted to RGB", path.display())]
    UnsupportedChannels { path: PathBuf, channels: i64 },
    #[error("failed to parse label file '{}'", path.display())]
    LabelParse {
        path: PathBuf,
        #[source]
        source: LabelError,
    },
    #[error("index {index} is out of range, the dataset has {len} records")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("failed to collate batch {batch}")]
    Collate {
        batch: usize,
        #[source]
        source: tch::TchError,
    },
}

/// Fatal failures of a training run.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("device {device} is not available")]
    DeviceUnavailable { device: String },
    #[error("shape mismatch: expect {expect}, but found {found:?}")]
    ShapeMismatch { expect: String, found: Vec<i64> },
    #[error("the loss does not require gradient, it is not connected to the detector parameters")]
    DetachedLoss,
    #[error("the dataset is empty")]
    EmptyDataset,
}

/// Failures of a frame source.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera device {index} is not available")]
    DeviceUnavailable { index: i32 },
}
