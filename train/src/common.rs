//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use aster_dl::{
    dataset::LabeledImageDataset,
    loader::BatchLoaderInit,
    model::{ScriptedDetector, ScriptedLoss},
    processor::default_transform,
    training::{EpochSummary, TrainingEvent, TrainingLoop},
};
pub use chrono::{DateTime, Local};
pub use derivative::Derivative;
pub use futures::future::FutureExt;
pub use noisy_float::prelude::*;
pub use regex::Regex;
pub use serde::{Deserialize, Serialize};
pub use std::{
    future::Future,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};
pub use tch::{
    nn::{self, OptimizerConfig as _},
    Device,
};
pub use tfrecord::{EventWriter, EventWriterInit};
pub use tokio::sync::broadcast;
pub use tracing::{info, warn};

pub type Fallible<T> = Result<T, Error>;
