#![allow(dead_code)]

use anyhow::Result;
use aster_dl::dataset::{DataRecord, RandomAccessDataset};
use image::{Rgb, RgbImage};
use label::LabelSet;
use std::{fmt, fs, future::Future, path::Path, pin::Pin};
use tch::{Device, Kind, Tensor};
use tempfile::TempDir;

/// Writes a solid-color PNG image.
pub fn write_png(path: &Path, width: u32, height: u32, value: u8) -> Result<()> {
    let image = RgbImage::from_pixel(width, height, Rgb([value, value, value]));
    image.save(path)?;
    Ok(())
}

/// Creates an `images/` and a `labels/` directory under a fresh temporary directory.
pub fn dataset_dirs() -> Result<(TempDir, std::path::PathBuf, std::path::PathBuf)> {
    let root = tempfile::tempdir()?;
    let image_dir = root.path().join("images");
    let label_dir = root.path().join("labels");
    fs::create_dir(&image_dir)?;
    fs::create_dir(&label_dir)?;
    Ok((root, image_dir, label_dir))
}

/// An in-memory dataset whose nth image is a `[1, 2, 2]` tensor filled with `n`.
pub struct RangeDataset {
    pub len: usize,
    /// Indexes that fail to load.
    pub failing: Vec<usize>,
}

impl RangeDataset {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            failing: vec![],
        }
    }
}

impl fmt::Debug for RangeDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeDataset").field("len", &self.len).finish()
    }
}

impl RandomAccessDataset for RangeDataset {
    fn num_records(&self) -> usize {
        self.len
    }

    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<DataRecord>> + Send>> {
        let fail = self.failing.contains(&index);
        Box::pin(async move {
            anyhow::ensure!(!fail, "record {} is broken", index);
            let image = Tensor::full(&[1, 2, 2], index as f64, (Kind::Float, Device::Cpu));
            let labels: LabelSet = LabelSet::parse_str(&format!("{} 0.5 0.5 0.1 0.1", index))?;
            Ok(DataRecord { image, labels })
        })
    }
}
