use super::*;
use crate::{common::*, error::DatasetError, processor::ImageTransform};

/// File extensions recognized as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// The extension of label files.
pub const LABEL_EXTENSION: &str = "txt";

/// A directory of images with a parallel directory of YOLO label files.
///
/// Images are enumerated once at load time, sorted lexicographically by file
/// name. Pixels and labels are read from disk on every access.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct LabeledImageDataset {
    image_dir: PathBuf,
    label_dir: PathBuf,
    records: Vec<Arc<FileRecord>>,
    #[derivative(Debug = "ignore")]
    transform: Option<Arc<dyn ImageTransform>>,
}

impl LabeledImageDataset {
    /// Enumerates the images in `image_dir`.
    ///
    /// * `image_dir` - The directory of image files. Sub-directories are not visited.
    /// * `label_dir` - The directory of label files, matched to images by file stem.
    /// * `transform` - The optional transform applied to decoded pixels.
    pub async fn load(
        image_dir: impl AsRef<Path>,
        label_dir: impl AsRef<Path>,
        transform: Option<Arc<dyn ImageTransform>>,
    ) -> Result<Self> {
        let image_dir = image_dir.as_ref().to_owned();
        let label_dir = label_dir.as_ref().to_owned();

        let records = {
            let image_dir = image_dir.clone();
            let label_dir = label_dir.clone();
            tokio::task::spawn_blocking(move || list_records(&image_dir, &label_dir)).await??
        };
        info!(
            "found {} images in '{}'",
            records.len(),
            image_dir.display()
        );

        Ok(Self {
            image_dir,
            label_dir,
            records,
            transform,
        })
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn label_dir(&self) -> &Path {
        &self.label_dir
    }

    /// Loads the record at `index` on the current thread.
    pub fn load_record(&self, index: usize) -> Result<DataRecord, DatasetError> {
        let record = self
            .records
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.records.len(),
            })?;
        load_record(record, self.transform.as_deref())
    }
}

impl FileDataset for LabeledImageDataset {
    fn records(&self) -> &[Arc<FileRecord>] {
        &self.records
    }
}

impl RandomAccessDataset for LabeledImageDataset {
    fn num_records(&self) -> usize {
        self.records.len()
    }

    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<DataRecord>> + Send>> {
        let len = self.records.len();
        let record = self.records.get(index).cloned();
        let transform = self.transform.clone();

        Box::pin(async move {
            let record = record.ok_or(DatasetError::IndexOutOfRange { index, len })?;
            let data =
                tokio::task::spawn_blocking(move || load_record(&record, transform.as_deref()))
                    .await??;
            Ok(data)
        })
    }
}

fn list_records(image_dir: &Path, label_dir: &Path) -> Result<Vec<Arc<FileRecord>>, DatasetError> {
    let io_err = |path: &Path| {
        let path = path.to_owned();
        move |source| DatasetError::Io { path, source }
    };

    // the label directory must exist even if no image has labels
    let label_meta = fs::metadata(label_dir).map_err(io_err(label_dir))?;
    if !label_meta.is_dir() {
        return Err(DatasetError::Io {
            path: label_dir.to_owned(),
            source: io::Error::new(io::ErrorKind::Other, "not a directory"),
        });
    }

    let mut image_files: Vec<PathBuf> = fs::read_dir(image_dir)
        .map_err(io_err(image_dir))?
        .map(|entry| -> Result<_, DatasetError> {
            let path = entry.map_err(io_err(image_dir))?.path();
            let is_file = fs::metadata(&path).map_err(io_err(&path))?.is_file();
            Ok((is_file && is_image_file(&path)).then(|| path))
        })
        .filter_map(|result| result.transpose())
        .collect::<Result<_, _>>()?;
    image_files.sort_by(|lhs, rhs| lhs.file_name().cmp(&rhs.file_name()));

    let records = image_files
        .into_iter()
        .filter_map(|image_file| {
            let mut label_name = image_file.file_stem()?.to_owned();
            label_name.push(".");
            label_name.push(LABEL_EXTENSION);
            let label_file = label_dir.join(label_name);
            Some(Arc::new(FileRecord {
                image_file,
                label_file,
            }))
        })
        .collect();

    Ok(records)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn load_record(
    record: &FileRecord,
    transform: Option<&dyn ImageTransform>,
) -> Result<DataRecord, DatasetError> {
    let FileRecord {
        image_file,
        label_file,
    } = record;

    let image = load_rgb_image(image_file)?;
    let labels = load_label_file(label_file)?;

    let image = match transform {
        Some(transform) => {
            transform
                .forward(&image)
                .map_err(|source| DatasetError::Transform {
                    path: image_file.clone(),
                    source,
                })?
        }
        None => image,
    };

    Ok(DataRecord { image, labels })
}

/// Decodes an image file into a `[3, height, width]` u8 tensor.
pub fn load_rgb_image(path: &Path) -> Result<Tensor, DatasetError> {
    let decode_err = |source| DatasetError::Decode {
        path: path.to_owned(),
        source,
    };

    let image = tch::no_grad(|| vision::image::load(path)).map_err(decode_err)?;
    let (channels, _height, _width) = image.size3().map_err(decode_err)?;

    let image = match channels {
        3 => image,
        1 => image.repeat(&[3, 1, 1]),
        4 => image.narrow(0, 0, 3),
        _ => {
            return Err(DatasetError::UnsupportedChannels {
                path: path.to_owned(),
                channels,
            })
        }
    };

    Ok(image)
}

/// Reads a label file. A missing file is an image without objects.
pub fn load_label_file(path: &Path) -> Result<LabelSet, DatasetError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LabelSet::new()),
        Err(source) => {
            return Err(DatasetError::Io {
                path: path.to_owned(),
                source,
            })
        }
    };

    LabelSet::parse_bytes(&bytes).map_err(|source| DatasetError::LabelParse {
        path: path.to_owned(),
        source,
    })
}
