use crate::common::*;

/// The record with image and label paths, but without image pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRecord {
    pub image_file: PathBuf,
    /// The expected label file. It may not exist.
    pub label_file: PathBuf,
}

impl FileRecord {
    /// The file name that identifies the record.
    pub fn name(&self) -> Option<&str> {
        self.image_file.file_name()?.to_str()
    }
}

/// The record with image pixels and labels.
#[derive(Debug, TensorLike)]
pub struct DataRecord {
    pub image: Tensor,
    #[tensor_like(clone)]
    pub labels: LabelSet,
}
