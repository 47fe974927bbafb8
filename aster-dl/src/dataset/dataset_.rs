use super::*;
use crate::common::*;

/// The dataset with a list of image paths.
pub trait FileDataset
where
    Self: Debug + Send + Sync,
{
    /// Get the list of records in enumeration order.
    fn records(&self) -> &[Arc<FileRecord>];
}

/// The dataset that can be random accessed.
pub trait RandomAccessDataset
where
    Self: Debug + Send + Sync,
{
    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the nth record in the dataset.
    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<DataRecord>> + Send>>;
}
