//! Batching and shuffling of dataset records.

use crate::{
    common::*,
    dataset::{DataRecord, RandomAccessDataset},
    error::{DatasetError, TrainingError},
};

/// The number of values in a row of [Batch::targets].
pub const TARGET_WIDTH: i64 = 6;

/// A collated group of records.
#[derive(Debug, TensorLike)]
pub struct Batch {
    /// The position of the batch in its epoch.
    pub index: usize,
    /// The dataset indexes of the records, in batch order.
    #[tensor_like(clone)]
    pub indexes: Vec<usize>,
    /// The stacked images with shape `[batch, channels, height, width]`.
    pub images: Tensor,
    /// The labels of each image.
    #[tensor_like(clone)]
    pub labels: Vec<LabelSet>,
    /// The labels flattened into a `[num_labels, 6]` f32 tensor.
    ///
    /// Each row is `(batch_index, class_id, x_center, y_center, width, height)`.
    pub targets: Tensor,
}

impl Batch {
    /// Stacks records into a batch.
    pub fn collate(index: usize, indexes: Vec<usize>, records: Vec<DataRecord>) -> Result<Self> {
        ensure!(
            indexes.len() == records.len(),
            "expect {} records, but get {}",
            indexes.len(),
            records.len()
        );

        let (images, labels): (Vec<_>, Vec<_>) = records
            .into_iter()
            .map(|DataRecord { image, labels }| (image, labels))
            .unzip();
        let images = Tensor::f_stack(&images, 0)
            .map_err(|source| DatasetError::Collate {
                batch: index,
                source,
            })?
            .set_requires_grad(false);
        let targets = targets_tensor(&labels);

        Ok(Self {
            index,
            indexes,
            images,
            labels,
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Moves the tensors to `device`, failing if the device cannot be used.
    pub fn try_to_device(&self, device: Device) -> Result<Self> {
        ensure_device_available(device)?;
        Ok(self.to_device(device))
    }
}

fn targets_tensor(labels: &[LabelSet]) -> Tensor {
    let values: Vec<f32> = labels
        .iter()
        .enumerate()
        .flat_map(|(batch_index, labels)| {
            labels.iter().flat_map(move |label| {
                let [class_id, cx, cy, w, h] = label.to_array();
                [batch_index as f64, class_id, cx, cy, w, h].map(|value| value as f32)
            })
        })
        .collect();
    let num_labels = values.len() as i64 / TARGET_WIDTH;
    Tensor::of_slice(&values)
        .view([num_labels, TARGET_WIDTH])
        .set_requires_grad(false)
}

/// Checks that tensors can be moved to `device`.
pub fn ensure_device_available(device: Device) -> Result<(), TrainingError> {
    if let Device::Cuda(index) = device {
        // a negative count means no usable device
        let count = usize::try_from(tch::Cuda::device_count()).unwrap_or(0);
        if !tch::Cuda::is_available() || index >= count {
            return Err(TrainingError::DeviceUnavailable {
                device: format!("{:?}", device),
            });
        }
    }
    Ok(())
}

/// Batch loader options.
#[derive(Debug, Clone)]
pub struct BatchLoaderInit {
    pub batch_size: usize,
    /// If set, the record order is re-shuffled on every epoch.
    pub shuffle: bool,
    /// The seed of the shuffling generator. It is seeded from entropy if unset.
    pub seed: Option<u64>,
    /// The maximum number of records loaded concurrently. It defaults to the number of CPUs.
    pub num_workers: Option<usize>,
    /// The number of batches loaded ahead of the consumer.
    pub prefetch: usize,
}

impl Default for BatchLoaderInit {
    fn default() -> Self {
        Self {
            batch_size: 16,
            shuffle: true,
            seed: None,
            num_workers: None,
            prefetch: 2,
        }
    }
}

impl BatchLoaderInit {
    pub fn build(self, dataset: Arc<dyn RandomAccessDataset>) -> Result<BatchLoader> {
        let Self {
            batch_size,
            shuffle,
            seed,
            num_workers,
            prefetch,
        } = self;

        ensure!(batch_size > 0, "batch_size must be positive");
        ensure!(prefetch > 0, "prefetch must be positive");

        let num_workers = match num_workers {
            Some(num_workers) => {
                ensure!(num_workers > 0, "num_workers must be positive");
                num_workers
            }
            None => num_cpus::get(),
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(BatchLoader {
            dataset,
            batch_size,
            shuffle,
            num_workers,
            prefetch,
            rng,
        })
    }
}

/// Groups dataset records into batches, one pass at a time.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct BatchLoader {
    dataset: Arc<dyn RandomAccessDataset>,
    batch_size: usize,
    shuffle: bool,
    num_workers: usize,
    prefetch: usize,
    #[derivative(Debug = "ignore")]
    rng: StdRng,
}

impl BatchLoader {
    pub fn dataset(&self) -> &Arc<dyn RandomAccessDataset> {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_records(&self) -> usize {
        self.dataset.num_records()
    }

    /// The number of batches in one pass. The last batch may be short.
    pub fn num_batches(&self) -> usize {
        let num_records = self.num_records();
        num_records / self.batch_size + usize::from(num_records % self.batch_size != 0)
    }

    /// Draws the record indexes of each batch for the next pass.
    pub fn plan_epoch(&mut self) -> Vec<Vec<usize>> {
        let mut indexes: Vec<usize> = (0..self.num_records()).collect();
        if self.shuffle {
            indexes.shuffle(&mut self.rng);
        }
        indexes
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Starts a new pass over the dataset.
    ///
    /// Records in a batch are loaded concurrently, but the batch keeps the
    /// planned record order regardless of which load finishes first.
    pub fn epoch_stream(&mut self) -> BoxStream<'static, Result<Batch>> {
        let plan = self.plan_epoch();
        let dataset = self.dataset.clone();
        let num_workers = self.num_workers;

        stream::iter(plan.into_iter().enumerate())
            .map(move |(batch_index, indexes)| {
                let dataset = dataset.clone();

                async move {
                    let mut records: Vec<(usize, DataRecord)> =
                        stream::iter(indexes.clone().into_iter().enumerate())
                            .par_then_unordered(num_workers, move |(position, index)| {
                                let record = dataset.nth(index);
                                async move {
                                    let record = record.await.with_context(|| {
                                        format!("failed to load record {}", index)
                                    })?;
                                    Fallible::Ok((position, record))
                                }
                            })
                            .try_collect()
                            .await?;
                    records.sort_by_key(|(position, _)| *position);
                    let records = records.into_iter().map(|(_, record)| record).collect();

                    debug!("loaded batch {} with {} records", batch_index, indexes.len());
                    Batch::collate(batch_index, indexes, records)
                }
            })
            .buffered(self.prefetch)
            .boxed()
    }
}
