//! TensorBoard logging of training progress.

use crate::{common::*, config::Config};
use async_std::{fs::File, io::BufWriter};

/// Writes training events as TensorBoard scalars.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct LoggingWorker {
    #[derivative(Debug = "ignore")]
    event_writer: EventWriter<BufWriter<File>>,
    rx: broadcast::Receiver<TrainingEvent>,
}

impl LoggingWorker {
    /// Create a data logging worker.
    async fn new(logging_dir: &Path, rx: broadcast::Receiver<TrainingEvent>) -> Result<Self> {
        let event_dir = logging_dir.join("events");
        let event_path_prefix = event_dir
            .join("aster-dl")
            .into_os_string()
            .into_string()
            .map_err(|path| format_err!("non-UTF-8 logging path {:?}", path))?;

        tokio::fs::create_dir_all(&event_dir).await?;

        let event_writer = EventWriterInit::default()
            .from_prefix_async(event_path_prefix, None)
            .await?;

        Ok(Self { event_writer, rx })
    }

    /// Start the data logging worker.
    async fn start(mut self) -> Result<()> {
        loop {
            let event = match self.rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(num_skipped)) => {
                    warn!("logging worker skipped {} events", num_skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TrainingEvent::Batch(progress) => {
                    let step = progress.epoch * progress.num_batches + progress.batch_index;
                    self.event_writer
                        .write_scalar_async("train/loss", step as i64, progress.loss as f32)
                        .await?;
                }
                TrainingEvent::Epoch(summary) => {
                    self.event_writer
                        .write_scalar_async(
                            "train/average_loss",
                            summary.epoch as i64,
                            summary.average_loss as f32,
                        )
                        .await?;
                }
            }
        }

        Ok(())
    }
}

/// Spawn the logging worker if TensorBoard logging is enabled.
///
/// The returned future finishes when every event sender is dropped.
pub async fn logging_worker(
    config: &Config,
    logging_dir: &Path,
    rx: broadcast::Receiver<TrainingEvent>,
) -> Result<impl Future<Output = Result<()>> + Send> {
    let worker = if config.logging.enable_tensorboard {
        Some(LoggingWorker::new(logging_dir, rx).await?)
    } else {
        None
    };

    let future = async move {
        if let Some(worker) = worker {
            tokio::task::spawn(worker.start()).await??;
        }
        Fallible::Ok(())
    };
    Ok(future)
}
