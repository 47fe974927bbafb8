//! The epoch and batch control flow of a training run.

use crate::{
    common::*,
    detector::{DetectionLoss, Detector, Optimize},
    error::TrainingError,
    loader::{Batch, BatchLoader},
};
use tokio::sync::broadcast;

/// Progress of the training loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Idle,
    Running { epoch: usize, batch: usize },
    EpochComplete { epoch: usize },
    Finished,
    Failed,
}

/// The loss of a finished batch. Indexes are 0-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    pub epoch: usize,
    pub num_epochs: usize,
    pub batch_index: usize,
    pub num_batches: usize,
    /// The number of records in the batch.
    pub batch_size: usize,
    pub loss: f64,
}

/// The average loss of a finished epoch. The epoch index is 0-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub num_epochs: usize,
    pub num_batches: usize,
    pub average_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainingEvent {
    Batch(BatchProgress),
    Epoch(EpochSummary),
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch [{}/{}], Batch [{}/{}], Loss: {:.4}",
            self.epoch + 1,
            self.num_epochs,
            self.batch_index + 1,
            self.num_batches,
            self.loss
        )
    }
}

impl fmt::Display for EpochSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch [{}/{}], Average Loss: {:.4}",
            self.epoch + 1,
            self.num_epochs,
            self.average_loss
        )
    }
}

impl fmt::Display for TrainingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch(progress) => progress.fmt(f),
            Self::Epoch(summary) => summary.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct EpochStats {
    running_loss: f64,
    num_batches: usize,
}

impl EpochStats {
    fn average_loss(&self) -> f64 {
        self.running_loss / self.num_batches as f64
    }
}

/// A callback invoked after every epoch.
pub type EpochHook = Box<dyn FnMut(&EpochSummary) -> Result<()> + Send>;

/// Runs a fixed number of passes over a [BatchLoader].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TrainingLoop<M, L, O> {
    #[derivative(Debug = "ignore")]
    detector: M,
    loader: BatchLoader,
    #[derivative(Debug = "ignore")]
    optimizer: O,
    #[derivative(Debug = "ignore")]
    loss_fn: L,
    device: Device,
    num_epochs: usize,
    state: TrainingState,
    #[derivative(Debug = "ignore")]
    events: Option<broadcast::Sender<TrainingEvent>>,
    #[derivative(Debug = "ignore")]
    epoch_hook: Option<EpochHook>,
}

impl<M, L, O> TrainingLoop<M, L, O>
where
    M: Detector,
    L: DetectionLoss<M::Output>,
    O: Optimize,
{
    pub fn new(
        detector: M,
        loader: BatchLoader,
        optimizer: O,
        loss_fn: L,
        device: Device,
        num_epochs: usize,
    ) -> Self {
        Self {
            detector,
            loader,
            optimizer,
            loss_fn,
            device,
            num_epochs,
            state: TrainingState::Idle,
            events: None,
            epoch_hook: None,
        }
    }

    /// Publishes progress events on a broadcast channel.
    pub fn with_events(mut self, tx: broadcast::Sender<TrainingEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Calls `hook` after every epoch. An error from the hook aborts the run.
    pub fn with_epoch_hook<F>(mut self, hook: F) -> Self
    where
        F: 'static + FnMut(&EpochSummary) -> Result<()> + Send,
    {
        self.epoch_hook = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn detector(&self) -> &M {
        &self.detector
    }

    pub fn into_detector(self) -> M {
        self.detector
    }

    /// Runs all epochs and returns their summaries.
    pub async fn run(&mut self) -> Result<Vec<EpochSummary>> {
        let result = self.run_epochs().await;
        self.state = match result {
            Ok(_) => TrainingState::Finished,
            Err(_) => TrainingState::Failed,
        };
        result
    }

    async fn run_epochs(&mut self) -> Result<Vec<EpochSummary>> {
        if self.loader.num_batches() == 0 {
            return Err(TrainingError::EmptyDataset.into());
        }

        let mut summaries = Vec::with_capacity(self.num_epochs);
        for epoch in 0..self.num_epochs {
            let summary = self.run_epoch(epoch).await?;
            self.state = TrainingState::EpochComplete { epoch };

            if let Some(hook) = &mut self.epoch_hook {
                hook(&summary)
                    .with_context(|| format!("epoch hook failed after epoch {}", epoch))?;
            }
            summaries.push(summary);
        }

        Ok(summaries)
    }

    async fn run_epoch(&mut self, epoch: usize) -> Result<EpochSummary> {
        let num_batches = self.loader.num_batches();
        let mut stats = EpochStats::default();
        let mut batches = self.loader.epoch_stream();

        while let Some(batch) = batches.next().await {
            let batch_index = stats.num_batches;
            self.state = TrainingState::Running {
                epoch,
                batch: batch_index,
            };

            let batch_size = batch
                .as_ref()
                .map(|batch| batch.len())
                .unwrap_or_default();
            let loss = batch
                .and_then(|batch| self.train_step(&batch))
                .with_context(|| {
                    format!(
                        "training failed at epoch {}, batch {}",
                        epoch, batch_index
                    )
                })?;

            stats.running_loss += loss;
            stats.num_batches += 1;

            self.emit(TrainingEvent::Batch(BatchProgress {
                epoch,
                num_epochs: self.num_epochs,
                batch_index,
                num_batches,
                batch_size,
                loss,
            }));
        }

        let summary = EpochSummary {
            epoch,
            num_epochs: self.num_epochs,
            num_batches: stats.num_batches,
            average_loss: stats.average_loss(),
        };
        self.emit(TrainingEvent::Epoch(summary));

        Ok(summary)
    }

    fn train_step(&mut self, batch: &Batch) -> Result<f64> {
        let batch = batch.try_to_device(self.device)?;

        self.optimizer.zero_grad();
        let output = self.detector.forward_t(&batch, true)?;
        let loss = self.loss_fn.forward(&output, &batch)?;

        if loss.numel() != 1 {
            return Err(TrainingError::ShapeMismatch {
                expect: "a single-element loss".into(),
                found: loss.size(),
            }
            .into());
        }
        if !loss.requires_grad() {
            return Err(TrainingError::DetachedLoss.into());
        }

        let loss_value = loss.f_double_value(&[])?;
        loss.backward();
        self.optimizer.step();

        Ok(loss_value)
    }

    fn emit(&self, event: TrainingEvent) {
        info!("{}", event);
        if let Some(tx) = &self.events {
            // no subscriber is not an error
            let _ = tx.send(event);
        }
    }
}
