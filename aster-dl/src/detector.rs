//! The seams between the pipeline and the detection model.

use crate::{common::*, loader::Batch};

/// A trainable detection model.
pub trait Detector {
    type Output;

    /// Runs the model on a batch. `train` selects training mode.
    fn forward_t(&mut self, batch: &Batch, train: bool) -> Result<Self::Output>;
}

/// Computes a scalar loss from the detector output and the batch targets.
pub trait DetectionLoss<O> {
    fn forward(&self, output: &O, batch: &Batch) -> Result<Tensor>;
}

impl<O, F> DetectionLoss<O> for F
where
    F: Fn(&O, &Batch) -> Result<Tensor>,
{
    fn forward(&self, output: &O, batch: &Batch) -> Result<Tensor> {
        self(output, batch)
    }
}

/// A gradient-based parameter updater.
pub trait Optimize {
    fn zero_grad(&mut self);
    fn step(&mut self);
}

impl Optimize for nn::Optimizer {
    fn zero_grad(&mut self) {
        nn::Optimizer::zero_grad(self)
    }

    fn step(&mut self) {
        nn::Optimizer::step(self)
    }
}

/// A detector that runs on frames of a live source.
pub trait FrameDetector<F> {
    type Predictions;

    /// Runs inference on a frame.
    fn detect(&mut self, frame: &F) -> Result<Self::Predictions>;

    /// Renders predictions over a copy of the frame.
    fn draw(&self, frame: &F, predictions: &Self::Predictions) -> Result<F>;
}
