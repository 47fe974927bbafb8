//! TorchScript detector adapter.

use crate::{
    common::*,
    detector::{DetectionLoss, Detector},
    error::TrainingError,
    loader::Batch,
};
use tch::{CModule, TrainableCModule};

/// The name of the loss method the scripted module exports.
pub const LOSS_METHOD: &str = "loss";

/// A detector loaded from a TorchScript module file.
///
/// The parameters are registered in the [nn::VarStore] of the `path` given to
/// [ScriptedDetector::load], so they can be optimized and checkpointed.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ScriptedDetector {
    module_file: PathBuf,
    #[derivative(Debug = "ignore")]
    module: TrainableCModule,
}

/// The output of a training forward pass.
#[derive(Debug)]
pub struct ScriptedOutput {
    pub predictions: Tensor,
    pub loss: Tensor,
}

impl ScriptedDetector {
    pub fn load(module_file: impl AsRef<Path>, path: nn::Path) -> Result<Self> {
        let module_file = module_file.as_ref().to_owned();
        let module = TrainableCModule::load(&module_file, path).with_context(|| {
            format!(
                "failed to load TorchScript module '{}'",
                module_file.display()
            )
        })?;
        info!("loaded detector module '{}'", module_file.display());

        Ok(Self {
            module_file,
            module,
        })
    }

    pub fn module_file(&self) -> &Path {
        &self.module_file
    }

    fn scripted(&self) -> &CModule {
        &self.module.inner
    }

    /// Runs inference on a `[batch, 3, height, width]` image tensor.
    ///
    /// The module returns one `(x1, y1, x2, y2, score, class_id)` row per detection.
    pub fn infer(&mut self, images: &Tensor) -> Result<Tensor> {
        self.module.set_eval();
        let detections = tch::no_grad(|| self.scripted().forward_ts(&[images]))?;

        match detections.size().as_slice() {
            [_, 6] => Ok(detections),
            _ => Err(TrainingError::ShapeMismatch {
                expect: "[num_detections, 6]".into(),
                found: detections.size(),
            }
            .into()),
        }
    }
}

impl Detector for ScriptedDetector {
    type Output = ScriptedOutput;

    fn forward_t(&mut self, batch: &Batch, train: bool) -> Result<Self::Output> {
        if train {
            self.module.set_train();
        } else {
            self.module.set_eval();
        }

        let predictions = self.scripted().forward_ts(&[&batch.images])?;
        let loss = self
            .scripted()
            .method_ts(LOSS_METHOD, &[&predictions, &batch.targets])
            .with_context(|| format!("the module does not provide a '{}' method", LOSS_METHOD))?;

        Ok(ScriptedOutput { predictions, loss })
    }
}

/// Takes the loss computed inside the scripted module.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedLoss;

impl DetectionLoss<ScriptedOutput> for ScriptedLoss {
    fn forward(&self, output: &ScriptedOutput, _batch: &Batch) -> Result<Tensor> {
        Ok(output.loss.shallow_clone())
    }
}
