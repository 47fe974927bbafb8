//! The live camera viewer for the aster-dl project.

pub mod camera;
mod common;
pub mod config;
pub mod display;
pub mod model;

use crate::{
    camera::CameraStream, common::*, config::Config, display::WindowSink, model::MatDetector,
};

/// How the viewer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished(Termination),
    /// The camera could not be opened.
    DeviceUnavailable { index: i32 },
}

/// Runs the viewer until the stream ends or the cancel key is pressed.
pub fn start(config: &Config) -> Result<Outcome> {
    let detector = MatDetector::load(&config.model)?;
    let sink = WindowSink::new(&config.display.window_name);

    let opened = InferenceLoop::<CameraStream, _, _>::open(
        &config.camera,
        detector,
        sink,
        config.display.cancel_key,
    );
    let inference = match opened {
        Ok(inference) => inference,
        Err(CaptureError::DeviceUnavailable { index }) => {
            return Ok(Outcome::DeviceUnavailable { index })
        }
        Err(err) => return Err(err.into()),
    };

    let termination = inference
        .max_capture_retries(config.camera.max_capture_retries)
        .run()?;
    Ok(Outcome::Finished(termination))
}
