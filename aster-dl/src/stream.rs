//! Live frame sources.

use crate::{common::*, error::CaptureError};

/// The result of a single capture attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture<F> {
    Frame(F),
    /// The device reported a failure or returned no data.
    Failed,
}

/// A blocking source of frames, such as a camera device.
pub trait FrameStream
where
    Self: Sized,
{
    type Config;
    type Frame;

    /// Opens the device. The requested resolution is applied best-effort.
    fn open(config: &Self::Config) -> Result<Self, CaptureError>;

    /// Blocks until a frame is available or the device fails.
    fn next_frame(&mut self) -> Result<Capture<Self::Frame>>;

    /// Frees the device. Calling it again has no effect.
    fn release(&mut self) -> Result<()>;
}
