//! The capture, detect and display cycle of the live viewer.

use crate::{
    common::*,
    detector::FrameDetector,
    error::CaptureError,
    stream::{Capture, FrameStream},
};

/// A window or any other consumer of annotated frames.
pub trait DisplaySink<F> {
    fn show(&mut self, frame: &F) -> Result<()>;

    /// Returns the key pressed since the last poll, if any.
    fn poll_key(&mut self) -> Result<Option<char>>;

    /// Closes the display. Calling it again has no effect.
    fn close(&mut self) -> Result<()>;
}

/// The reason an inference loop stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The frame source failed to deliver a frame.
    StreamEnded,
    /// The cancel key was pressed.
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamEnded => write!(f, "the frame stream ended"),
            Self::Cancelled => write!(f, "cancelled by user"),
        }
    }
}

/// Feeds frames from a stream through a detector into a display sink.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct InferenceLoop<S, D, K> {
    #[derivative(Debug = "ignore")]
    stream: S,
    #[derivative(Debug = "ignore")]
    detector: D,
    #[derivative(Debug = "ignore")]
    sink: K,
    cancel_key: char,
    max_capture_retries: usize,
}

impl<S, D, K> InferenceLoop<S, D, K>
where
    S: FrameStream,
    D: FrameDetector<S::Frame>,
    K: DisplaySink<S::Frame>,
{
    pub fn new(stream: S, detector: D, sink: K, cancel_key: char) -> Self {
        Self {
            stream,
            detector,
            sink,
            cancel_key,
            max_capture_retries: 0,
        }
    }

    /// Opens the frame stream and builds the loop.
    ///
    /// The detector and sink are dropped unused if the stream cannot be opened.
    pub fn open(
        config: &S::Config,
        detector: D,
        sink: K,
        cancel_key: char,
    ) -> Result<Self, CaptureError> {
        let stream = S::open(config)?;
        Ok(Self::new(stream, detector, sink, cancel_key))
    }

    /// Sets the number of consecutive failed captures tolerated before the
    /// stream is considered ended.
    pub fn max_capture_retries(mut self, retries: usize) -> Self {
        self.max_capture_retries = retries;
        self
    }

    /// Runs until the stream ends, the cancel key is pressed or an error occurs.
    ///
    /// The stream is released and the display closed on every exit path.
    pub fn run(mut self) -> Result<Termination> {
        let result = self.run_cycles();

        let release_result = self
            .stream
            .release()
            .context("failed to release the frame stream");
        let close_result = self.sink.close().context("failed to close the display");

        match result {
            Ok(termination) => {
                release_result?;
                close_result?;
                info!("inference stopped: {}", termination);
                Ok(termination)
            }
            Err(err) => {
                for cleanup_err in [release_result, close_result]
                    .into_iter()
                    .filter_map(|result| result.err())
                {
                    warn!("{:#}", cleanup_err);
                }
                Err(err)
            }
        }
    }

    fn run_cycles(&mut self) -> Result<Termination> {
        let mut num_failures = 0;
        let mut num_frames: usize = 0;

        loop {
            let frame = match self.stream.next_frame()? {
                Capture::Frame(frame) => {
                    num_failures = 0;
                    frame
                }
                Capture::Failed => {
                    num_failures += 1;
                    if num_failures > self.max_capture_retries {
                        warn!("failed to capture frame after {} frames", num_frames);
                        return Ok(Termination::StreamEnded);
                    }
                    warn!(
                        "failed to capture frame, retry {}/{}",
                        num_failures, self.max_capture_retries
                    );
                    continue;
                }
            };

            let predictions = self
                .detector
                .detect(&frame)
                .with_context(|| format!("detection failed on frame {}", num_frames))?;
            let annotated = self.detector.draw(&frame, &predictions)?;
            self.sink.show(&annotated)?;
            num_frames += 1;

            if self.sink.poll_key()? == Some(self.cancel_key) {
                return Ok(Termination::Cancelled);
            }
        }
    }
}
