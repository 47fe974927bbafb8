//! Camera frame source backed by OpenCV.

use crate::{common::*, config::CameraConfig};

/// A camera device opened through `VideoCapture`.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CameraStream {
    index: i32,
    #[derivative(Debug = "ignore")]
    capture: VideoCapture,
    released: bool,
}

impl CameraStream {
    pub fn index(&self) -> i32 {
        self.index
    }
}

impl FrameStream for CameraStream {
    type Config = CameraConfig;
    type Frame = Mat;

    fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let CameraConfig {
            index,
            width,
            height,
            ..
        } = *config;
        let unavailable = |err: opencv::Error| {
            warn!("failed to open camera {}: {}", index, err);
            CaptureError::DeviceUnavailable { index }
        };

        let mut capture = VideoCapture::new(index, videoio::CAP_ANY).map_err(unavailable)?;
        if !capture.is_opened().map_err(unavailable)? {
            return Err(CaptureError::DeviceUnavailable { index });
        }

        // the device may not support the requested resolution
        let width_ok = capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, width.get() as f64)
            .unwrap_or(false);
        let height_ok = capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, height.get() as f64)
            .unwrap_or(false);
        if !(width_ok && height_ok) {
            warn!(
                "camera {} does not accept resolution {}x{}",
                index, width, height
            );
        }
        info!("opened camera {}", index);

        Ok(Self {
            index,
            capture,
            released: false,
        })
    }

    fn next_frame(&mut self) -> Result<Capture<Mat>> {
        ensure!(!self.released, "camera {} is released", self.index);

        let mut frame = Mat::default();
        let read = self.capture.read(&mut frame);
        Ok(to_capture(self.index, read, frame))
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.capture.release()?;
            self.released = true;
            info!("released camera {}", self.index);
        }
        Ok(())
    }
}

/// A read error, a `false` status or an empty image all count as a failed capture.
fn to_capture(index: i32, read: opencv::Result<bool>, frame: Mat) -> Capture<Mat> {
    match read {
        Ok(true) if frame.rows() > 0 && frame.cols() > 0 => Capture::Frame(frame),
        Ok(_) => Capture::Failed,
        Err(err) => {
            warn!("camera {} failed to read a frame: {}", index, err);
            Capture::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{StsError, CV_8UC3};

    #[test]
    fn read_errors_are_failed_captures() -> Result<()> {
        let frame = Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::all(0.0))?;
        let err = opencv::Error::new(StsError, "backend failure".to_string());
        assert!(matches!(
            to_capture(0, Err(err), frame.try_clone()?),
            Capture::Failed
        ));
        assert!(matches!(
            to_capture(0, Ok(false), frame.try_clone()?),
            Capture::Failed
        ));
        assert!(matches!(
            to_capture(0, Ok(true), Mat::default()),
            Capture::Failed
        ));
        assert!(matches!(to_capture(0, Ok(true), frame), Capture::Frame(_)));
        Ok(())
    }

    #[test]
    fn missing_device_is_unavailable() {
        match CameraStream::open(&CameraConfig {
            index: 97,
            width: NonZeroUsize::new(640).unwrap(),
            height: NonZeroUsize::new(480).unwrap(),
            max_capture_retries: 0,
        }) {
            Err(CaptureError::DeviceUnavailable { index }) => assert_eq!(index, 97),
            Err(err) => panic!("unexpected error {:?}", err),
            Ok(_) => panic!("camera 97 is not expected to exist"),
        }
    }
}
