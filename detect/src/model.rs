//! Runs the scripted detector on camera frames.

use crate::{common::*, config::ModelConfig};

/// A detected box in frame pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub score: f64,
    pub class_id: i64,
}

impl Detection {
    fn to_rect(&self) -> Rect {
        let x = self.x1.round() as i32;
        let y = self.y1.round() as i32;
        let width = (self.x2 - self.x1).round().max(0.0) as i32;
        let height = (self.y2 - self.y1).round().max(0.0) as i32;
        Rect::new(x, y, width, height)
    }
}

/// Detects objects on BGR frames and draws them.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MatDetector {
    // keeps the parameters of the module alive
    #[derivative(Debug = "ignore")]
    _vs: nn::VarStore,
    detector: ScriptedDetector,
    device: Device,
    image_size: i64,
    confidence_threshold: f64,
}

impl MatDetector {
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let ModelConfig {
            ref module_file,
            ref checkpoint_file,
            device,
            image_size,
            confidence_threshold,
        } = *config;

        let mut vs = nn::VarStore::new(device);
        let detector = ScriptedDetector::load(module_file, vs.root())?;
        if let Some(checkpoint_file) = checkpoint_file {
            vs.load_partial(checkpoint_file).with_context(|| {
                format!(
                    "failed to load checkpoint '{}'",
                    checkpoint_file.display()
                )
            })?;
            info!("loaded checkpoint '{}'", checkpoint_file.display());
        }
        vs.freeze();

        Ok(Self {
            _vs: vs,
            detector,
            device,
            image_size: image_size.get() as i64,
            confidence_threshold: confidence_threshold.raw(),
        })
    }

    /// Converts a BGR frame into a `[1, 3, size, size]` float tensor in `[0, 1]`.
    fn frame_to_tensor(&self, frame: &Mat) -> Result<Tensor> {
        let size = self.image_size;

        let mut rgb = Mat::default();
        imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let mut resized = Mat::default();
        imgproc::resize(
            &rgb,
            &mut resized,
            Size::new(size as i32, size as i32),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let tensor = Tensor::of_slice(resized.data_bytes()?)
            .view([size, size, 3])
            .permute(&[2, 0, 1])
            .to_kind(Kind::Float)
            / 255.0;
        Ok(tensor.unsqueeze(0).to_device(self.device))
    }
}

impl FrameDetector<Mat> for MatDetector {
    type Predictions = Vec<Detection>;

    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>> {
        let input = self.frame_to_tensor(frame)?;
        let output = self.detector.infer(&input)?;
        let values = Vec::<f32>::from(
            &output
                .to_device(Device::Cpu)
                .to_kind(Kind::Float)
                .view([-1]),
        );

        let scale_x = frame.cols() as f64 / self.image_size as f64;
        let scale_y = frame.rows() as f64 / self.image_size as f64;
        let detections = parse_detections(&values, scale_x, scale_y, self.confidence_threshold);
        Ok(detections)
    }

    fn draw(&self, frame: &Mat, detections: &Vec<Detection>) -> Result<Mat> {
        let mut canvas = frame.try_clone()?;
        let color = Scalar::new(0.0, 255.0, 0.0, 0.0);

        for detection in detections {
            let rect = detection.to_rect();
            imgproc::rectangle(&mut canvas, rect, color, 2, imgproc::LINE_8, 0)?;

            let text = format!("{} {:.2}", detection.class_id, detection.score);
            let origin = Point::new(rect.x, (rect.y - 5).max(10));
            imgproc::put_text(
                &mut canvas,
                &text,
                origin,
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.5,
                color,
                1,
                imgproc::LINE_8,
                false,
            )?;
        }

        Ok(canvas)
    }
}

/// Parses `(x1, y1, x2, y2, score, class_id)` rows and scales boxes to the frame size.
fn parse_detections(
    values: &[f32],
    scale_x: f64,
    scale_y: f64,
    confidence_threshold: f64,
) -> Vec<Detection> {
    values
        .chunks_exact(6)
        .map(|row| {
            let [x1, y1, x2, y2, score, class_id] = [0, 1, 2, 3, 4, 5].map(|i| row[i] as f64);
            Detection {
                x1: x1 * scale_x,
                y1: y1 * scale_y,
                x2: x2 * scale_x,
                y2: y2 * scale_y,
                score,
                class_id: class_id.round() as i64,
            }
        })
        .filter(|detection| detection.score >= confidence_threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn detections_are_scaled_and_filtered() {
        let values = [
            10.0, 20.0, 30.0, 40.0, 0.9, 1.0, //
            0.0, 0.0, 5.0, 5.0, 0.1, 0.0,
        ];
        let detections = parse_detections(&values, 2.0, 0.5, 0.5);
        assert_eq!(detections.len(), 1);

        let detection = detections[0];
        assert_abs_diff_eq!(detection.x1, 20.0);
        assert_abs_diff_eq!(detection.y1, 10.0);
        assert_abs_diff_eq!(detection.x2, 60.0);
        assert_abs_diff_eq!(detection.y2, 20.0);
        assert_eq!(detection.class_id, 1);
        assert_eq!(detection.to_rect(), Rect::new(20, 10, 40, 10));
    }
}
