//! Image transforms applied to decoded pixels.

use crate::common::*;
use tch::TchError;

/// A deterministic transform on a single image tensor.
pub trait ImageTransform
where
    Self: Send + Sync,
{
    fn forward(&self, image: &Tensor) -> Result<Tensor, TchError>;
}

/// Resize a `[channels, height, width]` u8 image to an exact size.
///
/// The aspect ratio is not preserved, so ratio-unit labels stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    pub height: i64,
    pub width: i64,
}

impl Resize {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height: height as i64,
            width: width as i64,
        }
    }

    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }
}

impl ImageTransform for Resize {
    fn forward(&self, image: &Tensor) -> Result<Tensor, TchError> {
        let Self { height, width } = *self;
        let (_c, orig_h, orig_w) = image.size3()?;
        if (orig_h, orig_w) == (height, width) {
            return Ok(image.shallow_clone());
        }
        tch::no_grad(|| vision::image::resize(image, width, height))
    }
}

/// Convert u8 pixels to f32 in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalize;

impl ImageTransform for Normalize {
    fn forward(&self, image: &Tensor) -> Result<Tensor, TchError> {
        let image = image.f_to_kind(Kind::Float)? / 255.0;
        Ok(image.set_requires_grad(false))
    }
}

/// Apply transforms in sequence.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct Compose {
    #[derivative(Debug = "ignore")]
    transforms: Vec<Box<dyn ImageTransform>>,
}

impl Compose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<T>(mut self, transform: T) -> Self
    where
        T: 'static + ImageTransform,
    {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl ImageTransform for Compose {
    fn forward(&self, image: &Tensor) -> Result<Tensor, TchError> {
        self.transforms
            .iter()
            .try_fold(image.shallow_clone(), |image, transform| {
                transform.forward(&image)
            })
    }
}

/// Resize to a square image and scale pixels to `[0, 1]`.
pub fn default_transform(image_size: usize) -> Arc<dyn ImageTransform> {
    Arc::new(Compose::new().then(Resize::square(image_size)).then(Normalize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_and_normalize() -> Result<()> {
        let image = Tensor::full(&[3, 40, 60], 255i64, (Kind::Uint8, Device::Cpu));
        let transform = default_transform(32);
        let output = transform.forward(&image)?;

        assert_eq!(output.size(), vec![3, 32, 32]);
        assert_eq!(output.kind(), Kind::Float);
        let max = output.max().double_value(&[]);
        let min = output.min().double_value(&[]);
        assert!((max - 1.0).abs() < 1e-6);
        assert!((min - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn empty_compose_is_identity() -> Result<()> {
        let image = Tensor::zeros(&[3, 4, 5], (Kind::Uint8, Device::Cpu));
        let output = Compose::new().forward(&image)?;
        assert_eq!(output.size(), vec![3, 4, 5]);
        assert_eq!(output.kind(), Kind::Uint8);
        Ok(())
    }
}
