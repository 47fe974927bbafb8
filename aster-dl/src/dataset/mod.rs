//! Dataset processing toolkit.

mod dataset_;
mod labeled_image;
mod record;

pub use dataset_::*;
pub use labeled_image::*;
pub use record::*;
