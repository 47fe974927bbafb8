//! Data pipeline and run loops for training and serving an object detector.
//!
//! The crate covers the parts around a detection model: the labeled image
//! dataset, the batch loader, the training loop, and the live inference loop.
//! The model itself is an external collaborator reached through the traits in
//! [detector].

mod common;
pub mod dataset;
pub mod detector;
pub mod error;
pub mod inference;
pub mod loader;
pub mod model;
pub mod processor;
pub mod stream;
pub mod training;
