//! High-level image operations.
//!
//! These functions combine calculations with backend execution.

use super::backend::{BackendError, ImageBackend};
use super::calculations::relative_dimensions;
use super::params::RelativeResize;
use image::DynamicImage;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Target `(width, height)` of a relative resize without touching pixels.
pub fn plan_relative_resize(image: &DynamicImage, resize: RelativeResize) -> (u32, u32) {
    relative_dimensions((image.width(), image.height()), resize)
}

/// Apply a relative resize through the backend.
pub fn apply_relative_resize(
    backend: &impl ImageBackend,
    image: &DynamicImage,
    resize: RelativeResize,
) -> Result<DynamicImage> {
    let (width, height) = plan_relative_resize(image, resize);
    backend.resize(image, width, height)
}
