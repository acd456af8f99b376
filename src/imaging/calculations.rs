//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{RelativeResize, ResizeMethod};

/// Output dimensions of a relative resize.
///
/// Widen and heighten scale both edges by the ratio of the requested edge to
/// the current one. Edges are rounded and never drop below one pixel.
///
/// # Examples
/// ```
/// # use adaptive_images::imaging::{RelativeResize, relative_dimensions};
/// assert_eq!(relative_dimensions((2000, 1500), RelativeResize::widen(400)), (400, 300));
/// ```
pub fn relative_dimensions(original: (u32, u32), resize: RelativeResize) -> (u32, u32) {
    let (w, h) = (f64::from(original.0), f64::from(original.1));

    let (out_w, out_h) = match resize.method {
        ResizeMethod::Widen => {
            let ratio = if w > 0.0 { resize.value / w } else { 0.0 };
            (resize.value, h * ratio)
        }
        ResizeMethod::Heighten => {
            let ratio = if h > 0.0 { resize.value / h } else { 0.0 };
            (w * ratio, resize.value)
        }
        ResizeMethod::Increase => (w + resize.value, h + resize.value),
        ResizeMethod::Scale => (w * resize.value, h * resize.value),
    };

    (to_edge(out_w), to_edge(out_h))
}

fn to_edge(value: f64) -> u32 {
    value.round().clamp(1.0, f64::from(u32::MAX)) as u32
}
