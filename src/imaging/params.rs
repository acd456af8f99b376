//! Parameter types for image operations.
//!
//! These describe *what* to do. [`operations`](super::operations) turns them
//! into concrete pixel dimensions and the [`backend`](super::backend) does the
//! pixel work.
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90), clamped on construction.
//! - [`ResizeMethod`] / [`RelativeResize`]: a resize expressed relative to the source box.
//! - [`OutputFormat`]: encoder selected for the cached variant.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// How a [`RelativeResize`] derives the output box from the source box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    /// Set the width, keep the aspect ratio.
    Widen,
    /// Set the height, keep the aspect ratio.
    Heighten,
    /// Add the value to both edges.
    Increase,
    /// Multiply both edges by the value.
    Scale,
}

/// A resize relative to the source dimensions, e.g. `widen 400`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelativeResize {
    pub method: ResizeMethod,
    pub value: f64,
}

impl RelativeResize {
    pub fn widen(width: u32) -> Self {
        Self {
            method: ResizeMethod::Widen,
            value: f64::from(width),
        }
    }

    pub fn heighten(height: u32) -> Self {
        Self {
            method: ResizeMethod::Heighten,
            value: f64::from(height),
        }
    }
}

/// Encoder for a cached variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Tiff,
}

impl OutputFormat {
    /// Encoder for a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Tiff => "image/tiff",
        }
    }
}
