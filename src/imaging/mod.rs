//! Image processing: pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Relative resize** | widen / heighten / increase / scale → `resize_exact` (Lanczos3) |
//! | **Encode** | JPEG, PNG, WebP, AVIF, TIFF encoders from the `image` crate |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::relative_dimensions;
pub use operations::{apply_relative_resize, plan_relative_resize};
pub use params::{OutputFormat, Quality, RelativeResize, ResizeMethod};
pub use rust_backend::RustBackend;
