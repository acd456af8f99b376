//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations a variant needs:
//! decode the source, resize it, encode the result. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend); tests
//! use the recording mock below.

use super::params::{OutputFormat, Quality};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// Backends are shared between request workers, hence `Sync`.
pub trait ImageBackend: Sync {
    /// Decode an image from disk.
    fn open(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Resize to exact dimensions.
    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, BackendError>;

    /// Encode into an in-memory buffer.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock backend that records operations without doing pixel work.
    /// Uses Mutex (not RefCell) so it is Sync and works across request workers.
    #[derive(Default)]
    pub struct MockBackend {
        pub source_dimensions: Mutex<Option<(u32, u32)>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Open(String),
        Resize { width: u32, height: u32 },
        Encode { format: OutputFormat, quality: u32 },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                source_dimensions: Mutex::new(Some((width, height))),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn open(&self, path: &Path) -> Result<DynamicImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Open(path.to_string_lossy().to_string()));

            let (width, height) = self.source_dimensions.lock().unwrap().unwrap_or((800, 600));
            Ok(DynamicImage::new_rgb8(width, height))
        }

        fn resize(
            &self,
            _image: &DynamicImage,
            width: u32,
            height: u32,
        ) -> Result<DynamicImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Resize { width, height });
            Ok(DynamicImage::new_rgb8(width, height))
        }

        fn encode(
            &self,
            image: &DynamicImage,
            format: OutputFormat,
            quality: Quality,
        ) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                format,
                quality: quality.value(),
            });
            Ok(format!("{}x{}", image.width(), image.height()).into_bytes())
        }
    }

    #[test]
    fn mock_open_uses_configured_dimensions() {
        let backend = MockBackend::with_dimensions(320, 200);
        let image = backend.open(Path::new("/data/a.jpg")).unwrap();
        assert_eq!((image.width(), image.height()), (320, 200));

        let ops = backend.get_operations();
        assert!(matches!(&ops[0], RecordedOp::Open(p) if p == "/data/a.jpg"));
    }

    #[test]
    fn mock_records_resize_and_encode() {
        let backend = MockBackend::new();
        let image = backend.open(Path::new("/a.jpg")).unwrap();
        let resized = backend.resize(&image, 400, 300).unwrap();
        let bytes = backend
            .encode(&resized, OutputFormat::Png, Quality::new(80))
            .unwrap();

        assert_eq!(bytes, b"400x300");
        assert_eq!(
            backend.get_operations()[1..],
            [
                RecordedOp::Resize {
                    width: 400,
                    height: 300
                },
                RecordedOp::Encode {
                    format: OutputFormat::Png,
                    quality: 80
                },
            ]
        );
    }
}
