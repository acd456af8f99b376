//! Source image lookup.
//!
//! Originals live under `data_root`. A request names a path relative to it;
//! the loader maps it to a file, falling back through the allowed formats
//! when the requested extension is not allowed or the file is missing:
//!
//! ```text
//! photos/dawn.png  (formats = [jpg, webp])
//!   1. photos/dawn.png   extension not allowed, skipped
//!   2. photos/dawn.jpg
//!   3. photos/dawn.webp
//!   4. NotFound
//! ```
//!
//! When the extension is allowed but the file is missing and no alternate
//! format exists, the extensionless name (`photos/dawn`) is the last try.

use crate::codec::check_traversal;
use crate::error::{ImagineError, Result};
use crate::imaging::ImageBackend;
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A decoded original.
#[derive(Debug)]
pub struct SourceImage {
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl SourceImage {
    /// Lowercased extension of the file the image was read from.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct SourceLoader {
    root: PathBuf,
    formats: Vec<String>,
}

impl SourceLoader {
    pub fn new(root: impl Into<PathBuf>, formats: Vec<String>) -> Self {
        Self {
            root: root.into(),
            formats,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `path`.
    ///
    /// Traversal sequences are rejected before any filesystem access; a
    /// symlink leading out of the root is rejected after resolution.
    pub fn find(&self, path: &str) -> Result<PathBuf> {
        check_traversal(path)?;
        let root = fs::canonicalize(&self.root).map_err(|_| {
            ImagineError::not_found(format!("source root {} is missing", self.root.display()))
        })?;

        let file = root.join(path.trim_start_matches('/'));
        let extension = file
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned());
        let target_format = extension
            .filter(|ext| self.formats.is_empty() || self.formats.iter().any(|f| f == ext));
        let stem = file.with_extension("");

        let found = if target_format.is_some() && file.is_file() {
            file
        } else {
            let alternate = self
                .formats
                .iter()
                .filter(|format| target_format.as_ref() != Some(*format))
                .map(|format| stem.with_extension(format))
                .find(|candidate| candidate.is_file());

            match alternate {
                Some(candidate) => {
                    debug!(requested = path, found = %candidate.display(), "source format fallback");
                    candidate
                }
                None if target_format.is_some() && stem.is_file() => stem,
                None => {
                    return Err(ImagineError::not_found(format!(
                        "source image not found for '{path}'"
                    )));
                }
            }
        };

        let resolved = fs::canonicalize(&found)?;
        if !resolved.starts_with(&root) {
            return Err(ImagineError::PathSecurity(path.to_string()));
        }
        Ok(resolved)
    }

    /// Find and decode an original.
    pub fn load(&self, backend: &impl ImageBackend, path: &str) -> Result<SourceImage> {
        let path = self.find(path)?;
        let image = backend.open(&path)?;
        Ok(SourceImage { path, image })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use tempfile::TempDir;

    fn formats(list: &[&str]) -> Vec<String> {
        list.iter().map(|f| f.to_string()).collect()
    }

    fn site(files: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for file in files {
            let path = tmp.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }
        tmp
    }

    fn found_name(result: Result<PathBuf>) -> String {
        result
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn finds_requested_file() {
        let tmp = site(&["photos/dawn.jpg"]);
        let loader = SourceLoader::new(tmp.path(), Vec::new());
        assert_eq!(found_name(loader.find("/photos/dawn.jpg")), "dawn.jpg");
    }

    #[test]
    fn disallowed_extension_falls_back_to_allowed_format() {
        let tmp = site(&["photos/dawn.png", "photos/dawn.webp"]);
        let loader = SourceLoader::new(tmp.path(), formats(&["jpg", "webp"]));
        assert_eq!(found_name(loader.find("photos/dawn.png")), "dawn.webp");
    }

    #[test]
    fn missing_file_falls_back_to_other_format() {
        let tmp = site(&["dawn.jpg"]);
        let loader = SourceLoader::new(tmp.path(), formats(&["png", "jpg"]));
        assert_eq!(found_name(loader.find("dawn.png")), "dawn.jpg");
    }

    #[test]
    fn extensionless_file_is_last_resort() {
        let tmp = site(&["dawn"]);
        let loader = SourceLoader::new(tmp.path(), formats(&["jpg"]));
        assert_eq!(found_name(loader.find("dawn.jpg")), "dawn");
    }

    #[test]
    fn missing_everywhere_is_not_found() {
        let tmp = site(&[]);
        let loader = SourceLoader::new(tmp.path(), formats(&["jpg"]));
        assert!(matches!(
            loader.find("dawn.jpg"),
            Err(ImagineError::NotFound(_))
        ));
    }

    #[test]
    fn traversal_rejected() {
        let tmp = site(&["inside.jpg"]);
        let loader = SourceLoader::new(tmp.path().join("nope"), Vec::new());
        // rejected even though the root does not exist
        for path in ["../etc/passwd", "a/../../b"] {
            assert!(matches!(
                loader.find(path),
                Err(ImagineError::PathSecurity(_))
            ));
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_rejected() {
        let outside = site(&["secret.jpg"]);
        let root = site(&[]);
        std::os::unix::fs::symlink(outside.path().join("secret.jpg"), root.path().join("a.jpg"))
            .unwrap();

        let loader = SourceLoader::new(root.path(), Vec::new());
        assert!(matches!(
            loader.find("a.jpg"),
            Err(ImagineError::PathSecurity(_))
        ));
    }

    #[test]
    fn load_opens_through_backend() {
        let tmp = site(&["dawn.jpg"]);
        let loader = SourceLoader::new(tmp.path(), Vec::new());
        let backend = MockBackend::with_dimensions(640, 480);

        let source = loader.load(&backend, "dawn.jpg").unwrap();
        assert_eq!(source.image.width(), 640);
        assert_eq!(source.extension().as_deref(), Some("jpg"));
        assert!(matches!(&backend.get_operations()[0], RecordedOp::Open(p) if p.ends_with("dawn.jpg")));
    }
}
