//! Shared test utilities for the adaptive-images test suite.
//!
//! Provides a throwaway web root, a config with one filter of every kind,
//! and synthetic source images.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (tmp, config) = setup_site();
//! write_test_jpeg(&config.data_root.join("photos/dawn.jpg"), 800, 600);
//! ```

use crate::config::{BreakpointSource, FilterConfig, ImagineConfig, LoaderKind, UrlScheme};
use crate::context::RequestContext;
use crate::imaging::RelativeResize;
use image::{ImageEncoder, RgbImage};
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Breakpoints used across tests: `small = 100`, `medium = 400`, `large = 1200`.
pub fn standard_breakpoints() -> FilterConfig {
    let mut filter = FilterConfig::default();
    for (name, width) in [("small", 100), ("medium", 400), ("large", 1200)] {
        filter.breakpoints.insert(name.to_string(), width);
    }
    filter
}

/// Config rooted at `root` with four filters:
///
/// - `adaptive`: breakpoint from the route attribute
/// - `basename`: breakpoint from the URL basename
/// - `screen`: breakpoint from the resolution cookie
/// - `thumb`: one URL per filter, `widen` to 240 via the route loader
pub fn test_config(root: &Path) -> ImagineConfig {
    let mut config = ImagineConfig {
        web_root: root.join("web"),
        data_root: root.join("data"),
        ..ImagineConfig::default()
    };

    config
        .filters
        .insert("adaptive".into(), standard_breakpoints());
    config.filters.insert(
        "basename".into(),
        FilterConfig {
            breakpoint_source: BreakpointSource::UrlBasename,
            ..standard_breakpoints()
        },
    );
    config.filters.insert(
        "screen".into(),
        FilterConfig {
            breakpoint_source: BreakpointSource::Cookie,
            ..standard_breakpoints()
        },
    );

    let mut thumb = FilterConfig {
        scheme: UrlScheme::PerFilter,
        loader: LoaderKind::Route,
        ..FilterConfig::default()
    };
    thumb
        .routes
        .insert("_imagine_thumb".into(), RelativeResize::widen(240));
    config.filters.insert("thumb".into(), thumb);

    config
}

/// Temp dir with `web/` and `data/` created, plus its config.
pub fn setup_site() -> (TempDir, ImagineConfig) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::create_dir_all(&config.web_root).unwrap();
    std::fs::create_dir_all(&config.data_root).unwrap();
    (tmp, config)
}

/// Request for an inbound cache URL with the route attributes set.
pub fn route_request(path_info: &str, filter: &str, name: Option<&str>) -> RequestContext {
    let request = RequestContext::new(path_info)
        .with_route(format!("_imagine_{filter}"))
        .with_attribute("filter", filter);
    match name {
        Some(name) => request.with_attribute("name", name),
        None => request,
    }
}

// =========================================================================
// Synthetic images
// =========================================================================

/// Write a gradient JPEG, creating parent directories.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, 85);
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}
