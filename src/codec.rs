//! Cache path encoding.
//!
//! A cached variant is identified by the original image path, the filter
//! name and an optional breakpoint name. The breakpoint is embedded in the
//! filename rather than in a directory:
//!
//! ```text
//! photos/2024/dawn.jpg  +  small   →   photos/2024/small.dawn.jpg
//! ```
//!
//! Decoding takes everything in the basename up to the first `.` as the
//! breakpoint name and the rest as the original basename. Breakpoint names
//! therefore never contain a dot.
//!
//! ## Browser paths
//!
//! URLs leave the router percent-encoded. [`decode_browser_path`] decodes
//! them twice: cache URLs historically passed through two layers of URL
//! construction, and caches built that way still hold doubly encoded
//! names. The second pass can be turned off with `double_decode = false`.

use crate::error::{ImagineError, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::path::{Path, PathBuf};

/// Characters escaped inside a path segment. `/` is kept as the separator.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Logical identity of a cached variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Original image path relative to the source root, without a leading `/`.
    pub path: String,
    pub filter: String,
    pub breakpoint: Option<String>,
}

impl CacheKey {
    /// Validate and normalize a key.
    ///
    /// Rejects any `..` segment before anything touches the filesystem.
    pub fn new(path: &str, filter: &str, breakpoint: Option<&str>) -> Result<Self> {
        let path = path.trim_start_matches('/');
        check_traversal(path)?;
        if path.is_empty() {
            return Err(ImagineError::not_found("empty image path"));
        }
        if filter.is_empty() || filter.contains('/') {
            return Err(ImagineError::configuration(format!(
                "invalid filter name '{filter}'"
            )));
        }
        if let Some(name) = breakpoint
            && (name.is_empty() || name.contains('.') || name.contains('/'))
        {
            return Err(ImagineError::not_found(format!(
                "invalid breakpoint name '{name}'"
            )));
        }
        Ok(Self {
            path: path.to_string(),
            filter: filter.to_string(),
            breakpoint: breakpoint.map(str::to_string),
        })
    }

    /// Filter-relative cache path: `[dir/]{breakpoint}.{basename}` or the plain path.
    pub fn relative_path(&self) -> String {
        match &self.breakpoint {
            Some(name) => encode_variant(&self.path, name),
            None => self.path.clone(),
        }
    }
}

/// Fail on `..` segments (`../etc/passwd`, `a/../../b`).
pub fn check_traversal(path: &str) -> Result<()> {
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(ImagineError::PathSecurity(path.to_string()));
    }
    Ok(())
}

/// Split a path into `(dir_with_trailing_slash, basename)`.
fn split_basename(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..=pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// Replace the basename with `{breakpoint}.{basename}`.
pub fn encode_variant(path: &str, breakpoint: &str) -> String {
    let (dir, basename) = split_basename(path);
    format!("{dir}{breakpoint}.{basename}")
}

/// Recover `(breakpoint, original_path)` from a variant path.
///
/// Returns `None` when the basename has no `.` or an empty namespace.
pub fn decode_variant(path: &str) -> Option<(String, String)> {
    let (dir, basename) = split_basename(path);
    let (name, original) = basename.split_once('.')?;
    if name.is_empty() || original.is_empty() {
        return None;
    }
    Some((name.to_string(), format!("{dir}{original}")))
}

/// Basename characters up to the first `.`.
pub fn variant_namespace(path: &str) -> &str {
    let (_, basename) = split_basename(path);
    basename.split('.').next().unwrap_or_default()
}

/// Percent-encode a relative path segment by segment.
pub fn encode_url_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SEGMENT).to_string()
}

fn percent_decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Decode a browser path, twice unless `double` is off.
pub fn decode_browser_path(path: &str, double: bool) -> String {
    let once = percent_decode(path);
    if double { percent_decode(&once) } else { once }
}

/// Physical location of a decoded browser path.
///
/// `base_path` (the front controller's base URL) is stripped when the
/// browser path starts with it; the remainder is placed under `web_root`.
pub fn file_path(browser_path: &str, base_path: &str, web_root: &Path) -> PathBuf {
    let relative = if !base_path.is_empty() {
        browser_path.strip_prefix(base_path).unwrap_or(browser_path)
    } else {
        browser_path
    };
    web_root.join(relative.trim_start_matches('/'))
}

/// Strip a leading script name (`/app.php`) from a browser path, once.
pub fn strip_script_name<'a>(browser_path: &'a str, script_name: &str) -> &'a str {
    if script_name.is_empty() {
        return browser_path;
    }
    browser_path.strip_prefix(script_name).unwrap_or(browser_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Variant encoding
    // =========================================================================

    #[test]
    fn encode_prefixes_basename_only() {
        assert_eq!(
            encode_variant("photos/2024/dawn.jpg", "small"),
            "photos/2024/small.dawn.jpg"
        );
        assert_eq!(encode_variant("dawn.jpg", "large"), "large.dawn.jpg");
    }

    #[test]
    fn decode_splits_at_first_dot() {
        assert_eq!(
            decode_variant("photos/small.dawn.jpg"),
            Some(("small".to_string(), "photos/dawn.jpg".to_string()))
        );
    }

    #[test]
    fn decode_reverses_encode() {
        for (path, name) in [
            ("a.jpg", "small"),
            ("deep/nested/dir/b.png", "retina"),
            ("c.tar.gz", "x"),
        ] {
            let encoded = encode_variant(path, name);
            assert_eq!(
                decode_variant(&encoded),
                Some((name.to_string(), path.to_string()))
            );
            assert_eq!(encode_variant(path, name), encoded);
        }
    }

    #[test]
    fn decode_rejects_basename_without_dot() {
        assert_eq!(decode_variant("photos/README"), None);
        assert_eq!(decode_variant("photos/.hidden"), None);
    }

    #[test]
    fn namespace_is_prefix_before_first_dot() {
        assert_eq!(variant_namespace("/media/cache/adaptive/medium.a.jpg"), "medium");
        assert_eq!(variant_namespace("/no-dot"), "no-dot");
    }

    // =========================================================================
    // Cache keys
    // =========================================================================

    #[test]
    fn key_rejects_traversal() {
        for path in ["../etc/passwd", "a/../../b", "a/..", "..\\windows"] {
            assert!(
                matches!(
                    CacheKey::new(path, "thumb", None),
                    Err(ImagineError::PathSecurity(_))
                ),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn key_allows_dots_inside_names() {
        let key = CacheKey::new("/a..b/c.jpg", "thumb", None).unwrap();
        assert_eq!(key.path, "a..b/c.jpg");
    }

    #[test]
    fn key_rejects_dotted_breakpoint() {
        assert!(CacheKey::new("a.jpg", "thumb", Some("x.y")).is_err());
    }

    #[test]
    fn key_relative_path_embeds_breakpoint() {
        let key = CacheKey::new("dir/a.jpg", "adaptive", Some("small")).unwrap();
        assert_eq!(key.relative_path(), "dir/small.a.jpg");
        let plain = CacheKey::new("dir/a.jpg", "thumb", None).unwrap();
        assert_eq!(plain.relative_path(), "dir/a.jpg");
    }

    // =========================================================================
    // URL handling
    // =========================================================================

    #[test]
    fn url_encoding_keeps_separators() {
        assert_eq!(encode_url_path("my photos/a b.jpg"), "my%20photos/a%20b.jpg");
    }

    #[test]
    fn browser_path_is_decoded_twice() {
        // "%2520" -> "%20" -> " "
        assert_eq!(decode_browser_path("/a%2520b.jpg", true), "/a b.jpg");
        assert_eq!(decode_browser_path("/a%2520b.jpg", false), "/a%20b.jpg");
    }

    #[test]
    fn traversal_can_surface_only_after_decoding() {
        let raw = "/media/cache/t/%252e%252e/%2e%2e/x.jpg";
        assert!(check_traversal(raw).is_ok());
        let decoded = decode_browser_path(raw, true);
        assert_eq!(decoded, "/media/cache/t/../../x.jpg");
        assert!(matches!(
            check_traversal(&decoded),
            Err(ImagineError::PathSecurity(_))
        ));
    }

    #[test]
    fn file_path_strips_base_url() {
        let root = Path::new("/srv/web");
        assert_eq!(
            file_path("/app.php/media/cache/t/a.jpg", "/app.php", root),
            PathBuf::from("/srv/web/media/cache/t/a.jpg")
        );
        assert_eq!(
            file_path("/media/cache/t/a.jpg", "", root),
            PathBuf::from("/srv/web/media/cache/t/a.jpg")
        );
    }

    #[test]
    fn script_name_stripped_once() {
        assert_eq!(
            strip_script_name("/app.php/app.php/x.jpg", "/app.php"),
            "/app.php/x.jpg"
        );
        assert_eq!(strip_script_name("/media/x.jpg", "/app.php"), "/media/x.jpg");
    }
}
