//! Configuration module.
//!
//! Handles loading, validating, and merging `imagine.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top, so a config
//! file only needs the keys it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! web_root = "web"              # Public directory; cached variants live below it
//! data_root = "web"             # Root the original images are read from
//! cache_prefix = "media/cache"  # Cache subdirectory under web_root (never empty)
//! formats = []                  # Allowed source extensions; empty = any
//! cookie_name = "resolution"    # Cookie carrying "<width>,<density>"
//! double_decode = true          # Percent-decode browser paths twice
//! host = "localhost"            # Host used for absolute URLs
//! script_name = ""              # Front controller prefix in generated URLs
//!
//! [filters.adaptive]
//! scheme = "per_breakpoint"            # or "per_filter"
//! breakpoint_source = "route_attribute" # or "url_basename", "cookie"
//! loader = "breakpoint"                # or "route"
//! quality = 85
//! format = "webp"                      # Optional; defaults to the source extension
//!
//! [filters.adaptive.breakpoints]
//! small = 480
//! large = 1920
//!
//! [filters.thumb.routes]
//! _imagine_thumb = { method = "widen", value = 240 }
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::breakpoint::BreakpointSet;
use crate::imaging::{OutputFormat, Quality, RelativeResize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagineConfig {
    /// Public web directory. Cached variants are written below it.
    pub web_root: PathBuf,
    /// Directory original images are loaded from.
    pub data_root: PathBuf,
    /// Cache subdirectory of `web_root`. Must not be empty.
    pub cache_prefix: String,
    /// Allowed source extensions. Empty accepts any extension.
    pub formats: Vec<String>,
    /// Cookie carrying the client resolution.
    pub cookie_name: String,
    /// Percent-decode browser paths twice.
    pub double_decode: bool,
    /// Host for absolute URLs.
    pub host: String,
    /// Front controller prefix placed before generated URLs (`/app.php`).
    pub script_name: String,
    /// Named filters.
    pub filters: BTreeMap<String, FilterConfig>,
}

impl Default for ImagineConfig {
    fn default() -> Self {
        Self {
            web_root: PathBuf::from("web"),
            data_root: PathBuf::from("web"),
            cache_prefix: "media/cache".to_string(),
            formats: Vec::new(),
            cookie_name: "resolution".to_string(),
            double_decode: true,
            host: "localhost".to_string(),
            script_name: String::new(),
            filters: BTreeMap::new(),
        }
    }
}

impl ImagineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "cache_prefix must not be empty".into(),
            ));
        }
        if self.cache_prefix.split('/').any(|s| s == "..") {
            return Err(ConfigError::Validation(
                "cache_prefix must stay inside web_root".into(),
            ));
        }
        if self.cookie_name.is_empty() {
            return Err(ConfigError::Validation(
                "cookie_name must not be empty".into(),
            ));
        }
        if let Some(format) = self.formats.iter().find(|f| f.is_empty() || f.contains('.')) {
            return Err(ConfigError::Validation(format!(
                "formats entry '{format}' must be a bare extension"
            )));
        }
        for (name, filter) in &self.filters {
            filter
                .validate()
                .map_err(|reason| ConfigError::Validation(format!("filters.{name}: {reason}")))?;
            if filter.scheme == UrlScheme::PerBreakpoint && filter.breakpoints.is_empty() {
                warn!(filter = %name, "filter declares no breakpoints; requests will fail");
            }
        }
        Ok(())
    }

    /// Cache prefix without surrounding slashes.
    pub fn cache_prefix(&self) -> &str {
        self.cache_prefix.trim_matches('/')
    }

    /// `web_root/cache_prefix`.
    pub fn cache_root(&self) -> PathBuf {
        self.web_root.join(self.cache_prefix())
    }

    pub fn filter(&self, name: &str) -> Option<&FilterConfig> {
        self.filters.get(name)
    }
}

/// How browser paths are generated for a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlScheme {
    /// One URL per breakpoint; the name is embedded in the filename.
    #[default]
    PerBreakpoint,
    /// One URL per filter, no breakpoints.
    PerFilter,
}

/// Where the active breakpoint of a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointSource {
    /// The `name` attribute of the matched route.
    #[default]
    RouteAttribute,
    /// Request path basename up to the first `.`.
    UrlBasename,
    /// First breakpoint in selector order for the resolution cookie.
    Cookie,
}

/// Which sizing policy generates a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderKind {
    /// Widen to the active breakpoint's width.
    #[default]
    Breakpoint,
    /// Look up a relative resize by the matched route name.
    Route,
}

/// Settings for one named filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub scheme: UrlScheme,
    pub breakpoint_source: BreakpointSource,
    pub loader: LoaderKind,
    /// Breakpoint name → target width.
    pub breakpoints: BTreeMap<String, u32>,
    /// Route name → relative resize, for the `route` loader.
    pub routes: BTreeMap<String, RelativeResize>,
    /// Encoding quality (0 = worst, 100 = best).
    pub quality: u32,
    /// Output extension; `None` keeps the source format.
    pub format: Option<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            scheme: UrlScheme::default(),
            breakpoint_source: BreakpointSource::default(),
            loader: LoaderKind::default(),
            breakpoints: BTreeMap::new(),
            routes: BTreeMap::new(),
            quality: 90,
            format: None,
        }
    }
}

impl FilterConfig {
    fn validate(&self) -> Result<(), String> {
        if self.quality > 100 {
            return Err("quality must be 0-100".into());
        }
        if let Some((name, _)) = self.breakpoints.iter().find(|(_, w)| **w == 0) {
            return Err(format!("breakpoint '{name}' must have a positive width"));
        }
        if let Some(name) = self
            .breakpoints
            .keys()
            .find(|n| n.is_empty() || n.contains('.') || n.contains('/'))
        {
            return Err(format!(
                "breakpoint name '{name}' must be non-empty without '.' or '/'"
            ));
        }
        if let Some((route, _)) = self
            .routes
            .iter()
            .find(|(_, r)| !(r.value.is_finite() && r.value > 0.0))
        {
            return Err(format!("route '{route}' needs a positive resize value"));
        }
        if let Some(format) = &self.format
            && OutputFormat::from_extension(format).is_none()
        {
            return Err(format!("unsupported output format '{format}'"));
        }
        if self.scheme == UrlScheme::PerFilter && self.loader == LoaderKind::Breakpoint {
            return Err("per_filter scheme needs the route loader".into());
        }
        Ok(())
    }

    pub fn breakpoint_set(&self) -> BreakpointSet {
        BreakpointSet::new(self.breakpoints.iter().map(|(n, w)| (n.as_str(), *w)))
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ImagineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ImagineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ImagineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file on top of stock defaults.
///
/// A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<ImagineConfig, ConfigError> {
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock config with example filters.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Adaptive Images Configuration
# =============================
# All settings are optional. Values shown are the defaults unless noted.
# Unknown keys cause an error.

# Public web directory. Cached variants are written below it.
web_root = "web"

# Directory original images are read from.
data_root = "web"

# Cache subdirectory of web_root. Never empty: `clear` removes everything
# below it.
cache_prefix = "media/cache"

# Allowed source extensions. When a requested extension is not listed or the
# file is missing, the same name with each listed extension is tried.
# Empty accepts any extension.
formats = []

# Cookie set by the page's script as "<screen width>,<pixel density>".
cookie_name = "resolution"

# Percent-decode browser paths twice. Turn off only when no old cache URLs
# carry doubly encoded names.
double_decode = true

# Host used for absolute URLs.
host = "localhost"

# Front controller prefix placed before generated URLs, e.g. "/app.php".
script_name = ""

# ---------------------------------------------------------------------------
# Filters (examples, not defaults)
# ---------------------------------------------------------------------------

# Breakpoint variants addressed by name: /media/cache/adaptive/dir/small.photo.jpg
[filters.adaptive]
scheme = "per_breakpoint"
breakpoint_source = "url_basename"
loader = "breakpoint"
quality = 85

[filters.adaptive.breakpoints]
small = 480
medium = 1024
large = 1920

# Variant chosen from the resolution cookie; the URL carries the plain path.
[filters.screen]
scheme = "per_breakpoint"
breakpoint_source = "cookie"
loader = "breakpoint"

[filters.screen.breakpoints]
mobile = 480
desktop = 1440

# One fixed size per route: /media/cache/thumb/dir/photo.jpg
[filters.thumb]
scheme = "per_filter"
loader = "route"
format = "webp"

[filters.thumb.routes]
_imagine_thumb = { method = "widen", value = 240 }
"##
}
