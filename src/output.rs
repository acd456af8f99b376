//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Resolve
//!
//! ```text
//! MISS adaptive photos/dawn.jpg
//!     Target: web/media/cache/adaptive/photos/small.dawn.jpg
//!     Breakpoint: small (100px)
//! ```
//!
//! ## Paths
//!
//! ```text
//! adaptive photos/dawn.jpg
//! 001 medium (400px) → /media/cache/adaptive/photos/medium.dawn.jpg
//! 002 small (100px) → /media/cache/adaptive/photos/small.dawn.jpg
//! ```
//!
//! ## Check
//!
//! ```text
//! Roots
//!     Web: web
//!     Data: web
//!     Cache: web/media/cache
//!
//! Filters
//! 001 adaptive (3 breakpoints)
//!     per_breakpoint, route_attribute, breakpoint loader
//!     small 100px, medium 400px, large 1200px
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::config::{FilterConfig, ImagineConfig, LoaderKind, UrlScheme};
use crate::resolver::{BrowserPath, Resolved};
use serde::Serialize;

/// Format a 1-based position as a zero-padded 3-digit string.
fn format_index(pos: usize) -> String {
    format!("{:03}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// resolve
// ============================================================================

pub fn format_resolve(filter: &str, path: &str, resolved: &Resolved) -> Vec<String> {
    match resolved {
        Resolved::Redirect(redirect) => vec![
            format!("HIT  {filter} {path}"),
            format!("{}Redirect: {} ({})", indent(1), redirect.location, redirect.status),
        ],
        Resolved::Miss { target, breakpoint } => {
            let mut lines = vec![
                format!("MISS {filter} {path}"),
                format!("{}Target: {}", indent(1), target.display()),
            ];
            if let Some(bp) = breakpoint {
                lines.push(format!("{}Breakpoint: {} ({}px)", indent(1), bp.name, bp.width));
            }
            lines
        }
    }
}

pub fn print_resolve(filter: &str, path: &str, resolved: &Resolved) {
    for line in format_resolve(filter, path, resolved) {
        println!("{}", line);
    }
}

// ============================================================================
// paths
// ============================================================================

pub fn format_paths(filter: &str, path: &str, paths: &[BrowserPath]) -> Vec<String> {
    let mut lines = vec![format!("{filter} {path}")];
    for (i, entry) in paths.iter().enumerate() {
        let label = match &entry.breakpoint {
            Some(bp) => format!("{} ({}px)", bp.name, bp.width),
            None => "(filter)".to_string(),
        };
        lines.push(format!("{} {} → {}", format_index(i + 1), label, entry.url));
    }
    lines
}

pub fn print_paths(filter: &str, path: &str, paths: &[BrowserPath]) {
    for line in format_paths(filter, path, paths) {
        println!("{}", line);
    }
}

// ============================================================================
// remove / clear
// ============================================================================

pub fn format_remove(filter: &str, path: &str, removed: usize) -> String {
    format!("Removed {} of {path} from {filter}", plural(removed, "variant"))
}

pub fn format_clear(cache_root: &std::path::Path, cleared: usize) -> String {
    let noun = if cleared == 1 {
        "filter directory"
    } else {
        "filter directories"
    };
    format!("Cleared {cleared} {noun} under {}", cache_root.display())
}

// ============================================================================
// check
// ============================================================================

fn filter_summary(settings: &FilterConfig) -> String {
    match settings.scheme {
        UrlScheme::PerFilter => plural(settings.routes.len(), "route"),
        UrlScheme::PerBreakpoint => plural(settings.breakpoints.len(), "breakpoint"),
    }
}

fn filter_details(settings: &FilterConfig) -> Vec<String> {
    let scheme = serde_label(&settings.scheme);
    let loader = match settings.loader {
        LoaderKind::Breakpoint => "breakpoint loader",
        LoaderKind::Route => "route loader",
    };
    let mut lines = match settings.scheme {
        UrlScheme::PerFilter => vec![format!("{}{scheme}, {loader}", indent(1))],
        UrlScheme::PerBreakpoint => vec![format!(
            "{}{scheme}, {}, {loader}",
            indent(1),
            serde_label(&settings.breakpoint_source)
        )],
    };

    let mut breakpoints: Vec<(&String, &u32)> = settings.breakpoints.iter().collect();
    breakpoints.sort_by_key(|(_, width)| **width);
    if !breakpoints.is_empty() {
        let list: Vec<String> = breakpoints
            .iter()
            .map(|(name, width)| format!("{name} {width}px"))
            .collect();
        lines.push(format!("{}{}", indent(1), list.join(", ")));
    }
    for (route, resize) in &settings.routes {
        lines.push(format!(
            "{}{route}: {} {}",
            indent(1),
            serde_label(&resize.method),
            resize.value
        ));
    }
    lines
}

/// Serialized name of a unit enum variant (`per_breakpoint`, `widen`).
fn serde_label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn format_check(config: &ImagineConfig) -> Vec<String> {
    let mut lines = vec![
        "Roots".to_string(),
        format!("{}Web: {}", indent(1), config.web_root.display()),
        format!("{}Data: {}", indent(1), config.data_root.display()),
        format!("{}Cache: {}", indent(1), config.cache_root().display()),
        String::new(),
        "Filters".to_string(),
    ];
    if config.filters.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, (name, settings)) in config.filters.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            name,
            filter_summary(settings)
        ));
        lines.extend(filter_details(settings));
    }
    lines
}

pub fn print_check(config: &ImagineConfig) {
    for line in format_check(config) {
        println!("{}", line);
    }
}
