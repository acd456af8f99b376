//! Client context extraction.
//!
//! Every inbound request is described by a [`RequestContext`] that the front
//! end builds once and passes down explicitly. Two [`RequestFilter`]
//! implementations read client signals out of it:
//!
//! - [`CookieFilter`] reads a `"<width>,<density>"` cookie and yields a
//!   [`ClientResolution`].
//! - [`UrlFilter`] yields a breakpoint name, either from a matched route
//!   attribute or from the request path's basename (`small.dawn.jpg` → `small`).
//!
//! Callers hold a `&dyn RequestFilter` and do not care which one is active.

use crate::breakpoint::ClientResolution;
use crate::codec::variant_namespace;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

/// Integer, optional commas, then digits or dots. `"320,2"`, `"1280"`, `"320,1.5"`.
static RESOLUTION_COOKIE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[,]*[0-9\.]+$").expect("static pattern compiles"));

/// Request data the resolver and filters need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Path below the front controller, e.g. `/media/cache/adaptive/small.a.jpg`.
    pub path_info: String,
    /// Front controller prefix as seen in URLs (`/app.php` or empty).
    pub base_url: String,
    /// Directory the application is mounted under (`/blog` or empty).
    pub base_path: String,
    /// Script name (`/app.php` or empty).
    pub script_name: String,
    /// Name of the matched route, when routing happened.
    pub route: Option<String>,
    /// Matched route attributes (`name`, `path`, `filter`).
    pub attributes: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(path_info: impl Into<String>) -> Self {
        Self {
            path_info: path_info.into(),
            ..Self::default()
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Mount the request under a front controller (`/app.php`).
    pub fn with_script(mut self, script_name: impl Into<String>) -> Self {
        let script_name = script_name.into();
        self.base_url = script_name.clone();
        self.script_name = script_name;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Parse a `Cookie:` header value into the cookie map.
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        for pair in header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Cookies reset to empty during this request (corrupt values).
    pub fn cleared_cookies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .cookies
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

/// Value a [`RequestFilter`] extracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientSignal {
    Resolution(ClientResolution),
    Breakpoint(Option<String>),
}

impl ClientSignal {
    /// Screen metrics, or the default when the signal is a breakpoint name.
    pub fn resolution(&self) -> ClientResolution {
        match self {
            Self::Resolution(resolution) => *resolution,
            Self::Breakpoint(_) => ClientResolution::default(),
        }
    }

    pub fn breakpoint(self) -> Option<String> {
        match self {
            Self::Breakpoint(name) => name,
            Self::Resolution(_) => None,
        }
    }
}

/// Reads one named client signal out of a request.
pub trait RequestFilter: Send + Sync {
    /// May reset request state it finds corrupt (see [`CookieFilter`]).
    fn filter(&self, request: &mut RequestContext, name: &str) -> ClientSignal;
}

/// Screen metrics from a `"<width>,<density>"` cookie named by the signal.
///
/// A value failing the format check is cleared and the defaults returned.
/// Numeric parts are read as leading integers, so `"320,1.5"` is density 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieFilter;

impl RequestFilter for CookieFilter {
    fn filter(&self, request: &mut RequestContext, name: &str) -> ClientSignal {
        let Some(value) = request.cookies.get(name) else {
            return ClientSignal::Resolution(ClientResolution::default());
        };

        if !RESOLUTION_COOKIE.is_match(value) {
            warn!(cookie = name, value = %value, "corrupt resolution cookie, clearing");
            request.cookies.insert(name.to_string(), String::new());
            return ClientSignal::Resolution(ClientResolution::default());
        }

        let mut parts = value.split(',');
        let screen_width = parts.next().map(leading_int).unwrap_or(0);
        let pixel_density = parts.next().map(leading_int).unwrap_or(1);

        ClientSignal::Resolution(ClientResolution::new(screen_width, pixel_density))
    }
}

/// Integer prefix of a string; `"1.5"` → 1, `""` → 0.
fn leading_int(value: &str) -> u32 {
    let digits: &str = value
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value, |end| &value[..end]);
    digits
        .parse::<u64>()
        .map(|n| n.min(u64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

/// Where [`UrlFilter`] finds the breakpoint name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlSignal {
    /// Route attribute named by the signal (`name`).
    #[default]
    RouteAttribute,
    /// Basename of the request path up to the first `.`.
    PathBasename,
}

/// Breakpoint name from the request URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlFilter {
    pub source: UrlSignal,
}

impl UrlFilter {
    pub fn new(source: UrlSignal) -> Self {
        Self { source }
    }
}

impl RequestFilter for UrlFilter {
    fn filter(&self, request: &mut RequestContext, name: &str) -> ClientSignal {
        let breakpoint = match self.source {
            UrlSignal::RouteAttribute => request.attribute(name).map(str::to_string),
            UrlSignal::PathBasename => {
                let token = variant_namespace(&request.path_info).trim_end();
                (!token.is_empty()).then(|| token.to_string())
            }
        };
        ClientSignal::Breakpoint(breakpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution_for(cookie: &str) -> (ClientResolution, RequestContext) {
        let mut request = RequestContext::new("/").with_cookie("resolution", cookie);
        let signal = CookieFilter.filter(&mut request, "resolution");
        (signal.resolution(), request)
    }

    // =========================================================================
    // Cookie filter
    // =========================================================================

    #[test]
    fn cookie_width_and_density() {
        let (resolution, _) = resolution_for("320,2");
        assert_eq!(resolution, ClientResolution::new(320, 2));
    }

    #[test]
    fn cookie_without_density_defaults_to_one() {
        let (resolution, _) = resolution_for("1280");
        assert_eq!(resolution.screen_width, 1280);
        assert_eq!(resolution.pixel_density, 1);
    }

    #[test]
    fn cookie_fractional_density_truncates() {
        let (resolution, _) = resolution_for("375,1.5");
        assert_eq!(resolution, ClientResolution::new(375, 1));
    }

    #[test]
    fn corrupt_cookie_resets_and_clears() {
        let (resolution, request) = resolution_for("abc");
        assert_eq!(resolution, ClientResolution::default());
        assert_eq!(request.cookies["resolution"], "");
        assert_eq!(request.cleared_cookies(), ["resolution"]);
    }

    #[test]
    fn single_digit_cookie_fails_format_check() {
        // the pattern needs at least two characters
        let (resolution, request) = resolution_for("7");
        assert_eq!(resolution, ClientResolution::default());
        assert_eq!(request.cookies["resolution"], "");
    }

    #[test]
    fn missing_cookie_returns_defaults() {
        let mut request = RequestContext::new("/");
        let signal = CookieFilter.filter(&mut request, "resolution");
        assert_eq!(signal, ClientSignal::Resolution(ClientResolution::default()));
        assert!(request.cookies.is_empty());
    }

    #[test]
    fn cookie_header_parsing() {
        let request = RequestContext::new("/").with_cookie_header("a=1; resolution=320,2 ;b=");
        assert_eq!(request.cookies["resolution"], "320,2");
        assert_eq!(request.cookies["b"], "");
    }

    // =========================================================================
    // URL filter
    // =========================================================================

    #[test]
    fn url_filter_reads_route_attribute() {
        let mut request = RequestContext::new("/x").with_attribute("name", "large");
        let signal = UrlFilter::new(UrlSignal::RouteAttribute).filter(&mut request, "name");
        assert_eq!(signal.breakpoint(), Some("large".to_string()));
    }

    #[test]
    fn url_filter_missing_attribute_is_none() {
        let mut request = RequestContext::new("/x");
        let signal = UrlFilter::default().filter(&mut request, "name");
        assert_eq!(signal.breakpoint(), None);
    }

    #[test]
    fn url_filter_takes_basename_prefix() {
        let mut request = RequestContext::new("/media/cache/adaptive/photos/medium.dawn.jpg");
        let signal = UrlFilter::new(UrlSignal::PathBasename).filter(&mut request, "url");
        assert_eq!(signal.breakpoint(), Some("medium".to_string()));
    }

    #[test]
    fn leading_int_stops_at_non_digit() {
        assert_eq!(leading_int("42px"), 42);
        assert_eq!(leading_int(""), 0);
        assert_eq!(leading_int("99999999999"), u32::MAX);
    }
}
