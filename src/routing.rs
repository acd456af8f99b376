//! Cache URL generation and inbound matching.
//!
//! Every filter owns one route, `_imagine_{filter}`, mounted at
//! `{script_name}/{cache_prefix}/{filter}/`. [`UrlGenerator`] turns a route
//! name plus [`RouteParams`] into a percent-encoded URL; [`match_route`]
//! goes the other way for requests hitting the HTTP front end.

use crate::codec::{CacheKey, decode_variant, encode_url_path};
use crate::config::{BreakpointSource, ImagineConfig, UrlScheme};
use crate::error::{ImagineError, Result};
use percent_encoding::percent_decode_str;

const ROUTE_PREFIX: &str = "_imagine_";

/// Route name of a filter.
pub fn route_name(filter: &str) -> String {
    format!("{ROUTE_PREFIX}{filter}")
}

/// Parameters of a cache route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    /// Original image path without a leading `/`.
    pub path: String,
    /// Breakpoint name, embedded in the generated filename.
    pub name: Option<String>,
}

/// URL-generation collaborator.
pub trait UrlGenerator: Send + Sync {
    fn generate(&self, route: &str, params: &RouteParams, absolute: bool) -> Result<String>;
}

/// Generates `{script_name}/{cache_prefix}/{filter}/{variant path}`.
#[derive(Debug, Clone)]
pub struct CacheRouter {
    script_name: String,
    host: String,
    cache_prefix: String,
}

impl CacheRouter {
    pub fn new(
        script_name: impl Into<String>,
        host: impl Into<String>,
        cache_prefix: impl Into<String>,
    ) -> Self {
        Self {
            script_name: script_name.into().trim_end_matches('/').to_string(),
            host: host.into(),
            cache_prefix: cache_prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ImagineConfig) -> Self {
        Self::new(&config.script_name, &config.host, config.cache_prefix())
    }
}

impl UrlGenerator for CacheRouter {
    fn generate(&self, route: &str, params: &RouteParams, absolute: bool) -> Result<String> {
        let filter = route
            .strip_prefix(ROUTE_PREFIX)
            .ok_or_else(|| ImagineError::configuration(format!("unknown route '{route}'")))?;
        let key = CacheKey::new(&params.path, filter, params.name.as_deref())?;

        let path = format!(
            "{}/{}/{}/{}",
            self.script_name,
            self.cache_prefix,
            encode_url_path(&key.filter),
            encode_url_path(&key.relative_path())
        );
        if absolute {
            Ok(format!("http://{}{}", self.host, path))
        } else {
            Ok(path)
        }
    }
}

/// An inbound cache URL mapped back to its logical image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: String,
    pub filter: String,
    /// Original image path.
    pub path: String,
    /// Breakpoint named by the URL, if any.
    pub name: Option<String>,
}

/// Match a request path (below the front controller) against the cache routes.
///
/// Returns `Ok(None)` for paths outside the cache prefix. Unknown filters and
/// breakpoint names that the filter does not declare are `NotFound`.
pub fn match_route(path_info: &str, config: &ImagineConfig) -> Result<Option<RouteMatch>> {
    let path_info = path_info.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path_info).decode_utf8_lossy();

    let prefix = format!("/{}/", config.cache_prefix());
    let Some(rest) = decoded.strip_prefix(&prefix) else {
        return Ok(None);
    };
    let Some((filter, relative)) = rest.split_once('/') else {
        return Ok(None);
    };

    let settings = config
        .filter(filter)
        .ok_or_else(|| ImagineError::not_found(format!("unknown filter '{filter}'")))?;

    let (path, name) = match settings.scheme {
        UrlScheme::PerFilter => (relative.to_string(), None),
        UrlScheme::PerBreakpoint => match decode_variant(relative) {
            Some((name, original)) if settings.breakpoints.contains_key(&name) => {
                (original, Some(name))
            }
            _ if settings.breakpoint_source == BreakpointSource::Cookie => {
                (relative.to_string(), None)
            }
            _ => {
                return Err(ImagineError::not_found(format!(
                    "no breakpoint of filter '{filter}' matches '{relative}'"
                )));
            }
        },
    };

    // validates the decoded path before anyone touches the filesystem
    let key = CacheKey::new(&path, filter, name.as_deref())?;
    Ok(Some(RouteMatch {
        route: route_name(filter),
        filter: key.filter,
        path: key.path,
        name: key.breakpoint,
    }))
}
