//! Cache resolution and the cache lifecycle.
//!
//! [`CacheResolver`] answers one question per request: does the variant the
//! client asked for already exist on disk? If it does, the request reached
//! the application only because a rewrite rule missed, so the client is
//! redirected to the static file. If it does not, the caller gets the
//! physical target path to populate with [`CacheResolver::store`].
//!
//! ```text
//! request ─► active breakpoint ─► browser path ─► physical path
//!                                                   │
//!                                       exists? ────┼──► Redirect (301)
//!                                                   └──► Miss { target }
//! ```
//!
//! The active breakpoint is computed once and handed back in
//! [`Resolved::Miss`], so the variant generator sizes the image for the same
//! breakpoint the path was derived from.

use crate::breakpoint::{Breakpoint, ClientResolution, pick, select};
use crate::codec::{
    self, CacheKey, check_traversal, decode_browser_path, encode_url_path, strip_script_name,
};
use crate::config::{BreakpointSource, FilterConfig, ImagineConfig, UrlScheme};
use crate::context::{CookieFilter, RequestContext, RequestFilter, UrlFilter, UrlSignal};
use crate::error::{ImagineError, Result};
use crate::response::{ImageResponse, Redirect};
use crate::routing::{CacheRouter, RouteParams, UrlGenerator, route_name};
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of [`CacheResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The variant exists; send the client there.
    Redirect(Redirect),
    /// The variant must be generated and written to `target`.
    Miss {
        target: PathBuf,
        breakpoint: Option<Breakpoint>,
    },
}

/// One entry of a filter's browser path map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserPath {
    /// `None` for per-filter URLs.
    pub breakpoint: Option<Breakpoint>,
    pub url: String,
}

pub struct CacheResolver {
    config: Arc<ImagineConfig>,
    router: Box<dyn UrlGenerator>,
    resolution_filter: Box<dyn RequestFilter>,
}

impl CacheResolver {
    pub fn new(
        config: Arc<ImagineConfig>,
        router: Box<dyn UrlGenerator>,
        resolution_filter: Box<dyn RequestFilter>,
    ) -> Self {
        Self {
            config,
            router,
            resolution_filter,
        }
    }

    /// Resolver using [`CacheRouter`] and the resolution cookie.
    pub fn from_config(config: Arc<ImagineConfig>) -> Self {
        let router = CacheRouter::from_config(&config);
        Self::new(config, Box::new(router), Box::new(CookieFilter))
    }

    pub fn config(&self) -> &ImagineConfig {
        &self.config
    }

    pub fn filter_config(&self, filter: &str) -> Result<&FilterConfig> {
        self.config
            .filter(filter)
            .ok_or_else(|| ImagineError::not_found(format!("unknown filter '{filter}'")))
    }

    /// Screen metrics from the resolution cookie.
    ///
    /// A corrupt cookie is cleared on `request`.
    pub fn client_resolution(&self, request: &mut RequestContext) -> ClientResolution {
        self.resolution_filter
            .filter(request, &self.config.cookie_name)
            .resolution()
    }

    /// Browser path of one variant, percent-decoded path segments restored.
    pub fn image_path(
        &self,
        path: &str,
        filter: &str,
        breakpoint: Option<&str>,
        absolute: bool,
    ) -> Result<String> {
        let key = CacheKey::new(path, filter, breakpoint)?;
        let params = RouteParams {
            path: key.path.clone(),
            name: key.breakpoint.clone(),
        };
        let url = self.router.generate(&route_name(filter), &params, absolute)?;

        let relative = key.relative_path();
        Ok(url.replace(&encode_url_path(&relative), &relative))
    }

    /// Every browser path of an image, in selector order for the client.
    ///
    /// Per-filter schemes yield a single entry without a breakpoint.
    pub fn browser_paths(
        &self,
        request: &mut RequestContext,
        path: &str,
        filter: &str,
        absolute: bool,
    ) -> Result<Vec<BrowserPath>> {
        let settings = self.filter_config(filter)?;
        if settings.scheme == UrlScheme::PerFilter {
            return Ok(vec![BrowserPath {
                breakpoint: None,
                url: self.image_path(path, filter, None, absolute)?,
            }]);
        }

        let resolution = self.client_resolution(request);
        select(&settings.breakpoint_set(), resolution)?
            .into_iter()
            .map(|breakpoint| -> Result<BrowserPath> {
                let url = self.image_path(path, filter, Some(&breakpoint.name), absolute)?;
                Ok(BrowserPath {
                    breakpoint: Some(breakpoint),
                    url,
                })
            })
            .collect()
    }

    /// Breakpoint this request targets, read from wherever the filter says.
    pub fn active_breakpoint(
        &self,
        request: &mut RequestContext,
        filter: &str,
    ) -> Result<Option<Breakpoint>> {
        let settings = self.filter_config(filter)?;
        if settings.scheme == UrlScheme::PerFilter {
            return Ok(None);
        }

        let set = settings.breakpoint_set();
        if set.is_empty() {
            return Err(ImagineError::configuration(format!(
                "no breakpoints defined for filter '{filter}'"
            )));
        }

        let name = match settings.breakpoint_source {
            BreakpointSource::RouteAttribute => UrlFilter::new(UrlSignal::RouteAttribute)
                .filter(request, "name")
                .breakpoint()
                .ok_or_else(|| {
                    ImagineError::configuration(format!(
                        "route for filter '{filter}' sets no {{name}} parameter"
                    ))
                })?,
            BreakpointSource::UrlBasename => UrlFilter::new(UrlSignal::PathBasename)
                .filter(request, "url")
                .breakpoint()
                .ok_or_else(|| {
                    ImagineError::not_found(format!("no breakpoint in '{}'", request.path_info))
                })?,
            BreakpointSource::Cookie => match request.attribute("name").map(str::to_string) {
                Some(name) => name,
                None => {
                    let resolution = self.client_resolution(request);
                    pick(&set, resolution)?.name
                }
            },
        };

        let width = set.width_of(&name).ok_or_else(|| {
            ImagineError::not_found(format!(
                "breakpoint '{name}' is not defined for filter '{filter}'"
            ))
        })?;
        Ok(Some(Breakpoint { name, width }))
    }

    /// Physical location of a variant below `web_root`.
    ///
    /// `base_url` is the front controller prefix to drop from the browser path.
    /// Breakpoint filters need a declared `breakpoint`; anything else is
    /// `NotFound`.
    pub fn file_path(
        &self,
        path: &str,
        filter: &str,
        breakpoint: Option<&str>,
        base_url: &str,
    ) -> Result<PathBuf> {
        let settings = self.filter_config(filter)?;
        if settings.scheme == UrlScheme::PerBreakpoint {
            let declared = breakpoint.is_some_and(|name| settings.breakpoints.contains_key(name));
            if !declared {
                return Err(ImagineError::not_found(format!(
                    "breakpoint '{}' is not defined for filter '{filter}'",
                    breakpoint.unwrap_or_default()
                )));
            }
        }

        let browser = self.decoded_browser_path(path, filter, breakpoint)?;
        self.target_path(&browser, base_url)
    }

    /// Browser path after every decoding pass, rejected if `..` appears.
    fn decoded_browser_path(
        &self,
        path: &str,
        filter: &str,
        breakpoint: Option<&str>,
    ) -> Result<String> {
        let url = self.image_path(path, filter, breakpoint, false)?;
        let decoded = decode_browser_path(&url, self.config.double_decode);
        check_traversal(&decoded)?;
        Ok(decoded)
    }

    /// Physical path for a decoded browser path, confined to `web_root`.
    fn target_path(&self, browser: &str, base_url: &str) -> Result<PathBuf> {
        let web_root = &self.config.web_root;
        let target = codec::file_path(browser, base_url, web_root);
        let confined = target.starts_with(web_root)
            && target.components().all(|c| c != Component::ParentDir);
        if !confined {
            return Err(ImagineError::PathSecurity(browser.to_string()));
        }
        Ok(target)
    }

    /// Redirect to an existing variant, or the path a new one belongs at.
    pub fn resolve(
        &self,
        request: &mut RequestContext,
        path: &str,
        filter: &str,
    ) -> Result<Resolved> {
        let breakpoint = self.active_breakpoint(request, filter)?;
        let name = breakpoint.as_ref().map(|b| b.name.as_str());

        let browser = self.decoded_browser_path(path, filter, name)?;
        let target = self.target_path(&browser, &request.base_url)?;

        if target.exists() {
            let location = format!(
                "{}{}",
                request.base_path,
                strip_script_name(&browser, &request.script_name)
            );
            debug!(filter, path, %location, "cache hit, redirecting");
            return Ok(Resolved::Redirect(Redirect::permanent(location)));
        }

        debug!(filter, path, target = %target.display(), "cache miss");
        Ok(Resolved::Miss { target, breakpoint })
    }

    /// Write `response` to `target` and mark it created (201).
    ///
    /// Concurrent stores of the same variant race; the last write wins.
    pub fn store(
        &self,
        mut response: ImageResponse,
        target: &Path,
        filter: &str,
    ) -> Result<ImageResponse> {
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| ImagineError::storage(dir, e))?;
        }
        fs::write(target, &response.body).map_err(|e| ImagineError::storage(target, e))?;

        info!(filter, target = %target.display(), bytes = response.body.len(), "stored variant");
        response.status = 201;
        Ok(response)
    }

    /// Delete a cached file. Returns whether the file is absent afterwards.
    pub fn remove(&self, target: &Path, filter: &str) -> bool {
        match fs::remove_file(target) {
            Ok(()) => debug!(filter, target = %target.display(), "removed variant"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(filter, target = %target.display(), error = %e, "remove failed"),
        }
        !target.exists()
    }

    /// Remove every cached variant of one image. Returns how many were deleted.
    pub fn purge(&self, path: &str, filter: &str) -> Result<usize> {
        let settings = self.filter_config(filter)?;
        let names: Vec<Option<&str>> = match settings.scheme {
            UrlScheme::PerFilter => vec![None],
            UrlScheme::PerBreakpoint => settings.breakpoints.keys().map(|n| Some(n.as_str())).collect(),
        };

        let mut removed = 0;
        for name in names {
            let target = self.file_path(path, filter, name, &self.config.script_name)?;
            if target.exists() && self.remove(&target, filter) {
                removed += 1;
            }
        }
        info!(filter, path, removed, "purged variants");
        Ok(removed)
    }

    /// Remove every filter directory under `web_root/{cache_prefix}`.
    ///
    /// An empty prefix is refused: it would clear the whole web root.
    pub fn clear(&self, cache_prefix: &str) -> Result<usize> {
        let cache_prefix = cache_prefix.trim_matches('/');
        if cache_prefix.is_empty() {
            return Err(ImagineError::configuration(
                "cannot clear the cache because cache_prefix is empty",
            ));
        }

        let cache_path = self.config.web_root.join(cache_prefix);
        if !cache_path.is_dir() {
            debug!(path = %cache_path.display(), "nothing to clear");
            return Ok(0);
        }

        let mut cleared = 0;
        for entry in WalkDir::new(&cache_path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&cache_path).to_path_buf();
                ImagineError::storage(path, e.into())
            })?;
            if entry.file_type().is_dir() {
                fs::remove_dir_all(entry.path())
                    .map_err(|e| ImagineError::storage(entry.path(), e))?;
                cleared += 1;
            }
        }
        info!(path = %cache_path.display(), cleared, "cleared cache");
        Ok(cleared)
    }
}
