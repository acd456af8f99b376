//! Variant generation.
//!
//! A filter's loader decides how the source is resized:
//!
//! | Loader | Resize |
//! |---|---|
//! | [`RouteLoader`] | `routes[matched route]`, any [`ResizeMethod`](crate::imaging::ResizeMethod) |
//! | [`BreakpointLoader`] | always `widen` to the active breakpoint's width |
//!
//! [`FilterManager`] runs the chosen resize through an [`ImageBackend`] and
//! encodes the result.

use crate::breakpoint::Breakpoint;
use crate::config::{FilterConfig, LoaderKind};
use crate::context::{RequestContext, RequestFilter, UrlFilter, UrlSignal};
use crate::error::{ImagineError, Result};
use crate::imaging::{ImageBackend, OutputFormat, RelativeResize, apply_relative_resize};
use crate::response::ImageResponse;
use crate::source::SourceImage;
use tracing::debug;

/// Chooses the resize for one request.
pub trait FilterLoader: Send + Sync {
    /// `breakpoint` is the one the cache path was resolved for, when known.
    fn resize(
        &self,
        request: &mut RequestContext,
        breakpoint: Option<&Breakpoint>,
        settings: &FilterConfig,
    ) -> Result<RelativeResize>;
}

/// Looks the matched route name up in the filter's `routes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteLoader;

impl FilterLoader for RouteLoader {
    fn resize(
        &self,
        request: &mut RequestContext,
        _breakpoint: Option<&Breakpoint>,
        settings: &FilterConfig,
    ) -> Result<RelativeResize> {
        let route = request
            .route
            .as_deref()
            .ok_or_else(|| ImagineError::configuration("request matched no route"))?;
        settings.routes.get(route).copied().ok_or_else(|| {
            ImagineError::configuration(format!("no resize configured for route '{route}'"))
        })
    }
}

/// Widens to the active breakpoint.
///
/// Without a resolved breakpoint the name is read from the request path's
/// basename.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakpointLoader;

impl FilterLoader for BreakpointLoader {
    fn resize(
        &self,
        request: &mut RequestContext,
        breakpoint: Option<&Breakpoint>,
        settings: &FilterConfig,
    ) -> Result<RelativeResize> {
        if let Some(breakpoint) = breakpoint {
            return Ok(RelativeResize::widen(breakpoint.width));
        }

        let name = UrlFilter::new(UrlSignal::PathBasename)
            .filter(request, "url")
            .breakpoint()
            .ok_or_else(|| ImagineError::not_found("request names no breakpoint"))?;
        let width = settings.breakpoints.get(&name).copied().ok_or_else(|| {
            ImagineError::not_found(format!("breakpoint '{name}' is not defined"))
        })?;
        Ok(RelativeResize::widen(width))
    }
}

pub fn loader_for(kind: LoaderKind) -> &'static dyn FilterLoader {
    match kind {
        LoaderKind::Route => &RouteLoader,
        LoaderKind::Breakpoint => &BreakpointLoader,
    }
}

/// Output encoder: the filter's `format`, else the source's own.
///
/// Sources the encoders do not cover are written as PNG.
pub fn output_format(settings: &FilterConfig, source: &SourceImage) -> OutputFormat {
    settings
        .format
        .as_deref()
        .and_then(OutputFormat::from_extension)
        .or_else(|| source.extension().as_deref().and_then(OutputFormat::from_extension))
        .unwrap_or(OutputFormat::Png)
}

/// Applies filters through one backend.
pub struct FilterManager<B: ImageBackend> {
    backend: B,
}

impl<B: ImageBackend> FilterManager<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resize and encode `source` for `filter`.
    pub fn apply(
        &self,
        request: &mut RequestContext,
        filter: &str,
        settings: &FilterConfig,
        source: &SourceImage,
        breakpoint: Option<&Breakpoint>,
    ) -> Result<ImageResponse> {
        let resize = loader_for(settings.loader).resize(request, breakpoint, settings)?;
        let resized = apply_relative_resize(&self.backend, &source.image, resize)?;

        let format = output_format(settings, source);
        let body = self.backend.encode(&resized, format, settings.quality())?;
        debug!(
            filter,
            width = resized.width(),
            height = resized.height(),
            ?format,
            "generated variant"
        );
        Ok(ImageResponse::ok(format.content_type(), body))
    }
}
