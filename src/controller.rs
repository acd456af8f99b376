//! Request orchestration.
//!
//! `filter_action` ties the pieces together for one cache URL:
//!
//! ```text
//! resolve ──► Redirect ───────────────────────────────► 301
//!    └──────► Miss { target, breakpoint }
//!               └─► source.load ─► filters.apply ─► resolver.store ─► 201
//! ```

use crate::config::ImagineConfig;
use crate::context::RequestContext;
use crate::error::Result;
use crate::filter::FilterManager;
use crate::imaging::ImageBackend;
use crate::resolver::{CacheResolver, Resolved};
use crate::response::{ImageResponse, Redirect};
use crate::source::SourceLoader;
use std::sync::Arc;
use tracing::info;

/// What the front end sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Redirect(Redirect),
    Image(ImageResponse),
}

impl Response {
    pub fn status(&self) -> u16 {
        match self {
            Self::Redirect(redirect) => redirect.status,
            Self::Image(image) => image.status,
        }
    }
}

pub struct ImagineController<B: ImageBackend> {
    resolver: CacheResolver,
    source: SourceLoader,
    filters: FilterManager<B>,
}

impl<B: ImageBackend> ImagineController<B> {
    pub fn new(resolver: CacheResolver, source: SourceLoader, filters: FilterManager<B>) -> Self {
        Self {
            resolver,
            source,
            filters,
        }
    }

    /// Controller with the default resolver and a source loader on `data_root`.
    pub fn from_config(config: Arc<ImagineConfig>, backend: B) -> Self {
        let source = SourceLoader::new(&config.data_root, config.formats.clone());
        Self::new(
            CacheResolver::from_config(config),
            source,
            FilterManager::new(backend),
        )
    }

    pub fn resolver(&self) -> &CacheResolver {
        &self.resolver
    }

    /// Serve one variant: redirect to it, or generate and cache it.
    pub fn filter_action(
        &self,
        request: &mut RequestContext,
        path: &str,
        filter: &str,
    ) -> Result<Response> {
        let (target, breakpoint) = match self.resolver.resolve(request, path, filter)? {
            Resolved::Redirect(redirect) => return Ok(Response::Redirect(redirect)),
            Resolved::Miss { target, breakpoint } => (target, breakpoint),
        };

        let settings = self.resolver.filter_config(filter)?;
        let source = self.source.load(self.filters.backend(), path)?;
        let response = self
            .filters
            .apply(request, filter, settings, &source, breakpoint.as_ref())?;

        let response = self.resolver.store(response, &target, filter)?;
        info!(filter, path, target = %target.display(), "generated and cached");
        Ok(Response::Image(response))
    }
}
