//! # Adaptive Images
//!
//! On-demand image variants, cached on disk and sized for the client's screen.
//! A request names an original image and a filter; the crate works out which
//! cached file answers it, redirects to that file when it exists, and
//! otherwise generates and stores it.
//!
//! # Request Lifecycle
//!
//! ```text
//! GET /media/cache/adaptive/photos/small.dawn.jpg
//!   1. Route     match_route      → filter `adaptive`, photos/dawn.jpg, breakpoint `small`
//!   2. Resolve   CacheResolver    → web/media/cache/adaptive/photos/small.dawn.jpg
//!                   exists?  yes  → 301 to the static URL
//!                            no   → miss
//!   3. Generate  SourceLoader + FilterManager → widen to 100px, encode
//!   4. Store     CacheResolver    → write file, 201
//! ```
//!
//! Once a variant is stored, the web server's static rules answer for it and
//! the application never sees that URL again. A request that still reaches
//! the resolver for an existing file means a rewrite rule missed; the 301
//! corrects the URL the browser remembers.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`breakpoint`] | Orders a filter's breakpoints for a client resolution |
//! | [`codec`] | Cache keys, `{breakpoint}.{basename}` encoding, browser path decoding |
//! | [`context`] | Per-request data and the cookie / URL client signal readers |
//! | [`routing`] | Cache URL generation and inbound route matching |
//! | [`resolver`] | Hit/miss resolution and the store, remove, purge, clear lifecycle |
//! | [`source`] | Original image lookup with traversal guard and format fallback |
//! | [`filter`] | Resize policies per filter and the encode step |
//! | [`imaging`] | Pure-Rust image operations behind the [`imaging::ImageBackend`] trait |
//! | [`controller`] | `filter_action`: resolve, generate, store |
//! | [`render`] | Adaptive `<img>` markup with Maud |
//! | [`serve`] | Blocking HTTP front end (`tiny_http` + rayon) |
//! | [`config`] | Layered `imagine.toml` loading and validation |
//! | [`error`] | Error taxonomy and HTTP status mapping |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Breakpoint Order Is Part of the URL Contract
//!
//! The breakpoint selector keeps an unusual comparator (see [`breakpoint`])
//! instead of a nearest-width search. Templates emit the selected order, and
//! caches built against it expect the same first choice for the same cookie.
//!
//! ## No Request-Scoped Mutable State
//!
//! The active breakpoint is computed once in [`resolver::CacheResolver::resolve`]
//! and returned inside [`resolver::Resolved::Miss`]; the variant generator
//! receives it as an argument. Request data travels in an explicit
//! [`context::RequestContext`] rather than being looked up from globals.
//!
//! ## One Resolver, Configured
//!
//! Per-breakpoint and per-filter URL schemes, and the three places a
//! breakpoint name can come from, are enum settings on a filter
//! ([`config::UrlScheme`], [`config::BreakpointSource`]) rather than separate
//! resolver types.
//!
//! ## Last Write Wins
//!
//! Two requests generating the same missing variant both write it. The output
//! is a pure function of source, filter and breakpoint, so the race is
//! harmless and no locking is done.

pub mod breakpoint;
pub mod codec;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod filter;
pub mod imaging;
pub mod output;
pub mod render;
pub mod resolver;
pub mod response;
pub mod routing;
pub mod serve;
pub mod source;

pub use error::{ImagineError, Result};

#[cfg(test)]
pub(crate) mod test_helpers;
