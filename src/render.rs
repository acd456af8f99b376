//! HTML output.
//!
//! [`adaptive_img_tag`] renders the browser path map of an image as one
//! `<img>` element: the selected variant is the `src`, every other variant is
//! a `data-{breakpoint}` attribute a script can swap in. Attribute names are
//! dynamic, which maud's `html!` cannot express, so the tag is assembled by
//! hand with every value escaped through maud.
//!
//! [`preview_page`] wraps a tag in a document that also sets the resolution
//! cookie, so the next request is sized for the visitor's screen.

use crate::context::RequestContext;
use crate::error::Result;
use crate::resolver::CacheResolver;
use maud::{DOCTYPE, Markup, PreEscaped, html};

/// Sets `<cookie>=<screen width>,<device pixel ratio>` for later requests.
const RESOLUTION_SCRIPT: &str = r#"document.cookie = "__COOKIE__=" + Math.max(screen.width, screen.height) + "," + Math.round(window.devicePixelRatio || 1) + "; path=/";"#;

fn escape(value: &str) -> String {
    html! { (value) }.into_string()
}

/// HTML attribute names we are willing to emit verbatim.
fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}

/// `<img src=...>` with extra attributes in the given order.
///
/// Pairs with names that are not plain attribute names are dropped.
pub fn img_tag(src: &str, attributes: &[(String, String)]) -> Markup {
    let mut tag = format!("<img src=\"{}\"", escape(src));
    for (name, value) in attributes.iter().filter(|(n, _)| is_attribute_name(n)) {
        tag.push_str(&format!(" {}=\"{}\"", name, escape(value)));
    }
    tag.push('>');
    PreEscaped(tag)
}

/// `<img>` for `path` under `filter`, sized for the requesting client.
///
/// Caller attributes come first; breakpoint attributes follow in selector
/// order and win on a name clash.
pub fn adaptive_img_tag(
    resolver: &CacheResolver,
    request: &mut RequestContext,
    path: &str,
    filter: &str,
    attributes: &[(&str, &str)],
    absolute: bool,
) -> Result<Markup> {
    let mut paths = resolver
        .browser_paths(request, path, filter, absolute)?
        .into_iter();
    // browser_paths never returns an empty list
    let src = paths.next().map(|p| p.url).unwrap_or_default();

    let mut merged: Vec<(String, String)> = attributes
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    for entry in paths {
        let Some(breakpoint) = entry.breakpoint else {
            continue;
        };
        let name = format!("data-{}", breakpoint.name);
        merged.retain(|(n, _)| *n != name);
        merged.push((name, entry.url));
    }

    Ok(img_tag(&src, &merged))
}

/// Minimal page showing one adaptive image.
pub fn preview_page(title: &str, image: Markup, cookie_name: &str) -> Markup {
    let script = RESOLUTION_SCRIPT.replace("__COOKIE__", cookie_name);
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script { (PreEscaped(script)) }
            }
            body {
                figure {
                    (image)
                    figcaption { (title) }
                }
            }
        }
    }
}
