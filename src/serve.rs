//! Blocking HTTP front end.
//!
//! A `tiny_http` server hands each request to a rayon pool. Routing order:
//!
//! 1. a file that exists under `web_root` is sent as-is (cached variants
//!    after the first hit, plus any other static asset)
//! 2. `/_preview/{filter}/{path}` renders an HTML page with the adaptive tag
//! 3. cache URLs go to [`ImagineController::filter_action`]
//! 4. everything else is 404
//!
//! [`dispatch`] does the routing without a socket so it can be tested
//! directly; [`serve`] only moves bytes.

use crate::config::ImagineConfig;
use crate::context::RequestContext;
use crate::controller::{ImagineController, Response};
use crate::error::{ImagineError, Result};
use crate::imaging::{ImageBackend, OutputFormat, RustBackend};
use crate::render::{adaptive_img_tag, preview_page};
use crate::routing::match_route;
use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_http::{Header, Method, Request, Server, StatusCode};
use tracing::{debug, error, info, warn};

const PREVIEW_PREFIX: &str = "/_preview/";

/// Socket-free response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    fn text(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, "text/plain; charset=utf-8", message.into().into_bytes())
    }

    fn error(err: &ImagineError) -> Self {
        let status = err.status_code();
        if status >= 500 {
            error!(error = %err, "request failed");
        } else {
            debug!(error = %err, "request rejected");
        }
        // 404 bodies do not echo paths back
        match status {
            404 => Self::text(404, "404 Not Found"),
            _ => Self::text(status, format!("{status} {err}")),
        }
    }

    fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Route one request.
pub fn dispatch<B: ImageBackend>(
    controller: &ImagineController<B>,
    url: &str,
    cookie_header: Option<&str>,
) -> Reply {
    let config = controller.resolver().config();
    let path_only = url.split(['?', '#']).next().unwrap_or_default();

    if let Some(file) = static_file(path_only, &config.web_root) {
        return match fs::read(&file) {
            Ok(body) => Reply::new(200, content_type(&file), body),
            Err(e) => Reply::error(&ImagineError::Io(e)),
        };
    }

    let path_info = path_only
        .strip_prefix(config.script_name.as_str())
        .filter(|_| !config.script_name.is_empty())
        .unwrap_or(path_only);
    let mut request = RequestContext::new(path_info).with_script(&config.script_name);
    if let Some(header) = cookie_header {
        request = request.with_cookie_header(header);
    }

    let reply = if let Some(rest) = path_info.strip_prefix(PREVIEW_PREFIX) {
        preview(controller, &mut request, rest)
    } else {
        match match_route(path_info, config) {
            Ok(Some(matched)) => {
                request = request
                    .with_route(&matched.route)
                    .with_attribute("filter", &matched.filter)
                    .with_attribute("path", &matched.path);
                if let Some(name) = &matched.name {
                    request = request.with_attribute("name", name);
                }
                match controller.filter_action(&mut request, &matched.path, &matched.filter) {
                    Ok(response) => reply_for(response),
                    Err(e) => Reply::error(&e),
                }
            }
            Ok(None) => Reply::text(404, "404 Not Found"),
            Err(e) => Reply::error(&e),
        }
    };

    request
        .cleared_cookies()
        .into_iter()
        .fold(reply, |reply, name| {
            reply.with_header("Set-Cookie", format!("{name}=; Max-Age=0; Path=/"))
        })
}

fn preview<B: ImageBackend>(
    controller: &ImagineController<B>,
    request: &mut RequestContext,
    rest: &str,
) -> Reply {
    let decoded = percent_decode_str(rest).decode_utf8_lossy();
    let Some((filter, path)) = decoded.split_once('/') else {
        return Reply::text(404, "404 Not Found");
    };
    let resolver = controller.resolver();
    match adaptive_img_tag(resolver, request, path, filter, &[("alt", path)], false) {
        Ok(tag) => {
            let page = preview_page(path, tag, &resolver.config().cookie_name);
            Reply::new(200, "text/html; charset=utf-8", page.into_string().into_bytes())
        }
        Err(e) => Reply::error(&e),
    }
}

fn reply_for(response: Response) -> Reply {
    match response {
        Response::Redirect(redirect) => {
            Reply::text(redirect.status, "").with_header("Location", redirect.location)
        }
        Response::Image(image) => {
            let etag = etag(&image.body);
            Reply::new(image.status, &image.content_type, image.body)
                .with_header("ETag", etag)
                .with_header("Cache-Control", "public, max-age=31536000")
        }
    }
}

/// Strong ETag from the body's SHA-256.
fn etag(body: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(body));
    format!("\"{}\"", &digest[..16])
}

/// A file under `root` for the URL path, if one exists.
fn static_file(url_path: &str, root: &Path) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    let relative = decoded.trim_matches('/');
    if relative.is_empty() || relative.split('/').any(|s| s == "..") {
        return None;
    }

    let canonical = root.join(relative).canonicalize().ok()?;
    let root = root.canonicalize().ok()?;
    (canonical.starts_with(&root) && canonical.is_file()).then_some(canonical)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "text/javascript",
        _ => OutputFormat::from_extension(&ext)
            .map(OutputFormat::content_type)
            .unwrap_or("application/octet-stream"),
    }
}

fn send(request: Request, reply: Reply) {
    let headers: Vec<Header> = reply
        .headers
        .iter()
        .filter_map(|(n, v)| Header::from_bytes(n.as_bytes(), v.as_bytes()).ok())
        .collect();

    let result = if request.method() == &Method::Head {
        let mut response = tiny_http::Response::empty(StatusCode(reply.status));
        for header in headers {
            response.add_header(header);
        }
        request.respond(response)
    } else {
        let mut response =
            tiny_http::Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
        for header in headers {
            response.add_header(header);
        }
        request.respond(response)
    };

    if let Err(e) = result {
        warn!(error = %e, "failed to send response");
    }
}

fn handle_request<B: ImageBackend>(request: Request, controller: &ImagineController<B>) {
    if !matches!(request.method(), Method::Get | Method::Head) {
        send(request, Reply::text(405, "405 Method Not Allowed"));
        return;
    }

    let url = request.url().to_string();
    let cookie = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Cookie"))
        .map(|h| h.value.to_string());

    let reply = dispatch(controller, &url, cookie.as_deref());
    debug!(%url, status = reply.status, "handled");
    send(request, reply);
}

/// Serve until the process is stopped.
pub fn serve(config: Arc<ImagineConfig>, addr: &str, threads: usize) -> Result<()> {
    let server = Server::http(addr).map_err(|e| ImagineError::Io(std::io::Error::other(e)))?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ImagineError::configuration(format!("thread pool: {e}")))?;
    let controller = Arc::new(ImagineController::from_config(config, RustBackend::new()));

    info!(addr, threads, "serving");
    for request in server.incoming_requests() {
        let controller = Arc::clone(&controller);
        pool.spawn(move || handle_request(request, &controller));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::setup_site;

    fn controller(config: ImagineConfig) -> ImagineController<MockBackend> {
        ImagineController::from_config(Arc::new(config), MockBackend::with_dimensions(1600, 1200))
    }

    // =========================================================================
    // Cache routes
    // =========================================================================

    #[test]
    fn miss_then_static_file() {
        let (_tmp, config) = setup_site();
        fs::write(config.data_root.join("dawn.jpg"), b"x").unwrap();
        let controller = controller(config);

        let first = dispatch(&controller, "/media/cache/adaptive/small.dawn.jpg", None);
        assert_eq!(first.status, 201);
        assert_eq!(first.header("Content-Type"), Some("image/jpeg"));
        assert_eq!(first.body, b"100x75");
        assert!(first.header("ETag").is_some());

        let second = dispatch(&controller, "/media/cache/adaptive/small.dawn.jpg", None);
        assert_eq!(second.status, 200);
        assert_eq!(second.body, b"100x75");
    }

    #[test]
    fn existing_variant_reached_through_script_redirects() {
        let (_tmp, mut config) = setup_site();
        config.script_name = "/app.php".into();
        let cached = config.web_root.join("media/cache/thumb/dawn.jpg");
        fs::create_dir_all(cached.parent().unwrap()).unwrap();
        fs::write(&cached, b"cached").unwrap();
        let controller = controller(config);

        let reply = dispatch(&controller, "/app.php/media/cache/thumb/dawn.jpg", None);
        assert_eq!(reply.status, 301);
        assert_eq!(reply.header("Location"), Some("/media/cache/thumb/dawn.jpg"));
    }

    #[test]
    fn encoded_traversal_looks_like_a_missing_file() {
        let (tmp, config) = setup_site();
        fs::create_dir_all(config.web_root.join("media/cache/thumb")).unwrap();
        fs::write(tmp.path().join("secret.txt"), b"s").unwrap();
        let controller = controller(config);

        let climb = "%25252e%25252e/".repeat(4);
        let present = dispatch(&controller, &format!("/media/cache/thumb/{climb}secret.txt"), None);
        let absent = dispatch(&controller, &format!("/media/cache/thumb/{climb}nothing.txt"), None);

        assert_eq!(present.status, 404);
        assert_eq!(present.header("Location"), None);
        assert_eq!((present.status, &present.body), (absent.status, &absent.body));
        assert!(tmp.path().join("secret.txt").exists());
    }

    #[test]
    fn corrupt_cookie_is_expired() {
        let (_tmp, config) = setup_site();
        fs::write(config.data_root.join("dawn.jpg"), b"x").unwrap();
        let controller = controller(config);

        let reply = dispatch(&controller, "/media/cache/screen/dawn.jpg", Some("resolution=abc"));
        assert_eq!(reply.status, 201);
        // default resolution picks the smallest breakpoint
        assert_eq!(reply.body, b"100x75");
        assert_eq!(
            reply.header("Set-Cookie"),
            Some("resolution=; Max-Age=0; Path=/")
        );
    }

    #[test]
    fn cookie_selects_variant() {
        let (_tmp, config) = setup_site();
        fs::write(config.data_root.join("dawn.jpg"), b"x").unwrap();
        let web_root = config.web_root.clone();
        let controller = controller(config);

        let reply = dispatch(&controller, "/media/cache/screen/dawn.jpg", Some("resolution=500,1"));
        assert_eq!(reply.body, b"400x300");
        assert!(web_root.join("media/cache/screen/medium.dawn.jpg").is_file());
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn unknown_paths_are_404() {
        let (_tmp, config) = setup_site();
        let controller = controller(config);

        for url in [
            "/nothing",
            "/media/cache/nope/a.jpg",
            "/media/cache/adaptive/huge.a.jpg",
            "/media/cache/thumb/missing.jpg",
            "/media/cache/thumb/%2e%2e/%2e%2e/etc/passwd",
        ] {
            let reply = dispatch(&controller, url, None);
            assert_eq!(reply.status, 404, "{url}");
            assert_eq!(reply.body, b"404 Not Found");
        }
    }

    #[test]
    fn static_file_stays_inside_root() {
        let (tmp, config) = setup_site();
        fs::write(tmp.path().join("secret.txt"), b"s").unwrap();
        assert_eq!(static_file("/../secret.txt", &config.web_root), None);
        assert_eq!(static_file("/%2e%2e/secret.txt", &config.web_root), None);
    }

    // =========================================================================
    // Preview
    // =========================================================================

    #[test]
    fn preview_renders_adaptive_tag() {
        let (_tmp, config) = setup_site();
        let controller = controller(config);

        let reply = dispatch(&controller, "/_preview/adaptive/dawn.jpg", Some("resolution=2560,1"));
        assert_eq!(reply.status, 200);
        let page = String::from_utf8(reply.body).unwrap();
        assert!(page.contains(r#"<img src="/media/cache/adaptive/large.dawn.jpg""#));
        assert!(page.contains(r#"data-small="/media/cache/adaptive/small.dawn.jpg""#));
    }

    #[test]
    fn etag_is_quoted_hash_prefix() {
        let tag = etag(b"abc");
        assert_eq!(tag, "\"ba7816bf8f01cfea\"");
    }
}
