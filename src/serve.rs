//! Development server.
//!
//! A single-threaded `tiny_http` loop over the build output. Every GET first
//! asks the builder whether any source is newer than its output and rebuilds
//! if so, so a request never sees a half-built tree.
//!
//! ```text
//! request ─► anything_needs_build? ─yes─► run()
//!                     │                     │
//!                     └──────────┬──────────┘
//!                                ▼
//!                  translate_path ─► file | index.html | 404
//! ```

use crate::{builder::Builder, log};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Serve the output folder until Ctrl+C.
pub fn serve_site(builder: &mut Builder) -> Result<()> {
    let serve = &builder.site().serve;
    let interface = serve.ip()?;

    let (server, addr) = try_bind_port(interface, serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, builder) {
            log!("serve"; "request error: {e:#}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Resolution order: exact file, then `index.html` of a directory, then 404.
fn handle_request(request: Request, builder: &mut Builder) -> Result<()> {
    if *request.method() == Method::Get && builder.anything_needs_build()? {
        log!("serve"; "Detected change, building");
        if let Err(e) = builder.run() {
            log!("error"; "{e:#}");
        }
    }

    let local_path = translate_path(&builder.site().build.output, request.url());

    if local_path.is_file() {
        return serve_file(request, &local_path);
    }

    let index_path = local_path.join("index.html");
    if local_path.is_dir() && index_path.is_file() {
        return serve_file(request, &index_path);
    }

    serve_not_found(request)
}

/// Map a request URL onto a path under `root`.
///
/// Query and fragment are dropped, the rest is url-decoded and split on `/`.
/// Empty, `.` and `..` segments are skipped, as are drive prefixes, so the
/// result never leaves `root`.
pub fn translate_path(root: &Path, url: &str) -> PathBuf {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).map_or_else(|_| path.to_owned(), |s| s.into_owned());

    let mut local = root.to_path_buf();
    for segment in decoded.split('/') {
        // A segment may still hold a `\` or a drive letter on Windows.
        for component in Path::new(segment).components() {
            if let Component::Normal(part) = component {
                local.push(part);
            }
        }
    }
    local
}

// ============================================================================
// Response Helpers
// ============================================================================

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    let response = Response::from_data(content).with_header(content_type_header(content_type)?);

    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

fn content_type_header(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("invalid header value `{value}`"))
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("atom") => "application/atom+xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt" | "sh" | "py" | "rst") => "text/plain; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_path_stays_under_root() {
        let root = Path::new("/srv/site");
        assert_eq!(translate_path(root, "../../etc/passwd"), root.join("etc/passwd"));
        assert_eq!(translate_path(root, "/a/./b/../c"), root.join("a/b/c"));
        assert!(translate_path(root, "/%2e%2e/%2e%2e/secret").starts_with(root));
    }

    #[test]
    fn test_translate_path_strips_query_and_decodes() {
        let root = Path::new("/srv/site");
        assert_eq!(translate_path(root, "/"), root);
        assert_eq!(translate_path(root, "/tags/rust%20lang/?page=2#top"), root.join("tags/rust lang"));
        assert_eq!(translate_path(root, "/feed.atom"), root.join("feed.atom"));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("feed.atom")), "application/atom+xml; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("blob")), "application/octet-stream");
    }
}
