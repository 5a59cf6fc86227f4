//! HTTP response handlers.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

pub const HTML: &str = "text/html; charset=utf-8";
pub const PLAIN: &str = "text/plain; charset=utf-8";
pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";

/// URL of the live reload client script
pub const LIVE_JS_URL: &str = "/__chtl/live.js";

/// Live reload client; `__PORT__` is replaced with the live server port.
const LIVE_JS: &str = r#"(function () {
  var url = "ws://" + (location.hostname || "127.0.0.1") + ":__PORT__";
  function connect() {
    var ws = new WebSocket(url);
    ws.onmessage = function (event) {
      try {
        if (JSON.parse(event.data).type === "reload") location.reload();
      } catch (_) {}
    };
    ws.onclose = function () {
      setTimeout(connect, 1000);
    };
  }
  connect();
})();
"#;

/// Respond with a static file, injecting the live script into HTML.
pub fn respond_file(request: Request, path: &Path, live_port: Option<u16>) -> Result<()> {
    let content_type = content_type(path);
    if is_head_request(&request) {
        return send(request, 200, content_type, Vec::new());
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let body = match live_port {
        Some(_) if content_type == HTML => inject_live_script(&body),
        _ => body,
    };
    send(request, 200, content_type, body)
}

pub fn respond_live_js(request: Request, live_port: u16) -> Result<()> {
    let body = LIVE_JS.replace("__PORT__", &live_port.to_string());
    send(request, 200, JAVASCRIPT, body.into_bytes())
}

pub fn respond_not_found(request: Request) -> Result<()> {
    send(request, 404, PLAIN, b"404 Not Found".to_vec())
}

pub fn respond_forbidden(request: Request) -> Result<()> {
    send(request, 403, PLAIN, b"403 Forbidden".to_vec())
}

pub fn respond_unavailable(request: Request) -> Result<()> {
    send(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send(request, 405, PLAIN, b"405 Method Not Allowed".to_vec())
}

/// Insert the live script tag before the last `</body>`, or append it.
pub fn inject_live_script(content: &[u8]) -> Vec<u8> {
    let tag = format!(r#"<script src="{LIVE_JS_URL}"></script>"#);
    let tag = tag.as_bytes();

    // Byte pattern for </body>, matched case-insensitively
    const PATTERN: &[u8] = b"</body>";

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + tag.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(tag);
    result.extend_from_slice(&content[pos..]);
    result
}

pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => HTML,
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => JAVASCRIPT,
        "json" | "map" => "application/json",
        "txt" => PLAIN,
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let mut response: Response<Cursor<Vec<u8>>> =
        Response::from_data(body).with_status_code(StatusCode(status));
    if let Ok(header) = Header::from_bytes("Content-Type", content_type) {
        response.add_header(header);
    }
    if let Ok(header) = Header::from_bytes("Cache-Control", "no-store") {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_before_body_close() {
        let html = b"<html><body><p>x</p></BODY></html>";
        let out = String::from_utf8(inject_live_script(html)).unwrap();
        assert_eq!(
            out,
            r#"<html><body><p>x</p><script src="/__chtl/live.js"></script></BODY></html>"#
        );
    }

    #[test]
    fn test_inject_without_body_appends() {
        let out = String::from_utf8(inject_live_script(b"<p>fragment</p>")).unwrap();
        assert!(out.ends_with(r#"<script src="/__chtl/live.js"></script>"#));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("a/index.HTML")), HTML);
        assert_eq!(content_type(Path::new("app.js")), JAVASCRIPT);
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }
}
