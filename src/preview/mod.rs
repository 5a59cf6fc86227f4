//! Static preview server with live reload injection.
//!
//! Serves the output folder over HTTP. HTML pages get a script tag that loads
//! [`response::LIVE_JS_URL`], which connects to the live channel server.

mod path;
mod response;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Result, anyhow};
use tiny_http::{Method, Request, Server};

use crate::{debug, log};
use path::Resolved;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;
const REQUEST_THREADS: usize = 4;

pub struct PreviewServer {
    server: Arc<Server>,
    addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl PreviewServer {
    /// Bind and start serving `root` on a background thread.
    ///
    /// `live_port` enables script injection; `None` serves pages untouched.
    pub fn start(interface: &str, port: u16, root: PathBuf, live_port: Option<u16>) -> Result<Self> {
        let (server, addr) = bind_with_retry(interface, port)?;
        let server = Arc::new(server);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(REQUEST_THREADS)
            .thread_name(|i| format!("preview-{i}"))
            .build()?;

        let thread = {
            let server = Arc::clone(&server);
            let root = Arc::new(root);
            std::thread::spawn(move || run_request_loop(&server, &pool, &root, live_port))
        };

        Ok(Self {
            server,
            addr,
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Handle shared with the shutdown handler so Ctrl+C can unblock it.
    pub fn handle(&self) -> Arc<Server> {
        Arc::clone(&self.server)
    }

    pub fn stop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PreviewServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Bind to the specified interface and port, with automatic port retry.
fn bind_with_retry(interface: &str, base_port: u16) -> Result<(Server, SocketAddr)> {
    let ip: std::net::IpAddr = interface
        .parse()
        .map_err(|_| anyhow!("invalid preview interface `{interface}`"))?;

    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(ip, port)) {
            Ok(server) => {
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(ip, port));
                if offset > 0 {
                    log!("preview"; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((server, addr));
            }
            // an OS-assigned port can't conflict, so don't walk from 0
            Err(e) if base_port == 0 => return Err(anyhow!("failed to bind preview server: {e}")),
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind preview server after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn run_request_loop(server: &Server, pool: &rayon::ThreadPool, root: &Arc<PathBuf>, live_port: Option<u16>) {
    for request in server.incoming_requests() {
        let root = Arc::clone(root);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &root, live_port) {
                debug!("preview"; "request error: {e}");
            }
        });
    }
    debug!("preview"; "request loop stopped");
}

fn handle_request(request: Request, root: &Path, live_port: Option<u16>) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }
    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    if let Some(port) = live_port
        && request.url() == response::LIVE_JS_URL
    {
        return response::respond_live_js(request, port);
    }

    match path::resolve(request.url(), root) {
        Resolved::File(path) => response::respond_file(request, &path, live_port),
        Resolved::NotFound => response::respond_not_found(request),
        Resolved::Forbidden => {
            debug!("preview"; "refused {}", request.url());
            response::respond_forbidden(request)
        }
    }
}
