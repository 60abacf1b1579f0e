// src/serve/server.rs

//! Static file server for the output root, built on `axum`.
//!
//! Files come from `tower-http`'s `ServeDir`, which answers `GET` and `HEAD`
//! only and keeps requests inside the root. HTML responses get the reload
//! client injected; `/__sitepipe/reload` is a server-sent-events stream
//! emitting one event per reload signal.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::serve::ReloadHub;

/// Path of the reload event stream.
pub const RELOAD_PATH: &str = "/__sitepipe/reload";

/// Server settings resolved from `browsersync`.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Directory served at `/`.
    pub root: PathBuf,
    pub port: u16,
    /// Log every request at info level.
    pub debug: bool,
    /// Show a notice before reloading.
    pub notify: bool,
}

#[derive(Debug)]
struct ServerState {
    options: ServerOptions,
    reload: ReloadHub,
}

/// Running server. Dropping the handle leaves the server running; call
/// [`ServerHandle::shutdown`] to stop it.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL browsers should open.
    pub fn url(&self) -> String {
        format!("http://localhost:{}/", self.addr.port())
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Bind `0.0.0.0:<port>` and start serving.
pub async fn start(options: ServerOptions, reload: ReloadHub) -> Result<ServerHandle> {
    let listener = TcpListener::bind(("0.0.0.0", options.port))
        .await
        .with_context(|| format!("binding dev server to port {}", options.port))?;
    serve_on(listener, options, reload)
}

/// Start serving on an already bound listener.
pub fn serve_on(listener: TcpListener, options: ServerOptions, reload: ReloadHub) -> Result<ServerHandle> {
    let addr = listener.local_addr().context("reading dev server address")?;
    info!(%addr, root = ?options.root, "dev server listening");

    let app = router(options, reload);
    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(error = %err, "dev server stopped");
        }
    });

    Ok(ServerHandle { addr, task })
}

/// Routes of the dev server: the reload stream, then files below the root.
pub fn router(options: ServerOptions, reload: ReloadHub) -> Router {
    let files = ServeDir::new(&options.root);
    let state = Arc::new(ServerState { options, reload });

    Router::new()
        .route(RELOAD_PATH, get(reload_stream))
        .fallback_service(files)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), with_reload_client))
        .with_state(state)
}

async fn reload_stream(State(state): State<Arc<ServerState>>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.reload.subscribe();
    debug!(viewers = state.reload.viewers(), "reload viewer connected");
    let events = BroadcastStream::new(receiver).filter_map(|message| match message {
        Ok(generation) => Some(Ok(Event::default().event("reload").data(generation.to_string()))),
        Err(err) => {
            debug!(error = %err, "reload stream lagged");
            None
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"))
}

/// Log the request, disable caching and add the reload client to HTML
/// bodies.
async fn with_reload_client(State(state): State<Arc<ServerState>>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let mut response = next.run(request).await;

    if state.options.debug {
        info!(%method, %uri, status = %response.status(), "request");
    } else {
        debug!(%method, %uri, status = %response.status(), "request");
    }

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if method != Method::GET || !is_html(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%uri, error = %err, "reading html response failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_client(&String::from_utf8_lossy(&bytes), state.options.notify);
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Browser-side reload client.
pub fn client_script(notify: bool) -> String {
    let before_reload = if notify {
        "var n=document.createElement('div');n.textContent='sitepipe: reloading';\
         n.style.cssText='position:fixed;top:0;right:0;z-index:99999;padding:8px 14px;\
         background:#1d1f21;color:#fff;font:13px sans-serif';document.body.appendChild(n);\
         setTimeout(function(){location.reload();},300);"
    } else {
        "location.reload();"
    };
    format!(
        "<script>(function(){{var s=new EventSource('{RELOAD_PATH}');\
         s.addEventListener('reload',function(){{{before_reload}}});}})();</script>"
    )
}

/// Insert the reload client before the last `</body>`, or append it.
pub fn inject_client(html: &str, notify: bool) -> String {
    let script = client_script(notify);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..idx]);
            out.push_str(&script);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{script}"),
    }
}

/// Open `url` in the default browser.
pub fn open_browser(url: &str) {
    let result = if cfg!(target_os = "macos") {
        std::process::Command::new("open").arg(url).spawn()
    } else if cfg!(windows) {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()
    } else {
        std::process::Command::new("xdg-open").arg(url).spawn()
    };

    if let Err(err) = result {
        warn!(%url, error = %err, "could not open a browser");
    }
}
