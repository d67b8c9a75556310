//! Dev-server request handling as an ordered chain of handlers.
//!
//! Every request walks the chain and is answered by the first handler whose
//! [`RouteHandler::matches`] accepts it. The default chain holds the built-in
//! handlers ([`LiveReload`], then [`StaticFiles`]); [`compose`] puts the
//! configured custom routes in front of it.

use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use kiln_config::RouteSpec;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::dev::{DevEvent, EVENTS_PATH, RELOAD_SCRIPT_PATH, SharedState, error_overlay};

/// Browser side of live reload: reload whenever a build finishes, which
/// also swaps in or out of the error overlay.
pub const RELOAD_SCRIPT: &str = r#"(() => {
  const source = new EventSource("/__kiln/events");
  source.onmessage = (message) => {
    let event;
    try {
      event = JSON.parse(message.data);
    } catch {
      return;
    }
    if (event.type === "BuildCompleted" || event.type === "BuildFailed") {
      location.reload();
    }
  };
})();
"#;

#[async_trait]
pub trait RouteHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn matches(&self, method: &Method, path: &str) -> bool;

    async fn handle(&self, request: Request) -> Response;
}

/// An ordered, cheaply clonable list of handlers.
#[derive(Clone)]
pub struct HandlerChain {
    handlers: Arc<[Arc<dyn RouteHandler>]>,
}

impl HandlerChain {
    pub fn new(handlers: Vec<Arc<dyn RouteHandler>>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    pub fn handlers(&self) -> &[Arc<dyn RouteHandler>] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Whether both chains share the same handler list.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.handlers, &b.handlers)
    }

    /// Answer a request with the first matching handler, or 404.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        match self.handlers.iter().find(|h| h.matches(&method, &path)) {
            Some(handler) => {
                tracing::trace!(handler = handler.name(), %method, %path, "dispatching request");
                handler.handle(request).await
            }
            None => not_found(&path),
        }
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

/// The built-in handlers, in evaluation order.
pub fn default_chain(state: &SharedState) -> HandlerChain {
    HandlerChain::new(vec![
        Arc::new(LiveReload::new(Arc::clone(state))),
        Arc::new(StaticFiles::new(Arc::clone(state))),
    ])
}

/// Put `custom` routes ahead of `defaults`.
///
/// With no custom routes the default chain itself is returned.
pub fn compose(defaults: &HandlerChain, custom: &[RouteSpec]) -> HandlerChain {
    if custom.is_empty() {
        return defaults.clone();
    }

    let handlers = custom
        .iter()
        .cloned()
        .map(|route| Arc::new(FileRoute::new(route)) as Arc<dyn RouteHandler>)
        .chain(defaults.handlers.iter().cloned())
        .collect();
    HandlerChain::new(handlers)
}

/// A custom route answering one method and path with a fixed file.
#[derive(Debug, Clone)]
pub struct FileRoute {
    route: RouteSpec,
}

impl FileRoute {
    pub fn new(route: RouteSpec) -> Self {
        Self { route }
    }

    pub fn route(&self) -> &RouteSpec {
        &self.route
    }
}

#[async_trait]
impl RouteHandler for FileRoute {
    fn name(&self) -> &str {
        &self.route.path
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        path == self.route.path && method.as_str().eq_ignore_ascii_case(&self.route.method)
    }

    async fn handle(&self, _request: Request) -> Response {
        let content_type = self
            .route
            .content_type
            .as_deref()
            .unwrap_or_else(|| content_type_for(&self.route.file));

        match tokio::fs::read(&self.route.file).await {
            Ok(body) => respond(StatusCode::OK, content_type, body),
            Err(e) => file_error(&self.route.file, e),
        }
    }
}

/// SSE endpoint and reload client script.
pub struct LiveReload {
    state: SharedState,
}

impl LiveReload {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    async fn events(&self) -> Response {
        let (id, rx) = self.state.register_client();
        tracing::debug!(client = id, "live reload client connected");
        self.state
            .broadcast(&DevEvent::ClientConnected { id })
            .await;

        let stream =
            ReceiverStream::new(rx).map(|data| Ok::<_, Infallible>(Event::default().data(data)));

        Sse::new(stream)
            .keep_alive(
                KeepAlive::new()
                    .interval(Duration::from_secs(15))
                    .text("ping"),
            )
            .into_response()
    }
}

#[async_trait]
impl RouteHandler for LiveReload {
    fn name(&self) -> &str {
        "live-reload"
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        method == Method::GET && (path == EVENTS_PATH || path == RELOAD_SCRIPT_PATH)
    }

    async fn handle(&self, request: Request) -> Response {
        if request.uri().path() == EVENTS_PATH {
            self.events().await
        } else {
            respond(StatusCode::OK, "application/javascript", RELOAD_SCRIPT)
        }
    }
}

/// Files from the output directory.
///
/// HTML documents get the reload script injected, and are replaced by the
/// error overlay while the last build is failing. Other files keep serving
/// the last good build.
pub struct StaticFiles {
    state: SharedState,
}

impl StaticFiles {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl RouteHandler for StaticFiles {
    fn name(&self) -> &str {
        "static-files"
    }

    fn matches(&self, method: &Method, _path: &str) -> bool {
        method == Method::GET || method == Method::HEAD
    }

    async fn handle(&self, request: Request) -> Response {
        let Ok(path) = urlencoding::decode(request.uri().path()) else {
            return respond(StatusCode::BAD_REQUEST, "text/plain", "Malformed path");
        };
        let Some(mut file) = resolve_in(self.state.out_dir(), &path) else {
            return respond(StatusCode::FORBIDDEN, "text/plain", "Forbidden");
        };
        if tokio::fs::metadata(&file)
            .await
            .is_ok_and(|meta| meta.is_dir())
        {
            file.push("index.html");
        }

        let is_html = is_html(&file);
        if is_html {
            if let Some(error) = self.state.status().error() {
                return respond(
                    StatusCode::OK,
                    "text/html; charset=utf-8",
                    error_overlay::render(error),
                );
            }
        }

        match tokio::fs::read(&file).await {
            Ok(body) if is_html => respond(
                StatusCode::OK,
                "text/html; charset=utf-8",
                inject_reload_script(&body),
            ),
            Ok(body) => respond(StatusCode::OK, content_type_for(&file), body),
            Err(e) => file_error(&file, e),
        }
    }
}

/// Map a decoded URL path onto a file under `root`, refusing anything that
/// would leave it.
fn resolve_in(root: &Path, url_path: &str) -> Option<PathBuf> {
    let relative = url_path.trim_start_matches('/');
    let mut file = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => file.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if relative.is_empty() || relative.ends_with('/') {
        file.push("index.html");
    }
    Some(file)
}

fn is_html(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html" | "htm")
    )
}

/// Add the reload script before `</body>`, or at the end without one.
pub fn inject_reload_script(html: &[u8]) -> Vec<u8> {
    let html = String::from_utf8_lossy(html);
    let tag = format!(r#"<script src="{RELOAD_SCRIPT_PATH}"></script>"#);

    match html.rfind("</body>") {
        Some(pos) => format!("{}  {tag}\n{}", &html[..pos], &html[pos..]).into_bytes(),
        None => format!("{html}\n{tag}\n").into_bytes(),
    }
}

/// Content type from a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "wasm" => "application/wasm",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response {
    let mut response = (status, body.into()).into_response();
    let headers = response.headers_mut();
    match HeaderValue::from_str(content_type) {
        Ok(value) => {
            headers.insert(header::CONTENT_TYPE, value);
        }
        Err(_) => tracing::warn!(content_type, "ignoring invalid content type"),
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn not_found(path: &str) -> Response {
    respond(
        StatusCode::NOT_FOUND,
        "text/plain; charset=utf-8",
        format!("Not found: {path}"),
    )
}

fn file_error(file: &Path, err: std::io::Error) -> Response {
    if err.kind() == std::io::ErrorKind::NotFound {
        return not_found(&file.display().to_string());
    }
    tracing::warn!(file = %file.display(), error = %err, "failed to read file");
    respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        "text/plain; charset=utf-8",
        format!("Failed to read {}", file.display()),
    )
}
