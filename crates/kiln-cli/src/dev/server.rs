//! HTTP server for `kiln dev`.
//!
//! Routing is done by the [`HandlerChain`]; axum only provides the listener,
//! CORS and a single fallback that hands every request to the chain.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::{Request, State};
use axum::response::Response;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::dev::HandlerChain;
use crate::error::{CliError, Result};

pub struct DevServer {
    addr: SocketAddr,
    chain: HandlerChain,
}

impl DevServer {
    pub fn new(addr: SocketAddr, chain: HandlerChain) -> Self {
        Self { addr, chain }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.chain.clone())
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.addr)
            .await
            .map_err(|e| CliError::Server(format!("failed to bind to {}: {e}", self.addr)))
    }

    /// Serve on an already bound listener until the task is dropped.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %self.addr, handlers = ?self.chain, "dev server listening");
        axum::serve(listener, self.router())
            .await
            .map_err(|e| CliError::Server(e.to_string()))
    }
}

async fn dispatch(State(chain): State<HandlerChain>, request: Request) -> Response {
    chain.dispatch(request).await
}
