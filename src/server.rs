use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::signal::ctrl_c;
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::error::ProxyError;

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    rt: Option<String>,
}

impl FeedQuery {
    /// Reshared items are dropped unless `rt` is present with a value other
    /// than empty, `0` or `false`.
    fn include_reshares(&self) -> bool {
        match self.rt.as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some(_) => true,
        }
    }
}

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/x/{*path}", get(feed_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

// Matched as a wildcard so that an empty name (`/x//rss`) reaches the
// handler and gets a 400 instead of a routing 404.
async fn feed_handler(
    State(app): State<Arc<App>>,
    Path(path): Path<String>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let Some(name) = path.strip_suffix("/rss") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if name.contains('/') {
        return StatusCode::NOT_FOUND.into_response();
    }

    match app.handle_request(name, query.include_reshares()).await {
        Ok(body) => ([(CONTENT_TYPE, RSS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            if let ProxyError::Store(inner) = &e {
                tracing::error!("[{}] failed to record request: {}", name, inner);
            }
            e.into_response()
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
