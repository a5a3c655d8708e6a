//! In-process stand-in for the upstream nitter server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub host: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct Upstream {
    feeds: Mutex<HashMap<String, (u16, String)>>,
    seen: Mutex<Vec<SeenRequest>>,
    delay: Duration,
}

pub struct FakeUpstream {
    pub base_url: String,
    state: Arc<Upstream>,
}

impl FakeUpstream {
    /// Serve `(name, status, body)` triples; unknown names answer 404.
    pub async fn spawn(feeds: &[(&str, u16, &str)]) -> Self {
        Self::spawn_slow(feeds, Duration::ZERO).await
    }

    /// Like [`FakeUpstream::spawn`], but every response waits `delay` first.
    pub async fn spawn_slow(feeds: &[(&str, u16, &str)], delay: Duration) -> Self {
        let state = Arc::new(Upstream {
            delay,
            ..Upstream::default()
        });
        for (name, status, body) in feeds {
            state
                .feeds
                .lock()
                .unwrap()
                .insert(name.to_string(), (*status, body.to_string()));
        }

        let app = Router::new()
            .route("/{name}/rss", get(feed_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }
}

async fn feed_handler(
    State(state): State<Arc<Upstream>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.seen.lock().unwrap().push(SeenRequest {
        path: format!("/{}/rss", name),
        host: header_value(header::HOST),
        authorization: header_value(header::AUTHORIZATION),
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let feed = state.feeds.lock().unwrap().get(&name).cloned();
    match feed {
        Some((status, body)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}
