//! A local stand-in for a Pushgateway that records what it receives.

use axum::extract::{OriginalUri, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct GatewayState {
    status: StatusCode,
    delay: Duration,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

pub struct Gateway {
    pub address: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl Gateway {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn capture(
    State(state): State<GatewayState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    state.requests.lock().unwrap().push(CapturedRequest {
        path: uri.path().to_string(),
        content_type: header_value(header::CONTENT_TYPE),
        authorization: header_value(header::AUTHORIZATION),
        body,
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    if state.status.is_success() {
        (state.status, "")
    } else {
        (state.status, "gateway says no")
    }
}

/// Serve a fake gateway on an ephemeral port that answers with `status`.
pub async fn spawn_gateway(status: StatusCode) -> Gateway {
    spawn_slow_gateway(status, Duration::ZERO).await
}

/// Like [`spawn_gateway`], but each request is recorded on arrival and
/// answered only after `delay`.
pub async fn spawn_slow_gateway(status: StatusCode, delay: Duration) -> Gateway {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = GatewayState {
        status,
        delay,
        requests: Arc::clone(&requests),
    };
    let app = Router::new()
        .route("/metrics/job/{job}", post(capture))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Gateway {
        address: format!("http://{}", addr),
        requests,
    }
}
