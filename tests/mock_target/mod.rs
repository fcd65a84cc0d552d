//! Mock bombardment target
//!
//! A minimal axum server exposing the `/api/{x}/{y}` endpoint the engine
//! posts to, with configurable behavior and enough instrumentation to
//! verify pacing, concurrency bounds, and error accounting from the
//! outside.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use tokio::net::TcpListener;

/// How the target responds to each request.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// 200 after an optional processing delay
    Ok { delay: Duration },
    /// Fixed error status with a fixed body
    Error { status: u16, body: &'static str },
}

/// Counters observed by tests.
#[derive(Debug, Default)]
pub struct TargetStats {
    /// Requests that reached the handler
    pub hits: AtomicU64,
    /// Requests that ran to completion
    pub completed: AtomicU64,
    /// Requests currently inside the handler
    in_flight: AtomicI64,
    /// High-water mark of `in_flight`
    max_in_flight: AtomicI64,
}

impl TargetStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> i64 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Restart the high-water mark from the current in-flight count.
    pub fn reset_max_in_flight(&self) {
        self.max_in_flight
            .store(self.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
    }
}

struct TargetState {
    behavior: Behavior,
    stats: Arc<TargetStats>,
}

/// Spawn the mock target on an ephemeral port.
pub async fn spawn_target(behavior: Behavior) -> (SocketAddr, Arc<TargetStats>) {
    let stats = Arc::new(TargetStats::default());
    let state = Arc::new(TargetState {
        behavior,
        stats: stats.clone(),
    });

    let app = Router::new()
        .route("/api/{x}/{y}", post(handle_board_post))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock target");
    let addr = listener.local_addr().expect("mock target local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock target");
    });

    (addr, stats)
}

async fn handle_board_post(
    State(state): State<Arc<TargetState>>,
    Path((_x, _y)): Path<(u32, u32)>,
    _body: Bytes,
) -> Response {
    let stats = &state.stats;
    stats.hits.fetch_add(1, Ordering::SeqCst);
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.max_in_flight.fetch_max(now, Ordering::SeqCst);

    let response = match state.behavior {
        Behavior::Ok { delay } => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            StatusCode::OK.into_response()
        }
        Behavior::Error { status, body } => (
            StatusCode::from_u16(status).expect("valid mock status"),
            body,
        )
            .into_response(),
    };

    stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    stats.completed.fetch_add(1, Ordering::SeqCst);
    response
}
