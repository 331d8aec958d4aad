//! In-process stand-in for the HKJC JSON endpoint.
//!
//! GET hands out a numbered session cookie; POST records the query string and
//! the cookie it arrived with, then answers through a scripted responder.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::Value;

use crate::config::TransportConfig;

pub const ENDPOINT_PATH: &str = "/football/getJSON.aspx";

type Responder = Arc<dyn Fn(&HashMap<String, String>) -> (StatusCode, String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub params: HashMap<String, String>,
    pub cookie: Option<String>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(Clone)]
struct FakeState {
    responder: Responder,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    sessions_opened: Arc<AtomicUsize>,
}

pub struct FakeEndpoint {
    pub url: String,
    state: FakeState,
}

impl FakeEndpoint {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&HashMap<String, String>) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let state = FakeState {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
            sessions_opened: Arc::new(AtomicUsize::new(0)),
        };
        let app = Router::new()
            .route(ENDPOINT_PATH, get(open_session).post(answer))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}{ENDPOINT_PATH}"),
            state,
        }
    }

    /// Answer every POST with `body` and 200.
    pub async fn json(body: Value) -> Self {
        let text = body.to_string();
        Self::start(move |_| (StatusCode::OK, text.clone())).await
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    /// Transport settings aimed at this endpoint with millisecond backoff.
    pub fn transport(&self) -> TransportConfig {
        let mut cfg = TransportConfig::new(self.url.clone(), Duration::from_secs(5));
        cfg.backoff_base = Duration::from_millis(1);
        cfg
    }
}

async fn open_session(State(state): State<FakeState>) -> impl IntoResponse {
    let n = state.sessions_opened.fetch_add(1, Ordering::SeqCst) + 1;
    (
        [(header::SET_COOKIE, format!("ASP.NET_SessionId=sess{n}; Path=/"))],
        "",
    )
}

async fn answer(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.calls.lock().unwrap().push(RecordedCall {
        params: params.clone(),
        cookie,
    });
    (state.responder)(&params)
}

/// Minimal finished-match object as returned by `search_result.aspx`.
pub fn match_json(id: &str) -> Value {
    serde_json::json!({
        "matchID": id,
        "matchDate": "2024-03-30+08:00",
        "tournament": {"tournamentNameEN": "Eng Premier"},
        "homeTeam": {"teamNameEN": format!("{id} Home")},
        "awayTeam": {"teamNameEN": format!("{id} Away")}
    })
}

/// Odds markets for one match, without any match fields.
pub fn odds_json() -> Value {
    serde_json::json!({
        "accumulatedscore": [{"home": "1", "away": "0"}, {"home": "2", "away": "0"}],
        "fhaodds": {"H": "100@2.45", "D": "100@2.10", "A": "100@4.60"},
        "hadodds": {"H": "100@1.95", "D": "100@3.40", "A": "100@3.70"},
        "hhaodds": {"HG": "-1", "AG": "+1", "H": "100@3.60", "D": "100@3.55", "A": "100@1.80"},
        "ooeodds": {"O": "100@1.90", "E": "100@1.90"},
        "ftsodds": {"H": "100@1.55", "N": "100@9.00", "A": "100@2.60"}
    })
}

/// Match fields merged with odds markets, as in `odds_allodds.aspx`.
pub fn match_with_odds_json(id: &str) -> Value {
    let mut v = match_json(id);
    if let (Some(m), Value::Object(odds)) = (v.as_object_mut(), odds_json()) {
        m.extend(odds);
    }
    v
}

/// Unique CSV path under the system temp dir. The file is not created.
pub fn temp_csv_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("hkjc-{name}-{}-{nanos}.csv", std::process::id()))
}
