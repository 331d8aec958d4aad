use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{TransportConfig, RETRY_STATUSES};
use crate::error::{AppError, Result};
use crate::transport::latency::LatencyStats;
use crate::transport::session::Session;

/// POSTs query parameters to the JSON endpoint over a rotating session.
pub struct TransportClient {
    cfg: TransportConfig,
    session: Option<Session>,
    latency: Arc<LatencyStats>,
}

impl TransportClient {
    pub fn new(cfg: TransportConfig, latency: Arc<LatencyStats>) -> Self {
        Self {
            cfg,
            session: None,
            latency,
        }
    }

    /// Issue one endpoint call and decode the JSON body.
    /// Opens a session first if none is active.
    pub async fn call(&mut self, params: &[(&str, String)]) -> Result<Value> {
        let mut session = match self.session.take() {
            Some(s) => s,
            None => Session::open(&self.cfg).await?,
        };

        let started = Instant::now();
        let resp = send_with_retry(&self.cfg, || {
            session.client().post(&self.cfg.url).query(params)
        })
        .await?;
        let body = resp.bytes().await?;
        self.latency.record(started.elapsed());
        session.count_request();
        debug!(?params, bytes = body.len(), "endpoint call ok");

        self.session = Some(session);
        Ok(serde_json::from_slice(&body)?)
    }

    /// Release the active session. The next call opens a fresh one.
    pub fn rotate(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(requests = session.requests(), "rotating session");
        }
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

/// Send the request built by `build`, retrying transient server statuses and
/// connection failures with exponential backoff.
pub(crate) async fn send_with_retry<F>(cfg: &TransportConfig, build: F) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut retry = 0u32;
    loop {
        let reason = match build().send().await {
            Ok(resp) if resp.status().is_success() => return Ok(resp),
            Ok(resp) if RETRY_STATUSES.contains(&resp.status().as_u16()) => {
                format!("status {}", resp.status())
            }
            Ok(resp) => {
                return Err(AppError::Transport(format!(
                    "{} returned status {}",
                    cfg.url,
                    resp.status()
                )))
            }
            Err(e) if e.is_connect() || e.is_timeout() => e.to_string(),
            Err(e) => return Err(e.into()),
        };

        if retry >= cfg.max_retries {
            return Err(AppError::Transport(format!(
                "{} still failing after {retry} retries: {reason}",
                cfg.url
            )));
        }
        retry += 1;
        let delay = cfg.backoff(retry);
        warn!(
            "Request to {} failed ({reason}); retry {retry}/{} in {delay:?}",
            cfg.url, cfg.max_retries
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::testutil::FakeEndpoint;

    fn client_for(endpoint: &FakeEndpoint) -> TransportClient {
        TransportClient::new(endpoint.transport(), Arc::new(LatencyStats::new()))
    }

    #[tokio::test]
    async fn post_carries_session_cookie_and_params() {
        let endpoint = FakeEndpoint::json(json!({"ok": true})).await;
        let mut client = client_for(&endpoint);

        let value = client
            .call(&[("jsontype", "last_odds.aspx".to_string()), ("matchid", "FB1".to_string())])
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));

        let calls = endpoint.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].param("jsontype"), Some("last_odds.aspx"));
        assert_eq!(calls[0].param("matchid"), Some("FB1"));
        assert_eq!(calls[0].cookie.as_deref(), Some("ASP.NET_SessionId=sess1"));
        assert_eq!(endpoint.sessions_opened(), 1);

        let url = reqwest::Url::parse(&endpoint.url).unwrap();
        assert!(client.session().unwrap().has_cookie(&url));
    }

    #[tokio::test]
    async fn session_is_reused_until_rotated() {
        let endpoint = FakeEndpoint::json(json!([])).await;
        let mut client = client_for(&endpoint);

        client.call(&[]).await.unwrap();
        client.call(&[]).await.unwrap();
        assert_eq!(endpoint.sessions_opened(), 1);
        assert_eq!(client.session().unwrap().requests(), 2);

        client.rotate();
        assert!(client.session().is_none());
        client.call(&[]).await.unwrap();
        assert_eq!(endpoint.sessions_opened(), 2);
        assert_eq!(endpoint.calls()[2].cookie.as_deref(), Some("ASP.NET_SessionId=sess2"));
    }

    #[tokio::test]
    async fn transient_statuses_are_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let endpoint = FakeEndpoint::start(move |_| {
            match seen.fetch_add(1, Ordering::SeqCst) {
                0 => (StatusCode::SERVICE_UNAVAILABLE, String::new()),
                1 => (StatusCode::BAD_GATEWAY, String::new()),
                _ => (StatusCode::OK, "{\"done\":1}".to_string()),
            }
        })
        .await;
        let mut client = client_for(&endpoint);

        let value = client.call(&[]).await.unwrap();
        assert_eq!(value, json!({"done": 1}));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_transport_error() {
        let endpoint =
            FakeEndpoint::start(|_| (StatusCode::INTERNAL_SERVER_ERROR, String::new())).await;
        let mut client = client_for(&endpoint);

        let err = client.call(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)), "{err}");
        // first attempt + MAX_RETRIES
        assert_eq!(endpoint.calls().len(), 6);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let endpoint = FakeEndpoint::start(|_| (StatusCode::NOT_FOUND, String::new())).await;
        let mut client = client_for(&endpoint);

        let err = client.call(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(ref m) if m.contains("404")), "{err}");
        assert_eq!(endpoint.calls().len(), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_not_retried() {
        let endpoint = FakeEndpoint::start(|_| (StatusCode::OK, "<html>".to_string())).await;
        let mut client = client_for(&endpoint);

        let err = client.call(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)), "{err}");
        assert_eq!(endpoint.calls().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_after_retries() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/football/getJSON.aspx");
        let mut cfg = TransportConfig::new(url, Duration::from_secs(2));
        cfg.backoff_base = Duration::from_millis(1);
        let mut client = TransportClient::new(cfg, Arc::new(LatencyStats::new()));

        let err = client.call(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(ref m) if m.contains("retries")), "{err}");
    }
}
