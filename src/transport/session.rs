use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::error::{AppError, Result};
use crate::transport::client::send_with_retry;

/// One anonymous, cookie-bearing connection context.
///
/// Opening a session issues a bare GET against the endpoint so the server can
/// hand out its session cookie; every later request on the same session
/// carries it. Dropping the session releases the connection pool and jar.
pub struct Session {
    client: reqwest::Client,
    jar: Arc<Jar>,
    requests: usize,
}

impl Session {
    pub async fn open(cfg: &TransportConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&cfg.url)
            .map_err(|e| AppError::Config(format!("invalid endpoint URL {}: {e}", cfg.url)))?;

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(cfg.timeout)
            .build()?;

        send_with_retry(cfg, || client.get(url.clone())).await?;

        let session = Self { client, jar, requests: 0 };
        if session.has_cookie(&url) {
            debug!("Session opened with cookie from {}", cfg.url);
        } else {
            warn!("Session opened but {} issued no cookie", cfg.url);
        }
        Ok(session)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn has_cookie(&self, url: &reqwest::Url) -> bool {
        self.jar.cookies(url).is_some()
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub(crate) fn count_request(&mut self) {
        self.requests += 1;
    }
}
