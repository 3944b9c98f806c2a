use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Local;
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::{ALREADY_LOGGED_IN, LOGIN_PATH, LOGOUT_PATH, SUCCESS, login_form};
use crate::{Error, Result};

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bounded exponential backoff for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

pub(crate) struct Backoff<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
}

impl<'a> Backoff<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self { policy, attempt: 1 }
    }

    /// Sleep and return true if `err` is transient and attempts remain.
    pub async fn retry(&mut self, err: &Error) -> bool {
        if !err.is_transient() || self.attempt >= self.policy.max_attempts {
            return false;
        }
        let delay = self.policy.delay_for(self.attempt);
        warn!(
            error = %err,
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            "transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        self.attempt += 1;
        true
    }
}

/// Cookie provider whose contents can be dropped on logout.
#[derive(Default)]
struct SessionCookies(RwLock<Arc<Jar>>);

impl SessionCookies {
    fn current(&self) -> Arc<Jar> {
        Arc::clone(&self.0.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Jar::default());
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.current().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.current().cookies(url)
    }
}

/// Authenticated HTTP session against one controller. The controller has a
/// single login slot, so callers hold a session for exactly one request.
pub(crate) struct Session {
    http: reqwest::Client,
    cookies: Arc<SessionCookies>,
    base_url: Url,
    credentials: Option<Credentials>,
    logged_in: bool,
}

impl Session {
    pub fn new(base_url: Url, credentials: Option<Credentials>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let cookies = Arc::new(SessionCookies::default());
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&cookies))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            cookies,
            base_url,
            credentials,
            logged_in: false,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("cannot join {path:?} onto base URL: {e}")))
    }

    /// Log in. An "already logged in" answer triggers one logout and one
    /// more attempt; a second such answer is an auth failure.
    pub async fn login(&mut self) -> Result<()> {
        let Some(credentials) = self.credentials.clone() else {
            return Ok(());
        };

        let body = self.post_login(&credentials).await?;
        if body == ALREADY_LOGGED_IN {
            info!("controller reports an existing login, logging out and retrying");
            self.logout().await;
            let body = self.post_login(&credentials).await?;
            if body == ALREADY_LOGGED_IN {
                return Err(Error::Auth(
                    "controller still reports an existing login after logout".to_string(),
                ));
            }
            check_login_response(&body)?;
        } else {
            check_login_response(&body)?;
        }

        debug!(user = %credentials.username, "logged in");
        self.logged_in = true;
        Ok(())
    }

    async fn post_login(&self, credentials: &Credentials) -> Result<String> {
        let logintime = Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        let form = login_form(&credentials.username, &credentials.password, &logintime);
        self.post_form(LOGIN_PATH, &form).await
    }

    /// Best effort. Local cookies are dropped whatever the controller says.
    pub async fn logout(&mut self) {
        if self.credentials.is_none() {
            self.cookies.clear();
            return;
        }
        match self.url(LOGOUT_PATH) {
            Ok(url) => {
                if let Err(e) = self.http.post(url).send().await {
                    debug!(error = %e, "logout request failed, ignoring");
                }
            }
            Err(e) => debug!(error = %e, "no logout URL"),
        }
        self.cookies.clear();
        debug!(was_logged_in = self.logged_in, "session released");
        self.logged_in = false;
    }

    pub async fn post_form(&self, path: &str, form: &impl Serialize) -> Result<String> {
        let url = self.url(path)?;
        debug!(url = %url, "POST form");
        let body = self
            .http
            .post(url)
            .form(form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body.trim().to_string())
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<String> {
        let url = self.url(path)?;
        debug!(url = %url, "POST json");
        let body = self
            .http
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body.trim().to_string())
    }

    pub async fn get(&self, path: &str) -> Result<String> {
        let url = self.url(path)?;
        debug!(url = %url, "GET");
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

fn check_login_response(body: &str) -> Result<()> {
    if body == SUCCESS {
        Ok(())
    } else {
        Err(Error::Auth(format!("login rejected with response {body:?}")))
    }
}

/// Normalize a configured base URL so relative endpoint paths join under it.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| Error::Config(format!("invalid URL {raw:?}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
