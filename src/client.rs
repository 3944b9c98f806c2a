use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    COMMAND_PATH, LOGIN_PATH, LOGOUT_PATH, MONITOR_FORM, WireFormat, check_command_response,
    command_form, decode_status, encode_command, json_command,
};
use crate::session::{Backoff, Credentials, RetryPolicy, Session, parse_base_url};
use crate::types::*;
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct FujitsuClientBuilder {
    url: String,
    credentials: Option<Credentials>,
    format: WireFormat,
    retry: RetryPolicy,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl FujitsuClientBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            format: WireFormat::default(),
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<FujitsuClient> {
        let base_url = parse_base_url(&self.url)?;
        let session = Session::new(base_url, self.credentials, self.timeout)?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, path)?),
            _ => None,
        };

        Ok(FujitsuClient {
            link: Mutex::new(Link { session, logger }),
            format: self.format,
            retry: self.retry,
        })
    }
}

/// Client for one Fujitsu controller.
///
/// Every operation logs in, performs a single request and logs out again.
/// The controller only has one login slot, so operations on the same client
/// are serialized; share the client behind an `Arc` rather than creating
/// several against the same controller.
pub struct FujitsuClient {
    link: Mutex<Link>,
    format: WireFormat,
    retry: RetryPolicy,
}

impl FujitsuClient {
    pub fn builder(url: impl Into<String>) -> FujitsuClientBuilder {
        FujitsuClientBuilder::new(url)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder(&config.url)
            .format(config.format)
            .retry_policy(config.retry_policy())
            .timeout(config.timeout());
        if let Some(creds) = config.credentials()? {
            builder = builder.credentials(creds.username, creds.password);
        }
        if let Some(log) = &config.message_log {
            builder = builder.message_log(log.mode, &log.path);
        }
        builder.build()
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Read the state of every unit on the controller.
    pub async fn fetch_all(&self) -> Result<Vec<UnitState>> {
        let mut link = self.link.lock().await;
        let mut backoff = Backoff::new(&self.retry);
        loop {
            let op = Uuid::new_v4();
            match link.fetch_once(self.format, op).await {
                Ok(units) => {
                    debug!(count = units.len(), "fetched unit states");
                    return Ok(units);
                }
                Err(e) => {
                    link.log_failure(op, &e);
                    if !backoff.retry(&e).await {
                        return Err(Error::Fetch(Box::new(e)));
                    }
                }
            }
        }
    }

    /// Send one command for one unit. Only the fields set in `change` are
    /// flagged; the rest keep their current device value. Nothing is cached,
    /// callers re-fetch or patch their own copy.
    pub async fn apply_settings(&self, unit: UnitIdentity, change: SettingsChange) -> Result<()> {
        if change.is_empty() {
            debug!(%unit, "empty settings change, nothing to send");
            return Ok(());
        }

        let request = match self.format {
            WireFormat::Csv => encode_command(unit, &change)
                .map(|command| Outbound::Form(command_form(&command))),
            WireFormat::Json => {
                json_command(unit, &change).map(|(path, body)| Outbound::Json(path, body))
            }
        }
        .map_err(|e| Error::Command(Box::new(e)))?;

        let mut link = self.link.lock().await;
        let mut backoff = Backoff::new(&self.retry);
        loop {
            let op = Uuid::new_v4();
            match link.apply_once(unit, &request, op).await {
                Ok(()) => {
                    debug!(%unit, ?change, "command accepted");
                    return Ok(());
                }
                Err(e) => {
                    link.log_failure(op, &e);
                    if !backoff.retry(&e).await {
                        return Err(Error::Command(Box::new(e)));
                    }
                }
            }
        }
    }

    pub async fn set_power(&self, unit: UnitIdentity, on: bool) -> Result<()> {
        self.apply_settings(unit, SettingsChange::new().power(on))
            .await
    }

    /// `Mode::Off` powers the unit off; any other mode powers it on as well.
    pub async fn set_mode(&self, unit: UnitIdentity, mode: Mode) -> Result<()> {
        let change = match mode {
            Mode::Off => SettingsChange::new().power(false),
            mode => SettingsChange::new().power(true).mode(mode),
        };
        self.apply_settings(unit, change).await
    }

    pub async fn set_temperature(&self, unit: UnitIdentity, celsius: f64) -> Result<()> {
        self.apply_settings(unit, SettingsChange::new().temperature(celsius))
            .await
    }

    pub async fn set_fan_speed(&self, unit: UnitIdentity, speed: FanSpeed) -> Result<()> {
        self.apply_settings(unit, SettingsChange::new().fan_speed(speed))
            .await
    }
}

enum Outbound {
    Form([(&'static str, String); 2]),
    Json(&'static str, Value),
}

/// Session plus message log, guarded together by the client's lock.
struct Link {
    session: Session,
    logger: Option<MessageLogger>,
}

impl Link {
    async fn fetch_once(&mut self, format: WireFormat, op: Uuid) -> Result<Vec<UnitState>> {
        self.acquire(op).await?;
        let path = format.status_path();
        if let Some(ref mut logger) = self.logger {
            logger.log_request(op, format.status_method(), path);
        }
        let body = match format {
            WireFormat::Csv => self.session.post_form(path, &MONITOR_FORM).await,
            WireFormat::Json => self.session.get(path).await,
        };
        self.release(op).await;

        let units = decode_status(format, &body?)?;
        if let Some(ref mut logger) = self.logger {
            logger.log_poll(op, &units);
        }
        Ok(units)
    }

    async fn apply_once(&mut self, unit: UnitIdentity, request: &Outbound, op: Uuid) -> Result<()> {
        self.acquire(op).await?;
        let body = match request {
            Outbound::Form(form) => {
                if let Some(ref mut logger) = self.logger {
                    logger.log_command(op, unit, COMMAND_PATH, &json!({ "arg2": form[1].1 }));
                }
                self.session.post_form(COMMAND_PATH, form).await
            }
            Outbound::Json(path, payload) => {
                if let Some(ref mut logger) = self.logger {
                    logger.log_command(op, unit, path, payload);
                }
                self.session.post_json(path, payload).await
            }
        };
        self.release(op).await;

        check_command_response(&body?)
    }

    async fn acquire(&mut self, op: Uuid) -> Result<()> {
        if self.session.has_credentials()
            && let Some(ref mut logger) = self.logger
        {
            logger.log_request(op, "POST", LOGIN_PATH);
        }
        self.session.login().await
    }

    async fn release(&mut self, op: Uuid) {
        if self.session.has_credentials()
            && let Some(ref mut logger) = self.logger
        {
            logger.log_request(op, "POST", LOGOUT_PATH);
        }
        self.session.logout().await;
    }

    fn log_failure(&mut self, op: Uuid, error: &Error) {
        if let Some(ref mut logger) = self.logger {
            logger.log_failure(op, error);
        }
    }
}
