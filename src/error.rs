use std::fmt;

use crate::types::Mode;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Io(std::io::Error),
    Config(String),
    /// Bad credentials, or the controller kept reporting an existing login.
    Auth(String),
    /// A status record that does not match the active wire format.
    Format { reason: String, record: String },
    /// Controller answered `-13`: the session was dropped server-side.
    SessionInvalidated,
    /// Controller answered a command with something other than `0`.
    Rejected(String),
    InvalidMode(Mode),
    /// Setpoint that is not a finite number of degrees.
    InvalidTemperature(f64),
    Fetch(Box<Error>),
    Command(Box<Error>),
}

impl Error {
    pub(crate) fn format(reason: impl Into<String>, record: impl Into<String>) -> Self {
        Error::Format {
            reason: reason.into(),
            record: record.into(),
        }
    }

    /// Whether the enclosing operation should be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::SessionInvalidated => true,
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// Raw controller response attached to a rejected command, if any.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Error::Rejected(body) => Some(body),
            Error::Fetch(inner) | Error::Command(inner) => inner.response_body(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Format { reason, record } => {
                write!(f, "unparseable status record ({reason}): {record:?}")
            }
            Error::SessionInvalidated => write!(f, "session invalidated by controller (-13)"),
            Error::Rejected(body) => write!(f, "controller rejected command: response {body:?}"),
            Error::InvalidMode(mode) => write!(f, "mode {mode:?} cannot be sent as a command"),
            Error::InvalidTemperature(celsius) => {
                write!(f, "setpoint {celsius} is not a valid temperature")
            }
            Error::Fetch(e) => write!(f, "fetch failed: {e}"),
            Error::Command(e) => write!(f, "command failed: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Fetch(e) | Error::Command(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
