mod client;
mod climate;
mod config;
mod coordinator;
mod error;
mod logger;
mod protocol;
mod session;
mod types;

pub use client::{FujitsuClient, FujitsuClientBuilder};
pub use climate::{Climate, HvacMode, PRECISION};
pub use config::{Config, MessageLogConfig, RetryConfig};
pub use coordinator::{Context, Coordinator, DEFAULT_SCAN_INTERVAL};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::{Command, WireFormat, decode_status, encode_command};
pub use session::{Credentials, RetryPolicy};
pub use types::*;
