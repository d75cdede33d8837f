mod client;
mod config;
mod diff;
mod error;
mod logger;
pub mod projection;
mod protocol;
mod shared;
mod types;

pub use client::{CommandOutcome, ModeInference, PollOutcome, SalusClient, SalusClientBuilder};
pub use config::Config;
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::DEFAULT_BASE_URL;
pub use shared::SharedThermostat;
pub use types::*;
