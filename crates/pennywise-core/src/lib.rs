pub mod aggregate;
pub mod commands;
pub mod config;
pub mod context;
pub mod contracts;
pub mod error;
pub mod insights;
pub mod ledger;
pub mod migrations;
pub mod recurring;
pub mod setup;
pub mod state;

pub use contracts::envelope::{FailureEnvelope, SuccessEnvelope};
pub use error::{CoreError, CoreResult, ErrorKind};

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
