pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod journal;
pub mod logging;
pub mod price;
pub mod request;
pub mod scanner;
pub mod submitter;

pub use error::{RecoveryError, RecoveryResult};
