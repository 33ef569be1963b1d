//! Client, decoder and month cache for Compass Card usage history, plus the
//! HTTP interface that serves it as JSON.

pub mod cache;
pub mod config;
pub mod error;
pub mod paths;
pub mod portal;
pub mod server;
pub mod service_log;
pub mod usage;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
