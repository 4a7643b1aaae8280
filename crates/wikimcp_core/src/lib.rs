pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod operations;
pub mod params;
pub mod result;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::WikiClient;
pub use config::{ClientConfig, WikiConfig, load_config};
pub use error::{Error, Result};
pub use operations::{Operation, dispatch};
pub use params::ArgumentBag;
pub use result::{OperationPayload, OperationResult};
