//! HTTP implementation of the `hapifs-provider` remote gateway contract.
//!
//! [`HapiClient`] talks to a HAPI gatekeeper over its JSON and multipart
//! routes. [`HttpConnector`] hands the provider one client per gatekeeper URL.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hapifs_gateway::{GatewayConfig, HttpConnector};
//! use hapifs_provider::{LocalHost, MemoryCredentialStore, PathCache, ProviderAdapter, ProviderConfig};
//!
//! let provider = ProviderAdapter::new(
//!     ProviderConfig::default(),
//!     Arc::new(HttpConnector::new(GatewayConfig::default())),
//!     Arc::new(MemoryCredentialStore::new()),
//!     Arc::new(LocalHost::new()),
//!     PathCache::in_memory(),
//! );
//! ```

mod client;
mod config;
mod types;

pub use client::{HapiClient, HttpConnector, TOKEN_HEADER};
pub use config::{DEFAULT_TIMEOUT, GatewayConfig};
pub use types::parse_timestamp;
