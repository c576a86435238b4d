//! SignalFx / Splunk Observability Cloud provider plugin.
//!
//! Manages dashboards, dashboard groups, charts, SLOs, org tokens and
//! integrations through the SignalFx REST API, served to an
//! infrastructure-as-code host over a gRPC plugin protocol.
//!
//! # Layout
//!
//! - [`server`]: the plugin protocol, handshake and graceful shutdown
//! - [`provider`]: configuration and routing to resources
//! - [`resources`]: one module per resource kind, plus data sources
//! - [`client`]: typed REST client with retries
//! - [`waiter`]: polling cloud integrations until they settle
//! - [`reconcile`]: list diffing for mirrored dashboards
//! - [`config`]: credential loading from files, netrc and environment
//!
//! # Handshake
//!
//! Once listening, the binary prints one line on stdout:
//!
//! ```text
//! PROVIDER_PLUGIN|1|127.0.0.1:50051
//! ```
//!
//! Everything else, logs included, goes to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod reconcile;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;
pub mod waiter;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::SignalFxClient;
pub use config::{CredentialSources, ProviderConfig, ResolvedConfig};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ProviderContext, SignalFxProvider};
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_with_options, serve_with_shutdown, ProviderService, ServeOptions};
pub use types::{AttributeChange, ImportedResource, PlanResult, HANDSHAKE_PREFIX, PROTOCOL_VERSION};
pub use waiter::WaitOptions;
