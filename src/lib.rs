//! CircleCI provider
//!
//! An infrastructure-as-code provider for the CircleCI REST API. It runs as a
//! plugin process: the host spawns it, reads a handshake line from stdout and
//! drives it over gRPC.
//!
//! # Resources
//!
//! | type | import id |
//! |------|-----------|
//! | `circleci_organization` | `<id>` |
//! | `circleci_project` | `<vcs>/<org>/<project>` |
//! | `circleci_pipeline` | `<project_id>/<id>` |
//! | `circleci_trigger` | `<project_id>/<id>` |
//! | `circleci_context` | `<organization_id>/<context_id>` |
//! | `circleci_context_restriction` | `<context_id>/<restriction_id>` |
//! | `circleci_context_environment_variable` | `<context_id>/<name>` |
//! | `circleci_project_environment_variable` | `<project_slug>/<name>` |
//! | `circleci_webhook` | `<scope_id>/<webhook_id>` |
//!
//! Every type except `circleci_context_restriction` also has a read-only data
//! source of the same name.
//!
//! # Handshake Protocol
//!
//! Once the gRPC listener is bound, [`serve`] prints:
//!
//! ```text
//! CIRCLECI_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `CIRCLECI_PROVIDER|<protocol_version>|<address>`. Logs go to
//! stderr so stdout carries nothing else.
//!
//! # Protocol
//!
//! - **GetMetadata** / **GetSchema**: resource and data source names and schemas
//! - **ValidateProviderConfig** / **Configure**: resolve `host` and `key`, build the client
//! - **ValidateResourceConfig**: schema checks plus per-resource rules
//! - **Plan**: computed values, plan modifiers and replacement detection
//! - **Create/Read/Update/Delete**: one CircleCI API call sequence each
//! - **ImportResourceState**: parse a composite import id
//! - **ValidateDataSourceConfig** / **ReadDataSource**: lookups
//! - **Stop**: drop the client

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod types;
pub mod validation;
pub mod validators;
pub mod webhook_url;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiError, Client};
pub use config::Config;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::CircleCiProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_on_with_options, serve_until, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ReadResult,
    ServerCapabilities, HANDSHAKE_PREFIX, PROTOCOL_VERSION, UNKNOWN_VALUE,
};
