//! CircleCI entity adapters.
//!
//! Every entity gets a [`Resource`] that maps declarative state onto REST
//! calls, and most get a read-only [`DataSource`]. Adapters are stateless:
//! the configured [`Client`] is handed to each lifecycle call, and values
//! arrive with unknown placeholders already replaced by `null`.

pub mod context;
pub mod context_environment_variable;
pub mod context_restriction;
pub mod organization;
pub mod pipeline;
pub mod project;
pub mod project_environment_variable;
pub mod trigger;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::{ApiError, Client};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::types::ReadResult;

/// Prefix shared by every resource and data source type name.
pub const TYPE_PREFIX: &str = "circleci_";

/// A managed CircleCI entity.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Full type name, e.g. `circleci_context`.
    fn type_name(&self) -> &'static str;

    /// Attribute table for this entity.
    fn schema(&self) -> Schema;

    /// Checks the static schema cannot express. `config` may still contain
    /// unknown placeholders.
    fn validate_config(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Adjust the planned state after computed values have been filled in.
    fn modify_plan(&self, planned: &mut Map<String, Value>, config: &Value) {
        let _ = (planned, config);
    }

    /// Create the remote entity and return the full state.
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh `state` from the API.
    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError>;

    /// Apply in-place changes. Entities whose attributes all force
    /// replacement never reach a real update, so the default returns the
    /// planned state unchanged.
    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (client, prior);
        Ok(planned)
    }

    /// Delete the remote entity. A missing entity counts as deleted.
    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError>;

    /// Seed state from an external identifier.
    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let _ = id;
        Err(ProviderError::invalid_input(
            "Import not supported",
            format!("Resource type {} cannot be imported.", self.type_name()),
        ))
    }
}

/// A read-only lookup of a CircleCI entity.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Full type name, e.g. `circleci_context`.
    fn type_name(&self) -> &'static str;

    /// Attribute table for this lookup.
    fn schema(&self) -> Schema;

    /// Look the entity up using the identifiers in `config`.
    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError>;
}

/// Every resource the provider serves.
pub fn resources() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(organization::OrganizationResource),
        Arc::new(project::ProjectResource),
        Arc::new(pipeline::PipelineResource),
        Arc::new(context::ContextResource),
        Arc::new(context_restriction::ContextRestrictionResource),
        Arc::new(context_environment_variable::ContextEnvironmentVariableResource),
        Arc::new(project_environment_variable::ProjectEnvironmentVariableResource),
        Arc::new(trigger::TriggerResource),
        Arc::new(webhook::WebhookResource),
    ]
}

/// Every data source the provider serves.
pub fn data_sources() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(organization::OrganizationDataSource),
        Arc::new(project::ProjectDataSource),
        Arc::new(pipeline::PipelineDataSource),
        Arc::new(context::ContextDataSource),
        Arc::new(context_environment_variable::ContextEnvironmentVariableDataSource),
        Arc::new(project_environment_variable::ProjectEnvironmentVariableDataSource),
        Arc::new(trigger::TriggerDataSource),
        Arc::new(webhook::WebhookDataSource),
    ]
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    let value = if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    };
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn encode<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

/// Borrow a required identifying field, failing with "Missing <what>".
pub(crate) fn require<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, ProviderError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => {
            let summary = format!("Missing {}", what);
            Err(ProviderError::invalid_input(summary.clone(), summary))
        },
    }
}

/// Empty strings from the API become `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Split `<left>/<right>` where both halves are non-empty and there is
/// exactly one separator.
pub(crate) fn split_import_id(id: &str, format: &str) -> Result<(String, String), ProviderError> {
    let parts: Vec<&str> = id.split('/').collect();
    match parts.as_slice() {
        [left, right] if !left.is_empty() && !right.is_empty() => {
            Ok((left.to_string(), right.to_string()))
        },
        _ => Err(ProviderError::invalid_input(
            "Invalid Import ID Format",
            format!("Expected import ID format: '{}'. Got: {}", format, id),
        )),
    }
}

fn capitalize(entity: &str) -> String {
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Outcome of a Read whose remote entity has disappeared.
pub(crate) fn removed_on_read(entity: &str, id: &str) -> ReadResult {
    let entity = capitalize(entity);
    ReadResult::removed(
        Diagnostic::warning(format!("{} not found during Read", entity)).with_detail(format!(
            "{} ID {} could not be retrieved from CircleCI. Removing from state.",
            entity, id
        )),
    )
}

pub(crate) fn create_failed(entity: &str, err: ApiError) -> ProviderError {
    ProviderError::remote(
        format!("Error creating CircleCI {}", entity),
        format!("Could not create CircleCI {}, unexpected error: {}", entity, err),
    )
}

pub(crate) fn read_failed(entity: &str, id: &str, err: ApiError) -> ProviderError {
    ProviderError::remote(
        format!("Error reading CircleCI {}", entity),
        format!("Unable to read CircleCI {} with id {}: {}", entity, id, err),
    )
}

pub(crate) fn update_failed(entity: &str, id: &str, err: ApiError) -> ProviderError {
    ProviderError::remote(
        format!("Error updating CircleCI {}", entity),
        format!("Unable to update CircleCI {} with id {}: {}", entity, id, err),
    )
}

pub(crate) fn delete_failed(entity: &str, err: ApiError) -> ProviderError {
    ProviderError::remote(
        format!("Error deleting CircleCI {}", entity),
        format!("Could not delete CircleCI {}, unexpected error: {}", entity, err),
    )
}

/// Data source lookups treat a missing entity as an error.
pub(crate) fn lookup_failed(entity: &str, id: &str, err: ApiError) -> ProviderError {
    if err.is_not_found() {
        let entity = capitalize(entity);
        ProviderError::remote(
            format!("{} not found", entity),
            format!("{} ID {} could not be found in CircleCI.", entity, id),
        )
    } else {
        read_failed(entity, id, err)
    }
}
