//! `circleci_context_environment_variable`.
//!
//! The API never returns variable values, so state keeps whatever value was
//! last written.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    create_failed, decode, delete_failed, encode, lookup_failed, read_failed, removed_on_read,
    require, split_import_id, DataSource, Resource,
};
use crate::client::models::ContextEnvironmentVariable;
use crate::client::{ignore_not_found, ApiError, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::types::ReadResult;

const ENTITY: &str = "context environment variable";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct VariableModel {
    name: Option<String>,
    value: Option<String>,
    context_id: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

async fn find(
    client: &Client,
    context_id: &str,
    name: &str,
) -> Result<Option<ContextEnvironmentVariable>, ApiError> {
    Ok(client
        .context_variables
        .list(context_id)
        .await
        .optional()?
        .and_then(|vars| vars.into_iter().find(|v| v.variable == name)))
}

/// Manages one variable stored in a context.
pub struct ContextEnvironmentVariableResource;

#[async_trait]
impl Resource for ContextEnvironmentVariableResource {
    fn type_name(&self) -> &'static str {
        "circleci_context_environment_variable"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an environment variable stored in a CircleCI context.")
            .with_attribute(
                "name",
                Attribute::required_string().with_replace_on_change(),
            )
            .with_attribute(
                "value",
                Attribute::required_string()
                    .with_replace_on_change()
                    .sensitive(),
            )
            .with_attribute(
                "context_id",
                Attribute::required_string().with_replace_on_change(),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut plan: VariableModel = decode(planned)?;
        let context_id = require(&plan.context_id, "context_id")?;
        let name = require(&plan.name, "environment variable name")?;
        let value = require(&plan.value, "environment variable value")?;

        let variable = client
            .context_variables
            .upsert(context_id, name, value)
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(context_id = %variable.context_id, name = %variable.variable, "stored context variable");

        plan.created_at = variable.created_at;
        plan.updated_at = variable.updated_at;
        encode(&plan)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let mut current: VariableModel = decode(state)?;
        let context_id = require(&current.context_id, "context_id")?.to_string();
        let name = require(&current.name, "environment variable name")?.to_string();

        let Some(variable) = find(client, &context_id, &name)
            .await
            .map_err(|e| read_failed(ENTITY, &name, e))?
        else {
            return Ok(removed_on_read(ENTITY, &name));
        };

        current.created_at = variable.created_at;
        current.updated_at = variable.updated_at;
        Ok(ReadResult::found(encode(&current)?))
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: VariableModel = decode(state)?;
        let context_id = require(&current.context_id, "context_id")?;
        let name = require(&current.name, "environment variable name")?;
        ignore_not_found(client.context_variables.delete(context_id, name).await)
            .map_err(|e| delete_failed(ENTITY, e))
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let (context_id, name) = split_import_id(id, "context_id/name")?;
        Ok(json!({ "context_id": context_id, "name": name }))
    }
}

/// Looks up the metadata of a context variable.
pub struct ContextEnvironmentVariableDataSource;

#[async_trait]
impl DataSource for ContextEnvironmentVariableDataSource {
    fn type_name(&self) -> &'static str {
        "circleci_context_environment_variable"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Looks up an environment variable stored in a CircleCI context.")
            .with_attribute("name", Attribute::required_string())
            .with_attribute("context_id", Attribute::required_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let lookup: VariableModel = decode(config)?;
        let context_id = require(&lookup.context_id, "context_id")?;
        let name = require(&lookup.name, "environment variable name")?;

        let variable = find(client, context_id, name)
            .await
            .map_err(|e| read_failed(ENTITY, name, e))?
            .ok_or_else(|| {
                lookup_failed(
                    ENTITY,
                    name,
                    ApiError::NotFound {
                        path: format!("context/{}/environment-variable/{}", context_id, name),
                    },
                )
            })?;

        Ok(json!({
            "name": variable.variable,
            "context_id": context_id,
            "created_at": variable.created_at,
            "updated_at": variable.updated_at,
        }))
    }
}
