//! `circleci_project_environment_variable`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    create_failed, decode, delete_failed, encode, lookup_failed, read_failed, removed_on_read,
    require, DataSource, Resource,
};
use crate::client::{ignore_not_found, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::types::ReadResult;

const ENTITY: &str = "project environment variable";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct VariableModel {
    name: Option<String>,
    value: Option<String>,
    project_slug: Option<String>,
    created_at: Option<String>,
}

/// RFC 3339 with milliseconds, or an empty string when the API sent nothing.
fn format_created_at(created_at: Option<DateTime<Utc>>) -> String {
    created_at
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Manages one environment variable on a project.
pub struct ProjectEnvironmentVariableResource;

#[async_trait]
impl Resource for ProjectEnvironmentVariableResource {
    fn type_name(&self) -> &'static str {
        "circleci_project_environment_variable"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an environment variable on a CircleCI project.")
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
                "project_slug",
                Attribute::required_string()
                    .with_replace_on_change()
                    .with_description("Project slug, e.g. `circleci/<org_id>/<project_id>`."),
            )
            .with_attribute("created_at", Attribute::computed_string())
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut plan: VariableModel = decode(planned)?;
        let slug = require(&plan.project_slug, "project_slug")?;
        let name = require(&plan.name, "environment variable name")?;
        let value = require(&plan.value, "environment variable value")?;

        let variable = client
            .project_variables
            .create(slug, name, value)
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(project_slug = %slug, name = %variable.name, "created project variable");

        plan.created_at = Some(format_created_at(variable.created_at));
        encode(&plan)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let mut current: VariableModel = decode(state)?;
        let slug = require(&current.project_slug, "project_slug")?.to_string();
        let name = require(&current.name, "environment variable name")?.to_string();

        let Some(variable) = client
            .project_variables
            .get(&slug, &name)
            .await
            .optional()
            .map_err(|e| read_failed(ENTITY, &name, e))?
        else {
            return Ok(removed_on_read(ENTITY, &name));
        };

        current.name = Some(variable.name);
        current.created_at = Some(format_created_at(variable.created_at));
        Ok(ReadResult::found(encode(&current)?))
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: VariableModel = decode(state)?;
        let slug = require(&current.project_slug, "project_slug")?;
        let name = require(&current.name, "environment variable name")?;
        ignore_not_found(client.project_variables.delete(slug, name).await)
            .map_err(|e| delete_failed(ENTITY, e))
    }

    /// The slug itself contains slashes, so the name is everything after
    /// the last one.
    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        match id.rsplit_once('/') {
            Some((slug, name)) if !slug.is_empty() && !name.is_empty() => {
                Ok(json!({ "project_slug": slug, "name": name }))
            },
            _ => Err(ProviderError::invalid_input(
                "Invalid Import ID Format",
                format!(
                    "Expected import ID format: 'project_slug/env_var_name' (e.g. 'circleci/org_id/project_id/MY_VAR'). Got: {}",
                    id
                ),
            )),
        }
    }
}

/// Looks up a project variable. The value comes back masked.
pub struct ProjectEnvironmentVariableDataSource;

#[async_trait]
impl DataSource for ProjectEnvironmentVariableDataSource {
    fn type_name(&self) -> &'static str {
        "circleci_project_environment_variable"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Looks up an environment variable on a CircleCI project.")
            .with_attribute("name", Attribute::required_string())
            .with_attribute("project_slug", Attribute::required_string())
            .with_attribute(
                "value",
                Attribute::computed_string()
                    .sensitive()
                    .with_description("Masked value as returned by CircleCI."),
            )
            .with_attribute("created_at", Attribute::computed_string())
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let lookup: VariableModel = decode(config)?;
        let slug = require(&lookup.project_slug, "project_slug")?;
        let name = require(&lookup.name, "environment variable name")?;

        let variable = client
            .project_variables
            .get(slug, name)
            .await
            .map_err(|e| lookup_failed(ENTITY, name, e))?;

        encode(&VariableModel {
            name: Some(variable.name),
            value: Some(variable.value),
            project_slug: Some(slug.to_string()),
            created_at: Some(format_created_at(variable.created_at)),
        })
    }
}
