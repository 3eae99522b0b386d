//! `circleci_context`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    create_failed, decode, delete_failed, encode, lookup_failed, read_failed, removed_on_read,
    require, split_import_id, DataSource, Resource,
};
use crate::client::models::Restriction;
use crate::client::{ignore_not_found, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::types::ReadResult;

const ENTITY: &str = "context";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ContextModel {
    id: Option<String>,
    organization_id: Option<String>,
    name: Option<String>,
    created_at: Option<String>,
}

/// Manages a CircleCI context. Every attribute forces replacement.
pub struct ContextResource;

#[async_trait]
impl Resource for ContextResource {
    fn type_name(&self) -> &'static str {
        "circleci_context"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a CircleCI context.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "organization_id",
                Attribute::required_string()
                    .with_replace_on_change()
                    .with_description("UUID of the owning organization."),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_replace_on_change(),
            )
            .with_attribute("created_at", Attribute::computed_string())
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut plan: ContextModel = decode(planned)?;
        let organization_id = require(&plan.organization_id, "context organization_id")?;
        let name = require(&plan.name, "context name")?;

        let context = client
            .contexts
            .create(organization_id, name)
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(context_id = %context.id, "created context");

        plan.id = Some(context.id);
        plan.name = Some(context.name);
        plan.created_at = context.created_at;
        encode(&plan)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let mut current: ContextModel = decode(state)?;
        let id = require(&current.id, "context id")?.to_string();

        let Some(context) = client
            .contexts
            .get(&id)
            .await
            .optional()
            .map_err(|e| read_failed(ENTITY, &id, e))?
        else {
            return Ok(removed_on_read(ENTITY, &id));
        };

        current.name = Some(context.name);
        current.created_at = context.created_at;
        Ok(ReadResult::found(encode(&current)?))
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: ContextModel = decode(state)?;
        let id = require(&current.id, "context id")?;
        ignore_not_found(client.contexts.delete(id).await).map_err(|e| delete_failed(ENTITY, e))
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let (organization_id, context_id) = split_import_id(id, "organization_id/context_id")?;
        Ok(json!({ "organization_id": organization_id, "id": context_id }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct RestrictionModel {
    id: String,
    project_id: Option<String>,
    name: Option<String>,
    #[serde(rename = "type")]
    restriction_type: String,
    value: String,
}

impl From<Restriction> for RestrictionModel {
    fn from(r: Restriction) -> Self {
        Self {
            id: r.id,
            project_id: r.project_id,
            name: r.name,
            restriction_type: r.restriction_type,
            value: r.restriction_value,
        }
    }
}

/// Looks up a context together with its restrictions.
pub struct ContextDataSource;

#[async_trait]
impl DataSource for ContextDataSource {
    fn type_name(&self) -> &'static str {
        "circleci_context"
    }

    fn schema(&self) -> Schema {
        let restriction = AttributeType::object([
            ("id", AttributeType::String),
            ("project_id", AttributeType::String),
            ("name", AttributeType::String),
            ("type", AttributeType::String),
            ("value", AttributeType::String),
        ]);
        Schema::v0()
            .with_description("Looks up a CircleCI context.")
            .with_attribute("id", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute(
                "restrictions",
                Attribute::computed(AttributeType::list(restriction))
                    .with_description("Restrictions limiting who can use the context."),
            )
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let lookup: ContextModel = decode(config)?;
        let id = require(&lookup.id, "context id")?;

        let context = client
            .contexts
            .get(id)
            .await
            .map_err(|e| lookup_failed(ENTITY, id, e))?;
        let restrictions: Vec<RestrictionModel> = client
            .contexts
            .list_restrictions(id)
            .await
            .map_err(|e| read_failed("context restrictions", id, e))?
            .into_iter()
            .map(RestrictionModel::from)
            .collect();

        Ok(json!({
            "id": context.id,
            "name": context.name,
            "created_at": context.created_at,
            "restrictions": restrictions,
        }))
    }
}
