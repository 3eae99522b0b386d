//! `circleci_context_restriction`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    create_failed, decode, delete_failed, encode, read_failed, removed_on_read, require,
    split_import_id, Resource,
};
use crate::client::{ignore_not_found, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::{is_unknown, ReadResult};

const ENTITY: &str = "context restriction";

const RESTRICTION_TYPES: [&str; 3] = ["project", "expression", "group"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct RestrictionModel {
    id: Option<String>,
    context_id: Option<String>,
    project_id: Option<String>,
    name: Option<String>,
    #[serde(rename = "type")]
    restriction_type: Option<String>,
    value: Option<String>,
}

/// Manages one restriction on a context. Every attribute forces replacement.
pub struct ContextRestrictionResource;

#[async_trait]
impl Resource for ContextRestrictionResource {
    fn type_name(&self) -> &'static str {
        "circleci_context_restriction"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Restricts which projects or expressions may use a context.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "context_id",
                Attribute::required_string().with_replace_on_change(),
            )
            .with_attribute("project_id", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_replace_on_change()
                    .with_description("One of `project`, `expression` or `group`."),
            )
            .with_attribute(
                "value",
                Attribute::required_string().with_replace_on_change(),
            )
    }

    fn validate_config(&self, config: &Value) -> Vec<Diagnostic> {
        let Some(t) = config.get("type").and_then(Value::as_str) else {
            return Vec::new();
        };
        if is_unknown(&config["type"]) || RESTRICTION_TYPES.contains(&t) {
            return Vec::new();
        }
        vec![Diagnostic::error("Invalid restriction type")
            .with_detail(format!(
                "Restriction type must be one of {}. Got: {}",
                RESTRICTION_TYPES.join(", "),
                t
            ))
            .with_attribute("type")]
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut plan: RestrictionModel = decode(planned)?;
        let context_id = require(&plan.context_id, "context_id")?;
        let restriction_type = require(&plan.restriction_type, "restriction type")?;
        let value = require(&plan.value, "restriction value")?;

        let restriction = client
            .contexts
            .create_restriction(context_id, value, restriction_type)
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(restriction_id = %restriction.id, "created context restriction");

        plan.id = Some(restriction.id);
        plan.project_id = restriction.project_id;
        plan.name = restriction.name;
        encode(&plan)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let current: RestrictionModel = decode(state)?;
        let id = require(&current.id, "context restriction id")?;
        let context_id = require(&current.context_id, "context_id")?;

        let restriction = client
            .contexts
            .list_restrictions(context_id)
            .await
            .optional()
            .map_err(|e| read_failed(ENTITY, id, e))?
            .and_then(|list| list.into_iter().find(|r| r.id == id));

        let Some(restriction) = restriction else {
            return Ok(removed_on_read(ENTITY, id));
        };

        let refreshed = RestrictionModel {
            id: Some(restriction.id),
            context_id: current.context_id.clone(),
            project_id: restriction.project_id,
            name: restriction.name,
            restriction_type: Some(restriction.restriction_type),
            value: Some(restriction.restriction_value),
        };
        Ok(ReadResult::found(encode(&refreshed)?))
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: RestrictionModel = decode(state)?;
        let id = require(&current.id, "context restriction id")?;
        let context_id = require(&current.context_id, "context_id")?;
        ignore_not_found(client.contexts.delete_restriction(context_id, id).await)
            .map_err(|e| delete_failed(ENTITY, e))
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let (context_id, restriction_id) = split_import_id(id, "context_id/restriction_id")?;
        Ok(json!({ "context_id": context_id, "id": restriction_id }))
    }
}
