//! `circleci_pipeline`: a pipeline definition inside a project.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    create_failed, decode, delete_failed, encode, lookup_failed, read_failed, removed_on_read,
    require, split_import_id, update_failed, DataSource, Resource,
};
use crate::client::models::{CheckoutSource, ConfigSource, PipelineDefinition, Repo};
use crate::client::{ignore_not_found, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::types::ReadResult;

const ENTITY: &str = "pipeline";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct PipelineModel {
    id: Option<String>,
    project_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    created_at: Option<String>,
    config_source_provider: Option<String>,
    config_source_repo_full_name: Option<String>,
    config_source_repo_external_id: Option<String>,
    config_source_file_path: Option<String>,
    checkout_source_provider: Option<String>,
    checkout_source_repo_full_name: Option<String>,
    checkout_source_repo_external_id: Option<String>,
}

impl PipelineModel {
    fn checkout_source(&self) -> CheckoutSource {
        CheckoutSource {
            provider: self.checkout_source_provider.clone(),
            repo: Some(Repo {
                full_name: None,
                external_id: self.checkout_source_repo_external_id.clone(),
            }),
        }
    }

    fn to_definition(&self) -> PipelineDefinition {
        PipelineDefinition {
            id: None,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: None,
            config_source: Some(ConfigSource {
                provider: self.config_source_provider.clone(),
                repo: Some(Repo {
                    full_name: None,
                    external_id: self.config_source_repo_external_id.clone(),
                }),
                file_path: self.config_source_file_path.clone(),
            }),
            checkout_source: Some(self.checkout_source()),
        }
    }

    /// The patch body: only the fields the API lets an update change.
    fn to_changes(&self) -> PipelineDefinition {
        PipelineDefinition {
            description: self.description.clone(),
            config_source: Some(ConfigSource {
                file_path: self.config_source_file_path.clone(),
                ..Default::default()
            }),
            checkout_source: Some(self.checkout_source()),
            ..Default::default()
        }
    }

    fn apply(&mut self, definition: PipelineDefinition) {
        let config = definition.config_source.unwrap_or_default();
        let config_repo = config.repo.unwrap_or_default();
        let checkout = definition.checkout_source.unwrap_or_default();
        let checkout_repo = checkout.repo.unwrap_or_default();

        self.id = definition.id.or(self.id.take());
        self.name = definition.name;
        self.description = definition.description;
        self.created_at = definition.created_at;
        self.config_source_provider = config.provider;
        self.config_source_repo_full_name = config_repo.full_name;
        self.config_source_repo_external_id = config_repo.external_id;
        self.config_source_file_path = config.file_path;
        self.checkout_source_provider = checkout.provider;
        self.checkout_source_repo_full_name = checkout_repo.full_name;
        self.checkout_source_repo_external_id = checkout_repo.external_id;
    }
}

/// Manages a pipeline definition.
pub struct PipelineResource;

fn pipeline_attributes(schema: Schema, source: fn() -> Attribute) -> Schema {
    [
        "name",
        "description",
        "config_source_provider",
        "config_source_repo_external_id",
        "config_source_file_path",
        "checkout_source_provider",
        "checkout_source_repo_external_id",
    ]
    .into_iter()
    .fold(schema, |schema, name| schema.with_attribute(name, source()))
    .with_attribute("created_at", Attribute::computed_string())
    .with_attribute("config_source_repo_full_name", Attribute::computed_string())
    .with_attribute("checkout_source_repo_full_name", Attribute::computed_string())
}

#[async_trait]
impl Resource for PipelineResource {
    fn type_name(&self) -> &'static str {
        "circleci_pipeline"
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description("Manages a CircleCI pipeline definition.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "project_id",
                Attribute::required_string().with_replace_on_change(),
            );
        let mut schema = pipeline_attributes(schema, Attribute::required_string);
        for name in ["name", "config_source_provider", "config_source_repo_external_id"] {
            if let Some(attr) = schema.attributes.get_mut(name) {
                attr.replace_on_change = true;
            }
        }
        schema
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut plan: PipelineModel = decode(planned)?;
        let project_id = require(&plan.project_id, "pipeline project_id")?.to_string();

        let created = client
            .pipelines
            .create(&project_id, &plan.to_definition())
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(project_id = %project_id, pipeline_id = ?created.id, "created pipeline");

        plan.apply(created);
        encode(&plan)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let mut current: PipelineModel = decode(state)?;
        let id = require(&current.id, "pipeline id")?.to_string();
        let project_id = require(&current.project_id, "pipeline project_id")?.to_string();

        let Some(definition) = client
            .pipelines
            .get(&project_id, &id)
            .await
            .optional()
            .map_err(|e| read_failed(ENTITY, &id, e))?
        else {
            return Ok(removed_on_read(ENTITY, &id));
        };

        current.apply(definition);
        Ok(ReadResult::found(encode(&current)?))
    }

    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: PipelineModel = decode(prior)?;
        let mut plan: PipelineModel = decode(planned)?;
        let id = require(&prior.id, "pipeline id")?;
        let project_id = require(&plan.project_id, "pipeline project_id")?.to_string();

        let updated = client
            .pipelines
            .update(&project_id, id, &plan.to_changes())
            .await
            .map_err(|e| update_failed(ENTITY, id, e))?;

        plan.id = Some(id.to_string());
        plan.apply(updated);
        encode(&plan)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: PipelineModel = decode(state)?;
        let id = require(&current.id, "pipeline id")?;
        let project_id = require(&current.project_id, "pipeline project_id")?;
        ignore_not_found(client.pipelines.delete(project_id, id).await)
            .map_err(|e| delete_failed(ENTITY, e))
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let (project_id, pipeline_id) = split_import_id(id, "project_id/pipeline_id")?;
        Ok(json!({ "project_id": project_id, "id": pipeline_id }))
    }
}

/// Looks up a pipeline definition.
pub struct PipelineDataSource;

#[async_trait]
impl DataSource for PipelineDataSource {
    fn type_name(&self) -> &'static str {
        "circleci_pipeline"
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description("Looks up a CircleCI pipeline definition.")
            .with_attribute("id", Attribute::required_string())
            .with_attribute("project_id", Attribute::required_string());
        pipeline_attributes(schema, Attribute::computed_string)
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let mut lookup: PipelineModel = decode(config)?;
        let id = require(&lookup.id, "pipeline id")?.to_string();
        let project_id = require(&lookup.project_id, "pipeline project_id")?.to_string();

        let definition = client
            .pipelines
            .get(&project_id, &id)
            .await
            .map_err(|e| lookup_failed(ENTITY, &id, e))?;
        lookup.apply(definition);
        encode(&lookup)
    }
}
