//! `circleci_organization`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    create_failed, decode, delete_failed, encode, lookup_failed, read_failed, removed_on_read,
    require, DataSource, Resource,
};
use crate::client::models::Organization;
use crate::client::{ignore_not_found, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::types::ReadResult;

const ENTITY: &str = "organization";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct OrganizationModel {
    id: Option<String>,
    name: Option<String>,
    slug: Option<String>,
    vcs_type: Option<String>,
}

impl From<Organization> for OrganizationModel {
    fn from(org: Organization) -> Self {
        Self {
            id: Some(org.id),
            name: Some(org.name),
            slug: Some(org.slug),
            vcs_type: Some(org.vcs_type),
        }
    }
}

/// Manages a CircleCI organization. Every attribute forces replacement.
pub struct OrganizationResource;

#[async_trait]
impl Resource for OrganizationResource {
    fn type_name(&self) -> &'static str {
        "circleci_organization"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a CircleCI organization.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Organization UUID."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_replace_on_change()
                    .with_description("Organization name."),
            )
            .with_attribute(
                "slug",
                Attribute::computed_string().with_description("Organization slug."),
            )
            .with_attribute(
                "vcs_type",
                Attribute::required_string()
                    .with_replace_on_change()
                    .with_description("Source control type, e.g. `circleci`."),
            )
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let plan: OrganizationModel = decode(planned)?;
        let name = require(&plan.name, "organization name")?;
        let vcs_type = require(&plan.vcs_type, "organization vcs_type")?;

        let org = client
            .organizations
            .create(name, vcs_type)
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(organization_id = %org.id, "created organization");

        encode(&OrganizationModel::from(org))
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let current: OrganizationModel = decode(state)?;
        let id = require(&current.id, "organization id")?;

        match client
            .organizations
            .get(id)
            .await
            .optional()
            .map_err(|e| read_failed(ENTITY, id, e))?
        {
            Some(org) => Ok(ReadResult::found(encode(&OrganizationModel::from(org))?)),
            None => Ok(removed_on_read(ENTITY, id)),
        }
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: OrganizationModel = decode(state)?;
        let id = require(&current.id, "organization id")?;
        ignore_not_found(client.organizations.delete(id).await)
            .map_err(|e| delete_failed(ENTITY, e))
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        if id.is_empty() {
            return Err(ProviderError::invalid_input(
                "Invalid Import ID Format",
                "Expected import ID format: 'organization_id'. Got an empty string",
            ));
        }
        Ok(json!({ "id": id }))
    }
}

/// Looks up a CircleCI organization by id.
pub struct OrganizationDataSource;

#[async_trait]
impl DataSource for OrganizationDataSource {
    fn type_name(&self) -> &'static str {
        "circleci_organization"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Looks up a CircleCI organization.")
            .with_attribute("id", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("slug", Attribute::computed_string())
            .with_attribute("vcs_type", Attribute::computed_string())
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let lookup: OrganizationModel = decode(config)?;
        let id = require(&lookup.id, "organization id")?;
        let org = client
            .organizations
            .get(id)
            .await
            .map_err(|e| lookup_failed(ENTITY, id, e))?;
        encode(&OrganizationModel::from(org))
    }
}
