//! `circleci_project`, including its advanced settings.
//!
//! Settings live behind a second endpoint addressed by the three slug
//! segments. They are only reconciled for projects on CircleCI's own VCS
//! integration; other projects report the documented defaults without a
//! settings call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    create_failed, decode, delete_failed, encode, lookup_failed, read_failed, removed_on_read,
    require, DataSource, Resource,
};
use crate::client::models::{AdvancedSettings, Project};
use crate::client::{ignore_not_found, ApiError, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::types::ReadResult;

const ENTITY: &str = "project";

/// VCS provider name of CircleCI's native integration.
const NATIVE_PROVIDER: &str = "circleci";

const BOOL_SETTINGS: [(&str, bool); 7] = [
    ("auto_cancel_builds", false),
    ("build_fork_prs", false),
    ("disable_ssh", false),
    ("forks_receive_secret_env_vars", true),
    ("set_github_status", false),
    ("setup_workflows", false),
    ("write_settings_requires_admin", false),
];

const DEFAULT_BRANCH_OVERRIDE: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ProjectModel {
    id: Option<String>,
    name: Option<String>,
    slug: Option<String>,
    organization_name: Option<String>,
    organization_slug: Option<String>,
    organization_id: Option<String>,
    vcs_info_url: Option<String>,
    vcs_info_provider: Option<String>,
    vcs_info_default_branch: Option<String>,
    auto_cancel_builds: Option<bool>,
    build_fork_prs: Option<bool>,
    disable_ssh: Option<bool>,
    forks_receive_secret_env_vars: Option<bool>,
    set_github_status: Option<bool>,
    setup_workflows: Option<bool>,
    write_settings_requires_admin: Option<bool>,
    pr_only_branch_overrides: Option<Vec<String>>,
}

impl ProjectModel {
    fn is_native(&self) -> bool {
        self.vcs_info_provider.as_deref() == Some(NATIVE_PROVIDER)
    }

    fn apply_project(&mut self, project: Project) {
        self.id = Some(project.id);
        self.name = Some(project.name);
        self.slug = Some(project.slug);
        self.organization_name = Some(project.organization_name);
        self.organization_slug = Some(project.organization_slug);
        self.organization_id = Some(project.organization_id);
        self.vcs_info_url = Some(project.vcs_info.vcs_url);
        self.vcs_info_provider = Some(project.vcs_info.provider);
        self.vcs_info_default_branch = Some(project.vcs_info.default_branch);
    }

    /// Settings to write: configured values, with every unset field filled
    /// in from its default.
    fn settings(&self) -> AdvancedSettings {
        AdvancedSettings {
            autocancel_builds: Some(self.auto_cancel_builds.unwrap_or(false)),
            build_fork_prs: Some(self.build_fork_prs.unwrap_or(false)),
            disable_ssh: Some(self.disable_ssh.unwrap_or(false)),
            forks_receive_secret_env_vars: Some(self.forks_receive_secret_env_vars.unwrap_or(true)),
            set_github_status: Some(self.set_github_status.unwrap_or(false)),
            setup_workflows: Some(self.setup_workflows.unwrap_or(false)),
            write_settings_requires_admin: Some(
                self.write_settings_requires_admin.unwrap_or(false),
            ),
            pr_only_branch_overrides: Some(
                self.pr_only_branch_overrides
                    .clone()
                    .unwrap_or_else(|| vec![DEFAULT_BRANCH_OVERRIDE.to_string()]),
            ),
        }
    }

    fn apply_settings(&mut self, settings: AdvancedSettings) {
        self.auto_cancel_builds = settings.autocancel_builds;
        self.build_fork_prs = settings.build_fork_prs;
        self.disable_ssh = settings.disable_ssh;
        self.forks_receive_secret_env_vars = settings.forks_receive_secret_env_vars;
        self.set_github_status = settings.set_github_status;
        self.setup_workflows = settings.setup_workflows;
        self.write_settings_requires_admin = settings.write_settings_requires_admin;
        self.pr_only_branch_overrides = settings.pr_only_branch_overrides;
    }

    fn apply_default_settings(&mut self) {
        let defaults = ProjectModel::default().settings();
        self.apply_settings(defaults);
    }
}

/// Split `<provider>/<organization>/<project>`.
fn split_slug(slug: &str) -> Result<(&str, &str, &str), ProviderError> {
    let parts: Vec<&str> = slug.split('/').collect();
    match parts.as_slice() {
        [provider, organization, project]
            if !provider.is_empty() && !organization.is_empty() && !project.is_empty() =>
        {
            Ok((*provider, *organization, *project))
        },
        _ => Err(ProviderError::invalid_attribute(
            "slug",
            "Invalid CircleCI project slug",
            format!(
                "Expected a project slug of the form 'provider/organization/project'. Got: {}",
                slug
            ),
        )),
    }
}

fn settings_failed(slug: &str, err: ApiError) -> ProviderError {
    ProviderError::remote(
        "Error updating CircleCI project settings",
        format!(
            "Could not update settings of CircleCI project {}, unexpected error: {}",
            slug, err
        ),
    )
}

async fn write_settings(client: &Client, model: &mut ProjectModel) -> Result<(), ProviderError> {
    let slug = require(&model.slug, "project slug")?.to_string();
    let (provider, organization, project) = split_slug(&slug)?;
    let updated = client
        .projects
        .update_settings(&model.settings(), provider, organization, project)
        .await
        .map_err(|e| settings_failed(&slug, e))?;
    model.apply_settings(updated.advanced);
    Ok(())
}

async fn refresh_settings(client: &Client, model: &mut ProjectModel) -> Result<(), ProviderError> {
    if !model.is_native() {
        model.apply_default_settings();
        return Ok(());
    }
    let slug = require(&model.slug, "project slug")?.to_string();
    let (provider, organization, project) = split_slug(&slug)?;
    let settings = client
        .projects
        .get_settings(provider, organization, project)
        .await
        .map_err(|e| read_failed("project settings", &slug, e))?;
    model.apply_settings(settings.advanced);
    Ok(())
}

fn project_schema(identity: Schema, setting: fn() -> Attribute, list: fn() -> Attribute) -> Schema {
    let schema = [
        "organization_name",
        "organization_slug",
        "vcs_info_url",
        "vcs_info_provider",
        "vcs_info_default_branch",
    ]
    .into_iter()
    .fold(identity, |schema, name| {
        schema.with_attribute(name, Attribute::computed_string())
    });

    BOOL_SETTINGS
        .into_iter()
        .fold(schema, |schema, (name, default)| {
            let mut attr = setting();
            if attr.flags.optional {
                attr = attr.with_default(json!(default));
            }
            schema.with_attribute(name, attr)
        })
        .with_attribute("pr_only_branch_overrides", list())
}

/// Manages a CircleCI project and its advanced settings.
pub struct ProjectResource;

#[async_trait]
impl Resource for ProjectResource {
    fn type_name(&self) -> &'static str {
        "circleci_project"
    }

    fn schema(&self) -> Schema {
        let identity = Schema::v0()
            .with_description("Manages a CircleCI project.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_replace_on_change(),
            )
            .with_attribute("slug", Attribute::computed_string())
            .with_attribute(
                "organization_id",
                Attribute::required_string().with_replace_on_change(),
            );
        project_schema(identity, Attribute::optional_computed_bool, || {
            Attribute::optional_computed_string_list()
                .with_default(json!([DEFAULT_BRANCH_OVERRIDE]))
                .with_description("Branches that build even when only pull requests are built.")
        })
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut plan: ProjectModel = decode(planned)?;
        let organization_id = require(&plan.organization_id, "project organization_id")?;
        let name = require(&plan.name, "project name")?;

        let project = client
            .projects
            .create(organization_id, name)
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(slug = %project.slug, "created project");
        plan.apply_project(project);

        if plan.is_native() {
            if let Err(err) = write_settings(client, &mut plan).await {
                warn!(slug = ?plan.slug, "project created but its settings could not be written");
                return Err(err);
            }
        } else {
            plan.apply_default_settings();
        }
        encode(&plan)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let mut current: ProjectModel = decode(state)?;
        let slug = require(&current.slug, "project slug")?.to_string();

        let Some(project) = client
            .projects
            .get(&slug)
            .await
            .optional()
            .map_err(|e| read_failed(ENTITY, &slug, e))?
        else {
            return Ok(removed_on_read(ENTITY, &slug));
        };

        current.apply_project(project);
        refresh_settings(client, &mut current).await?;
        Ok(ReadResult::found(encode(&current)?))
    }

    /// Identity attributes force replacement, so only settings change here.
    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let _ = prior;
        let mut plan: ProjectModel = decode(planned)?;
        if plan.is_native() {
            write_settings(client, &mut plan).await?;
        } else {
            plan.apply_default_settings();
        }
        encode(&plan)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: ProjectModel = decode(state)?;
        let slug = require(&current.slug, "project slug")?;
        ignore_not_found(client.projects.delete(slug).await).map_err(|e| delete_failed(ENTITY, e))
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        split_slug(id)?;
        Ok(json!({ "slug": id }))
    }
}

/// Looks up a project and its settings by slug.
pub struct ProjectDataSource;

#[async_trait]
impl DataSource for ProjectDataSource {
    fn type_name(&self) -> &'static str {
        "circleci_project"
    }

    fn schema(&self) -> Schema {
        let identity = Schema::v0()
            .with_description("Looks up a CircleCI project.")
            .with_attribute("slug", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("organization_id", Attribute::computed_string());
        project_schema(identity, Attribute::computed_bool, || {
            Attribute::computed(AttributeType::list(AttributeType::String))
        })
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let mut lookup: ProjectModel = decode(config)?;
        let slug = require(&lookup.slug, "project slug")?.to_string();
        split_slug(&slug)?;

        let project = client
            .projects
            .get(&slug)
            .await
            .map_err(|e| lookup_failed(ENTITY, &slug, e))?;
        lookup.apply_project(project);
        refresh_settings(client, &mut lookup).await?;
        encode(&lookup)
    }
}
