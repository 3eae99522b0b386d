//! Test doubles and lifecycle helpers.
//!
//! [`MockCircleCi`] is an in-memory CircleCI backend implementing every
//! client service trait. It assigns ids and timestamps the way the API does,
//! answers `NotFound` for missing entities and records every call so tests
//! can check that rejected input never reached the API.
//!
//! [`ProviderTester`] drives a [`ProviderService`] through plan, create,
//! read, update, delete and import without a gRPC server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::client::models::{
    AdvancedSettings, Context, ContextEnvironmentVariable, Organization, PipelineDefinition,
    Project, ProjectEnvironmentVariable, ProjectSettings, Repo, Restriction, Trigger, VcsInfo,
    Webhook,
};
use crate::client::{
    ApiError, Client, ContextEnvironmentVariableService, ContextService, OrganizationService,
    PipelineService, ProjectEnvironmentVariableService, ProjectService, TriggerService,
    WebhookService,
};
use crate::error::ProviderError;
use crate::provider::CircleCiProvider;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ReadResult};

/// Creation time assigned to every mock entity.
pub const CREATED_AT: &str = "2024-01-01T00:00:00Z";

/// Update time assigned by mock updates.
pub const UPDATED_AT: &str = "2024-01-02T00:00:00Z";

#[derive(Default)]
struct MockState {
    next_id: u64,
    calls: Vec<String>,
    failures: HashMap<String, (u16, String)>,
    organizations: HashMap<String, Organization>,
    projects: HashMap<String, Project>,
    settings: HashMap<String, AdvancedSettings>,
    pipelines: HashMap<(String, String), PipelineDefinition>,
    contexts: HashMap<String, Context>,
    restrictions: HashMap<String, Vec<Restriction>>,
    context_variables: HashMap<(String, String), ContextEnvironmentVariable>,
    project_variables: HashMap<(String, String), (ProjectEnvironmentVariable, String)>,
    triggers: HashMap<(String, String), Trigger>,
    webhooks: HashMap<String, Webhook>,
}

impl MockState {
    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("00000000-0000-4000-8000-{:012}", self.next_id)
    }

    fn record(&mut self, call: &str) -> Result<(), ApiError> {
        self.calls.push(call.to_string());
        match self.failures.get(call) {
            Some((status, message)) => Err(ApiError::Status {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn not_found(path: String) -> ApiError {
    ApiError::NotFound { path }
}

fn mask(value: &str) -> String {
    let tail: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("xxxx{}", tail)
}

fn merge_settings(current: &mut AdvancedSettings, patch: &AdvancedSettings) {
    macro_rules! merge {
        ($($field:ident),*) => {
            $(if patch.$field.is_some() {
                current.$field = patch.$field.clone();
            })*
        };
    }
    merge!(
        autocancel_builds,
        build_fork_prs,
        disable_ssh,
        forks_receive_secret_env_vars,
        set_github_status,
        setup_workflows,
        write_settings_requires_admin,
        pr_only_branch_overrides
    );
}

/// In-memory CircleCI backend.
#[derive(Default)]
pub struct MockCircleCi {
    state: Mutex<MockState>,
}

impl MockCircleCi {
    /// Create an empty backend.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A client whose every service handle is this backend.
    pub fn client(self: &Arc<Self>) -> Client {
        Client::from_backend(self.clone())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Make every later `call` fail with the given status.
    pub fn fail_on(&self, call: &str, status: u16, message: &str) {
        self.state()
            .failures
            .insert(call.to_string(), (status, message.to_string()));
    }

    /// Every call made so far, e.g. `contexts.create`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Whether `call` was made at least once.
    pub fn called(&self, call: &str) -> bool {
        self.state().calls.iter().any(|c| c == call)
    }

    /// Seed a project, e.g. one connected through a third-party VCS.
    pub fn insert_project(&self, project: Project) {
        self.state().projects.insert(project.slug.clone(), project);
    }

    /// Current advanced settings stored for a project slug.
    pub fn settings(&self, slug: &str) -> Option<AdvancedSettings> {
        self.state().settings.get(slug).cloned()
    }

    /// The signing secret last sent for a webhook.
    pub fn webhook_secret(&self, id: &str) -> Option<String> {
        self.state()
            .webhooks
            .get(id)
            .and_then(|w| w.signing_secret.clone())
    }

    /// The plain-text value last written for a project variable.
    pub fn project_variable_value(&self, slug: &str, name: &str) -> Option<String> {
        self.state()
            .project_variables
            .get(&(slug.to_string(), name.to_string()))
            .map(|(_, value)| value.clone())
    }
}

#[async_trait]
impl OrganizationService for MockCircleCi {
    async fn create(&self, name: &str, vcs_type: &str) -> Result<Organization, ApiError> {
        let mut state = self.state();
        state.record("organizations.create")?;
        let org = Organization {
            id: state.new_id(),
            name: name.to_string(),
            slug: format!("{}/{}", vcs_type, name),
            vcs_type: vcs_type.to_string(),
        };
        state.organizations.insert(org.id.clone(), org.clone());
        Ok(org)
    }

    async fn get(&self, id: &str) -> Result<Organization, ApiError> {
        let mut state = self.state();
        state.record("organizations.get")?;
        state
            .organizations
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(format!("organization/{}", id)))
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("organizations.delete")?;
        state
            .organizations
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("organization/{}", id)))
    }
}

#[async_trait]
impl ProjectService for MockCircleCi {
    async fn create(&self, organization_id: &str, name: &str) -> Result<Project, ApiError> {
        let mut state = self.state();
        state.record("projects.create")?;
        let id = state.new_id();
        let project = Project {
            slug: format!("circleci/{}/{}", organization_id, id),
            id,
            name: name.to_string(),
            organization_name: "acme".to_string(),
            organization_slug: format!("circleci/{}", organization_id),
            organization_id: organization_id.to_string(),
            vcs_info: VcsInfo {
                vcs_url: format!("//circleci.com/{}", organization_id),
                provider: "circleci".to_string(),
                default_branch: "main".to_string(),
            },
        };
        let defaults = AdvancedSettings {
            autocancel_builds: Some(false),
            build_fork_prs: Some(false),
            disable_ssh: Some(false),
            forks_receive_secret_env_vars: Some(false),
            set_github_status: Some(false),
            setup_workflows: Some(false),
            write_settings_requires_admin: Some(false),
            pr_only_branch_overrides: Some(Vec::new()),
        };
        state.settings.insert(project.slug.clone(), defaults);
        state.projects.insert(project.slug.clone(), project.clone());
        Ok(project)
    }

    async fn get(&self, slug: &str) -> Result<Project, ApiError> {
        let mut state = self.state();
        state.record("projects.get")?;
        state
            .projects
            .get(slug)
            .cloned()
            .ok_or_else(|| not_found(format!("project/{}", slug)))
    }

    async fn delete(&self, slug: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("projects.delete")?;
        state.settings.remove(slug);
        state
            .projects
            .remove(slug)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("project/{}", slug)))
    }

    async fn get_settings(
        &self,
        provider: &str,
        organization: &str,
        project: &str,
    ) -> Result<ProjectSettings, ApiError> {
        let mut state = self.state();
        state.record("projects.get_settings")?;
        let slug = format!("{}/{}/{}", provider, organization, project);
        state
            .settings
            .get(&slug)
            .cloned()
            .map(|advanced| ProjectSettings { advanced })
            .ok_or_else(|| not_found(format!("project/{}/settings", slug)))
    }

    async fn update_settings(
        &self,
        settings: &AdvancedSettings,
        provider: &str,
        organization: &str,
        project: &str,
    ) -> Result<ProjectSettings, ApiError> {
        let mut state = self.state();
        state.record("projects.update_settings")?;
        let slug = format!("{}/{}/{}", provider, organization, project);
        let current = state
            .settings
            .get_mut(&slug)
            .ok_or_else(|| not_found(format!("project/{}/settings", slug)))?;
        merge_settings(current, settings);
        Ok(ProjectSettings {
            advanced: current.clone(),
        })
    }
}

#[async_trait]
impl PipelineService for MockCircleCi {
    async fn create(
        &self,
        project_id: &str,
        pipeline: &PipelineDefinition,
    ) -> Result<PipelineDefinition, ApiError> {
        let mut state = self.state();
        state.record("pipelines.create")?;
        let mut created = pipeline.clone();
        let id = state.new_id();
        created.id = Some(id.clone());
        created.created_at = Some(CREATED_AT.to_string());
        for repo in [
            created.config_source.as_mut().and_then(|s| s.repo.as_mut()),
            created.checkout_source.as_mut().and_then(|s| s.repo.as_mut()),
        ]
        .into_iter()
        .flatten()
        {
            let external = repo.external_id.clone().unwrap_or_default();
            repo.full_name = Some(format!("acme/repo-{}", external));
        }
        state
            .pipelines
            .insert((project_id.to_string(), id), created.clone());
        Ok(created)
    }

    async fn get(&self, project_id: &str, id: &str) -> Result<PipelineDefinition, ApiError> {
        let mut state = self.state();
        state.record("pipelines.get")?;
        state
            .pipelines
            .get(&(project_id.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("projects/{}/pipeline-definitions/{}", project_id, id)))
    }

    async fn update(
        &self,
        project_id: &str,
        id: &str,
        changes: &PipelineDefinition,
    ) -> Result<PipelineDefinition, ApiError> {
        let mut state = self.state();
        state.record("pipelines.update")?;
        let current = state
            .pipelines
            .get_mut(&(project_id.to_string(), id.to_string()))
            .ok_or_else(|| not_found(format!("projects/{}/pipeline-definitions/{}", project_id, id)))?;
        if changes.name.is_some() {
            current.name = changes.name.clone();
        }
        if changes.description.is_some() {
            current.description = changes.description.clone();
        }
        if let (Some(path), Some(source)) = (
            changes
                .config_source
                .as_ref()
                .and_then(|s| s.file_path.clone()),
            current.config_source.as_mut(),
        ) {
            source.file_path = Some(path);
        }
        if let Some(checkout) = &changes.checkout_source {
            let mut checkout = checkout.clone();
            if let Some(repo) = checkout.repo.as_mut() {
                let external = repo.external_id.clone().unwrap_or_default();
                repo.full_name = Some(format!("acme/repo-{}", external));
            }
            current.checkout_source = Some(checkout);
        }
        Ok(current.clone())
    }

    async fn delete(&self, project_id: &str, id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("pipelines.delete")?;
        state
            .pipelines
            .remove(&(project_id.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(format!("projects/{}/pipeline-definitions/{}", project_id, id)))
    }
}

#[async_trait]
impl ContextService for MockCircleCi {
    async fn create(&self, organization_id: &str, name: &str) -> Result<Context, ApiError> {
        let mut state = self.state();
        state.record("contexts.create")?;
        let _ = organization_id;
        let context = Context {
            id: state.new_id(),
            name: name.to_string(),
            created_at: Some(CREATED_AT.to_string()),
        };
        state.contexts.insert(context.id.clone(), context.clone());
        Ok(context)
    }

    async fn get(&self, id: &str) -> Result<Context, ApiError> {
        let mut state = self.state();
        state.record("contexts.get")?;
        state
            .contexts
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(format!("context/{}", id)))
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("contexts.delete")?;
        state.restrictions.remove(id);
        state
            .contexts
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("context/{}", id)))
    }

    async fn list_restrictions(&self, context_id: &str) -> Result<Vec<Restriction>, ApiError> {
        let mut state = self.state();
        state.record("contexts.list_restrictions")?;
        if !state.contexts.contains_key(context_id) {
            return Err(not_found(format!("context/{}/restrictions", context_id)));
        }
        Ok(state
            .restrictions
            .get(context_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_restriction(
        &self,
        context_id: &str,
        value: &str,
        restriction_type: &str,
    ) -> Result<Restriction, ApiError> {
        let mut state = self.state();
        state.record("contexts.create_restriction")?;
        if !state.contexts.contains_key(context_id) {
            return Err(not_found(format!("context/{}/restrictions", context_id)));
        }
        let is_project = restriction_type == "project";
        let restriction = Restriction {
            id: state.new_id(),
            project_id: is_project.then(|| value.to_string()),
            name: Some(if is_project {
                "acme-project".to_string()
            } else {
                value.to_string()
            }),
            restriction_type: restriction_type.to_string(),
            restriction_value: value.to_string(),
        };
        state
            .restrictions
            .entry(context_id.to_string())
            .or_default()
            .push(restriction.clone());
        Ok(restriction)
    }

    async fn delete_restriction(&self, context_id: &str, id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("contexts.delete_restriction")?;
        let path = format!("context/{}/restrictions/{}", context_id, id);
        let list = state
            .restrictions
            .get_mut(context_id)
            .ok_or_else(|| not_found(path.clone()))?;
        let before = list.len();
        list.retain(|r| r.id != id);
        if list.len() == before {
            return Err(not_found(path));
        }
        Ok(())
    }
}

#[async_trait]
impl ContextEnvironmentVariableService for MockCircleCi {
    async fn upsert(
        &self,
        context_id: &str,
        name: &str,
        value: &str,
    ) -> Result<ContextEnvironmentVariable, ApiError> {
        let mut state = self.state();
        state.record("context_variables.upsert")?;
        let _ = value;
        if !state.contexts.contains_key(context_id) {
            return Err(not_found(format!("context/{}", context_id)));
        }
        let key = (context_id.to_string(), name.to_string());
        let created_at = state
            .context_variables
            .get(&key)
            .and_then(|v| v.created_at.clone())
            .unwrap_or_else(|| CREATED_AT.to_string());
        let variable = ContextEnvironmentVariable {
            variable: name.to_string(),
            context_id: context_id.to_string(),
            created_at: Some(created_at),
            updated_at: Some(UPDATED_AT.to_string()),
        };
        state.context_variables.insert(key, variable.clone());
        Ok(variable)
    }

    async fn list(&self, context_id: &str) -> Result<Vec<ContextEnvironmentVariable>, ApiError> {
        let mut state = self.state();
        state.record("context_variables.list")?;
        if !state.contexts.contains_key(context_id) {
            return Err(not_found(format!("context/{}", context_id)));
        }
        let mut variables: Vec<_> = state
            .context_variables
            .iter()
            .filter(|((ctx, _), _)| ctx == context_id)
            .map(|(_, v)| v.clone())
            .collect();
        variables.sort_by(|a, b| a.variable.cmp(&b.variable));
        Ok(variables)
    }

    async fn delete(&self, context_id: &str, name: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("context_variables.delete")?;
        state
            .context_variables
            .remove(&(context_id.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                not_found(format!("context/{}/environment-variable/{}", context_id, name))
            })
    }
}

#[async_trait]
impl ProjectEnvironmentVariableService for MockCircleCi {
    async fn create(
        &self,
        project_slug: &str,
        name: &str,
        value: &str,
    ) -> Result<ProjectEnvironmentVariable, ApiError> {
        let mut state = self.state();
        state.record("project_variables.create")?;
        let variable = ProjectEnvironmentVariable {
            name: name.to_string(),
            value: mask(value),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
        };
        state.project_variables.insert(
            (project_slug.to_string(), name.to_string()),
            (variable.clone(), value.to_string()),
        );
        Ok(variable)
    }

    async fn get(
        &self,
        project_slug: &str,
        name: &str,
    ) -> Result<ProjectEnvironmentVariable, ApiError> {
        let mut state = self.state();
        state.record("project_variables.get")?;
        state
            .project_variables
            .get(&(project_slug.to_string(), name.to_string()))
            .map(|(variable, _)| variable.clone())
            .ok_or_else(|| not_found(format!("project/{}/envvar/{}", project_slug, name)))
    }

    async fn delete(&self, project_slug: &str, name: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("project_variables.delete")?;
        state
            .project_variables
            .remove(&(project_slug.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(format!("project/{}/envvar/{}", project_slug, name)))
    }
}

#[async_trait]
impl TriggerService for MockCircleCi {
    async fn create(
        &self,
        project_id: &str,
        pipeline_id: &str,
        trigger: &Trigger,
    ) -> Result<Trigger, ApiError> {
        let mut state = self.state();
        state.record("triggers.create")?;
        let _ = pipeline_id;
        let mut created = trigger.clone();
        let id = state.new_id();
        created.id = Some(id.clone());
        created.created_at = Some(CREATED_AT.to_string());
        created.disabled = Some(trigger.disabled.unwrap_or(false));
        if let Some(source) = created.event_source.as_mut() {
            if source.provider.as_deref() == Some("github_app") {
                let external = source
                    .repo
                    .as_ref()
                    .and_then(|r| r.external_id.clone())
                    .unwrap_or_default();
                source.repo = Some(Repo {
                    full_name: Some(format!("acme/repo-{}", external)),
                    external_id: Some(external),
                });
                source.webhook = None;
            }
        }
        state
            .triggers
            .insert((project_id.to_string(), id), created.clone());
        Ok(created)
    }

    async fn get(&self, project_id: &str, id: &str) -> Result<Trigger, ApiError> {
        let mut state = self.state();
        state.record("triggers.get")?;
        state
            .triggers
            .get(&(project_id.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("projects/{}/triggers/{}", project_id, id)))
    }

    async fn update(
        &self,
        project_id: &str,
        id: &str,
        changes: &Trigger,
    ) -> Result<Trigger, ApiError> {
        let mut state = self.state();
        state.record("triggers.update")?;
        let current = state
            .triggers
            .get_mut(&(project_id.to_string(), id.to_string()))
            .ok_or_else(|| not_found(format!("projects/{}/triggers/{}", project_id, id)))?;
        macro_rules! patch {
            ($($field:ident),*) => {
                $(if changes.$field.is_some() {
                    current.$field = changes.$field.clone();
                })*
            };
        }
        patch!(event_preset, event_name, checkout_ref, config_ref, disabled);
        if let (Some(new), Some(old)) = (&changes.event_source, current.event_source.as_mut()) {
            if new.webhook.is_some() {
                old.webhook = new.webhook.clone();
            }
        }
        Ok(current.clone())
    }

    async fn delete(&self, project_id: &str, id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("triggers.delete")?;
        state
            .triggers
            .remove(&(project_id.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(format!("projects/{}/triggers/{}", project_id, id)))
    }
}

#[async_trait]
impl WebhookService for MockCircleCi {
    async fn create(&self, webhook: &Webhook) -> Result<Webhook, ApiError> {
        let mut state = self.state();
        state.record("webhooks.create")?;
        let mut stored = webhook.clone();
        stored.id = Some(state.new_id());
        stored.created_at = Some(CREATED_AT.to_string());
        stored.updated_at = Some(CREATED_AT.to_string());
        stored.verify_tls = Some(webhook.verify_tls.unwrap_or(true));
        let id = stored.id.clone().unwrap_or_default();
        state.webhooks.insert(id, stored.clone());
        stored.signing_secret = None;
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Webhook, ApiError> {
        let mut state = self.state();
        state.record("webhooks.get")?;
        let mut webhook = state
            .webhooks
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(format!("webhook/{}", id)))?;
        webhook.signing_secret = None;
        Ok(webhook)
    }

    async fn update(&self, id: &str, webhook: &Webhook) -> Result<Webhook, ApiError> {
        let mut state = self.state();
        state.record("webhooks.update")?;
        let current = state
            .webhooks
            .get_mut(id)
            .ok_or_else(|| not_found(format!("webhook/{}", id)))?;
        current.name = webhook.name.clone();
        current.url = webhook.url.clone();
        current.events = webhook.events.clone();
        if webhook.verify_tls.is_some() {
            current.verify_tls = webhook.verify_tls;
        }
        if webhook.signing_secret.is_some() {
            current.signing_secret = webhook.signing_secret.clone();
        }
        current.updated_at = Some(UPDATED_AT.to_string());
        let mut updated = current.clone();
        updated.signing_secret = None;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record("webhooks.delete")?;
        state
            .webhooks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("webhook/{}", id)))
    }
}

/// A test harness driving a [`ProviderService`] without a gRPC server.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl ProviderTester<CircleCiProvider> {
    /// A tester whose provider is already configured against a fresh mock.
    pub fn with_mock() -> (Self, Arc<MockCircleCi>) {
        let mock = MockCircleCi::new();
        let tester = Self::new(CircleCiProvider::with_client(mock.client()));
        (tester, mock)
    }
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Configure the provider, failing on error diagnostics.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration, failing on error diagnostics.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation from configuration.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan an update of `prior_state` towards `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Create a resource from a planned state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<ReadResult, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource in place.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan then create, returning the created state.
    pub async fn apply(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        self.create(resource_type, plan.planned_state).await
    }

    /// Plan, update, then refresh. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        let refreshed = self.read(resource_type, updated).await?;
        Ok(refreshed.state.unwrap_or(Value::Null))
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that diagnostics contain no errors.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that some error diagnostic's summary or detail contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics.iter().any(|d| {
        d.severity == DiagnosticSeverity::Error
            && (d.summary.contains(substring)
                || d.detail.as_deref().is_some_and(|detail| detail.contains(substring)))
    });
    assert!(
        found,
        "Expected an error containing '{}', got: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| (&d.summary, &d.detail))
            .collect::<Vec<_>>()
    );
}

/// Diagnostics carried by a failed operation.
pub fn diagnostics_of<T: std::fmt::Debug>(result: Result<T, ProviderError>) -> Vec<Diagnostic> {
    match result {
        Ok(value) => panic!("Expected an error, got {:?}", value),
        Err(err) => err.into_diagnostics(),
    }
}

/// Assert that a plan requires resource replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan updates in place.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan has no changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls_and_failures() {
        let mock = MockCircleCi::new();
        let client = mock.client();

        let org = client.organizations.create("acme", "circleci").await.unwrap();
        assert_eq!(org.slug, "circleci/acme");
        assert!(mock.called("organizations.create"));

        mock.fail_on("organizations.get", 500, "boom");
        let err = client.organizations.get(&org.id).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: boom");
        assert_eq!(mock.calls(), vec!["organizations.create", "organizations.get"]);
    }

    #[tokio::test]
    async fn test_mock_not_found() {
        let mock = MockCircleCi::new();
        let client = mock.client();
        assert!(client.contexts.get("missing").await.unwrap_err().is_not_found());
        assert!(client.webhooks.delete("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mock_masks_project_variables() {
        let mock = MockCircleCi::new();
        let client = mock.client();
        client
            .project_variables
            .create("circleci/o/p", "TOKEN", "secret-1234")
            .await
            .unwrap();
        let fetched = client.project_variables.get("circleci/o/p", "TOKEN").await.unwrap();
        assert_eq!(fetched.value, "xxxx1234");
        assert_eq!(
            mock.project_variable_value("circleci/o/p", "TOKEN").as_deref(),
            Some("secret-1234")
        );
    }

    #[tokio::test]
    async fn test_mock_settings_patch_merges() {
        let mock = MockCircleCi::new();
        let client = mock.client();
        let project = client.projects.create("org", "app").await.unwrap();
        let parts: Vec<&str> = project.slug.split('/').collect();

        let patch = AdvancedSettings {
            disable_ssh: Some(true),
            ..Default::default()
        };
        client
            .projects
            .update_settings(&patch, parts[0], parts[1], parts[2])
            .await
            .unwrap();

        let settings = mock.settings(&project.slug).unwrap();
        assert_eq!(settings.disable_ssh, Some(true));
        assert_eq!(settings.autocancel_builds, Some(false));
    }
}
