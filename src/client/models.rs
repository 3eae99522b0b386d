//! Wire types for the CircleCI v2 REST API.
//!
//! Response fields the provider reads are `Option` with `#[serde(default)]`:
//! the API omits empty fields freely and a missing field must not fail a
//! whole refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization UUID.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// `<vcs>/<name>` slug.
    #[serde(default)]
    pub slug: String,
    /// Source control type, e.g. `circleci`, `github`.
    #[serde(default)]
    pub vcs_type: String,
}

/// Body of a create-organization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrganization {
    /// Display name.
    pub name: String,
    /// Source control type.
    pub vcs_type: String,
}

/// Source control details of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsInfo {
    /// Repository URL.
    #[serde(default)]
    pub vcs_url: String,
    /// Source control provider name.
    #[serde(default)]
    pub provider: String,
    /// Default branch.
    #[serde(default)]
    pub default_branch: String,
}

/// A project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project UUID.
    #[serde(default)]
    pub id: String,
    /// Project name.
    #[serde(default)]
    pub name: String,
    /// `<provider>/<organization>/<project>` slug.
    #[serde(default)]
    pub slug: String,
    /// Owning organization name.
    #[serde(default)]
    pub organization_name: String,
    /// Owning organization slug.
    #[serde(default)]
    pub organization_slug: String,
    /// Owning organization UUID.
    #[serde(default)]
    pub organization_id: String,
    /// Source control details.
    #[serde(default)]
    pub vcs_info: VcsInfo,
}

/// Body of a create-project request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProject {
    /// Project name.
    pub name: String,
}

/// Advanced project settings. Unset fields are left untouched by a PATCH.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedSettings {
    /// Auto-cancel redundant workflows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocancel_builds: Option<bool>,
    /// Build pull requests from forks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_fork_prs: Option<bool>,
    /// Disable SSH reruns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_ssh: Option<bool>,
    /// Pass secrets to builds from forks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forks_receive_secret_env_vars: Option<bool>,
    /// Post build status to GitHub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_github_status: Option<bool>,
    /// Enable dynamic configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_workflows: Option<bool>,
    /// Only admins may change settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_settings_requires_admin: Option<bool>,
    /// Branches that still build when "only build PRs" is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_only_branch_overrides: Option<Vec<String>>,
}

/// Envelope for project settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedSettings,
}

/// Repository reference inside a pipeline or trigger source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    /// `owner/name`, assigned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Provider-side repository id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

/// Where a pipeline's configuration file comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Source provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<Repo>,
    /// Path of the config file in the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Where a pipeline checks code out from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSource {
    /// Source provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<Repo>,
}

/// A pipeline definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Definition UUID, assigned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation time, assigned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Config file source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_source: Option<ConfigSource>,
    /// Checkout source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_source: Option<CheckoutSource>,
}

/// Owner of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOwner {
    /// Owner UUID.
    pub id: String,
    /// Owner kind, always `organization` here.
    #[serde(rename = "type")]
    pub owner_type: String,
}

/// Body of a create-context request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewContext {
    /// Context name.
    pub name: String,
    /// Owning organization.
    pub owner: ContextOwner,
}

/// A context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Context UUID.
    #[serde(default)]
    pub id: String,
    /// Context name.
    #[serde(default)]
    pub name: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A context restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    /// Restriction UUID.
    #[serde(default)]
    pub id: String,
    /// Project the restriction applies to, if any.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// `project`, `expression` or `group`.
    #[serde(default)]
    pub restriction_type: String,
    /// Value matched by the restriction.
    #[serde(default)]
    pub restriction_value: String,
}

/// Body of a create-restriction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRestriction {
    /// `project`, `expression` or `group`.
    pub restriction_type: String,
    /// Value matched by the restriction.
    pub restriction_value: String,
}

/// A context environment variable. The API never returns the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEnvironmentVariable {
    /// Variable name.
    #[serde(default)]
    pub variable: String,
    /// Context UUID.
    #[serde(default)]
    pub context_id: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A project environment variable. The API masks the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEnvironmentVariable {
    /// Variable name.
    #[serde(default)]
    pub name: String,
    /// Masked value, e.g. `xxxx1234`.
    #[serde(default)]
    pub value: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of a create-project-variable request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProjectEnvironmentVariable {
    /// Variable name.
    pub name: String,
    /// Plain-text value.
    pub value: String,
}

/// Webhook endpoint behind a webhook-sourced trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerWebhook {
    /// Inbound URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Sender name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// What fires a trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEventSource {
    /// `github_app` or `webhook`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Repository, for repository-backed providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<Repo>,
    /// Webhook endpoint, for the webhook provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<TriggerWebhook>,
}

/// A pipeline trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger UUID, assigned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Creation time, assigned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Event source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source: Option<TriggerEventSource>,
    /// Preset filter for `github_app` triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_preset: Option<String>,
    /// Event name for `webhook` triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// Ref checked out when the trigger fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_ref: Option<String>,
    /// Ref the config file is read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<String>,
    /// Whether the trigger is paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

/// Scope a webhook is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookScope {
    /// Scope UUID.
    #[serde(default)]
    pub id: String,
    /// Scope kind, e.g. `project`.
    #[serde(rename = "type", default)]
    pub scope_type: String,
}

/// An outbound webhook. The API uses kebab-case field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Webhook {
    /// Webhook UUID, assigned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Destination URL.
    #[serde(default)]
    pub url: String,
    /// Verify the destination's TLS certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
    /// Secret used to sign payloads. Never returned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,
    /// Subscribed event names.
    #[serde(default)]
    pub events: Vec<String>,
    /// Scope, only sent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<WebhookScope>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Paged list envelope. Only the first page is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Token for the next page, if any.
    #[serde(default)]
    pub next_page_token: Option<String>,
}
