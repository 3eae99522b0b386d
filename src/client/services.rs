//! One service trait per CircleCI resource family.
//!
//! The HTTP transport implements all of them; tests substitute an in-memory
//! backend. Every method maps a 404 to [`ApiError::NotFound`].

use async_trait::async_trait;

use super::models::{
    AdvancedSettings, Context, ContextEnvironmentVariable, Organization, PipelineDefinition,
    Project, ProjectEnvironmentVariable, ProjectSettings, Restriction, Trigger, Webhook,
};
use super::ApiError;

/// Organizations.
#[async_trait]
pub trait OrganizationService: Send + Sync {
    /// Create an organization.
    async fn create(&self, name: &str, vcs_type: &str) -> Result<Organization, ApiError>;
    /// Fetch an organization by id.
    async fn get(&self, id: &str) -> Result<Organization, ApiError>;
    /// Delete an organization by id.
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

/// Projects and their settings.
#[async_trait]
pub trait ProjectService: Send + Sync {
    /// Create a project inside an organization.
    async fn create(&self, organization_id: &str, name: &str) -> Result<Project, ApiError>;
    /// Fetch a project by slug.
    async fn get(&self, slug: &str) -> Result<Project, ApiError>;
    /// Delete a project by slug.
    async fn delete(&self, slug: &str) -> Result<(), ApiError>;
    /// Fetch settings, addressed by the three slug segments.
    async fn get_settings(
        &self,
        provider: &str,
        organization: &str,
        project: &str,
    ) -> Result<ProjectSettings, ApiError>;
    /// Patch settings, addressed by the three slug segments.
    async fn update_settings(
        &self,
        settings: &AdvancedSettings,
        provider: &str,
        organization: &str,
        project: &str,
    ) -> Result<ProjectSettings, ApiError>;
}

/// Pipeline definitions.
#[async_trait]
pub trait PipelineService: Send + Sync {
    /// Create a pipeline definition in a project.
    async fn create(
        &self,
        project_id: &str,
        pipeline: &PipelineDefinition,
    ) -> Result<PipelineDefinition, ApiError>;
    /// Fetch a pipeline definition.
    async fn get(&self, project_id: &str, id: &str) -> Result<PipelineDefinition, ApiError>;
    /// Patch a pipeline definition.
    async fn update(
        &self,
        project_id: &str,
        id: &str,
        changes: &PipelineDefinition,
    ) -> Result<PipelineDefinition, ApiError>;
    /// Delete a pipeline definition.
    async fn delete(&self, project_id: &str, id: &str) -> Result<(), ApiError>;
}

/// Contexts and their restrictions.
#[async_trait]
pub trait ContextService: Send + Sync {
    /// Create a context owned by an organization.
    async fn create(&self, organization_id: &str, name: &str) -> Result<Context, ApiError>;
    /// Fetch a context by id.
    async fn get(&self, id: &str) -> Result<Context, ApiError>;
    /// Delete a context by id.
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
    /// List the restrictions on a context.
    async fn list_restrictions(&self, context_id: &str) -> Result<Vec<Restriction>, ApiError>;
    /// Add a restriction to a context.
    async fn create_restriction(
        &self,
        context_id: &str,
        value: &str,
        restriction_type: &str,
    ) -> Result<Restriction, ApiError>;
    /// Remove a restriction from a context.
    async fn delete_restriction(&self, context_id: &str, id: &str) -> Result<(), ApiError>;
}

/// Environment variables stored in a context.
#[async_trait]
pub trait ContextEnvironmentVariableService: Send + Sync {
    /// Create or replace a variable.
    async fn upsert(
        &self,
        context_id: &str,
        name: &str,
        value: &str,
    ) -> Result<ContextEnvironmentVariable, ApiError>;
    /// List the variables in a context.
    async fn list(&self, context_id: &str) -> Result<Vec<ContextEnvironmentVariable>, ApiError>;
    /// Delete a variable.
    async fn delete(&self, context_id: &str, name: &str) -> Result<(), ApiError>;
}

/// Environment variables stored on a project.
#[async_trait]
pub trait ProjectEnvironmentVariableService: Send + Sync {
    /// Create a variable.
    async fn create(
        &self,
        project_slug: &str,
        name: &str,
        value: &str,
    ) -> Result<ProjectEnvironmentVariable, ApiError>;
    /// Fetch a variable; the value comes back masked.
    async fn get(
        &self,
        project_slug: &str,
        name: &str,
    ) -> Result<ProjectEnvironmentVariable, ApiError>;
    /// Delete a variable.
    async fn delete(&self, project_slug: &str, name: &str) -> Result<(), ApiError>;
}

/// Pipeline triggers.
#[async_trait]
pub trait TriggerService: Send + Sync {
    /// Create a trigger for a pipeline definition.
    async fn create(
        &self,
        project_id: &str,
        pipeline_id: &str,
        trigger: &Trigger,
    ) -> Result<Trigger, ApiError>;
    /// Fetch a trigger.
    async fn get(&self, project_id: &str, id: &str) -> Result<Trigger, ApiError>;
    /// Patch a trigger.
    async fn update(
        &self,
        project_id: &str,
        id: &str,
        changes: &Trigger,
    ) -> Result<Trigger, ApiError>;
    /// Delete a trigger.
    async fn delete(&self, project_id: &str, id: &str) -> Result<(), ApiError>;
}

/// Outbound webhooks.
#[async_trait]
pub trait WebhookService: Send + Sync {
    /// Create a webhook.
    async fn create(&self, webhook: &Webhook) -> Result<Webhook, ApiError>;
    /// Fetch a webhook.
    async fn get(&self, id: &str) -> Result<Webhook, ApiError>;
    /// Replace a webhook's mutable fields.
    async fn update(&self, id: &str, webhook: &Webhook) -> Result<Webhook, ApiError>;
    /// Delete a webhook.
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}
