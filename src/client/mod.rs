//! CircleCI REST client facade.
//!
//! [`Client`] bundles one handle per resource family. All handles built by
//! [`Client::new`] share a single [`HttpTransport`] and therefore a single
//! connection pool. The bundle is cheap to clone and read-only after
//! construction.

mod http;
pub mod models;
pub mod services;

use std::sync::Arc;

use thiserror::Error;

pub use self::http::HttpTransport;
pub use self::services::{
    ContextEnvironmentVariableService, ContextService, OrganizationService, PipelineService,
    ProjectEnvironmentVariableService, ProjectService, TriggerService, WebhookService,
};
use crate::config::Config;

/// Errors returned by the CircleCI API layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered 404.
    #[error("not found: {path}")]
    NotFound {
        /// Request path that was not found.
        path: String,
    },

    /// The API answered with another non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// A request URL could not be built.
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the API reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Turn "not found" into `Ok(None)` while keeping every other error.
pub trait OptionalExt<T> {
    /// See trait docs.
    fn optional(self) -> Result<Option<T>, ApiError>;
}

impl<T> OptionalExt<T> for Result<T, ApiError> {
    fn optional(self) -> Result<Option<T>, ApiError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Treat "not found" on delete as success.
pub(crate) fn ignore_not_found(result: Result<(), ApiError>) -> Result<(), ApiError> {
    result.optional().map(|_| ())
}

/// Bundle of per-family service handles.
#[derive(Clone)]
pub struct Client {
    /// Organizations.
    pub organizations: Arc<dyn OrganizationService>,
    /// Projects and project settings.
    pub projects: Arc<dyn ProjectService>,
    /// Pipeline definitions.
    pub pipelines: Arc<dyn PipelineService>,
    /// Contexts and restrictions.
    pub contexts: Arc<dyn ContextService>,
    /// Context environment variables.
    pub context_variables: Arc<dyn ContextEnvironmentVariableService>,
    /// Project environment variables.
    pub project_variables: Arc<dyn ProjectEnvironmentVariableService>,
    /// Pipeline triggers.
    pub triggers: Arc<dyn TriggerService>,
    /// Outbound webhooks.
    pub webhooks: Arc<dyn WebhookService>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client talking to the CircleCI API described by `config`.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Ok(Self::from_backend(Arc::new(HttpTransport::new(config)?)))
    }

    /// Build a client whose every handle is served by `backend`.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: OrganizationService
            + ProjectService
            + PipelineService
            + ContextService
            + ContextEnvironmentVariableService
            + ProjectEnvironmentVariableService
            + TriggerService
            + WebhookService
            + 'static,
    {
        Self {
            organizations: backend.clone(),
            projects: backend.clone(),
            pipelines: backend.clone(),
            contexts: backend.clone(),
            context_variables: backend.clone(),
            project_variables: backend.clone(),
            triggers: backend.clone(),
            webhooks: backend,
        }
    }
}
