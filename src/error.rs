//! Error types for the CircleCI provider.
//!
//! Every failure ends up in front of the user as a diagnostic with a short
//! summary and a detail string carrying the underlying cause.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors raised while serving a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// User input was rejected before any remote call was made.
    #[error("{summary}: {detail}")]
    InvalidInput {
        /// Short title shown to the user.
        summary: String,
        /// Explanation of what was wrong.
        detail: String,
        /// Attribute the problem is attached to, if any.
        attribute: Option<String>,
    },

    /// The CircleCI API call failed.
    #[error("{summary}: {detail}")]
    Remote {
        /// Short title shown to the user.
        summary: String,
        /// Context plus the underlying API error.
        detail: String,
    },

    /// Several validation problems were found at once.
    #[error("{} validation error(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),

    /// A resource operation ran before `Configure`.
    #[error("Unconfigured CircleCI client")]
    NotConfigured,

    /// The provider configuration could not be turned into a client.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A state or configuration value did not match the expected shape.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl ProviderError {
    /// Input error without an attribute path.
    pub fn invalid_input(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    /// Input error attached to `attribute`.
    pub fn invalid_attribute(
        attribute: impl Into<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            summary: summary.into(),
            detail: detail.into(),
            attribute: Some(attribute.into()),
        }
    }

    /// Remote call failure.
    pub fn remote(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Remote {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Turn the error into the diagnostics reported to the host.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            Self::InvalidInput {
                summary,
                detail,
                attribute,
            } => {
                let diagnostic = Diagnostic::error(summary).with_detail(detail);
                vec![match attribute {
                    Some(attribute) => diagnostic.with_attribute(attribute),
                    None => diagnostic,
                }]
            },
            Self::Remote { summary, detail } => {
                vec![Diagnostic::error(summary).with_detail(detail)]
            },
            Self::Diagnostics(diagnostics) => diagnostics,
            Self::NotConfigured => vec![Diagnostic::error("Unconfigured CircleCI client")
                .with_detail(
                    "Expected a configured CircleCI client. Please report this issue to the provider developers.",
                )],
            other => vec![Diagnostic::error(other.to_string())],
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidInput { .. } | ProviderError::Diagnostics(_) => {
                tonic::Status::invalid_argument(err.to_string())
            },
            ProviderError::Remote { .. } => tonic::Status::unavailable(err.to_string()),
            ProviderError::NotConfigured | ProviderError::Configuration(_) => {
                tonic::Status::failed_precondition(err.to_string())
            },
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
        }
    }
}
