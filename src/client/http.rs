//! reqwest-backed implementation of every service trait.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::models::{
    AdvancedSettings, Context, ContextEnvironmentVariable, ContextOwner, NewContext,
    NewOrganization, NewProject, NewProjectEnvironmentVariable, NewRestriction, Organization,
    Page, PipelineDefinition, Project, ProjectEnvironmentVariable, ProjectSettings, Restriction,
    Trigger, Webhook,
};
use super::services::{
    ContextEnvironmentVariableService, ContextService, OrganizationService, PipelineService,
    ProjectEnvironmentVariableService, ProjectService, TriggerService, WebhookService,
};
use super::ApiError;
use crate::config::Config;

const USER_AGENT: &str = concat!("circleci-provider/", env!("CARGO_PKG_VERSION"));
const TOKEN_HEADER: &str = "Circle-Token";

/// HTTP transport for the CircleCI v2 API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl HttpTransport {
    /// Create a transport for `config`.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base: config.host.clone(),
            token: config.token.clone(),
        })
    }

    /// Resolve `path` against the API base URL.
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<String, ApiError> {
        let url = self.url(path)?;
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(TOKEN_HEADER, &self.token)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(method = %method, path, status = status.as_u16(), "CircleCI API call");

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            warn!(method = %method, path, status = status.as_u16(), "CircleCI API call failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        decode(&self.execute(Method::GET, path, None).await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        decode(&self.execute(method, path, Some(body)).await?)
    }

    async fn delete_path(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, None).await.map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pull the `message` field out of a CircleCI error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[async_trait]
impl OrganizationService for HttpTransport {
    async fn create(&self, name: &str, vcs_type: &str) -> Result<Organization, ApiError> {
        let body = NewOrganization {
            name: name.to_string(),
            vcs_type: vcs_type.to_string(),
        };
        self.send_json(Method::POST, "organization", &body).await
    }

    async fn get(&self, id: &str) -> Result<Organization, ApiError> {
        self.get_json(&format!("organization/{}", encode(id))).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_path(&format!("organization/{}", encode(id)))
            .await
    }
}

#[async_trait]
impl ProjectService for HttpTransport {
    async fn create(&self, organization_id: &str, name: &str) -> Result<Project, ApiError> {
        let body = NewProject {
            name: name.to_string(),
        };
        self.send_json(
            Method::POST,
            &format!("organization/{}/project", encode(organization_id)),
            &body,
        )
        .await
    }

    async fn get(&self, slug: &str) -> Result<Project, ApiError> {
        self.get_json(&format!("project/{}", slug)).await
    }

    async fn delete(&self, slug: &str) -> Result<(), ApiError> {
        self.delete_path(&format!("project/{}", slug)).await
    }

    async fn get_settings(
        &self,
        provider: &str,
        organization: &str,
        project: &str,
    ) -> Result<ProjectSettings, ApiError> {
        self.get_json(&format!(
            "project/{}/{}/{}/settings",
            encode(provider),
            encode(organization),
            encode(project)
        ))
        .await
    }

    async fn update_settings(
        &self,
        settings: &AdvancedSettings,
        provider: &str,
        organization: &str,
        project: &str,
    ) -> Result<ProjectSettings, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!(
                "project/{}/{}/{}/settings",
                encode(provider),
                encode(organization),
                encode(project)
            ),
            &json!({ "advanced": settings }),
        )
        .await
    }
}

#[async_trait]
impl PipelineService for HttpTransport {
    async fn create(
        &self,
        project_id: &str,
        pipeline: &PipelineDefinition,
    ) -> Result<PipelineDefinition, ApiError> {
        self.send_json(
            Method::POST,
            &format!("projects/{}/pipeline-definitions", encode(project_id)),
            pipeline,
        )
        .await
    }

    async fn get(&self, project_id: &str, id: &str) -> Result<PipelineDefinition, ApiError> {
        self.get_json(&format!(
            "projects/{}/pipeline-definitions/{}",
            encode(project_id),
            encode(id)
        ))
        .await
    }

    async fn update(
        &self,
        project_id: &str,
        id: &str,
        changes: &PipelineDefinition,
    ) -> Result<PipelineDefinition, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!(
                "projects/{}/pipeline-definitions/{}",
                encode(project_id),
                encode(id)
            ),
            changes,
        )
        .await
    }

    async fn delete(&self, project_id: &str, id: &str) -> Result<(), ApiError> {
        self.delete_path(&format!(
            "projects/{}/pipeline-definitions/{}",
            encode(project_id),
            encode(id)
        ))
        .await
    }
}

#[async_trait]
impl ContextService for HttpTransport {
    async fn create(&self, organization_id: &str, name: &str) -> Result<Context, ApiError> {
        let body = NewContext {
            name: name.to_string(),
            owner: ContextOwner {
                id: organization_id.to_string(),
                owner_type: "organization".to_string(),
            },
        };
        self.send_json(Method::POST, "context", &body).await
    }

    async fn get(&self, id: &str) -> Result<Context, ApiError> {
        self.get_json(&format!("context/{}", encode(id))).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_path(&format!("context/{}", encode(id))).await
    }

    async fn list_restrictions(&self, context_id: &str) -> Result<Vec<Restriction>, ApiError> {
        let page: Page<Restriction> = self
            .get_json(&format!("context/{}/restrictions", encode(context_id)))
            .await?;
        Ok(page.items)
    }

    async fn create_restriction(
        &self,
        context_id: &str,
        value: &str,
        restriction_type: &str,
    ) -> Result<Restriction, ApiError> {
        let body = NewRestriction {
            restriction_type: restriction_type.to_string(),
            restriction_value: value.to_string(),
        };
        self.send_json(
            Method::POST,
            &format!("context/{}/restrictions", encode(context_id)),
            &body,
        )
        .await
    }

    async fn delete_restriction(&self, context_id: &str, id: &str) -> Result<(), ApiError> {
        self.delete_path(&format!(
            "context/{}/restrictions/{}",
            encode(context_id),
            encode(id)
        ))
        .await
    }
}

#[async_trait]
impl ContextEnvironmentVariableService for HttpTransport {
    async fn upsert(
        &self,
        context_id: &str,
        name: &str,
        value: &str,
    ) -> Result<ContextEnvironmentVariable, ApiError> {
        self.send_json(
            Method::PUT,
            &format!(
                "context/{}/environment-variable/{}",
                encode(context_id),
                encode(name)
            ),
            &json!({ "value": value }),
        )
        .await
    }

    async fn list(&self, context_id: &str) -> Result<Vec<ContextEnvironmentVariable>, ApiError> {
        let page: Page<ContextEnvironmentVariable> = self
            .get_json(&format!(
                "context/{}/environment-variable",
                encode(context_id)
            ))
            .await?;
        Ok(page.items)
    }

    async fn delete(&self, context_id: &str, name: &str) -> Result<(), ApiError> {
        self.delete_path(&format!(
            "context/{}/environment-variable/{}",
            encode(context_id),
            encode(name)
        ))
        .await
    }
}

#[async_trait]
impl ProjectEnvironmentVariableService for HttpTransport {
    async fn create(
        &self,
        project_slug: &str,
        name: &str,
        value: &str,
    ) -> Result<ProjectEnvironmentVariable, ApiError> {
        let body = NewProjectEnvironmentVariable {
            name: name.to_string(),
            value: value.to_string(),
        };
        self.send_json(
            Method::POST,
            &format!("project/{}/envvar", project_slug),
            &body,
        )
        .await
    }

    async fn get(
        &self,
        project_slug: &str,
        name: &str,
    ) -> Result<ProjectEnvironmentVariable, ApiError> {
        self.get_json(&format!("project/{}/envvar/{}", project_slug, encode(name)))
            .await
    }

    async fn delete(&self, project_slug: &str, name: &str) -> Result<(), ApiError> {
        self.delete_path(&format!("project/{}/envvar/{}", project_slug, encode(name)))
            .await
    }
}

#[async_trait]
impl TriggerService for HttpTransport {
    async fn create(
        &self,
        project_id: &str,
        pipeline_id: &str,
        trigger: &Trigger,
    ) -> Result<Trigger, ApiError> {
        self.send_json(
            Method::POST,
            &format!(
                "projects/{}/pipeline-definitions/{}/triggers",
                encode(project_id),
                encode(pipeline_id)
            ),
            trigger,
        )
        .await
    }

    async fn get(&self, project_id: &str, id: &str) -> Result<Trigger, ApiError> {
        self.get_json(&format!(
            "projects/{}/triggers/{}",
            encode(project_id),
            encode(id)
        ))
        .await
    }

    async fn update(
        &self,
        project_id: &str,
        id: &str,
        changes: &Trigger,
    ) -> Result<Trigger, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!("projects/{}/triggers/{}", encode(project_id), encode(id)),
            changes,
        )
        .await
    }

    async fn delete(&self, project_id: &str, id: &str) -> Result<(), ApiError> {
        self.delete_path(&format!(
            "projects/{}/triggers/{}",
            encode(project_id),
            encode(id)
        ))
        .await
    }
}

#[async_trait]
impl WebhookService for HttpTransport {
    async fn create(&self, webhook: &Webhook) -> Result<Webhook, ApiError> {
        self.send_json(Method::POST, "webhook", webhook).await
    }

    async fn get(&self, id: &str) -> Result<Webhook, ApiError> {
        self.get_json(&format!("webhook/{}", encode(id))).await
    }

    async fn update(&self, id: &str, webhook: &Webhook) -> Result<Webhook, ApiError> {
        self.send_json(Method::PUT, &format!("webhook/{}", encode(id)), webhook)
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_path(&format!("webhook/{}", encode(id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(host: &str) -> HttpTransport {
        HttpTransport::new(&Config::new(host, "token").unwrap()).unwrap()
    }

    #[test]
    fn test_url_keeps_base_path() {
        let http = transport("https://circleci.com/api/v2");
        assert_eq!(
            http.url("project/circleci/org/proj").unwrap().as_str(),
            "https://circleci.com/api/v2/project/circleci/org/proj"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message": "Project not found"}"#),
            "Project not found"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode("MY VAR"), "MY%20VAR");
        assert_eq!(encode("e51158a2-f59c"), "e51158a2-f59c");
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("circleci-provider/"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let http = transport("http://127.0.0.1:9");
        let err = OrganizationService::get(&http, "abc").await.unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));
    }
}
