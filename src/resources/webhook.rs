//! `circleci_webhook`: outbound event notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    create_failed, decode, delete_failed, encode, lookup_failed, non_empty, read_failed,
    removed_on_read, require, split_import_id, update_failed, DataSource, Resource,
};
use crate::client::models::{Webhook, WebhookScope};
use crate::client::{ignore_not_found, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::types::{is_unknown, ReadResult};
use crate::webhook_url::{validate_https_url, validate_webhook_url};

const ENTITY: &str = "webhook";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct WebhookModel {
    id: Option<String>,
    name: Option<String>,
    url: Option<String>,
    verify_tls: Option<bool>,
    signing_secret: Option<String>,
    scope_id: Option<String>,
    scope_type: Option<String>,
    events: Option<Vec<String>>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl WebhookModel {
    fn to_webhook(&self) -> Webhook {
        Webhook {
            id: None,
            name: self.name.clone().unwrap_or_default(),
            url: self.url.clone().unwrap_or_default(),
            verify_tls: Some(self.verify_tls.unwrap_or(true)),
            signing_secret: self.signing_secret.clone(),
            events: self.events.clone().unwrap_or_default(),
            scope: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Signing secret is never returned, so it is left untouched.
    fn apply(&mut self, webhook: Webhook) {
        self.id = webhook.id.or(self.id.take());
        self.name = Some(webhook.name);
        self.url = Some(webhook.url);
        self.verify_tls = Some(webhook.verify_tls.unwrap_or(true));
        self.events = Some(webhook.events);
        if let Some(scope) = webhook.scope {
            self.scope_id = non_empty(Some(scope.id)).or(self.scope_id.take());
            self.scope_type = non_empty(Some(scope.scope_type)).or(self.scope_type.take());
        }
        self.created_at = webhook.created_at.or(self.created_at.take());
        self.updated_at = webhook.updated_at.or(self.updated_at.take());
    }
}

/// Manages a webhook attached to a project.
pub struct WebhookResource;

#[async_trait]
impl Resource for WebhookResource {
    fn type_name(&self) -> &'static str {
        "circleci_webhook"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a CircleCI outbound webhook.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "url",
                Attribute::required_string()
                    .with_description("HTTPS destination. Private and loopback hosts are rejected."),
            )
            .with_attribute(
                "verify_tls",
                Attribute::optional_computed_bool().with_default(json!(true)),
            )
            .with_attribute(
                "signing_secret",
                Attribute::required_string().sensitive(),
            )
            .with_attribute(
                "scope_id",
                Attribute::required_string().with_replace_on_change(),
            )
            .with_attribute(
                "scope_type",
                Attribute::required_string()
                    .with_replace_on_change()
                    .with_description("Scope kind, currently only `project`."),
            )
            .with_attribute("events", Attribute::required_string_list())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    fn validate_config(&self, config: &Value) -> Vec<Diagnostic> {
        let Some(url) = config.get("url").filter(|v| !is_unknown(v)).and_then(Value::as_str)
        else {
            return Vec::new();
        };
        [validate_https_url(url), validate_webhook_url(url)]
            .into_iter()
            .filter_map(Result::err)
            .collect()
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut plan: WebhookModel = decode(planned)?;
        let scope = WebhookScope {
            id: require(&plan.scope_id, "scope_id")?.to_string(),
            scope_type: require(&plan.scope_type, "scope_type")?.to_string(),
        };

        let mut request = plan.to_webhook();
        request.scope = Some(scope);
        let created = client
            .webhooks
            .create(&request)
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(webhook_id = ?created.id, scope_id = ?plan.scope_id, "created webhook");

        plan.apply(created);
        encode(&plan)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let mut current: WebhookModel = decode(state)?;
        let id = require(&current.id, "id")?.to_string();

        let Some(webhook) = client
            .webhooks
            .get(&id)
            .await
            .optional()
            .map_err(|e| read_failed(ENTITY, &id, e))?
        else {
            return Ok(removed_on_read(ENTITY, &id));
        };

        current.apply(webhook);
        Ok(ReadResult::found(encode(&current)?))
    }

    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: WebhookModel = decode(prior)?;
        let mut plan: WebhookModel = decode(planned)?;
        let id = require(&prior.id, "id")?;

        let updated = client
            .webhooks
            .update(id, &plan.to_webhook())
            .await
            .map_err(|e| update_failed(ENTITY, id, e))?;

        plan.id = Some(id.to_string());
        plan.created_at = prior.created_at;
        plan.apply(updated);
        encode(&plan)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: WebhookModel = decode(state)?;
        let id = require(&current.id, "id")?;
        ignore_not_found(client.webhooks.delete(id).await).map_err(|e| delete_failed(ENTITY, e))
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let (scope_id, webhook_id) = split_import_id(id, "scope_id/webhook_id")?;
        Ok(json!({ "id": webhook_id, "scope_id": scope_id, "scope_type": "project" }))
    }
}

/// Looks up a webhook by id.
pub struct WebhookDataSource;

#[async_trait]
impl DataSource for WebhookDataSource {
    fn type_name(&self) -> &'static str {
        "circleci_webhook"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Looks up a CircleCI outbound webhook.")
            .with_attribute("id", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("url", Attribute::computed_string())
            .with_attribute("verify_tls", Attribute::computed_bool())
            .with_attribute("scope_id", Attribute::computed_string())
            .with_attribute("scope_type", Attribute::computed_string())
            .with_attribute(
                "events",
                Attribute::computed(AttributeType::list(AttributeType::String)),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let mut lookup: WebhookModel = decode(config)?;
        let id = require(&lookup.id, "id")?.to_string();

        let webhook = client
            .webhooks
            .get(&id)
            .await
            .map_err(|e| lookup_failed(ENTITY, &id, e))?;
        lookup.apply(webhook);
        lookup.signing_secret = None;

        let mut state = encode(&lookup)?;
        if let Some(fields) = state.as_object_mut() {
            fields.remove("signing_secret");
        }
        Ok(state)
    }
}
