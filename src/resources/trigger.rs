//! `circleci_trigger`: what starts a pipeline.
//!
//! A trigger's event source is exactly one of two shapes, modelled by
//! [`EventSource`]. The flat attribute table is decoded into it before any
//! API call, so an invalid combination never reaches CircleCI.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{
    create_failed, decode, delete_failed, encode, lookup_failed, non_empty, read_failed,
    removed_on_read, require, split_import_id, update_failed, DataSource, Resource,
};
use crate::client::models::{Repo, Trigger, TriggerEventSource, TriggerWebhook};
use crate::client::{ignore_not_found, Client, OptionalExt};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::{is_unknown, strip_unknown, ReadResult};
use crate::validators::{NullWhen, RequiredWhen};

const ENTITY: &str = "trigger";

const INVALID_TRIGGER: &str = "Error creating CircleCI trigger";

const EVENT_NAME_REQUIRED: RequiredWhen = RequiredWhen::new("event_source_provider", "webhook");
const EVENT_NAME_SUPPRESSED: NullWhen = NullWhen::new("event_source_provider", "github_app");

/// Repository events a `github_app` trigger can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum EventPreset {
    AllPushes,
    OnlyTags,
    DefaultBranchPushes,
    OnlyBuildPrs,
    OnlyOpenPrs,
    OnlyLabeledPrs,
    OnlyMergedPrs,
    OnlyReadyForReviewPrs,
    OnlyBranchDelete,
    OnlyBuildPushesToNonDraftPrs,
    OnlyMergedOrClosedPrs,
}

impl EventPreset {
    /// Every preset, in API order.
    pub const ALL: [EventPreset; 11] = [
        Self::AllPushes,
        Self::OnlyTags,
        Self::DefaultBranchPushes,
        Self::OnlyBuildPrs,
        Self::OnlyOpenPrs,
        Self::OnlyLabeledPrs,
        Self::OnlyMergedPrs,
        Self::OnlyReadyForReviewPrs,
        Self::OnlyBranchDelete,
        Self::OnlyBuildPushesToNonDraftPrs,
        Self::OnlyMergedOrClosedPrs,
    ];

    /// Wire name, e.g. `all-pushes`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllPushes => "all-pushes",
            Self::OnlyTags => "only-tags",
            Self::DefaultBranchPushes => "default-branch-pushes",
            Self::OnlyBuildPrs => "only-build-prs",
            Self::OnlyOpenPrs => "only-open-prs",
            Self::OnlyLabeledPrs => "only-labeled-prs",
            Self::OnlyMergedPrs => "only-merged-prs",
            Self::OnlyReadyForReviewPrs => "only-ready-for-review-prs",
            Self::OnlyBranchDelete => "only-branch-delete",
            Self::OnlyBuildPushesToNonDraftPrs => "only-build-pushes-to-non-draft-prs",
            Self::OnlyMergedOrClosedPrs => "only-merged-or-closed-prs",
        }
    }
}

impl fmt::Display for EventPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventPreset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or(())
    }
}

/// Where a trigger's events come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// Repository events delivered by the CircleCI GitHub App.
    GithubApp {
        /// Event filter.
        preset: EventPreset,
        /// Repository id on GitHub.
        repo_external_id: Option<String>,
    },
    /// Calls to an inbound webhook.
    Webhook {
        /// Event name passed to the pipeline.
        event_name: String,
        /// Inbound URL.
        url: String,
        /// Sender name.
        sender: String,
    },
}

fn invalid(detail: &str) -> ProviderError {
    ProviderError::invalid_input(INVALID_TRIGGER, detail)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl EventSource {
    fn from_model(model: &TriggerModel) -> Result<Self, ProviderError> {
        match model.event_source_provider.as_deref() {
            Some("github_app") => {
                let preset = model
                    .event_preset
                    .as_deref()
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(|| {
                        invalid("CircleCI trigger with github_app provider has an unexpected event_preset")
                    })?;
                if model.event_name.is_some() {
                    return Err(invalid(
                        "CircleCI trigger with github_app provider does not support event_name",
                    ));
                }
                Ok(Self::GithubApp {
                    preset,
                    repo_external_id: model.event_source_repo_external_id.clone(),
                })
            },
            Some("webhook") => {
                let url = present(&model.event_source_web_hook_url).ok_or_else(|| {
                    invalid("CircleCI trigger with webhook provider has an unexpected event source web hook url")
                })?;
                let event_name = present(&model.event_name).ok_or_else(|| {
                    invalid("CircleCI trigger with webhook provider requires an event_name")
                })?;
                let sender = present(&model.event_source_web_hook_sender).ok_or_else(|| {
                    invalid("CircleCI trigger with webhook provider requires a Webhook Sender")
                })?;
                if model.event_preset.is_some() {
                    return Err(invalid(
                        "CircleCI trigger with webhook provider does not support event_preset",
                    ));
                }
                Ok(Self::Webhook {
                    event_name: event_name.to_string(),
                    url: url.to_string(),
                    sender: sender.to_string(),
                })
            },
            _ => Err(invalid(
                "CircleCI trigger has an unexpected event source provider: should be either github_app or webhook",
            )),
        }
    }

    /// Provider name on the wire.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::GithubApp { .. } => "github_app",
            Self::Webhook { .. } => "webhook",
        }
    }

    fn to_trigger(&self, model: &TriggerModel) -> Trigger {
        let (repo, webhook, preset, event_name) = match self {
            Self::GithubApp {
                preset,
                repo_external_id,
            } => (
                Some(Repo {
                    full_name: None,
                    external_id: repo_external_id.clone(),
                }),
                None,
                Some(preset.to_string()),
                None,
            ),
            Self::Webhook {
                event_name,
                url,
                sender,
            } => (
                None,
                Some(TriggerWebhook {
                    url: Some(url.clone()),
                    sender: Some(sender.clone()),
                }),
                None,
                Some(event_name.clone()),
            ),
        };
        Trigger {
            id: None,
            created_at: None,
            event_source: Some(TriggerEventSource {
                provider: Some(self.provider().to_string()),
                repo,
                webhook,
            }),
            event_preset: preset,
            event_name,
            checkout_ref: model.checkout_ref.clone(),
            config_ref: model.config_ref.clone(),
            disabled: Some(model.disabled.unwrap_or(false)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct TriggerModel {
    id: Option<String>,
    project_id: Option<String>,
    pipeline_id: Option<String>,
    checkout_ref: Option<String>,
    config_ref: Option<String>,
    event_source_provider: Option<String>,
    event_source_repo_full_name: Option<String>,
    event_source_repo_external_id: Option<String>,
    event_source_web_hook_url: Option<String>,
    event_source_web_hook_sender: Option<String>,
    event_preset: Option<String>,
    event_name: Option<String>,
    disabled: Option<bool>,
    created_at: Option<String>,
}

impl TriggerModel {
    fn apply(&mut self, trigger: Trigger) {
        let source = trigger.event_source.unwrap_or_default();
        let repo = source.repo.unwrap_or_default();
        let webhook = source.webhook.unwrap_or_default();

        self.id = trigger.id.or(self.id.take());
        self.checkout_ref = trigger.checkout_ref;
        self.config_ref = trigger.config_ref;
        self.event_source_provider = source.provider;
        self.event_source_repo_full_name = non_empty(repo.full_name);
        self.event_source_repo_external_id = non_empty(repo.external_id);
        self.event_source_web_hook_url = non_empty(webhook.url);
        if let Some(sender) = non_empty(webhook.sender) {
            self.event_source_web_hook_sender = Some(sender);
        }
        self.event_preset = non_empty(trigger.event_preset);
        self.event_name = non_empty(trigger.event_name);
        self.disabled = trigger.disabled.or(self.disabled);
        self.created_at = trigger.created_at.or(self.created_at.take());
    }
}

fn trigger_attributes(schema: Schema, source: fn() -> Attribute) -> Schema {
    [
        "checkout_ref",
        "config_ref",
        "event_source_provider",
        "event_source_repo_full_name",
        "event_source_repo_external_id",
        "event_source_web_hook_url",
        "event_source_web_hook_sender",
        "event_preset",
        "event_name",
        "created_at",
    ]
    .into_iter()
    .fold(schema, |schema, name| schema.with_attribute(name, source()))
}

/// Manages a pipeline trigger.
pub struct TriggerResource;

#[async_trait]
impl Resource for TriggerResource {
    fn type_name(&self) -> &'static str {
        "circleci_trigger"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a CircleCI pipeline trigger.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "project_id",
                Attribute::required_string().with_replace_on_change(),
            )
            .with_attribute(
                "pipeline_id",
                Attribute::required_string().with_replace_on_change(),
            )
            .with_attribute("checkout_ref", Attribute::required_string())
            .with_attribute("config_ref", Attribute::required_string())
            .with_attribute(
                "event_source_provider",
                Attribute::required_string()
                    .with_replace_on_change()
                    .with_description("`github_app` or `webhook`."),
            )
            .with_attribute("event_source_repo_full_name", Attribute::computed_string())
            .with_attribute("event_source_repo_external_id", Attribute::optional_string())
            .with_attribute(
                "event_source_web_hook_url",
                Attribute::optional_computed_string().sensitive(),
            )
            .with_attribute("event_source_web_hook_sender", Attribute::optional_string())
            .with_attribute(
                "event_preset",
                Attribute::optional_string().with_description(format!(
                    "Event filter for `github_app` triggers. One of: {}.",
                    EventPreset::ALL.map(EventPreset::as_str).join(", ")
                )),
            )
            .with_attribute(
                "event_name",
                Attribute::optional_computed_string()
                    .with_description("Event name. Required for `webhook` triggers."),
            )
            .with_attribute(
                "disabled",
                Attribute::optional_computed_bool().with_default(json!(false)),
            )
            .with_attribute("created_at", Attribute::computed_string())
    }

    fn validate_config(&self, config: &Value) -> Vec<Diagnostic> {
        if let Some(diagnostic) = EVENT_NAME_REQUIRED.validate("event_name", config) {
            return vec![diagnostic];
        }

        let deciding = [
            "event_source_provider",
            "event_preset",
            "event_name",
            "event_source_web_hook_url",
            "event_source_web_hook_sender",
        ];
        if deciding.iter().any(|k| config.get(*k).is_some_and(is_unknown)) {
            return Vec::new();
        }

        match decode::<TriggerModel>(strip_unknown(config.clone()))
            .and_then(|model| EventSource::from_model(&model))
        {
            Ok(_) => Vec::new(),
            Err(err) => err.into_diagnostics(),
        }
    }

    fn modify_plan(&self, planned: &mut Map<String, Value>, config: &Value) {
        EVENT_NAME_SUPPRESSED.modify_plan("event_name", config, planned);
    }

    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut plan: TriggerModel = decode(planned)?;
        let source = EventSource::from_model(&plan)?;
        let project_id = require(&plan.project_id, "project_id")?.to_string();
        let pipeline_id = require(&plan.pipeline_id, "pipeline_id")?.to_string();

        let created = client
            .triggers
            .create(&project_id, &pipeline_id, &source.to_trigger(&plan))
            .await
            .map_err(|e| create_failed(ENTITY, e))?;
        debug!(project_id = %project_id, trigger_id = ?created.id, provider = source.provider(), "created trigger");

        plan.apply(created);
        encode(&plan)
    }

    async fn read(&self, client: &Client, state: Value) -> Result<ReadResult, ProviderError> {
        let mut current: TriggerModel = decode(state)?;
        let project_id = require(&current.project_id, "project_id")?.to_string();
        let id = require(&current.id, "id")?.to_string();

        let Some(trigger) = client
            .triggers
            .get(&project_id, &id)
            .await
            .optional()
            .map_err(|e| read_failed(ENTITY, &id, e))?
        else {
            return Ok(removed_on_read(ENTITY, &id));
        };

        current.apply(trigger);
        Ok(ReadResult::found(encode(&current)?))
    }

    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: TriggerModel = decode(prior)?;
        let mut plan: TriggerModel = decode(planned)?;
        let source = EventSource::from_model(&plan)?;
        let project_id = require(&plan.project_id, "project_id")?.to_string();
        let id = require(&prior.id, "id")?;

        let updated = client
            .triggers
            .update(&project_id, id, &source.to_trigger(&plan))
            .await
            .map_err(|e| update_failed(ENTITY, id, e))?;

        plan.id = Some(id.to_string());
        plan.apply(updated);
        encode(&plan)
    }

    async fn delete(&self, client: &Client, state: Value) -> Result<(), ProviderError> {
        let current: TriggerModel = decode(state)?;
        let project_id = require(&current.project_id, "project_id")?;
        let id = require(&current.id, "id")?;
        ignore_not_found(client.triggers.delete(project_id, id).await)
            .map_err(|e| delete_failed(ENTITY, e))
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let (project_id, trigger_id) = split_import_id(id, "project_id/trigger_id")?;
        Ok(json!({ "project_id": project_id, "id": trigger_id }))
    }
}

/// Looks up a pipeline trigger.
pub struct TriggerDataSource;

#[async_trait]
impl DataSource for TriggerDataSource {
    fn type_name(&self) -> &'static str {
        "circleci_trigger"
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description("Looks up a CircleCI pipeline trigger.")
            .with_attribute("id", Attribute::required_string())
            .with_attribute("project_id", Attribute::required_string())
            .with_attribute("pipeline_id", Attribute::computed_string())
            .with_attribute("disabled", Attribute::computed_bool());
        let mut schema = trigger_attributes(schema, Attribute::computed_string);
        if let Some(attr) = schema.attributes.get_mut("event_source_web_hook_url") {
            attr.flags.sensitive = true;
        }
        schema
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let mut lookup: TriggerModel = decode(config)?;
        let project_id = require(&lookup.project_id, "project_id")?.to_string();
        let id = require(&lookup.id, "id")?.to_string();

        let trigger = client
            .triggers
            .get(&project_id, &id)
            .await
            .map_err(|e| lookup_failed(ENTITY, &id, e))?;
        lookup.apply(trigger);
        encode(&lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{diagnostics_of, MockCircleCi, CREATED_AT};
    use crate::types::UNKNOWN_VALUE;

    fn github_app() -> Value {
        json!({
            "project_id": "proj-1",
            "pipeline_id": "pipe-1",
            "checkout_ref": "main",
            "config_ref": "main",
            "event_source_provider": "github_app",
            "event_source_repo_external_id": "1234",
            "event_preset": "all-pushes",
        })
    }

    fn webhook() -> Value {
        json!({
            "project_id": "proj-1",
            "pipeline_id": "pipe-1",
            "checkout_ref": "main",
            "config_ref": "main",
            "event_source_provider": "webhook",
            "event_source_web_hook_url": "https://hooks.example.com/in",
            "event_source_web_hook_sender": "deployer",
            "event_name": "deploy",
        })
    }

    fn detail_of(config: Value) -> String {
        let model: TriggerModel = decode(config).unwrap();
        let diagnostics = EventSource::from_model(&model).unwrap_err().into_diagnostics();
        assert_eq!(diagnostics[0].summary, INVALID_TRIGGER);
        diagnostics[0].detail.clone().unwrap()
    }

    #[test]
    fn test_event_preset_round_trip() {
        for preset in EventPreset::ALL {
            assert_eq!(preset.as_str().parse::<EventPreset>(), Ok(preset));
        }
        assert!("some-pushes".parse::<EventPreset>().is_err());
    }

    #[test]
    fn test_event_source_variants() {
        let model: TriggerModel = decode(github_app()).unwrap();
        assert_eq!(
            EventSource::from_model(&model).unwrap(),
            EventSource::GithubApp {
                preset: EventPreset::AllPushes,
                repo_external_id: Some("1234".to_string()),
            }
        );

        let model: TriggerModel = decode(webhook()).unwrap();
        assert_eq!(EventSource::from_model(&model).unwrap().provider(), "webhook");
    }

    #[test]
    fn test_github_app_rules() {
        let mut config = github_app();
        config["event_preset"] = json!("sometimes");
        assert_eq!(
            detail_of(config),
            "CircleCI trigger with github_app provider has an unexpected event_preset"
        );

        let mut config = github_app();
        config.as_object_mut().unwrap().remove("event_preset");
        assert_eq!(
            detail_of(config),
            "CircleCI trigger with github_app provider has an unexpected event_preset"
        );

        let mut config = github_app();
        config["event_name"] = json!("push");
        assert_eq!(
            detail_of(config),
            "CircleCI trigger with github_app provider does not support event_name"
        );
    }

    #[test]
    fn test_webhook_rules() {
        let mut config = webhook();
        config.as_object_mut().unwrap().remove("event_source_web_hook_url");
        assert_eq!(
            detail_of(config),
            "CircleCI trigger with webhook provider has an unexpected event source web hook url"
        );

        let mut config = webhook();
        config["event_name"] = json!("");
        assert_eq!(
            detail_of(config),
            "CircleCI trigger with webhook provider requires an event_name"
        );

        let mut config = webhook();
        config.as_object_mut().unwrap().remove("event_source_web_hook_sender");
        assert_eq!(
            detail_of(config),
            "CircleCI trigger with webhook provider requires a Webhook Sender"
        );

        let mut config = webhook();
        config["event_preset"] = json!("all-pushes");
        assert_eq!(
            detail_of(config),
            "CircleCI trigger with webhook provider does not support event_preset"
        );
    }

    #[test]
    fn test_unknown_provider() {
        let mut config = github_app();
        config["event_source_provider"] = json!("gitlab");
        assert_eq!(
            detail_of(config),
            "CircleCI trigger has an unexpected event source provider: should be either github_app or webhook"
        );
    }

    #[test]
    fn test_validate_config() {
        assert!(TriggerResource.validate_config(&github_app()).is_empty());
        assert!(TriggerResource.validate_config(&webhook()).is_empty());

        let mut config = webhook();
        config.as_object_mut().unwrap().remove("event_name");
        let diagnostics = TriggerResource.validate_config(&config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing required attribute: event_name");

        let mut config = github_app();
        config["event_preset"] = json!(UNKNOWN_VALUE);
        assert!(TriggerResource.validate_config(&config).is_empty());
    }

    #[test]
    fn test_modify_plan_nulls_event_name_for_github_app() {
        let mut planned = github_app().as_object().cloned().unwrap();
        planned.insert("event_name".to_string(), json!(UNKNOWN_VALUE));
        TriggerResource.modify_plan(&mut planned, &github_app());
        assert_eq!(planned["event_name"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_trigger_never_reaches_api() {
        let mock = MockCircleCi::new();
        let mut config = github_app();
        config["event_name"] = json!("push");
        let diagnostics = diagnostics_of(TriggerResource.create(&mock.client(), config).await);
        assert_eq!(diagnostics[0].summary, INVALID_TRIGGER);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_github_app_round_trip() {
        let mock = MockCircleCi::new();
        let client = mock.client();

        let created = TriggerResource.create(&client, github_app()).await.unwrap();
        assert_eq!(created["event_source_repo_full_name"], "acme/repo-1234");
        assert_eq!(created["event_name"], Value::Null);
        assert_eq!(created["event_source_web_hook_url"], Value::Null);
        assert_eq!(created["disabled"], false);
        assert_eq!(created["created_at"], CREATED_AT);

        let read = TriggerResource.read(&client, created.clone()).await.unwrap();
        assert_eq!(read.state, Some(created));
    }

    #[tokio::test]
    async fn test_webhook_round_trip_and_update() {
        let mock = MockCircleCi::new();
        let client = mock.client();

        let created = TriggerResource.create(&client, webhook()).await.unwrap();
        assert_eq!(created["event_name"], "deploy");
        assert_eq!(created["event_source_web_hook_sender"], "deployer");
        assert_eq!(created["event_source_repo_full_name"], Value::Null);

        let mut planned = created.clone();
        planned["disabled"] = json!(true);
        planned["event_name"] = json!("release");
        let updated = TriggerResource
            .update(&client, created.clone(), planned)
            .await
            .unwrap();
        assert_eq!(updated["disabled"], true);
        assert_eq!(updated["event_name"], "release");
        assert_eq!(updated["id"], created["id"]);

        let read = TriggerResource.read(&client, updated.clone()).await.unwrap();
        assert_eq!(read.state, Some(updated));
    }

    #[tokio::test]
    async fn test_missing_and_delete_twice() {
        let mock = MockCircleCi::new();
        let client = mock.client();
        let created = TriggerResource.create(&client, github_app()).await.unwrap();

        TriggerResource.delete(&client, created.clone()).await.unwrap();
        TriggerResource.delete(&client, created.clone()).await.unwrap();
        assert!(TriggerResource.read(&client, created).await.unwrap().is_removed());
    }

    #[test]
    fn test_import() {
        let seeded = TriggerResource.import("proj-1/trig-1").unwrap();
        assert_eq!(seeded, json!({"project_id": "proj-1", "id": "trig-1"}));
        assert!(TriggerResource.import("trig-1").is_err());
    }

    #[tokio::test]
    async fn test_data_source() {
        let mock = MockCircleCi::new();
        let client = mock.client();
        let created = TriggerResource.create(&client, github_app()).await.unwrap();

        let found = TriggerDataSource
            .read(&client, json!({"id": created["id"], "project_id": "proj-1"}))
            .await
            .unwrap();
        assert_eq!(found["event_preset"], "all-pushes");

        let diagnostics = diagnostics_of(
            TriggerDataSource
                .read(&client, json!({"id": "nope", "project_id": "proj-1"}))
                .await,
        );
        assert_eq!(diagnostics[0].summary, "Trigger not found");
    }

    #[test]
    fn test_data_source_hides_web_hook_url() {
        let resource = TriggerResource.schema();
        let data_source = TriggerDataSource.schema();
        for schema in [&resource, &data_source] {
            assert!(schema
                .attribute("event_source_web_hook_url")
                .unwrap()
                .flags
                .sensitive);
        }
        assert!(!data_source.attribute("event_name").unwrap().flags.sensitive);
    }
}
