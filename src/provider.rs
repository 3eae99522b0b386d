//! The CircleCI provider: dispatches host calls to entity adapters.
//!
//! The API client is built by `Configure` and shared by every later call.
//! Any resource or data source operation that runs before that fails with
//! [`ProviderError::NotConfigured`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::Client;
use crate::config::{self, Config, EnvLookup};
use crate::error::ProviderError;
use crate::resources::{self, DataSource, Resource};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{strip_unknown, unknown, AttributeChange, ImportedResource, PlanResult, ReadResult};
use crate::validation;

/// Provider serving every `circleci_*` resource and data source.
pub struct CircleCiProvider {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
    client: RwLock<Option<Client>>,
    env: EnvLookup,
}

impl Default for CircleCiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CircleCiProvider {
    /// A provider reading fallback settings from the process environment.
    pub fn new() -> Self {
        Self::with_env(config::process_env())
    }

    /// A provider reading fallback settings from `env`.
    pub fn with_env(env: EnvLookup) -> Self {
        Self {
            resources: resources::resources()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: resources::data_sources()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            client: RwLock::new(None),
            env,
        }
    }

    /// A provider that is already configured with `client`. It has no
    /// environment fallback, so a later `Configure` uses its config alone.
    pub fn with_client(client: Client) -> Self {
        let provider = Self::with_env(Arc::new(|_| None));
        Self {
            client: RwLock::new(Some(client)),
            ..provider
        }
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    async fn client(&self) -> Result<Client, ProviderError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }
}

/// Value a computed attribute takes when configuration leaves it unset.
///
/// Updates keep the prior value. New objects get the schema default, or
/// unknown when the API decides.
fn computed_value(attribute: &Attribute, prior: Option<&Value>) -> Value {
    match prior {
        Some(prior) => match prior {
            Value::Null => attribute.default.clone().unwrap_or(Value::Null),
            value => value.clone(),
        },
        None => attribute.default.clone().unwrap_or_else(unknown),
    }
}

fn fill_computed(
    schema: &Schema,
    planned: &mut Map<String, Value>,
    config: &Value,
    prior: Option<&Value>,
) {
    for (name, attribute) in &schema.attributes {
        let configured = config.get(name).unwrap_or(&Value::Null);
        if attribute.flags.computed && configured.is_null() {
            let prior_value = prior.map(|p| p.get(name).unwrap_or(&Value::Null));
            planned.insert(name.clone(), computed_value(attribute, prior_value));
        } else if !planned.contains_key(name) {
            planned.insert(name.clone(), Value::Null);
        }
    }
}

fn diff(schema: &Schema, prior: Option<&Value>, planned: &Map<String, Value>) -> Vec<AttributeChange> {
    schema
        .attributes
        .keys()
        .filter_map(|name| {
            let after = planned.get(name).cloned().unwrap_or(Value::Null);
            let before = prior
                .and_then(|p| p.get(name))
                .cloned()
                .unwrap_or(Value::Null);
            match (before.is_null(), after.is_null()) {
                _ if before == after => None,
                (true, false) => Some(AttributeChange::added(name, after)),
                (false, true) => Some(AttributeChange::removed(name, before)),
                _ => Some(AttributeChange::modified(name, before, after)),
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl ProviderService for CircleCiProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(config::schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |schema, (name, r)| schema.with_resource(*name, r.schema()));
        self.data_sources
            .iter()
            .fold(schema, |schema, (name, d)| schema.with_data_source(*name, d.schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&config::schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match Config::resolve(&config, &self.env) {
            Ok(config) => config,
            Err(diagnostics) => return Ok(diagnostics),
        };

        let client = Client::new(&config).map_err(|e| {
            ProviderError::remote(
                "Unable to Create CircleCI API Client",
                format!(
                    "An unexpected error occurred when creating the CircleCI API client. CircleCI Client Error: {}",
                    e
                ),
            )
        })?;

        *self.client.write().await = Some(client);
        info!(host = %config.host, "configured CircleCI client");
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validation::validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate_config(&config));
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;

        if proposed_state.is_null() {
            let changes = prior_state
                .as_ref()
                .and_then(Value::as_object)
                .map(|prior| {
                    prior
                        .iter()
                        .filter(|(_, v)| !v.is_null())
                        .map(|(k, v)| AttributeChange::removed(k, v.clone()))
                        .collect()
                })
                .unwrap_or_default();
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        }

        let schema = resource.schema();
        let prior = prior_state.as_ref();
        let mut planned = proposed_state.as_object().cloned().unwrap_or_default();
        fill_computed(&schema, &mut planned, &config, prior);
        resource.modify_plan(&mut planned, &config);

        let requires_replace = prior.is_some_and(|prior| {
            schema.attributes.iter().any(|(name, attribute)| {
                attribute.replace_on_change
                    && prior.get(name).unwrap_or(&Value::Null)
                        != planned.get(name).unwrap_or(&Value::Null)
            })
        });

        if requires_replace {
            fill_computed(&schema, &mut planned, &config, None);
            resource.modify_plan(&mut planned, &config);
        }

        let changes = diff(&schema, prior, &planned);
        debug!(
            resource_type,
            changes = changes.len(),
            requires_replace,
            "planned"
        );
        Ok(PlanResult::with_changes(
            Value::Object(planned),
            changes,
            requires_replace,
        ))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(&client, strip_unknown(planned_state)).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<ReadResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.read(&client, strip_unknown(current_state)).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource
            .update(&client, strip_unknown(prior_state), strip_unknown(planned_state))
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(&client, strip_unknown(current_state)).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let seeded = resource.import(id)?;
        Ok(vec![ImportedResource::new(resource_type, seeded)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validation::validate(&data_source.schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(&client, strip_unknown(config)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_error_contains, assert_has_errors, assert_no_errors, assert_plan_changes_attribute,
        assert_plan_no_changes, assert_plan_replaces, assert_plan_updates_in_place,
        diagnostics_of, ProviderTester,
    };
    use crate::types::{is_unknown, UNKNOWN_VALUE};
    use serde_json::json;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> EnvLookup {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(move |name| vars.get(name).cloned())
    }

    fn webhook_trigger() -> Value {
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

    #[test]
    fn test_schema_registers_everything() {
        let schema = CircleCiProvider::with_env(env_of(&[])).schema();
        assert_eq!(schema.resources.len(), 9);
        assert_eq!(schema.data_sources.len(), 8);
        assert!(schema.provider.attribute("key").is_some_and(|a| a.flags.sensitive));
        assert!(schema.resources.keys().all(|k| k.starts_with("circleci_")));
    }

    #[tokio::test]
    async fn test_operations_before_configure() {
        let provider = CircleCiProvider::with_env(env_of(&[]));
        let err = provider
            .create("circleci_context", json!({"organization_id": "org-1", "name": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));

        let err = provider.read_data_source("circleci_organization", json!({"id": "o"})).await;
        assert_eq!(diagnostics_of(err)[0].summary, "Unconfigured CircleCI client");
    }

    #[tokio::test]
    async fn test_configure_from_environment() {
        let provider = CircleCiProvider::with_env(env_of(&[("CIRCLE_TOKEN", "tok")]));
        let diagnostics = tokio_test::assert_ok!(provider.configure(json!({})).await);
        assert_no_errors(&diagnostics);
        tokio_test::assert_ok!(provider.client().await);

        tokio_test::assert_ok!(provider.stop().await);
        assert!(matches!(provider.client().await, Err(ProviderError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_preconfigured_provider_ignores_environment() {
        let (tester, _mock) = ProviderTester::with_mock();
        let provider = tester.provider();
        tokio_test::assert_ok!(provider.client().await);

        let diagnostics = provider.configure(json!({})).await.unwrap();
        assert_error_contains(&diagnostics, "Missing CircleCI API Key");
    }

    #[tokio::test]
    async fn test_configure_reports_unknown_values() {
        let provider = CircleCiProvider::with_env(env_of(&[("CIRCLE_TOKEN", "tok")]));
        let diagnostics = provider
            .configure(json!({"host": UNKNOWN_VALUE, "key": UNKNOWN_VALUE}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert!(provider.client().await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let (tester, _mock) = ProviderTester::with_mock();
        let err = tester.create("circleci_runner", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
        let err = tester.read_data_source("circleci_runner", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_validate_resource_config_combines_rules() {
        let (tester, _mock) = ProviderTester::with_mock();
        tester
            .validate_resource_config("circleci_trigger", webhook_trigger())
            .await
            .unwrap();

        let mut config = webhook_trigger();
        config.as_object_mut().unwrap().remove("checkout_ref");
        config["event_preset"] = json!("all-pushes");
        let diagnostics = tester
            .provider()
            .validate_resource_config("circleci_trigger", config)
            .await
            .unwrap();
        assert_has_errors(&diagnostics);
        assert_error_contains(&diagnostics, "Missing required attribute 'checkout_ref'");
        assert_error_contains(&diagnostics, "Error creating CircleCI trigger");

        let diagnostics = tester
            .provider()
            .validate_resource_config(
                "circleci_webhook",
                json!({
                    "name": "n", "url": "https://localhost/x", "signing_secret": "s",
                    "scope_id": "p", "scope_type": "project", "events": ["job-completed"],
                }),
            )
            .await
            .unwrap();
        assert_error_contains(&diagnostics, "Invalid Webhook URL");
    }

    #[tokio::test]
    async fn test_plan_create_marks_computed_unknown() {
        let (tester, _mock) = ProviderTester::with_mock();
        let plan = tester.plan_create("circleci_trigger", webhook_trigger()).await.unwrap();

        assert!(!plan.requires_replace);
        assert!(is_unknown(&plan.planned_state["id"]));
        assert!(is_unknown(&plan.planned_state["created_at"]));
        assert_eq!(plan.planned_state["disabled"], false);
        assert_eq!(plan.planned_state["event_name"], "deploy");
        assert_plan_changes_attribute(&plan, "checkout_ref");
    }

    #[tokio::test]
    async fn test_plan_create_suppresses_github_event_name() {
        let (tester, _mock) = ProviderTester::with_mock();
        let config = json!({
            "project_id": "proj-1",
            "pipeline_id": "pipe-1",
            "checkout_ref": "main",
            "config_ref": "main",
            "event_source_provider": "github_app",
            "event_preset": "only-tags",
        });
        let plan = tester.plan_create("circleci_trigger", config).await.unwrap();
        assert_eq!(plan.planned_state["event_name"], Value::Null);
    }

    #[tokio::test]
    async fn test_plan_update_in_place_and_replace() {
        let (tester, _mock) = ProviderTester::with_mock();
        let created = tester.apply("circleci_trigger", webhook_trigger()).await.unwrap();
        assert!(!created["id"].as_str().unwrap().is_empty());

        let plan = tester
            .plan_update("circleci_trigger", created.clone(), webhook_trigger())
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state["id"], created["id"]);

        let mut config = webhook_trigger();
        config["checkout_ref"] = json!("release");
        let plan = tester
            .plan_update("circleci_trigger", created.clone(), config)
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "checkout_ref");

        let mut config = webhook_trigger();
        config["pipeline_id"] = json!("pipe-2");
        let plan = tester
            .plan_update("circleci_trigger", created, config)
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert!(is_unknown(&plan.planned_state["id"]));
    }

    #[tokio::test]
    async fn test_plan_pipeline_rename_replaces() {
        let (tester, _mock) = ProviderTester::with_mock();
        let config = json!({
            "project_id": "proj-1",
            "name": "build",
            "description": "main build",
            "config_source_provider": "github_app",
            "config_source_repo_external_id": "1234",
            "config_source_file_path": ".circleci/config.yml",
            "checkout_source_provider": "github_app",
            "checkout_source_repo_external_id": "5678",
        });
        let created = tester.apply("circleci_pipeline", config.clone()).await.unwrap();

        let mut renamed = config.clone();
        renamed["name"] = json!("build-renamed");
        let plan = tester
            .plan_update("circleci_pipeline", created.clone(), renamed)
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert_plan_changes_attribute(&plan, "name");

        let mut described = config;
        described["description"] = json!("nightly build");
        let plan = tester
            .plan_update("circleci_pipeline", created, described)
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "description");
    }

    #[tokio::test]
    async fn test_plan_destroy() {
        let (tester, _mock) = ProviderTester::with_mock();
        let plan = tester
            .provider()
            .plan("circleci_context", Some(json!({"id": "c", "name": "n"})), Value::Null, Value::Null)
            .await
            .unwrap();
        assert_eq!(plan.planned_state, Value::Null);
        assert_eq!(plan.changes.len(), 2);
        assert!(!plan.requires_replace);
    }

    #[tokio::test]
    async fn test_full_lifecycle_through_provider() {
        let (tester, mock) = ProviderTester::with_mock();
        let created = tester.apply("circleci_trigger", webhook_trigger()).await.unwrap();

        let mut config = webhook_trigger();
        config["disabled"] = json!(true);
        let refreshed = tester
            .lifecycle_update("circleci_trigger", created.clone(), config)
            .await
            .unwrap();
        assert_eq!(refreshed["disabled"], true);
        assert!(mock.called("triggers.update"));

        tester.delete("circleci_trigger", refreshed.clone()).await.unwrap();
        let read = tester.read("circleci_trigger", refreshed).await.unwrap();
        assert!(read.is_removed());
    }

    #[tokio::test]
    async fn test_unknown_values_are_stripped_before_adapters() {
        let (tester, _mock) = ProviderTester::with_mock();
        let created = tester
            .create(
                "circleci_context",
                json!({"organization_id": "org-1", "name": "deploy", "id": UNKNOWN_VALUE, "created_at": UNKNOWN_VALUE}),
            )
            .await
            .unwrap();
        assert_ne!(created["id"], UNKNOWN_VALUE);
        assert_ne!(created["created_at"], UNKNOWN_VALUE);
    }

    #[tokio::test]
    async fn test_import_through_provider() {
        let (tester, _mock) = ProviderTester::with_mock();
        let imported = tester
            .import_resource("circleci_webhook", "proj-1/hook-1")
            .await
            .unwrap();
        assert_eq!(imported[0].resource_type, "circleci_webhook");
        assert_eq!(imported[0].state["scope_type"], "project");

        let diagnostics = diagnostics_of(tester.import_resource("circleci_webhook", "hook-1").await);
        assert_eq!(diagnostics[0].summary, "Invalid Import ID Format");
    }
}
