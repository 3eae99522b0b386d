//! Provider configuration.
//!
//! The provider block accepts an API `host` and `key`. Either may come from
//! the environment instead:
//!
//! | attribute | environment variable | default |
//! |-----------|----------------------|---------|
//! | `host`    | `CIRCLE_HOST`        | `https://circleci.com/api/v2` |
//! | `key`     | `CIRCLE_TOKEN`       | none, configuration fails |
//!
//! Values set in configuration always win over the environment.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::is_unknown;

/// Environment variable holding the API token.
pub const ENV_TOKEN: &str = "CIRCLE_TOKEN";

/// Environment variable holding the API base URL.
pub const ENV_HOST: &str = "CIRCLE_HOST";

/// API base URL used when neither configuration nor environment set one.
pub const DEFAULT_HOST: &str = "https://circleci.com/api/v2";

/// Source of environment variables, injectable so tests never touch the
/// process environment.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment lookup backed by [`std::env::var`].
pub fn process_env() -> EnvLookup {
    Arc::new(|name| std::env::var(name).ok())
}

/// Schema of the provider configuration block.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("Interact with the CircleCI API.")
        .with_attribute(
            "host",
            Attribute::optional_string().with_description(format!(
                "CircleCI API base URL. May also be provided via the {} environment variable. Defaults to {}.",
                ENV_HOST, DEFAULT_HOST
            )),
        )
        .with_attribute(
            "key",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!(
                    "CircleCI API token. May also be provided via the {} environment variable.",
                    ENV_TOKEN
                )),
        )
}

/// Resolved connection settings shared by every API call.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// API base URL, without a trailing slash.
    pub host: Url,
    /// API token sent as `Circle-Token`.
    pub token: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Build a config from explicit values.
    pub fn new(host: &str, token: impl Into<String>) -> Result<Self, Diagnostic> {
        Ok(Self {
            host: parse_host(host)?,
            token: token.into(),
        })
    }

    /// Resolve the provider block against the environment.
    ///
    /// Returns every problem found rather than stopping at the first one.
    pub fn resolve(raw: &Value, env: &EnvLookup) -> Result<Self, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let host_value = raw.get("host").unwrap_or(&Value::Null);
        let key_value = raw.get("key").unwrap_or(&Value::Null);

        if is_unknown(host_value) {
            diagnostics.push(
                Diagnostic::error("Unknown CircleCI API Host")
                    .with_detail(format!(
                        "The provider cannot create the CircleCI API client as there is an unknown configuration value for the CircleCI API host. Either target apply the source of the value first, set the value statically in the configuration, or use the {} environment variable.",
                        ENV_HOST
                    ))
                    .with_attribute("host"),
            );
        }

        if is_unknown(key_value) {
            diagnostics.push(
                Diagnostic::error("Unknown CircleCI API Key")
                    .with_detail(format!(
                        "The provider cannot create the CircleCI API client as there is an unknown configuration value for the CircleCI API key. Either target apply the source of the value first, set the value statically in the configuration, or use the {} environment variable.",
                        ENV_TOKEN
                    ))
                    .with_attribute("key"),
            );
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let host = host_value
            .as_str()
            .map(str::to_string)
            .or_else(|| env(ENV_HOST))
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let token = key_value
            .as_str()
            .map(str::to_string)
            .or_else(|| env(ENV_TOKEN))
            .unwrap_or_default();

        if token.is_empty() {
            diagnostics.push(
                Diagnostic::error("Missing CircleCI API Key")
                    .with_detail(format!(
                        "The provider cannot create the CircleCI API client as there is a missing or empty value for the CircleCI API key. Set the key value in the configuration or use the {} environment variable. If either is already set, ensure the value is not empty.",
                        ENV_TOKEN
                    ))
                    .with_attribute("key"),
            );
        }

        let host = match parse_host(&host) {
            Ok(host) => Some(host),
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                None
            },
        };

        match host {
            Some(host) if diagnostics.is_empty() => Ok(Self { host, token }),
            _ => Err(diagnostics),
        }
    }
}

fn parse_host(raw: &str) -> Result<Url, Diagnostic> {
    let invalid = |detail: String| {
        Diagnostic::error("Invalid CircleCI API Host")
            .with_detail(detail)
            .with_attribute("host")
    };

    let mut url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| invalid(format!("Could not parse '{}' as a URL: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid(format!(
            "Expected an absolute http(s) URL such as {}, got '{}'",
            DEFAULT_HOST, raw
        )));
    }

    // Joining relative paths needs a trailing slash on the base.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_VALUE;
    use serde_json::json;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> EnvLookup {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(move |name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_values_win_over_environment() {
        let env = env_of(&[(ENV_TOKEN, "env-token"), (ENV_HOST, "https://env.example.com")]);
        let config = Config::resolve(
            &json!({"host": "https://cci.example.com/api/v2", "key": "cfg-token"}),
            &env,
        )
        .unwrap();

        assert_eq!(config.token, "cfg-token");
        assert_eq!(config.host.as_str(), "https://cci.example.com/api/v2/");
    }

    #[test]
    fn test_environment_fallback() {
        let env = env_of(&[(ENV_TOKEN, "env-token"), (ENV_HOST, "https://env.example.com")]);
        let config = Config::resolve(&json!({}), &env).unwrap();

        assert_eq!(config.token, "env-token");
        assert_eq!(config.host.as_str(), "https://env.example.com/");
    }

    #[test]
    fn test_default_host() {
        let env = env_of(&[(ENV_TOKEN, "env-token")]);
        let config = Config::resolve(&json!({"host": null}), &env).unwrap();
        assert_eq!(config.host.as_str(), "https://circleci.com/api/v2/");
    }

    #[test]
    fn test_missing_key() {
        let env = env_of(&[]);
        let diagnostics = Config::resolve(&json!({}), &env).unwrap_err();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing CircleCI API Key");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("key"));
        assert!(diagnostics[0].detail.as_deref().unwrap().contains(ENV_TOKEN));
    }

    #[test]
    fn test_empty_key_is_missing() {
        let env = env_of(&[(ENV_TOKEN, "env-token")]);
        let diagnostics = Config::resolve(&json!({"key": ""}), &env).unwrap_err();
        assert_eq!(diagnostics[0].summary, "Missing CircleCI API Key");
    }

    #[test]
    fn test_unknown_values() {
        let env = env_of(&[(ENV_TOKEN, "env-token")]);
        let diagnostics =
            Config::resolve(&json!({"host": UNKNOWN_VALUE, "key": UNKNOWN_VALUE}), &env)
                .unwrap_err();

        let summaries: Vec<_> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec!["Unknown CircleCI API Host", "Unknown CircleCI API Key"]
        );
    }

    #[test]
    fn test_invalid_host() {
        let env = env_of(&[(ENV_TOKEN, "t")]);
        let diagnostics = Config::resolve(&json!({"host": "circleci.com"}), &env).unwrap_err();
        assert_eq!(diagnostics[0].summary, "Invalid CircleCI API Host");

        let diagnostics = Config::resolve(&json!({"host": "ftp://circleci.com"}), &env).unwrap_err();
        assert_eq!(diagnostics[0].summary, "Invalid CircleCI API Host");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::new(DEFAULT_HOST, "super-secret").unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_schema_marks_key_sensitive() {
        let schema = schema();
        assert!(schema.attribute("key").unwrap().flags.sensitive);
        assert!(schema.attribute("host").unwrap().flags.optional);
    }
}
