//! Filter configuration.
//!
//! A single JSON document configures the match policy, the seeded forms and
//! the optional decision log.  The path comes from [`CONFIG_ENV_VAR`]; with
//! the variable unset the filter starts with defaults and no forms.

use crate::audit::DecisionLogConfig;
use crate::blocklist::MatchPolicy;
use crate::store::FormDefinition;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV_VAR: &str = "FORMGATE_CONFIG";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Matching strictness applied to every form.
    #[serde(default)]
    pub match_policy: MatchPolicy,
    /// Forms to seed the store with.
    #[serde(default)]
    pub forms: Vec<FormDefinition>,
    /// Decision sink; omit to run without one.
    #[serde(default)]
    pub decision_log: Option<DecisionLogConfig>,
}

impl FilterConfig {
    pub fn from_json_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter config '{path}': file unreadable"))?;
        let config = serde_json::from_str(&raw).with_context(|| {
            format!("Failed to parse filter config '{path}': invalid JSON configuration")
        })?;
        Ok(config)
    }

    /// Load the file named by [`CONFIG_ENV_VAR`], or defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::from_json_file(&path),
            Err(_) => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterConfig, CONFIG_ENV_VAR};
    use crate::blocklist::MatchPolicy;
    use once_cell::sync::Lazy;
    use std::io::Write as _;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Env-var tests share process state; serialize them.
    static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn write_config(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn parses_full_config() {
        let file = write_config(
            r#"{
                "matchPolicy": "domainBoundary",
                "forms": [
                    {
                        "id": 42,
                        "fields": [
                            {"name": "your-name", "type": "text*"},
                            {"name": "your-email", "type": "email*"}
                        ],
                        "spamDomains": "baddomain.com\nscam.net"
                    }
                ],
                "decisionLog": {
                    "path": "/tmp/decisions.log",
                    "maxBytes": 1048576,
                    "keep": 3,
                    "compress": true
                }
            }"#,
        );

        let config = FilterConfig::from_json_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.match_policy, MatchPolicy::DomainBoundary);
        assert_eq!(config.forms.len(), 1);
        assert_eq!(config.forms[0].email_field_name(), Some("your-email"));
        assert_eq!(config.forms[0].blocklist_text, "baddomain.com\nscam.net");

        let log = config.decision_log.expect("decision log configured");
        assert_eq!(log.max_bytes, Some(1_048_576));
        assert_eq!(log.keep, 3);
        assert!(log.compress);
    }

    #[test]
    fn omitted_sections_fall_back_to_defaults() {
        let file = write_config(r#"{"forms": [{"id": 1}]}"#);
        let config = FilterConfig::from_json_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.match_policy, MatchPolicy::Substring);
        assert_eq!(config.forms[0].blocklist_text, "");
        assert!(config.forms[0].fields.is_empty());
        assert!(config.decision_log.is_none());
    }

    #[test]
    fn unreadable_file_reports_the_path() {
        let err = FilterConfig::from_json_file("/nonexistent/formgate.json").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("/nonexistent/formgate.json"));
        assert!(message.contains("file unreadable"));
    }

    #[test]
    fn invalid_json_reports_a_parse_failure() {
        let file = write_config("{ this is not json");
        let err = FilterConfig::from_json_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("invalid JSON configuration"));
    }

    #[test]
    fn missing_env_var_yields_default_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);
        let config = FilterConfig::from_env().unwrap();
        assert_eq!(config.match_policy, MatchPolicy::Substring);
        assert!(config.forms.is_empty());
        assert!(config.decision_log.is_none());
    }

    #[test]
    fn env_var_selects_the_config_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let file = write_config(r#"{"forms": [{"id": 8}]}"#);
        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let config = FilterConfig::from_env().unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(config.forms.len(), 1);
        assert_eq!(config.forms[0].id, 8);
    }
}
