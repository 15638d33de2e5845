use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use groupbid_core::config::{AppConfig, LoadOptions};
use serde_json::{json, Map, Value};
use toml::Value as TomlValue;

use crate::commands::{correlation_id, CommandResult, Failure};

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            let failure = Failure::configuration(error, &correlation_id("config"));
            return CommandResult::from_failure("config", failure);
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut data = Map::new();
    for field in effective_fields(&config) {
        let source =
            field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key_path, &field.value, &source));
        data.insert(field.key_path.to_string(), json!({ "value": field.value, "source": source }));
    }

    CommandResult::success_with_data("config", lines.join("\n"), Value::Object(data))
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key_path: "database.url",
            env_keys: &["GROUPBID_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["GROUPBID_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["GROUPBID_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["GROUPBID_LOGGING_LEVEL", "GROUPBID_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["GROUPBID_LOGGING_FORMAT", "GROUPBID_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
        },
        Field {
            key_path: "quoting.baseline_individual_pmpm",
            env_keys: &["GROUPBID_QUOTING_BASELINE_INDIVIDUAL_PMPM"],
            value: config.quoting.baseline_individual_pmpm.to_string(),
        },
        Field {
            key_path: "quoting.base_group_pmpm",
            env_keys: &["GROUPBID_QUOTING_BASE_GROUP_PMPM"],
            value: config.quoting.base_group_pmpm.to_string(),
        },
        Field {
            key_path: "quoting.bid_kind",
            env_keys: &["GROUPBID_QUOTING_BID_KIND"],
            value: config.quoting.bid_kind.as_str().to_string(),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("groupbid.toml"), PathBuf::from("config/groupbid.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<TomlValue> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<TomlValue>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&TomlValue>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &TomlValue, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}
