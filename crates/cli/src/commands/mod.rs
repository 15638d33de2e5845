pub mod config;
pub mod migrate;
pub mod negotiate;
pub mod quotes;
pub mod seed;

use std::fmt::Display;
use std::future::Future;

use chrono::Utc;
use groupbid_core::config::{AppConfig, LoadOptions};
use groupbid_core::errors::{ApplicationError, InterfaceError};
use groupbid_db::{connect_with_settings, migrations, DbPool};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok(command, message.into(), None)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        Self::ok(command, message.into(), Some(data))
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failed(command, error_class, message.into(), exit_code, None)
    }

    fn ok(command: &str, message: String, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    fn failed(
        command: &str,
        error_class: &str,
        message: String,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message,
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_failure(command: &str, failure: Failure) -> Self {
        Self::failed(command, failure.error_class, failure.message, failure.exit_code, failure.data)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// A step that stopped the command, with the exit code it maps to.
#[derive(Debug)]
pub(crate) struct Failure {
    error_class: &'static str,
    message: String,
    exit_code: u8,
    data: Option<Value>,
}

impl Failure {
    pub(crate) fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code, data: None }
    }

    pub(crate) fn application(error: ApplicationError, correlation_id: &str) -> Self {
        let interface = error.into_interface(correlation_id);
        let (error_class, exit_code) = match &interface {
            InterfaceError::NotFound { .. } => ("not_found", 6),
            InterfaceError::BadRequest { .. } => ("domain_rejection", 6),
            InterfaceError::ServiceUnavailable { .. } => ("persistence", 7),
            InterfaceError::Internal { .. } => ("config_validation", 2),
        };
        Self {
            error_class,
            message: interface.message().to_string(),
            exit_code,
            data: Some(json!({
                "correlation_id": interface.correlation_id(),
                "hint": interface.user_message(),
            })),
        }
    }

    pub(crate) fn configuration(error: impl Display, correlation_id: &str) -> Self {
        Self::application(
            ApplicationError::Configuration(format!("configuration issue: {error}")),
            correlation_id,
        )
    }
}

pub(crate) fn correlation_id(command: &str) -> String {
    format!("cli-{command}-{}", Utc::now().timestamp_micros())
}

pub(crate) struct Success {
    pub message: String,
    pub data: Value,
}

impl Success {
    pub(crate) fn new(message: impl Into<String>, data: Value) -> Self {
        Self { message: message.into(), data }
    }
}

pub(crate) struct Session {
    pub config: AppConfig,
    pub pool: DbPool,
    pub correlation_id: String,
}

pub(crate) fn to_data<T: Serialize>(value: &T) -> Result<Value, Failure> {
    serde_json::to_value(value)
        .map_err(|error| Failure::new("serialization", error.to_string(), 3))
}

/// Loads config, connects, brings the schema up to date and runs `body` on a
/// single-threaded runtime. The pool is closed before the result is rendered.
pub(crate) fn with_session<F, Fut>(command: &'static str, body: F) -> CommandResult
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<Success, Failure>>,
{
    let correlation_id = correlation_id(command);
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::from_failure(
                command,
                Failure::configuration(error, &correlation_id),
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| Failure::new("db_connectivity", error.to_string(), 4))?;
        info!(
            event_name = "system.bootstrap.database_connected",
            correlation_id = %correlation_id,
            max_connections = config.database.max_connections,
            "database pool ready"
        );

        if let Err(error) = migrations::run_pending(&pool).await {
            pool.close().await;
            return Err(Failure::new("migration", error.to_string(), 5));
        }
        info!(
            event_name = "system.bootstrap.migrations_applied",
            correlation_id = %correlation_id,
            "schema up to date"
        );

        let session = Session { config, pool: pool.clone(), correlation_id };
        let outcome = body(session).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(success) => CommandResult::success_with_data(command, success.message, success.data),
        Err(failure) => CommandResult::from_failure(command, failure),
    }
}
