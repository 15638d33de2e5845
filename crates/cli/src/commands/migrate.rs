use serde_json::json;

use crate::commands::{with_session, CommandResult, Success};

pub fn run() -> CommandResult {
    with_session("migrate", |session| async move {
        Ok(Success::new(
            "applied pending migrations",
            json!({ "database_url": session.config.database.url }),
        ))
    })
}
