use groupbid_db::DemoSeedDataset;
use serde_json::json;

use crate::commands::{with_session, CommandResult, Failure, Success};

pub fn run() -> CommandResult {
    with_session("seed", |session| async move {
        let seeded = DemoSeedDataset::load(&session.pool)
            .await
            .map_err(|error| Failure::new("seed_execution", error.to_string(), 7))?;

        let verification = DemoSeedDataset::verify(&session.pool)
            .await
            .map_err(|error| Failure::new("seed_verification", error.to_string(), 7))?;
        if !verification.all_present {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(Failure::new("seed_verification", verification_message(&failed_checks), 7));
        }

        let lines: Vec<String> = seeded
            .collectives_seeded
            .iter()
            .map(|collective| {
                format!(
                    "  - collective {} {}: {} members ({})",
                    collective.id, collective.slug, collective.member_count, collective.description
                )
            })
            .collect();
        let message = format!(
            "demo dataset loaded: {} suppliers, negotiation {} in progress\n{}",
            seeded.supplier_count,
            seeded.negotiation_id,
            lines.join("\n")
        );

        let collectives: Vec<_> = seeded
            .collectives_seeded
            .iter()
            .map(|collective| {
                json!({
                    "id": collective.id,
                    "slug": collective.slug,
                    "member_count": collective.member_count,
                })
            })
            .collect();
        Ok(Success::new(
            message,
            json!({
                "collectives": collectives,
                "supplier_count": seeded.supplier_count,
                "negotiation_id": seeded.negotiation_id,
            }),
        ))
    })
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
