use std::env;
use std::sync::{Mutex, OnceLock};

use groupbid_cli::commands::negotiate::{
    self, ActorArg, ListArgs, MessageArgs, NegotiationArg, OfferArgs, SenderArg, StartArgs,
};
use groupbid_cli::commands::quotes::{self, BidArgs, BidKindArg, CollectiveArg, SupplierArg};
use groupbid_cli::commands::{config, migrate, seed};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[("GROUPBID_DATABASE_URL", "sqlite::memory:"), ("GROUPBID_DATABASE_MAX_CONNECTIONS", "1")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
            assert_eq!(payload["data"]["database_url"], "sqlite::memory:");
        },
    );
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("GROUPBID_DATABASE_URL", "postgres://localhost/groupbid")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_reports_env_sources() {
    with_env(
        &[
            ("GROUPBID_DATABASE_URL", "sqlite::memory:"),
            ("GROUPBID_LOG_LEVEL", "debug"),
            ("GROUPBID_QUOTING_BASE_GROUP_PMPM", "480"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "config");
            assert_eq!(payload["data"]["logging.level"]["value"], "debug");
            assert_eq!(payload["data"]["logging.level"]["source"], "env (GROUPBID_LOG_LEVEL)");
            assert_eq!(payload["data"]["quoting.base_group_pmpm"]["value"], "480");
            assert_eq!(payload["data"]["quoting.bid_kind"]["value"], "insurance_premium");
        },
    );
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_seeded_database(|| {
        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let payload = parse_payload(&second.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["supplier_count"], 6);
        assert_eq!(payload["data"]["negotiation_id"], 1);

        let listed = negotiate::list(ListArgs { collective: Some(2), supplier: None });
        let payload = parse_payload(&listed.output);
        assert_eq!(payload["data"]["open"].as_array().map(Vec::len), Some(1));
    });
}

#[test]
fn seeded_negotiation_counters_and_agrees() {
    with_seeded_database(|| {
        let shown = negotiate::show(NegotiationArg { negotiation: 1 });
        assert_eq!(shown.exit_code, 0, "{}", shown.output);
        let payload = parse_payload(&shown.output);
        assert_eq!(payload["data"]["status"], "in_progress");
        assert_eq!(payload["data"]["rounds"].as_array().map(Vec::len), Some(1));

        let countered = negotiate::offer(OfferArgs {
            negotiation: 1,
            actor: ActorArg::Collective,
            pmpm: Decimal::new(470, 0),
            mlr: Some(Decimal::new(85, 0)),
            notes: Some("meet in the middle".to_string()),
            accept: false,
        });
        assert_eq!(countered.exit_code, 0, "{}", countered.output);
        let payload = parse_payload(&countered.output);
        assert_eq!(payload["command"], "negotiate.offer");
        assert_eq!(payload["data"]["round"]["round_number"], 2);
        assert_eq!(payload["data"]["status"], "in_progress");

        let accepted = negotiate::accept(NegotiationArg { negotiation: 1 });
        assert_eq!(accepted.exit_code, 0, "{}", accepted.output);
        let payload = parse_payload(&accepted.output);
        assert_eq!(payload["data"]["status"], "agreed");
        assert_eq!(payload["data"]["accepted_round"], 2);
        assert_eq!(decimal_field(&payload["data"]["final_agreed_pmpm"]), 470.0);

        let late = negotiate::offer(OfferArgs {
            negotiation: 1,
            actor: ActorArg::Supplier,
            pmpm: Decimal::new(480, 0),
            mlr: None,
            notes: None,
            accept: false,
        });
        assert_eq!(late.exit_code, 6, "offers after agreement are refused");
        let payload = parse_payload(&late.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "domain_rejection");
        assert!(payload["data"]["correlation_id"]
            .as_str()
            .is_some_and(|id| id.starts_with("cli-negotiate.offer-")));

        let listed = negotiate::list(ListArgs { collective: None, supplier: Some(7) });
        let payload = parse_payload(&listed.output);
        assert_eq!(payload["data"]["open"].as_array().map(Vec::len), Some(0));
        assert_eq!(payload["data"]["closed"].as_array().map(Vec::len), Some(1));
    });
}

#[test]
fn new_negotiation_can_be_messaged_and_cancelled() {
    with_seeded_database(|| {
        let started = negotiate::start(StartArgs {
            collective: 1,
            supplier: 5,
            target_pmpm: Some(Decimal::new(450, 0)),
            population: Some(3),
            risk_appetite: Some("aggressive".to_string()),
            start_date: None,
            notes: None,
        });
        assert_eq!(started.exit_code, 0, "{}", started.output);
        let payload = parse_payload(&started.output);
        assert_eq!(payload["data"]["status"], "open");
        assert_eq!(payload["data"]["terms"]["risk_appetite"], "medium");
        let id = payload["data"]["id"].as_i64().expect("negotiation id");

        let posted = negotiate::message(MessageArgs {
            negotiation: id,
            sender: SenderArg::Collective,
            name: Some("  ".to_string()),
            body: "  Can you share last year's loss ratio?  ".to_string(),
        });
        assert_eq!(posted.exit_code, 0, "{}", posted.output);
        let payload = parse_payload(&posted.output);
        assert_eq!(payload["data"]["body"], "Can you share last year's loss ratio?");
        assert_eq!(payload["data"]["sender_name"], Value::Null);

        let blank = negotiate::message(MessageArgs {
            negotiation: id,
            sender: SenderArg::System,
            name: None,
            body: "   ".to_string(),
        });
        assert_eq!(blank.exit_code, 6);
        assert_eq!(parse_payload(&blank.output)["error_class"], "domain_rejection");

        let cancelled = negotiate::cancel(NegotiationArg { negotiation: id });
        assert_eq!(cancelled.exit_code, 0, "{}", cancelled.output);
        let payload = parse_payload(&cancelled.output);
        assert_eq!(payload["data"]["status"], "cancelled");
        assert_eq!(payload["data"]["final_agreed_pmpm"], Value::Null);
        assert_eq!(payload["data"]["messages"].as_array().map(Vec::len), Some(1));

        let closed = negotiate::close(NegotiationArg { negotiation: id });
        assert_eq!(closed.exit_code, 6, "terminal negotiations cannot be closed");
    });
}

#[test]
fn unknown_records_map_to_not_found() {
    with_seeded_database(|| {
        let shown = negotiate::show(NegotiationArg { negotiation: 999 });
        assert_eq!(shown.exit_code, 6);
        let payload = parse_payload(&shown.output);
        assert_eq!(payload["error_class"], "not_found");
        assert_eq!(payload["data"]["hint"], "The requested record does not exist.");

        let started = negotiate::start(StartArgs {
            collective: 1,
            supplier: 404,
            target_pmpm: None,
            population: None,
            risk_appetite: None,
            start_date: None,
            notes: None,
        });
        assert_eq!(started.exit_code, 6);
        assert_eq!(parse_payload(&started.output)["error_class"], "not_found");

        let accepted = negotiate::accept(NegotiationArg { negotiation: 999 });
        assert_eq!(accepted.exit_code, 6);
        assert_eq!(parse_payload(&accepted.output)["error_class"], "not_found");
    });
}

#[test]
fn quotes_are_simulated_recorded_and_ranked() {
    with_seeded_database(|| {
        let simulated = quotes::simulate(CollectiveArg { collective: 1 });
        assert_eq!(simulated.exit_code, 0, "{}", simulated.output);
        let payload = parse_payload(&simulated.output);
        assert_eq!(payload["command"], "quotes.simulate");
        assert_eq!(payload["data"]["collective_name"], "Riverside Freelancers");
        assert_eq!(payload["data"]["profile"]["member_count"], 3);
        assert_eq!(payload["data"]["quotes"].as_array().map(Vec::len), Some(4));
        let multiplier = decimal_field(&payload["data"]["profile"]["risk_multiplier"]);
        assert!((multiplier - 1.25).abs() < 1e-9, "unexpected multiplier {multiplier}");

        let compared = quotes::compare(CollectiveArg { collective: 1 });
        assert_eq!(compared.exit_code, 0, "{}", compared.output);
        let payload = parse_payload(&compared.output);
        let bids = payload["data"]["bids"].as_array().cloned().unwrap_or_default();
        assert_eq!(bids.len(), 4);
        assert_eq!(bids[0]["rank"], 1);
        let premiums: Vec<f64> =
            bids.iter().map(|bid| decimal_field(&bid["bid"]["monthly_premium"])).collect();
        assert!(premiums.windows(2).all(|pair| pair[0] <= pair[1]), "{premiums:?}");

        let empty = quotes::compare(CollectiveArg { collective: 2 });
        assert_eq!(empty.exit_code, 0);
        assert_eq!(parse_payload(&empty.output)["data"]["bids"].as_array().map(Vec::len), Some(0));

        let missing = quotes::simulate(CollectiveArg { collective: 77 });
        assert_eq!(missing.exit_code, 6);
        assert_eq!(parse_payload(&missing.output)["error_class"], "not_found");
    });
}

#[test]
fn direct_bids_replace_simulated_ones_in_the_comparison() {
    with_seeded_database(|| {
        for _ in 0..2 {
            let simulated = quotes::simulate(CollectiveArg { collective: 1 });
            assert_eq!(simulated.exit_code, 0, "{}", simulated.output);
        }

        let placed = quotes::bid(BidArgs {
            supplier: 7,
            collective: 1,
            kind: None,
            premium: Decimal::new(1, 0),
            discount: Some(Decimal::new(5, 0)),
            notes: Some("loss leader".to_string()),
        });
        assert_eq!(placed.exit_code, 0, "{}", placed.output);
        let payload = parse_payload(&placed.output);
        assert_eq!(payload["command"], "quotes.bid");
        assert_eq!(payload["data"]["bid_type"], "insurance_premium");
        let bid_id = payload["data"]["id"].clone();

        let compared = quotes::compare(CollectiveArg { collective: 1 });
        let payload = parse_payload(&compared.output);
        let bids = payload["data"]["bids"].as_array().cloned().unwrap_or_default();
        assert_eq!(bids.len(), 4, "one bid per insurer after repeated simulations");
        assert_eq!(bids[0]["bid"]["id"], bid_id);
        assert_eq!(bids[0]["bid"]["supplier_id"], 7);

        let listed = quotes::list(SupplierArg { supplier: 7 });
        assert_eq!(listed.exit_code, 0, "{}", listed.output);
        let payload = parse_payload(&listed.output);
        assert_eq!(payload["command"], "quotes.list");
        let history = payload["data"]["bids"].as_array().cloned().unwrap_or_default();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0]["id"], bid_id);
    });
}

#[test]
fn direct_bids_reject_unknown_parties_and_bad_input() {
    with_seeded_database(|| {
        let unknown = quotes::bid(BidArgs {
            supplier: 404,
            collective: 1,
            kind: Some(BidKindArg::RxDiscount),
            premium: Decimal::new(30, 0),
            discount: None,
            notes: None,
        });
        assert_eq!(unknown.exit_code, 6);
        assert_eq!(parse_payload(&unknown.output)["error_class"], "not_found");

        let overpriced = quotes::bid(BidArgs {
            supplier: 7,
            collective: 1,
            kind: None,
            premium: Decimal::MAX,
            discount: None,
            notes: None,
        });
        assert_eq!(overpriced.exit_code, 6);
        assert_eq!(parse_payload(&overpriced.output)["error_class"], "domain_rejection");

        let listed = quotes::list(SupplierArg { supplier: 404 });
        assert_eq!(listed.exit_code, 6);
        assert_eq!(parse_payload(&listed.output)["error_class"], "not_found");
    });
}

#[test]
fn unrepresentable_prices_are_domain_rejections() {
    with_seeded_database(|| {
        let started = negotiate::start(StartArgs {
            collective: 1,
            supplier: 7,
            target_pmpm: Some(Decimal::MAX),
            population: None,
            risk_appetite: Some("high".to_string()),
            start_date: None,
            notes: None,
        });
        assert_eq!(started.exit_code, 6, "{}", started.output);
        let payload = parse_payload(&started.output);
        assert_eq!(payload["error_class"], "domain_rejection");
        assert!(payload["message"].as_str().is_some_and(|text| text.contains("target_pmpm")));

        let offered = negotiate::offer(OfferArgs {
            negotiation: 1,
            actor: ActorArg::Supplier,
            pmpm: Decimal::MAX,
            mlr: None,
            notes: None,
            accept: true,
        });
        assert_eq!(offered.exit_code, 6, "{}", offered.output);
        assert_eq!(parse_payload(&offered.output)["error_class"], "domain_rejection");

        let shown = negotiate::show(NegotiationArg { negotiation: 1 });
        let payload = parse_payload(&shown.output);
        assert_eq!(payload["data"]["rounds"].as_array().map(Vec::len), Some(1));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn decimal_field(value: &Value) -> f64 {
    match value {
        Value::String(text) => text.parse().expect("decimal string"),
        other => other.as_f64().expect("decimal number"),
    }
}

/// Runs `test_fn` against a fresh file database loaded with the demo dataset.
fn with_seeded_database(test_fn: impl FnOnce()) {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("groupbid-cli.db").display());
    with_env(&[("GROUPBID_DATABASE_URL", url.as_str())], || {
        let seeded = seed::run();
        assert_eq!(seeded.exit_code, 0, "seed failed: {}", seeded.output);
        test_fn();
    });
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "GROUPBID_DATABASE_URL",
        "GROUPBID_DATABASE_MAX_CONNECTIONS",
        "GROUPBID_DATABASE_TIMEOUT_SECS",
        "GROUPBID_LOGGING_LEVEL",
        "GROUPBID_LOGGING_FORMAT",
        "GROUPBID_LOG_LEVEL",
        "GROUPBID_LOG_FORMAT",
        "GROUPBID_QUOTING_BASELINE_INDIVIDUAL_PMPM",
        "GROUPBID_QUOTING_BASE_GROUP_PMPM",
        "GROUPBID_QUOTING_BID_KIND",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
