mod support;

use std::path::Path;

use pennywise_core::commands::common::Invocation;
use pennywise_core::commands::insights::{self as insight_commands, InsightListInput};
use pennywise_core::commands::ledger::{
    TransactionInput, TransactionQuery, add_account, add_transaction, add_user, list_transactions,
    set_budget,
};
use pennywise_core::commands::recurring::{self as recurring_commands, RecurringInput};
use pennywise_core::commands::reports;
use pennywise_core::contracts::envelope::failure_from_error;
use pennywise_core::{ErrorKind, SuccessEnvelope};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use support::ledger_testkit::{BILLS, FOOD, SALARY, temp_home_in_tmp};

fn at<'a>(home: &'a Path, now: &'a str) -> Invocation<'a> {
    Invocation {
        home_override: Some(home),
        now: Some(now),
    }
}

fn decimal_field(value: &Value) -> Option<Decimal> {
    value.as_str()?.parse::<Decimal>().ok()
}

fn string_field(envelope: &SuccessEnvelope, field: &str) -> String {
    envelope.data[field].as_str().unwrap_or_default().to_string()
}

/// Creates a user with one account and returns `(user_id, account_id)`.
fn onboard(home: &Path) -> Option<(String, String)> {
    let invocation = at(home, "2024-03-01 08:00:00");
    let user = add_user(invocation, "ana@example.com", "Ana");
    assert!(user.is_ok());
    let user_id = string_field(&user.ok()?, "user_id");
    let account = add_account(invocation, &user_id, "Wallet", "cash", "USD");
    assert!(account.is_ok());
    let account_id = string_field(&account.ok()?, "account_id");
    Some((user_id, account_id))
}

fn transaction_input(user_id: &str, account_id: &str, category_id: &str) -> TransactionInput {
    TransactionInput {
        user_id: user_id.to_string(),
        account_id: account_id.to_string(),
        category_id: category_id.to_string(),
        ..TransactionInput::default()
    }
}

fn rent_rule(user_id: &str, account_id: &str, auto_execute: bool) -> RecurringInput {
    RecurringInput {
        user_id: user_id.to_string(),
        category_id: BILLS.to_string(),
        account_id: account_id.to_string(),
        amount: "1200.00".to_string(),
        kind: "expense".to_string(),
        note: Some("rent".to_string()),
        frequency: "monthly".to_string(),
        start_date: "2024-03-01".to_string(),
        auto_execute,
        ..RecurringInput::default()
    }
}

#[test]
fn user_add_returns_success_envelope() {
    let temp = temp_home_in_tmp("pennywise-user-add");
    assert!(temp.is_ok());
    let Ok((_dir, home)) = temp else { return };

    let envelope = add_user(at(&home, "2024-03-01 08:00:00"), "ana@example.com", "  Ana ");
    assert!(envelope.is_ok());
    if let Ok(envelope) = envelope {
        assert!(envelope.ok);
        assert_eq!(envelope.command, "user add");
        assert_eq!(envelope.version, pennywise_core::API_VERSION);
        assert_eq!(envelope.data["display_name"], json!("Ana"));
        assert_eq!(envelope.data["email"], json!("ana@example.com"));
        assert!(string_field(&envelope, "user_id").starts_with("usr_"));
    }

    let blank = add_user(at(&home, "2024-03-01 08:00:00"), "bo@example.com", "   ");
    assert!(matches!(&blank, Err(error) if error.kind == ErrorKind::Validation));
}

#[test]
fn transaction_commands_validate_and_list() {
    let temp = temp_home_in_tmp("pennywise-tx");
    assert!(temp.is_ok());
    let Ok((_dir, home)) = temp else { return };
    let onboarded = onboard(&home);
    assert!(onboarded.is_some());
    let Some((user_id, account_id)) = onboarded else { return };
    let invocation = at(&home, "2024-03-05 12:00:00");

    let mut lunch = transaction_input(&user_id, &account_id, FOOD);
    lunch.amount = "12.50".to_string();
    lunch.kind = "expense".to_string();
    lunch.note = Some("lunch".to_string());
    let added = add_transaction(invocation, lunch);
    assert!(added.is_ok());
    if let Ok(envelope) = &added {
        assert_eq!(envelope.command, "tx add");
        assert_eq!(envelope.data["amount"], json!("12.50"));
        assert_eq!(envelope.data["transaction_date"], json!("2024-03-05 12:00:00"));
    }

    let mut too_precise = transaction_input(&user_id, &account_id, SALARY);
    too_precise.amount = "10.001".to_string();
    too_precise.kind = "income".to_string();
    let rejected = add_transaction(invocation, too_precise);
    assert!(matches!(&rejected, Err(error) if error.kind == ErrorKind::Validation));

    let listed = list_transactions(
        invocation,
        TransactionQuery {
            user_id: user_id.clone(),
            from: Some("2024-03-01".to_string()),
            to: Some("2024-03-31".to_string()),
            ..TransactionQuery::default()
        },
    );
    assert!(listed.is_ok());
    if let Ok(envelope) = listed {
        assert_eq!(envelope.data["transactions"].as_array().map(Vec::len), Some(1));
    }
}

#[test]
fn recurring_flow_runs_through_commands() {
    let temp = temp_home_in_tmp("pennywise-recurring");
    assert!(temp.is_ok());
    let Ok((_dir, home)) = temp else { return };
    let onboarded = onboard(&home);
    assert!(onboarded.is_some());
    let Some((user_id, account_id)) = onboarded else { return };
    let invocation = at(&home, "2024-03-01 09:00:00");

    let added = recurring_commands::add(invocation, rent_rule(&user_id, &account_id, false));
    assert!(added.is_ok());
    let Ok(added) = added else { return };
    assert_eq!(added.data["state"], json!("due"));
    assert_eq!(added.data["frequency"], json!("monthly"));
    let rule_id = string_field(&added, "rule_id");

    let due = recurring_commands::due(invocation, &user_id);
    assert!(matches!(&due, Ok(envelope) if envelope.data["rules"].as_array().map(Vec::len) == Some(1)));

    let run = recurring_commands::run(invocation, &user_id, &rule_id);
    assert!(run.is_ok());
    if let Ok(envelope) = &run {
        assert_eq!(envelope.command, "recurring run");
        assert_eq!(envelope.data["rule"]["next_execution_date"], json!("2024-04-01"));
        assert_eq!(envelope.data["rule"]["state"], json!("scheduled"));
        assert_eq!(envelope.data["transaction"]["recurring_rule_id"], json!(rule_id));
    }

    let again = recurring_commands::run(invocation, &user_id, &rule_id);
    assert!(matches!(&again, Err(error) if error.code == "recurring_rule_not_yet_due"));

    let paused = recurring_commands::pause(invocation, &user_id, &rule_id);
    assert!(matches!(&paused, Ok(envelope) if envelope.data["state"] == json!("deactivated")));

    let deleted = recurring_commands::delete(invocation, &user_id, &rule_id);
    assert!(matches!(&deleted, Ok(envelope) if envelope.data["deleted"] == json!(true)));
    let missing = recurring_commands::show(invocation, &user_id, &rule_id);
    assert!(matches!(&missing, Err(error) if error.kind == ErrorKind::NotFound));
}

#[test]
fn process_due_with_failures_is_a_batch_failure_carrying_the_report() {
    let temp = temp_home_in_tmp("pennywise-process-due");
    assert!(temp.is_ok());
    let Ok((_dir, home)) = temp else { return };
    let onboarded = onboard(&home);
    assert!(onboarded.is_some());
    let Some((user_id, account_id)) = onboarded else { return };
    let invocation = at(&home, "2024-03-10 06:00:00");

    let healthy = recurring_commands::add(invocation, rent_rule(&user_id, &account_id, true));
    let broken = recurring_commands::add(invocation, rent_rule(&user_id, &account_id, true));
    assert!(healthy.is_ok() && broken.is_ok());
    let (Ok(_healthy), Ok(broken)) = (healthy, broken) else { return };
    let broken_id = string_field(&broken, "rule_id");

    let opened = Connection::open(home.join("ledger.db"));
    assert!(opened.is_ok());
    if let Ok(connection) = opened {
        let updated = connection.execute(
            "UPDATE recurring_rules SET frequency = 'fortnightly' WHERE rule_id = ?1",
            params![broken_id],
        );
        assert!(matches!(updated, Ok(1)));
    }

    let processed = recurring_commands::process_due(invocation);
    assert!(processed.is_err());
    let Err(error) = processed else { return };
    assert_eq!(error.kind, ErrorKind::BatchFailed);
    let envelope = failure_from_error(&error);
    let encoded = serde_json::to_value(&envelope).unwrap_or(Value::Null);
    assert_eq!(encoded["ok"], json!(false));
    assert_eq!(encoded["error"]["code"], json!("batch_failed"));
    assert_eq!(encoded["data"]["as_of"], json!("2024-03-10"));
    assert_eq!(encoded["data"]["executed"].as_array().map(Vec::len), Some(1));
    assert_eq!(encoded["data"]["failures"][0]["rule_id"], json!(broken_id));
    assert_eq!(encoded["data"]["failures"][0]["code"], json!("invalid_frequency"));
}

#[test]
fn reports_default_to_the_invocation_month() {
    let temp = temp_home_in_tmp("pennywise-reports");
    assert!(temp.is_ok());
    let Ok((_dir, home)) = temp else { return };
    let onboarded = onboard(&home);
    assert!(onboarded.is_some());
    let Some((user_id, account_id)) = onboarded else { return };

    for (category, kind, amount, date) in [
        (SALARY, "income", "2000.00", "2024-03-01 09:00:00"),
        (FOOD, "expense", "450.00", "2024-03-02 12:00:00"),
        (FOOD, "expense", "99.00", "2024-02-28 12:00:00"),
    ] {
        let mut input = transaction_input(&user_id, &account_id, category);
        input.amount = amount.to_string();
        input.kind = kind.to_string();
        input.date = Some(date.to_string());
        assert!(add_transaction(at(&home, "2024-03-02 13:00:00"), input).is_ok());
    }
    let invocation = at(&home, "2024-03-15 10:00:00");
    assert!(set_budget(invocation, &user_id, FOOD, "500").is_ok());

    let summary = reports::summary(invocation, &user_id, None);
    assert!(summary.is_ok());
    if let Ok(envelope) = summary {
        assert_eq!(envelope.command, "report summary");
        assert_eq!(envelope.data["period"], json!("2024-03"));
        assert_eq!(envelope.data["balance"], json!("1550.00"));
        assert_eq!(envelope.data["transaction_count"], json!(2));
    }

    let february = reports::spending(invocation, &user_id, Some("2024-02"));
    assert!(matches!(&february, Ok(envelope) if envelope.data["total"] == json!("99.00")));

    let budgets = reports::budgets(invocation, &user_id, None);
    assert!(budgets.is_ok());
    if let Ok(envelope) = budgets {
        assert_eq!(
            decimal_field(&envelope.data["budgets"][0]["percentage"]),
            Some(Decimal::new(90, 0))
        );
    }

    let bad_month = reports::summary(invocation, &user_id, Some("2024-13"));
    assert!(matches!(&bad_month, Err(error) if error.kind == ErrorKind::Validation));

    let alerts = insight_commands::budget_alerts(invocation, &user_id);
    assert!(matches!(&alerts, Ok(envelope) if envelope.data["insights"].as_array().map(Vec::len) == Some(1)));
    let listed = insight_commands::list(
        invocation,
        InsightListInput {
            user_id: user_id.clone(),
            priority: Some("medium".to_string()),
            ..InsightListInput::default()
        },
    );
    assert!(matches!(&listed, Ok(envelope) if envelope.data["insights"].as_array().map(Vec::len) == Some(1)));
}
