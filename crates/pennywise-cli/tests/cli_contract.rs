use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

const NOW: &str = "2024-03-15 12:00:00";

static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

fn unique_test_home() -> PathBuf {
    let stamp = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(value) => value.as_nanos(),
        Err(_) => 0,
    };
    let sequence = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "pennywise-cli-test-{}-{stamp}-{sequence}",
        std::process::id()
    ))
}

struct CliRun {
    code: Option<i32>,
    stdout: String,
}

fn run_cli(home: &Path, args: &[&str]) -> CliRun {
    let output = Command::new(env!("CARGO_BIN_EXE_pennywise"))
        .args(args)
        .env("PENNYWISE_HOME", home)
        .env_remove("PENNYWISE_LOG")
        .env("COLUMNS", "160")
        .output();
    assert!(output.is_ok());
    match output {
        Ok(result) => CliRun {
            code: result.status.code(),
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
        },
        Err(_) => CliRun {
            code: None,
            stdout: String::new(),
        },
    }
}

fn run_json(home: &Path, args: &[&str]) -> (Option<i32>, Value) {
    let mut argv = vec!["--json", "--now", NOW];
    argv.extend_from_slice(args);
    let run = run_cli(home, &argv);
    let parsed = serde_json::from_str::<Value>(&run.stdout);
    assert!(parsed.is_ok(), "stdout was not JSON: {}", run.stdout);
    (run.code, parsed.unwrap_or(Value::Null))
}

fn id_from(envelope: &Value, key: &str) -> String {
    envelope["data"][key].as_str().unwrap_or_default().to_string()
}

/// A user with one checking account; returns `(user_id, account_id)`.
fn onboard(home: &Path) -> (String, String) {
    let (code, user) = run_json(
        home,
        &["user", "add", "--email", "ana@example.com", "--name", "Ana"],
    );
    assert_eq!(code, Some(0));
    let user_id = id_from(&user, "user_id");

    let (code, account) = run_json(
        home,
        &["account", "add", "--user", &user_id, "--name", "Everyday"],
    );
    assert_eq!(code, Some(0));
    (user_id, id_from(&account, "account_id"))
}

#[test]
fn bare_invocation_prints_root_help() {
    let home = unique_test_home();
    let run = run_cli(&home, &[]);
    assert_eq!(run.code, Some(0));
    assert!(run.stdout.starts_with("Pennywise - personal finance ledger"));
    assert!(run.stdout.contains("pennywise user add --email <email> --name <name>"));
}

#[test]
fn top_level_help_lists_command_groups() {
    let home = unique_test_home();
    let run = run_cli(&home, &["--help"]);
    assert_eq!(run.code, Some(0));
    assert!(run.stdout.contains("Recurring transactions:"));
    assert!(run.stdout.contains("pennywise insights weekly --user <id>"));
}

#[test]
fn user_add_json_uses_success_envelope() {
    let home = unique_test_home();
    let (code, envelope) = run_json(
        &home,
        &["user", "add", "--email", "ana@example.com", "--name", "  Ana  "],
    );
    assert_eq!(code, Some(0));
    assert_eq!(envelope["ok"], Value::Bool(true));
    assert_eq!(envelope["command"], Value::String("user add".to_string()));
    assert!(id_from(&envelope, "user_id").starts_with("usr_"));
    assert_eq!(
        envelope["data"]["display_name"],
        Value::String("Ana".to_string())
    );
    let _ = fs::remove_dir_all(&home);
}

#[test]
fn parse_errors_exit_one_with_json_failure_shape() {
    let home = unique_test_home();
    let run = run_cli(&home, &["--json", "tx", "add", "--user", "usr_1"]);
    assert_eq!(run.code, Some(1));

    let parsed = serde_json::from_str::<Value>(&run.stdout);
    assert!(parsed.is_ok());
    if let Ok(value) = parsed {
        assert_eq!(value["ok"], Value::Bool(false));
        assert_eq!(value["error"]["kind"], Value::String("validation".to_string()));
        assert_eq!(
            value["error"]["code"],
            Value::String("invalid_argument".to_string())
        );
        assert!(value["error"]["recovery_steps"].is_array());
    }
}

#[test]
fn runtime_errors_render_text_layout() {
    let home = unique_test_home();
    let run = run_cli(
        &home,
        &["--now", NOW, "report", "summary", "--user", "usr_missing"],
    );
    assert_eq!(run.code, Some(1));
    assert!(run.stdout.starts_with("Something went wrong, but it's easy to fix."));
    assert!(run.stdout.contains("  Error:    user_not_found"));
    assert!(run.stdout.contains("What to do next:"));
    let _ = fs::remove_dir_all(&home);
}

#[test]
fn recorded_transactions_flow_into_text_summary() {
    let home = unique_test_home();
    let (user_id, account_id) = onboard(&home);

    let (code, _) = run_json(
        &home,
        &[
            "tx", "add", "--user", &user_id, "--account", &account_id, "--category",
            "cat_sys_salary", "--amount", "3000.00", "--kind", "income", "--date",
            "2024-03-01 09:00:00",
        ],
    );
    assert_eq!(code, Some(0));
    let (code, _) = run_json(
        &home,
        &[
            "tx", "add", "--user", &user_id, "--account", &account_id, "--category",
            "cat_sys_food", "--amount", "45.50", "--kind", "expense", "--note", "groceries",
            "--date", "2024-03-10 18:30:00",
        ],
    );
    assert_eq!(code, Some(0));

    let run = run_cli(
        &home,
        &["--now", NOW, "report", "summary", "--user", &user_id],
    );
    assert_eq!(run.code, Some(0));
    assert!(run.stdout.starts_with("Summary for 2024-03:"));
    assert!(run.stdout.contains("2954.50"));
    let _ = fs::remove_dir_all(&home);
}

#[test]
fn recurring_rule_runs_once_then_reports_not_yet_due() {
    let home = unique_test_home();
    let (user_id, account_id) = onboard(&home);

    let (code, created) = run_json(
        &home,
        &[
            "recurring", "add", "--user", &user_id, "--account", &account_id, "--category",
            "cat_sys_bills", "--amount", "1200.00", "--kind", "expense", "--frequency",
            "monthly", "--start", "2024-03-01", "--note", "rent",
        ],
    );
    assert_eq!(code, Some(0));
    let rule_id = id_from(&created, "rule_id");
    assert!(rule_id.starts_with("rec_"));

    let run = run_cli(
        &home,
        &["--now", NOW, "recurring", "run", "--user", &user_id, &rule_id],
    );
    assert_eq!(run.code, Some(0));
    assert!(run.stdout.starts_with("Recurring rule executed."));
    assert!(run.stdout.contains("Next run: 2024-04-01"));

    let (code, again) = run_json(
        &home,
        &["recurring", "run", "--user", &user_id, &rule_id],
    );
    assert_eq!(code, Some(1));
    assert_eq!(
        again["error"]["code"],
        Value::String("recurring_rule_not_yet_due".to_string())
    );
    let _ = fs::remove_dir_all(&home);
}

#[test]
fn recurring_edit_changes_terms_but_keeps_the_schedule() {
    let home = unique_test_home();
    let (user_id, account_id) = onboard(&home);

    let (code, created) = run_json(
        &home,
        &[
            "recurring", "add", "--user", &user_id, "--account", &account_id, "--category",
            "cat_sys_bills", "--amount", "1200.00", "--kind", "expense", "--frequency",
            "monthly", "--start", "2024-03-01", "--note", "rent", "--auto",
        ],
    );
    assert_eq!(code, Some(0));
    let rule_id = id_from(&created, "rule_id");

    let (code, edited) = run_json(
        &home,
        &[
            "recurring", "edit", "--user", &user_id, &rule_id, "--amount", "1250.500",
            "--frequency", "weekly", "--end", "2024-12-31", "--clear-note", "--manual",
        ],
    );
    assert_eq!(code, Some(0));
    assert_eq!(edited["command"], Value::String("recurring edit".to_string()));
    let rule = &edited["data"];
    assert_eq!(rule["amount"], Value::String("1250.50".to_string()));
    assert_eq!(rule["frequency"], Value::String("weekly".to_string()));
    assert_eq!(rule["end_date"], Value::String("2024-12-31".to_string()));
    assert_eq!(rule["note"], Value::Null);
    assert_eq!(rule["auto_execute"], Value::Bool(false));
    assert_eq!(rule["next_execution_date"], Value::String("2024-03-01".to_string()));

    let (code, nothing) = run_json(&home, &["recurring", "edit", "--user", &user_id, &rule_id]);
    assert_eq!(code, Some(1));
    assert_eq!(
        nothing["error"]["code"],
        Value::String("invalid_argument".to_string())
    );

    let (code, early_end) = run_json(
        &home,
        &["recurring", "edit", "--user", &user_id, &rule_id, "--end", "2024-02-01"],
    );
    assert_eq!(code, Some(1));
    assert_eq!(early_end["error"]["kind"], Value::String("validation".to_string()));

    let text = run_cli(
        &home,
        &["--now", NOW, "recurring", "edit", "--user", &user_id, &rule_id, "--auto"],
    );
    assert_eq!(text.code, Some(0));
    assert!(text.stdout.starts_with("Recurring rule updated."));
    let _ = fs::remove_dir_all(&home);
}

#[test]
fn process_due_with_no_rules_succeeds() {
    let home = unique_test_home();
    let run = run_cli(&home, &["--now", NOW, "recurring", "process-due"]);
    assert_eq!(run.code, Some(0));
    assert!(run
        .stdout
        .starts_with("Processed recurring rules due as of 2024-03-15."));
    let _ = fs::remove_dir_all(&home);
}
