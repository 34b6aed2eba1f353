use std::fs;
use std::path::PathBuf;

use pennywise_core::context::CallContext;
use pennywise_core::ledger::date::{Frequency, format_timestamp, parse_iso_date, parse_timestamp};
use pennywise_core::ledger::store::{insert_account, insert_budget, insert_transaction, insert_user};
use pennywise_core::ledger::{NewTransaction, Transaction, TransactionKind};
use pennywise_core::recurring::NewRecurringRule;
use pennywise_core::setup::open_in_memory;
use pennywise_core::state::Ledger;
use rust_decimal::Decimal;
use tempfile::{Builder, TempDir};

pub const FOOD: &str = "cat_sys_food";
pub const SHOPPING: &str = "cat_sys_shopping";
pub const BILLS: &str = "cat_sys_bills";
pub const SALARY: &str = "cat_sys_salary";

pub fn temp_home_in_tmp(prefix: &str) -> std::io::Result<(TempDir, PathBuf)> {
    let dir = Builder::new().prefix(prefix).tempdir_in("/tmp")?;
    let home = dir.path().join("ledger-home");
    fs::create_dir_all(&home)?;
    Ok((dir, home))
}

pub fn ctx_at(timestamp: &str) -> CallContext {
    let parsed = parse_timestamp(timestamp, "now");
    assert!(parsed.is_ok(), "bad fixture timestamp {timestamp}");
    CallContext::at(parsed.unwrap_or_default())
}

pub fn amount(raw: &str) -> Decimal {
    raw.parse::<Decimal>().unwrap_or_default()
}

/// A ledger with one user who owns one account.
pub struct Fixture {
    pub ledger: Ledger,
    pub user_id: String,
    pub account_id: String,
}

pub fn in_memory_fixture() -> Option<Fixture> {
    let opened = open_in_memory();
    assert!(opened.is_ok());
    let mut ledger = opened.ok()?;
    let (user_id, account_id) = add_user_with_account(&mut ledger, "owner@example.com")?;
    Some(Fixture {
        ledger,
        user_id,
        account_id,
    })
}

pub fn add_user_with_account(ledger: &mut Ledger, email: &str) -> Option<(String, String)> {
    let created = ledger.atomic(|tx, db_path| {
        let user = insert_user(tx, db_path, email, "Fixture User", "2024-01-01 00:00:00")?;
        let account = insert_account(
            tx,
            db_path,
            &user.user_id,
            "Main",
            "checking",
            "USD",
            "2024-01-01 00:00:00",
        )?;
        Ok((user.user_id, account.account_id))
    });
    assert!(created.is_ok());
    created.ok()
}

pub fn record(
    ledger: &mut Ledger,
    user_id: &str,
    account_id: &str,
    category_id: &str,
    kind: TransactionKind,
    raw_amount: &str,
    when: &str,
) -> Option<Transaction> {
    let transaction_date = parse_timestamp(when, "when").ok()?;
    let input = NewTransaction {
        user_id: user_id.to_string(),
        account_id: account_id.to_string(),
        category_id: category_id.to_string(),
        amount: amount(raw_amount),
        kind,
        note: None,
        transaction_date,
    };
    let stamp = format_timestamp(&transaction_date);
    let inserted = ledger.atomic(|tx, db_path| insert_transaction(tx, db_path, &input, None, &stamp));
    assert!(inserted.is_ok());
    inserted.ok()
}

pub fn expense(fixture: &mut Fixture, category_id: &str, raw_amount: &str, when: &str) {
    let recorded = record(
        &mut fixture.ledger,
        &fixture.user_id,
        &fixture.account_id,
        category_id,
        TransactionKind::Expense,
        raw_amount,
        when,
    );
    assert!(recorded.is_some());
}

pub fn income(fixture: &mut Fixture, category_id: &str, raw_amount: &str, when: &str) {
    let recorded = record(
        &mut fixture.ledger,
        &fixture.user_id,
        &fixture.account_id,
        category_id,
        TransactionKind::Income,
        raw_amount,
        when,
    );
    assert!(recorded.is_some());
}

pub fn budget(fixture: &mut Fixture, category_id: &str, raw_amount: &str) -> Option<String> {
    let user_id = fixture.user_id.clone();
    let created = fixture.ledger.atomic(|tx, db_path| {
        insert_budget(
            tx,
            db_path,
            &user_id,
            category_id,
            amount(raw_amount),
            "2024-01-01 00:00:00",
        )
    });
    assert!(created.is_ok());
    created.ok().map(|value| value.budget_id)
}

pub fn rule_input(
    fixture: &Fixture,
    frequency: Frequency,
    start: &str,
    auto_execute: bool,
) -> NewRecurringRule {
    NewRecurringRule {
        category_id: BILLS.to_string(),
        account_id: fixture.account_id.clone(),
        amount: amount("1200.00"),
        kind: TransactionKind::Expense,
        note: Some("rent".to_string()),
        frequency,
        start_date: parse_iso_date(start, "start").unwrap_or_default(),
        end_date: None,
        auto_execute,
        remaining_executions: None,
    }
}

pub fn count(ledger: &Ledger, sql: &str) -> i64 {
    ledger
        .connection()
        .query_row(sql, [], |row| row.get::<_, i64>(0))
        .unwrap_or(-1)
}
