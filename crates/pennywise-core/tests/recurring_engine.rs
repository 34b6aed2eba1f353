mod support;

use std::thread;

use pennywise_core::ErrorKind;
use pennywise_core::context::CancelToken;
use pennywise_core::ledger::TransactionKind;
use pennywise_core::ledger::date::{Frequency, parse_iso_date};
use pennywise_core::ledger::store::insert_category;
use pennywise_core::recurring::engine::{
    create_rule, execute, get_owned_rule, list_due, process_all_due, set_rule_active, update_rule,
};
use pennywise_core::recurring::{RuleState, RuleUpdate};
use pennywise_core::setup::open_ledger;
use rusqlite::params;
use support::ledger_testkit::*;

#[test]
fn execute_materializes_transaction_and_advances_rule() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");
    let input = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };
    assert_eq!(rule.state(ctx.today()), RuleState::Due);

    let executed = execute(&mut fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id);
    assert!(executed.is_ok());
    if let Ok(execution) = executed {
        assert_eq!(execution.transaction.amount, amount("1200.00"));
        assert_eq!(
            execution.transaction.recurring_rule_id.as_deref(),
            Some(rule.rule_id.as_str())
        );
        assert_eq!(execution.transaction.note.as_deref(), Some("rent"));
        assert_eq!(
            Some(execution.rule.next_execution_date),
            parse_iso_date("2024-04-01", "next").ok()
        );
        assert_eq!(execution.rule.last_execution_date, Some(ctx.today()));
        assert!(execution.rule.is_active);
    }

    let reloaded = get_owned_rule(&fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id);
    assert!(reloaded.is_ok());
    if let Ok(reloaded) = reloaded {
        assert_eq!(reloaded.state(ctx.today()), RuleState::Scheduled);
    }
    assert_eq!(
        count(
            &fixture.ledger,
            "SELECT COUNT(*) FROM transactions WHERE recurring_rule_id IS NOT NULL"
        ),
        1
    );
}

#[test]
fn rule_not_yet_due_is_rejected_without_side_effects() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");
    let input = rule_input(&fixture, Frequency::Weekly, "2024-03-05", true);
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let executed = execute(&mut fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id);
    assert!(matches!(&executed, Err(error) if error.kind == ErrorKind::NotYetDue));
    assert_eq!(count(&fixture.ledger, "SELECT COUNT(*) FROM transactions"), 0);
}

#[test]
fn last_remaining_execution_deactivates_rule() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");
    let mut input = rule_input(&fixture, Frequency::Daily, "2024-03-01", true);
    input.remaining_executions = Some(1);
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let first = execute(&mut fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id);
    assert!(first.is_ok());
    if let Ok(execution) = first {
        assert!(!execution.rule.is_active);
        assert_eq!(execution.rule.remaining_executions, Some(0));
        assert_eq!(execution.rule.next_execution_date, ctx.today());
    }

    let later = ctx_at("2024-03-02 09:00:00");
    let second = execute(&mut fixture.ledger, &later, &fixture.user_id, &rule.rule_id);
    assert!(matches!(&second, Err(error) if error.kind == ErrorKind::NotActive));
    assert_eq!(count(&fixture.ledger, "SELECT COUNT(*) FROM transactions"), 1);
}

#[test]
fn passing_end_date_deactivates_rule() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");
    let mut input = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    input.end_date = parse_iso_date("2024-03-15", "end").ok();
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let executed = execute(&mut fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id);
    assert!(executed.is_ok());
    if let Ok(execution) = executed {
        assert!(!execution.rule.is_active);
        assert_eq!(execution.rule.state(ctx.today()), RuleState::Deactivated);
    }
}

#[test]
fn month_end_rule_keeps_its_anchor_across_short_months() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let january = ctx_at("2024-01-31 08:00:00");
    let input = rule_input(&fixture, Frequency::Monthly, "2024-01-31", true);
    let created = create_rule(&mut fixture.ledger, &january, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let first = execute(&mut fixture.ledger, &january, &fixture.user_id, &rule.rule_id);
    assert!(first.is_ok());
    if let Ok(execution) = &first {
        assert_eq!(
            Some(execution.rule.next_execution_date),
            parse_iso_date("2024-02-29", "next").ok()
        );
    }

    let february = ctx_at("2024-02-29 08:00:00");
    let second = execute(&mut fixture.ledger, &february, &fixture.user_id, &rule.rule_id);
    assert!(second.is_ok());
    if let Ok(execution) = second {
        assert_eq!(
            Some(execution.rule.next_execution_date),
            parse_iso_date("2024-03-31", "next").ok()
        );
    }
}

#[test]
fn rules_of_other_users_are_invisible() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let other = add_user_with_account(&mut fixture.ledger, "other@example.com");
    assert!(other.is_some());
    let Some((other_user, other_account)) = other else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");

    let input = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let stolen = execute(&mut fixture.ledger, &ctx, &other_user, &rule.rule_id);
    assert!(matches!(&stolen, Err(error) if error.kind == ErrorKind::NotFound));
    let paused = set_rule_active(&mut fixture.ledger, &ctx, &other_user, &rule.rule_id, false);
    assert!(matches!(&paused, Err(error) if error.kind == ErrorKind::NotFound));

    let mut foreign_account = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    foreign_account.account_id = other_account;
    let rejected = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, foreign_account);
    assert!(matches!(&rejected, Err(error) if error.kind == ErrorKind::OwnershipViolation));
    assert_eq!(count(&fixture.ledger, "SELECT COUNT(*) FROM transactions"), 0);
}

#[test]
fn create_rule_rejects_another_users_category() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let other = add_user_with_account(&mut fixture.ledger, "other@example.com");
    assert!(other.is_some());
    let Some((other_user, _)) = other else { return };
    let category = fixture.ledger.atomic(|tx, db_path| {
        insert_category(
            tx,
            db_path,
            &other_user,
            "Horses",
            TransactionKind::Expense,
            "2024-01-01 00:00:00",
        )
    });
    assert!(category.is_ok());
    let Ok(category) = category else { return };

    let ctx = ctx_at("2024-03-01 09:00:00");
    let mut input = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    input.category_id = category.category_id;
    let rejected = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(matches!(&rejected, Err(error) if error.kind == ErrorKind::OwnershipViolation));
    assert_eq!(count(&fixture.ledger, "SELECT COUNT(*) FROM recurring_rules"), 0);
}

#[test]
fn due_listing_skips_rules_past_their_end_or_out_of_executions() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");

    let mut ending = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    ending.end_date = parse_iso_date("2024-03-15", "end").ok();
    let ending = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, ending);
    assert!(ending.is_ok());
    let Ok(ending) = ending else { return };

    let spent = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    let spent = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, spent);
    assert!(spent.is_ok());
    let Ok(spent) = spent else { return };
    let exhausted = fixture.ledger.connection().execute(
        "UPDATE recurring_rules SET remaining_executions = 0 WHERE rule_id = ?1",
        params![spent.rule_id],
    );
    assert!(matches!(exhausted, Ok(1)));

    let Ok(mid_march) = parse_iso_date("2024-03-10", "as_of") else { return };
    let Ok(late_march) = parse_iso_date("2024-03-20", "as_of") else { return };

    let before_end = list_due(&fixture.ledger, &ctx, &fixture.user_id, mid_march);
    assert!(before_end.is_ok());
    if let Ok(rules) = before_end {
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_id, ending.rule_id);
    }

    let after_end = list_due(&fixture.ledger, &ctx, &fixture.user_id, late_march);
    assert!(matches!(&after_end, Ok(rules) if rules.is_empty()));
}

#[test]
fn update_rule_edits_terms_and_keeps_the_schedule() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");
    let input = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let update = RuleUpdate {
        amount: Some(amount("1250.00")),
        note: Some(None),
        frequency: Some(Frequency::Weekly),
        end_date: Some(parse_iso_date("2024-12-31", "end").ok()),
        auto_execute: Some(false),
    };
    let updated = update_rule(&mut fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id, update);
    assert!(updated.is_ok());

    let reloaded = get_owned_rule(&fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id);
    assert!(reloaded.is_ok());
    if let Ok(reloaded) = reloaded {
        assert_eq!(reloaded.amount, amount("1250.00"));
        assert_eq!(reloaded.note, None);
        assert_eq!(reloaded.frequency, Frequency::Weekly);
        assert_eq!(reloaded.end_date, parse_iso_date("2024-12-31", "end").ok());
        assert!(!reloaded.auto_execute);
        assert_eq!(reloaded.next_execution_date, rule.next_execution_date);
        assert!(reloaded.next_execution_date >= reloaded.start_date);
    }

    let executed = execute(&mut fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id);
    assert!(executed.is_ok());
    if let Ok(execution) = executed {
        assert_eq!(execution.transaction.amount, amount("1250.00"));
        assert_eq!(
            Some(execution.rule.next_execution_date),
            parse_iso_date("2024-03-08", "next").ok()
        );
    }
}

#[test]
fn update_rule_revalidates_and_checks_ownership() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let other = add_user_with_account(&mut fixture.ledger, "other@example.com");
    assert!(other.is_some());
    let Some((other_user, _)) = other else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");
    let input = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let early_end = RuleUpdate {
        end_date: Some(parse_iso_date("2024-02-01", "end").ok()),
        ..RuleUpdate::default()
    };
    let rejected = update_rule(&mut fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id, early_end);
    assert!(matches!(&rejected, Err(error) if error.kind == ErrorKind::Validation));

    let zero = RuleUpdate {
        amount: Some(amount("0")),
        ..RuleUpdate::default()
    };
    let rejected = update_rule(&mut fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id, zero);
    assert!(matches!(&rejected, Err(error) if error.kind == ErrorKind::Validation));

    let empty = update_rule(
        &mut fixture.ledger,
        &ctx,
        &fixture.user_id,
        &rule.rule_id,
        RuleUpdate::default(),
    );
    assert!(matches!(&empty, Err(error) if error.kind == ErrorKind::Validation));

    let pause = RuleUpdate {
        auto_execute: Some(false),
        ..RuleUpdate::default()
    };
    let stolen = update_rule(&mut fixture.ledger, &ctx, &other_user, &rule.rule_id, pause);
    assert!(matches!(&stolen, Err(error) if error.kind == ErrorKind::NotFound));

    let unchanged = get_owned_rule(&fixture.ledger, &ctx, &fixture.user_id, &rule.rule_id);
    assert!(matches!(&unchanged, Ok(stored) if stored == &rule));
}

#[test]
fn create_rule_rejects_non_positive_amount() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");
    let mut input = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    input.amount = amount("0");
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(matches!(&created, Err(error) if error.kind == ErrorKind::Validation));
    assert_eq!(count(&fixture.ledger, "SELECT COUNT(*) FROM recurring_rules"), 0);
}

#[test]
fn cancelled_context_leaves_ledger_untouched() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-01 09:00:00");
    let input = rule_input(&fixture, Frequency::Monthly, "2024-03-01", true);
    let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let token = CancelToken::new();
    token.cancel();
    let cancelled = ctx.clone().with_cancel(token);
    let executed = execute(&mut fixture.ledger, &cancelled, &fixture.user_id, &rule.rule_id);
    assert!(matches!(&executed, Err(error) if error.kind == ErrorKind::Cancelled));
    assert_eq!(count(&fixture.ledger, "SELECT COUNT(*) FROM transactions"), 0);

    let due = list_due(&fixture.ledger, &ctx, &fixture.user_id, ctx.today());
    assert!(matches!(&due, Ok(rules) if rules.len() == 1));
}

#[test]
fn concurrent_executions_of_one_rule_create_one_transaction() {
    let temp = temp_home_in_tmp("pennywise-concurrent");
    assert!(temp.is_ok());
    let Ok((_dir, home)) = temp else { return };

    let opened = open_ledger(Some(&home));
    assert!(opened.is_ok());
    let Ok((_setup, mut ledger)) = opened else { return };
    let owner = add_user_with_account(&mut ledger, "race@example.com");
    assert!(owner.is_some());
    let Some((user_id, account_id)) = owner else { return };

    let ctx = ctx_at("2024-03-01 09:00:00");
    let fixture = Fixture {
        ledger,
        user_id: user_id.clone(),
        account_id,
    };
    let input = rule_input(&fixture, Frequency::Daily, "2024-03-01", true);
    let mut ledger = fixture.ledger;
    let created = create_rule(&mut ledger, &ctx, &user_id, input);
    assert!(created.is_ok());
    let Ok(rule) = created else { return };

    let workers = (0..2)
        .map(|_| {
            let home = home.clone();
            let ctx = ctx.clone();
            let user_id = user_id.clone();
            let rule_id = rule.rule_id.clone();
            thread::spawn(move || {
                let (_setup, mut ledger) = open_ledger(Some(&home))?;
                execute(&mut ledger, &ctx, &user_id, &rule_id)
            })
        })
        .collect::<Vec<_>>();

    let mut outcomes = Vec::new();
    for worker in workers {
        let joined = worker.join();
        assert!(joined.is_ok());
        if let Ok(outcome) = joined {
            outcomes.push(outcome);
        }
    }
    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(outcomes.iter().any(
        |outcome| matches!(outcome, Err(error) if error.kind == ErrorKind::NotYetDue)
    ));
    assert_eq!(count(&ledger, "SELECT COUNT(*) FROM transactions"), 1);
}

#[test]
fn process_all_due_records_failures_and_keeps_going() {
    let fixture = in_memory_fixture();
    assert!(fixture.is_some());
    let Some(mut fixture) = fixture else { return };
    let ctx = ctx_at("2024-03-10 06:00:00");

    let mut rule_ids = Vec::new();
    for (start, auto) in [("2024-03-01", true), ("2024-03-02", true), ("2024-03-03", false)] {
        let input = rule_input(&fixture, Frequency::Monthly, start, auto);
        let created = create_rule(&mut fixture.ledger, &ctx, &fixture.user_id, input);
        assert!(created.is_ok());
        if let Ok(rule) = created {
            rule_ids.push(rule.rule_id);
        }
    }
    assert_eq!(rule_ids.len(), 3);
    let broken = fixture.ledger.connection().execute(
        "UPDATE recurring_rules SET frequency = 'fortnightly' WHERE rule_id = ?1",
        params![rule_ids[0]],
    );
    assert!(matches!(broken, Ok(1)));

    let processed = process_all_due(&mut fixture.ledger, &ctx);
    assert!(processed.is_ok());
    if let Ok(report) = processed {
        assert_eq!(report.as_of, "2024-03-10");
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.executed[0].rule_id, rule_ids[1]);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].rule_id, rule_ids[0]);
        assert_eq!(report.failures[0].code, "invalid_frequency");
        assert_eq!(report.pending_confirmation.len(), 1);
        assert_eq!(report.pending_confirmation[0].rule_id, rule_ids[2]);
    }
    assert_eq!(count(&fixture.ledger, "SELECT COUNT(*) FROM transactions"), 1);
}
