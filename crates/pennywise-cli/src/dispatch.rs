use pennywise_core::commands::common::Invocation;
use pennywise_core::commands::insights::InsightListInput;
use pennywise_core::commands::ledger::{TransactionInput, TransactionQuery};
use pennywise_core::commands::recurring::{RecurringEdit, RecurringInput};
use pennywise_core::commands::{insights, ledger, recurring, reports};
use pennywise_core::{CoreResult, SuccessEnvelope};

use crate::cli::{
    AccountCommand, BudgetCommand, CategoryCommand, Cli, Commands, InsightsCommand,
    RecurringCommand, ReportCommand, TxCommand, UserCommand,
};

pub fn dispatch(cli: &Cli) -> CoreResult<SuccessEnvelope> {
    let invocation = Invocation {
        home_override: cli.home.as_deref(),
        now: cli.now.as_deref(),
    };

    match &cli.command {
        Commands::User { command } => match command {
            UserCommand::Add { email, name } => ledger::add_user(invocation, email, name),
            UserCommand::Show { user_id } => ledger::show_user(invocation, user_id),
        },
        Commands::Account { command } => match command {
            AccountCommand::Add {
                user,
                name,
                account_type,
                currency,
            } => ledger::add_account(invocation, &user.user_id, name, account_type, currency),
            AccountCommand::List { user } => ledger::list_user_accounts(invocation, &user.user_id),
        },
        Commands::Category { command } => match command {
            CategoryCommand::Add { user, name, kind } => {
                ledger::add_category(invocation, &user.user_id, name, kind)
            }
            CategoryCommand::List { user } => {
                ledger::list_available_categories(invocation, &user.user_id)
            }
        },
        Commands::Tx { command } => dispatch_tx(invocation, command),
        Commands::Budget { command } => match command {
            BudgetCommand::Set {
                user,
                category_id,
                amount,
            } => ledger::set_budget(invocation, &user.user_id, category_id, amount),
            BudgetCommand::List { user } => ledger::list_budgets(invocation, &user.user_id),
        },
        Commands::Recurring { command } => dispatch_recurring(invocation, command),
        Commands::Report { command } => match command {
            ReportCommand::Summary(period) => reports::summary(
                invocation,
                &period.user.user_id,
                period.month.as_deref(),
            ),
            ReportCommand::Spending(period) => reports::spending(
                invocation,
                &period.user.user_id,
                period.month.as_deref(),
            ),
            ReportCommand::Budgets(period) => reports::budgets(
                invocation,
                &period.user.user_id,
                period.month.as_deref(),
            ),
        },
        Commands::Insights { command } => dispatch_insights(invocation, command),
    }
}

fn dispatch_tx(invocation: Invocation<'_>, command: &TxCommand) -> CoreResult<SuccessEnvelope> {
    match command {
        TxCommand::Add {
            user,
            account_id,
            category_id,
            amount,
            kind,
            note,
            date,
        } => ledger::add_transaction(
            invocation,
            TransactionInput {
                user_id: user.user_id.clone(),
                account_id: account_id.clone(),
                category_id: category_id.clone(),
                amount: amount.clone(),
                kind: kind.clone(),
                note: note.clone(),
                date: date.clone(),
            },
        ),
        TxCommand::List {
            user,
            from,
            to,
            kind,
            category_id,
            limit,
        } => ledger::list_transactions(
            invocation,
            TransactionQuery {
                user_id: user.user_id.clone(),
                from: from.clone(),
                to: to.clone(),
                kind: kind.clone(),
                category_id: category_id.clone(),
                limit: *limit,
            },
        ),
    }
}

fn dispatch_recurring(
    invocation: Invocation<'_>,
    command: &RecurringCommand,
) -> CoreResult<SuccessEnvelope> {
    match command {
        RecurringCommand::Add {
            user,
            account_id,
            category_id,
            amount,
            kind,
            frequency,
            start,
            end,
            note,
            auto,
            times,
        } => recurring::add(
            invocation,
            RecurringInput {
                user_id: user.user_id.clone(),
                category_id: category_id.clone(),
                account_id: account_id.clone(),
                amount: amount.clone(),
                kind: kind.clone(),
                note: note.clone(),
                frequency: frequency.clone(),
                start_date: start.clone(),
                end_date: end.clone(),
                auto_execute: *auto,
                remaining_executions: *times,
            },
        ),
        RecurringCommand::List { user } => recurring::list(invocation, &user.user_id),
        RecurringCommand::Show(rule) => {
            recurring::show(invocation, &rule.user.user_id, &rule.rule_id)
        }
        RecurringCommand::Edit {
            rule,
            amount,
            note,
            clear_note,
            frequency,
            end,
            clear_end,
            auto,
            manual,
        } => recurring::edit(
            invocation,
            RecurringEdit {
                user_id: rule.user.user_id.clone(),
                rule_id: rule.rule_id.clone(),
                amount: amount.clone(),
                note: note.clone(),
                clear_note: *clear_note,
                frequency: frequency.clone(),
                end_date: end.clone(),
                clear_end_date: *clear_end,
                auto_execute: match (*auto, *manual) {
                    (true, _) => Some(true),
                    (false, true) => Some(false),
                    (false, false) => None,
                },
            },
        ),
        RecurringCommand::Due { user } => recurring::due(invocation, &user.user_id),
        RecurringCommand::Run(rule) => recurring::run(invocation, &rule.user.user_id, &rule.rule_id),
        RecurringCommand::ProcessDue => recurring::process_due(invocation),
        RecurringCommand::Pause(rule) => {
            recurring::pause(invocation, &rule.user.user_id, &rule.rule_id)
        }
        RecurringCommand::Resume(rule) => {
            recurring::resume(invocation, &rule.user.user_id, &rule.rule_id)
        }
        RecurringCommand::Delete(rule) => {
            recurring::delete(invocation, &rule.user.user_id, &rule.rule_id)
        }
    }
}

fn dispatch_insights(
    invocation: Invocation<'_>,
    command: &InsightsCommand,
) -> CoreResult<SuccessEnvelope> {
    match command {
        InsightsCommand::Anomalies { user, months } => {
            insights::anomalies(invocation, &user.user_id, *months)
        }
        InsightsCommand::Patterns { user, days } => {
            insights::patterns(invocation, &user.user_id, *days)
        }
        InsightsCommand::Savings { user, days } => {
            insights::savings(invocation, &user.user_id, *days)
        }
        InsightsCommand::Recommend { user, note } => {
            insights::recommend(invocation, &user.user_id, note)
        }
        InsightsCommand::BudgetAlerts { user } => {
            insights::budget_alerts(invocation, &user.user_id)
        }
        InsightsCommand::Weekly { user } => insights::weekly(invocation, &user.user_id),
        InsightsCommand::WeeklyAll => insights::weekly_all(invocation),
        InsightsCommand::List {
            user,
            insight_type,
            priority,
            unread,
            all,
            limit,
            offset,
        } => insights::list(
            invocation,
            InsightListInput {
                user_id: user.user_id.clone(),
                insight_type: insight_type.clone(),
                priority: priority.clone(),
                unread_only: *unread,
                include_expired: *all,
                limit: *limit,
                offset: *offset,
            },
        ),
        InsightsCommand::Read { user, insight_id } => {
            insights::mark_read(invocation, &user.user_id, insight_id)
        }
        InsightsCommand::ReadAll { user } => insights::mark_all_read(invocation, &user.user_id),
        InsightsCommand::Sweep => insights::sweep(invocation),
    }
}
