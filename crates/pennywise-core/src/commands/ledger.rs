use chrono::NaiveTime;
use tracing::debug;

use crate::commands::common::{Invocation, open_session, require_text};
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::{
    AccountsData, BudgetSetData, BudgetsData, CategoriesData, TransactionsData,
};
use crate::ledger::date::{format_timestamp, parse_iso_date, parse_timestamp};
use crate::ledger::store::{
    find_active_budget, insert_account, insert_budget, insert_category, insert_transaction,
    insert_user, list_accounts, list_active_budgets, list_categories_for_user, query_transactions,
    require_owned_account, require_usable_category, require_user, update_budget_amount,
};
use crate::ledger::{
    Budget, NewTransaction, TransactionFilter, TransactionKind, parse_amount, parse_budget_amount,
};
use crate::CoreResult;

pub fn add_user(
    invocation: Invocation<'_>,
    email: &str,
    display_name: &str,
) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let display_name = require_text("name", display_name)?.to_string();
    let stamp = format_timestamp(&session.ctx.now);
    let user = session
        .ledger
        .atomic(|tx, db_path| insert_user(tx, db_path, email, &display_name, &stamp))?;
    debug!(user_id = %user.user_id, "created user");
    success("user add", user)
}

pub fn show_user(invocation: Invocation<'_>, user_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    session.ctx.check()?;
    let user = require_user(session.ledger.connection(), session.ledger.db_path(), user_id)?;
    success("user show", user)
}

pub fn add_account(
    invocation: Invocation<'_>,
    user_id: &str,
    name: &str,
    account_type: &str,
    currency: &str,
) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let stamp = format_timestamp(&session.ctx.now);
    let account = session.ledger.atomic(|tx, db_path| {
        require_user(tx, db_path, user_id)?;
        insert_account(tx, db_path, user_id, name, account_type, currency, &stamp)
    })?;
    success("account add", account)
}

pub fn list_user_accounts(invocation: Invocation<'_>, user_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let (connection, db_path) = (session.ledger.connection(), session.ledger.db_path());
    require_user(connection, db_path, user_id)?;
    let accounts = list_accounts(connection, db_path, user_id)?;
    success(
        "account list",
        AccountsData {
            user_id: user_id.to_string(),
            accounts,
        },
    )
}

pub fn add_category(
    invocation: Invocation<'_>,
    user_id: &str,
    name: &str,
    kind: &str,
) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let kind = kind.parse::<TransactionKind>()?;
    let stamp = format_timestamp(&session.ctx.now);
    let category = session.ledger.atomic(|tx, db_path| {
        require_user(tx, db_path, user_id)?;
        insert_category(tx, db_path, user_id, name, kind, &stamp)
    })?;
    success("category add", category)
}

/// System categories plus the user's own.
pub fn list_available_categories(
    invocation: Invocation<'_>,
    user_id: &str,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let (connection, db_path) = (session.ledger.connection(), session.ledger.db_path());
    require_user(connection, db_path, user_id)?;
    let categories = list_categories_for_user(connection, db_path, user_id)?;
    success(
        "category list",
        CategoriesData {
            user_id: user_id.to_string(),
            categories,
        },
    )
}

#[derive(Debug, Default)]
pub struct TransactionInput {
    pub user_id: String,
    pub account_id: String,
    pub category_id: String,
    pub amount: String,
    pub kind: String,
    pub note: Option<String>,
    /// Defaults to the invocation's `now`.
    pub date: Option<String>,
}

pub fn add_transaction(
    invocation: Invocation<'_>,
    input: TransactionInput,
) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let amount = parse_amount("amount", &input.amount)?;
    let kind = input.kind.parse::<TransactionKind>()?;
    let transaction_date = match input.date.as_deref() {
        Some(raw) => parse_timestamp(raw, "date")?,
        None => session.ctx.now,
    };
    let new_transaction = NewTransaction {
        user_id: input.user_id,
        account_id: input.account_id,
        category_id: input.category_id,
        amount,
        kind,
        note: input.note.filter(|note| !note.trim().is_empty()),
        transaction_date,
    };

    let ctx = session.ctx.clone();
    let stamp = format_timestamp(&ctx.now);
    let transaction = session.ledger.atomic(|tx, db_path| {
        require_user(tx, db_path, &new_transaction.user_id)?;
        require_owned_account(
            tx,
            db_path,
            &new_transaction.user_id,
            &new_transaction.account_id,
        )?;
        require_usable_category(
            tx,
            db_path,
            &new_transaction.user_id,
            &new_transaction.category_id,
        )?;
        ctx.check()?;
        insert_transaction(tx, db_path, &new_transaction, None, &stamp)
    })?;
    success("tx add", transaction)
}

#[derive(Debug, Default)]
pub struct TransactionQuery {
    pub user_id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: Option<String>,
    pub category_id: Option<String>,
    pub limit: Option<u32>,
}

pub fn list_transactions(
    invocation: Invocation<'_>,
    query: TransactionQuery,
) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    let filter = TransactionFilter {
        from: query
            .from
            .as_deref()
            .map(|raw| parse_iso_date(raw, "from"))
            .transpose()?
            .map(|date| date.and_time(NaiveTime::MIN)),
        to: query
            .to
            .as_deref()
            .map(|raw| parse_iso_date(raw, "to"))
            .transpose()?
            .map(|date| date.and_time(end_of_day)),
        kind: query
            .kind
            .as_deref()
            .map(str::parse::<TransactionKind>)
            .transpose()?,
        category_id: query.category_id,
        limit: query.limit,
        user_id: query.user_id,
    };

    let (connection, db_path) = (session.ledger.connection(), session.ledger.db_path());
    require_user(connection, db_path, &filter.user_id)?;
    session.ctx.check()?;
    let transactions = query_transactions(connection, db_path, &filter)?;
    success(
        "tx list",
        TransactionsData {
            user_id: filter.user_id,
            transactions,
        },
    )
}

/// Creates the user's monthly budget for a category, or replaces the amount
/// of the active one.
pub fn set_budget(
    invocation: Invocation<'_>,
    user_id: &str,
    category_id: &str,
    amount: &str,
) -> CoreResult<SuccessEnvelope> {
    let mut session = open_session(invocation)?;
    let amount = parse_budget_amount(amount)?;
    let stamp = format_timestamp(&session.ctx.now);
    let data = session.ledger.atomic(|tx, db_path| {
        require_user(tx, db_path, user_id)?;
        require_usable_category(tx, db_path, user_id, category_id)?;
        match find_active_budget(tx, db_path, user_id, category_id)? {
            Some(existing) => {
                update_budget_amount(tx, db_path, &existing.budget_id, amount)?;
                Ok(BudgetSetData {
                    budget: Budget { amount, ..existing },
                    created: false,
                })
            }
            None => Ok(BudgetSetData {
                budget: insert_budget(tx, db_path, user_id, category_id, amount, &stamp)?,
                created: true,
            }),
        }
    })?;
    success("budget set", data)
}

pub fn list_budgets(invocation: Invocation<'_>, user_id: &str) -> CoreResult<SuccessEnvelope> {
    let session = open_session(invocation)?;
    let (connection, db_path) = (session.ledger.connection(), session.ledger.db_path());
    require_user(connection, db_path, user_id)?;
    let budgets = list_active_budgets(connection, db_path, user_id)?;
    success(
        "budget list",
        BudgetsData {
            user_id: user_id.to_string(),
            budgets,
        },
    )
}
