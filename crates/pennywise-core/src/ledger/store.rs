use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

use crate::ledger::date::{format_timestamp, parse_timestamp};
use crate::ledger::{
    Account, Budget, Category, NewTransaction, Transaction, TransactionFilter, TransactionKind,
    User, decimal_column, kind_column, new_id,
};
use crate::state::map_sqlite_error;
use crate::{CoreError, CoreResult};

pub fn insert_user(
    connection: &Connection,
    db_path: &Path,
    email: &str,
    display_name: &str,
    created_at: &str,
) -> CoreResult<User> {
    let email = email.trim().to_ascii_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(CoreError::invalid_field(
            "email",
            "`email` must be a valid address.",
        ));
    }
    let exists = connection
        .query_row(
            "SELECT 1 FROM users WHERE email = ?1 LIMIT 1",
            [&email],
            |_row| Ok(true),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .unwrap_or(false);
    if exists {
        return Err(CoreError::invalid_field(
            "email",
            &format!("A user with email `{email}` already exists."),
        ));
    }

    let user = User {
        user_id: new_id("usr"),
        email,
        display_name: display_name.trim().to_string(),
        created_at: created_at.to_string(),
    };
    connection
        .execute(
            "INSERT INTO users (user_id, email, display_name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![&user.user_id, &user.email, &user.display_name, &user.created_at],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(user)
}

pub fn get_user(connection: &Connection, db_path: &Path, user_id: &str) -> CoreResult<Option<User>> {
    connection
        .query_row(
            "SELECT user_id, email, display_name, created_at FROM users WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok(User {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                    display_name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))
}

pub fn require_user(connection: &Connection, db_path: &Path, user_id: &str) -> CoreResult<User> {
    get_user(connection, db_path, user_id)?.ok_or_else(|| CoreError::not_found("user", user_id))
}

pub fn list_user_ids(connection: &Connection, db_path: &Path) -> CoreResult<Vec<String>> {
    let mut statement = connection
        .prepare("SELECT user_id FROM users ORDER BY user_id ASC")
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows_iter = statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut user_ids = Vec::new();
    for row in rows_iter {
        user_ids.push(row.map_err(|error| map_sqlite_error(db_path, &error))?);
    }
    Ok(user_ids)
}

pub fn insert_account(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    name: &str,
    account_type: &str,
    currency: &str,
    created_at: &str,
) -> CoreResult<Account> {
    if name.trim().is_empty() {
        return Err(CoreError::invalid_field("name", "`name` must not be empty."));
    }
    let currency = currency.trim().to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|value| value.is_ascii_alphabetic()) {
        return Err(CoreError::invalid_field(
            "currency",
            "`currency` must be a 3-letter ISO code.",
        ));
    }

    let account = Account {
        account_id: new_id("acct"),
        user_id: user_id.to_string(),
        name: name.trim().to_string(),
        account_type: account_type.trim().to_ascii_lowercase(),
        currency,
        created_at: created_at.to_string(),
    };
    connection
        .execute(
            "INSERT INTO accounts (
                account_id,
                user_id,
                name,
                account_type,
                currency,
                created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &account.account_id,
                &account.user_id,
                &account.name,
                &account.account_type,
                &account.currency,
                &account.created_at,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(account)
}

pub fn get_account(
    connection: &Connection,
    db_path: &Path,
    account_id: &str,
) -> CoreResult<Option<Account>> {
    connection
        .query_row(
            "SELECT account_id, user_id, name, account_type, currency, created_at
             FROM accounts
             WHERE account_id = ?1",
            [account_id],
            account_from_row,
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))
}

pub fn list_accounts(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
) -> CoreResult<Vec<Account>> {
    let mut statement = connection
        .prepare(
            "SELECT account_id, user_id, name, account_type, currency, created_at
             FROM accounts
             WHERE user_id = ?1
             ORDER BY name ASC, account_id ASC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows_iter = statement
        .query_map([user_id], account_from_row)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut accounts = Vec::new();
    for row in rows_iter {
        accounts.push(row.map_err(|error| map_sqlite_error(db_path, &error))?);
    }
    Ok(accounts)
}

/// Looks up an account the acting user may book against.
pub fn require_owned_account(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    account_id: &str,
) -> CoreResult<Account> {
    let account = get_account(connection, db_path, account_id)?
        .ok_or_else(|| CoreError::not_found("account", account_id))?;
    if account.user_id != user_id {
        return Err(CoreError::ownership_violation("account", account_id));
    }
    Ok(account)
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        account_id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        account_type: row.get(3)?,
        currency: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_category(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    name: &str,
    kind: TransactionKind,
    created_at: &str,
) -> CoreResult<Category> {
    if name.trim().is_empty() {
        return Err(CoreError::invalid_field("name", "`name` must not be empty."));
    }
    let category = Category {
        category_id: new_id("cat"),
        user_id: Some(user_id.to_string()),
        name: name.trim().to_string(),
        kind,
        icon: None,
        color: None,
    };
    connection
        .execute(
            "INSERT INTO categories (
                category_id,
                user_id,
                name,
                kind,
                icon,
                color,
                created_at
             ) VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5)",
            params![
                &category.category_id,
                user_id,
                &category.name,
                category.kind.as_str(),
                created_at,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(category)
}

pub fn get_category(
    connection: &Connection,
    db_path: &Path,
    category_id: &str,
) -> CoreResult<Option<Category>> {
    let raw = connection
        .query_row(
            "SELECT category_id, user_id, name, kind, icon, color
             FROM categories
             WHERE category_id = ?1",
            [category_id],
            raw_category_from_row,
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    raw.map(|value| value.into_category(db_path)).transpose()
}

/// System categories plus the user's own, grouped by kind then name.
pub fn list_categories_for_user(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
) -> CoreResult<Vec<Category>> {
    let mut statement = connection
        .prepare(
            "SELECT category_id, user_id, name, kind, icon, color
             FROM categories
             WHERE user_id IS NULL OR user_id = ?1
             ORDER BY kind ASC, user_id IS NOT NULL ASC, name ASC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows_iter = statement
        .query_map([user_id], raw_category_from_row)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut categories = Vec::new();
    for row in rows_iter {
        let raw = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        categories.push(raw.into_category(db_path)?);
    }
    Ok(categories)
}

/// Looks up a category that is either a system category or owned by the user.
pub fn require_usable_category(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    category_id: &str,
) -> CoreResult<Category> {
    let category = get_category(connection, db_path, category_id)?
        .ok_or_else(|| CoreError::not_found("category", category_id))?;
    if !category.is_usable_by(user_id) {
        return Err(CoreError::ownership_violation("category", category_id));
    }
    Ok(category)
}

struct RawCategory {
    category_id: String,
    user_id: Option<String>,
    name: String,
    kind: String,
    icon: Option<String>,
    color: Option<String>,
}

impl RawCategory {
    fn into_category(self, db_path: &Path) -> CoreResult<Category> {
        Ok(Category {
            kind: kind_column(db_path, &self.kind)?,
            category_id: self.category_id,
            user_id: self.user_id,
            name: self.name,
            icon: self.icon,
            color: self.color,
        })
    }
}

fn raw_category_from_row(row: &Row<'_>) -> rusqlite::Result<RawCategory> {
    Ok(RawCategory {
        category_id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        icon: row.get(4)?,
        color: row.get(5)?,
    })
}

pub fn insert_transaction(
    connection: &Connection,
    db_path: &Path,
    input: &NewTransaction,
    recurring_rule_id: Option<&str>,
    created_at: &str,
) -> CoreResult<Transaction> {
    let transaction = Transaction {
        transaction_id: new_id("txn"),
        user_id: input.user_id.clone(),
        account_id: input.account_id.clone(),
        category_id: input.category_id.clone(),
        amount: input.amount,
        kind: input.kind,
        note: input.note.clone(),
        transaction_date: input.transaction_date,
        recurring_rule_id: recurring_rule_id.map(std::string::ToString::to_string),
    };
    connection
        .execute(
            "INSERT INTO transactions (
                transaction_id,
                user_id,
                account_id,
                category_id,
                amount,
                kind,
                note,
                transaction_date,
                recurring_rule_id,
                created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &transaction.transaction_id,
                &transaction.user_id,
                &transaction.account_id,
                &transaction.category_id,
                transaction.amount.to_string(),
                transaction.kind.as_str(),
                &transaction.note,
                format_timestamp(&transaction.transaction_date),
                &transaction.recurring_rule_id,
                created_at,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(transaction)
}

/// Filtered transaction query, newest first.
pub fn query_transactions(
    connection: &Connection,
    db_path: &Path,
    filter: &TransactionFilter,
) -> CoreResult<Vec<Transaction>> {
    let mut statement = connection
        .prepare(
            "SELECT
                transaction_id,
                user_id,
                account_id,
                category_id,
                amount,
                kind,
                note,
                transaction_date,
                recurring_rule_id
             FROM transactions
             WHERE user_id = ?1
               AND (?2 IS NULL OR transaction_date >= ?2)
               AND (?3 IS NULL OR transaction_date <= ?3)
               AND (?4 IS NULL OR kind = ?4)
               AND (?5 IS NULL OR category_id = ?5)
             ORDER BY transaction_date DESC, transaction_id DESC
             LIMIT ?6",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let from_bound = filter.from.as_ref().map(format_timestamp);
    let to_bound = filter.to.as_ref().map(format_timestamp);
    let kind = filter.kind.map(TransactionKind::as_str);
    let limit = filter.limit.map_or(-1_i64, i64::from);

    let rows_iter = statement
        .query_map(
            params![
                &filter.user_id,
                from_bound,
                to_bound,
                kind,
                &filter.category_id,
                limit
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            },
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut transactions = Vec::new();
    for row in rows_iter {
        let (
            transaction_id,
            user_id,
            account_id,
            category_id,
            amount,
            kind,
            note,
            transaction_date,
            recurring_rule_id,
        ) = row.map_err(|error| map_sqlite_error(db_path, &error))?;

        let transaction_date = parse_timestamp(&transaction_date, "transaction_date").map_err(
            |_| CoreError::ledger_data_invalid(db_path, &format!("date `{transaction_date}`")),
        )?;
        transactions.push(Transaction {
            transaction_id,
            user_id,
            account_id,
            category_id,
            amount: decimal_column(db_path, &amount)?,
            kind: kind_column(db_path, &kind)?,
            note,
            transaction_date,
            recurring_rule_id,
        });
    }

    Ok(transactions)
}

pub fn insert_budget(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    category_id: &str,
    amount: Decimal,
    created_at: &str,
) -> CoreResult<Budget> {
    let budget = Budget {
        budget_id: new_id("bud"),
        user_id: user_id.to_string(),
        category_id: category_id.to_string(),
        amount,
        is_active: true,
    };
    connection
        .execute(
            "INSERT INTO budgets (budget_id, user_id, category_id, amount, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![
                &budget.budget_id,
                &budget.user_id,
                &budget.category_id,
                budget.amount.to_string(),
                created_at,
            ],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(budget)
}

/// Replaces the amount of an existing active budget.
pub fn update_budget_amount(
    connection: &Connection,
    db_path: &Path,
    budget_id: &str,
    amount: Decimal,
) -> CoreResult<()> {
    connection
        .execute(
            "UPDATE budgets SET amount = ?2 WHERE budget_id = ?1",
            params![budget_id, amount.to_string()],
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(())
}

pub fn find_active_budget(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
    category_id: &str,
) -> CoreResult<Option<Budget>> {
    let raw = connection
        .query_row(
            "SELECT budget_id, user_id, category_id, amount, is_active
             FROM budgets
             WHERE user_id = ?1 AND category_id = ?2 AND is_active = 1
             ORDER BY created_at DESC
             LIMIT 1",
            params![user_id, category_id],
            raw_budget_from_row,
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    raw.map(|value| value.into_budget(db_path)).transpose()
}

pub fn list_active_budgets(
    connection: &Connection,
    db_path: &Path,
    user_id: &str,
) -> CoreResult<Vec<Budget>> {
    let mut statement = connection
        .prepare(
            "SELECT budget_id, user_id, category_id, amount, is_active
             FROM budgets
             WHERE user_id = ?1 AND is_active = 1
             ORDER BY created_at ASC, budget_id ASC",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    let rows_iter = statement
        .query_map([user_id], raw_budget_from_row)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut budgets = Vec::new();
    for row in rows_iter {
        let raw = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        budgets.push(raw.into_budget(db_path)?);
    }
    Ok(budgets)
}

struct RawBudget {
    budget_id: String,
    user_id: String,
    category_id: String,
    amount: String,
    is_active: bool,
}

impl RawBudget {
    fn into_budget(self, db_path: &Path) -> CoreResult<Budget> {
        Ok(Budget {
            amount: decimal_column(db_path, &self.amount)?,
            budget_id: self.budget_id,
            user_id: self.user_id,
            category_id: self.category_id,
            is_active: self.is_active,
        })
    }
}

fn raw_budget_from_row(row: &Row<'_>) -> rusqlite::Result<RawBudget> {
    Ok(RawBudget {
        budget_id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        amount: row.get(3)?,
        is_active: row.get(4)?,
    })
}
