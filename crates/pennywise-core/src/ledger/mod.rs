pub mod date;
pub mod seed;
pub mod store;

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(CoreError::invalid_field(
                "kind",
                &format!("Transaction kind must be `income` or `expense`, got `{value}`."),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub account_id: String,
    pub user_id: String,
    pub name: String,
    pub account_type: String,
    pub currency: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub category_id: String,
    /// `None` for system categories.
    pub user_id: Option<String>,
    pub name: String,
    pub kind: TransactionKind,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl Category {
    pub fn is_system(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn is_usable_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref().is_none_or(|owner| owner == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub user_id: String,
    pub account_id: String,
    pub category_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub note: Option<String>,
    #[serde(with = "timestamp_serde")]
    pub transaction_date: NaiveDateTime,
    pub recurring_rule_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub account_id: String,
    pub category_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub note: Option<String>,
    pub transaction_date: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user_id: String,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub kind: Option<TransactionKind>,
    pub category_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Budget {
    pub budget_id: String,
    pub user_id: String,
    pub category_id: String,
    pub amount: Decimal,
    pub is_active: bool,
}

pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Ulid::new())
}

/// Largest amount the ledger accepts. Sums over many rows stay far inside
/// the range `Decimal` can represent.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Parses a user-supplied monetary amount. Amounts are magnitudes; the
/// transaction kind carries direction.
pub fn parse_amount(field: &str, raw: &str) -> CoreResult<Decimal> {
    let parsed = parse_decimal(field, raw)?;
    if parsed <= Decimal::ZERO {
        return Err(CoreError::invalid_field(
            field,
            &format!("`{field}` must be greater than zero."),
        ));
    }
    check_amount_limits(field, parsed)
}

/// Same as [`parse_amount`] but permits zero, for budgets.
pub fn parse_budget_amount(raw: &str) -> CoreResult<Decimal> {
    let parsed = parse_decimal("amount", raw)?;
    if parsed < Decimal::ZERO {
        return Err(CoreError::invalid_field(
            "amount",
            "`amount` must not be negative.",
        ));
    }
    check_amount_limits("amount", parsed)
}

fn parse_decimal(field: &str, raw: &str) -> CoreResult<Decimal> {
    raw.trim().parse::<Decimal>().map_err(|_| {
        CoreError::invalid_field(field, &format!("`{field}` must be a decimal number, got `{raw}`."))
    })
}

/// Trailing zeros do not count toward precision, so `12.500` is `12.50`.
/// Accepted amounts always carry two decimal places.
fn check_amount_limits(field: &str, parsed: Decimal) -> CoreResult<Decimal> {
    if parsed > MAX_AMOUNT {
        return Err(CoreError::invalid_field(
            field,
            &format!("`{field}` must not exceed {MAX_AMOUNT}."),
        ));
    }
    let mut amount = parsed.normalize();
    if amount.scale() > 2 {
        return Err(CoreError::invalid_field(
            field,
            &format!("`{field}` may have at most 2 decimal places."),
        ));
    }
    amount.rescale(2);
    Ok(amount)
}

pub(crate) fn decimal_column(db_path: &Path, raw: &str) -> CoreResult<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|_| CoreError::ledger_data_invalid(db_path, &format!("amount `{raw}`")))
}

pub(crate) fn kind_column(db_path: &Path, raw: &str) -> CoreResult<TransactionKind> {
    raw.parse::<TransactionKind>()
        .map_err(|_| CoreError::ledger_data_invalid(db_path, &format!("kind `{raw}`")))
}

pub(crate) mod timestamp_serde {
    use chrono::NaiveDateTime;
    use serde::Serializer;

    use super::date::format_timestamp;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(value))
    }
}
