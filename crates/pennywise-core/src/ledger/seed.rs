use std::path::Path;

use rusqlite::{Connection, params};

use crate::CoreResult;
use crate::ledger::TransactionKind;
use crate::state::map_sqlite_error;

#[derive(Debug, Clone, Copy)]
pub struct SeedCategory {
    pub category_id: &'static str,
    pub name: &'static str,
    pub kind: TransactionKind,
    pub icon: &'static str,
    pub color: &'static str,
}

/// System categories every ledger starts with. Ids are stable so reseeding is
/// idempotent and keyword suggestions can refer to these names.
pub const DEFAULT_CATEGORIES: [SeedCategory; 13] = [
    expense("cat_sys_food", "Food & Dining", "utensils", "#FF6B6B"),
    expense("cat_sys_transport", "Transportation", "car", "#4ECDC4"),
    expense("cat_sys_shopping", "Shopping", "shopping-bag", "#45B7D1"),
    expense("cat_sys_entertainment", "Entertainment", "film", "#96CEB4"),
    expense("cat_sys_health", "Health", "heart", "#FFEAA7"),
    expense("cat_sys_education", "Education", "book", "#DDA0DD"),
    expense("cat_sys_bills", "Bills & Utilities", "receipt", "#98D8C8"),
    expense("cat_sys_other_expense", "Other", "more-horizontal", "#F7DC6F"),
    income("cat_sys_salary", "Salary", "briefcase", "#2ECC71"),
    income("cat_sys_bonus", "Bonus", "gift", "#27AE60"),
    income("cat_sys_investment", "Investment", "trending-up", "#16A085"),
    income("cat_sys_business", "Business", "building", "#1ABC9C"),
    income("cat_sys_other_income", "Other Income", "plus-circle", "#58D68D"),
];

const fn expense(
    category_id: &'static str,
    name: &'static str,
    icon: &'static str,
    color: &'static str,
) -> SeedCategory {
    SeedCategory {
        category_id,
        name,
        kind: TransactionKind::Expense,
        icon,
        color,
    }
}

const fn income(
    category_id: &'static str,
    name: &'static str,
    icon: &'static str,
    color: &'static str,
) -> SeedCategory {
    SeedCategory {
        category_id,
        name,
        kind: TransactionKind::Income,
        icon,
        color,
    }
}

pub fn seed_default_categories(
    connection: &Connection,
    db_path: &Path,
    created_at: &str,
) -> CoreResult<usize> {
    let mut statement = connection
        .prepare(
            "INSERT OR IGNORE INTO categories (
                category_id,
                user_id,
                name,
                kind,
                icon,
                color,
                created_at
             ) VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut inserted = 0_usize;
    for seed in DEFAULT_CATEGORIES {
        inserted += statement
            .execute(params![
                seed.category_id,
                seed.name,
                seed.kind.as_str(),
                seed.icon,
                seed.color,
                created_at,
            ])
            .map_err(|error| map_sqlite_error(db_path, &error))?;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::DEFAULT_CATEGORIES;
    use crate::ledger::TransactionKind;

    #[test]
    fn seed_ids_and_names_are_unique() {
        let ids = DEFAULT_CATEGORIES
            .iter()
            .map(|seed| seed.category_id)
            .collect::<HashSet<_>>();
        let names = DEFAULT_CATEGORIES
            .iter()
            .map(|seed| seed.name)
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), DEFAULT_CATEGORIES.len());
        assert_eq!(names.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn seed_has_eight_expense_and_five_income_categories() {
        let expenses = DEFAULT_CATEGORIES
            .iter()
            .filter(|seed| seed.kind == TransactionKind::Expense)
            .count();
        assert_eq!(expenses, 8);
        assert_eq!(DEFAULT_CATEGORIES.len() - expenses, 5);
    }
}
