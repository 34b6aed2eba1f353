pub mod common;
pub mod insights;
pub mod ledger;
pub mod recurring;
pub mod reports;
