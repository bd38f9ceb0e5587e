use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::{AccountId, CategoryId, TransactionId};

/// One validated, categorized row of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    /// 1-based line number in the source file.
    pub row_index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category_id: CategoryId,
    pub account_id: AccountId,
    #[serde(default)]
    pub transaction_type: Option<String>,
}

/// A ledger row as held by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub account_id: AccountId,
    pub category_id: CategoryId,
    /// Set when the user picked the category by hand.
    #[serde(default)]
    pub category_override: bool,
}

/// A confirmed staged row, ready to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub account_id: AccountId,
    pub category_id: CategoryId,
    pub category_override: bool,
}

impl From<ParsedRow> for NewTransaction {
    fn from(row: ParsedRow) -> Self {
        NewTransaction {
            date: row.date,
            description: row.description,
            amount: row.amount,
            account_id: row.account_id,
            category_id: row.category_id,
            category_override: false,
        }
    }
}

impl NewTransaction {
    pub fn into_stored(self, id: TransactionId) -> StoredTransaction {
        StoredTransaction {
            id,
            date: self.date,
            description: self.description,
            amount: self.amount,
            account_id: self.account_id,
            category_id: self.category_id,
            category_override: self.category_override,
        }
    }
}
