use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{AccountId, UserId};

/// How to read one bank's delimited export: which physical column holds
/// which logical field, plus the date pattern and sign convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    #[serde(default)]
    pub name: String,
    pub owner: UserId,
    pub account_id: AccountId,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub header_skip_count: usize,
    /// strftime-style pattern, e.g. `%m/%d/%Y`.
    pub date_format: String,
    pub date_column: usize,
    pub description_column: usize,
    #[serde(default)]
    pub sub_description_column: Option<usize>,
    pub amount_column: usize,
    #[serde(default)]
    pub transaction_type_column: Option<usize>,
    #[serde(default)]
    pub negate_amount: bool,
}

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("The same column index cannot be used more than once: {first} and {second} both use column {index}")]
    DuplicateColumn {
        first: &'static str,
        second: &'static str,
        index: usize,
    },
    #[error("Please provide a valid date format string: '{0}'")]
    InvalidDateFormat(String),
    #[error("Delimiter must be a single ASCII character, got '{0}'")]
    UnsupportedDelimiter(char),
}

impl ColumnSchema {
    pub fn new(owner: UserId, account_id: AccountId, date_format: &str) -> Self {
        ColumnSchema {
            name: String::new(),
            owner,
            account_id,
            delimiter: default_delimiter(),
            header_skip_count: 0,
            date_format: date_format.to_string(),
            date_column: 0,
            description_column: 1,
            sub_description_column: None,
            amount_column: 2,
            transaction_type_column: None,
            negate_amount: false,
        }
    }

    /// Every populated column as `(field name, index)`, in field order.
    pub fn columns(&self) -> Vec<(&'static str, usize)> {
        let mut cols = vec![
            ("date_column", self.date_column),
            ("description_column", self.description_column),
        ];
        if let Some(idx) = self.sub_description_column {
            cols.push(("sub_description_column", idx));
        }
        cols.push(("amount_column", self.amount_column));
        if let Some(idx) = self.transaction_type_column {
            cols.push(("transaction_type_column", idx));
        }
        cols
    }

    pub fn delimiter_byte(&self) -> Result<u8, SchemaError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(SchemaError::UnsupportedDelimiter(self.delimiter))
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        let cols = self.columns();
        for (i, (first, a)) in cols.iter().enumerate() {
            if let Some((second, _)) = cols[i + 1..].iter().find(|(_, b)| b == a) {
                return Err(SchemaError::DuplicateColumn {
                    first: *first,
                    second: *second,
                    index: *a,
                });
            }
        }

        self.delimiter_byte()?;
        validate_date_format(&self.date_format)
    }
}

fn validate_date_format(fmt: &str) -> Result<(), SchemaError> {
    let mut has_field = false;
    for item in StrftimeItems::new(fmt) {
        match item {
            Item::Error => return Err(SchemaError::InvalidDateFormat(fmt.to_string())),
            Item::Numeric(..) | Item::Fixed(..) => has_field = true,
            _ => {}
        }
    }
    if has_field {
        Ok(())
    } else {
        Err(SchemaError::InvalidDateFormat(fmt.to_string()))
    }
}
