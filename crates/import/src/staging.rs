use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sift_core::{AccountId, CategoryId, ColumnSchema, NewTransaction, ParsedRow, UserId};
use std::io::{Read, Write};
use thiserror::Error;

use crate::csv::{ParseEngine, ParseError};
use crate::util::decode_upload;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Parsed rows held between upload and user confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedBatch {
    pub owner: UserId,
    pub account_id: AccountId,
    /// SHA-256 hex digest of the raw upload.
    pub checksum: String,
    pub rows: Vec<ParsedRow>,
}

/// One line of the staged CSV file.
#[derive(Debug, Serialize, Deserialize)]
struct StagedRecord {
    row_index: usize,
    date: NaiveDate,
    description: String,
    amount: f64,
    category_id: CategoryId,
    transaction_type: Option<String>,
}

/// A staged row with its category name resolved for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    pub row_index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category_id: CategoryId,
    pub category: String,
}

pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

impl StagedBatch {
    /// Decodes and parses an upload into a batch awaiting confirmation.
    pub fn stage(engine: &ParseEngine<'_>, schema: &ColumnSchema, data: &[u8]) -> Result<Self, ParseError> {
        let content = decode_upload(data)?;
        let rows = engine.parse(schema, content)?;
        Ok(StagedBatch {
            owner: schema.owner,
            account_id: schema.account_id,
            checksum: checksum(data),
            rows,
        })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), StagingError> {
        let mut wtr = csv::Writer::from_writer(writer);
        for row in &self.rows {
            wtr.serialize(StagedRecord {
                row_index: row.row_index,
                date: row.date,
                description: row.description.clone(),
                amount: row.amount,
                category_id: row.category_id,
                transaction_type: row.transaction_type.clone(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn read_csv<R: Read>(
        reader: R,
        owner: UserId,
        account_id: AccountId,
        checksum: &str,
    ) -> Result<Self, StagingError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let rows = rdr
            .deserialize::<StagedRecord>()
            .map(|rec| {
                rec.map(|r| ParsedRow {
                    row_index: r.row_index,
                    date: r.date,
                    description: r.description,
                    amount: r.amount,
                    category_id: r.category_id,
                    account_id,
                    transaction_type: r.transaction_type,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StagedBatch {
            owner,
            account_id,
            checksum: checksum.to_string(),
            rows,
        })
    }

    /// Rows with category names for the review screen. Ids the rule set
    /// no longer knows are shown under the fallback's name.
    pub fn preview(&self, rules: &crate::rules::CompiledRuleSet) -> Vec<PreviewRow> {
        self.rows
            .iter()
            .map(|row| PreviewRow {
                row_index: row.row_index,
                date: row.date,
                description: row.description.clone(),
                amount: row.amount,
                category_id: row.category_id,
                category: rules
                    .category_name(row.category_id)
                    .unwrap_or_else(|| rules.fallback_name())
                    .to_string(),
            })
            .collect()
    }

    /// Turns the batch into ledger rows. Dropping the batch instead
    /// discards the upload.
    pub fn confirm(self) -> Vec<NewTransaction> {
        self.rows.into_iter().map(NewTransaction::from).collect()
    }
}
