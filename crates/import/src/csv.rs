use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sift_core::{ColumnSchema, ParsedRow};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::{check_owner, ConfigurationError};
use crate::rules::CompiledRuleSet;
use crate::util::decode_upload;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Error, number of CSV columns on line {row} does not match other rows (expected {expected}, found {found})")]
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Error parsing date '{value}' on line {row}")]
    DateParse { row: usize, value: String },
    #[error("The value ({value}) on line {row} column {column} is not a number. The amount column should only contain numbers")]
    AmountParse {
        row: usize,
        column: usize,
        value: String,
    },
    #[error("Indexing error present on line {row}: column {column} does not exist")]
    RowIndexing { row: usize, column: usize },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Upload is not valid UTF-8 (invalid byte at offset {valid_up_to})")]
    Decoding { valid_up_to: usize },
    #[error("Internal error while parsing upload")]
    Internal,
}

impl ParseError {
    /// The 1-based line number for row-level errors.
    pub fn row(&self) -> Option<usize> {
        match self {
            ParseError::ColumnCountMismatch { row, .. }
            | ParseError::DateParse { row, .. }
            | ParseError::AmountParse { row, .. }
            | ParseError::RowIndexing { row, .. } => Some(*row),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::ColumnCountMismatch { .. } => "column_count_mismatch",
            ParseError::DateParse { .. } => "date_parse_error",
            ParseError::AmountParse { .. } => "amount_parse_error",
            ParseError::RowIndexing { .. } => "row_indexing_error",
            ParseError::Configuration(_) => "configuration_error",
            ParseError::Decoding { .. } => "decoding_error",
            ParseError::Internal => "internal_error",
        }
    }
}

impl From<std::str::Utf8Error> for ParseError {
    fn from(e: std::str::Utf8Error) -> Self {
        ParseError::Decoding {
            valid_up_to: e.valid_up_to(),
        }
    }
}

impl From<csv::Error> for ParseError {
    fn from(e: csv::Error) -> Self {
        error!(error = %e, "csv reader failed");
        ParseError::Internal
    }
}

/// A row that passed validation but has not been categorized yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    pub row_index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub transaction_type: Option<String>,
}

/// Checks one record against `schema`. Column width consistency across
/// rows is the caller's concern (see `ColumnWidth`).
pub fn validate_row(
    schema: &ColumnSchema,
    row_index: usize,
    record: &StringRecord,
) -> Result<ValidatedRow, ParseError> {
    if let Some((_, column)) = schema
        .columns()
        .into_iter()
        .find(|(_, col)| *col >= record.len())
    {
        return Err(ParseError::RowIndexing {
            row: row_index,
            column,
        });
    }
    let field = |col: usize| record.get(col).unwrap_or_default();

    let raw_date = field(schema.date_column);
    let date = parse_date(raw_date, &schema.date_format).ok_or_else(|| ParseError::DateParse {
        row: row_index,
        value: raw_date.to_string(),
    })?;

    let raw_amount = field(schema.amount_column);
    let mut amount = parse_amount(raw_amount).ok_or_else(|| ParseError::AmountParse {
        row: row_index,
        column: schema.amount_column,
        value: raw_amount.to_string(),
    })?;
    if schema.negate_amount {
        amount = -amount;
    }

    let mut description = field(schema.description_column).trim().to_string();
    if let Some(col) = schema.sub_description_column {
        let sub = field(col).trim();
        if !sub.is_empty() {
            description.push(' ');
            description.push_str(sub);
        }
    }

    let transaction_type = schema
        .transaction_type_column
        .map(|col| field(col).trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(ValidatedRow {
        row_index,
        date,
        description,
        amount,
        transaction_type,
    })
}

fn parse_date(s: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), format).ok()
}

/// Strips `$` and `,` and parses what is left as a plain decimal number.
/// Exponent notation is not accepted.
fn parse_amount(s: &str) -> Option<f64> {
    let cleaned = s.replace(['$', ','], "");
    if cleaned.contains(['e', 'E']) {
        return None;
    }
    let dec = Decimal::from_str(cleaned.trim()).ok()?;
    dec.to_f64()
}

/// Drops the first `count` lines of `content`, blank ones included.
fn skip_lines(content: &str, count: usize) -> (&str, usize) {
    let mut offset = 0;
    let mut skipped = 0;
    for line in content.split_inclusive('\n').take(count) {
        offset += line.len();
        skipped += 1;
    }
    (&content[offset..], skipped)
}

/// 1-based line of `body` on which `record`'s first field starts. The
/// reader positions a record before any blank lines it passed over.
fn record_line(body: &str, record: &StringRecord) -> usize {
    let Some(pos) = record.position() else {
        return 0;
    };
    let start = pos.byte() as usize;
    let blank = body
        .as_bytes()
        .get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .filter(|&&b| b == b'\n')
        .count();
    pos.line() as usize + blank
}

/// Tracks the field count established by the first data row.
#[derive(Debug, Default)]
struct ColumnWidth(Option<usize>);

impl ColumnWidth {
    fn check(&mut self, row: usize, found: usize) -> Result<(), ParseError> {
        match self.0 {
            Some(expected) if expected != found => Err(ParseError::ColumnCountMismatch {
                row,
                expected,
                found,
            }),
            Some(_) => Ok(()),
            None => {
                if found != 0 {
                    self.0 = Some(found);
                }
                Ok(())
            }
        }
    }
}

/// Outcome of a collect-all-errors parse.
#[derive(Debug, Default)]
pub struct ParseReport {
    pub rows: Vec<ParsedRow>,
    pub errors: Vec<ParseError>,
}

impl ParseReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs validation and categorization over a whole upload.
pub struct ParseEngine<'a> {
    rules: &'a CompiledRuleSet,
}

impl<'a> ParseEngine<'a> {
    pub fn new(rules: &'a CompiledRuleSet) -> Self {
        Self { rules }
    }

    /// Parses `content`, stopping at the first invalid row. No rows are
    /// returned when any row fails.
    pub fn parse(&self, schema: &ColumnSchema, content: &str) -> Result<Vec<ParsedRow>, ParseError> {
        self.run(schema, content, true).map(|report| report.rows)
    }

    pub fn parse_bytes(&self, schema: &ColumnSchema, data: &[u8]) -> Result<Vec<ParsedRow>, ParseError> {
        let content = decode_upload(data)?;
        self.parse(schema, content)
    }

    /// Parses every row, reporting invalid ones instead of stopping.
    /// Configuration and decoding problems are still returned as `Err`.
    pub fn parse_collecting(&self, schema: &ColumnSchema, content: &str) -> Result<ParseReport, ParseError> {
        self.run(schema, content, false)
    }

    fn run(&self, schema: &ColumnSchema, content: &str, abort: bool) -> Result<ParseReport, ParseError> {
        schema.validate().map_err(ConfigurationError::from)?;
        check_owner(schema, self.rules.owner())?;

        let delimiter = schema.delimiter_byte().map_err(ConfigurationError::from)?;
        let (body, skipped) = skip_lines(content, schema.header_skip_count);
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(body.as_bytes());

        let mut report = ParseReport::default();
        let mut width = ColumnWidth::default();

        for result in reader.records() {
            let record = result?;
            let row_index = skipped + record_line(body, &record);

            if record.is_empty() {
                continue;
            }

            let row = width
                .check(row_index, record.len())
                .and_then(|()| validate_row(schema, row_index, &record));

            match row {
                Ok(row) => report.rows.push(self.categorize(schema, row)),
                Err(e) if abort => return Err(e),
                Err(e) => report.errors.push(e),
            }
        }

        debug!(
            account = %schema.account_id,
            rows = report.rows.len(),
            errors = report.errors.len(),
            "parsed upload"
        );
        Ok(report)
    }

    fn categorize(&self, schema: &ColumnSchema, row: ValidatedRow) -> ParsedRow {
        ParsedRow {
            category_id: self.rules.categorize(&row.description),
            row_index: row.row_index,
            date: row.date,
            description: row.description,
            amount: row.amount,
            account_id: schema.account_id,
            transaction_type: row.transaction_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::{AccountId, Category, CategoryId, MatchType, RuleSet, UserId};

    fn rules() -> CompiledRuleSet {
        CompiledRuleSet::compile(&RuleSet::new(
            UserId(1),
            vec![
                Category::new(CategoryId(1), "Coffee", 1).with_rule(MatchType::Contains, "coffee"),
                Category::new(CategoryId(2), "Shopping", 2).with_rule(MatchType::StartsWith, "AMZN"),
                Category::fallback(CategoryId(99)),
            ],
        ))
    }

    fn schema() -> ColumnSchema {
        ColumnSchema::new(UserId(1), AccountId(5), "%Y-%m-%d")
    }

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_plain() {
        assert_eq!(parse_amount("123.45"), Some(123.45));
    }

    #[test]
    fn parse_amount_strips_symbols() {
        assert_eq!(parse_amount("$1,234.56"), Some(1234.56));
        assert_eq!(parse_amount(" -$5.00 "), Some(-5.0));
    }

    #[test]
    fn parse_amount_rejects_non_numbers() {
        assert_eq!(parse_amount("not_a_number"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("$"), None);
        assert_eq!(parse_amount("nan"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("1e5"), None);
        assert_eq!(parse_amount("2.5E-3"), None);
    }

    #[test]
    fn parse_amount_leaves_other_separators_alone() {
        // 1.234,56 strips to "1.23456"; only `$` and `,` are removed.
        assert_eq!(parse_amount("1.234,56"), Some(1.23456));
        assert_eq!(parse_amount("€12.00"), None);
    }

    // ── validate_row ──────────────────────────────────────────────────────────

    #[test]
    fn validate_row_builds_clean_row() {
        let row = validate_row(&schema(), 1, &record(&["2024-01-15", "  STARBUCKS  ", "-5.25"])).unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(row.description, "STARBUCKS");
        assert_eq!(row.amount, -5.25);
        assert_eq!(row.transaction_type, None);
    }

    #[test]
    fn validate_row_negates_amount() {
        let s = ColumnSchema {
            negate_amount: true,
            ..schema()
        };
        let row = validate_row(&s, 1, &record(&["2024-01-15", "x", "$1,234.56"])).unwrap();
        assert_eq!(row.amount, -1234.56);
    }

    #[test]
    fn validate_row_joins_sub_description() {
        let s = ColumnSchema {
            sub_description_column: Some(3),
            ..schema()
        };
        let row = validate_row(&s, 1, &record(&["2024-01-15", " POS ", "1", " COFFEE CO "])).unwrap();
        assert_eq!(row.description, "POS COFFEE CO");
    }

    #[test]
    fn validate_row_skips_blank_sub_description() {
        let s = ColumnSchema {
            sub_description_column: Some(3),
            ..schema()
        };
        let row = validate_row(&s, 1, &record(&["2024-01-15", "POS", "1", "  "])).unwrap();
        assert_eq!(row.description, "POS");
    }

    #[test]
    fn validate_row_carries_transaction_type() {
        let s = ColumnSchema {
            transaction_type_column: Some(3),
            ..schema()
        };
        let row = validate_row(&s, 1, &record(&["2024-01-15", "x", "1", " DEBIT "])).unwrap();
        assert_eq!(row.transaction_type.as_deref(), Some("DEBIT"));
    }

    #[test]
    fn validate_row_bad_date() {
        let err = validate_row(&schema(), 4, &record(&["01/15/2024", "x", "1"])).unwrap_err();
        assert!(matches!(err, ParseError::DateParse { row: 4, ref value } if value == "01/15/2024"));
    }

    #[test]
    fn validate_row_bad_amount() {
        let err = validate_row(&schema(), 3, &record(&["2024-01-15", "x", "abc"])).unwrap_err();
        assert!(matches!(
            err,
            ParseError::AmountParse { row: 3, column: 2, ref value } if value == "abc"
        ));
    }

    #[test]
    fn validate_row_short_row_is_indexing_error() {
        let s = ColumnSchema {
            sub_description_column: Some(5),
            ..schema()
        };
        let err = validate_row(&s, 2, &record(&["2024-01-15", "x", "1"])).unwrap_err();
        assert!(matches!(err, ParseError::RowIndexing { row: 2, column: 5 }));
    }

    #[test]
    fn validate_row_indexing_checked_before_date() {
        let err = validate_row(&schema(), 2, &record(&["not a date", "x"])).unwrap_err();
        assert!(matches!(err, ParseError::RowIndexing { row: 2, column: 2 }));
    }

    // ── ColumnWidth ───────────────────────────────────────────────────────────

    #[test]
    fn zero_width_does_not_fix_expected_count() {
        let mut width = ColumnWidth::default();
        assert!(width.check(1, 0).is_ok());
        assert!(width.check(2, 3).is_ok());
        assert!(matches!(
            width.check(3, 4),
            Err(ParseError::ColumnCountMismatch { row: 3, expected: 3, found: 4 })
        ));
    }

    // ── ParseEngine ───────────────────────────────────────────────────────────

    #[test]
    fn parse_basic_file() {
        let rules = rules();
        let data = "2024-01-15,COFFEE SHOP,4.50\n2024-01-16,amzn marketplace,19.99\n2024-01-17,RENT,1500\n";
        let rows = ParseEngine::new(&rules).parse(&schema(), data).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].category_id, CategoryId(1));
        assert_eq!(rows[1].category_id, CategoryId(2));
        assert_eq!(rows[2].category_id, CategoryId(99));
        assert_eq!(rows[2].account_id, AccountId(5));
        assert_eq!(rows.iter().map(|r| r.row_index).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn parse_skips_header_rows() {
        let rules = rules();
        let s = ColumnSchema {
            header_skip_count: 2,
            ..schema()
        };
        let data = "Bank export\nDate,Description,Amount\n2024-01-15,COFFEE,4.50\n";
        let rows = ParseEngine::new(&rules).parse(&s, data).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_index, 3);
    }

    #[test]
    fn parse_header_block_with_blank_line() {
        let rules = rules();
        let s = ColumnSchema {
            header_skip_count: 3,
            ..schema()
        };
        let data = "Bank export\n\nDate,Description,Amount\n2024-01-15,COFFEE,4.50\n2024-01-16,TEA,1.00\n";
        let rows = ParseEngine::new(&rules).parse(&s, data).unwrap();
        let got: Vec<_> = rows.iter().map(|r| (r.row_index, r.description.as_str())).collect();
        assert_eq!(got, vec![(4, "COFFEE"), (5, "TEA")]);
    }

    #[test]
    fn parse_header_count_beyond_file_is_empty() {
        let rules = rules();
        let s = ColumnSchema {
            header_skip_count: 5,
            ..schema()
        };
        let rows = ParseEngine::new(&rules).parse(&s, "Date,Description,Amount\n").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn parse_row_numbers_count_blank_lines() {
        let rules = rules();
        let data = "2024-01-15,a,1\n\n2024-01-16,b,oops\n";
        let err = ParseEngine::new(&rules).parse(&schema(), data).unwrap_err();
        assert!(matches!(err, ParseError::AmountParse { row: 3, .. }));
    }

    #[test]
    fn parse_row_numbers_follow_source_lines() {
        let rules = rules();
        let s = ColumnSchema {
            header_skip_count: 1,
            ..schema()
        };
        let data = "Date,Description,Amount\r\n2024-01-15,\"COFFEE\nTO GO\",1\r\n\r\n2024-01-16,TEA,2\r\n";
        let rows = ParseEngine::new(&rules).parse(&s, data).unwrap();
        assert_eq!(rows.iter().map(|r| r.row_index).collect::<Vec<_>>(), vec![2, 5]);
    }

    #[test]
    fn parse_aborts_on_column_count_mismatch() {
        let rules = rules();
        let data = "2024-01-15,a,1,x\n2024-01-16,b,2\n2024-01-17,c,3,x\n";
        let err = ParseEngine::new(&rules).parse(&schema(), data).unwrap_err();
        assert!(matches!(
            err,
            ParseError::ColumnCountMismatch { row: 2, expected: 4, found: 3 }
        ));
        assert_eq!(err.row(), Some(2));
        assert_eq!(err.kind(), "column_count_mismatch");
    }

    #[test]
    fn parse_stops_at_first_error() {
        let rules = rules();
        let data = "2024-01-15,a,oops\n2024-13-45,b,2\n";
        let err = ParseEngine::new(&rules).parse(&schema(), data).unwrap_err();
        assert!(matches!(err, ParseError::AmountParse { row: 1, .. }));
    }

    #[test]
    fn parse_honours_delimiter_and_quotes() {
        let rules = rules();
        let s = ColumnSchema {
            delimiter: ';',
            ..schema()
        };
        let data = "2024-01-15;\"COFFEE; TO GO\";\"$1,000.00\"\n";
        let rows = ParseEngine::new(&rules).parse(&s, data).unwrap();
        assert_eq!(rows[0].description, "COFFEE; TO GO");
        assert_eq!(rows[0].amount, 1000.0);
    }

    #[test]
    fn parse_ignores_blank_trailing_lines() {
        let rules = rules();
        let data = "2024-01-15,COFFEE,4.50\n\n\n";
        let rows = ParseEngine::new(&rules).parse(&schema(), data).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn parse_empty_file_is_empty_result() {
        let rules = rules();
        let rows = ParseEngine::new(&rules).parse(&schema(), "").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn parse_rejects_invalid_schema() {
        let rules = rules();
        let s = ColumnSchema {
            amount_column: 0,
            ..schema()
        };
        let err = ParseEngine::new(&rules).parse(&s, "2024-01-15,x,1\n").unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
        assert_eq!(err.row(), None);
    }

    #[test]
    fn parse_rejects_foreign_rule_set() {
        let rules = rules();
        let s = ColumnSchema {
            owner: UserId(2),
            ..schema()
        };
        let err = ParseEngine::new(&rules).parse(&s, "2024-01-15,x,1\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Configuration(ConfigurationError::OwnerMismatch { .. })
        ));
    }

    #[test]
    fn parse_bytes_tolerates_bom() {
        let rules = rules();
        let rows = ParseEngine::new(&rules)
            .parse_bytes(&schema(), b"\xEF\xBB\xBF2024-01-15,COFFEE,4.50\n")
            .unwrap();
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn parse_bytes_rejects_invalid_utf8() {
        let rules = rules();
        let err = ParseEngine::new(&rules)
            .parse_bytes(&schema(), b"2024-01-15,\xFF,4.50\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::Decoding { valid_up_to: 11 }));
    }

    #[test]
    fn parse_collecting_reports_every_bad_row() {
        let rules = rules();
        let data = "2024-01-15,COFFEE,4.50\nbad-date,x,1\n2024-01-17,x\n2024-01-18,AMZN,oops\n2024-01-19,AMZN,3\n";
        let report = ParseEngine::new(&rules).parse_collecting(&schema(), data).unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[1].row_index, 5);
        assert_eq!(report.rows[1].category_id, CategoryId(2));
        let kinds: Vec<_> = report.errors.iter().map(|e| (e.kind(), e.row())).collect();
        assert_eq!(
            kinds,
            vec![
                ("date_parse_error", Some(2)),
                ("column_count_mismatch", Some(3)),
                ("amount_parse_error", Some(4)),
            ]
        );
    }

    #[test]
    fn parse_collecting_short_first_row_still_fixes_width() {
        let rules = rules();
        let data = "2024-01-15,x\n2024-01-16,COFFEE,1,extra\n2024-01-17,COFFEE,1,extra\n";
        let report = ParseEngine::new(&rules).parse_collecting(&schema(), data).unwrap();
        // Row 1 passes the width check and fails indexing; rows 2 and 3 disagree with its width.
        assert_eq!(report.errors.len(), 3);
    }
}
