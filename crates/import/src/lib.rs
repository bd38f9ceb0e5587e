pub mod config;
pub mod csv;
pub mod recategorize;
pub mod rules;
pub mod staging;
pub(crate) mod util;

pub use crate::config::{ConfigurationError, Profile};
pub use crate::csv::{validate_row, ParseEngine, ParseError, ParseReport, ValidatedRow};
pub use crate::recategorize::{recategorize, CategoryChange, RecategorizePlan};
pub use crate::rules::{CompiledCategory, CompiledRuleSet};
pub use crate::staging::{PreviewRow, StagedBatch, StagingError};
pub use crate::util::decode_upload;

pub mod import {
    use crate::*;
    use sift_core::{ColumnSchema, ParsedRow, RuleSet};

    /// Compiles `rules` and parses one upload against it.
    pub fn parse_upload(
        schema: &ColumnSchema,
        rules: &RuleSet,
        data: &[u8],
    ) -> Result<Vec<ParsedRow>, ParseError> {
        let compiled = CompiledRuleSet::compile(rules);
        ParseEngine::new(&compiled).parse_bytes(schema, data)
    }

    pub fn stage_upload(
        schema: &ColumnSchema,
        rules: &RuleSet,
        data: &[u8],
    ) -> Result<StagedBatch, ParseError> {
        let compiled = CompiledRuleSet::compile(rules);
        StagedBatch::stage(&ParseEngine::new(&compiled), schema, data)
    }
}
