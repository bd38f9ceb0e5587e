pub mod category;
pub mod ids;
pub mod schema;
pub mod transaction;

pub use category::{Category, MatchRule, MatchType, RuleSet, RuleSetError, FALLBACK_CATEGORY_NAME};
pub use ids::{AccountId, CategoryId, TransactionId, UserId};
pub use schema::{ColumnSchema, SchemaError};
pub use transaction::{NewTransaction, ParsedRow, StoredTransaction};
