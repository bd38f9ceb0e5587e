use serde::{Deserialize, Serialize};
use sift_core::{ColumnSchema, RuleSet, RuleSetError, SchemaError, UserId};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid parse rule: {0}")]
    Schema(#[from] SchemaError),
    #[error("Invalid category rules: {0}")]
    RuleSet(#[from] RuleSetError),
    #[error("Parse rule belongs to user {schema_owner} but the category rules belong to user {rules_owner}")]
    OwnerMismatch {
        schema_owner: UserId,
        rules_owner: UserId,
    },
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn check_owner(schema: &ColumnSchema, rules_owner: UserId) -> Result<(), ConfigurationError> {
    if schema.owner == rules_owner {
        Ok(())
    } else {
        Err(ConfigurationError::OwnerMismatch {
            schema_owner: schema.owner,
            rules_owner,
        })
    }
}

/// A parse rule and the category rules it is used with, as one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub schema: ColumnSchema,
    pub rules: RuleSet,
}

impl Profile {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigurationError> {
        let profile: Profile = toml::from_str(toml_content)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.schema.validate()?;
        self.rules.validate()?;
        check_owner(&self.schema, self.rules.owner)
    }
}
