use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::ids::{CategoryId, UserId};

pub const FALLBACK_CATEGORY_NAME: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Equals,
    #[default]
    Contains,
    Regex,
    StartsWith,
    EndsWith,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Equals => write!(f, "equals"),
            MatchType::Contains => write!(f, "contains"),
            MatchType::Regex => write!(f, "regex"),
            MatchType::StartsWith => write!(f, "starts_with"),
            MatchType::EndsWith => write!(f, "ends_with"),
        }
    }
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equals" => Ok(MatchType::Equals),
            "contains" => Ok(MatchType::Contains),
            "regex" => Ok(MatchType::Regex),
            "starts_with" => Ok(MatchType::StartsWith),
            "ends_with" => Ok(MatchType::EndsWith),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    pub match_text: String,
    #[serde(default)]
    pub match_type: MatchType,
}

impl MatchRule {
    pub fn new(match_type: MatchType, match_text: &str) -> Self {
        MatchRule {
            match_text: match_text.to_string(),
            match_type,
        }
    }
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "if {} '{}'", self.match_type, self.match_text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Lower values are evaluated first.
    pub priority: i32,
    /// Display grouping only; matching never looks at it.
    #[serde(default)]
    pub parent: Option<CategoryId>,
    #[serde(default)]
    pub is_fallback: bool,
    #[serde(default)]
    pub rules: Vec<MatchRule>,
}

impl Category {
    pub fn new(id: CategoryId, name: &str, priority: i32) -> Self {
        Category {
            id,
            name: name.to_string(),
            priority,
            parent: None,
            is_fallback: false,
            rules: Vec::new(),
        }
    }

    pub fn fallback(id: CategoryId) -> Self {
        Category {
            is_fallback: true,
            ..Category::new(id, FALLBACK_CATEGORY_NAME, i32::MAX)
        }
    }

    pub fn with_rule(mut self, match_type: MatchType, match_text: &str) -> Self {
        self.rules.push(MatchRule::new(match_type, match_text));
        self
    }
}

/// All categories belonging to one user, as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub owner: UserId,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetError {
    #[error("Category name '{0}' is used more than once")]
    DuplicateCategoryName(String),
    #[error("Only one fallback category is allowed")]
    MultipleFallbacks,
    #[error("Fallback category '{0}' cannot own rules")]
    FallbackHasRules(String),
    #[error("Invalid regex '{pattern}' in category '{category}': {reason}")]
    InvalidRegex {
        category: String,
        pattern: String,
        reason: String,
    },
}

impl RuleSet {
    pub fn new(owner: UserId, categories: Vec<Category>) -> Self {
        RuleSet { owner, categories }
    }

    pub fn fallback(&self) -> Option<&Category> {
        self.categories.iter().find(|c| c.is_fallback)
    }

    /// Checks applied when a user saves their categories.
    pub fn validate(&self) -> Result<(), RuleSetError> {
        let mut names = HashSet::new();
        let mut fallbacks = 0;

        for category in &self.categories {
            if !names.insert(category.name.as_str()) {
                return Err(RuleSetError::DuplicateCategoryName(category.name.clone()));
            }

            if category.is_fallback {
                fallbacks += 1;
                if fallbacks > 1 {
                    return Err(RuleSetError::MultipleFallbacks);
                }
                if !category.rules.is_empty() {
                    return Err(RuleSetError::FallbackHasRules(category.name.clone()));
                }
            }

            for rule in &category.rules {
                if rule.match_type == MatchType::Regex {
                    regex::Regex::new(&rule.match_text).map_err(|e| RuleSetError::InvalidRegex {
                        category: category.name.clone(),
                        pattern: rule.match_text.clone(),
                        reason: e.to_string(),
                    })?;
                }
            }
        }

        Ok(())
    }
}
