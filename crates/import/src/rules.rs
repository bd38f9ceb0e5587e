use regex::Regex;
use sift_core::{CategoryId, MatchRule, MatchType, RuleSet, UserId, FALLBACK_CATEGORY_NAME};
use tracing::{debug, warn};

/// A rule with its match text prepared for evaluation.
#[derive(Debug, Clone)]
enum Matcher {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    /// `None` when the pattern failed to compile; it never matches.
    Regex(Option<Regex>),
}

impl Matcher {
    fn compile(rule: &MatchRule, category: &str) -> Self {
        let lowered = || rule.match_text.to_lowercase();
        match rule.match_type {
            MatchType::Equals => Matcher::Equals(lowered()),
            MatchType::Contains => Matcher::Contains(lowered()),
            MatchType::StartsWith => Matcher::StartsWith(lowered()),
            MatchType::EndsWith => Matcher::EndsWith(lowered()),
            MatchType::Regex => match Regex::new(&rule.match_text) {
                Ok(re) => Matcher::Regex(Some(re)),
                Err(e) => {
                    warn!(category, pattern = %rule.match_text, error = %e, "regex rule does not compile, treating as no match");
                    Matcher::Regex(None)
                }
            },
        }
    }

    /// `lowered` must be `description.to_lowercase()`.
    fn matches(&self, description: &str, lowered: &str) -> bool {
        match self {
            Matcher::Equals(text) => lowered == text,
            Matcher::Contains(text) => lowered.contains(text.as_str()),
            Matcher::StartsWith(text) => lowered.starts_with(text.as_str()),
            Matcher::EndsWith(text) => lowered.ends_with(text.as_str()),
            Matcher::Regex(re) => re.as_ref().is_some_and(|re| re.is_match(description)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledCategory {
    pub id: CategoryId,
    pub name: String,
    pub priority: i32,
    matchers: Vec<Matcher>,
}

impl CompiledCategory {
    pub fn rule_count(&self) -> usize {
        self.matchers.len()
    }

    fn matches(&self, description: &str, lowered: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(description, lowered))
    }
}

/// Immutable snapshot of a user's categories in evaluation order.
///
/// Compile once per batch and share it across every row of that batch;
/// later edits to the source `RuleSet` are not visible through it.
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    owner: UserId,
    categories: Vec<CompiledCategory>,
    fallback_id: CategoryId,
    fallback_name: String,
}

impl CompiledRuleSet {
    pub fn compile(set: &RuleSet) -> Self {
        let (fallback_id, fallback_name) = match set.fallback() {
            Some(fallback) => {
                if !fallback.rules.is_empty() {
                    warn!(category = %fallback.name, "ignoring rules attached to the fallback category");
                }
                (fallback.id, fallback.name.clone())
            }
            None => {
                warn!(owner = %set.owner, "rule set has no fallback category, using the built-in one");
                (CategoryId::UNCATEGORIZED, FALLBACK_CATEGORY_NAME.to_string())
            }
        };

        let mut categories: Vec<CompiledCategory> = set
            .categories
            .iter()
            .filter(|c| !c.is_fallback)
            .map(|c| CompiledCategory {
                id: c.id,
                name: c.name.clone(),
                priority: c.priority,
                matchers: c.rules.iter().map(|r| Matcher::compile(r, &c.name)).collect(),
            })
            .collect();
        // Lowest priority value first; stable so equal keys keep input order.
        categories.sort_by_key(|c| (c.priority, c.id));

        debug!(owner = %set.owner, categories = categories.len(), "compiled rule set");

        Self {
            owner: set.owner,
            categories,
            fallback_id,
            fallback_name,
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn fallback_id(&self) -> CategoryId {
        self.fallback_id
    }

    /// Categories in the order they are evaluated, fallback excluded.
    pub fn categories(&self) -> &[CompiledCategory] {
        &self.categories
    }

    /// Returns the first category, by priority, with any rule matching
    /// `description`, or the fallback when none does.
    pub fn categorize(&self, description: &str) -> CategoryId {
        let lowered = description.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.matches(description, &lowered))
            .map_or(self.fallback_id, |c| c.id)
    }

    pub fn category_name(&self, id: CategoryId) -> Option<&str> {
        if id == self.fallback_id {
            return Some(&self.fallback_name);
        }
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    pub fn fallback_name(&self) -> &str {
        &self.fallback_name
    }
}
