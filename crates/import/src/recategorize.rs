use serde::Serialize;
use sift_core::{CategoryId, StoredTransaction, TransactionId};
use std::collections::HashMap;
use tracing::debug;

use crate::rules::CompiledRuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryChange {
    pub transaction_id: TransactionId,
    pub from: CategoryId,
    pub to: CategoryId,
}

/// The full set of category changes implied by a rule set. Callers write
/// it under one storage transaction so that it lands entirely or not at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecategorizePlan {
    pub changes: Vec<CategoryChange>,
    pub unchanged: usize,
    pub skipped_overrides: usize,
}

impl RecategorizePlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Applies every change to `transactions`; ids not present are ignored.
    /// Returns the number of rows updated.
    pub fn apply(&self, transactions: &mut [StoredTransaction]) -> usize {
        let targets: HashMap<TransactionId, CategoryId> = self
            .changes
            .iter()
            .map(|c| (c.transaction_id, c.to))
            .collect();

        let mut updated = 0;
        for tx in transactions.iter_mut().filter(|tx| !tx.category_override) {
            if let Some(to) = targets.get(&tx.id) {
                tx.category_id = *to;
                updated += 1;
            }
        }
        updated
    }
}

/// Recomputes categories for stored transactions. Rows the user
/// categorized by hand are never touched.
pub fn recategorize(rules: &CompiledRuleSet, transactions: &[StoredTransaction]) -> RecategorizePlan {
    let mut plan = RecategorizePlan::default();

    for tx in transactions {
        if tx.category_override {
            plan.skipped_overrides += 1;
            continue;
        }
        let to = rules.categorize(&tx.description);
        if to == tx.category_id {
            plan.unchanged += 1;
        } else {
            plan.changes.push(CategoryChange {
                transaction_id: tx.id,
                from: tx.category_id,
                to,
            });
        }
    }

    debug!(
        changed = plan.changes.len(),
        unchanged = plan.unchanged,
        skipped_overrides = plan.skipped_overrides,
        "recategorized transactions"
    );
    plan
}
