//! Special fiscal treatments keyed by (form, code).

use log::debug;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::{Abatement, IncomeEntry};
use crate::utils::round_currency;

/// A treatment applied to every validated entry carrying a given form and code.
pub trait FiscalRule: Send + Sync {
    fn name(&self) -> &str;

    /// Mutates the entry in place. Called after normalization, conversion and classification.
    fn apply(&self, entry: &mut IncomeEntry);
}

/// Flat-rate abatement on the France-taxable amount (micro-enterprise regimes).
#[derive(Debug, Clone)]
pub struct AbatementRule {
    pub rate: Decimal,
    pub note: String,
}

impl AbatementRule {
    /// 71% abatement for chambre d'hôte / classified furnished tourist rentals (2042, 5TE).
    pub fn micro_bic_tourism() -> Self {
        Self {
            rate: Decimal::new(71, 2),
            note: "Micro-BIC regime, 71% abatement applies.".to_string(),
        }
    }
}

impl FiscalRule for AbatementRule {
    fn name(&self) -> &str {
        "flat-rate abatement"
    }

    fn apply(&self, entry: &mut IncomeEntry) {
        let Some(raw) = entry.taxable_france else {
            return;
        };

        let amount = round_currency(raw * self.rate);
        let taxable_after = round_currency(raw * (Decimal::ONE - self.rate));
        entry.abatement = Some(Abatement {
            amount,
            taxable_after,
        });
        if entry.notes.is_empty() {
            entry.notes = self.note.clone();
        } else {
            entry.notes = format!("{} {}", entry.notes, self.note);
        }
    }
}

/// Registry of rules by (form, code). Lookups expect a trimmed form and a normalized code.
#[derive(Clone, Default)]
pub struct FiscalRules {
    rules: HashMap<(String, String), Arc<dyn FiscalRule>>,
}

impl FiscalRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The rules currently in force.
    pub fn standard() -> Self {
        Self::empty().with_rule("2042", "5TE", AbatementRule::micro_bic_tourism())
    }

    pub fn with_rule(mut self, form: &str, code: &str, rule: impl FiscalRule + 'static) -> Self {
        self.register(form, code, rule);
        self
    }

    pub fn register(&mut self, form: &str, code: &str, rule: impl FiscalRule + 'static) {
        self.rules
            .insert((form.to_string(), code.to_string()), Arc::new(rule));
    }

    pub fn get(&self, form: &str, code: &str) -> Option<&dyn FiscalRule> {
        self.rules
            .get(&(form.to_string(), code.to_string()))
            .map(|rule| rule.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies the rule registered for the entry's form and code, if any.
    pub fn apply(&self, entry: &mut IncomeEntry) -> bool {
        match self.get(&entry.form, &entry.code) {
            Some(rule) => {
                debug!(
                    "Applying {} to {} ({}/{})",
                    rule.name(),
                    entry.description,
                    entry.form,
                    entry.code
                );
                rule.apply(entry);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for FiscalRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.rules.keys().collect();
        keys.sort();
        f.debug_struct("FiscalRules").field("keys", &keys).finish()
    }
}
