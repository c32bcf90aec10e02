//! Validation and normalization of candidate entries returned by the model.

use log::{debug, info};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::currency::{Conversion, CurrencyTable};
use crate::rules::FiscalRules;
use crate::schema::{
    CandidateEntry, IncomeEntry, Warning, WarningKind, FIELD_AMOUNT_SOURCE, FIELD_CODE,
    FIELD_DESCRIPTION, FIELD_FORM, FIELD_NOTES, FIELD_SOURCE_CURRENCY, FIELD_TAXABLE_FRANCE,
    FIELD_TAXABLE_SOURCE, REQUIRED_FIELDS,
};
use crate::taxonomy::{Classification, Taxonomy};
use crate::utils::{
    coerce_decimal, decimal_from_number, display_value, normalize_code, value_as_text,
};

/// Everything the validator reads during a run. None of it is mutated.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub rates: &'a CurrencyTable,
    pub taxonomy: &'a Taxonomy,
    pub rules: &'a FiscalRules,
}

/// Validates candidates in order, returning the kept entries and every warning raised.
///
/// Entries missing a required field are dropped with one warning each. Every other anomaly
/// leaves the entry in the result with a defaulted or blank value.
pub fn validate_entries(
    candidates: &[CandidateEntry],
    ctx: ValidationContext<'_>,
) -> (Vec<IncomeEntry>, Vec<Warning>) {
    let mut entries = Vec::with_capacity(candidates.len());
    let mut warnings = Vec::new();

    for candidate in candidates {
        if let Some(entry) = validate_entry(candidate, ctx, &mut warnings) {
            entries.push(entry);
        }
    }

    info!(
        "Validated {} of {} candidate entries ({} warnings)",
        entries.len(),
        candidates.len(),
        warnings.len()
    );
    (entries, warnings)
}

/// Validates one candidate, pushing warnings as it goes. Returns `None` when required
/// fields are missing.
pub fn validate_entry(
    candidate: &CandidateEntry,
    ctx: ValidationContext<'_>,
    warnings: &mut Vec<Warning>,
) -> Option<IncomeEntry> {
    let empty = Map::new();
    let fields = candidate.as_object().unwrap_or(&empty);
    let label = fields
        .get(FIELD_DESCRIPTION)
        .and_then(value_as_text)
        .unwrap_or_else(|| "Unknown".to_string());

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| fields.get(*field).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        warnings.push(Warning::new(
            WarningKind::MissingFields,
            format!(
                "Entry '{}' is missing required fields: {}",
                label,
                missing.join(", ")
            ),
        ));
        return None;
    }

    let description = text_field(fields, FIELD_DESCRIPTION);
    let form = text_field(fields, FIELD_FORM).trim().to_string();
    let code = normalize_code(&text_field(fields, FIELD_CODE));
    let source_currency = text_field(fields, FIELD_SOURCE_CURRENCY)
        .trim()
        .to_uppercase();

    let raw_amount = fields.get(FIELD_AMOUNT_SOURCE).unwrap_or(&Value::Null);
    let amount_source = number_from_value(raw_amount).unwrap_or_else(|| {
        warnings.push(Warning::new(
            WarningKind::UnparseableNumber,
            format!(
                "Could not convert amount '{}' for '{}' to a number",
                display_value(raw_amount),
                label
            ),
        ));
        Decimal::ZERO
    });

    let amount_eur = match ctx.rates.convert(amount_source, &source_currency) {
        Conversion::Unavailable(amount) => {
            warnings.push(Warning::new(
                WarningKind::UnknownCurrency,
                format!(
                    "Unknown currency '{}' for '{}'. Using 1:1 exchange rate.",
                    source_currency, label
                ),
            ));
            amount
        }
        conversion => conversion.amount(),
    };

    let taxable_france = optional_amount(fields, FIELD_TAXABLE_FRANCE, &label, warnings);
    let taxable_source_country = optional_amount(fields, FIELD_TAXABLE_SOURCE, &label, warnings);

    let (valid_code, code_description) = match ctx.taxonomy.classify(&form, &code) {
        Classification::Known { description } => (true, description.to_string()),
        Classification::UnknownCode => {
            warnings.push(Warning::new(
                WarningKind::UnknownCode,
                format!("Unknown code '{}' for form '{}' - '{}'", code, form, label),
            ));
            (false, String::new())
        }
        Classification::UnknownForm => {
            warnings.push(Warning::new(
                WarningKind::UnknownForm,
                format!("Unknown form '{}' for '{}'", form, label),
            ));
            (false, String::new())
        }
    };

    let notes = fields
        .get(FIELD_NOTES)
        .and_then(value_as_text)
        .unwrap_or_default();

    let mut entry = IncomeEntry {
        description,
        form,
        code,
        code_description,
        source_currency,
        amount_source,
        amount_eur,
        taxable_france,
        taxable_source_country,
        notes,
        valid_code,
        abatement: None,
    };
    ctx.rules.apply(&mut entry);

    debug!(
        "{} -> {}/{} {} {} = {} EUR",
        entry.description,
        entry.form,
        entry.code,
        entry.amount_source,
        entry.source_currency,
        entry.amount_eur
    );
    Some(entry)
}

fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .map(|value| value_as_text(value).unwrap_or_else(|| display_value(value)))
        .unwrap_or_default()
}

fn number_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => decimal_from_number(n),
        Value::String(s) => coerce_decimal(s),
        _ => None,
    }
}

/// Reads a taxable amount. Absent, null and blank values are `None` without a warning.
fn optional_amount(
    fields: &Map<String, Value>,
    key: &str,
    label: &str,
    warnings: &mut Vec<Warning>,
) -> Option<Decimal> {
    let value = fields.get(key)?;
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => {
            let parsed = number_from_value(other);
            if parsed.is_none() {
                warnings.push(Warning::new(
                    WarningKind::UnparseableNumber,
                    format!(
                        "Could not convert {} '{}' for '{}' to a number",
                        key,
                        display_value(other),
                        label
                    ),
                ));
            }
            parsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(candidates: Vec<Value>) -> (Vec<IncomeEntry>, Vec<Warning>) {
        let rates = CurrencyTable::default();
        let taxonomy = Taxonomy::standard();
        let rules = FiscalRules::standard();
        validate_entries(
            &candidates,
            ValidationContext {
                rates: &rates,
                taxonomy: &taxonomy,
                rules: &rules,
            },
        )
    }

    #[test]
    fn test_gbp_pension_is_converted_and_classified() {
        let (entries, warnings) = run(vec![json!({
            "Description": "UK Civil Service Pension",
            "Form": " 2047 ",
            "Code": "1ag",
            "Source Currency": "gbp",
            "Amount (Source)": 9351,
            "Amount (€)": 1,
            "Taxable in France (€)": "",
            "Taxable in Source Country (€)": 11045.52,
            "Notes": "Exempt in France"
        })]);

        assert!(warnings.is_empty(), "{:?}", warnings);
        let entry = &entries[0];
        assert_eq!(entry.form, "2047");
        assert_eq!(entry.code, "1AG");
        assert_eq!(entry.source_currency, "GBP");
        assert_eq!(entry.amount_eur, Decimal::new(1104540, 2));
        assert!(entry.valid_code);
        assert!(!entry.code_description.is_empty());
        assert_eq!(entry.taxable_france, None);
        assert_eq!(entry.taxable_source_country, Some(Decimal::new(1104552, 2)));
    }

    #[test]
    fn test_missing_fields_drop_entry_with_one_warning() {
        let (entries, warnings) = run(vec![
            json!({"Description": "Salary", "Form": "2042", "Code": null}),
            json!("not an object"),
        ]);

        assert!(entries.is_empty());
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[0].message,
            "Entry 'Salary' is missing required fields: Code, Source Currency, Amount (Source)"
        );
        assert_eq!(warnings[1].kind, WarningKind::MissingFields);
        assert!(warnings[1].message.starts_with("Entry 'Unknown'"));
    }

    #[test]
    fn test_locale_tolerant_amounts() {
        let (entries, warnings) = run(vec![json!({
            "Description": "Salaire",
            "Form": 2042,
            "Code": "1 aj",
            "Source Currency": "EUR",
            "Amount (Source)": "32 150,75",
            "Taxable in France (€)": "32 150,75"
        })]);

        assert!(warnings.is_empty());
        assert_eq!(entries[0].form, "2042");
        assert_eq!(entries[0].code, "1AJ");
        assert_eq!(entries[0].amount_source, Decimal::new(3215075, 2));
        assert_eq!(entries[0].amount_eur, entries[0].amount_source);
        assert_eq!(entries[0].taxable_france, Some(Decimal::new(3215075, 2)));
    }

    #[test]
    fn test_unparseable_numbers_default_and_warn() {
        let (entries, warnings) = run(vec![json!({
            "Description": "Dividends",
            "Form": "2042",
            "Code": "2DC",
            "Source Currency": "EUR",
            "Amount (Source)": "about 400",
            "Taxable in France (€)": "n/a"
        })]);

        assert_eq!(entries[0].amount_source, Decimal::ZERO);
        assert_eq!(entries[0].amount_eur, Decimal::ZERO);
        assert_eq!(entries[0].taxable_france, None);
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[0].message,
            "Could not convert amount 'about 400' for 'Dividends' to a number"
        );
        assert_eq!(
            warnings[1].message,
            "Could not convert Taxable in France (€) 'n/a' for 'Dividends' to a number"
        );
    }

    #[test]
    fn test_unknown_currency_falls_back_with_warning() {
        let (entries, warnings) = run(vec![json!({
            "Description": "Japanese royalties",
            "Form": "2047",
            "Code": "2AB",
            "Source Currency": "JPY",
            "Amount (Source)": 100000
        })]);

        assert_eq!(entries[0].amount_eur, Decimal::new(100000, 0));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnknownCurrency);
        assert_eq!(
            warnings[0].message,
            "Unknown currency 'JPY' for 'Japanese royalties'. Using 1:1 exchange rate."
        );
    }

    #[test]
    fn test_unknown_code_and_form_are_kept_flagged() {
        let (entries, warnings) = run(vec![
            json!({"Description": "Mystery", "Form": "2042", "Code": "9ZZ",
                   "Source Currency": "EUR", "Amount (Source)": 10}),
            json!({"Description": "Other", "Form": "9999", "Code": "1AJ",
                   "Source Currency": "EUR", "Amount (Source)": 10}),
        ]);

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| !e.valid_code && e.code_description.is_empty()));
        assert_eq!(warnings[0].message, "Unknown code '9ZZ' for form '2042' - 'Mystery'");
        assert_eq!(warnings[1].kind, WarningKind::UnknownForm);
        assert_eq!(warnings[1].message, "Unknown form '9999' for 'Other'");
    }

    #[test]
    fn test_5te_rule_applied_during_validation() {
        let (entries, _) = run(vec![json!({
            "Description": "Chambre d'Hôte Income",
            "Form": "2042",
            "Code": "5TE",
            "Source Currency": "EUR",
            "Amount (Source)": 7387,
            "Taxable in France (€)": 7387,
            "Notes": "Micro-BIC regime"
        })]);

        let abatement = entries[0].abatement.as_ref().unwrap();
        assert_eq!(abatement.amount, Decimal::new(524477, 2));
        assert_eq!(abatement.taxable_after, Decimal::new(214223, 2));
        assert!(entries[0].notes.ends_with(" Micro-BIC regime, 71% abatement applies."));
    }
}
