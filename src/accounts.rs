//! Detection of bank accounts mentioned in client documents (Form 3916 material).

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TABLE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(name\s+of\s+institution|institution|bank).*?(account\s+number|account|number).*?(type|date\s+opened)",
    )
    .unwrap()
});

static COLUMN_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}|\t").unwrap());

static FREE_TEXT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:bank|institution)[\s:]+([^\n,]+)[\s,]*(?:account|number)[\s:]+([^\n,]+)",
        r"(?i)(Credit Agricole|HSBC|Santander|Barclays|Revolut)[\s\w]*?[\s:]+([A-Z0-9]{8,})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

const HEADER_LIKE_CELLS: &[&str] = &["name", "institution", "bank", "n/a", "active accounts"];

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub institution: String,
    pub account_number: String,
    pub account_type: String,
}

/// Finds bank accounts in document text.
///
/// Tables with an institution / account / type header row are read first. Only when no
/// table row yields an account are free-text mentions searched.
pub fn extract_bank_accounts(text: &str) -> Vec<BankAccount> {
    let mut accounts = accounts_from_tables(text);

    if accounts.is_empty() {
        for pattern in FREE_TEXT_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                accounts.push(BankAccount {
                    institution: caps[1].trim().to_string(),
                    account_number: caps[2].trim().to_string(),
                    account_type: UNKNOWN.to_string(),
                });
            }
        }
    }

    debug!("Detected {} bank accounts", accounts.len());
    accounts
}

fn accounts_from_tables(text: &str) -> Vec<BankAccount> {
    let mut accounts = Vec::new();
    let mut in_table = false;

    for line in text.lines() {
        if TABLE_HEADER.is_match(line) {
            in_table = true;
            continue;
        }
        if line.trim().is_empty() {
            in_table = false;
            continue;
        }
        if !in_table || line.split_whitespace().count() < 2 {
            continue;
        }

        let cells: Vec<&str> = COLUMN_SEPARATOR.split(line).collect();
        if cells.len() < 2 {
            continue;
        }

        let institution = cells[0].trim();
        if HEADER_LIKE_CELLS.contains(&institution.to_lowercase().as_str()) {
            continue;
        }

        accounts.push(BankAccount {
            institution: institution.to_string(),
            account_number: cells[1].trim().to_string(),
            account_type: cells
                .get(2)
                .map(|cell| cell.trim().to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
        });
    }

    accounts
}
