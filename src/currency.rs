use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Result, TaxExtractorError};
use crate::utils::round_currency;

pub const BASE_CURRENCY: &str = "EUR";

/// Multipliers converting one unit of a currency into euros.
///
/// A run receives its own copy of the table; edits made by the operator between runs
/// never affect a batch that is already being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyTable {
    #[serde(with = "rate_map")]
    rates: BTreeMap<String, Decimal>,
}

/// How an amount was brought into euros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Source currency was already EUR; the amount is kept exactly.
    Identity(Decimal),
    /// Amount multiplied by a known rate and rounded to cents.
    Converted { amount: Decimal, rate: Decimal },
    /// No rate known for the currency; the amount is carried over 1:1.
    Unavailable(Decimal),
}

impl Conversion {
    pub fn amount(&self) -> Decimal {
        match self {
            Self::Identity(amount) | Self::Unavailable(amount) => *amount,
            Self::Converted { amount, .. } => *amount,
        }
    }
}

impl Default for CurrencyTable {
    fn default() -> Self {
        let rates = [
            ("GBP", Decimal::new(11812, 4)),
            ("USD", Decimal::new(9204, 4)),
            ("CHF", Decimal::new(10418, 4)),
            ("CAD", Decimal::new(6812, 4)),
            (BASE_CURRENCY, Decimal::ONE),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        Self { rates }
    }
}

impl CurrencyTable {
    /// A table that only knows EUR.
    pub fn euro_only() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(BASE_CURRENCY.to_string(), Decimal::ONE);
        Self { rates }
    }

    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        self.rates.get(&currency.trim().to_uppercase()).copied()
    }

    pub fn rates(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }

    /// Sets or replaces a rate. EUR is pinned to 1 and cannot be overridden.
    pub fn set_rate(&mut self, currency: &str, rate: Decimal) -> Result<()> {
        let code = currency.trim().to_uppercase();
        if rate <= Decimal::ZERO {
            return Err(TaxExtractorError::InvalidExchangeRate {
                currency: code,
                rate: rate.to_string(),
            });
        }
        if code == BASE_CURRENCY {
            debug!("Ignoring override of the EUR base rate");
            return Ok(());
        }
        self.rates.insert(code, rate);
        Ok(())
    }

    pub fn with_rate(mut self, currency: &str, rate: Decimal) -> Result<Self> {
        self.set_rate(currency, rate)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        for (code, rate) in &self.rates {
            if *rate <= Decimal::ZERO {
                return Err(TaxExtractorError::InvalidExchangeRate {
                    currency: code.clone(),
                    rate: rate.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Converts `amount` from `currency` into euros.
    pub fn convert(&self, amount: Decimal, currency: &str) -> Conversion {
        let code = currency.trim().to_uppercase();
        if code == BASE_CURRENCY {
            return Conversion::Identity(amount);
        }

        match self.rates.get(&code) {
            Some(rate) => match amount.checked_mul(*rate) {
                Some(product) => Conversion::Converted {
                    amount: round_currency(product),
                    rate: *rate,
                },
                None => Conversion::Unavailable(amount),
            },
            None => Conversion::Unavailable(amount),
        }
    }

    /// Lines of the form `- 1 GBP = 1.1812 EUR`, one per currency.
    pub fn prompt_lines(&self) -> String {
        self.rates
            .iter()
            .map(|(code, rate)| format!("- 1 {} = {} {}", code, rate, BASE_CURRENCY))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parses a `CODE=RATE` override such as `GBP=1.17`, as typed on a command line.
    pub fn parse_override(pair: &str) -> Result<(String, Decimal)> {
        let (code, rate) = pair.split_once('=').ok_or_else(|| {
            TaxExtractorError::InvalidConfig(format!(
                "Exchange rate override '{}' must look like CODE=RATE",
                pair
            ))
        })?;
        let rate = Decimal::from_str(rate.trim()).map_err(|e| {
            TaxExtractorError::InvalidConfig(format!("Invalid rate in '{}': {}", pair, e))
        })?;
        Ok((code.trim().to_uppercase(), rate))
    }
}

// Rates are read and written as plain JSON numbers.
mod rate_map {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    use crate::utils::decimal_from_number;

    pub fn serialize<S: Serializer>(
        rates: &BTreeMap<String, Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let as_floats: BTreeMap<&String, f64> = rates
            .iter()
            .map(|(code, rate)| (code, rate.to_f64().unwrap_or_default()))
            .collect();
        as_floats.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Decimal>, D::Error> {
        let raw = BTreeMap::<String, serde_json::Number>::deserialize(deserializer)?;
        let mut rates = BTreeMap::new();
        for (code, rate) in raw {
            let decimal = decimal_from_number(&rate)
                .ok_or_else(|| D::Error::custom(format!("invalid rate for {}: {}", code, rate)))?;
            rates.insert(code.trim().to_uppercase(), decimal);
        }
        rates.insert(super::BASE_CURRENCY.to_string(), Decimal::ONE);
        Ok(rates)
    }
}
