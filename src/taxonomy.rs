//! Reference table of French income tax forms and the box codes the extractor knows about.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaxCode {
    pub code: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaxForm {
    pub form: &'static str,
    pub description: &'static str,
    pub codes: &'static [TaxCode],
}

impl TaxForm {
    pub fn code(&self, code: &str) -> Option<&'static TaxCode> {
        self.codes.iter().find(|c| c.code == code)
    }
}

/// Outcome of looking up a normalized (form, code) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Known { description: &'static str },
    UnknownCode,
    UnknownForm,
}

impl Classification {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known { .. })
    }
}

const fn code(code: &'static str, description: &'static str) -> TaxCode {
    TaxCode { code, description }
}

const FORMS: &[TaxForm] = &[
    TaxForm {
        form: "2042",
        description: "Déclaration des revenus",
        codes: &[
            code("1AJ", "Salaries - Declarant 1"),
            code("1BJ", "Salaries - Declarant 2"),
            code("1AP", "Pensions, Retirement - Declarant 1"),
            code("1BP", "Pensions, Retirement - Declarant 2"),
            code("2TR", "Interest income subject to flat tax (PFU)"),
            code("2TS", "Interest from regulated savings accounts (Livret A, etc.)"),
            code("2BH", "French bank interest - Declarant 1"),
            code("2CH", "French bank interest - Declarant 2"),
            code("2DC", "Dividends subject to progressive tax"),
            code("2EE", "Capital gains on securities"),
            code("5HQ", "Micro-entrepreneur/Auto-entrepreneur income"),
            code("5KO", "Miscellaneous income - Declarant 1"),
            code("5LO", "Miscellaneous income - Declarant 2"),
            code("5TE", "Micro-BIC income (Chambre d'hôte/gites)"),
            code("7DB", "Energy production credits (solar panels, etc.)"),
            code("7DQ", "Energy equipment installations (tax credit)"),
        ],
    },
    TaxForm {
        form: "2044",
        description: "Déclaration des revenus fonciers",
        codes: &[
            code("4BA", "Gross rental income"),
            code("4BB", "Property tax paid"),
            code("4BC", "Deductible interest on loans"),
            code("4BH", "Property expenses"),
            code("4BK", "Property management fees"),
            code("4BL", "Insurance premiums"),
        ],
    },
    TaxForm {
        form: "2047",
        description: "Déclaration des revenus encaissés à l'étranger",
        codes: &[
            code("1AF", "Foreign pensions - Declarant 1"),
            code("1BF", "Foreign pensions - Declarant 2"),
            code("1AG", "Government/Civil Service pensions - Declarant 1"),
            code("1BG", "Government/Civil Service pensions - Declarant 2"),
            code("2AB", "Foreign dividends"),
            code("2BG", "Foreign interest income - Declarant 1"),
            code("2CG", "Foreign interest income - Declarant 2"),
            code("3VG", "Foreign capital gains"),
            code("3VH", "Foreign capital gains exempt but used for rate calculation"),
        ],
    },
    TaxForm {
        form: "3916",
        description: "Déclaration des comptes ouverts à l'étranger",
        codes: &[
            code("8UU", "Foreign bank account - Country code"),
            code("8TK", "Foreign bank account - Account number"),
            code("8QS", "Foreign bank account - Name of institution"),
            code("8RT", "Foreign bank account - Full address"),
            code("8QU", "Foreign bank account - Account type (current/savings)"),
        ],
    },
    TaxForm {
        form: "2086",
        description: "Déclaration des frais professionnels",
        codes: &[
            code("AK", "Professional expenses - Declarant 1"),
            code("BK", "Professional expenses - Declarant 2"),
            code("WW", "Home-to-work distance (km)"),
        ],
    },
];

/// Read-only view over the static form/code table.
#[derive(Debug, Clone, Copy)]
pub struct Taxonomy {
    forms: &'static [TaxForm],
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

impl Taxonomy {
    pub const fn standard() -> Self {
        Self { forms: FORMS }
    }

    pub fn forms(&self) -> &'static [TaxForm] {
        self.forms
    }

    pub fn form(&self, form: &str) -> Option<&'static TaxForm> {
        self.forms.iter().find(|f| f.form == form)
    }

    pub fn description(&self, form: &str, code: &str) -> Option<&'static str> {
        self.form(form)
            .and_then(|f| f.code(code))
            .map(|c| c.description)
    }

    /// Expects `form` trimmed and `code` already normalized.
    pub fn classify(&self, form: &str, code: &str) -> Classification {
        match self.form(form) {
            Some(tax_form) => match tax_form.code(code) {
                Some(c) => Classification::Known {
                    description: c.description,
                },
                None => Classification::UnknownCode,
            },
            None => Classification::UnknownForm,
        }
    }

    /// Renders every form and code as a bulleted reference list for the extraction prompt.
    pub fn reference_listing(&self) -> String {
        let mut listing = String::new();
        for form in self.forms {
            listing.push_str(&format!("- Form {} ({}):\n", form.form, form.description));
            for c in form.codes {
                listing.push_str(&format!("    {}: {}\n", c.code, c.description));
            }
        }
        listing
    }
}
