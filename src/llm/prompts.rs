// Prompt text for the single-shot income extraction call.

use crate::currency::CurrencyTable;
use crate::taxonomy::Taxonomy;

pub const SYSTEM_PROMPT: &str =
    "You are a professional French tax assistant that outputs precise, structured data.";

/// Example array shown to the model. Keys match the candidate field names the validator reads.
pub const EXAMPLE_OUTPUT: &str = r#"[
    {
        "Description": "UK Civil Service Pension",
        "Form": "2047",
        "Code": "1AG",
        "Source Currency": "GBP",
        "Amount (Source)": 9351,
        "Amount (€)": 11045.52,
        "Taxable in France (€)": "",
        "Taxable in Source Country (€)": 11045.52,
        "Notes": "Exempt in France, taxable in UK per tax treaty"
    },
    {
        "Description": "Bank Interest",
        "Form": "2042",
        "Code": "2TR",
        "Source Currency": "EUR",
        "Amount (Source)": 350,
        "Amount (€)": 350,
        "Taxable in France (€)": 350,
        "Taxable in Source Country (€)": "",
        "Notes": "Subject to PFU flat tax at 30%"
    },
    {
        "Description": "Chambre d'Hôte Income",
        "Form": "2042",
        "Code": "5TE",
        "Source Currency": "EUR",
        "Amount (Source)": 7387,
        "Amount (€)": 7387,
        "Taxable in France (€)": 7387,
        "Taxable in Source Country (€)": "",
        "Notes": "Micro-BIC regime, 71% abatement applies"
    }
]"#;

const INCOME_CATEGORIES: &str = r#"Include ALL of the following types of income that appear in the document:
1. Employment income/salaries (Form 2042, codes 1AJ, 1BJ, etc.)
2. Pensions and retirement income (Form 2042, codes 1AP, 1BP, etc. or Form 2047 for foreign)
   a. Use code 1AG/1BG for government/civil service pensions (UK Civil Service, etc.)
   b. Use code 1AF/1BF for standard foreign pensions
3. Investment income - dividends, interest (Form 2042, codes 2DC, 2TR, etc.)
4. Real estate income (Form 2044, codes 4BA, etc.)
5. Capital gains (Form 2042, codes 3VG, 2EE, etc.)
6. Foreign income of all types (Form 2047)
7. Foreign bank accounts (Form 3916)
8. Micro-entrepreneur or chambres d'hôte income (Form 2042, codes 5HQ, 5TE)
9. Income from energy production like solar panels (Form 2042, code 7DB)"#;

const IMPORTANT_FORMS: &str = r#"Important tax form codes:
- 2042: Standard French income declaration
- 2044: Real estate income (unfurnished rentals)
- 2047: Foreign income declaration
- 3916: Foreign bank accounts declaration"#;

const OUTPUT_DIRECTIVE: &str =
    "IMPORTANT: Return ONLY the JSON array. No explanations, no markdown formatting.";

/// Builds the user message for one extraction run.
///
/// `document_text` is the framed concatenation of every uploaded document and `context` the
/// operator-supplied taxpayer context (possibly empty).
pub fn build_extraction_prompt(
    document_text: &str,
    context: &str,
    tax_year: i32,
    rates: &CurrencyTable,
    taxonomy: &Taxonomy,
) -> String {
    format!(
        "\nYou are a professional French tax assistant specializing in expatriate and international taxation for {year}.\n\n\
         Extract ALL tax-relevant income data from the following document. Be thorough and precise.\n\n\
         Return your response ONLY as a JSON list of income entries with the following structure:\n\
         {example}\n\n\
         {categories}\n\n\
         {forms}\n\n\
         Reference of known forms and codes:\n\
         {reference}\n\
         Use these exchange rates:\n\
         {rates}\n\n\
         Additional context about this taxpayer:\n\
         {context}\n\n\
         {directive}\n\n\
         Document content:\n\
         {text}\n",
        year = tax_year,
        example = EXAMPLE_OUTPUT,
        categories = INCOME_CATEGORIES,
        forms = IMPORTANT_FORMS,
        reference = taxonomy.reference_listing(),
        rates = rates.prompt_lines(),
        context = context,
        directive = OUTPUT_DIRECTIVE,
        text = document_text,
    )
}
