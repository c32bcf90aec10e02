//! Extracts income lines from client documents and writes the IRPP workbook and filing feed.
//!
//! ```text
//! OPENAI_API_KEY=sk-... cargo run --features openai --example extract_tax_documents -- questionnaire.pdf p60.xlsx
//! ```
//!
//! Optional: `IRPP_TAX_YEAR`, `OPENAI_MODEL`, `OPENAI_BASE_URL`, `IRPP_RATES` (e.g. `GBP=1.17,USD=0.93`),
//! `IRPP_CLIENT` and `IRPP_CONTEXT`.

use anyhow::{bail, Context};
use dotenv::dotenv;
use irpp_extractor::{
    CurrencyTable, Document, ExportFormat, ExtractorConfig, PipelineEvent, RunContext,
    TaxPipeline, TaxpayerInfo,
};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        bail!("usage: extract_tax_documents <file> [<file> ...]");
    }

    let mut config = ExtractorConfig::from_env()?;
    config.export_format = ExportFormat::Both;
    if let Ok(overrides) = std::env::var("IRPP_RATES") {
        for pair in overrides.split(',').filter(|s| !s.trim().is_empty()) {
            let (code, rate) = CurrencyTable::parse_override(pair)?;
            config.exchange_rates.set_rate(&code, rate)?;
        }
    }

    let documents = paths
        .iter()
        .map(|p| Document::from_path(Path::new(p)).with_context(|| format!("reading {}", p)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let context = RunContext {
        taxpayer: std::env::var("IRPP_CLIENT").ok().map(|name| TaxpayerInfo {
            name,
            ..TaxpayerInfo::default()
        }),
        additional_context: std::env::var("IRPP_CONTEXT").unwrap_or_default(),
    };

    let pipeline = TaxPipeline::from_config(&config)?;
    println!(
        "Processing {} documents for tax year {} with {}",
        documents.len(),
        pipeline.tax_year(),
        config.model
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Starting => println!("Starting"),
                PipelineEvent::ExtractingDocument {
                    filename,
                    index,
                    total,
                } => println!("  [{}/{}] {}", index + 1, total, filename),
                PipelineEvent::QueryingModel => println!("Querying model..."),
                PipelineEvent::ParsingResponse => println!("Parsing response"),
                PipelineEvent::Validating { candidates } => {
                    println!("Validating {} candidate entries", candidates)
                }
                PipelineEvent::Completed { entries, warnings } => {
                    println!("Done: {} entries, {} warnings", entries, warnings)
                }
                PipelineEvent::Failed { reason } => println!("Failed: {}", reason),
            }
        }
    });

    let result = pipeline.run(&documents, &context, Some(tx)).await;
    printer.await?;
    let output = result?;

    for warning in &output.warnings {
        println!("warning: {}", warning);
    }
    for entry in &output.entries {
        println!(
            "{:<40} {:>5} {:>4}  {:>12} {}  ->  {:>12} EUR{}",
            entry.description,
            entry.form,
            entry.code,
            entry.amount_source,
            entry.source_currency,
            entry.amount_eur,
            if entry.valid_code { "" } else { "  (unknown code)" }
        );
    }
    for account in &output.bank_accounts {
        println!(
            "bank account: {} {} ({})",
            account.institution, account.account_number, account.account_type
        );
    }

    let bundle = output.export(config.export_format)?;
    let stem = format!("irpp_{}", output.tax_year);
    if let Some(workbook) = bundle.workbook {
        let path = format!("{}.xlsx", stem);
        std::fs::write(&path, workbook)?;
        println!("Wrote {}", path);
    }
    if let Some(feed) = bundle.filing_feed {
        let path = format!("{}_filing_feed.json", stem);
        std::fs::write(&path, feed)?;
        println!("Wrote {}", path);
    }

    Ok(())
}
