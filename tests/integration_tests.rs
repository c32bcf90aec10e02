use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx};
use irpp_extractor::*;
use rust_decimal::Decimal;
use rust_xlsxwriter::Workbook;
use serde_json::json;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Replies with a fixed answer and records every prompt it receives.
struct ScriptedBackend {
    reply: std::result::Result<String, u16>,
    prompts: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    fn replying(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(status),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .map(|request| request.user_prompt.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(TaxExtractorError::ServiceError {
                status: *status,
                body: "upstream unavailable".to_string(),
            }),
        }
    }
}

fn pipeline(backend: Arc<ScriptedBackend>) -> TaxPipeline {
    TaxPipeline::new(backend, &ExtractorConfig::default()).unwrap()
}

fn questionnaire_docx() -> Vec<u8> {
    let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Client questionnaire 2024</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">UK Civil Service Pension: 9351 GBP</w:t></w:r></w:p>
</w:body></w:document>"#;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn bank_statement_xlsx() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Interest").unwrap();
    sheet.write_string(0, 0, "Bank interest").unwrap();
    sheet.write_number(0, 1, 350).unwrap();
    workbook.save_to_buffer().unwrap()
}

const PENSION_REPLY: &str = r#"```json
[
    {
        "Description": "UK Civil Service Pension",
        "Form": "2047",
        "Code": "1AG",
        "Source Currency": "GBP",
        "Amount (Source)": 9351,
        "Amount (€)": 11045.52,
        "Taxable in France (€)": "",
        "Taxable in Source Country (€)": 11045.40,
        "Notes": "Exempt in France, taxable in UK per tax treaty"
    }
]
```"#;

#[tokio::test]
async fn test_gbp_pension_end_to_end() {
    let backend = ScriptedBackend::replying(PENSION_REPLY);
    let documents = vec![
        Document::new("questionnaire.docx", questionnaire_docx()),
        Document::new("interest.xlsx", bank_statement_xlsx()),
    ];

    let output = pipeline(backend.clone())
        .run(&documents, &RunContext::default(), None)
        .await
        .unwrap();

    let prompt = backend.last_prompt();
    assert!(prompt.contains("--- START OF DOCUMENT: questionnaire.docx ---"));
    assert!(prompt.contains("UK Civil Service Pension: 9351 GBP"));
    assert!(prompt.contains("--- Sheet: Interest ---\nBank interest | 350\n"));
    assert!(prompt.contains("- 1 GBP = 1.1812 EUR"));

    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    assert_eq!(output.entries.len(), 1);

    let pension = &output.entries[0];
    assert_eq!(pension.form, "2047");
    assert_eq!(pension.code, "1AG");
    assert!(pension.valid_code);
    // 9351 x 1.1812 = 11045.4012; the model's own 11045.52 is ignored.
    assert_eq!(pension.amount_eur, Decimal::new(1104540, 2));
    assert_eq!(pension.taxable_france, None);

    let feed = output.filing_feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].code, "1AG");
    assert!((feed[0].value - 11045.40).abs() < 1e-9);
}

#[tokio::test]
async fn test_classification_follows_model_code() {
    let reply = json!([{
        "Description": "UK pension (private scheme)",
        "Form": "2047",
        "Code": "1af",
        "Source Currency": "GBP",
        "Amount (Source)": "9 351"
    }])
    .to_string();

    let output = pipeline(ScriptedBackend::replying(reply))
        .run(
            &[Document::new("notes.txt", b"Pension 9351 GBP".to_vec())],
            &RunContext::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(output.entries[0].code, "1AF");
    assert!(output.entries[0].valid_code);
    assert_eq!(output.entries[0].amount_eur, Decimal::new(1104540, 2));
}

#[tokio::test]
async fn test_mixed_batch_keeps_invalid_and_drops_incomplete() {
    let reply = json!([
        {"Description": "Bank Interest", "Form": "2042", "Code": "2TR", "Source Currency": "EUR",
         "Amount (Source)": 350, "Taxable in France (€)": 350},
        {"Description": "Chambre d'Hôte Income", "Form": "2042", "Code": "5TE",
         "Source Currency": "EUR", "Amount (Source)": 7387, "Taxable in France (€)": 7387, "Notes": "Gîte"},
        {"Description": "Solar panels", "Form": "2042", "Code": "7ZZ", "Source Currency": "EUR",
         "Amount (Source)": 120},
        {"Description": "Incomplete", "Form": "2042"}
    ])
    .to_string();

    let documents = vec![
        Document::new("statement.txt", b"Interest 350".to_vec()),
        Document::new("scan.png", vec![0x89, b'P', b'N', b'G']),
    ];
    let output = pipeline(ScriptedBackend::replying(reply))
        .run(&documents, &RunContext::default(), None)
        .await
        .unwrap();

    let codes: Vec<&str> = output.entries.iter().map(|e| e.code.as_str()).collect();
    assert_eq!(codes, vec!["2TR", "5TE", "7ZZ"]);

    let kinds: Vec<WarningKind> = output.warnings.iter().map(|w| w.kind).collect();
    assert_eq!(
        kinds,
        vec![
            WarningKind::UnsupportedFile,
            WarningKind::UnknownCode,
            WarningKind::MissingFields
        ]
    );

    let gite = &output.entries[1];
    let abatement = gite.abatement.as_ref().unwrap();
    assert_eq!(abatement.amount, Decimal::new(524477, 2));
    assert_eq!(abatement.taxable_after, Decimal::new(214223, 2));
    assert_eq!(gite.notes, "Gîte Micro-BIC regime, 71% abatement applies.");

    let solar = &output.entries[2];
    assert!(!solar.valid_code);
    assert!(solar.code_description.is_empty());

    // Solar panels have no taxable amount and stay out of the feed.
    let feed = output.filing_feed();
    let feed_codes: Vec<&str> = feed.iter().map(|item| item.code.as_str()).collect();
    assert_eq!(feed_codes, vec!["2TR", "5TE"]);
}

#[tokio::test]
async fn test_empty_array_produces_empty_report() {
    let output = pipeline(ScriptedBackend::replying("[]"))
        .run(
            &[Document::new("empty.txt", Vec::new())],
            &RunContext::default(),
            None,
        )
        .await
        .unwrap();

    assert!(output.entries.is_empty());
    let bundle = output.export(ExportFormat::Both).unwrap();
    assert_eq!(bundle.filing_feed.as_deref(), Some("[]"));

    let mut workbook = Xlsx::new(Cursor::new(bundle.workbook.unwrap())).unwrap();
    let sheet = format!("IRPP {}", current_tax_year());
    let range = workbook.worksheet_range(&sheet).unwrap();
    assert_eq!(range.rows().count(), 1);
    assert_eq!(range.get((0, 0)), Some(&Data::String("Description".to_string())));
}

#[tokio::test]
async fn test_unparseable_response_aborts_run() {
    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let result = pipeline(ScriptedBackend::replying("I could not find any income."))
        .run(
            &[Document::new("a.txt", b"text".to_vec())],
            &RunContext::default(),
            Some(tx),
        )
        .await;

    assert!(matches!(result, Err(TaxExtractorError::UnparseableResponse(_))));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.contains(&PipelineEvent::ParsingResponse));
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::Validating { .. })));
    assert!(matches!(events.last(), Some(PipelineEvent::Failed { .. })));
}

#[tokio::test]
async fn test_service_error_aborts_before_parsing() {
    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let result = pipeline(ScriptedBackend::failing(503))
        .run(&[], &RunContext::default(), Some(tx))
        .await;

    assert!(matches!(
        result,
        Err(TaxExtractorError::ServiceError { status: 503, .. })
    ));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(!events.contains(&PipelineEvent::ParsingResponse));
    assert!(matches!(events.last(), Some(PipelineEvent::Failed { .. })));
}

#[tokio::test]
async fn test_taxpayer_context_and_rate_overrides_reach_prompt() {
    let backend = ScriptedBackend::replying(
        json!([{"Description": "US dividends", "Form": "2047", "Code": "2AB",
                "Source Currency": "usd", "Amount (Source)": 1000}])
        .to_string(),
    );
    let config = ExtractorConfig::default()
        .with_exchange_rate("USD", Decimal::new(95, 2))
        .unwrap();
    let pipeline = TaxPipeline::new(backend.clone(), &config).unwrap();

    let context = RunContext {
        taxpayer: Some(TaxpayerInfo {
            name: "Jane Doe".to_string(),
            ..TaxpayerInfo::default()
        }),
        additional_context: "Retired in Dordogne since 2019.".to_string(),
    };
    let output = pipeline.run(&[], &context, None).await.unwrap();

    let prompt = backend.last_prompt();
    assert!(prompt.contains(&format!(
        "Client: Jane Doe\nTax Year: {}\n\nRetired in Dordogne since 2019.",
        current_tax_year()
    )));
    assert!(prompt.contains("- 1 USD = 0.95 EUR"));
    assert_eq!(output.entries[0].amount_eur, Decimal::new(950, 0));
}

#[tokio::test]
async fn test_bank_accounts_detected_from_documents() {
    let statement = "Foreign accounts\n\
                     Institution    Account Number    Type\n\
                     Barclays    12345678    Current\n\
                     \n";
    let output = pipeline(ScriptedBackend::replying("[]"))
        .run(
            &[Document::new("accounts.txt", statement.as_bytes().to_vec())],
            &RunContext::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        output.bank_accounts,
        vec![BankAccount {
            institution: "Barclays".to_string(),
            account_number: "12345678".to_string(),
            account_type: "Current".to_string(),
        }]
    );
}
