//! Pipeline tests: document in, answers and metrics out.
//!
//! Documents are in-memory page views or plain-text files written to a temp
//! dir; the language model is scripted and embeddings come from the local
//! hashing embedder. No network required to run these tests.

use finlens_core::extraction::{OpenedDocument, PagedText};
use finlens_core::*;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helpers
// ============================================================================

/// Language model driven by a closure over the prompt.
struct FnModel<F> {
    reply: F,
    prompts: Mutex<Vec<String>>,
}

impl<F> FnModel<F>
where
    F: Fn(&str) -> Result<String, LlmError> + Send + Sync,
{
    fn new(reply: F) -> Arc<Self> {
        Arc::new(Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl<F> LanguageModel for FnModel<F>
where
    F: Fn(&str) -> Result<String, LlmError> + Send + Sync,
{
    fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.reply)(prompt)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

const METRICS_REPLY: &str = r#"Here is the result: {"company_name": "Wrong Name Inc.", "fiscal_year": "2024", "assets": 1200, "revenue": {"current": 300, "previous": 250}, "net_profit": {"current": 40, "previous": -5}, "profit_margin": {"current": 13.3, "previous": null}, "eps": {"current": 1.2, "previous": "n/a"}} Thanks."#;

const RISK_REPLY: &str = "Supplier concentration: one foundry makes 90% of our chips.";

fn filing_reply(prompt: &str) -> Result<String, LlmError> {
    if prompt.contains("Extract the key financial metrics") {
        Ok(METRICS_REPLY.to_string())
    } else if prompt.contains("risk factors") {
        Ok(RISK_REPLY.to_string())
    } else {
        Ok("Total assets were 1,200.".to_string())
    }
}

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashingEmbedder::new(512))
}

fn filing_pages() -> Vec<String> {
    vec![
        "### Acme Global Corp. Annual Report\nAcme Global Corp. is a leading maker of widgets.".to_string(),
        "CONSOLIDATED BALANCE SHEET\nTotal Assets    $    1,200\nTotal Liabilities         800".to_string(),
        "Our supply depends on a single foundry in one region.".to_string(),
    ]
}

fn write_filing(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("acme-10k.txt");
    std::fs::write(&path, filing_pages().join("\x0c")).unwrap();
    path
}

/// Writes a PDF with one Courier text line per entry, one page per slice.
fn write_pdf(path: &Path, pages: &[&[&str]]) {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-20).into()]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn index_for(blocks: &[ContentBlock]) -> DocumentIndex {
    IndexBuilder::new(&AnalyzerConfig::default().chunking, embedder())
        .build(blocks)
        .unwrap()
}

// ============================================================================
// Extraction
// ============================================================================

mod extraction {
    use super::*;

    #[test]
    fn balance_sheet_rows_are_cleaned() {
        let raw: types::RawTable = vec![
            vec![Some("Total Assets".into()), Some("$".into()), Some("1,200".into())],
            vec![Some("Total Liabilities".into()), None, Some("800".into())],
        ];
        let pages: Vec<String> = vec![
            "Letter to shareholders".into(),
            "Consolidated balance sheet".into(),
            "Outlook".into(),
        ];
        let document = OpenedDocument {
            fast: Box::new(PagedText::new(pages.clone())),
            layout: Box::new(PagedText::with_tables(pages, vec![vec![], vec![raw]])),
        };

        let blocks = ContentExtractor::new(&AnalyzerConfig::default().extraction)
            .extract_from(&document)
            .unwrap();

        let tables: Vec<&ContentBlock> = blocks.iter().filter(|b| b.kind() == BlockKind::Table).collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 2);
        assert_eq!(
            tables[0].as_table().unwrap(),
            &[
                vec!["Total Assets".to_string(), "1,200".to_string()],
                vec!["Total Liabilities".to_string(), "800".to_string()],
            ]
        );
    }

    #[test]
    fn text_file_pages_and_detected_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_filing(dir.path());

        let blocks = ContentExtractor::new(&AnalyzerConfig::default().extraction)
            .extract(&path)
            .unwrap();

        let layout: Vec<(u32, BlockKind)> = blocks.iter().map(|b| (b.page, b.kind())).collect();
        assert_eq!(
            layout,
            vec![
                (1, BlockKind::Text),
                (2, BlockKind::Text),
                (2, BlockKind::Table),
                (3, BlockKind::Text),
            ]
        );
        assert_eq!(
            blocks[2].as_table().unwrap(),
            &[
                vec!["Total Assets".to_string(), "1,200".to_string()],
                vec!["Total Liabilities".to_string(), "800".to_string()],
            ]
        );
    }

    #[test]
    fn pdf_pages_and_detected_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme-10k.pdf");
        write_pdf(
            &path,
            &[
                &["Acme Global Corp. Annual Report", "A leading maker of widgets."],
                &[
                    "CONSOLIDATED BALANCE SHEET",
                    "Total Assets    $    1,200",
                    "Total Liabilities      800",
                ],
                &["Our supply depends on a single foundry."],
            ],
        );

        let blocks = ContentExtractor::new(&AnalyzerConfig::default().extraction)
            .extract(&path)
            .unwrap();

        let layout: Vec<(u32, BlockKind)> = blocks.iter().map(|b| (b.page, b.kind())).collect();
        assert_eq!(
            layout,
            vec![
                (1, BlockKind::Text),
                (2, BlockKind::Text),
                (2, BlockKind::Table),
                (3, BlockKind::Text),
            ]
        );
        assert!(blocks[0].as_text().unwrap().contains("Annual Report"));
        assert_eq!(
            blocks[2].as_table().unwrap(),
            &[
                vec!["Total Assets".to_string(), "1,200".to_string()],
                vec!["Total Liabilities".to_string(), "800".to_string()],
            ]
        );
    }

    #[test]
    fn plain_pages_map_one_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.txt");
        std::fs::write(&path, "Dear shareholders\x0cWe had a good year\x0cThank you\x0cSigned").unwrap();

        let blocks = ContentExtractor::new(&AnalyzerConfig::default().extraction)
            .extract(&path)
            .unwrap();
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|b| b.kind() == BlockKind::Text));
        assert_eq!(blocks.iter().map(|b| b.page).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn missing_file_is_extraction_error() {
        let err = ContentExtractor::new(&AnalyzerConfig::default().extraction)
            .extract(Path::new("/nonexistent/acme.txt"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Io { .. }));
    }
}

// ============================================================================
// Retrieval and querying
// ============================================================================

mod querying {
    use super::*;

    #[test]
    fn table_chunk_grounds_balance_question() {
        let blocks = vec![
            ContentBlock::text(1, "Acme makes widgets for industrial customers."),
            ContentBlock::table(
                2,
                vec![
                    vec!["Total Assets".into(), "1,200".into()],
                    vec!["Total Liabilities".into(), "800".into()],
                ],
            ),
        ];
        let index = index_for(&blocks);
        let model = FnModel::new(filing_reply);
        let engine = QueryEngine::new(model.clone());

        let options = QueryOptions {
            top_k: 1,
            ..QueryOptions::default()
        };
        let response = engine
            .query_with_sources(&index, "What were total assets?", &options)
            .unwrap();

        assert_eq!(response.answer, "Total assets were 1,200.");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].kind, BlockKind::Table);
        assert_eq!(response.sources[0].chunk_id, index.units()[1].id);
        assert_eq!(index.units()[1].text, "Total Assets | 1,200\nTotal Liabilities | 800");
        assert_eq!(model.prompt_count(), 1);
    }

    #[test]
    fn failed_query_leaves_index_usable() {
        let index = index_for(&[ContentBlock::text(1, "Revenue was 300 million.")]);
        let calls = Mutex::new(0);
        let model = FnModel::new(move |_prompt: &str| {
            let mut calls = calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Err(LlmError::Transport("timed out".to_string()))
            } else {
                Ok("Revenue was $300M.".to_string())
            }
        });
        let engine = QueryEngine::new(model);

        let first = engine.query(&index, "revenue?", &QueryOptions::default());
        assert!(matches!(first, Err(QueryError::Llm(LlmError::Transport(_)))));

        let second = engine.query(&index, "revenue?", &QueryOptions::default()).unwrap();
        assert_eq!(second, "Revenue was $300M.");
    }

    #[test]
    fn shared_index_serves_concurrent_queries() {
        let index = Arc::new(index_for(&[
            ContentBlock::text(1, "Revenue was 300 million."),
            ContentBlock::text(2, "Net income was 40 million."),
        ]));
        let engine = QueryEngine::new(FnModel::new(filing_reply));

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let index = Arc::clone(&index);
                    let engine = engine.clone();
                    scope.spawn(move || engine.query(&index, &format!("question {i}"), &QueryOptions::default()))
                })
                .collect();
            for handle in handles {
                assert!(handle.join().unwrap().is_ok());
            }
        });
    }
}

// ============================================================================
// Metrics
// ============================================================================

mod metrics {
    use super::*;

    fn filing_index() -> DocumentIndex {
        let blocks: Vec<ContentBlock> = filing_pages()
            .into_iter()
            .enumerate()
            .map(|(i, page)| ContentBlock::text(i as u32 + 1, page))
            .collect();
        index_for(&blocks)
    }

    #[test]
    fn prose_wrapped_json_with_locked_company() {
        let extractor = MetricsExtractor::new(QueryEngine::new(FnModel::new(filing_reply)));
        let extraction = extractor.extract_metrics(&filing_index());

        assert!(extraction.error.is_none());
        let record = extraction.record;
        assert_eq!(record.company_name.as_deref(), Some("Acme Global Corp."));
        assert_eq!(record.fiscal_year.as_deref(), Some("2024"));
        assert_eq!(record.assets, Some(1200.0));
        assert_eq!(record.net_profit.previous, Some(-5.0));
        assert_eq!(record.profit_margin.previous, None);
        assert_eq!(record.eps.current, Some(1.2));
        assert_eq!(record.eps.previous, None);
        assert_eq!(record.profitability(), types::Profitability::Profitable);
        assert_eq!(extraction.rejected_fields, vec!["eps.previous"]);
    }

    #[test]
    fn prompt_carries_locked_company_name() {
        let model = FnModel::new(filing_reply);
        let extractor = MetricsExtractor::new(QueryEngine::new(model.clone()));
        extractor.extract_metrics(&filing_index());

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains(r#""company_name": "Acme Global Corp.""#));
    }

    #[test]
    fn no_json_gives_empty_record_and_parse_error() {
        let model = FnModel::new(|_: &str| Ok("I could not find those figures.".to_string()));
        let extraction = MetricsExtractor::new(QueryEngine::new(model)).extract_metrics(&filing_index());

        assert!(extraction.record.is_empty());
        assert!(matches!(
            extraction.error,
            Some(MetricsError::Parse(MetricsParseError::NoJsonObject))
        ));
    }

    #[test]
    fn query_failure_gives_empty_record() {
        let model = FnModel::new(|_: &str| {
            Err(LlmError::Status {
                status: 503,
                body: "overloaded".to_string(),
            })
        });
        let extraction = MetricsExtractor::new(QueryEngine::new(model)).extract_metrics(&filing_index());

        assert!(extraction.record.is_empty());
        assert!(matches!(extraction.error, Some(MetricsError::Query(_))));
    }

    #[test]
    fn cancelled_extraction_calls_no_model() {
        let model = FnModel::new(filing_reply);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let extractor = MetricsExtractor::new(QueryEngine::new(model.clone())).with_cancellation(cancel);

        let extraction = extractor.extract_metrics(&filing_index());
        assert!(extraction.record.is_empty());
        assert!(matches!(
            extraction.error,
            Some(MetricsError::Query(QueryError::Cancelled { completed: 0 }))
        ));
        assert!(matches!(
            extractor.extract_risk_factors(&filing_index()),
            Err(QueryError::Cancelled { .. })
        ));
        assert_eq!(model.prompt_count(), 0);
    }

    #[test]
    fn risk_summary_is_verbatim() {
        let extractor = MetricsExtractor::new(QueryEngine::new(FnModel::new(filing_reply)));
        let risks = extractor.extract_risk_factors(&filing_index()).unwrap();
        assert_eq!(risks.as_str(), RISK_REPLY);
    }
}

// ============================================================================
// Whole pipeline
// ============================================================================

mod analyzer {
    use super::*;

    #[test]
    fn text_filing_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_filing(dir.path());
        let analyzer = DocumentAnalyzer::new(AnalyzerConfig::default(), embedder(), FnModel::new(filing_reply));
        let mut profiler = StepProfiler::new(true);

        let outcome = analyzer
            .analyze(
                &path,
                AnalysisOptions::default(),
                &NoProgress,
                &CancellationToken::new(),
                &mut profiler,
            )
            .unwrap();

        assert_eq!(outcome.block_count, 4);
        assert!(outcome.metrics_error.is_none());
        assert!(outcome.risk_error.is_none());
        assert_eq!(profiler.timings().len(), 4);

        let mut session = outcome.session;
        assert_eq!(session.metrics().company_name.as_deref(), Some("Acme Global Corp."));
        assert_eq!(session.risks().map(|r| r.as_str()), Some(RISK_REPLY));

        session.set_role(Role::from_label("📊 Financial Analyst"));
        let response = session.ask("What were total assets?").unwrap();
        assert_eq!(response.answer, "Total assets were 1,200.");
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn degraded_metrics_do_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_filing(dir.path());
        let model = FnModel::new(|prompt: &str| {
            if prompt.contains("risk factors") {
                Err(LlmError::Transport("reset".to_string()))
            } else {
                Ok("no json here".to_string())
            }
        });
        let analyzer = DocumentAnalyzer::new(AnalyzerConfig::default(), embedder(), model);

        let outcome = analyzer
            .analyze(
                &path,
                AnalysisOptions::default(),
                &NoProgress,
                &CancellationToken::new(),
                &mut StepProfiler::new(false),
            )
            .unwrap();

        assert!(outcome.session.metrics().is_empty());
        assert!(outcome.session.risks().is_none());
        assert!(outcome.metrics_error.is_some());
        assert!(outcome.risk_error.is_some());
    }

    #[test]
    fn skipped_stages_make_no_model_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_filing(dir.path());
        let model = FnModel::new(filing_reply);
        let analyzer = DocumentAnalyzer::new(AnalyzerConfig::default(), embedder(), model.clone());

        analyzer
            .analyze(
                &path,
                AnalysisOptions {
                    skip_metrics: true,
                    skip_risks: true,
                },
                &NoProgress,
                &CancellationToken::new(),
                &mut StepProfiler::new(false),
            )
            .unwrap();
        assert_eq!(model.prompt_count(), 0);
    }

    #[test]
    fn unreadable_document_aborts() {
        let analyzer = DocumentAnalyzer::new(AnalyzerConfig::default(), embedder(), FnModel::new(filing_reply));
        let result = analyzer.analyze(
            Path::new("/nonexistent/acme.pdf"),
            AnalysisOptions::default(),
            &NoProgress,
            &CancellationToken::new(),
            &mut StepProfiler::new(false),
        );
        assert!(matches!(result, Err(PipelineError::Extraction(_))));
    }
}
