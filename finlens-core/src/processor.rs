use crate::cache::EmbeddingCache;
use crate::config::AnalyzerConfig;
use crate::embedding::Embedder;
use crate::error::{ExtractionError, IndexError, MetricsError, PipelineError, QueryError};
use crate::extraction::ContentExtractor;
use crate::index::{CancellationToken, DocumentIndex, IndexBuilder, ProgressSink};
use crate::llm::LanguageModel;
use crate::metrics::MetricsExtractor;
use crate::query::{QueryEngine, QueryOptions};
use crate::session::AnalysisSession;
use crate::types::ContentBlock;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        info!(step = step_name, elapsed_ms = elapsed.as_millis() as u64, "pipeline step");
        self.timings.push((step_name.to_string(), elapsed));

        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn print_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        println!("\n📊 Performance Summary:");
        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();

        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            println!(
                "   {:.<35} {:.0}ms ({:.1}%)",
                step,
                duration.as_millis(),
                percentage
            );
        }
        println!("   {:.<35} {:.0}ms", "Total", total.as_millis());
    }
}

/// Which optional stages to run after indexing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    pub skip_metrics: bool,
    pub skip_risks: bool,
}

/// A ready session plus whatever degraded along the way.
pub struct AnalysisOutcome {
    pub session: AnalysisSession,
    pub block_count: usize,
    pub metrics_error: Option<MetricsError>,
    pub risk_error: Option<QueryError>,
}

/// Runs one document through extract → index → metrics → risk summary.
///
/// Extraction and indexing failures abort; metrics and risk failures leave
/// the session with an empty record or no summary.
pub struct DocumentAnalyzer {
    config: AnalyzerConfig,
    extractor: ContentExtractor,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
}

impl DocumentAnalyzer {
    pub fn new(config: AnalyzerConfig, embedder: Arc<dyn Embedder>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            extractor: ContentExtractor::new(&config.extraction),
            config,
            embedder,
            llm,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::from_config(&self.config.retrieval)
    }

    pub fn extract(&self, path: &Path) -> Result<Vec<ContentBlock>, ExtractionError> {
        self.extractor.extract(path)
    }

    pub fn build_index(
        &self,
        blocks: &[ContentBlock],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<DocumentIndex, IndexError> {
        // One cache per index: sessions never share embeddings
        IndexBuilder::new(&self.config.chunking, self.embedder.clone())
            .with_cache(EmbeddingCache::new())
            .build_with_progress(blocks, progress, cancel)
    }

    pub fn analyze(
        &self,
        path: &Path,
        options: AnalysisOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        profiler: &mut StepProfiler,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let blocks = profiler.time_step("1. Extraction", || self.extract(path))?;
        self.analyze_blocks(path, &blocks, options, progress, cancel, profiler)
    }

    /// Same as [`analyze`](Self::analyze) for blocks already extracted.
    pub fn analyze_blocks(
        &self,
        document: &Path,
        blocks: &[ContentBlock],
        options: AnalysisOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        profiler: &mut StepProfiler,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let index = profiler.time_step("2. Chunking + Indexing", || {
            self.build_index(blocks, progress, cancel)
        })?;
        let index = Arc::new(index);

        let engine = QueryEngine::new(self.llm.clone());
        let query_options = self.query_options();
        let extractor = MetricsExtractor::with_options(engine.clone(), query_options.clone())
            .with_cancellation(cancel.clone());
        let mut session = AnalysisSession::new(document, index.clone(), engine, query_options);

        let mut metrics_error = None;
        if !options.skip_metrics {
            let extraction = profiler.time_step("3. Metrics", || extractor.extract_metrics(&index));
            session.set_metrics(extraction.record);
            metrics_error = extraction.error;
        }

        let mut risk_error = None;
        if !options.skip_risks {
            match profiler.time_step("4. Risk Factors", || extractor.extract_risk_factors(&index)) {
                Ok(summary) => session.set_risks(Some(summary)),
                Err(e) => {
                    warn!(error = %e, "risk summary unavailable");
                    risk_error = Some(e);
                }
            }
        }

        info!(
            session = %session.id(),
            blocks = blocks.len(),
            chunks = index.len(),
            embedder = index.embedder_name(),
            "analysis session ready"
        );

        Ok(AnalysisOutcome {
            session,
            block_count: blocks.len(),
            metrics_error,
            risk_error,
        })
    }
}
