use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use finlens::render::{render_answer, render_metrics, render_risks};
use finlens::BarProgress;
use finlens_core::{
    embedder_from_config, AnalysisOptions, AnalysisSession, AnalyzerConfig, CancellationToken,
    ChatTurn, ContentExtractor, DocumentAnalyzer, Embedder, EmbeddingProvider, MetricsRecord,
    ModelBackend, OpenRouterClient, ResponseMode, RiskSummary, Role, SourceRef, StepProfiler,
};

#[derive(Parser)]
#[command(name = "finlens")]
#[command(about = "Ask role-tailored questions about a financial filing")]
struct Args {
    /// Path to the filing (.pdf or .txt)
    #[arg(short, long)]
    input: Option<String>,

    /// Path to custom config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Answer style: beginner, analyst or investor
    #[arg(short, long, default_value = "beginner")]
    role: String,

    /// Question to ask (repeatable)
    #[arg(short, long)]
    question: Vec<String>,

    /// Chat about the document on stdin after the questions are answered
    #[arg(long)]
    interactive: bool,

    /// Answer with the alternate model from the config
    #[arg(long)]
    alternate_model: bool,

    /// Chunks retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Response synthesis: compact or tree-summarize
    #[arg(long)]
    response_mode: Option<ResponseMode>,

    /// Skip key metrics extraction
    #[arg(long)]
    skip_metrics: bool,

    /// Skip the risk factor summary
    #[arg(long)]
    skip_risks: bool,

    /// Write the extracted content blocks as JSON to this path and exit
    #[arg(long)]
    dump_blocks: Option<String>,

    /// Write a JSON report (metrics, risks, answers) to this path
    #[arg(short, long)]
    output: Option<String>,

    /// Enable detailed profiling of all pipeline steps
    #[arg(long)]
    profile: bool,

    /// Show available config options and exit
    #[arg(long)]
    show_configs: bool,
}

/// Everything a run produced, as written by `--output`.
#[derive(Serialize)]
struct Report<'a> {
    document: &'a Path,
    session_id: String,
    created_at: String,
    generated_at: String,
    role: &'static str,
    metrics: &'a MetricsRecord,
    risks: Option<&'a RiskSummary>,
    answers: &'a [AnswerRecord],
    history: &'a [ChatTurn],
}

#[derive(Serialize)]
struct AnswerRecord {
    question: String,
    answer: Option<String>,
    sources: Vec<SourceRef>,
    error: Option<String>,
}

const QUERY_FAILED: &str = "An error occurred while processing your request.";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    println!("🦀 FinLens Filing Analyzer");

    if args.show_configs {
        show_help();
        return Ok(());
    }

    let Some(input) = args.input.as_deref() else {
        println!("⚠️  No input file given. Use --input <path> (see --show-configs).");
        return Ok(());
    };
    if !Path::new(input).exists() {
        println!("⚠️  Input file not found at: {}", input);
        println!("   Please check the file path.");
        return Ok(());
    }

    let mut config = load_config(args.config.as_deref());
    if let Some(top_k) = args.top_k {
        config.retrieval.top_k = top_k;
    }
    if let Some(mode) = args.response_mode {
        config.retrieval.response_mode = mode;
    }

    println!("📄 Processing: {}", input);

    if let Some(dump_path) = &args.dump_blocks {
        return dump_blocks(&config, Path::new(input), dump_path);
    }

    let analyzer = create_analyzer(config)?;
    println!("🚀 Using model: {}", analyzer.config().llm.default_model);
    let mut profiler = StepProfiler::new(args.profile);
    // No bar when stderr is piped
    let progress = if io::stderr().is_terminal() {
        BarProgress::new()
    } else {
        BarProgress::hidden()
    };
    let options = AnalysisOptions {
        skip_metrics: args.skip_metrics,
        skip_risks: args.skip_risks,
    };

    let outcome = match analyzer.analyze(
        Path::new(input),
        options,
        &progress,
        &CancellationToken::new(),
        &mut profiler,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("❌ Processing failed: {e}");
            std::process::exit(1);
        }
    };

    println!("✅ Document processed ({} content blocks)", outcome.block_count);

    let mut session = outcome.session;
    session.set_role(Role::from_label(&args.role));
    if args.alternate_model {
        session.options_mut().backend = ModelBackend::Alternate;
    }
    println!("🎭 Role: {}", session.role());

    if !args.skip_metrics {
        if outcome.metrics_error.is_some() {
            println!("⚠️  Key metrics could not be extracted.");
        }
        println!("\n{}", render_metrics(session.metrics()));
    }
    if !args.skip_risks {
        if outcome.risk_error.is_some() {
            println!("⚠️  Risk factors could not be summarized.");
        }
        println!("\n{}", render_risks(session.risks()));
    }

    let mut answers = Vec::new();
    for question in &args.question {
        println!("\n❓ {}", question);
        answers.push(ask(&mut session, question));
    }

    if args.interactive {
        chat_loop(&mut session, &mut answers)?;
    }

    if let Some(output_path) = &args.output {
        save_report(&session, &answers, output_path)?;
    }

    profiler.print_summary();
    Ok(())
}

/// `--config`, then `<config dir>/finlens/config.yaml`, then defaults.
fn load_config(explicit: Option<&str>) -> AnalyzerConfig {
    if let Some(path) = explicit {
        println!("📋 Loaded config from: {}", path);
        return AnalyzerConfig::load_with_fallback(Some(path));
    }

    let user_config: Option<PathBuf> = dirs::config_dir()
        .map(|dir| dir.join("finlens").join("config.yaml"))
        .filter(|path| path.exists());
    match user_config {
        Some(path) => {
            println!("📋 Loaded config from: {}", path.display());
            AnalyzerConfig::load_with_fallback(path.to_str())
        }
        None => {
            println!("📋 Using default config");
            AnalyzerConfig::default()
        }
    }
}

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn create_analyzer(config: AnalyzerConfig) -> Result<DocumentAnalyzer> {
    let Some(llm_key) = env_key(&config.llm.api_key_env) else {
        bail!(
            "No API key found. Set {} to use the language model.",
            config.llm.api_key_env
        );
    };

    let embedding_key = match config.embedding.provider {
        EmbeddingProvider::Local => None,
        EmbeddingProvider::OpenAi => Some(env_key(&config.embedding.api_key_env).with_context(|| {
            format!(
                "embedding provider is openai but {} is not set",
                config.embedding.api_key_env
            )
        })?),
    };

    let embedder: Arc<dyn Embedder> =
        Arc::from(embedder_from_config(&config.embedding, embedding_key.as_deref()));
    let llm = Arc::new(OpenRouterClient::new(&config.llm, llm_key));
    Ok(DocumentAnalyzer::new(config, embedder, llm))
}

fn ask(session: &mut AnalysisSession, question: &str) -> AnswerRecord {
    match session.ask(question) {
        Ok(response) => {
            println!("{}", render_answer(&response));
            AnswerRecord {
                question: question.to_string(),
                answer: Some(response.answer),
                sources: response.sources,
                error: None,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "question failed");
            println!("❌ {}", QUERY_FAILED);
            AnswerRecord {
                question: question.to_string(),
                answer: None,
                sources: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

fn chat_loop(session: &mut AnalysisSession, answers: &mut Vec<AnswerRecord>) -> Result<()> {
    println!("\n💬 Ask about the document. Commands: /role <name>, /clear, /quit");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line.context("failed to read from stdin")?;
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_history();
                println!("🧹 Chat history cleared");
            }
            _ if line.starts_with("/role") => {
                let role = Role::from_label(line.trim_start_matches("/role"));
                session.set_role(role);
                println!("🎭 Role: {}", role);
            }
            question => answers.push(ask(session, question)),
        }
    }
    Ok(())
}

fn dump_blocks(config: &AnalyzerConfig, input: &Path, output_path: &str) -> Result<()> {
    let blocks = match ContentExtractor::new(&config.extraction).extract(input) {
        Ok(blocks) => blocks,
        Err(e) => {
            eprintln!("❌ Extraction failed: {e}");
            std::process::exit(1);
        }
    };
    let json = serde_json::to_string_pretty(&blocks)?;
    std::fs::write(output_path, json).with_context(|| format!("failed to write {output_path}"))?;
    println!("💾 {} content blocks saved to: {}", blocks.len(), output_path);
    Ok(())
}

fn save_report(session: &AnalysisSession, answers: &[AnswerRecord], output_path: &str) -> Result<()> {
    let report = Report {
        document: session.document(),
        session_id: session.id().to_string(),
        created_at: session.created_at().to_rfc3339(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        role: session.role().label(),
        metrics: session.metrics(),
        risks: session.risks(),
        answers,
        history: session.history().turns(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(output_path, json).with_context(|| format!("failed to write {output_path}"))?;
    println!("💾 Report saved to: {}", output_path);
    Ok(())
}

fn show_help() {
    println!("\n📋 Available Configuration Options:");
    println!("  --input <path>          Filing to analyze (.pdf or .txt)");
    println!("  --config <path>         Load custom config file");
    println!("  --role <name>           beginner, analyst or investor (default: beginner)");
    println!("  --question <text>       Question to ask (repeatable)");
    println!("  --interactive           Chat on stdin: /role <name>, /clear, /quit");
    println!("  --alternate-model       Answer with llm.alternate_model");
    println!("  --top-k <n>             Chunks retrieved per question");
    println!("  --response-mode <mode>  compact or tree-summarize");
    println!("  --skip-metrics          Skip key metrics extraction");
    println!("  --skip-risks            Skip the risk factor summary");
    println!("  --dump-blocks <path>    Write extracted content blocks as JSON and exit");
    println!("  --output <path>         Write a JSON report of the run");
    println!("  --profile               Print per-stage timings");

    println!("\n🎭 Roles:");
    for role in Role::ALL {
        println!("  {}", role.label());
    }

    println!("\n🔑 Environment:");
    println!("  OPENROUTER_API_KEY      Language model key (llm.api_key_env)");
    println!("  OPENAI_API_KEY          Only for embedding.provider: openai");
    println!("  RUST_LOG                Log filter, e.g. RUST_LOG=finlens_core=debug");

    println!("\n📁 User config: <config dir>/finlens/config.yaml");

    println!("\n📝 Usage Examples:");
    println!("  finlens -i 10k.pdf -q \"What was revenue growth?\"");
    println!("  finlens -i 10k.pdf -r analyst --interactive");
    println!("  finlens -i 10k.pdf --dump-blocks blocks.json");
}
