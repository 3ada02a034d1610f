//! oracle-rag: query and grow the Oracle knowledge base from the command line.
//!
//! Usage:
//!   oracle-rag stats
//!   oracle-rag query "index lent performance" -n 3 --category performance
//!   oracle-rag add "texte..." --category custom --topic my_note
//!   oracle-rag import ./notes
//!   oracle-rag probe
//!   oracle-rag context "Comment configurer RMAN ?"
//!   oracle-rag analysis awr

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rag_core::config::Config;
use rag_core::{Category, Meta, QueryResult};
use rag_retrieval::{snippet, KnowledgeBase};

#[derive(Parser)]
#[command(name = "oracle-rag", version, about = "Oracle knowledge base retrieval")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Document counts per category and topic
    Stats,
    /// Retrieve the documents most relevant to a query
    Query {
        text: String,
        #[arg(short = 'n', long)]
        results: Option<usize>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Add a custom document
    Add {
        content: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        severity: Option<String>,
    },
    /// Import every .txt file under a directory
    Import { dir: PathBuf },
    /// Run diagnostic queries (defaults when none given)
    Probe { queries: Vec<String> },
    /// Show the augmented prompt a generator would receive
    Context { prompt: String },
    /// Best-practice documents for analysing a kind of output (awr, rman, ...)
    Analysis { kind: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug,lance=info,lancedb=info" } else { "info,lance=warn,lancedb=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Config::load()?.settings()?;
    let kb = KnowledgeBase::initialize(settings);
    tracing::info!("📚 Knowledge base tier: {}", kb.tier());

    match cli.command {
        Command::Stats => {
            let stats = kb.stats();
            if cli.json { println!("{}", serde_json::to_string_pretty(&stats)?); return Ok(()); }
            println!("📊 {} documents", stats.total_documents);
            for (category, count) in &stats.categories { println!("  {:<16} {}", category, count); }
        }
        Command::Query { text, results, category } => {
            let n = results.unwrap_or(kb.settings().retrieval.default_results);
            let hits = match category {
                Some(c) => kb.search_by_category(c.parse::<Category>()?, &text, n),
                None => kb.retrieve_context(&text, n),
            };
            print_results(&hits, cli.json)?;
        }
        Command::Add { content, category, topic, severity } => {
            let mut extra = Meta::new();
            if let Some(s) = severity { extra.insert("severity".into(), s); }
            let id = kb.add_custom_document(&content, category.parse::<Category>()?, &topic, &extra)?;
            if cli.json { println!("{}", serde_json::json!({ "id": id })); } else { println!("✅ Added {}", id); }
        }
        Command::Import { dir } => {
            let report = kb.import_directory(&dir)?;
            if cli.json { println!("{}", serde_json::to_string_pretty(&report)?); return Ok(()); }
            println!("✅ Imported {} chunks from {} files ({} rejected)", report.added, report.files, report.rejected);
        }
        Command::Probe { queries } => {
            let queries: Vec<&str> = queries.iter().map(String::as_str).collect();
            let probes = kb.test_retrieval(&queries);
            if cli.json { println!("{}", serde_json::to_string_pretty(&probes)?); return Ok(()); }
            for p in probes {
                let tops: Vec<String> = p.top_topics.iter().zip(&p.scores).map(|(t, s)| format!("{} ({:.3})", t, s)).collect();
                println!("🔎 {:<32} found {}  {}", p.query, p.found, tops.join(", "));
            }
        }
        Command::Context { prompt } => {
            let (text, docs) = kb.augmented_prompt(&prompt);
            if cli.json { println!("{}", serde_json::json!({ "prompt": text, "context_documents": docs.len() })); } else { println!("{}", text); }
        }
        Command::Analysis { kind } => {
            let (summary, docs) = kb.analysis_context(&kind);
            if cli.json { println!("{}", serde_json::json!({ "summary": summary, "documents": docs })); return Ok(()); }
            if docs.is_empty() { println!("No matching documents"); } else { println!("{}", summary); }
        }
    }
    Ok(())
}

fn print_results(hits: &[QueryResult], json: bool) -> Result<()> {
    if json { println!("{}", serde_json::to_string_pretty(hits)?); return Ok(()); }
    if hits.is_empty() { println!("No matching documents"); return Ok(()); }
    for (i, r) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {} ({} / {}, {})", i + 1, r.score, r.document.id, r.category(), r.topic(), r.document.metadata.severity);
        println!("   {}", snippet(&r.document.content, 160).replace('\n', " "));
    }
    Ok(())
}
