use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragfuse_core::chunking;
use ragfuse_core::config::{expand_path, Config, Settings};
use ragfuse_core::data_processor::DataProcessor;
use ragfuse_core::traits::{Embedder, SearchIndex};
use ragfuse_core::types::Document;
use ragfuse_embed::get_default_embedder;
use ragfuse_hybrid::Retriever;
use ragfuse_text::Bm25Index;
use ragfuse_vector::VectorIndex;

const DEFAULT_TXT_DIR: &str = "./data/txt";
const INSERT_BATCH: usize = 256;

struct Options {
    json: bool,
    k: Option<usize>,
    positional: Vec<String>,
}

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {prog} chunk [dir] [--json]");
    eprintln!("       {prog} search <query> [dir] [-k N] [--json]");
    std::process::exit(1);
}

fn parse_args() -> anyhow::Result<(String, Options)> {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        usage(&prog);
    }
    let cmd = args.remove(0);

    let mut opts = Options { json: false, k: None, positional: vec![] };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => opts.json = true,
            "-k" | "--k" => {
                let value = args.get(i + 1).context("-k requires a number")?;
                opts.k = Some(value.parse().with_context(|| format!("-k requires a number, got {value:?}"))?);
                i += 1;
            }
            "-h" | "--help" => usage(&prog),
            other if other.starts_with('-') => bail!("unknown flag {other}"),
            other => opts.positional.push(other.to_string()),
        }
        i += 1;
    }
    Ok((cmd, opts))
}

fn data_dir(settings: &Settings, arg: Option<&String>) -> PathBuf {
    match arg {
        Some(dir) => expand_path(dir),
        None => expand_path(settings.data.txt_dir.as_deref().unwrap_or(DEFAULT_TXT_DIR)),
    }
}

fn build_retriever(settings: &Settings) -> anyhow::Result<Retriever> {
    let bm25 = Bm25Index::from_settings(&settings.bm25)?;
    let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&settings.vector)?);
    let vector = VectorIndex::from_settings(&settings.vector, embedder);
    let indexes: Vec<Arc<dyn SearchIndex>> = vec![Arc::new(bm25), Arc::new(vector)];
    Ok(Retriever::from_settings(indexes, settings.retriever.clone())?)
}

fn index_documents(retriever: &Retriever, docs: Vec<Document>) -> anyhow::Result<()> {
    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let mut docs = docs.into_iter().peekable();
    while docs.peek().is_some() {
        let batch: Vec<Document> = docs.by_ref().take(INSERT_BATCH).collect();
        let n = batch.len() as u64;
        retriever.insert(batch)?;
        pb.inc(n);
    }
    pb.finish_with_message("indexed");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = Config::load()?;
    let settings = config.settings().context("invalid configuration")?;
    let (cmd, opts) = parse_args()?;
    let processor = DataProcessor::with_chunker(chunking::from_settings(&settings.chunking)?);

    match cmd.as_str() {
        "chunk" => {
            let dir = data_dir(&settings, opts.positional.first());
            let chunks = processor
                .process_directory(&dir)
                .with_context(|| format!("failed to chunk {}", dir.display()))?;
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&chunks)?);
            } else {
                for c in &chunks {
                    println!("{}\t{}..{}\t{} chars", c.id(), c.start, c.end(), c.text.chars().count());
                }
                println!("{} chunks", chunks.len());
            }
        }
        "search" => {
            let Some(query) = opts.positional.first() else { bail!("search requires a query") };
            let dir = data_dir(&settings, opts.positional.get(1));

            let chunks = processor
                .process_directory(&dir)
                .with_context(|| format!("failed to chunk {}", dir.display()))?;
            let retriever = build_retriever(&settings)?;
            index_documents(&retriever, chunks.into_iter().map(|c| c.into_document()).collect())?;

            info!(query = %query, k = opts.k.unwrap_or(retriever.settings().k), "searching");
            let hits = match opts.k {
                Some(k) => retriever.retrieve(query, k)?,
                None => retriever.retrieve_default(query)?,
            };
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                for (rank, hit) in hits.iter().enumerate() {
                    let preview: String = hit.document.content.chars().take(200).collect();
                    println!("{}. {} (score {:.5})\n{}\n---", rank + 1, hit.id(), hit.score, preview);
                }
                if hits.is_empty() {
                    println!("no results");
                }
            }
        }
        other => bail!("unknown command {other:?}"),
    }
    Ok(())
}
