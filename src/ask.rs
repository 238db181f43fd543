//! Query-side commands: `crag search`, `crag ask`, and `crag chat`.
//!
//! Search prints ranked hits. Ask answers one question, through the
//! configured generator when one is available and as extractive snippets
//! otherwise. Chat is a line-oriented loop over stdin that answers each
//! question in turn.

use anyhow::{bail, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use corpus_rag_core::generate::Generator;
use corpus_rag_core::retrieve::{self, snippet};

use crate::config::Config;
use crate::generate::create_generator;
use crate::sqlite_store::SqliteStore;
use crate::stats;

const SEARCH_SNIPPET_CHARS: usize = 200;

async fn open_for_query(config: &Config) -> Result<SqliteStore> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled; set [embedding].provider to search the index");
    }
    SqliteStore::from_config(config).await
}

/// Print up to `limit` ranked hits for `query`.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let store = open_for_query(config).await?;
    let k = limit.unwrap_or(config.retrieval.top_k);
    let result = retrieve::search(&store, query, k).await;
    store.close().await;
    let hits = result?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (chunk {})",
            i + 1,
            hit.score,
            hit.metadata.file_path,
            hit.metadata.chunk_index
        );
        let preview = snippet(&hit.text, SEARCH_SNIPPET_CHARS).replace('\n', " ");
        println!("    {}", preview);
        println!();
    }
    Ok(())
}

/// Answer a single question and print it.
pub async fn run_ask(config: &Config, question: &str, k: Option<usize>) -> Result<()> {
    let store = open_for_query(config).await?;
    let generator = create_generator(&config.generation)?;
    let k = k.unwrap_or(config.retrieval.top_k);
    let result = ask_once(config, &store, generator.as_deref(), question, k).await;
    store.close().await;
    println!("{}", result?);
    Ok(())
}

async fn ask_once(
    config: &Config,
    store: &SqliteStore,
    generator: Option<&dyn Generator>,
    question: &str,
    k: usize,
) -> Result<String> {
    let answer = retrieve::answer(store, generator, question, k).await?;
    Ok(answer.render(config.retrieval.snippet_chars))
}

#[derive(Debug, PartialEq, Eq)]
enum ChatCommand<'a> {
    Quit,
    Stats,
    Skip,
    Question(&'a str),
}

fn parse_chat_line(line: &str) -> ChatCommand<'_> {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "" => ChatCommand::Skip,
        "quit" | "exit" | "bye" | "q" => ChatCommand::Quit,
        "stats" | "status" | "info" => ChatCommand::Stats,
        _ => ChatCommand::Question(trimmed),
    }
}

/// Interactive question loop over stdin.
pub async fn run_chat(config: &Config) -> Result<()> {
    let store = open_for_query(config).await?;
    let generator: Option<Arc<dyn Generator>> = create_generator(&config.generation)?;
    let k = config.retrieval.top_k;

    println!("Ask questions about the indexed corpus.");
    println!("Commands: 'stats' shows index stats, 'quit' exits.");
    if generator.is_none() {
        println!("Answer generation is disabled; showing matching passages.");
    }
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e.into()),
        };

        match parse_chat_line(&line) {
            ChatCommand::Skip => continue,
            ChatCommand::Quit => break Ok(()),
            ChatCommand::Stats => {
                if let Err(e) = stats::print_stats(config, &store).await {
                    eprintln!("Error: {:#}", e);
                }
            }
            ChatCommand::Question(q) => {
                match ask_once(config, &store, generator.as_deref(), q, k).await {
                    Ok(text) => println!("\n{}\n", text),
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
        }
    };

    store.close().await;
    println!("Goodbye.");
    result
}
