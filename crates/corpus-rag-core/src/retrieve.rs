//! Similarity retrieval and question answering.
//!
//! [`search`] asks the store for the `k` nearest records and converts the
//! store's cosine distance into a similarity score (`1 - distance`). The
//! store owns nearest-neighbour ranking; results keep its order.
//!
//! [`answer`] builds a labelled context from the hits and, when a
//! [`Generator`] is available, asks it for a synthesized answer. The
//! outcome is an [`Answer`]:
//!
//! - no hits: [`Answer::NoInformation`], distinct from an error
//! - no generator: [`Answer::Extractive`], the top snippets themselves
//! - generator succeeded: [`Answer::Generated`], with the ranked sources
//! - generator failed: [`Answer::GenerationFailed`], still carrying the
//!   retrieved context
//!
//! A failing store query is returned as `Err`, never folded into
//! `NoInformation`.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::generate::Generator;
use crate::models::{QueryHit, RecordMetadata};
use crate::store::IndexStore;

pub const NO_INFORMATION_MESSAGE: &str = "No relevant information found in the knowledge base.";

/// A ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
    /// `1 - distance`; higher is more similar.
    pub score: f64,
}

impl From<QueryHit> for SearchHit {
    fn from(hit: QueryHit) -> Self {
        Self {
            id: hit.id,
            text: hit.text,
            metadata: hit.metadata,
            score: 1.0 - hit.distance,
        }
    }
}

/// Retrieve up to `k` records for `query`, ordered by non-increasing score.
pub async fn search(store: &dyn IndexStore, query: &str, k: usize) -> Result<Vec<SearchHit>> {
    let query = query.trim();
    if query.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let mut hits: Vec<SearchHit> = store
        .query(query, k)
        .await?
        .into_iter()
        .map(SearchHit::from)
        .collect();
    hits.truncate(k);
    debug!(query, k, returned = hits.len(), "similarity search");
    Ok(hits)
}

/// Result of answering a question.
#[derive(Debug, Clone)]
pub enum Answer {
    NoInformation,
    Extractive {
        hits: Vec<SearchHit>,
    },
    Generated {
        text: String,
        hits: Vec<SearchHit>,
    },
    GenerationFailed {
        error: String,
        context: String,
        hits: Vec<SearchHit>,
    },
}

impl Answer {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            Answer::NoInformation => &[],
            Answer::Extractive { hits }
            | Answer::Generated { hits, .. }
            | Answer::GenerationFailed { hits, .. } => hits,
        }
    }

    pub fn is_no_information(&self) -> bool {
        matches!(self, Answer::NoInformation)
    }

    /// Render the answer as display text. Extractive snippets are cut to
    /// `snippet_chars` characters.
    pub fn render(&self, snippet_chars: usize) -> String {
        match self {
            Answer::NoInformation => NO_INFORMATION_MESSAGE.to_string(),
            Answer::Extractive { hits } => {
                let mut out = String::from("Search results (answer generation disabled)\n\n");
                out.push_str(&format!("Found {} relevant documents:\n\n", hits.len()));
                for (i, hit) in hits.iter().enumerate() {
                    out.push_str(&format!(
                        "Source {}: {} (relevance: {})\n{}\n\n",
                        i + 1,
                        hit.metadata.file_name,
                        percent(hit.score),
                        snippet(&hit.text, snippet_chars)
                    ));
                }
                out.trim_end().to_string()
            }
            Answer::Generated { text, hits } => {
                format!("{}\n\nSources:\n{}", text.trim_end(), format_sources(hits))
            }
            Answer::GenerationFailed {
                error,
                context,
                hits,
            } => format!(
                "Error generating answer: {}\n\nRetrieved context:\n{}\n\nSources:\n{}",
                error,
                context,
                format_sources(hits)
            ),
        }
    }
}

/// Answer `question` from the top `k` records, optionally through `generator`.
pub async fn answer(
    store: &dyn IndexStore,
    generator: Option<&dyn Generator>,
    question: &str,
    k: usize,
) -> Result<Answer> {
    let hits = search(store, question, k).await?;
    if hits.is_empty() {
        return Ok(Answer::NoInformation);
    }

    let Some(generator) = generator else {
        return Ok(Answer::Extractive { hits });
    };

    let context = build_context(&hits);
    let prompt = build_prompt(question, &context);
    match generator.generate(&prompt).await {
        Ok(text) => Ok(Answer::Generated { text, hits }),
        Err(e) => {
            warn!(generator = generator.name(), error = %e, "generation failed, returning retrieved context");
            Ok(Answer::GenerationFailed {
                error: format!("{:#}", e),
                context,
                hits,
            })
        }
    }
}

/// Concatenate hits into a context block, each labelled with its source
/// path and relevance.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[Document {}: {} | Relevance: {:.2}]\n{}",
                i + 1,
                hit.metadata.file_path,
                hit.score,
                hit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Based on the following documentation, answer the question thoroughly and accurately.

CONTEXT DOCUMENTS:
{context}

QUESTION: {question}

INSTRUCTIONS:
- Answer strictly from the context provided
- If the context does not contain enough information, say so
- Reference the source documents where possible
- Be concise but thorough"
    )
}

/// Numbered source list, one line per hit.
pub fn format_sources(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "  {}. {} (relevance: {})",
                i + 1,
                hit.metadata.file_path,
                percent(hit.score)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn percent(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}
