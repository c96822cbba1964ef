//! Retrieval and answer generation.
//!
//! [`answer`] embeds the question, fetches the nearest chunks, and asks the
//! generation service for an answer, either grounded in those chunks or
//! from the bare question. [`search`] is the retrieval half on its own.
//!
//! # Query expansion
//!
//! With `query_expansion` on, the model is first asked for a short
//! hypothetical answer and retrieval uses `"{question} {hypothetical}"`.
//! A failed expansion is logged and retrieval falls back to the question.
//!
//! # Grounding
//!
//! `Answer::grounded` is `true` only when retrieved chunks were placed in
//! the prompt. With augmentation off, or with nothing retrieved, the model
//! sees the bare question and the answer is reported as ungrounded.

use crate::config::Settings;
use crate::embedding::EmbeddingGateway;
use crate::error::{RagError, Result};
use crate::generation::{ChatMessage, GenerationGateway};
use crate::models::{Answer, ScoredChunk, SourceRef};
use crate::store::IndexHandle;

const EXPANSION_PROMPT: &str = "You are a helpful expert research assistant. \
Provide an example answer to the given question, that might be found in a document. \
Keep it brief and factual.";

const EXPANSION_MAX_TOKENS: u32 = 150;

/// Per-request knobs; unset request fields fall back to [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AskOptions {
    pub n_results: usize,
    pub use_augmentation: bool,
    pub query_expansion: bool,
}

impl AskOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            n_results: settings.n_results,
            use_augmentation: settings.use_augmentation,
            query_expansion: settings.query_expansion,
        }
    }
}

pub async fn answer(
    index: &IndexHandle,
    embeddings: &EmbeddingGateway,
    generation: &GenerationGateway,
    question: &str,
    options: AskOptions,
) -> Result<Answer> {
    let question = question.trim();
    if question.is_empty() {
        return Err(RagError::invalid("question must not be empty"));
    }
    if options.n_results == 0 {
        return Err(RagError::invalid("n_results must be > 0"));
    }

    let retrieval_text = if options.query_expansion {
        expand_query(generation, question).await
    } else {
        question.to_string()
    };

    let hits = retrieve(index, embeddings, &retrieval_text, options.n_results).await?;
    let grounded = options.use_augmentation && !hits.is_empty();
    let prompt = if grounded {
        grounded_prompt(question, &hits)
    } else {
        question.to_string()
    };

    tracing::debug!(
        retrieved = hits.len(),
        grounded,
        "generating answer"
    );
    let text = generation.complete(vec![ChatMessage::user(prompt)]).await?;

    Ok(Answer {
        answer: text,
        num_chunks: hits.len(),
        sources: hits
            .iter()
            .map(|h| SourceRef {
                source_path: h.source_path.clone(),
                position: h.position,
                score: h.score,
            })
            .collect(),
        relevant_chunks: hits.into_iter().map(|h| h.text).collect(),
        grounded,
    })
}

/// Retrieval only: the `k` chunks nearest to `query`.
pub async fn search(
    index: &IndexHandle,
    embeddings: &EmbeddingGateway,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(RagError::invalid("query must not be empty"));
    }
    if k == 0 {
        return Err(RagError::invalid("limit must be > 0"));
    }
    retrieve(index, embeddings, query, k).await
}

async fn retrieve(
    index: &IndexHandle,
    embeddings: &EmbeddingGateway,
    text: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let vector = embeddings.embed_query(text).await?;
    index.query(&vector, k).await
}

/// Ask the model for a hypothetical answer to steer retrieval.
async fn expand_query(generation: &GenerationGateway, question: &str) -> String {
    let messages = vec![
        ChatMessage::system(EXPANSION_PROMPT),
        ChatMessage::user(question),
    ];
    match generation
        .complete_with_limit(messages, EXPANSION_MAX_TOKENS)
        .await
    {
        Ok(hypothetical) => format!("{} {}", question, hypothetical),
        Err(e) => {
            tracing::warn!(error = %e, "query expansion failed, retrieving with the question alone");
            question.to_string()
        }
    }
}

/// The prompt used when answering from retrieved context.
pub fn grounded_prompt(question: &str, hits: &[ScoredChunk]) -> String {
    let context = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("[Context {}]\n{}", i + 1, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful assistant. Use the following context to answer the question accurately and concisely.

Context:
{context}

Question: {question}

Instructions:
- Answer based on the context provided
- Be specific and cite relevant details
- If the context doesn't contain enough information, say so
- Keep the answer clear and concise

Answer:"
    )
}
