//! Chunked summarization / extraction pipeline
//!
//! Turns an arbitrarily large document into a bounded number of inference
//! calls: greedy whitespace-token chunking under a character budget, one
//! call per chunk in original order, and a final combine call when more
//! than one chunk was produced. Character length is a proxy for the model
//! token budget; the bound is approximate by design.
//!
//! Mode (`summarize` vs `extract`) changes prompt wording only, never
//! control flow.

use crate::llm::TextGenerator;
use sdk::errors::CoreError;
use sdk::types::DigestMode;
use std::sync::Arc;
use tracing::{debug, info};

/// Separator between partial outputs in the combine call input
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Split text into whitespace-token chunks of at most `budget` characters.
///
/// Chunks partition the token sequence in original order with no overlap
/// and no gaps. Tokens are never split: a single token longer than the
/// budget becomes its own oversized chunk (content integrity wins over
/// strict budget adherence).
pub fn split_chunks(text: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for token in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(token);
        } else if current.len() + 1 + token.len() > budget {
            chunks.push(std::mem::take(&mut current));
            current.push_str(token);
        } else {
            current.push(' ');
            current.push_str(token);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Map-reduce digest pipeline over the inference collaborator
pub struct DigestPipeline {
    generator: Arc<dyn TextGenerator>,
    chunk_budget_chars: usize,
    max_output_tokens: u32,
}

impl DigestPipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        chunk_budget_chars: usize,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            generator,
            chunk_budget_chars,
            max_output_tokens,
        }
    }

    /// Digest `raw_text` in the given mode.
    ///
    /// Small documents take one inference call. Oversized documents are
    /// chunked; each chunk call is independent of the others and they are
    /// issued and collected in original order, then merged by a single
    /// combine call, skipped when chunking produced only one chunk to
    /// avoid a redundant round trip.
    pub async fn run(&self, raw_text: &str, mode: DigestMode) -> Result<String, CoreError> {
        if raw_text.len() <= self.chunk_budget_chars {
            debug!("Document fits budget; single {} call", mode);
            let output = self
                .generator
                .generate(&whole_prompt(mode), raw_text, self.max_output_tokens)
                .await?;
            return Ok(output);
        }

        let chunks = split_chunks(raw_text, self.chunk_budget_chars);
        let total = chunks.len();
        info!(
            "Document of {} chars split into {} chunks for {}",
            raw_text.len(),
            total,
            mode
        );

        let mut partials = Vec::with_capacity(total);
        for (index, chunk) in chunks.iter().enumerate() {
            let output = self
                .generator
                .generate(
                    &part_prompt(mode, index + 1, total),
                    chunk,
                    self.max_output_tokens,
                )
                .await?;
            partials.push(output);
        }

        // Degenerate cases: zero or one chunk needs no merge
        if partials.len() <= 1 {
            return Ok(partials.pop().unwrap_or_default());
        }

        let combined_input = partials.join(SECTION_SEPARATOR);
        let output = self
            .generator
            .generate(
                &combine_prompt(mode, total),
                &combined_input,
                self.max_output_tokens,
            )
            .await?;

        Ok(output)
    }
}

fn mode_task(mode: DigestMode) -> &'static str {
    match mode {
        DigestMode::Summarize => {
            "Summarize the lecture material thoroughly, covering every major \
             topic, definition, and example"
        }
        DigestMode::Extract => {
            "Extract the key concepts from the lecture material. For each \
             concept, give a short name and a concise explanation grounded in \
             the text"
        }
    }
}

fn whole_prompt(mode: DigestMode) -> String {
    format!(
        "You are a study assistant. {}. Format the output as well-structured \
         Markdown.",
        mode_task(mode)
    )
}

fn part_prompt(mode: DigestMode, part: usize, total: usize) -> String {
    format!(
        "You are a study assistant. The lecture material is split into {total} \
         parts; this is part {part} of {total}. {}. Cover only this section, \
         thoroughly. Format the output as well-structured Markdown.",
        mode_task(mode)
    )
}

fn combine_prompt(mode: DigestMode, total: usize) -> String {
    let artifact = match mode {
        DigestMode::Summarize => "partial summaries",
        DigestMode::Extract => "partial concept lists",
    };
    format!(
        "You are a study assistant. You are given {total} {artifact} of one \
         lecture, in order, separated by '---'. Merge them into a single \
         cohesive, de-duplicated, well-structured Markdown document, \
         preserving the order of topics."
    )
}
