//! Document chunking for embedding generation
//!
//! Splits document text into bounded, overlapping segments. The splitter walks a
//! separator hierarchy from coarse to fine (blank-line runs, newlines, spaces, then
//! single characters) and greedily merges the pieces back up to the target size.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Approximate characters per token used for size estimates
pub const CHARS_PER_TOKEN: usize = 4;

/// Slack allowed above `max_tokens` for a stored chunk
pub const TOKEN_MARGIN: usize = 50;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("Overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },
}

/// Estimate the token count of `text`
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Configuration for the text chunker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Target chunk size in tokens
    pub max_tokens: usize,
    /// Tokens repeated at the start of the next chunk
    pub overlap_tokens: usize,
    /// Split points, coarsest first. An empty string splits into characters.
    pub separators: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 50,
            separators: ["\n\n\n", "\n\n", "\n", " ", ""]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ChunkerConfig {
    pub fn with_tokens(max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens,
            ..Self::default()
        }
    }

    fn max_chars(&self) -> usize {
        self.max_tokens * CHARS_PER_TOKEN
    }

    fn overlap_chars(&self) -> usize {
        self.overlap_tokens * CHARS_PER_TOKEN
    }
}

/// Recursive separator-based text splitter
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self, ChunkerError> {
        if config.max_tokens == 0 {
            return Err(ChunkerError::ZeroChunkSize);
        }
        if config.overlap_tokens >= config.max_tokens {
            return Err(ChunkerError::OverlapTooLarge {
                overlap: config.overlap_tokens,
                size: config.max_tokens,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `text` into ordered segments. Empty or whitespace-only input yields none.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let max = self.config.max_chars();

        let Some((separator, finer)) = pick_separator(text, separators) else {
            // No separator occurs in the text: it is atomic at this level
            let trimmed = text.trim();
            return if trimmed.is_empty() {
                vec![]
            } else {
                vec![trimmed.to_string()]
            };
        };

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= max {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending, separator));
                pending.clear();
            }

            if finer.is_empty() {
                // Oversized piece with nothing finer to split on
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending, separator));
        }

        chunks
    }

    /// Greedily join pieces up to the target size, carrying `overlap` worth of
    /// trailing pieces into the next segment.
    fn merge_pieces(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let max = self.config.max_chars();
        let overlap = self.config.overlap_chars();
        let sep_len = char_len(separator);

        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + joiner + len > max && !window.is_empty() {
                push_joined(&mut merged, &window, separator);

                // Drop from the front until the remainder fits as overlap and leaves
                // room for the incoming piece.
                while total > overlap || (total > 0 && total + sep_len + len > max) {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                    if !window.is_empty() {
                        total -= sep_len;
                    }
                }
            }

            if !window.is_empty() {
                total += sep_len;
            }
            window.push_back(piece);
            total += len;
        }

        push_joined(&mut merged, &window, separator);
        merged
    }
}

/// First separator present in `text`, with the finer separators that follow it.
/// An empty separator always matches and has nothing finer.
fn pick_separator<'a>(text: &str, separators: &'a [String]) -> Option<(&'a str, &'a [String])> {
    separators.iter().enumerate().find_map(|(i, sep)| {
        if sep.is_empty() {
            Some(("", &[][..]))
        } else if text.contains(sep.as_str()) {
            Some((sep.as_str(), &separators[i + 1..]))
        } else {
            None
        }
    })
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
