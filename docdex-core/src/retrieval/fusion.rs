//! Ranking primitives: per-document max pooling and reciprocal rank fusion
//!
//! Both keep first-seen order for equal scores so results are deterministic.

use std::collections::HashMap;

/// Score of one chunk, as produced by a ranking path
#[derive(Debug, Clone)]
pub struct ChunkScore {
    pub doc_id: String,
    pub chunk_index: u32,
    pub chunk_text: String,
    pub score: f32,
}

/// Document-level score with the chunk that earned it
#[derive(Debug, Clone, PartialEq)]
pub struct DocScore {
    pub doc_id: String,
    pub score: f32,
    pub chunk_index: u32,
    pub snippet: String,
}

/// Collapse chunk scores to one score per document: the best chunk wins.
/// Output is sorted by descending score.
pub fn max_pool(scores: impl IntoIterator<Item = ChunkScore>) -> Vec<DocScore> {
    let mut pooled: Vec<DocScore> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for chunk in scores {
        match positions.get(&chunk.doc_id) {
            Some(&pos) => {
                let best = &mut pooled[pos];
                if chunk.score > best.score {
                    best.score = chunk.score;
                    best.chunk_index = chunk.chunk_index;
                    best.snippet = chunk.chunk_text;
                }
            }
            None => {
                positions.insert(chunk.doc_id.clone(), pooled.len());
                pooled.push(DocScore {
                    doc_id: chunk.doc_id,
                    score: chunk.score,
                    chunk_index: chunk.chunk_index,
                    snippet: chunk.chunk_text,
                });
            }
        }
    }

    sort_descending(&mut pooled);
    pooled
}

/// Reciprocal Rank Fusion: an item at 1-based rank `r` in any list adds `1 / (k + r)`.
///
/// Lists are consumed in order, so a document keeps the snippet of the first list
/// it appears in. No cutoff is applied here.
pub fn reciprocal_rank_fusion(lists: &[&[DocScore]], k: f32) -> Vec<DocScore> {
    let mut fused: Vec<DocScore> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for list in lists {
        for (rank, item) in list.iter().enumerate() {
            let contribution = 1.0 / (k + (rank + 1) as f32);
            match positions.get(item.doc_id.as_str()) {
                Some(&pos) => fused[pos].score += contribution,
                None => {
                    positions.insert(&item.doc_id, fused.len());
                    fused.push(DocScore {
                        score: contribution,
                        ..item.clone()
                    });
                }
            }
        }
    }

    sort_descending(&mut fused);
    fused
}

/// Stable sort, highest score first
fn sort_descending(scores: &mut [DocScore]) {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
}
