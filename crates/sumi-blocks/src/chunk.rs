//! Size-driven batching for remote append requests.
//!
//! The remote API bounds every append call twice: at most
//! `max_blocks_per_request` blocks (counted recursively, children included)
//! and at most `max_text_len_per_block` characters per rich-text run. The
//! chunker normalizes a document against both limits and then packs the
//! result into ordered batches with greedy linear packing.
//!
//! Invariant: concatenating all batches in order and flattening reproduces
//! the document's content exactly: splits never change a block's kind,
//! corrupt text, or reorder anything.

use thiserror::Error;

use crate::block::{Block, Document, TextRun};

/// Remote request limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Maximum blocks per append call, counted recursively.
    pub max_blocks_per_request: usize,
    /// Maximum characters per rich-text run.
    pub max_text_len_per_block: usize,
}

impl Default for Limits {
    // Notion's documented request limits.
    fn default() -> Self {
        Self {
            max_blocks_per_request: 100,
            max_text_len_per_block: 2000,
        }
    }
}

/// Limits that no amount of splitting can satisfy. Raised before any remote
/// call is issued.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SizeError {
    #[error("max_blocks_per_request must be at least 1")]
    ZeroBlockLimit,
    #[error("max_text_len_per_block must be at least 1")]
    ZeroTextLimit,
}

/// Split a document into ordered, API-legal batches.
pub fn chunk(document: &Document, limits: &Limits) -> Result<Vec<Vec<Block>>, SizeError> {
    if limits.max_blocks_per_request == 0 {
        return Err(SizeError::ZeroBlockLimit);
    }
    if limits.max_text_len_per_block == 0 {
        return Err(SizeError::ZeroTextLimit);
    }

    let mut normalized: Vec<Block> = Vec::new();
    for block in &document.blocks {
        for sized in split_text(block, limits.max_text_len_per_block) {
            normalized.extend(split_weight(sized, limits.max_blocks_per_request));
        }
    }

    let mut batches: Vec<Vec<Block>> = Vec::new();
    let mut current: Vec<Block> = Vec::new();
    let mut weight = 0usize;
    for block in normalized {
        let w = block.count_recursive();
        if !current.is_empty() && weight + w > limits.max_blocks_per_request {
            batches.push(std::mem::take(&mut current));
            weight = 0;
        }
        weight += w;
        current.push(block);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}

/// Split any run longer than `limit` characters, producing sibling blocks of
/// the same kind. Each piece beyond the first starts a new sibling; children
/// stay with the last sibling so document order is preserved.
fn split_text(block: &Block, limit: usize) -> Vec<Block> {
    let children: Vec<Block> = block
        .children
        .iter()
        .flat_map(|child| split_text(child, limit))
        .collect();

    let mut siblings: Vec<Block> = Vec::new();
    let mut current_runs: Vec<TextRun> = Vec::new();
    for run in &block.rich_text {
        for (idx, piece) in split_run(&run.content, limit).into_iter().enumerate() {
            if idx > 0 {
                siblings.push(sibling_of(block, std::mem::take(&mut current_runs)));
            }
            current_runs.push(TextRun::styled(piece, run.annotations));
        }
    }

    let mut last = sibling_of(block, current_runs);
    last.children = children;
    siblings.push(last);
    siblings
}

/// A new block of the same kind (and companion fields), with the given runs.
fn sibling_of(block: &Block, rich_text: Vec<TextRun>) -> Block {
    let mut sibling = Block::new(block.kind, rich_text);
    sibling.language = block.language.clone();
    sibling.checked = block.checked;
    sibling
}

/// Split run content into pieces of at most `limit` characters, preferring
/// the nearest whitespace boundary at or before the limit and falling back
/// to a hard split. Concatenating the pieces reproduces the input exactly.
fn split_run(content: &str, limit: usize) -> Vec<String> {
    if content.chars().count() <= limit {
        return vec![content.to_string()];
    }
    let chars: Vec<char> = content.chars().collect();
    let mut pieces: Vec<String> = Vec::new();
    let mut start = 0usize;
    while chars.len() - start > limit {
        let window_end = start + limit;
        let split_at = chars[start..window_end]
            .iter()
            .rposition(|c| c.is_whitespace())
            .map(|ws| start + ws + 1)
            .unwrap_or(window_end);
        pieces.push(chars[start..split_at].iter().collect());
        start = split_at;
    }
    pieces.push(chars[start..].iter().collect());
    pieces
}

/// Split a block whose recursive count alone exceeds the request limit by
/// moving children into follow-up siblings of identical kind, in order. The
/// first sibling keeps the block's own text.
fn split_weight(block: Block, limit: usize) -> Vec<Block> {
    if block.count_recursive() <= limit {
        return vec![block];
    }
    let child_budget = limit.saturating_sub(1).max(1);
    let kind = block.kind;
    let language = block.language.clone();
    let checked = block.checked;

    let mut out: Vec<Block> = Vec::new();
    let mut current = Block::new(kind, block.rich_text);
    current.language = language.clone();
    current.checked = checked;
    let mut weight = 1usize;

    for child in block.children {
        for piece in split_weight(child, child_budget) {
            let w = piece.count_recursive();
            if weight + w > limit && !current.children.is_empty() {
                let mut next = Block::new(kind, Vec::new());
                next.language = language.clone();
                next.checked = checked;
                out.push(std::mem::replace(&mut current, next));
                weight = 1;
            }
            current.children.push(piece);
            weight += w;
        }
    }
    out.push(current);
    out
}

// ── Tests ────────────────────────────────────────────────────────────────
