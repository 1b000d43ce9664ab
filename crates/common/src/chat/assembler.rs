//! Context Assembler - Builds the grounding block for answer generation
//!
//! Provides:
//! - Rank-ordered concatenation with an explicit chunk separator
//! - Character budget management (lowest-ranked chunks dropped first)

use super::retriever::RetrievedChunk;

/// Separator placed between consecutive chunks
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Grounding text plus what went into it
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// Joined chunk texts
    pub text: String,

    /// Chunks included (possibly the last one truncated)
    pub chunks_used: usize,

    /// Chunks left out by the budget
    pub chunks_dropped: usize,
}

/// Joins retrieved chunks under an optional character budget
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    /// Maximum characters in the assembled text (0 = unbounded)
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Assemble chunks in the order given (highest rank first)
    pub fn assemble(&self, chunks: &[RetrievedChunk]) -> AssembledContext {
        let mut text = String::new();
        let mut used_chars = 0;
        let mut chunks_used = 0;
        let separator_chars = CHUNK_SEPARATOR.chars().count();

        for chunk in chunks {
            let chunk_chars = chunk.text.chars().count();
            let needed = if chunks_used == 0 {
                chunk_chars
            } else {
                separator_chars + chunk_chars
            };

            if self.max_chars > 0 && used_chars + needed > self.max_chars {
                if chunks_used == 0 {
                    // Keep a truncated top chunk rather than no context at all
                    text.extend(chunk.text.chars().take(self.max_chars));
                    chunks_used = 1;
                }
                break;
            }

            if chunks_used > 0 {
                text.push_str(CHUNK_SEPARATOR);
            }
            text.push_str(&chunk.text);
            used_chars += needed;
            chunks_used += 1;
        }

        let chunks_dropped = chunks.len() - chunks_used;
        if chunks_dropped > 0 {
            tracing::debug!(
                chunks_used,
                chunks_dropped,
                max_chars = self.max_chars,
                "Context budget reached"
            );
        }

        AssembledContext {
            text,
            chunks_used,
            chunks_dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: text.to_string(),
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn test_joins_in_rank_order_with_separator() {
        let assembler = ContextAssembler::new(0);
        let ctx = assembler.assemble(&[chunk("first", 0.9), chunk("second", 0.5), chunk("first", 0.4)]);
        assert_eq!(ctx.text, "first\n\n---\n\nsecond\n\n---\n\nfirst");
        assert_eq!(ctx.chunks_used, 3);
        assert_eq!(ctx.chunks_dropped, 0);
    }

    #[test]
    fn test_empty_results_give_empty_context() {
        let ctx = ContextAssembler::new(100).assemble(&[]);
        assert_eq!(ctx.text, "");
        assert_eq!(ctx.chunks_used, 0);
    }

    #[test]
    fn test_budget_drops_lowest_ranked() {
        // "aaaa" + separator (7) + "bbbb" = 15 chars
        let assembler = ContextAssembler::new(15);
        let ctx = assembler.assemble(&[chunk("aaaa", 0.9), chunk("bbbb", 0.8), chunk("cccc", 0.7)]);
        assert_eq!(ctx.text, "aaaa\n\n---\n\nbbbb");
        assert_eq!(ctx.chunks_used, 2);
        assert_eq!(ctx.chunks_dropped, 1);
    }

    #[test]
    fn test_oversized_top_chunk_is_truncated() {
        let assembler = ContextAssembler::new(5);
        let ctx = assembler.assemble(&[chunk("héllo world", 0.9), chunk("x", 0.1)]);
        assert_eq!(ctx.text, "héllo");
        assert_eq!(ctx.chunks_used, 1);
        assert_eq!(ctx.chunks_dropped, 1);
    }
}
