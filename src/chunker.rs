//! Token-aware text chunking.
//!
//! Splits raw or structured input into bounded, overlap-preserving segments
//! sized by an estimated token budget. Token counts use a fixed
//! 4-characters-per-token heuristic, which is a language-agnostic
//! approximation rather than a real tokenizer.

use crate::models::chunk::{Chunk, DocumentSource, SourceFormat};

/// Hard ceiling applied to every emitted chunk, matching the input limit the
/// backing embedding models enforce.
pub const MAX_CHUNK_TOKENS: usize = 512;

/// Chunks at or below this estimated token count are discarded as noise in
/// the sentence-splitting path.
const MIN_CHUNK_TOKENS: usize = 5;

/// Rough approximation: 1 token ≈ 4 characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Trims `text` to at most [`MAX_CHUNK_TOKENS`] estimated tokens, cutting at
/// the nearest preceding word boundary when one falls within 20% of the
/// ceiling; otherwise cuts mid-word.
pub fn enforce_token_ceiling(text: &str) -> String {
    let max_chars = MAX_CHUNK_TOKENS * 4;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let head: String = text.chars().take(max_chars).collect();
    let boundary_floor = max_chars - max_chars / 5;
    match head.rfind(char::is_whitespace) {
        Some(pos) if head[..pos].chars().count() >= boundary_floor => {
            head[..pos].trim_end().to_string()
        }
        _ => head,
    }
}

/// Splits `text` into chunks of at most `max_tokens` estimated tokens, with
/// roughly `overlap_tokens / 4` trailing words carried between consecutive
/// chunks.
///
/// Text that fits the budget comes back as a single trimmed chunk. Larger
/// text is split on sentence-terminal punctuation and accumulated greedily.
/// Empty input yields no chunks.
pub fn chunk_text(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if estimate_tokens(trimmed) <= max_tokens {
        return vec![enforce_token_ceiling(trimmed)];
    }

    let sentences: Vec<&str> = trimmed
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let overlap_words = overlap_tokens / 4;
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let would_be = estimate_tokens(&current) + estimate_tokens(sentence);
        if would_be > max_tokens && !current.is_empty() {
            chunks.push(current.trim().to_string());

            // Seed the next chunk with the tail of the one just closed.
            let words: Vec<&str> = current.split_whitespace().collect();
            let tail_start = words.len().saturating_sub(overlap_words);
            current = if overlap_words == 0 || tail_start >= words.len() {
                sentence.to_string()
            } else {
                format!("{} {}", words[tail_start..].join(" "), sentence)
            };
        } else if current.is_empty() {
            current = sentence.to_string();
        } else {
            current.push(' ');
            current.push_str(sentence);
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
        .into_iter()
        .map(|c| enforce_token_ceiling(&c))
        .filter(|c| estimate_tokens(c) > MIN_CHUNK_TOKENS)
        .collect()
}

/// Chunks a [`DocumentSource`], tagging each chunk with its origin. Chunks
/// preserve input order, then chunk order within each item.
pub fn chunk_source(
    source: &DocumentSource,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Vec<Chunk> {
    match source {
        DocumentSource::Text(text) => {
            collect_chunks(text, max_tokens, overlap_tokens, SourceFormat::Text, None, None)
        }
        DocumentSource::Items(items) => items
            .iter()
            .enumerate()
            .flat_map(|(index, item)| {
                collect_chunks(
                    item,
                    max_tokens,
                    overlap_tokens,
                    SourceFormat::Array,
                    None,
                    Some(index),
                )
            })
            .collect(),
        DocumentSource::KeyValues(entries) => entries
            .iter()
            .flat_map(|(key, value)| {
                collect_chunks(
                    value,
                    max_tokens,
                    overlap_tokens,
                    SourceFormat::Json,
                    Some(key.clone()),
                    None,
                )
            })
            .collect(),
    }
}

fn collect_chunks(
    text: &str,
    max_tokens: usize,
    overlap_tokens: usize,
    source_format: SourceFormat,
    source_key: Option<String>,
    original_index: Option<usize>,
) -> Vec<Chunk> {
    let pieces = chunk_text(text, max_tokens, overlap_tokens);
    let total_chunks = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            text,
            source_format,
            source_key: source_key.clone(),
            original_index,
            chunk_index,
            total_chunks,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text("   \n  ", 100, 10).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Just a short note.", 100, 10);
        assert_eq!(chunks, vec!["Just a short note."]);
    }

    #[test]
    fn test_unpunctuated_short_text() {
        let chunks = chunk_text("hello world", 100, 10);
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn test_forces_two_chunks() {
        let text = "Playwright is a tool. It automates browsers. It supports multiple languages.";
        let chunks = chunk_text(text, 12, 0);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_chunks_cover_sentences_in_order() {
        let text = "Alpha arrives first in the sequence. Beta arrives second in the sequence. \
                    Gamma arrives third in the sequence. Delta arrives fourth in the sequence. \
                    Epsilon arrives fifth in the sequence.";
        let chunks = chunk_text(text, 10, 0);
        let joined = chunks.join(" ");
        let mut last = 0;
        for word in ["Alpha", "Beta", "Gamma", "Delta", "Epsilon"] {
            let pos = joined[last..].find(word).expect("sentence lost");
            last += pos;
        }
    }

    #[test]
    fn test_overlap_carries_tail_words() {
        let text = "One two three four five six seven eight. Nine ten eleven twelve thirteen fourteen.";
        let chunks = chunk_text(text, 10, 12);
        assert!(chunks.len() >= 2);
        // 12 overlap tokens => 3 trailing words carried forward.
        assert!(chunks[1].starts_with("six seven eight"));
    }

    #[test]
    fn test_no_chunk_exceeds_ceiling() {
        let sentence = "word ".repeat(700);
        let text = format!("{sentence}. {sentence}. {sentence}.");
        for chunk in chunk_text(&text, 600, 20) {
            assert!(estimate_tokens(&chunk) <= MAX_CHUNK_TOKENS);
        }
    }

    #[test]
    fn test_ceiling_prefers_word_boundary() {
        let trimmed = enforce_token_ceiling(&"word ".repeat(600));
        assert!(!trimmed.ends_with(char::is_whitespace));
        assert!(trimmed.ends_with("word"));
        assert!(estimate_tokens(&trimmed) <= MAX_CHUNK_TOKENS);
    }

    #[test]
    fn test_tiny_split_chunks_filtered() {
        // Forces the split path with one sentence small enough to be noise.
        let long = "alpha beta gamma delta epsilon zeta eta theta".repeat(3);
        let text = format!("{long}. Hi. {long}.");
        for chunk in chunk_text(&text, 30, 0) {
            assert!(estimate_tokens(&chunk) > 5);
        }
    }

    #[test]
    fn test_array_source_preserves_item_order() {
        let source = DocumentSource::Items(vec![
            "First item with some words in it.".to_string(),
            "Second item with some words in it.".to_string(),
        ]);
        let chunks = chunk_source(&source, 100, 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].original_index, Some(0));
        assert_eq!(chunks[1].original_index, Some(1));
        assert!(chunks.iter().all(|c| c.source_format == SourceFormat::Array));
        assert!(chunks.iter().all(|c| c.source_key.is_none()));
    }

    #[test]
    fn test_key_value_source_tags_keys() {
        let source = DocumentSource::KeyValues(vec![
            ("intro".to_string(), "Introductory text goes here.".to_string()),
            ("body".to_string(), "Body text goes here as well.".to_string()),
        ]);
        let chunks = chunk_source(&source, 100, 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source_key.as_deref(), Some("intro"));
        assert_eq!(chunks[1].source_key.as_deref(), Some("body"));
        assert!(chunks.iter().all(|c| c.source_format == SourceFormat::Json));
    }

    #[test]
    fn test_chunk_indices_within_item() {
        let text = "Alpha first. Beta second. Gamma third. Delta fourth. Epsilon fifth.";
        let source = DocumentSource::Text(text.to_string());
        let chunks = chunk_source(&source, 8, 0);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.total_chunks, chunks.len());
        }
    }
}
