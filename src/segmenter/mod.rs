#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use fancy_regex::Regex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Separator hierarchy from coarsest to finest granularity. The final empty
/// separator splits any string into single characters, so recursive splitting
/// always terminates before the fixed-size fallback is needed.
pub const SEPARATOR_HIERARCHY: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Maximum length of the `title` metadata value, in characters
const TITLE_MAX_CHARS: usize = 50;

/// Metadata key holding the first non-blank line of the chunk
pub const TITLE_KEY: &str = "title";

/// Metadata key holding the comma-separated diagnostic trouble codes
pub const ERROR_CODES_KEY: &str = "error_codes";

static TROUBLE_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[PBUC][0-9]{4}\b").expect("trouble code pattern is valid"));

/// A bounded slice of manual text ready for embedding and retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique identifier for this chunk
    pub id: Uuid,
    /// Trimmed chunk text, never empty
    pub content: String,
    /// Name of the originating document, kept for citation
    pub source_name: String,
    /// Attached once by the ingestion flow before the chunk is persisted
    pub embedding: Option<Vec<f32>>,
    /// Lightweight per-chunk metadata (`title`, `error_codes`)
    pub metadata: BTreeMap<String, String>,
}

/// Segment raw manual text into chunks with metadata attached.
///
/// Blank or whitespace-only input yields an empty sequence. Every returned
/// chunk has trimmed, non-empty content of at most `max_chunk_len` characters
/// (except chunks produced by the fixed-size fallback, which are exactly
/// `max_chunk_len` apart from the last).
#[inline]
pub fn segment_document(
    text: &str,
    source_name: &str,
    max_chunk_len: usize,
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    for piece in split_text(text, max_chunk_len) {
        let content = piece.trim();
        if content.is_empty() {
            continue;
        }

        let mut metadata = BTreeMap::new();
        metadata.insert(TITLE_KEY.to_string(), chunk_title(content));
        if let Some(codes) = extract_trouble_codes(content) {
            metadata.insert(ERROR_CODES_KEY.to_string(), codes);
        }

        chunks.push(DocumentChunk {
            id: Uuid::new_v4(),
            content: content.to_string(),
            source_name: source_name.to_string(),
            embedding: None,
            metadata,
        });
    }

    debug!(
        "Segmented '{}' into {} chunks (max {} chars)",
        source_name,
        chunks.len(),
        max_chunk_len
    );

    chunks
}

/// Split text into pieces of at most `max_chunk_len` characters by recursive
/// divide-by-separator, walking the hierarchy from coarsest to finest.
///
/// Concatenating the returned pieces reproduces the input modulo consumed
/// separator characters. Lengths are counted in characters, not bytes.
#[inline]
pub fn split_text(text: &str, max_chunk_len: usize) -> Vec<String> {
    let max_chunk_len = max_chunk_len.max(1);
    let mut pieces = Vec::new();
    split_at_level(text, max_chunk_len, 0, &mut pieces);
    pieces
}

fn split_at_level(text: &str, max_chunk_len: usize, level: usize, out: &mut Vec<String>) {
    if char_len(text) <= max_chunk_len {
        out.push(text.to_string());
        return;
    }

    let Some(&separator) = SEPARATOR_HIERARCHY.get(level) else {
        // Hierarchy exhausted: brute-force fixed-size slices.
        split_fixed(text, max_chunk_len, out);
        return;
    };

    if separator.is_empty() {
        // Character-level floor of the hierarchy. Greedy packing of
        // single-character parts degenerates to fixed-size slices.
        split_fixed(text, max_chunk_len, out);
        return;
    }

    let separator_len = separator.chars().count();
    let mut buffer = String::new();
    let mut buffer_len = 0usize;

    for part in text.split(separator).filter(|part| !part.is_empty()) {
        let part_len = char_len(part);
        let tentative = if buffer_len == 0 {
            part_len
        } else {
            buffer_len + separator_len + part_len
        };

        if tentative > max_chunk_len {
            if buffer_len > 0 {
                out.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }

            if part_len > max_chunk_len {
                // The part alone is oversized; retry it with the next finer
                // separator.
                split_at_level(part, max_chunk_len, level + 1, out);
            } else {
                buffer.push_str(part);
                buffer_len = part_len;
            }
        } else {
            if buffer_len > 0 {
                buffer.push_str(separator);
            }
            buffer.push_str(part);
            buffer_len = tentative;
        }
    }

    if buffer_len > 0 {
        out.push(buffer);
    }
}

fn split_fixed(text: &str, max_chunk_len: usize, out: &mut Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    for slice in chars.chunks(max_chunk_len) {
        out.push(slice.iter().collect());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First non-blank line of the chunk, truncated to 50 characters
fn chunk_title(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    if char_len(line) > TITLE_MAX_CHARS {
        let truncated: String = line.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        line.to_string()
    }
}

/// Extract diagnostic trouble codes (P/B/U/C followed by exactly four
/// digits), deduplicated in first-seen order.
fn extract_trouble_codes(content: &str) -> Option<String> {
    let codes: Vec<&str> = TROUBLE_CODE_PATTERN
        .find_iter(content)
        .filter_map(std::result::Result::ok)
        .map(|code| code.as_str())
        .unique()
        .collect();

    (!codes.is_empty()).then(|| codes.join(","))
}
