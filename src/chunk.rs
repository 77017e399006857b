//! Boundary-aware overlapping text chunker.
//!
//! Splits cleaned document text into [`Segment`]s of bounded size that end on
//! sentence boundaries whenever one exists near the size limit. Consecutive
//! segments overlap so that retrieval context is not lost at the cut points.
//!
//! The chunker is a pure function: no I/O, no shared state. Every character
//! of the source lies within at least one segment's `[start, end)` span, and
//! the cursor is strictly increasing, so chunking always terminates in at
//! most `len / min_size + 1` segments.

use tracing::debug;

/// Sentence-terminating delimiters searched for near a chunk's size limit.
const SENTENCE_ENDINGS: [&str; 6] = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

/// How far back from the tentative end to look for a sentence boundary.
const BOUNDARY_LOOKBACK: usize = 200;

/// A contiguous span of a source document, tagged with its offsets.
///
/// `start..end` is the pre-trim byte span within the source; `text` is that
/// span with surrounding whitespace removed, so `text.len()` may be smaller
/// than `length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// Running index of this segment within its document, starting at 0.
    pub index: usize,
    /// Pre-trim span length, `end - start`.
    pub length: usize,
    pub total_text_length: usize,
}

/// Split `text` into overlapping segments.
///
/// * Empty or whitespace-only input yields no segments.
/// * Each segment's pre-trim span is at most `max_size` bytes; non-final
///   segments end just after the latest sentence delimiter found within the
///   trailing [`BOUNDARY_LOOKBACK`] bytes of the window, when one exists past
///   `start + min_size`.
/// * A segment is emitted only if its trimmed text is at least `min_size`
///   bytes, except that a segment reaching the end of the source is always
///   emitted so short tails are never dropped.
/// * The cursor advances by at least `min_size` per iteration; adjacent
///   segments overlap by roughly `overlap` bytes.
///
/// Offsets are byte offsets; window edges snap to UTF-8 character boundaries
/// so multi-byte input cannot split a character.
pub fn chunk_text(text: &str, min_size: usize, max_size: usize, overlap: usize) -> Vec<Segment> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // A zero minimum would stall the cursor.
    let min_size = min_size.max(1);
    let max_size = max_size.max(min_size);

    let total = text.len();
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < total {
        let mut end = floor_char_boundary(text, (start + max_size).min(total));

        if end < total {
            let window_start = (start + min_size).max(end.saturating_sub(BOUNDARY_LOOKBACK));
            let window_start = ceil_char_boundary(text, window_start.min(end));
            if let Some(boundary) = last_sentence_end(text, window_start, end) {
                end = boundary;
            }
        }

        if end > start {
            let trimmed = text[start..end].trim();
            if trimmed.len() >= min_size || end == total {
                segments.push(Segment {
                    text: trimmed.to_string(),
                    start,
                    end,
                    index,
                    length: end - start,
                    total_text_length: total,
                });
                index += 1;
            }
        }

        let mut next = (start + min_size).max(end.saturating_sub(overlap));
        if next <= start {
            next = start + min_size;
        }
        start = ceil_char_boundary(text, next.min(total));
    }

    debug!(
        segments = segments.len(),
        source_len = total,
        "chunked text"
    );
    segments
}

/// Latest position just past a sentence delimiter within `[from, to)`.
fn last_sentence_end(text: &str, from: usize, to: usize) -> Option<usize> {
    if from >= to {
        return None;
    }
    let window = &text[from..to];
    let mut best: Option<usize> = None;
    for pattern in SENTENCE_ENDINGS {
        if let Some(pos) = window.rfind(pattern) {
            let candidate = from + pos + pattern.len();
            if best.map_or(true, |b| candidate > b) {
                best = Some(candidate);
            }
        }
    }
    best
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    let len = text.len();
    while i < len && !text.is_char_boundary(i) {
        i += 1;
    }
    i.min(len)
}
