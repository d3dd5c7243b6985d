//! Recursive, overlap-aware text splitter.
//!
//! Splits document text into segments of at most `chunk_size` characters,
//! with up to `chunk_overlap` characters repeated between consecutive
//! segments. Lengths are counted in Unicode scalar values, not bytes.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `["\n\n", "\n", " ", ""]` that occurs in
//!    the text (`""` always matches and splits into single characters).
//! 2. Split on it, keeping the separator at the start of each following
//!    piece so that joining pieces reproduces the original text.
//! 3. Pieces shorter than `chunk_size` are buffered and merged greedily;
//!    when the next piece would overflow, the buffer is emitted as a segment
//!    and pieces are dropped from its front until at most `chunk_overlap`
//!    characters remain, which seed the next segment.
//! 4. Pieces that are too long on their own are split recursively with the
//!    remaining, finer separators.
//! 5. Every emitted segment is whitespace-trimmed; blank segments are dropped.
//!
//! # Example
//!
//! ```rust
//! use subject_tutor_core::chunk::split_text;
//!
//! let segments = split_text("First paragraph.\nSecond paragraph.", 500, 50);
//! assert_eq!(segments, vec!["First paragraph.\nSecond paragraph.".to_string()]);
//! ```

use std::collections::VecDeque;

/// Maximum segment length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Characters shared between consecutive segments.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Break points, coarsest first.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Split `text` into overlapping segments of at most `chunk_size` characters.
///
/// An overlap that is not smaller than `chunk_size` is reduced to a quarter
/// of `chunk_size`. A `chunk_size` of zero disables splitting.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if chunk_size == 0 {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }
    let overlap = if chunk_overlap >= chunk_size {
        chunk_size / 4
    } else {
        chunk_overlap
    };

    let mut out = Vec::new();
    split_recursive(text, &SEPARATORS, chunk_size, overlap, &mut out);
    out
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    overlap: usize,
    out: &mut Vec<String>,
) {
    let (separator, finer) = pick_separator(text, separators);
    let mut fitting: Vec<&str> = Vec::new();

    for piece in split_keep_separator(text, separator) {
        if char_len(piece) < chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            merge_pieces(&fitting, chunk_size, overlap, out);
            fitting.clear();
        }
        if finer.is_empty() {
            out.push(piece.to_string());
        } else {
            split_recursive(piece, finer, chunk_size, overlap, out);
        }
    }

    if !fitting.is_empty() {
        merge_pieces(&fitting, chunk_size, overlap, out);
    }
}

/// Returns the separator to use for `text` and the finer separators after it.
fn pick_separator<'a, 's>(text: &str, separators: &'a [&'s str]) -> (&'s str, &'a [&'s str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (*sep, &[]);
        }
        if text.contains(*sep) {
            return (*sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split so that every piece after the first starts with `separator`.
/// Empty pieces are dropped.
fn split_keep_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        pieces.push(&text[start..pos]);
        start = pos;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn merge_pieces(pieces: &[&str], chunk_size: usize, overlap: usize, out: &mut Vec<String>) {
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        if total + len > chunk_size && !window.is_empty() {
            emit(&window, out);
            while total > overlap || (total > 0 && total + len > chunk_size) {
                match window.pop_front() {
                    Some(dropped) => total -= char_len(dropped),
                    None => break,
                }
            }
        }
        window.push_back(piece);
        total += len;
    }

    emit(&window, out);
}

fn emit(window: &VecDeque<&str>, out: &mut Vec<String>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1200 characters of distinct space-separated tokens.
    fn distinct_tokens_1200() -> String {
        let mut text = (0..200)
            .map(|i| format!("t{:04}", i))
            .collect::<Vec<_>>()
            .join(" ");
        text.push('.');
        assert_eq!(text.chars().count(), 1200);
        text
    }

    #[test]
    fn test_short_text_single_segment() {
        let segments = split_text("Hello, world!", 500, 50);
        assert_eq!(segments, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(split_text("", 500, 50).is_empty());
        assert!(split_text("  \n\n \n ", 500, 50).is_empty());
    }

    #[test]
    fn test_1200_chars_yield_three_overlapping_segments() {
        let text = distinct_tokens_1200();
        let segments = split_text(&text, 500, 50);
        assert_eq!(segments.len(), 3);

        for s in &segments {
            assert!(s.chars().count() <= 500, "segment too long: {}", s.len());
        }
        for pair in segments.windows(2) {
            let first_token = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].contains(first_token),
                "segment does not overlap its predecessor"
            );
            let chars: Vec<char> = pair[0].chars().collect();
            let tail: String = chars[chars.len().saturating_sub(50)..].iter().collect();
            assert!(tail.contains(first_token), "overlap exceeds 50 characters");
        }
        assert!(segments[0].starts_with("t0000"));
        assert!(segments[2].ends_with("t0199."));
    }

    #[test]
    fn test_prefers_newline_boundaries() {
        let para = "x".repeat(300);
        let text = format!("{}\n{}\n{}", para, para, para);
        let segments = split_text(&text, 500, 50);
        assert_eq!(segments.len(), 3);
        for s in &segments {
            assert_eq!(s, &para);
        }
    }

    #[test]
    fn test_unbroken_text_is_hard_split() {
        let text = "a".repeat(1000);
        let segments = split_text(&text, 500, 50);
        assert!(segments.len() >= 2);
        for s in &segments {
            assert!(s.chars().count() <= 500);
        }
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        let text = "é".repeat(450) + " " + &"ü".repeat(450);
        let segments = split_text(&text, 500, 50);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].chars().count(), 450);
        assert_eq!(segments[1].chars().count(), 450);
    }

    #[test]
    fn test_oversized_overlap_is_clamped() {
        let text = distinct_tokens_1200();
        let segments = split_text(&text, 100, 200);
        for s in &segments {
            assert!(s.chars().count() <= 100);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = distinct_tokens_1200();
        assert_eq!(split_text(&text, 500, 50), split_text(&text, 500, 50));
    }

    #[test]
    fn test_split_keep_separator_preserves_text() {
        let text = "a b  c ";
        let pieces = split_keep_separator(text, " ");
        assert_eq!(pieces, vec!["a", " b", " ", " c", " "]);
        assert_eq!(pieces.concat(), text);
    }
}
