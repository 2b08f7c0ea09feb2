//! Splits text into provider-sized chunks along structural boundaries.
//!
//! Splitting prefers paragraph breaks, then sentence ends, then whitespace,
//! and only cuts inside a word when a single word is longer than the limit.
//! Every chunk remembers the exact separator that followed it in the input,
//! so concatenating `text + separator` over all chunks gives back the input.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Which kind of boundary ends a chunk.
///
/// The end of the input counts as a hard boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Paragraph,
    Sentence,
    Word,
    Hard,
}

impl BoundaryKind {
    fn finer(self) -> BoundaryKind {
        match self {
            BoundaryKind::Paragraph => BoundaryKind::Sentence,
            BoundaryKind::Sentence => BoundaryKind::Word,
            BoundaryKind::Word | BoundaryKind::Hard => BoundaryKind::Hard,
        }
    }
}

/// One independently translated slice of a larger text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the segmentation run, contiguous from 0
    pub index: usize,
    pub text: String,
    pub boundary: BoundaryKind,
    /// Whitespace removed between this chunk and the next one (empty when
    /// formatting is not preserved)
    pub separator: String,
}

impl Chunk {
    /// Whitespace-only chunks are never sent to the provider.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug)]
struct Piece<'a> {
    text: &'a str,
    separator: &'a str,
    boundary: BoundaryKind,
}

/// Content `text[start..end]` followed by separator `text[end..next]`.
#[derive(Debug, Clone, Copy)]
struct Unit {
    start: usize,
    end: usize,
    next: usize,
}

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\S\n]*\n[^\S\n]*\n\s*").expect("valid paragraph regex"))
}

fn sentence_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[.!?…。！？]+["'”’)\]]*(\s+)"#).expect("valid sentence regex")
    })
}

fn word_gap() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Empty input yields no chunks. With `preserve_format` the separators are
/// recorded verbatim; without it chunk text is trimmed, blank chunks are
/// dropped and separators are left empty.
pub fn segment(text: &str, max_chars: usize, preserve_format: bool) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    split_into(
        text,
        BoundaryKind::Paragraph,
        max_chars,
        "",
        BoundaryKind::Hard,
        &mut pieces,
    );

    if preserve_format {
        return pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| Chunk {
                index,
                text: piece.text.to_string(),
                boundary: piece.boundary,
                separator: piece.separator.to_string(),
            })
            .collect();
    }

    let mut chunks: Vec<Chunk> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let trimmed = piece.text.trim();
        if trimmed.is_empty() {
            // A dropped blank piece still carries the paragraph break it ended with.
            if let Some(prev) = chunks.last_mut() {
                if piece.boundary == BoundaryKind::Paragraph {
                    prev.boundary = BoundaryKind::Paragraph;
                }
            }
            continue;
        }
        chunks.push(Chunk {
            index: chunks.len(),
            text: trimmed.to_string(),
            boundary: piece.boundary,
            separator: String::new(),
        });
    }
    chunks
}

fn split_into<'a>(
    text: &'a str,
    kind: BoundaryKind,
    max_chars: usize,
    separator: &'a str,
    boundary: BoundaryKind,
    out: &mut Vec<Piece<'a>>,
) {
    if char_len(text) <= max_chars {
        out.push(Piece {
            text,
            separator,
            boundary,
        });
        return;
    }

    if kind == BoundaryKind::Hard {
        hard_cut(text, max_chars, separator, boundary, out);
        return;
    }

    let units = units(text, kind);
    if units.len() == 1 {
        split_into(text, kind.finer(), max_chars, separator, boundary, out);
        return;
    }

    let content_len: Vec<usize> = units
        .iter()
        .map(|u| char_len(&text[u.start..u.end]))
        .collect();
    let separator_len: Vec<usize> = units
        .iter()
        .map(|u| char_len(&text[u.end..u.next]))
        .collect();

    // Greedy: grow the span while the next unit (and the gap before it) still fits.
    let mut i = 0;
    while i < units.len() {
        let mut j = i;
        let mut len = content_len[i];
        while j + 1 < units.len() && len + separator_len[j] + content_len[j + 1] <= max_chars {
            len += separator_len[j] + content_len[j + 1];
            j += 1;
        }

        let span = &text[units[i].start..units[j].end];
        let (span_separator, span_boundary) = if j + 1 == units.len() {
            (separator, boundary)
        } else {
            (&text[units[j].end..units[j].next], kind)
        };

        if len > max_chars {
            split_into(
                span,
                kind.finer(),
                max_chars,
                span_separator,
                span_boundary,
                out,
            );
        } else {
            out.push(Piece {
                text: span,
                separator: span_separator,
                boundary: span_boundary,
            });
        }
        i = j + 1;
    }
}

fn units(text: &str, kind: BoundaryKind) -> Vec<Unit> {
    let gaps: Vec<(usize, usize)> = match kind {
        BoundaryKind::Paragraph => paragraph_break()
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect(),
        BoundaryKind::Sentence => sentence_end()
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| (m.start(), m.end()))
            .collect(),
        BoundaryKind::Word => word_gap()
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect(),
        BoundaryKind::Hard => Vec::new(),
    };

    let mut units = Vec::with_capacity(gaps.len() + 1);
    let mut start = 0;
    for (gap_start, gap_end) in gaps {
        units.push(Unit {
            start,
            end: gap_start,
            next: gap_end,
        });
        start = gap_end;
    }
    units.push(Unit {
        start,
        end: text.len(),
        next: text.len(),
    });
    units
}

/// Last resort for a single unit longer than the limit: cut on char boundaries.
fn hard_cut<'a>(
    text: &'a str,
    max_chars: usize,
    separator: &'a str,
    boundary: BoundaryKind,
    out: &mut Vec<Piece<'a>>,
) {
    let cuts: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .step_by(max_chars)
        .chain(std::iter::once(text.len()))
        .collect();

    let last = cuts.len().saturating_sub(2);
    for (n, window) in cuts.windows(2).enumerate() {
        let (piece_separator, piece_boundary) = if n == last {
            (separator, boundary)
        } else {
            ("", BoundaryKind::Hard)
        };
        out.push(Piece {
            text: &text[window[0]..window[1]],
            separator: piece_separator,
            boundary: piece_boundary,
        });
    }
}
