use crate::query::filter::fold_case;
use std::ops::Range;
use tui::style::Style;
use tui::text::{Line, Span};

/// Byte ranges of every case-insensitive occurrence of `term` in `text`,
/// left to right and non-overlapping. The term is matched literally and
/// trimmed first; an empty term matches nothing.
pub fn match_ranges(text: &str, term: &str) -> Vec<Range<usize>> {
    let needle = fold_case(term.trim());
    if needle.is_empty() || text.is_empty() {
        return Vec::new();
    }

    let mut folded = String::with_capacity(text.len());
    // Source char behind each byte of `folded`.
    let mut origin: Vec<Range<usize>> = Vec::with_capacity(text.len());
    for (start, c) in text.char_indices() {
        let source = start..start + c.len_utf8();
        for lower in c.to_lowercase() {
            folded.push(lower);
            origin.extend(std::iter::repeat_n(source.clone(), lower.len_utf8()));
        }
    }

    let mut ranges: Vec<Range<usize>> = Vec::new();
    for (at, found) in folded.match_indices(needle.as_str()) {
        let start = origin[at].start;
        let end = origin[at + found.len() - 1].end;
        // A fold can expand one char into several; widen into the previous
        // range rather than overlap it.
        match ranges.last_mut() {
            Some(last) if start < last.end => last.end = last.end.max(end),
            _ => ranges.push(start..end),
        }
    }
    ranges
}

/// `text` as spans, with matches of `term` drawn in `mark`.
pub fn highlight_line(text: &str, term: &str, base: Style, mark: Style) -> Line<'static> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for range in match_ranges(text, term) {
        if range.start > cursor {
            spans.push(Span::styled(text[cursor..range.start].to_string(), base));
        }
        spans.push(Span::styled(text[range.clone()].to_string(), mark));
        cursor = range.end;
    }
    if cursor < text.len() || spans.is_empty() {
        spans.push(Span::styled(text[cursor..].to_string(), base));
    }
    Line::from(spans)
}
