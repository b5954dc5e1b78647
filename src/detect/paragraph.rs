//! Broken paragraph detector
//!
//! Conversions from print frequently cut a paragraph in two at a page
//! boundary. A paragraph whose visible text stops mid-sentence is merged with
//! the paragraph(s) after it until its quotation marks balance again.

use crate::{
    detect::{DetectContext, Paragraph, paragraphs},
    error::EpubError,
    types::Suggestion,
};

/// Abbreviations that end with a period but never end a sentence
const ABBREVIATIONS: [&str; 6] = ["Mr.", "Mrs.", "Ms.", "Dr.", "Mt.", "St."];

/// Characters a complete paragraph can end with
const TERMINAL: [char; 12] = ['.', '!', '?', '…', '"', '”', '\'', '’', ')', ']', ':', '*'];

/// Dangling characters that always mean the sentence continues
const CONTINUATION: [char; 4] = ['-', '–', '—', '%'];

/// The most paragraphs one merge may span
const MAX_MERGED: usize = 5;

pub fn broken_paragraph(text: &str, _context: &DetectContext) -> Vec<Result<Suggestion, EpubError>> {
    let found = paragraphs(text);
    let mut results = Vec::new();

    let mut index = 0;
    while index + 1 < found.len() {
        if !adjacent(text, &found[index], &found[index + 1])
            || !is_broken(&found[index].visible_text())
        {
            index += 1;
            continue;
        }

        let last = merge_end(text, &found, index);
        let merged = &found[index..=last];

        let original = &text[merged[0].start..merged[last - index].end];
        results.push(Ok(Suggestion::new(original, join(merged))));

        index = last + 1;
    }

    results
}

/// Returns true if the visible text looks cut off mid-sentence
pub fn is_broken(visible: &str) -> bool {
    let Some(last) = visible.chars().last() else {
        return false;
    };

    if last.is_lowercase() || CONTINUATION.contains(&last) {
        return true;
    }
    if ABBREVIATIONS
        .iter()
        .any(|abbreviation| ends_with_word(visible, abbreviation))
    {
        return true;
    }

    !TERMINAL.contains(&last)
}

/// Returns true if the double quotation marks of the text pair up
pub fn quotes_balanced(text: &str) -> bool {
    let straight = text.matches('"').count();
    let opening = text.matches('“').count();
    let closing = text.matches('”').count();

    straight % 2 == 0 && opening == closing
}

fn ends_with_word(text: &str, word: &str) -> bool {
    text.strip_suffix(word).is_some_and(|head| {
        head.chars()
            .last()
            .is_none_or(|previous| !previous.is_alphanumeric())
    })
}

/// Returns true if only whitespace separates the two paragraphs
fn adjacent(text: &str, before: &Paragraph<'_>, after: &Paragraph<'_>) -> bool {
    text[before.end..after.start].trim().is_empty()
}

/// Finds the index of the last paragraph to merge starting at `first`
///
/// The merge never crosses markup between paragraphs, so `first + 1` must be
/// adjacent to `first`.
fn merge_end(text: &str, found: &[Paragraph<'_>], first: usize) -> usize {
    let limit = (first + MAX_MERGED).min(found.len());

    let mut visible = found[first].visible_text();
    for (last, paragraph) in found.iter().enumerate().take(limit).skip(first + 1) {
        if !adjacent(text, &found[last - 1], paragraph) {
            break;
        }

        visible.push(' ');
        visible.push_str(&paragraph.visible_text());
        if quotes_balanced(&visible) {
            return last;
        }
    }

    // no balanced merge within reach, so only join the immediate neighbour
    first + 1
}

/// Joins paragraphs with a single space, keeping the outer tags only
fn join(merged: &[Paragraph<'_>]) -> String {
    let content = merged
        .iter()
        .map(|paragraph| paragraph.content.trim())
        .collect::<Vec<_>>()
        .join(" ");

    let first = merged[0];
    let last = merged[merged.len() - 1];
    format!("{}{}{}", first.open_tag, content, last.close_tag)
}
