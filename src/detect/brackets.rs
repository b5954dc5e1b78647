//! Parenthesis and square bracket detectors

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    detect::{DetectContext, paragraphs},
    error::EpubError,
    types::Suggestion,
};

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()<>]*\s[^()<>]*)\)").unwrap());

static WHOLLY_BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\[\]]+)\]$").unwrap());

static BRACKETED_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]<>]*\p{L}[^\[\]<>]*)\]").unwrap());

/// Offers parenthesized passages as italics
///
/// Parentheses around several words usually stand for a character's
/// unspoken thought. Single parenthesized words are left alone.
pub fn parenthetical_thought(
    text: &str,
    _context: &DetectContext,
) -> Vec<Result<Suggestion, EpubError>> {
    paragraphs(text)
        .into_iter()
        .filter_map(|paragraph| {
            let fixed = PARENTHETICAL.replace_all(paragraph.content, "<i>${1}</i>");
            (fixed != paragraph.content)
                .then(|| Ok(Suggestion::new(paragraph.span, paragraph.with_content(&fixed))))
        })
        .collect()
}

/// Offers a paragraph wrapped entirely in square brackets as quoted speech
///
/// Curly quotes are used when the document already uses them.
pub fn bracketed_conversation(
    text: &str,
    _context: &DetectContext,
) -> Vec<Result<Suggestion, EpubError>> {
    let (open, close) = if text.contains('“') || text.contains('”') {
        ("“", "”")
    } else {
        ("\"", "\"")
    };

    paragraphs(text)
        .into_iter()
        .filter_map(|paragraph| {
            let captures = WHOLLY_BRACKETED.captures(paragraph.content.trim())?;
            let quoted = format!("{}{}{}", open, &captures[1], close);
            Some(Ok(Suggestion::new(
                paragraph.span,
                paragraph.with_content(&quoted),
            )))
        })
        .collect()
}

/// Strips square brackets around words inside a paragraph
///
/// Editors bracket words they inserted; in a finished book the brackets are
/// noise. Numeric references like `[12]` and fully bracketed paragraphs are
/// not touched.
pub fn bracketed_necessary_word(
    text: &str,
    _context: &DetectContext,
) -> Vec<Result<Suggestion, EpubError>> {
    paragraphs(text)
        .into_iter()
        .filter(|paragraph| !WHOLLY_BRACKETED.is_match(paragraph.content.trim()))
        .filter_map(|paragraph| {
            let fixed = BRACKETED_WORDS.replace_all(paragraph.content, "${1}");
            (fixed != paragraph.content)
                .then(|| Ok(Suggestion::new(paragraph.span, paragraph.with_content(&fixed))))
        })
        .collect()
}
