//! Hard-coded break detectors
//!
//! Books converted from print often mark scene changes with an empty
//! paragraph or a line of asterisks, and page breaks with an empty division.
//! Both are offered as a canonical `<hr/>` element that a stylesheet rule
//! can then render consistently.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    detect::{DetectContext, paragraphs, visible_text},
    error::EpubError,
    types::Suggestion,
};

pub const SECTION_BREAK_MARKUP: &str = "<hr class=\"section-break\"/>";
pub const PAGE_BREAK_MARKUP: &str = "<hr class=\"page-break\"/>";

static EMPTY_SELF_CLOSING_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<p(?:\s[^>]*)?/>").unwrap());

static EMPTY_DIVISION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<div(?:\s(?:[^>/]|/[^>])*)?>(?:\s|&nbsp;|&#160;|\x{a0})*</div\s*>|<div(?:\s[^>]*)?/>",
    )
    .unwrap()
});

/// Finds empty paragraphs and paragraphs ending with the section break indicator
///
/// Text in front of the indicator is kept in its own paragraph, followed by
/// the break element.
pub fn section_break(text: &str, context: &DetectContext) -> Vec<Result<Suggestion, EpubError>> {
    let indicator = context
        .section_break_indicator
        .as_deref()
        .map(str::trim)
        .filter(|indicator| !indicator.is_empty());

    let mut results = Vec::new();
    for paragraph in paragraphs(text) {
        let visible = paragraph.visible_text();

        if visible.is_empty() {
            results.push(Ok(Suggestion::new(paragraph.span, SECTION_BREAK_MARKUP)));
            continue;
        }

        let Some(indicator) = indicator else {
            continue;
        };
        if !visible.ends_with(indicator) {
            continue;
        }

        // the indicator may be escaped in markup; nothing to offer then
        let Some(index) = paragraph.content.rfind(indicator) else {
            continue;
        };
        let before = &paragraph.content[..index];
        let after = &paragraph.content[index + indicator.len()..];

        let replacement = if visible_text(before).is_empty() {
            SECTION_BREAK_MARKUP.to_string()
        } else {
            let kept = format!("{}{}", before.trim_end(), after.trim());
            format!(
                "{}\n{}",
                paragraph.with_content(&kept),
                SECTION_BREAK_MARKUP
            )
        };
        results.push(Ok(Suggestion::new(paragraph.span, replacement)));
    }

    for empty in EMPTY_SELF_CLOSING_PARAGRAPH.find_iter(text) {
        results.push(Ok(Suggestion::new(empty.as_str(), SECTION_BREAK_MARKUP)));
    }

    results
}

/// Finds empty divisions
pub fn page_break(text: &str, _context: &DetectContext) -> Vec<Result<Suggestion, EpubError>> {
    EMPTY_DIVISION
        .find_iter(text)
        .map(|empty| Ok(Suggestion::new(empty.as_str(), PAGE_BREAK_MARKUP)))
        .collect()
}
