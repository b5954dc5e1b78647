//! Punctuation and connective detectors

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    detect::{DetectContext, paragraphs},
    error::EpubError,
    types::Suggestion,
};

static OXFORD_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+), ([\w'’-]+(?: [\w'’-]+)?) (and|or) ").unwrap()
});

static UNNECESSARY_CONJUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(^|[.!?]["”’]?\s+|>)((?:although|because|while)\b[^,.;!?<>]*), (?:but|thus|therefore|however|furthermore),? "#,
    )
    .unwrap()
});

/// Windows-1252 renderings of UTF-8 punctuation, longest first
const MOJIBAKE: [(&str, &str); 8] = [
    ("\u{e2}\u{20ac}\u{153}", "“"),
    ("\u{e2}\u{20ac}\u{9d}", "”"),
    ("\u{e2}\u{20ac}\u{2122}", "’"),
    ("\u{e2}\u{20ac}\u{2dc}", "‘"),
    ("\u{e2}\u{20ac}\u{201d}", "—"),
    ("\u{e2}\u{20ac}\u{201c}", "–"),
    ("\u{e2}\u{20ac}\u{a6}", "…"),
    // 0x9D has no Windows-1252 mapping and is often dropped entirely
    ("\u{e2}\u{20ac}", "”"),
];

const MOJIBAKE_MARKER: &str = "\u{e2}\u{20ac}";

/// Inserts the serial comma before the final `and`/`or` of a list
pub fn oxford_comma(text: &str, _context: &DetectContext) -> Vec<Result<Suggestion, EpubError>> {
    paragraphs(text)
        .into_iter()
        .filter_map(|paragraph| {
            let fixed = OXFORD_COMMA.replace_all(paragraph.content, "${1}, ${2}, ${3} ");
            (fixed != paragraph.content)
                .then(|| Ok(Suggestion::new(paragraph.span, paragraph.with_content(&fixed))))
        })
        .collect()
}

/// Drops the connective that repeats what an opening subordinator already says
///
/// "Although it rained, but we went out." becomes "Although it rained, we went out."
pub fn unnecessary_conjunction(
    text: &str,
    _context: &DetectContext,
) -> Vec<Result<Suggestion, EpubError>> {
    paragraphs(text)
        .into_iter()
        .filter_map(|paragraph| {
            let fixed = UNNECESSARY_CONJUNCTION.replace_all(paragraph.content, "${1}${2}, ");
            (fixed != paragraph.content)
                .then(|| Ok(Suggestion::new(paragraph.span, paragraph.with_content(&fixed))))
        })
        .collect()
}

/// Repairs UTF-8 punctuation that was decoded as Windows-1252
///
/// A repair that leaves opening and closing double quotes unpaired is
/// reported as [`EpubError::UnbalancedQuotes`] instead of being offered.
pub fn misencoded_quote(text: &str, _context: &DetectContext) -> Vec<Result<Suggestion, EpubError>> {
    paragraphs(text)
        .into_iter()
        .filter(|paragraph| paragraph.span.contains(MOJIBAKE_MARKER))
        .map(|paragraph| {
            let repaired = repair_mojibake(paragraph.span);

            if repaired.matches('“').count() != repaired.matches('”').count() {
                return Err(EpubError::UnbalancedQuotes {
                    paragraph: repaired,
                });
            }
            Ok(Suggestion::new(paragraph.span, repaired))
        })
        .collect()
}

pub fn repair_mojibake(text: &str) -> String {
    MOJIBAKE
        .iter()
        .fold(text.to_string(), |repaired, (broken, fixed)| {
            repaired.replace(broken, fixed)
        })
}
