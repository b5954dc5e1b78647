//! Heuristic suggestion engine
//!
//! Every detector is a plain function over the text of one content document
//! that returns `(original span, replacement)` pairs. Detectors are stateless
//! and know nothing about each other; which of them run is decided only by
//! membership in a [`DetectorConfig`].
//!
//! Detectors are registered in a fixed order, see [`registry`]. The order
//! matters to the resolution controller: structural repairs (merging broken
//! paragraphs, replacing hard-coded breaks) are offered before prose fixes.

pub mod breaks;
pub mod brackets;
pub mod paragraph;
pub mod punctuation;

use std::{collections::HashSet, fmt, str::FromStr, sync::LazyLock};

use log::debug;
use regex::Regex;

use crate::{error::EpubError, types::Suggestion, utils::NormalizeWhitespace};

/// The signature every detector implements
pub type DetectFn = fn(&str, &DetectContext) -> Vec<Result<Suggestion, EpubError>>;

/// Identifies a registered detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorId {
    BrokenParagraph,
    SectionBreak,
    PageBreak,
    MisencodedQuote,
    OxfordComma,
    UnnecessaryConjunction,
    ParentheticalThought,
    BracketedConversation,
    BracketedNecessaryWord,
}

impl DetectorId {
    /// Every detector, in registration order
    pub const ALL: [DetectorId; 9] = [
        DetectorId::BrokenParagraph,
        DetectorId::SectionBreak,
        DetectorId::PageBreak,
        DetectorId::MisencodedQuote,
        DetectorId::OxfordComma,
        DetectorId::UnnecessaryConjunction,
        DetectorId::ParentheticalThought,
        DetectorId::BracketedConversation,
        DetectorId::BracketedNecessaryWord,
    ];

    /// The kebab-case name used on command lines and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorId::BrokenParagraph => "broken-paragraph",
            DetectorId::SectionBreak => "section-break",
            DetectorId::PageBreak => "page-break",
            DetectorId::MisencodedQuote => "misencoded-quote",
            DetectorId::OxfordComma => "oxford-comma",
            DetectorId::UnnecessaryConjunction => "unnecessary-conjunction",
            DetectorId::ParentheticalThought => "parenthetical-thought",
            DetectorId::BracketedConversation => "bracketed-conversation",
            DetectorId::BracketedNecessaryWord => "bracketed-necessary-word",
        }
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DetectorId {
    type Err = EpubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetectorId::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| EpubError::UnknownDetector {
                name: s.to_string(),
            })
    }
}

/// How an accepted suggestion is applied to the file buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementPolicy {
    /// Replace only the first occurrence of the original span
    First,

    /// Replace every occurrence of the original span
    All,
}

/// A CSS rule block a stylesheet must contain once a suggestion is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleRule {
    /// The selector whose presence means the rule already exists
    pub selector: &'static str,

    /// The full rule block appended when the selector is missing
    pub block: &'static str,
}

pub const SECTION_BREAK_RULE: StyleRule = StyleRule {
    selector: "hr.section-break",
    block: "hr.section-break {\n  border: 0;\n  height: 1.5em;\n  margin: 0;\n}\n",
};

pub const PAGE_BREAK_RULE: StyleRule = StyleRule {
    selector: "hr.page-break",
    block: "hr.page-break {\n  border: 0;\n  height: 0;\n  margin: 0;\n  page-break-after: always;\n  break-after: page;\n}\n",
};

/// Caller-supplied values some detectors depend on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectContext {
    /// The text that marks a hard-coded section break, e.g. `***`
    pub section_break_indicator: Option<String>,
}

/// A registered detector
#[derive(Debug, Clone, Copy)]
pub struct Detector {
    pub id: DetectorId,
    pub detect: DetectFn,
    pub policy: ReplacementPolicy,

    /// The stylesheet rule an accepted suggestion of this detector depends on
    pub stylesheet_rule: Option<StyleRule>,
}

impl Detector {
    /// Runs the detector over one document
    ///
    /// Suggestions of replace-all detectors are de-duplicated, since accepting
    /// one of them already rewrites every identical span.
    pub fn run(&self, text: &str, context: &DetectContext) -> Vec<Result<Suggestion, EpubError>> {
        let mut results = (self.detect)(text, context);

        if self.policy == ReplacementPolicy::All {
            let mut seen = HashSet::new();
            results.retain(|result| match result {
                Ok(suggestion) => seen.insert(suggestion.clone()),
                Err(_) => true,
            });
        }

        debug!("Detector {} produced {} result(s).", self.id, results.len());
        results
    }
}

static REGISTRY: [Detector; 9] = [
    Detector {
        id: DetectorId::BrokenParagraph,
        detect: paragraph::broken_paragraph,
        policy: ReplacementPolicy::First,
        stylesheet_rule: None,
    },
    Detector {
        id: DetectorId::SectionBreak,
        detect: breaks::section_break,
        policy: ReplacementPolicy::All,
        stylesheet_rule: Some(SECTION_BREAK_RULE),
    },
    Detector {
        id: DetectorId::PageBreak,
        detect: breaks::page_break,
        policy: ReplacementPolicy::All,
        stylesheet_rule: Some(PAGE_BREAK_RULE),
    },
    Detector {
        id: DetectorId::MisencodedQuote,
        detect: punctuation::misencoded_quote,
        policy: ReplacementPolicy::First,
        stylesheet_rule: None,
    },
    Detector {
        id: DetectorId::OxfordComma,
        detect: punctuation::oxford_comma,
        policy: ReplacementPolicy::First,
        stylesheet_rule: None,
    },
    Detector {
        id: DetectorId::UnnecessaryConjunction,
        detect: punctuation::unnecessary_conjunction,
        policy: ReplacementPolicy::First,
        stylesheet_rule: None,
    },
    Detector {
        id: DetectorId::ParentheticalThought,
        detect: brackets::parenthetical_thought,
        policy: ReplacementPolicy::First,
        stylesheet_rule: None,
    },
    Detector {
        id: DetectorId::BracketedConversation,
        detect: brackets::bracketed_conversation,
        policy: ReplacementPolicy::First,
        stylesheet_rule: None,
    },
    Detector {
        id: DetectorId::BracketedNecessaryWord,
        detect: brackets::bracketed_necessary_word,
        policy: ReplacementPolicy::First,
        stylesheet_rule: None,
    },
];

/// Returns every detector in registration order
pub fn registry() -> &'static [Detector] {
    &REGISTRY
}

/// Returns the registered detector for an identifier
pub fn detector(id: DetectorId) -> &'static Detector {
    // REGISTRY is laid out in `DetectorId::ALL` order
    let index = DetectorId::ALL
        .iter()
        .position(|other| *other == id)
        .unwrap_or_default();
    &REGISTRY[index]
}

/// Which detectors run, and with what context
///
/// ## Usage
///
/// ```rust
/// use epub_mend::detect::{DetectorConfig, DetectorId};
///
/// let config = DetectorConfig::new()
///     .enable(DetectorId::OxfordComma)
///     .enable(DetectorId::SectionBreak)
///     .with_section_break_indicator("***");
///
/// assert!(config.is_enabled(DetectorId::OxfordComma));
/// assert!(config.needs_section_break_indicator());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorConfig {
    enabled: HashSet<DetectorId>,
    section_break_indicator: Option<String>,
}

impl DetectorConfig {
    /// Creates a configuration with nothing enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with every detector enabled
    pub fn all() -> Self {
        Self {
            enabled: DetectorId::ALL.into_iter().collect(),
            section_break_indicator: None,
        }
    }

    /// Builds a configuration from detector names
    ///
    /// The name `run-all` enables every detector.
    pub fn from_names<I, S>(names: I) -> Result<Self, EpubError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::new();
        for name in names {
            let name = name.as_ref();
            if name.trim() == "run-all" {
                config.enabled.extend(DetectorId::ALL);
            } else {
                config.enabled.insert(name.parse()?);
            }
        }
        Ok(config)
    }

    pub fn enable(mut self, id: DetectorId) -> Self {
        self.enabled.insert(id);
        self
    }

    pub fn disable(mut self, id: DetectorId) -> Self {
        self.enabled.remove(&id);
        self
    }

    pub fn with_section_break_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.section_break_indicator = Some(indicator.into());
        self
    }

    pub fn is_enabled(&self, id: DetectorId) -> bool {
        self.enabled.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    /// Returns the indicator, if one was supplied and it is not blank
    pub fn section_break_indicator(&self) -> Option<&str> {
        self.section_break_indicator
            .as_deref()
            .filter(|indicator| !indicator.trim().is_empty())
    }

    /// Returns true if section break detection is enabled
    pub fn needs_section_break_indicator(&self) -> bool {
        self.is_enabled(DetectorId::SectionBreak)
    }

    /// Returns true if an enabled detector appends a rule to a stylesheet
    pub fn needs_stylesheet(&self) -> bool {
        self.detectors()
            .iter()
            .any(|detector| detector.stylesheet_rule.is_some())
    }

    /// Returns the enabled detectors in registration order
    pub fn detectors(&self) -> Vec<&'static Detector> {
        registry()
            .iter()
            .filter(|detector| self.is_enabled(detector.id))
            .collect()
    }

    /// Checks the policy errors that must be raised before any file is touched
    ///
    /// ## Return
    /// - `Ok(DetectContext)`: The context to run the enabled detectors with
    /// - `Err(EpubError)`: Nothing is enabled, or section break detection is
    ///   enabled without a usable indicator
    pub fn context(&self) -> Result<DetectContext, EpubError> {
        if self.is_empty() {
            return Err(EpubError::NoDetectorEnabled);
        }

        let indicator = self.section_break_indicator().map(str::to_string);
        if self.needs_section_break_indicator() && indicator.is_none() {
            return Err(EpubError::BlankSectionBreakIndicator);
        }

        Ok(DetectContext {
            section_break_indicator: indicator,
        })
    }
}

static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(<p(?:\s(?:[^>/]|/[^>])*)?>)(.*?)(</p\s*>)").unwrap()
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// One paragraph of a document
///
/// For markup, a paragraph is one `<p>` element. Text without any paragraph
/// markup is split into lines instead, with empty tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paragraph<'a> {
    /// Byte offset of the paragraph within the document
    pub start: usize,
    pub end: usize,

    /// The whole paragraph, tags included
    pub span: &'a str,
    pub open_tag: &'a str,
    pub content: &'a str,
    pub close_tag: &'a str,
}

impl Paragraph<'_> {
    /// The text of the paragraph with tags removed and whitespace trimmed
    pub fn visible_text(&self) -> String {
        visible_text(self.content)
    }

    /// Rebuilds the paragraph around different content
    pub fn with_content(&self, content: &str) -> String {
        format!("{}{}{}", self.open_tag, content, self.close_tag)
    }
}

/// Splits a document into paragraphs, in document order
pub fn paragraphs(text: &str) -> Vec<Paragraph<'_>> {
    let marked = PARAGRAPH
        .captures_iter(text)
        .filter_map(|captures| {
            let span = captures.get(0)?;
            Some(Paragraph {
                start: span.start(),
                end: span.end(),
                span: span.as_str(),
                open_tag: captures.get(1)?.as_str(),
                content: captures.get(2)?.as_str(),
                close_tag: captures.get(3)?.as_str(),
            })
        })
        .collect::<Vec<_>>();

    if !marked.is_empty() || TAG.is_match(text) {
        return marked;
    }

    let mut lines = Vec::new();
    let mut offset = 0;
    for line in text.split('\n') {
        let start = offset;
        offset += line.len() + 1;

        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        lines.push(Paragraph {
            start,
            end: start + line.len(),
            span: line,
            open_tag: "",
            content: line,
            close_tag: "",
        });
    }
    lines
}

/// Removes tags and non-breaking spaces, then collapses whitespace
pub fn visible_text(markup: &str) -> String {
    TAG.replace_all(markup, "")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace('\u{a0}', " ")
        .normalize_whitespace()
}
