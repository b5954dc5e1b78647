//! Epub mend
//!
//! A Rust library for cleaning up EPUB eBook files in place.
//!
//! The library parses the package document of a book to learn which files
//! are content, images and stylesheets, runs a set of heuristic detectors
//! over the content documents to find passages that are probably malformed
//! (paragraphs broken at page boundaries, hard-coded scene breaks,
//! mis-encoded quotation marks, missing serial commas and so on) and lets a
//! user accept, reject or edit every suggestion. Changes are written through
//! a transaction that never leaves a half-written archive behind.
//!
//! ## Features
//!
//! - Manifest parsing for EPUB 2 and EPUB 3 package documents.
//! - Archive rewriting that keeps every untouched entry byte-for-byte, with
//!   the previous archive kept as `<file>.original`.
//! - Nine independent detectors, selected through [`detect::DetectorConfig`].
//! - A terminal-independent resolution state machine with a terminal prompter.
//! - Bulk string replacement from a Markdown table.
//!
//! ## Quick Start
//!
//! ### Fix suggestions interactively
//!
//! ```rust, no_run
//! # use epub_mend::{detect::DetectorConfig, epub::fix_suggestions, resolve::TerminalPrompter};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DetectorConfig::all().with_section_break_indicator("***");
//! let summary = fix_suggestions("book.epub", &config, &mut TerminalPrompter::stdio())?;
//!
//! println!("{} accepted, {} changed files", summary.accepted, summary.changed.len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Preview without writing
//!
//! ```rust, no_run
//! # use epub_mend::{detect::{DetectorConfig, DetectorId}, epub::preview_suggestions};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DetectorConfig::new().enable(DetectorId::OxfordComma);
//! for file in preview_suggestions("book.epub", &config)? {
//!     for finding in file.findings {
//!         println!("{}: {}", file.path, finding.suggestion.replacement);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub(crate) mod utils;

pub mod archive;
pub mod detect;
pub mod diff;
pub mod epub;
pub mod error;
pub mod manifest;
pub mod replace;
pub mod resolve;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use utils::DecodeBytes;
