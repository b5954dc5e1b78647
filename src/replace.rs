//! Bulk string replacement driven by a Markdown table
//!
//! The table has two header rows followed by rows of the form
//! `| original | replacement |`:
//!
//! ```text
//! | Original | Replacement |
//! | -------- | ----------- |
//! | teh      | the         |
//! | Mr Smith | Mr. Smith   |
//! ```

use indexmap::IndexMap;
use log::warn;

/// One `original → replacement` row of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementRow {
    pub original: String,
    pub replacement: String,
}

/// A row that could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the table text
    pub line: usize,
    pub text: String,
}

/// A parsed replacement table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementTable {
    pub rows: Vec<ReplacementRow>,
    pub skipped: Vec<SkippedRow>,
}

impl ReplacementTable {
    /// Parses the Markdown table
    ///
    /// Malformed rows never fail the parse; they are collected in `skipped`
    /// and logged.
    pub fn parse(markdown: &str) -> Self {
        let mut table = ReplacementTable::default();

        for (index, line) in markdown.lines().enumerate().skip(2) {
            if line.trim().is_empty() {
                continue;
            }

            let segments = line.split('|').collect::<Vec<_>>();
            let original = segments.get(1).map(|value| value.trim()).unwrap_or_default();

            if segments.len() != 4 || original.is_empty() {
                warn!(
                    "Skipping replacement row {}: expected \"| original | replacement |\", found \"{}\".",
                    index + 1,
                    line
                );
                table.skipped.push(SkippedRow {
                    line: index + 1,
                    text: line.to_string(),
                });
                continue;
            }

            table.rows.push(ReplacementRow {
                original: original.to_string(),
                replacement: segments[2].trim().to_string(),
            });
        }

        table
    }

    /// Creates a counter seeded with every term at zero
    pub fn counter(&self) -> ReplacementHitCounter {
        let mut counter = ReplacementHitCounter::default();
        for row in &self.rows {
            counter.insert(&row.original, &row.replacement);
        }
        counter
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HitEntry {
    replacement: String,
    hits: usize,
}

/// Counts how often each search term was actually replaced
///
/// Terms keep the order of the table. A term still at zero after every
/// file was processed is a miss worth reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementHitCounter {
    entries: IndexMap<String, HitEntry>,
}

impl ReplacementHitCounter {
    /// Registers a term; the first registration of a repeated term wins
    pub fn insert(&mut self, original: &str, replacement: &str) {
        if self.entries.contains_key(original) {
            warn!("Replacement term \"{}\" is listed more than once.", original);
            return;
        }

        self.entries.insert(
            original.to_string(),
            HitEntry {
                replacement: replacement.to_string(),
                hits: 0,
            },
        );
    }

    /// Replaces every occurrence of every term, in table order
    pub fn apply(&mut self, text: &str) -> String {
        let mut result = text.to_string();

        for (original, entry) in self.entries.iter_mut() {
            let count = result.matches(original.as_str()).count();
            if count > 0 {
                result = result.replace(original.as_str(), &entry.replacement);
                entry.hits += count;
            }
        }

        result
    }

    pub fn hits(&self, original: &str) -> Option<usize> {
        self.entries.get(original).map(|entry| entry.hits)
    }

    /// Iterates `(term, hits)` in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries
            .iter()
            .map(|(original, entry)| (original.as_str(), entry.hits))
    }

    /// Returns the terms that were never replaced
    pub fn misses(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, hits)| *hits == 0)
            .map(|(original, _)| original)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::replace::{ReplacementRow, ReplacementTable, SkippedRow};

    const TABLE: &str = "| Original | Replacement |\n| --- | --- |\n| teh | the |\n\n| broken row |\n| a | b | c |\n|   | empty |\n| Mr Smith | Mr. Smith |\n";

    #[test]
    fn test_parse_table() {
        let table = ReplacementTable::parse(TABLE);

        assert_eq!(
            table.rows,
            vec![
                ReplacementRow {
                    original: "teh".to_string(),
                    replacement: "the".to_string()
                },
                ReplacementRow {
                    original: "Mr Smith".to_string(),
                    replacement: "Mr. Smith".to_string()
                },
            ]
        );
        assert_eq!(
            table.skipped,
            vec![
                SkippedRow {
                    line: 5,
                    text: "| broken row |".to_string()
                },
                SkippedRow {
                    line: 6,
                    text: "| a | b | c |".to_string()
                },
                SkippedRow {
                    line: 7,
                    text: "|   | empty |".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_header_rows_are_never_data() {
        let table = ReplacementTable::parse("| x | y |\n| z | w |\n");
        assert!(table.rows.is_empty());
        assert!(table.skipped.is_empty());
    }

    #[test]
    fn test_hit_counting() {
        let table = ReplacementTable::parse(TABLE);
        let mut counter = table.counter();

        assert_eq!(counter.apply("nothing to see"), "nothing to see");
        assert_eq!(counter.apply("nothing to see"), "nothing to see");
        assert_eq!(counter.hits("teh"), Some(0));

        let text = counter.apply("teh cat, teh dog and teh bird met Mr Smith");
        assert_eq!(text, "the cat, the dog and the bird met Mr. Smith");
        assert_eq!(counter.hits("teh"), Some(3));
        assert_eq!(counter.hits("Mr Smith"), Some(1));
        assert_eq!(counter.hits("missing"), None);
        assert!(counter.misses().is_empty());
    }

    #[test]
    fn test_misses_keep_table_order() {
        let mut counter = ReplacementTable::parse(TABLE).counter();
        counter.apply("teh");

        assert_eq!(counter.misses(), vec!["Mr Smith"]);
        assert_eq!(
            counter.iter().collect::<Vec<_>>(),
            vec![("teh", 1), ("Mr Smith", 0)]
        );
    }

    #[test]
    fn test_repeated_terms_keep_first() {
        let table = ReplacementTable::parse("h\nh\n| a | b |\n| a | c |\n");
        let mut counter = table.counter();
        assert_eq!(counter.apply("a"), "b");
    }
}
