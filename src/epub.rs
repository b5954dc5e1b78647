//! Whole-book operations
//!
//! These functions tie the pieces together: they open an EPUB through the
//! archive transaction, run the enabled detectors or the replacement table
//! over every content document, and write back only what changed.

use std::{collections::HashSet, path::Path};

use log::{info, warn};

use crate::{
    archive::{ArchiveEditor, EpubSource, rewrite_epub},
    detect::{DetectorConfig, DetectorId},
    error::EpubError,
    manifest::EpubInventory,
    replace::{ReplacementHitCounter, ReplacementTable},
    resolve::{Prompter, ResolutionController, ResolutionSummary},
    types::Suggestion,
};

/// One detector finding in preview mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub detector: DetectorId,
    pub suggestion: Suggestion,
}

/// The findings for one content document
#[derive(Debug)]
pub struct FileFindings {
    /// Container path of the document
    pub path: String,
    pub findings: Vec<Finding>,

    /// Per-suggestion failures, which are reported but never applied
    pub failures: Vec<(DetectorId, EpubError)>,
}

/// Interactively resolves the suggestions of the enabled detectors
///
/// Only documents and stylesheets whose content changed are written back;
/// everything else is copied verbatim. Acceptances made before a Quit are kept.
///
/// # Parameters
/// - `path`: Path of the EPUB to fix in place
/// - `config`: The detectors to run
/// - `prompter`: Source of every decision
///
/// # Return
/// - `Ok(ResolutionSummary)`: The book was rewritten; the previous version is
///   kept as `<path>.original`
/// - `Err(EpubError)`: Nothing was written
pub fn fix_suggestions<P, Q>(
    path: P,
    config: &DetectorConfig,
    prompter: &mut Q,
) -> Result<ResolutionSummary, EpubError>
where
    P: AsRef<Path>,
    Q: Prompter + ?Sized,
{
    if config.is_empty() {
        return Err(EpubError::NoDetectorEnabled);
    }

    let mut summary = ResolutionSummary::default();
    rewrite_epub(path.as_ref(), |inventory, editor| {
        let documents = read_all(inventory, editor, inventory.content_documents())?;
        let stylesheets = read_all(inventory, editor, inventory.stylesheets())?;

        let mut controller = ResolutionController::new(config, documents, stylesheets)?;
        summary = controller.run(prompter)?;

        let mut handled = HashSet::new();
        for (changed, content) in controller.changed_files() {
            editor.write_file(changed, content.as_bytes())?;
            handled.insert(changed.to_string());
        }
        Ok(handled)
    })?;

    info!(
        "Resolved \"{}\": {} accepted, {} edited, {} rejected, {} file(s) changed.",
        path.as_ref().display(),
        summary.accepted,
        summary.edited,
        summary.rejected,
        summary.changed.len()
    );
    Ok(summary)
}

/// Runs the enabled detectors without changing anything
///
/// Documents without any finding or failure are left out of the result.
pub fn preview_suggestions<P: AsRef<Path>>(
    path: P,
    config: &DetectorConfig,
) -> Result<Vec<FileFindings>, EpubError> {
    let context = config.context()?;
    let detectors = config.detectors();

    let mut source = EpubSource::open(path)?;
    let documents = source
        .inventory
        .content_documents()
        .map(|document| source.inventory.archive_path(document))
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = Vec::new();
    for document in documents {
        let text = match source.read_to_string(&document) {
            Ok(text) => text,
            Err(EpubError::ResourceNotFound { .. }) => {
                warn!("Manifest item \"{}\" is missing from the archive.", document);
                continue;
            }
            Err(err) => return Err(err),
        };

        let mut file = FileFindings {
            path: document,
            findings: Vec::new(),
            failures: Vec::new(),
        };
        for detector in &detectors {
            for result in detector.run(&text, &context) {
                match result {
                    Ok(suggestion) => file.findings.push(Finding {
                        detector: detector.id,
                        suggestion,
                    }),
                    Err(err) => {
                        warn!(
                            "Skipping a {} suggestion in \"{}\": {}",
                            detector.id, file.path, err
                        );
                        file.failures.push((detector.id, err));
                    }
                }
            }
        }

        if !file.findings.is_empty() || !file.failures.is_empty() {
            results.push(file);
        }
    }

    Ok(results)
}

/// Applies a replacement table to every content document
///
/// Terms that were never found are logged once the whole book has been
/// processed.
pub fn replace_strings<P: AsRef<Path>>(
    path: P,
    table: &ReplacementTable,
) -> Result<ReplacementHitCounter, EpubError> {
    let mut counter = table.counter();
    if counter.is_empty() {
        warn!(
            "The replacement table has no usable rows; \"{}\" is left untouched.",
            path.as_ref().display()
        );
        return Ok(counter);
    }

    rewrite_epub(path.as_ref(), |inventory, editor| {
        let mut handled = HashSet::new();
        for (document, text) in read_all(inventory, editor, inventory.content_documents())? {
            let replaced = counter.apply(&text);
            if replaced != text {
                editor.write_file(&document, replaced.as_bytes())?;
                handled.insert(document);
            }
        }
        Ok(handled)
    })?;

    for term in counter.misses() {
        warn!("Replacement term \"{}\" was not found in any content document.", term);
    }
    Ok(counter)
}

/// Byte order marks of UTF-16 text, big endian then little endian
const UTF16_BOMS: [[u8; 2]; 2] = [[0xFE, 0xFF], [0xFF, 0xFE]];

/// Reads manifest documents as `(container path, text)` pairs
///
/// Items declared in the manifest but absent from the archive are skipped,
/// and so are UTF-16 files, which could not be written back in their own
/// encoding.
fn read_all<'a, I>(
    inventory: &EpubInventory,
    editor: &mut ArchiveEditor<'_>,
    paths: I,
) -> Result<Vec<(String, String)>, EpubError>
where
    I: Iterator<Item = &'a str>,
{
    let mut documents = Vec::new();
    for path in paths {
        let path = inventory.archive_path(path)?;
        if !editor.contains(&path) {
            warn!("Manifest item \"{}\" is missing from the archive.", path);
            continue;
        }

        let bytes = editor.read_bytes(&path)?;
        if UTF16_BOMS.iter().any(|bom| bytes.starts_with(bom)) {
            warn!("Skipping UTF-16 file \"{}\"; only UTF-8 files are rewritten.", path);
            continue;
        }

        // a UTF-8 byte order mark stays in the text and is written back unchanged
        let text = String::from_utf8(bytes)?;
        documents.push((path, text));
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::{
        archive::sibling_path,
        detect::{DetectorConfig, DetectorId, PAGE_BREAK_RULE},
        epub::{fix_suggestions, preview_suggestions, replace_strings},
        error::EpubError,
        replace::ReplacementTable,
        resolve::{Decision, ScriptedPrompter},
        testing::{EpubFixture, raw_entries, read_entry, read_entry_bytes, xhtml},
    };
    use zip::CompressionMethod;

    fn book(dir: &std::path::Path) -> std::path::PathBuf {
        EpubFixture::new()
            .chapter("one.xhtml", &xhtml("<p>I run, skip and jump.</p>\n<div></div>"))
            .chapter("two.xhtml", &xhtml("<p>Nothing to fix.</p>"))
            .stylesheet("style.css", "p { margin: 0; }\n")
            .build(dir)
    }

    #[test]
    fn test_fix_writes_only_changed_files() {
        let dir = tempdir().unwrap();
        let path = book(dir.path());
        let before = raw_entries(&path);

        let config = DetectorConfig::new()
            .enable(DetectorId::OxfordComma)
            .enable(DetectorId::PageBreak);
        let summary =
            fix_suggestions(&path, &config, &mut ScriptedPrompter::accept_all()).unwrap();

        assert_eq!(summary.accepted, 2);
        assert_eq!(
            summary.changed,
            vec![
                "OEBPS/Text/one.xhtml".to_string(),
                "OEBPS/Styles/style.css".to_string()
            ]
        );

        let chapter = read_entry(&path, "OEBPS/Text/one.xhtml");
        assert!(chapter.contains("<p>I run, skip, and jump.</p>\n<hr class=\"page-break\"/>"));
        let css = read_entry(&path, "OEBPS/Styles/style.css");
        assert!(css.ends_with(PAGE_BREAK_RULE.block));

        let after = raw_entries(&path);
        assert_eq!(after.len(), before.len());
        assert_eq!(after[0].0, "mimetype");
        for (name, method, raw) in &before {
            if name.ends_with("one.xhtml") || name.ends_with("style.css") {
                continue;
            }
            let copied = after.iter().find(|(other, _, _)| other == name).unwrap();
            assert_eq!((&copied.1, &copied.2), (method, raw));
        }
        assert!(sibling_path(&path, "original").exists());
    }

    #[test]
    fn test_fix_without_changes_round_trips() {
        let dir = tempdir().unwrap();
        let path = book(dir.path());
        let before_bytes = fs::read(&path).unwrap();
        let before = raw_entries(&path);

        let config = DetectorConfig::new().enable(DetectorId::MisencodedQuote);
        let summary = fix_suggestions(&path, &config, &mut ScriptedPrompter::default()).unwrap();

        assert!(summary.changed.is_empty());
        assert_eq!(raw_entries(&path), before);
        assert_eq!(fs::read(sibling_path(&path, "original")).unwrap(), before_bytes);
    }

    #[test]
    fn test_fix_quit_keeps_earlier_accepts() {
        let dir = tempdir().unwrap();
        let path = EpubFixture::new()
            .chapter(
                "one.xhtml",
                &xhtml("<p>A, b and c.</p>\n<p>D, e and f.</p>\n<p>G, h and i.</p>"),
            )
            .build(dir.path());

        let config = DetectorConfig::new().enable(DetectorId::OxfordComma);
        let mut prompter = ScriptedPrompter::new([Decision::Accept, Decision::Reject, Decision::Quit]);
        let summary = fix_suggestions(&path, &config, &mut prompter).unwrap();

        assert!(summary.quit);
        let chapter = read_entry(&path, "OEBPS/Text/one.xhtml");
        assert!(chapter.contains("<p>A, b, and c.</p>\n<p>D, e and f.</p>\n<p>G, h and i.</p>"));
    }

    #[test]
    fn test_fix_policy_errors_leave_book_untouched() {
        let dir = tempdir().unwrap();
        let path = EpubFixture::new()
            .chapter("one.xhtml", &xhtml("<p>A, b and c.</p>\n<p>D, e and f.</p>\n<div></div>"))
            .build(dir.path());
        let before = fs::read(&path).unwrap();

        assert_eq!(
            fix_suggestions(&path, &DetectorConfig::new(), &mut ScriptedPrompter::default())
                .unwrap_err(),
            EpubError::NoDetectorEnabled
        );

        // page breaks need a stylesheet and the book has none, so nothing is asked
        let config = DetectorConfig::new()
            .enable(DetectorId::OxfordComma)
            .enable(DetectorId::PageBreak);
        let mut prompter = ScriptedPrompter::accept_all();
        assert_eq!(
            fix_suggestions(&path, &config, &mut prompter).unwrap_err(),
            EpubError::NoStylesheetAvailable
        );
        assert!(prompter.presented.is_empty());

        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!sibling_path(&path, "original").exists());
        assert!(!sibling_path(&path, "temp").exists());
    }

    #[test]
    fn test_fix_keeps_source_encoding() {
        let dir = tempdir().unwrap();
        let mut with_bom = vec![0xEF, 0xBB, 0xBF];
        with_bom.extend_from_slice(xhtml("<p>A, b and c.</p>").as_bytes());
        let mut utf16 = vec![0xFF, 0xFE];
        for unit in xhtml("<p>D, e and f.</p>").encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }

        let path = EpubFixture::new()
            .chapter_bytes("bom.xhtml", &with_bom)
            .chapter_bytes("wide.xhtml", &utf16)
            .build(dir.path());
        let before = raw_entries(&path);

        let config = DetectorConfig::new().enable(DetectorId::OxfordComma);
        let summary =
            fix_suggestions(&path, &config, &mut ScriptedPrompter::accept_all()).unwrap();
        assert_eq!(summary.changed, vec!["OEBPS/Text/bom.xhtml".to_string()]);

        let bom = read_entry_bytes(&path, "OEBPS/Text/bom.xhtml");
        assert!(bom.starts_with(&[0xEF, 0xBB, 0xBF]));
        assert!(String::from_utf8(bom).unwrap().contains("<p>A, b, and c.</p>"));

        // the UTF-16 chapter is neither offered nor rewritten
        let after = raw_entries(&path);
        let wide = |entries: &[(String, CompressionMethod, Vec<u8>)]| {
            entries
                .iter()
                .find(|(name, _, _)| name == "OEBPS/Text/wide.xhtml")
                .cloned()
                .unwrap()
        };
        assert_eq!(wide(after.as_slice()), wide(before.as_slice()));
    }

    #[test]
    fn test_preview_reports_without_writing() {
        let dir = tempdir().unwrap();
        let path = EpubFixture::new()
            .chapter(
                "one.xhtml",
                &xhtml("<p>I run, skip and jump.</p>\n<p>\u{e2}\u{20ac}\u{153}Hi</p>"),
            )
            .chapter("two.xhtml", &xhtml("<p>Fine.</p>"))
            .build(dir.path());
        let before = fs::read(&path).unwrap();

        let config = DetectorConfig::new()
            .enable(DetectorId::OxfordComma)
            .enable(DetectorId::MisencodedQuote);
        let findings = preview_suggestions(&path, &config).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].path, "OEBPS/Text/one.xhtml");
        assert_eq!(findings[0].findings.len(), 1);
        assert_eq!(findings[0].findings[0].detector, DetectorId::OxfordComma);
        assert_eq!(findings[0].failures.len(), 1);
        assert_eq!(findings[0].failures[0].0, DetectorId::MisencodedQuote);

        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!sibling_path(&path, "original").exists());
    }

    #[test]
    fn test_preview_requires_indicator() {
        let dir = tempdir().unwrap();
        let path = book(dir.path());

        let config = DetectorConfig::new().enable(DetectorId::SectionBreak);
        assert_eq!(
            preview_suggestions(&path, &config).unwrap_err(),
            EpubError::BlankSectionBreakIndicator
        );
    }

    #[test]
    fn test_replace_strings_counts_hits() {
        let dir = tempdir().unwrap();
        let path = EpubFixture::new()
            .chapter("one.xhtml", &xhtml("<p>teh cat and teh dog</p>"))
            .chapter("two.xhtml", &xhtml("<p>teh end</p>"))
            .build(dir.path());
        let table = ReplacementTable::parse("| a | b |\n|---|---|\n| teh | the |\n| zebra | horse |\n");

        let counter = replace_strings(&path, &table).unwrap();

        assert_eq!(counter.hits("teh"), Some(3));
        assert_eq!(counter.misses(), vec!["zebra"]);
        assert!(read_entry(&path, "OEBPS/Text/one.xhtml").contains("<p>the cat and the dog</p>"));
        assert!(read_entry(&path, "OEBPS/Text/two.xhtml").contains("<p>the end</p>"));
        assert!(read_entry(&path, "OEBPS/nav.xhtml").contains("<nav"));
    }

    #[test]
    fn test_replace_strings_with_empty_table_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = book(dir.path());
        let before = fs::read(&path).unwrap();
        let table = ReplacementTable::parse("| a | b |\n|---|---|\n| broken row\n");

        let counter = replace_strings(&path, &table).unwrap();

        assert!(counter.is_empty());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!sibling_path(&path, "original").exists());
    }
}
