//! Inline character diff used to present a suggestion

use similar::{Algorithm, ChangeTag, TextDiff};

/// How removed and added spans are marked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffStyle {
    /// Red for removed text, green for added text
    #[default]
    Ansi,

    /// `[-removed-]` and `{+added+}` markers, for logs and dumb terminals
    Plain,
}

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Renders the difference between `original` and `suggested` as one string
///
/// Leading newlines of both inputs are dropped so that multi-line matches
/// align on their content. The alignment works on whole characters, so any
/// Unicode text can be rendered.
pub fn render(original: &str, suggested: &str, style: DiffStyle) -> String {
    let original = original.trim_start_matches('\n');
    let suggested = suggested.trim_start_matches('\n');

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(original, suggested);

    let mut output = String::with_capacity(original.len() + suggested.len());
    let mut run: Option<(ChangeTag, String)> = None;

    for change in diff.iter_all_changes() {
        if let Some((tag, text)) = &mut run {
            if *tag == change.tag() {
                text.push_str(change.value());
                continue;
            }
        }

        if let Some((tag, text)) = run.replace((change.tag(), change.value().to_string())) {
            push_run(&mut output, tag, &text, style);
        }
    }
    if let Some((tag, text)) = run {
        push_run(&mut output, tag, &text, style);
    }

    output
}

fn push_run(output: &mut String, tag: ChangeTag, text: &str, style: DiffStyle) {
    match (tag, style) {
        (ChangeTag::Equal, _) => output.push_str(text),
        (ChangeTag::Delete, DiffStyle::Ansi) => {
            output.push_str(RED);
            output.push_str(text);
            output.push_str(RESET);
        }
        (ChangeTag::Insert, DiffStyle::Ansi) => {
            output.push_str(GREEN);
            output.push_str(text);
            output.push_str(RESET);
        }
        (ChangeTag::Delete, DiffStyle::Plain) => {
            output.push_str("[-");
            output.push_str(text);
            output.push_str("-]");
        }
        (ChangeTag::Insert, DiffStyle::Plain) => {
            output.push_str("{+");
            output.push_str(text);
            output.push_str("+}");
        }
    }
}
