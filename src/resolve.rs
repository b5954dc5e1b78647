//! Suggestion resolution
//!
//! [`ResolutionController`] walks every `(file, detector, suggestion)` tuple
//! in a fixed order: files in manifest order, detectors in registration
//! order, suggestions in detection order. It is a plain state machine driven
//! by [`ResolutionController::respond`] and friends, so it can be tested
//! without a terminal; [`ResolutionController::run`] drives it through a
//! [`Prompter`].
//!
//! ```text
//! CollectingContext ──indicator──▶ PresentingSuggestion ──exhausted / quit──▶ SelectingStyleTarget ──▶ Done
//!                                        ▲        │                                   (only when needed)
//!                                        └────────┘ accept / reject / edit
//! ```
//!
//! Detectors run lazily, when the walk reaches their `(file, detector)` pair,
//! so they always see the buffer with every earlier acceptance applied.

use std::{
    collections::VecDeque,
    io::{self, BufRead, StdinLock, Stdout, Write},
};

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::{
    detect::{DetectContext, Detector, DetectorConfig, DetectorId, ReplacementPolicy, StyleRule},
    diff::{DiffStyle, render},
    error::EpubError,
    types::{ResolutionState, Suggestion},
};

/// The states of the resolution walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for the section break indicator
    CollectingContext,

    /// A suggestion is waiting for a decision
    PresentingSuggestion,

    /// Accepted breaks need a rule appended to one of several stylesheets
    SelectingStyleTarget,

    Done,
}

/// The user's answer to one suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,

    /// Accept with a different replacement
    Edit(String),

    /// Stop the walk, keeping everything accepted so far
    Quit,
}

/// What is shown for the suggestion being decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionView<'a> {
    /// Container path of the file
    pub path: &'a str,
    pub detector: DetectorId,
    pub suggestion: &'a Suggestion,

    /// 1-based position of the file among all files
    pub file_number: usize,
    pub file_count: usize,
}

/// Renders the prompt for one suggestion
pub fn render_prompt(view: &SuggestionView<'_>, style: DiffStyle) -> String {
    format!(
        "[{}/{}] {} ({})\n{}\n[a]ccept / [r]eject / [e]dit / [q]uit: ",
        view.file_number,
        view.file_count,
        view.path,
        view.detector,
        render(
            &view.suggestion.original,
            &view.suggestion.replacement,
            style
        )
    )
}

/// Supplies the user's answers to the controller
pub trait Prompter {
    /// Asks for the text that marks a hard-coded section break
    fn section_break_indicator(&mut self) -> Result<String, EpubError>;

    fn decide(&mut self, view: &SuggestionView<'_>) -> Result<Decision, EpubError>;

    /// Picks the index of the stylesheet that receives the break rules
    fn select_stylesheet(&mut self, stylesheets: &[String]) -> Result<usize, EpubError>;
}

/// Counts and outcome of one resolution run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub accepted: usize,
    pub edited: usize,
    pub rejected: usize,

    /// True if the walk ended with a Quit
    pub quit: bool,

    /// Container paths whose content differs from what was read
    pub changed: Vec<String>,
}

/// One decided suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRecord {
    pub path: String,
    pub detector: DetectorId,
    pub suggestion: Suggestion,
    pub state: ResolutionState,
}

#[derive(Debug, Clone)]
struct FileBuffer {
    original: String,
    current: String,
}

impl FileBuffer {
    fn new(content: String) -> Self {
        Self {
            current: content.clone(),
            original: content,
        }
    }

    fn is_changed(&self) -> bool {
        self.current != self.original
    }
}

/// The suggestion resolution state machine
pub struct ResolutionController {
    state: ControllerState,
    context: DetectContext,
    detectors: Vec<&'static Detector>,

    documents: IndexMap<String, FileBuffer>,
    stylesheets: IndexMap<String, FileBuffer>,

    /// Next `(file, detector)` pair to run, as `file * detectors + detector`
    next_pair: usize,
    file_index: usize,
    detector_index: usize,
    pending: VecDeque<Suggestion>,
    current: Option<Suggestion>,

    required_rules: Vec<StyleRule>,
    history: Vec<ResolutionRecord>,
    quit: bool,
}

impl ResolutionController {
    /// Creates a controller over the given documents and stylesheets
    ///
    /// Both are `(container path, content)` pairs in manifest order.
    ///
    /// # Return
    /// - `Ok(ResolutionController)`: In `CollectingContext` if section breaks are
    ///   detected and the configuration has no indicator, `PresentingSuggestion`
    ///   or `Done` otherwise
    /// - `Err(EpubError)`: The configuration enables no detector, or enables a
    ///   break detector while there is no stylesheet to append its rule to
    pub fn new<D, S>(config: &DetectorConfig, documents: D, stylesheets: S) -> Result<Self, EpubError>
    where
        D: IntoIterator<Item = (String, String)>,
        S: IntoIterator<Item = (String, String)>,
    {
        if config.is_empty() {
            return Err(EpubError::NoDetectorEnabled);
        }

        let stylesheets = stylesheets
            .into_iter()
            .map(|(path, content)| (path, FileBuffer::new(content)))
            .collect::<IndexMap<_, _>>();
        if stylesheets.is_empty() && config.needs_stylesheet() {
            return Err(EpubError::NoStylesheetAvailable);
        }

        let mut controller = Self {
            state: ControllerState::CollectingContext,
            context: DetectContext {
                section_break_indicator: config.section_break_indicator().map(str::to_string),
            },
            detectors: config.detectors(),
            documents: documents
                .into_iter()
                .map(|(path, content)| (path, FileBuffer::new(content)))
                .collect(),
            stylesheets,
            next_pair: 0,
            file_index: 0,
            detector_index: 0,
            pending: VecDeque::new(),
            current: None,
            required_rules: Vec::new(),
            history: Vec::new(),
            quit: false,
        };

        if !config.needs_section_break_indicator() || controller.context.section_break_indicator.is_some() {
            controller.advance()?;
        }

        Ok(controller)
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Returns the suggestion being decided, if any
    pub fn current(&self) -> Option<SuggestionView<'_>> {
        let suggestion = self.current.as_ref()?;
        let (path, _) = self.documents.get_index(self.file_index)?;

        Some(SuggestionView {
            path,
            detector: self.detectors[self.detector_index].id,
            suggestion,
            file_number: self.file_index + 1,
            file_count: self.documents.len(),
        })
    }

    /// Supplies the section break indicator and starts the walk
    pub fn provide_section_break_indicator(&mut self, indicator: &str) -> Result<(), EpubError> {
        if self.state != ControllerState::CollectingContext {
            warn!("Ignoring a section break indicator outside of CollectingContext.");
            return Ok(());
        }
        if indicator.trim().is_empty() {
            return Err(EpubError::BlankSectionBreakIndicator);
        }

        self.context.section_break_indicator = Some(indicator.trim().to_string());
        self.advance()
    }

    /// Applies a decision to the current suggestion and moves on
    pub fn respond(&mut self, decision: Decision) -> Result<(), EpubError> {
        if self.state != ControllerState::PresentingSuggestion {
            warn!("Ignoring a decision outside of PresentingSuggestion.");
            return Ok(());
        }
        let Some(suggestion) = self.current.take() else {
            return self.advance();
        };

        let state = match decision {
            Decision::Accept => {
                self.apply(&suggestion.original, &suggestion.replacement);
                ResolutionState::Accepted
            }
            Decision::Edit(replacement) => {
                self.apply(&suggestion.original, &replacement);
                ResolutionState::Edited(replacement)
            }
            Decision::Reject => ResolutionState::Rejected,
            Decision::Quit => {
                info!("Resolution stopped by the user; accepted suggestions are kept.");
                self.quit = true;
                self.pending.clear();
                self.next_pair = self.pair_count();
                return self.finish_walk();
            }
        };

        debug!(
            "Suggestion {} in \"{}\" was {}.",
            self.history.len() + 1,
            self.current_path(),
            state
        );
        self.history.push(ResolutionRecord {
            path: self.current_path().to_string(),
            detector: self.detectors[self.detector_index].id,
            suggestion,
            state,
        });
        self.advance()
    }

    /// Returns the stylesheets offered in `SelectingStyleTarget`
    pub fn stylesheet_paths(&self) -> Vec<String> {
        self.stylesheets.keys().cloned().collect()
    }

    /// Appends the required rules to the chosen stylesheet
    pub fn select_stylesheet(&mut self, index: usize) -> Result<(), EpubError> {
        if self.state != ControllerState::SelectingStyleTarget {
            warn!("Ignoring a stylesheet selection outside of SelectingStyleTarget.");
            return Ok(());
        }
        if index >= self.stylesheets.len() {
            return Err(EpubError::InvalidStylesheetSelection {
                index,
                available: self.stylesheets.len(),
            });
        }

        self.append_rules(index);
        self.state = ControllerState::Done;
        Ok(())
    }

    /// Drives the controller to `Done`
    pub fn run<P: Prompter + ?Sized>(
        &mut self,
        prompter: &mut P,
    ) -> Result<ResolutionSummary, EpubError> {
        loop {
            match self.state {
                ControllerState::CollectingContext => {
                    let indicator = prompter.section_break_indicator()?;
                    self.provide_section_break_indicator(&indicator)?;
                }
                ControllerState::PresentingSuggestion => {
                    let decision = match self.current() {
                        Some(view) => prompter.decide(&view)?,
                        None => Decision::Quit,
                    };
                    self.respond(decision)?;
                }
                ControllerState::SelectingStyleTarget => {
                    let index = prompter.select_stylesheet(&self.stylesheet_paths())?;
                    self.select_stylesheet(index)?;
                }
                ControllerState::Done => return Ok(self.summary()),
            }
        }
    }

    pub fn history(&self) -> &[ResolutionRecord] {
        &self.history
    }

    pub fn summary(&self) -> ResolutionSummary {
        let mut summary = ResolutionSummary {
            quit: self.quit,
            changed: self.changed_files().into_iter().map(|(path, _)| path.to_string()).collect(),
            ..Default::default()
        };

        for record in &self.history {
            match record.state {
                ResolutionState::Accepted => summary.accepted += 1,
                ResolutionState::Edited(_) => summary.edited += 1,
                ResolutionState::Rejected => summary.rejected += 1,
                ResolutionState::Pending => {}
            }
        }
        summary
    }

    /// Returns the current content of a document or stylesheet
    pub fn buffer(&self, path: &str) -> Option<&str> {
        self.documents
            .get(path)
            .or_else(|| self.stylesheets.get(path))
            .map(|buffer| buffer.current.as_str())
    }

    /// Returns `(container path, content)` of every changed file
    pub fn changed_files(&self) -> Vec<(&str, &str)> {
        self.documents
            .iter()
            .chain(self.stylesheets.iter())
            .filter(|(_, buffer)| buffer.is_changed())
            .map(|(path, buffer)| (path.as_str(), buffer.current.as_str()))
            .collect()
    }

    fn pair_count(&self) -> usize {
        self.documents.len() * self.detectors.len()
    }

    fn current_path(&self) -> &str {
        self.documents
            .get_index(self.file_index)
            .map(|(path, _)| path.as_str())
            .unwrap_or_default()
    }

    /// Moves to the next live suggestion, running detectors as pairs are reached
    fn advance(&mut self) -> Result<(), EpubError> {
        loop {
            while let Some(suggestion) = self.pending.pop_front() {
                let Some((path, buffer)) = self.documents.get_index(self.file_index) else {
                    break;
                };

                if !buffer.current.contains(&suggestion.original) {
                    debug!("Skipping a suggestion in \"{}\" whose text was already changed.", path);
                    continue;
                }

                self.current = Some(suggestion);
                self.state = ControllerState::PresentingSuggestion;
                return Ok(());
            }

            if self.next_pair >= self.pair_count() {
                return self.finish_walk();
            }
            self.load_pair();
        }
    }

    fn load_pair(&mut self) {
        let pair = self.next_pair;
        self.next_pair += 1;
        self.file_index = pair / self.detectors.len();
        self.detector_index = pair % self.detectors.len();

        let detector = self.detectors[self.detector_index];
        let Some((path, buffer)) = self.documents.get_index(self.file_index) else {
            return;
        };

        for result in detector.run(&buffer.current, &self.context) {
            match result {
                Ok(suggestion) => self.pending.push_back(suggestion),
                Err(err) => warn!(
                    "Skipping a {} suggestion in \"{}\": {}",
                    detector.id, path, err
                ),
            }
        }
    }

    fn apply(&mut self, original: &str, replacement: &str) {
        let detector = self.detectors[self.detector_index];
        let Some((_, buffer)) = self.documents.get_index_mut(self.file_index) else {
            return;
        };

        buffer.current = match detector.policy {
            ReplacementPolicy::First => buffer.current.replacen(original, replacement, 1),
            ReplacementPolicy::All => buffer.current.replace(original, replacement),
        };

        if let Some(rule) = detector.stylesheet_rule {
            if !self.required_rules.contains(&rule) {
                self.required_rules.push(rule);
            }
        }
    }

    /// Leaves `PresentingSuggestion` once no tuple is left to offer
    fn finish_walk(&mut self) -> Result<(), EpubError> {
        self.current = None;

        if self.required_rules.is_empty() {
            self.state = ControllerState::Done;
            return Ok(());
        }

        match self.stylesheets.len() {
            0 => Err(EpubError::NoStylesheetAvailable),
            1 => {
                self.append_rules(0);
                self.state = ControllerState::Done;
                Ok(())
            }
            _ => {
                self.state = ControllerState::SelectingStyleTarget;
                Ok(())
            }
        }
    }

    fn append_rules(&mut self, index: usize) {
        let Some((path, buffer)) = self.stylesheets.get_index_mut(index) else {
            return;
        };

        for rule in &self.required_rules {
            if buffer.current.contains(rule.selector) {
                continue;
            }

            if !buffer.current.is_empty() && !buffer.current.ends_with('\n') {
                buffer.current.push('\n');
            }
            buffer.current.push('\n');
            buffer.current.push_str(rule.block);
            info!("Appended the \"{}\" rule to \"{}\".", rule.selector, path);
        }
    }
}

/// Answers prompts on a terminal
///
/// Any reader and writer can stand in for the terminal.
pub struct TerminalPrompter<R: BufRead, W: Write> {
    input: R,
    output: W,
    style: DiffStyle,
}

impl TerminalPrompter<StdinLock<'static>, Stdout> {
    /// Prompts on standard output and reads standard input, with colored diffs
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout(), DiffStyle::Ansi)
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W, style: DiffStyle) -> Self {
        Self {
            input,
            output,
            style,
        }
    }

    fn ask(&mut self, prompt: &str) -> Result<Option<String>, EpubError> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn section_break_indicator(&mut self) -> Result<String, EpubError> {
        loop {
            match self.ask("Section break indicator: ")? {
                None => return Ok(String::new()),
                Some(answer) if answer.trim().is_empty() => {
                    writeln!(self.output, "The indicator cannot be blank.")?;
                }
                Some(answer) => return Ok(answer),
            }
        }
    }

    fn decide(&mut self, view: &SuggestionView<'_>) -> Result<Decision, EpubError> {
        let prompt = render_prompt(view, self.style);
        loop {
            let Some(answer) = self.ask(&prompt)? else {
                return Ok(Decision::Quit);
            };

            match answer.trim().to_lowercase().as_str() {
                "a" | "accept" | "y" | "yes" => return Ok(Decision::Accept),
                "r" | "reject" | "n" | "no" => return Ok(Decision::Reject),
                "q" | "quit" => return Ok(Decision::Quit),
                "e" | "edit" => {
                    return Ok(match self.ask("Replacement: ")? {
                        Some(replacement) => Decision::Edit(replacement),
                        None => Decision::Quit,
                    });
                }
                _ => writeln!(self.output, "Please enter a, r, e, or q.")?,
            }
        }
    }

    fn select_stylesheet(&mut self, stylesheets: &[String]) -> Result<usize, EpubError> {
        writeln!(self.output, "Append the break rules to which stylesheet?")?;
        for (index, path) in stylesheets.iter().enumerate() {
            writeln!(self.output, "  {}) {}", index + 1, path)?;
        }

        loop {
            let Some(answer) = self.ask("Stylesheet number: ")? else {
                return Err(EpubError::IOError {
                    source: io::Error::from(io::ErrorKind::UnexpectedEof),
                });
            };

            match answer.trim().parse::<usize>() {
                Ok(number) if (1..=stylesheets.len()).contains(&number) => return Ok(number - 1),
                _ => writeln!(
                    self.output,
                    "Please enter a number between 1 and {}.",
                    stylesheets.len()
                )?,
            }
        }
    }
}

/// Answers prompts from a prepared script
///
/// Once the queued decisions run out every further suggestion gets `Quit`,
/// or `Accept` for [`ScriptedPrompter::accept_all`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    indicator: Option<String>,
    decisions: VecDeque<Decision>,
    accept_rest: bool,
    stylesheet: usize,

    /// Every suggestion that was presented, in order
    pub presented: Vec<(String, DetectorId, Suggestion)>,
}

impl ScriptedPrompter {
    pub fn new<I: IntoIterator<Item = Decision>>(decisions: I) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Accepts every suggestion
    pub fn accept_all() -> Self {
        Self {
            accept_rest: true,
            ..Default::default()
        }
    }

    pub fn with_section_break_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.indicator = Some(indicator.into());
        self
    }

    pub fn with_stylesheet(mut self, index: usize) -> Self {
        self.stylesheet = index;
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn section_break_indicator(&mut self) -> Result<String, EpubError> {
        Ok(self.indicator.clone().unwrap_or_default())
    }

    fn decide(&mut self, view: &SuggestionView<'_>) -> Result<Decision, EpubError> {
        self.presented.push((
            view.path.to_string(),
            view.detector,
            view.suggestion.clone(),
        ));
        Ok(match self.decisions.pop_front() {
            Some(decision) => decision,
            None if self.accept_rest => Decision::Accept,
            None => Decision::Quit,
        })
    }

    fn select_stylesheet(&mut self, _stylesheets: &[String]) -> Result<usize, EpubError> {
        Ok(self.stylesheet)
    }
}
