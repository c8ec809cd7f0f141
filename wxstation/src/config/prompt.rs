//! Interactive collection of station values.
//!
//! The engine never talks to a terminal itself. It asks a [`ValueSource`]
//! for each field the command line left open, validates the answer and
//! re-asks on invalid input. The CLI provides a console-backed source;
//! [`NoPrompt`] answers nothing and [`ScriptedSource`] replays canned answers.

use std::collections::VecDeque;

use thiserror::Error;

use super::keys::{FieldValue, StationField};
use super::merge::Overlay;
use super::tree::ConfigTree;
use super::validate::ValidationError;

/// Times a single field is asked before giving up on invalid answers.
pub const MAX_PROMPT_ATTEMPTS: usize = 5;

/// Errors raised while prompting.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Input ended before the field was answered.
    #[error("Input ended while asking for {0}")]
    Aborted(StationField),

    /// The terminal could not be read or written.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Too many invalid answers.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A single question for a value source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub field: StationField,
    pub question: &'static str,
    /// Offered when the answer is empty.
    pub default: Option<String>,
}

/// Where prompted values come from.
pub trait ValueSource {
    /// Ask for one field.
    ///
    /// `Ok(None)` means the source does not answer; the field keeps whatever
    /// the lower layers hold. An empty string accepts the default.
    fn ask(&mut self, request: &PromptRequest) -> Result<Option<String>, PromptError>;

    /// Called when an answer failed validation and the field will be asked again.
    fn report_invalid(&mut self, _error: &ValidationError) {}
}

/// Source for `--no-prompt`: never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl ValueSource for NoPrompt {
    fn ask(&mut self, _request: &PromptRequest) -> Result<Option<String>, PromptError> {
        Ok(None)
    }
}

/// Replays a fixed list of answers, one per question.
///
/// Running out of answers behaves like end of input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    pub answers: VecDeque<String>,
    /// Requests seen, in order.
    pub asked: Vec<PromptRequest>,
    /// Validation failures reported back.
    pub rejected: Vec<ValidationError>,
}

impl ScriptedSource {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Fields asked, in order.
    pub fn asked_fields(&self) -> Vec<StationField> {
        self.asked.iter().map(|r| r.field).collect()
    }
}

impl ValueSource for ScriptedSource {
    fn ask(&mut self, request: &PromptRequest) -> Result<Option<String>, PromptError> {
        self.asked.push(request.clone());
        self.answers
            .pop_front()
            .map(Some)
            .ok_or(PromptError::Aborted(request.field))
    }

    fn report_invalid(&mut self, error: &ValidationError) {
        self.rejected.push(error.clone());
    }
}

/// Ask for every promptable field that `cli` does not already set.
///
/// Defaults offered come from `defaults` (the existing configuration merged
/// over the baseline). The station URL is only asked when registration is
/// on after taking the CLI and earlier answers into account.
pub fn prompt_missing(
    source: &mut dyn ValueSource,
    cli: &Overlay,
    defaults: &ConfigTree,
) -> Result<Overlay, PromptError> {
    let mut answers = Overlay::new();

    for &field in StationField::all() {
        if cli.contains(field) {
            continue;
        }
        let Some(question) = field.prompt() else {
            continue;
        };
        if field == StationField::StationUrl && !registering(cli, &answers, defaults) {
            continue;
        }

        let request = PromptRequest {
            field,
            question,
            default: field.read(defaults),
        };
        if let Some(value) = ask_field(source, &request)? {
            tracing::debug!(field = %field, "prompted value accepted");
            answers.insert(field, value);
        }
    }

    Ok(answers)
}

/// Ask until a valid answer arrives or attempts run out.
fn ask_field(
    source: &mut dyn ValueSource,
    request: &PromptRequest,
) -> Result<Option<FieldValue>, PromptError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(answer) = source.ask(request)? else {
            return Ok(None);
        };
        if answer.trim().is_empty() {
            // Accept the default; lower layers already hold it.
            return Ok(None);
        }
        match request.field.parse(&answer) {
            Ok(value) => return Ok(Some(value)),
            Err(err) if attempt >= MAX_PROMPT_ATTEMPTS => return Err(PromptError::Invalid(err)),
            Err(err) => {
                tracing::debug!(field = %request.field, attempt, "rejected prompted value");
                source.report_invalid(&err);
            }
        }
    }
}

fn registering(cli: &Overlay, answers: &Overlay, defaults: &ConfigTree) -> bool {
    let explicit = answers
        .get(StationField::Register)
        .or_else(|| cli.get(StationField::Register));
    match explicit {
        Some(FieldValue::Register(flag)) => flag.0,
        _ => StationField::Register.read(defaults).as_deref() == Some("y"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::Baseline;

    fn defaults() -> ConfigTree {
        Baseline::load().unwrap().tree().clone()
    }

    #[test]
    fn test_no_prompt_resolves_nothing() {
        let answers = prompt_missing(&mut NoPrompt, &Overlay::new(), &defaults()).unwrap();
        assert!(answers.is_empty());
    }

    #[test]
    fn test_prompts_only_fields_missing_from_cli() {
        let cli = Overlay::from_raw([
            (StationField::Location, "Hood River"),
            (StationField::Altitude, "700,foot"),
        ])
        .unwrap();
        let mut source = ScriptedSource::new(["45.7", "-121.5", "", "", "n"]);

        let answers = prompt_missing(&mut source, &cli, &defaults()).unwrap();

        assert_eq!(
            source.asked_fields(),
            vec![
                StationField::Latitude,
                StationField::Longitude,
                StationField::Driver,
                StationField::UnitSystem,
                StationField::Register,
            ]
        );
        assert_eq!(answers.len(), 3);
        assert!(!answers.contains(StationField::Driver));
    }

    #[test]
    fn test_defaults_offered_from_tree() {
        let mut source = ScriptedSource::new(["", "", "", "", "", "", ""]);
        prompt_missing(&mut source, &Overlay::new(), &defaults()).unwrap();

        let location = &source.asked[0];
        assert_eq!(location.field, StationField::Location);
        assert_eq!(location.default.as_deref(), Some("Weather Station"));
        let altitude = &source.asked[3];
        assert_eq!(altitude.default.as_deref(), Some("0,foot"));
    }

    #[test]
    fn test_invalid_answer_is_reasked() {
        let cli = Overlay::from_raw([
            (StationField::Location, "x"),
            (StationField::Latitude, "1"),
            (StationField::Longitude, "1"),
            (StationField::Driver, "wxstation.drivers.simulator"),
            (StationField::UnitSystem, "us"),
            (StationField::Register, "n"),
        ])
        .unwrap();
        let mut source = ScriptedSource::new(["700", "seven,foot", "700,foot"]);

        let answers = prompt_missing(&mut source, &cli, &defaults()).unwrap();

        assert_eq!(source.rejected.len(), 2);
        assert_eq!(
            answers
                .get(StationField::Altitude)
                .map(|v| v.to_string())
                .as_deref(),
            Some("700,foot")
        );
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut source = ScriptedSource::new(vec!["abc"; MAX_PROMPT_ATTEMPTS]);
        let cli = Overlay::from_raw([(StationField::Location, "x")]).unwrap();

        let err = prompt_missing(&mut source, &cli, &defaults()).unwrap_err();
        match err {
            PromptError::Invalid(e) => assert_eq!(e.field, "latitude"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(source.rejected.len(), MAX_PROMPT_ATTEMPTS - 1);
    }

    #[test]
    fn test_end_of_input_aborts() {
        let mut source = ScriptedSource::new(["Somewhere"]);
        let err = prompt_missing(&mut source, &Overlay::new(), &defaults()).unwrap_err();
        assert!(matches!(err, PromptError::Aborted(StationField::Latitude)));
    }

    #[test]
    fn test_station_url_asked_only_when_registering() {
        let cli = Overlay::from_raw([
            (StationField::Location, "x"),
            (StationField::Latitude, "1"),
            (StationField::Longitude, "1"),
            (StationField::Altitude, "1,foot"),
            (StationField::Driver, "wxstation.drivers.simulator"),
            (StationField::UnitSystem, "us"),
        ])
        .unwrap();

        let mut source = ScriptedSource::new(["y", "https://example.com/wx"]);
        let answers = prompt_missing(&mut source, &cli, &defaults()).unwrap();
        assert_eq!(
            source.asked_fields(),
            vec![StationField::Register, StationField::StationUrl]
        );
        assert!(answers.contains(StationField::StationUrl));

        let mut source = ScriptedSource::new(["n"]);
        prompt_missing(&mut source, &cli, &defaults()).unwrap();
        assert_eq!(source.asked_fields(), vec![StationField::Register]);
    }

    #[test]
    fn test_empty_url_leaves_field_unresolved() {
        let cli = Overlay::from_raw([
            (StationField::Location, "x"),
            (StationField::Latitude, "1"),
            (StationField::Longitude, "1"),
            (StationField::Altitude, "1,foot"),
            (StationField::Driver, "wxstation.drivers.simulator"),
            (StationField::UnitSystem, "us"),
            (StationField::Register, "y"),
        ])
        .unwrap();
        let mut source = ScriptedSource::new([""]);

        let answers = prompt_missing(&mut source, &cli, &defaults()).unwrap();
        assert!(answers.is_empty());
        assert_eq!(source.asked_fields(), vec![StationField::StationUrl]);
    }
}
