//! Terminal prompts for station values.
//!
//! Presentation only: questions, defaults and validation all come from the
//! engine through [`ValueSource`].

use std::io;

use console::style;
use dialoguer::{theme::ColorfulTheme, Input};

use wxstation::config::{PromptError, PromptRequest, ValidationError, ValueSource};

/// Asks on the terminal with dialoguer.
pub struct ConsoleSource {
    theme: ColorfulTheme,
}

impl ConsoleSource {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl ValueSource for ConsoleSource {
    fn ask(&mut self, request: &PromptRequest) -> Result<Option<String>, PromptError> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(request.question)
            .allow_empty(true);
        if let Some(default) = &request.default {
            input = input.default(default.clone());
        }

        match input.interact_text() {
            Ok(answer) => Ok(Some(answer)),
            Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(PromptError::Aborted(request.field))
            }
            Err(e) => Err(PromptError::Terminal(e.to_string())),
        }
    }

    fn report_invalid(&mut self, error: &ValidationError) {
        eprintln!("  {} {}", style("!").yellow(), style(error).yellow());
    }
}
