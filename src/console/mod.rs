use anyhow::Error;

use crate::handlers::HandlerError;
use crate::types::{Rubric, ScoreResult};

mod render;

/// Terminal presentation for scoring runs
pub struct Console;

impl Console {
    pub fn display_loading(rubric: Rubric) {
        render::display_loading(rubric);
    }

    /// Display the evaluation as a score card
    pub fn display_score(title: &str, rubric: Rubric, result: &ScoreResult) {
        render::display_score(title, rubric, result);
    }

    /// Print the normalized result as pretty JSON
    pub fn display_json(result: &ScoreResult) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(result)?);
        Ok(())
    }

    /// Display an error message with context-aware messaging
    pub fn display_error(error: &Error) {
        render::display_error(error);
    }

    pub fn display_handler_error(error: &HandlerError) {
        render::display_handler_error(error);
    }
}
