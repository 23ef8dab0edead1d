//! Operator confirmation.
//!
//! Destructive actions ask before they run. The host decides how: an
//! interactive terminal, a `--yes` flag, or a test double.

use std::io::{BufRead, Write};
use tracing::debug;

/// Asks the operator a yes/no question.
pub trait Confirm: Send + Sync {
    /// Returns true if the operator agreed.
    fn confirm(&self, question: &str) -> bool;
}

/// Reads the answer from standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        let mut stderr = std::io::stderr();
        if write!(stderr, "{question} [y/N] ").and_then(|()| stderr.flush()).is_err() {
            return false;
        }

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        parse_answer(&answer)
    }
}

/// Answers every question the same way.
#[derive(Debug, Clone, Copy)]
pub struct AssumeAnswer(pub bool);

impl Confirm for AssumeAnswer {
    fn confirm(&self, question: &str) -> bool {
        debug!("{question} (assuming {})", if self.0 { "yes" } else { "no" });
        self.0
    }
}

fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
