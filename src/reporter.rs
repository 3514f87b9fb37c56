//! Diagnostic sink shared by every stage of the pipeline.
//!
//! Static errors (lexical, syntactic, resolution) and runtime errors travel
//! through separate channels so the driver can distinguish "never ran" from
//! "ran and failed": the former sets `had_error` (exit code 65), the latter
//! sets `had_runtime_error` (exit code 70).
//!
//! A `Reporter` is per-run state.  It prints each diagnostic to stderr as it
//! arrives and also retains the rendered messages, which keeps multi-error
//! scenarios (panic-mode recovery, resolver sweeps) observable by callers and
//! tests.

use log::debug;

use crate::error::LoxError;
use crate::token::{Token, TokenType};

/// Collects and prints diagnostics for a single interpreter run.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<String>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a static error at a bare source line (scanner errors, which have
    /// no token to point at).
    pub fn error(&mut self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    /// Report a static error at a specific token, distinguishing end-of-input
    /// from a located lexeme.
    pub fn error_at(&mut self, token: &Token<'_>, message: &str) {
        if matches!(token.token_type, TokenType::EOF) {
            self.report(token.line, " at end", message);
        } else {
            let location: String = format!(" at '{}'", token.lexeme);

            self.report(token.line, &location, message);
        }
    }

    /// Report a runtime error.  Does not touch the static-error flag.
    pub fn runtime_error(&mut self, err: &LoxError) {
        debug!("Runtime error reported: {}", err);

        let rendered: String = err.to_string();

        eprintln!("{}", rendered);

        self.diagnostics.push(rendered);
        self.had_runtime_error = true;
    }

    fn report(&mut self, line: usize, location: &str, message: &str) {
        let rendered: String = format!("[line {}] Error{}: {}", line, location, message);

        debug!("Static error reported: {}", rendered);

        eprintln!("{}", rendered);

        self.diagnostics.push(rendered);
        self.had_error = true;
    }

    /// Did any static (lexical/syntactic/resolution) error occur?
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    /// Did an uncaught runtime error occur?
    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// All diagnostics rendered so far, in report order.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}
