//! Per-line rules applied to game server output.
//!
//! Rules are evaluated in table order and every matching rule fires. The
//! readiness rule is deliberately not deduplicated: each occurrence of the
//! marker yields one RCON connection attempt.

use crate::error::supervisor::SupervisorError;
use crate::supervisor::log_stream::StreamKind;

use log::{info, warn};

/// Substring the server prints once its RCON listener is up.
pub const RCON_READY_MARKER: &str = "Starting RCON interface at IP";

/// Second token of a line the server reports as an error.
pub const ERROR_TOKEN: &str = "Error";

/// A line of output split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub raw: String,
    pub tokens: Vec<String>,
}

impl LogLine {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let tokens = raw.split_whitespace().map(str::to_string).collect();
        Self { raw, tokens }
    }

    pub fn joined(&self) -> String {
        self.tokens.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    ClassifyError,
    ConnectRcon,
}

#[derive(Debug, Clone, Copy)]
pub struct LineRule {
    pub name: &'static str,
    pub matches: fn(&LogLine) -> bool,
    pub action: LineAction,
}

fn is_error_line(line: &LogLine) -> bool {
    line.tokens.len() >= 2 && line.tokens[1] == ERROR_TOKEN
}

fn is_rcon_ready_line(line: &LogLine) -> bool {
    line.tokens.len() >= 3 && line.joined().contains(RCON_READY_MARKER)
}

pub const DEFAULT_RULES: &[LineRule] = &[
    LineRule {
        name: "error",
        matches: is_error_line,
        action: LineAction::ClassifyError,
    },
    LineRule {
        name: "rcon-ready",
        matches: is_rcon_ready_line,
        action: LineAction::ConnectRcon,
    },
];

/// Actions every rule in `rules` requests for `line`, in table order.
pub fn evaluate(rules: &[LineRule], line: &LogLine) -> Vec<LineAction> {
    rules
        .iter()
        .filter(|rule| (rule.matches)(line))
        .map(|rule| rule.action)
        .collect()
}

/// What a stream processor hands to the run's dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    ServerError {
        stream: StreamKind,
        tokens: Vec<String>,
    },
    RconReady {
        stream: StreamKind,
    },
}

/// Hook for reacting to error lines from the server.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, tokens: &[String]) -> Result<(), SupervisorError>;
}

/// Observes and logs. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyClassifier;

impl ErrorClassifier for LogOnlyClassifier {
    fn classify(&self, tokens: &[String]) -> Result<(), SupervisorError> {
        if tokens.is_empty() {
            warn!("Empty error line from Factorio server");
        } else {
            info!("Factorio server reported an error: {}", tokens.join(" "));
        }
        Ok(())
    }
}
