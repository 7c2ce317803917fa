//! Per-sentence request details.
//!
//! Every [`crate::Response`] carries one [`SentenceDetails`] per input
//! sentence. They are cheap to collect (a few strings and a timer) and exist
//! to answer "why did the bot say that?" without turning on tracing:
//!
//! - `normalized_path` is exactly what the search saw.
//! - `matched_path` and `graph` say which category answered, and from where.
//! - `outcome` records a no-match or a safety abort.

use crate::error::MatchError;
use std::fmt;
use std::time::Duration;

/// Which graph a sentence matched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphKind {
    /// The user's own session graph.
    User,
    /// The bot's shared graph.
    Global,
}

/// How a sentence was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    #[default]
    Matched,
    /// No category matched; the default response was used.
    NoMatch,
    Timeout,
    RecursionLimit,
    LoopLimit,
}

impl From<MatchError> for Outcome {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::Timeout => Outcome::Timeout,
            MatchError::RecursionLimit => Outcome::RecursionLimit,
            MatchError::LoopLimit => Outcome::LoopLimit,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Matched => "matched",
            Outcome::NoMatch => "no match",
            Outcome::Timeout => "timeout",
            Outcome::RecursionLimit => "recursion limit",
            Outcome::LoopLimit => "loop limit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceDetails {
    /// The normalized sentence.
    pub input: String,
    /// `message <that> ... <topic> ...` as searched.
    pub normalized_path: String,
    /// Path of the category that answered, if any.
    pub matched_path: Option<String>,
    pub graph: Option<GraphKind>,
    pub outcome: Outcome,
    /// Time spent on the sentence, sub-requests included.
    pub elapsed: Duration,
}

impl SentenceDetails {
    pub fn new(input: impl Into<String>) -> Self {
        Self { input: input.into(), ..Self::default() }
    }
}
