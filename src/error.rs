//! Error types.
//!
//! Two families:
//!
//! - [`PatternError`]: a category could not be compiled. This is fatal to that
//!   one category only; the rest of the graph is unaffected.
//! - [`MatchError`]: a request-scoped safety abort raised while searching or
//!   evaluating. The request pipeline maps each variant to a configured
//!   message, so these never escape [`crate::Bot::chat`].

use thiserror::Error;

/// A structural problem in pattern or template markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("invalid element <{element}> in {context}")]
    InvalidElement { element: String, context: &'static str },

    #[error("missing '{attribute}' attribute in <{element}>")]
    MissingAttribute { element: String, attribute: &'static str },

    #[error("unterminated <{element}> element")]
    Unterminated { element: String },

    #[error("unexpected closing tag </{element}>")]
    UnexpectedClose { element: String },

    #[error("invalid index '{value}' in <{element}>")]
    InvalidIndex { element: String, value: String },

    #[error("an extension element named <{0}> is already registered")]
    DuplicateExtension(String),
}

/// Safety conditions that abort the in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("the request exceeded the configured timeout")]
    Timeout,

    #[error("the request exceeded the recursion limit")]
    RecursionLimit,

    #[error("the request exceeded the loop limit")]
    LoopLimit,
}
