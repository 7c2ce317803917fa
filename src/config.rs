//! Bot configuration.
//!
//! Everything the engine consumes from the outside world lives on [`Config`]:
//! safety limits, fallback messages, sentence splitters, the string comparer
//! used throughout matching, and the compile-time inputs of the pattern
//! compiler (bot properties). Loading these values from files is the host's
//! job; the engine only reads them.

use crate::normalize::SubstitutionList;
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

/// String comparison used for pattern words, set phrases, predicates and set
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Comparer {
    /// Unicode case-insensitive comparison (the default).
    #[default]
    IgnoreCase,
    /// Exact, case-sensitive comparison.
    CaseSensitive,
}

impl Comparer {
    /// Fold `text` into the form used as a lookup key.
    pub fn key<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            Comparer::CaseSensitive => Cow::Borrowed(text),
            Comparer::IgnoreCase if text.chars().any(char::is_uppercase) => Cow::Owned(text.to_lowercase()),
            Comparer::IgnoreCase => Cow::Borrowed(text),
        }
    }

    /// Return true if `a` and `b` are equal under this comparer.
    pub fn equals(&self, a: &str, b: &str) -> bool {
        match self {
            Comparer::CaseSensitive => a == b,
            Comparer::IgnoreCase => a == b || self.key(a) == self.key(b),
        }
    }
}

bitflags::bitflags! {
    /// Diagnostic trace switches. Tracing never changes a match outcome.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TraceFlags: u8 {
        /// Emit the normalized `message <that> ... <topic> ...` path.
        const NORMALIZED_PATH = 1 << 0;
        /// Emit every node visited by the search.
        const SEARCH_STEPS    = 1 << 1;
    }
}

impl TraceFlags {
    /// Read trace switches from `GRAPHMASTER_TRACE`.
    ///
    /// Accepts `1`/`all`, or a comma-separated list of `path` and `search`.
    pub fn from_env() -> Self {
        match std::env::var("GRAPHMASTER_TRACE") {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::empty(),
        }
    }

    fn parse(value: &str) -> Self {
        let mut flags = Self::empty();
        for part in value.split(',').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "1" | "all" | "true" => flags |= Self::all(),
                "path" => flags |= Self::NORMALIZED_PATH,
                "search" => flags |= Self::SEARCH_STEPS,
                _ => {}
            }
        }
        flags
    }
}

/// Runtime configuration for a [`crate::Bot`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Value of an unbound predicate or bot property.
    pub default_predicate: String,
    /// Initial `that` for a new user, and the value of out-of-range history lookups.
    pub default_history: String,
    /// Capture reported for a zero-length wildcard match, and for out-of-range star indices.
    pub default_wildcard: String,

    /// Number of requests and responses remembered per user.
    pub history_size: usize,

    /// Response used when no category matches.
    pub default_response: String,
    /// Wall-clock budget for one top-level request, sub-requests included.
    pub timeout: Duration,
    pub timeout_message: String,
    /// Maximum depth of nested sub-requests.
    pub recursion_limit: usize,
    pub recursion_limit_message: String,
    /// Maximum iterations of a single looping template element.
    pub loop_limit: usize,
    pub loop_limit_message: String,

    /// Characters that end a sentence.
    pub splitters: Vec<char>,
    pub comparer: Comparer,

    /// Bot properties, resolved into patterns at compile time.
    pub bot_properties: HashMap<String, String>,
    /// Fallback values for user predicates.
    pub default_predicates: HashMap<String, String>,
    /// Substitutions applied during normalization.
    pub normal_substitutions: SubstitutionList,

    pub trace: TraceFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_predicate: "unknown".to_string(),
            default_history: "nil".to_string(),
            default_wildcard: "nil".to_string(),
            history_size: 16,
            default_response: "I have no answer for that.".to_string(),
            timeout: Duration::from_secs(10),
            timeout_message: "That query took too long for me to process.".to_string(),
            recursion_limit: 50,
            recursion_limit_message: "Too much recursion in AIML.".to_string(),
            loop_limit: 100,
            loop_limit_message: "Too much looping in condition.".to_string(),
            splitters: vec!['.', '!', '?', ';'],
            comparer: Comparer::default(),
            bot_properties: HashMap::new(),
            default_predicates: HashMap::new(),
            normal_substitutions: SubstitutionList::default(),
            trace: TraceFlags::from_env(),
        }
    }
}

impl Config {
    /// Look up a bot property, falling back to [`Config::default_predicate`].
    pub fn bot_property(&self, name: &str) -> &str {
        lookup(&self.bot_properties, name, self.comparer).unwrap_or(self.default_predicate.as_str())
    }

    /// Look up the configured default for a user predicate.
    pub fn default_predicate_for(&self, name: &str) -> &str {
        lookup(&self.default_predicates, name, self.comparer).unwrap_or(self.default_predicate.as_str())
    }
}

pub(crate) fn lookup<'m>(map: &'m HashMap<String, String>, name: &str, comparer: Comparer) -> Option<&'m str> {
    match map.get(name) {
        Some(value) => Some(value.as_str()),
        None => map.iter().find(|(key, _)| comparer.equals(key, name)).map(|(_, value)| value.as_str()),
    }
}
