//! Graph search.
//!
//! The input path has the same shape as a category path:
//!
//! ```text
//! message words  <that>  that words  <topic>  topic words
//! ```
//!
//! At every node the children are tried in a fixed priority order and the
//! first child that leads to a template wins:
//!
//! ```text
//! $word ─▶ # ─▶ _ ─▶ word ─▶ <set> (insertion order) ─▶ ^ ─▶ *
//! ```
//!
//! Wildcards are ungreedy: they try the shortest capture first and stop at
//! the end of their own segment. Sets are greedy: they try the longest phrase
//! first, bounded by the set's `max_words` and the segment end.
//!
//! Capture slots are reserved on the way down and filled on the way back up,
//! so each capture list stays index-aligned with the wildcards of the chosen
//! path whatever backtracking happened in between.

use crate::config::{Comparer, TraceFlags};
use crate::engine::node::PatternNode;
use crate::error::MatchError;
use crate::pattern::{THAT_SEPARATOR, TOPIC_SEPARATOR};
use crate::sets::SetCollection;
use crate::template::Template;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// The input segment a search position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchState {
    Message,
    That,
    Topic,
}

impl MatchState {
    /// The state after crossing this segment's closing separator.
    pub fn advance(self) -> Self {
        match self {
            MatchState::Message => MatchState::That,
            MatchState::That | MatchState::Topic => MatchState::Topic,
        }
    }

    /// The separator that closes this segment, if any.
    pub fn separator(self) -> Option<&'static str> {
        match self {
            MatchState::Message => Some(THAT_SEPARATOR),
            MatchState::That => Some(TOPIC_SEPARATOR),
            MatchState::Topic => None,
        }
    }
}

/// A normalized `message <that> that <topic> topic` word sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPath {
    words: Vec<String>,
    that_at: usize,
    topic_at: usize,
}

impl InputPath {
    pub fn new(message: &str, that: &str, topic: &str) -> Self {
        let mut words: Vec<String> = message.split_whitespace().map(str::to_string).collect();
        let that_at = words.len();
        words.push(THAT_SEPARATOR.to_string());
        words.extend(that.split_whitespace().map(str::to_string));
        let topic_at = words.len();
        words.push(TOPIC_SEPARATOR.to_string());
        words.extend(topic.split_whitespace().map(str::to_string));
        Self { words, that_at, topic_at }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Whether `pos` holds one of the two separators.
    pub fn is_boundary(&self, pos: usize) -> bool {
        pos == self.that_at || pos == self.topic_at
    }

    /// Index one past the last word of the segment for `state`.
    fn segment_end(&self, state: MatchState) -> usize {
        match state {
            MatchState::Message => self.that_at,
            MatchState::That => self.topic_at,
            MatchState::Topic => self.words.len(),
        }
    }
}

impl fmt::Display for InputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.words.join(" "))
    }
}

/// Wildcard and set captures, one list per segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    pub star: Vec<String>,
    pub that_star: Vec<String>,
    pub topic_star: Vec<String>,
}

impl Captures {
    pub fn get(&self, state: MatchState) -> &[String] {
        match state {
            MatchState::Message => &self.star,
            MatchState::That => &self.that_star,
            MatchState::Topic => &self.topic_star,
        }
    }

    fn list_mut(&mut self, state: MatchState) -> &mut Vec<String> {
        match state {
            MatchState::Message => &mut self.star,
            MatchState::That => &mut self.that_star,
            MatchState::Topic => &mut self.topic_star,
        }
    }

    /// Reserve the next slot of `state`'s list and return its index.
    pub(crate) fn reserve(&mut self, state: MatchState) -> usize {
        let list = self.list_mut(state);
        list.push(String::new());
        list.len() - 1
    }

    pub(crate) fn fill(&mut self, state: MatchState, slot: usize, value: String) {
        if let Some(entry) = self.list_mut(state).get_mut(slot) {
            *entry = value;
        }
    }

    /// Give back `slot` and everything reserved after it.
    pub(crate) fn release(&mut self, state: MatchState, slot: usize) {
        self.list_mut(state).truncate(slot);
    }
}

/// Everything a search needs besides the graph and the input.
#[derive(Debug, Clone)]
pub struct SearchOptions<'a> {
    pub sets: &'a SetCollection,
    /// Capture reported for a zero-length wildcard match.
    pub default_wildcard: &'a str,
    pub recursion_limit: usize,
    /// Sub-request depth of the request being searched for.
    pub depth: usize,
    pub deadline: Instant,
    pub trace: TraceFlags,
}

/// A successful search.
#[derive(Debug, Clone)]
pub struct Match {
    pub template: Arc<Template>,
    pub captures: Captures,
    /// The matched category path, space separated.
    pub path: String,
    /// Index of the root the match was found under.
    pub root: usize,
}

/// Search `roots` in order and return the first match.
pub fn search(roots: &[&PatternNode], input: &InputPath, options: &SearchOptions<'_>) -> Result<Option<Match>, MatchError> {
    if options.depth > options.recursion_limit {
        tracing::warn!(depth = options.depth, input = %input, "recursion limit exceeded");
        return Err(MatchError::RecursionLimit);
    }
    if options.trace.contains(TraceFlags::NORMALIZED_PATH) {
        tracing::trace!(path = %input, "normalized path");
    }

    for (index, &root) in roots.iter().enumerate() {
        let mut search = Search::new(input, options, root.comparer());
        if let Some(template) = search.search_node(root, 0, MatchState::Message)? {
            let template = Arc::clone(template);
            return Ok(Some(Match { template, captures: search.captures, path: search.trail.join(" "), root: index }));
        }
    }
    Ok(None)
}

struct Search<'i, 'o> {
    input: &'i InputPath,
    options: &'o SearchOptions<'o>,
    comparer: Comparer,
    captures: Captures,
    trail: Vec<String>,
}

type Found<'g> = Result<Option<&'g Arc<Template>>, MatchError>;

impl<'i, 'o> Search<'i, 'o> {
    fn new(input: &'i InputPath, options: &'o SearchOptions<'o>, comparer: Comparer) -> Self {
        Self { input, options, comparer, captures: Captures::default(), trail: Vec::new() }
    }

    fn check_timeout(&self) -> Result<(), MatchError> {
        if Instant::now() >= self.options.deadline {
            tracing::warn!(input = %self.input, "request timeout");
            return Err(MatchError::Timeout);
        }
        Ok(())
    }

    fn search_node<'g>(&mut self, node: &'g PatternNode, pos: usize, state: MatchState) -> Found<'g> {
        self.check_timeout()?;
        if self.options.trace.contains(TraceFlags::SEARCH_STEPS) {
            tracing::trace!(path = %self.trail.join(" "), pos, "search");
        }

        let input = self.input;
        let words = input.words();
        let end = input.segment_end(state);

        if pos == words.len() {
            if let Some(template) = node.template() {
                return Ok(Some(template));
            }
        }

        // --- Priority literal ---
        if pos < end {
            if let Some((token, child)) = node.child_entry(&format!("${}", words[pos])) {
                if let Some(found) = self.step(token.text(), child, pos + 1, state)? {
                    return Ok(Some(found));
                }
            }
        }

        // --- Priority wildcards ---
        if let Some(child) = node.child("#") {
            if let Some(found) = self.search_wildcard("#", child, pos, state, 0)? {
                return Ok(Some(found));
            }
        }
        if let Some(child) = node.child("_") {
            if let Some(found) = self.search_wildcard("_", child, pos, state, 1)? {
                return Ok(Some(found));
            }
        }

        // --- Literal ---
        if pos < end {
            let word = &words[pos];
            // Reserved keys in the input are plain text, reachable only through wildcards and sets.
            let reserved = ["*", "^", "_", "#"].contains(&word.as_str())
                || self.comparer.equals(word, THAT_SEPARATOR)
                || self.comparer.equals(word, TOPIC_SEPARATOR);
            if let Some((token, child)) = node.child_entry(word).filter(|_| !reserved) {
                if let Some(found) = self.step(token.text(), child, pos + 1, state)? {
                    return Ok(Some(found));
                }
            }
        } else if let Some(separator) = state.separator() {
            if let Some(child) = node.child(separator) {
                if let Some(found) = self.step(separator, child, pos + 1, state.advance())? {
                    return Ok(Some(found));
                }
            }
        }

        // --- Sets ---
        if pos < end {
            if let Some(found) = self.search_sets(node, pos, state)? {
                return Ok(Some(found));
            }
        }

        // --- Wildcards ---
        if let Some(child) = node.child("^") {
            if let Some(found) = self.search_wildcard("^", child, pos, state, 0)? {
                return Ok(Some(found));
            }
        }
        if let Some(child) = node.child("*") {
            if let Some(found) = self.search_wildcard("*", child, pos, state, 1)? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    fn step<'g>(&mut self, label: &str, child: &'g PatternNode, pos: usize, state: MatchState) -> Found<'g> {
        self.trail.push(label.to_string());
        let found = self.search_node(child, pos, state)?;
        if found.is_none() {
            self.trail.pop();
        }
        Ok(found)
    }

    fn search_sets<'g>(&mut self, node: &'g PatternNode, pos: usize, state: MatchState) -> Found<'g> {
        let sets = self.options.sets;
        let input = self.input;
        let words = input.words();
        let end = input.segment_end(state);

        for (name, child) in node.set_children() {
            let label = format!("<set>{name}</set>");
            let Some(set) = sets.get(name) else {
                let path = self.trail.iter().map(String::as_str).chain([label.as_str()]).collect::<Vec<_>>().join(" ");
                tracing::warn!(set = name, path = %path, "reference to a missing set");
                continue;
            };

            let longest = set.max_words().min(end - pos);
            if longest == 0 {
                continue;
            }

            let slot = self.captures.reserve(state);
            self.trail.push(label);
            for stop in (pos + 1..=pos + longest).rev() {
                let phrase = words[pos..stop].join(" ");
                if !set.contains(&phrase) {
                    continue;
                }
                if let Some(found) = self.search_node(child, stop, state)? {
                    self.captures.fill(state, slot, phrase);
                    return Ok(Some(found));
                }
            }
            self.trail.pop();
            self.captures.release(state, slot);
        }
        Ok(None)
    }

    fn search_wildcard<'g>(
        &mut self,
        symbol: &str,
        child: &'g PatternNode,
        pos: usize,
        state: MatchState,
        min_words: usize,
    ) -> Found<'g> {
        let end = self.input.segment_end(state);
        if pos + min_words > end {
            return Ok(None);
        }

        let slot = self.captures.reserve(state);
        self.trail.push(symbol.to_string());
        for stop in pos + min_words..=end {
            if let Some(found) = self.search_node(child, stop, state)? {
                let value = if stop == pos {
                    self.options.default_wildcard.to_string()
                } else {
                    self.input.words()[pos..stop].join(" ")
                };
                self.captures.fill(state, slot, value);
                return Ok(Some(found));
            }
        }
        self.trail.pop();
        self.captures.release(state, slot);
        Ok(None)
    }
}
