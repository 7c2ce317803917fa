//! Per-user conversation state.

use crate::api::Response;
use crate::bot::Bot;
use crate::config::{Comparer, Config};
use crate::engine::PatternNode;
use crate::pattern::Category;
use crate::template::Template;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A bounded most-recent-first history.
#[derive(Debug, Clone)]
pub struct History<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, items: VecDeque::with_capacity(capacity) }
    }

    /// Add `item` as the most recent entry, forgetting the oldest if full.
    pub fn add(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_back();
        }
        self.items.push_front(item);
    }

    /// The `n`th most recent entry, counting from one.
    pub fn get(&self, n: usize) -> Option<&T> {
        n.checked_sub(1).and_then(|i| self.items.get(i))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// A conversation partner of a [`Bot`].
///
/// A user owns its predicates, its request and response history, the `that`
/// context used for the next request, and a private graph of categories
/// learned during the session. The private graph is searched before the
/// bot's.
#[derive(Debug, Clone)]
pub struct User {
    id: String,
    that: String,
    predicates: HashMap<String, String>,
    pub(crate) graph: PatternNode,
    requests: History<String>,
    responses: History<Response>,
}

impl User {
    pub fn new(id: impl Into<String>, bot: &Bot) -> Self {
        let config = bot.config();
        Self {
            id: id.into(),
            that: config.default_history.clone(),
            predicates: HashMap::new(),
            graph: PatternNode::new(config.comparer),
            requests: History::new(config.history_size),
            responses: History::new(config.history_size),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The last sentence the bot said to this user, normalized.
    pub fn that(&self) -> &str {
        &self.that
    }

    /// The `topic` predicate.
    pub fn topic<'a>(&'a self, config: &'a Config) -> &'a str {
        self.predicate("topic", config)
    }

    /// A predicate, falling back to the configured default for `name`.
    /// Predicate names are case-insensitive.
    pub fn predicate<'a>(&'a self, name: &str, config: &'a Config) -> &'a str {
        match self.predicates.get(Comparer::IgnoreCase.key(name).as_ref()) {
            Some(value) => value.as_str(),
            None => config.default_predicate_for(name),
        }
    }

    pub fn set_predicate(&mut self, name: &str, value: &str) {
        self.predicates.insert(Comparer::IgnoreCase.key(name).into_owned(), value.to_string());
    }

    pub fn graph(&self) -> &PatternNode {
        &self.graph
    }

    /// Add a category to this user's private graph. Returns the template
    /// already stored for the same path, if any.
    pub fn learn(&mut self, bot: &Bot, category: &Category) -> Option<Arc<Template>> {
        let path = category.path(None, bot.config());
        let existing = self.graph.add_child(&path, Arc::new(category.template.clone()));
        match &existing {
            Some(template) => tracing::warn!(
                user = %self.id,
                path = %path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "),
                uri = template.source_uri().unwrap_or("-"),
                line = template.line_number().unwrap_or(0),
                "duplicate learned category"
            ),
            None => tracing::debug!(user = %self.id, "learned category"),
        }
        existing
    }

    pub fn add_request(&mut self, text: &str) {
        self.requests.add(text.to_string());
    }

    /// Record a response and update `that` from its last non-empty sentence.
    pub fn add_response(&mut self, response: &Response, bot: &Bot) {
        self.responses.add(response.clone());
        let sentences = bot.split_sentences(&response.text, false);
        let last = sentences.iter().rev().map(|sentence| bot.normalize(sentence)).find(|sentence| !sentence.is_empty());
        if let Some(that) = last {
            self.that = that;
        }
    }

    /// The `n`th most recent request text, or the default history value.
    pub fn request<'a>(&'a self, n: usize, config: &'a Config) -> &'a str {
        self.requests.get(n).map(String::as_str).unwrap_or(config.default_history.as_str())
    }

    /// The `n`th most recent response text, or the default history value.
    pub fn response<'a>(&'a self, n: usize, config: &'a Config) -> &'a str {
        self.responses.get(n).map(|r| r.text.as_str()).unwrap_or(config.default_history.as_str())
    }

    pub fn requests(&self) -> &History<String> {
        &self.requests
    }

    pub fn responses(&self) -> &History<Response> {
        &self.responses
    }
}
