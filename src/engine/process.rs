//! Per-sentence evaluation state.
//!
//! A [`RequestProcess`] is created for each sentence that matched a category
//! and handed to the template as it is evaluated. It owns the captures of the
//! match and the sentence's local variables, and carries the safety budget
//! (sub-request depth and the shared deadline) into any sub-request.

use crate::bot::Bot;
use crate::config::{self, Config};
use crate::engine::search::{Captures, Match, MatchState};
use crate::error::MatchError;
use crate::template::Template;
use crate::user::User;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct RequestProcess<'a> {
    bot: &'a Bot,
    user: &'a mut User,
    sentence: String,
    depth: usize,
    deadline: Instant,
    started: Instant,
    captures: Captures,
    variables: HashMap<String, String>,
    path: String,
    template: Arc<Template>,
}

impl<'a> RequestProcess<'a> {
    pub(crate) fn new(
        bot: &'a Bot,
        user: &'a mut User,
        sentence: &str,
        depth: usize,
        deadline: Instant,
        found: Match,
    ) -> Self {
        Self {
            bot,
            user,
            sentence: sentence.to_string(),
            depth,
            deadline,
            started: Instant::now(),
            captures: found.captures,
            variables: HashMap::new(),
            path: found.path,
            template: found.template,
        }
    }

    pub fn bot(&self) -> &'a Bot {
        self.bot
    }

    pub fn config(&self) -> &'a Config {
        self.bot.config()
    }

    pub fn user(&self) -> &User {
        &*self.user
    }

    pub fn user_mut(&mut self) -> &mut User {
        &mut *self.user
    }

    /// The normalized sentence being answered.
    pub fn sentence(&self) -> &str {
        &self.sentence
    }

    /// Sub-request depth; zero for a sentence of the user's own request.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The matched category path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    fn capture(&self, state: MatchState, index: usize) -> &str {
        index
            .checked_sub(1)
            .and_then(|i| self.captures.get(state).get(i))
            .map(String::as_str)
            .unwrap_or(self.config().default_wildcard.as_str())
    }

    /// The `index`th (one-based) message capture.
    pub fn star(&self, index: usize) -> &str {
        self.capture(MatchState::Message, index)
    }

    pub fn that_star(&self, index: usize) -> &str {
        self.capture(MatchState::That, index)
    }

    pub fn topic_star(&self, index: usize) -> &str {
        self.capture(MatchState::Topic, index)
    }

    /// A local variable, scoped to this sentence.
    pub fn variable(&self, name: &str) -> &str {
        let config = self.config();
        config::lookup(&self.variables, name, config.comparer).unwrap_or(config.default_predicate.as_str())
    }

    pub fn set_variable(&mut self, name: &str, value: &str) {
        let key = self.config().comparer.key(name).into_owned();
        self.variables.insert(key, value.to_string());
    }

    pub fn predicate(&self, name: &str) -> &str {
        self.user.predicate(name, self.bot.config())
    }

    pub fn set_predicate(&mut self, name: &str, value: &str) {
        self.user.set_predicate(name, value);
    }

    /// Time spent on this sentence so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn check_timeout(&self) -> Result<(), MatchError> {
        if Instant::now() >= self.deadline {
            tracing::warn!(user = self.user.id(), sentence = %self.sentence, "request timeout");
            return Err(MatchError::Timeout);
        }
        Ok(())
    }

    /// Guard for looping template elements: call once per iteration,
    /// counting from one.
    pub fn check_loop(&self, iteration: usize) -> Result<(), MatchError> {
        if iteration > self.config().loop_limit {
            tracing::warn!(user = self.user.id(), sentence = %self.sentence, "loop limit exceeded");
            return Err(MatchError::LoopLimit);
        }
        self.check_timeout()
    }

    /// Process `text` as a sub-request one level deeper, sharing this
    /// request's deadline.
    pub fn srai(&mut self, text: &str) -> Result<String, MatchError> {
        self.check_timeout()?;
        tracing::debug!(depth = self.depth + 1, input = text, "sub-request");
        self.bot.sub_request(&mut *self.user, text, self.depth + 1, self.deadline)
    }
}
