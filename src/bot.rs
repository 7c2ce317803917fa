//! The bot: configuration, the shared category graph, sets and template
//! extensions.
//!
//! The shared graph sits behind a `parking_lot::RwLock`. Searches take the
//! read lock only while walking the graph; the matched template is an `Arc`
//! cloned out before evaluation, so a template may call [`Bot::learn`] (which
//! takes the write lock) without deadlocking.

use crate::config::Config;
use crate::engine::PatternNode;
use crate::error::PatternError;
use crate::normalize;
use crate::pattern::{Category, PathToken, PathTokenKind};
use crate::sets::SetCollection;
use crate::template::{ExtensionRegistry, Template, TemplateContent};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct Bot {
    config: Config,
    graph: RwLock<PatternNode>,
    size: AtomicUsize,
    sets: SetCollection,
    extensions: ExtensionRegistry,
}

impl Default for Bot {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Bot {
    pub fn new(config: Config) -> Self {
        let comparer = config.comparer;
        Self {
            config,
            graph: RwLock::new(PatternNode::new(comparer)),
            size: AtomicUsize::new(0),
            sets: SetCollection::with_builtins(comparer),
            extensions: ExtensionRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sets(&self) -> &SetCollection {
        &self.sets
    }

    pub fn sets_mut(&mut self) -> &mut SetCollection {
        &mut self.sets
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    /// Read access to the shared graph. Hold the guard briefly: learning
    /// waits for it.
    pub fn graph(&self) -> RwLockReadGuard<'_, PatternNode> {
        self.graph.read()
    }

    /// Parse template markup using this bot's extensions.
    pub fn template(&self, markup: &str) -> Result<Template, PatternError> {
        Ok(Template::new(TemplateContent::parse(markup, &self.extensions)?))
    }

    /// Build a category from pattern and template markup.
    pub fn category(&self, pattern: &str, template: &str) -> Result<Category, PatternError> {
        Category::new(pattern, self.template(template)?)
    }

    /// Compile `category` and add it to the shared graph. `topic_name` is the
    /// enclosing topic, if any.
    ///
    /// On a duplicate path the graph keeps the first template, which is
    /// returned.
    pub fn add_category(&self, category: &Category, topic_name: Option<&str>) -> Option<Arc<Template>> {
        let path = category.path(topic_name, &self.config);
        let template = Arc::new(category.template.clone());
        let existing = self.graph.write().add_child(&path, Arc::clone(&template));

        match &existing {
            Some(previous) => tracing::warn!(
                path = %render(&path),
                uri = template.source_uri().unwrap_or("-"),
                line = template.line_number().unwrap_or(0),
                previous_uri = previous.source_uri().unwrap_or("-"),
                previous_line = previous.line_number().unwrap_or(0),
                "duplicate category"
            ),
            None => {
                self.size.fetch_add(1, Ordering::Relaxed);
            }
        }
        existing
    }

    /// Add a category to the shared graph at runtime.
    pub fn learn(&self, category: &Category) -> Option<Arc<Template>> {
        let existing = self.add_category(category, None);
        if existing.is_none() {
            tracing::debug!(pattern = %render(&category.path(None, &self.config)), "learned category");
        }
        existing
    }

    /// Number of categories in the shared graph.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Number of distinct words in the shared graph and in string sets.
    pub fn vocabulary(&self) -> usize {
        fn walk(node: &PatternNode, words: &mut HashSet<String>) {
            for (token, child) in node.children() {
                let word = match token.kind() {
                    PathTokenKind::Literal if !is_separator(token) => Some(token.text()),
                    PathTokenKind::PriorityLiteral => Some(token.text().trim_start_matches('$')),
                    _ => None,
                };
                if let Some(word) = word {
                    words.insert(word.to_string());
                }
                walk(child, words);
            }
            for (_, child) in node.set_children() {
                walk(child, words);
            }
        }

        let mut words = HashSet::new();
        walk(&self.graph.read(), &mut words);
        for set in self.sets.values() {
            words.extend(set.words().map(str::to_string));
        }

        let comparer = self.config.comparer;
        words.iter().map(|w| comparer.key(w)).collect::<HashSet<_>>().len()
    }

    /// Split `text` into sentences on the configured splitters.
    pub fn split_sentences(&self, text: &str, preserve_marks: bool) -> Vec<String> {
        normalize::split_sentences(text, &self.config.splitters, preserve_marks)
    }

    /// Apply the configured substitutions and strip trailing splitters.
    pub fn normalize(&self, text: &str) -> String {
        normalize::normalize(text, &self.config.normal_substitutions, &self.config.splitters)
    }
}

fn is_separator(token: &PathToken) -> bool {
    *token == PathToken::that_separator() || *token == PathToken::topic_separator()
}

fn render(path: &[PathToken]) -> String {
    path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StringSet;

    #[test]
    fn add_category_counts_and_keeps_first() {
        let bot = Bot::default();
        let first = bot.category("HELLO", "Hi!").unwrap();
        let second = bot.category("hello", "Hey!").unwrap();

        assert!(bot.add_category(&first, None).is_none());
        assert!(bot.add_category(&second, None).is_some());
        assert!(bot.add_category(&second, Some("greetings")).is_none());
        assert_eq!(bot.size(), 2);
        assert_eq!(bot.graph().len(), 2);
    }

    #[test]
    fn vocabulary_counts_distinct_words() {
        let mut bot = Bot::default();
        let comparer = bot.config().comparer;
        bot.sets_mut().insert("colors", StringSet::new(["red", "light blue"], comparer));
        for (pattern, template) in [("HELLO *", "a"), ("hello there", "b"), ("$WHO ARE YOU", "c"), ("<set>colors</set>", "d")] {
            bot.add_category(&bot.category(pattern, template).unwrap(), None);
        }
        // hello, there, who, are, you, red, light, blue
        assert_eq!(bot.vocabulary(), 8);
    }

    #[test]
    fn category_parses_template_markup() {
        let bot = Bot::default();
        assert!(bot.category("HI", "<srai>HELLO</srai>").is_ok());
        assert!(matches!(bot.category("HI", "<nope/>"), Err(PatternError::InvalidElement { .. })));
    }
}
