//! Named sets usable as `<set>name</set>` pattern tokens.
//!
//! The search engine only needs two things from a set: whether it contains a
//! phrase, and the longest phrase (in words) it could possibly contain. The
//! latter bounds how far a set token looks ahead before trying shorter
//! phrases.

use crate::config::Comparer;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A collection of phrases matched by a set token.
pub trait Set: fmt::Debug + Send + Sync {
    /// Whether `phrase` (words joined by single spaces) is in the set.
    fn contains(&self, phrase: &str) -> bool;

    /// Upper bound on the number of words in any phrase of the set.
    fn max_words(&self) -> usize;

    /// Words contributing to the bot's vocabulary. Computed sets have none.
    fn words(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(std::iter::empty())
    }
}

/// A fixed list of phrases.
#[derive(Debug, Clone)]
pub struct StringSet {
    comparer: Comparer,
    phrases: HashSet<String>,
    max_words: usize,
}

impl StringSet {
    /// Build a set from `phrases`, collapsing internal whitespace.
    pub fn new<I, S>(phrases: I, comparer: Comparer) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self { comparer, phrases: HashSet::new(), max_words: 0 };
        for phrase in phrases {
            let words: Vec<&str> = phrase.as_ref().split_whitespace().collect();
            set.max_words = set.max_words.max(words.len());
            set.phrases.insert(comparer.key(&words.join(" ")).into_owned());
        }
        set
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl Set for StringSet {
    fn contains(&self, phrase: &str) -> bool {
        self.phrases.contains(self.comparer.key(phrase).as_ref())
    }

    fn max_words(&self) -> usize {
        self.max_words
    }

    fn words(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.phrases.iter().flat_map(|p| p.split_whitespace()))
    }
}

/// The `number` set: non-negative integers written in any script's digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberSet;

impl Set for NumberSet {
    fn contains(&self, phrase: &str) -> bool {
        !phrase.is_empty() && phrase.chars().all(char::is_numeric)
    }

    fn max_words(&self) -> usize {
        1
    }
}

/// The `word` set: any single word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordSet;

impl Set for WordSet {
    fn contains(&self, phrase: &str) -> bool {
        !phrase.is_empty() && !phrase.chars().any(char::is_whitespace)
    }

    fn max_words(&self) -> usize {
        1
    }
}

/// Sets by name. Names compare under the bot's comparer.
#[derive(Debug, Clone)]
pub struct SetCollection {
    comparer: Comparer,
    sets: HashMap<String, Arc<dyn Set>>,
}

impl SetCollection {
    /// An empty collection.
    pub fn new(comparer: Comparer) -> Self {
        Self { comparer, sets: HashMap::new() }
    }

    /// A collection holding the predefined `number` and `word` sets.
    pub fn with_builtins(comparer: Comparer) -> Self {
        let mut sets = Self::new(comparer);
        sets.insert("number", NumberSet);
        sets.insert("word", WordSet);
        sets
    }

    /// Add or replace the set called `name`. Returns true if it replaced one.
    pub fn insert(&mut self, name: &str, set: impl Set + 'static) -> bool {
        self.sets.insert(self.comparer.key(name).into_owned(), Arc::new(set)).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Set> {
        self.sets.get(self.comparer.key(name).as_ref()).map(|s| s.as_ref())
    }

    pub fn contains_set(&self, name: &str) -> bool {
        self.sets.contains_key(self.comparer.key(name).as_ref())
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &dyn Set> {
        self.sets.values().map(|s| s.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_set_normalizes_phrases() {
        let set = StringSet::new(["foo", "Foo  Bar", "  baz qux quux "], Comparer::IgnoreCase);
        assert_eq!(set.len(), 3);
        assert_eq!(set.max_words(), 3);
        assert!(set.contains("FOO BAR"));
        assert!(set.contains("baz qux quux"));
        assert!(!set.contains("bar"));

        let strict = StringSet::new(["Foo"], Comparer::CaseSensitive);
        assert!(strict.contains("Foo"));
        assert!(!strict.contains("foo"));
    }

    #[test]
    fn builtin_sets() {
        assert!(NumberSet.contains("0042"));
        assert!(NumberSet.contains("٤٢"));
        assert!(NumberSet.contains("४२"));
        assert!(!NumberSet.contains("4.2"));
        assert!(!NumberSet.contains(""));
        assert!(WordSet.contains("anything"));
        assert!(!WordSet.contains("two words"));
        assert!(!WordSet.contains(""));
    }

    #[test]
    fn collection_lookup_is_case_insensitive() {
        let mut sets = SetCollection::with_builtins(Comparer::IgnoreCase);
        assert!(!sets.insert("Colors", StringSet::new(["red", "green"], Comparer::IgnoreCase)));
        assert!(sets.contains_set("colors"));
        assert!(sets.get("COLORS").is_some_and(|s| s.contains("red")));
        assert!(sets.get("Number").is_some());
        assert!(sets.get("shapes").is_none());
        assert_eq!(sets.len(), 3);
    }
}
