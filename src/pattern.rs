//! Pattern compilation.
//!
//! A category's `<pattern>`, `<that>` and `<topic>` are flattened into one
//! token sequence before it is inserted into the graph:
//!
//! ```text
//! pattern-tokens  <that>  that-tokens  <topic>  topic-tokens
//! ```
//!
//! Token kinds are decided here, once, from the token text:
//!
//! | text        | kind                   | matches              |
//! |-------------|------------------------|----------------------|
//! | `$WORD`     | `PriorityLiteral`      | `word`, first        |
//! | `#`         | `PriorityWildcardZero` | 0+ words             |
//! | `_`         | `PriorityWildcardOne`  | 1+ words             |
//! | `WORD`      | `Literal`              | `word`               |
//! | `<set>`     | `SetReference`         | a phrase in the set  |
//! | `^`         | `WildcardZero`         | 0+ words             |
//! | `*`         | `WildcardOne`          | 1+ words, last       |
//!
//! Bot properties are resolved while compiling: they never change during the
//! bot's lifetime, so the resolved words are stored as priority literals.

use crate::config::Config;
use crate::error::PatternError;
use crate::template::Template;
use std::fmt;

pub const THAT_SEPARATOR: &str = "<that>";
pub const TOPIC_SEPARATOR: &str = "<topic>";

/// Classification of a [`PathToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathTokenKind {
    Literal,
    PriorityLiteral,
    WildcardOne,
    WildcardZero,
    PriorityWildcardOne,
    PriorityWildcardZero,
    SetReference,
}

impl PathTokenKind {
    /// Minimum number of words a wildcard consumes, or `None` for non-wildcards.
    pub fn min_words(self) -> Option<usize> {
        match self {
            PathTokenKind::WildcardZero | PathTokenKind::PriorityWildcardZero => Some(0),
            PathTokenKind::WildcardOne | PathTokenKind::PriorityWildcardOne => Some(1),
            _ => None,
        }
    }
}

/// One step of a category path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathToken {
    text: String,
    kind: PathTokenKind,
}

impl PathToken {
    /// Classify `text` as a literal, priority literal or wildcard.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = match text.as_str() {
            "*" => PathTokenKind::WildcardOne,
            "^" => PathTokenKind::WildcardZero,
            "_" => PathTokenKind::PriorityWildcardOne,
            "#" => PathTokenKind::PriorityWildcardZero,
            t if t.len() > 1 && t.starts_with('$') => PathTokenKind::PriorityLiteral,
            _ => PathTokenKind::Literal,
        };
        Self { text, kind }
    }

    /// A reference to the set named `name`.
    pub fn set(name: impl Into<String>) -> Self {
        Self { text: name.into(), kind: PathTokenKind::SetReference }
    }

    /// A priority literal matching `word`.
    pub fn priority(word: &str) -> Self {
        Self { text: format!("${word}"), kind: PathTokenKind::PriorityLiteral }
    }

    pub fn that_separator() -> Self {
        Self { text: THAT_SEPARATOR.to_string(), kind: PathTokenKind::Literal }
    }

    pub fn topic_separator() -> Self {
        Self { text: TOPIC_SEPARATOR.to_string(), kind: PathTokenKind::Literal }
    }

    /// Token text: the word, the wildcard symbol, or the set name.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> PathTokenKind {
        self.kind
    }

    pub fn is_set(&self) -> bool {
        self.kind == PathTokenKind::SetReference
    }

    /// Token equality under the bot's comparer. Set references compare by
    /// name; every other kind compares by text.
    pub fn matches(&self, other: &PathToken, comparer: crate::Comparer) -> bool {
        self.is_set() == other.is_set() && comparer.equals(&self.text, &other.text)
    }
}

impl From<&str> for PathToken {
    fn from(text: &str) -> Self {
        PathToken::new(text)
    }
}

impl From<String> for PathToken {
    fn from(text: String) -> Self {
        PathToken::new(text)
    }
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() { write!(f, "<set>{}</set>", self.text) } else { f.write_str(&self.text) }
    }
}

/// An item of pattern content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternItem {
    /// A word or wildcard symbol.
    Word(String),
    /// `<bot name="..."/>`, resolved at compile time.
    BotProperty(String),
    /// `<set>name</set>`.
    Set(String),
}

/// The content of a `<pattern>`, `<that>` or `<topic>` element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternSource {
    items: Vec<PatternItem>,
}

enum Open {
    Set(String),
    Bot,
}

impl PatternSource {
    pub fn new(items: Vec<PatternItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[PatternItem] {
        &self.items
    }

    /// Parse pattern markup such as `HELLO <bot name="name"/> <set>color</set> *`.
    ///
    /// Only words, `<bot name="..."/>` and `<set>name</set>` are allowed.
    pub fn parse(markup: &str) -> Result<Self, PatternError> {
        let tags = crate::regex!(r#"<(/?)([A-Za-z_][\w.-]*)((?:\s+[\w:-]+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>"#);
        let mut items = Vec::new();
        let mut open: Option<Open> = None;
        let mut pos = 0;

        for caps in tags.captures_iter(markup) {
            let Some(whole) = caps.get(0) else { continue };
            let text = &markup[pos..whole.start()];
            pos = whole.end();

            let closing = !caps[1].is_empty();
            let name = caps[2].to_ascii_lowercase();
            let self_closing = !caps[4].is_empty();

            match open.take() {
                Some(Open::Set(mut set_name)) => {
                    set_name.push_str(text);
                    if !(closing && name == "set") {
                        return Err(PatternError::InvalidElement { element: name, context: "<set>" });
                    }
                    items.push(PatternItem::Set(set_name.trim().to_string()));
                    continue;
                }
                Some(Open::Bot) => {
                    if !(closing && name == "bot") || !text.trim().is_empty() {
                        return Err(PatternError::InvalidElement { element: name, context: "<bot>" });
                    }
                    continue;
                }
                None => {}
            }

            push_words(&mut items, text);
            match (name.as_str(), closing) {
                ("bot", false) => {
                    let property = attribute(&caps[3], "name")
                        .ok_or_else(|| PatternError::MissingAttribute { element: name.clone(), attribute: "name" })?;
                    items.push(PatternItem::BotProperty(property));
                    if !self_closing {
                        open = Some(Open::Bot);
                    }
                }
                ("set", false) if !self_closing => open = Some(Open::Set(String::new())),
                ("set", false) => return Err(PatternError::InvalidElement { element: name, context: "pattern" }),
                ("bot" | "set", true) => return Err(PatternError::UnexpectedClose { element: name }),
                _ => return Err(PatternError::InvalidElement { element: name, context: "pattern" }),
            }
        }

        match open {
            Some(Open::Set(_)) => Err(PatternError::Unterminated { element: "set".to_string() }),
            Some(Open::Bot) => Err(PatternError::Unterminated { element: "bot".to_string() }),
            None => {
                push_words(&mut items, &markup[pos..]);
                Ok(Self { items })
            }
        }
    }

    fn tokens(&self, config: &Config) -> Vec<PathToken> {
        let mut tokens = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match item {
                PatternItem::Word(word) => tokens.push(PathToken::new(word.as_str())),
                PatternItem::BotProperty(name) => {
                    tokens.extend(config.bot_property(name).split_whitespace().map(PathToken::priority));
                }
                PatternItem::Set(name) => tokens.push(PathToken::set(name.as_str())),
            }
        }
        tokens
    }
}

fn push_words(items: &mut Vec<PatternItem>, text: &str) {
    items.extend(text.split_whitespace().map(|w| PatternItem::Word(w.to_string())));
}

fn attribute(attributes: &str, wanted: &str) -> Option<String> {
    let re = crate::regex!(r#"([\w:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#);
    re.captures_iter(attributes)
        .find(|caps| caps[1].eq_ignore_ascii_case(wanted))
        .and_then(|caps| caps.get(2).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
}

/// Flatten a category's three segments into one graph path.
///
/// A missing `that` becomes `*`. A missing `topic` becomes the words of
/// `topic_name`, or `*` when there is no enclosing topic.
pub fn compile_path(
    pattern: &PatternSource,
    that: Option<&PatternSource>,
    topic: Option<&PatternSource>,
    topic_name: Option<&str>,
    config: &Config,
) -> Vec<PathToken> {
    let mut path = pattern.tokens(config);

    path.push(PathToken::that_separator());
    match that {
        Some(that) => path.extend(that.tokens(config)),
        None => path.push(PathToken::new("*")),
    }

    path.push(PathToken::topic_separator());
    match (topic, topic_name) {
        (Some(topic), _) => path.extend(topic.tokens(config)),
        (None, Some(name)) if !name.trim().is_empty() => path.extend(name.split_whitespace().map(PathToken::new)),
        (None, _) => path.push(PathToken::new("*")),
    }
    path
}

/// One `pattern`/`that`/`topic`/`template` rule, ready to be compiled.
#[derive(Debug, Clone)]
pub struct Category {
    pub pattern: PatternSource,
    pub that: Option<PatternSource>,
    pub topic: Option<PatternSource>,
    pub template: Template,
}

impl Category {
    pub fn new(pattern: &str, template: Template) -> Result<Self, PatternError> {
        Ok(Self { pattern: PatternSource::parse(pattern)?, that: None, topic: None, template })
    }

    pub fn with_that(mut self, that: &str) -> Result<Self, PatternError> {
        self.that = Some(PatternSource::parse(that)?);
        Ok(self)
    }

    pub fn with_topic(mut self, topic: &str) -> Result<Self, PatternError> {
        self.topic = Some(PatternSource::parse(topic)?);
        Ok(self)
    }

    /// Compile this category's path. `topic_name` is the enclosing `<topic name="...">`, if any.
    pub fn path(&self, topic_name: Option<&str>, config: &Config) -> Vec<PathToken> {
        compile_path(&self.pattern, self.that.as_ref(), self.topic.as_ref(), topic_name, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Comparer;

    fn texts(path: &[PathToken]) -> Vec<String> {
        path.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn classifies_tokens_by_text() {
        assert_eq!(PathToken::new("*").kind(), PathTokenKind::WildcardOne);
        assert_eq!(PathToken::new("^").kind(), PathTokenKind::WildcardZero);
        assert_eq!(PathToken::new("_").kind(), PathTokenKind::PriorityWildcardOne);
        assert_eq!(PathToken::new("#").kind(), PathTokenKind::PriorityWildcardZero);
        assert_eq!(PathToken::new("$WHO").kind(), PathTokenKind::PriorityLiteral);
        assert_eq!(PathToken::new("$").kind(), PathTokenKind::Literal);
        assert_eq!(PathToken::new("HELLO").kind(), PathTokenKind::Literal);
        assert_eq!(PathToken::set("color").kind(), PathTokenKind::SetReference);
        assert_eq!(PathTokenKind::WildcardZero.min_words(), Some(0));
        assert_eq!(PathTokenKind::PriorityWildcardOne.min_words(), Some(1));
        assert_eq!(PathTokenKind::Literal.min_words(), None);
    }

    #[test]
    fn token_equality_follows_comparer() {
        let a = PathToken::new("hello");
        let b = PathToken::new("HELLO");
        assert!(a.matches(&b, Comparer::IgnoreCase));
        assert!(!a.matches(&b, Comparer::CaseSensitive));
        assert!(!PathToken::set("hello").matches(&a, Comparer::IgnoreCase));
    }

    #[test]
    fn parses_words_bot_properties_and_sets() {
        let source = PatternSource::parse(r#"WHAT IS <bot name="name"/> <set>colors</set> *"#).unwrap();
        assert_eq!(
            source.items(),
            &[
                PatternItem::Word("WHAT".to_string()),
                PatternItem::Word("IS".to_string()),
                PatternItem::BotProperty("name".to_string()),
                PatternItem::Set("colors".to_string()),
                PatternItem::Word("*".to_string()),
            ]
        );

        let long_form = PatternSource::parse(r#"<bot name='name'></bot> <SET> colors </SET>"#).unwrap();
        assert_eq!(
            long_form.items(),
            &[PatternItem::BotProperty("name".to_string()), PatternItem::Set("colors".to_string())]
        );
    }

    #[test]
    fn rejects_structural_errors() {
        assert_eq!(
            PatternSource::parse("HELLO <star/>"),
            Err(PatternError::InvalidElement { element: "star".to_string(), context: "pattern" })
        );
        assert_eq!(
            PatternSource::parse("<bot/>"),
            Err(PatternError::MissingAttribute { element: "bot".to_string(), attribute: "name" })
        );
        assert_eq!(PatternSource::parse("<set>colors"), Err(PatternError::Unterminated { element: "set".to_string() }));
        assert_eq!(PatternSource::parse("A </set>"), Err(PatternError::UnexpectedClose { element: "set".to_string() }));
        assert!(matches!(PatternSource::parse("<set><bot name=\"x\"/></set>"), Err(PatternError::InvalidElement { .. })));
    }

    #[test]
    fn compile_fills_in_missing_that_and_topic() {
        let config = Config::default();
        let pattern = PatternSource::parse("HELLO *").unwrap();

        let path = compile_path(&pattern, None, None, None, &config);
        assert_eq!(texts(&path), ["HELLO", "*", "<that>", "*", "<topic>", "*"]);

        let path = compile_path(&pattern, None, None, Some("small talk"), &config);
        assert_eq!(texts(&path), ["HELLO", "*", "<that>", "*", "<topic>", "small", "talk"]);

        let that = PatternSource::parse("DO YOU LIKE <set>colors</set>").unwrap();
        let topic = PatternSource::parse("COLORS").unwrap();
        let path = compile_path(&pattern, Some(&that), Some(&topic), Some("ignored"), &config);
        assert_eq!(texts(&path), ["HELLO", "*", "<that>", "DO", "YOU", "LIKE", "<set>colors</set>", "<topic>", "COLORS"]);
        assert_eq!(path[6].kind(), PathTokenKind::SetReference);
    }

    #[test]
    fn bot_properties_compile_to_priority_literals() {
        let mut config = Config::default();
        config.bot_properties.insert("name".to_string(), "Angel Bot".to_string());

        let pattern = PatternSource::parse(r#"ARE YOU <bot name="name"/>"#).unwrap();
        let path = compile_path(&pattern, None, None, None, &config);
        assert_eq!(texts(&path[..4]), ["ARE", "YOU", "$Angel", "$Bot"]);
        assert_eq!(path[2].kind(), PathTokenKind::PriorityLiteral);

        let unbound = PatternSource::parse(r#"<bot name="age"/>"#).unwrap();
        let path = compile_path(&unbound, None, None, None, &config);
        assert_eq!(path[0].text(), "$unknown");
    }

    #[test]
    fn category_builder_parses_each_segment() {
        let category = Category::new("YES", Template::text("Good."))
            .and_then(|c| c.with_that("DO YOU LIKE CAKE"))
            .and_then(|c| c.with_topic("FOOD"))
            .unwrap();
        let path = category.path(None, &Config::default());
        assert_eq!(texts(&path), ["YES", "<that>", "DO", "YOU", "LIKE", "CAKE", "<topic>", "FOOD"]);

        assert!(Category::new("<get name=\"x\"/>", Template::text("")).is_err());
    }
}
