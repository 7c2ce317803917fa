//! Sentence splitting and input normalization.
//!
//! Before a sentence reaches the graph it is normalized:
//!
//! ```text
//! raw text ── split_sentences ──▶ sentence ── SubstitutionList::apply ──▶ strip trailing splitters
//! ```
//!
//! Substitutions are compiled into a single case-insensitive alternation so
//! that every substitution is applied in one left-to-right pass and a
//! replacement is never itself re-substituted.

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

/// One normalization rule: replace `pattern` with `replacement`.
///
/// A leading or trailing space on a pattern marks a word boundary on that
/// side: `" u "` matches the word `u` but not the `u` inside `but`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pattern: String,
    replacement: String,
    is_regex: bool,
}

impl Substitution {
    /// A literal substitution.
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), replacement: replacement.into(), is_regex: false }
    }

    /// A regular-expression substitution. `$n` in `replacement` refers to the
    /// pattern's own capture groups.
    pub fn regex(pattern: impl Into<String>, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        Regex::new(pattern.trim())?;
        Ok(Self { pattern, replacement: replacement.into(), is_regex: true })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    fn source(&self) -> String {
        let body = self.pattern.trim();
        let body = if self.is_regex { body.to_string() } else { regex::escape(body) };
        // Words in the working text are separated by runs of spaces.
        let body = body.replace(' ', " +");
        let start = if self.pattern.starts_with(' ') { " " } else { "" };
        let end = if self.pattern.ends_with(' ') { " " } else { "" };
        format!("{start}{body}{end}")
    }
}

#[derive(Debug, Clone)]
struct Compiled {
    regex: Regex,
    /// `(substitution index, outer capture group)` for each compiled alternative.
    groups: Vec<(usize, usize)>,
}

/// An ordered list of substitutions, compiled lazily on first use.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionList {
    items: Vec<Substitution>,
    compiled: OnceCell<Option<Compiled>>,
}

impl SubstitutionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, substitution: Substitution) {
        self.items.push(substitution);
        self.compiled = OnceCell::new();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Substitution> {
        self.items.iter()
    }

    fn compile(&self) -> Option<Compiled> {
        let mut groups = Vec::with_capacity(self.items.len());
        let mut next_group = 1;
        let mut alternatives = Vec::with_capacity(self.items.len());

        for (index, item) in self.items.iter().enumerate() {
            let source = item.source();
            let inner = match Regex::new(&source) {
                Ok(re) => re.captures_len() - 1,
                Err(err) => {
                    tracing::warn!(pattern = %item.pattern, error = %err, "skipping invalid substitution");
                    continue;
                }
            };
            groups.push((index, next_group));
            next_group += 1 + inner;
            alternatives.push(format!("({source})"));
        }

        let regex = match Regex::new(&format!("(?i){}", alternatives.join("|"))) {
            Ok(regex) => regex,
            Err(err) => {
                tracing::warn!(error = %err, "failed to compile substitution list");
                return None;
            }
        };
        Some(Compiled { regex, groups })
    }

    /// Apply every substitution in a single pass. Whitespace in the result is
    /// collapsed to single spaces.
    pub fn apply(&self, text: &str) -> String {
        if self.items.is_empty() {
            return text.to_string();
        }
        let Some(compiled) = self.compiled.get_or_init(|| self.compile()) else {
            return text.to_string();
        };

        // Doubling the gaps lets adjacent word-bounded matches each consume a space.
        let work = format!(" {} ", text.split_whitespace().collect::<Vec<_>>().join("  "));
        let replaced = compiled.regex.replace_all(&work, |caps: &Captures<'_>| self.replacement_for(compiled, caps));
        replaced.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn replacement_for(&self, compiled: &Compiled, caps: &Captures<'_>) -> String {
        let matched = compiled.groups.iter().find(|(_, group)| caps.get(*group).is_some());
        let Some(&(index, group)) = matched else {
            return String::new();
        };
        let item = &self.items[index];

        let mut replacement = if item.is_regex {
            crate::regex!(r"\$(\d+)")
                .replace_all(&item.replacement, |refs: &Captures<'_>| {
                    let n: usize = refs[1].parse().unwrap_or(0);
                    caps.get(group + n).map(|m| m.as_str().to_string()).unwrap_or_default()
                })
                .into_owned()
        } else {
            item.replacement.clone()
        };

        // Keep the boundary spaces the match consumed.
        let whole = &caps[group];
        if whole.starts_with(' ') && !replacement.starts_with(' ') {
            replacement.insert(0, ' ');
        }
        if whole.ends_with(' ') && !replacement.ends_with(' ') {
            replacement.push(' ');
        }
        replacement
    }
}

impl FromIterator<Substitution> for SubstitutionList {
    fn from_iter<T: IntoIterator<Item = Substitution>>(iter: T) -> Self {
        Self { items: iter.into_iter().collect(), compiled: OnceCell::new() }
    }
}

/// Split `text` into sentences.
///
/// A splitter character only ends a sentence when it is followed by
/// whitespace, the start of a tag (`<`), or the end of the text. Empty
/// sentences are dropped. With `preserve_marks`, the splitter stays attached
/// to its sentence.
pub fn split_sentences(text: &str, splitters: &[char], preserve_marks: bool) -> Vec<String> {
    if splitters.is_empty() {
        let sentence = text.trim();
        return if sentence.is_empty() { Vec::new() } else { vec![sentence.to_string()] };
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if !splitters.contains(&c) {
            continue;
        }
        let boundary = match chars.peek() {
            None => true,
            Some(&(_, next)) => next.is_whitespace() || next == '<',
        };
        if !boundary {
            continue;
        }

        let end = if preserve_marks { pos + c.len_utf8() } else { pos };
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = pos + c.len_utf8();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Normalize one sentence: apply `substitutions`, then strip trailing
/// splitter characters and any whitespace around them.
pub fn normalize(text: &str, substitutions: &SubstitutionList, splitters: &[char]) -> String {
    let text = substitutions.apply(text);
    text.trim_end_matches(|c: char| splitters.contains(&c) || c.is_whitespace()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPLITTERS: &[char] = &['.', '!', '?', ';'];

    #[test]
    fn splits_only_on_marks_followed_by_space_tag_or_end() {
        let sentences = split_sentences("Hello there. It costs 3.50 today!<br/>Bye?", SPLITTERS, false);
        assert_eq!(sentences, vec!["Hello there", "It costs 3.50 today", "<br/>Bye"]);
    }

    #[test]
    fn preserves_marks_when_asked() {
        let sentences = split_sentences("One. Two!", SPLITTERS, true);
        assert_eq!(sentences, vec!["One.", "Two!"]);
    }

    #[test]
    fn drops_empty_sentences() {
        assert_eq!(split_sentences("  .  ! ", SPLITTERS, false), Vec::<String>::new());
        assert_eq!(split_sentences("", &[], false), Vec::<String>::new());
        assert_eq!(split_sentences(" a. b ", &[], false), vec!["a. b"]);
    }

    #[test]
    fn literal_substitutions_respect_word_boundaries() {
        let list: SubstitutionList = [Substitution::new(" u ", " you "), Substitution::new(" r ", " are ")].into_iter().collect();
        assert_eq!(list.apply("r u there"), "are you there");
        assert_eq!(list.apply("but"), "but");
    }

    #[test]
    fn unbounded_literal_matches_inside_words() {
        let list: SubstitutionList = [Substitution::new("'s", " is")].into_iter().collect();
        assert_eq!(list.apply("what's up"), "what is up");
    }

    #[test]
    fn substitutions_apply_in_one_pass() {
        let list: SubstitutionList = [Substitution::new(" a ", " b "), Substitution::new(" b ", " c ")].into_iter().collect();
        assert_eq!(list.apply("a b"), "b c");
    }

    #[test]
    fn regex_substitutions_expand_groups() {
        let list: SubstitutionList =
            [Substitution::new(" x ", " y "), Substitution::regex(r"(\d+)%", "$1 percent").unwrap()].into_iter().collect();
        assert_eq!(list.apply("x 50%"), "y 50 percent");
    }

    #[test]
    fn normalize_strips_trailing_splitters() {
        let list = SubstitutionList::new();
        assert_eq!(normalize("Hello!?", &list, SPLITTERS), "Hello");
        assert_eq!(normalize("3.5", &list, SPLITTERS), "3.5");
        assert_eq!(normalize("...", &list, SPLITTERS), "");
        assert_eq!(normalize("Hello ! ", &list, SPLITTERS), "Hello");
    }
}
