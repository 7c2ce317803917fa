//! A rule-based conversational pattern engine.
//!
//! Categories (a pattern, optional `that` and `topic` context, and a response
//! template) are compiled into a trie, the Graphmaster. Input text is split
//! into sentences, normalized, and matched against the trie with a fixed
//! priority order of literals, wildcards and sets; the matched template is
//! then evaluated to produce the response.
//!
//! ```
//! use graphmaster::{Bot, Config, User};
//!
//! let bot = Bot::new(Config::default());
//! bot.learn(&bot.category("MY NAME IS *", r#"<think><set name="name"><star/></set></think>Hi <get name="name"/>."#).unwrap());
//! bot.learn(&bot.category("WHAT IS MY NAME", r#"Your name is <get name="name"/>."#).unwrap());
//!
//! let mut user = User::new("alice", &bot);
//! assert_eq!(bot.chat(&mut user, "My name is Alice.").text, "Hi Alice.");
//! assert_eq!(bot.chat(&mut user, "What is my name?").text, "Your name is Alice.");
//! ```

extern crate self as graphmaster;

#[macro_use]
mod macros;
mod api;
mod bot;
mod config;
mod engine;
mod error;
mod normalize;
mod pattern;
mod sets;
mod template;
mod user;

pub use api::Response;
pub use bot::Bot;
pub use config::{Comparer, Config, TraceFlags};
pub use engine::{
    Captures, GraphKind, InputPath, Match, MatchState, Outcome, PatternNode, RequestProcess, SearchOptions,
    SentenceDetails, Templates, search,
};
pub use error::{MatchError, PatternError};
pub use normalize::{Substitution, SubstitutionList, normalize, split_sentences};
pub use pattern::{
    Category, PathToken, PathTokenKind, PatternItem, PatternSource, THAT_SEPARATOR, TOPIC_SEPARATOR, compile_path,
};
pub use sets::{NumberSet, Set, SetCollection, StringSet, WordSet};
pub use template::{
    Evaluate, ExtensionConstructor, ExtensionElement, ExtensionRegistry, Template, TemplateContent, TemplateNode,
};
pub use user::{History, User};
