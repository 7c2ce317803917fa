//! Category graph and search engine.
//!
//! Building the graph lives in `node`, walking it in `search`, and the state a
//! matched template sees while it runs in `process`. Per-sentence reporting
//! is in `metrics`. Everything is re-exported here and again from the crate
//! root.
//!
//! ## How the parts work together
//!
//! ```text
//! Category ── compile_path ──▶ Vec<PathToken>      (pattern.rs)
//!                                  │
//!                                  v
//!                     PatternNode::add_child        (node.rs)
//!                                  │
//! sentence ── InputPath::new ──────┼─ search(roots, input, options)  (search.rs)
//!                                  │    - priority order per node
//!                                  │    - reserve/fill/release captures
//!                                  v
//!                                Match
//!                                  │
//!                                  v
//!                     RequestProcess + Evaluate     (process.rs, template.rs)
//!                                  │
//!                                  v
//!                       text + SentenceDetails      (metrics.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `node.rs`: the append-only trie of [`PatternNode`]s, keyed by
//!   comparer-folded token text, with ordered set children.
//! - `search.rs`: the priority-ordered backtracking search, safety checks
//!   (deadline on every step, recursion depth once per search), and capture
//!   bookkeeping.
//! - `process.rs`: per-sentence state handed to templates, and the entry
//!   point for sub-requests.
//! - `metrics.rs`: per-sentence details reported with every response.
//!
//! ## Debugging
//!
//! Set `GRAPHMASTER_TRACE=path,search` (or `1`) to emit the normalized input
//! path and every search step at `trace` level.

#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/node.rs"]
mod node;
#[path = "engine/process.rs"]
mod process;
#[path = "engine/search.rs"]
mod search;


pub use metrics::{GraphKind, Outcome, SentenceDetails};
pub use node::{PatternNode, Templates};
pub use process::RequestProcess;
pub use search::{Captures, InputPath, Match, MatchState, SearchOptions, search};
