//! Cross-session user memory
//!
//! Components:
//! - Extractor: rule-table heuristics turning user messages into fragments
//! - Index: store-backed, cache-fronted fragment collection with
//!   relevance-ranked search (textual match + tags + importance + decay)

pub mod extractor;
pub mod index;
pub mod types;

pub use extractor::{default_rules, ExtractionRule, MemoryExtractor};
pub use index::{relevance_score, MemoryIndex, MemoryStats, DEFAULT_SEARCH_LIMIT, SCORE_THRESHOLD};
pub use types::{FragmentType, MemoryFragment};
