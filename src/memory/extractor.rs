//! Heuristic memory extraction from user messages
//!
//! A fixed rule table maps trigger phrases in lower-cased message text
//! to fragment types with preset importance/confidence. Each rule fires
//! at most once per message; several rules can fire on the same
//! message, each producing its own fragment carrying the full original
//! content (not just the matched span). Tags are derived independently
//! from a keyword map.

use crate::memory::types::{FragmentType, MemoryFragment};
use crate::types::messages::{ChatMessage, MessageRole};
use crate::types::session::ContextSession;

/// One extraction rule: phrase set → fragment parameters
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub fragment_type: FragmentType,
    /// Lower-case trigger phrases, matched by substring
    pub phrases: &'static [&'static str],
    pub importance: f64,
    pub confidence: f64,
}

/// Keyword → category tag map applied to the lower-cased content
const TAG_KEYWORDS: &[(&str, &str)] = &[
    ("work", "work"),
    ("job", "work"),
    ("career", "work"),
    ("office", "work"),
    ("study", "study"),
    ("school", "study"),
    ("university", "study"),
    ("learn", "study"),
    ("hobby", "hobby"),
    ("play", "hobby"),
    ("game", "hobby"),
    ("music", "hobby"),
    ("sport", "hobby"),
    ("family", "family"),
    ("mother", "family"),
    ("father", "family"),
    ("wife", "family"),
    ("husband", "family"),
    ("child", "family"),
    ("skill", "skill"),
    ("good at", "skill"),
    ("i can", "skill"),
];

/// Default rule table: likes/dislikes, identity/occupation facts,
/// positive/negative skills
pub fn default_rules() -> Vec<ExtractionRule> {
    vec![
        ExtractionRule {
            fragment_type: FragmentType::Preference,
            phrases: &["i like", "i love", "i prefer", "i enjoy", "i tend to"],
            importance: 0.7,
            confidence: 0.8,
        },
        ExtractionRule {
            fragment_type: FragmentType::Preference,
            phrases: &["i dislike", "i hate", "i don't like", "i do not like"],
            importance: 0.7,
            confidence: 0.8,
        },
        ExtractionRule {
            fragment_type: FragmentType::Fact,
            phrases: &["i am", "i'm", "my name is", "i come from"],
            importance: 0.9,
            confidence: 0.9,
        },
        ExtractionRule {
            fragment_type: FragmentType::Fact,
            phrases: &["i work at", "i work as", "i study at", "i study in"],
            importance: 0.9,
            confidence: 0.9,
        },
        ExtractionRule {
            fragment_type: FragmentType::Skill,
            phrases: &["i can", "i am good at", "i'm good at", "i know how to"],
            importance: 0.8,
            confidence: 0.8,
        },
        ExtractionRule {
            fragment_type: FragmentType::Skill,
            phrases: &["i cannot", "i can't", "i am not good at", "i'm not good at"],
            importance: 0.8,
            confidence: 0.8,
        },
    ]
}

/// Rule-driven memory extractor
pub struct MemoryExtractor {
    rules: Vec<ExtractionRule>,
}

impl MemoryExtractor {
    /// Create an extractor with the default rule table
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Create an extractor with a custom rule table
    pub fn with_rules(rules: Vec<ExtractionRule>) -> Self {
        Self { rules }
    }

    /// Derive memory fragments from one user message
    ///
    /// Non-user messages never produce fragments.
    pub fn extract(&self, message: &ChatMessage, session: &ContextSession) -> Vec<MemoryFragment> {
        if message.role != MessageRole::User {
            return Vec::new();
        }

        let lowered = message.content.to_lowercase();
        let tags = derive_tags(&lowered);

        self.rules
            .iter()
            .filter(|rule| rule.phrases.iter().any(|p| lowered.contains(p)))
            .map(|rule| {
                MemoryFragment::new(
                    session.id.clone(),
                    session.user_id.clone(),
                    rule.fragment_type,
                    message.content.clone(),
                    rule.importance,
                    rule.confidence,
                    tags.clone(),
                )
            })
            .collect()
    }
}

impl Default for MemoryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Map keyword hits in lower-cased content to deduplicated category tags
fn derive_tags(lowered: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for (keyword, tag) in TAG_KEYWORDS {
        if lowered.contains(keyword) && !tags.iter().any(|t| t == tag) {
            tags.push((*tag).to_string());
        }
    }
    tags
}
