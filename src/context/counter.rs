//! Token counting with a cheap length-based heuristic
//!
//! # Algorithm
//!
//! estimate_tokens(text) = ⌈utf8_len(text) / 4⌉
//!
//! This is deliberately not a model tokenizer; the budget math only
//! needs a stable approximation that never returns 0 for non-empty text.
//!
//! # Complexity
//! O(1) — byte length is already known.

/// Token counter with heuristic-based estimation
#[derive(Debug, Clone, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create new token counter
    pub fn new() -> Self {
        Self
    }

    /// Estimate token count for text
    ///
    /// ```
    /// # use contextkeeper::context::counter::TokenCounter;
    /// let counter = TokenCounter::new();
    /// assert_eq!(counter.estimate("abcdefgh"), 2);
    /// assert_eq!(counter.estimate("abcdefghi"), 3);
    /// assert_eq!(counter.estimate(""), 0);
    /// ```
    pub fn estimate(&self, text: &str) -> usize {
        // Ceiling division over the UTF-8 byte length
        (text.len() + 3) / 4
    }

    /// Batch estimate for multiple text segments
    pub fn estimate_batch<'a, I: IntoIterator<Item = &'a str>>(&self, texts: I) -> usize {
        texts.into_iter().map(|text| self.estimate(text)).sum()
    }
}
