//! Context management: token estimation and message-list compression

pub mod compressor;
pub mod counter;

pub use compressor::{create_summary, CompressionEngine, CompressionResult, RECENT_WINDOW};
pub use counter::TokenCounter;
