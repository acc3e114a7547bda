//! Session lifecycle and message history

pub mod ledger;
pub mod manager;

pub use ledger::{MessageLedger, NewMessage};
pub use manager::{SessionManager, SessionStats};
