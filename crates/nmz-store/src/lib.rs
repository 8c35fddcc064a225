//! Local persistence: memories and the chat log as JSONL files under the
//! XDG state directory, plus copied-in media attachments.

mod chat_log;
mod jsonl;
mod store;

pub use chat_log::ChatLog;
pub use store::{MemoryStore, default_state_dir};
