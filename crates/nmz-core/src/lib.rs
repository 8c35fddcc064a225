//! Core data model shared by the Nomorize crates: memories, chat turns,
//! analysis results and the small amount of logic that guards their
//! invariants (tag dedup, immutable kind, reminder scans).

pub mod analysis;
pub mod chat;
pub mod error;
pub mod memory;
pub mod tags;
pub mod types;

pub use analysis::AnalysisResult;
pub use chat::{ChatMessage, Sender};
pub use error::CoreError;
pub use memory::{AttachmentRef, Memory, MemoryFilter, due_reminders};
pub use tags::merge_tags;
pub use types::{AssistantTone, MemoryKind, OutputFormat};
