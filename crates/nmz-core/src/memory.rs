use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{CoreError, MemoryKind, merge_tags};

/// Reference to a captured image file and its media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub path: PathBuf,
    pub media_type: String,
}

/// A captured unit of personal information.
///
/// `id`, `kind` and `created_at` are only readable after construction.
/// Tags are deduplicated on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    id: String,
    kind: MemoryKind,
    pub content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(default)]
    linked_memory_ids: Vec<String>,
    #[serde(skip)]
    pub is_analyzing: bool,
    #[serde(default)]
    pub is_pinned: bool,
}

impl Memory {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self::with_id(Ulid::new().to_string(), kind, content, Utc::now())
    }

    pub fn with_id(
        id: impl Into<String>,
        kind: MemoryKind,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            created_at,
            tags: Vec::new(),
            attachment: None,
            reminder_at: None,
            linked_memory_ids: Vec::new(),
            is_analyzing: false,
            is_pinned: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn set_tags<T: AsRef<str>>(&mut self, tags: &[T]) {
        self.tags = merge_tags::<&str, T>(&[], tags);
    }

    pub fn add_tags<T: AsRef<str>>(&mut self, tags: &[T]) {
        self.tags = merge_tags(&self.tags, tags);
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|existing| existing != tag);
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }

    pub fn linked_memory_ids(&self) -> &[String] {
        &self.linked_memory_ids
    }

    /// Record user-confirmed links. Existing links are never removed here.
    pub fn link_to<T: AsRef<str>>(&mut self, ids: &[T]) -> Result<(), CoreError> {
        if let Some(own) = ids.iter().find(|id| id.as_ref() == self.id) {
            return Err(CoreError::SelfLink(own.as_ref().to_string()));
        }
        self.linked_memory_ids = merge_tags(&self.linked_memory_ids, ids);
        Ok(())
    }

    pub fn toggle_pin(&mut self) -> bool {
        self.is_pinned = !self.is_pinned;
        self.is_pinned
    }

    pub fn with_tags<T: AsRef<str>>(mut self, tags: &[T]) -> Self {
        self.set_tags(tags);
        self
    }

    pub fn with_reminder(mut self, at: DateTime<Utc>) -> Self {
        self.reminder_at = Some(at);
        self
    }

    pub fn with_attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Query over a memory collection, mirroring the list endpoint and search box.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub kind: Option<MemoryKind>,
    pub pinned_only: bool,
    pub tag: Option<String>,
    /// Case-insensitive substring of content, any tag, or the kind name.
    pub query: Option<String>,
}

impl MemoryFilter {
    pub fn matches(&self, memory: &Memory) -> bool {
        if self.kind.is_some_and(|kind| kind != memory.kind) {
            return false;
        }
        if self.pinned_only && !memory.is_pinned {
            return false;
        }
        if let Some(tag) = &self.tag
            && !memory.has_tag(tag)
        {
            return false;
        }
        match self.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => {
                let query = query.to_lowercase();
                memory.content.to_lowercase().contains(&query)
                    || memory
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&query))
                    || memory.kind.as_str().to_lowercase().contains(&query)
            }
            _ => true,
        }
    }

    /// Matching memories, newest first.
    pub fn apply<'a>(&self, memories: &'a [Memory]) -> Vec<&'a Memory> {
        let mut matched: Vec<&Memory> = memories.iter().filter(|m| self.matches(m)).collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
    }
}

/// Memories whose reminder has fired at `now`, oldest reminder first.
pub fn due_reminders(memories: &[Memory], now: DateTime<Utc>) -> Vec<&Memory> {
    let mut due: Vec<&Memory> = memories
        .iter()
        .filter(|memory| memory.reminder_at.is_some_and(|at| at <= now))
        .collect();
    due.sort_by_key(|memory| memory.reminder_at);
    due
}
