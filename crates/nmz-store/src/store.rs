use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use nmz_core::{AttachmentRef, Memory, MemoryFilter};
use tracing::{debug, warn};

use crate::jsonl::{JsonlFile, ensure_dir, set_file_mode_600};

const MEMORY_FILE_NAME: &str = "memories.jsonl";
const MEDIA_DIR_NAME: &str = "media";

/// Memories persisted as JSONL. The CLI is the only writer, so each
/// mutation is a load, modify and atomic rewrite.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    base_dir: PathBuf,
    file: JsonlFile,
}

impl MemoryStore {
    pub fn new(base_dir: PathBuf) -> Self {
        let base_dir = if base_dir.as_os_str().is_empty() {
            default_state_dir()
        } else {
            base_dir
        };
        Self {
            file: JsonlFile::new(&base_dir, MEMORY_FILE_NAME),
            base_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn media_dir(&self) -> PathBuf {
        self.base_dir.join(MEDIA_DIR_NAME)
    }

    /// Every stored memory, in insertion order.
    pub fn load_all(&self) -> Result<Vec<Memory>> {
        self.file.load()
    }

    /// Matching memories, newest first.
    pub fn list(&self, filter: &MemoryFilter) -> Result<Vec<Memory>> {
        let all = self.load_all()?;
        Ok(filter.apply(&all).into_iter().cloned().collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Memory>> {
        let memories = self.load_all()?;
        Ok(memories.into_iter().find(|memory| memory.id() == id))
    }

    pub fn create(&self, memory: &Memory) -> Result<()> {
        if self.get(memory.id())?.is_some() {
            bail!("memory {} already exists", memory.id());
        }
        self.file.append(memory)?;
        debug!(id = memory.id(), kind = %memory.kind(), "memory created");
        Ok(())
    }

    /// Apply `change` to the memory with `id` and persist it. Returns the
    /// updated memory, or `None` when no such memory exists.
    pub fn update<F>(&self, id: &str, change: F) -> Result<Option<Memory>>
    where
        F: FnOnce(&mut Memory) -> Result<()>,
    {
        let mut all = self.load_all()?;
        let Some(memory) = all.iter_mut().find(|memory| memory.id() == id) else {
            return Ok(None);
        };
        change(memory)?;
        let updated = memory.clone();
        self.file.rewrite(&all)?;
        Ok(Some(updated))
    }

    /// Remove a memory and its copied attachment. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut all = self.load_all()?;
        let Some(pos) = all.iter().position(|memory| memory.id() == id) else {
            return Ok(false);
        };
        let removed = all.remove(pos);
        self.file.rewrite(&all)?;
        if let Some(attachment) = &removed.attachment {
            self.remove_owned_media(&attachment.path);
        }
        Ok(true)
    }

    /// Copy an image into the store's media directory so the memory keeps
    /// working after the original file moves.
    pub fn import_attachment(
        &self,
        memory_id: &str,
        source: &Path,
        media_type: &str,
    ) -> Result<AttachmentRef> {
        let media_dir = self.media_dir();
        ensure_dir(&media_dir)?;

        let file_name = match source.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{memory_id}.{}", ext.to_ascii_lowercase()),
            None => memory_id.to_string(),
        };
        let target = media_dir.join(file_name);
        fs::copy(source, &target).with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                target.display()
            )
        })?;
        set_file_mode_600(&target)?;

        Ok(AttachmentRef {
            path: target,
            media_type: media_type.to_string(),
        })
    }

    /// Drop attachments of memories captured before `cutoff`. Only files the
    /// store copied in are deleted. Returns the number of memories touched.
    pub fn purge_media_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut all = self.load_all()?;
        let mut purged = 0;
        for memory in all.iter_mut() {
            if memory.created_at() >= cutoff {
                continue;
            }
            if let Some(attachment) = memory.attachment.take() {
                self.remove_owned_media(&attachment.path);
                purged += 1;
            }
        }
        if purged > 0 {
            self.file.rewrite(&all)?;
        }
        Ok(purged)
    }

    fn remove_owned_media(&self, path: &Path) {
        if !path.starts_with(self.media_dir()) {
            return;
        }
        if let Err(error) = fs::remove_file(path)
            && error.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), %error, "failed to remove media file");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(PathBuf::new())
    }
}

pub fn default_state_dir() -> PathBuf {
    nmz_config::paths::state_dir().unwrap_or_else(nmz_config::paths::state_dir_fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use nmz_core::MemoryKind;

    fn make_test_store() -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("state"));
        (dir, store)
    }

    fn memory_at(id: &str, content: &str, days_ago: i64) -> Memory {
        let created =
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() - Duration::days(days_ago);
        Memory::with_id(id, MemoryKind::Text, content, created)
    }

    #[test]
    fn test_create_get_and_list() {
        let (_dir, store) = make_test_store();
        store
            .create(&memory_at("a", "older", 2).with_tags(&["x"]))
            .unwrap();
        store.create(&memory_at("b", "newer", 1)).unwrap();

        assert_eq!(store.get("a").unwrap().unwrap().content, "older");
        assert!(store.get("zzz").unwrap().is_none());

        let listed = store.list(&MemoryFilter::default()).unwrap();
        let ids: Vec<&str> = listed.iter().map(Memory::id).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let tagged = store
            .list(&MemoryFilter {
                tag: Some("x".into()),
                ..MemoryFilter::default()
            })
            .unwrap();
        assert_eq!(tagged.len(), 1);
    }

    #[test]
    fn test_duplicate_create_is_rejected() {
        let (_dir, store) = make_test_store();
        store.create(&memory_at("a", "one", 0)).unwrap();
        assert!(store.create(&memory_at("a", "two", 0)).is_err());
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_update_persists_and_keeps_identity() {
        let (_dir, store) = make_test_store();
        store.create(&memory_at("a", "draft", 0)).unwrap();

        let updated = store
            .update("a", |memory| {
                memory.content.push_str(" (edited)");
                memory.toggle_pin();
                Ok(())
            })
            .unwrap()
            .unwrap();
        assert!(updated.is_pinned);

        let reloaded = store.get("a").unwrap().unwrap();
        assert_eq!(reloaded.content, "draft (edited)");
        assert_eq!(reloaded.kind(), MemoryKind::Text);
        assert!(reloaded.is_pinned);
        assert!(!reloaded.is_analyzing);

        assert!(store.update("missing", |_| Ok(())).unwrap().is_none());
    }

    #[test]
    fn test_failed_update_leaves_file_untouched() {
        let (_dir, store) = make_test_store();
        store.create(&memory_at("a", "keep", 0)).unwrap();
        let result = store.update("a", |memory| {
            memory.content = "changed".into();
            anyhow::bail!("nope")
        });
        assert!(result.is_err());
        assert_eq!(store.get("a").unwrap().unwrap().content, "keep");
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = make_test_store();
        store.create(&memory_at("a", "x", 0)).unwrap();
        store.create(&memory_at("b", "y", 0)).unwrap();

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        let ids: Vec<String> = store
            .load_all()
            .unwrap()
            .iter()
            .map(|m| m.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_import_and_purge_media() {
        let (dir, store) = make_test_store();
        let source = dir.path().join("Poster.PNG");
        fs::write(&source, b"png-bytes").unwrap();

        let attachment = store.import_attachment("old", &source, "image/png").unwrap();
        assert_eq!(attachment.path, store.media_dir().join("old.png"));
        assert!(attachment.path.exists());
        store
            .create(&memory_at("old", "poster", 40).with_attachment(attachment.clone()))
            .unwrap();

        let recent = store.import_attachment("new", &source, "image/png").unwrap();
        store
            .create(&memory_at("new", "poster", 1).with_attachment(recent.clone()))
            .unwrap();

        let cutoff = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() - Duration::days(30);
        assert_eq!(store.purge_media_before(cutoff).unwrap(), 1);
        assert!(!attachment.path.exists());
        assert!(recent.path.exists());
        assert!(source.exists());
        assert!(store.get("old").unwrap().unwrap().attachment.is_none());
        assert!(store.get("new").unwrap().unwrap().attachment.is_some());
    }

    #[test]
    fn test_delete_keeps_files_outside_media_dir() {
        let (dir, store) = make_test_store();
        let outside = dir.path().join("mine.jpg");
        fs::write(&outside, b"jpg").unwrap();
        let attachment = AttachmentRef {
            path: outside.clone(),
            media_type: "image/jpeg".into(),
        };
        store
            .create(&memory_at("a", "x", 0).with_attachment(attachment))
            .unwrap();
        assert!(store.delete("a").unwrap());
        assert!(outside.exists());
    }
}
