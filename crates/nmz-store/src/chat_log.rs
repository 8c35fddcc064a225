use std::path::Path;

use anyhow::Result;
use nmz_core::ChatMessage;

use crate::jsonl::JsonlFile;
use crate::store::default_state_dir;

const CHAT_FILE_NAME: &str = "chat.jsonl";

/// Append-only conversation history.
#[derive(Debug, Clone)]
pub struct ChatLog {
    file: JsonlFile,
}

impl ChatLog {
    pub fn new(base_dir: &Path) -> Self {
        let base_dir = if base_dir.as_os_str().is_empty() {
            default_state_dir()
        } else {
            base_dir.to_path_buf()
        };
        Self {
            file: JsonlFile::new(&base_dir, CHAT_FILE_NAME),
        }
    }

    pub fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.file.append(message)
    }

    /// Messages in conversation order; with `limit`, only the most recent ones.
    pub fn list_messages(&self, limit: Option<usize>) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = self.file.load()?;
        if let Some(limit) = limit
            && messages.len() > limit
        {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }

    pub fn clear(&self) -> Result<()> {
        self.file.rewrite::<ChatMessage>(&[])
    }

    #[cfg(test)]
    fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmz_core::Sender;

    #[test]
    fn test_append_and_list_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatLog::new(dir.path());
        log.append_message(&ChatMessage::user("what did I eat?"))
            .unwrap();
        log.append_message(&ChatMessage::assistant("Ramen.", vec!["m1".into()]))
            .unwrap();
        log.append_message(&ChatMessage::user("thanks")).unwrap();

        let all = log.list_messages(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].sender, Sender::Assistant);
        assert_eq!(all[1].related_memory_ids, vec!["m1"]);

        let recent = log.list_messages(Some(2)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "Ramen.");
        assert_eq!(recent[1].text, "thanks");
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatLog::new(dir.path());
        log.append_message(&ChatMessage::user("hi")).unwrap();
        log.clear().unwrap();
        assert!(log.list_messages(None).unwrap().is_empty());
        assert!(log.path().exists());
    }
}
