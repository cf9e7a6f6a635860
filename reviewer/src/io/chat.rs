//! Chat-platform seam and a local file-backed chat outbox.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument};

use crate::io::outbox::{allocate_dir, append_entry, read_entries, store_file};

/// Operations the workflow needs from a chat platform.
pub trait ChatPlatform: Send + Sync {
    /// Open a thread with `message` as its first post and return the thread handle.
    fn open_thread(&self, message: &str) -> Result<String>;

    fn post_message(&self, thread: &str, text: &str) -> Result<()>;

    fn upload_file(&self, thread: &str, filename: &str, bytes: &[u8]) -> Result<()>;
}

/// Chat outbox that writes each thread to `<root>/thread-<n>/`.
#[derive(Debug, Clone)]
pub struct FileChat {
    root: PathBuf,
}

impl FileChat {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Messages of a thread, opening message first.
    pub fn messages(&self, thread: &str) -> Result<Vec<String>> {
        read_entries(&self.root.join(thread).join("messages"))
    }

    pub fn upload_path(&self, thread: &str, filename: &str) -> PathBuf {
        self.root.join(thread).join("files").join(filename)
    }

    fn thread_dir(&self, thread: &str) -> Result<PathBuf> {
        let dir = self.root.join(thread);
        if !dir.is_dir() {
            return Err(anyhow!("unknown chat thread {thread}"));
        }
        Ok(dir)
    }
}

impl ChatPlatform for FileChat {
    #[instrument(skip_all)]
    fn open_thread(&self, message: &str) -> Result<String> {
        let (thread, dir) = allocate_dir(&self.root, "thread")?;
        append_entry(&dir.join("messages"), message)?;
        info!(thread = %thread, "chat thread opened");
        Ok(thread)
    }

    fn post_message(&self, thread: &str, text: &str) -> Result<()> {
        append_entry(&self.thread_dir(thread)?.join("messages"), text)?;
        debug!(thread, "chat message posted");
        Ok(())
    }

    fn upload_file(&self, thread: &str, filename: &str, bytes: &[u8]) -> Result<()> {
        store_file(&self.thread_dir(thread)?.join("files"), filename, bytes)?;
        debug!(thread, filename, "chat file uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_keeps_messages_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let chat = FileChat::new(temp.path());
        let thread = chat.open_thread("starting").expect("open");
        chat.post_message(&thread, "cloning").expect("post");
        chat.upload_file(&thread, "report.json", b"{}").expect("upload");

        assert_eq!(thread, "thread-1");
        assert_eq!(
            chat.messages(&thread).expect("messages"),
            vec!["starting", "cloning"]
        );
        assert!(chat.upload_path(&thread, "report.json").is_file());
    }

    #[test]
    fn posting_to_missing_thread_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let chat = FileChat::new(temp.path());
        assert!(chat.post_message("thread-7", "hello").is_err());
    }
}
