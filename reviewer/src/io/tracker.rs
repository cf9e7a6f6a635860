//! Issue-tracker seam and a local file-backed tracker.
//!
//! The [`IssueTracker`] trait is all the workflow knows about the tracker.
//! [`FileTracker`] keeps tickets as directories under the state dir so a run
//! can be inspected without any remote service.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::types::TicketStatus;
use crate::io::config::StatusNames;
use crate::io::outbox::{allocate_dir, append_entry, read_entries, store_file};

/// Fields of a ticket to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub repo_url: String,
    pub labels: Vec<String>,
}

/// Operations the workflow needs from an issue tracker.
pub trait IssueTracker: Send + Sync {
    /// Create a ticket and return its key.
    fn create_ticket(&self, ticket: &NewTicket) -> Result<String>;

    fn transition(&self, key: &str, status: TicketStatus) -> Result<()>;

    fn post_comment(&self, key: &str, text: &str) -> Result<()>;

    fn attach_file(&self, key: &str, filename: &str, bytes: &[u8]) -> Result<()>;
}

/// Persisted ticket record (`ticket.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub key: String,
    pub title: String,
    pub description: String,
    pub repo_url: String,
    pub labels: Vec<String>,
    pub status: String,
    /// Every status the ticket was moved to, oldest first.
    #[serde(default)]
    pub history: Vec<String>,
}

/// Tracker that writes tickets to `<root>/REV-<n>/`.
#[derive(Debug, Clone)]
pub struct FileTracker {
    root: PathBuf,
    statuses: StatusNames,
}

impl FileTracker {
    pub fn new(root: impl Into<PathBuf>, statuses: StatusNames) -> Self {
        Self {
            root: root.into(),
            statuses,
        }
    }

    pub fn ticket(&self, key: &str) -> Result<TicketRecord> {
        let path = self.ticket_path(key)?;
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }

    pub fn comments(&self, key: &str) -> Result<Vec<String>> {
        read_entries(&self.ticket_dir(key)?.join("comments"))
    }

    pub fn attachment_path(&self, key: &str, filename: &str) -> Result<PathBuf> {
        Ok(self.ticket_dir(key)?.join("attachments").join(filename))
    }

    fn ticket_dir(&self, key: &str) -> Result<PathBuf> {
        let dir = self.root.join(key);
        if !dir.is_dir() {
            return Err(anyhow!("unknown ticket {key}"));
        }
        Ok(dir)
    }

    fn ticket_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.ticket_dir(key)?.join("ticket.json"))
    }

    fn save(&self, path: &Path, record: &TicketRecord) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(record).context("serialize ticket")?;
        buf.push('\n');
        super::write_atomic(path, &buf)
    }
}

impl IssueTracker for FileTracker {
    #[instrument(skip_all, fields(title = %ticket.title))]
    fn create_ticket(&self, ticket: &NewTicket) -> Result<String> {
        let (key, dir) = allocate_dir(&self.root, "REV")?;
        let record = TicketRecord {
            key: key.clone(),
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            repo_url: ticket.repo_url.clone(),
            labels: ticket.labels.clone(),
            status: self.statuses.name(TicketStatus::ToDo).to_string(),
            history: Vec::new(),
        };
        self.save(&dir.join("ticket.json"), &record)?;
        info!(key = %key, "ticket created");
        Ok(key)
    }

    #[instrument(skip(self))]
    fn transition(&self, key: &str, status: TicketStatus) -> Result<()> {
        let path = self.ticket_path(key)?;
        let mut record = self.ticket(key)?;
        let name = self.statuses.name(status).to_string();
        record.history.push(name.clone());
        record.status = name;
        self.save(&path, &record)?;
        debug!(status = %record.status, "ticket transitioned");
        Ok(())
    }

    fn post_comment(&self, key: &str, text: &str) -> Result<()> {
        let path = append_entry(&self.ticket_dir(key)?.join("comments"), text)?;
        debug!(key, path = %path.display(), "ticket comment posted");
        Ok(())
    }

    fn attach_file(&self, key: &str, filename: &str, bytes: &[u8]) -> Result<()> {
        let path = store_file(&self.ticket_dir(key)?.join("attachments"), filename, bytes)?;
        debug!(key, path = %path.display(), "ticket attachment stored");
        Ok(())
    }
}
