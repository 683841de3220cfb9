//! Source items: the unit of new information reported by an event source.

use serde::{Deserialize, Serialize};

/// Stable identifier of an item, unique within its source.
///
/// Filenames for the drop folder, Message-IDs for mail.
pub type ItemId = String;

/// Maximum number of body characters carried into a task record.
pub const MAX_BODY_CHARS: usize = 2000;

/// Maximum number of characters in a mail snippet.
pub const SNIPPET_CHARS: usize = 120;

const TRUNCATION_MARKER: &str = "\n\n... (truncated)";

/// Full payload of an item, fetched once it is known to be new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPayload {
    /// A file that appeared in the watched drop folder.
    File(FileItem),
    /// An unread mail message.
    Mail(MailMessage),
}

/// A file dropped into the watched folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// File name relative to the watched folder.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl FileItem {
    /// File contents as text, when they are valid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// A mail message reduced to the fields a task record needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    /// `Message-ID` header, or a synthetic `unknown-<seq>` id.
    pub message_id: String,
    /// Decoded `From` header.
    pub sender: String,
    /// Decoded `Subject` header.
    pub subject: String,
    /// Raw `Date` header.
    pub date: String,
    /// Plain-text body, trimmed and bounded to [`MAX_BODY_CHARS`].
    pub body: String,
    /// Mailbox labels or flags attached to the message.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Short single-line preview of the body.
    pub snippet: String,
}

impl MailMessage {
    /// Build a message, applying the header defaults and body bounds.
    ///
    /// Empty headers fall back to `Unknown` / `(No Subject)`.
    #[must_use]
    pub fn new(
        message_id: impl Into<String>,
        sender: impl Into<String>,
        subject: impl Into<String>,
        date: impl Into<String>,
        body: &str,
    ) -> Self {
        let body = bound_body(body);
        let snippet = make_snippet(&body);
        Self {
            message_id: message_id.into(),
            sender: or_default(sender.into(), "Unknown"),
            subject: or_default(subject.into(), "(No Subject)"),
            date: or_default(date.into(), "Unknown"),
            body,
            labels: Vec::new(),
            snippet,
        }
    }

    /// Attach mailbox labels.
    #[must_use]
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

fn or_default(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_owned()
    } else {
        value
    }
}

/// Truncate a body to [`MAX_BODY_CHARS`] characters and trim it.
fn bound_body(body: &str) -> String {
    if body.chars().count() > MAX_BODY_CHARS {
        let head: String = body.chars().take(MAX_BODY_CHARS).collect();
        format!("{head}{TRUNCATION_MARKER}").trim().to_owned()
    } else {
        body.trim().to_owned()
    }
}

fn make_snippet(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(SNIPPET_CHARS).collect()
}
