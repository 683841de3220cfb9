//! Task record model and its Markdown front-matter serialization.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::item::{FileItem, MailMessage};

/// Timestamp format used inside task records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of follow-up work a task record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// A dropped file must be reviewed.
    FileReview,
    /// An email needs a response or triage.
    EmailResponse,
    /// Pending work must be summarized into a plan.
    Planning,
}

/// Lifecycle status of a task record. Only `Pending` is ever written here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for the downstream executor.
    Pending,
    /// Completed by the downstream executor.
    Done,
}

/// Scheduling priority hint for the executor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Handle when convenient.
    Low,
    /// Default priority.
    Medium,
    /// Handle before other pending work.
    High,
}

/// Producer that wrote a task record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Drop-folder watcher.
    FileWatcher,
    /// Mailbox watcher (live or fixture replay).
    MailWatcher,
    /// Queue-depth scheduler.
    Scheduler,
}

/// Action suggested by the keyword classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlaggedAction {
    /// Outbound mail; always requires operator approval.
    SendEmail,
    /// Propose or book a meeting.
    ScheduleMeeting,
    /// Archive without further follow-up.
    Archive,
}

impl FlaggedAction {
    /// Wire name written to the `flagged_actions` front-matter list.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendEmail => "send_email",
            Self::ScheduleMeeting => "schedule_meeting",
            Self::Archive => "archive",
        }
    }

    fn checklist_step(self) -> &'static str {
        match self {
            Self::SendEmail => "Draft the outgoing message and route it through approval",
            Self::ScheduleMeeting => "Propose meeting times or add the event to the calendar",
            Self::Archive => "Archive the item if no follow-up is required",
        }
    }
}

/// A durable description of follow-up work, written once to the queue
/// directory and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// Kind of work.
    pub kind: TaskKind,
    /// Always [`TaskStatus::Pending`] when produced here.
    pub status: TaskStatus,
    /// Priority hint.
    pub priority: Priority,
    /// Local creation time.
    pub created_at: DateTime<Local>,
    /// Paths or references the executor should look at.
    pub related_items: Vec<String>,
    /// Whether any flagged action needs operator approval.
    pub approval_needed: bool,
    /// Classifier suggestions, in rule order.
    pub flagged_actions: Vec<FlaggedAction>,
    /// Producer of this record.
    pub source: TaskSource,
    /// Source-specific front-matter fields, rendered as quoted strings.
    pub metadata: Vec<(String, String)>,
    /// Markdown heading.
    pub title: String,
    /// Free-text description paragraph.
    pub description: Option<String>,
    /// Bulleted `**key:** value` details.
    pub details: Vec<(String, String)>,
    /// Optional embedded content section as `(heading, text)`.
    pub content: Option<(String, String)>,
    /// Checklist entries.
    pub steps: Vec<String>,
    /// Trailing notes.
    pub notes: Vec<String>,
}

impl TaskRecord {
    /// Review task for a file dropped into the inbox folder.
    #[must_use]
    pub fn file_review(file: &FileItem, inbox_label: &str, created_at: DateTime<Local>) -> Self {
        let stamp = created_at.format(TIMESTAMP_FORMAT).to_string();
        Self {
            kind: TaskKind::FileReview,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            created_at,
            related_items: vec![format!("{inbox_label}/{}", file.name)],
            approval_needed: false,
            flagged_actions: Vec::new(),
            source: TaskSource::FileWatcher,
            metadata: vec![
                ("file_name".into(), file.name.clone()),
                ("size_bytes".into(), file.bytes.len().to_string()),
            ],
            title: format!("Review File: {}", file.name),
            description: Some(format!(
                "A new file was detected in the {inbox_label} folder and requires review. \
                 Examine the file and determine the appropriate action to take."
            )),
            details: Vec::new(),
            content: None,
            steps: vec![
                "Open and review the file content".into(),
                "Determine what action is needed (process, archive, or escalate)".into(),
                "Execute the required action".into(),
                "Mark this task as completed".into(),
            ],
            notes: vec![
                format!("**Source:** {inbox_label} folder"),
                format!("**Detected at:** {stamp}"),
                "This task was auto-generated by the file watcher.".into(),
            ],
        }
    }

    /// Response task for an incoming mail message.
    #[must_use]
    pub fn email_response(msg: &MailMessage, created_at: DateTime<Local>) -> Self {
        let stamp = created_at.format(TIMESTAMP_FORMAT).to_string();
        Self {
            kind: TaskKind::EmailResponse,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            created_at,
            related_items: Vec::new(),
            approval_needed: false,
            flagged_actions: Vec::new(),
            source: TaskSource::MailWatcher,
            metadata: vec![
                ("message_id".into(), msg.message_id.clone()),
                ("sender".into(), msg.sender.clone()),
                ("subject".into(), msg.subject.clone()),
                ("received".into(), msg.date.clone()),
                ("labels".into(), msg.labels.join(",")),
                ("snippet".into(), msg.snippet.clone()),
            ],
            title: format!("Email Task: {}", msg.subject),
            description: None,
            details: vec![
                ("From".into(), msg.sender.clone()),
                ("Subject".into(), msg.subject.clone()),
                ("Received".into(), msg.date.clone()),
                ("Message ID".into(), msg.message_id.clone()),
            ],
            content: Some(("Email Body".into(), msg.body.clone())),
            steps: vec![
                "Read and understand the email content".into(),
                "Determine what action is needed (reply, forward, archive, or escalate)".into(),
                "If reply needed: draft response and route through approval".into(),
                "Execute the required action".into(),
                "Mark this task as completed".into(),
            ],
            notes: vec![
                "**Source:** mail watcher (automatic detection)".into(),
                format!("**Detected at:** {stamp}"),
                "This task was auto-generated by the mail watcher.".into(),
            ],
        }
    }

    /// Synthetic planning task injected by the scheduler.
    #[must_use]
    pub fn plan(pending_count: usize, created_at: DateTime<Local>) -> Self {
        let stamp = created_at.format(TIMESTAMP_FORMAT).to_string();
        Self {
            kind: TaskKind::Planning,
            status: TaskStatus::Pending,
            priority: Priority::High,
            created_at,
            related_items: Vec::new(),
            approval_needed: false,
            flagged_actions: Vec::new(),
            source: TaskSource::Scheduler,
            metadata: vec![("pending_tasks".into(), pending_count.to_string())],
            title: "Generate Daily Plan".into(),
            description: Some(format!(
                "The scheduler detected {pending_count} pending task(s) that need planning. \
                 Analyze all pending tasks and create an execution plan."
            )),
            details: Vec::new(),
            content: None,
            steps: vec![
                "Scan the queue directory for all pending tasks".into(),
                "Analyze task types, priorities, and dependencies".into(),
                "Write an execution plan".into(),
                "Log completion to the system log".into(),
            ],
            notes: vec![
                "**Triggered by:** scheduler (automatic)".into(),
                format!("**Detected at:** {stamp}"),
                "This is a planning task only; do not execute other tasks.".into(),
            ],
        }
    }

    /// Apply classifier output. Each flagged action adds a checklist step
    /// ahead of the final completion step.
    #[must_use]
    pub fn with_flags(mut self, approval_needed: bool, actions: Vec<FlaggedAction>) -> Self {
        let insert_at = self.steps.len().saturating_sub(1);
        for (offset, action) in actions.iter().enumerate() {
            self.steps
                .insert(insert_at + offset, action.checklist_step().to_owned());
        }
        self.approval_needed = approval_needed;
        self.flagged_actions = actions;
        self
    }

    /// Render the record as front matter followed by the Markdown body.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let actions: Vec<&str> = self.flagged_actions.iter().map(|a| a.as_str()).collect();

        out.push_str("---\n");
        let _ = writeln!(out, "type: {}", enum_name(&self.kind));
        let _ = writeln!(out, "status: {}", enum_name(&self.status));
        let _ = writeln!(out, "priority: {}", enum_name(&self.priority));
        let _ = writeln!(
            out,
            "created_at: {}",
            self.created_at.format(TIMESTAMP_FORMAT)
        );
        let _ = writeln!(out, "related_files: {}", json_list(&self.related_items));
        let _ = writeln!(out, "approval_needed: {}", self.approval_needed);
        out.push_str("approved: false\n");
        let _ = writeln!(out, "flagged_actions: {}", json_list(&actions));
        let _ = writeln!(out, "source: {}", enum_name(&self.source));
        for (key, value) in &self.metadata {
            let _ = writeln!(out, "{key}: {}", quoted(value));
        }
        out.push_str("---\n\n");

        let _ = writeln!(out, "# {}\n", self.title);
        if let Some(description) = &self.description {
            let _ = writeln!(out, "## Description\n\n{description}\n");
        }
        if !self.details.is_empty() {
            out.push_str("## Details\n\n");
            for (key, value) in &self.details {
                let _ = writeln!(out, "- **{key}:** {value}");
            }
            out.push('\n');
        }
        if let Some((heading, text)) = &self.content {
            let _ = writeln!(out, "## {heading}\n\n{text}\n");
        }
        out.push_str("## Steps\n\n");
        for step in &self.steps {
            let _ = writeln!(out, "- [ ] {step}");
        }
        out.push_str("\n## Notes\n\n");
        for note in &self.notes {
            let _ = writeln!(out, "- {note}");
        }
        out
    }
}

/// Snake-case name of a unit enum variant via its serde representation.
/// Kind declared by the `type:` field of a rendered record's front matter.
///
/// Returns `None` when the text has no front matter, no `type:` field, or
/// an unknown kind.
#[must_use]
pub fn declared_kind(text: &str) -> Option<TaskKind> {
    let mut lines = text.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }
    lines
        .take_while(|line| line.trim() != "---")
        .find_map(|line| line.strip_prefix("type:"))
        .and_then(|kind| {
            serde_json::from_value(serde_json::Value::String(kind.trim().to_owned())).ok()
        })
}

fn enum_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

fn json_list<S: AsRef<str>>(items: &[S]) -> String {
    let items: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    serde_json::to_string(&items).unwrap_or_else(|_| "[]".into())
}

fn quoted(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".into())
}
