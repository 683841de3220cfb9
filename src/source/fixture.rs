//! Fixture replay: a finite, ordered set of canned mail items used when no
//! mailbox credentials are configured.
//!
//! One fixture is released per listing. A released item stays listed until
//! it is acknowledged, so a failed write is retried on the next tick. Once
//! every fixture has been released and acknowledged, listings are empty
//! forever.

use std::collections::{BTreeMap, VecDeque};

use chrono::Local;
use tracing::info;

use super::{EventSource, SourceFuture};
use crate::dedup::ItemSet;
use crate::models::{ItemPayload, MailMessage};
use crate::AppError;

/// Replays canned mail messages one per tick.
#[derive(Debug, Clone)]
pub struct FixtureReplay {
    queued: VecDeque<MailMessage>,
    released: BTreeMap<String, MailMessage>,
    total: usize,
}

impl FixtureReplay {
    /// Replay `messages` in order.
    #[must_use]
    pub fn new(messages: Vec<MailMessage>) -> Self {
        Self {
            total: messages.len(),
            queued: messages.into(),
            released: BTreeMap::new(),
        }
    }

    /// The three built-in demo messages.
    #[must_use]
    pub fn demo() -> Self {
        Self::new(demo_messages())
    }

    /// Number of fixtures not yet released.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queued.len()
    }

    /// Whether every fixture has been released and acknowledged.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.queued.is_empty() && self.released.is_empty()
    }
}

impl EventSource for FixtureReplay {
    fn describe(&self) -> String {
        format!("fixture replay ({} messages)", self.total)
    }

    fn list_current_items(&mut self) -> SourceFuture<'_, ItemSet> {
        if let Some(next) = self.queued.pop_front() {
            info!(
                subject = %next.subject,
                remaining = self.queued.len(),
                "releasing demo message"
            );
            self.released.insert(next.message_id.clone(), next);
        }
        let ids = self.released.keys().cloned().collect();
        Box::pin(async move { Ok(ids) })
    }

    fn fetch<'a>(&'a mut self, id: &'a str) -> SourceFuture<'a, ItemPayload> {
        let found = self.released.get(id).cloned();
        Box::pin(async move {
            found
                .map(ItemPayload::Mail)
                .ok_or_else(|| AppError::Fetch(format!("unknown fixture {id}")))
        })
    }

    fn acknowledge<'a>(&'a mut self, id: &'a str) -> SourceFuture<'a, ()> {
        self.released.remove(id);
        Box::pin(async { Ok(()) })
    }
}

/// Built-in demo messages.
#[must_use]
pub fn demo_messages() -> Vec<MailMessage> {
    let date = Local::now().to_rfc2822();
    let fixtures = [
        (
            "client@example.com",
            "Project Proposal Review Request",
            "Hi,\n\nCould you please review the attached project proposal and send me your \
             feedback by Friday?\n\nWe need to finalize the budget and timeline sections.\n\n\
             Best regards,\nJohn Smith",
        ),
        (
            "team@startup.io",
            "Partnership Opportunity - AI Consulting",
            "Hello,\n\nWe came across your consulting services and would like to discuss a \
             potential partnership.\n\nOur startup is looking for AI strategy consulting for \
             Q2 2026.\n\nCould we schedule a call this week?\n\nThanks,\nSarah Chen",
        ),
        (
            "newsletter@industry.com",
            "Weekly Industry Digest - AI Trends",
            "This week in AI:\n\n1. New developments in autonomous agents\n2. MCP protocol \
             gaining adoption\n3. Enterprise AI spending up 40%\n\nRead more at \
             industry.com/digest",
        ),
    ];

    fixtures
        .iter()
        .enumerate()
        .map(|(idx, (sender, subject, body))| {
            MailMessage::new(
                format!("<demo-{}@inbox-relay.demo>", idx + 1),
                *sender,
                *subject,
                date.clone(),
                body,
            )
            .with_labels(vec!["INBOX".into(), "UNREAD".into()])
        })
        .collect()
}
