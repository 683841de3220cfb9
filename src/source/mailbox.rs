//! Live mailbox source over an injected [`MailTransport`].
//!
//! Each tick opens a session, lists unread messages (fetched with peek so
//! they stay unread), and keeps the session open until the tick ends so
//! acknowledged messages can be flagged read. The remote unread flag is the
//! durable suppression mechanism; the poll loop's seen-set only covers
//! messages whose read flag could not be stored during this process.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{EventSource, SourceFuture};
use crate::dedup::ItemSet;
use crate::mail::{MailAuth, MailSession, MailTransport};
use crate::models::{ItemPayload, MailMessage};
use crate::AppError;

struct Pending {
    seq: u32,
    message: MailMessage,
}

/// Unread messages in a remote inbox.
pub struct MailboxSource {
    transport: Arc<dyn MailTransport>,
    auth: MailAuth,
    host: String,
    port: u16,
    session: Option<Box<dyn MailSession>>,
    pending: HashMap<String, Pending>,
}

impl MailboxSource {
    /// Source polling `host:port` with `auth` over `transport`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn MailTransport>,
        auth: MailAuth,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            transport,
            auth,
            host: host.into(),
            port,
            session: None,
            pending: HashMap::new(),
        }
    }

    async fn close_session(&mut self) {
        self.pending.clear();
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.logout().await {
                debug!(%err, "mailbox logout failed");
            }
        }
    }

    async fn list(&mut self) -> crate::Result<ItemSet> {
        self.close_session().await;

        let credential = self
            .auth
            .credential()
            .await
            .map_err(|err| AppError::SourceUnavailable(format!("mailbox auth failed: {err}")))?;
        let mut session = self
            .transport
            .connect(&self.host, self.port, &credential)
            .await
            .map_err(|err| match err {
                AppError::SourceUnavailable(_) => err,
                other => AppError::SourceUnavailable(format!("mailbox login failed: {other}")),
            })?;

        let seqs = match session.search_unseen().await {
            Ok(seqs) => seqs,
            Err(err) => {
                let _ = session.logout().await;
                return Err(AppError::SourceUnavailable(format!(
                    "unread search failed: {err}"
                )));
            }
        };

        let mut ids = ItemSet::new();
        for seq in seqs {
            match session.fetch_peek(seq).await {
                Ok(raw) => {
                    let message = raw.into_message(seq);
                    ids.insert(message.message_id.clone());
                    self.pending
                        .insert(message.message_id.clone(), Pending { seq, message });
                }
                Err(err) => warn!(seq, %err, "failed to fetch message, skipping"),
            }
        }
        info!(unread = ids.len(), host = %self.host, "mailbox checked");

        self.session = Some(session);
        Ok(ids)
    }

    async fn mark_read(&mut self, id: &str) -> crate::Result<()> {
        let Some(pending) = self.pending.remove(id) else {
            return Ok(());
        };
        match self.session.as_mut() {
            Some(session) => session.mark_seen(pending.seq).await,
            None => Err(AppError::SourceUnavailable(
                "mailbox session closed before acknowledgement".into(),
            )),
        }
    }
}

impl EventSource for MailboxSource {
    fn describe(&self) -> String {
        format!(
            "mailbox {}@{}:{} ({})",
            self.auth.user(),
            self.host,
            self.port,
            self.auth.scheme()
        )
    }

    fn list_current_items(&mut self) -> SourceFuture<'_, ItemSet> {
        Box::pin(self.list())
    }

    fn fetch<'a>(&'a mut self, id: &'a str) -> SourceFuture<'a, ItemPayload> {
        let found = self.pending.get(id).map(|p| p.message.clone());
        Box::pin(async move {
            found
                .map(ItemPayload::Mail)
                .ok_or_else(|| AppError::Fetch(format!("message {id} not in current listing")))
        })
    }

    fn acknowledge<'a>(&'a mut self, id: &'a str) -> SourceFuture<'a, ()> {
        Box::pin(self.mark_read(id))
    }

    fn end_tick(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.close_session())
    }
}
