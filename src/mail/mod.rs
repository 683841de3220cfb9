//! Mailbox transport capability and authentication.
//!
//! The wire protocol (IMAP session handling and MIME parsing) is supplied by
//! the embedding application through [`MailTransport`]. This module owns
//! what sits above it: resolving credentials for either authentication
//! scheme and normalizing fetched messages.

pub mod auth;
pub mod oauth;

use std::future::Future;
use std::pin::Pin;

use crate::models::MailMessage;
use crate::Result;

pub use auth::{MailAuth, MailCredential};
pub use oauth::{OAuthToken, OAuthTokenProvider};

/// Boxed future returned by transport operations.
pub type MailFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Message as produced by the transport's parser, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    /// `Message-ID` header, if present.
    pub message_id: Option<String>,
    /// Decoded `From` header.
    pub from: Option<String>,
    /// Decoded `Subject` header.
    pub subject: Option<String>,
    /// Raw `Date` header.
    pub date: Option<String>,
    /// First non-attachment `text/plain` part, decoded.
    pub body: String,
    /// Labels or flags reported by the server.
    pub labels: Vec<String>,
}

impl RawMessage {
    /// Normalize into a [`MailMessage`]; `seq` names messages lacking a
    /// `Message-ID`.
    #[must_use]
    pub fn into_message(self, seq: u32) -> MailMessage {
        let message_id = self
            .message_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("unknown-{seq}"));
        MailMessage::new(
            message_id,
            self.from.unwrap_or_default(),
            self.subject.unwrap_or_default(),
            self.date.unwrap_or_default(),
            &self.body,
        )
        .with_labels(self.labels)
    }
}

/// Opens authenticated mailbox sessions.
pub trait MailTransport: Send + Sync {
    /// Connect to `host:port` and authenticate with `credential`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SourceUnavailable` if the server cannot be reached
    /// or `AppError::Auth` if the login is rejected.
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
        credential: &'a MailCredential,
    ) -> MailFuture<'a, Box<dyn MailSession>>;
}

/// An open, authenticated session on the inbox.
pub trait MailSession: Send {
    /// Sequence numbers of unread messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the search command fails.
    fn search_unseen(&mut self) -> MailFuture<'_, Vec<u32>>;

    /// Fetch one message without setting its read flag.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Fetch` if the message cannot be retrieved or parsed.
    fn fetch_peek(&mut self, seq: u32) -> MailFuture<'_, RawMessage>;

    /// Set the read flag on a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be stored.
    fn mark_seen(&mut self, seq: u32) -> MailFuture<'_, ()>;

    /// Close the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout exchange fails.
    fn logout(&mut self) -> MailFuture<'_, ()>;
}
