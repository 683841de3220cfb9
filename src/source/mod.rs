//! Event source capability and its variants.
//!
//! Every watcher is written against [`EventSource`]: list the identifiers the
//! source currently reports, then fetch the payload of each new one. The poll
//! loop never needs to know which variant it drives.

pub mod directory;
pub mod fixture;
pub mod mailbox;

use std::future::Future;
use std::pin::Pin;

use crate::dedup::ItemSet;
use crate::models::ItemPayload;
use crate::Result;

pub use directory::DirectoryListing;
pub use fixture::FixtureReplay;
pub use mailbox::MailboxSource;

/// Boxed future returned by source operations.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Polymorphic producer of items.
pub trait EventSource: Send {
    /// Short label used in logs and the activity log.
    fn describe(&self) -> String;

    /// Whether the loop should treat the first listing as already seen.
    fn seed_on_start(&self) -> bool {
        false
    }

    /// Identifiers the source currently reports.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::SourceUnavailable`](crate::AppError::SourceUnavailable)
    /// if the transport cannot be reached.
    fn list_current_items(&mut self) -> SourceFuture<'_, ItemSet>;

    /// Full payload for one identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Fetch`](crate::AppError::Fetch) if this single item
    /// cannot be retrieved.
    fn fetch<'a>(&'a mut self, id: &'a str) -> SourceFuture<'a, ItemPayload>;

    /// Called once the item's task record has been written.
    ///
    /// # Errors
    ///
    /// Returns an error if remote acknowledgement fails; the caller logs it.
    fn acknowledge<'a>(&'a mut self, _id: &'a str) -> SourceFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Called at the end of every tick to release per-tick resources.
    fn end_tick(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}
