//! Domain model module declarations.

pub mod item;
pub mod task;

pub use item::{FileItem, ItemId, ItemPayload, MailMessage};
pub use task::{
    declared_kind, FlaggedAction, Priority, TaskKind, TaskRecord, TaskSource, TaskStatus,
};
