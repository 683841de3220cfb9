#![forbid(unsafe_code)]

//! Polling producers that turn dropped files, unread mail, and a periodic
//! planning timer into Markdown task records in a shared queue directory.

pub mod classify;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod mail;
pub mod materializer;
pub mod models;
pub mod oplog;
pub mod poll;
pub mod scheduler;
pub mod source;
pub mod watchers;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
