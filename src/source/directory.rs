//! Drop-folder source: one item per regular file.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{EventSource, SourceFuture};
use crate::dedup::ItemSet;
use crate::models::{FileItem, ItemPayload};
use crate::AppError;

/// Lists regular files in a watched folder; ids are file names.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    dir: PathBuf,
}

impl DirectoryListing {
    /// Watch `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Watched folder.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn list(&self) -> crate::Result<ItemSet> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            tokio::fs::create_dir_all(&self.dir).await.map_err(|err| {
                AppError::SourceUnavailable(format!(
                    "failed to create watched folder {}: {err}",
                    self.dir.display()
                ))
            })?;
            info!(dir = %self.dir.display(), "created watched folder");
            return Ok(ItemSet::new());
        }

        let unavailable = |err: std::io::Error| {
            AppError::SourceUnavailable(format!(
                "failed to read watched folder {}: {err}",
                self.dir.display()
            ))
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(unavailable)?;
        let mut items = ItemSet::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => {
                    items.insert(name);
                }
                Err(raw) => warn!(name = ?raw, "skipping non UTF-8 file name"),
            }
        }
        Ok(items)
    }
}

impl EventSource for DirectoryListing {
    fn describe(&self) -> String {
        format!("folder {}", self.dir.display())
    }

    fn seed_on_start(&self) -> bool {
        true
    }

    fn list_current_items(&mut self) -> SourceFuture<'_, ItemSet> {
        Box::pin(self.list())
    }

    fn fetch<'a>(&'a mut self, id: &'a str) -> SourceFuture<'a, ItemPayload> {
        Box::pin(async move {
            let path = self.dir.join(id);
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|err| AppError::Fetch(format!("failed to read {}: {err}", path.display())))?;
            Ok(ItemPayload::File(FileItem {
                name: id.to_owned(),
                bytes,
            }))
        })
    }
}
