//! Shared Markdown activity log (`System_Log.md`).
//!
//! The file is a Markdown document containing one activity table. The table
//! is located structurally (header row followed by a separator row), parsed
//! into [`ActivityRow`]s, and re-serialized with the new row first. Lines
//! outside the table are preserved verbatim.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;

use crate::{AppError, Result};

/// Serialization version written into new activity logs.
pub const FORMAT_VERSION: u32 = 1;

const VERSION_MARKER_PREFIX: &str = "<!-- activity-log:v";
const HEADER_CELLS: [&str; 3] = ["Timestamp", "Action", "Details"];

/// Template for a fresh activity log (also the rotation header).
#[must_use]
pub fn default_header() -> String {
    format!(
        "# System Log\n\
         {VERSION_MARKER_PREFIX}{FORMAT_VERSION} -->\n\n\
         Central log for all watcher activity and system events.\n\n\
         ---\n\n\
         ## Activity Log\n\n\
         | Timestamp | Action | Details |\n\
         |-----------|--------|---------|\n\n\
         ---\n\n\
         _New entries are added at the top of the Activity Log table._\n"
    )
}

/// One activity table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRow {
    /// `YYYY-MM-DD HH:MM` local time.
    pub timestamp: String,
    /// Short action label.
    pub action: String,
    /// Free-text details.
    pub details: String,
}

impl ActivityRow {
    /// Row stamped with the current local time.
    #[must_use]
    pub fn now(action: &str, details: &str) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M").to_string(),
            action: action.to_owned(),
            details: details.to_owned(),
        }
    }

    fn render(&self) -> String {
        format!(
            "| {} | {} | {} |",
            escape_cell(&self.timestamp),
            escape_cell(&self.action),
            escape_cell(&self.details)
        )
    }

    fn parse(line: &str) -> Option<Self> {
        let cells = split_cells(line)?;
        match cells.as_slice() {
            [timestamp, action, details] => Some(Self {
                timestamp: timestamp.clone(),
                action: action.clone(),
                details: details.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum TableLine {
    Entry(ActivityRow),
    Raw(String),
}

#[derive(Debug)]
struct ActivityDocument {
    head: Vec<String>,
    rows: Vec<TableLine>,
    tail: Vec<String>,
}

impl ActivityDocument {
    fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();

        if let Some(version) = lines.iter().find_map(|l| parse_version(l)) {
            if version != FORMAT_VERSION {
                return Err(AppError::Io(format!(
                    "unsupported activity log version {version}"
                )));
            }
        }

        let header_idx = lines
            .windows(2)
            .position(|pair| is_header(pair[0]) && is_separator(pair[1]))
            .ok_or_else(|| AppError::Io("activity log table not found".into()))?;
        let body_start = header_idx + 2;
        let body_end = lines[body_start..]
            .iter()
            .position(|l| !l.trim_start().starts_with('|'))
            .map_or(lines.len(), |offset| body_start + offset);

        let rows = lines[body_start..body_end]
            .iter()
            .map(|line| match ActivityRow::parse(line) {
                Some(row) => TableLine::Entry(row),
                None => TableLine::Raw((*line).to_owned()),
            })
            .collect();

        Ok(Self {
            head: lines[..body_start].iter().map(|l| (*l).to_owned()).collect(),
            rows,
            tail: lines[body_end..].iter().map(|l| (*l).to_owned()).collect(),
        })
    }

    fn render(&self) -> String {
        let mut out: Vec<String> = self.head.clone();
        out.extend(self.rows.iter().map(|row| match row {
            TableLine::Entry(entry) => entry.render(),
            TableLine::Raw(raw) => raw.clone(),
        }));
        out.extend(self.tail.iter().cloned());
        let mut text = out.join("\n");
        text.push('\n');
        text
    }
}

/// Handle on the shared activity log file.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    /// Activity log stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `row` as the most recent entry, creating the file from
    /// [`default_header`] when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be read or written, or if
    /// it does not contain a recognizable activity table.
    pub fn record(&self, row: ActivityRow) -> Result<()> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => default_header(),
            Err(err) => return Err(err.into()),
        };
        let mut doc = ActivityDocument::parse(&text)?;
        doc.rows.insert(0, TableLine::Entry(row));
        self.write_atomic(&doc.render())
    }

    /// Parsed entries, most recent first. Missing file yields no entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be parsed.
    pub fn entries(&self) -> Result<Vec<ActivityRow>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let doc = ActivityDocument::parse(&text)?;
        Ok(doc
            .rows
            .into_iter()
            .filter_map(|row| match row {
                TableLine::Entry(entry) => Some(entry),
                TableLine::Raw(_) => None,
            })
            .collect())
    }

    fn write_atomic(&self, content: &str) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| AppError::Io("activity log path has no parent directory".into()))?;
        fs::create_dir_all(parent)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.path).map_err(|err| {
            AppError::Io(format!(
                "failed to persist {}: {}",
                self.path.display(),
                err.error
            ))
        })?;
        Ok(())
    }
}

fn parse_version(line: &str) -> Option<u32> {
    line.trim()
        .strip_prefix(VERSION_MARKER_PREFIX)?
        .strip_suffix("-->")?
        .trim()
        .parse()
        .ok()
}

fn is_header(line: &str) -> bool {
    split_cells(line).is_some_and(|cells| cells == HEADER_CELLS)
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Split a `| a | b | c |` row into unescaped, trimmed cells.
fn split_cells(line: &str) -> Option<Vec<String>> {
    let inner = line.trim().strip_prefix('|')?.strip_suffix('|')?;
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_owned()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_owned());
    Some(cells)
}

fn escape_cell(value: &str) -> String {
    value.replace(['\r', '\n'], " ").replace('|', "\\|")
}
