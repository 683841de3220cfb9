//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::classify::{ActionClassifier, ActionRule};
use crate::mail::{MailAuth, OAuthTokenProvider};
use crate::oplog::{self, LogTarget};
use crate::poll::LoopTiming;
use crate::{AppError, Result};

/// Keyring service name holding mailbox credentials.
pub const KEYRING_SERVICE: &str = "inbox-relay";

fn validate_timing(section: &str, interval_seconds: u64, backoff_seconds: u64) -> Result<()> {
    if interval_seconds == 0 {
        return Err(AppError::Config(format!(
            "{section}.interval_seconds must be greater than zero"
        )));
    }
    if backoff_seconds <= interval_seconds {
        return Err(AppError::Config(format!(
            "{section}.backoff_seconds ({backoff_seconds}) must be longer than \
             {section}.interval_seconds ({interval_seconds})"
        )));
    }
    Ok(())
}

/// Drop-folder watcher settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct FilesConfig {
    /// Seconds between ticks.
    pub interval_seconds: u64,
    /// Seconds to wait after a failed tick; must exceed the interval.
    pub backoff_seconds: u64,
    /// Label naming the drop folder inside task records.
    pub inbox_label: String,
    /// Optional seen-set snapshot for dedup across restarts.
    pub seen_store: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            backoff_seconds: 10,
            inbox_label: "Inbox".into(),
            seen_store: None,
        }
    }
}

impl FilesConfig {
    /// Loop timing for these settings.
    #[must_use]
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::from_secs(self.interval_seconds, self.backoff_seconds)
    }
}

/// Mailbox watcher settings.
///
/// Secrets are never read from the TOML file; see
/// [`MailConfig::resolve_auth`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct MailConfig {
    /// Seconds between ticks.
    pub interval_seconds: u64,
    /// Seconds to wait after a failed tick; must exceed the interval.
    pub backoff_seconds: u64,
    /// IMAP host.
    pub host: String,
    /// IMAP port.
    pub port: u16,
    /// Account name; `GMAIL_USER` or the keychain may supply it instead.
    pub user: Option<String>,
    /// OAuth token file; selects OAuth when present.
    pub token_path: Option<PathBuf>,
    /// Optional seen-set snapshot for dedup across restarts.
    pub seen_store: Option<PathBuf>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            backoff_seconds: 120,
            host: "imap.gmail.com".into(),
            port: 993,
            user: None,
            token_path: None,
            seen_store: None,
        }
    }
}

impl MailConfig {
    /// Loop timing for these settings.
    #[must_use]
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::from_secs(self.interval_seconds, self.backoff_seconds)
    }

    /// Apply `GMAIL_IMAP_SERVER`, `GMAIL_IMAP_PORT`, and `GMAIL_TOKEN_PATH`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `GMAIL_IMAP_PORT` is not a port number.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(host) = non_empty_env("GMAIL_IMAP_SERVER") {
            self.host = host;
        }
        if let Some(port) = non_empty_env("GMAIL_IMAP_PORT") {
            self.port = port
                .parse()
                .map_err(|err| AppError::Config(format!("GMAIL_IMAP_PORT invalid: {err}")))?;
        }
        if let Some(path) = non_empty_env("GMAIL_TOKEN_PATH") {
            self.token_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Resolve the live mailbox authentication scheme.
    ///
    /// A configured token path selects OAuth; otherwise an app password is
    /// loaded from the OS keychain, then from `GMAIL_APP_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigurationMissing` when no user or secret can
    /// be found, or `AppError::Config` if the token file is invalid.
    pub async fn resolve_auth(&self) -> Result<MailAuth> {
        let user = match &self.user {
            Some(user) if !user.is_empty() => user.clone(),
            _ => load_credential("gmail_user", "GMAIL_USER").await?,
        };

        if let Some(path) = &self.token_path {
            let provider = OAuthTokenProvider::load(path)?;
            return Ok(MailAuth::OAuth { user, provider });
        }

        let password = load_credential("gmail_app_password", "GMAIL_APP_PASSWORD").await?;
        Ok(MailAuth::AppPassword { user, password })
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Seconds between ticks.
    pub interval_seconds: u64,
    /// Seconds to wait after a failed tick; must exceed the interval.
    pub backoff_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600,
            backoff_seconds: 7200,
        }
    }
}

impl SchedulerConfig {
    /// Loop timing for these settings.
    #[must_use]
    pub fn timing(&self) -> LoopTiming {
        LoopTiming::from_secs(self.interval_seconds, self.backoff_seconds)
    }
}

/// Log rotation settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct RotationConfig {
    /// Size at or above which a log is rotated.
    pub max_bytes: u64,
    /// Logs to inspect; empty means every log this crate writes.
    pub targets: Vec<LogTarget>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_bytes: oplog::rotation::DEFAULT_MAX_BYTES,
            targets: Vec::new(),
        }
    }
}

/// Classifier override.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct ClassifierConfig {
    /// Replacement rule table; empty keeps the built-in rules.
    pub rules: Vec<ActionRule>,
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Vault root; relative directories resolve against it.
    pub root: PathBuf,
    /// Drop folder; defaults to `<root>/Inbox`.
    pub inbox_dir: Option<PathBuf>,
    /// Task queue; defaults to `<root>/Needs_Action`.
    pub queue_dir: Option<PathBuf>,
    /// Operational logs; defaults to `<root>/Logs`.
    pub logs_dir: Option<PathBuf>,
    /// Drop-folder watcher.
    pub files: FilesConfig,
    /// Mailbox watcher.
    pub mail: MailConfig,
    /// Plan scheduler.
    pub scheduler: SchedulerConfig,
    /// Log rotation.
    pub rotation: RotationConfig,
    /// Action classification.
    pub classifier: ClassifierConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            inbox_dir: None,
            queue_dir: None,
            logs_dir: None,
            files: FilesConfig::default(),
            mail: MailConfig::default(),
            scheduler: SchedulerConfig::default(),
            rotation: RotationConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Drop folder watched by the file watcher.
    #[must_use]
    pub fn inbox_dir(&self) -> PathBuf {
        self.resolve(self.inbox_dir.as_deref(), "Inbox")
    }

    /// Queue directory receiving task records.
    #[must_use]
    pub fn queue_dir(&self) -> PathBuf {
        self.resolve(self.queue_dir.as_deref(), "Needs_Action")
    }

    /// Directory holding error and activity logs.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.resolve(self.logs_dir.as_deref(), "Logs")
    }

    /// Logs inspected by the rotator.
    #[must_use]
    pub fn rotation_targets(&self) -> Vec<LogTarget> {
        if self.rotation.targets.is_empty() {
            return oplog::default_targets(&self.logs_dir());
        }
        self.rotation
            .targets
            .iter()
            .map(|target| LogTarget {
                path: self.resolve(Some(&target.path), ""),
                header: target.header.clone(),
            })
            .collect()
    }

    /// Classifier built from the configured rules.
    #[must_use]
    pub fn classifier(&self) -> ActionClassifier {
        if self.classifier.rules.is_empty() {
            ActionClassifier::default()
        } else {
            ActionClassifier::new(self.classifier.rules.clone())
        }
    }

    fn resolve(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.root.join(path),
            None => self.root.join(default_name),
        }
    }

    fn validate(&self) -> Result<()> {
        validate_timing(
            "files",
            self.files.interval_seconds,
            self.files.backoff_seconds,
        )?;
        validate_timing("mail", self.mail.interval_seconds, self.mail.backoff_seconds)?;
        validate_timing(
            "scheduler",
            self.scheduler.interval_seconds,
            self.scheduler.backoff_seconds,
        )?;

        if self.rotation.max_bytes == 0 {
            return Err(AppError::Config(
                "rotation.max_bytes must be greater than zero".into(),
            ));
        }

        for (index, rule) in self.classifier.rules.iter().enumerate() {
            if rule.keywords.iter().all(|kw| kw.trim().is_empty()) {
                return Err(AppError::Config(format!(
                    "classifier rule {index} has no keywords"
                )));
            }
        }

        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            debug!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    non_empty_env(env_key).ok_or_else(|| {
        AppError::ConfigurationMissing(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}
