//! OAuth access tokens with refresh, backed by a JSON token file.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, info_span, Instrument};

use crate::{AppError, Result};

/// Refresh this many seconds before the recorded expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}

/// Persisted token set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    /// Bearer token presented to the mail server.
    #[serde(alias = "token")]
    pub access_token: String,
    /// Long-lived token exchanged for new access tokens.
    pub refresh_token: String,
    /// Expiry of `access_token`; unknown expiry forces a refresh.
    #[serde(default, alias = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl OAuthToken {
    /// Whether the access token must be refreshed at `now`.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_empty()
            || self
                .expires_at
                .is_none_or(|expiry| expiry - Duration::seconds(REFRESH_MARGIN_SECS) <= now)
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Supplies valid access tokens, refreshing and re-saving the token file
/// when the current one is about to expire.
#[derive(Debug, Clone)]
pub struct OAuthTokenProvider {
    path: PathBuf,
    token: OAuthToken,
    client: reqwest::Client,
}

impl OAuthTokenProvider {
    /// Load the token file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigurationMissing` if the file does not exist,
    /// or `AppError::Config` if it cannot be parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ConfigurationMissing(format!(
                    "oauth token file {} not found",
                    path.display()
                )));
            }
            Err(err) => {
                return Err(AppError::Config(format!(
                    "failed to read oauth token file {}: {err}",
                    path.display()
                )));
            }
        };
        let token: OAuthToken = serde_json::from_str(&raw)
            .map_err(|err| AppError::Config(format!("invalid oauth token file: {err}")))?;
        Ok(Self {
            path,
            token,
            client: reqwest::Client::new(),
        })
    }

    /// A usable access token, refreshing first if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` if the refresh request fails or is rejected.
    pub async fn access_token(&mut self) -> Result<String> {
        if self.token.needs_refresh(Utc::now()) {
            let span = info_span!("oauth_refresh", uri = %self.token.token_uri);
            self.refresh().instrument(span).await?;
        }
        Ok(self.token.access_token.clone())
    }

    async fn refresh(&mut self) -> Result<()> {
        let response = self
            .client
            .post(&self.token.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.token.refresh_token.as_str()),
                ("client_id", self.token.client_id.as_str()),
                ("client_secret", self.token.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "token refresh rejected ({status}): {body}"
            )));
        }

        let refreshed: RefreshResponse = response.json().await?;
        self.token.access_token = refreshed.access_token;
        self.token.expires_at = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(rotated) = refreshed.refresh_token {
            self.token.refresh_token = rotated;
        }
        self.save()?;
        info!("oauth access token refreshed");
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| AppError::Io("token path has no parent directory".into()))?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut tmp, &self.token)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|err| AppError::Io(format!("failed to persist token file: {}", err.error)))?;
        Ok(())
    }
}
