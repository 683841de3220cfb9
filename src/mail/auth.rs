//! Mailbox authentication schemes.

use std::fmt;

use super::oauth::OAuthTokenProvider;
use crate::Result;

/// Credential handed to the transport for one login.
#[derive(Clone, PartialEq, Eq)]
pub enum MailCredential {
    /// Shared-secret login (`LOGIN user password`).
    Password {
        /// Account name.
        user: String,
        /// App password.
        password: String,
    },
    /// SASL `XOAUTH2` bearer login.
    XOAuth2 {
        /// Account name.
        user: String,
        /// Current access token.
        access_token: String,
    },
}

impl MailCredential {
    /// Account name for either scheme.
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::Password { user, .. } | Self::XOAuth2 { user, .. } => user,
        }
    }

    /// Unencoded SASL `XOAUTH2` initial response, for bearer credentials.
    #[must_use]
    pub fn xoauth2_response(&self) -> Option<String> {
        match self {
            Self::XOAuth2 { user, access_token } => {
                Some(format!("user={user}\x01auth=Bearer {access_token}\x01\x01"))
            }
            Self::Password { .. } => None,
        }
    }
}

impl fmt::Debug for MailCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Self::XOAuth2 { user, .. } => f
                .debug_struct("XOAuth2")
                .field("user", user)
                .field("access_token", &"<redacted>")
                .finish(),
        }
    }
}

/// Configured authentication scheme for the live mailbox.
#[derive(Clone)]
pub enum MailAuth {
    /// Static app password.
    AppPassword {
        /// Account name.
        user: String,
        /// App password.
        password: String,
    },
    /// OAuth token file with refresh.
    OAuth {
        /// Account name.
        user: String,
        /// Token source.
        provider: OAuthTokenProvider,
    },
}

impl fmt::Debug for MailAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailAuth")
            .field("scheme", &self.scheme())
            .field("user", &self.user())
            .finish_non_exhaustive()
    }
}

impl MailAuth {
    /// Account name.
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::AppPassword { user, .. } | Self::OAuth { user, .. } => user,
        }
    }

    /// Scheme label for logs.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::AppPassword { .. } => "app_password",
            Self::OAuth { .. } => "oauth",
        }
    }

    /// Credential for the next login, refreshing the OAuth token if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` if an OAuth refresh fails.
    pub async fn credential(&mut self) -> Result<MailCredential> {
        match self {
            Self::AppPassword { user, password } => Ok(MailCredential::Password {
                user: user.clone(),
                password: password.clone(),
            }),
            Self::OAuth { user, provider } => {
                let access_token = provider.access_token().await?;
                Ok(MailCredential::XOAuth2 {
                    user: user.clone(),
                    access_token,
                })
            }
        }
    }
}
