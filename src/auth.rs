// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OAuth credential and token handling for the myUplink API.
//!
//! Client credentials come from `~/.myUplink_API_Config.json` or the
//! `MYUPLINK_CLIENT_ID`/`MYUPLINK_CLIENT_SECRET` environment variables;
//! the token lives in `~/.myUplink_API_Token.json` and is written back
//! whenever a refresh succeeds. Obtaining the initial token is out of
//! scope; the bridge refuses to start without one.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::AuthError;

/// myUplink API base URL.
pub const API_BASE: &str = "https://api.myuplink.com";

const CONFIG_FILE_NAME: &str = ".myUplink_API_Config.json";
const TOKEN_FILE_NAME: &str = ".myUplink_API_Token.json";

/// Seconds of remaining validity below which the token is refreshed
/// before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth client credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

/// A stored OAuth token, in the shape the token endpoint returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Bearer access token.
    pub access_token: String,
    /// Refresh token, present for authorization-code grants.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token type, normally `bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Validity in seconds at issue time.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry as a Unix timestamp, filled in when saving.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl OAuthToken {
    /// Returns whether the token is expired or about to expire.
    ///
    /// Tokens without expiry metadata are treated as live; a 401 from the
    /// API still forces a refresh.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at - Utc::now().timestamp() < EXPIRY_MARGIN_SECS)
    }
}

/// Path of the client credentials file.
#[must_use]
pub fn config_path() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(CONFIG_FILE_NAME)
}

/// Path of the token file.
#[must_use]
pub fn token_path() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(TOKEN_FILE_NAME)
}

/// Loads client credentials from the environment or the config file.
///
/// Environment variables override file values.
///
/// # Errors
///
/// Returns [`AuthError::MissingCredentials`] when neither source provides
/// both values, or [`AuthError::InvalidFile`] when the file exists but is
/// not valid JSON.
pub fn load_credentials() -> Result<ClientCredentials, AuthError> {
    let path = config_path();

    let mut from_file: Option<ClientCredentials> = None;
    if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        from_file = Some(serde_json::from_str(&contents).map_err(|source| {
            AuthError::InvalidFile {
                path: path.display().to_string(),
                source,
            }
        })?);
    }

    let client_id = std::env::var("MYUPLINK_CLIENT_ID")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| from_file.as_ref().map(|c| c.client_id.clone()));
    let client_secret = std::env::var("MYUPLINK_CLIENT_SECRET")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| from_file.as_ref().map(|c| c.client_secret.clone()));

    match (client_id, client_secret) {
        (Some(client_id), Some(client_secret))
            if !client_id.is_empty() && !client_secret.is_empty() =>
        {
            Ok(ClientCredentials {
                client_id,
                client_secret,
            })
        }
        _ => Err(AuthError::MissingCredentials {
            config_path: path.display().to_string(),
        }),
    }
}

/// Loads the stored OAuth token.
///
/// # Errors
///
/// Returns [`AuthError::MissingToken`] when the file does not exist.
pub fn load_token() -> Result<OAuthToken, AuthError> {
    let path = token_path();
    if !path.exists() {
        return Err(AuthError::MissingToken {
            token_path: path.display().to_string(),
        });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_json::from_str(&contents).map_err(|source| AuthError::InvalidFile {
        path: path.display().to_string(),
        source,
    })
}

/// Checks that both credentials and a token are available.
///
/// Called before any connection attempt so a misconfigured install fails
/// with an actionable message instead of a mid-loop surprise.
///
/// # Errors
///
/// Returns the first missing prerequisite.
pub fn check_prerequisites() -> Result<(), AuthError> {
    load_credentials()?;
    if !token_path().exists() {
        return Err(AuthError::MissingToken {
            token_path: token_path().display().to_string(),
        });
    }
    Ok(())
}

/// An authorized API session that refreshes and persists its token.
pub struct OAuthSession {
    http: reqwest::Client,
    credentials: ClientCredentials,
    token_url: String,
    token_file: Option<PathBuf>,
    token: RwLock<OAuthToken>,
}

impl OAuthSession {
    /// Creates a session from the on-disk credential and token files.
    ///
    /// # Errors
    ///
    /// Returns error when a prerequisite is missing or the HTTP client
    /// cannot be built.
    pub fn from_files() -> Result<Self, AuthError> {
        let credentials = load_credentials()?;
        let token = load_token()?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        Ok(Self {
            http,
            credentials,
            token_url: format!("{API_BASE}/oauth/token"),
            token_file: Some(token_path()),
            token: RwLock::new(token),
        })
    }

    /// Creates a session with explicit parts, without touching the
    /// filesystem. The refreshed token is not persisted.
    #[must_use]
    pub fn with_token(
        credentials: ClientCredentials,
        token: OAuthToken,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            token_url: token_url.into(),
            token_file: None,
            token: RwLock::new(token),
        }
    }

    /// Returns the HTTP client the session authorizes.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns the current bearer token.
    pub async fn bearer(&self) -> String {
        self.token.read().await.access_token.clone()
    }

    /// Returns whether the current token should be refreshed before use.
    pub async fn needs_refresh(&self) -> bool {
        self.token.read().await.needs_refresh()
    }

    /// Refreshes the token and persists the result.
    ///
    /// # Errors
    ///
    /// Returns error when no refresh token is stored or the token
    /// endpoint rejects the request.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let refresh_token = self
            .token
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::RefreshFailed("no refresh token stored".to_string()))?;

        tracing::debug!(url = %self.token_url, "Refreshing OAuth token");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }

        let mut new_token: OAuthToken = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        if new_token.refresh_token.is_none() {
            new_token.refresh_token = Some(refresh_token);
        }
        new_token.expires_at = new_token
            .expires_in
            .map(|secs| Utc::now().timestamp() + secs);

        if let Some(ref path) = self.token_file {
            let contents = serde_json::to_string(&new_token)
                .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
            std::fs::write(path, contents)?;
            tracing::info!(path = %path.display(), "Token refreshed and saved to file");
        } else {
            tracing::info!("Token refreshed");
        }

        *self.token.write().await = new_token;
        Ok(())
    }
}

impl std::fmt::Debug for OAuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSession")
            .field("token_url", &self.token_url)
            .field("client_id", &self.credentials.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: Option<i64>) -> OAuthToken {
        OAuthToken {
            access_token: "abc".to_string(),
            refresh_token: Some("def".to_string()),
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
            expires_at,
        }
    }

    #[test]
    fn token_without_expiry_is_live() {
        assert!(!token(None).needs_refresh());
    }

    #[test]
    fn token_near_expiry_needs_refresh() {
        let soon = Utc::now().timestamp() + 10;
        assert!(token(Some(soon)).needs_refresh());
    }

    #[test]
    fn token_with_remaining_validity_is_live() {
        let later = Utc::now().timestamp() + 3600;
        assert!(!token(Some(later)).needs_refresh());
    }

    #[test]
    fn token_round_trips_through_json() {
        let t = token(Some(1_700_000_000));
        let json = serde_json::to_string(&t).unwrap();
        let back: OAuthToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_token, "abc");
        assert_eq!(back.expires_at, Some(1_700_000_000));
    }

    #[test]
    fn paths_end_with_expected_file_names() {
        assert!(config_path().ends_with(".myUplink_API_Config.json"));
        assert!(token_path().ends_with(".myUplink_API_Token.json"));
    }
}
