// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the myUplink-to-MQTT bridge.
//!
//! This module provides the error hierarchy for handling failures across
//! the crate: OAuth setup, protocol communication (HTTP/MQTT), and
//! response parsing.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// OAuth credentials or token could not be loaded or refreshed.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing an API response.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Writing the API snapshot file failed.
    #[error("export failed: {0}")]
    Export(#[from] std::io::Error),
}

/// Errors raised while establishing an authorized API session.
///
/// These are setup-phase failures: the bridge exits non-zero before
/// entering the poll loop when one of them occurs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Client credentials were found in neither the config file nor the
    /// environment.
    #[error(
        "client credentials not found; set MYUPLINK_CLIENT_ID and \
         MYUPLINK_CLIENT_SECRET, or create {config_path} with \
         {{\"client_id\": \"...\", \"client_secret\": \"...\"}}"
    )]
    MissingCredentials {
        /// Path of the config file that was checked.
        config_path: String,
    },

    /// The OAuth token file does not exist.
    #[error("OAuth token file not found: {token_path}; obtain a token first")]
    MissingToken {
        /// Path of the token file that was checked.
        token_path: String,
    },

    /// A config or token file exists but is not valid JSON.
    #[error("could not parse {path}: {source}")]
    InvalidFile {
        /// Path of the unparsable file.
        path: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing a credential file failed.
    #[error("credential file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The token endpoint rejected the refresh request.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
}

/// Errors related to protocol communication (HTTP/MQTT).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT connection or communication failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The API answered with a non-success status code.
    #[error("unexpected HTTP status {status} from {url}")]
    Status {
        /// The status code that was returned.
        status: u16,
        /// The request URL.
        url: String,
    },

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors related to parsing myUplink API responses.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// Failed to interpret a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_names_both_remedies() {
        let err = AuthError::MissingCredentials {
            config_path: "~/.myUplink_API_Config.json".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("MYUPLINK_CLIENT_ID"));
        assert!(msg.contains("~/.myUplink_API_Config.json"));
    }

    #[test]
    fn status_error_display() {
        let err = ProtocolError::Status {
            status: 503,
            url: "https://api.myuplink.com/v2/systems/me".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected HTTP status 503 from https://api.myuplink.com/v2/systems/me"
        );
    }

    #[test]
    fn error_from_auth_error() {
        let auth = AuthError::MissingToken {
            token_path: "/home/x/.myUplink_API_Token.json".to_string(),
        };
        let err: Error = auth.into();
        assert!(matches!(err, Error::Auth(AuthError::MissingToken { .. })));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::MissingField("parameterId".to_string());
        assert_eq!(err.to_string(), "missing field in response: parameterId");
    }
}
