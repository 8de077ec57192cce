// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! myUplink REST API client.
//!
//! The orchestrator only depends on the [`PointSource`] trait: systems,
//! device details, and device points. [`MyUplinkClient`] implements it on
//! top of an [`OAuthSession`], refreshing the token once on a 401 and
//! otherwise mapping non-success statuses to errors.

mod model;

pub use model::{
    DeviceDetails, DeviceIdentity, DeviceRef, EnumValue, ParameterRecord, ParameterValue, Product,
    System, SystemsResponse,
};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::auth::{API_BASE, OAuthSession};
use crate::error::{Error, ProtocolError, Result};

/// Default language for parameter labels.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// The vendor-API seam the orchestrator polls through.
///
/// Implemented by [`MyUplinkClient`] and by mocks in tests.
pub trait PointSource: Send + Sync {
    /// Retrieves the systems assigned to the authorized user.
    fn get_systems(&self) -> impl Future<Output = Result<Vec<System>>> + Send;

    /// Retrieves detailed information for a device.
    fn get_device_details(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<DeviceDetails>> + Send;

    /// Retrieves data points for a device, optionally restricted to
    /// specific parameter ids.
    fn get_device_points(
        &self,
        device_id: &str,
        parameters: Option<&[String]>,
        language: Option<&str>,
    ) -> impl Future<Output = Result<Vec<ParameterRecord>>> + Send;
}

/// HTTP client for the myUplink v2 API.
pub struct MyUplinkClient {
    session: OAuthSession,
    base_url: String,
}

impl MyUplinkClient {
    /// Creates a client against the production API.
    #[must_use]
    pub fn new(session: OAuthSession) -> Self {
        Self {
            session,
            base_url: API_BASE.to_string(),
        }
    }

    /// Creates a client against a custom base URL. Used by tests.
    #[must_use]
    pub fn with_base_url(session: OAuthSession, base_url: impl Into<String>) -> Self {
        Self {
            session,
            base_url: base_url.into(),
        }
    }

    /// Performs an authorized GET, refreshing the token once on a 401.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        if self.session.needs_refresh().await {
            self.session.refresh().await?;
        }

        let mut response = self.authorized_get(url).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(url = %url, "Got 401, refreshing token and retrying");
            self.session.refresh().await?;
            response = self.authorized_get(url).await?;
        }

        let status = response.status();
        if !status.is_success() {
            tracing::error!(url = %url, status = %status, "API request failed");
            return Err(Error::Protocol(ProtocolError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }));
        }

        Ok(response
            .json::<T>()
            .await
            .map_err(ProtocolError::Http)?)
    }

    async fn authorized_get(&self, url: &str) -> Result<reqwest::Response> {
        let bearer = self.session.bearer().await;
        Ok(self
            .session
            .http()
            .get(url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(ProtocolError::Http)?)
    }
}

impl PointSource for MyUplinkClient {
    async fn get_systems(&self) -> Result<Vec<System>> {
        let url = format!("{}/v2/systems/me", self.base_url);
        let response: SystemsResponse = self.get_json(&url).await?;
        Ok(response.systems)
    }

    async fn get_device_details(&self, device_id: &str) -> Result<DeviceDetails> {
        let url = format!("{}/v2/devices/{device_id}", self.base_url);
        self.get_json(&url).await
    }

    async fn get_device_points(
        &self,
        device_id: &str,
        parameters: Option<&[String]>,
        language: Option<&str>,
    ) -> Result<Vec<ParameterRecord>> {
        let mut url = format!("{}/v2/devices/{device_id}/points", self.base_url);

        let mut query = Vec::new();
        if let Some(ids) = parameters {
            if !ids.is_empty() {
                query.push(format!("parameters={}", ids.join(",")));
            }
        }
        query.push(format!(
            "language={}",
            language.unwrap_or(DEFAULT_LANGUAGE)
        ));
        url.push('?');
        url.push_str(&query.join("&"));

        self.get_json(&url).await
    }
}

impl std::fmt::Debug for MyUplinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MyUplinkClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
