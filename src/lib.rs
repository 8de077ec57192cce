// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! myUplink-to-MQTT bridge for Home Assistant.
//!
//! Polls the myUplink cloud API for heat-pump telemetry and republishes
//! it over MQTT: retained auto-discovery documents on the first cycle,
//! per-parameter state updates and an availability heartbeat on every
//! cycle. The broker's retained state is the only persistent state this
//! system has.
//!
//! The crate splits into:
//!
//! - [`auth`]: OAuth credentials, token storage, and refresh.
//! - [`api`]: the typed myUplink REST client behind the
//!   [`api::PointSource`] seam.
//! - [`classify`]: parameter name cleaning and Home Assistant entity
//!   classification.
//! - [`discovery`]: discovery document generation and the topic layout.
//! - [`protocol`]: the MQTT connection behind the
//!   [`protocol::StatePublisher`] seam.
//! - [`bridge`]: the poll-process-sleep orchestrator.
//! - [`export`]: one-shot API snapshot export.
//!
//! # Examples
//!
//! ```no_run
//! use myuplink2mqtt::api::MyUplinkClient;
//! use myuplink2mqtt::auth::OAuthSession;
//! use myuplink2mqtt::bridge::BridgeSession;
//! use myuplink2mqtt::config::BridgeConfig;
//! use myuplink2mqtt::protocol::MqttPublisher;
//!
//! # async fn example() -> myuplink2mqtt::Result<()> {
//! let config = BridgeConfig::from_env();
//! let api = MyUplinkClient::new(OAuthSession::from_files()?);
//! let publisher = MqttPublisher::builder()
//!     .host(&config.mqtt_host)
//!     .port(config.mqtt_port)
//!     .build()
//!     .await?;
//!
//! let mut session = BridgeSession::new(api, Some(publisher), &config);
//! session.run(false).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod bridge;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod protocol;

pub use error::{AuthError, Error, ParseError, ProtocolError, Result};
