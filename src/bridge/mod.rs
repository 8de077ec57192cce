// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery and publish orchestration.
//!
//! [`BridgeSession`] drives the poll-process-sleep loop: on the first
//! cycle it publishes one retained discovery document per eligible
//! parameter, and on every cycle it publishes an availability heartbeat
//! per system followed by one state update per eligible parameter.
//! Discovery documents are retained at the broker, so republishing them
//! every cycle would be redundant; the broker itself is the durable
//! store.
//!
//! All loop state (cycle counter, overrides) lives on the session, so
//! the loop is unit-testable with a mock [`PointSource`] and a recording
//! [`StatePublisher`].

use std::time::Duration;

use rumqttc::QoS;

use crate::api::{DeviceIdentity, ParameterRecord, ParameterValue, PointSource};
use crate::classify::normalize_name;
use crate::config::BridgeConfig;
use crate::discovery::{TopicScheme, build_document, document_topic};
use crate::error::Result;
use crate::protocol::StatePublisher;

/// Id of the synthesized installation-date parameter.
pub const INSTALLATION_DATE_ID: &str = "installation_date";

/// Year/month/day component ids when the firmware resolves the labels.
const INSTALL_DATE_SIMPLE: [&str; 3] = ["60726", "60725", "60724"];

/// Fallback component ids, seen as "Text not found" sentinels on older
/// firmware.
const INSTALL_DATE_FALLBACK: [&str; 3] = ["60720", "60719", "60704"];

/// Value marking a parameter as unconfigured on the device.
const NOT_USED: &str = "not used";

/// The poll-loop session.
///
/// Generic over the vendor-API seam and the publish seam; `publisher` is
/// `None` in debug mode, where the bridge logs what it would publish.
pub struct BridgeSession<A, P> {
    api: A,
    publisher: Option<P>,
    topics: TopicScheme,
    poll_interval: Duration,
    send_all: bool,
    cycle: u64,
}

impl<A: PointSource, P: StatePublisher> BridgeSession<A, P> {
    /// Creates a session from a configuration.
    #[must_use]
    pub fn new(api: A, publisher: Option<P>, config: &BridgeConfig) -> Self {
        Self {
            api,
            publisher,
            topics: config.topics(),
            poll_interval: config.poll_interval,
            send_all: config.send_all,
            cycle: 0,
        }
    }

    /// Returns the number of completed poll cycles.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Runs the poll loop until interrupted, or for exactly one cycle in
    /// run-once mode.
    ///
    /// An interrupt is cooperative: the in-flight cycle finishes before
    /// the loop exits. No `offline` is announced on the way out; that is
    /// left to broker-level last-will semantics.
    ///
    /// # Errors
    ///
    /// Currently infallible at this level; per-cycle failures are
    /// logged and retried on the next natural cycle.
    pub async fn run(&mut self, run_once: bool) -> Result<()> {
        self.run_with_shutdown(run_once, tokio::signal::ctrl_c())
            .await
    }

    /// Runs the poll loop with an explicit shutdown future.
    ///
    /// The shutdown future is pinned before the first cycle and polled
    /// while cycles are in flight, so an interrupt arriving mid-cycle is
    /// observed and the cycle still completes before the loop exits.
    ///
    /// # Errors
    ///
    /// Currently infallible at this level; per-cycle failures are
    /// logged and retried on the next natural cycle.
    pub async fn run_with_shutdown<F>(&mut self, run_once: bool, shutdown: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        if run_once {
            tracing::info!("Running in single-cycle mode");
        } else {
            tracing::info!(
                interval_secs = self.poll_interval.as_secs(),
                "Starting main loop"
            );
        }

        let mut shutdown = std::pin::pin!(shutdown);
        let mut interrupted = false;

        loop {
            {
                let mut cycle = std::pin::pin!(self.run_cycle());
                loop {
                    tokio::select! {
                        () = &mut cycle => break,
                        _ = &mut shutdown, if !interrupted => {
                            interrupted = true;
                            tracing::info!("Shutdown requested, finishing in-flight cycle");
                        }
                    }
                }
            }
            tracing::info!(cycle = self.cycle, "Poll cycle complete");

            if interrupted {
                break;
            }
            if run_once {
                tracing::info!("Single cycle complete, exiting");
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Executes one poll cycle.
    ///
    /// Discovery documents go out only on the first cycle; a failed
    /// systems fetch skips the whole cycle, a failed device fetch skips
    /// that device only.
    pub async fn run_cycle(&mut self) {
        self.cycle += 1;
        let send_discovery = self.cycle == 1;
        tracing::debug!(cycle = self.cycle, "Starting poll cycle");

        if send_discovery && self.publisher.is_some() {
            tracing::info!("First cycle: sending discovery messages (retained at broker)");
        }

        let systems = match self.api.get_systems().await {
            Ok(systems) => systems,
            Err(e) => {
                tracing::error!(error = %e, "Failed to retrieve systems, skipping cycle");
                return;
            }
        };
        tracing::debug!(count = systems.len(), "Retrieved systems");

        for system in &systems {
            tracing::debug!(
                system = %system.name,
                id = %system.system_id,
                devices = system.devices.len(),
                "Processing system"
            );
            for device in &system.devices {
                self.process_device(&system.system_id, &device.id, send_discovery)
                    .await;
            }
        }
    }

    /// Processes one device: fetch, synthesize, classify, publish.
    ///
    /// Returns `false` when the device had to be skipped for this cycle.
    async fn process_device(
        &self,
        system_id: &str,
        device_id: &str,
        send_discovery: bool,
    ) -> bool {
        let details = match self.api.get_device_details(device_id).await {
            Ok(details) => details,
            Err(e) => {
                tracing::error!(device = %device_id, error = %e, "Could not retrieve device details");
                return false;
            }
        };
        let identity = DeviceIdentity::from_details(device_id, &details);
        tracing::debug!(device = %identity.name, id = %device_id, "Processing device");

        let points = match self.api.get_device_points(device_id, None, None).await {
            Ok(points) => points,
            Err(e) => {
                tracing::error!(device = %device_id, error = %e, "Could not retrieve data points");
                return false;
            }
        };
        tracing::debug!(count = points.len(), "Retrieved data points");

        // Heartbeat before any parameter state for this system.
        self.publish(&self.topics.availability_topic(system_id), "online")
            .await;

        let mut discovery_sent = 0usize;
        let mut states_published = 0usize;

        let installation_date = synthesize_installation_date(&points);
        let records = installation_date.iter().chain(
            points
                .iter()
                .filter(|p| !is_installation_date_component(&p.id)),
        );

        for record in records {
            if !should_send(record, self.send_all) {
                tracing::debug!(parameter = %record.id, "Skipping unused parameter");
                continue;
            }

            if send_discovery
                && self
                    .publish_discovery(system_id, &identity, record)
                    .await
            {
                discovery_sent += 1;
            }

            let state_topic = self.topics.state_topic(system_id, &record.id);
            if self.publish(&state_topic, &state_payload(record)).await {
                states_published += 1;
            }
        }

        if send_discovery {
            tracing::info!(
                device = %identity.name,
                count = discovery_sent,
                "Sent discovery configs (retained at broker)"
            );
        }
        tracing::debug!(count = states_published, "Published state updates");
        true
    }

    /// Publishes one discovery document. Failures are logged and skip
    /// only this parameter.
    async fn publish_discovery(
        &self,
        system_id: &str,
        identity: &DeviceIdentity,
        record: &ParameterRecord,
    ) -> bool {
        let doc = build_document(&self.topics, system_id, identity, record);
        let topic = document_topic(&self.topics, &identity.id, record);
        tracing::debug!(topic = %topic, payload = %doc.to_json(), "Discovery payload");
        self.publish(&topic, &doc.to_json()).await
    }

    /// Publishes a retained QoS 1 message, logging instead of raising on
    /// failure. Returns whether the publish was accepted.
    async fn publish(&self, topic: &str, payload: &str) -> bool {
        let Some(ref publisher) = self.publisher else {
            tracing::debug!(topic = %topic, payload = %payload, "Would publish (debug mode)");
            return false;
        };
        match publisher
            .publish(topic, payload, QoS::AtLeastOnce, true)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Publish failed");
                false
            }
        }
    }
}

/// Decides whether a parameter is published at all.
///
/// Parameters reporting "not used" (in the value or in the API's string
/// rendering) are dropped unless the send-all override is active.
#[must_use]
pub fn should_send(record: &ParameterRecord, send_all: bool) -> bool {
    if send_all {
        return true;
    }
    if record.value.render().eq_ignore_ascii_case(NOT_USED) {
        return false;
    }
    if record
        .str_val
        .as_deref()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case(NOT_USED))
    {
        return false;
    }
    true
}

/// Renders the state payload for a parameter.
///
/// Enum parameters publish the cleaned label matching the current value
/// (floats truncated to integer strings for the comparison); an
/// unmatched value falls back to the raw rendering.
#[must_use]
pub fn state_payload(record: &ParameterRecord) -> String {
    if record.has_enum_values() {
        let key = record.value.enum_key();
        for entry in &record.enum_values {
            if entry.value == key {
                let label = normalize_name(&entry.text);
                if !label.is_empty() {
                    return label;
                }
            }
        }
    }
    record.value.render()
}

/// Returns whether an id belongs to either installation-date component
/// triple. Matching raw components are excluded from the generic
/// parameter loop so they are not reported twice.
#[must_use]
pub fn is_installation_date_component(parameter_id: &str) -> bool {
    INSTALL_DATE_SIMPLE.contains(&parameter_id) || INSTALL_DATE_FALLBACK.contains(&parameter_id)
}

/// Synthesizes the installation-date virtual parameter.
///
/// Each of year, month, and day is looked up first in the simple id set,
/// then in the text-not-found fallback set. The virtual parameter is
/// only produced when all three components resolve to integers.
#[must_use]
pub fn synthesize_installation_date(points: &[ParameterRecord]) -> Option<ParameterRecord> {
    let component = |idx: usize| -> Option<i64> {
        let find = |id: &str| points.iter().find(|p| p.id == id);
        find(INSTALL_DATE_SIMPLE[idx])
            .or_else(|| find(INSTALL_DATE_FALLBACK[idx]))
            .and_then(|p| p.value.as_int())
    };

    let year = component(0)?;
    let month = component(1)?;
    let day = component(2)?;

    Some(ParameterRecord::virtual_parameter(
        INSTALLATION_DATE_ID,
        "Installation date",
        ParameterValue::Text(format!("{year:04}-{month:02}-{day:02}")),
    ))
}
