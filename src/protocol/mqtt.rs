// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection for the bridge.
//!
//! The connection runs its own background event-loop task; the poll loop
//! only calls [`StatePublisher::publish`], which enqueues without blocking
//! materially. Message ordering per topic follows publish-call order.
//!
//! The bridge never announces `offline` itself: availability is set
//! `online` on every successful cycle and going-away semantics are left
//! to broker-level last-will handling.
//!
//! # Examples
//!
//! ```no_run
//! use myuplink2mqtt::protocol::{MqttPublisher, StatePublisher};
//! use rumqttc::QoS;
//!
//! # async fn example() -> myuplink2mqtt::Result<()> {
//! let publisher = MqttPublisher::builder()
//!     .host("10.0.0.2")
//!     .port(1883)
//!     .credentials("user", "password")
//!     .build()
//!     .await?;
//!
//! publisher
//!     .publish("myuplink/sys-1/available", "online", QoS::AtLeastOnce, true)
//!     .await?;
//! publisher.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::error::ProtocolError;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The publish seam the orchestrator depends on.
///
/// Implemented by [`MqttPublisher`] for the real broker and by recording
/// mocks in tests.
pub trait StatePublisher: Send + Sync {
    /// Publishes a payload to a topic.
    fn publish(
        &self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}

/// Connection parameters for the broker.
#[derive(Debug, Clone)]
struct MqttPublisherConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    client_id_prefix: String,
    keep_alive: Duration,
    connection_timeout: Duration,
}

impl Default for MqttPublisherConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            client_id_prefix: "myuplink2mqtt".to_string(),
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// A connected MQTT publisher.
///
/// Cheaply cloneable via `Arc`; the event loop runs in a spawned task for
/// the lifetime of the connection.
#[derive(Clone)]
pub struct MqttPublisher {
    inner: Arc<MqttPublisherInner>,
}

struct MqttPublisherInner {
    client: AsyncClient,
    config: MqttPublisherConfig,
    connected: AtomicBool,
    /// Channel receiving topics of incoming messages during a retained
    /// scan; `None` outside scan mode.
    scan_tx: RwLock<Option<mpsc::Sender<String>>>,
}

impl MqttPublisher {
    /// Creates a builder for a broker connection.
    #[must_use]
    pub fn builder() -> MqttPublisherBuilder {
        MqttPublisherBuilder::default()
    }

    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Collects topics of retained messages matching the given filters.
    ///
    /// Subscribes to each filter, listens for the scan window, then
    /// unsubscribes. Used by the clearing utility to find every config
    /// and value topic this bridge ever published.
    ///
    /// # Errors
    ///
    /// Returns error if a subscription fails.
    pub async fn collect_retained_topics(
        &self,
        filters: &[String],
        window: Duration,
    ) -> Result<Vec<String>, ProtocolError> {
        let (tx, mut rx) = mpsc::channel::<String>(256);
        *self.inner.scan_tx.write().await = Some(tx);

        for filter in filters {
            self.inner
                .client
                .subscribe(filter, QoS::AtLeastOnce)
                .await
                .map_err(ProtocolError::Mqtt)?;
        }
        tracing::debug!(filters = ?filters, "Scanning for retained topics");

        let mut topics = Vec::new();
        let collect = async {
            while let Some(topic) = rx.recv().await {
                if !topics.contains(&topic) {
                    topics.push(topic);
                }
            }
        };
        let _ = tokio::time::timeout(window, collect).await;

        *self.inner.scan_tx.write().await = None;
        for filter in filters {
            let _ = self.inner.client.unsubscribe(filter).await;
        }

        tracing::info!(count = topics.len(), "Retained topic scan complete");
        Ok(topics)
    }

    /// Disconnects from the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect operation fails.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );
        self.inner
            .client
            .disconnect()
            .await
            .map_err(ProtocolError::Mqtt)?;
        self.inner.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl StatePublisher for MqttPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), ProtocolError> {
        self.inner
            .client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(ProtocolError::Mqtt)
    }
}

impl std::fmt::Debug for MqttPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttPublisher")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for an MQTT broker connection.
#[derive(Debug, Default)]
pub struct MqttPublisherBuilder {
    config: MqttPublisherConfig,
}

impl MqttPublisherBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the client-id prefix (default: `myuplink2mqtt`).
    #[must_use]
    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.client_id_prefix = prefix.into();
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the connection timeout (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Builds and connects to the broker, waiting for the `ConnAck`.
    ///
    /// # Errors
    ///
    /// Returns error if the host is not set, the connection fails, or the
    /// connection times out.
    pub async fn build(self) -> Result<MqttPublisher, ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!(
            "{}_{}_{counter}",
            self.config.client_id_prefix,
            std::process::id()
        );

        let mut mqtt_options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);
        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, 64);

        let publisher = MqttPublisher {
            inner: Arc::new(MqttPublisherInner {
                client,
                config: self.config.clone(),
                connected: AtomicBool::new(false),
                scan_tx: RwLock::new(None),
            }),
        };

        let (connack_tx, connack_rx) = oneshot::channel();
        let publisher_clone = publisher.clone();
        tokio::spawn(async move {
            handle_events(event_loop, publisher_clone, Some(connack_tx)).await;
        });

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                publisher.inner.connected.store(true, Ordering::Release);
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    authenticated = self.config.credentials.is_some(),
                    "Connected to MQTT broker"
                );
                Ok(publisher)
            }
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(
                "MQTT event loop terminated unexpectedly".to_string(),
            )),
            Err(_) => Err(ProtocolError::ConnectionFailed(format!(
                "MQTT connection timeout after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

/// Drives the MQTT event loop for the lifetime of the connection.
async fn handle_events(
    mut event_loop: EventLoop,
    publisher: MqttPublisher,
    connack_tx: Option<oneshot::Sender<()>>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = connack_tx;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                publisher.inner.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Some(scan_tx) = publisher.inner.scan_tx.read().await.as_ref() {
                    let _ = scan_tx.send(publish.topic.clone()).await;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                publisher.inner.connected.store(false, Ordering::Release);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT event loop error");
                publisher.inner.connected.store(false, Ordering::Release);
                break;
            }
        }
    }
}
