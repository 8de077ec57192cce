// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Removes every retained message this bridge ever published.
//!
//! The broker's retained state is the bridge's only persistent state, so
//! uninstalling means clearing it there: scan the discovery prefix and
//! the base topic for retained messages, keep the ones belonging to this
//! bridge, and republish each with an empty retained payload. Home
//! Assistant drops the corresponding entities on the empty config.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rumqttc::QoS;
use tracing_subscriber::EnvFilter;

use myuplink2mqtt::Result;
use myuplink2mqtt::config::{
    DEFAULT_BASE_TOPIC, DEFAULT_DISCOVERY_PREFIX, DEFAULT_MQTT_HOST, DEFAULT_MQTT_PORT,
};
use myuplink2mqtt::protocol::{MqttPublisher, StatePublisher};

/// Clear retained myUplink2mqtt discovery configs and states from an
/// MQTT broker.
#[derive(Debug, Parser)]
#[command(name = "clear-discovery", version, about)]
struct Cli {
    /// MQTT broker host.
    #[arg(long, value_name = "HOST", default_value = DEFAULT_MQTT_HOST)]
    mqtt_host: String,

    /// MQTT broker port.
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_MQTT_PORT)]
    mqtt_port: u16,

    /// Broker username.
    #[arg(long, value_name = "USER")]
    mqtt_username: Option<String>,

    /// Broker password.
    #[arg(long, value_name = "PASSWORD")]
    mqtt_password: Option<String>,

    /// Home Assistant discovery prefix to scan.
    #[arg(long, value_name = "PREFIX", default_value = DEFAULT_DISCOVERY_PREFIX)]
    discovery_prefix: String,

    /// Base topic to scan.
    #[arg(long, value_name = "TOPIC", default_value = DEFAULT_BASE_TOPIC)]
    base_topic: String,

    /// Seconds to listen for retained messages.
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    scan_window: u64,

    /// List matching topics without clearing them.
    #[arg(long)]
    dry_run: bool,
}

/// Returns whether a retained topic belongs to this bridge.
///
/// Everything under the base topic is ours; under the discovery prefix
/// only config topics carrying the `myuplink_` unique-id namespace are,
/// so other integrations' entities are left alone.
fn is_ours(topic: &str, base_topic: &str) -> bool {
    if topic == base_topic || topic.starts_with(&format!("{base_topic}/")) {
        return true;
    }
    topic.ends_with("/config") && topic.contains("/myuplink_")
}

/// Clears retained messages by republishing each topic with an empty
/// retained payload.
///
/// # Errors
///
/// Returns error when a publish is rejected.
async fn clear_retained<P: StatePublisher>(publisher: &P, topics: &[String]) -> Result<()> {
    for topic in topics {
        publisher.publish(topic, "", QoS::AtLeastOnce, true).await?;
        tracing::debug!(topic = %topic, "Cleared retained message");
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let mut builder = MqttPublisher::builder()
        .host(&cli.mqtt_host)
        .port(cli.mqtt_port)
        .client_id_prefix("myuplink2mqtt_clear");
    if let (Some(user), Some(pass)) = (&cli.mqtt_username, &cli.mqtt_password) {
        builder = builder.credentials(user, pass);
    }
    let publisher = builder.build().await?;

    let filters = vec![
        format!("{}/+/+/config", cli.discovery_prefix),
        format!("{}/#", cli.base_topic),
    ];
    let topics = publisher
        .collect_retained_topics(&filters, Duration::from_secs(cli.scan_window))
        .await?;

    let ours: Vec<String> = topics
        .into_iter()
        .filter(|t| is_ours(t, &cli.base_topic))
        .collect();

    if ours.is_empty() {
        tracing::info!("No retained myUplink2mqtt topics found");
        publisher.disconnect().await?;
        return Ok(());
    }

    tracing::info!(count = ours.len(), "Found retained myUplink2mqtt topics");
    if cli.dry_run {
        for topic in &ours {
            println!("{topic}");
        }
        tracing::info!(count = ours.len(), "Dry run: nothing cleared");
    } else {
        clear_retained(&publisher, &ours).await?;
        tracing::info!(count = ours.len(), "Cleared retained messages");
    }

    publisher.disconnect().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
