// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration.
//!
//! Defaults come from the environment (`MQTT_BROKER_HOST`, `MQTT_BROKER_PORT`,
//! `MQTT_USERNAME`, `MQTT_PASSWORD`, `MQTT_BASE_TOPIC`, `HA_DISCOVERY_PREFIX`,
//! `POLL_INTERVAL`); command-line flags override individual values.

use std::time::Duration;

use crate::discovery::TopicScheme;

/// Default broker host.
pub const DEFAULT_MQTT_HOST: &str = "10.0.0.2";
/// Default broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;
/// Default MQTT base topic for state and availability.
pub const DEFAULT_BASE_TOPIC: &str = "myuplink";
/// Default Home Assistant discovery prefix.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";
/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

/// Runtime configuration of the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// MQTT broker host.
    pub mqtt_host: String,
    /// MQTT broker port.
    pub mqtt_port: u16,
    /// Broker username, if the broker requires authentication.
    pub mqtt_username: Option<String>,
    /// Broker password.
    pub mqtt_password: Option<String>,
    /// Base topic for state and availability messages.
    pub base_topic: String,
    /// Home Assistant discovery prefix.
    pub discovery_prefix: String,
    /// Interval between poll cycles.
    pub poll_interval: Duration,
    /// Publish parameters whose value is "not used" too.
    pub send_all: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mqtt_host: DEFAULT_MQTT_HOST.to_string(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_username: None,
            mqtt_password: None,
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            send_all: false,
        }
    }
}

impl BridgeConfig {
    /// Builds the configuration from environment variables, falling back
    /// to defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mqtt_host: env_string("MQTT_BROKER_HOST").unwrap_or(defaults.mqtt_host),
            mqtt_port: env_string("MQTT_BROKER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mqtt_port),
            mqtt_username: env_string("MQTT_USERNAME"),
            mqtt_password: env_string("MQTT_PASSWORD"),
            base_topic: env_string("MQTT_BASE_TOPIC").unwrap_or(defaults.base_topic),
            discovery_prefix: env_string("HA_DISCOVERY_PREFIX")
                .unwrap_or(defaults.discovery_prefix),
            poll_interval: env_string("POLL_INTERVAL")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.poll_interval, Duration::from_secs),
            send_all: false,
        }
    }

    /// Returns the topic scheme derived from this configuration.
    #[must_use]
    pub fn topics(&self) -> TopicScheme {
        TopicScheme::new(self.base_topic.clone(), self.discovery_prefix.clone())
    }

    /// Renders the configuration for `--show-config`.
    #[must_use]
    pub fn render(&self, debug_mode: bool, silent_mode: bool) -> String {
        let mut lines = vec![
            "=".repeat(70),
            "myuplink2mqtt configuration".to_string(),
            "=".repeat(70),
            String::new(),
            "myUplink API:".to_string(),
            format!(
                "  OAuth config file: {}",
                crate::auth::config_path().display()
            ),
            format!(
                "  OAuth token file:  {}",
                crate::auth::token_path().display()
            ),
            String::new(),
            "MQTT broker:".to_string(),
            format!("  Host:              {}", self.mqtt_host),
            format!("  Port:              {}", self.mqtt_port),
            format!(
                "  Authentication:    {}",
                if self.mqtt_username.is_some() {
                    "yes"
                } else {
                    "no"
                }
            ),
        ];
        if let Some(ref username) = self.mqtt_username {
            lines.push(format!("  Username:          {username}"));
        }
        lines.extend([
            String::new(),
            "Topics:".to_string(),
            format!("  Base topic:        {}", self.base_topic),
            format!("  Discovery prefix:  {}", self.discovery_prefix),
            String::new(),
            "Polling:".to_string(),
            format!("  Poll interval:     {}s", self.poll_interval.as_secs()),
            format!(
                "  Send all:          {}",
                if self.send_all { "yes" } else { "no" }
            ),
            String::new(),
            "Runtime modes:".to_string(),
            format!(
                "  Silent mode:       {}",
                if silent_mode { "enabled" } else { "disabled" }
            ),
            format!(
                "  Debug mode:        {}",
                if debug_mode { "enabled" } else { "disabled" }
            ),
            format!(
                "  Publish to MQTT:   {}",
                if debug_mode { "no (debug mode)" } else { "yes" }
            ),
            "=".repeat(70),
        ]);
        lines.join("\n")
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = BridgeConfig::default();
        assert_eq!(config.mqtt_host, "10.0.0.2");
        assert_eq!(config.mqtt_port, 1883);
        assert_eq!(config.base_topic, "myuplink");
        assert_eq!(config.discovery_prefix, "homeassistant");
        assert_eq!(config.poll_interval, Duration::from_secs(120));
        assert!(!config.send_all);
        assert!(config.mqtt_username.is_none());
    }

    #[test]
    fn topics_use_configured_values() {
        let config = BridgeConfig {
            base_topic: "heatpump".to_string(),
            discovery_prefix: "ha".to_string(),
            ..BridgeConfig::default()
        };
        let topics = config.topics();
        assert_eq!(topics.state_topic("s", "p"), "heatpump/s/p/value");
        assert_eq!(
            topics.discovery_topic(crate::classify::ComponentKind::Sensor, "uid"),
            "ha/sensor/uid/config"
        );
    }

    #[test]
    fn render_mentions_broker_and_modes() {
        let config = BridgeConfig::default();
        let text = config.render(true, false);
        assert!(text.contains("10.0.0.2"));
        assert!(text.contains("Debug mode:        enabled"));
        assert!(text.contains("no (debug mode)"));
    }
}
