// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Home Assistant MQTT discovery document generation.
//!
//! A discovery document is a retained JSON message at
//! `<prefix>/<component>/<unique_id>/config` describing one entity to an
//! auto-discovery-capable subscriber. Its presence at the broker is the
//! durable state of this system; there is no local store, and a separate
//! utility clears entities by republishing empty payloads to the same
//! topics.
//!
//! Serialization is deterministic: field order is fixed by the struct and
//! nothing time- or randomness-dependent goes into the payload, so the
//! same parameter always produces byte-identical JSON.
//!
//! # Examples
//!
//! ```
//! use myuplink2mqtt::api::{DeviceIdentity, ParameterRecord, ParameterValue};
//! use myuplink2mqtt::discovery::{build_document, TopicScheme};
//!
//! let topics = TopicScheme::new("myuplink", "homeassistant");
//! let device = DeviceIdentity {
//!     id: "dev-1".into(),
//!     name: "Nibe F1155".into(),
//!     manufacturer: "Nibe".into(),
//!     model: "F1155".into(),
//!     serial: None,
//! };
//! let point = ParameterRecord::virtual_parameter(
//!     "40004",
//!     "Actual room temperature",
//!     ParameterValue::Float(21.5),
//! );
//! let doc = build_document(&topics, "sys-1", &device, &point);
//! assert_eq!(doc.unique_id, "myuplink_dev-1_40004");
//! ```

use serde::Serialize;

use crate::api::{DeviceIdentity, ParameterRecord};
use crate::classify::{
    self, ComponentKind, component_kind, device_class, display_name, entity_category, is_binary,
    normalize_name, normalize_unit, state_class,
};

/// Namespace prefix for unique ids and device identifiers.
const NAMESPACE: &str = "myuplink";

/// Topic layout for the bridge's MQTT surface.
///
/// State topics live under the base topic, discovery documents under the
/// Home Assistant discovery prefix.
#[derive(Debug, Clone)]
pub struct TopicScheme {
    base_topic: String,
    discovery_prefix: String,
}

impl TopicScheme {
    /// Creates a topic scheme from the configured base topic and
    /// discovery prefix.
    #[must_use]
    pub fn new(base_topic: impl Into<String>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            base_topic: base_topic.into(),
            discovery_prefix: discovery_prefix.into(),
        }
    }

    /// State topic for a parameter: `<base>/<system>/<param>/value`.
    #[must_use]
    pub fn state_topic(&self, system_id: &str, parameter_id: &str) -> String {
        format!("{}/{system_id}/{parameter_id}/value", self.base_topic)
    }

    /// Availability topic for a system: `<base>/<system>/available`.
    #[must_use]
    pub fn availability_topic(&self, system_id: &str) -> String {
        format!("{}/{system_id}/available", self.base_topic)
    }

    /// Command topic for a select entity: `<base>/<system>/<param>/set`.
    ///
    /// Published in discovery documents; the bridge itself never
    /// subscribes to it (write-back is not implemented).
    #[must_use]
    pub fn command_topic(&self, system_id: &str, parameter_id: &str) -> String {
        format!("{}/{system_id}/{parameter_id}/set", self.base_topic)
    }

    /// Discovery config topic: `<prefix>/<component>/<unique_id>/config`.
    #[must_use]
    pub fn discovery_topic(&self, component: ComponentKind, unique_id: &str) -> String {
        format!("{}/{component}/{unique_id}/config", self.discovery_prefix)
    }

    /// Returns the configured base topic.
    #[must_use]
    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Returns the configured discovery prefix.
    #[must_use]
    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }
}

/// Builds the namespaced unique id for a (device, parameter) pair.
#[must_use]
pub fn unique_id(device_id: &str, parameter_id: &str) -> String {
    format!("{NAMESPACE}_{device_id}_{parameter_id}")
}

/// Device block of a discovery document, grouping entities in the
/// subscriber's device registry.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceBlock {
    /// Registry identifiers, one namespaced id per device.
    pub identifiers: Vec<String>,
    /// Full product name.
    pub name: String,
    /// Manufacturer token.
    pub manufacturer: String,
    /// Model remainder.
    pub model: String,
    /// Serial number, omitted when the API does not report one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

/// Origin block identifying the software that produced the entity.
#[derive(Debug, Clone, Serialize)]
pub struct OriginBlock {
    /// Application name.
    pub name: &'static str,
    /// Application version.
    pub sw: &'static str,
    /// Project URL.
    pub url: &'static str,
}

impl Default for OriginBlock {
    fn default() -> Self {
        Self {
            name: "myUplink2mqtt",
            sw: env!("CARGO_PKG_VERSION"),
            url: env!("CARGO_PKG_REPOSITORY"),
        }
    }
}

/// A Home Assistant MQTT discovery document.
///
/// Field order matters: it is the serialization order, and discovery
/// payloads must be byte-stable so republishing is idempotent.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryDocument {
    /// Cleaned entity name.
    pub name: String,
    /// Entity object id, equal to the unique id.
    pub object_id: String,
    /// Globally unique entity id.
    pub unique_id: String,
    /// Topic carrying the plain-text state payload.
    pub state_topic: String,
    /// Topic carrying `online`/`offline`.
    pub availability_topic: String,
    /// Availability evaluation mode.
    pub availability_mode: &'static str,
    /// Payload marking the entity available.
    pub payload_available: &'static str,
    /// Payload marking the entity unavailable.
    pub payload_not_available: &'static str,
    /// Entities are enabled when first discovered.
    pub enabled_by_default: bool,
    /// Producing application.
    pub origin: OriginBlock,
    /// Owning device.
    pub device: DeviceBlock,
    /// Unit of measurement, omitted for binary and select entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    /// Home Assistant device class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    /// State class, omitted for binary entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    /// Select options, present only for enum parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Command topic, present only for enum parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    /// `diagnostic` for informational parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<&'static str>,
}

impl DiscoveryDocument {
    /// Serializes the document to its wire form.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Serialize cannot fail: no maps with non-string keys, no
        // non-finite floats.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Builds the option list for a select entity from the enum table.
///
/// Labels are whitespace-normalized; entries whose label cleans down to
/// an empty string are dropped.
#[must_use]
pub fn enum_options(record: &ParameterRecord) -> Vec<String> {
    record
        .enum_values
        .iter()
        .map(|e| normalize_name(&e.text))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Builds the discovery document for one parameter of one device.
pub fn build_document(
    topics: &TopicScheme,
    system_id: &str,
    device: &DeviceIdentity,
    record: &ParameterRecord,
) -> DiscoveryDocument {
    let uid = unique_id(&device.id, &record.id);
    let name = classify::strip_device_prefix(&display_name(record), &device.name);
    let category = entity_category(&record.id, &name);

    let mut doc = DiscoveryDocument {
        name,
        object_id: uid.clone(),
        unique_id: uid,
        state_topic: topics.state_topic(system_id, &record.id),
        availability_topic: topics.availability_topic(system_id),
        availability_mode: "latest",
        payload_available: "online",
        payload_not_available: "offline",
        enabled_by_default: true,
        origin: OriginBlock::default(),
        device: DeviceBlock {
            identifiers: vec![format!("{NAMESPACE}_{}", device.id)],
            name: device.name.clone(),
            manufacturer: device.manufacturer.clone(),
            model: device.model.clone(),
            serial_number: device.serial.clone(),
        },
        unit_of_measurement: None,
        device_class: None,
        state_class: None,
        options: None,
        command_topic: None,
        entity_category: category,
    };

    if record.has_enum_values() {
        doc.options = Some(enum_options(record));
        doc.command_topic = Some(topics.command_topic(system_id, &record.id));
    } else {
        let unit = normalize_unit(&record.unit);
        let binary = is_binary(&record.value, &record.unit);

        if !binary && !unit.is_empty() {
            doc.unit_of_measurement = Some(unit.to_string());
            doc.state_class = Some(state_class(unit));
        }
        doc.device_class = device_class(&record.unit, &record.id);
    }

    doc
}

/// Builds the discovery topic for a parameter of a device.
#[must_use]
pub fn document_topic(
    topics: &TopicScheme,
    device_id: &str,
    record: &ParameterRecord,
) -> String {
    topics.discovery_topic(component_kind(record), &unique_id(device_id, &record.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{EnumValue, ParameterValue};

    fn device() -> DeviceIdentity {
        DeviceIdentity {
            id: "dev-1".to_string(),
            name: "Nibe F1155".to_string(),
            manufacturer: "Nibe".to_string(),
            model: "F1155".to_string(),
            serial: Some("06666666666666".to_string()),
        }
    }

    fn temperature_point() -> ParameterRecord {
        ParameterRecord {
            id: "40004".to_string(),
            raw_name: "Actual room temperature".to_string(),
            unit: "°C".to_string(),
            value: ParameterValue::Float(21.5),
            str_val: None,
            enum_values: Vec::new(),
        }
    }

    #[test]
    fn topic_scheme_layout() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        assert_eq!(topics.state_topic("sys", "40004"), "myuplink/sys/40004/value");
        assert_eq!(topics.availability_topic("sys"), "myuplink/sys/available");
        assert_eq!(topics.command_topic("sys", "47041"), "myuplink/sys/47041/set");
        assert_eq!(
            topics.discovery_topic(ComponentKind::Sensor, "myuplink_dev-1_40004"),
            "homeassistant/sensor/myuplink_dev-1_40004/config"
        );
    }

    #[test]
    fn temperature_document_round_trip() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        let doc = build_document(&topics, "sys-1", &device(), &temperature_point());

        assert_eq!(doc.name, "Actual room temperature");
        assert_eq!(doc.unique_id, "myuplink_dev-1_40004");
        assert_eq!(doc.state_topic, "myuplink/sys-1/40004/value");
        assert_eq!(doc.availability_topic, "myuplink/sys-1/available");
        assert_eq!(doc.device_class, Some("temperature"));
        assert_eq!(doc.unit_of_measurement.as_deref(), Some("°C"));
        assert_eq!(doc.state_class, Some("measurement"));
        assert_eq!(doc.device.manufacturer, "Nibe");
        assert_eq!(doc.device.model, "F1155");
        assert_eq!(doc.device.serial_number.as_deref(), Some("06666666666666"));
    }

    #[test]
    fn binary_document_omits_sensor_keys() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        let point = ParameterRecord {
            id: "10733".to_string(),
            raw_name: "Compressor blocked".to_string(),
            unit: String::new(),
            value: ParameterValue::Int(0),
            str_val: None,
            enum_values: Vec::new(),
        };
        let doc = build_document(&topics, "sys-1", &device(), &point);
        let json = doc.to_json();

        assert!(!json.contains("unit_of_measurement"));
        assert!(!json.contains("device_class"));
        assert!(!json.contains("state_class"));
    }

    #[test]
    fn energy_document_accumulates() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        let mut point = temperature_point();
        point.unit = "kWh".to_string();
        let doc = build_document(&topics, "sys-1", &device(), &point);
        assert_eq!(doc.state_class, Some("total_increasing"));
        assert_eq!(doc.device_class, Some("energy"));
    }

    #[test]
    fn select_document_has_options_and_command_topic() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        let point = ParameterRecord {
            id: "47041".to_string(),
            raw_name: "Hot water mode".to_string(),
            unit: String::new(),
            value: ParameterValue::Float(1.0),
            str_val: None,
            enum_values: vec![
                EnumValue {
                    value: "0".to_string(),
                    text: "Economy".to_string(),
                },
                EnumValue {
                    value: "1".to_string(),
                    text: "Normal\r\n".to_string(),
                },
                EnumValue {
                    value: "2".to_string(),
                    text: String::new(),
                },
            ],
        };
        let doc = build_document(&topics, "sys-1", &device(), &point);

        assert_eq!(
            doc.options.as_deref(),
            Some(&["Economy".to_string(), "Normal".to_string()][..])
        );
        assert_eq!(doc.command_topic.as_deref(), Some("myuplink/sys-1/47041/set"));
        assert!(doc.unit_of_measurement.is_none());
        assert!(doc.state_class.is_none());
    }

    #[test]
    fn unit_is_relabelled_without_scaling() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        let mut point = temperature_point();
        point.id = "40072".to_string();
        point.raw_name = "Flow sensor".to_string();
        point.unit = "l/m".to_string();
        point.value = ParameterValue::Float(12.3);
        let doc = build_document(&topics, "sys-1", &device(), &point);

        assert_eq!(doc.unit_of_measurement.as_deref(), Some("l/hr"));
        assert_eq!(doc.device_class, Some("volume_flow_rate"));
    }

    #[test]
    fn serialization_is_idempotent() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        let first = build_document(&topics, "sys-1", &device(), &temperature_point()).to_json();
        let second = build_document(&topics, "sys-1", &device(), &temperature_point()).to_json();
        assert_eq!(first, second);
    }

    #[test]
    fn serial_number_omitted_when_absent() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        let mut dev = device();
        dev.serial = None;
        let json = build_document(&topics, "sys-1", &dev, &temperature_point()).to_json();
        assert!(!json.contains("serial_number"));
    }

    #[test]
    fn document_topic_uses_component_kind() {
        let topics = TopicScheme::new("myuplink", "homeassistant");
        let point = temperature_point();
        assert_eq!(
            document_topic(&topics, "dev-1", &point),
            "homeassistant/sensor/myuplink_dev-1_40004/config"
        );
    }
}
