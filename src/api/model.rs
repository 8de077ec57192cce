// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data model for myUplink API responses.
//!
//! The vendor API reports each device as a flat list of parameter points.
//! These structs are the typed snapshot of one poll: they carry no identity
//! beyond the parameter id within a device and are never persisted.

use serde::{Deserialize, Deserializer, Serialize};

/// A single parameter value as reported by the vendor API.
///
/// Deserialization tries the variants in declaration order, so a JSON
/// boolean is never misread as an integer and a whole number is never
/// misread as a float.
///
/// # Examples
///
/// ```
/// use myuplink2mqtt::api::ParameterValue;
///
/// let v: ParameterValue = serde_json::from_str("21.5").unwrap();
/// assert_eq!(v, ParameterValue::Float(21.5));
/// assert_eq!(v.render(), "21.5");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// A boolean value.
    Bool(bool),
    /// A whole number.
    Int(i64),
    /// A fractional number.
    Float(f64),
    /// A free-form string.
    Text(String),
}

impl ParameterValue {
    /// Renders the value as the plain-text MQTT state payload.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Renders the value for enum-table lookup.
    ///
    /// The vendor's enum codes are integer strings, while current values
    /// arrive as floats (`1.0`); floats are truncated to their integer
    /// representation before comparison.
    #[must_use]
    pub fn enum_key(&self) -> String {
        match self {
            Self::Float(f) => format!("{}", *f as i64),
            other => other.render(),
        }
    }

    /// Returns the value as an integer if it is numeric.
    ///
    /// Floats are truncated, matching the vendor's convention of reporting
    /// whole-number parameters as `2023.0`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

/// One entry of a parameter's enum table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    /// The enum code as an integer string (e.g. `"1"`).
    #[serde(default)]
    pub value: String,
    /// The human-readable label (e.g. `"On"`).
    #[serde(default)]
    pub text: String,
}

/// A raw parameter record from the device points endpoint.
///
/// Immutable snapshot per poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRecord {
    /// Parameter id. The API reports it as a number; it is normalized to a
    /// string because synthesized parameters use non-numeric ids.
    #[serde(rename = "parameterId", deserialize_with = "id_as_string")]
    pub id: String,

    /// Display name as delivered by the API, possibly carrying soft
    /// hyphens, line breaks, or the vendor's "Text not found" sentinel.
    #[serde(rename = "parameterName", default)]
    pub raw_name: String,

    /// Unit of measurement, empty when the parameter is unitless.
    #[serde(rename = "parameterUnit", default)]
    pub unit: String,

    /// Current value.
    pub value: ParameterValue,

    /// String rendering of the value as reported by the API.
    #[serde(rename = "strVal", default)]
    pub str_val: Option<String>,

    /// Enum table, empty for non-enumerated parameters.
    #[serde(rename = "enumValues", default)]
    pub enum_values: Vec<EnumValue>,
}

impl ParameterRecord {
    /// Creates a synthesized (virtual) parameter with no enum table.
    #[must_use]
    pub fn virtual_parameter(
        id: impl Into<String>,
        name: impl Into<String>,
        value: ParameterValue,
    ) -> Self {
        Self {
            id: id.into(),
            raw_name: name.into(),
            unit: String::new(),
            value,
            str_val: None,
            enum_values: Vec::new(),
        }
    }

    /// Returns whether the parameter carries a non-empty enum table.
    #[must_use]
    pub fn has_enum_values(&self) -> bool {
        !self.enum_values.is_empty()
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(i64),
        Str(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Num(n) => n.to_string(),
        Id::Str(s) => s,
    })
}

/// Response body of `GET /v2/systems/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemsResponse {
    /// Systems assigned to the authorized user.
    #[serde(default)]
    pub systems: Vec<System>,
}

/// A myUplink system (an installation grouping one or more devices).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct System {
    /// System id used in topic paths.
    #[serde(rename = "systemId")]
    pub system_id: String,
    /// Human-readable system name.
    #[serde(default)]
    pub name: String,
    /// Devices belonging to the system.
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
}

/// A device reference inside a system listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRef {
    /// Device id.
    pub id: String,
}

/// Response body of `GET /v2/devices/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDetails {
    /// Product description.
    pub product: Product,
    /// Device serial number.
    #[serde(rename = "serialNumber", default)]
    pub serial_number: String,
    /// Cloud connection state (e.g. `"Connected"`).
    #[serde(rename = "connectionState", default)]
    pub connection_state: String,
    /// Installed firmware version.
    #[serde(rename = "currentFwVersion", default)]
    pub current_fw_version: String,
}

/// Product block of a device details response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Full product name (e.g. `"Nibe F1155"`).
    #[serde(default)]
    pub name: String,
}

/// Identity of a device as published in discovery documents.
///
/// Derived once per device per cycle from the product name: the first
/// whitespace splits manufacturer from model. Product names without a
/// space keep the whole name as the model with an `"Unknown"` manufacturer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Device id.
    pub id: String,
    /// Full product name.
    pub name: String,
    /// Manufacturer token.
    pub manufacturer: String,
    /// Model remainder.
    pub model: String,
    /// Serial number, omitted from discovery payloads when empty.
    pub serial: Option<String>,
}

impl DeviceIdentity {
    /// Derives the identity from device details.
    #[must_use]
    pub fn from_details(device_id: &str, details: &DeviceDetails) -> Self {
        let product_name = details.product.name.as_str();
        let (manufacturer, model) = match product_name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.to_string()),
            None => ("Unknown".to_string(), product_name.to_string()),
        };
        let serial = if details.serial_number.is_empty() {
            None
        } else {
            Some(details.serial_number.clone())
        };
        Self {
            id: device_id.to_string(),
            name: product_name.to_string(),
            manufacturer,
            model,
            serial,
        }
    }
}
