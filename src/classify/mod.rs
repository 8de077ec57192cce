// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parameter classification for Home Assistant auto-discovery.
//!
//! Pure functions that map a raw vendor parameter (id, display name, unit,
//! value, optional enum table) to the entity shape Home Assistant expects:
//! a component kind, a device class, a state class, and an entity category.
//! No I/O, fully deterministic: the same record always classifies the
//! same way, which keeps discovery payloads byte-stable across cycles.
//!
//! # Examples
//!
//! ```
//! use myuplink2mqtt::classify::{component_kind, device_class, ComponentKind};
//! use myuplink2mqtt::api::{ParameterRecord, ParameterValue};
//!
//! let point = ParameterRecord::virtual_parameter(
//!     "40004",
//!     "Actual room temperature",
//!     ParameterValue::Float(21.5),
//! );
//! assert_eq!(component_kind(&point), ComponentKind::Sensor);
//! assert_eq!(device_class("°C", "40004"), Some("temperature"));
//! ```

use crate::api::{ParameterRecord, ParameterValue};

/// Soft hyphen that the vendor API embeds in long parameter names.
const SOFT_HYPHEN: char = '\u{00AD}';

/// Parameter ids whose name arrives as the "Text not found" sentinel,
/// mapped to the labels the vendor's own app shows.
const SENTINEL_LABELS: [(&str, &str); 3] = [
    ("60720", "Installation year"),
    ("60719", "Installation month"),
    ("60704", "Installation day"),
];

/// Parameter ids with a fixed device class, overriding the unit table.
const ID_DEVICE_CLASSES: [(&str, &str); 3] = [
    // Electricity add reports °C but is an alarm flag
    ("43161", "binary_sensor"),
    ("60433", "humidity"),
    ("installation_date", "date"),
];

/// Unit strings mapped to Home Assistant device classes. Case-sensitive.
const UNIT_DEVICE_CLASSES: [(&str, &str); 18] = [
    ("°C", "temperature"),
    ("C", "temperature"),
    ("°F", "temperature"),
    ("F", "temperature"),
    ("kW", "power"),
    ("W", "power"),
    ("kWh", "energy"),
    ("Wh", "energy"),
    ("A", "current"),
    ("V", "voltage"),
    ("rh%", "humidity"),
    ("bar", "pressure"),
    ("Pa", "pressure"),
    ("hPa", "pressure"),
    ("l/m", "volume_flow_rate"),
    ("l/min", "volume_flow_rate"),
    ("l/hr", "volume_flow_rate"),
    ("m³/h", "volume_flow_rate"),
];

/// Parameter ids that are diagnostic regardless of their name.
const DIAGNOSTIC_IDS: [&str; 3] = ["43161", "43437", "43438"];

/// Name fragments that mark a parameter as diagnostic.
const DIAGNOSTIC_KEYWORDS: [&str; 7] = [
    "accumulated",
    "total",
    "starts",
    "runtime",
    "hours",
    "alarm",
    "error",
];

/// The Home Assistant component a parameter is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Numeric or united reading.
    Sensor,
    /// Boolean or unitless integer flag.
    BinarySensor,
    /// Enumerated parameter with an options list.
    Select,
    /// Free-form string with no unit (dates, labels).
    Text,
}

impl ComponentKind {
    /// Returns the component segment used in discovery topics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Select => "select",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The coarse type of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Boolean.
    Bool,
    /// Whole number.
    Int,
    /// Fractional number.
    Float,
    /// String.
    Text,
}

impl ValueType {
    /// Classifies a value. The boolean arm comes first so a boolean is
    /// never reported as an integer.
    #[must_use]
    pub fn of(value: &ParameterValue) -> Self {
        match value {
            ParameterValue::Bool(_) => Self::Bool,
            ParameterValue::Int(_) => Self::Int,
            ParameterValue::Float(_) => Self::Float,
            ParameterValue::Text(_) => Self::Text,
        }
    }
}

/// Strips soft hyphens and line breaks, collapses space runs, trims ends.
///
/// Applied everywhere a parameter or enum name is displayed.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut last_was_space = false;
    for c in name.chars() {
        match c {
            SOFT_HYPHEN | '\r' | '\n' => {}
            ' ' => {
                if !last_was_space {
                    cleaned.push(' ');
                }
                last_was_space = true;
            }
            other => {
                cleaned.push(other);
                last_was_space = false;
            }
        }
    }
    cleaned.trim().to_string()
}

/// Removes a `"<device> (<content>)"` wrapper from a parameter name.
///
/// The wrapper only counts when the matching closing parenthesis (nested
/// parens tracked) is the final character; anything else returns the input
/// unchanged. `"SAK ()"` yields the empty string.
#[must_use]
pub fn strip_device_prefix(parameter_name: &str, device_name: &str) -> String {
    let prefix = format!("{device_name} (");
    let Some(rest) = parameter_name.strip_prefix(&prefix) else {
        return parameter_name.to_string();
    };

    let mut depth = 1usize;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if i == rest.len() - 1 {
                        return rest[..i].to_string();
                    }
                    break;
                }
            }
            _ => {}
        }
    }
    parameter_name.to_string()
}

/// Derives the display name for a parameter.
///
/// Normalizes whitespace, strips a self-referential `"<word> (<word> ...)"`
/// wrapper, then resolves the vendor's `"Text not found: id[NNNNN], ..."`
/// sentinel to a known label or `"No Label (NNNNN)"`. A sentinel without a
/// closing bracket, or with empty brackets, is returned as-is.
#[must_use]
pub fn display_name(record: &ParameterRecord) -> String {
    let mut name = normalize_name(&record.raw_name);

    if let Some(stripped) = strip_leading_word_parenthetical(&name) {
        name = stripped;
    }

    if let Some(rest) = name.strip_prefix("Text not found: id[") {
        if let Some(end) = rest.find(']') {
            let id = &rest[..end];
            if id.is_empty() {
                return name;
            }
            for (known_id, label) in SENTINEL_LABELS {
                if id == known_id {
                    return label.to_string();
                }
            }
            return format!("No Label ({id})");
        }
    }

    name
}

/// Strips a `"<word> (<content>)"` wrapper where `<word>` is the leading
/// token of the name itself, removing the repeated token from the content
/// when present.
fn strip_leading_word_parenthetical(name: &str) -> Option<String> {
    if !name.ends_with(')') {
        return None;
    }

    let word_end = name
        .char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
        .map(|(i, _)| i)?;
    if word_end == 0 {
        return None;
    }
    let word = &name[..word_end];

    let after_word = name[word_end..].trim_start();
    let content = after_word.strip_prefix('(')?.strip_suffix(')')?;
    if content.is_empty() {
        return None;
    }

    // "SAK (SAK Operating mode)" -> "Operating mode"
    if let Some(repeated) = content.strip_prefix(word) {
        let trimmed = repeated.trim_start();
        if trimmed.len() < repeated.len() && !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    Some(content.to_string())
}

/// Normalizes a unit string for display in discovery documents.
///
/// Relabel only; values are never scaled, even for `l/m` → `l/hr`.
#[must_use]
pub fn normalize_unit(unit: &str) -> &str {
    match unit {
        "rh%" => "%",
        "l/m" => "l/hr",
        other => other,
    }
}

/// Determines the Home Assistant device class for a parameter.
///
/// The parameter-id table takes priority over the unit table, so an alarm
/// id reported with a temperature unit still classifies as an alarm.
#[must_use]
pub fn device_class(unit: &str, parameter_id: &str) -> Option<&'static str> {
    for (id, class) in ID_DEVICE_CLASSES {
        if parameter_id == id {
            return Some(class);
        }
    }
    for (u, class) in UNIT_DEVICE_CLASSES {
        if unit == u {
            return Some(class);
        }
    }
    None
}

/// Determines the entity category for a parameter.
///
/// Diagnostic ids and diagnostic name keywords both mark a parameter as
/// informational; everything else is a regular sensor (never `config`).
#[must_use]
pub fn entity_category(parameter_id: &str, name: &str) -> Option<&'static str> {
    if DIAGNOSTIC_IDS.contains(&parameter_id) {
        return Some("diagnostic");
    }
    let lower = name.to_lowercase();
    if DIAGNOSTIC_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some("diagnostic");
    }
    None
}

/// Returns whether the parameter renders as a binary sensor value.
#[must_use]
pub fn is_binary(value: &ParameterValue, unit: &str) -> bool {
    match ValueType::of(value) {
        ValueType::Bool => true,
        ValueType::Int => unit.is_empty(),
        ValueType::Float | ValueType::Text => false,
    }
}

/// Classifies the component kind of a parameter.
///
/// Priority: enum table → `select`, boolean or unitless integer →
/// `binary_sensor`, unitless string → `text`, everything else → `sensor`.
#[must_use]
pub fn component_kind(record: &ParameterRecord) -> ComponentKind {
    if record.has_enum_values() {
        return ComponentKind::Select;
    }
    if is_binary(&record.value, &record.unit) {
        return ComponentKind::BinarySensor;
    }
    if ValueType::of(&record.value) == ValueType::Text && record.unit.is_empty() {
        return ComponentKind::Text;
    }
    ComponentKind::Sensor
}

/// Determines the state class for a numeric sensor.
///
/// Expects the normalized unit. Energy totals accumulate, everything else
/// is a point-in-time measurement. Binary parameters carry no state class.
#[must_use]
pub fn state_class(normalized_unit: &str) -> &'static str {
    match normalized_unit {
        "kWh" | "Wh" => "total_increasing",
        _ => "measurement",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EnumValue;

    fn point(id: &str, name: &str, unit: &str, value: ParameterValue) -> ParameterRecord {
        ParameterRecord {
            id: id.to_string(),
            raw_name: name.to_string(),
            unit: unit.to_string(),
            value,
            str_val: None,
            enum_values: Vec::new(),
        }
    }

    #[test]
    fn normalize_strips_soft_hyphens_and_line_breaks() {
        assert_eq!(normalize_name("Temperature\u{00AD}sensor"), "Temperaturesensor");
        assert_eq!(normalize_name("line\r\nbreak"), "linebreak");
    }

    #[test]
    fn normalize_collapses_and_trims_spaces() {
        assert_eq!(normalize_name("  Spaced  Parameter  "), "Spaced Parameter");
    }

    #[test]
    fn strip_prefix_repeated_device_name() {
        assert_eq!(
            strip_device_prefix("SAK (Set automatically)", "SAK"),
            "Set automatically"
        );
    }

    #[test]
    fn strip_prefix_multiword_device_name() {
        assert_eq!(
            strip_device_prefix("Hot water (Ratio hot water defrost)", "Hot water"),
            "Ratio hot water defrost"
        );
    }

    #[test]
    fn strip_prefix_tracks_nested_parens() {
        assert_eq!(
            strip_device_prefix("SAK (Mode (auto) select)", "SAK"),
            "Mode (auto) select"
        );
    }

    #[test]
    fn strip_prefix_unmatched_paren_returns_input() {
        assert_eq!(strip_device_prefix("SAK (unclosed", "SAK"), "SAK (unclosed");
    }

    #[test]
    fn strip_prefix_trailing_text_returns_input() {
        assert_eq!(
            strip_device_prefix("SAK (mode) extra", "SAK"),
            "SAK (mode) extra"
        );
    }

    #[test]
    fn strip_prefix_empty_content() {
        assert_eq!(strip_device_prefix("SAK ()", "SAK"), "");
    }

    #[test]
    fn display_name_plain() {
        let p = point("1", "Actual room temperature", "°C", ParameterValue::Float(21.5));
        assert_eq!(display_name(&p), "Actual room temperature");
    }

    #[test]
    fn display_name_strips_repeated_word() {
        let p = point("1", "SAK (SAK Operating mode)", "", ParameterValue::Int(0));
        assert_eq!(display_name(&p), "Operating mode");
    }

    #[test]
    fn display_name_keeps_content_when_word_differs() {
        let p = point(
            "1",
            "Hot water (Ratio hot water defrost)",
            "",
            ParameterValue::Int(0),
        );
        // "Hot" is not "Hot water", so only the wrapper word is dropped
        assert_eq!(display_name(&p), "Hot water (Ratio hot water defrost)");
    }

    #[test]
    fn display_name_sentinel_installation_components() {
        for (id, label) in [
            ("60720", "Installation year"),
            ("60719", "Installation month"),
            ("60704", "Installation day"),
        ] {
            let raw = format!("Text not found: id[{id}], fw[noem-h], lang[en-US]");
            let p = point(id, &raw, "", ParameterValue::Float(2023.0));
            assert_eq!(display_name(&p), label);
        }
    }

    #[test]
    fn display_name_sentinel_unknown_id() {
        let p = point(
            "99999",
            "Text not found: id[99999], fw[noem-h], lang[en-US]",
            "",
            ParameterValue::Int(0),
        );
        assert_eq!(display_name(&p), "No Label (99999)");
    }

    #[test]
    fn display_name_sentinel_non_numeric_id() {
        let p = point(
            "1",
            "Text not found: id[notanumber], fw[x], lang[en-US]",
            "",
            ParameterValue::Int(0),
        );
        assert_eq!(display_name(&p), "No Label (notanumber)");
    }

    #[test]
    fn display_name_malformed_sentinel_passes_through() {
        let p = point("1", "Text not found: id[60720", "", ParameterValue::Int(0));
        assert_eq!(display_name(&p), "Text not found: id[60720");
    }

    #[test]
    fn display_name_empty_sentinel_id_passes_through() {
        let raw = "Text not found: id[], fw[noem-h], lang[en-US]";
        let p = point("1", raw, "", ParameterValue::Int(0));
        assert_eq!(display_name(&p), raw);
    }

    #[test]
    fn value_type_bool_before_int() {
        assert_eq!(ValueType::of(&ParameterValue::Bool(true)), ValueType::Bool);
        assert_eq!(ValueType::of(&ParameterValue::Int(1)), ValueType::Int);
    }

    #[test]
    fn device_class_id_table_beats_unit_table() {
        // Alarm id reported with a temperature unit stays a binary sensor
        assert_eq!(device_class("°C", "43161"), Some("binary_sensor"));
    }

    #[test]
    fn device_class_from_unit() {
        assert_eq!(device_class("°C", "40004"), Some("temperature"));
        assert_eq!(device_class("kWh", "1"), Some("energy"));
        assert_eq!(device_class("rh%", "1"), Some("humidity"));
        assert_eq!(device_class("l/m", "1"), Some("volume_flow_rate"));
        assert_eq!(device_class("", "1"), None);
    }

    #[test]
    fn device_class_virtual_installation_date() {
        assert_eq!(device_class("", "installation_date"), Some("date"));
    }

    #[test]
    fn entity_category_by_id() {
        assert_eq!(entity_category("43437", "Whatever"), Some("diagnostic"));
    }

    #[test]
    fn entity_category_by_keyword_case_insensitive() {
        assert_eq!(
            entity_category("1", "Compressor Starts counter"),
            Some("diagnostic")
        );
        assert_eq!(entity_category("1", "ALARM active"), Some("diagnostic"));
        assert_eq!(entity_category("1", "Room temperature"), None);
    }

    #[test]
    fn normalize_unit_relabels_without_scaling() {
        assert_eq!(normalize_unit("rh%"), "%");
        assert_eq!(normalize_unit("l/m"), "l/hr");
        assert_eq!(normalize_unit("°C"), "°C");
    }

    #[test]
    fn component_enum_wins() {
        let mut p = point("1", "Mode", "°C", ParameterValue::Float(1.0));
        p.enum_values = vec![EnumValue {
            value: "1".to_string(),
            text: "On".to_string(),
        }];
        assert_eq!(component_kind(&p), ComponentKind::Select);
    }

    #[test]
    fn component_binary_for_bool_and_unitless_int() {
        let p = point("1", "Flag", "", ParameterValue::Bool(false));
        assert_eq!(component_kind(&p), ComponentKind::BinarySensor);
        let p = point("1", "Flag", "", ParameterValue::Int(1));
        assert_eq!(component_kind(&p), ComponentKind::BinarySensor);
        // A united integer is a plain sensor
        let p = point("1", "Power", "W", ParameterValue::Int(150));
        assert_eq!(component_kind(&p), ComponentKind::Sensor);
    }

    #[test]
    fn component_text_for_unitless_string() {
        let p = point(
            "installation_date",
            "Installation date",
            "",
            ParameterValue::Text("2023-06-15".to_string()),
        );
        assert_eq!(component_kind(&p), ComponentKind::Text);
    }

    #[test]
    fn component_sensor_otherwise() {
        let p = point("1", "Temp", "°C", ParameterValue::Float(21.5));
        assert_eq!(component_kind(&p), ComponentKind::Sensor);
    }

    #[test]
    fn state_class_energy_accumulates() {
        assert_eq!(state_class("kWh"), "total_increasing");
        assert_eq!(state_class("Wh"), "total_increasing");
        assert_eq!(state_class("°C"), "measurement");
    }
}
