// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! API snapshot export (`--save`).
//!
//! Fetches every system, device, and data point once and writes them as
//! pretty-printed JSON. Useful for debugging classification against a
//! real installation without involving a broker.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::api::{EnumValue, ParameterValue, PointSource};
use crate::classify::display_name;
use crate::error::Result;

/// Default snapshot file path.
pub const DEFAULT_EXPORT_PATH: &str = "/tmp/myuplink.json";

/// One exported snapshot.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    /// Snapshot timestamp (RFC 3339).
    pub generated_at: String,
    /// Systems assigned to the authorized user.
    pub systems: Vec<SnapshotSystem>,
}

/// A system in the snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotSystem {
    /// System id.
    pub system_id: String,
    /// System name.
    pub name: String,
    /// Devices with their points.
    pub devices: Vec<SnapshotDevice>,
}

/// A device in the snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotDevice {
    /// Device id.
    pub id: String,
    /// Full product name.
    pub product: String,
    /// Serial number, empty when unreported.
    pub serial_number: String,
    /// Cloud connection state.
    pub connection_state: String,
    /// Installed firmware version.
    pub firmware_version: String,
    /// Data points with cleaned display names.
    pub points: Vec<SnapshotPoint>,
}

/// A data point in the snapshot, with both the raw and the cleaned name.
#[derive(Debug, Serialize)]
pub struct SnapshotPoint {
    /// Parameter id.
    pub id: String,
    /// Cleaned display name.
    pub name: String,
    /// Raw name as reported by the API.
    pub raw_name: String,
    /// Unit of measurement.
    pub unit: String,
    /// Current value.
    pub value: ParameterValue,
    /// String rendering as reported by the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub str_val: Option<String>,
    /// Enum table, empty for non-enumerated parameters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<EnumValue>,
}

/// Fetches everything once and builds the snapshot.
///
/// A failing device is recorded with empty details rather than aborting
/// the export; only a failing systems fetch is fatal.
///
/// # Errors
///
/// Returns error when the systems listing cannot be retrieved.
pub async fn build_snapshot<A: PointSource>(api: &A) -> Result<Snapshot> {
    let systems = api.get_systems().await?;
    let mut out_systems = Vec::with_capacity(systems.len());

    for system in &systems {
        let mut devices = Vec::with_capacity(system.devices.len());
        for device in &system.devices {
            devices.push(snapshot_device(api, &device.id).await);
        }
        out_systems.push(SnapshotSystem {
            system_id: system.system_id.clone(),
            name: system.name.clone(),
            devices,
        });
    }

    Ok(Snapshot {
        generated_at: Utc::now().to_rfc3339(),
        systems: out_systems,
    })
}

async fn snapshot_device<A: PointSource>(api: &A, device_id: &str) -> SnapshotDevice {
    let mut out = SnapshotDevice {
        id: device_id.to_string(),
        product: String::new(),
        serial_number: String::new(),
        connection_state: String::new(),
        firmware_version: String::new(),
        points: Vec::new(),
    };

    match api.get_device_details(device_id).await {
        Ok(details) => {
            out.product = details.product.name;
            out.serial_number = details.serial_number;
            out.connection_state = details.connection_state;
            out.firmware_version = details.current_fw_version;
        }
        Err(e) => {
            tracing::error!(device = %device_id, error = %e, "Could not retrieve device details");
        }
    }

    match api.get_device_points(device_id, None, None).await {
        Ok(points) => {
            out.points = points
                .into_iter()
                .map(|p| SnapshotPoint {
                    name: display_name(&p),
                    id: p.id,
                    raw_name: p.raw_name,
                    unit: p.unit,
                    value: p.value,
                    str_val: p.str_val,
                    enum_values: p.enum_values,
                })
                .collect();
        }
        Err(e) => {
            tracing::error!(device = %device_id, error = %e, "Could not retrieve data points");
        }
    }

    out
}

/// Builds a snapshot and writes it to `path` as pretty-printed JSON.
///
/// # Errors
///
/// Returns error when the systems fetch fails or the file cannot be
/// written.
pub async fn save_snapshot<A: PointSource>(api: &A, path: &Path) -> Result<()> {
    let snapshot = build_snapshot(api).await?;
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)?;

    let point_count: usize = snapshot
        .systems
        .iter()
        .flat_map(|s| &s.devices)
        .map(|d| d.points.len())
        .sum();
    tracing::info!(
        path = %path.display(),
        systems = snapshot.systems.len(),
        points = point_count,
        "Saved API snapshot"
    );
    Ok(())
}
