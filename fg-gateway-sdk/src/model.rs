use crate::value::PointValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Telemetry report from a device (monitoring packets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryData {
    /// Logical device name the values belong to.
    pub device_name: Arc<str>,
    /// Gateway-side receive timestamp.
    pub ts: DateTime<Utc>,
    /// Decoded point values, one per parameter in the report.
    pub values: Vec<PointValue>,
}

impl TelemetryData {
    pub fn new(device_name: Arc<str>, values: Vec<PointValue>) -> Self {
        Self {
            device_name,
            ts: Utc::now(),
            values,
        }
    }
}

/// Alarm report from a device (alarm packets).
///
/// Alarm payloads carry the same self-describing parameter list as
/// telemetry; the distinction is routing priority on the northward side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmData {
    pub device_name: Arc<str>,
    pub ts: DateTime<Utc>,
    pub values: Vec<PointValue>,
}

impl AlarmData {
    pub fn new(device_name: Arc<str>, values: Vec<PointValue>) -> Self {
        Self {
            device_name,
            ts: Utc::now(),
            values,
        }
    }
}

/// Northward data types
/// Gateway -> Northward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NorthwardData {
    /// Telemetry data from devices
    Telemetry(TelemetryData),
    /// Alarm notifications
    Alarm(AlarmData),
}

impl NorthwardData {
    pub fn device_name(&self) -> &str {
        match self {
            NorthwardData::Telemetry(data) => &data.device_name,
            NorthwardData::Alarm(data) => &data.device_name,
        }
    }

    pub fn values(&self) -> &[PointValue] {
        match self {
            NorthwardData::Telemetry(data) => &data.values,
            NorthwardData::Alarm(data) => &data.values,
        }
    }
}
