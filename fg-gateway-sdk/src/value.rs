use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Data types a southward point value can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Float32,
    UInt32,
    UInt16,
    UInt8,
    Status,
}

/// Device operating status reported by field sensors.
///
/// The wire encoding is a single status byte; codes outside the defined
/// range are preserved as `Unknown` instead of failing the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Other,
    Normal,
    Abnormal,
    Unknown(u8),
}

impl DeviceStatus {
    /// Decode an 8-bit status code.
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => DeviceStatus::Other,
            1 => DeviceStatus::Normal,
            2 => DeviceStatus::Abnormal,
            other => DeviceStatus::Unknown(other),
        }
    }

    /// Return the wire code for this status.
    pub fn as_byte(self) -> u8 {
        match self {
            DeviceStatus::Other => 0,
            DeviceStatus::Normal => 1,
            DeviceStatus::Abnormal => 2,
            DeviceStatus::Unknown(code) => code,
        }
    }
}

/// A strongly-typed runtime value for telemetry and alarm reports.
///
/// This is a closed union over the value kinds the sensor protocols can
/// produce, so northward consumers can match exhaustively instead of
/// handling an open `any` type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FgValue {
    Float32(f32),
    UInt32(u32),
    UInt16(u16),
    UInt8(u8),
    Status(DeviceStatus),
}

impl FgValue {
    /// Return the corresponding SDK `DataType` for this value.
    #[inline]
    pub fn data_type(&self) -> DataType {
        match self {
            FgValue::Float32(_) => DataType::Float32,
            FgValue::UInt32(_) => DataType::UInt32,
            FgValue::UInt16(_) => DataType::UInt16,
            FgValue::UInt8(_) => DataType::UInt8,
            FgValue::Status(_) => DataType::Status,
        }
    }

    /// Convert this typed value into a `serde_json::Value` for northbound
    /// encoding. Not intended for hot-path use inside collectors.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            FgValue::Float32(v) => serde_json::Number::from_f64(f64::from(*v))
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FgValue::UInt32(v) => serde_json::Value::Number((*v).into()),
            FgValue::UInt16(v) => serde_json::Value::Number((*v as u64).into()),
            FgValue::UInt8(v) => serde_json::Value::Number((*v as u64).into()),
            FgValue::Status(s) => serde_json::Value::Number((s.as_byte() as u64).into()),
        }
    }
}

/// One decoded point value keyed by its stable parameter name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointValue {
    /// Stable point key within a device (string identifier).
    pub point_key: Arc<str>,
    /// Strongly-typed value.
    pub value: FgValue,
}
