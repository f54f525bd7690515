use crate::protocol::error::ProtocolError;
use fg_gateway_sdk::{DeviceStatus, FgValue};
use std::collections::HashMap;

/// Registry key derived from the 14-bit parameter type code: the upper 3
/// bits classify the parameter feature, the lower 11 bits carry the type
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamKey {
    pub feature: u8,
    pub code: u16,
}

impl ParamKey {
    /// Split a raw 14-bit type code into its feature and code fields.
    pub fn from_type_code(type_code: u16) -> Self {
        Self {
            feature: ((type_code >> 11) & 0x07) as u8,
            code: type_code & 0x7FF,
        }
    }

    /// Recombine this key into the 14-bit type code.
    pub fn type_code(&self) -> u16 {
        ((self.feature as u16) << 11) | (self.code & 0x7FF)
    }
}

/// Byte-level decode kind of a registered parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCodec {
    /// 4-byte IEEE-754 single-precision float, little-endian.
    Float32Le,
    /// 4-byte unsigned integer, little-endian.
    UInt32Le,
    /// 2-byte unsigned integer, little-endian.
    UInt16Le,
    /// Single unsigned byte.
    UInt8,
    /// Status/enumeration byte; unrecognized codes map to unknown.
    Status,
}

impl ValueCodec {
    /// Exact number of value bytes this codec consumes.
    pub fn byte_len(self) -> usize {
        match self {
            ValueCodec::Float32Le | ValueCodec::UInt32Le => 4,
            ValueCodec::UInt16Le => 2,
            ValueCodec::UInt8 | ValueCodec::Status => 1,
        }
    }
}

/// Static description of one protocol parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDescriptor {
    /// Stable parameter name, used as the northward point key.
    pub name: &'static str,
    /// Engineering unit for display.
    pub unit: &'static str,
    pub codec: ValueCodec,
}

impl ParamDescriptor {
    /// Expected value length in bytes.
    pub fn byte_len(&self) -> usize {
        self.codec.byte_len()
    }

    /// Decode a raw value slice into a typed value.
    ///
    /// Fails with a type mismatch when the slice length disagrees with the
    /// descriptor; never reads past the supplied slice.
    pub fn decode(&self, data: &[u8]) -> Result<FgValue, ProtocolError> {
        if data.len() != self.byte_len() {
            return Err(ProtocolError::TypeMismatch {
                name: self.name,
                expected: self.byte_len(),
                actual: data.len(),
            });
        }
        Ok(match self.codec {
            ValueCodec::Float32Le => {
                let bits = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                FgValue::Float32(f32::from_bits(bits))
            }
            ValueCodec::UInt32Le => {
                FgValue::UInt32(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            ValueCodec::UInt16Le => FgValue::UInt16(u16::from_le_bytes([data[0], data[1]])),
            ValueCodec::UInt8 => FgValue::UInt8(data[0]),
            ValueCodec::Status => FgValue::Status(DeviceStatus::from_byte(data[0])),
        })
    }
}

/// Default parameter table.
///
/// Feature 0b000 covers the base physical quantities defined by the
/// protocol appendix; the water-level code is the one reported by the
/// deployed level gauges.
const DEFAULT_PARAMS: &[(ParamKey, ParamDescriptor)] = &[
    (
        ParamKey { feature: 0b000, code: 0b000_0000_0001 },
        ParamDescriptor { name: "length", unit: "m", codec: ValueCodec::Float32Le },
    ),
    (
        ParamKey { feature: 0b000, code: 0b000_0000_0010 },
        ParamDescriptor { name: "battery-charge", unit: "%", codec: ValueCodec::UInt16Le },
    ),
    (
        ParamKey { feature: 0b000, code: 0b000_0000_0011 },
        ParamDescriptor { name: "voltage", unit: "mV", codec: ValueCodec::UInt32Le },
    ),
    (
        ParamKey { feature: 0b000, code: 0b000_0000_0100 },
        ParamDescriptor { name: "state", unit: "", codec: ValueCodec::Status },
    ),
    (
        ParamKey { feature: 0b000, code: 0b000_0000_1000 },
        ParamDescriptor { name: "temperature", unit: "°C", codec: ValueCodec::Float32Le },
    ),
    (
        ParamKey { feature: 0b000, code: 0b000_0000_1001 },
        ParamDescriptor { name: "humidity", unit: "%RH", codec: ValueCodec::UInt16Le },
    ),
    (
        ParamKey { feature: 0b000, code: 0b000_0011_1000 },
        ParamDescriptor { name: "heartbeat", unit: "", codec: ValueCodec::UInt8 },
    ),
    (
        ParamKey { feature: 0b000, code: 0b000_0011_1001 },
        ParamDescriptor { name: "battery-level", unit: "%", codec: ValueCodec::UInt8 },
    ),
    (
        ParamKey { feature: 0b000, code: 0b000_1010_0011 },
        ParamDescriptor { name: "water-level", unit: "m", codec: ValueCodec::Float32Le },
    ),
];

/// Immutable mapping from parameter type codes to descriptors.
///
/// A registry is explicit state owned by a decoder instance, constructed
/// once and shared by reference; independent decoder instances can carry
/// different tables.
#[derive(Debug, Clone)]
pub struct ParamRegistry {
    table: HashMap<ParamKey, ParamDescriptor>,
}

impl ParamRegistry {
    /// Build a registry holding the protocol's default parameter table.
    pub fn with_defaults() -> Self {
        Self {
            table: DEFAULT_PARAMS.iter().copied().collect(),
        }
    }

    /// Build a registry from an explicit parameter table.
    pub fn from_entries(entries: impl IntoIterator<Item = (ParamKey, ParamDescriptor)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
        }
    }

    /// Look up a descriptor by raw 14-bit type code.
    ///
    /// A miss means the parameter is unknown to this gateway; callers skip
    /// the parameter rather than aborting the frame.
    pub fn lookup(&self, type_code: u16) -> Option<&ParamDescriptor> {
        self.table.get(&ParamKey::from_type_code(type_code))
    }

    /// Reverse lookup by parameter name, used when building outbound
    /// query/set frames.
    pub fn lookup_by_name(&self, name: &str) -> Option<(ParamKey, &ParamDescriptor)> {
        self.table
            .iter()
            .find(|(_, desc)| desc.name == name)
            .map(|(key, desc)| (*key, desc))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
