use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 6-byte sensor identifier, keyed and displayed as uppercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SensorId(pub [u8; 6]);

impl SensorId {
    pub fn new(id: [u8; 6]) -> Self {
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Parse a 12-character hex string into a sensor identifier.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 12 {
            return None;
        }
        let decoded = hex::decode(s).ok()?;
        let mut id = [0u8; 6];
        id.copy_from_slice(&decoded);
        Some(Self(id))
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// LPMP packet type encoded in the low 3 bits of the frame header byte.
///
/// Only monitoring and alarm packets carry business data; control packets
/// are used for outbound parameter query/set frames. Everything else is
/// ignored by the decode pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// 000: periodic monitoring report.
    Monitoring,
    /// 010: alarm report.
    Alarm,
    /// 100: control (parameter query/set).
    Control,
    /// Any other pattern; skipped by the decoder.
    Unknown(u8),
}

impl PacketType {
    /// Decode the low 3 bits of the header byte.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0b000 => PacketType::Monitoring,
            0b010 => PacketType::Alarm,
            0b100 => PacketType::Control,
            other => PacketType::Unknown(other),
        }
    }

    /// Encode this packet type into the low 3 bits.
    pub fn to_bits(self) -> u8 {
        match self {
            PacketType::Monitoring => 0b000,
            PacketType::Alarm => 0b010,
            PacketType::Control => 0b100,
            PacketType::Unknown(bits) => bits & 0x07,
        }
    }

    /// Whether this packet carries a business parameter list.
    pub fn is_business(self) -> bool {
        matches!(self, PacketType::Monitoring | PacketType::Alarm)
    }
}

/// Bit-level view over the 8-bit LPMP frame header.
///
/// Layout: bits 7-4 parameter count, bit 3 fragmentation indicator,
/// bits 2-0 packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw header byte exactly as carried on the wire.
    pub raw: u8,
}

impl FrameHeader {
    /// Create a new header wrapper from a raw byte.
    pub fn new(raw: u8) -> Self {
        Self { raw }
    }

    /// Compose a header byte from its fields.
    pub fn from_parts(param_count: u8, fragmented: bool, packet_type: PacketType) -> Self {
        let raw =
            ((param_count & 0x0F) << 4) | ((fragmented as u8) << 3) | packet_type.to_bits();
        Self { raw }
    }

    /// Number of parameters declared in the frame (4 bits).
    pub fn param_count(&self) -> u8 {
        self.raw >> 4
    }

    /// Whether the payload is a fragment of a larger business unit.
    pub fn is_fragmented(&self) -> bool {
        (self.raw >> 3) & 0x01 == 1
    }

    /// Interpret the low 3 bits as a packet type.
    pub fn packet_type(&self) -> PacketType {
        PacketType::from_bits(self.raw & 0x07)
    }
}

/// Fragment position flag carried in 2 bits of the fragmentation sub-header.
///
/// Bit 1 clear marks an opening fragment, bit 0 set marks the terminal
/// fragment: `00` first, `11` last, `10` middle, `01` a single-fragment
/// unit (first and last at once).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentFlag(u8);

impl FragmentFlag {
    pub const FIRST: Self = Self(0b00);
    pub const ONLY: Self = Self(0b01);
    pub const MIDDLE: Self = Self(0b10);
    pub const LAST: Self = Self(0b11);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0x03)
    }

    pub fn to_bits(self) -> u8 {
        self.0
    }

    /// Whether this fragment opens a business unit.
    pub fn is_first(self) -> bool {
        self.0 & 0b10 == 0
    }

    /// Whether this fragment terminates a business unit.
    pub fn is_last(self) -> bool {
        self.0 & 0b01 != 0
    }
}

/// One decoded fragment of a service data unit.
///
/// The business sequence distinguishes one unit's fragments from another's
/// for the same sensor; the fragment sequence orders payload chunks within
/// a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentRecord {
    pub sensor: SensorId,
    /// Business unit sequence number (6 bits effective).
    pub business_seq: u8,
    /// Fragment sequence number within the unit (7 bits effective).
    pub fragment_seq: u8,
    /// First/middle/last position flag.
    pub flag: FragmentFlag,
    /// Payload chunk carried by this fragment.
    pub payload: Bytes,
}
