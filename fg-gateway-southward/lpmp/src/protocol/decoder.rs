use super::{
    error::ProtocolError,
    frame::{FrameHeader, PacketType, SensorId},
    registry::ParamRegistry,
};
use fg_gateway_sdk::PointValue;
use std::sync::Arc;

/// Outcome of decoding one business payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReport {
    pub packet_type: PacketType,
    /// Decoded point values in wire order.
    pub values: Vec<PointValue>,
    /// Set when a bounds failure cut the parameter walk short. Values
    /// decoded before the failure are kept and not retracted.
    pub truncated: bool,
}

/// Walks a validated, unfragmented payload's self-describing parameter
/// list, resolving variable-length fields and dispatching each value
/// through the parameter registry.
#[derive(Debug, Clone)]
pub struct BusinessDecoder {
    registry: ParamRegistry,
}

impl BusinessDecoder {
    pub fn new(registry: ParamRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ParamRegistry {
        &self.registry
    }

    /// Decode one business payload.
    ///
    /// `body` starts at the 1-byte header; the frame checksum has already
    /// been stripped by validation. Returns `None` for packet types that do
    /// not carry business data (an intentional filter, not an error).
    ///
    /// Per-parameter failures skip only the affected parameter. A bounds
    /// failure aborts the remaining walk but keeps already-decoded values
    /// (partial success, no rollback).
    pub fn decode(&self, sensor: &SensorId, body: &[u8]) -> Option<DecodedReport> {
        let header = FrameHeader::new(*body.first()?);
        let packet_type = header.packet_type();
        if !packet_type.is_business() {
            tracing::trace!(sensor = %sensor, ?packet_type, "non-business packet ignored");
            return None;
        }

        let param_count = header.param_count();
        let mut values = Vec::with_capacity(param_count as usize);
        let mut cursor = &body[1..];
        let mut truncated = false;

        for index in 0..param_count {
            match self.next_param(&mut cursor) {
                Ok(Some(value)) => values.push(value),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        sensor = %sensor,
                        parameter = index,
                        declared = param_count,
                        error = %e,
                        "parameter walk aborted, keeping values decoded so far"
                    );
                    truncated = true;
                    break;
                }
            }
        }

        Some(DecodedReport {
            packet_type,
            values,
            truncated,
        })
    }

    /// Consume one TLV parameter from the cursor.
    ///
    /// `Ok(None)` means the parameter was structurally sound but skipped
    /// (unknown type code or value decode failure); `Err` means the frame
    /// region is exhausted and the walk cannot continue.
    fn next_param(&self, cursor: &mut &[u8]) -> Result<Option<PointValue>, ProtocolError> {
        let field = take(cursor, 2)?;
        let head16 = u16::from_be_bytes([field[0], field[1]]);
        let type_code = head16 >> 2;
        let length_flag = head16 & 0x03;

        let data_len = match length_flag {
            0 => 4,
            1 => take(cursor, 1)?[0] as usize,
            2 => {
                let len = take(cursor, 2)?;
                u16::from_be_bytes([len[0], len[1]]) as usize
            }
            _ => {
                let len = take(cursor, 3)?;
                ((len[0] as usize) << 16) | ((len[1] as usize) << 8) | len[2] as usize
            }
        };
        let raw = take(cursor, data_len)?;

        let Some(descriptor) = self.registry.lookup(type_code) else {
            let e = ProtocolError::UnknownParameter(type_code);
            tracing::debug!(error = %e, "no registry entry for parameter, skipped");
            return Ok(None);
        };

        match descriptor.decode(raw) {
            Ok(value) => Ok(Some(PointValue {
                point_key: Arc::from(descriptor.name),
                value,
            })),
            Err(e) => {
                tracing::warn!(
                    parameter = descriptor.name,
                    error = %e,
                    "parameter value decode failed, skipped"
                );
                Ok(None)
            }
        }
    }
}

/// Split `n` bytes off the front of the cursor, bounds-checked.
fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8], ProtocolError> {
    if cursor.len() < n {
        return Err(ProtocolError::OutOfBounds {
            need: n,
            avail: cursor.len(),
        });
    }
    let (head, rest) = cursor.split_at(n);
    *cursor = rest;
    Ok(head)
}
