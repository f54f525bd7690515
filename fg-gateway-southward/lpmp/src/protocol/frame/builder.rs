use super::{
    checksum,
    defs::{FrameHeader, PacketType, SensorId},
};
use crate::protocol::{error::ProtocolError, registry::ParamRegistry};
use bytes::{BufMut, BytesMut};
use fg_gateway_sdk::WireEncode;

/// Maximum number of parameters in one query/set batch.
pub const MAX_PARAM_BATCH: usize = 16;

/// Control-type code of the general parameter query/set operation (7 bit).
const CTRL_GENERAL_PARAMS: u8 = 0x03;

/// Parameter count value signalling "query all parameters".
const QUERY_ALL_COUNT: u8 = 0x0F;

/// Outbound "general parameter query/set" control frame.
///
/// Layout: sensor id, header byte (`paramCount << 4 | control`), control
/// byte (`ctrlType << 1 | requestSet`), then — only when setting — each
/// parameter's 2-byte little-endian field header followed by its
/// fixed-length data, and finally the shared checksum, big-endian.
///
/// In control frames the 2-bit length flag encodes the value width
/// directly (0 → 4 bytes, 1 → 1, 2 → 2, 3 → 3); no explicit length bytes
/// are carried.
pub struct ControlFrame<'a> {
    pub sensor: SensorId,
    /// `None` queries all parameters; `Some` sets the named parameters in
    /// order, each with its fixed-length value bytes.
    pub set_params: Option<&'a [(&'a str, &'a [u8])]>,
}

impl ControlFrame<'_> {
    fn body_len(&self, registry: &ParamRegistry) -> usize {
        match self.set_params {
            None => 0,
            Some(params) => params
                .iter()
                .map(|(name, value)| {
                    // Prefer the descriptor's fixed length; fall back to the
                    // supplied value so a bad batch still reports a stable
                    // length before validation rejects it.
                    let len = registry
                        .lookup_by_name(name)
                        .map(|(_, d)| d.byte_len())
                        .unwrap_or(value.len());
                    2 + len
                })
                .sum(),
        }
    }
}

impl WireEncode for ControlFrame<'_> {
    type Error = ProtocolError;
    type Context = ParamRegistry;

    fn encoded_len(&self, ctx: &Self::Context) -> usize {
        // id(6) + header(1) + ctrl(1) + parameter list + checksum(2)
        10 + self.body_len(ctx)
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B, ctx: &Self::Context) -> Result<(), Self::Error> {
        let (param_count, request_set) = match self.set_params {
            None => (QUERY_ALL_COUNT, 0u8),
            Some(params) => {
                if params.is_empty() || params.len() > MAX_PARAM_BATCH {
                    return Err(ProtocolError::InvalidBatch(format!(
                        "parameter count must be 1..={MAX_PARAM_BATCH}, got {}",
                        params.len()
                    )));
                }
                (params.len() as u8, 1u8)
            }
        };

        let mut buf = BytesMut::with_capacity(self.encoded_len(ctx));
        buf.put_slice(self.sensor.as_bytes());
        buf.put_u8(FrameHeader::from_parts(param_count, false, PacketType::Control).raw);
        buf.put_u8(((CTRL_GENERAL_PARAMS & 0x7F) << 1) | request_set);

        if let Some(params) = self.set_params {
            for (name, value) in params {
                let (key, descriptor) = ctx.lookup_by_name(name).ok_or_else(|| {
                    ProtocolError::InvalidBatch(format!("unknown parameter {name:?}"))
                })?;
                if value.len() != descriptor.byte_len() {
                    return Err(ProtocolError::TypeMismatch {
                        name: descriptor.name,
                        expected: descriptor.byte_len(),
                        actual: value.len(),
                    });
                }
                let flag = control_length_flag(descriptor.byte_len()).ok_or_else(|| {
                    ProtocolError::InvalidBatch(format!(
                        "parameter {name:?} width {} not expressible in a control frame",
                        descriptor.byte_len()
                    ))
                })?;
                let head16 = (key.type_code() << 2) | flag as u16;
                buf.put_u16_le(head16);
                buf.put_slice(value);
            }
        }

        let crc = checksum(&buf);
        dst.put_slice(&buf);
        dst.put_u16(crc);
        Ok(())
    }
}

/// Map a fixed value width onto the control-frame length flag.
fn control_length_flag(len: usize) -> Option<u8> {
    match len {
        4 => Some(0),
        1 => Some(1),
        2 => Some(2),
        3 => Some(3),
        _ => None,
    }
}

/// Build a "query all general parameters" frame for `sensor`.
pub fn build_query_all_frame(sensor: SensorId, registry: &ParamRegistry) -> Vec<u8> {
    let frame = ControlFrame {
        sensor,
        set_params: None,
    };
    let mut out = BytesMut::with_capacity(frame.encoded_len(registry));
    // Query-all carries no parameter list, so encoding cannot fail.
    if frame.encode_to(&mut out, registry).is_err() {
        unreachable!("query-all control frame has no fallible fields");
    }
    out.to_vec()
}

/// Build a "set general parameters" frame for `sensor`.
///
/// Each entry names a registered parameter and supplies its value bytes;
/// the batch is rejected when empty, oversized, naming an unregistered
/// parameter, or carrying a value whose length disagrees with the
/// descriptor.
pub fn build_set_params_frame(
    sensor: SensorId,
    params: &[(&str, &[u8])],
    registry: &ParamRegistry,
) -> Result<Vec<u8>, ProtocolError> {
    let frame = ControlFrame {
        sensor,
        set_params: Some(params),
    };
    let mut out = BytesMut::with_capacity(frame.encoded_len(registry));
    frame.encode_to(&mut out, registry)?;
    Ok(out.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::validate_frame;

    fn sensor() -> SensorId {
        SensorId([0x23, 0x8A, 0x08, 0x26, 0x23, 0x19])
    }

    #[test]
    fn query_all_frame_layout() {
        let registry = ParamRegistry::with_defaults();
        let frame = build_query_all_frame(sensor(), &registry);
        assert_eq!(frame.len(), 10);

        let body = validate_frame(&frame).expect("self-built frame validates");
        let header = FrameHeader::new(body[6]);
        assert_eq!(header.param_count(), 0x0F);
        assert!(!header.is_fragmented());
        assert_eq!(header.packet_type(), PacketType::Control);
        // ctrl byte: type 0x03, request flag clear.
        assert_eq!(body[7], 0x06);
    }

    #[test]
    fn set_frame_carries_le_field_headers() {
        let registry = ParamRegistry::with_defaults();
        let frame = build_set_params_frame(
            sensor(),
            &[("heartbeat", &[30]), ("humidity", &60u16.to_le_bytes())],
            &registry,
        )
        .unwrap();

        let body = validate_frame(&frame).unwrap();
        let header = FrameHeader::new(body[6]);
        assert_eq!(header.param_count(), 2);
        assert_eq!(body[7], 0x07); // ctrl type 0x03, set flag

        // heartbeat: code 0x038, width 1 → flag 1; header is little-endian.
        let head16 = u16::from_le_bytes([body[8], body[9]]);
        assert_eq!(head16 >> 2, 0b000_0011_1000);
        assert_eq!(head16 & 0x03, 1);
        assert_eq!(body[10], 30);

        // humidity: code 0x009, width 2 → flag 2.
        let head16 = u16::from_le_bytes([body[11], body[12]]);
        assert_eq!(head16 >> 2, 0b000_0000_1001);
        assert_eq!(head16 & 0x03, 2);
        assert_eq!(&body[13..15], &60u16.to_le_bytes());
    }

    #[test]
    fn rejects_empty_and_oversized_batches() {
        let registry = ParamRegistry::with_defaults();
        assert!(matches!(
            build_set_params_frame(sensor(), &[], &registry),
            Err(ProtocolError::InvalidBatch(_))
        ));

        let too_many: Vec<(&str, &[u8])> = (0..MAX_PARAM_BATCH + 1)
            .map(|_| ("heartbeat", &[0u8][..]))
            .collect();
        assert!(matches!(
            build_set_params_frame(sensor(), &too_many, &registry),
            Err(ProtocolError::InvalidBatch(_))
        ));
    }

    #[test]
    fn rejects_unknown_name_and_wrong_width() {
        let registry = ParamRegistry::with_defaults();
        assert!(matches!(
            build_set_params_frame(sensor(), &[("no-such", &[0])], &registry),
            Err(ProtocolError::InvalidBatch(_))
        ));
        assert!(matches!(
            build_set_params_frame(sensor(), &[("humidity", &[0u8][..])], &registry),
            Err(ProtocolError::TypeMismatch {
                name: "humidity",
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn encoded_len_matches_output() {
        let registry = ParamRegistry::with_defaults();
        let params: &[(&str, &[u8])] = &[("temperature", &21.5f32.to_le_bytes())];
        let frame = ControlFrame {
            sensor: sensor(),
            set_params: Some(params),
        };
        let built = build_set_params_frame(sensor(), params, &registry).unwrap();
        assert_eq!(frame.encoded_len(&registry), built.len());
    }
}
