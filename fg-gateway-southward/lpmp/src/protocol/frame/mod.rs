use crate::protocol::error::ProtocolError;
use bytes::Bytes;
use fg_gateway_sdk::WireDecode;

pub mod builder;
pub mod defs;

pub use builder::{build_query_all_frame, build_set_params_frame, ControlFrame, MAX_PARAM_BATCH};
pub use defs::{FragmentFlag, FragmentRecord, FrameHeader, PacketType, SensorId};

/// Minimum structural frame length: 6-byte id + 1 header byte + 2 checksum.
pub const MIN_FRAME_LEN: usize = 9;

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF) over `data`.
///
/// The encode and decode paths share this exact function; the trailing
/// checksum is carried big-endian on the wire.
pub fn checksum(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Validate one raw frame: minimum length, then the trailing checksum.
///
/// Returns the frame body (everything before the 2 checksum bytes) on
/// success.
pub fn validate_frame(frame: &[u8]) -> Result<&[u8], ProtocolError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::FrameTooShort {
            len: frame.len(),
            min: MIN_FRAME_LEN,
        });
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    let expected = u16::from_be_bytes([tail[0], tail[1]]);
    let actual = checksum(body);
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }
    Ok(body)
}

/// A validated LPMP frame split into sensor identifier and body.
///
/// `body` starts at the header byte; the trailing checksum has already been
/// stripped by validation.
#[derive(Debug, Clone, PartialEq)]
pub struct LpmpFrame {
    pub sensor: SensorId,
    pub body: Bytes,
}

impl LpmpFrame {
    /// Bit-level view over the frame's header byte.
    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(self.body[0])
    }

    /// Split the fragmentation sub-header off a fragmented frame's body.
    ///
    /// Layout after the header byte: one byte carrying the business unit
    /// sequence (bits 5-0) and the fragment flag (bits 7-6), one byte
    /// carrying the fragment sequence (bits 6-0), then the payload chunk.
    pub fn fragment_record(&self) -> Result<FragmentRecord, ProtocolError> {
        if self.body.len() < 3 {
            return Err(ProtocolError::OutOfBounds {
                need: 3,
                avail: self.body.len(),
            });
        }
        let a = self.body[1];
        let b = self.body[2];
        Ok(FragmentRecord {
            sensor: self.sensor,
            business_seq: a & 0x3F,
            flag: FragmentFlag::from_bits(a >> 6),
            fragment_seq: b & 0x7F,
            payload: self.body.slice(3..),
        })
    }
}

impl WireDecode for LpmpFrame {
    type Error = ProtocolError;
    type Context = ();

    fn parse<'a>(
        input: &'a [u8],
        _parent: &Bytes,
        _ctx: &Self::Context,
    ) -> Result<(&'a [u8], Self), Self::Error> {
        let body = validate_frame(input)?;
        let mut id = [0u8; 6];
        id.copy_from_slice(&body[0..6]);
        Ok((
            &input[input.len()..],
            LpmpFrame {
                sensor: SensorId(id),
                body: Bytes::copy_from_slice(&body[6..]),
            },
        ))
    }
}

impl LpmpFrame {
    /// Decode a single raw transmission (checksum still attached).
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        let (_, frame) = Self::parse(raw, &Bytes::new(), &())?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_crc(body: &[u8]) -> Vec<u8> {
        let mut out = body.to_vec();
        out.extend_from_slice(&checksum(body).to_be_bytes());
        out
    }

    #[test]
    fn checksum_round_trip_and_bit_flip() {
        let body = [0x23, 0x8A, 0x08, 0x26, 0x23, 0x19, 0x00, 0xAB];
        let framed = frame_with_crc(&body);
        assert!(validate_frame(&framed).is_ok());

        // Flipping any single bit anywhere in frame-plus-checksum must fail.
        for byte in 0..framed.len() {
            for bit in 0..8 {
                let mut corrupted = framed.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    validate_frame(&corrupted).is_err(),
                    "bit flip at byte {byte} bit {bit} passed validation"
                );
            }
        }
    }

    #[test]
    fn short_frame_rejected() {
        let err = validate_frame(&[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTooShort { len: 8, min: 9 }
        ));
    }

    #[test]
    fn minimal_frame_accepted() {
        // 6-byte id + header with zero parameters + checksum: 9 bytes total.
        let body = [0x23, 0x8A, 0x08, 0x26, 0x23, 0x19, 0x00];
        let framed = frame_with_crc(&body);
        assert_eq!(framed.len(), MIN_FRAME_LEN);

        let frame = LpmpFrame::decode(&framed).unwrap();
        assert_eq!(frame.sensor.to_string(), "238A08262319");
        assert_eq!(frame.header().param_count(), 0);
        assert!(!frame.header().is_fragmented());
    }

    #[test]
    fn fragment_sub_header_split() {
        // header: fragmented monitoring frame, then sseq=5 with LAST flag,
        // pseq=3, two chunk bytes.
        let header = FrameHeader::from_parts(0, true, PacketType::Monitoring);
        let body = [
            0x23, 0x8A, 0x08, 0x26, 0x23, 0x19,
            header.raw,
            (FragmentFlag::LAST.to_bits() << 6) | 5,
            3,
            0xDE, 0xAD,
        ];
        let frame = LpmpFrame::decode(&frame_with_crc(&body)).unwrap();
        let rec = frame.fragment_record().unwrap();
        assert_eq!(rec.business_seq, 5);
        assert_eq!(rec.fragment_seq, 3);
        assert!(rec.flag.is_last());
        assert_eq!(&rec.payload[..], &[0xDE, 0xAD]);
    }
}
