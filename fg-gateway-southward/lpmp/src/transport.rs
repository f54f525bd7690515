use crate::protocol::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Line-oriented codec for the AT-modem transport.
///
/// The radio modem reports received frames as ASCII lines of the form
/// `+DRX:<sensorHex>,<byteCount>,<hexPayload>`; the payload hex is decoded
/// into raw frame bytes. Unrelated modem chatter (command echoes, `OK`
/// lines) and malformed DRX lines are skipped without erroring the stream —
/// a garbled line must never stall ingestion. Outbound frames are written
/// as `AT+DTX=<byteCount>,<hexPayload>` lines.
#[derive(Debug, Default, Clone)]
pub struct DrxLineCodec;

/// Parse one `+DRX:` response line into raw frame bytes.
///
/// Example: `+DRX:238A08262319,3,111111` → `[0x11, 0x11, 0x11]`.
pub fn parse_drx_line(line: &str) -> Result<Bytes, ProtocolError> {
    let rest = line
        .strip_prefix("+DRX:")
        .ok_or_else(|| ProtocolError::MalformedLine(format!("not a DRX line: {line}")))?;

    let mut parts = rest.splitn(3, ',');
    let _sensor = parts
        .next()
        .ok_or_else(|| ProtocolError::MalformedLine(format!("missing sensor field: {line}")))?;
    let count: usize = parts
        .next()
        .and_then(|c| c.trim().parse().ok())
        .ok_or_else(|| ProtocolError::MalformedLine(format!("bad byte count: {line}")))?;
    let payload = parts
        .next()
        .ok_or_else(|| ProtocolError::MalformedLine(format!("missing payload: {line}")))?;

    let decoded = hex::decode(payload.trim())
        .map_err(|e| ProtocolError::MalformedLine(format!("bad payload hex: {e}")))?;
    if decoded.len() != count {
        return Err(ProtocolError::MalformedLine(format!(
            "declared {count} bytes, payload carries {}",
            decoded.len()
        )));
    }
    Ok(Bytes::from(decoded))
}

impl Decoder for DrxLineCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };
            let line = src.split_to(pos + 1);
            let Ok(text) = std::str::from_utf8(&line) else {
                tracing::trace!("non-UTF8 transport line skipped");
                continue;
            };
            let text = text.trim();
            if !text.starts_with("+DRX:") {
                continue;
            }
            match parse_drx_line(text) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    tracing::debug!(error = %e, "malformed DRX line skipped");
                    continue;
                }
            }
        }
    }
}

impl Encoder<Bytes> for DrxLineCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let hex_payload = hex::encode_upper(&frame);
        dst.reserve(hex_payload.len() + 16);
        dst.put_slice(b"AT+DTX=");
        dst.put_slice(frame.len().to_string().as_bytes());
        dst.put_u8(b',');
        dst.put_slice(hex_payload.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
