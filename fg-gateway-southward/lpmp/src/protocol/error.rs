use thiserror::Error;

/// Protocol-level error type for LPMP.
///
/// Every variant here is locally recoverable at the scope where it occurs:
/// a parameter-level failure skips only that parameter, a frame-level
/// failure discards only that frame. Nothing in this module is fatal to the
/// decode stream; higher layers map these into the gateway's `DriverError`
/// domain where needed.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is shorter than the structure requires.
    #[error("frame too short: {len} bytes, need at least {min}")]
    FrameTooShort { len: usize, min: usize },
    /// Trailing checksum does not match the frame body.
    #[error("checksum mismatch: expected {expected:#06X}, got {actual:#06X}")]
    ChecksumMismatch { expected: u16, actual: u16 },
    /// A declared field length would read past the available frame region.
    #[error("parameter field out of bounds: need {need} bytes, {avail} available")]
    OutOfBounds { need: usize, avail: usize },
    /// Supplied value length disagrees with the registry descriptor.
    #[error("type mismatch for {name}: expected {expected} bytes, got {actual}")]
    TypeMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Type code has no registry entry.
    #[error("unknown parameter type code {0:#06X}")]
    UnknownParameter(u16),
    /// Sensor identifier cannot be resolved to a logical device.
    #[error("unknown sensor {0}")]
    UnknownSensor(String),
    /// Outbound frame construction rejected the parameter batch.
    #[error("invalid parameter batch: {0}")]
    InvalidBatch(String),
    /// Transport line does not carry a well-formed payload.
    #[error("malformed transport line: {0}")]
    MalformedLine(String),
    /// Underlying IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
