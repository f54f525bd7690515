use crate::protocol::frame::SensorId;
use fg_gateway_sdk::{ConnectionPolicy, DriverConfig, RuntimeChannel, RuntimeDevice, Status};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Serial data bits configuration for the modem link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum DataBits {
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(data_bits: DataBits) -> Self {
        match data_bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Serial stop bits configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum StopBits {
    One = 1,
    Two = 2,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(stop_bits: StopBits) -> Self {
        match stop_bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Serial parity configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum LpmpParity {
    None = 0,
    Odd = 1,
    Even = 2,
}

impl From<LpmpParity> for tokio_serial::Parity {
    fn from(parity: LpmpParity) -> Self {
        match parity {
            LpmpParity::None => tokio_serial::Parity::None,
            LpmpParity::Odd => tokio_serial::Parity::Odd,
            LpmpParity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// LPMP connection configuration (serial or TCP).
///
/// The modem is normally attached over a native serial line; TCP supports
/// serial device servers and test harnesses with the same line protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LpmpConnection {
    /// Native serial connection to the AT modem.
    Serial {
        /// Serial port path, e.g. `/dev/ttyUSB0`.
        port: String,
        /// Baud rate (e.g. 115200).
        baud_rate: u32,
        /// Data bits (normally 8).
        data_bits: DataBits,
        /// Stop bits (1 or 2).
        stop_bits: StopBits,
        /// Parity configuration.
        parity: LpmpParity,
    },
    /// TCP connection to a serial device server.
    Tcp {
        /// Remote host or IP address.
        host: String,
        /// Remote TCP port.
        port: u16,
    },
}

/// LPMP channel configuration.
///
/// Holds physical link settings and protocol tuning parameters
/// deserialized from the channel's `driver_config` JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LpmpChannelConfig {
    /// Underlying connection configuration (serial or TCP).
    pub connection: LpmpConnection,
    /// Window within which all fragments of a business unit must arrive.
    ///
    /// Sensors retransmit a whole unit from its first fragment rather than
    /// resuming mid-unit, so an incomplete unit older than this window is
    /// unrecoverable and silently discarded.
    #[serde(default = "LpmpChannelConfig::default_reassembly_window_ms")]
    pub reassembly_window_ms: u64,
    /// Capacity of the bounded queue between the transport reader and the
    /// decode stage. A full queue blocks the reader, applying natural
    /// backpressure to the modem line.
    #[serde(default = "LpmpChannelConfig::default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,
}

impl LpmpChannelConfig {
    fn default_reassembly_window_ms() -> u64 {
        crate::protocol::reassembly::DEFAULT_REASSEMBLY_WINDOW.as_millis() as u64
    }

    fn default_ingest_queue_capacity() -> usize {
        100
    }
}

impl DriverConfig for LpmpChannelConfig {}

/// LPMP channel runtime model.
///
/// One channel corresponds to a single modem line carrying reports from
/// many field sensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LpmpChannel {
    pub id: i32,
    pub name: String,
    pub driver_id: i32,
    pub status: Status,
    /// Connection policy (timeouts and backoff settings).
    pub connection_policy: ConnectionPolicy,
    /// Protocol-specific channel configuration.
    pub config: LpmpChannelConfig,
}

impl RuntimeChannel for LpmpChannel {
    fn id(&self) -> i32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn driver_id(&self) -> i32 {
        self.driver_id
    }

    fn status(&self) -> Status {
        self.status
    }

    fn connection_policy(&self) -> &ConnectionPolicy {
        &self.connection_policy
    }

    fn config(&self) -> &dyn DriverConfig {
        &self.config
    }
}

/// LPMP device runtime model.
///
/// Each device corresponds to a single field sensor identified by its
/// 6-byte radio identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LpmpDevice {
    pub id: i32,
    /// Channel ID that owns this device.
    pub channel_id: i32,
    /// Human readable device name; reports are published under this name.
    pub device_name: String,
    /// Device type or model identifier.
    pub device_type: String,
    /// Device status flag.
    pub status: Status,
    /// 6-byte radio sensor identifier.
    pub sensor_id: SensorId,
}

impl RuntimeDevice for LpmpDevice {
    fn id(&self) -> i32 {
        self.id
    }

    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn device_type(&self) -> &str {
        &self.device_type
    }

    fn channel_id(&self) -> i32 {
        self.channel_id
    }

    fn status(&self) -> Status {
        self.status
    }
}
