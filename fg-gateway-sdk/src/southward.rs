use crate::{error::PublishError, model::NorthwardData, retry::RetryPolicy, DriverResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use downcast_rs::{impl_downcast, DowncastSync};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{fmt::Debug, sync::Arc};
use tokio::sync::watch;

/// Enable/disable flag for runtime entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum Status {
    Disabled = 0,
    Enabled = 1,
}

/// Connection state of a southward channel, broadcast by the driver's
/// supervisor over a `watch` channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SouthwardConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed(String),
}

/// Connection lifecycle tuning for a southward channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPolicy {
    /// Upper bound for a single connect attempt in milliseconds.
    #[serde(default = "ConnectionPolicy::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Reconnect backoff settings.
    #[serde(default)]
    pub backoff: RetryPolicy,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            backoff: RetryPolicy::default(),
        }
    }
}

impl ConnectionPolicy {
    fn default_connect_timeout_ms() -> u64 {
        5_000
    }
}

/// Marker trait for protocol-specific channel configuration.
pub trait DriverConfig: DowncastSync + Debug {}
impl_downcast!(sync DriverConfig);

/// Runtime view of a southward channel as seen by the host.
pub trait RuntimeChannel: DowncastSync + Debug {
    fn id(&self) -> i32;
    fn name(&self) -> &str;
    fn driver_id(&self) -> i32;
    fn status(&self) -> Status;
    fn connection_policy(&self) -> &ConnectionPolicy;
    fn config(&self) -> &dyn DriverConfig;
}
impl_downcast!(sync RuntimeChannel);

/// Runtime view of a device under a southward channel.
pub trait RuntimeDevice: DowncastSync + Debug {
    fn id(&self) -> i32;
    fn device_name(&self) -> &str;
    fn device_type(&self) -> &str;
    fn channel_id(&self) -> i32;
    fn status(&self) -> Status;
}
impl_downcast!(sync RuntimeDevice);

/// Maps a transport-level sensor identifier to a logical device name.
///
/// Identifiers are keyed as uppercase hex strings. A `None` result means
/// the sensor is not provisioned; drivers discard such reports.
pub trait DeviceResolver: Send + Sync + Debug {
    fn device_for_sensor(&self, sensor_hex: &str) -> Option<Arc<str>>;
}

/// Publisher interface used by drivers to send northbound data.
///
/// Implementations should be non-blocking and back pressure-aware,
/// propagating a full queue via `PublishError::QueueFull` instead of
/// awaiting.
pub trait NorthwardPublisher: Send + Sync + Debug {
    fn try_publish(&self, data: Arc<NorthwardData>) -> Result<(), PublishError>;
}

/// Runtime init context for a southbound driver.
///
/// Consolidated view of channel topology plus host-injected capabilities
/// for driver initialization.
#[derive(Debug, Clone)]
pub struct SouthwardInitContext {
    /// All devices under this channel
    pub devices: Vec<Arc<dyn RuntimeDevice>>,
    /// Runtime channel configuration and policies
    pub runtime_channel: Arc<dyn RuntimeChannel>,
    /// Northbound publisher injected by the host
    pub publisher: Arc<dyn NorthwardPublisher>,
}

/// Aggregated health snapshot reported by a driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverHealth {
    pub status: HealthStatus,
    pub last_activity: DateTime<Utc>,
    /// Frames received from the transport, valid or not.
    pub frames_total: u64,
    /// Frames discarded for structural or resolution failures.
    pub frames_dropped: u64,
    /// Point values emitted northward.
    pub values_emitted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Southbound driver lifecycle contract.
///
/// Drivers are self-supervised: `start` spawns the internal transport
/// supervisor and processing stages, `stop` cancels them. Connection state
/// is observable through `subscribe_connection_state`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Start the driver. Safe to call multiple times; subsequent calls are
    /// no-ops.
    async fn start(&self) -> DriverResult<()>;

    /// Stop the driver and release resources.
    async fn stop(&self) -> DriverResult<()>;

    /// Subscribe to channel connection state updates.
    fn subscribe_connection_state(&self) -> watch::Receiver<SouthwardConnectionState>;

    /// Provide aggregated driver health information.
    async fn health_check(&self) -> DriverResult<DriverHealth>;
}
