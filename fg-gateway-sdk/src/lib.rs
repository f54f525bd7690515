mod error;
mod model;
mod retry;
mod southward;
mod value;
mod wire;

pub type DriverResult<T> = Result<T, DriverError>;

pub use error::{DriverError, PublishError};
pub use model::{AlarmData, NorthwardData, TelemetryData};
pub use retry::{build_exponential_backoff, RetryPolicy};
pub use southward::{
    ConnectionPolicy, DeviceResolver, Driver, DriverConfig, DriverHealth, HealthStatus,
    NorthwardPublisher, RuntimeChannel, RuntimeDevice, SouthwardConnectionState,
    SouthwardInitContext, Status,
};
pub use value::{DataType, DeviceStatus, FgValue, PointValue};
pub use wire::{WireDecode, WireEncode};
