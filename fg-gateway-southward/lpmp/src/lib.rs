// LPMP southward driver library entry.
//
// This crate implements the LPMP micropower wireless sensor protocol for the
// `fieldgate` runtime: field sensors (water level, temperature/humidity)
// report telemetry over a constrained serial transport in a compact binary
// framing, possibly split across multiple physical transmissions. The driver
// reassembles, validates and decodes those reports into typed point values
// and publishes them northward.

mod driver;
mod supervisor;
mod transport;
mod types;

pub mod protocol;

pub use driver::LpmpDriver;
pub use transport::DrxLineCodec;
pub use types::{
    DataBits, LpmpChannel, LpmpChannelConfig, LpmpConnection, LpmpDevice, LpmpParity, StopBits,
};
