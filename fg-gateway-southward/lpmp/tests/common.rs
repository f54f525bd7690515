use fg_driver_lpmp::{
    protocol::frame::{checksum, FragmentFlag, FrameHeader, PacketType, SensorId},
    LpmpChannel, LpmpChannelConfig, LpmpConnection, LpmpDevice,
};
use fg_gateway_sdk::{
    ConnectionPolicy, NorthwardData, NorthwardPublisher, PublishError, RuntimeChannel,
    RuntimeDevice, SouthwardInitContext, Status,
};
use std::sync::{Arc, Mutex, Once};
use tracing::Level;

/// Capturing northward publisher used only for testing.
///
/// Published reports are retained so tests can assert on decoded device
/// names and values.
#[derive(Debug, Default)]
pub struct CapturePublisher {
    data: Mutex<Vec<Arc<NorthwardData>>>,
}

impl CapturePublisher {
    pub fn published(&self) -> Vec<Arc<NorthwardData>> {
        self.data.lock().unwrap().clone()
    }
}

impl NorthwardPublisher for CapturePublisher {
    fn try_publish(&self, data: Arc<NorthwardData>) -> Result<(), PublishError> {
        self.data.lock().unwrap().push(data);
        Ok(())
    }
}

/// Global one-time tracing initialization guard for LPMP integration tests.
static INIT_TRACING: Once = Once::new();

/// Initialize a structured `tracing` subscriber for test runs.
///
/// Uses `DEBUG` as the maximum level so reassembly and reconnect decisions
/// are visible with `--nocapture`; targets and timestamps are disabled to
/// keep output compact.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

/// The water-level gauge used throughout the integration tests.
pub fn test_sensor() -> SensorId {
    SensorId::from_hex("238A08262319").expect("valid sensor hex")
}

/// Append the shared CRC to a frame body.
pub fn frame_with_crc(body: &[u8]) -> Vec<u8> {
    let mut out = body.to_vec();
    out.extend_from_slice(&checksum(body).to_be_bytes());
    out
}

/// TLV entry with length flag 0 (fixed 4 bytes).
pub fn tlv_fixed4(type_code: u16, value: [u8; 4]) -> Vec<u8> {
    let mut out = (type_code << 2).to_be_bytes().to_vec();
    out.extend_from_slice(&value);
    out
}

/// TLV entry with length flag 1 (explicit 1-byte length).
pub fn tlv_explicit1(type_code: u16, value: &[u8]) -> Vec<u8> {
    let mut out = ((type_code << 2) | 1).to_be_bytes().to_vec();
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    out
}

/// A complete unfragmented business frame, checksum attached.
pub fn business_frame(
    sensor: SensorId,
    packet: PacketType,
    param_count: u8,
    params: &[u8],
) -> Vec<u8> {
    let mut body = sensor.as_bytes().to_vec();
    body.push(FrameHeader::from_parts(param_count, false, packet).raw);
    body.extend_from_slice(params);
    frame_with_crc(&body)
}

/// A complete fragment-carrying frame, checksum attached.
pub fn fragment_frame(
    sensor: SensorId,
    packet: PacketType,
    business_seq: u8,
    fragment_seq: u8,
    flag: FragmentFlag,
    chunk: &[u8],
) -> Vec<u8> {
    let mut body = sensor.as_bytes().to_vec();
    body.push(FrameHeader::from_parts(0, true, packet).raw);
    body.push((flag.to_bits() << 6) | (business_seq & 0x3F));
    body.push(fragment_seq & 0x7F);
    body.extend_from_slice(chunk);
    frame_with_crc(&body)
}

/// The payload a fragmented unit reassembles into: an unfragmented
/// business body of header byte plus parameter list.
pub fn sdu_body(packet: PacketType, param_count: u8, params: &[u8]) -> Vec<u8> {
    let mut out = vec![FrameHeader::from_parts(param_count, false, packet).raw];
    out.extend_from_slice(params);
    out
}

/// Render a frame as the modem's `+DRX:` report line.
pub fn drx_line(sensor: SensorId, frame: &[u8]) -> String {
    format!("+DRX:{},{},{}\r\n", sensor, frame.len(), hex::encode_upper(frame))
}

/// Build a minimal LPMP channel and device list for integration testing.
///
/// The channel uses a TCP connection pointing at the provided host/port,
/// standing in for a serial device server with the same line protocol.
pub fn build_test_topology(host: &str, port: u16) -> (LpmpChannel, Vec<LpmpDevice>) {
    let channel = LpmpChannel {
        id: 1,
        name: "test-channel".to_string(),
        driver_id: 1,
        status: Status::Enabled,
        connection_policy: ConnectionPolicy::default(),
        config: LpmpChannelConfig {
            connection: LpmpConnection::Tcp {
                host: host.to_string(),
                port,
            },
            reassembly_window_ms: 20_000,
            ingest_queue_capacity: 16,
        },
    };

    let devices = vec![LpmpDevice {
        id: 1,
        channel_id: channel.id,
        device_name: "flood-gauge-1".to_string(),
        device_type: "water-level-sensor".to_string(),
        status: Status::Enabled,
        sensor_id: test_sensor(),
    }];

    (channel, devices)
}

/// Wire test models into the init context expected by
/// `LpmpDriver::with_context`.
pub fn build_init_context(
    channel: LpmpChannel,
    devices: Vec<LpmpDevice>,
    publisher: Arc<CapturePublisher>,
) -> SouthwardInitContext {
    let runtime_channel: Arc<dyn RuntimeChannel> = Arc::new(channel);
    let devices: Vec<Arc<dyn RuntimeDevice>> = devices
        .into_iter()
        .map(|d| Arc::new(d) as Arc<dyn RuntimeDevice>)
        .collect();

    SouthwardInitContext {
        devices,
        runtime_channel,
        publisher,
    }
}
