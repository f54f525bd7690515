use crate::{
    protocol::{
        decoder::BusinessDecoder,
        error::ProtocolError,
        frame::{build_query_all_frame, build_set_params_frame, LpmpFrame, PacketType, SensorId},
        reassembly::Reassembler,
        registry::ParamRegistry,
    },
    supervisor::LpmpSupervisor,
    types::{LpmpChannel, LpmpDevice},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use fg_gateway_sdk::{
    AlarmData, DeviceResolver, Driver, DriverError, DriverHealth, DriverResult, HealthStatus,
    NorthwardData, NorthwardPublisher, RuntimeDevice, SouthwardConnectionState,
    SouthwardInitContext, TelemetryData,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

/// Capacity of the outbound control-frame queue. Control traffic is rare
/// (operator-initiated query/set), so a small buffer suffices.
const OUTBOUND_QUEUE_CAPACITY: usize = 16;

/// Shared ingest counters for health reporting.
#[derive(Debug, Default)]
struct DriverStats {
    /// Frames received from the transport, valid or not.
    frames_total: AtomicU64,
    /// Frames discarded for structural or resolution failures.
    frames_dropped: AtomicU64,
    /// Point values emitted northward.
    values_emitted: AtomicU64,
    /// Unix millis of the last transport activity.
    last_activity_ms: AtomicI64,
}

impl DriverStats {
    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }
}

/// Sensor-identifier to device-name mapping built from the channel
/// topology at initialization.
#[derive(Debug, Default)]
struct DeviceTable {
    map: HashMap<String, Arc<str>>,
}

impl DeviceTable {
    fn from_devices(devices: &[Arc<dyn RuntimeDevice>]) -> DriverResult<Self> {
        let mut map = HashMap::with_capacity(devices.len());
        for device in devices {
            let d = device
                .downcast_ref::<LpmpDevice>()
                .ok_or(DriverError::InvalidEntity(
                    "Device is not an LPMP device in this driver".to_string(),
                ))?;
            map.insert(
                d.sensor_id.to_string(),
                Arc::<str>::from(d.device_name.as_str()),
            );
        }
        Ok(Self { map })
    }
}

impl DeviceResolver for DeviceTable {
    fn device_for_sensor(&self, sensor_hex: &str) -> Option<Arc<str>> {
        self.map.get(sensor_hex).cloned()
    }
}

/// The reassembly-and-decode stage: consumes raw frames from the transport
/// queue, validates them, routes fragments through the reassembler and
/// publishes decoded reports northward.
///
/// One stage task owns each sensor's cache, so fragments of a single
/// sensor are processed in strict arrival order relative to each other.
struct DecodeStage {
    resolver: Arc<dyn DeviceResolver>,
    publisher: Arc<dyn NorthwardPublisher>,
    decoder: Arc<BusinessDecoder>,
    reassembler: Reassembler,
    stats: Arc<DriverStats>,
}

impl DecodeStage {
    fn handle_frame(&self, raw: Bytes) {
        self.stats.frames_total.fetch_add(1, Ordering::Relaxed);
        self.stats.touch();

        let frame = match LpmpFrame::decode(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "frame rejected");
                return;
            }
        };

        let sensor = frame.sensor;
        let Some(device) = self.resolver.device_for_sensor(&sensor.to_string()) else {
            self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            let e = ProtocolError::UnknownSensor(sensor.to_string());
            tracing::warn!(error = %e, "frame discarded");
            return;
        };

        if frame.header().is_fragmented() {
            match frame.fragment_record() {
                Ok(record) => {
                    if let Some(sdu) = self.reassembler.ingest(record) {
                        self.emit(&sensor, device, &sdu.payload);
                    }
                }
                Err(e) => {
                    self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(sensor = %sensor, error = %e, "fragment sub-header rejected");
                }
            }
        } else {
            self.emit(&sensor, device, &frame.body);
        }
    }

    fn emit(&self, sensor: &SensorId, device: Arc<str>, body: &[u8]) {
        let Some(report) = self.decoder.decode(sensor, body) else {
            return;
        };
        if report.values.is_empty() {
            return;
        }
        self.stats
            .values_emitted
            .fetch_add(report.values.len() as u64, Ordering::Relaxed);

        let data = match report.packet_type {
            PacketType::Monitoring => {
                NorthwardData::Telemetry(TelemetryData::new(device, report.values))
            }
            PacketType::Alarm => NorthwardData::Alarm(AlarmData::new(device, report.values)),
            _ => return,
        };
        if let Err(e) = self.publisher.try_publish(Arc::new(data)) {
            tracing::warn!(sensor = %sensor, error = %e, "northward publish failed, report dropped");
        }
    }
}

/// LPMP southward driver.
///
/// Unlike the request/response meter drivers, LPMP sensors report
/// unsolicited: the driver listens on the modem line, reassembles
/// fragmented business units and publishes decoded values as they arrive.
pub struct LpmpDriver {
    /// Runtime channel configuration.
    inner: Arc<LpmpChannel>,
    /// Sensor-id to device-name resolution table.
    resolver: Arc<DeviceTable>,
    /// Northbound publisher injected by the host.
    publisher: Arc<dyn NorthwardPublisher>,
    /// Business decoder owning the parameter registry.
    decoder: Arc<BusinessDecoder>,
    /// Driver-level cancellation token.
    cancel: CancellationToken,
    /// Connection state channel sender.
    conn_tx: watch::Sender<SouthwardConnectionState>,
    /// Connection state channel receiver.
    conn_rx: watch::Receiver<SouthwardConnectionState>,
    /// Started flag to prevent duplicate `start` calls.
    started: AtomicBool,
    /// Outbound control-frame queue feeding the supervisor's writer.
    outbound_tx: mpsc::Sender<Bytes>,
    /// Receiver side, consumed once by `start`.
    outbound_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
    /// Ingest counters for health reporting.
    stats: Arc<DriverStats>,
}

impl LpmpDriver {
    /// Construct a driver instance from the initialization context.
    ///
    /// Validates the runtime channel type and indexes the channel's devices
    /// by sensor identifier for report resolution.
    pub fn with_context(ctx: SouthwardInitContext) -> DriverResult<Self> {
        let inner = ctx
            .runtime_channel
            .downcast_arc::<LpmpChannel>()
            .map_err(|_| {
                DriverError::ConfigurationError("Invalid LpmpChannel runtime type".to_string())
            })?;

        let resolver = Arc::new(DeviceTable::from_devices(&ctx.devices)?);
        let (conn_tx, conn_rx) = watch::channel(SouthwardConnectionState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        Ok(Self {
            inner,
            resolver,
            publisher: ctx.publisher,
            decoder: Arc::new(BusinessDecoder::new(ParamRegistry::with_defaults())),
            cancel: CancellationToken::new(),
            conn_tx,
            conn_rx,
            started: AtomicBool::new(false),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            stats: Arc::new(DriverStats::default()),
        })
    }

    /// Queue a "query all general parameters" control frame for `sensor`.
    pub async fn query_parameters(&self, sensor: SensorId) -> DriverResult<()> {
        let frame = build_query_all_frame(sensor, self.decoder.registry());
        self.send_control(frame).await
    }

    /// Queue a "set general parameters" control frame for `sensor`.
    ///
    /// Each entry names a registered parameter and supplies its
    /// fixed-length value bytes.
    pub async fn set_parameters(
        &self,
        sensor: SensorId,
        params: &[(&str, &[u8])],
    ) -> DriverResult<()> {
        let frame = build_set_params_frame(sensor, params, self.decoder.registry())?;
        self.send_control(frame).await
    }

    async fn send_control(&self, frame: Vec<u8>) -> DriverResult<()> {
        self.outbound_tx
            .send(Bytes::from(frame))
            .await
            .map_err(|_| DriverError::SessionError("transport writer closed".to_string()))
    }
}

#[async_trait]
impl Driver for LpmpDriver {
    /// Start the LPMP driver.
    ///
    /// Spawns the transport supervisor and the reassembly/decode stage,
    /// connected by a bounded queue. Safe to call multiple times;
    /// subsequent calls are no-ops.
    async fn start(&self) -> DriverResult<()> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let config = &self.inner.config;
        let (ingest_tx, mut ingest_rx) =
            mpsc::channel::<Bytes>(config.ingest_queue_capacity.max(1));

        let mut rx_guard = self.outbound_rx.lock().await;
        let outbound_rx = rx_guard.take().ok_or(DriverError::ExecutionError(
            "outbound receiver already consumed".to_string(),
        ))?;

        let supervisor = LpmpSupervisor::new(self.cancel.child_token(), self.conn_tx.clone());
        supervisor
            .run(Arc::clone(&self.inner), ingest_tx, outbound_rx)
            .await?;

        let stage = DecodeStage {
            resolver: Arc::clone(&self.resolver) as Arc<dyn DeviceResolver>,
            publisher: Arc::clone(&self.publisher),
            decoder: Arc::clone(&self.decoder),
            reassembler: Reassembler::new(Duration::from_millis(
                config.reassembly_window_ms.max(1),
            )),
            stats: Arc::clone(&self.stats),
        };
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    maybe = ingest_rx.recv() => match maybe {
                        Some(raw) => stage.handle_frame(raw),
                        None => break,
                    },
                }
            }
            stage.reassembler.clear();
        });

        Ok(())
    }

    /// Stop the driver and release resources.
    async fn stop(&self) -> DriverResult<()> {
        self.cancel.cancel();
        Ok(())
    }

    /// Subscribe to LPMP channel connection state updates.
    fn subscribe_connection_state(&self) -> watch::Receiver<SouthwardConnectionState> {
        self.conn_rx.clone()
    }

    /// Provide aggregated driver health information.
    async fn health_check(&self) -> DriverResult<DriverHealth> {
        let frames_total = self.stats.frames_total.load(Ordering::Relaxed);
        let frames_dropped = self.stats.frames_dropped.load(Ordering::Relaxed);
        let values_emitted = self.stats.values_emitted.load(Ordering::Relaxed);

        let drop_rate = if frames_total == 0 {
            0.0
        } else {
            frames_dropped as f64 / frames_total as f64
        };
        let status = if frames_dropped == 0 {
            HealthStatus::Healthy
        } else if drop_rate < 0.2 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        let last_ms = self.stats.last_activity_ms.load(Ordering::Acquire);
        let last_activity = if last_ms == 0 {
            Utc::now()
        } else {
            Utc.timestamp_millis_opt(last_ms).single().unwrap_or_else(Utc::now)
        };

        Ok(DriverHealth {
            status,
            last_activity,
            frames_total,
            frames_dropped,
            values_emitted,
        })
    }
}
