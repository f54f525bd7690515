use super::frame::{FragmentRecord, SensorId};
use bytes::{Bytes, BytesMut};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::task::JoinHandle;

/// Default window within which all fragments of a unit must arrive.
pub const DEFAULT_REASSEMBLY_WINDOW: Duration = Duration::from_secs(20);

/// A fully reassembled service data unit for one sensor.
///
/// The payload is laid out like an unfragmented frame body: header byte
/// first, then the parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledSdu {
    pub sensor: SensorId,
    pub payload: Bytes,
}

/// In-flight reassembly state for one sensor's current business unit.
struct SduCache {
    /// Business unit sequence this cache is assembling.
    business_seq: u8,
    /// Next fragment sequence required for contiguous append. Only ever
    /// increases; widened past u8 so `last_seq + 1` cannot wrap.
    expected_next: u16,
    /// Sequence number of the terminal fragment, once observed.
    final_seq: Option<u8>,
    /// Contiguously appended payload bytes, fragment-sequence order.
    buffer: BytesMut,
    /// Fragments that arrived ahead of `expected_next`.
    pending: HashMap<u8, Bytes>,
    /// Generation token the eviction timer must match before it may remove
    /// this cache; key presence alone is not identity.
    token: u64,
    /// Single-shot eviction timer armed at cache creation, never renewed.
    timer: JoinHandle<()>,
}

struct ReassemblerInner {
    caches: Mutex<HashMap<SensorId, SduCache>>,
    window: Duration,
    next_token: AtomicU64,
}

impl ReassemblerInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<SensorId, SduCache>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-sensor fragment reassembly state machine.
///
/// At most one business unit is in flight per sensor at any instant. A
/// cache's lifetime ends by exactly one of finalize, supersession by a new
/// first fragment, or window timeout; each of these cancels the eviction
/// timer synchronously under the table lock before the cache is removed.
#[derive(Clone)]
pub struct Reassembler {
    inner: Arc<ReassemblerInner>,
}

impl Reassembler {
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(ReassemblerInner {
                caches: Mutex::new(HashMap::new()),
                window,
                next_token: AtomicU64::new(0),
            }),
        }
    }

    /// Feed one fragment through the state machine.
    ///
    /// Returns the assembled unit when this fragment completes one;
    /// fragments that cannot be attached anywhere are dropped silently
    /// (surfaced only through tracing).
    pub fn ingest(&self, rec: FragmentRecord) -> Option<AssembledSdu> {
        let mut caches = self.inner.lock();

        // A first fragment always supersedes whatever is in flight for this
        // sensor, whether it restarts the same unit or opens a new one.
        if rec.flag.is_first() {
            if let Some(old) = caches.get(&rec.sensor) {
                old.timer.abort();
            }
            if let Some(old) = caches.remove(&rec.sensor) {
                tracing::debug!(
                    sensor = %rec.sensor,
                    old_seq = old.business_seq,
                    new_seq = rec.business_seq,
                    "in-flight unit superseded by new first fragment"
                );
            }
            return self.start_unit(&mut caches, rec);
        }

        let Some(cache) = caches.get_mut(&rec.sensor) else {
            tracing::trace!(
                sensor = %rec.sensor,
                seq = rec.fragment_seq,
                "orphan fragment without baseline, dropped"
            );
            return None;
        };

        if cache.business_seq != rec.business_seq {
            tracing::debug!(
                sensor = %rec.sensor,
                cache_seq = cache.business_seq,
                frame_seq = rec.business_seq,
                "fragment belongs to neither in-flight unit, dropped"
            );
            return None;
        }

        let seq = rec.fragment_seq as u16;
        if seq < cache.expected_next {
            tracing::trace!(sensor = %rec.sensor, seq = rec.fragment_seq, "stale duplicate dropped");
            return None;
        }
        if seq > cache.expected_next {
            if rec.flag.is_last() {
                cache.final_seq = Some(rec.fragment_seq);
            }
            cache.pending.insert(rec.fragment_seq, rec.payload);
            return None;
        }

        // Contiguous fragment: append, then drain any now-contiguous
        // successors that arrived early.
        cache.buffer.extend_from_slice(&rec.payload);
        cache.expected_next += 1;
        if rec.flag.is_last() {
            cache.final_seq = Some(rec.fragment_seq);
        }
        while let Some(data) = u8::try_from(cache.expected_next)
            .ok()
            .and_then(|next| cache.pending.remove(&next))
        {
            cache.buffer.extend_from_slice(&data);
            cache.expected_next += 1;
        }

        let complete = cache
            .final_seq
            .is_some_and(|last| cache.expected_next > last as u16);
        if !complete {
            return None;
        }

        cache.timer.abort();
        let cache = caches.remove(&rec.sensor)?;
        Some(AssembledSdu {
            sensor: rec.sensor,
            payload: cache.buffer.freeze(),
        })
    }

    /// Number of units currently in flight.
    pub fn pending_units(&self) -> usize {
        self.inner.lock().len()
    }

    /// Abort all timers and drop every in-flight unit (driver shutdown).
    pub fn clear(&self) {
        let mut caches = self.inner.lock();
        for (_, cache) in caches.drain() {
            cache.timer.abort();
        }
    }

    fn start_unit(
        &self,
        caches: &mut HashMap<SensorId, SduCache>,
        rec: FragmentRecord,
    ) -> Option<AssembledSdu> {
        // A first fragment that is also terminal completes its unit
        // immediately; no cache is stored and no timer armed.
        if rec.flag.is_last() {
            return Some(AssembledSdu {
                sensor: rec.sensor,
                payload: rec.payload,
            });
        }

        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let timer = spawn_eviction(Arc::clone(&self.inner), rec.sensor, token);
        caches.insert(
            rec.sensor,
            SduCache {
                business_seq: rec.business_seq,
                expected_next: rec.fragment_seq as u16 + 1,
                final_seq: None,
                buffer: BytesMut::from(&rec.payload[..]),
                pending: HashMap::new(),
                token,
                timer,
            },
        );
        None
    }
}

/// Arm the single-shot eviction timer for a newly created cache.
///
/// When the window elapses the task re-checks identity: only the cache it
/// was armed for may be evicted. A newer cache under the same sensor key is
/// left untouched, so an aborted-but-already-firing timer cannot delete its
/// successor.
fn spawn_eviction(inner: Arc<ReassemblerInner>, sensor: SensorId, token: u64) -> JoinHandle<()> {
    let window = inner.window;
    tokio::spawn(async move {
        tokio::time::sleep(window).await;
        let mut caches = inner.lock();
        if caches.get(&sensor).is_some_and(|c| c.token == token) {
            caches.remove(&sensor);
            tracing::warn!(
                sensor = %sensor,
                window_ms = window.as_millis() as u64,
                "reassembly window elapsed, dropping incomplete unit"
            );
        }
    })
}
