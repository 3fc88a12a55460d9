//! Diagnostics publisher: a background thread that batches operational
//! events and publishes them on a topic-per-action PUB socket, or a null
//! sink that drops everything immediately when no logger endpoint was
//! configured.
//!
//! Diagnostics are best-effort by design: nothing here returns a `Result`
//! to the caller, because a failed diagnostic publish must never affect the
//! request it describes.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use queue::WorkBuffer;
use tracing::warn;

pub const DEFAULT_THRESHOLD: usize = 256;
pub const DEFAULT_WAIT_MS: u64 = 200;
pub const DEFAULT_MAX_CONSECUTIVE_MISSES: u32 = 5;

/// One queued diagnostic event: a topic name and an already-JSON-encoded
/// payload. The payload is never re-escaped, so callers must pass
/// well-formed JSON text.
struct DiagnosticMessage {
    topic: String,
    data: Vec<u8>,
    time_micros: u64,
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

fn envelope(msg: &DiagnosticMessage) -> Vec<u8> {
    let data_str = String::from_utf8_lossy(&msg.data);
    format!(
        r#"{{"topic":"{}","time":{},"data":{}}}"#,
        msg.topic, msg.time_micros, data_str
    )
    .into_bytes()
}

/// Background-thread publisher bound to a diagnostics endpoint.
struct EnabledPublisher {
    queue: Arc<WorkBuffer<DiagnosticMessage>>,
    exit: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EnabledPublisher {
    fn spawn(ctx: zmq::Context, endpoint: String, threshold: usize, max_misses: u32) -> std::result::Result<Self, String> {
        let socket = ctx.socket(zmq::PUB).map_err(|e| e.to_string())?;
        socket.bind(&endpoint).map_err(|e| e.to_string())?;

        let queue: Arc<WorkBuffer<DiagnosticMessage>> = Arc::new(WorkBuffer::new(threshold));
        let exit = Arc::new(AtomicBool::new(false));

        let worker_queue = Arc::clone(&queue);
        let worker_exit = Arc::clone(&exit);
        let handle = std::thread::Builder::new()
            .name("diagnostics".into())
            .spawn(move || {
                run_publisher(socket, worker_queue, worker_exit, max_misses);
            })
            .map_err(|e| e.to_string())?;

        Ok(Self {
            queue,
            exit,
            handle: Some(handle),
        })
    }

    fn put(&self, topic: &str, data: Vec<u8>) {
        self.queue.push(DiagnosticMessage {
            topic: topic.to_string(),
            data,
            time_micros: now_micros(),
        });
    }
}

impl Drop for EnabledPublisher {
    fn drop(&mut self) {
        self.exit.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_publisher(
    socket: zmq::Socket,
    queue: Arc<WorkBuffer<DiagnosticMessage>>,
    exit: Arc<AtomicBool>,
    max_misses: u32,
) {
    let wait = Duration::from_millis(DEFAULT_WAIT_MS);
    let mut consecutive_misses: u32 = 0;

    while !exit.load(Ordering::SeqCst) {
        let hit = queue.wait_until_threshold(wait);
        if !hit {
            consecutive_misses += 1;
            if consecutive_misses < max_misses {
                continue;
            }
        }
        consecutive_misses = 0;

        for msg in queue.drain() {
            let body = envelope(&msg);
            let result = socket.send_multipart([msg.topic.as_bytes(), &body], 0);
            if let Err(e) = result {
                warn!(topic = %msg.topic, error = %e, "diagnostics publish failed");
            }
        }
    }
}

/// Either a live publisher or a null sink. Construct via
/// `DiagnosticsPublisher::enabled` or `DiagnosticsPublisher::null`.
pub enum DiagnosticsPublisher {
    Enabled(EnabledPublisher),
    Null,
}

impl DiagnosticsPublisher {
    pub fn enabled(ctx: zmq::Context, endpoint: impl Into<String>) -> std::result::Result<Self, String> {
        let publisher = EnabledPublisher::spawn(
            ctx,
            endpoint.into(),
            DEFAULT_THRESHOLD,
            DEFAULT_MAX_CONSECUTIVE_MISSES,
        )?;
        Ok(Self::Enabled(publisher))
    }

    pub fn null() -> Self {
        Self::Null
    }

    /// Enqueue a diagnostic event. A no-op on the null sink.
    pub fn put(&self, topic: &str, data: Vec<u8>) {
        match self {
            DiagnosticsPublisher::Enabled(p) => p.put(topic, data),
            DiagnosticsPublisher::Null => {}
        }
    }

    /// Convenience wrapper for events whose payload is already a
    /// `serde_json::Value`.
    pub fn put_json(&self, topic: &str, data: &serde_json::Value) {
        match serde_json::to_vec(data) {
            Ok(bytes) => self.put(topic, bytes),
            Err(e) => warn!(topic, error = %e, "failed to encode diagnostic payload"),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, DiagnosticsPublisher::Enabled(_))
    }
}

/// Tracks consecutive threshold misses for a caller-owned wait loop (used
/// by the compute workers' own `wait_until_threshold` loop, which has the
/// same "drain anyway after N misses" shape as the diagnostics worker but
/// against a different queue and a different N).
pub struct MissCounter {
    count: AtomicU32,
    limit: u32,
}

impl MissCounter {
    pub fn new(limit: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            limit,
        }
    }

    /// Record a hit or miss; returns true if the caller should proceed
    /// (either the wait succeeded, or the miss limit was reached).
    pub fn record(&self, hit: bool) -> bool {
        if hit {
            self.count.store(0, Ordering::SeqCst);
            return true;
        }
        let misses = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        misses >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_publisher_accepts_puts_without_panicking() {
        let pub_ = DiagnosticsPublisher::null();
        pub_.put("tx", b"{}".to_vec());
        assert!(!pub_.is_enabled());
    }

    #[test]
    fn envelope_concatenates_payload_without_reescaping() {
        let msg = DiagnosticMessage {
            topic: "tx".to_string(),
            data: br#"{"a":1}"#.to_vec(),
            time_micros: 42,
        };
        let body = String::from_utf8(envelope(&msg)).unwrap();
        assert_eq!(body, r#"{"topic":"tx","time":42,"data":{"a":1}}"#);
    }

    #[test]
    fn miss_counter_proceeds_after_limit() {
        let counter = MissCounter::new(2);
        assert!(!counter.record(false));
        assert!(counter.record(false));
    }

    #[test]
    fn miss_counter_resets_on_hit() {
        let counter = MissCounter::new(2);
        assert!(!counter.record(false));
        assert!(counter.record(true));
        assert!(!counter.record(false));
    }
}
