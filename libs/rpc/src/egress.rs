//! Egress: a publisher thread that drains the outgoing work buffer and
//! publishes one two-frame message per result — the raw topic id, then the
//! JSON body — logging an `Action::Rx` diagnostics event alongside each one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use diagnostics::DiagnosticsPublisher;
use model::Action;
use queue::WorkBuffer;

use crate::error::{Result, RpcError};
use crate::request::PushMessage;

pub const DEFAULT_WAIT_MS: u64 = 100;

pub struct EgressHandle {
    exit: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EgressHandle {
    pub fn shutdown(mut self) {
        self.exit.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn start(
    ctx: &zmq::Context,
    endpoint: &str,
    outgoing: Arc<WorkBuffer<PushMessage>>,
    diagnostics: Arc<DiagnosticsPublisher>,
) -> Result<EgressHandle> {
    let socket = ctx
        .socket(zmq::PUB)
        .map_err(|e| RpcError::transport(endpoint, e.to_string()))?;
    socket
        .bind(endpoint)
        .map_err(|e| RpcError::transport(endpoint, e.to_string()))?;

    let exit = Arc::new(AtomicBool::new(false));
    let worker_exit = Arc::clone(&exit);
    let endpoint = endpoint.to_string();

    let handle = std::thread::Builder::new()
        .name("rpc-egress".into())
        .spawn(move || run_egress(socket, outgoing, diagnostics, worker_exit, endpoint))
        .map_err(|e| RpcError::transport("rpc-egress", e.to_string()))?;

    Ok(EgressHandle {
        exit,
        handle: Some(handle),
    })
}

fn run_egress(
    socket: zmq::Socket,
    outgoing: Arc<WorkBuffer<PushMessage>>,
    diagnostics: Arc<DiagnosticsPublisher>,
    exit: Arc<AtomicBool>,
    endpoint: String,
) {
    let wait = Duration::from_millis(DEFAULT_WAIT_MS);
    while !exit.load(Ordering::SeqCst) {
        let _ = outgoing.wait_until_threshold(wait);
        for msg in outgoing.drain() {
            let topic_bytes = msg.topic.to_ne_bytes();
            let body = msg.body();
            let body_bytes = match serde_json::to_vec(&body) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode egress body");
                    continue;
                }
            };

            if let Err(e) = socket.send_multipart([&topic_bytes[..], &body_bytes[..]], 0) {
                tracing::warn!(endpoint = %endpoint, error = %e, "egress publish failed");
            }

            diagnostics.put_json(Action::Rx.as_str(), &body);
        }
    }
}
