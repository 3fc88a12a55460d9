//! Ingress: a router socket fanned out through the steerable proxy to a
//! pool of reply workers, each decoding requests into `InterpretedRequest`s
//! and pushing them onto the shared incoming work buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use diagnostics::DiagnosticsPublisher;
use model::{Action, WallClock};
use queue::WorkBuffer;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, RpcError};
use crate::proxy::ProxyHandle;
use crate::request::{decode_origin_node_id, InterpretedRequest};

const BACKEND_ENDPOINT: &str = "inproc://rpc-ingress-backend";
pub const DEFAULT_TX_TIMEOUT_MS: i32 = 100;
pub const MAX_TX_WORKERS: usize = 16;

pub struct IngressHandle {
    proxy: ProxyHandle,
    exit: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl IngressHandle {
    pub fn shutdown(self) {
        self.exit.store(true, Ordering::SeqCst);
        for worker in self.workers {
            let _ = worker.join();
        }
        self.proxy.shutdown();
    }
}

/// Bind the router/dealer pair, start the steerable proxy, and spawn
/// `worker_count` (capped at `MAX_TX_WORKERS`) reply workers.
pub fn start(
    ctx: zmq::Context,
    endpoint: &str,
    worker_count: usize,
    incoming: Arc<WorkBuffer<InterpretedRequest>>,
    diagnostics: Arc<DiagnosticsPublisher>,
) -> Result<IngressHandle> {
    let frontend = ctx
        .socket(zmq::ROUTER)
        .map_err(|e| RpcError::transport(endpoint, e.to_string()))?;
    frontend
        .bind(endpoint)
        .map_err(|e| RpcError::transport(endpoint, e.to_string()))?;

    let backend = ctx
        .socket(zmq::DEALER)
        .map_err(|e| RpcError::transport(BACKEND_ENDPOINT, e.to_string()))?;
    backend
        .bind(BACKEND_ENDPOINT)
        .map_err(|e| RpcError::transport(BACKEND_ENDPOINT, e.to_string()))?;

    let proxy = ProxyHandle::spawn(&ctx, frontend, backend)?;

    let worker_count = worker_count.clamp(1, MAX_TX_WORKERS);
    let exit = Arc::new(AtomicBool::new(false));
    let mut workers = Vec::with_capacity(worker_count);

    for i in 0..worker_count {
        let ctx = ctx.clone();
        let incoming = Arc::clone(&incoming);
        let diagnostics = Arc::clone(&diagnostics);
        let exit = Arc::clone(&exit);
        let handle = std::thread::Builder::new()
            .name(format!("rpc-ingress-{i}"))
            .spawn(move || run_worker(ctx, incoming, diagnostics, exit))
            .map_err(|e| RpcError::transport(BACKEND_ENDPOINT, e.to_string()))?;
        workers.push(handle);
    }

    Ok(IngressHandle {
        proxy,
        exit,
        workers,
    })
}

fn run_worker(
    ctx: zmq::Context,
    incoming: Arc<WorkBuffer<InterpretedRequest>>,
    diagnostics: Arc<DiagnosticsPublisher>,
    exit: Arc<AtomicBool>,
) {
    let socket = match ctx.socket(zmq::REP) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "ingress worker failed to create socket");
            return;
        }
    };
    if let Err(e) = socket.set_rcvtimeo(DEFAULT_TX_TIMEOUT_MS) {
        warn!(error = %e, "ingress worker failed to set recv timeout");
        return;
    }
    if let Err(e) = socket.set_sndtimeo(DEFAULT_TX_TIMEOUT_MS) {
        warn!(error = %e, "ingress worker failed to set send timeout");
        return;
    }
    if let Err(e) = socket.connect(BACKEND_ENDPOINT) {
        warn!(error = %e, "ingress worker failed to connect to backend");
        return;
    }

    while !exit.load(Ordering::SeqCst) {
        let raw = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("ingress worker received non-UTF-8 request");
                continue;
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                warn!(error = %e, "ingress worker recv failed");
                continue;
            }
        };

        match decode_request(&raw) {
            Ok(req) => {
                diagnostics.put(req.action.as_str(), raw.clone().into_bytes());
                incoming.push(req);
                let _ = socket.send(r#"{"result":true}"#, 0);
            }
            Err(e) => {
                warn!(error = %e, "ingress worker failed to decode request");
                let _ = socket.send(format!(r#"{{"error":"{e}"}}"#).as_str(), 0);
            }
        }
    }
}

/// Parse a raw `{method, parameters:[...]}` request into an
/// `InterpretedRequest`, per §4.8's method-dispatch table.
fn decode_request(raw: &str) -> Result<InterpretedRequest> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| RpcError::codec(format!("invalid JSON: {e}")))?;

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::codec("missing method"))?;

    let parameters = value
        .get("parameters")
        .and_then(Value::as_array)
        .ok_or_else(|| RpcError::codec("missing parameters"))?;

    let node_id = parameters
        .first()
        .and_then(parameter_as_be_u32_bytes)
        .and_then(|bytes| decode_origin_node_id(&bytes))
        .ok_or_else(|| RpcError::codec("parameter 0 is not a valid node id"))?;

    let rest: Vec<String> = parameters
        .iter()
        .skip(1)
        .map(value_to_string)
        .collect();

    // The wire surface never names a component directly: a bare
    // `configure_node` always means "configure the receiver" (see S1),
    // while `configure_qswitch` is sugar for `configure_node` with the
    // routing component. The "transmitter" component exists in the
    // dispatch table as a documented no-op but has no wire entry point.
    let (action, component) = match method {
        "configure_node" => (Action::ConfigureNode, "receiver".to_string()),
        "tx" => (Action::Tx, String::new()),
        "configure_qswitch" => (Action::ConfigureQswitch, "routing".to_string()),
        other => return Err(RpcError::protocol(other)),
    };

    debug!(method, node_id, "decoded ingress request");
    let timestamp = WallClock::default().now_packed();
    Ok(InterpretedRequest::new(action, node_id, component, rest, timestamp))
}

/// Parameter 0 may arrive as a JSON number or as a 4-byte binary string;
/// either way we need its big-endian byte representation to run through
/// `decode_origin_node_id`.
fn parameter_as_be_u32_bytes(value: &Value) -> Option<[u8; 4]> {
    match value {
        Value::Number(n) => Some((n.as_u64()? as u32).to_be_bytes()),
        Value::String(s) => {
            let bytes = s.as_bytes();
            if bytes.len() == 4 {
                Some([bytes[0], bytes[1], bytes[2], bytes[3]])
            } else {
                None
            }
        }
        _ => None,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tx_request() {
        let raw = serde_json::json!({
            "method": "tx",
            "parameters": [2, "chp", "X 0", "\n"],
        })
        .to_string();
        let req = decode_request(&raw).unwrap();
        assert_eq!(req.node_id, 2);
        assert_eq!(req.action, Action::Tx);
        assert!(req.component.is_empty());
    }

    #[test]
    fn decodes_configure_qswitch_with_routing_component() {
        let raw = serde_json::json!({
            "method": "configure_qswitch",
            "parameters": [100, "cw"],
        })
        .to_string();
        let req = decode_request(&raw).unwrap();
        assert_eq!(req.action, Action::ConfigureQswitch);
        assert_eq!(req.component, "routing");
    }

    #[test]
    fn unknown_method_is_protocol_error() {
        let raw = serde_json::json!({"method":"frobnicate","parameters":[1]}).to_string();
        let err = decode_request(&raw).unwrap_err();
        assert!(matches!(err, RpcError::Protocol { .. }));
    }

    /// S5: rejecting an unrecognized method must not leave decoding broken
    /// for the requests that follow it.
    #[test]
    fn unknown_method_rejection_does_not_break_subsequent_requests() {
        let unknown = serde_json::json!({"method":"frobnicate","parameters":[1]}).to_string();
        assert!(decode_request(&unknown).is_err());

        let valid = serde_json::json!({"method":"tx","parameters":[2]}).to_string();
        let req = decode_request(&valid).unwrap();
        assert_eq!(req.node_id, 2);
        assert_eq!(req.action, Action::Tx);
    }
}
