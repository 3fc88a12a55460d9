//! A single simulator RPC peer (one REQ socket) and the fixed-capacity pool
//! of them the processor hands out, one per compute worker, for the
//! worker's lifetime.

use std::sync::Arc;
use std::time::Duration;

use diagnostics::DiagnosticsPublisher;
use model::Action;
use tracing::debug;

use crate::error::{Result, SimulatorError};
use crate::rpc::{SimRequest, SimResponse};

pub const DEFAULT_POOL_CAPACITY: usize = 4;
pub const DEFAULT_SEND_TIMEOUT_MS: i32 = 200;
/// `-1` is zmq's "block indefinitely" sentinel; the spec's "no timeout" default.
pub const DEFAULT_RECV_TIMEOUT_MS: i32 = -1;

/// One request/reply peer bound to the simulator endpoint. Not `Sync`: each
/// compute worker owns one for its entire lifetime rather than sharing it.
pub struct SimulatorClient {
    socket: zmq::Socket,
    endpoint: String,
    diagnostics: Arc<DiagnosticsPublisher>,
}

impl SimulatorClient {
    pub fn connect(
        ctx: &zmq::Context,
        endpoint: &str,
        send_timeout: Duration,
        recv_timeout: Option<Duration>,
        diagnostics: Arc<DiagnosticsPublisher>,
    ) -> Result<Self> {
        let socket = ctx
            .socket(zmq::REQ)
            .map_err(|e| SimulatorError::transport(endpoint, e.to_string()))?;

        let send_ms = send_timeout.as_millis().min(i32::MAX as u128) as i32;
        socket
            .set_sndtimeo(send_ms)
            .map_err(|e| SimulatorError::transport(endpoint, e.to_string()))?;

        let recv_ms = recv_timeout
            .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
            .unwrap_or(DEFAULT_RECV_TIMEOUT_MS);
        socket
            .set_rcvtimeo(recv_ms)
            .map_err(|e| SimulatorError::transport(endpoint, e.to_string()))?;

        socket
            .connect(endpoint)
            .map_err(|e| SimulatorError::transport(endpoint, e.to_string()))?;

        Ok(Self {
            socket,
            endpoint: endpoint.to_string(),
            diagnostics,
        })
    }

    /// Send `request` and block for a reply, subject to the configured
    /// send/receive timeouts. Any send or receive failure (including a
    /// timeout) surfaces as a transport error; no retry is attempted here —
    /// that's the caller's call to make. Emits a `simulator_request`
    /// diagnostic before the round trip and a `simulator_response`
    /// diagnostic after a successfully parsed reply.
    pub fn call(&self, request: &SimRequest) -> Result<SimResponse> {
        let body = serde_json::to_string(request)
            .map_err(|e| SimulatorError::codec(request.method, e.to_string()))?;

        debug!(method = request.method, endpoint = %self.endpoint, "simulator request");
        self.diagnostics
            .put(Action::SimulatorRequest.as_str(), body.clone().into_bytes());

        self.socket
            .send(&body, 0)
            .map_err(|e| SimulatorError::transport(&self.endpoint, e.to_string()))?;

        let raw = self
            .socket
            .recv_string(0)
            .map_err(|e| SimulatorError::transport(&self.endpoint, e.to_string()))?
            .map_err(|_| SimulatorError::codec(request.method, "response was not valid UTF-8"))?;

        let response = SimResponse::parse(request.method, &raw)?;
        self.diagnostics
            .put(Action::SimulatorResponse.as_str(), raw.into_bytes());
        Ok(response)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Fixed-capacity pool of simulator clients, one per compute worker.
pub struct SimulatorPool {
    capacity: usize,
    clients: Vec<SimulatorClient>,
}

impl SimulatorPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clients: Vec::new(),
        }
    }

    /// Connect and add one client to the pool. Fails once the pool is at
    /// capacity.
    pub fn add(
        &mut self,
        ctx: &zmq::Context,
        endpoint: &str,
        send_timeout: Duration,
        recv_timeout: Option<Duration>,
        diagnostics: Arc<DiagnosticsPublisher>,
    ) -> Result<()> {
        if self.clients.len() >= self.capacity {
            return Err(SimulatorError::pool(format!(
                "pool at capacity ({})",
                self.capacity
            )));
        }
        let client = SimulatorClient::connect(ctx, endpoint, send_timeout, recv_timeout, diagnostics)?;
        self.clients.push(client);
        Ok(())
    }

    /// Remove and return the most recently added client.
    pub fn pop(&mut self) -> Option<SimulatorClient> {
        self.clients.pop()
    }

    pub fn get(&self, index: usize) -> Option<&SimulatorClient> {
        self.clients.get(index)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
