//! The steerable front-end proxy: a zero-copy shuttle between the external
//! router socket and the internal dealer socket that fans requests out to
//! the worker pool, torn down by a `"TERMINATE"` control message rather
//! than a thread interrupt.

use std::thread::JoinHandle;

use crate::error::{Result, RpcError};

const CONTROL_ENDPOINT: &str = "inproc://rpc-proxy-control";

pub struct ProxyHandle {
    control: zmq::Socket,
    handle: Option<JoinHandle<()>>,
}

impl ProxyHandle {
    /// Spawn the proxy thread. `frontend` and `backend` are moved into the
    /// thread; the caller keeps no further access to them.
    pub fn spawn(ctx: &zmq::Context, frontend: zmq::Socket, backend: zmq::Socket) -> Result<Self> {
        let control_side_a = ctx
            .socket(zmq::PAIR)
            .map_err(|e| RpcError::transport(CONTROL_ENDPOINT, e.to_string()))?;
        control_side_a
            .bind(CONTROL_ENDPOINT)
            .map_err(|e| RpcError::transport(CONTROL_ENDPOINT, e.to_string()))?;

        let control_side_b = ctx
            .socket(zmq::PAIR)
            .map_err(|e| RpcError::transport(CONTROL_ENDPOINT, e.to_string()))?;
        control_side_b
            .connect(CONTROL_ENDPOINT)
            .map_err(|e| RpcError::transport(CONTROL_ENDPOINT, e.to_string()))?;

        let handle = std::thread::Builder::new()
            .name("rpc-proxy".into())
            .spawn(move || {
                if let Err(e) = zmq::proxy_steerable(&frontend, &backend, &control_side_b) {
                    tracing::warn!(error = %e, "steerable proxy exited with error");
                }
            })
            .map_err(|e| RpcError::transport(CONTROL_ENDPOINT, e.to_string()))?;

        Ok(Self {
            control: control_side_a,
            handle: Some(handle),
        })
    }

    /// Send the `"TERMINATE"` control message and join the proxy thread.
    pub fn shutdown(mut self) {
        if self.control.send("TERMINATE", 0).is_err() {
            tracing::warn!("failed to send TERMINATE to proxy control socket");
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
