//! Simulator client pool and RPC envelope construction/interpretation.

pub mod client;
pub mod error;
pub mod rpc;

pub use client::{SimulatorClient, SimulatorPool, DEFAULT_POOL_CAPACITY, DEFAULT_RECV_TIMEOUT_MS, DEFAULT_SEND_TIMEOUT_MS};
pub use error::{Result, SimulatorError};
pub use rpc::{SimRequest, SimResponse};
