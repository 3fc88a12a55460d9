//! Request/response envelopes for the simulator RPC surface, and a thin
//! typed wrapper around the ten operations the simulator exposes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SimulatorError};

/// `{method, parameters:[...]}`, the envelope sent to the simulator.
#[derive(Debug, Clone, Serialize)]
pub struct SimRequest {
    pub method: &'static str,
    pub parameters: Vec<Value>,
}

impl SimRequest {
    pub fn new(method: &'static str, parameters: Vec<Value>) -> Self {
        Self { method, parameters }
    }
}

/// `{result, error?}`, the envelope the simulator sends back.
#[derive(Debug, Clone, Deserialize)]
pub struct SimResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<Value>,
}

impl SimResponse {
    /// Parse `raw` and surface a protocol error if `error` is present and
    /// truthy, matching the original's "throw if error is truthy" rule.
    pub fn parse(method: &str, raw: &str) -> Result<SimResponse> {
        let resp: SimResponse = serde_json::from_str(raw)
            .map_err(|e| SimulatorError::codec(method, format!("invalid response JSON: {e}")))?;
        if let Some(err) = &resp.error {
            let truthy = match err {
                Value::Bool(b) => *b,
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
                _ => true,
            };
            if truthy {
                return Err(SimulatorError::protocol(method, err.to_string()));
            }
        }
        Ok(resp)
    }

    pub fn as_bool(&self, method: &str) -> Result<bool> {
        self.result
            .as_bool()
            .ok_or_else(|| SimulatorError::codec(method, "expected bool result"))
    }

    pub fn as_u64(&self, method: &str) -> Result<u64> {
        self.result
            .as_u64()
            .ok_or_else(|| SimulatorError::codec(method, "expected uint64 result"))
    }

    pub fn as_string(&self, method: &str) -> Result<String> {
        self.result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SimulatorError::codec(method, "expected string result"))
    }

    pub fn as_array_u64(&self, method: &str) -> Result<Vec<u64>> {
        self.result
            .as_array()
            .ok_or_else(|| SimulatorError::codec(method, "expected array result"))?
            .iter()
            .map(|v| {
                v.as_u64()
                    .ok_or_else(|| SimulatorError::codec(method, "expected array of uint64"))
            })
            .collect()
    }

    pub fn as_array_i64(&self, method: &str) -> Result<Vec<i64>> {
        self.result
            .as_array()
            .ok_or_else(|| SimulatorError::codec(method, "expected array result"))?
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or_else(|| SimulatorError::codec(method, "expected array of int64"))
            })
            .collect()
    }

    pub fn as_array_f64(&self, method: &str) -> Result<Vec<f64>> {
        self.result
            .as_array()
            .ok_or_else(|| SimulatorError::codec(method, "expected array result"))?
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| SimulatorError::codec(method, "expected array of double"))
            })
            .collect()
    }
}

/// Build a request envelope for `create_system(stateType)`, issued exactly
/// once at startup against the pool's first client.
pub fn create_system(state_type: &str) -> SimRequest {
    SimRequest::new("create_system", vec![Value::String(state_type.to_string())])
}

pub fn delete_system(system_id: u64) -> SimRequest {
    SimRequest::new("delete_system", vec![Value::from(system_id)])
}

pub fn create_state(system_id: u64) -> SimRequest {
    SimRequest::new("create_state", vec![Value::from(system_id)])
}

pub fn delete_state(system_id: u64, state_id: u64) -> SimRequest {
    SimRequest::new(
        "delete_state",
        vec![Value::from(system_id), Value::from(state_id)],
    )
}

pub fn modify_state(system_id: u64, state_id: u64, instruction: &str) -> SimRequest {
    SimRequest::new(
        "modify_state",
        vec![
            Value::from(system_id),
            Value::from(state_id),
            Value::String(instruction.to_string()),
        ],
    )
}

pub fn measure_state(system_id: u64, state_id: u64) -> SimRequest {
    SimRequest::new(
        "measure_state",
        vec![Value::from(system_id), Value::from(state_id)],
    )
}

/// `compute_result(client, systemId, unit)`: the effective simulator unit's
/// description is assembled by the caller (dialect, concatenated circuit,
/// delimiter) and passed in as three positional parameters.
pub fn compute_result(system_id: u64, dialect: &str, description: &str, delimiter: char) -> SimRequest {
    SimRequest::new(
        "compute_result",
        vec![
            Value::from(system_id),
            Value::String(dialect.to_string()),
            Value::String(description.to_string()),
            Value::String(delimiter.to_string()),
        ],
    )
}

pub fn get_uniform_integer(low: i64, high: i64) -> SimRequest {
    SimRequest::new(
        "get_uniform_integer",
        vec![Value::from(low), Value::from(high)],
    )
}

pub fn get_uniform_real(low: f64, high: f64) -> SimRequest {
    SimRequest::new(
        "get_uniform_real",
        vec![Value::from(low), Value::from(high)],
    )
}

pub fn get_weighted_integer(weights: Vec<f64>) -> SimRequest {
    SimRequest::new(
        "get_weighted_integer",
        vec![Value::from(weights)],
    )
}

/// Parse a base-2 string (e.g. `"101"`) as the dispatcher does after a
/// `compute_result` round trip, into the 64-bit value it represents.
pub fn parse_binary_result(method: &str, raw: &str) -> Result<u64> {
    u64::from_str_radix(raw.trim(), 2)
        .map_err(|e| SimulatorError::codec(method, format!("not a base-2 integer: {e}")))
}
