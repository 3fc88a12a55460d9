//! CLI flag surface (§6) and the startup validation pass that turns a
//! malformed invocation into a descriptive, fatal configuration error
//! before any component comes up.

use std::fs;
use std::path::Path;

use clap::Parser;
use thiserror::Error;

pub const DEFAULT_THREAD_COUNT: usize = 1;
pub const DEFAULT_SIMULATOR_POOL_SIZE: usize = 1;
pub const DEFAULT_STATE_TYPE: &str = "chp_state";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Invalid(String),

    #[error("failed to read topology file {path}: {source}")]
    TopologyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Command-line surface of the dispatcher binary, per the spec's §6 flag
/// table plus the `--state-type` flag this implementation adds to resolve
/// the original's hardcoded simulator state type.
#[derive(Parser, Debug, Clone)]
#[command(name = "dispatchd", about = "Concurrent RPC dispatcher for the simulator backend")]
pub struct Settings {
    /// JSON topology document, or a filesystem path to one. The first
    /// occurrence of `{` in the argument switches interpretation to
    /// JSON-string mode.
    #[arg(short = 't', long = "topology")]
    pub topology: String,

    /// Diagnostics endpoint. Absent means the null publisher.
    #[arg(short = 'l', long = "logger")]
    pub logger: Option<String>,

    /// Ingress (request) endpoint.
    #[arg(long = "rs")]
    pub ingress_endpoint: String,

    /// Egress (result) endpoint.
    #[arg(long = "ts")]
    pub egress_endpoint: String,

    /// Ingress worker thread count.
    #[arg(long = "rt", default_value_t = DEFAULT_THREAD_COUNT)]
    pub ingress_threads: usize,

    /// Egress worker thread count.
    #[arg(long = "tt", default_value_t = DEFAULT_THREAD_COUNT)]
    pub egress_threads: usize,

    /// Simulator endpoint.
    #[arg(short = 's', long = "simulator")]
    pub simulator_endpoint: String,

    /// Simulator client pool size.
    #[arg(long = "st", default_value_t = DEFAULT_SIMULATOR_POOL_SIZE)]
    pub simulator_pool_size: usize,

    /// Simulator state type passed to the single startup `create_system`
    /// call.
    #[arg(long = "state-type", default_value = DEFAULT_STATE_TYPE)]
    pub state_type: String,
}

impl Settings {
    /// Resolve `--topology` into the JSON document text, reading it from
    /// disk first unless it already looks like inline JSON.
    pub fn topology_document(&self) -> Result<String, ConfigError> {
        match self.topology.find('{') {
            Some(0) => Ok(self.topology.clone()),
            Some(_) | None => {
                let path = Path::new(&self.topology);
                fs::read_to_string(path).map_err(|e| ConfigError::TopologyRead {
                    path: self.topology.clone(),
                    source: e,
                })
            }
        }
    }

    /// Validate the parsed settings, producing descriptive errors for
    /// anything a startup-time check can catch before components come up.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingress_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("--rs (ingress endpoint) is required".into()));
        }
        if self.egress_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("--ts (egress endpoint) is required".into()));
        }
        if self.simulator_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("--s (simulator endpoint) is required".into()));
        }
        if self.ingress_threads == 0 {
            return Err(ConfigError::Invalid("--rt must be at least 1".into()));
        }
        if self.egress_threads == 0 {
            return Err(ConfigError::Invalid("--tt must be at least 1".into()));
        }
        if self.ingress_threads > 16 {
            return Err(ConfigError::Invalid("--rt exceeds the hard cap of 16 ingress workers".into()));
        }
        if self.simulator_pool_size == 0 {
            return Err(ConfigError::Invalid("--st must be at least 1".into()));
        }
        if self.state_type.trim().is_empty() {
            return Err(ConfigError::Invalid("--state-type must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            topology: r#"{"nodes":[]}"#.to_string(),
            logger: None,
            ingress_endpoint: "tcp://127.0.0.1:5555".to_string(),
            egress_endpoint: "tcp://127.0.0.1:5556".to_string(),
            ingress_threads: 1,
            egress_threads: 1,
            simulator_endpoint: "tcp://127.0.0.1:5557".to_string(),
            simulator_pool_size: 1,
            state_type: DEFAULT_STATE_TYPE.to_string(),
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn missing_ingress_endpoint_fails() {
        let mut settings = base_settings();
        settings.ingress_endpoint = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn ingress_threads_over_cap_fails() {
        let mut settings = base_settings();
        settings.ingress_threads = 17;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn inline_json_topology_is_used_verbatim() {
        let settings = base_settings();
        assert_eq!(settings.topology_document().unwrap(), r#"{"nodes":[]}"#);
    }

    #[test]
    fn non_json_topology_is_treated_as_a_path() {
        let mut settings = base_settings();
        settings.topology = "/nonexistent/topology.json".to_string();
        assert!(matches!(
            settings.topology_document(),
            Err(ConfigError::TopologyRead { .. })
        ));
    }
}
