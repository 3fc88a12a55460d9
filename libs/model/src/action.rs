//! The action taxonomy: the fixed set of operations a node can be asked to
//! perform, and the string names used for them on the wire.

use std::fmt;

/// An operation requested of a node during `tx` traversal or direct dispatch,
/// or a diagnostics/egress topic the dispatcher publishes under. This is the
/// single canonical table backing wire method selectors, diagnostics topics,
/// and egress topic frames alike — anything that needs one of these seven
/// names draws from here rather than carrying its own string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ConfigureDetector,
    ConfigureNode,
    ConfigureQswitch,
    Tx,
    Rx,
    SimulatorRequest,
    SimulatorResponse,
}

impl Action {
    /// Canonical wire name, as it appears in the `method` field of an
    /// ingress request, a diagnostics topic, or an egress topic frame.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ConfigureDetector => "configure_detector",
            Action::ConfigureNode => "configure_node",
            Action::ConfigureQswitch => "configure_qswitch",
            Action::Tx => "tx",
            Action::Rx => "rx",
            Action::SimulatorRequest => "simulator_request",
            Action::SimulatorResponse => "simulator_response",
        }
    }

    /// Parse a wire method name into an `Action`, if recognized.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "configure_detector" => Some(Action::ConfigureDetector),
            "configure_node" => Some(Action::ConfigureNode),
            "configure_qswitch" => Some(Action::ConfigureQswitch),
            "tx" => Some(Action::Tx),
            "rx" => Some(Action::Rx),
            "simulator_request" => Some(Action::SimulatorRequest),
            "simulator_response" => Some(Action::SimulatorResponse),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
