//! Topology model: node types, the factory registry, the topology graph
//! itself, the document parser, simulator unit interning, and the time
//! service. Everything the dispatch core needs to know about "what is the
//! network and where does a transmission go" lives here.

pub mod action;
pub mod error;
pub mod node;
pub mod parser;
pub mod registry;
pub mod time;
pub mod unit;
pub mod topology;

pub use action::Action;
pub use error::{ModelError, Result};
pub use node::{Chirality, EndpointState, NodeId, NodeKind, NodeRecord, Receiver, SwitchVariant};
pub use registry::{register_builtins, NodeCtor, NodeRegistry};
pub use time::{SimulationClock, WallClock};
pub use topology::System;
pub use unit::{DialectPool, SimulatorUnit};
