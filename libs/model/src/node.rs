//! Node types. The original C++ model used a virtual base class with
//! per-model subclasses; here every node is a plain `NodeRecord` tagged by
//! `NodeKind`, dispatched with a `match` instead of a vtable.

use crate::unit::SimulatorUnit;

/// Arena key for a node. Doubles as the topology's map key, so lookups are a
/// single `BTreeMap` access rather than a pointer chase.
pub type NodeId = u64;

/// Rotation direction for a circulator switch's routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chirality {
    Clockwise,
    CounterClockwise,
}

/// The switch models this topology understands. Only `Circulator` is named
/// by the scenarios in scope; the enum is open so a new variant is a single
/// match arm away rather than a new trait impl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchVariant {
    Circulator { chirality: Chirality },
}

/// Per-kind state and behavior. `Null` nodes have no state: they exist only
/// as topology placeholders (dead ends that terminate a trace without being
/// a real endpoint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Endpoint { state: EndpointState },
    Switch { variant: SwitchVariant, ports: Vec<Option<NodeId>> },
    Null,
}

/// An endpoint's receiver configuration: the simulator unit installed by
/// `configure_node`. `None` means "no receiver configured; transmissions
/// directed here are dropped."
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointState {
    pub receiver: Option<Receiver>,
}

/// (dialect, description, line-delimiter), the three fields of a simulator
/// unit as installed on an endpoint. `dialect` is interned through the
/// shared `DialectPool` at `configure_receiver` time, so repeated dialects
/// across endpoints share one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub dialect: SimulatorUnit,
    pub description: String,
    pub delimiter: char,
}

/// A node's identity plus its adjacency. `peers` is the symmetric edge list
/// used by traversal; for a switch, `ports` additionally records which peer
/// sits behind which numbered port, for `configure_qswitch` port wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub model: String,
    pub kind: NodeKind,
    pub peers: Vec<NodeId>,
}

impl NodeRecord {
    pub fn new(id: NodeId, model: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            model: model.into(),
            kind,
            peers: Vec::new(),
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.kind, NodeKind::Switch { .. })
    }

    /// Route a circulator switch: the egress port is the ingress port
    /// shifted by one in the switch's chirality, modulo the port count.
    ///
    /// `ingress_peer` must already be present in `peers`; the returned value
    /// is the next node to hop to, or `None` if that port is unwired.
    pub fn route(&self, ingress_peer: NodeId) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Switch { variant, ports } => {
                let port_count = ports.len();
                if port_count == 0 {
                    return None;
                }
                let ingress_port = ports.iter().position(|p| *p == Some(ingress_peer))?;
                let SwitchVariant::Circulator { chirality } = variant;
                let egress_port = match chirality {
                    Chirality::Clockwise => (ingress_port + 1) % port_count,
                    Chirality::CounterClockwise => {
                        (ingress_port + port_count - 1) % port_count
                    }
                };
                ports[egress_port]
            }
            _ => None,
        }
    }

    /// Bind `peer` behind `port`, growing the port vector if needed. Does
    /// not touch `peers`; callers establish the symmetric edge separately
    /// via `System::connect_port`.
    pub fn set_port(&mut self, port: usize, peer: NodeId) -> Result<(), String> {
        match &mut self.kind {
            NodeKind::Switch { ports, .. } => {
                if port >= ports.len() {
                    ports.resize(port + 1, None);
                }
                ports[port] = Some(peer);
                Ok(())
            }
            _ => Err(format!("node {} is not a switch", self.id)),
        }
    }

    pub fn clear_port(&mut self, port: usize) -> Result<Option<NodeId>, String> {
        match &mut self.kind {
            NodeKind::Switch { ports, .. } => {
                if port >= ports.len() {
                    return Ok(None);
                }
                Ok(ports[port].take())
            }
            _ => Err(format!("node {} is not a switch", self.id)),
        }
    }
}
