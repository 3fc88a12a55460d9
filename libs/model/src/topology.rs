//! The topology itself: a flat arena of nodes addressed by integer handle,
//! with symmetric adjacency edges. A `BTreeMap` backs the arena so lookups
//! are the O(log n) the design calls for without reaching for a second
//! index structure.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{ModelError, Result};
use crate::node::{NodeId, NodeKind, NodeRecord, SwitchVariant};
use crate::registry::NodeRegistry;
use crate::unit::DialectPool;

/// The live network graph. Holds one coarse-grained lock over the whole
/// node map; per-request hold times are short (a handful of map lookups and
/// a Vec push), so this is simpler than per-node locking or an RCU swap
/// without costing the dispatcher anything observable.
#[derive(Clone)]
pub struct System {
    nodes: Arc<RwLock<BTreeMap<NodeId, NodeRecord>>>,
    next_id: Arc<AtomicU64>,
    registry: NodeRegistry,
    dialects: Arc<DialectPool>,
}

impl System {
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            nodes: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            registry,
            dialects: Arc::new(DialectPool::new()),
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Insert a freshly-built node at a caller-supplied id (used by the
    /// parser, which assigns ids from the topology document itself rather
    /// than from the internal counter).
    pub fn insert_node(&self, id: NodeId, model: &str, port_count: usize) -> Result<()> {
        let record = self.registry.build(id, model, port_count)?;
        let mut guard = self.nodes.write();
        if guard.contains_key(&id) {
            return Err(ModelError::configuration(format!(
                "duplicate node id {id}"
            )));
        }
        guard.insert(id, record);
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
        debug!(node_id = id, model, "node inserted");
        Ok(())
    }

    /// Allocate a fresh id and insert a node of `model`, for callers that
    /// don't need a specific id (dynamic creation outside the initial
    /// topology document).
    pub fn create_node(&self, model: &str, port_count: usize) -> Result<NodeId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.insert_node(id, model, port_count)?;
        Ok(id)
    }

    pub fn find_node(&self, id: NodeId) -> Result<NodeRecord> {
        self.nodes
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| ModelError::topology(format!("no such node: {id}")))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    /// Add a symmetric adjacency edge between two existing nodes. Idempotent:
    /// calling it twice for the same pair does not duplicate the edge.
    pub fn add_connection(&self, a: NodeId, b: NodeId) -> Result<()> {
        let mut guard = self.nodes.write();
        if !guard.contains_key(&a) {
            return Err(ModelError::topology(format!("no such node: {a}")));
        }
        if !guard.contains_key(&b) {
            return Err(ModelError::topology(format!("no such node: {b}")));
        }
        if let Some(rec) = guard.get_mut(&a) {
            if !rec.peers.contains(&b) {
                rec.peers.push(b);
            }
        }
        if let Some(rec) = guard.get_mut(&b) {
            if !rec.peers.contains(&a) {
                rec.peers.push(a);
            }
        }
        Ok(())
    }

    fn remove_connection(&self, a: NodeId, b: NodeId) {
        let mut guard = self.nodes.write();
        if let Some(rec) = guard.get_mut(&a) {
            rec.peers.retain(|p| *p != b);
        }
        if let Some(rec) = guard.get_mut(&b) {
            rec.peers.retain(|p| *p != a);
        }
    }

    /// Wire `peer` behind `port` on switch `switch_id`. This both binds the
    /// port slot and establishes the symmetric peer edge: the switch
    /// invariant that every non-empty port references a node already in the
    /// peer list holds as a postcondition of this call, not a precondition
    /// the caller must satisfy beforehand.
    pub fn connect_port(&self, switch_id: NodeId, port: usize, peer: NodeId) -> Result<()> {
        if !self.contains(peer) {
            return Err(ModelError::topology(format!("no such node: {peer}")));
        }
        {
            let mut guard = self.nodes.write();
            let rec = guard
                .get_mut(&switch_id)
                .ok_or_else(|| ModelError::topology(format!("no such node: {switch_id}")))?;
            rec.set_port(port, peer)
                .map_err(ModelError::topology)?;
        }
        self.add_connection(switch_id, peer)
    }

    /// Unwire `port` on `switch_id`, tearing down the peer edge it implied
    /// if no other port still references that peer.
    pub fn disconnect_port(&self, switch_id: NodeId, port: usize) -> Result<()> {
        let removed = {
            let mut guard = self.nodes.write();
            let rec = guard
                .get_mut(&switch_id)
                .ok_or_else(|| ModelError::topology(format!("no such node: {switch_id}")))?;
            rec.clear_port(port).map_err(ModelError::topology)?
        };
        if let Some(peer) = removed {
            let still_wired = self
                .find_node(switch_id)
                .map(|rec| match &rec.kind {
                    NodeKind::Switch { ports, .. } => ports.iter().any(|p| *p == Some(peer)),
                    _ => false,
                })
                .unwrap_or(false);
            if !still_wired {
                self.remove_connection(switch_id, peer);
            }
        }
        Ok(())
    }

    /// Grow or shrink a switch's port vector. Ports beyond the new length
    /// are dropped along with whatever peer edges they implied.
    pub fn resize(&self, switch_id: NodeId, port_count: usize) -> Result<()> {
        let dropped_peers: Vec<NodeId> = {
            let mut guard = self.nodes.write();
            let rec = guard
                .get_mut(&switch_id)
                .ok_or_else(|| ModelError::topology(format!("no such node: {switch_id}")))?;
            match &mut rec.kind {
                NodeKind::Switch { ports, .. } => {
                    let dropped = if port_count < ports.len() {
                        ports[port_count..].iter().filter_map(|p| *p).collect()
                    } else {
                        Vec::new()
                    };
                    ports.resize(port_count, None);
                    dropped
                }
                _ => return Err(ModelError::topology(format!("node {switch_id} is not a switch"))),
            }
        };
        for peer in dropped_peers {
            let still_wired = self
                .find_node(switch_id)
                .map(|rec| match &rec.kind {
                    NodeKind::Switch { ports, .. } => ports.iter().any(|p| *p == Some(peer)),
                    _ => false,
                })
                .unwrap_or(false);
            if !still_wired {
                self.remove_connection(switch_id, peer);
            }
        }
        Ok(())
    }

    /// Install a receiver (dialect, description, delimiter) on an endpoint
    /// node — the `configure_node` RPC's "receiver" component. `dialect` is
    /// interned through the shared `DialectPool` rather than stored as a
    /// fresh allocation per endpoint.
    pub fn configure_receiver(
        &self,
        node_id: NodeId,
        dialect: impl AsRef<str>,
        description: impl Into<String>,
        delimiter: char,
    ) -> Result<()> {
        let dialect = self.dialects.intern(dialect.as_ref());
        let mut guard = self.nodes.write();
        let rec = guard
            .get_mut(&node_id)
            .ok_or_else(|| ModelError::topology(format!("no such node: {node_id}")))?;
        match &mut rec.kind {
            NodeKind::Endpoint { state } => {
                state.receiver = Some(crate::node::Receiver {
                    dialect,
                    description: description.into(),
                    delimiter,
                });
                Ok(())
            }
            _ => Err(ModelError::topology(format!(
                "node {node_id} is not an endpoint"
            ))),
        }
    }

    /// Set a switch's routing state from a wire-level state name (the
    /// `configure_qswitch`/`configure_node`-with-routing-component
    /// overload). For a circulator this is its chirality: `"cw"` or
    /// `"ccw"`.
    pub fn set_switch_state(&self, switch_id: NodeId, state: &str) -> Result<()> {
        let mut guard = self.nodes.write();
        let rec = guard
            .get_mut(&switch_id)
            .ok_or_else(|| ModelError::topology(format!("no such node: {switch_id}")))?;
        match &mut rec.kind {
            NodeKind::Switch { variant, .. } => {
                let SwitchVariant::Circulator { chirality } = variant;
                *chirality = match state {
                    "cw" => crate::node::Chirality::Clockwise,
                    "ccw" => crate::node::Chirality::CounterClockwise,
                    other => {
                        return Err(ModelError::configuration(format!(
                            "unknown switch state {other:?}"
                        )))
                    }
                };
                Ok(())
            }
            _ => Err(ModelError::topology(format!(
                "node {switch_id} is not a switch"
            ))),
        }
    }

    /// Resolve a circulator switch's egress peer for a packet arriving from
    /// `ingress_peer`. Delegates to `NodeRecord::route`.
    pub fn route(&self, switch_id: NodeId, ingress_peer: NodeId) -> Result<Option<NodeId>> {
        let rec = self.find_node(switch_id)?;
        Ok(rec.route(ingress_peer))
    }

    /// Walk a `tx` from `origin` to wherever the topology leads it.
    ///
    /// The first hop leaves the origin toward its sole peer unconditionally
    /// (an origin is never itself a routing decision point). From there the
    /// loop alternates: stop if the current node is a structural leaf
    /// (exactly one peer, and that peer is where we came from); detect a
    /// self-loop trap (a node whose only peer is itself) as a fatal
    /// topology error rather than looping forever; otherwise, if the node
    /// is a switch, ask it to route, otherwise fall through to its one
    /// other peer.
    pub fn trace_tx(&self, origin: NodeId) -> Result<Vec<NodeId>> {
        let origin_rec = self.find_node(origin)?;
        if origin_rec.peers.len() != 1 {
            return Err(ModelError::topology(format!(
                "origin node {origin} must have exactly one peer, has {}",
                origin_rec.peers.len()
            )));
        }

        let mut path = vec![origin];
        let mut previous = origin;
        let mut current = origin_rec.peers[0];

        loop {
            path.push(current);
            let rec = self.find_node(current)?;

            if rec.peers.len() == 1 && rec.peers[0] == current {
                return Err(ModelError::trap(current));
            }

            if rec.peers.len() == 1 && rec.peers[0] == previous {
                trace!(origin, ?path, "tx traversal complete");
                return Ok(path);
            }

            let next = if rec.is_switch() {
                rec.route(previous).ok_or_else(|| {
                    ModelError::topology(format!(
                        "switch {current} has no route for ingress peer {previous}"
                    ))
                })?
            } else {
                rec.peers
                    .iter()
                    .copied()
                    .find(|p| *p != previous)
                    .ok_or_else(|| {
                        ModelError::topology(format!(
                            "node {current} has no onward peer away from {previous}"
                        ))
                    })?
            };

            previous = current;
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Chirality, NodeKind, SwitchVariant};
    use crate::registry::{register_builtins, NodeRegistry};

    fn system() -> System {
        let registry = NodeRegistry::new();
        register_builtins(&registry).unwrap();
        System::new(registry)
    }

    /// S1: two clients directly connected.
    #[test]
    fn trace_tx_direct_edge() {
        let sys = system();
        sys.insert_node(1, "client", 0).unwrap();
        sys.insert_node(2, "client", 0).unwrap();
        sys.add_connection(1, 2).unwrap();

        assert_eq!(sys.trace_tx(1).unwrap(), vec![1, 2]);
    }

    /// S2/S3: client -> circulator switch -> client, clockwise.
    #[test]
    fn trace_tx_through_circulator() {
        let sys = system();
        sys.insert_node(1, "client", 0).unwrap();
        sys.insert_node(2, "client", 0).unwrap();
        sys.insert_node(3, "client", 0).unwrap();
        sys.insert_node(100, "circulator_switch", 3).unwrap();

        sys.connect_port(100, 0, 1).unwrap();
        sys.connect_port(100, 1, 2).unwrap();
        sys.connect_port(100, 2, 3).unwrap();

        // clockwise: ingress on port 0 (peer 1) routes to port 1 (peer 2)
        assert_eq!(sys.trace_tx(1).unwrap(), vec![1, 100, 2]);
    }

    #[test]
    fn trace_tx_detects_self_loop_trap() {
        let sys = system();
        sys.insert_node(1, "client", 0).unwrap();
        sys.insert_node(2, "null_endpoint", 0).unwrap();
        sys.add_connection(1, 2).unwrap();
        // force node 2 into a self-loop for the trap test
        {
            let mut guard = sys.nodes.write();
            guard.get_mut(&2).unwrap().peers = vec![2];
        }

        let err = sys.trace_tx(1).unwrap_err();
        assert!(matches!(err, ModelError::Topology { .. }));
    }

    #[test]
    fn connect_port_establishes_peer_edge() {
        let sys = system();
        sys.insert_node(1, "client", 0).unwrap();
        sys.insert_node(100, "circulator_switch", 2).unwrap();

        sys.connect_port(100, 0, 1).unwrap();
        let rec = sys.find_node(100).unwrap();
        assert!(rec.peers.contains(&1));
        let peer_rec = sys.find_node(1).unwrap();
        assert!(peer_rec.peers.contains(&100));
    }

    #[test]
    fn resize_drops_trailing_ports_and_edges() {
        let sys = system();
        sys.insert_node(1, "client", 0).unwrap();
        sys.insert_node(100, "circulator_switch", 2).unwrap();
        sys.connect_port(100, 1, 1).unwrap();

        sys.resize(100, 1).unwrap();

        let rec = sys.find_node(100).unwrap();
        assert!(!rec.peers.contains(&1));
        match rec.kind {
            NodeKind::Switch { ports, .. } => assert_eq!(ports.len(), 1),
            _ => panic!("expected switch"),
        }
    }

    #[test]
    fn configure_receiver_rejects_non_endpoint() {
        let sys = system();
        sys.insert_node(100, "circulator_switch", 1).unwrap();
        let err = sys
            .configure_receiver(100, "chp", "M 0", '\n')
            .unwrap_err();
        assert!(matches!(err, ModelError::Topology { .. }));
    }

    #[test]
    fn configure_receiver_installs_on_endpoint() {
        let sys = system();
        sys.insert_node(1, "client", 0).unwrap();
        sys.configure_receiver(1, "chp", "M 0", '\n').unwrap();
        let rec = sys.find_node(1).unwrap();
        match rec.kind {
            NodeKind::Endpoint { state } => {
                let recv = state.receiver.unwrap();
                assert_eq!(recv.dialect.as_ref(), "chp");
                assert_eq!(recv.description, "M 0");
                assert_eq!(recv.delimiter, '\n');
            }
            _ => panic!("expected endpoint"),
        }
    }

    #[test]
    fn configure_receiver_interns_dialect_across_endpoints() {
        let sys = system();
        sys.insert_node(1, "client", 0).unwrap();
        sys.insert_node(2, "client", 0).unwrap();
        sys.configure_receiver(1, "chp", "M 0", '\n').unwrap();
        sys.configure_receiver(2, "chp", "M 1", '\n').unwrap();

        let dialect_of = |id: NodeId| match sys.find_node(id).unwrap().kind {
            NodeKind::Endpoint { state } => state.receiver.unwrap().dialect,
            _ => panic!("expected endpoint"),
        };
        assert!(std::sync::Arc::ptr_eq(&dialect_of(1), &dialect_of(2)));
    }

    #[test]
    fn set_switch_state_flips_chirality() {
        let sys = system();
        sys.insert_node(1, "client", 0).unwrap();
        sys.insert_node(2, "client", 0).unwrap();
        sys.insert_node(100, "circulator_switch", 2).unwrap();
        sys.connect_port(100, 0, 1).unwrap();
        sys.connect_port(100, 1, 2).unwrap();

        // builtin default is clockwise: port 0 -> port 1
        assert_eq!(sys.route(100, 1).unwrap(), Some(2));

        sys.set_switch_state(100, "ccw").unwrap();
        assert_eq!(sys.route(100, 2).unwrap(), Some(1));
    }

    #[test]
    fn set_switch_state_rejects_unknown_name() {
        let sys = system();
        sys.insert_node(100, "circulator_switch", 1).unwrap();
        let err = sys.set_switch_state(100, "sideways").unwrap_err();
        assert!(matches!(err, ModelError::Configuration { .. }));
    }

    #[test]
    fn counter_clockwise_variant_routes_backwards() {
        let registry = NodeRegistry::new();
        register_builtins(&registry).unwrap();
        let sys = System::new(registry);
        sys.insert_node(1, "client", 0).unwrap();
        sys.insert_node(2, "client", 0).unwrap();
        sys.insert_node(100, "circulator_switch", 2).unwrap();
        // override chirality directly, since the builtin default is clockwise
        {
            let mut guard = sys.nodes.write();
            if let NodeKind::Switch { variant, .. } = &mut guard.get_mut(&100).unwrap().kind {
                *variant = SwitchVariant::Circulator {
                    chirality: Chirality::CounterClockwise,
                };
            }
        }
        sys.connect_port(100, 0, 1).unwrap();
        sys.connect_port(100, 1, 2).unwrap();

        assert_eq!(sys.route(100, 1).unwrap(), Some(2));
    }
}
