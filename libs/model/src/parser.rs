//! Topology document parser.
//!
//! Three passes, in this order, because later passes assume earlier ones
//! have already populated the id index:
//!
//! 1. Recursively instantiate every node (including nested `nodes` children)
//!    via the registry and insert it into the system.
//! 2. Wire declared switch ports (`ports`), now that every id they can
//!    reference exists.
//! 3. Apply the top-level `connections` array to add any remaining
//!    symmetric edges.
//!
//! Duplicate ids, unknown models, type mismatches, out-of-range ports, and
//! references to unknown ids are all surfaced as configuration errors —
//! fatal at startup, never partially applied.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::topology::System;

#[derive(Debug, Deserialize)]
struct TopologyDoc {
    nodes: Vec<NodeDoc>,
    #[serde(default)]
    connections: Vec<ConnectionDoc>,
}

#[derive(Debug, Deserialize)]
struct NodeDoc {
    id: u64,
    model: String,
    #[serde(default, rename = "portCount")]
    port_count: usize,
    #[serde(default)]
    ports: Vec<Value>,
    #[serde(default)]
    nodes: Vec<NodeDoc>,
}

#[derive(Debug, Deserialize)]
struct ConnectionDoc {
    endpoints: (u64, u64),
}

/// Parse `source` (a JSON topology document) and apply it to `system`.
///
/// `system`'s registry must already have every referenced model registered
/// (see `register_builtins`); this function does not register any models
/// itself.
pub fn load_topology(system: &System, source: &str) -> Result<()> {
    let doc: TopologyDoc = serde_json::from_str(source)
        .map_err(|e| ModelError::configuration(format!("malformed topology document: {e}")))?;

    // Pass 1: instantiate every node, depth-first, including nested children.
    instantiate_nodes(system, &doc.nodes)?;

    // Pass 2: wire switch ports now that every id exists.
    wire_ports(system, &doc.nodes)?;

    // Pass 3: top-level connections.
    for conn in &doc.connections {
        let (a, b) = conn.endpoints;
        system.add_connection(a, b).map_err(|e| {
            ModelError::configuration(format!(
                "connection {{{a},{b}}} references an unknown node: {e}"
            ))
        })?;
    }

    Ok(())
}

fn instantiate_nodes(system: &System, nodes: &[NodeDoc]) -> Result<()> {
    for node in nodes {
        system
            .insert_node(node.id, &node.model, node.port_count)
            .map_err(|e| {
                ModelError::configuration(format!(
                    "node {} (model {:?}): {e}",
                    node.id, node.model
                ))
            })?;
        instantiate_nodes(system, &node.nodes)?;
    }
    Ok(())
}

fn wire_ports(system: &System, nodes: &[NodeDoc]) -> Result<()> {
    for node in nodes {
        if !node.ports.is_empty() {
            for (port, entry) in node.ports.iter().enumerate() {
                match entry {
                    Value::Null => continue,
                    Value::String(s) if s == "null" => continue,
                    Value::Number(n) => {
                        let peer = n.as_u64().ok_or_else(|| {
                            ModelError::configuration(format!(
                                "node {}: port {port} value {n} is not a valid node id",
                                node.id
                            ))
                        })?;
                        system.connect_port(node.id, port, peer).map_err(|e| {
                            ModelError::configuration(format!(
                                "node {}: port {port} -> {peer}: {e}",
                                node.id
                            ))
                        })?;
                    }
                    other => {
                        return Err(ModelError::configuration(format!(
                            "node {}: port {port} has unexpected value {other}",
                            node.id
                        )));
                    }
                }
            }
        }
        wire_ports(system, &node.nodes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{register_builtins, NodeRegistry};

    fn system() -> System {
        let registry = NodeRegistry::new();
        register_builtins(&registry).unwrap();
        System::new(registry)
    }

    #[test]
    fn parses_s1_direct_edge() {
        let sys = system();
        let doc = r#"{
            "nodes": [{"id":1,"model":"client"}, {"id":2,"model":"client"}],
            "connections": [{"endpoints":[1,2]}]
        }"#;
        load_topology(&sys, doc).unwrap();
        assert_eq!(sys.trace_tx(1).unwrap(), vec![1, 2]);
    }

    #[test]
    fn parses_circulator_with_ports() {
        let sys = system();
        let doc = r#"{
            "nodes": [
                {"id":1,"model":"client"},
                {"id":2,"model":"client"},
                {"id":3,"model":"client"},
                {"id":100,"model":"circulator_switch","portCount":3,"ports":[1,2,3]}
            ],
            "connections": []
        }"#;
        load_topology(&sys, doc).unwrap();
        assert_eq!(sys.trace_tx(1).unwrap(), vec![1, 100, 2]);
    }

    #[test]
    fn parses_null_ports_as_unwired() {
        let sys = system();
        let doc = r#"{
            "nodes": [
                {"id":1,"model":"client"},
                {"id":100,"model":"circulator_switch","portCount":2,"ports":[1,"null"]}
            ]
        }"#;
        load_topology(&sys, doc).unwrap();
        let rec = sys.find_node(100).unwrap();
        assert_eq!(rec.peers, vec![1]);
    }

    #[test]
    fn duplicate_id_is_configuration_error() {
        let sys = system();
        let doc = r#"{"nodes": [{"id":1,"model":"client"}, {"id":1,"model":"client"}]}"#;
        let err = load_topology(&sys, doc).unwrap_err();
        assert!(matches!(err, ModelError::Configuration { .. }));
    }

    #[test]
    fn unknown_model_is_configuration_error() {
        let sys = system();
        let doc = r#"{"nodes": [{"id":1,"model":"teleporter"}]}"#;
        let err = load_topology(&sys, doc).unwrap_err();
        assert!(matches!(err, ModelError::Configuration { .. }));
    }

    #[test]
    fn connection_to_unknown_node_is_configuration_error() {
        let sys = system();
        let doc = r#"{"nodes": [{"id":1,"model":"client"}], "connections": [{"endpoints":[1,99]}]}"#;
        let err = load_topology(&sys, doc).unwrap_err();
        assert!(matches!(err, ModelError::Configuration { .. }));
    }

    #[test]
    fn nested_child_nodes_are_instantiated() {
        let sys = system();
        let doc = r#"{
            "nodes": [
                {"id":1,"model":"client","nodes":[{"id":2,"model":"null_endpoint"}]}
            ],
            "connections": [{"endpoints":[1,2]}]
        }"#;
        load_topology(&sys, doc).unwrap();
        assert!(sys.contains(2));
    }
}
