//! End-to-end topology scenarios from the dispatcher's scenario catalog,
//! exercised directly against the topology model and parser the binary
//! wires up at startup.

use model::{register_builtins, NodeKind, NodeRegistry, System};

fn system() -> System {
    let registry = NodeRegistry::new();
    register_builtins(&registry).unwrap();
    System::new(registry)
}

/// S1: single-hop tx between two directly connected clients.
#[test]
fn s1_single_hop_tx() {
    let sys = system();
    model::parser::load_topology(
        &sys,
        r#"{"nodes":[{"id":1,"model":"client"},{"id":2,"model":"client"}],"connections":[{"endpoints":[1,2]}]}"#,
    )
    .unwrap();

    sys.configure_receiver(2, "chp", "M 0", '\n').unwrap();

    let path = sys.trace_tx(1).unwrap();
    assert_eq!(path, vec![1, 2]);

    let receiver_node = sys.find_node(2).unwrap();
    let receiver = match receiver_node.kind {
        NodeKind::Endpoint { state } => state.receiver.unwrap(),
        _ => panic!("expected endpoint"),
    };
    let effective_description = format!("X 0\n{}", receiver.description);
    assert_eq!(effective_description, "X 0\nM 0");
}

/// S2: three-port circulator, clockwise — port 0 routes to port 1.
#[test]
fn s2_circulator_clockwise() {
    let sys = system();
    model::parser::load_topology(
        &sys,
        r#"{"nodes":[
            {"id":1,"model":"client"},
            {"id":2,"model":"client"},
            {"id":3,"model":"client"},
            {"id":100,"model":"circulator_switch","portCount":3,"ports":[1,2,3]}
        ]}"#,
    )
    .unwrap();

    assert_eq!(sys.trace_tx(1).unwrap(), vec![1, 100, 2]);
}

/// S3: same topology, counter-clockwise — port 0 routes to port 2.
#[test]
fn s3_circulator_counter_clockwise() {
    let sys = system();
    model::parser::load_topology(
        &sys,
        r#"{"nodes":[
            {"id":1,"model":"client"},
            {"id":2,"model":"client"},
            {"id":3,"model":"client"},
            {"id":100,"model":"circulator_switch","portCount":3,"ports":[1,2,3]}
        ]}"#,
    )
    .unwrap();

    sys.set_switch_state(100, "ccw").unwrap();
    assert_eq!(sys.trace_tx(1).unwrap(), vec![1, 100, 3]);
}

/// S4: tx into a null endpoint terminates the trace without a receiver.
#[test]
fn s4_null_endpoint_has_no_receiver() {
    let sys = system();
    model::parser::load_topology(
        &sys,
        r#"{"nodes":[{"id":1,"model":"client"},{"id":2,"model":"null_endpoint"}],"connections":[{"endpoints":[1,2]}]}"#,
    )
    .unwrap();

    let path = sys.trace_tx(1).unwrap();
    assert_eq!(path, vec![1, 2]);
    let endpoint = sys.find_node(2).unwrap();
    assert!(matches!(endpoint.kind, NodeKind::Null));
}
