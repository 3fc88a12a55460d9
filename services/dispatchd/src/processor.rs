//! The dispatch core: compute workers that drain the incoming buffer,
//! interpret each request against the topology, invoke the simulator when
//! a `tx` needs one, and enqueue results for egress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use diagnostics::{DiagnosticsPublisher, MissCounter};
use model::{Action, NodeKind, System};
use queue::WorkBuffer;
use rpc::{InterpretedRequest, PushMessage};
use simulator::rpc::{compute_result, parse_binary_result};
use simulator::SimulatorClient;
use tracing::{debug, warn};

const WAIT_MS: u64 = 15;
const MAX_CONSECUTIVE_MISSES: u32 = 2;
/// The `tx` traversal always invokes the simulator against this fixed
/// system id; the dispatcher does not multiplex multiple simulator
/// systems.
const DEFAULT_SYSTEM_ID: u64 = 1;

pub struct ProcessorHandle {
    exit: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl ProcessorHandle {
    pub fn shutdown(self) {
        self.exit.store(true, Ordering::SeqCst);
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

/// Spawn one compute worker per simulator client. Each worker owns its
/// client for the worker's whole lifetime (per-worker affinity).
pub fn spawn(
    clients: Vec<SimulatorClient>,
    topology: System,
    incoming: Arc<WorkBuffer<InterpretedRequest>>,
    outgoing: Arc<WorkBuffer<PushMessage>>,
    diagnostics: Arc<DiagnosticsPublisher>,
) -> ProcessorHandle {
    let exit = Arc::new(AtomicBool::new(false));
    let mut workers = Vec::with_capacity(clients.len());

    for (i, client) in clients.into_iter().enumerate() {
        let topology = topology.clone();
        let incoming = Arc::clone(&incoming);
        let outgoing = Arc::clone(&outgoing);
        let diagnostics = Arc::clone(&diagnostics);
        let exit = Arc::clone(&exit);

        let handle = std::thread::Builder::new()
            .name(format!("compute-{i}"))
            .spawn(move || run_worker(client, topology, incoming, outgoing, diagnostics, exit))
            .expect("failed to spawn compute worker thread");
        workers.push(handle);
    }

    ProcessorHandle { exit, workers }
}

fn run_worker(
    client: SimulatorClient,
    topology: System,
    incoming: Arc<WorkBuffer<InterpretedRequest>>,
    outgoing: Arc<WorkBuffer<PushMessage>>,
    diagnostics: Arc<DiagnosticsPublisher>,
    exit: Arc<AtomicBool>,
) {
    let wait = Duration::from_millis(WAIT_MS);
    let misses = MissCounter::new(MAX_CONSECUTIVE_MISSES);

    while !exit.load(Ordering::SeqCst) {
        let hit = incoming.wait_until_threshold(wait);
        if !misses.record(hit) {
            continue;
        }

        for request in incoming.drain() {
            handle_request(&client, &topology, &outgoing, &diagnostics, request);
        }
    }
}

fn handle_request(
    client: &SimulatorClient,
    topology: &System,
    outgoing: &WorkBuffer<PushMessage>,
    diagnostics: &DiagnosticsPublisher,
    request: InterpretedRequest,
) {
    match request.action {
        Action::ConfigureNode => handle_configure_node(topology, request),
        Action::ConfigureQswitch => handle_configure_node(topology, request),
        Action::Tx => handle_tx(client, topology, outgoing, diagnostics, request),
    }
}

fn handle_configure_node(topology: &System, request: InterpretedRequest) {
    let node = match topology.find_node(request.node_id) {
        Ok(n) => n,
        Err(e) => {
            warn!(node_id = request.node_id, error = %e, "configure_node on unknown node");
            return;
        }
    };

    match (request.component.as_str(), &node.kind) {
        ("receiver", NodeKind::Endpoint { .. }) => {
            let dialect = request.parameters.get(0).cloned().unwrap_or_default();
            let description = request.parameters.get(1).cloned().unwrap_or_default();
            let delimiter = request
                .parameters
                .get(2)
                .and_then(|s| s.chars().next())
                .unwrap_or('\n');
            if let Err(e) = topology.configure_receiver(request.node_id, dialect, description, delimiter) {
                warn!(node_id = request.node_id, error = %e, "failed to configure receiver");
            }
        }
        ("transmitter", NodeKind::Endpoint { .. }) => {
            // No-op: no transmitter-side configuration is defined.
        }
        ("routing", NodeKind::Switch { .. }) => {
            let state = request.parameters.get(0).map(String::as_str).unwrap_or("");
            if let Err(e) = topology.set_switch_state(request.node_id, state) {
                warn!(node_id = request.node_id, error = %e, "failed to set switch state");
            }
        }
        (_, NodeKind::Null) => {
            debug!(node_id = request.node_id, "configure_node on null node: dropped");
        }
        (component, _) => {
            warn!(node_id = request.node_id, component, "configure_node component mismatched node kind");
        }
    }
}

fn handle_tx(
    client: &SimulatorClient,
    topology: &System,
    outgoing: &WorkBuffer<PushMessage>,
    diagnostics: &DiagnosticsPublisher,
    request: InterpretedRequest,
) {
    let path = match topology.trace_tx(request.node_id) {
        Ok(p) => p,
        Err(e) => {
            warn!(node_id = request.node_id, error = %e, "tx traversal failed");
            diagnostics.put(Action::Tx.as_str(), b"{\"dropped\":true}".to_vec());
            return;
        }
    };

    let endpoint_id = match path.last() {
        Some(id) => *id,
        None => return,
    };

    let endpoint = match topology.find_node(endpoint_id) {
        Ok(n) => n,
        Err(_) => return,
    };

    let receiver = match &endpoint.kind {
        NodeKind::Endpoint { state } => state.receiver.clone(),
        _ => None,
    };

    let receiver = match receiver {
        Some(r) => r,
        None => {
            debug!(endpoint_id, "tx reached a node with no configured receiver: dropped");
            diagnostics.put(Action::Tx.as_str(), b"{\"dropped\":true}".to_vec());
            return;
        }
    };

    let circuit = request.parameters.get(1).cloned().unwrap_or_default();
    let effective_description = format!("{circuit}\n{}", receiver.description);

    let sim_request = compute_result(
        DEFAULT_SYSTEM_ID,
        &receiver.dialect,
        &effective_description,
        receiver.delimiter,
    );

    let response = match client.call(&sim_request) {
        Ok(r) => r,
        Err(e) => {
            warn!(endpoint_id, error = %e, "compute_result RPC failed");
            return;
        }
    };

    let raw = match response.as_string("compute_result") {
        Ok(s) => s,
        Err(e) => {
            warn!(endpoint_id, error = %e, "compute_result returned a non-string result");
            return;
        }
    };

    let result = match parse_binary_result("compute_result", &raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(endpoint_id, error = %e, "compute_result returned a non-binary string");
            return;
        }
    };

    outgoing.push(PushMessage::new(endpoint_id, result, request.timestamp));
}
