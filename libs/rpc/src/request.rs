//! Wire-shaped types that cross the boundary between the RPC surface and
//! the compute workers: what an ingress worker decodes a request into, and
//! what a compute worker hands the egress publisher.

use model::{Action, NodeId};

/// A decoded, dispatch-ready ingress request. `component` distinguishes the
/// sub-operations `configure_node` is overloaded with ("receiver",
/// "transmitter", "routing"); `tx` requests leave it empty.
#[derive(Debug, Clone)]
pub struct InterpretedRequest {
    pub action: Action,
    pub node_id: NodeId,
    pub component: String,
    pub parameters: Vec<String>,
    pub timestamp: u64,
}

impl InterpretedRequest {
    pub fn new(
        action: Action,
        node_id: NodeId,
        component: impl Into<String>,
        parameters: Vec<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            action,
            node_id,
            component: component.into(),
            parameters,
            timestamp,
        }
    }
}

/// A completed `tx` result, queued for egress publication. `topic` is the
/// originating endpoint's node id, carried through so the published result
/// pairs with the request that produced it even though buffers make no
/// cross-buffer ordering guarantee.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub topic: NodeId,
    pub result: u64,
    pub timestamp: u64,
}

impl PushMessage {
    pub fn new(topic: NodeId, result: u64, timestamp: u64) -> Self {
        Self {
            topic,
            result,
            timestamp,
        }
    }

    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "result": self.result })
    }
}

/// Decode the big-endian-encoded originating node id carried as parameter 0
/// of every ingress request (the `ntohl` step the spec calls out).
pub fn decode_origin_node_id(raw: &[u8]) -> Option<NodeId> {
    let bytes: [u8; 4] = raw.try_into().ok()?;
    Some(u32::from_be_bytes(bytes) as NodeId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_big_endian_parameter_zero() {
        let raw = 2u32.to_be_bytes();
        assert_eq!(decode_origin_node_id(&raw), Some(2));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(decode_origin_node_id(&[1, 2, 3]), None);
    }

    #[test]
    fn push_message_body_matches_expected_shape() {
        let msg = PushMessage::new(2, 1, 0);
        assert_eq!(msg.body(), serde_json::json!({"result": 1}));
    }
}
