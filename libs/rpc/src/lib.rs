//! Ingress/egress RPC surface: the steerable front-end proxy, the reply
//! worker pool, and the egress publisher.

pub mod egress;
pub mod error;
pub mod ingress;
pub mod proxy;
pub mod request;

pub use egress::EgressHandle;
pub use error::{Result, RpcError};
pub use ingress::IngressHandle;
pub use proxy::ProxyHandle;
pub use request::{decode_origin_node_id, InterpretedRequest, PushMessage};
