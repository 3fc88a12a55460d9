//! Node factory registry. The original dispatched on model name through a
//! process-wide map of constructors; we keep that shape rather than an enum
//! match in the parser, since new node models are added here and nowhere
//! else touches the parser.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ModelError, Result};
use crate::node::{Chirality, NodeKind, NodeRecord, SwitchVariant};

/// Builds the `NodeKind` for a freshly-parsed node of a given model name.
/// `port_count` is `0` for non-switch models; the parser supplies it from
/// the topology document's `ports` field when present.
pub type NodeCtor = Arc<dyn Fn(u64, usize) -> NodeKind + Send + Sync>;

/// Process-wide map from model name to constructor. Populated once at
/// startup by `register_builtins`; the parser consults it for every node.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    ctors: Arc<RwLock<HashMap<String, NodeCtor>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            ctors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a constructor for `model`. Fails if the name is already
    /// taken, mirroring the original's refusal to double-register a model.
    pub fn register(&self, model: impl Into<String>, ctor: NodeCtor) -> Result<()> {
        let model = model.into();
        let mut guard = self.ctors.write();
        if guard.contains_key(&model) {
            return Err(ModelError::registration_failure(model));
        }
        guard.insert(model, ctor);
        Ok(())
    }

    /// Construct a node record of the given model name, erroring if no
    /// constructor is registered for it.
    pub fn build(&self, id: u64, model: &str, port_count: usize) -> Result<NodeRecord> {
        let guard = self.ctors.read();
        let ctor = guard
            .get(model)
            .ok_or_else(|| ModelError::type_not_found(model))?;
        Ok(NodeRecord::new(id, model, ctor(id, port_count)))
    }

    pub fn is_registered(&self, model: &str) -> bool {
        self.ctors.read().contains_key(model)
    }
}

/// Registers the node models this dispatcher ships with. Called once from
/// the binary's startup sequence, before the topology parser runs.
pub fn register_builtins(registry: &NodeRegistry) -> Result<()> {
    registry.register(
        "client",
        Arc::new(|_id, _ports| NodeKind::Endpoint {
            state: Default::default(),
        }),
    )?;

    registry.register(
        "null_endpoint",
        Arc::new(|_id, _ports| NodeKind::Null),
    )?;

    registry.register(
        "circulator_switch",
        Arc::new(|_id, ports| NodeKind::Switch {
            variant: SwitchVariant::Circulator {
                chirality: Chirality::Clockwise,
            },
            ports: vec![None; ports],
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_register_without_conflict() {
        let registry = NodeRegistry::new();
        register_builtins(&registry).unwrap();
        assert!(registry.is_registered("client"));
        assert!(registry.is_registered("null_endpoint"));
        assert!(registry.is_registered("circulator_switch"));
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = NodeRegistry::new();
        register_builtins(&registry).unwrap();
        let err = register_builtins(&registry).unwrap_err();
        assert!(matches!(err, ModelError::RegistrationFailure { .. }));
    }

    #[test]
    fn unknown_model_fails_to_build() {
        let registry = NodeRegistry::new();
        register_builtins(&registry).unwrap();
        let err = registry.build(1, "quantum_repeater", 0).unwrap_err();
        assert!(matches!(err, ModelError::TypeNotFound { .. }));
    }
}
