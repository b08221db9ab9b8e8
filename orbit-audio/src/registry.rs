//! Per-channel ordered effect list
//!
//! Order is signal-path order: the first instance sits nearest the source.

use crate::effects::EffectParams;
use crate::graph::NodeId;
use std::fmt;

/// Stable handle for an effect instance; survives processor rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(pub u64);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An attached effect: its parameters and the graph node derived from them
#[derive(Debug, Clone)]
pub struct EffectInstance {
    pub id: EffectId,
    pub params: EffectParams,
    pub node: NodeId,
}

#[derive(Debug, Default)]
pub struct EffectRegistry {
    instances: Vec<EffectInstance>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn push(&mut self, instance: EffectInstance) {
        self.instances.push(instance);
    }

    pub fn get(&self, id: EffectId) -> Option<&EffectInstance> {
        self.instances.iter().find(|e| e.id == id)
    }

    pub fn position(&self, id: EffectId) -> Option<usize> {
        self.instances.iter().position(|e| e.id == id)
    }

    pub fn remove(&mut self, id: EffectId) -> Option<EffectInstance> {
        let index = self.position(id)?;
        Some(self.instances.remove(index))
    }

    /// Swap in a rebuilt node at the same position; returns the old node
    pub fn replace(&mut self, id: EffectId, node: NodeId, params: EffectParams) -> Option<NodeId> {
        let instance = self.instances.iter_mut().find(|e| e.id == id)?;
        instance.params = params;
        Some(std::mem::replace(&mut instance.node, node))
    }

    pub fn set_params(&mut self, id: EffectId, params: EffectParams) -> bool {
        match self.instances.iter_mut().find(|e| e.id == id) {
            Some(instance) => {
                instance.params = params;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectInstance> {
        self.instances.iter()
    }

    /// Graph nodes in signal-path order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.instances.iter().map(|e| e.node)
    }

    pub fn drain(&mut self) -> Vec<EffectInstance> {
        std::mem::take(&mut self.instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectKind, EffectParams};

    fn instance(id: u64, node: u32) -> EffectInstance {
        EffectInstance {
            id: EffectId(id),
            params: EffectParams::default_for(EffectKind::Echo),
            node: NodeId::new(node as usize),
        }
    }

    #[test]
    fn test_order_and_removal() {
        let mut registry = EffectRegistry::new();
        registry.push(instance(1, 10));
        registry.push(instance(2, 11));
        registry.push(instance(3, 12));

        assert_eq!(registry.position(EffectId(2)), Some(1));
        let removed = registry.remove(EffectId(2)).unwrap();
        assert_eq!(removed.node, NodeId::new(11));
        assert!(registry.remove(EffectId(2)).is_none());
        let nodes: Vec<_> = registry.nodes().collect();
        assert_eq!(nodes, vec![NodeId::new(10), NodeId::new(12)]);
    }

    #[test]
    fn test_replace_keeps_position_and_id() {
        let mut registry = EffectRegistry::new();
        registry.push(instance(1, 10));
        registry.push(instance(2, 11));

        let params = EffectParams::default_for(EffectKind::Pitch);
        let old = registry.replace(EffectId(1), NodeId::new(20), params);
        assert_eq!(old, Some(NodeId::new(10)));
        assert_eq!(registry.position(EffectId(1)), Some(0));
        assert_eq!(registry.get(EffectId(1)).unwrap().params, params);
        assert!(registry.replace(EffectId(9), NodeId::new(21), params).is_none());
    }

    #[test]
    fn test_drain_empties() {
        let mut registry = EffectRegistry::new();
        registry.push(instance(1, 10));
        assert_eq!(registry.drain().len(), 1);
        assert!(registry.is_empty());
    }
}
