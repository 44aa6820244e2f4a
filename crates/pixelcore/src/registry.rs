use crate::node::{Node, NodeMetadata};
use crate::GraphError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    /// Create a fresh instance of the node kind
    fn create(&self) -> Arc<dyn Node>;

    /// Get node kind identifier
    fn node_type(&self) -> &str;

    /// Display name, description and category of the kind
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Registry of available node kinds
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: BTreeMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node factory, replacing any factory of the same kind
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        tracing::debug!(kind = %node_type, "registering node kind");
        self.factories.insert(node_type, factory);
    }

    /// Create a node instance of the given kind
    pub fn create_node(&self, node_type: &str) -> Result<(Arc<dyn Node>, NodeMetadata), GraphError> {
        let factory = self
            .factories
            .get(node_type)
            .ok_or_else(|| GraphError::UnknownNodeKind(node_type.to_string()))?;

        let mut metadata = factory.metadata();
        if metadata.display_name.is_empty() {
            metadata.display_name = node_type.to_string();
        }
        Ok((factory.create(), metadata))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// All registered kinds, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn get_metadata(&self, node_type: &str) -> Option<NodeMetadata> {
        self.factories.get(node_type).map(|f| f.metadata())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
