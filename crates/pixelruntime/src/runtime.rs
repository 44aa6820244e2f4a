use crate::executor::{ErrorPolicy, ExecutionEngine, RunHandle, RunReport};
use pixelcore::{
    EventBus, ExecutionEvent, FlowError, Graph, GraphError, NodeId, NodeRegistry, SharedGraph,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Entry point tying a node registry, an event bus and an execution engine
/// together
pub struct Runtime {
    registry: Arc<NodeRegistry>,
    engine: ExecutionEngine,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a runtime with default settings
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    pub fn with_config(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let engine = ExecutionEngine::new(config.error_policy, event_bus.clone());

        Self {
            registry,
            engine,
            event_bus,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Empty graph bound to this runtime's registry
    pub fn new_graph(&self) -> Graph {
        Graph::new(self.registry.clone())
    }

    /// Rebuild a graph from snapshot JSON
    pub fn load_graph(&self, json: &str) -> Result<Graph, FlowError> {
        Graph::from_json(self.registry.clone(), json)
    }

    pub async fn execute(&self, graph: &SharedGraph) -> Result<RunReport, GraphError> {
        self.engine.execute(graph).await
    }

    pub async fn execute_with(
        &self,
        graph: &SharedGraph,
        handle: &RunHandle,
    ) -> Result<RunReport, GraphError> {
        self.engine.execute_with(graph, handle).await
    }

    pub async fn execute_node(
        &self,
        graph: &SharedGraph,
        target: NodeId,
    ) -> Result<RunReport, GraphError> {
        self.engine.execute_node(graph, target).await
    }

    /// Run in the background; cancel through the returned handle
    pub fn spawn(&self, graph: SharedGraph) -> (RunHandle, JoinHandle<Result<RunReport, GraphError>>) {
        self.engine.spawn(graph)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub error_policy: ErrorPolicy,
    /// Capacity of the progress broadcast channel
    pub event_buffer_size: usize,
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            event_buffer_size: 1000,
        }
    }
}
