use chrono::Utc;
use pixelcore::{
    EventBus, ExecutionEvent, GraphError, NodeContext, NodeError, NodeId, NodeStatus, RunId,
    RunStatus, SharedGraph,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What the engine does after a node fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the run; remaining nodes are reported as not run
    #[default]
    HaltOnFailure,
    /// Keep going. Outputs of failed nodes count as absent, so their
    /// consumers fall back to input defaults.
    ContinueOnFailure,
}

/// Caller-side handle on a single run: identity, cancellation and status
#[derive(Clone)]
pub struct RunHandle {
    id: RunId,
    token: CancellationToken,
    status: Arc<watch::Sender<RunStatus>>,
}

impl RunHandle {
    pub fn new() -> Self {
        let (status, _) = watch::channel(RunStatus::Idle);
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
            status: Arc::new(status),
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    /// Request cancellation. Takes effect at the next node boundary; the
    /// node currently processing always runs to completion.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Wait until the run reaches a terminal status
    pub async fn finished(&self) -> RunStatus {
        let mut rx = self.watch();
        loop {
            let current = *rx.borrow_and_update();
            if current.is_finished() {
                return current;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn set_status(&self, status: RunStatus) {
        self.status.send_replace(status);
    }
}

impl Default for RunHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one node within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeReport {
    pub node_id: NodeId,
    pub kind: String,
    pub status: NodeStatus,
    pub elapsed_ms: u64,
    pub error: Option<NodeError>,
}

/// Aggregate result of a run. Contains one entry per scheduled node, in
/// execution order, whatever the overall status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub nodes: Vec<NodeReport>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.node_id == id)
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    pub fn order(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.node_id).collect()
    }
}

/// Runs graphs node by node in topological order.
///
/// The graph lock is held only while inputs are gathered and while outputs
/// are written back, never across a node's `process` call.
#[derive(Clone)]
pub struct ExecutionEngine {
    policy: ErrorPolicy,
    events: Arc<EventBus>,
}

impl ExecutionEngine {
    pub fn new(policy: ErrorPolicy, events: Arc<EventBus>) -> Self {
        Self { policy, events }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Execute every node of the graph
    pub async fn execute(&self, graph: &SharedGraph) -> Result<RunReport, GraphError> {
        self.execute_with(graph, &RunHandle::new()).await
    }

    /// Execute every node, observing cancellation through `handle`.
    ///
    /// The run lives on its own task. Dropping this future detaches the run;
    /// `handle.cancel()` still stops it at the next node boundary.
    pub async fn execute_with(
        &self,
        graph: &SharedGraph,
        handle: &RunHandle,
    ) -> Result<RunReport, GraphError> {
        self.run(graph, handle, None).await
    }

    /// Execute `target` and everything it transitively depends on
    pub async fn execute_node(
        &self,
        graph: &SharedGraph,
        target: NodeId,
    ) -> Result<RunReport, GraphError> {
        self.run(graph, &RunHandle::new(), Some(target)).await
    }

    /// Start a full run on the current tokio runtime
    pub fn spawn(&self, graph: SharedGraph) -> (RunHandle, JoinHandle<Result<RunReport, GraphError>>) {
        let handle = RunHandle::new();
        let task = tokio::spawn(self.clone().drive(graph, handle.clone(), None));
        (handle, task)
    }

    async fn run(
        &self,
        graph: &SharedGraph,
        handle: &RunHandle,
        target: Option<NodeId>,
    ) -> Result<RunReport, GraphError> {
        let task = tokio::spawn(self.clone().drive(graph.clone(), handle.clone(), target));
        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(run_id = %handle.id(), error = %e, "run task aborted");
                handle.set_status(RunStatus::Failed);
                Err(GraphError::RunAborted(e.to_string()))
            }
        }
    }

    async fn drive(
        self,
        graph: SharedGraph,
        handle: RunHandle,
        target: Option<NodeId>,
    ) -> Result<RunReport, GraphError> {
        let run_id = handle.id();
        let started = Instant::now();

        let order = {
            let mut g = graph.write().await;
            if let Err(e) = g.begin_run(run_id) {
                handle.set_status(RunStatus::Failed);
                return Err(e);
            }
            let order = match target {
                Some(node) => g.execution_order_for(node),
                None => g.calculate_execution_order(),
            };
            match order {
                Ok(order) => order,
                Err(e) => {
                    g.end_run(run_id);
                    tracing::error!(%run_id, error = %e, "run rejected");
                    handle.set_status(RunStatus::Failed);
                    self.emit_finished(run_id, RunStatus::Failed, started.elapsed().as_millis() as u64);
                    return Err(e);
                }
            }
        };

        tracing::info!(%run_id, nodes = order.len(), "run started");
        handle.set_status(RunStatus::Running);
        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            node_count: order.len(),
            timestamp: Utc::now(),
        });

        let result = self.run_nodes(&graph, &handle, &order).await;
        graph.write().await.end_run(run_id);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let (status, nodes) = match result {
            Ok(done) => done,
            Err(e) => {
                handle.set_status(RunStatus::Failed);
                self.emit_finished(run_id, RunStatus::Failed, elapsed_ms);
                return Err(e);
            }
        };

        tracing::info!(%run_id, %status, elapsed_ms, "run finished");
        handle.set_status(status);
        self.emit_finished(run_id, status, elapsed_ms);

        Ok(RunReport {
            run_id,
            status,
            nodes,
            elapsed_ms,
        })
    }

    async fn run_nodes(
        &self,
        graph: &SharedGraph,
        handle: &RunHandle,
        order: &[NodeId],
    ) -> Result<(RunStatus, Vec<NodeReport>), GraphError> {
        let run_id = handle.id();
        let mut reports = Vec::with_capacity(order.len());
        let mut failed: HashSet<NodeId> = HashSet::new();
        let mut status = RunStatus::Completed;
        let mut stopped_at = order.len();

        for (index, &node_id) in order.iter().enumerate() {
            if handle.is_cancelled() {
                tracing::info!(%run_id, "run cancelled");
                status = RunStatus::Cancelled;
                stopped_at = index;
                break;
            }

            let prepared = graph.write().await.prepare_node(node_id, &failed)?;
            let kind = prepared.kind.clone();

            tracing::debug!(%run_id, %node_id, kind = %kind, "node started");
            self.events.emit(ExecutionEvent::NodeStarted {
                run_id,
                node_id,
                kind: kind.clone(),
                timestamp: Utc::now(),
            });

            let ctx = NodeContext {
                node_id,
                inputs: prepared.inputs,
                output_defaults: prepared.output_defaults,
                events: self.events.create_emitter(run_id, node_id),
                cancellation: handle.token().child_token(),
            };

            let node_started = Instant::now();
            let behavior = prepared.behavior;
            let outcome = tokio::spawn(async move { behavior.process(ctx).await })
                .await
                .unwrap_or_else(|e| Err(NodeError::ExecutionFailed(format!("node task aborted: {}", e))));
            let elapsed_ms = node_started.elapsed().as_millis() as u64;

            let error = graph.write().await.record_outcome(node_id, outcome)?;
            let node_status = if error.is_some() {
                NodeStatus::Failed
            } else {
                NodeStatus::Done
            };

            self.events.emit(ExecutionEvent::NodeFinished {
                run_id,
                node_id,
                status: node_status,
                elapsed_ms,
                error: error.as_ref().map(|e| e.to_string()),
                timestamp: Utc::now(),
            });

            reports.push(NodeReport {
                node_id,
                kind: kind.clone(),
                status: node_status,
                elapsed_ms,
                error: error.clone(),
            });

            match error {
                None => tracing::debug!(%run_id, %node_id, elapsed_ms, "node done"),
                Some(e) => {
                    tracing::error!(%run_id, %node_id, kind = %kind, error = %e, "node failed");
                    failed.insert(node_id);

                    if e == NodeError::Cancelled && handle.is_cancelled() {
                        status = RunStatus::Cancelled;
                        stopped_at = index + 1;
                        break;
                    }
                    status = RunStatus::Failed;
                    if self.policy == ErrorPolicy::HaltOnFailure {
                        stopped_at = index + 1;
                        break;
                    }
                }
            }
        }

        let skipped = &order[stopped_at..];
        if !skipped.is_empty() {
            let mut g = graph.write().await;
            g.mark_not_run(skipped);
            for &node_id in skipped {
                let kind = g.node(node_id).map(|n| n.kind().to_string()).unwrap_or_default();
                reports.push(NodeReport {
                    node_id,
                    kind,
                    status: NodeStatus::NotRun,
                    elapsed_ms: 0,
                    error: None,
                });
            }
        }

        Ok((status, reports))
    }

    fn emit_finished(&self, run_id: RunId, status: RunStatus, elapsed_ms: u64) {
        self.events.emit(ExecutionEvent::RunFinished {
            run_id,
            status,
            elapsed_ms,
            timestamp: Utc::now(),
        });
    }
}
