use async_trait::async_trait;
use pixelcore::{
    ExecutionEvent, Graph, GraphError, Node, NodeContext, NodeError, NodeFactory, NodeId,
    NodeOutput, NodeRegistry, NodeStatus, PinId, PinLayout, PinSpec, PinType, Position,
    RunStatus, SharedGraph, Value,
};
use pixelruntime::{ErrorPolicy, RunHandle, Runtime, RuntimeConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

struct Constant;

#[async_trait]
impl Node for Constant {
    fn node_type(&self) -> &str {
        "Constant"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::new().output(PinSpec::new("value", PinType::Float).with_default(2.0))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::new().with_output("value", ctx.output_default("value")))
    }
}

struct Double;

#[async_trait]
impl Node for Double {
    fn node_type(&self) -> &str {
        "Double"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::new()
            .input(PinSpec::new("x", PinType::Float))
            .output(PinSpec::new("y", PinType::Float))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let x = ctx.input_f64("x", 0.0)?;
        Ok(NodeOutput::new().with_output("y", x * 2.0))
    }
}

struct Fail;

#[async_trait]
impl Node for Fail {
    fn node_type(&self) -> &str {
        "Fail"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::new()
            .input(PinSpec::new("x", PinType::Float))
            .output(PinSpec::new("y", PinType::Float))
    }

    async fn process(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

struct Slow;

#[async_trait]
impl Node for Slow {
    fn node_type(&self) -> &str {
        "Slow"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::new()
            .input(PinSpec::new("x", PinType::Float))
            .output(PinSpec::new("y", PinType::Float))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(NodeOutput::new().with_output("y", ctx.input("x").clone()))
    }
}

struct Sum;

#[async_trait]
impl Node for Sum {
    fn node_type(&self) -> &str {
        "Sum"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::new()
            .input(PinSpec::new("values", PinType::Float).multiple())
            .output(PinSpec::new("total", PinType::Float))
    }

    async fn process(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let total = match ctx.input("values") {
            Value::Array(items) => items.iter().filter_map(Value::as_f64).sum(),
            other => other.as_f64().unwrap_or(0.0),
        };
        Ok(NodeOutput::new().with_output("total", total))
    }
}

struct Stray;

#[async_trait]
impl Node for Stray {
    fn node_type(&self) -> &str {
        "Stray"
    }

    fn declare_pins(&self) -> PinLayout {
        PinLayout::new().output(PinSpec::new("out", PinType::Float).with_default(1.0))
    }

    async fn process(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::new().with_output("out", 9.0).with_output("bogus", 1.0))
    }
}

struct TestKind(&'static str, fn() -> Arc<dyn Node>);

impl NodeFactory for TestKind {
    fn create(&self) -> Arc<dyn Node> {
        (self.1)()
    }

    fn node_type(&self) -> &str {
        self.0
    }
}

fn constant() -> Arc<dyn Node> {
    Arc::new(Constant)
}

fn double() -> Arc<dyn Node> {
    Arc::new(Double)
}

fn fail() -> Arc<dyn Node> {
    Arc::new(Fail)
}

fn slow() -> Arc<dyn Node> {
    Arc::new(Slow)
}

fn sum() -> Arc<dyn Node> {
    Arc::new(Sum)
}

fn stray() -> Arc<dyn Node> {
    Arc::new(Stray)
}

fn registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(TestKind("Constant", constant)));
    registry.register(Arc::new(TestKind("Double", double)));
    registry.register(Arc::new(TestKind("Fail", fail)));
    registry.register(Arc::new(TestKind("Slow", slow)));
    registry.register(Arc::new(TestKind("Sum", sum)));
    registry.register(Arc::new(TestKind("Stray", stray)));
    Arc::new(registry)
}

fn runtime(policy: ErrorPolicy) -> Runtime {
    Runtime::with_config(
        registry(),
        RuntimeConfig {
            error_policy: policy,
            ..RuntimeConfig::default()
        },
    )
}

fn add(graph: &mut Graph, kind: &str) -> NodeId {
    graph.add_node(kind, Position::default()).unwrap()
}

fn output(graph: &Graph, node: NodeId, name: &str) -> PinId {
    graph.node(node).unwrap().output(name).unwrap().id()
}

fn input(graph: &Graph, node: NodeId, name: &str) -> PinId {
    graph.node(node).unwrap().input(name).unwrap().id()
}

/// Wire the single output of `from` to the single input of `to`
fn wire(graph: &mut Graph, from: NodeId, out: &str, to: NodeId, inp: &str) {
    let o = output(graph, from, out);
    let i = input(graph, to, inp);
    graph.connect(o, i).unwrap();
}

async fn output_value(graph: &SharedGraph, node: NodeId, name: &str) -> Value {
    graph.read().await.node(node).unwrap().output(name).unwrap().value().clone()
}

async fn wait_for_node_start(events: &mut broadcast::Receiver<ExecutionEvent>) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for events")
            .unwrap();
        if matches!(event, ExecutionEvent::NodeStarted { .. }) {
            return;
        }
    }
}

#[tokio::test]
async fn test_chain_runs_in_order_and_propagates_values() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut graph = rt.new_graph();
    let d2 = add(&mut graph, "Double");
    let c = add(&mut graph, "Constant");
    let d1 = add(&mut graph, "Double");
    wire(&mut graph, c, "value", d1, "x");
    wire(&mut graph, d1, "y", d2, "x");
    let graph = graph.into_shared();

    let report = rt.execute(&graph).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.order(), vec![c, d1, d2]);
    assert_eq!(report.count(NodeStatus::Done), 3);
    assert_eq!(output_value(&graph, d2, "y").await, Value::Float(8.0));
    assert!(!graph.read().await.is_busy());
}

#[tokio::test]
async fn test_unconnected_input_uses_default() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut graph = rt.new_graph();
    let d = add(&mut graph, "Double");
    let x = input(&graph, d, "x");
    graph.set_pin_default(x, 5.0).unwrap();
    let graph = graph.into_shared();

    rt.execute(&graph).await.unwrap();

    assert_eq!(output_value(&graph, d, "y").await, Value::Float(10.0));
}

#[tokio::test]
async fn test_halt_on_failure_marks_remaining_not_run() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut graph = rt.new_graph();
    let c = add(&mut graph, "Constant");
    let f = add(&mut graph, "Fail");
    let d = add(&mut graph, "Double");
    wire(&mut graph, c, "value", f, "x");
    wire(&mut graph, f, "y", d, "x");
    let graph = graph.into_shared();

    let report = rt.execute(&graph).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.node(c).unwrap().status, NodeStatus::Done);
    assert_eq!(report.node(f).unwrap().status, NodeStatus::Failed);
    assert_eq!(
        report.node(f).unwrap().error,
        Some(NodeError::ExecutionFailed("boom".to_string()))
    );
    assert_eq!(report.node(d).unwrap().status, NodeStatus::NotRun);

    let g = graph.read().await;
    assert_eq!(g.node(d).unwrap().status(), NodeStatus::NotRun);
    assert!(!g.is_busy());
}

#[tokio::test]
async fn test_continue_on_failure_feeds_defaults_downstream() {
    let rt = runtime(ErrorPolicy::ContinueOnFailure);
    let mut graph = rt.new_graph();
    let c1 = add(&mut graph, "Constant");
    let f = add(&mut graph, "Fail");
    let d1 = add(&mut graph, "Double");
    let c2 = add(&mut graph, "Constant");
    let d2 = add(&mut graph, "Double");
    wire(&mut graph, c1, "value", f, "x");
    wire(&mut graph, f, "y", d1, "x");
    wire(&mut graph, c2, "value", d2, "x");
    let x = input(&graph, d1, "x");
    graph.set_pin_default(x, 3.0).unwrap();
    let graph = graph.into_shared();

    let report = rt.execute(&graph).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.nodes.len(), 5);
    assert_eq!(report.count(NodeStatus::Done), 4);
    assert_eq!(report.count(NodeStatus::Failed), 1);
    assert_eq!(output_value(&graph, d1, "y").await, Value::Float(6.0));
    assert_eq!(output_value(&graph, d2, "y").await, Value::Float(4.0));
}

#[tokio::test]
async fn test_multiple_input_receives_array_in_connection_order() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut graph = rt.new_graph();
    let a = add(&mut graph, "Constant");
    let b = add(&mut graph, "Constant");
    let s = add(&mut graph, "Sum");
    let b_out = output(&graph, b, "value");
    graph.set_pin_default(b_out, 3.0).unwrap();
    wire(&mut graph, b, "value", s, "values");
    wire(&mut graph, a, "value", s, "values");
    let graph = graph.into_shared();

    rt.execute(&graph).await.unwrap();

    let g = graph.read().await;
    let values = g.node(s).unwrap().input("values").unwrap().value().clone();
    assert_eq!(values, Value::Array(vec![Value::Float(3.0), Value::Float(2.0)]));
    assert_eq!(*g.node(s).unwrap().output("total").unwrap().value(), Value::Float(5.0));
}

#[tokio::test]
async fn test_cycle_is_rejected_before_running() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut events = rt.subscribe_events();
    let mut graph = rt.new_graph();
    let a = add(&mut graph, "Double");
    let b = add(&mut graph, "Double");
    let c = add(&mut graph, "Double");
    let tail = add(&mut graph, "Double");
    wire(&mut graph, a, "y", b, "x");
    wire(&mut graph, b, "y", c, "x");
    wire(&mut graph, c, "y", a, "x");
    wire(&mut graph, c, "y", tail, "x");
    let graph = graph.into_shared();

    let handle = RunHandle::new();
    let err = rt.execute_with(&graph, &handle).await.unwrap_err();

    match err {
        GraphError::CyclicGraph { mut nodes } => {
            nodes.sort();
            let mut expected = vec![a, b, c];
            expected.sort();
            assert_eq!(nodes, expected);
        }
        other => panic!("expected CyclicGraph, got {:?}", other),
    }
    assert_eq!(handle.status(), RunStatus::Failed);

    let g = graph.read().await;
    assert!(!g.is_busy());
    assert!(g.nodes().iter().all(|n| n.status() == NodeStatus::Idle));

    match events.try_recv().unwrap() {
        ExecutionEvent::RunFinished { status, .. } => assert_eq!(status, RunStatus::Failed),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_takes_effect_at_node_boundary() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut events = rt.subscribe_events();
    let mut graph = rt.new_graph();
    let s1 = add(&mut graph, "Slow");
    let s2 = add(&mut graph, "Slow");
    let s3 = add(&mut graph, "Slow");
    wire(&mut graph, s1, "y", s2, "x");
    wire(&mut graph, s2, "y", s3, "x");
    let graph = graph.into_shared();

    let (handle, task) = rt.spawn(graph.clone());
    wait_for_node_start(&mut events).await;
    handle.cancel();

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(handle.finished().await, RunStatus::Cancelled);
    assert_eq!(report.node(s1).unwrap().status, NodeStatus::Done);
    assert_eq!(report.node(s2).unwrap().status, NodeStatus::NotRun);
    assert_eq!(report.node(s3).unwrap().status, NodeStatus::NotRun);
    assert!(!graph.read().await.is_busy());
}

#[tokio::test]
async fn test_edits_fail_while_run_is_active() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut events = rt.subscribe_events();
    let mut graph = rt.new_graph();
    let s1 = add(&mut graph, "Slow");
    let s2 = add(&mut graph, "Slow");
    wire(&mut graph, s1, "y", s2, "x");
    let graph = graph.into_shared();

    let (handle, task) = rt.spawn(graph.clone());
    wait_for_node_start(&mut events).await;

    let busy = graph.write().await.add_node("Constant", Position::default());
    assert_eq!(busy, Err(GraphError::GraphBusy { run_id: handle.id() }));
    assert!(matches!(
        graph.write().await.remove_node(s1),
        Err(GraphError::GraphBusy { .. })
    ));
    assert!(matches!(
        rt.execute(&graph).await,
        Err(GraphError::GraphBusy { .. })
    ));

    let report = task.await.unwrap().unwrap();
    assert!(report.is_success());
    assert!(graph.write().await.add_node("Constant", Position::default()).is_ok());
}

#[tokio::test]
async fn test_run_outlives_caller_dropped_at_deadline() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut graph = rt.new_graph();
    let s1 = add(&mut graph, "Slow");
    let s2 = add(&mut graph, "Slow");
    wire(&mut graph, s1, "y", s2, "x");
    let graph = graph.into_shared();

    let handle = RunHandle::new();
    let raced = tokio::time::timeout(Duration::from_millis(30), rt.execute_with(&graph, &handle)).await;
    assert!(raced.is_err());
    handle.cancel();

    let status = tokio::time::timeout(Duration::from_secs(5), handle.finished())
        .await
        .expect("run never finished");
    assert_eq!(status, RunStatus::Cancelled);

    let mut g = graph.write().await;
    assert!(!g.is_busy());
    assert_eq!(g.node(s1).unwrap().status(), NodeStatus::Done);
    assert_eq!(g.node(s2).unwrap().status(), NodeStatus::NotRun);
    assert!(g.add_node("Constant", Position::default()).is_ok());
}

#[tokio::test]
async fn test_execute_node_runs_only_its_dependencies() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut graph = rt.new_graph();
    let c1 = add(&mut graph, "Constant");
    let d1 = add(&mut graph, "Double");
    let c2 = add(&mut graph, "Constant");
    let d2 = add(&mut graph, "Double");
    wire(&mut graph, c1, "value", d1, "x");
    wire(&mut graph, c2, "value", d2, "x");
    let graph = graph.into_shared();

    let report = rt.execute_node(&graph, d1).await.unwrap();

    assert_eq!(report.order(), vec![c1, d1]);
    let g = graph.read().await;
    assert_eq!(g.node(d1).unwrap().status(), NodeStatus::Done);
    assert_eq!(g.node(d2).unwrap().status(), NodeStatus::Idle);
}

#[tokio::test]
async fn test_progress_events_per_node() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut events = rt.subscribe_events();
    let mut graph = rt.new_graph();
    let c = add(&mut graph, "Constant");
    let d = add(&mut graph, "Double");
    wire(&mut graph, c, "value", d, "x");
    let graph = graph.into_shared();

    let report = rt.execute(&graph).await.unwrap();

    let mut finished = Vec::new();
    let mut run_status = None;
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.run_id(), report.run_id);
        match event {
            ExecutionEvent::NodeFinished { node_id, status, .. } => finished.push((node_id, status)),
            ExecutionEvent::RunFinished { status, .. } => run_status = Some(status),
            _ => {}
        }
    }
    assert_eq!(finished, vec![(c, NodeStatus::Done), (d, NodeStatus::Done)]);
    assert_eq!(run_status, Some(RunStatus::Completed));
}

#[tokio::test]
async fn test_unknown_output_fails_node_without_partial_writes() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let mut graph = rt.new_graph();
    let s = add(&mut graph, "Stray");
    let graph = graph.into_shared();

    let report = rt.execute(&graph).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(
        report.node(s).unwrap().error,
        Some(NodeError::UnknownOutput("bogus".to_string()))
    );
    assert_eq!(output_value(&graph, s, "out").await, Value::Float(1.0));
}

#[tokio::test]
async fn test_empty_graph_completes() {
    let rt = runtime(ErrorPolicy::HaltOnFailure);
    let graph = rt.new_graph().into_shared();

    let report = rt.execute(&graph).await.unwrap();

    assert!(report.is_success());
    assert!(report.nodes.is_empty());
}
