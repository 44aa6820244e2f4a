// crates/pixelcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pixelcore::{
    ExecutionEvent, Graph, NodeEvent, NodeId, NodeStatus, PinDirection, Position, SharedGraph,
    Value,
};
use pixelruntime::{ErrorPolicy, RunReport, Runtime, RuntimeConfig};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixelflow")]
#[command(about = "PixelFlow graph runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a project file
    Run {
        /// Path to project JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Keep running independent nodes after a node fails
        #[arg(long)]
        continue_on_error: bool,

        /// Runtime configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cancel the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Inspect a project file without running it
    Analyze {
        /// Path to project JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example project
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_logging(verbose);

    let success = match cli.command {
        Commands::Run {
            file,
            verbose,
            continue_on_error,
            config,
            timeout_secs,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => RuntimeConfig::default(),
            };
            if continue_on_error {
                config.error_policy = ErrorPolicy::ContinueOnFailure;
            }
            run_project(&file, config, verbose, timeout_secs).await?
        }

        Commands::Analyze { file } => analyze_project(&file)?,

        Commands::Nodes => {
            list_nodes();
            true
        }

        Commands::Init { output } => {
            create_example_project(&output)?;
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(RuntimeConfig::from_json(&json)?)
}

fn load_project(runtime: &Runtime, file: &Path) -> Result<Graph> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading project {}", file.display()))?;
    runtime
        .load_graph(&json)
        .with_context(|| format!("loading project {}", file.display()))
}

/// "name (kind)" label for each node, used when printing events
fn node_labels(graph: &Graph) -> HashMap<NodeId, String> {
    graph
        .nodes()
        .into_iter()
        .map(|n| (n.id(), format!("{} ({})", n.name(), n.kind())))
        .collect()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Image(img) => format!("image {}x{}", img.width, img.height),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::String(s) | Value::Path(s) => format!("{:?}", s),
        Value::Float(f) => format!("{}", f),
        Value::Int(i) => format!("{}", i),
        Value::Bool(b) => format!("{}", b),
        other => format!("{:?}", other),
    }
}

async fn run_project(
    file: &Path,
    config: RuntimeConfig,
    verbose: bool,
    timeout_secs: Option<u64>,
) -> Result<bool> {
    println!("🚀 Loading project from: {}", file.display());

    let runtime = Runtime::with_config(pixelnodes::registry(), config);
    let graph = load_project(&runtime, file)?;
    let labels = node_labels(&graph);

    println!("   Nodes: {}", graph.node_count());
    println!("   Connections: {}", graph.connection_count());
    println!();

    let graph: SharedGraph = graph.into_shared();

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let printer_labels = labels.clone();
    let printer = tokio::spawn(async move {
        let label = |id: &NodeId| {
            printer_labels
                .get(id)
                .cloned()
                .unwrap_or_else(|| id.to_string())
        };
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            };
            match event {
                ExecutionEvent::RunStarted { node_count, .. } => {
                    println!("▶️  Run started ({} nodes)", node_count);
                }
                ExecutionEvent::NodeStarted { node_id, .. } => {
                    println!("  ⚡ {}", label(&node_id));
                }
                ExecutionEvent::NodeFinished {
                    node_id,
                    status,
                    elapsed_ms,
                    error,
                    ..
                } => match error {
                    Some(error) => println!("  ❌ {} failed: {}", label(&node_id), error),
                    None => println!("  ✅ {} {} in {}ms", label(&node_id), status, elapsed_ms),
                },
                ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
                    NodeEvent::Info { message } => {
                        println!("     ℹ️  [{}] {}", label(&node_id), message);
                    }
                    NodeEvent::Warning { message } => {
                        println!("     ⚠️  [{}] {}", label(&node_id), message);
                    }
                    NodeEvent::Progress { percent, message } => {
                        if verbose {
                            match message {
                                Some(msg) => println!("     📊 [{}] {:.0}% - {}", label(&node_id), percent, msg),
                                None => println!("     📊 [{}] {:.0}%", label(&node_id), percent),
                            }
                        }
                    }
                },
                ExecutionEvent::RunFinished {
                    status, elapsed_ms, ..
                } => {
                    println!("✨ Run {} after {}ms", status, elapsed_ms);
                    break;
                }
            }
        }
    });

    let (handle, mut task) = runtime.spawn(graph.clone());
    if let Some(secs) = timeout_secs {
        if tokio::time::timeout(Duration::from_secs(secs), &mut task).await.is_err() {
            tracing::warn!(timeout_secs = secs, "deadline reached, cancelling run");
            handle.cancel();
        }
    }

    let outcome = task.await.context("run task failed")?;
    let report = match outcome {
        Ok(report) => {
            let _ = printer.await;
            report
        }
        Err(e) => {
            printer.abort();
            println!("💥 Run rejected: {}", e);
            return Ok(false);
        }
    };

    print_summary(&report, &labels);
    if verbose {
        print_outputs(&graph, &labels).await;
    }
    Ok(report.is_success())
}

fn print_summary(report: &RunReport, labels: &HashMap<NodeId, String>) {
    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", report.run_id);
    println!("   Status: {}", report.status);
    println!(
        "   Done: {}/{} nodes in {}ms",
        report.count(NodeStatus::Done),
        report.nodes.len(),
        report.elapsed_ms
    );
    for node in &report.nodes {
        let label = labels
            .get(&node.node_id)
            .cloned()
            .unwrap_or_else(|| node.kind.clone());
        match &node.error {
            Some(error) => println!("   {:<8} {} - {}", node.status.to_string(), label, error),
            None => println!("   {:<8} {} ({}ms)", node.status.to_string(), label, node.elapsed_ms),
        }
    }
}

async fn print_outputs(graph: &SharedGraph, labels: &HashMap<NodeId, String>) {
    let graph = graph.read().await;
    println!();
    println!("📤 Outputs:");
    for node in graph.nodes() {
        let outputs: Vec<_> = node
            .outputs()
            .iter()
            .filter(|p| !p.pin_type().is_flow())
            .collect();
        if outputs.is_empty() {
            continue;
        }
        println!("   {}:", labels.get(&node.id()).map(String::as_str).unwrap_or(node.kind()));
        for pin in outputs {
            println!("     {}: {}", pin.name(), describe(pin.value()));
        }
    }
}

fn analyze_project(file: &Path) -> Result<bool> {
    println!("🔍 Analyzing project: {}", file.display());

    let runtime = Runtime::new(pixelnodes::registry());
    let graph = load_project(&runtime, file)?;
    let labels = node_labels(&graph);
    let stats = graph.stats();

    println!(
        "   {} nodes, {} connections, {} pins",
        stats.nodes, stats.connections, stats.pins
    );
    println!();
    println!("Nodes:");
    for node in graph.nodes() {
        let Position { x, y } = node.position();
        println!(
            "  • {} [{}] at ({}, {}), {} in / {} out",
            labels[&node.id()],
            node.category(),
            x,
            y,
            node.inputs().len(),
            node.outputs().len()
        );
    }

    println!();
    println!("Connections:");
    for conn in graph.connections() {
        let end = |pin_id, node_id: NodeId| {
            let pin = graph
                .pin(pin_id)
                .map(|p| p.name().to_string())
                .unwrap_or_default();
            format!("{}.{}", labels[&node_id], pin)
        };
        println!(
            "  {} → {} ({:?})",
            end(conn.output_pin(), conn.output_node()),
            end(conn.input_pin(), conn.input_node()),
            conn.kind()
        );
    }

    let report = graph.validate();
    println!();
    for issue in &report.errors {
        println!("❌ {}", issue.message);
    }
    for issue in &report.warnings {
        println!("⚠️  {}", issue.message);
    }

    match graph.calculate_execution_order() {
        Ok(order) => {
            println!("Execution order:");
            for (i, id) in order.iter().enumerate() {
                println!("  {}. {}", i + 1, labels[id]);
            }
        }
        Err(e) => println!("💥 {}", e),
    }

    Ok(report.is_valid())
}

fn list_nodes() {
    println!("📦 Available Node Types:");

    let registry = pixelnodes::registry();
    let mut by_category: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for kind in registry.list_node_types() {
        let metadata = registry.get_metadata(&kind).unwrap_or_default();
        by_category
            .entry(metadata.category)
            .or_default()
            .push((kind, metadata.description));
    }

    for (category, kinds) in by_category {
        println!();
        println!("  {}", category);
        for (kind, description) in kinds {
            println!("    • {:<16} {}", kind, description);
        }
    }
}

fn create_example_project(output: &Path) -> Result<()> {
    let mut graph = Graph::new(pixelnodes::registry());

    let load = graph.add_node("LoadImage", Position::new(100.0, 100.0))?;
    let bright = graph.add_node("Brightness", Position::new(300.0, 100.0))?;
    let save = graph.add_node("SaveImage", Position::new(500.0, 100.0))?;

    let pin = |graph: &Graph, node: NodeId, direction: PinDirection, name: &str| {
        graph
            .node(node)
            .and_then(|n| n.pin_by_name(direction, name))
            .map(|p| p.id())
            .with_context(|| format!("pin '{}' missing", name))
    };

    for (from, to) in [(load, bright), (bright, save)] {
        for name in ["exec", "image"] {
            let o = pin(&graph, from, PinDirection::Output, name)?;
            let i = pin(&graph, to, PinDirection::Input, name)?;
            graph.connect(o, i)?;
        }
    }

    let input_path = pin(&graph, load, PinDirection::Input, "path")?;
    graph.set_pin_default(input_path, Value::Path("input.png".to_string()))?;
    let factor = pin(&graph, bright, PinDirection::Input, "brightness")?;
    graph.set_pin_default(factor, 1.2)?;
    let output_path = pin(&graph, save, PinDirection::Input, "path")?;
    graph.set_pin_default(output_path, Value::Path("output.png".to_string()))?;

    std::fs::write(output, graph.to_json()?)?;

    println!("✨ Created example project: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  pixelflow run --file {}", output.display());

    Ok(())
}
