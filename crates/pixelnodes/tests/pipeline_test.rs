use image::{Rgba, RgbaImage};
use pixelcore::{
    ConnectRejection, Graph, GraphError, NodeError, NodeId, NodeStatus, PinId, Position,
    RunStatus, Value,
};
use pixelruntime::Runtime;
use std::path::Path;

fn runtime() -> Runtime {
    Runtime::new(pixelnodes::registry())
}

fn add(graph: &mut Graph, kind: &str) -> NodeId {
    graph.add_node(kind, Position::default()).unwrap()
}

fn out_pin(graph: &Graph, node: NodeId, name: &str) -> PinId {
    graph.node(node).unwrap().output(name).unwrap().id()
}

fn in_pin(graph: &Graph, node: NodeId, name: &str) -> PinId {
    graph.node(node).unwrap().input(name).unwrap().id()
}

fn link(graph: &mut Graph, from: NodeId, out: &str, to: NodeId, inp: &str) {
    let o = out_pin(graph, from, out);
    let i = in_pin(graph, to, inp);
    graph.connect(o, i).unwrap();
}

fn write_gray_png(path: &Path, level: u8) {
    RgbaImage::from_pixel(4, 2, Rgba([level, level, level, 255]))
        .save(path)
        .unwrap();
}

#[tokio::test]
async fn test_load_brighten_save_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("nested").join("out.png");
    write_gray_png(&input, 100);

    let rt = runtime();
    let mut graph = rt.new_graph();
    let save = add(&mut graph, "SaveImage");
    let bright = add(&mut graph, "Brightness");
    let load = add(&mut graph, "LoadImage");

    link(&mut graph, load, "exec", bright, "exec");
    link(&mut graph, bright, "exec", save, "exec");
    link(&mut graph, load, "image", bright, "image");
    link(&mut graph, bright, "image", save, "image");

    let path_pin = in_pin(&graph, load, "path");
    graph
        .set_pin_default(path_pin, Value::Path(input.to_string_lossy().into_owned()))
        .unwrap();
    let target_pin = in_pin(&graph, save, "path");
    graph
        .set_pin_default(target_pin, Value::Path(output.to_string_lossy().into_owned()))
        .unwrap();
    let factor_pin = in_pin(&graph, bright, "brightness");
    graph.set_pin_default(factor_pin, 1.5).unwrap();

    assert_eq!(graph.calculate_execution_order().unwrap(), vec![load, bright, save]);

    let graph = graph.into_shared();
    let report = rt.execute(&graph).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.order(), vec![load, bright, save]);
    assert_eq!(report.count(NodeStatus::Done), 3);

    let g = graph.read().await;
    assert_eq!(*g.node(save).unwrap().output("success").unwrap().value(), Value::Bool(true));
    assert_eq!(*g.node(load).unwrap().output("width").unwrap().value(), Value::Int(4));
    assert_eq!(
        *g.node(load).unwrap().output("filename").unwrap().value(),
        Value::String("in.png".to_string())
    );

    let written = image::open(&output).unwrap().to_rgba8();
    assert_eq!(written.dimensions(), (4, 2));
    assert_eq!(written.get_pixel(0, 0).0, [150, 150, 150, 255]);
}

#[tokio::test]
async fn test_string_output_feeds_path_input() {
    let rt = runtime();
    let mut graph = rt.new_graph();
    let text = add(&mut graph, "StringVariable");
    let load = add(&mut graph, "LoadImage");

    let o = out_pin(&graph, text, "value");
    let i = in_pin(&graph, load, "path");
    let id = graph.connect(o, i).unwrap();

    assert!(graph.pin(o).unwrap().has_connection(id));
    assert!(graph.pin(i).unwrap().has_connection(id));
}

#[tokio::test]
async fn test_bool_output_rejected_on_float_input() {
    let rt = runtime();
    let mut graph = rt.new_graph();
    let flag = add(&mut graph, "BooleanVariable");
    let bright = add(&mut graph, "Brightness");

    let o = out_pin(&graph, flag, "value");
    let i = in_pin(&graph, bright, "brightness");
    match graph.connect(o, i) {
        Err(GraphError::IncompatibleConnection { reason, output, input }) => {
            assert_eq!(reason, ConnectRejection::TypeMismatch);
            assert_eq!(output.pin_id, o);
            assert_eq!(input.pin_id, i);
        }
        other => panic!("expected IncompatibleConnection, got {:?}", other),
    }
    assert_eq!(graph.connection_count(), 0);
}

#[tokio::test]
async fn test_variable_drives_load_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gray.png");
    write_gray_png(&input, 10);

    let rt = runtime();
    let mut graph = rt.new_graph();
    let var = add(&mut graph, "PathVariable");
    let load = add(&mut graph, "LoadImage");
    let info = add(&mut graph, "ImageInfo");
    link(&mut graph, var, "path", load, "path");
    link(&mut graph, load, "image", info, "image");
    let var_out = out_pin(&graph, var, "path");
    graph
        .set_pin_default(var_out, Value::Path(input.to_string_lossy().into_owned()))
        .unwrap();

    let graph = graph.into_shared();
    let report = rt.execute(&graph).await.unwrap();
    assert!(report.is_success());

    let g = graph.read().await;
    let info = g.node(info).unwrap();
    assert_eq!(*info.output("width").unwrap().value(), Value::Int(4));
    assert_eq!(*info.output("channels").unwrap().value(), Value::Int(4));
    assert_eq!(*info.output("aspect_ratio").unwrap().value(), Value::Float(2.0));
}

#[tokio::test]
async fn test_empty_path_is_not_a_failure() {
    let rt = runtime();
    let mut graph = rt.new_graph();
    let load = add(&mut graph, "LoadImage");
    let save = add(&mut graph, "SaveImage");
    link(&mut graph, load, "image", save, "image");

    let graph = graph.into_shared();
    let report = rt.execute(&graph).await.unwrap();

    assert!(report.is_success());
    let g = graph.read().await;
    assert!(g.node(load).unwrap().output("image").unwrap().value().is_null());
    assert_eq!(*g.node(save).unwrap().output("success").unwrap().value(), Value::Bool(false));
}

#[tokio::test]
async fn test_missing_file_fails_node() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime();
    let mut graph = rt.new_graph();
    let load = add(&mut graph, "LoadImage");
    let blur = add(&mut graph, "Blur");
    link(&mut graph, load, "image", blur, "image");
    let path_pin = in_pin(&graph, load, "path");
    let missing = dir.path().join("missing.png");
    graph
        .set_pin_default(path_pin, Value::Path(missing.to_string_lossy().into_owned()))
        .unwrap();

    let graph = graph.into_shared();
    let report = rt.execute(&graph).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(matches!(report.node(load).unwrap().error, Some(NodeError::Io(_))));
    assert_eq!(report.node(blur).unwrap().status, NodeStatus::NotRun);
}

#[tokio::test]
async fn test_generators_and_blend() {
    let rt = runtime();
    let mut graph = rt.new_graph();
    let black = add(&mut graph, "SolidColor");
    let white = add(&mut graph, "SolidColor");
    let blend = add(&mut graph, "Blend");
    for (node, level) in [(black, 0i64), (white, 200i64)] {
        for name in ["red", "green", "blue"] {
            let pin = in_pin(&graph, node, name);
            graph.set_pin_default(pin, level).unwrap();
        }
        for name in ["width", "height"] {
            let pin = in_pin(&graph, node, name);
            graph.set_pin_default(pin, 2i64).unwrap();
        }
    }
    link(&mut graph, black, "image", blend, "a");
    link(&mut graph, white, "image", blend, "b");

    let graph = graph.into_shared();
    let report = rt.execute(&graph).await.unwrap();
    assert!(report.is_success());

    let g = graph.read().await;
    match g.node(blend).unwrap().output("image").unwrap().value() {
        Value::Image(data) => {
            assert_eq!((data.width, data.height), (2, 2));
            assert_eq!(&data.pixels[..4], &[100, 100, 100, 255]);
        }
        other => panic!("expected image, got {:?}", other),
    }
}

#[tokio::test]
async fn test_noise_is_reproducible() {
    let rt = runtime();
    let mut graph = rt.new_graph();
    let a = add(&mut graph, "Noise");
    let b = add(&mut graph, "Noise");
    for node in [a, b] {
        let w = in_pin(&graph, node, "width");
        graph.set_pin_default(w, 8i64).unwrap();
        let h = in_pin(&graph, node, "height");
        graph.set_pin_default(h, 8i64).unwrap();
    }

    let graph = graph.into_shared();
    rt.execute(&graph).await.unwrap();

    let g = graph.read().await;
    let first = g.node(a).unwrap().output("image").unwrap().value().clone();
    let second = g.node(b).unwrap().output("image").unwrap().value().clone();
    assert!(matches!(first, Value::Image(_)));
    assert_eq!(first, second);
}

#[test]
fn test_builtin_registry_contents() {
    let registry = pixelnodes::registry();
    assert_eq!(registry.len(), 18);
    for kind in ["LoadImage", "SaveImage", "Brightness", "Blend", "PathVariable"] {
        assert!(registry.contains(kind), "missing {}", kind);
    }
    assert_eq!(registry.get_metadata("Blur").unwrap().category, "Filter");
    assert!(matches!(
        Graph::new(registry).add_node("Teleport", Position::default()),
        Err(GraphError::UnknownNodeKind(_))
    ));
}

#[test]
fn test_variable_output_fans_out() {
    let mut graph = Graph::new(pixelnodes::registry());
    let var = add(&mut graph, "FloatVariable");
    let a = add(&mut graph, "Brightness");
    let b = add(&mut graph, "Brightness");
    link(&mut graph, var, "value", a, "brightness");
    link(&mut graph, var, "value", b, "contrast");

    assert_eq!(graph.connection_count(), 2);
    assert_eq!(graph.node(var).unwrap().output("value").unwrap().connection_count(), 2);
}
