use srt::graph::{Literal, TensorLiteral, ValueType};
use srt::{
    Error, Graph, GraphBuilder, OperatorRegistry, RunStats, RuntimeOptions, StaticModule, Tensor,
};

fn sample_graph() -> anyhow::Result<Graph> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let bias = b.constant(Literal::Tensor(TensorLiteral {
        dtype: srt::DType::F32,
        sizes: vec![2],
        data: vec![0.5, -0.5],
    }));
    let shape = b.constant(vec![2i64, -1]);
    let y = b.op("ops::add", &[x, bias]);
    let z = b.op("ops::reshape", &[y, shape]);
    b.output(z);
    Ok(b.build()?)
}

#[test]
fn graph_survives_a_json_round_trip() -> anyhow::Result<()> {
    let graph = sample_graph()?;
    let text = graph.to_json()?;
    let restored = Graph::from_json(&text)?;
    assert_eq!(graph, restored);
    assert_eq!(restored.nodes().len(), 2);
    assert_eq!(restored.value_type(restored.inputs()[0]), &ValueType::Tensor);

    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(restored, &registry, RuntimeOptions::default(), None)?;
    let out = module.run(vec![Tensor::from_slice(&[2, 2], &[1.0f32, 1.0, 2.0, 2.0])?.into()])?;
    let out = out[0].to_tensor()?;
    assert_eq!(out.sizes(), &[2, 2]);
    assert_eq!(out.to_vec::<f32>()?, vec![1.5, 0.5, 2.5, 1.5]);
    Ok(())
}

#[test]
fn use_before_definition_is_a_malformed_graph() {
    let text = r#"{
        "values": [{"ty": {"kind": "tensor"}}, {"ty": {"kind": "tensor"}}],
        "inputs": [],
        "nodes": [{"op": "ops::relu", "inputs": [0], "outputs": [1]}],
        "outputs": [1]
    }"#;
    let err = Graph::from_json(text).unwrap_err();
    assert!(matches!(err, Error::Graph(_)), "{err}");
}

#[test]
fn double_definition_is_a_malformed_graph() {
    let text = r#"{
        "values": [{"name": "x", "ty": {"kind": "tensor"}}],
        "inputs": [0],
        "nodes": [{"op": "ops::relu", "inputs": [0], "outputs": [0]}],
        "outputs": [0]
    }"#;
    let err = Graph::from_json(text).unwrap_err();
    assert!(err.to_string().contains("defined twice"), "{err}");
}

#[test]
fn runtime_options_default_missing_fields() -> anyhow::Result<()> {
    let options = RuntimeOptions::from_json(r#"{"vectorize": false, "vector_width": 8}"#)?;
    assert_eq!(
        options,
        RuntimeOptions {
            enable_out_variant: true,
            vectorize: false,
            profile_nodes: false,
            vector_width: Some(8),
        }
    );
    assert_eq!(RuntimeOptions::from_json("{}")?, RuntimeOptions::default());

    let text = serde_json::to_string(&options)?;
    assert_eq!(RuntimeOptions::from_json(&text)?, options);
    Ok(())
}

#[test]
fn zero_vector_width_is_rejected() {
    let err = RuntimeOptions::from_json(r#"{"vector_width": 0}"#).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");

    let err = RuntimeOptions::from_json(r#"{"vectorize": "yes"}"#).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
}

#[test]
fn node_profiling_records_every_call() -> anyhow::Result<()> {
    let registry = OperatorRegistry::with_builtins()?;
    let options = RuntimeOptions {
        profile_nodes: true,
        ..RuntimeOptions::default()
    };
    let mut module = StaticModule::new(sample_graph()?, &registry, options, None)?;
    for _ in 0..3 {
        module.run(vec![Tensor::zeros(&[2, 2], srt::DType::F32).into()])?;
    }
    let timings = module.timings().expect("profiling enabled");
    let ops: Vec<(&str, u64)> = timings.iter().map(|(_, t)| (t.op.as_str(), t.calls)).collect();
    assert_eq!(ops, vec![("ops::add", 3), ("ops::reshape", 3)]);
    assert!(timings.to_string().contains("ops::reshape"));
    Ok(())
}

#[test]
fn stats_merge_and_reset() -> anyhow::Result<()> {
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(sample_graph()?, &registry, RuntimeOptions::default(), None)?;
    module.run(vec![Tensor::zeros(&[2, 2], srt::DType::F32).into()])?;
    module.run(vec![Tensor::zeros(&[2, 2], srt::DType::F32).into()])?;

    let mut total = RunStats::default();
    total.merge(module.stats());
    total.merge(module.stats());
    assert_eq!(total.runs, 4);
    assert_eq!(total.output_allocations, 2);
    assert_eq!(total.output_reuses, 2);

    let json = serde_json::to_value(module.stats())?;
    assert_eq!(json["runs"], 2);

    module.reset_stats();
    assert_eq!(module.stats(), &RunStats::default());
    assert!(module.timings().is_none());
    Ok(())
}
