use srt::graph::{Literal, ValueType};
use srt::{
    DispatchPath, Graph, GraphBuilder, OperatorRegistry, RuntimeOptions, StaticModule, Tensor,
    Value,
};

/// Graph with one tensor input `x` feeding `op(x, args...)`.
fn unary_graph(op: &str, args: Vec<Literal>) -> anyhow::Result<Graph> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let mut inputs = vec![x];
    inputs.extend(args.into_iter().map(|arg| b.constant(arg)));
    let y = b.op(op, &inputs);
    b.output(y);
    Ok(b.build()?)
}

fn run_once(graph: Graph, input: Tensor) -> anyhow::Result<Tensor> {
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(graph, &registry, RuntimeOptions::default(), None)?;
    assert_eq!(module.node(0).map(|n| n.path()), Some(DispatchPath::Native));
    let mut outputs = module.run(vec![input.into()])?;
    Ok(outputs.remove(0).to_tensor()?.clone())
}

fn arange(sizes: &[usize]) -> anyhow::Result<Tensor> {
    let n: usize = sizes.iter().product();
    Ok(Tensor::from_vec(sizes, (0..n).map(|v| v as f32).collect())?)
}

#[test]
fn transpose_wraps_negative_dims() -> anyhow::Result<()> {
    let graph = unary_graph("ops::transpose", vec![Literal::Int(-1), Literal::Int(0)])?;
    let out = run_once(graph, arange(&[2, 3])?)?;
    assert_eq!(out.sizes(), &[3, 2]);
    assert_eq!(out.to_vec::<f32>()?, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    Ok(())
}

#[test]
fn transpose_of_zero_dim_and_empty_inputs() -> anyhow::Result<()> {
    let graph = unary_graph("ops::transpose", vec![Literal::Int(0), Literal::Int(-1)])?;
    let out = run_once(graph, Tensor::scalar(7.0f32))?;
    assert_eq!(out.dim(), 0);
    assert_eq!(out.item::<f32>()?, 7.0);

    let graph = unary_graph("ops::transpose", vec![Literal::Int(0), Literal::Int(1)])?;
    let out = run_once(graph, Tensor::zeros(&[0, 4], srt::DType::F32))?;
    assert_eq!(out.sizes(), &[4, 0]);
    assert!(out.to_vec::<f32>()?.is_empty());
    Ok(())
}

#[test]
fn transpose_is_a_view_of_its_input() -> anyhow::Result<()> {
    let input = arange(&[2, 2])?;
    let graph = unary_graph("ops::transpose", vec![Literal::Int(0), Literal::Int(1)])?;
    let out = run_once(graph, input.clone())?;
    assert!(out.shares_storage(&input));
    assert!(!out.is_contiguous());
    Ok(())
}

#[test]
fn slice_with_negative_bounds_and_step() -> anyhow::Result<()> {
    let graph = unary_graph(
        "ops::slice",
        vec![
            Literal::Int(-1),
            Literal::Int(-4),
            Literal::None,
            Literal::Int(2),
        ],
    )?;
    let out = run_once(graph, arange(&[2, 5])?)?;
    assert_eq!(out.sizes(), &[2, 2]);
    assert_eq!(out.to_vec::<f32>()?, vec![1.0, 3.0, 6.0, 8.0]);
    Ok(())
}

#[test]
fn slice_defaults_cover_whole_dim_and_handle_empty_input() -> anyhow::Result<()> {
    let out = run_once(unary_graph("ops::slice", vec![])?, arange(&[3, 2])?)?;
    assert_eq!(out.sizes(), &[3, 2]);
    assert_eq!(out.to_vec::<f32>()?, arange(&[3, 2])?.to_vec::<f32>()?);

    let graph = unary_graph("ops::slice", vec![Literal::Int(0), Literal::Int(1)])?;
    let out = run_once(graph, Tensor::zeros(&[0], srt::DType::F32))?;
    assert_eq!(out.sizes(), &[0]);
    Ok(())
}

#[test]
fn slice_rejects_zero_dim_input() -> anyhow::Result<()> {
    let graph = unary_graph("ops::slice", vec![])?;
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(graph, &registry, RuntimeOptions::default(), None)?;
    let err = module.run(vec![Tensor::scalar(1.0f32).into()]).unwrap_err();
    assert!(matches!(err.root(), srt::Error::Shape(_)), "{err}");
    Ok(())
}

#[test]
fn flatten_zero_dim_becomes_one_element() -> anyhow::Result<()> {
    let out = run_once(unary_graph("ops::flatten", vec![])?, Tensor::scalar(3i64))?;
    assert_eq!(out.sizes(), &[1]);
    assert_eq!(out.to_vec::<i64>()?, vec![3]);
    Ok(())
}

#[test]
fn flatten_negative_range_and_empty_input() -> anyhow::Result<()> {
    let graph = unary_graph("ops::flatten", vec![Literal::Int(-2), Literal::Int(-1)])?;
    let out = run_once(graph, arange(&[2, 3, 4])?)?;
    assert_eq!(out.sizes(), &[2, 12]);
    assert_eq!(out.to_vec::<f32>()?, arange(&[24])?.to_vec::<f32>()?);

    let graph = unary_graph("ops::flatten", vec![])?;
    let out = run_once(graph, Tensor::zeros(&[3, 0, 2], srt::DType::F32))?;
    assert_eq!(out.sizes(), &[0]);
    Ok(())
}

#[test]
fn permute_and_reshape_accept_negative_entries() -> anyhow::Result<()> {
    let graph = unary_graph("ops::permute", vec![Literal::IntList(vec![-1, 0, 1])])?;
    let out = run_once(graph, arange(&[2, 1, 3])?)?;
    assert_eq!(out.sizes(), &[3, 2, 1]);
    assert_eq!(out.to_vec::<f32>()?, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

    let graph = unary_graph("ops::reshape", vec![Literal::IntList(vec![-1, 2])])?;
    let out = run_once(graph, arange(&[3, 2])?.transpose(0, 1)?)?;
    assert_eq!(out.sizes(), &[3, 2]);
    assert_eq!(out.to_vec::<f32>()?, vec![0.0, 2.0, 4.0, 1.0, 3.0, 5.0]);
    Ok(())
}

#[test]
fn narrow_wraps_negative_start() -> anyhow::Result<()> {
    let graph = unary_graph(
        "ops::narrow",
        vec![Literal::Int(0), Literal::Int(-2), Literal::Int(2)],
    )?;
    let out = run_once(graph, arange(&[4])?)?;
    assert_eq!(out.to_vec::<f32>()?, vec![2.0, 3.0]);
    Ok(())
}

#[test]
fn slice_with_huge_step_keeps_first_element() -> anyhow::Result<()> {
    let graph = unary_graph(
        "ops::slice",
        vec![
            Literal::Int(0),
            Literal::Int(1),
            Literal::None,
            Literal::Int(i64::MAX),
        ],
    )?;
    let out = run_once(graph, arange(&[4])?)?;
    assert_eq!(out.to_vec::<f32>()?, vec![1.0]);
    Ok(())
}

#[test]
fn narrow_past_the_end_fails_with_shape_error() -> anyhow::Result<()> {
    let graph = unary_graph(
        "ops::narrow",
        vec![Literal::Int(0), Literal::Int(1), Literal::Int(i64::MAX)],
    )?;
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(graph, &registry, RuntimeOptions::default(), None)?;
    let err = module.run(vec![arange(&[4])?.into()]).unwrap_err();
    assert!(matches!(err.root(), srt::Error::Shape(_)), "{err}");
    Ok(())
}

#[test]
fn five_argument_to_converts_dtype() -> anyhow::Result<()> {
    let graph = unary_graph(
        "ops::to",
        vec![
            Literal::DType(srt::DType::I64),
            Literal::Bool(false),
            Literal::Bool(false),
            Literal::None,
        ],
    )?;
    let out = run_once(graph, Tensor::from_slice(&[3], &[1.5f32, -2.5, 3.0])?)?;
    assert_eq!(out.dtype(), srt::DType::I64);
    assert_eq!(out.to_vec::<i64>()?, vec![1, -2, 3]);
    Ok(())
}

#[test]
fn five_argument_to_adopts_dtype_of_other_tensor() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let other = b.tensor_input("other");
    let non_blocking = b.constant(false);
    let copy = b.constant(false);
    let memory_format = b.none();
    let y = b.op("ops::to", &[x, other, non_blocking, copy, memory_format]);
    b.output(y);

    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)?;
    assert_eq!(module.node(0).map(|n| n.path()), Some(DispatchPath::Native));
    let outputs = module.run(vec![
        Tensor::from_slice(&[3], &[1.5f32, -2.5, 3.0])?.into(),
        Tensor::from_slice(&[1], &[0i64])?.into(),
    ])?;
    let out = outputs[0].to_tensor()?;
    assert_eq!(out.dtype(), srt::DType::I64);
    assert_eq!(out.to_vec::<i64>()?, vec![1, -2, 3]);
    Ok(())
}

#[test]
fn containers_unpack_and_index() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let n = b.input("n", ValueType::Int);
    let list = b.node("prim::list_construct", &[x, n], &[ValueType::Any])[0];
    let unpacked = b.node("prim::list_unpack", &[list], &[ValueType::Tensor, ValueType::Int]);
    let last = b.constant(-1i64);
    let picked = b.node("ops::getitem", &[list, last], &[ValueType::Any])[0];
    b.output(unpacked[1]).output(picked);

    let registry = OperatorRegistry::new();
    let mut module = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)?;
    assert_eq!(module.path_counts(), (0, 3));
    let outputs = module.run(vec![Tensor::scalar(1.0f32).into(), Value::Int(9)])?;
    assert_eq!(outputs[0].to_int()?, 9);
    assert_eq!(outputs[1].to_int()?, 9);
    Ok(())
}

#[test]
fn dict_lookup_by_key() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let v = b.input("v", ValueType::Int);
    let key_a = b.constant("a");
    let key_b = b.constant("b");
    let seven = b.constant(7i64);
    let dict = b.node(
        "prim::dict_construct",
        &[key_a, v, key_b, seven],
        &[ValueType::Any],
    )[0];
    let got = b.node("ops::getitem", &[dict, key_b], &[ValueType::Int])[0];
    b.output(got);

    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)?;
    let outputs = module.run(vec![Value::Int(1)])?;
    assert_eq!(outputs[0].to_int()?, 7);
    Ok(())
}
