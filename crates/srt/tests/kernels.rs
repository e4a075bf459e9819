use srt::graph::{Literal, ValueId, ValueType};
use srt::{
    DType, DispatchPath, Error, GraphBuilder, OperatorRegistry, RuntimeOptions, StaticModule,
    Tensor, Value,
};

fn module(b: GraphBuilder) -> anyhow::Result<StaticModule> {
    let registry = OperatorRegistry::with_builtins()?;
    Ok(StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)?)
}

fn tensor_out(outputs: &[Value], i: usize) -> anyhow::Result<Tensor> {
    Ok(outputs[i].to_tensor()?.clone())
}

fn close(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= 1e-5)
}

/// `op(x, y, constants...)` over two tensor inputs.
fn binary(op: &str, constants: Vec<Literal>) -> anyhow::Result<StaticModule> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let y = b.tensor_input("y");
    let mut inputs: Vec<ValueId> = vec![x, y];
    inputs.extend(constants.into_iter().map(|c| b.constant(c)));
    let out = b.op(op, &inputs);
    b.output(out);
    module(b)
}

#[test]
fn div_rounding_modes() -> anyhow::Result<()> {
    let x = Tensor::from_slice(&[4], &[7.0f32, -7.0, 7.5, -0.5])?;
    let y = Tensor::from_slice(&[4], &[2.0f32, 2.0, 2.0, 2.0])?;

    let mut true_div = binary("ops::div", vec![])?;
    let out = tensor_out(&true_div.run(vec![x.clone().into(), y.clone().into()])?, 0)?;
    assert_eq!(out.to_vec::<f32>()?, vec![3.5, -3.5, 3.75, -0.25]);

    let mut trunc = binary("ops::div", vec![Literal::from("trunc")])?;
    let out = tensor_out(&trunc.run(vec![x.clone().into(), y.clone().into()])?, 0)?;
    assert_eq!(out.to_vec::<f32>()?, vec![3.0, -3.0, 3.0, 0.0]);

    let mut floor = binary("ops::div", vec![Literal::from("floor")])?;
    let out = tensor_out(&floor.run(vec![x.into(), y.into()])?, 0)?;
    assert_eq!(out.to_vec::<f32>()?, vec![3.0, -4.0, 3.0, -1.0]);
    Ok(())
}

#[test]
fn integer_floor_division_by_zero_fails() -> anyhow::Result<()> {
    let mut floor = binary("ops::div", vec![Literal::from("floor")])?;
    let x = Tensor::from_slice(&[2], &[-7i64, 3])?;
    let y = Tensor::from_slice(&[2], &[2i64, 0])?;
    let err = floor.run(vec![x.into(), y.into()]).unwrap_err();
    assert!(matches!(err, Error::Node { index: 0, .. }), "{err}");

    let x = Tensor::from_slice(&[2], &[-7i64, 7])?;
    let y = Tensor::from_slice(&[2], &[2i64, -2])?;
    let out = tensor_out(&floor.run(vec![x.into(), y.into()])?, 0)?;
    assert_eq!(out.dtype(), DType::I64);
    assert_eq!(out.to_vec::<i64>()?, vec![-4, -4]);
    Ok(())
}

#[test]
fn integer_division_of_min_by_minus_one_wraps() -> anyhow::Result<()> {
    let x = Tensor::from_slice(&[2], &[i64::MIN, i64::MIN])?;
    let y = Tensor::from_slice(&[2], &[-1i64, 3])?;
    for mode in ["floor", "trunc"] {
        let mut m = binary("ops::div", vec![Literal::from(mode)])?;
        let out = tensor_out(&m.run(vec![x.clone().into(), y.clone().into()])?, 0)?;
        let expected = if mode == "floor" {
            i64::MIN.div_euclid(3)
        } else {
            i64::MIN / 3
        };
        assert_eq!(out.to_vec::<i64>()?, vec![i64::MIN, expected], "{mode}");
    }
    Ok(())
}

#[test]
fn pow_by_scalar_exponent() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let two = b.constant(2.0);
    let out = b.op("ops::pow", &[x, two]);
    b.output(out);
    let mut m = module(b)?;
    let out = tensor_out(&m.run(vec![Tensor::from_slice(&[3], &[1.0f32, -2.0, 3.0])?.into()])?, 0)?;
    assert_eq!(out.to_vec::<f32>()?, vec![1.0, 4.0, 9.0]);
    Ok(())
}

#[test]
fn bmm_and_addmm() -> anyhow::Result<()> {
    let mut bmm = binary("ops::bmm", vec![])?;
    // two batches of [1x2] @ [2x1]
    let a = Tensor::from_slice(&[2, 1, 2], &[1.0f32, 2.0, 3.0, 4.0])?;
    let b = Tensor::from_slice(&[2, 2, 1], &[5.0f32, 6.0, 7.0, 8.0])?;
    let out = tensor_out(&bmm.run(vec![a.into(), b.into()])?, 0)?;
    assert_eq!(out.sizes(), &[2, 1, 1]);
    assert!(close(&out.to_vec::<f32>()?, &[17.0, 53.0]));

    let mut b = GraphBuilder::new();
    let bias = b.tensor_input("bias");
    let m1 = b.tensor_input("m1");
    let m2 = b.tensor_input("m2");
    let beta = b.constant(2i64);
    let alpha = b.constant(0.5);
    let out = b.op("ops::addmm", &[bias, m1, m2, beta, alpha]);
    b.output(out);
    let mut addmm = module(b)?;
    let identity = Tensor::from_slice(&[2, 2], &[1.0f32, 0.0, 0.0, 1.0])?;
    let m2 = Tensor::from_slice(&[2, 2], &[2.0f32, 4.0, 6.0, 8.0])?;
    let bias = Tensor::from_slice(&[2], &[1.0f32, -1.0])?;
    let out = tensor_out(&addmm.run(vec![bias.into(), identity.into(), m2.into()])?, 0)?;
    assert_eq!(out.sizes(), &[2, 2]);
    assert!(close(&out.to_vec::<f32>()?, &[3.0, 0.0, 5.0, 2.0]));
    Ok(())
}

#[test]
fn layer_norm_over_last_dim() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let shape = b.constant(vec![2i64]);
    let weight = b.tensor_input("w");
    let bias = b.tensor_input("b");
    let eps = b.constant(0.0);
    let out = b.op("ops::layer_norm", &[x, shape, weight, bias, eps]);
    b.output(out);
    let mut m = module(b)?;

    let x = Tensor::from_slice(&[2, 2], &[1.0f32, 3.0, -2.0, 2.0])?;
    let w = Tensor::from_slice(&[2], &[2.0f32, 1.0])?;
    let bias = Tensor::from_slice(&[2], &[0.0f32, 10.0])?;
    let out = tensor_out(&m.run(vec![x.into(), w.into(), bias.into()])?, 0)?;
    assert!(close(&out.to_vec::<f32>()?, &[-2.0, 11.0, -2.0, 11.0]));
    Ok(())
}

#[test]
fn layer_norm_reuses_output_across_runs_with_mixed_param_dtypes() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let shape = b.constant(vec![2i64]);
    let weight = b.tensor_input("w");
    let bias = b.none();
    let eps = b.constant(0.0);
    let out = b.op("ops::layer_norm", &[x, shape, weight, bias, eps]);
    b.output(out);
    let mut m = module(b)?;

    let w = Tensor::from_slice(&[2], &[2.0f64, 1.0])?;
    for row in [[1.0f32, 3.0], [-2.0, 2.0]] {
        let x = Tensor::from_slice(&[1, 2], &row)?;
        let out = tensor_out(&m.run(vec![x.into(), w.clone().into()])?, 0)?;
        assert_eq!(out.dtype(), DType::F32);
        assert!(close(&out.to_vec::<f32>()?, &[-2.0, 1.0]));
    }
    assert_eq!(m.stats().output_allocations, 1);
    assert_eq!(m.stats().output_reuses, 1);
    Ok(())
}

#[test]
fn layer_norm_rejects_mismatched_shape() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let shape = b.constant(vec![3i64]);
    let out = b.op("ops::layer_norm", &[x, shape]);
    b.output(out);
    let mut m = module(b)?;
    let err = m.run(vec![Tensor::zeros(&[2, 2], DType::F32).into()]).unwrap_err();
    assert!(matches!(err, Error::Node { index: 0, .. }), "{err}");
    Ok(())
}

#[test]
fn cat_and_stack_of_list_inputs() -> anyhow::Result<()> {
    for (op, expected_sizes, expected) in [
        ("ops::cat", vec![4usize], vec![1.0f32, 2.0, 3.0, 4.0]),
        ("ops::stack", vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]),
    ] {
        let mut b = GraphBuilder::new();
        let x = b.tensor_input("x");
        let y = b.tensor_input("y");
        let list = b.node("prim::list_construct", &[x, y], &[ValueType::tensor_list()])[0];
        let out = b.op(op, &[list]);
        b.output(out);
        let mut m = module(b)?;
        let out = tensor_out(
            &m.run(vec![
                Tensor::from_slice(&[2], &[1.0f32, 2.0])?.into(),
                Tensor::from_slice(&[2], &[3.0f32, 4.0])?.into(),
            ])?,
            0,
        )?;
        assert_eq!(out.sizes(), &expected_sizes[..], "{op}");
        assert_eq!(out.to_vec::<f32>()?, expected, "{op}");
        assert_eq!(m.node(1).map(|n| n.path()), Some(DispatchPath::Specialized));
    }
    Ok(())
}

#[test]
fn cat_along_last_dim_skips_empty_vectors() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let e = b.tensor_input("e");
    let y = b.tensor_input("y");
    let list = b.node("prim::list_construct", &[x, e, y], &[ValueType::tensor_list()])[0];
    let dim = b.constant(-1i64);
    let out = b.op("ops::cat", &[list, dim]);
    b.output(out);
    let mut m = module(b)?;
    let out = tensor_out(
        &m.run(vec![
            Tensor::from_slice(&[2, 1], &[1.0f32, 2.0])?.into(),
            Tensor::zeros(&[0], DType::F32).into(),
            Tensor::from_slice(&[2, 2], &[3.0f32, 4.0, 5.0, 6.0])?.into(),
        ])?,
        0,
    )?;
    assert_eq!(out.sizes(), &[2, 3]);
    assert_eq!(out.to_vec::<f32>()?, vec![1.0, 3.0, 4.0, 2.0, 5.0, 6.0]);
    Ok(())
}

#[test]
fn sum_selects_overload_by_arity() -> anyhow::Result<()> {
    let input = Tensor::from_slice(&[2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;

    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let out = b.op("ops::sum", &[x]);
    b.output(out);
    let mut all = module(b)?;
    let out = tensor_out(&all.run(vec![input.clone().into()])?, 0)?;
    assert_eq!(out.dim(), 0);
    assert_eq!(out.item::<f32>()?, 21.0);

    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let dims = b.constant(vec![-1i64]);
    let keepdim = b.constant(true);
    let out = b.op("ops::sum", &[x, dims, keepdim]);
    b.output(out);
    let mut rows = module(b)?;
    let out = tensor_out(&rows.run(vec![input.into()])?, 0)?;
    assert_eq!(out.sizes(), &[2, 1]);
    assert_eq!(out.to_vec::<f32>()?, vec![6.0, 15.0]);
    Ok(())
}

#[test]
fn argmin_treats_nan_as_minimal() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let dim = b.constant(1i64);
    let out = b.op("ops::argmin", &[x, dim]);
    b.output(out);
    let mut m = module(b)?;
    let input = Tensor::from_slice(&[2, 3], &[3.0f32, 1.0, 2.0, 0.0, f32::NAN, -1.0])?;
    let out = tensor_out(&m.run(vec![input.into()])?, 0)?;
    assert_eq!(out.dtype(), DType::I64);
    assert_eq!(out.to_vec::<i64>()?, vec![1, 1]);
    Ok(())
}

#[test]
fn argmin_of_empty_input_fails() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let out = b.op("ops::argmin", &[x]);
    b.output(out);
    let mut m = module(b)?;
    assert!(m.run(vec![Tensor::zeros(&[0], DType::F32).into()]).is_err());
    Ok(())
}

#[test]
fn norm_with_dims_and_infinite_order() -> anyhow::Result<()> {
    let input = Tensor::from_slice(&[2, 2], &[3.0f32, -4.0, 0.0, 1.0])?;
    for (p, expected) in [(2.0, [5.0f32, 1.0]), (f64::INFINITY, [4.0, 1.0]), (0.0, [2.0, 1.0])] {
        let mut b = GraphBuilder::new();
        let x = b.tensor_input("x");
        let p = b.constant(p);
        let dims = b.constant(vec![1i64]);
        let keepdim = b.constant(false);
        let out = b.op("ops::norm", &[x, p, dims, keepdim]);
        b.output(out);
        let mut m = module(b)?;
        let out = tensor_out(&m.run(vec![input.clone().into()])?, 0)?;
        assert!(close(&out.to_vec::<f32>()?, &expected));
    }
    Ok(())
}

#[test]
fn norm_over_all_dims_into_requested_dtype() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let p = b.constant(2.0);
    let dtype = b.constant(DType::F64);
    let out = b.op("ops::norm", &[x, p, dtype]);
    b.output(out);
    let mut m = module(b)?;
    let input = Tensor::from_slice(&[2, 2], &[3.0f32, -4.0, 0.0, 0.0])?;
    let out = tensor_out(&m.run(vec![input.into()])?, 0)?;
    assert_eq!(out.dtype(), DType::F64);
    assert!(out.sizes().is_empty());
    assert!((out.to_vec::<f64>()?[0] - 5.0).abs() <= 1e-9);
    Ok(())
}

#[test]
fn norm_without_dim_fails_at_instantiation() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let p = b.constant(2.0);
    let out = b.op("ops::norm", &[x, p]);
    b.output(out);
    let registry = OperatorRegistry::with_builtins()?;
    let err = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)
        .unwrap_err();
    assert!(matches!(err, Error::Node { index: 0, .. }), "{err}");
    Ok(())
}

#[test]
fn clamp_leaky_relu_and_nan_to_num() -> anyhow::Result<()> {
    let input = Tensor::from_slice(&[4], &[-2.0f32, 0.5, 3.0, f32::NAN])?;

    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let lo = b.none();
    let hi = b.constant(1.0);
    let out = b.op("ops::clamp", &[x, lo, hi]);
    b.output(out);
    let clamped = tensor_out(&module(b)?.run(vec![input.clone().into()])?, 0)?.to_vec::<f32>()?;
    assert_eq!(&clamped[..3], &[-2.0, 0.5, 1.0]);
    assert!(clamped[3].is_nan());

    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let slope = b.constant(0.5);
    let out = b.op("ops::leaky_relu", &[x, slope]);
    b.output(out);
    let leaky = tensor_out(&module(b)?.run(vec![input.clone().into()])?, 0)?.to_vec::<f32>()?;
    assert_eq!(&leaky[..3], &[-1.0, 0.5, 3.0]);

    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let nan = b.constant(-9.0);
    let out = b.op("ops::nan_to_num", &[x, nan]);
    b.output(out);
    let cleaned = tensor_out(&module(b)?.run(vec![input.into()])?, 0)?.to_vec::<f32>()?;
    assert_eq!(cleaned, vec![-2.0, 0.5, 3.0, -9.0]);
    Ok(())
}

#[test]
fn copying_shape_ops() -> anyhow::Result<()> {
    let input = Tensor::from_slice(&[2, 3], &[0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0])?;

    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let (zero, one, minus_two, two) = (
        b.constant(0i64),
        b.constant(1i64),
        b.constant(-2i64),
        b.constant(2i64),
    );
    let flat_shape = b.constant(vec![-1i64]);
    let i64_dtype = b.constant(DType::I64);
    let (non_blocking, copy) = (b.constant(false), b.constant(false));
    let t = b.op("ops::transpose", &[x, zero, one]);
    let copied = b.op("ops::reshape_copy", &[t, flat_shape]);
    let narrowed = b.op("ops::narrow_copy", &[x, one, minus_two, two]);
    let flat = b.op("ops::flatten_copy", &[x]);
    let ints = b.op("ops::to_copy", &[x, i64_dtype, non_blocking, copy]);
    b.output(copied).output(narrowed).output(flat).output(ints);
    let mut m = module(b)?;
    let outputs = m.run(vec![input.clone().into()])?;

    let copied = tensor_out(&outputs, 0)?;
    assert!(copied.is_contiguous());
    assert!(!copied.shares_storage(&input));
    assert_eq!(copied.to_vec::<f32>()?, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

    let narrowed = tensor_out(&outputs, 1)?;
    assert_eq!(narrowed.sizes(), &[2, 2]);
    assert_eq!(narrowed.to_vec::<f32>()?, vec![1.0, 2.0, 4.0, 5.0]);

    let flat = tensor_out(&outputs, 2)?;
    assert_eq!(flat.sizes(), &[6]);
    assert!(!flat.shares_storage(&input));

    let ints = tensor_out(&outputs, 3)?;
    assert_eq!(ints.dtype(), DType::I64);
    assert_eq!(ints.to_vec::<i64>()?, vec![0, 1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn to_copy_takes_dtype_from_other_tensor() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let other = b.tensor_input("other");
    let (non_blocking, copy) = (b.constant(false), b.constant(true));
    let memory_format = b.none();
    let out = b.op("ops::to_copy", &[x, other, non_blocking, copy, memory_format]);
    b.output(out);
    let mut m = module(b)?;
    let input = Tensor::from_slice(&[2], &[2.0f32, -3.0])?;
    let outputs = m.run(vec![input.clone().into(), Tensor::zeros(&[4], DType::F64).into()])?;
    let out = tensor_out(&outputs, 0)?;
    assert_eq!(out.dtype(), DType::F64);
    assert!(!out.shares_storage(&input));
    assert_eq!(out.to_vec::<f64>()?, vec![2.0, -3.0]);
    Ok(())
}

#[test]
fn to_copy_rejects_three_arguments() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let dtype = b.constant(DType::F64);
    let non_blocking = b.constant(false);
    let out = b.op("ops::to_copy", &[x, dtype, non_blocking]);
    b.output(out);
    let registry = OperatorRegistry::with_builtins()?;
    let err = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)
        .unwrap_err();
    assert!(matches!(err.root(), Error::ArityMismatch { actual: 3, .. }), "{err}");
    Ok(())
}

#[test]
fn index_with_integer_and_mask_indices() -> anyhow::Result<()> {
    let src = Tensor::from_slice(&[3, 2], &[0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0])?;
    for (index, expected_sizes, expected) in [
        (
            Tensor::from_slice(&[2], &[-1i64, 0])?,
            vec![2usize, 2],
            vec![4.0f32, 5.0, 0.0, 1.0],
        ),
        (
            Tensor::from_slice(&[3], &[true, false, true])?,
            vec![2, 2],
            vec![0.0, 1.0, 4.0, 5.0],
        ),
    ] {
        let mut b = GraphBuilder::new();
        let x = b.tensor_input("x");
        let i = b.tensor_input("i");
        let list = b.node("prim::list_construct", &[i], &[ValueType::tensor_list()])[0];
        let out = b.op("ops::index", &[x, list]);
        b.output(out);
        let mut m = module(b)?;
        let out = tensor_out(&m.run(vec![src.clone().into(), index.into()])?, 0)?;
        assert_eq!(out.sizes(), &expected_sizes[..]);
        assert_eq!(out.to_vec::<f32>()?, expected);
    }
    Ok(())
}

fn embedding_bag_module(mode: i64) -> anyhow::Result<(StaticModule, Vec<ValueId>)> {
    let mut b = GraphBuilder::new();
    let weight = b.tensor_input("weight");
    let indices = b.tensor_input("indices");
    let offsets = b.tensor_input("offsets");
    let scale = b.constant(false);
    let mode = b.constant(mode);
    let outs = b.node(
        "ops::embedding_bag",
        &[weight, indices, offsets, scale, mode],
        &vec![ValueType::Tensor; 4],
    );
    for &o in &outs {
        b.output(o);
    }
    Ok((module(b)?, outs))
}

fn embedding_inputs() -> anyhow::Result<Vec<Value>> {
    // rows: [0, 1], [10, 11], [20, 21]
    let weight = Tensor::from_slice(&[3, 2], &[0.0f32, 1.0, 10.0, 11.0, 20.0, 21.0])?;
    let indices = Tensor::from_slice(&[5], &[0i64, 2, 1, 1, 2])?;
    let offsets = Tensor::from_slice(&[2], &[0i64, 2])?;
    Ok(vec![weight.into(), indices.into(), offsets.into()])
}

#[test]
fn embedding_bag_sum_fills_all_four_outputs() -> anyhow::Result<()> {
    let (mut m, _) = embedding_bag_module(0)?;
    let outputs = m.run(embedding_inputs()?)?;
    let output = tensor_out(&outputs, 0)?;
    assert_eq!(output.sizes(), &[2, 2]);
    assert_eq!(output.to_vec::<f32>()?, vec![20.0, 22.0, 40.0, 43.0]);
    assert_eq!(tensor_out(&outputs, 1)?.to_vec::<i64>()?, vec![0, 0, 1, 1, 1]);
    assert_eq!(tensor_out(&outputs, 2)?.to_vec::<i64>()?, vec![2, 3]);
    assert_eq!(tensor_out(&outputs, 3)?.sizes(), &[2]);
    Ok(())
}

#[test]
fn embedding_bag_mean_and_max() -> anyhow::Result<()> {
    let (mut mean, _) = embedding_bag_module(1)?;
    let outputs = mean.run(embedding_inputs()?)?;
    assert!(close(
        &tensor_out(&outputs, 0)?.to_vec::<f32>()?,
        &[10.0, 11.0, 40.0 / 3.0, 43.0 / 3.0]
    ));

    let (mut max, _) = embedding_bag_module(2)?;
    let outputs = max.run(embedding_inputs()?)?;
    assert_eq!(tensor_out(&outputs, 0)?.to_vec::<f32>()?, vec![20.0, 21.0, 20.0, 21.0]);
    let argmax = tensor_out(&outputs, 3)?;
    assert_eq!(argmax.sizes(), &[2, 2]);
    assert_eq!(argmax.to_vec::<i64>()?, vec![2, 2, 2, 2]);
    Ok(())
}

#[test]
fn embedding_bag_outputs_are_reused_across_runs() -> anyhow::Result<()> {
    let (mut m, outs) = embedding_bag_module(0)?;
    m.run(embedding_inputs()?)?;
    let first: Vec<_> = outs
        .iter()
        .map(|&id| -> anyhow::Result<_> {
            let slot = m.output_slot(id).ok_or_else(|| anyhow::anyhow!("missing slot"))?;
            Ok(slot.read()?.to_tensor()?.storage_id())
        })
        .collect::<anyhow::Result<_>>()?;
    m.run(embedding_inputs()?)?;
    let second: Vec<_> = outs
        .iter()
        .map(|&id| -> anyhow::Result<_> {
            let slot = m.output_slot(id).ok_or_else(|| anyhow::anyhow!("missing slot"))?;
            Ok(slot.read()?.to_tensor()?.storage_id())
        })
        .collect::<anyhow::Result<_>>()?;
    assert_eq!(first, second);
    assert_eq!(m.stats().output_allocations, 4);
    assert_eq!(m.stats().output_reuses, 4);
    Ok(())
}

#[test]
fn embedding_bag_rejects_out_of_range_index() -> anyhow::Result<()> {
    let (mut m, _) = embedding_bag_module(0)?;
    let mut inputs = embedding_inputs()?;
    inputs[1] = Tensor::from_slice(&[2], &[0i64, 3])?.into();
    let err = m.run(inputs).unwrap_err();
    assert!(matches!(err, Error::Node { index: 0, .. }), "{err}");
    Ok(())
}

#[test]
fn byte_rowwise_embedding_dequantizes_rows() -> anyhow::Result<()> {
    let row = |values: [u8; 2], scale: f32, bias: f32| {
        let mut bytes = values.to_vec();
        bytes.extend_from_slice(&scale.to_le_bytes());
        bytes.extend_from_slice(&bias.to_le_bytes());
        bytes
    };
    let mut table = row([1, 2], 0.5, 1.0);
    table.extend(row([4, 8], 2.0, -1.0));
    let weight = Tensor::from_vec(&[2, 10], table)?;

    let mut b = GraphBuilder::new();
    let w = b.tensor_input("weight");
    let i = b.tensor_input("indices");
    let o = b.tensor_input("offsets");
    let out = b.op("quantized::embedding_bag_byte_rowwise_offsets", &[w, i, o]);
    b.output(out);
    let mut m = module(b)?;
    let outputs = m.run(vec![
        weight.into(),
        Tensor::from_slice(&[3], &[0i64, 1, 1])?.into(),
        Tensor::from_slice(&[2], &[0i64, 1])?.into(),
    ])?;
    let out = tensor_out(&outputs, 0)?;
    assert_eq!(out.dtype(), DType::F32);
    assert_eq!(out.sizes(), &[2, 2]);
    // bag 0: [1.5, 2.0]; bag 1: 2 * [7, 15]
    assert_eq!(out.to_vec::<f32>()?, vec![1.5, 2.0, 14.0, 30.0]);
    Ok(())
}
