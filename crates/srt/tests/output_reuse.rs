use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use srt::graph::ValueId;
use srt::{Graph, GraphBuilder, OperatorRegistry, RuntimeOptions, StaticModule, Tensor, Value};
use srt_codegen::LoopNestBackend;

fn add_relu_graph() -> anyhow::Result<(Graph, ValueId, ValueId)> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let y = b.tensor_input("y");
    let z = b.op("ops::add", &[x, y]);
    let out = b.op("ops::relu", &[z]);
    b.output(out);
    Ok((b.build()?, z, out))
}

fn random_tensor(rng: &mut StdRng, sizes: &[usize]) -> anyhow::Result<(Tensor, Vec<f32>)> {
    let n: usize = sizes.iter().product();
    let data: Vec<f32> = (0..n).map(|_| rng.gen_range(-2.0f32..2.0)).collect();
    Ok((Tensor::from_slice(sizes, &data)?, data))
}

fn slot_tensor(module: &StaticModule, id: ValueId) -> anyhow::Result<Tensor> {
    let slot = module
        .output_slot(id)
        .ok_or_else(|| anyhow::anyhow!("no slot for value {id}"))?;
    Ok(slot.read()?.to_tensor()?.clone())
}

#[test]
fn add_relu_allocates_once_then_reuses_and_grows_in_place() -> anyhow::Result<()> {
    let (graph, z, out) = add_relu_graph()?;
    let registry = OperatorRegistry::with_builtins()?;
    let backend = LoopNestBackend::new();
    let mut module = StaticModule::new(graph, &registry, RuntimeOptions::default(), Some(&backend))?;
    let mut rng = StdRng::seed_from_u64(42);

    let mut identities = Vec::new();
    for (run, sizes) in [[4usize, 4], [4, 4], [8, 8]].iter().enumerate() {
        let (x, xs) = random_tensor(&mut rng, sizes)?;
        let (y, ys) = random_tensor(&mut rng, sizes)?;
        let result = module.run(vec![x.into(), y.into()])?;
        let got = result[0].to_tensor()?;
        assert_eq!(got.sizes(), sizes.as_slice(), "run {run}");

        let expected: Vec<f32> = xs
            .iter()
            .zip(&ys)
            .map(|(a, b)| {
                let s = a + b;
                if s < 0.0 {
                    0.0
                } else {
                    s
                }
            })
            .collect();
        let got: Vec<f32> = got.to_vec()?;
        for (i, (g, e)) in got.iter().zip(&expected).enumerate() {
            assert_eq!(g.to_bits(), e.to_bits(), "run {run} element {i}");
        }

        let z_tensor = slot_tensor(&module, z)?;
        let out_tensor = slot_tensor(&module, out)?;
        identities.push((
            z_tensor.storage_id(),
            out_tensor.storage_id(),
            out_tensor.storage().capacity(),
        ));

        let stats = module.stats();
        match run {
            0 => {
                assert_eq!(stats.output_allocations, 2);
                assert_eq!(stats.output_reuses, 0);
            }
            1 => {
                assert_eq!(stats.output_allocations, 2);
                assert_eq!(stats.output_reuses, 2);
                assert_eq!(stats.storage_regrowths, 0);
            }
            _ => {
                assert_eq!(stats.output_allocations, 2);
                assert_eq!(stats.output_reuses, 4);
                assert_eq!(stats.storage_regrowths, 2);
            }
        }
    }

    assert_eq!(identities[0].0, identities[1].0);
    assert_eq!(identities[0].0, identities[2].0);
    assert_eq!(identities[0].1, identities[1].1);
    assert_eq!(identities[0].1, identities[2].1);
    assert_eq!(identities[0].2, identities[1].2);
    assert!(identities[2].2 >= 64);

    let stats = module.stats();
    assert_eq!(stats.runs, 3);
    assert_eq!(stats.vectorized_calls, 3);
    assert_eq!(stats.fallback_calls, 0);
    Ok(())
}

#[test]
fn second_call_with_same_shape_keeps_storage_and_updates_contents() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let two = b.constant(2i64);
    let y = b.op("ops::mul", &[x, two]);
    b.output(y);
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)?;

    module.run(vec![Tensor::from_slice(&[2, 2], &[1.0f32, 2.0, 3.0, 4.0])?.into()])?;
    let first = slot_tensor(&module, y)?;
    assert_eq!(first.dtype(), srt::DType::F32);
    assert_eq!(first.sizes(), &[2, 2]);

    module.run(vec![Tensor::from_slice(&[2, 2], &[5.0f32, 6.0, 7.0, 8.0])?.into()])?;
    let second = slot_tensor(&module, y)?;
    assert_eq!(first.storage_id(), second.storage_id());
    assert!(first.shares_storage(&second));
    assert_eq!(second.to_vec::<f32>()?, vec![10.0, 12.0, 14.0, 16.0]);
    assert_eq!(module.stats().output_allocations, 1);
    assert_eq!(module.stats().output_reuses, 1);
    Ok(())
}

#[test]
fn varying_lengths_never_leak_stale_elements() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let y = b.op("ops::relu", &[x]);
    b.output(y);
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)?;

    let inputs: [&[f32]; 3] = [
        &[1.0, -2.0, 3.0],
        &[-1.0, 2.0, -3.0, 4.0, -5.0, 6.0, 7.0],
        &[9.0, -9.0, 0.5],
    ];
    for data in inputs {
        let result = module.run(vec![Tensor::from_slice(&[data.len()], data)?.into()])?;
        let got = result[0].to_tensor()?;
        let expected: Vec<f32> = data.iter().map(|&v| if v < 0.0 { 0.0 } else { v }).collect();
        assert_eq!(got.numel(), data.len());
        assert_eq!(got.to_vec::<f32>()?, expected);
    }
    assert_eq!(module.stats().output_allocations, 1);
    assert_eq!(module.stats().output_reuses, 2);
    Ok(())
}

#[test]
fn scalar_operands_are_wrapped_without_promoting() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let half = b.constant(0.5f64);
    let y = b.op("ops::add", &[x, half]);
    b.output(y);
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)?;

    let result = module.run(vec![Tensor::from_slice(&[3], &[1.0f32, 2.0, 3.0])?.into()])?;
    let got = result[0].to_tensor()?;
    assert_eq!(got.dtype(), srt::DType::F32);
    assert_eq!(got.to_vec::<f32>()?, vec![1.5, 2.5, 3.5]);
    Ok(())
}

#[test]
fn reduction_dtype_defaults_to_input() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.tensor_input("x");
    let total = b.op("ops::sum", &[x]);
    b.output(total);
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(b.build()?, &registry, RuntimeOptions::default(), None)?;

    let result = module.run(vec![Value::from(Tensor::from_slice(&[2, 2], &[1i64, 2, 3, 4])?)])?;
    let got = result[0].to_tensor()?;
    assert_eq!(got.dtype(), srt::DType::I64);
    assert_eq!(got.item::<i64>()?, 10);
    Ok(())
}

#[test]
fn failed_run_releases_bound_inputs() -> anyhow::Result<()> {
    let (graph, _, _) = add_relu_graph()?;
    let registry = OperatorRegistry::with_builtins()?;
    let mut module = StaticModule::new(graph, &registry, RuntimeOptions::default(), None)?;

    let err = module
        .run(vec![
            Tensor::zeros(&[2], srt::DType::F32).into(),
            Tensor::zeros(&[3], srt::DType::F32).into(),
        ])
        .unwrap_err();
    assert!(matches!(err, srt::Error::Node { index: 0, .. }), "{err}");
    for &id in module.graph().inputs() {
        assert_eq!(module.output_slot(id).map(|s| s.is_empty()), Some(true));
    }
    assert_eq!(module.stats().runs, 0);

    let x = Tensor::from_slice(&[2], &[1.0f32, -1.0])?;
    let out = module.run(vec![x.clone().into(), x.into()])?;
    assert_eq!(out[0].to_tensor()?.to_vec::<f32>()?, vec![2.0, 0.0]);
    assert_eq!(module.stats().runs, 1);
    Ok(())
}
