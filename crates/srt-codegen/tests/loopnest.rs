use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use srt::codegen::{formula, BinaryFn, CmpOp, CodegenBackend, Expr, Formula, UnaryFn};
use srt_codegen::{lower, simplify, CodegenError, Instr, LoopNestBackend, MAX_VECTOR_WIDTH};

fn random_inputs(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-4.0f32..4.0)).collect()
}

fn assert_bit_exact(formula: &Formula, input: &[f32], out: &[f32]) {
    for (i, (&x, &y)) in input.iter().zip(out).enumerate() {
        let expected = formula.body.eval(x);
        assert!(
            expected.to_bits() == y.to_bits() || (expected.is_nan() && y.is_nan()),
            "{}[{i}]: x={x} expected {expected} got {y}",
            formula.name
        );
    }
}

#[test]
fn tail_shorter_than_width_matches_reference() -> anyhow::Result<()> {
    let backend = LoopNestBackend::new();
    for formula in [
        formula::relu(),
        formula::tanh(),
        formula::sigmoid(),
        formula::logit(Some(1e-6)),
    ] {
        let routine = backend.compile(&formula, 16)?;
        let input = random_inputs(17, 7);
        let mut out = vec![f32::NAN; input.len()];
        routine.call(&mut out, &input);
        assert_bit_exact(&formula, &input, &out);
    }
    Ok(())
}

#[test]
fn lengths_below_and_at_width_are_handled() -> anyhow::Result<()> {
    let formula = formula::sigmoid();
    let routine = LoopNestBackend.compile(&formula, 8)?;
    for len in [0usize, 1, 7, 8, 9, 64] {
        let input = random_inputs(len, len as u64);
        let mut out = vec![0.0; len];
        routine.call(&mut out, &input);
        assert_bit_exact(&formula, &input, &out);
    }
    Ok(())
}

#[test]
fn relu_keeps_negative_zero_and_nan() -> anyhow::Result<()> {
    let formula = formula::relu();
    let routine = LoopNestBackend.compile(&formula, 4)?;
    let input = [-0.0f32, f32::NAN, -1.5, 2.0, f32::NEG_INFINITY];
    let mut out = [1.0f32; 5];
    routine.call(&mut out, &input);
    assert_eq!(out[0].to_bits(), (-0.0f32).to_bits());
    assert!(out[1].is_nan());
    assert_eq!(&out[2..], &[0.0, 2.0, 0.0]);
    Ok(())
}

#[test]
fn logit_with_eps_clamps_boundaries() -> anyhow::Result<()> {
    let formula = formula::logit(Some(0.25));
    let routine = LoopNestBackend.compile(&formula, 16)?;
    let input = [0.0f32, 0.1, 0.5, 0.9, 1.0];
    let mut out = [0.0f32; 5];
    routine.call(&mut out, &input);
    assert_eq!(out[0], out[1]);
    assert_eq!(out[3], out[4]);
    assert_eq!(out[2], 0.0);
    assert_bit_exact(&formula, &input, &out);
    Ok(())
}

#[test]
fn rejects_out_of_range_widths() {
    let formula = formula::tanh();
    for width in [0, MAX_VECTOR_WIDTH + 1] {
        let err = LoopNestBackend.build(&formula, width).unwrap_err();
        assert_eq!(
            err,
            CodegenError::InvalidWidth {
                width,
                max: MAX_VECTOR_WIDTH
            }
        );
    }
    let err = LoopNestBackend.compile(&formula, 0).unwrap_err();
    assert!(matches!(err, srt::Error::Codegen(_)), "{err}");
}

#[test]
fn shared_subtrees_lower_once() {
    let x = Expr::input;
    let shared = || Expr::unary(UnaryFn::Exp, x());
    let body = Expr::binary(BinaryFn::Add, shared(), shared());
    let program = lower(&body);
    let exps = program
        .instrs()
        .iter()
        .filter(|i| matches!(i, Instr::Unary { f: UnaryFn::Exp, .. }))
        .count();
    assert_eq!(exps, 1);
    assert_eq!(program.len(), 3);
    assert_eq!(program.eval(0.5), body.eval(0.5));
}

#[test]
fn lowered_programs_are_in_definition_order() {
    let body = simplify(&formula::logit(Some(1e-3)).body);
    let program = lower(&body);
    for (index, instr) in program.instrs().iter().enumerate() {
        assert_eq!(instr.dst() as usize, index);
        let sources: Vec<u16> = match *instr {
            Instr::Load { .. } | Instr::Const { .. } => vec![],
            Instr::Unary { a, .. } => vec![a],
            Instr::Binary { a, b, .. } => vec![a, b],
            Instr::Select {
                lhs,
                rhs,
                then,
                otherwise,
                ..
            } => vec![lhs, rhs, then, otherwise],
        };
        assert!(sources.iter().all(|&s| (s as usize) < index), "{program}");
    }
}

#[test]
fn constant_formula_fills_output() -> anyhow::Result<()> {
    let formula = Formula {
        name: "three",
        body: Expr::select(
            CmpOp::Ge,
            Expr::constant(2.0),
            Expr::constant(1.0),
            Expr::binary(BinaryFn::Add, Expr::constant(1.0), Expr::constant(2.0)),
            Expr::input(),
        ),
    };
    let nest = LoopNestBackend.build(&formula, 4)?;
    assert_eq!(nest.program().len(), 1);
    let mut out = [0.0f32; 6];
    nest.run(&mut out, &[9.0; 6]);
    assert_eq!(out, [3.0; 6]);
    Ok(())
}
