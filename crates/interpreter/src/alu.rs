//! Evaluation of ALU operations.
use cadenza_ir::{inst::AluOp, Type};
use smallvec::{smallvec, SmallVec};

use crate::value::{wrap_int, EvalValue};

/// Evaluates `op` on `args`. `ty` is the type of the first destination.
pub(crate) fn eval_alu(op: AluOp, args: &[EvalValue], ty: Type) -> SmallVec<[EvalValue; 2]> {
    let bits = ty.elem().bits;
    let value = match op {
        AluOp::Fadd => float_binary(&args[0], &args[1], |a, b| a + b),
        AluOp::Fsub => float_binary(&args[0], &args[1], |a, b| a - b),
        AluOp::Fmul => float_binary(&args[0], &args[1], |a, b| a * b),
        AluOp::Fneg => float_unary(&args[0], |a| -a),
        AluOp::Fabs => float_unary(&args[0], f32::abs),

        AluOp::Iadd => int_binary(&args[0], &args[1], bits, i64::wrapping_add),
        AluOp::Isub => int_binary(&args[0], &args[1], bits, i64::wrapping_sub),
        AluOp::Imul => int_binary(&args[0], &args[1], bits, i64::wrapping_mul),
        AluOp::Iand => bitwise(&args[0], &args[1], bits, |a, b| a & b),
        AluOp::Ior => bitwise(&args[0], &args[1], bits, |a, b| a | b),
        AluOp::Ixor => bitwise(&args[0], &args[1], bits, |a, b| a ^ b),
        AluOp::Inot => args[0].map(|v| match v {
            EvalValue::B(b) => EvalValue::B(!b),
            EvalValue::I(i) => EvalValue::I(wrap_int(!i, bits)),
            _ => EvalValue::Undef,
        }),

        AluOp::Ieq => int_cmp(&args[0], &args[1], |a, b| a == b),
        AluOp::Ine => int_cmp(&args[0], &args[1], |a, b| a != b),
        AluOp::Ilt => int_cmp(&args[0], &args[1], |a, b| a < b),
        AluOp::Flt => float_cmp(&args[0], &args[1], |a, b| a < b),
        AluOp::Fge => float_cmp(&args[0], &args[1], |a, b| a >= b),
        AluOp::Feq => float_cmp(&args[0], &args[1], |a, b| a == b),
        AluOp::Fne => float_cmp(&args[0], &args[1], |a, b| a != b),

        AluOp::Bcsel | AluOp::Fcsel => select(&args[0], &args[1], &args[2]),
        AluOp::Mov => args[0].clone(),

        AluOp::F2i => args[0].map(|v| match v {
            EvalValue::F(f) => EvalValue::I(wrap_int(*f as i64, bits)),
            _ => EvalValue::Undef,
        }),
        AluOp::I2f => args[0].map(|v| match v {
            EvalValue::I(i) => EvalValue::F(*i as f32),
            _ => EvalValue::Undef,
        }),
        AluOp::B2f => args[0].map(|v| match v {
            EvalValue::B(b) => EvalValue::F(if *b { 1.0 } else { 0.0 }),
            _ => EvalValue::Undef,
        }),

        AluOp::Vec => EvalValue::Vec(
            args.iter()
                .flat_map(|arg| arg.lanes().iter().cloned())
                .collect(),
        ),
        AluOp::Split => {
            return match args[0] {
                EvalValue::I(v) => smallvec![
                    EvalValue::I(wrap_int(v & 0xffff_ffff, bits)),
                    EvalValue::I(wrap_int(v >> 32, bits)),
                ],
                _ => smallvec![EvalValue::Undef, EvalValue::Undef],
            }
        }
        AluOp::Undef => EvalValue::Undef,
    };

    smallvec![value]
}

fn float_unary(v: &EvalValue, f: impl Fn(f32) -> f32) -> EvalValue {
    v.map(|v| match v {
        EvalValue::F(a) => EvalValue::F(f(*a)),
        _ => EvalValue::Undef,
    })
}

fn float_binary(lhs: &EvalValue, rhs: &EvalValue, f: impl Fn(f32, f32) -> f32) -> EvalValue {
    lhs.zip_with(rhs, |a, b| match (a, b) {
        (EvalValue::F(a), EvalValue::F(b)) => EvalValue::F(f(*a, *b)),
        _ => EvalValue::Undef,
    })
}

fn float_cmp(lhs: &EvalValue, rhs: &EvalValue, f: impl Fn(f32, f32) -> bool) -> EvalValue {
    lhs.zip_with(rhs, |a, b| match (a, b) {
        (EvalValue::F(a), EvalValue::F(b)) => EvalValue::B(f(*a, *b)),
        _ => EvalValue::Undef,
    })
}

fn int_binary(
    lhs: &EvalValue,
    rhs: &EvalValue,
    bits: u8,
    f: impl Fn(i64, i64) -> i64,
) -> EvalValue {
    lhs.zip_with(rhs, |a, b| match (a, b) {
        (EvalValue::I(a), EvalValue::I(b)) => EvalValue::I(wrap_int(f(*a, *b), bits)),
        _ => EvalValue::Undef,
    })
}

/// Logic operations work on booleans as well as integers.
fn bitwise(lhs: &EvalValue, rhs: &EvalValue, bits: u8, f: impl Fn(i64, i64) -> i64) -> EvalValue {
    lhs.zip_with(rhs, |a, b| match (a, b) {
        (EvalValue::B(a), EvalValue::B(b)) => EvalValue::B(f(*a as i64, *b as i64) & 1 != 0),
        (EvalValue::I(a), EvalValue::I(b)) => EvalValue::I(wrap_int(f(*a, *b), bits)),
        _ => EvalValue::Undef,
    })
}

fn int_cmp(lhs: &EvalValue, rhs: &EvalValue, f: impl Fn(i64, i64) -> bool) -> EvalValue {
    lhs.zip_with(rhs, |a, b| match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => EvalValue::B(f(a, b)),
        _ => EvalValue::Undef,
    })
}

fn select(cond: &EvalValue, then: &EvalValue, else_: &EvalValue) -> EvalValue {
    match cond {
        EvalValue::Vec(conds) => EvalValue::Vec(
            conds
                .iter()
                .enumerate()
                .map(|(idx, cond)| select(cond, &then.lane(idx), &else_.lane(idx)))
                .collect(),
        ),
        cond => match cond.as_bool() {
            Some(true) => then.clone(),
            Some(false) => else_.clone(),
            None => EvalValue::Undef,
        },
    }
}
