use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::linker::providers::LinkProvider;
use crate::runtime::linker::strategy::{Adapter, Domain, Guard, LinkedStrategy};
use crate::runtime::linker::{ArithOp, CallSite, OpKind, RelOp};
use crate::runtime::value::Value;
use std::sync::Arc;

/// Links arithmetic, comparison, and step operations over primitive
/// operands. Addition splits on shape: a textual operand anywhere makes the
/// site a concatenation, and the two shapes carry distinct guards so an
/// operand drifting between them relinks the site.
pub struct NumericProvider;

impl LinkProvider for NumericProvider {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn matches(&self, kind: &OpKind, operands: &[Value]) -> bool {
        let all_primitive = operands.iter().all(|v| Domain::of(v).is_primitive());
        match kind {
            OpKind::Arith(_) | OpKind::Rel(_) => all_primitive,
            OpKind::Increment | OpKind::Decrement | OpKind::TypeOf => all_primitive,
            _ => false,
        }
    }

    fn build(&self, site: &CallSite, operands: &[Value]) -> LinkedStrategy {
        match &site.kind {
            OpKind::Arith(ArithOp::Add) if any_textual(operands) => link_concat(),
            OpKind::Arith(op) => link_arith(*op),
            OpKind::Rel(op) => link_rel(*op),
            OpKind::Increment => link_step("increment", 1.0),
            OpKind::Decrement => link_step("decrement", -1.0),
            _ => link_primitive_typeof(),
        }
    }
}

fn any_textual(operands: &[Value]) -> bool {
    operands.iter().any(|v| Domain::of(v) == Domain::Text)
}

fn link_concat() -> LinkedStrategy {
    LinkedStrategy::new(
        "concat",
        Guard::SomeTextual,
        Arc::new(|_cx, operands| {
            let (a, b) = pair(&operands)?;
            let mut text = match a {
                Value::Str(s) => s.to_string(),
                other => other.to_text(),
            };
            text.push_str(&b.to_text());
            Ok(Value::str(text))
        }),
    )
    .with_adapters(vec![Adapter::ToText(0), Adapter::ToText(1)])
}

fn link_arith(op: ArithOp) -> LinkedStrategy {
    // Only addition splits on textual operands, so only its numeric shape
    // needs the narrow guard. The other operators coerce any primitive.
    let guard = match op {
        ArithOp::Add => Guard::AllNumeric,
        _ => Guard::AllPrimitive,
    };
    LinkedStrategy::new(
        op.strategy_name(),
        guard,
        Arc::new(move |_cx, operands| {
            let (a, b) = numbers(&operands)?;
            let result = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Mod => a % b,
            };
            Ok(Value::Number(result))
        }),
    )
    .with_adapters(vec![Adapter::ToNumber(0), Adapter::ToNumber(1)])
}

fn link_rel(op: RelOp) -> LinkedStrategy {
    LinkedStrategy::new(
        op.strategy_name(),
        Guard::AllPrimitive,
        Arc::new(move |_cx, operands| {
            let (a, b) = numbers(&operands)?;
            // NaN on either side makes every comparison false.
            let result = match op {
                RelOp::Lt => a < b,
                RelOp::Le => a <= b,
                RelOp::Gt => a > b,
                RelOp::Ge => a >= b,
            };
            Ok(Value::Bool(result))
        }),
    )
    .with_adapters(vec![Adapter::ToNumber(0), Adapter::ToNumber(1)])
}

fn link_step(name: &'static str, delta: f64) -> LinkedStrategy {
    LinkedStrategy::new(
        name,
        Guard::AllPrimitive,
        Arc::new(move |_cx, operands| match operands.first() {
            Some(Value::Number(n)) => Ok(Value::Number(n + delta)),
            _ => Err(fault("step target did not numerify")),
        }),
    )
    .with_adapters(vec![Adapter::ToNumber(0)])
}

fn link_primitive_typeof() -> LinkedStrategy {
    LinkedStrategy::new(
        "primitive-typeof",
        Guard::AllPrimitive,
        Arc::new(|_cx, operands| {
            let value = operands
                .first()
                .ok_or_else(|| fault("typeof missing an operand"))?;
            Ok(Value::str(value.type_of()))
        }),
    )
}

fn pair(operands: &[Value]) -> RuntimeResult<(&Value, &Value)> {
    match operands {
        [a, b] => Ok((a, b)),
        _ => Err(fault("expected two operands")),
    }
}

fn numbers(operands: &[Value]) -> RuntimeResult<(f64, f64)> {
    match operands {
        [Value::Number(a), Value::Number(b)] => Ok((*a, *b)),
        _ => Err(fault("operands did not numerify")),
    }
}

fn fault(message: &str) -> RuntimeError {
    RuntimeError::EngineFault {
        message: message.to_string(),
    }
}
