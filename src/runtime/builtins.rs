use crate::runtime::context::ExecutionContext;
use crate::runtime::error::RuntimeResult;
use crate::runtime::value::{DynObject, NativeFunction, Value};

/// Install the standard globals. Kept deliberately small; hosts add their
/// own surface through `declare_global` and `HostValue`.
pub fn install(cx: &ExecutionContext) {
    cx.declare_global("Math", Value::Object(math_object()));
}

fn math_object() -> std::sync::Arc<DynObject> {
    let math = DynObject::new();
    math.put("ceil", native("ceil", |n| n.ceil()));
    math.put("floor", native("floor", |n| n.floor()));
    math.put("abs", native("abs", |n| n.abs()));
    math.put("sqrt", native("sqrt", |n| n.sqrt()));
    math.put("round", native("round", |n| n.round()));
    math.put(
        "max",
        Value::Native(NativeFunction::new("max", |_cx, _receiver, args| {
            Ok(Value::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max)))
        })),
    );
    math.put(
        "min",
        Value::Native(NativeFunction::new("min", |_cx, _receiver, args| {
            Ok(Value::Number(fold_numbers(args, f64::INFINITY, f64::min)))
        })),
    );
    math.put("PI", Value::Number(std::f64::consts::PI));
    math.put("E", Value::Number(std::f64::consts::E));
    math
}

fn native(name: &'static str, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Value {
    Value::Native(NativeFunction::new(
        name,
        move |_cx: &mut ExecutionContext, _receiver: Value, args: &[Value]| -> RuntimeResult<Value> {
            let n = args.first().map(Value::to_number).unwrap_or(f64::NAN);
            Ok(Value::Number(f(n)))
        },
    ))
}

fn fold_numbers(args: &[Value], empty: f64, f: impl Fn(f64, f64) -> f64) -> f64 {
    let mut acc = empty;
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, n);
    }
    acc
}
