use crate::compiler::fragment::{Fragment, Op};
use crate::runtime::context::ExecutionContext;
use crate::runtime::environment::Scope;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{DynObject, FunctionValue, Reference, Value};
use std::sync::Arc;
use thiserror::Error;

/// Verification failures raised by the load service. A fragment that fails
/// to load was mis-emitted; these never reach script code as catchable
/// errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("jump at op {at} targets {target}, outside the unit (len {len})")]
    JumpOutOfBounds { at: usize, target: i64, len: usize },
    #[error("op {at} pops more values than the stack holds")]
    StackUnderflow { at: usize },
    #[error("op {at} is reachable at depths {first} and {second}")]
    InconsistentDepth {
        at: usize,
        first: usize,
        second: usize,
    },
    #[error("unit exits with {depth} values on the stack")]
    UnbalancedExit { depth: usize },
}

/// Admit a fragment for execution. Walks every reachable path once and
/// checks that jumps stay inside the unit and that each op sees one
/// consistent stack depth, so the evaluator can run without per-op bounds
/// anxiety.
pub fn load(fragment: Fragment) -> Result<Fragment, LoadError> {
    verify(&fragment)?;
    Ok(fragment)
}

fn verify(fragment: &Fragment) -> Result<(), LoadError> {
    let ops = fragment.ops();
    let len = ops.len();
    let mut depths: Vec<Option<usize>> = vec![None; len];
    let mut work: Vec<(usize, usize)> = vec![(0, 0)];

    while let Some((pc, depth)) = work.pop() {
        if pc == len {
            if depth != 0 {
                return Err(LoadError::UnbalancedExit { depth });
            }
            continue;
        }
        match depths[pc] {
            Some(seen) if seen == depth => continue,
            Some(seen) => {
                return Err(LoadError::InconsistentDepth {
                    at: pc,
                    first: seen,
                    second: depth,
                })
            }
            None => depths[pc] = Some(depth),
        }

        let op = &ops[pc];
        let (pops, pushes) = op.stack_effect();
        if pops > depth {
            return Err(LoadError::StackUnderflow { at: pc });
        }
        let next = depth - pops + pushes;

        if let Some(rel) = op.jump_offset() {
            let target = pc as i64 + 1 + rel as i64;
            if target < 0 || target > len as i64 {
                return Err(LoadError::JumpOutOfBounds {
                    at: pc,
                    target,
                    len,
                });
            }
            work.push((target as usize, next));
        }
        if op.falls_through() {
            work.push((pc + 1, next));
        }
    }
    Ok(())
}

/// Run a loaded fragment against a scope. Falling off the end yields
/// `undefined`; `Return` yields the popped value.
pub fn run(
    cx: &mut ExecutionContext,
    scope: &Arc<Scope>,
    fragment: &Fragment,
) -> RuntimeResult<Value> {
    let ops = fragment.ops();
    let mut stack: Vec<Value> = Vec::new();
    let mut pc: usize = 0;

    while pc < ops.len() {
        match &ops[pc] {
            Op::Const(value) => stack.push(value.clone()),
            Op::LoadVar(name) => {
                let value = scope
                    .lookup(name)
                    .ok_or_else(|| RuntimeError::UndefinedReference { name: name.clone() })?;
                stack.push(value);
            }
            Op::Declare(name) => {
                let value = pop(&mut stack)?;
                scope.declare(name, value);
            }
            Op::RefVar { name, strict } => {
                stack.push(Reference::scoped(scope.clone(), name.clone(), *strict));
            }
            Op::RefProp { strict } => {
                let key = pop(&mut stack)?;
                let receiver = pop(&mut stack)?;
                stack.push(Reference::property(receiver, key.to_text(), *strict));
            }
            Op::Pop => {
                pop(&mut stack)?;
            }
            Op::Dup => {
                let top = peek(&stack)?.clone();
                stack.push(top);
            }
            Op::Swap => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                stack.push(b);
                stack.push(a);
            }
            Op::Rot => {
                let c = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                stack.push(b);
                stack.push(c);
                stack.push(a);
            }
            Op::Jump(rel) => {
                pc = offset(pc, *rel);
                continue;
            }
            Op::JumpIfTrue(rel) => {
                if pop(&mut stack)?.truthy() {
                    pc = offset(pc, *rel);
                    continue;
                }
            }
            Op::JumpIfFalse(rel) => {
                if !pop(&mut stack)?.truthy() {
                    pc = offset(pc, *rel);
                    continue;
                }
            }
            Op::Eq { strict, negated } => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                let equal = if *strict {
                    a.strict_eq(&b)
                } else {
                    a.loose_eq(&b)
                };
                stack.push(Value::Bool(equal != *negated));
            }
            Op::Not => {
                let value = pop(&mut stack)?;
                stack.push(Value::Bool(!value.truthy()));
            }
            Op::Print => {
                let value = pop(&mut stack)?;
                println!("{}", value.to_text());
            }
            Op::Return => return pop(&mut stack),
            Op::Throw => {
                let value = pop(&mut stack)?;
                return Err(RuntimeError::Thrown {
                    value: value.to_text(),
                });
            }
            Op::MakeObject(n) => {
                let object = DynObject::new();
                for _ in 0..*n {
                    let value = pop(&mut stack)?;
                    let key = pop(&mut stack)?;
                    object.put(&key.to_text(), value);
                }
                stack.push(Value::Object(object));
            }
            Op::MakeArray(n) => {
                let object = DynObject::new();
                let mut elements = Vec::with_capacity(*n);
                for _ in 0..*n {
                    elements.push(pop(&mut stack)?);
                }
                elements.reverse();
                for (idx, element) in elements.into_iter().enumerate() {
                    object.put(&idx.to_string(), element);
                }
                object.put("length", Value::Number(*n as f64));
                stack.push(Value::Object(object));
            }
            Op::Closure(unit) => {
                stack.push(Value::Function(Arc::new(FunctionValue {
                    unit: unit.clone(),
                    scope: scope.clone(),
                })));
            }
            Op::Dynamic(site) => {
                let arity = site.kind.arity();
                if stack.len() < arity {
                    return Err(RuntimeError::EngineFault {
                        message: format!("dynamic site {} underflows the stack", site.kind),
                    });
                }
                let operands = stack.split_off(stack.len() - arity);
                let result = site.invoke(cx, operands)?;
                stack.push(result);
            }
        }
        pc += 1;
    }
    Ok(Value::Undefined)
}

fn offset(pc: usize, rel: i32) -> usize {
    (pc as i64 + 1 + rel as i64) as usize
}

fn pop(stack: &mut Vec<Value>) -> RuntimeResult<Value> {
    stack.pop().ok_or_else(|| RuntimeError::EngineFault {
        message: "evaluation stack underflow".to_string(),
    })
}

fn peek(stack: &[Value]) -> RuntimeResult<&Value> {
    stack.last().ok_or_else(|| RuntimeError::EngineFault {
        message: "evaluation stack underflow".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::ExecutionContext;

    fn run_ops(ops: Vec<Op>) -> RuntimeResult<Value> {
        let mut cx = ExecutionContext::new();
        let scope = cx.globals().clone();
        let fragment = load(Fragment::of(ops)).unwrap();
        run(&mut cx, &scope, &fragment)
    }

    #[test]
    fn falling_off_the_end_yields_undefined() {
        let result = run_ops(vec![Op::Const(Value::Number(1.0)), Op::Pop]).unwrap();
        assert!(matches!(result, Value::Undefined));
    }

    #[test]
    fn return_pops_the_result() {
        let result = run_ops(vec![Op::Const(Value::Number(7.0)), Op::Return]).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 7.0));
    }

    #[test]
    fn conditional_jump_takes_the_branch() {
        // false ? 1 : 2
        let result = run_ops(vec![
            Op::Const(Value::Bool(false)),
            Op::JumpIfFalse(2),
            Op::Const(Value::Number(1.0)),
            Op::Jump(1),
            Op::Const(Value::Number(2.0)),
            Op::Return,
        ])
        .unwrap();
        assert!(matches!(result, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn verifier_rejects_out_of_bounds_jumps() {
        let err = load(Fragment::of(vec![Op::Jump(5)])).unwrap_err();
        assert!(matches!(err, LoadError::JumpOutOfBounds { .. }));
    }

    #[test]
    fn verifier_rejects_underflow() {
        let err = load(Fragment::of(vec![Op::Pop])).unwrap_err();
        assert!(matches!(err, LoadError::StackUnderflow { at: 0 }));
    }

    #[test]
    fn verifier_rejects_unbalanced_exit() {
        let err = load(Fragment::of(vec![Op::Const(Value::Undefined)])).unwrap_err();
        assert!(matches!(err, LoadError::UnbalancedExit { depth: 1 }));
    }

    #[test]
    fn verifier_rejects_depth_disagreement() {
        // One path reaches op 3 with an extra value on the stack.
        let err = load(Fragment::of(vec![
            Op::Const(Value::Bool(true)),
            Op::JumpIfTrue(1),
            Op::Const(Value::Number(1.0)),
            Op::Pop,
        ]))
        .unwrap_err();
        assert!(matches!(err, LoadError::InconsistentDepth { at: 3, .. }));
    }
}
