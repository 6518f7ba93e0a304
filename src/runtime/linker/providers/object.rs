use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::linker::providers::LinkProvider;
use crate::runtime::linker::strategy::{Adapter, Domain, Guard, LinkedStrategy};
use crate::runtime::linker::{CallSite, OpKind};
use crate::runtime::value::{DynObject, RefBase, Value};
use std::sync::Arc;

/// Links member access on engine objects and on the scope chain, plus calls
/// to and construction of compiled and native functions.
pub struct NativeObjectProvider;

impl LinkProvider for NativeObjectProvider {
    fn name(&self) -> &'static str {
        "object"
    }

    fn matches(&self, kind: &OpKind, operands: &[Value]) -> bool {
        let first = match operands.first() {
            Some(v) => Domain::of(v),
            None => return false,
        };
        match kind {
            OpKind::GetMember | OpKind::SetMember => match &first {
                Domain::ScopeRef => true,
                Domain::Ref(base) => **base == Domain::Object,
                _ => false,
            },
            OpKind::Call { .. } => matches!(first, Domain::Function | Domain::Native),
            OpKind::Construct { .. } => matches!(first, Domain::Function),
            OpKind::TypeOf => {
                matches!(first, Domain::Object | Domain::Function | Domain::Native)
            }
            _ => false,
        }
    }

    fn build(&self, site: &CallSite, operands: &[Value]) -> LinkedStrategy {
        let first = operands.first().map(Domain::of);
        match &site.kind {
            OpKind::GetMember => {
                if matches!(first, Some(Domain::ScopeRef)) {
                    link_scope_get()
                } else {
                    link_object_get()
                }
            }
            OpKind::SetMember => {
                if matches!(first, Some(Domain::ScopeRef)) {
                    link_scope_set()
                } else {
                    link_object_set()
                }
            }
            OpKind::Call { .. } => {
                if matches!(first, Some(Domain::Native)) {
                    link_native_call()
                } else {
                    link_function_call()
                }
            }
            OpKind::Construct { .. } => link_construct(),
            _ => link_engine_typeof(),
        }
    }
}

fn link_object_get() -> LinkedStrategy {
    LinkedStrategy::new(
        "object-get",
        Guard::ObjectPropertyRef,
        Arc::new(|_cx, operands| {
            let (receiver, name) = receiver_and_name(&operands)?;
            Ok(receiver.get(&name).unwrap_or(Value::Undefined))
        }),
    )
    .with_adapters(vec![
        Adapter::Permute(vec![0, 0]),
        Adapter::DerefBase(0),
        Adapter::RefName(1),
    ])
}

fn link_object_set() -> LinkedStrategy {
    LinkedStrategy::new(
        "object-set",
        Guard::ObjectPropertyRef,
        Arc::new(|_cx, operands| {
            let (receiver, name) = receiver_and_name(&operands)?;
            let value = operands
                .get(2)
                .cloned()
                .ok_or_else(|| fault("object-set missing a value operand"))?;
            receiver.put(&name, value.clone());
            Ok(value)
        }),
    )
    .with_adapters(vec![
        Adapter::Permute(vec![0, 0, 1]),
        Adapter::DerefBase(0),
        Adapter::RefName(1),
    ])
}

fn link_scope_get() -> LinkedStrategy {
    LinkedStrategy::new(
        "scope-get",
        Guard::ScopeRef,
        Arc::new(|_cx, operands| {
            let reference = scope_ref(&operands)?;
            let scope = match &reference.base {
                RefBase::Scope(scope) => scope,
                RefBase::Value(_) => return Err(fault("scope-get on a property reference")),
            };
            scope
                .lookup(&reference.name)
                .ok_or_else(|| RuntimeError::UndefinedReference {
                    name: reference.name.clone(),
                })
        }),
    )
}

/// Assignment through the scope chain. An undeclared name is an error in
/// strict code and a fresh global binding otherwise; the strictness flag
/// travels with the reference, not with the site.
fn link_scope_set() -> LinkedStrategy {
    LinkedStrategy::new(
        "scope-set",
        Guard::ScopeRef,
        Arc::new(|_cx, operands| {
            let reference = scope_ref(&operands)?;
            let strict = matches!(operands.get(1), Some(Value::Bool(true)));
            let value = operands
                .get(2)
                .cloned()
                .ok_or_else(|| fault("scope-set missing a value operand"))?;
            let scope = match &reference.base {
                RefBase::Scope(scope) => scope,
                RefBase::Value(_) => return Err(fault("scope-set on a property reference")),
            };
            if !scope.assign(&reference.name, value.clone()) {
                if strict {
                    return Err(RuntimeError::StrictAssignment {
                        name: reference.name.clone(),
                    });
                }
                scope.global().declare(&reference.name, value.clone());
            }
            Ok(value)
        }),
    )
    .with_adapters(vec![
        Adapter::Permute(vec![0, 0, 1]),
        Adapter::RefStrictness(1),
    ])
}

fn link_function_call() -> LinkedStrategy {
    LinkedStrategy::new(
        "function-call",
        Guard::CompiledCallee,
        Arc::new(|cx, operands| match operands.first() {
            Some(Value::Function(function)) => function.call(cx, &operands[2..]),
            _ => Err(fault("function-call on a non-function")),
        }),
    )
}

fn link_native_call() -> LinkedStrategy {
    LinkedStrategy::new(
        "native-call",
        Guard::NativeCallee,
        Arc::new(|cx, operands| match operands.first() {
            Some(Value::Native(native)) => {
                let receiver = operands
                    .get(1)
                    .cloned()
                    .unwrap_or(Value::Undefined);
                native.call(cx, receiver, &operands[2..])
            }
            _ => Err(fault("native-call on a non-native")),
        }),
    )
}

/// `new f(...)`: call the function and keep its result when it produced an
/// object, otherwise hand back a fresh empty object.
fn link_construct() -> LinkedStrategy {
    LinkedStrategy::new(
        "construct",
        Guard::CompiledCallee,
        Arc::new(|cx, operands| match operands.first() {
            Some(Value::Function(function)) => {
                let result = function.call(cx, &operands[1..])?;
                match result {
                    Value::Object(_) | Value::Host(_) => Ok(result),
                    _ => Ok(Value::Object(DynObject::new())),
                }
            }
            _ => Err(fault("construct on a non-function")),
        }),
    )
}

fn link_engine_typeof() -> LinkedStrategy {
    LinkedStrategy::new(
        "object-typeof",
        Guard::EngineReceiver,
        Arc::new(|_cx, operands| {
            let value = operands
                .first()
                .ok_or_else(|| fault("typeof missing an operand"))?;
            Ok(Value::str(value.type_of()))
        }),
    )
}

fn receiver_and_name(operands: &[Value]) -> RuntimeResult<(Arc<DynObject>, String)> {
    let receiver = match operands.first() {
        Some(Value::Object(object)) => object.clone(),
        _ => return Err(fault("expected an object receiver")),
    };
    let name = match operands.get(1) {
        Some(Value::Str(name)) => name.to_string(),
        _ => return Err(fault("expected a property name")),
    };
    Ok((receiver, name))
}

fn scope_ref(operands: &[Value]) -> RuntimeResult<Arc<crate::runtime::value::Reference>> {
    match operands.first() {
        Some(Value::Ref(reference)) => Ok(reference.clone()),
        _ => Err(fault("expected a scope reference")),
    }
}

fn fault(message: &str) -> RuntimeError {
    RuntimeError::EngineFault {
        message: message.to_string(),
    }
}
