use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::linker::providers::LinkProvider;
use crate::runtime::linker::strategy::{Adapter, Domain, Guard, LinkedStrategy, ResultFilter};
use crate::runtime::linker::{CallSite, OpKind};
use crate::runtime::value::{HostValue, Value};
use std::sync::Arc;

/// Links operations whose receiver or callee is a host-embedded value. Every
/// strategy dereferences through to the host object and translates the
/// host's "no value" into the language's `undefined` on the way out.
pub struct HostProvider;

impl LinkProvider for HostProvider {
    fn name(&self) -> &'static str {
        "host"
    }

    fn matches(&self, kind: &OpKind, operands: &[Value]) -> bool {
        let first = match operands.first() {
            Some(v) => Domain::of(v),
            None => return false,
        };
        match kind {
            OpKind::GetMember | OpKind::SetMember => {
                matches!(&first, Domain::Ref(base) if **base == Domain::Host)
            }
            OpKind::Call { .. } | OpKind::Construct { .. } | OpKind::TypeOf => {
                first == Domain::Host
            }
            _ => false,
        }
    }

    fn build(&self, site: &CallSite, _operands: &[Value]) -> LinkedStrategy {
        match &site.kind {
            OpKind::GetMember => link_host_get(),
            OpKind::SetMember => link_host_set(),
            OpKind::Call { .. } => link_host_call(),
            OpKind::Construct { .. } => link_host_construct(),
            _ => link_host_typeof(),
        }
    }
}

fn link_host_get() -> LinkedStrategy {
    LinkedStrategy::new(
        "host-get",
        Guard::HostPropertyRef,
        Arc::new(|_cx, operands| {
            let (host, name) = host_and_name(&operands)?;
            Ok(host.get(&name).unwrap_or(Value::Null))
        }),
    )
    .with_adapters(vec![
        Adapter::Permute(vec![0, 0]),
        Adapter::DerefBase(0),
        Adapter::RefName(1),
    ])
    .with_filters(vec![ResultFilter::NullToUndefined])
}

fn link_host_set() -> LinkedStrategy {
    LinkedStrategy::new(
        "host-set",
        Guard::HostPropertyRef,
        Arc::new(|_cx, operands| {
            let (host, name) = host_and_name(&operands)?;
            let value = operands
                .get(2)
                .cloned()
                .ok_or_else(|| fault("host-set missing a value operand"))?;
            host.set(&name, value.clone())?;
            Ok(value)
        }),
    )
    .with_adapters(vec![
        Adapter::Permute(vec![0, 0, 1]),
        Adapter::DerefBase(0),
        Adapter::RefName(1),
    ])
}

fn link_host_call() -> LinkedStrategy {
    LinkedStrategy::new(
        "host-call",
        Guard::HostReceiver,
        Arc::new(|cx, operands| match operands.first() {
            Some(Value::Host(host)) => {
                let receiver = operands.get(1).cloned().unwrap_or(Value::Undefined);
                host.call(cx, receiver, &operands[2..])
            }
            _ => Err(fault("host-call on a non-host value")),
        }),
    )
    .with_filters(vec![ResultFilter::NullToUndefined])
}

fn link_host_construct() -> LinkedStrategy {
    LinkedStrategy::new(
        "host-construct",
        Guard::HostReceiver,
        Arc::new(|cx, operands| match operands.first() {
            Some(Value::Host(host)) => host.construct(cx, &operands[1..]),
            _ => Err(fault("host-construct on a non-host value")),
        }),
    )
    .with_filters(vec![ResultFilter::NullToUndefined])
}

fn link_host_typeof() -> LinkedStrategy {
    LinkedStrategy::new(
        "host-typeof",
        Guard::HostReceiver,
        Arc::new(|_cx, _operands| Ok(Value::str("object"))),
    )
}

fn host_and_name(operands: &[Value]) -> RuntimeResult<(Arc<dyn HostValue>, String)> {
    let host = match operands.first() {
        Some(Value::Host(host)) => host.clone(),
        _ => return Err(fault("expected a host receiver")),
    };
    let name = match operands.get(1) {
        Some(Value::Str(name)) => name.to_string(),
        _ => return Err(fault("expected a property name")),
    };
    Ok((host, name))
}

fn fault(message: &str) -> RuntimeError {
    RuntimeError::EngineFault {
        message: message.to_string(),
    }
}
