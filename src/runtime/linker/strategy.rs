use crate::runtime::context::ExecutionContext;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{RefBase, Value};
use std::fmt;
use std::sync::Arc;

/// The domain a runtime value belongs to, as the linker sees it. References
/// report the domain of their base so member guards can discriminate without
/// dereferencing twice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Domain {
    Undefined,
    Null,
    Boolean,
    Number,
    Text,
    Object,
    Function,
    Native,
    Host,
    ScopeRef,
    Ref(Box<Domain>),
}

impl Domain {
    pub fn of(value: &Value) -> Domain {
        match value {
            Value::Undefined => Domain::Undefined,
            Value::Null => Domain::Null,
            Value::Bool(_) => Domain::Boolean,
            Value::Number(_) => Domain::Number,
            Value::Str(_) => Domain::Text,
            Value::Object(_) => Domain::Object,
            Value::Function(_) => Domain::Function,
            Value::Native(_) => Domain::Native,
            Value::Host(_) => Domain::Host,
            Value::Ref(r) => match &r.base {
                RefBase::Scope(_) => Domain::ScopeRef,
                RefBase::Value(base) => Domain::Ref(Box::new(Domain::of(base))),
            },
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Domain::Undefined | Domain::Null | Domain::Boolean | Domain::Number | Domain::Text
        )
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Undefined => write!(f, "undefined"),
            Domain::Null => write!(f, "null"),
            Domain::Boolean => write!(f, "boolean"),
            Domain::Number => write!(f, "number"),
            Domain::Text => write!(f, "string"),
            Domain::Object => write!(f, "object"),
            Domain::Function => write!(f, "function"),
            Domain::Native => write!(f, "native function"),
            Domain::Host => write!(f, "host object"),
            Domain::ScopeRef => write!(f, "scope reference"),
            Domain::Ref(base) => write!(f, "reference to {base}"),
        }
    }
}

/// A cheap, pure predicate over the actual operands. Checked on every
/// invocation of a linked site; a failure is the relink trigger, never an
/// error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Guard {
    /// Operand 0 is a property reference based on an engine object.
    ObjectPropertyRef,
    /// Operand 0 is a reference into the lexical scope chain.
    ScopeRef,
    /// Operand 0 is a property reference based on a host value.
    HostPropertyRef,
    /// Operand 0 is a compiled function value.
    CompiledCallee,
    /// Operand 0 is a native (built-in) function.
    NativeCallee,
    /// Operand 0 is a host value.
    HostReceiver,
    /// Operand 0 is an engine object, compiled function, or native function.
    EngineReceiver,
    /// Every operand is primitive and none is textual.
    AllNumeric,
    /// Every operand is primitive and at least one is textual.
    SomeTextual,
    /// Every operand is primitive.
    AllPrimitive,
}

impl Guard {
    pub fn holds(&self, operands: &[Value]) -> bool {
        let first = || operands.first().map(Domain::of);
        match self {
            Guard::ObjectPropertyRef => {
                matches!(first(), Some(Domain::Ref(base)) if *base == Domain::Object)
            }
            Guard::ScopeRef => matches!(first(), Some(Domain::ScopeRef)),
            Guard::HostPropertyRef => {
                matches!(first(), Some(Domain::Ref(base)) if *base == Domain::Host)
            }
            Guard::CompiledCallee => matches!(first(), Some(Domain::Function)),
            Guard::NativeCallee => matches!(first(), Some(Domain::Native)),
            Guard::HostReceiver => matches!(first(), Some(Domain::Host)),
            Guard::EngineReceiver => matches!(
                first(),
                Some(Domain::Object | Domain::Function | Domain::Native)
            ),
            Guard::AllNumeric => operands.iter().all(|v| {
                let d = Domain::of(v);
                d.is_primitive() && d != Domain::Text
            }),
            Guard::SomeTextual => {
                operands.iter().all(|v| Domain::of(v).is_primitive())
                    && operands.iter().any(|v| Domain::of(v) == Domain::Text)
            }
            Guard::AllPrimitive => operands.iter().all(|v| Domain::of(v).is_primitive()),
        }
    }
}

/// One pure transform applied to the operand vector before the target runs.
/// The ordered adapter list replaces the original design's opaque bound
/// method-handle chain with something inspectable.
#[derive(Clone, Debug, PartialEq)]
pub enum Adapter {
    /// Rebuild the operand vector from the given indices (duplication and
    /// reordering allowed).
    Permute(Vec<usize>),
    /// Replace a property reference with its base value.
    DerefBase(usize),
    /// Replace a reference with its property name as a string value.
    RefName(usize),
    /// Replace a reference with its strictness flag as a boolean value.
    RefStrictness(usize),
    ToNumber(usize),
    ToText(usize),
}

impl Adapter {
    pub fn apply(&self, operands: &mut Vec<Value>) -> RuntimeResult<()> {
        match self {
            Adapter::Permute(indices) => {
                let mut next = Vec::with_capacity(indices.len());
                for &idx in indices {
                    let value = operands.get(idx).cloned().ok_or_else(|| {
                        RuntimeError::EngineFault {
                            message: format!("permute index {idx} out of range"),
                        }
                    })?;
                    next.push(value);
                }
                *operands = next;
                Ok(())
            }
            Adapter::DerefBase(idx) => with_ref(operands, *idx, |r| {
                r.base_value().ok_or_else(|| RuntimeError::EngineFault {
                    message: "dereferenced a scope reference".to_string(),
                })
            }),
            Adapter::RefName(idx) => with_ref(operands, *idx, |r| Ok(Value::str(r.name.clone()))),
            Adapter::RefStrictness(idx) => with_ref(operands, *idx, |r| Ok(Value::Bool(r.strict))),
            Adapter::ToNumber(idx) => {
                let value = operand(operands, *idx)?;
                operands[*idx] = Value::Number(value.to_number());
                Ok(())
            }
            Adapter::ToText(idx) => {
                let value = operand(operands, *idx)?;
                operands[*idx] = Value::str(value.to_text());
                Ok(())
            }
        }
    }
}

fn operand(operands: &[Value], idx: usize) -> RuntimeResult<Value> {
    operands
        .get(idx)
        .cloned()
        .ok_or_else(|| RuntimeError::EngineFault {
            message: format!("adapter index {idx} out of range"),
        })
}

fn with_ref(
    operands: &mut [Value],
    idx: usize,
    f: impl FnOnce(&crate::runtime::value::Reference) -> RuntimeResult<Value>,
) -> RuntimeResult<()> {
    let value = operands.get(idx).cloned().ok_or_else(|| {
        RuntimeError::EngineFault {
            message: format!("adapter index {idx} out of range"),
        }
    })?;
    match value {
        Value::Ref(r) => {
            operands[idx] = f(&r)?;
            Ok(())
        }
        other => Err(RuntimeError::EngineFault {
            message: format!("adapter expected a reference, found {}", other.type_name()),
        }),
    }
}

/// One pure transform applied to the target's result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultFilter {
    /// A host "no value" (surfaced as null) becomes the language's
    /// undefined; host null never leaks into script.
    NullToUndefined,
}

impl ResultFilter {
    pub fn apply(&self, value: Value) -> Value {
        match self {
            ResultFilter::NullToUndefined => match value {
                Value::Null => Value::Undefined,
                other => other,
            },
        }
    }
}

pub type TargetFn =
    Arc<dyn Fn(&mut ExecutionContext, Vec<Value>) -> RuntimeResult<Value> + Send + Sync>;

/// The cached result of one resolution: guard + adapter pipeline + target.
/// Valid for a set of operands iff the guard holds for them.
#[derive(Clone)]
pub struct LinkedStrategy {
    pub name: &'static str,
    pub guard: Guard,
    pub adapters: Vec<Adapter>,
    pub filters: Vec<ResultFilter>,
    target: TargetFn,
}

impl LinkedStrategy {
    pub fn new(name: &'static str, guard: Guard, target: TargetFn) -> LinkedStrategy {
        LinkedStrategy {
            name,
            guard,
            adapters: Vec::new(),
            filters: Vec::new(),
            target,
        }
    }

    pub fn with_adapters(mut self, adapters: Vec<Adapter>) -> LinkedStrategy {
        self.adapters = adapters;
        self
    }

    pub fn with_filters(mut self, filters: Vec<ResultFilter>) -> LinkedStrategy {
        self.filters = filters;
        self
    }

    pub fn invoke(
        &self,
        cx: &mut ExecutionContext,
        mut operands: Vec<Value>,
    ) -> RuntimeResult<Value> {
        for adapter in &self.adapters {
            adapter.apply(&mut operands)?;
        }
        let mut result = (self.target)(cx, operands)?;
        for filter in &self.filters {
            result = filter.apply(result);
        }
        Ok(result)
    }
}

impl fmt::Debug for LinkedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedStrategy")
            .field("name", &self.name)
            .field("guard", &self.guard)
            .field("adapters", &self.adapters)
            .field("filters", &self.filters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::{DynObject, Reference};

    #[test]
    fn permute_duplicates_and_reorders() {
        let mut operands = vec![Value::Number(1.0), Value::Number(2.0)];
        Adapter::Permute(vec![0, 1, 0]).apply(&mut operands).unwrap();
        assert_eq!(operands.len(), 3);
        assert!(matches!(operands[2], Value::Number(n) if n == 1.0));
    }

    #[test]
    fn deref_and_name_extract_from_references() {
        let obj = DynObject::new();
        let reference = Reference::property(Value::Object(obj.clone()), "x", true);
        let mut operands = vec![reference.clone(), reference];
        Adapter::DerefBase(0).apply(&mut operands).unwrap();
        Adapter::RefName(1).apply(&mut operands).unwrap();
        assert!(matches!(&operands[0], Value::Object(o) if Arc::ptr_eq(o, &obj)));
        assert!(matches!(&operands[1], Value::Str(s) if &**s == "x"));
    }

    #[test]
    fn strictness_filter_reads_the_flag() {
        let reference = Reference::property(Value::Object(DynObject::new()), "x", true);
        let mut operands = vec![reference];
        Adapter::RefStrictness(0).apply(&mut operands).unwrap();
        assert!(matches!(operands[0], Value::Bool(true)));
    }

    #[test]
    fn numeric_guards_split_on_textual_operands() {
        let nums = vec![Value::Number(2.0), Value::Number(3.0)];
        let mixed = vec![Value::str("a"), Value::Number(3.0)];
        assert!(Guard::AllNumeric.holds(&nums));
        assert!(!Guard::AllNumeric.holds(&mixed));
        assert!(Guard::SomeTextual.holds(&mixed));
        assert!(!Guard::SomeTextual.holds(&nums));
        assert!(!Guard::AllNumeric.holds(&[Value::Object(DynObject::new())]));
    }

    #[test]
    fn null_to_undefined_filter_never_leaks_null() {
        assert!(matches!(
            ResultFilter::NullToUndefined.apply(Value::Null),
            Value::Undefined
        ));
        assert!(matches!(
            ResultFilter::NullToUndefined.apply(Value::Number(1.0)),
            Value::Number(_)
        ));
    }
}
