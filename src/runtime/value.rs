use crate::compiler::CompiledFunction;
use crate::runtime::context::ExecutionContext;
use crate::runtime::environment::Scope;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A runtime value. Values are shared across threads when a compiled unit is,
/// so every mutable payload sits behind a lock.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Object(Arc<DynObject>),
    Function(Arc<FunctionValue>),
    Native(Arc<NativeFunction>),
    Host(Arc<dyn HostValue>),
    /// Engine-side wrapper naming a read/write target; only ever an operand
    /// of member call sites, never the result of an expression.
    Ref(Arc<Reference>),
}

impl Value {
    pub fn str(text: impl Into<String>) -> Value {
        Value::Str(Arc::from(text.into().into_boxed_str()))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::Str(_)
        )
    }

    /// Engine-facing description, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Native(_) => "native function",
            Value::Host(_) => "host object",
            Value::Ref(_) => "reference",
        }
    }

    /// The language-level `typeof` string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Host(_) => "object",
            Value::Ref(_) => "reference",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Function(_) | Value::Native(_) | Value::Host(_) => true,
            Value::Ref(_) => true,
        }
    }

    /// ToNumber for primitives. Non-primitives are never coerced here; the
    /// numeric provider refuses to match them in the first place.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else if let Some(hex) = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    u64::from_str_radix(hex, 16)
                        .map(|v| v as f64)
                        .unwrap_or(f64::NAN)
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(f) => match &f.unit.display_name {
                Some(name) => format!("function {name}()"),
                None => "function ()".to_string(),
            },
            Value::Native(f) => format!("function {}()", f.name),
            Value::Host(h) => format!("[host {}]", h.host_type()),
            Value::Ref(r) => format!("[reference {}]", r.name),
        }
    }

    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Number(a), Value::Str(_)) => *a == other.to_number(),
            (Value::Str(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Value::Bool(_)) => self.loose_eq(&Value::Number(other.to_number())),
            _ => self.strict_eq(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Ref(r) => write!(f, "Ref({})", r.name),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// The engine's own dynamic-object representation: a bag of named properties.
pub struct DynObject {
    properties: Mutex<HashMap<String, Value>>,
}

impl DynObject {
    pub fn new() -> Arc<DynObject> {
        Arc::new(DynObject {
            properties: Mutex::new(HashMap::new()),
        })
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.properties.lock().unwrap().get(name).cloned()
    }

    pub fn put(&self, name: &str, value: Value) {
        self.properties
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.lock().unwrap().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.properties.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DynObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props = self.properties.lock().unwrap();
        let mut keys: Vec<&String> = props.keys().collect();
        keys.sort();
        f.debug_struct("DynObject").field("keys", &keys).finish()
    }
}

/// A compiled function bound to the lexical scope it was created in.
pub struct FunctionValue {
    pub unit: Arc<CompiledFunction>,
    pub scope: Arc<Scope>,
}

impl FunctionValue {
    pub fn call(&self, cx: &mut ExecutionContext, args: &[Value]) -> RuntimeResult<Value> {
        self.unit.call(cx, self.scope.clone(), args)
    }
}

type NativeImpl =
    Box<dyn Fn(&mut ExecutionContext, Value, &[Value]) -> RuntimeResult<Value> + Send + Sync>;

/// The built-in function contract: `(context, receiver, args) -> value`.
pub struct NativeFunction {
    pub name: String,
    body: NativeImpl,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, body: F) -> Arc<NativeFunction>
    where
        F: Fn(&mut ExecutionContext, Value, &[Value]) -> RuntimeResult<Value>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(NativeFunction {
            name: name.into(),
            body: Box::new(body),
        })
    }

    pub fn call(
        &self,
        cx: &mut ExecutionContext,
        receiver: Value,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        (self.body)(cx, receiver, args)
    }
}

/// A foreign value hosted outside the engine. The host-interop link provider
/// is the only component that talks to this trait.
pub trait HostValue: Send + Sync {
    /// Human-readable host-side type name, for diagnostics.
    fn host_type(&self) -> &str;

    /// Read a property. `None` means the host has no value; the linker
    /// translates that to the language's `undefined`.
    fn get(&self, name: &str) -> Option<Value>;

    fn set(&self, name: &str, _value: Value) -> RuntimeResult<()> {
        Err(RuntimeError::TypeError {
            message: format!("host {} does not accept property writes", self.host_type()),
        })
    }

    fn call(
        &self,
        _cx: &mut ExecutionContext,
        _receiver: Value,
        _args: &[Value],
    ) -> RuntimeResult<Value> {
        Err(RuntimeError::TypeError {
            message: format!("host {} is not callable", self.host_type()),
        })
    }

    fn construct(&self, _cx: &mut ExecutionContext, _args: &[Value]) -> RuntimeResult<Value> {
        Err(RuntimeError::TypeError {
            message: format!("host {} is not constructible", self.host_type()),
        })
    }
}

/// What a reference is anchored to: the lexical scope chain for unqualified
/// names, or a receiver value for property accesses.
#[derive(Clone)]
pub enum RefBase {
    Scope(Arc<Scope>),
    Value(Value),
}

pub struct Reference {
    pub base: RefBase,
    pub name: String,
    pub strict: bool,
}

impl Reference {
    pub fn scoped(scope: Arc<Scope>, name: impl Into<String>, strict: bool) -> Value {
        Value::Ref(Arc::new(Reference {
            base: RefBase::Scope(scope),
            name: name.into(),
            strict,
        }))
    }

    pub fn property(receiver: Value, name: impl Into<String>, strict: bool) -> Value {
        Value::Ref(Arc::new(Reference {
            base: RefBase::Value(receiver),
            name: name.into(),
            strict,
        }))
    }

    /// The dereferenced base, for handing receivers to property strategies.
    pub fn base_value(&self) -> Option<Value> {
        match &self.base {
            RefBase::Value(v) => Some(v.clone()),
            RefBase::Scope(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_number_follows_coercion_rules() {
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::str(" 42 ").to_number(), 42.0);
        assert_eq!(Value::str("0x10").to_number(), 16.0);
        assert_eq!(Value::str("").to_number(), 0.0);
        assert!(Value::str("pelican").to_number().is_nan());
    }

    #[test]
    fn number_formatting_drops_integral_fraction() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn loose_equality_bridges_domains() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::Number(1.0).loose_eq(&Value::str("1")));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Number(1.0).strict_eq(&Value::str("1")));
        let obj = DynObject::new();
        assert!(Value::Object(obj.clone()).strict_eq(&Value::Object(obj)));
    }

    #[test]
    fn typeof_strings() {
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Number(1.0).type_of(), "number");
        assert_eq!(Value::Object(DynObject::new()).type_of(), "object");
    }
}
