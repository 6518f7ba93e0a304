pub mod providers;
pub mod strategy;

use crate::runtime::context::ExecutionContext;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{RefBase, Value};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use strategy::LinkedStrategy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn strategy_name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Mod => "mod",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    pub fn strategy_name(self) -> &'static str {
        match self {
            RelOp::Lt => "lt",
            RelOp::Le => "le",
            RelOp::Gt => "gt",
            RelOp::Ge => "ge",
        }
    }
}

/// The operation a dynamic site performs. Operand conventions:
/// member ops take the reference first, calls take `[callee, receiver,
/// args..]`, construction takes `[callee, args..]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpKind {
    GetMember,
    SetMember,
    Call { argc: usize },
    Construct { argc: usize },
    Arith(ArithOp),
    Rel(RelOp),
    Increment,
    Decrement,
    TypeOf,
}

impl OpKind {
    /// How many operands the site consumes from the evaluation stack.
    pub fn arity(&self) -> usize {
        match self {
            OpKind::GetMember => 1,
            OpKind::SetMember => 2,
            OpKind::Call { argc } => argc + 2,
            OpKind::Construct { argc } => argc + 1,
            OpKind::Arith(_) | OpKind::Rel(_) => 2,
            OpKind::Increment | OpKind::Decrement | OpKind::TypeOf => 1,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::GetMember => write!(f, "get_member"),
            OpKind::SetMember => write!(f, "set_member"),
            OpKind::Call { argc } => write!(f, "call/{argc}"),
            OpKind::Construct { argc } => write!(f, "construct/{argc}"),
            OpKind::Arith(op) => write!(f, "{}", op.strategy_name()),
            OpKind::Rel(op) => write!(f, "{}", op.strategy_name()),
            OpKind::Increment => write!(f, "increment"),
            OpKind::Decrement => write!(f, "decrement"),
            OpKind::TypeOf => write!(f, "typeof"),
        }
    }
}

/// One dynamic dispatch point with a single-entry inline cache. The cached
/// strategy's guard is re-checked on every pass; a miss triggers a fresh
/// resolution and overwrites the cache, last writer wins.
pub struct CallSite {
    pub kind: OpKind,
    /// Whether the site was emitted inside strict code. Strictness also
    /// rides on every reference operand; the flag here describes the site.
    pub strict: bool,
    cache: RwLock<Option<Arc<LinkedStrategy>>>,
    resolutions: AtomicUsize,
}

impl CallSite {
    pub fn new(kind: OpKind, strict: bool) -> Arc<CallSite> {
        Arc::new(CallSite {
            kind,
            strict,
            cache: RwLock::new(None),
            resolutions: AtomicUsize::new(0),
        })
    }

    pub fn invoke(
        &self,
        cx: &mut ExecutionContext,
        operands: Vec<Value>,
    ) -> RuntimeResult<Value> {
        if let Some(strategy) = self.cached() {
            if strategy.guard.holds(&operands) {
                return strategy.invoke(cx, operands);
            }
        }
        let strategy = self.resolve(cx, &operands)?;
        if !strategy.guard.holds(&operands) {
            return Err(RuntimeError::EngineFault {
                message: format!(
                    "provider built strategy `{}` whose guard rejects its own operands",
                    strategy.name
                ),
            });
        }
        *self.cache.write().unwrap() = Some(strategy.clone());
        strategy.invoke(cx, operands)
    }

    fn resolve(
        &self,
        cx: &mut ExecutionContext,
        operands: &[Value],
    ) -> RuntimeResult<Arc<LinkedStrategy>> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let providers = cx.providers();
        for provider in providers.iter() {
            if provider.matches(&self.kind, operands) {
                if let Some(trace) = cx.trace() {
                    trace(&format!("link {} via {}", self.kind, provider.name()));
                }
                return Ok(Arc::new(provider.build(self, operands)));
            }
        }
        Err(unlinkable(&self.kind, operands))
    }

    pub fn cached(&self) -> Option<Arc<LinkedStrategy>> {
        self.cache.read().unwrap().clone()
    }

    /// How many resolutions this site has performed. One means the site
    /// stayed monomorphic.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("kind", &self.kind)
            .field("strict", &self.strict)
            .field("resolutions", &self.resolution_count())
            .finish()
    }
}

/// No provider accepted the operation; surface it as an ordinary language
/// error phrased for the operation at hand.
fn unlinkable(kind: &OpKind, operands: &[Value]) -> RuntimeError {
    let first = operands.first();
    match kind {
        OpKind::GetMember => RuntimeError::type_error(format!(
            "cannot read property {} of {}",
            ref_name(first),
            ref_base(first)
        )),
        OpKind::SetMember => RuntimeError::type_error(format!(
            "cannot set property {} of {}",
            ref_name(first),
            ref_base(first)
        )),
        OpKind::Call { .. } => {
            RuntimeError::type_error(format!("{} is not a function", describe(first)))
        }
        OpKind::Construct { .. } => {
            RuntimeError::type_error(format!("{} is not a constructor", describe(first)))
        }
        _ => {
            let shapes: Vec<String> = operands
                .iter()
                .map(|v| v.type_name().to_string())
                .collect();
            RuntimeError::type_error(format!(
                "cannot apply {} to operands of type {}",
                kind,
                shapes.join(", ")
            ))
        }
    }
}

fn ref_name(value: Option<&Value>) -> String {
    match value {
        Some(Value::Ref(r)) => format!("`{}`", r.name),
        _ => "<unknown>".to_string(),
    }
}

fn ref_base(value: Option<&Value>) -> String {
    match value {
        Some(Value::Ref(r)) => match &r.base {
            RefBase::Value(base) => base.type_name().to_string(),
            RefBase::Scope(_) => "the scope chain".to_string(),
        },
        Some(other) => other.type_name().to_string(),
        None => "<missing>".to_string(),
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.type_name().to_string(),
        None => "<missing>".to_string(),
    }
}
