use crate::compiler::CompiledFunction;
use crate::runtime::linker::CallSite;
use crate::runtime::value::Value;
use std::fmt;
use std::sync::Arc;

/// One instruction of emitted program logic. Jumps are relative to the
/// instruction that follows them, so fragments can be concatenated freely
/// without patching targets.
#[derive(Clone)]
pub enum Op {
    Const(Value),
    /// Read an identifier from the current scope chain.
    LoadVar(String),
    /// Pop a value and introduce it as a binding in the current scope.
    Declare(String),
    /// Push a reference to an identifier in the current scope chain.
    RefVar { name: String, strict: bool },
    /// Pop a property key, then a receiver; push a property reference.
    RefProp { strict: bool },
    Pop,
    Dup,
    /// Swap the two topmost values.
    Swap,
    /// Rotate the three topmost values: a b c -> b c a (c on top before).
    Rot,
    Jump(i32),
    JumpIfTrue(i32),
    JumpIfFalse(i32),
    /// Equality is compiled statically, not linked (as in the original
    /// engine's equals statements).
    Eq { strict: bool, negated: bool },
    Not,
    Print,
    Return,
    Throw,
    /// Pop `n` key/value pairs (key below value) and push a fresh object.
    MakeObject(usize),
    /// Pop `n` elements and push a fresh array-shaped object.
    MakeArray(usize),
    /// Push a function value closing over the current scope.
    Closure(Arc<CompiledFunction>),
    /// Consult a dynamic call site with the topmost operands.
    Dynamic(Arc<CallSite>),
}

impl Op {
    /// (pops, pushes) for the verifier.
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Op::Const(_) | Op::LoadVar(_) | Op::RefVar { .. } | Op::Closure(_) => (0, 1),
            Op::Declare(_) | Op::Pop | Op::Print => (1, 0),
            Op::RefProp { .. } => (2, 1),
            Op::Dup => (1, 2),
            Op::Swap => (2, 2),
            Op::Rot => (3, 3),
            Op::Jump(_) => (0, 0),
            Op::JumpIfTrue(_) | Op::JumpIfFalse(_) => (1, 0),
            Op::Eq { .. } => (2, 1),
            Op::Not => (1, 1),
            Op::Return | Op::Throw => (1, 0),
            Op::MakeObject(n) => (2 * n, 1),
            Op::MakeArray(n) => (*n, 1),
            Op::Dynamic(site) => (site.kind.arity(), 1),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Op::Return | Op::Throw)
    }

    pub fn jump_offset(&self) -> Option<i32> {
        match self {
            Op::Jump(rel) | Op::JumpIfTrue(rel) | Op::JumpIfFalse(rel) => Some(*rel),
            _ => None,
        }
    }

    /// Unconditional jumps have no fall-through successor.
    pub fn falls_through(&self) -> bool {
        !matches!(self, Op::Jump(_)) && !self.is_terminal()
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Const(v) => write!(f, "const {v:?}"),
            Op::LoadVar(name) => write!(f, "load {name}"),
            Op::Declare(name) => write!(f, "declare {name}"),
            Op::RefVar { name, strict } => {
                write!(f, "ref_var {name}{}", if *strict { " strict" } else { "" })
            }
            Op::RefProp { strict } => {
                write!(f, "ref_prop{}", if *strict { " strict" } else { "" })
            }
            Op::Pop => write!(f, "pop"),
            Op::Dup => write!(f, "dup"),
            Op::Swap => write!(f, "swap"),
            Op::Rot => write!(f, "rot"),
            Op::Jump(rel) => write!(f, "jump {rel:+}"),
            Op::JumpIfTrue(rel) => write!(f, "jump_if_true {rel:+}"),
            Op::JumpIfFalse(rel) => write!(f, "jump_if_false {rel:+}"),
            Op::Eq { strict, negated } => write!(
                f,
                "{}{}",
                if *negated { "ne" } else { "eq" },
                if *strict { " strict" } else { "" }
            ),
            Op::Not => write!(f, "not"),
            Op::Print => write!(f, "print"),
            Op::Return => write!(f, "return"),
            Op::Throw => write!(f, "throw"),
            Op::MakeObject(n) => write!(f, "make_object {n}"),
            Op::MakeArray(n) => write!(f, "make_array {n}"),
            Op::Closure(unit) => write!(f, "closure {}", unit.unit_name),
            Op::Dynamic(site) => write!(f, "dynamic {}", site.kind),
        }
    }
}

/// A composable unit of emitted logic. Immutable once handed to the driver;
/// composition is append-only and preserves evaluation order.
#[derive(Clone, Default)]
pub struct Fragment {
    ops: Vec<Op>,
}

impl Fragment {
    pub fn new() -> Fragment {
        Fragment { ops: Vec::new() }
    }

    pub fn of(ops: Vec<Op>) -> Fragment {
        Fragment { ops }
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Concatenate another fragment after this one. The appended fragment's
    /// effects happen strictly after this fragment's effects.
    pub fn append(&mut self, other: Fragment) {
        self.ops.extend(other.ops);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn disassemble(&self, unit_name: &str) -> String {
        let mut out = format!("unit {unit_name} ({} ops)\n", self.ops.len());
        for (idx, op) in self.ops.iter().enumerate() {
            out.push_str(&format!("  {idx:4}  {op}\n"));
        }
        out
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fragment({} ops)", self.ops.len())
    }
}
