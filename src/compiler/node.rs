use crate::compiler::fragment::{Fragment, Op};
use crate::compiler::CompiledFunction;
use crate::runtime::linker::CallSite;
use crate::runtime::value::Value;
use std::sync::Arc;

/// What the driver compiles: a named or anonymous body with its parameter
/// list and strictness, lowered from source before emission.
pub struct FunctionDefinition {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub strict: bool,
    pub body: Node,
}

/// An assignable place. Unqualified names address the scope chain;
/// properties address a receiver computed at run time.
pub enum Target {
    Var { name: String },
    Prop { object: Box<Node>, key: Box<Node> },
}

/// One lowered construct. Dynamic sites are allocated when the node is
/// built, so `fragment` is pure: every call emits the same ops around the
/// same shared sites.
pub enum Node {
    Empty,
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    /// Arithmetic or comparison through a dynamic site.
    Binary {
        site: Arc<CallSite>,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// Equality is emitted as a static op, not linked.
    Equality {
        strict: bool,
        negated: bool,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Not(Box<Node>),
    TypeOf {
        site: Arc<CallSite>,
        operand: Box<Node>,
    },
    VoidOf(Box<Node>),
    LogicalAnd {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    LogicalOr {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Conditional {
        cond: Box<Node>,
        then: Box<Node>,
        other: Box<Node>,
    },
    Assign {
        write: Arc<CallSite>,
        target: Target,
        strict: bool,
        value: Box<Node>,
    },
    /// `a ?= b`: one read, one apply, one write, through three sites.
    CompoundAssign {
        read: Arc<CallSite>,
        apply: Arc<CallSite>,
        write: Arc<CallSite>,
        target: Target,
        strict: bool,
        value: Box<Node>,
    },
    /// `++a` / `a--`: the postfix flavor leaves the pre-step value behind.
    Update {
        read: Arc<CallSite>,
        step: Arc<CallSite>,
        write: Arc<CallSite>,
        target: Target,
        strict: bool,
        prefix: bool,
    },
    Member {
        site: Arc<CallSite>,
        object: Box<Node>,
        key: Box<Node>,
        strict: bool,
    },
    /// A call whose callee is not a member expression; the receiver slot is
    /// filled with `undefined`.
    CallExpr {
        site: Arc<CallSite>,
        callee: Box<Node>,
        args: Vec<Node>,
    },
    /// `o.m(..)`: the receiver is evaluated once and threaded to the call.
    MethodCall {
        get: Arc<CallSite>,
        call: Arc<CallSite>,
        object: Box<Node>,
        key: Box<Node>,
        strict: bool,
        args: Vec<Node>,
    },
    Construct {
        site: Arc<CallSite>,
        callee: Box<Node>,
        args: Vec<Node>,
    },
    ObjectLiteral(Vec<(String, Node)>),
    ArrayLiteral(Vec<Node>),
    Closure(Arc<CompiledFunction>),
    ExprStmt(Box<Node>),
    PrintStmt(Box<Node>),
    VarDecl {
        name: String,
        init: Option<Box<Node>>,
    },
    Block(Vec<Node>),
    If {
        cond: Box<Node>,
        then: Box<Node>,
        other: Option<Box<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },
    DoWhile {
        body: Box<Node>,
        cond: Box<Node>,
    },
    For {
        init: Option<Box<Node>>,
        cond: Option<Box<Node>>,
        step: Option<Box<Node>>,
        body: Box<Node>,
    },
    ReturnStmt(Option<Box<Node>>),
    ThrowStmt(Box<Node>),
    FunctionDecl {
        name: String,
        unit: Arc<CompiledFunction>,
    },
}

impl Node {
    /// Emit this construct's ops. Pure and repeatable; composition happens
    /// by fragment concatenation, never by patching.
    pub fn fragment(&self) -> Fragment {
        let mut frag = Fragment::new();
        self.emit(&mut frag);
        frag
    }

    fn emit(&self, frag: &mut Fragment) {
        match self {
            Node::Empty => {}
            Node::Number(n) => frag.push(Op::Const(Value::Number(*n))),
            Node::Str(s) => frag.push(Op::Const(Value::str(s.clone()))),
            Node::Bool(b) => frag.push(Op::Const(Value::Bool(*b))),
            Node::Null => frag.push(Op::Const(Value::Null)),
            Node::Undefined => frag.push(Op::Const(Value::Undefined)),
            Node::Ident(name) => frag.push(Op::LoadVar(name.clone())),
            Node::Binary { site, lhs, rhs } => {
                lhs.emit(frag);
                rhs.emit(frag);
                frag.push(Op::Dynamic(site.clone()));
            }
            Node::Equality {
                strict,
                negated,
                lhs,
                rhs,
            } => {
                lhs.emit(frag);
                rhs.emit(frag);
                frag.push(Op::Eq {
                    strict: *strict,
                    negated: *negated,
                });
            }
            Node::Not(operand) => {
                operand.emit(frag);
                frag.push(Op::Not);
            }
            Node::TypeOf { site, operand } => {
                operand.emit(frag);
                frag.push(Op::Dynamic(site.clone()));
            }
            Node::VoidOf(operand) => {
                operand.emit(frag);
                frag.push(Op::Pop);
                frag.push(Op::Const(Value::Undefined));
            }
            Node::LogicalAnd { lhs, rhs } => emit_logical(frag, lhs, rhs, false),
            Node::LogicalOr { lhs, rhs } => emit_logical(frag, lhs, rhs, true),
            Node::Conditional { cond, then, other } => {
                let then_frag = then.fragment();
                let other_frag = other.fragment();
                cond.emit(frag);
                frag.push(Op::JumpIfFalse(then_frag.len() as i32 + 1));
                frag.append(then_frag);
                frag.push(Op::Jump(other_frag.len() as i32));
                frag.append(other_frag);
            }
            Node::Assign {
                write,
                target,
                strict,
                value,
            } => {
                emit_ref(frag, target, *strict);
                value.emit(frag);
                frag.push(Op::Dynamic(write.clone()));
            }
            Node::CompoundAssign {
                read,
                apply,
                write,
                target,
                strict,
                value,
            } => {
                emit_ref(frag, target, *strict);
                frag.push(Op::Dup);
                frag.push(Op::Dynamic(read.clone()));
                value.emit(frag);
                frag.push(Op::Dynamic(apply.clone()));
                frag.push(Op::Dynamic(write.clone()));
            }
            Node::Update {
                read,
                step,
                write,
                target,
                strict,
                prefix,
            } => {
                emit_ref(frag, target, *strict);
                frag.push(Op::Dup);
                frag.push(Op::Dynamic(read.clone()));
                if *prefix {
                    frag.push(Op::Dynamic(step.clone()));
                    frag.push(Op::Dynamic(write.clone()));
                } else {
                    // Keep the pre-step value below the write, then discard
                    // the write's result in its favor.
                    frag.push(Op::Dup);
                    frag.push(Op::Dynamic(step.clone()));
                    frag.push(Op::Rot);
                    frag.push(Op::Swap);
                    frag.push(Op::Dynamic(write.clone()));
                    frag.push(Op::Pop);
                }
            }
            Node::Member {
                site,
                object,
                key,
                strict,
            } => {
                object.emit(frag);
                key.emit(frag);
                frag.push(Op::RefProp { strict: *strict });
                frag.push(Op::Dynamic(site.clone()));
            }
            Node::CallExpr { site, callee, args } => {
                callee.emit(frag);
                frag.push(Op::Const(Value::Undefined));
                for arg in args {
                    arg.emit(frag);
                }
                frag.push(Op::Dynamic(site.clone()));
            }
            Node::MethodCall {
                get,
                call,
                object,
                key,
                strict,
                args,
            } => {
                object.emit(frag);
                frag.push(Op::Dup);
                key.emit(frag);
                frag.push(Op::RefProp { strict: *strict });
                frag.push(Op::Dynamic(get.clone()));
                frag.push(Op::Swap);
                for arg in args {
                    arg.emit(frag);
                }
                frag.push(Op::Dynamic(call.clone()));
            }
            Node::Construct { site, callee, args } => {
                callee.emit(frag);
                for arg in args {
                    arg.emit(frag);
                }
                frag.push(Op::Dynamic(site.clone()));
            }
            Node::ObjectLiteral(entries) => {
                for (key, value) in entries {
                    frag.push(Op::Const(Value::str(key.clone())));
                    value.emit(frag);
                }
                frag.push(Op::MakeObject(entries.len()));
            }
            Node::ArrayLiteral(elements) => {
                for element in elements {
                    element.emit(frag);
                }
                frag.push(Op::MakeArray(elements.len()));
            }
            Node::Closure(unit) => frag.push(Op::Closure(unit.clone())),
            Node::ExprStmt(expr) => {
                expr.emit(frag);
                frag.push(Op::Pop);
            }
            Node::PrintStmt(expr) => {
                expr.emit(frag);
                frag.push(Op::Print);
            }
            Node::VarDecl { name, init } => {
                match init {
                    Some(init) => init.emit(frag),
                    None => frag.push(Op::Const(Value::Undefined)),
                }
                frag.push(Op::Declare(name.clone()));
            }
            Node::Block(stmts) => {
                for stmt in stmts {
                    stmt.emit(frag);
                }
            }
            Node::If { cond, then, other } => {
                let then_frag = then.fragment();
                cond.emit(frag);
                match other {
                    Some(other) => {
                        let other_frag = other.fragment();
                        frag.push(Op::JumpIfFalse(then_frag.len() as i32 + 1));
                        frag.append(then_frag);
                        frag.push(Op::Jump(other_frag.len() as i32));
                        frag.append(other_frag);
                    }
                    None => {
                        frag.push(Op::JumpIfFalse(then_frag.len() as i32));
                        frag.append(then_frag);
                    }
                }
            }
            Node::While { cond, body } => {
                let cond_frag = cond.fragment();
                let body_frag = body.fragment();
                let c = cond_frag.len() as i32;
                let b = body_frag.len() as i32;
                frag.append(cond_frag);
                frag.push(Op::JumpIfFalse(b + 1));
                frag.append(body_frag);
                frag.push(Op::Jump(-(c + b + 2)));
            }
            Node::DoWhile { body, cond } => {
                let body_frag = body.fragment();
                let cond_frag = cond.fragment();
                let b = body_frag.len() as i32;
                let c = cond_frag.len() as i32;
                frag.append(body_frag);
                frag.append(cond_frag);
                frag.push(Op::JumpIfTrue(-(b + c + 1)));
            }
            Node::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    init.emit(frag);
                }
                let cond_frag = match cond {
                    Some(cond) => cond.fragment(),
                    None => Fragment::of(vec![Op::Const(Value::Bool(true))]),
                };
                let body_frag = body.fragment();
                let step_frag = match step {
                    Some(step) => step.fragment(),
                    None => Fragment::new(),
                };
                let c = cond_frag.len() as i32;
                let b = body_frag.len() as i32;
                let s = step_frag.len() as i32;
                frag.append(cond_frag);
                frag.push(Op::JumpIfFalse(b + s + 1));
                frag.append(body_frag);
                frag.append(step_frag);
                frag.push(Op::Jump(-(c + b + s + 2)));
            }
            Node::ReturnStmt(expr) => {
                match expr {
                    Some(expr) => expr.emit(frag),
                    None => frag.push(Op::Const(Value::Undefined)),
                }
                frag.push(Op::Return);
            }
            Node::ThrowStmt(expr) => {
                expr.emit(frag);
                frag.push(Op::Throw);
            }
            Node::FunctionDecl { name, unit } => {
                frag.push(Op::Closure(unit.clone()));
                frag.push(Op::Declare(name.clone()));
            }
        }
    }
}

fn emit_ref(frag: &mut Fragment, target: &Target, strict: bool) {
    match target {
        Target::Var { name } => frag.push(Op::RefVar {
            name: name.clone(),
            strict,
        }),
        Target::Prop { object, key } => {
            object.emit(frag);
            key.emit(frag);
            frag.push(Op::RefProp { strict });
        }
    }
}

fn emit_logical(frag: &mut Fragment, lhs: &Node, rhs: &Node, skip_if_true: bool) {
    let rhs_frag = rhs.fragment();
    lhs.emit(frag);
    frag.push(Op::Dup);
    let rel = rhs_frag.len() as i32 + 1;
    frag.push(if skip_if_true {
        Op::JumpIfTrue(rel)
    } else {
        Op::JumpIfFalse(rel)
    });
    frag.push(Op::Pop);
    frag.append(rhs_frag);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::linker::{ArithOp, OpKind};

    #[test]
    fn fragment_is_repeatable_and_shares_sites() {
        let node = Node::Binary {
            site: CallSite::new(OpKind::Arith(ArithOp::Add), false),
            lhs: Box::new(Node::Number(1.0)),
            rhs: Box::new(Node::Number(2.0)),
        };
        let a = node.fragment();
        let b = node.fragment();
        assert_eq!(a.len(), b.len());
        let site_of = |f: &Fragment| match &f.ops()[2] {
            Op::Dynamic(site) => site.clone(),
            _ => panic!("expected a dynamic op"),
        };
        assert!(Arc::ptr_eq(&site_of(&a), &site_of(&b)));
    }

    #[test]
    fn logical_or_skips_the_rhs() {
        let node = Node::LogicalOr {
            lhs: Box::new(Node::Bool(true)),
            rhs: Box::new(Node::Number(2.0)),
        };
        let frag = node.fragment();
        // lhs, dup, jump over [pop, rhs], pop, rhs
        assert_eq!(frag.len(), 5);
        assert!(matches!(frag.ops()[2], Op::JumpIfTrue(2)));
    }

    #[test]
    fn while_loop_jumps_back_to_the_condition() {
        let node = Node::While {
            cond: Box::new(Node::Bool(false)),
            body: Box::new(Node::ExprStmt(Box::new(Node::Number(1.0)))),
        };
        let frag = node.fragment();
        // cond(1), jump_if_false(3), body(2), jump(-5)
        assert_eq!(frag.len(), 5);
        assert!(matches!(frag.ops()[1], Op::JumpIfFalse(3)));
        assert!(matches!(frag.ops()[4], Op::Jump(-5)));
    }
}
