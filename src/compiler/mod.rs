pub mod fragment;
pub mod node;

use crate::language::ast::{
    BinaryOp, Expr, LogicalOp, MemberKey, Program, Stmt, UnaryOp, UpdateOp,
};
use crate::runtime::context::{ExecutionContext, TraceSink};
use crate::runtime::environment::Scope;
use crate::runtime::error::RuntimeResult;
use crate::runtime::linker::{ArithOp, CallSite, OpKind, RelOp};
use crate::runtime::machine;
use crate::runtime::value::Value;
use fragment::Fragment;
use node::{FunctionDefinition, Node, Target};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Process-wide unit counter; every compiled unit gets a distinct name even
/// across engines.
static UNIT_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("{construct} is not supported")]
    UnsupportedConstruct { construct: String },
    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

fn unsupported(construct: &str) -> CompileError {
    CompileError::UnsupportedConstruct {
        construct: construct.to_string(),
    }
}

/// One verified, executable unit. Immutable once built; safe to call from
/// any number of function values closing over different scopes.
pub struct CompiledFunction {
    pub unit_id: u64,
    pub unit_name: String,
    /// The source-level name, when the function had one.
    pub display_name: Option<String>,
    pub params: Vec<String>,
    pub strict: bool,
    fragment: Fragment,
}

impl CompiledFunction {
    /// Bind arguments into a fresh scope under `scope` and run the body.
    /// Missing arguments bind as `undefined`; extras are dropped.
    pub fn call(
        &self,
        cx: &mut ExecutionContext,
        scope: Arc<Scope>,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let local = Scope::child(&scope);
        for (idx, param) in self.params.iter().enumerate() {
            local.declare(param, args.get(idx).cloned().unwrap_or(Value::Undefined));
        }
        machine::run(cx, &local, &self.fragment)
    }

    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }
}

impl std::fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("unit_name", &self.unit_name)
            .field("params", &self.params)
            .field("strict", &self.strict)
            .finish()
    }
}

/// Lowers construct trees and drives emission, verification, and unit
/// naming. Nested functions are compiled eagerly when their definition is
/// lowered.
pub struct Compiler {
    trace: Option<TraceSink>,
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler { trace: None }
    }

    pub fn with_trace(sink: TraceSink) -> Compiler {
        Compiler { trace: Some(sink) }
    }

    /// Compile a whole program as an anonymous parameterless unit.
    pub fn compile_program(&self, program: &Program) -> Result<Arc<CompiledFunction>, CompileError> {
        let strict = prologue_is_strict(&program.body);
        let body = self.lower_body(&program.body, strict)?;
        self.compile(&FunctionDefinition {
            name: None,
            params: Vec::new(),
            strict,
            body,
        })
    }

    pub fn compile(
        &self,
        def: &FunctionDefinition,
    ) -> Result<Arc<CompiledFunction>, CompileError> {
        let unit_id = UNIT_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        let unit_name = format!(
            "drift.gen.{}{}",
            def.name.as_deref().unwrap_or("Anonymous"),
            unit_id
        );
        let fragment = def.body.fragment();
        if let Some(trace) = &self.trace {
            trace(&fragment.disassemble(&unit_name));
        }
        let fragment = machine::load(fragment).map_err(|err| CompileError::Internal {
            message: format!("unit {unit_name} failed to load: {err}"),
        })?;
        Ok(Arc::new(CompiledFunction {
            unit_id,
            unit_name,
            display_name: def.name.clone(),
            params: def.params.clone(),
            strict: def.strict,
            fragment,
        }))
    }

    fn compile_function(
        &self,
        name: Option<&str>,
        params: &[String],
        body: &[Stmt],
        enclosing_strict: bool,
    ) -> Result<Arc<CompiledFunction>, CompileError> {
        let strict = enclosing_strict || prologue_is_strict(body);
        let lowered = self.lower_body(body, strict)?;
        self.compile(&FunctionDefinition {
            name: name.map(str::to_string),
            params: params.to_vec(),
            strict,
            body: lowered,
        })
    }

    fn lower_body(&self, body: &[Stmt], strict: bool) -> Result<Node, CompileError> {
        let mut stmts = Vec::with_capacity(body.len());
        for stmt in body {
            stmts.push(self.lower_stmt(stmt, strict)?);
        }
        Ok(Node::Block(stmts))
    }

    fn lower_stmt(&self, stmt: &Stmt, strict: bool) -> Result<Node, CompileError> {
        match stmt {
            Stmt::Empty => Ok(Node::Empty),
            Stmt::Expr(expr) => Ok(Node::ExprStmt(Box::new(self.lower_expr(expr, strict)?))),
            Stmt::Print(expr) => Ok(Node::PrintStmt(Box::new(self.lower_expr(expr, strict)?))),
            Stmt::Var { name, init } => Ok(Node::VarDecl {
                name: name.clone(),
                init: match init {
                    Some(init) => Some(Box::new(self.lower_expr(init, strict)?)),
                    None => None,
                },
            }),
            Stmt::Block(body) => Ok(self.lower_body(body, strict)?),
            Stmt::If { cond, then, els } => Ok(Node::If {
                cond: Box::new(self.lower_expr(cond, strict)?),
                then: Box::new(self.lower_stmt(then, strict)?),
                other: match els {
                    Some(els) => Some(Box::new(self.lower_stmt(els, strict)?)),
                    None => None,
                },
            }),
            Stmt::While { cond, body } => Ok(Node::While {
                cond: Box::new(self.lower_expr(cond, strict)?),
                body: Box::new(self.lower_stmt(body, strict)?),
            }),
            Stmt::DoWhile { body, cond } => Ok(Node::DoWhile {
                body: Box::new(self.lower_stmt(body, strict)?),
                cond: Box::new(self.lower_expr(cond, strict)?),
            }),
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => Ok(Node::For {
                init: match init {
                    Some(init) => Some(Box::new(self.lower_stmt(init, strict)?)),
                    None => None,
                },
                cond: match cond {
                    Some(cond) => Some(Box::new(self.lower_expr(cond, strict)?)),
                    None => None,
                },
                step: match step {
                    Some(step) => Some(Box::new(Node::ExprStmt(Box::new(
                        self.lower_expr(step, strict)?,
                    )))),
                    None => None,
                },
                body: Box::new(self.lower_stmt(body, strict)?),
            }),
            Stmt::Return(expr) => Ok(Node::ReturnStmt(match expr {
                Some(expr) => Some(Box::new(self.lower_expr(expr, strict)?)),
                None => None,
            })),
            Stmt::Throw(expr) => Ok(Node::ThrowStmt(Box::new(self.lower_expr(expr, strict)?))),
            Stmt::FunctionDecl { name, params, body } => Ok(Node::FunctionDecl {
                name: name.clone(),
                unit: self.compile_function(Some(name), params, body, strict)?,
            }),
            Stmt::ForIn { .. } => Err(unsupported("for-in")),
            Stmt::Break(_) => Err(unsupported("break")),
            Stmt::Continue(_) => Err(unsupported("continue")),
            Stmt::Switch { .. } => Err(unsupported("switch")),
            Stmt::Try { .. } => Err(unsupported("try")),
            Stmt::With { .. } => Err(unsupported("with")),
            Stmt::Labelled { .. } => Err(unsupported("labelled statement")),
        }
    }

    fn lower_expr(&self, expr: &Expr, strict: bool) -> Result<Node, CompileError> {
        match expr {
            Expr::Number { value, .. } => Ok(Node::Number(*value)),
            Expr::Str(s) => Ok(Node::Str(s.clone())),
            Expr::Bool(b) => Ok(Node::Bool(*b)),
            Expr::Null => Ok(Node::Null),
            Expr::Ident(name) if name == "undefined" => Ok(Node::Undefined),
            Expr::Ident(name) => Ok(Node::Ident(name.clone())),
            Expr::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs, strict),
            Expr::Logical { op, lhs, rhs } => {
                let lhs = Box::new(self.lower_expr(lhs, strict)?);
                let rhs = Box::new(self.lower_expr(rhs, strict)?);
                Ok(match op {
                    LogicalOp::And => Node::LogicalAnd { lhs, rhs },
                    LogicalOp::Or => Node::LogicalOr { lhs, rhs },
                })
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => Ok(Node::Not(Box::new(self.lower_expr(operand, strict)?))),
                UnaryOp::TypeOf => Ok(Node::TypeOf {
                    site: CallSite::new(OpKind::TypeOf, strict),
                    operand: Box::new(self.lower_expr(operand, strict)?),
                }),
                UnaryOp::Void => Ok(Node::VoidOf(Box::new(self.lower_expr(operand, strict)?))),
                UnaryOp::Delete => Err(unsupported("delete")),
                UnaryOp::Plus => Err(unsupported("unary plus")),
                UnaryOp::Minus => Err(unsupported("unary negation")),
                UnaryOp::BitNot => Err(unsupported("bitwise not")),
            },
            Expr::Update { op, prefix, target } => Ok(Node::Update {
                read: CallSite::new(OpKind::GetMember, strict),
                step: CallSite::new(
                    match op {
                        UpdateOp::Increment => OpKind::Increment,
                        UpdateOp::Decrement => OpKind::Decrement,
                    },
                    strict,
                ),
                write: CallSite::new(OpKind::SetMember, strict),
                target: self.lower_target(target, strict)?,
                strict,
                prefix: *prefix,
            }),
            Expr::Conditional { cond, then, els } => Ok(Node::Conditional {
                cond: Box::new(self.lower_expr(cond, strict)?),
                then: Box::new(self.lower_expr(then, strict)?),
                other: Box::new(self.lower_expr(els, strict)?),
            }),
            Expr::Assign { op, target, value } => {
                let target = self.lower_target(target, strict)?;
                let value = Box::new(self.lower_expr(value, strict)?);
                match op {
                    None => Ok(Node::Assign {
                        write: CallSite::new(OpKind::SetMember, strict),
                        target,
                        strict,
                        value,
                    }),
                    Some(op) => {
                        let arith = arith_op(*op).ok_or_else(|| {
                            CompileError::Internal {
                                message: "non-arithmetic compound assignment".to_string(),
                            }
                        })?;
                        Ok(Node::CompoundAssign {
                            read: CallSite::new(OpKind::GetMember, strict),
                            apply: CallSite::new(OpKind::Arith(arith), strict),
                            write: CallSite::new(OpKind::SetMember, strict),
                            target,
                            strict,
                            value,
                        })
                    }
                }
            }
            Expr::Call { callee, args } => {
                let args = self.lower_args(args, strict)?;
                match &**callee {
                    Expr::Member { object, property } => Ok(Node::MethodCall {
                        get: CallSite::new(OpKind::GetMember, strict),
                        call: CallSite::new(OpKind::Call { argc: args.len() }, strict),
                        object: Box::new(self.lower_expr(object, strict)?),
                        key: Box::new(self.lower_key(property, strict)?),
                        strict,
                        args,
                    }),
                    other => Ok(Node::CallExpr {
                        site: CallSite::new(OpKind::Call { argc: args.len() }, strict),
                        callee: Box::new(self.lower_expr(other, strict)?),
                        args,
                    }),
                }
            }
            Expr::New { callee, args } => {
                let args = self.lower_args(args, strict)?;
                Ok(Node::Construct {
                    site: CallSite::new(OpKind::Construct { argc: args.len() }, strict),
                    callee: Box::new(self.lower_expr(callee, strict)?),
                    args,
                })
            }
            Expr::Member { object, property } => Ok(Node::Member {
                site: CallSite::new(OpKind::GetMember, strict),
                object: Box::new(self.lower_expr(object, strict)?),
                key: Box::new(self.lower_key(property, strict)?),
                strict,
            }),
            Expr::ObjectLiteral(entries) => {
                let mut lowered = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    lowered.push((key.clone(), self.lower_expr(value, strict)?));
                }
                Ok(Node::ObjectLiteral(lowered))
            }
            Expr::ArrayLiteral(elements) => {
                let mut lowered = Vec::with_capacity(elements.len());
                for element in elements {
                    lowered.push(self.lower_expr(element, strict)?);
                }
                Ok(Node::ArrayLiteral(lowered))
            }
            Expr::Function { name, params, body } => Ok(Node::Closure(self.compile_function(
                name.as_deref(),
                params,
                body,
                strict,
            )?)),
            Expr::This => Err(unsupported("this")),
            Expr::Regex(_) => Err(unsupported("regex literal")),
            Expr::Sequence(_) => Err(unsupported("comma expression")),
        }
    }

    fn lower_binary(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        strict: bool,
    ) -> Result<Node, CompileError> {
        let lhs = Box::new(self.lower_expr(lhs, strict)?);
        let rhs = Box::new(self.lower_expr(rhs, strict)?);
        if let Some(arith) = arith_op(op) {
            return Ok(Node::Binary {
                site: CallSite::new(OpKind::Arith(arith), strict),
                lhs,
                rhs,
            });
        }
        if let Some(rel) = rel_op(op) {
            return Ok(Node::Binary {
                site: CallSite::new(OpKind::Rel(rel), strict),
                lhs,
                rhs,
            });
        }
        match op {
            BinaryOp::Eq => Ok(Node::Equality {
                strict: false,
                negated: false,
                lhs,
                rhs,
            }),
            BinaryOp::Ne => Ok(Node::Equality {
                strict: false,
                negated: true,
                lhs,
                rhs,
            }),
            BinaryOp::StrictEq => Ok(Node::Equality {
                strict: true,
                negated: false,
                lhs,
                rhs,
            }),
            BinaryOp::StrictNe => Ok(Node::Equality {
                strict: true,
                negated: true,
                lhs,
                rhs,
            }),
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => Err(unsupported("bitwise shift")),
            BinaryOp::BitAnd => Err(unsupported("bitwise and")),
            BinaryOp::BitOr => Err(unsupported("bitwise or")),
            BinaryOp::BitXor => Err(unsupported("bitwise xor")),
            BinaryOp::In => Err(unsupported("the in operator")),
            BinaryOp::InstanceOf => Err(unsupported("instanceof")),
            _ => Err(CompileError::Internal {
                message: "unclassified binary operator".to_string(),
            }),
        }
    }

    fn lower_target(&self, expr: &Expr, strict: bool) -> Result<Target, CompileError> {
        match expr {
            Expr::Ident(name) => Ok(Target::Var { name: name.clone() }),
            Expr::Member { object, property } => Ok(Target::Prop {
                object: Box::new(self.lower_expr(object, strict)?),
                key: Box::new(self.lower_key(property, strict)?),
            }),
            _ => Err(unsupported("assignment to a non-reference expression")),
        }
    }

    fn lower_key(&self, key: &MemberKey, strict: bool) -> Result<Node, CompileError> {
        match key {
            MemberKey::Field(name) => Ok(Node::Str(name.clone())),
            MemberKey::Index(expr) => self.lower_expr(expr, strict),
        }
    }

    fn lower_args(&self, args: &[Expr], strict: bool) -> Result<Vec<Node>, CompileError> {
        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            lowered.push(self.lower_expr(arg, strict)?);
        }
        Ok(lowered)
    }
}

impl Default for Compiler {
    fn default() -> Compiler {
        Compiler::new()
    }
}

/// A body whose first statement is the string expression `"use strict"`
/// opts the whole unit into strict reference semantics.
fn prologue_is_strict(body: &[Stmt]) -> bool {
    matches!(body.first(), Some(Stmt::Expr(Expr::Str(s))) if s == "use strict")
}

fn arith_op(op: BinaryOp) -> Option<ArithOp> {
    match op {
        BinaryOp::Add => Some(ArithOp::Add),
        BinaryOp::Sub => Some(ArithOp::Sub),
        BinaryOp::Mul => Some(ArithOp::Mul),
        BinaryOp::Div => Some(ArithOp::Div),
        BinaryOp::Mod => Some(ArithOp::Mod),
        _ => None,
    }
}

fn rel_op(op: BinaryOp) -> Option<RelOp> {
    match op {
        BinaryOp::Lt => Some(RelOp::Lt),
        BinaryOp::Le => Some(RelOp::Le),
        BinaryOp::Gt => Some(RelOp::Gt),
        BinaryOp::Ge => Some(RelOp::Ge),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_program;

    fn compile_src(src: &str) -> Result<Arc<CompiledFunction>, CompileError> {
        let program = parse_program(src).unwrap();
        Compiler::new().compile_program(&program)
    }

    #[test]
    fn unit_names_are_unique_across_compiles() {
        let program = parse_program("var x = 1;").unwrap();
        let compiler = Compiler::new();
        let a = compiler.compile_program(&program).unwrap();
        let b = compiler.compile_program(&program).unwrap();
        assert_ne!(a.unit_name, b.unit_name);
        assert!(a.unit_name.starts_with("drift.gen.Anonymous"));
    }

    #[test]
    fn recompiling_yields_equivalent_fragments() {
        let program = parse_program("var x = 1 + 2; print x;").unwrap();
        let compiler = Compiler::new();
        let a = compiler.compile_program(&program).unwrap();
        let b = compiler.compile_program(&program).unwrap();
        assert_eq!(a.fragment().len(), b.fragment().len());
    }

    #[test]
    fn named_functions_keep_their_display_name() {
        use crate::compiler::fragment::Op;
        let unit = compile_src("function fib(n) { return n; }").unwrap();
        assert!(unit.display_name.is_none());
        let child = unit
            .fragment()
            .ops()
            .iter()
            .find_map(|op| match op {
                Op::Closure(child) => Some(child.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(child.display_name.as_deref(), Some("fib"));
        assert!(child.unit_name.starts_with("drift.gen.fib"));
        assert_eq!(child.params, vec!["n".to_string()]);
    }

    #[test]
    fn unsupported_constructs_are_rejected_by_name() {
        let err = compile_src("switch (x) { }").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedConstruct {
                construct: "switch".to_string()
            }
        );
        let err = compile_src("1 << 2;").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedConstruct {
                construct: "bitwise shift".to_string()
            }
        );
    }

    #[test]
    fn strict_prologue_is_detected() {
        let unit = compile_src("\"use strict\"; var x = 1;").unwrap();
        assert!(unit.strict);
        let unit = compile_src("var x = 1;").unwrap();
        assert!(!unit.strict);
    }
}
