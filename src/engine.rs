use crate::compiler::fragment::Op;
use crate::compiler::{CompileError, CompiledFunction, Compiler};
use crate::language::errors::SyntaxErrors;
use crate::language::parser::parse_program;
use crate::runtime::builtins;
use crate::runtime::context::{ExecutionContext, TraceSink};
use crate::runtime::error::RuntimeError;
use crate::runtime::machine;
use crate::runtime::value::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Syntax(#[from] SyntaxErrors),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// The front door: parse, lower, compile, verify, run. Program units run
/// directly against the global scope, so successive evaluations on one
/// engine share state.
pub struct Engine {
    cx: ExecutionContext,
    compiler: Compiler,
}

impl Engine {
    pub fn new() -> Engine {
        let cx = ExecutionContext::new();
        builtins::install(&cx);
        Engine {
            cx,
            compiler: Compiler::new(),
        }
    }

    pub fn with_trace(sink: TraceSink) -> Engine {
        let mut cx = ExecutionContext::new();
        builtins::install(&cx);
        cx.set_trace(sink.clone());
        Engine {
            cx,
            compiler: Compiler::with_trace(sink),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.cx
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.cx
    }

    pub fn declare_global(&self, name: &str, value: Value) {
        self.cx.declare_global(name, value);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.cx.globals().lookup(name)
    }

    pub fn compile(&self, source: &str) -> Result<Arc<CompiledFunction>, EngineError> {
        let program = parse_program(source)?;
        Ok(self.compiler.compile_program(&program)?)
    }

    pub fn eval(&mut self, source: &str) -> Result<Value, EngineError> {
        let unit = self.compile(source)?;
        let globals = self.cx.globals().clone();
        Ok(machine::run(&mut self.cx, &globals, unit.fragment())?)
    }

    /// Disassembly of a source text's unit and every unit nested in it.
    pub fn disassemble(&self, source: &str) -> Result<String, EngineError> {
        let unit = self.compile(source)?;
        let mut out = String::new();
        let mut pending = vec![unit];
        while let Some(unit) = pending.pop() {
            out.push_str(&unit.fragment().disassemble(&unit.unit_name));
            for op in unit.fragment().ops() {
                if let Op::Closure(child) = op {
                    pending.push(child.clone());
                }
            }
        }
        Ok(out)
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}
