use crate::runtime::environment::Scope;
use crate::runtime::linker::providers::{default_providers, LinkProvider};
use crate::runtime::value::Value;
use std::sync::Arc;

/// Hook for observing engine activity (link decisions, disassembly). The
/// engine behaves identically with or without one installed.
pub type TraceSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Ambient state threaded through every evaluation: the global scope, the
/// ordered provider chain consulted at link time, and an optional trace
/// sink.
pub struct ExecutionContext {
    globals: Arc<Scope>,
    providers: Arc<Vec<Box<dyn LinkProvider>>>,
    trace: Option<TraceSink>,
}

impl ExecutionContext {
    pub fn new() -> ExecutionContext {
        ExecutionContext::with_providers(default_providers())
    }

    pub fn with_providers(providers: Vec<Box<dyn LinkProvider>>) -> ExecutionContext {
        let globals = Scope::root();
        globals.declare("undefined", Value::Undefined);
        ExecutionContext {
            globals,
            providers: Arc::new(providers),
            trace: None,
        }
    }

    pub fn globals(&self) -> &Arc<Scope> {
        &self.globals
    }

    pub fn providers(&self) -> Arc<Vec<Box<dyn LinkProvider>>> {
        self.providers.clone()
    }

    pub fn declare_global(&self, name: &str, value: Value) {
        self.globals.declare(name, value);
    }

    pub fn set_trace(&mut self, sink: TraceSink) {
        self.trace = Some(sink);
    }

    pub fn trace(&self) -> Option<TraceSink> {
        self.trace.clone()
    }
}

impl Default for ExecutionContext {
    fn default() -> ExecutionContext {
        ExecutionContext::new()
    }
}
