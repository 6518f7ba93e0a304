use crate::compiler::fragment::{Fragment, Op};
use crate::compiler::node::{FunctionDefinition, Node};
use crate::compiler::Compiler;
use crate::engine::Engine;
use crate::runtime::context::ExecutionContext;
use crate::runtime::error::RuntimeError;
use crate::runtime::linker::{ArithOp, CallSite, OpKind};
use crate::runtime::machine;
use crate::runtime::value::{DynObject, HostValue, NativeFunction, Value};
use std::sync::{Arc, Mutex};
use std::thread;

fn add_unit(site: Arc<CallSite>) -> Arc<crate::compiler::CompiledFunction> {
    binary_unit(site, "add")
}

fn binary_unit(site: Arc<CallSite>, name: &str) -> Arc<crate::compiler::CompiledFunction> {
    let def = FunctionDefinition {
        name: Some(name.to_string()),
        params: vec!["a".to_string(), "b".to_string()],
        strict: false,
        body: Node::ReturnStmt(Some(Box::new(Node::Binary {
            site,
            lhs: Box::new(Node::Ident("a".to_string())),
            rhs: Box::new(Node::Ident("b".to_string())),
        }))),
    };
    Compiler::new().compile(&def).unwrap()
}

#[test]
fn sites_resolve_lazily_on_first_reach() {
    let site = CallSite::new(OpKind::Arith(ArithOp::Add), false);
    let unit = add_unit(site.clone());
    assert_eq!(site.resolution_count(), 0);
    assert!(site.cached().is_none());
    let mut cx = ExecutionContext::new();
    let scope = cx.globals().clone();
    unit.call(&mut cx, scope, &[Value::Number(2.0), Value::Number(3.0)])
        .unwrap();
    assert_eq!(site.resolution_count(), 1);
    assert!(site.cached().is_some());
}

#[test]
fn a_monomorphic_site_resolves_exactly_once() {
    let site = CallSite::new(OpKind::Arith(ArithOp::Add), false);
    let unit = add_unit(site.clone());
    let mut cx = ExecutionContext::new();
    let scope = cx.globals().clone();
    for i in 0..50 {
        let result = unit
            .call(
                &mut cx,
                scope.clone(),
                &[Value::Number(i as f64), Value::Number(3.0)],
            )
            .unwrap();
        assert!(matches!(result, Value::Number(n) if n == i as f64 + 3.0));
    }
    assert_eq!(site.resolution_count(), 1);
}

#[test]
fn alternating_operand_shapes_relink_each_time() {
    let site = CallSite::new(OpKind::Arith(ArithOp::Add), false);
    let unit = add_unit(site.clone());
    let mut cx = ExecutionContext::new();
    let scope = cx.globals().clone();

    let numeric = unit
        .call(&mut cx, scope.clone(), &[Value::Number(2.0), Value::Number(3.0)])
        .unwrap();
    assert!(matches!(numeric, Value::Number(n) if n == 5.0));

    let textual = unit
        .call(&mut cx, scope.clone(), &[Value::str("a"), Value::Number(3.0)])
        .unwrap();
    assert!(matches!(textual, Value::Str(ref s) if &**s == "a3"));

    let numeric = unit
        .call(&mut cx, scope.clone(), &[Value::Number(1.0), Value::Number(1.0)])
        .unwrap();
    assert!(matches!(numeric, Value::Number(n) if n == 2.0));

    let textual = unit
        .call(&mut cx, scope.clone(), &[Value::Number(1.0), Value::str("!")])
        .unwrap();
    assert!(matches!(textual, Value::Str(ref s) if &**s == "1!"));
    assert_eq!(site.resolution_count(), 4);
}

#[test]
fn subtraction_keeps_one_strategy_across_operand_shapes() {
    // Only addition splits on text; a sub site numerifies textual operands
    // under the strategy it already holds.
    let site = CallSite::new(OpKind::Arith(ArithOp::Sub), false);
    let unit = binary_unit(site.clone(), "sub");
    let mut cx = ExecutionContext::new();
    let scope = cx.globals().clone();

    let numeric = unit
        .call(&mut cx, scope.clone(), &[Value::Number(5.0), Value::Number(2.0)])
        .unwrap();
    assert!(matches!(numeric, Value::Number(n) if n == 3.0));

    let coerced = unit
        .call(&mut cx, scope.clone(), &[Value::str("10"), Value::Number(4.0)])
        .unwrap();
    assert!(matches!(coerced, Value::Number(n) if n == 6.0));
    assert_eq!(site.resolution_count(), 1);
}

#[test]
fn a_failed_resolution_does_not_poison_the_site() {
    let site = CallSite::new(OpKind::Arith(ArithOp::Add), false);
    let unit = add_unit(site.clone());
    let mut cx = ExecutionContext::new();
    let scope = cx.globals().clone();

    let err = unit
        .call(
            &mut cx,
            scope.clone(),
            &[Value::Object(DynObject::new()), Value::Number(1.0)],
        )
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TypeError { .. }));
    assert!(site.cached().is_none());

    let ok = unit
        .call(&mut cx, scope, &[Value::Number(2.0), Value::Number(3.0)])
        .unwrap();
    assert!(matches!(ok, Value::Number(n) if n == 5.0));
}

struct NamedHost(&'static str);

impl HostValue for NamedHost {
    fn host_type(&self) -> &str {
        "NamedHost"
    }

    fn get(&self, name: &str) -> Option<Value> {
        (name == "x").then(|| Value::str(self.0))
    }
}

#[test]
fn member_sites_relink_between_engine_and_host_receivers() {
    let site = CallSite::new(OpKind::GetMember, false);
    let def = FunctionDefinition {
        name: Some("getx".to_string()),
        params: vec!["o".to_string()],
        strict: false,
        body: Node::ReturnStmt(Some(Box::new(Node::Member {
            site: site.clone(),
            object: Box::new(Node::Ident("o".to_string())),
            key: Box::new(Node::Str("x".to_string())),
            strict: false,
        }))),
    };
    let unit = Compiler::new().compile(&def).unwrap();
    let mut cx = ExecutionContext::new();
    let scope = cx.globals().clone();

    let first = DynObject::new();
    first.put("x", Value::Number(1.0));
    let second = DynObject::new();
    second.put("x", Value::Number(2.0));

    unit.call(&mut cx, scope.clone(), &[Value::Object(first)]).unwrap();
    unit.call(&mut cx, scope.clone(), &[Value::Object(second)]).unwrap();
    // Distinct objects, same shape: the cached strategy still applies.
    assert_eq!(site.resolution_count(), 1);

    let host = unit
        .call(&mut cx, scope, &[Value::Host(Arc::new(NamedHost("h")))])
        .unwrap();
    assert!(matches!(host, Value::Str(ref s) if &**s == "h"));
    assert_eq!(site.resolution_count(), 2);
}

#[test]
fn appended_fragments_execute_strictly_in_order() {
    let recorded: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();
    let recorder = NativeFunction::new("rec", move |_cx, _receiver, args| {
        if let Some(Value::Number(n)) = args.first() {
            sink.lock().unwrap().push(*n);
        }
        Ok(Value::Undefined)
    });

    let call = |n: f64| Node::ExprStmt(Box::new(Node::CallExpr {
        site: CallSite::new(OpKind::Call { argc: 1 }, false),
        callee: Box::new(Node::Ident("rec".to_string())),
        args: vec![Node::Number(n)],
    }));

    let mut frag = call(1.0).fragment();
    frag.append(call(2.0).fragment());
    frag.append(call(3.0).fragment());
    let frag = machine::load(frag).unwrap();

    let mut cx = ExecutionContext::new();
    cx.declare_global("rec", Value::Native(recorder));
    let scope = cx.globals().clone();
    machine::run(&mut cx, &scope, &frag).unwrap();

    assert_eq!(*recorded.lock().unwrap(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn concurrent_callers_agree_on_results_while_racing_the_cache() {
    let site = CallSite::new(OpKind::Arith(ArithOp::Add), false);
    let unit = add_unit(site.clone());

    let mut handles = Vec::new();
    for t in 0..4 {
        let unit = unit.clone();
        handles.push(thread::spawn(move || {
            let mut cx = ExecutionContext::new();
            let scope = cx.globals().clone();
            for i in 0..200 {
                if (t + i) % 2 == 0 {
                    let r = unit
                        .call(
                            &mut cx,
                            scope.clone(),
                            &[Value::Number(i as f64), Value::Number(1.0)],
                        )
                        .unwrap();
                    assert!(matches!(r, Value::Number(n) if n == i as f64 + 1.0));
                } else {
                    let r = unit
                        .call(&mut cx, scope.clone(), &[Value::str("n"), Value::Number(i as f64)])
                        .unwrap();
                    let expected = format!("n{}", crate::runtime::value::format_number(i as f64));
                    assert!(matches!(r, Value::Str(ref s) if **s == *expected));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    // Every invocation still produced the right answer; the cache settled on
    // whichever shape linked last.
    assert!(site.resolution_count() >= 1);
}

#[test]
fn trace_sinks_observe_without_changing_results() {
    let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let mut traced = Engine::with_trace(Arc::new(move |line: &str| {
        sink.lock().unwrap().push(line.to_string());
    }));
    let mut plain = Engine::new();

    let src = "function add(a, b) { return a + b; } var r = add(2, 3);";
    traced.eval(src).unwrap();
    plain.eval(src).unwrap();

    assert!(matches!(traced.global("r"), Some(Value::Number(n)) if n == 5.0));
    assert!(matches!(plain.global("r"), Some(Value::Number(n)) if n == 5.0));
    let lines = lines.lock().unwrap();
    assert!(lines.iter().any(|line| line.contains("drift.gen.add")));
    assert!(lines.iter().any(|line| line.contains("link add via numeric")));
}

#[test]
fn every_site_keeps_its_own_cache() {
    let a = CallSite::new(OpKind::Arith(ArithOp::Add), false);
    let b = CallSite::new(OpKind::Arith(ArithOp::Add), false);
    let unit_a = add_unit(a.clone());
    let unit_b = add_unit(b.clone());
    let mut cx = ExecutionContext::new();
    let scope = cx.globals().clone();

    unit_a
        .call(&mut cx, scope.clone(), &[Value::Number(1.0), Value::Number(2.0)])
        .unwrap();
    assert_eq!(a.resolution_count(), 1);
    assert_eq!(b.resolution_count(), 0);

    unit_b
        .call(&mut cx, scope, &[Value::str("a"), Value::str("b")])
        .unwrap();
    assert_eq!(a.resolution_count(), 1);
    assert_eq!(b.resolution_count(), 1);
}

#[test]
fn dynamic_ops_report_their_kind_in_disassembly() {
    let frag = Fragment::of(vec![
        Op::Const(Value::Number(1.0)),
        Op::Const(Value::Number(2.0)),
        Op::Dynamic(CallSite::new(OpKind::Arith(ArithOp::Add), false)),
        Op::Return,
    ]);
    let listing = frag.disassemble("drift.gen.Demo1");
    assert!(listing.contains("dynamic add"));
}
