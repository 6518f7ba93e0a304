use crate::compiler::CompileError;
use crate::engine::{Engine, EngineError};
use crate::runtime::error::RuntimeError;
use crate::runtime::value::{HostValue, Value};
use std::sync::Arc;

fn eval_global(src: &str, name: &str) -> Value {
    let mut engine = Engine::new();
    engine.eval(src).unwrap();
    engine
        .global(name)
        .unwrap_or_else(|| panic!("global `{name}` was not set"))
}

fn global_num(src: &str, name: &str) -> f64 {
    match eval_global(src, name) {
        Value::Number(n) => n,
        other => panic!("expected a number, found {other:?}"),
    }
}

fn global_text(src: &str, name: &str) -> String {
    match eval_global(src, name) {
        Value::Str(s) => s.to_string(),
        other => panic!("expected a string, found {other:?}"),
    }
}

fn eval_err(src: &str) -> EngineError {
    Engine::new().eval(src).unwrap_err()
}

#[test]
fn arithmetic_respects_precedence() {
    assert_eq!(global_num("var r = 1 + 2 * 3;", "r"), 7.0);
    assert_eq!(global_num("var r = (1 + 2) * 3;", "r"), 9.0);
    assert_eq!(global_num("var r = 7 % 4;", "r"), 3.0);
}

#[test]
fn a_textual_operand_makes_addition_concatenate() {
    assert_eq!(global_text("var r = \"a\" + 3;", "r"), "a3");
    assert_eq!(global_text("var r = 3 + \"a\";", "r"), "3a");
    assert_eq!(global_num("var r = 2 + 3;", "r"), 5.0);
}

#[test]
fn textual_operands_numerify_for_non_addition_arithmetic() {
    assert_eq!(global_num("var r = \"6\" * 7;", "r"), 42.0);
    assert_eq!(global_num("var r = \"10\" - 4;", "r"), 6.0);
    assert_eq!(global_num("var r = \"9\" / \"3\";", "r"), 3.0);
    assert_eq!(global_num("var r = \"7\" % 4;", "r"), 3.0);
}

#[test]
fn hex_literals_parse_by_radix() {
    assert_eq!(global_num("var r = 0xFF;", "r"), 255.0);
}

#[test]
fn assignment_updates_the_nearest_binding() {
    assert_eq!(global_num("var x = 2; x = x + 3;", "x"), 5.0);
}

#[test]
fn functions_close_over_their_definition_scope() {
    let src = "
        function make(n) {
            return function(m) { return n + m; };
        }
        var add2 = make(2);
        var r = add2(3);
    ";
    assert_eq!(global_num(src, "r"), 5.0);
}

#[test]
fn recursion_works_through_the_scope_chain() {
    let src = "
        function fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        var r = fib(10);
    ";
    assert_eq!(global_num(src, "r"), 55.0);
}

#[test]
fn while_loops_iterate_and_update() {
    let src = "var s = 0; var i = 0; while (i < 5) { s += i; i++; }";
    assert_eq!(global_num(src, "s"), 10.0);
    assert_eq!(global_num(src, "i"), 5.0);
}

#[test]
fn do_while_runs_the_body_at_least_once() {
    assert_eq!(global_num("var n = 0; do { n++; } while (false);", "n"), 1.0);
}

#[test]
fn for_loops_cover_init_cond_and_step() {
    let src = "var s = 0; for (var i = 0; i < 4; i++) { s = s + i; }";
    assert_eq!(global_num(src, "s"), 6.0);
}

#[test]
fn object_literals_and_member_access() {
    let src = "var o = { a: 1, b: 2 }; o.c = o.a + o[\"b\"]; var r = o.c;";
    assert_eq!(global_num(src, "r"), 3.0);
}

#[test]
fn array_literals_carry_indices_and_length() {
    let src = "var a = [1, 2, 3]; var n = a.length; var x = a[1];";
    assert_eq!(global_num(src, "n"), 3.0);
    assert_eq!(global_num(src, "x"), 2.0);
}

#[test]
fn conditional_expression_picks_a_branch() {
    assert_eq!(global_text("var r = 1 < 2 ? \"yes\" : \"no\";", "r"), "yes");
    assert_eq!(global_text("var r = 2 < 1 ? \"yes\" : \"no\";", "r"), "no");
}

#[test]
fn logical_operators_short_circuit() {
    let src = "
        var hits = 0;
        function bump() { hits = hits + 1; return true; }
        var a = true || bump();
        var b = false && bump();
        var c = false || bump();
    ";
    assert_eq!(global_num(src, "hits"), 1.0);
    assert!(matches!(eval_global(src, "a"), Value::Bool(true)));
    assert!(matches!(eval_global(src, "b"), Value::Bool(false)));
    assert!(matches!(eval_global(src, "c"), Value::Bool(true)));
}

#[test]
fn prefix_update_yields_the_new_value() {
    let src = "var x = 5; var a = ++x;";
    assert_eq!(global_num(src, "a"), 6.0);
    assert_eq!(global_num(src, "x"), 6.0);
}

#[test]
fn postfix_update_yields_the_old_value() {
    let src = "var y = 5; var b = y++;";
    assert_eq!(global_num(src, "b"), 5.0);
    assert_eq!(global_num(src, "y"), 6.0);
}

#[test]
fn compound_assignment_reads_once_and_writes_once() {
    assert_eq!(global_num("var o = { n: 10 }; o.n += 5; var r = o.n;", "r"), 15.0);
    assert_eq!(global_num("var x = 8; x /= 2;", "x"), 4.0);
}

#[test]
fn loose_and_strict_equality_differ() {
    assert!(matches!(eval_global("var r = 1 == \"1\";", "r"), Value::Bool(true)));
    assert!(matches!(eval_global("var r = 1 === \"1\";", "r"), Value::Bool(false)));
    assert!(matches!(eval_global("var r = null == undefined;", "r"), Value::Bool(true)));
    assert!(matches!(eval_global("var r = null === undefined;", "r"), Value::Bool(false)));
    assert!(matches!(eval_global("var r = 1 != 2;", "r"), Value::Bool(true)));
}

#[test]
fn typeof_reports_the_runtime_shape() {
    assert_eq!(global_text("var r = typeof 1;", "r"), "number");
    assert_eq!(global_text("var r = typeof \"x\";", "r"), "string");
    assert_eq!(global_text("var r = typeof true;", "r"), "boolean");
    assert_eq!(global_text("var r = typeof undefined;", "r"), "undefined");
    assert_eq!(global_text("var r = typeof { a: 1 };", "r"), "object");
    assert_eq!(
        global_text("function f() {} var r = typeof f;", "r"),
        "function"
    );
}

#[test]
fn void_discards_its_operand() {
    assert!(matches!(eval_global("var r = void 0;", "r"), Value::Undefined));
}

#[test]
fn strict_code_rejects_undeclared_assignment() {
    let err = eval_err("\"use strict\"; y = 1;");
    assert!(matches!(
        err,
        EngineError::Runtime(RuntimeError::StrictAssignment { ref name }) if name == "y"
    ));
}

#[test]
fn sloppy_code_creates_a_global_binding() {
    assert_eq!(global_num("function f() { z = 7; } f();", "z"), 7.0);
}

#[test]
fn throw_surfaces_as_a_runtime_error() {
    let err = eval_err("throw \"boom\";");
    assert!(matches!(
        err,
        EngineError::Runtime(RuntimeError::Thrown { ref value }) if value == "boom"
    ));
}

#[test]
fn new_keeps_an_object_result_and_manufactures_one_otherwise() {
    let src = "function mk() { return { x: 1 }; } var p = new mk(); var r = p.x;";
    assert_eq!(global_num(src, "r"), 1.0);
    let src = "function empty() { } var q = new empty(); var r = typeof q;";
    assert_eq!(global_text(src, "r"), "object");
}

#[test]
fn math_builtins_are_callable() {
    assert_eq!(global_num("var r = Math.ceil(1.2);", "r"), 2.0);
    assert_eq!(global_num("var r = Math.floor(0 - 1.5);", "r"), -2.0);
    assert_eq!(global_num("var r = Math.max(3, 7);", "r"), 7.0);
    assert_eq!(global_num("var r = Math.min(3, 7);", "r"), 3.0);
    assert_eq!(global_num("var r = Math.abs(0 - 4);", "r"), 4.0);
}

#[test]
fn reading_an_undeclared_name_is_an_error() {
    let err = eval_err("var r = nope + 1;");
    assert!(matches!(
        err,
        EngineError::Runtime(RuntimeError::UndefinedReference { ref name }) if name == "nope"
    ));
}

#[test]
fn member_access_on_a_primitive_is_a_type_error() {
    assert!(matches!(
        eval_err("var x = 5; x.y = 1;"),
        EngineError::Runtime(RuntimeError::TypeError { .. })
    ));
    assert!(matches!(
        eval_err("var x = 5; var y = x.y;"),
        EngineError::Runtime(RuntimeError::TypeError { .. })
    ));
}

#[test]
fn calling_a_non_function_is_a_type_error() {
    assert!(matches!(
        eval_err("var x = 3; x(1);"),
        EngineError::Runtime(RuntimeError::TypeError { .. })
    ));
}

#[test]
fn recognized_but_unsupported_constructs_fail_by_name() {
    let cases = [
        ("try { } catch (e) { }", "try"),
        ("with (x) { }", "with"),
        ("for (var k in o) { }", "for-in"),
        ("var r = delete x;", "delete"),
        ("var r = 1 & 2;", "bitwise and"),
        ("var r = x instanceof y;", "instanceof"),
        ("var r = /a+/;", "regex literal"),
    ];
    for (src, construct) in cases {
        match eval_err(src) {
            EngineError::Compile(CompileError::UnsupportedConstruct { construct: found }) => {
                assert_eq!(found, construct, "for source {src:?}");
            }
            other => panic!("expected an unsupported-construct error for {src:?}, found {other:?}"),
        }
    }
}

#[test]
fn statements_do_not_need_semicolons_before_a_brace_or_eof() {
    assert_eq!(global_num("var x = 1\nvar y = x + 1\n", "y"), 2.0);
}

struct FakeHost;

impl HostValue for FakeHost {
    fn host_type(&self) -> &str {
        "FakeHost"
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::str("fake")),
            _ => None,
        }
    }
}

#[test]
fn host_absent_properties_surface_as_undefined() {
    let mut engine = Engine::new();
    engine.declare_global("host", Value::Host(Arc::new(FakeHost)));
    engine
        .eval("var a = host.missing; var b = host.name; var t = typeof host;")
        .unwrap();
    assert!(matches!(engine.global("a"), Some(Value::Undefined)));
    assert!(matches!(engine.global("b"), Some(Value::Str(ref s)) if &**s == "fake"));
    assert!(matches!(engine.global("t"), Some(Value::Str(ref s)) if &**s == "object"));
}

#[test]
fn host_write_rejection_propagates_as_a_type_error() {
    let mut engine = Engine::new();
    engine.declare_global("host", Value::Host(Arc::new(FakeHost)));
    let err = engine.eval("host.name = 1;").unwrap_err();
    assert!(matches!(
        err,
        EngineError::Runtime(RuntimeError::TypeError { .. })
    ));
}

#[test]
fn evaluations_on_one_engine_share_globals() {
    let mut engine = Engine::new();
    engine.eval("var x = 1;").unwrap();
    engine.eval("x = x + 1;").unwrap();
    assert!(matches!(engine.global("x"), Some(Value::Number(n)) if n == 2.0));
}

#[test]
fn disassembly_names_every_unit() {
    let engine = Engine::new();
    let listing = engine
        .disassemble("function fib(n) { return n; } fib(1);")
        .unwrap();
    assert!(listing.contains("drift.gen.Anonymous"));
    assert!(listing.contains("drift.gen.fib"));
    assert!(listing.contains("call/1"));
}
