//! Tests for the virtual machine.

use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::compiler::Compiler;
use crate::parser;
use crate::values::Value;
use crate::vm::error::RuntimeError;
use crate::vm::instruction_set::Instructions;
use crate::vm::{Code, Vm};

/// Run `input` and return the inspected form of the last popped stack
/// element, or the runtime error.
fn run(input: &str) -> Result<String, RuntimeError> {
    let arena = Bump::new();
    let program = parser::parse(&arena, input).expect("parsing failed");

    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compilation failed");

    let mut vm = Vm::new(compiler.bytecode());
    vm.run().map(|()| vm.last_popped_stack_elem().to_string())
}

fn expect_display(input: &str, want: &str) {
    match run(input) {
        Ok(got) => assert_eq!(got, want, "wrong result for {:?}", input),
        Err(err) => panic!("vm error for {:?}: {}", input, err),
    }
}

fn expect_integer(input: &str, want: i64) {
    expect_display(input, &want.to_string());
}

fn expect_boolean(input: &str, want: bool) {
    expect_display(input, if want { "true" } else { "false" });
}

fn expect_null(input: &str) {
    expect_display(input, "null");
}

fn expect_error(input: &str, want: &str) {
    match run(input) {
        Ok(got) => panic!("expected error for {:?}, got {:?}", input, got),
        Err(err) => assert_eq!(err.to_string(), want, "wrong error for {:?}", input),
    }
}

#[test]
fn test_integer_arithmetic() {
    expect_integer("1", 1);
    expect_integer("2", 2);
    expect_integer("1 + 2", 3);
    expect_integer("1 - 2", -1);
    expect_integer("1 * 2", 2);
    expect_integer("4 / 2", 2);
    expect_integer("50 / 2 * 2 + 10 - 5", 55);
    expect_integer("5 * (2 + 10)", 60);
    expect_integer("-5", -5);
    expect_integer("-10", -10);
    expect_integer("-50 + 100 + -50", 0);
    expect_integer("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50);
}

#[test]
fn test_boolean_expressions() {
    expect_boolean("true", true);
    expect_boolean("false", false);
    expect_boolean("1 < 2", true);
    expect_boolean("1 > 2", false);
    expect_boolean("1 < 1", false);
    expect_boolean("1 > 1", false);
    expect_boolean("1 == 1", true);
    expect_boolean("1 != 1", false);
    expect_boolean("1 == 2", false);
    expect_boolean("1 != 2", true);
    expect_boolean("true == true", true);
    expect_boolean("false == false", true);
    expect_boolean("true == false", false);
    expect_boolean("true != false", true);
    expect_boolean("(1 < 2) == true", true);
    expect_boolean("(1 < 2) == false", false);
    expect_boolean("(1 > 2) == true", false);
    expect_boolean("(1 > 2) == false", true);
}

#[test]
fn test_bang_operator() {
    expect_boolean("!true", false);
    expect_boolean("!false", true);
    expect_boolean("!5", false);
    expect_boolean("!!true", true);
    expect_boolean("!!false", false);
    expect_boolean("!!5", true);
    // Integer zero is truthy.
    expect_boolean("!0", false);
    expect_boolean("!!0", true);
    // A missing alternative evaluates to null, which is falsy.
    expect_boolean("!(if (false) { 5; })", true);
}

#[test]
fn test_conditionals() {
    expect_integer("if (true) { 10 }", 10);
    expect_integer("if (true) { 10 } else { 20 }", 10);
    expect_integer("if (false) { 10 } else { 20 }", 20);
    expect_integer("if (1) { 10 }", 10);
    expect_integer("if (1 < 2) { 10 }", 10);
    expect_integer("if (1 < 2) { 10 } else { 20 }", 10);
    expect_integer("if (1 > 2) { 10 } else { 20 }", 20);
    expect_null("if (1 > 2) { 10 }");
    expect_null("if (false) { 10 }");
    expect_integer("if ((if (false) { 10 })) { 10 } else { 20 }", 20);
    expect_integer("if (true) { 10 } else { 20 }; 3333;", 3333);
}

#[test]
fn test_global_let_statements() {
    expect_integer("let one = 1; one", 1);
    expect_integer("let one = 1; let two = 2; one + two", 3);
    expect_integer("let one = 1; let two = one + one; one + two", 3);
}

#[test]
fn test_string_expressions() {
    expect_display("\"tamarin\"", "tamarin");
    expect_display("\"ta\" + \"marin\"", "tamarin");
    expect_display("\"hello\" + \" \" + \"world\"", "hello world");
    expect_boolean("\"a\" == \"a\"", true);
    expect_boolean("\"a\" == \"b\"", false);
    expect_boolean("\"a\" != \"b\"", true);
}

#[test]
fn test_array_literals() {
    expect_display("[]", "[]");
    expect_display("[1, 2, 3]", "[1, 2, 3]");
    expect_display("[1 + 2, 3 * 4, 5 + 6]", "[3, 12, 11]");
}

#[test]
fn test_hash_literals() {
    expect_display("{}", "{}");
    expect_display("{1: 2, 2: 3}", "{1: 2, 2: 3}");
    expect_display("{1 + 1: 2 * 2, 3 + 3: 4 * 4}", "{2: 4, 6: 16}");
}

#[test]
fn test_index_expressions() {
    expect_integer("[1, 2, 3][1]", 2);
    expect_integer("[1, 2, 3][0 + 2]", 3);
    expect_integer("[[1, 1, 1]][0][0]", 1);
    expect_null("[][0]");
    expect_null("[1, 2, 3][99]");
    expect_null("[1][-1]");
    expect_integer("{1: 1, 2: 2}[1]", 1);
    expect_integer("{1: 1, 2: 2}[2]", 2);
    expect_null("{1: 1}[0]");
    expect_null("{}[0]");
    expect_integer("{\"one\": 1}[\"one\"]", 1);
    expect_integer("{true: 10}[true]", 10);
}

#[test]
fn test_calling_functions() {
    expect_integer("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15);
    expect_integer(
        "let one = fn() { 1; }; let two = fn() { 2; }; one() + two()",
        3,
    );
    expect_integer(
        "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
        3,
    );
    expect_integer("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99);
    expect_integer(
        "let earlyExit = fn() { return 99; return 100; }; earlyExit();",
        99,
    );
    expect_null("let noReturn = fn() { }; noReturn();");
    expect_null(
        "let noReturn = fn() { }; let noReturnTwo = fn() { noReturn(); }; noReturn(); noReturnTwo();",
    );
    expect_integer(
        "let returnsOne = fn() { 1; };
         let returnsOneReturner = fn() { returnsOne; };
         returnsOneReturner()();",
        1,
    );
}

#[test]
fn test_calling_functions_with_bindings() {
    expect_integer("let one = fn() { let one = 1; one }; one();", 1);
    expect_integer(
        "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
        3,
    );
    expect_integer(
        "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; };
         let threeAndFour = fn() { let three = 3; let four = 4; three + four; };
         oneAndTwo() + threeAndFour();",
        10,
    );
    expect_integer(
        "let firstFoobar = fn() { let foobar = 50; foobar; };
         let secondFoobar = fn() { let foobar = 100; foobar; };
         firstFoobar() + secondFoobar();",
        150,
    );
    expect_integer(
        "let globalSeed = 50;
         let minusOne = fn() { let num = 1; globalSeed - num; };
         let minusTwo = fn() { let num = 2; globalSeed - num; };
         minusOne() + minusTwo();",
        97,
    );
}

#[test]
fn test_calling_functions_with_arguments() {
    expect_integer("let identity = fn(a) { a; }; identity(4);", 4);
    expect_integer("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3);
    expect_integer(
        "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2);",
        3,
    );
    expect_integer(
        "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
        10,
    );
    expect_integer(
        "let sum = fn(a, b) { let c = a + b; c; };
         let outer = fn() { sum(1, 2) + sum(3, 4); };
         outer();",
        10,
    );
    expect_integer(
        "let globalNum = 10;
         let sum = fn(a, b) { let c = a + b; c + globalNum; };
         let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; };
         outer() + globalNum;",
        50,
    );
}

#[test]
fn test_calling_functions_with_wrong_arguments() {
    expect_error(
        "fn() { 1; }(1);",
        "wrong number of arguments: want=0, got=1",
    );
    expect_error(
        "fn(a) { a; }();",
        "wrong number of arguments: want=1, got=0",
    );
    expect_error(
        "fn(a, b) { a + b; }(1);",
        "wrong number of arguments: want=2, got=1",
    );
}

#[test]
fn test_builtin_functions() {
    expect_integer("len(\"\")", 0);
    expect_integer("len(\"four\")", 4);
    expect_integer("len(\"hello world\")", 11);
    expect_integer("len([1, 2, 3])", 3);
    expect_integer("len([])", 0);
    expect_error("len(1)", "argument to `len` not supported, got INTEGER");
    expect_error(
        "len(\"one\", \"two\")",
        "wrong number of arguments. got=2, want=1",
    );
    expect_null("puts(\"hello\", \"world\")");
    expect_integer("first([1, 2, 3])", 1);
    expect_null("first([])");
    expect_error("first(1)", "argument to `first` must be ARRAY, got INTEGER");
    expect_integer("last([1, 2, 3])", 3);
    expect_null("last([])");
    expect_error("last(1)", "argument to `last` must be ARRAY, got INTEGER");
    expect_display("rest([1, 2, 3])", "[2, 3]");
    expect_null("rest([])");
    expect_display("push([], 1)", "[1]");
    expect_error("push(1, 1)", "argument to `push` must be ARRAY, got INTEGER");
}

#[test]
fn test_closures() {
    expect_integer(
        "let newClosure = fn(a) { fn() { a; }; };
         let closure = newClosure(99);
         closure();",
        99,
    );
    expect_integer(
        "let newAdder = fn(a) { fn(b) { a + b } };
         let addTwo = newAdder(2);
         addTwo(3)",
        5,
    );
    expect_integer(
        "let newAdder = fn(a, b) { fn(c) { a + b + c }; };
         let adder = newAdder(1, 2);
         adder(8);",
        11,
    );
    expect_integer(
        "let newAdder = fn(a, b) { let c = a + b; fn(d) { c + d }; };
         let adder = newAdder(1, 2);
         adder(8);",
        11,
    );
    expect_integer(
        "let newAdderOuter = fn(a, b) {
             let c = a + b;
             fn(d) { let e = d + c; fn(f) { e + f; }; };
         };
         let newAdderInner = newAdderOuter(1, 2);
         let adder = newAdderInner(3);
         adder(8);",
        14,
    );
    expect_integer(
        "let newClosure = fn(a, b) {
             let one = fn() { a; };
             let two = fn() { b; };
             fn() { one() + two(); };
         };
         let closure = newClosure(9, 90);
         closure();",
        99,
    );
}

#[test]
fn test_recursive_functions() {
    expect_integer(
        "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
         countDown(1);",
        0,
    );
    expect_integer(
        "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
         let wrapper = fn() { countDown(1); };
         wrapper();",
        0,
    );
    expect_integer(
        "let wrapper = fn() {
             let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
             countDown(1);
         };
         wrapper();",
        0,
    );
    expect_integer(
        "let fibonacci = fn(x) {
             if (x == 0) {
                 0
             } else {
                 if (x == 1) {
                     return 1;
                 } else {
                     fibonacci(x - 1) + fibonacci(x - 2);
                 }
             }
         };
         fibonacci(15);",
        610,
    );
}

#[test]
fn test_runtime_errors() {
    expect_error("5 + true;", "unsupported types for binary operation: INTEGER BOOLEAN");
    expect_error(
        "5 + true; 5;",
        "unsupported types for binary operation: INTEGER BOOLEAN",
    );
    expect_error("-true", "unsupported type for negation: BOOLEAN");
    expect_error(
        "true + false;",
        "unsupported types for binary operation: BOOLEAN BOOLEAN",
    );
    expect_error("true > false", "unknown operator: BOOLEAN > BOOLEAN");
    expect_error("\"a\" - \"b\"", "unknown string operator: OpSub");
    expect_error("5 / 0", "division by zero");
    expect_error("5[1]", "index operator not supported: INTEGER");
    expect_error(
        "{\"name\": \"Tamarin\"}[fn(x) { x }];",
        "unusable as hash key: CLOSURE",
    );
    expect_error("{fn(x) { x }: 1}", "unusable as hash key: CLOSURE");
    expect_error("1(2)", "calling non-closure and non-builtin");
    expect_error("let f = fn() { f(); }; f();", "frame overflow");
}

#[test]
fn test_stack_overflow() {
    // An array literal wide enough to outgrow the value stack.
    let mut input = String::from("[");
    for i in 0..3000 {
        if i > 0 {
            input.push_str(", ");
        }
        input.push('1');
    }
    input.push(']');

    assert_eq!(run(&input).unwrap_err(), RuntimeError::StackOverflow);
}

#[test]
fn test_undefined_opcode() {
    let code = Code {
        instructions: Instructions::from_bytes(vec![0xFF]),
        constants: Vec::new(),
    };
    let mut vm = Vm::new(code);
    let err = vm.run().unwrap_err();
    assert_eq!(err, RuntimeError::UndefinedOpcode(0xFF));
    assert_eq!(err.to_string(), "undefined opcode 255");
}

#[test]
fn test_stack_is_balanced_after_run() {
    crate::test_utils::init_test_logging();
    let inputs = [
        "1; 2; 3;",
        "let x = 5; x + x;",
        "if (true) { 10 } else { 20 };",
        "let newAdder = fn(a) { fn(b) { a + b } }; newAdder(2)(3);",
        "len([1, 2, 3]);",
    ];
    for input in inputs {
        let arena = Bump::new();
        let program = parser::parse(&arena, input).expect("parsing failed");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compilation failed");

        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect("vm failed");
        // Every statement's final Pop leaves the stack empty.
        assert_eq!(vm.stack_pointer(), 0, "unbalanced stack for {:?}", input);
    }
}

#[test]
fn test_globals_survive_across_runs() {
    let arena = Bump::new();

    let first = parser::parse(&arena, "let x = 40;").expect("parsing failed");
    let mut compiler = Compiler::new();
    compiler.compile(&first).expect("compilation failed");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run().expect("vm failed");
    let globals = vm.into_globals();
    let (symbol_table, constants) = compiler.into_state();

    let second = parser::parse(&arena, "x + 2").expect("parsing failed");
    let mut compiler = Compiler::with_state(symbol_table, constants);
    compiler.compile(&second).expect("compilation failed");
    let mut vm = Vm::with_globals(compiler.bytecode(), globals);
    vm.run().expect("vm failed");
    assert_eq!(vm.last_popped_stack_elem(), Value::Integer(42));
}
