//! Cross-engine parity: on well-typed programs the VM and the
//! tree-walking evaluator must produce the same observable result.

use bumpalo::Bump;
use tamarin_core::compiler::Compiler;
use tamarin_core::evaluator::{self, Environment};
use tamarin_core::parser;
use tamarin_core::vm::Vm;

/// Run `input` through both engines and return the inspected results.
fn both_engines(input: &str) -> (String, String) {
    let arena = Bump::new();
    let program = parser::parse(&arena, input).expect("parsing failed");

    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compilation failed");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run().expect("vm failed");
    let vm_result = vm.last_popped_stack_elem().to_string();

    let env = Environment::new();
    let eval_result = evaluator::eval_program(&program, &env)
        .expect("eval failed")
        .to_string();

    (vm_result, eval_result)
}

#[test]
fn test_engines_agree() {
    let programs = [
        // Arithmetic and precedence.
        "1 + 2",
        "(5 + 10 * 2 + 15 / 3) * 2 + -10",
        "-50 + 100 + -50",
        // Truthiness.
        "!0",
        "!!0",
        "!5",
        "!(if (false) { 5; })",
        // Comparisons and equality.
        "1 < 2",
        "1 > 2",
        "(1 < 2) == true",
        "\"a\" == \"a\"",
        "\"a\" != \"b\"",
        "true != false",
        // Conditionals.
        "if (true) { 10 } else { 20 }; 3333;",
        "if (false) { 10 }",
        "if (1 > 2) { 10 } else { 20 }",
        // Bindings.
        "let one = 1; let two = 2; one + two",
        "let a = 5; let b = a; let c = a + b + 5; c;",
        // Strings.
        "\"hello\" + \" \" + \"world\"",
        // Arrays and hashes.
        "[1, 2 * 2, 3 + 3]",
        "[1, 2, 3][1]",
        "[1, 2, 3][99]",
        "[[1, 1, 1]][0][0]",
        "{1: 2, 3: 4}",
        "{\"one\": 1, \"two\": 2}[\"two\"]",
        "{true: 10}[true]",
        "{1: 1}[0]",
        // Functions and closures.
        "let identity = fn(x) { x; }; identity(5);",
        "let earlyExit = fn() { return 99; 100; }; earlyExit();",
        "let newAdder = fn(a) { fn(b) { a + b } }; let addTwo = newAdder(2); addTwo(3)",
        "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; countDown(1)",
        "let fibonacci = fn(x) {
             if (x == 0) { 0 } else {
                 if (x == 1) { return 1; }
                 else { fibonacci(x - 1) + fibonacci(x - 2); }
             }
         };
         fibonacci(10);",
        // Builtins.
        "len(\"four\")",
        "len([1, 1, 1])",
        "first([1, 2, 3])",
        "last([1, 2, 3])",
        "rest([1, 2, 3])",
        "rest([])",
        "push([1, 2], 3)",
        "len(rest(push([1, 2, 3], 4)))",
    ];

    for input in programs {
        let (vm_result, eval_result) = both_engines(input);
        assert_eq!(
            vm_result, eval_result,
            "engines disagree on {:?}",
            input
        );
    }
}
