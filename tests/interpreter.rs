use indexmap::IndexMap;
use resin::{
    diagnostics::ResinError,
    runtime::Interpreter,
    value::{Value, ValueKind},
    HostConfig,
};

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> ResinError {
    let mut interpreter = Interpreter::new();
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

fn expect_int(value: &Value) -> i64 {
    match value.0.as_ref() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected Int, found {}", value.type_name()),
    }
}

fn expect_str(value: &Value) -> &str {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected String, found {}", value.type_name()))
}

fn expect_map(value: &Value) -> &IndexMap<String, Value> {
    match value.0.as_ref() {
        ValueKind::Map(map) => map,
        _ => panic!("expected Map, found {}", value.type_name()),
    }
}

fn expect_array(value: &Value) -> &[Value] {
    match value.0.as_ref() {
        ValueKind::Array(values) => values,
        _ => panic!("expected Array, found {}", value.type_name()),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value.0.as_ref() {
        ValueKind::Bool(b) => *b,
        _ => panic!("expected Bool, found {}", value.type_name()),
    }
}

fn strings(value: &Value) -> Vec<String> {
    expect_array(value)
        .iter()
        .map(|item| expect_str(item).to_string())
        .collect()
}

#[test]
fn evaluates_basic_arithmetic() {
    let value = eval("return 2 + 2;");
    assert_eq!(expect_int(&value), 4);
}

#[test]
fn returns_last_expression_from_script() {
    let value = eval(
        r#"
        var x = 40
        x + 2
        "#,
    );
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn break_carries_value_out_of_loop() {
    let value = eval(
        r#"
        loop {
            break 7
        }
        "#,
    );
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn for_loop_accumulates_sum() {
    let value = eval(
        r#"
        var mut sum = 0
        for item in [1, 2, 3, 4] {
            sum = sum + item
        }
        sum
        "#,
    );
    assert_eq!(expect_int(&value), 10);
}

#[test]
fn while_loop_with_continue() {
    let value = eval(
        r#"
        var i = 0
        var odd = 0
        while i < 10 {
            i = i + 1
            if i % 2 == 0 {
                continue
            }
            odd = odd + 1
        }
        odd
        "#,
    );
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn map_field_assignment_updates_value() {
    let value = eval(
        r#"
        var mut inventory = {
            "apples": 3,
            "bananas": 7
        }
        inventory.bananas = inventory.bananas + 5
        inventory
        "#,
    );
    let map = expect_map(&value);
    assert_eq!(map.len(), 2);
    assert_eq!(expect_int(&map["apples"]), 3);
    assert_eq!(expect_int(&map["bananas"]), 12);
}

#[test]
fn array_element_assignment_updates_value() {
    let value = eval(
        r#"
        var mut numbers = [1, 2, 3]
        numbers[1] = numbers[1] + 5
        numbers
        "#,
    );
    let values = expect_array(&value);
    assert_eq!(values.len(), 3);
    assert_eq!(expect_int(&values[0]), 1);
    assert_eq!(expect_int(&values[1]), 7);
    assert_eq!(expect_int(&values[2]), 3);
}

#[test]
fn recursive_function_evaluates() {
    let value = eval(
        r#"
        fn fib(n) {
            if n <= 1 {
                return n
            }
            return fib(n - 1) + fib(n - 2)
        }

        fib(6)
        "#,
    );
    assert_eq!(expect_int(&value), 8);
}

#[test]
fn lambdas_capture_their_scope() {
    let value = eval(
        r#"
        var base = 10
        var add = |x| x + base
        var twice = |f, x| { return f(f(x)) }
        twice(add, 1)
        "#,
    );
    assert_eq!(expect_int(&value), 21);
}

#[test]
fn string_concatenation_formats_operands() {
    let value = eval(r#""count: " + 3"#);
    assert_eq!(expect_str(&value), "count: 3");
}

#[test]
fn const_assignment_is_rejected() {
    let err = eval_error(
        r#"
        const answer = 42
        answer = 13
        "#,
    );
    let message = format!("{err}");
    assert!(
        message.contains("cannot assign to immutable binding"),
        "{message}"
    );
}

#[test]
fn syntax_errors_carry_their_own_name() {
    let err = eval_error("var = 1");
    assert_eq!(err.error_name(), "SyntaxError");
}

#[test]
fn runtime_errors_are_located_in_their_script() {
    let err = eval_error("var a = 1\n\nmissing + a\n");
    let location = err.location().expect("error should carry a location");
    assert_eq!(location.file, "<input>");
    assert_eq!(location.line, 3);
    assert!(err.message().contains("undefined variable `missing`"));
}

#[test]
fn try_catch_binds_builtin_errors() {
    let value = eval(
        r#"
        try {
            undefined_name
        } catch err {
            [err.name, err.message]
        }
        "#,
    );
    let fields = strings(&value);
    assert_eq!(fields[0], "Error");
    assert!(fields[1].contains("undefined_name"), "{}", fields[1]);
}

#[test]
fn thrown_values_reach_the_handler_unchanged() {
    let value = eval(
        r#"
        try {
            throw { "code": 7 }
        } catch failure {
            failure.code
        }
        "#,
    );
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn uncaught_throw_surfaces_the_value() {
    match eval_error(r#"throw Error("gave up")"#) {
        ResinError::Thrown { value, .. } => match value.0.as_ref() {
            ValueKind::Error(error) => {
                assert_eq!(error.name, "Error");
                assert_eq!(error.message, "gave up");
            }
            _ => panic!("expected Error value, found {}", value.type_name()),
        },
        other => panic!("expected thrown value, found {other:?}"),
    }
}

#[test]
fn catch_restores_the_enclosing_scope() {
    let value = eval(
        r#"
        var x = 1
        fn boom() {
            var x = 2
            throw "boom"
        }
        try {
            boom()
        } catch {
        }
        x
        "#,
    );
    assert_eq!(expect_int(&value), 1);
}

#[test]
fn host_exceptions_are_tagged_for_scripts() {
    let value = eval(
        r#"
        var e = ResinError("custom failure")
        [e.name, e.message, e.kind]
        "#,
    );
    assert_eq!(
        strings(&value),
        vec!["ResinError", "custom failure", "evaluation"]
    );

    let builtin = eval(r#"Error("plain").kind"#);
    assert!(matches!(builtin.0.as_ref(), ValueKind::Unit));
}

#[test]
fn missing_module_is_catchable() {
    let mut interpreter = Interpreter::with_config(HostConfig {
        search_path: Vec::new(),
        arguments: Vec::new(),
    });
    let value = interpreter
        .eval_source(
            r#"
            try {
                load("surely_not_a_module")
            } catch e {
                [e.name, e.kind, e.message]
            }
            "#,
        )
        .expect("failure should be caught");
    let fields = strings(&value);
    assert_eq!(fields[0], "ResinError");
    assert_eq!(fields[1], "not_found");
    assert!(fields[2].contains("surely_not_a_module"), "{}", fields[2]);
}

#[test]
fn exit_cannot_be_caught() {
    let err = eval_error(
        r#"
        try {
            exit(3)
        } catch {
            0
        }
        "#,
    );
    assert!(matches!(err, ResinError::Exit(3)), "{err:?}");
}

#[test]
fn core_namespace_is_read_only() {
    let err = eval_error("core.print = 1");
    assert!(
        err.message().contains("read-only namespace `core`"),
        "{}",
        err.message()
    );

    let err = eval_error("core = {}");
    assert!(err.message().contains("immutable binding"), "{}", err.message());

    // The root bindings themselves stay writable.
    let value = eval(
        r#"
        print = 5
        print
        "#,
    );
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn search_path_is_shared_with_core() {
    let mut interpreter = Interpreter::with_config(HostConfig {
        search_path: vec!["/first".into(), "/second".into()],
        arguments: Vec::new(),
    });
    let value = interpreter
        .eval_source(
            r#"
            load.path[0] = "/replaced"
            std.collections.push(load.path, "/third")
            std.collections.insert(core.load.path, 0, "/zeroth")
            var seen = []
            for dir in core.load.path {
                seen = std.collections.push(seen, dir)
            }
            seen
            "#,
        )
        .expect("search path edits should succeed");
    assert_eq!(
        strings(&value),
        vec!["/zeroth", "/replaced", "/second", "/third"]
    );
    assert_eq!(
        interpreter.search_path().snapshot(),
        vec!["/zeroth", "/replaced", "/second", "/third"]
    );
}

#[test]
fn search_path_reports_length_and_pops() {
    let mut interpreter = Interpreter::with_config(HostConfig {
        search_path: vec!["/a".into(), "/b".into()],
        arguments: Vec::new(),
    });
    let value = interpreter
        .eval_source(
            r#"
            var last = std.collections.pop(load.path)
            [last, std.collections.len(core.load.path)]
            "#,
        )
        .expect("pop should succeed");
    let values = expect_array(&value);
    assert_eq!(expect_str(&values[0]), "/b");
    assert_eq!(expect_int(&values[1]), 1);
}

#[test]
fn arguments_are_exposed_to_scripts() {
    let mut interpreter = Interpreter::with_config(
        HostConfig::default().with_arguments(vec!["one".into(), "two".into()]),
    );
    let value = interpreter
        .eval_source("arguments")
        .expect("arguments binding");
    assert_eq!(strings(&value), vec!["one", "two"]);
}

#[test]
fn std_length_helpers() {
    let string_len = eval("std.string.len(\"hello\")");
    assert_eq!(expect_int(&string_len), 5);

    let array_len = eval("std.collections.len([1, 2, 3])");
    assert_eq!(expect_int(&array_len), 3);

    let map_len = eval(
        r#"
        std.collections.len({ "a": 1, "b": 2 })
        "#,
    );
    assert_eq!(expect_int(&map_len), 2);
}

#[test]
fn std_math_helpers() {
    let abs_val = eval("std.math.abs(-42)");
    assert_eq!(expect_int(&abs_val), 42);

    let sqrt_val = eval("std.math.sqrt(49)");
    match sqrt_val.0.as_ref() {
        ValueKind::Float(f) => assert!((*f - 7.0).abs() < 1e-6),
        _ => panic!("expected Float, found {}", sqrt_val.type_name()),
    }

    let rounded = eval("std.math.round(3.6)");
    match rounded.0.as_ref() {
        ValueKind::Float(f) => assert_eq!(*f, 4.0),
        _ => panic!("expected Float, found {}", rounded.type_name()),
    }

    let pow = eval("std.math.pow(2, 8)");
    match pow.0.as_ref() {
        ValueKind::Float(f) => assert_eq!(*f, 256.0),
        _ => panic!("expected Float, found {}", pow.type_name()),
    }
}

#[test]
fn std_collections_helpers() {
    let pushed = eval("std.collections.push([1, 2], 3)");
    let values = expect_array(&pushed);
    assert_eq!(values.len(), 3);
    assert_eq!(expect_int(&values[2]), 3);

    let inserted = eval(
        r#"
        std.collections.insert({ "a": 1 }, "b", 2)
        "#,
    );
    let map = expect_map(&inserted);
    assert_eq!(map.len(), 2);
    assert_eq!(expect_int(&map["b"]), 2);

    let keys = eval(
        r#"
        std.collections.keys({ "x": 1, "y": 2 })
        "#,
    );
    assert_eq!(strings(&keys), vec!["x", "y"]);
}

#[test]
fn std_string_utilities() {
    let replaced = eval("std.string.replace(\"hello world\", \"world\", \"resin\")");
    assert_eq!(expect_str(&replaced), "hello resin");

    let starts = eval("std.string.starts_with(\"resin\", \"res\")");
    assert!(expect_bool(&starts));

    let ends = eval("std.string.ends_with(\"resin\", \"sin\")");
    assert!(expect_bool(&ends));

    let joined = eval("std.string.join([\"a\", \"b\", \"c\"], \"-\")");
    assert_eq!(expect_str(&joined), "a-b-c");
}

#[test]
fn std_collections_range_and_pop() {
    let range = eval("std.collections.range(0, 5)");
    let values = expect_array(&range);
    assert_eq!(values.len(), 5);
    assert_eq!(expect_int(&values[0]), 0);
    assert_eq!(expect_int(&values[4]), 4);

    let descending = eval("std.collections.range(3, 0)");
    let values = expect_array(&descending);
    assert_eq!(values.iter().map(expect_int).collect::<Vec<_>>(), vec![3, 2, 1]);

    let popped = eval("std.collections.pop([1, 2, 3])");
    let map = expect_map(&popped);
    assert_eq!(expect_int(&map["value"]), 3);
    assert_eq!(expect_array(&map["array"]).len(), 2);
}

#[test]
fn bracket_on_new_line_starts_a_statement() {
    let value = eval(
        r#"
        var xs = [1, 2]
        [xs[1], xs[0]]
        "#,
    );
    let values = expect_array(&value);
    assert_eq!(expect_int(&values[0]), 2);
    assert_eq!(expect_int(&values[1]), 1);

    let chained = eval(
        r#"
        var greeting = std.string
            .to_upper("hi")
        greeting
        "#,
    );
    assert_eq!(expect_str(&chained), "HI");
}

#[test]
fn load_argument_errors_are_host_exceptions() {
    let value = eval(
        r#"
        var none_given = ""
        var not_a_string = ""
        var too_many = ""
        try { load() } catch e { none_given = e.name + "/" + e.kind + "/" + e.message }
        try { load(1) } catch e { not_a_string = e.name + "/" + e.kind + "/" + e.message }
        try { load("a", "b") } catch e { too_many = e.name + "/" + e.kind }
        [none_given, not_a_string, too_many]
        "#,
    );
    assert_eq!(
        strings(&value),
        vec![
            "ResinError/evaluation/no file or module specified",
            "ResinError/evaluation/couldn't convert argument of `load` to String, found Int",
            "ResinError/evaluation",
        ]
    );
}

#[test]
fn integer_negation_overflow_is_an_error() {
    let err = eval_error("var x = -9223372036854775807 - 1;\nvar y = -x");
    assert!(err.message().contains("integer overflow"), "{}", err.message());

    let err = eval_error("var x = -9223372036854775807 - 1;\nstd.math.abs(x)");
    assert!(err.message().contains("integer overflow"), "{}", err.message());

    let value = eval("var x = -9223372036854775807;\n-x");
    assert_eq!(expect_int(&value), i64::MAX);
}
