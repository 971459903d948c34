use std::io::{self, BufRead, Write};

use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, ResinError, Result},
    environment::EnvironmentRef,
    host_error,
    value::{Value, ValueKind},
};

type Callback = fn(&[Value]) -> Result<Value>;

pub fn install(env: &EnvironmentRef) {
    let io = namespace(
        "std.io",
        &[
            ("print", usize::MAX, io_print),
            ("println", usize::MAX, io_println),
            ("dbg", 1, io_dbg),
            ("read_line", 0, io_read_line),
        ],
    );
    let string = namespace(
        "std.string",
        &[
            ("len", 1, collections_len),
            ("is_empty", 1, string_is_empty),
            ("to_upper", 1, string_to_upper),
            ("trim", 1, string_trim),
            ("split", 2, string_split),
            ("replace", 3, string_replace),
            ("starts_with", 2, string_starts_with),
            ("ends_with", 2, string_ends_with),
            ("join", 2, string_join),
        ],
    );
    let collections = namespace(
        "std.collections",
        &[
            ("len", 1, collections_len),
            ("push", 2, collections_push),
            ("insert", 3, collections_insert),
            ("pop", 1, collections_pop),
            ("keys", 1, collections_keys),
            ("values", 1, collections_values),
            ("range", 2, collections_range),
        ],
    );
    let math = namespace(
        "std.math",
        &[
            ("abs", 1, math_abs),
            ("floor", 1, math_floor),
            ("ceil", 1, math_ceil),
            ("sqrt", 1, math_sqrt),
            ("round", 1, math_round),
            ("pow", 2, math_pow),
        ],
    );

    let mut std_exports = IndexMap::new();
    std_exports.insert("io".into(), io);
    std_exports.insert("string".into(), string);
    std_exports.insert("collections".into(), collections);
    std_exports.insert("math".into(), math);
    env.borrow_mut()
        .define("std".into(), Value::module("std", std_exports), false);
}

fn namespace(name: &str, members: &[(&'static str, usize, Callback)]) -> Value {
    let exports = members
        .iter()
        .map(|&(member, arity, callback)| (member.to_string(), Value::native(member, arity, callback)))
        .collect();
    Value::module(name, exports)
}

fn error(message: impl Into<String>) -> ResinError {
    Diagnostic::runtime(message).into()
}

fn expect_string<'a>(value: &'a Value, name: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| error(format!("`{name}` expected String but found {}", value.type_name())))
}

fn expect_int(value: &Value, name: &str) -> Result<i64> {
    match &*value.0 {
        ValueKind::Int(n) => Ok(*n),
        _ => Err(error(format!(
            "`{name}` expected Int but found {}",
            value.type_name()
        ))),
    }
}

fn expect_index(value: &Value, name: &str) -> Result<usize> {
    let index = expect_int(value, name)?;
    usize::try_from(index).map_err(|_| error(format!("`{name}` index {index} out of bounds")))
}

fn expect_number(value: &Value, name: &str) -> Result<f64> {
    match &*value.0 {
        ValueKind::Int(n) => Ok(*n as f64),
        ValueKind::Float(f) => Ok(*f),
        _ => Err(error(format!(
            "`{name}` expected numeric but found {}",
            value.type_name()
        ))),
    }
}

fn write_stdout(text: &str) -> Result<Value> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| host_error!(Io, "unable to write to standard output: {err}"))?;
    Ok(Value::unit())
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn io_print(args: &[Value]) -> Result<Value> {
    write_stdout(&joined(args))
}

fn io_println(args: &[Value]) -> Result<Value> {
    write_stdout(&format!("{}\n", joined(args)))
}

fn io_dbg(args: &[Value]) -> Result<Value> {
    write_stdout(&format!("{:?}\n", args[0]))?;
    Ok(args[0].clone())
}

fn io_read_line(_: &[Value]) -> Result<Value> {
    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|err| host_error!(Io, "unable to read standard input: {err}"))?;
    let trimmed = input.trim_end_matches(['\n', '\r']).len();
    input.truncate(trimmed);
    Ok(Value::string(input))
}

fn string_is_empty(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "std.string.is_empty")?;
    Ok(Value::bool(text.is_empty()))
}

fn string_to_upper(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "std.string.to_upper")?;
    Ok(Value::string(text.to_uppercase()))
}

fn string_trim(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "std.string.trim")?;
    Ok(Value::string(text.trim()))
}

fn string_split(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "std.string.split")?;
    let separator = expect_string(&args[1], "std.string.split")?;
    if separator.is_empty() {
        return Err(error("separator must not be empty"));
    }
    Ok(Value::array(text.split(separator).map(Value::string).collect()))
}

fn string_replace(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "std.string.replace")?;
    let from = expect_string(&args[1], "std.string.replace")?;
    let to = expect_string(&args[2], "std.string.replace")?;
    Ok(Value::string(text.replace(from, to)))
}

fn string_starts_with(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "std.string.starts_with")?;
    let prefix = expect_string(&args[1], "std.string.starts_with")?;
    Ok(Value::bool(text.starts_with(prefix)))
}

fn string_ends_with(args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "std.string.ends_with")?;
    let suffix = expect_string(&args[1], "std.string.ends_with")?;
    Ok(Value::bool(text.ends_with(suffix)))
}

fn string_join(args: &[Value]) -> Result<Value> {
    let items = match &*args[0].0 {
        ValueKind::Array(values) => values.clone(),
        ValueKind::SearchPath(path) => path.snapshot().into_iter().map(Value::string).collect(),
        _ => return Err(error("`std.string.join` expects array of strings")),
    };
    let separator = expect_string(&args[1], "std.string.join")?;
    let pieces = items
        .iter()
        .map(|item| expect_string(item, "std.string.join"))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::string(pieces.join(separator)))
}

fn collections_len(args: &[Value]) -> Result<Value> {
    let len = match &*args[0].0 {
        ValueKind::String(s) => s.chars().count(),
        ValueKind::Array(arr) => arr.len(),
        ValueKind::Map(map) => map.len(),
        ValueKind::SearchPath(path) => path.len(),
        _ => return Err(error("len expects string, array, map or search path")),
    };
    Ok(Value::int(len as i64))
}

/// Arrays are values, so `push` returns a new array; a search path is a shared
/// handle and is extended in place.
fn collections_push(args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Array(values) => {
            let mut new = values.clone();
            new.push(args[1].clone());
            Ok(Value::array(new))
        }
        ValueKind::SearchPath(path) => {
            path.push(expect_string(&args[1], "std.collections.push")?);
            Ok(args[0].clone())
        }
        _ => Err(error("push expects array or search path as first argument")),
    }
}

fn collections_insert(args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Map(map) => {
            let key = expect_string(&args[1], "std.collections.insert")?;
            let mut new = map.clone();
            new.insert(key.to_string(), args[2].clone());
            Ok(Value::map(new))
        }
        ValueKind::SearchPath(path) => {
            let index = expect_index(&args[1], "std.collections.insert")?;
            let dir = expect_string(&args[2], "std.collections.insert")?;
            if !path.insert(index, dir) {
                return Err(error(format!(
                    "`std.collections.insert` index {index} out of bounds"
                )));
            }
            Ok(args[0].clone())
        }
        _ => Err(error("insert expects map or search path as first argument")),
    }
}

/// Removes the last element. Arrays yield `{value, array}`; a search path
/// yields the removed entry.
fn collections_pop(args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Array(values) => {
            let mut new = values.clone();
            let value = new.pop().ok_or_else(|| error("pop expects non-empty array"))?;
            let mut result = IndexMap::new();
            result.insert("value".into(), value);
            result.insert("array".into(), Value::array(new));
            Ok(Value::map(result))
        }
        ValueKind::SearchPath(path) => path
            .pop()
            .map(Value::string)
            .ok_or_else(|| error("pop expects non-empty search path")),
        _ => Err(error("pop expects array or search path")),
    }
}

fn collections_keys(args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Map(map) => Ok(Value::array(map.keys().cloned().map(Value::string).collect())),
        _ => Err(error("keys expects map")),
    }
}

fn collections_values(args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Map(map) => Ok(Value::array(map.values().cloned().collect())),
        ValueKind::Array(arr) => Ok(Value::array(arr.clone())),
        _ => Err(error("values expects map or array")),
    }
}

fn collections_range(args: &[Value]) -> Result<Value> {
    let start = expect_int(&args[0], "std.collections.range")?;
    let end = expect_int(&args[1], "std.collections.range")?;
    let values = if start <= end {
        (start..end).map(Value::int).collect()
    } else {
        (end + 1..=start).rev().map(Value::int).collect()
    };
    Ok(Value::array(values))
}

fn math_abs(args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Int(n) => n
            .checked_abs()
            .map(Value::int)
            .ok_or_else(|| error("integer overflow")),
        _ => Ok(Value::float(expect_number(&args[0], "std.math.abs")?.abs())),
    }
}

fn math_floor(args: &[Value]) -> Result<Value> {
    Ok(Value::float(expect_number(&args[0], "std.math.floor")?.floor()))
}

fn math_ceil(args: &[Value]) -> Result<Value> {
    Ok(Value::float(expect_number(&args[0], "std.math.ceil")?.ceil()))
}

fn math_sqrt(args: &[Value]) -> Result<Value> {
    let number = expect_number(&args[0], "std.math.sqrt")?;
    if number < 0.0 {
        return Err(error("sqrt expects non-negative input"));
    }
    Ok(Value::float(number.sqrt()))
}

fn math_round(args: &[Value]) -> Result<Value> {
    Ok(Value::float(expect_number(&args[0], "std.math.round")?.round()))
}

fn math_pow(args: &[Value]) -> Result<Value> {
    let base = expect_number(&args[0], "std.math.pow")?;
    let exponent = expect_number(&args[1], "std.math.pow")?;
    Ok(Value::float(base.powf(exponent)))
}
