//! Root namespace bindings.
//!
//! `print`, `load`, `exit`, `Error` and `ResinError` are defined twice from
//! one table: as writable bindings of the root scope and as members of the
//! read-only `core` namespace. Both `load` bindings share one search path.

use std::io::{self, Write};

use indexmap::IndexMap;

use crate::{
    diagnostics::{ResinError, Result},
    environment::EnvironmentRef,
    exception::{BUILTIN_ERROR_NAME, HOST_ERROR_NAME},
    host_error,
    search_path::SearchPath,
    value::{ErrorValue, Value, ValueKind},
};

pub fn install(env: &EnvironmentRef, search_path: &SearchPath, arguments: &[String]) {
    let definitions = definitions(search_path);
    let mut scope = env.borrow_mut();
    for (name, value) in &definitions {
        scope.define(name.clone(), value.clone(), true);
    }
    scope.define("core".into(), Value::module("core", definitions), false);
    let arguments = arguments.iter().cloned().map(Value::string).collect();
    scope.define("arguments".into(), Value::array(arguments), true);
}

fn definitions(search_path: &SearchPath) -> IndexMap<String, Value> {
    let mut table = IndexMap::new();
    table.insert("print".into(), Value::native("print", usize::MAX, print));
    table.insert("load".into(), Value::loader(Some(search_path.clone())));
    table.insert("exit".into(), Value::native("exit", usize::MAX, exit));
    table.insert(
        BUILTIN_ERROR_NAME.into(),
        Value::native("Error", 1, builtin_error),
    );
    table.insert(
        HOST_ERROR_NAME.into(),
        Value::native("ResinError", 1, host_exception),
    );
    table
}

/// Writes the arguments separated by spaces, followed by a newline.
fn print(args: &[Value]) -> Result<Value> {
    let mut line = String::new();
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            line.push(' ');
        }
        line.push_str(&arg.to_string());
    }
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")
        .and_then(|()| stdout.flush())
        .map_err(|err| host_error!(Io, "unable to write to standard output: {err}"))?;
    Ok(Value::unit())
}

fn exit(args: &[Value]) -> Result<Value> {
    let code = match args {
        [] => 0,
        [code] => match &*code.0 {
            ValueKind::Int(n) => u8::try_from(*n).map_err(|_| {
                host_error!(Evaluation, "exit status {n} is outside 0..=255")
            })?,
            _ => {
                return Err(host_error!(
                    Evaluation,
                    "exit status must be Int, found {}",
                    code.type_name()
                ));
            }
        },
        _ => {
            return Err(host_error!(
                Evaluation,
                "`exit` expected at most 1 argument but received {}",
                args.len()
            ));
        }
    };
    tracing::debug!(code, "script requested exit");
    Err(ResinError::Exit(code))
}

fn builtin_error(args: &[Value]) -> Result<Value> {
    Ok(Value::new(ValueKind::Error(ErrorValue {
        name: BUILTIN_ERROR_NAME.to_string(),
        message: args[0].to_string(),
        kind: None,
    })))
}

/// `ResinError(message)`; built through the exception bridge like every
/// other host exception.
fn host_exception(args: &[Value]) -> Result<Value> {
    host_error!(Evaluation, "{}", args[0]).into_script_value()
}
