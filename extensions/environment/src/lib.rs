//! Native resin extension exposing the process environment.
//!
//! `load("environment")` defines:
//!
//! - `environment`: map of the variables present when the extension was
//!   loaded (entries that are not valid UTF-8 are skipped);
//! - `get_environment(name)`: current value of `name`, or `none`;
//! - `set_environment(name, value)`: updates the process environment and
//!   returns `value`.

use indexmap::IndexMap;
use resin::{
    host_error, throw,
    value::{Value, ValueKind},
    EnvironmentRef, Interpreter, Result,
};

/// Registers the extension's bindings in the root namespace.
pub fn install(_: &mut Interpreter, env: &EnvironmentRef) -> Result<()> {
    let variables: IndexMap<String, Value> = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .map(|(key, value)| (key, Value::string(value)))
        .collect();
    tracing::debug!(count = variables.len(), "exposing process environment");

    let mut scope = env.borrow_mut();
    scope.define("environment".into(), Value::map(variables), true);
    scope.define(
        "get_environment".into(),
        Value::native("get_environment", 1, get_environment),
        true,
    );
    scope.define(
        "set_environment".into(),
        Value::native("set_environment", 2, set_environment),
        true,
    );
    Ok(())
}

fn variable_name(value: &Value) -> Result<&str> {
    let Some(name) = value.as_str() else {
        throw!(
            Evaluation,
            "environment variable name must be String, found {}",
            value.type_name()
        );
    };
    if name.is_empty() || name.contains(['=', '\0']) {
        throw!(Evaluation, "invalid environment variable name '{name}'");
    }
    Ok(name)
}

fn get_environment(args: &[Value]) -> Result<Value> {
    let name = variable_name(&args[0])?;
    match std::env::var(name) {
        Ok(value) => Ok(Value::string(value)),
        Err(std::env::VarError::NotPresent) => Ok(Value::unit()),
        Err(err) => Err(host_error!(Evaluation, "environment variable '{name}': {err}")),
    }
}

fn set_environment(args: &[Value]) -> Result<Value> {
    let name = variable_name(&args[0])?;
    let value = match &*args[1].0 {
        ValueKind::String(text) => text.clone(),
        _ => args[1].to_string(),
    };
    if value.contains('\0') {
        throw!(Evaluation, "value of '{name}' contains a NUL byte");
    }
    std::env::set_var(name, &value);
    Ok(Value::string(value))
}

resin::extension!(environment, install);
