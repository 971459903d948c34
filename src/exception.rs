//! Exception bridge.
//!
//! Every failure detected by the loader, the resolver and the native bridge is
//! rendered through [`raise`], which is the only way to build a
//! [`HostException`]. Scripts observe these failures as error values named
//! [`HOST_ERROR_NAME`], next to the built-in `Error` kind.

use std::fmt;

use crate::{
    diagnostics::{Location, ResinError, SourceSpan},
    value::{ErrorValue, Value, ValueKind},
};

/// Name tag carried by every host exception.
pub const HOST_ERROR_NAME: &str = "ResinError";

/// Name of the scripting runtime's own error kind.
pub const BUILTIN_ERROR_NAME: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    Io,
    Config,
    NotFound,
    DynamicLoad,
    Evaluation,
}

impl HostErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HostErrorKind::Io => "io",
            HostErrorKind::Config => "config",
            HostErrorKind::NotFound => "not_found",
            HostErrorKind::DynamicLoad => "dynamic_load",
            HostErrorKind::Evaluation => "evaluation",
        }
    }
}

impl fmt::Display for HostErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HostException {
    kind: HostErrorKind,
    message: String,
    pub(crate) span: Option<SourceSpan>,
    pub(crate) location: Option<Location>,
}

impl HostException {
    pub fn kind(&self) -> HostErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn name(&self) -> &'static str {
        HOST_ERROR_NAME
    }

    pub fn to_value(&self) -> Value {
        Value::new(ValueKind::Error(ErrorValue {
            name: HOST_ERROR_NAME.to_string(),
            message: self.message.clone(),
            kind: Some(self.kind),
        }))
    }
}

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", HOST_ERROR_NAME, self.message)
    }
}

impl std::error::Error for HostException {}

/// Formats a host failure and hands it back as the error to propagate.
///
/// Use [`throw!`](crate::throw) to return it from the current function, or
/// [`host_error!`](crate::host_error) where a value is needed (`map_err`).
pub fn raise(kind: HostErrorKind, args: fmt::Arguments<'_>) -> ResinError {
    let message = fmt::format(args);
    tracing::debug!(%kind, %message, "raising host exception");
    ResinError::Host(HostException {
        kind,
        message,
        span: None,
        location: None,
    })
}

#[macro_export]
macro_rules! host_error {
    ($kind:ident, $($arg:tt)+) => {
        $crate::exception::raise(
            $crate::exception::HostErrorKind::$kind,
            format_args!($($arg)+),
        )
    };
}

#[macro_export]
macro_rules! throw {
    ($kind:ident, $($arg:tt)+) => {
        return Err($crate::host_error!($kind, $($arg)+))
    };
}

impl ResinError {
    /// The value a `catch` clause binds. Failures scripts cannot catch are
    /// handed back unchanged.
    pub fn into_script_value(self) -> std::result::Result<Value, ResinError> {
        match self {
            ResinError::Diagnostic(diag) => Ok(Value::new(ValueKind::Error(ErrorValue {
                name: diag.kind.error_name().to_string(),
                message: diag.message,
                kind: None,
            }))),
            ResinError::Host(exception) => Ok(exception.to_value()),
            ResinError::Thrown { value, .. } => Ok(value),
            exit @ ResinError::Exit(_) => Err(exit),
        }
    }

    /// Message part of the top-level report, without the name tag.
    pub fn message(&self) -> String {
        match self {
            ResinError::Diagnostic(diag) => diag.message.clone(),
            ResinError::Host(exception) => exception.message().to_string(),
            ResinError::Thrown { value, .. } => match &*value.0 {
                ValueKind::Error(error) => error.message.clone(),
                _ => value.to_string(),
            },
            ResinError::Exit(code) => format!("exit requested with status {code}"),
        }
    }

    /// Name tag of the failure as scripts would see it.
    pub fn error_name(&self) -> String {
        match self {
            ResinError::Diagnostic(diag) => diag.kind.error_name().to_string(),
            ResinError::Host(exception) => exception.name().to_string(),
            ResinError::Thrown { value, .. } => match &*value.0 {
                ValueKind::Error(error) => error.name.clone(),
                _ => BUILTIN_ERROR_NAME.to_string(),
            },
            ResinError::Exit(_) => "Exit".to_string(),
        }
    }

    pub fn host_kind(&self) -> Option<HostErrorKind> {
        match self {
            ResinError::Host(exception) => Some(exception.kind()),
            _ => None,
        }
    }
}
