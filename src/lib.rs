//! Command-line scripting host.
//!
//! Scripts pull in more functionality with `load(name)`, which resolves
//! `name` against an ordered search path to either another script or a
//! native extension (a dynamic library with a single entry point). Every
//! failure raised while doing so goes through the [`exception`] bridge.

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod exception;
pub mod host;
pub mod lexer;
pub mod loader;
pub mod native;
pub mod parser;
pub mod resolver;
pub mod runtime;
pub mod search_path;
pub mod stdlib;
pub mod value;

pub use config::HostConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Location, ResinError, Result, SourceSpan};
pub use environment::{Environment, EnvironmentRef};
pub use exception::{HostErrorKind, HostException};
pub use loader::ScriptSource;
pub use resolver::Resolution;
pub use runtime::{ExecutionContext, Interpreter};
pub use search_path::SearchPath;
pub use value::Value;
