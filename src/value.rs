use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::Stmt,
    diagnostics::{Diagnostic, Result},
    environment::EnvironmentRef,
    exception::HostErrorKind,
    search_path::SearchPath,
};

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn unit() -> Self {
        Self::new(ValueKind::Unit)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(values))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Map(entries))
    }

    pub fn module(name: &str, exports: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Module(ModuleValue {
            name: name.to_string(),
            exports,
        }))
    }

    pub fn native(
        name: &'static str,
        arity: usize,
        callback: fn(&[Value]) -> Result<Value>,
    ) -> Self {
        Self::new(ValueKind::NativeFunction(NativeFunction {
            name,
            arity,
            callback,
        }))
    }

    pub fn loader(search_path: Option<SearchPath>) -> Self {
        Self::new(ValueKind::Loader(Loader { search_path }))
    }

    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Unit => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Int(n) => *n != 0,
            ValueKind::Float(f) => *f != 0.0,
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Array(values) => !values.is_empty(),
            ValueKind::Map(map) => !map.is_empty(),
            ValueKind::SearchPath(path) => !path.is_empty(),
            ValueKind::Module(_)
            | ValueKind::Error(_)
            | ValueKind::Function(_)
            | ValueKind::NativeFunction(_)
            | ValueKind::Loader(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Unit => "Unit",
            ValueKind::Bool(_) => "Bool",
            ValueKind::Int(_) => "Int",
            ValueKind::Float(_) => "Float",
            ValueKind::String(_) => "String",
            ValueKind::Array(_) => "Array",
            ValueKind::Map(_) => "Map",
            ValueKind::Module(_) => "Module",
            ValueKind::Error(_) => "Error",
            ValueKind::SearchPath(_) => "SearchPath",
            ValueKind::Function(_) | ValueKind::NativeFunction(_) | ValueKind::Loader(_) => {
                "Function"
            }
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(&*self.0, ValueKind::Int(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "\"{s}\""),
            ValueKind::Array(values) => f.debug_list().entries(values.iter()).finish(),
            ValueKind::Map(map) => f.debug_map().entries(map.iter()).finish(),
            ValueKind::Module(module) => f
                .debug_struct("Module")
                .field("name", &module.name)
                .field("exports", &module.exports)
                .finish(),
            ValueKind::Error(error) => f
                .debug_struct(&error.name)
                .field("message", &error.message)
                .field("kind", &error.kind)
                .finish(),
            ValueKind::SearchPath(path) => write!(f, "{path:?}"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Unit => write!(f, "unit"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(values) => write_list(f, values.iter()),
            ValueKind::SearchPath(path) => write_list(f, path.snapshot().iter()),
            ValueKind::Map(map) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            ValueKind::Module(module) => write!(f, "<module {}>", module.name),
            ValueKind::Error(error) => write!(f, "{}: {}", error.name, error.message),
            ValueKind::Function(fun) => write!(
                f,
                "<fn {}>",
                fun.name.as_deref().unwrap_or("anonymous")
            ),
            ValueKind::NativeFunction(fun) => write!(f, "<native fn {}>", fun.name),
            ValueKind::Loader(_) => write!(f, "<native fn load>"),
        }
    }
}

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    write!(f, "[")?;
    for (idx, item) in items.enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

#[derive(Clone)]
pub enum ValueKind {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Read-only namespace such as `std` or `core`.
    Module(ModuleValue),
    Error(ErrorValue),
    Function(UserFunction),
    NativeFunction(NativeFunction),
    /// The `load` capability.
    Loader(Loader),
    /// Live handle onto a loader's search path.
    SearchPath(SearchPath),
}

#[derive(Clone)]
pub struct ModuleValue {
    pub name: String,
    pub exports: IndexMap<String, Value>,
}

/// Failure value visible to scripts through `catch`.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    /// Set for host exceptions only.
    pub kind: Option<HostErrorKind>,
}

#[derive(Clone)]
pub struct UserFunction {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub env: EnvironmentRef,
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub callback: fn(&[Value]) -> Result<Value>,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        if self.arity != usize::MAX && args.len() != self.arity {
            return Err(Diagnostic::runtime(format!(
                "function `{}` expected {} arguments but received {}",
                self.name,
                self.arity,
                args.len()
            ))
            .into());
        }
        (self.callback)(args)
    }
}

/// `load` binding; `None` when no search path is attached.
#[derive(Clone)]
pub struct Loader {
    pub search_path: Option<SearchPath>,
}
