use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, Result, SourceSpan},
    value::Value,
};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One lexical scope. The outermost scope of an interpreter is the root
/// namespace that `load` evaluates scripts into and that native extensions
/// register their bindings in.
#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Binding>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    pub fn define(&mut self, name: String, value: Value, mutable: bool) {
        self.bindings.insert(name, Binding { value, mutable });
    }

    pub fn assign(env: &EnvironmentRef, name: &str, value: Value, span: SourceSpan) -> Result<()> {
        let parent = {
            let mut scope = env.borrow_mut();
            if let Some(binding) = scope.bindings.get_mut(name) {
                if !binding.mutable {
                    return Err(Diagnostic::runtime(format!(
                        "cannot assign to immutable binding `{name}`"
                    ))
                    .with_span(span)
                    .into());
                }
                binding.value = value;
                return Ok(());
            }
            scope.parent.clone()
        };
        match parent {
            Some(parent) => Environment::assign(&parent, name, value, span),
            None => Err(undefined(name, span)),
        }
    }

    pub fn get(env: &EnvironmentRef, name: &str, span: SourceSpan) -> Result<Value> {
        Environment::lookup(env, name).ok_or_else(|| undefined(name, span))
    }

    pub fn lookup(env: &EnvironmentRef, name: &str) -> Option<Value> {
        let scope = env.borrow();
        if let Some(binding) = scope.bindings.get(name) {
            return Some(binding.value.clone());
        }
        let parent = scope.parent.clone()?;
        drop(scope);
        Environment::lookup(&parent, name)
    }
}

fn undefined(name: &str, span: SourceSpan) -> crate::diagnostics::ResinError {
    Diagnostic::runtime(format!("undefined variable `{name}`"))
        .with_span(span)
        .into()
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}
