use std::{path::Path, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Literal, Program, Stmt, StmtKind, UnaryOp},
    config::HostConfig,
    diagnostics::{Diagnostic, ResinError, Result, SourceSpan},
    environment::{Environment, EnvironmentRef},
    host, host_error,
    loader::{self, ScriptSource},
    parser, resolver,
    search_path::SearchPath,
    stdlib, throw,
    value::{UserFunction, Value, ValueKind},
};

/// Per-interpreter bookkeeping that outlives a single statement.
#[derive(Default)]
pub struct ExecutionContext {
    scripts: Vec<String>,
    /// Failure recorded by a native entry point before it returned `false`.
    pending: Option<ResinError>,
}

pub struct Interpreter {
    env: EnvironmentRef,
    globals: EnvironmentRef,
    search_path: SearchPath,
    context: ExecutionContext,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        let globals = Environment::new();
        let search_path = SearchPath::new(config.search_path);
        host::install(&globals, &search_path, &config.arguments);
        stdlib::install(&globals);
        Self {
            env: Rc::clone(&globals),
            globals,
            search_path,
            context: ExecutionContext::default(),
        }
    }

    pub fn globals(&self) -> &EnvironmentRef {
        &self.globals
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        self.evaluate_text(source, "<input>")
    }

    /// Evaluates a loaded script in the root namespace. An empty source
    /// evaluates to `true`.
    pub fn eval_script(&mut self, source: ScriptSource) -> Result<Value> {
        if source.is_empty() {
            return Ok(Value::bool(true));
        }
        let origin = source.name().to_string();
        let text = source.into_text()?;
        self.evaluate_text(&text, &origin)
    }

    pub fn run_file(&mut self, path: &Path) -> Result<Value> {
        let source = loader::load_source(Some(path))?;
        self.eval_script(source)
    }

    pub fn load(&mut self, identifier: &str) -> Result<Value> {
        let search_path = self.search_path.clone();
        resolver::load(self, identifier, Some(&search_path))
    }

    pub(crate) fn set_pending(&mut self, error: ResinError) {
        self.context.pending = Some(error);
    }

    #[cfg(feature = "native")]
    pub(crate) fn take_pending(&mut self) -> Option<ResinError> {
        self.context.pending.take()
    }

    fn evaluate_text(&mut self, text: &str, origin: &str) -> Result<Value> {
        tracing::debug!(
            script = origin,
            depth = self.context.scripts.len(),
            "evaluating script"
        );
        self.context.scripts.push(origin.to_string());
        let globals = Rc::clone(&self.globals);
        let result = parser::parse_program(text)
            .map_err(ResinError::from)
            .and_then(|program| self.in_scope(globals, |this| this.run_program(&program)));
        self.context.scripts.pop();
        result.map_err(|err| err.locate(origin, text))
    }

    fn run_program(&mut self, program: &Program) -> Result<Value> {
        let mut last_value = None;
        for stmt in &program.items {
            match self.execute_statement(stmt)? {
                FlowControl::Next => {}
                FlowControl::NextValue(value) => last_value = Some(value),
                FlowControl::Return(value) => return Ok(value),
                FlowControl::Break(_) => {
                    return Err(runtime_error("`break` outside loop", stmt.span));
                }
                FlowControl::Continue => {
                    return Err(runtime_error("`continue` outside loop", stmt.span));
                }
            }
        }
        Ok(last_value.unwrap_or_else(Value::unit))
    }

    /// Runs `body` with `env` as the current scope, restoring the previous
    /// scope whether or not `body` fails.
    fn in_scope<T>(
        &mut self,
        env: EnvironmentRef,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.env, env);
        let result = body(self);
        self.env = previous;
        result
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        match &stmt.kind {
            StmtKind::VarDecl { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::unit(),
                };
                self.env.borrow_mut().define(name.clone(), value, true);
                Ok(FlowControl::Next)
            }
            StmtKind::ConstDecl { name, value } => {
                let evaluated = self.evaluate(value)?;
                self.env.borrow_mut().define(name.clone(), evaluated, false);
                Ok(FlowControl::Next)
            }
            StmtKind::Function { name, params, body } => {
                let function = UserFunction {
                    name: Some(name.clone()),
                    params: params.clone(),
                    body: body.clone(),
                    env: Rc::clone(&self.env),
                };
                self.env.borrow_mut().define(
                    name.clone(),
                    Value::new(ValueKind::Function(function)),
                    false,
                );
                Ok(FlowControl::Next)
            }
            StmtKind::Expr(expr) => Ok(FlowControl::NextValue(self.evaluate(expr)?)),
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_block(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_block(branch)
                } else {
                    Ok(FlowControl::Next)
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_block(body)?.in_loop() {
                        LoopStep::Continue => {}
                        LoopStep::Exit(flow) => return Ok(flow),
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Loop { body } => loop {
                if let LoopStep::Exit(flow) = self.execute_block(body)?.in_loop() {
                    return Ok(flow);
                }
            },
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let iterable_value = self.evaluate(iterable)?;
                for item in self.iterate(&iterable_value, iterable.span)? {
                    let child = Environment::with_parent(Rc::clone(&self.env));
                    child.borrow_mut().define(binding.clone(), item, true);
                    let flow = self.in_scope(child, |this| this.execute_block(body))?;
                    if let LoopStep::Exit(flow) = flow.in_loop() {
                        return Ok(flow);
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Try {
                body,
                binding,
                handler,
            } => match self.execute_block(body) {
                Ok(flow) => Ok(flow),
                Err(err) => {
                    let caught = err.into_script_value()?;
                    tracing::debug!(error = %caught, "caught script error");
                    let scope = Environment::with_parent(Rc::clone(&self.env));
                    if let Some(name) = binding {
                        scope.borrow_mut().define(name.clone(), caught, true);
                    }
                    self.in_scope(scope, |this| this.execute_block(handler))
                }
            },
            StmtKind::Throw(expr) => {
                let value = self.evaluate(expr)?;
                Err(ResinError::thrown(value, stmt.span))
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::unit(),
                };
                Ok(FlowControl::Return(value))
            }
            StmtKind::Break(expr) => {
                let value = match expr {
                    Some(expr) => Some(self.evaluate(expr)?),
                    None => None,
                };
                Ok(FlowControl::Break(value))
            }
            StmtKind::Continue => Ok(FlowControl::Continue),
        }
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let child = Environment::with_parent(Rc::clone(&self.env));
        self.in_scope(child, |this| {
            let mut last_value = None;
            for stmt in statements {
                match this.execute_statement(stmt)? {
                    FlowControl::Next => {}
                    FlowControl::NextValue(value) => last_value = Some(value),
                    other => return Ok(other),
                }
            }
            Ok(last_value.map_or(FlowControl::Next, FlowControl::NextValue))
        })
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Variable(name) => Environment::get(&self.env, name, expr.span),
            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let truthy = self.evaluate(left)?.is_truthy() && self.evaluate(right)?.is_truthy();
                Ok(Value::bool(truthy))
            }
            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let truthy = self.evaluate(left)?.is_truthy() || self.evaluate(right)?.is_truthy();
                Ok(Value::bool(truthy))
            }
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                binary(*op, left_value, right_value, expr.span)
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                unary(*op, value, expr.span)
            }
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                match &target.kind {
                    ExprKind::Variable(name) => {
                        Environment::assign(&self.env, name, value.clone(), target.span)?
                    }
                    ExprKind::Field {
                        target: owner,
                        field,
                    } => self.assign_field(owner, field, value.clone())?,
                    ExprKind::Index {
                        target: owner,
                        index,
                    } => self.assign_index(owner, index, value.clone())?,
                    _ => return Err(runtime_error("invalid assignment target", target.span)),
                }
                Ok(value)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let mut eval_args = Vec::with_capacity(args.len());
                for arg in args {
                    eval_args.push(self.evaluate(arg)?);
                }
                self.call(&callee_value, eval_args, expr.span)
                    .map_err(|err| err.at_call_site(expr.span))
            }
            ExprKind::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::MapLiteral(entries) => {
                let mut map = IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key = map_key(&self.evaluate(key_expr)?, key_expr.span)?;
                    let value = self.evaluate(value_expr)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            ExprKind::Group(inner) => self.evaluate(inner),
            ExprKind::Index { target, index } => {
                let target_value = self.evaluate(target)?;
                let index_value = self.evaluate(index)?;
                index_into(&target_value, &index_value, expr.span)
            }
            ExprKind::Field { target, field } => {
                let target_value = self.evaluate(target)?;
                field_of(&target_value, field, expr.span)
            }
            ExprKind::Lambda { params, body } => Ok(Value::new(ValueKind::Function(UserFunction {
                name: None,
                params: params.clone(),
                body: body.clone(),
                env: Rc::clone(&self.env),
            }))),
        }
    }

    fn call(&mut self, callee: &Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match &*callee.0 {
            ValueKind::NativeFunction(fun) => fun.call(&args),
            ValueKind::Loader(loader) => {
                let identifier = match args.as_slice() {
                    [] => throw!(Evaluation, "no file or module specified"),
                    [name] => name.as_str().ok_or_else(|| {
                        host_error!(
                            Evaluation,
                            "couldn't convert argument of `load` to String, found {}",
                            name.type_name()
                        )
                    })?,
                    _ => throw!(
                        Evaluation,
                        "`load` expected 1 argument but received {}",
                        args.len()
                    ),
                };
                resolver::load(self, identifier, loader.search_path.as_ref())
            }
            ValueKind::Function(fun) => {
                if args.len() != fun.params.len() {
                    return Err(runtime_error(
                        format!(
                            "function `{}` expected {} arguments but received {}",
                            fun.name.as_deref().unwrap_or("anonymous"),
                            fun.params.len(),
                            args.len()
                        ),
                        span,
                    ));
                }
                let scope = Environment::with_parent(Rc::clone(&fun.env));
                for (name, value) in fun.params.iter().zip(args) {
                    scope.borrow_mut().define(name.clone(), value, true);
                }
                self.in_scope(scope, |this| {
                    let mut result = Value::unit();
                    for stmt in &fun.body {
                        match this.execute_statement(stmt)? {
                            FlowControl::Next => {}
                            FlowControl::NextValue(value) => result = value,
                            FlowControl::Return(value) => return Ok(value),
                            FlowControl::Break(_) | FlowControl::Continue => {
                                return Err(runtime_error(
                                    "loop control flow cannot escape a function",
                                    stmt.span,
                                ));
                            }
                        }
                    }
                    Ok(result)
                })
            }
            _ => Err(runtime_error(
                format!("{} value is not callable", callee.type_name()),
                span,
            )),
        }
    }

    fn assign_index(&mut self, target: &Expr, index: &Expr, value: Value) -> Result<()> {
        let target_value = self.evaluate(target)?;
        let index_value = self.evaluate(index)?;
        let updated = match &*target_value.0 {
            ValueKind::SearchPath(path) => {
                let position = position(&index_value, index.span)?;
                let dir = value.as_str().ok_or_else(|| {
                    runtime_error("search path entries must be strings", target.span)
                })?;
                if !path.set(position, dir) {
                    return Err(out_of_bounds(position, index.span));
                }
                return Ok(());
            }
            ValueKind::Array(elements) => {
                let position = position(&index_value, index.span)?;
                if position >= elements.len() {
                    return Err(out_of_bounds(position, index.span));
                }
                let mut elements = elements.clone();
                elements[position] = value;
                Value::array(elements)
            }
            ValueKind::Map(map) => {
                let mut map = map.clone();
                map.insert(map_key(&index_value, index.span)?, value);
                Value::map(map)
            }
            _ => return Err(read_only(&target_value, target.span)),
        };
        self.write_back(target, updated)
    }

    fn assign_field(&mut self, target: &Expr, field: &str, value: Value) -> Result<()> {
        let target_value = self.evaluate(target)?;
        match &*target_value.0 {
            ValueKind::Map(map) => {
                let mut map = map.clone();
                map.insert(field.to_string(), value);
                self.write_back(target, Value::map(map))
            }
            _ => Err(read_only(&target_value, target.span)),
        }
    }

    /// Stores an updated copy of a map or array back into the place it was
    /// read from.
    fn write_back(&mut self, target: &Expr, updated: Value) -> Result<()> {
        match &target.kind {
            ExprKind::Variable(name) => Environment::assign(&self.env, name, updated, target.span),
            ExprKind::Group(inner) => self.write_back(inner, updated),
            ExprKind::Field {
                target: owner,
                field,
            } => self.assign_field(owner, field, updated),
            ExprKind::Index {
                target: owner,
                index,
            } => self.assign_index(owner, index, updated),
            _ => Err(runtime_error(
                "cannot assign to computed expression",
                target.span,
            )),
        }
    }

    fn iterate(&self, value: &Value, span: SourceSpan) -> Result<Vec<Value>> {
        match &*value.0 {
            ValueKind::Array(values) => Ok(values.clone()),
            ValueKind::SearchPath(path) => Ok(path.snapshot().into_iter().map(Value::string).collect()),
            ValueKind::String(text) => Ok(text.chars().map(|c| Value::string(c.to_string())).collect()),
            ValueKind::Map(map) => Ok(map
                .iter()
                .map(|(key, value)| Value::array(vec![Value::string(key.clone()), value.clone()]))
                .collect()),
            _ => Err(runtime_error(
                format!("{} value is not iterable", value.type_name()),
                span,
            )),
        }
    }
}

enum FlowControl {
    Next,
    NextValue(Value),
    Return(Value),
    Break(Option<Value>),
    Continue,
}

enum LoopStep {
    Continue,
    Exit(FlowControl),
}

impl FlowControl {
    /// How a loop reacts to its body finishing with `self`.
    fn in_loop(self) -> LoopStep {
        match self {
            FlowControl::Next | FlowControl::NextValue(_) | FlowControl::Continue => {
                LoopStep::Continue
            }
            FlowControl::Break(None) => LoopStep::Exit(FlowControl::Next),
            FlowControl::Break(Some(value)) => LoopStep::Exit(FlowControl::NextValue(value)),
            FlowControl::Return(value) => LoopStep::Exit(FlowControl::Return(value)),
        }
    }
}

pub(crate) fn runtime_error(message: impl Into<String>, span: SourceSpan) -> ResinError {
    Diagnostic::runtime(message).with_span(span).into()
}

fn out_of_bounds(position: usize, span: SourceSpan) -> ResinError {
    runtime_error(format!("index {position} out of bounds"), span)
}

fn read_only(target: &Value, span: SourceSpan) -> ResinError {
    match &*target.0 {
        ValueKind::Module(module) => runtime_error(
            format!("cannot assign to read-only namespace `{}`", module.name),
            span,
        ),
        _ => runtime_error(
            format!("cannot assign into {} value", target.type_name()),
            span,
        ),
    }
}

fn literal(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::int(*n),
        Literal::Float(n) => Value::float(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::None => Value::unit(),
    }
}

fn position(index: &Value, span: SourceSpan) -> Result<usize> {
    match &*index.0 {
        ValueKind::Int(n) => {
            usize::try_from(*n).map_err(|_| runtime_error(format!("index {n} out of bounds"), span))
        }
        _ => Err(runtime_error(
            format!("index must be Int, found {}", index.type_name()),
            span,
        )),
    }
}

fn map_key(key: &Value, span: SourceSpan) -> Result<String> {
    match &*key.0 {
        ValueKind::String(s) => Ok(s.clone()),
        ValueKind::Int(n) => Ok(n.to_string()),
        _ => Err(runtime_error("map keys must be String or Int", span)),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value, span: SourceSpan) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add if left.as_str().is_some() || right.as_str().is_some() => {
            Ok(Value::string(format!("{left}{right}")))
        }
        Add => numeric(&left, &right, span, |a, b| a + b),
        Sub => numeric(&left, &right, span, |a, b| a - b),
        Mul => numeric(&left, &right, span, |a, b| a * b),
        Div => numeric(&left, &right, span, |a, b| a / b),
        Mod => numeric(&left, &right, span, |a, b| a % b),
        Equal => Ok(Value::bool(equal(&left, &right))),
        NotEqual => Ok(Value::bool(!equal(&left, &right))),
        Less => comparison(&left, &right, span, |a, b| a < b),
        LessEqual => comparison(&left, &right, span, |a, b| a <= b),
        Greater => comparison(&left, &right, span, |a, b| a > b),
        GreaterEqual => comparison(&left, &right, span, |a, b| a >= b),
        And => Ok(Value::bool(left.is_truthy() && right.is_truthy())),
        Or => Ok(Value::bool(left.is_truthy() || right.is_truthy())),
    }
}

fn unary(op: UnaryOp, value: Value, span: SourceSpan) -> Result<Value> {
    match op {
        UnaryOp::Negate => match &*value.0 {
            ValueKind::Int(n) => n
                .checked_neg()
                .map(Value::int)
                .ok_or_else(|| runtime_error("integer overflow", span)),
            ValueKind::Float(n) => Ok(Value::float(-n)),
            _ => Err(runtime_error("unary `-` expects numeric value", span)),
        },
        UnaryOp::Not => Ok(Value::bool(!value.is_truthy())),
    }
}

fn numeric(
    left: &Value,
    right: &Value,
    span: SourceSpan,
    func: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    let result = func(number(left, span)?, number(right, span)?);
    if left.is_int() && right.is_int() && result.fract() == 0.0 {
        Ok(Value::int(result as i64))
    } else {
        Ok(Value::float(result))
    }
}

fn comparison(
    left: &Value,
    right: &Value,
    span: SourceSpan,
    cmp: impl Fn(f64, f64) -> bool,
) -> Result<Value> {
    Ok(Value::bool(cmp(number(left, span)?, number(right, span)?)))
}

fn number(value: &Value, span: SourceSpan) -> Result<f64> {
    match &*value.0 {
        ValueKind::Int(n) => Ok(*n as f64),
        ValueKind::Float(n) => Ok(*n),
        _ => Err(runtime_error(
            format!("expected numeric value, found {}", value.type_name()),
            span,
        )),
    }
}

fn index_into(target: &Value, index: &Value, span: SourceSpan) -> Result<Value> {
    match &*target.0 {
        ValueKind::Array(values) => {
            let position = position(index, span)?;
            values
                .get(position)
                .cloned()
                .ok_or_else(|| out_of_bounds(position, span))
        }
        ValueKind::SearchPath(path) => {
            let position = position(index, span)?;
            path.get(position)
                .map(Value::string)
                .ok_or_else(|| out_of_bounds(position, span))
        }
        ValueKind::String(text) => {
            let position = position(index, span)?;
            text.chars()
                .nth(position)
                .map(|ch| Value::string(ch.to_string()))
                .ok_or_else(|| out_of_bounds(position, span))
        }
        ValueKind::Map(map) => {
            let key = map_key(index, span)?;
            map.get(&key)
                .cloned()
                .ok_or_else(|| runtime_error(format!("missing key `{key}`"), span))
        }
        _ => Err(runtime_error(
            format!("{} value cannot be indexed", target.type_name()),
            span,
        )),
    }
}

fn field_of(target: &Value, field: &str, span: SourceSpan) -> Result<Value> {
    let found = match &*target.0 {
        ValueKind::Map(map) => map.get(field).cloned(),
        ValueKind::Module(module) => module.exports.get(field).cloned(),
        ValueKind::Error(error) => match field {
            "name" => Some(Value::string(error.name.clone())),
            "message" => Some(Value::string(error.message.clone())),
            "kind" => Some(error.kind.map_or_else(Value::unit, |kind| Value::string(kind.as_str()))),
            _ => None,
        },
        ValueKind::Loader(loader) if field == "path" => Some(
            loader
                .search_path
                .clone()
                .map_or_else(Value::unit, |path| Value::new(ValueKind::SearchPath(path))),
        ),
        _ => {
            return Err(runtime_error(
                format!("{} value has no fields", target.type_name()),
                span,
            ));
        }
    };
    found.ok_or_else(|| runtime_error(format!("missing field `{field}`"), span))
}

fn equal(left: &Value, right: &Value) -> bool {
    match (&*left.0, &*right.0) {
        (ValueKind::Unit, ValueKind::Unit) => true,
        (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
        (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
        (ValueKind::Float(a), ValueKind::Float(b)) => (*a - *b).abs() < f64::EPSILON,
        (ValueKind::Int(a), ValueKind::Float(b)) | (ValueKind::Float(b), ValueKind::Int(a)) => {
            (*a as f64 - *b).abs() < f64::EPSILON
        }
        (ValueKind::String(a), ValueKind::String(b)) => a == b,
        (ValueKind::Error(a), ValueKind::Error(b)) => a == b,
        (ValueKind::SearchPath(a), ValueKind::SearchPath(b)) => a.same_as(b),
        (ValueKind::Array(a), ValueKind::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(l, r)| equal(l, r))
        }
        (ValueKind::Map(a), ValueKind::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|rhs| equal(value, rhs)))
        }
        _ => false,
    }
}
