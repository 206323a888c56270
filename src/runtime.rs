use std::{cell::RefCell, io::Write, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, Field, FunctionDecl, Literal, LogicalOp, MatchArm,
        MatchPattern, Program, Stmt, StmtKind, TypeName, UnaryOp,
    },
    checker,
    diagnostics::{Diagnostic, Result, RuntimeErrorKind, SiuError, SourceSpan},
    environment::{Environment, EnvironmentRef},
    parser,
    value::{Closure, StructValue, Value, ValueKind, VariantValue},
};

/// Resource limits for one interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Maximum number of nested user function calls.
    pub max_call_depth: usize,
    /// Maximum nesting of statements and expressions being evaluated at once,
    /// across calls. Bounds the native stack the evaluator may use.
    pub max_eval_depth: usize,
    /// Evaluation steps allowed per program; `None` is unbounded.
    pub max_steps: Option<u64>,
}

pub const DEFAULT_MAX_CALL_DEPTH: usize = 100;
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 256;

/// Name of the function `run_source` calls after the top level.
pub const MAIN_FUNCTION: &str = "main";

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
            max_steps: None,
        }
    }
}

/// A user-defined `struct` or `variant`.
#[derive(Debug)]
pub enum TypeDef {
    Struct { name: String, fields: Vec<Field> },
    Variant { name: String, cases: Vec<Field> },
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Struct { name, .. } | TypeDef::Variant { name, .. } => name,
        }
    }
}

pub struct Interpreter {
    env: EnvironmentRef,
    globals: EnvironmentRef,
    types: IndexMap<String, Rc<TypeDef>>,
    output: Box<dyn Write>,
    config: InterpreterConfig,
    call_depth: usize,
    eval_depth: usize,
    steps: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let prelude = Environment::new();
        crate::stdlib::install(&prelude);
        let globals = Environment::with_parent(prelude);
        Self {
            env: Rc::clone(&globals),
            globals,
            types: IndexMap::new(),
            output: Box::new(std::io::stdout()),
            config,
            call_depth: 0,
            eval_depth: 0,
            steps: 0,
        }
    }

    /// Redirects `print` output.
    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.output = output;
        self
    }

    /// The frame top-level declarations live in. It persists across evaluations.
    pub fn globals(&self) -> &EnvironmentRef {
        &self.globals
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values().map(|def| def.as_ref())
    }

    /// Parses, checks and evaluates `source`; errors carry an excerpt of it.
    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let result = parser::parse_program(source)
            .and_then(|program| checker::check_program(&program).map(|()| program))
            .map_err(SiuError::from)
            .and_then(|program| self.eval_program(&program));
        result.map_err(|err| err.with_source(source))
    }

    /// Evaluates `source` as a script: the top level first, then `main()` when the
    /// globals bind it to a user function without parameters. The result is what
    /// `main` returns, or the top-level result for scripts without one.
    pub fn run_source(&mut self, source: &str) -> Result<Value> {
        let top_level = self.eval_source(source)?;
        let entry = match self.globals.borrow().get_local(MAIN_FUNCTION) {
            Some(value) if is_entry_point(&value) => value,
            _ => return Ok(top_level),
        };
        let span = match &*entry.0 {
            ValueKind::Function(closure) => closure.decl.span,
            _ => SourceSpan::default(),
        };
        tracing::debug!(entry = MAIN_FUNCTION, "calling entry point");
        self.env = Rc::clone(&self.globals);
        let result = self.call(&entry, Vec::new(), span);
        self.output.flush()?;
        result.map_err(|err| err.with_source(source))
    }

    /// Runs `program` against the global frame. The result is the value of the last
    /// top-level statement that produced one, or `null`.
    pub fn eval_program(&mut self, program: &Program) -> Result<Value> {
        self.env = Rc::clone(&self.globals);
        self.call_depth = 0;
        self.eval_depth = 0;
        self.steps = 0;
        tracing::debug!(statements = program.items.len(), "evaluating program");
        let mut last_value: Option<Value> = None;
        for stmt in &program.items {
            match self.execute_statement(stmt)? {
                Flow::Next => {}
                Flow::Value(value) => last_value = Some(value),
                Flow::Return(_, span) => {
                    return Err(control_flow("`return` outside of a function", span));
                }
                Flow::Break(span) => return Err(control_flow("`break` outside of a loop", span)),
                Flow::Continue(span) => {
                    return Err(control_flow("`continue` outside of a loop", span));
                }
            }
        }
        self.output.flush()?;
        tracing::debug!(steps = self.steps, "program finished");
        Ok(last_value.unwrap_or_else(Value::null))
    }

    fn tick(&mut self, span: SourceSpan) -> Result<()> {
        self.steps += 1;
        match self.config.max_steps {
            Some(limit) if self.steps > limit => Err(Diagnostic::runtime(
                RuntimeErrorKind::StepLimit,
                format!("evaluation exceeded the limit of {limit} steps"),
            )
            .with_span(span)
            .into()),
            _ => Ok(()),
        }
    }

    /// Runs `body` one level deeper in the evaluation, failing once the nesting budget is spent.
    fn descend<T>(
        &mut self,
        span: SourceSpan,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.eval_depth >= self.config.max_eval_depth {
            return Err(eval_depth_exceeded(self.config.max_eval_depth, span));
        }
        self.eval_depth += 1;
        let result = body(self);
        self.eval_depth -= 1;
        result
    }

    /// Runs `body` with `env` as the current frame, restoring the previous frame afterwards.
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

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.tick(stmt.span)?;
        self.descend(stmt.span, |this| this.execute_statement_inner(stmt))
    }

    fn execute_statement_inner(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::VarDecl {
                name,
                ty,
                constant,
                initializer,
            } => {
                let value = self.evaluate(initializer)?;
                let value =
                    self.check_type(value, ty, initializer.span, &format!("variable `{name}`"))?;
                self.env
                    .borrow_mut()
                    .define(name, value, ty.clone(), *constant, stmt.span)?;
                Ok(Flow::Next)
            }
            StmtKind::Function(decl) => {
                let name = decl.name.as_deref().unwrap_or_default();
                let function = self.closure(decl);
                self.env
                    .borrow_mut()
                    .define(name, function, TypeName::Fn, true, stmt.span)?;
                Ok(Flow::Next)
            }
            StmtKind::StructDef { name, fields } => {
                self.define_type(
                    TypeDef::Struct {
                        name: name.clone(),
                        fields: fields.clone(),
                    },
                    fields,
                    stmt.span,
                )?;
                Ok(Flow::Next)
            }
            StmtKind::VariantDef { name, cases } => {
                self.define_type(
                    TypeDef::Variant {
                        name: name.clone(),
                        cases: cases.clone(),
                    },
                    cases,
                    stmt.span,
                )?;
                Ok(Flow::Next)
            }
            StmtKind::Expr(expr) => Ok(Flow::Value(self.evaluate(expr)?)),
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                branches,
                else_branch,
            } => {
                for (condition, body) in branches {
                    if self.condition(condition, "`if` condition")? {
                        return self.execute_block(body);
                    }
                }
                match else_branch {
                    Some(body) => self.execute_block(body),
                    None => Ok(Flow::Next),
                }
            }
            StmtKind::While { condition, body } => {
                while self.condition(condition, "`while` condition")? {
                    match self.execute_block(body)? {
                        Flow::Next | Flow::Value(_) | Flow::Continue(_) => {}
                        Flow::Break(_) => break,
                        flow @ Flow::Return(..) => return Ok(flow),
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => self.execute_for(binding, iterable, body),
            StmtKind::Match { subject, arms } => self.execute_match(subject, arms),
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::null(),
                };
                Ok(Flow::Return(value, stmt.span))
            }
            StmtKind::Break => Ok(Flow::Break(stmt.span)),
            StmtKind::Continue => Ok(Flow::Continue(stmt.span)),
        }
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<Flow> {
        let child = Environment::with_parent(Rc::clone(&self.env));
        self.in_scope(child, |this| this.execute_statements(statements))
    }

    /// Runs statements in the current frame, stopping at the first control signal.
    fn execute_statements(&mut self, statements: &[Stmt]) -> Result<Flow> {
        let mut last_value: Option<Value> = None;
        for stmt in statements {
            match self.execute_statement(stmt)? {
                Flow::Next => {}
                Flow::Value(value) => last_value = Some(value),
                other => return Ok(other),
            }
        }
        Ok(last_value.map_or(Flow::Next, Flow::Value))
    }

    fn execute_for(&mut self, binding: &str, iterable: &Expr, body: &[Stmt]) -> Result<Flow> {
        let value = self.evaluate(iterable)?;
        for item in self.iterate(&value, iterable.span)? {
            let frame = Environment::with_parent(Rc::clone(&self.env));
            frame
                .borrow_mut()
                .define(binding, item, TypeName::Var, false, iterable.span)?;
            match self.in_scope(frame, |this| this.execute_statements(body))? {
                Flow::Next | Flow::Value(_) | Flow::Continue(_) => {}
                Flow::Break(_) => break,
                flow @ Flow::Return(..) => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn execute_match(&mut self, subject: &Expr, arms: &[MatchArm]) -> Result<Flow> {
        let value = self.evaluate(subject)?;
        let ValueKind::Variant(variant) = &*value.0 else {
            return Err(type_mismatch(
                format!("`match` expects a variant, found `{}`", value.type_name()),
                subject.span,
            ));
        };
        if let Some(TypeDef::Variant { cases, .. }) = self.types.get(&variant.name).map(Rc::as_ref)
        {
            for arm in arms {
                if let MatchPattern::Case { case, .. } = &arm.pattern {
                    if !cases.iter().any(|declared| &declared.name == case) {
                        return Err(Diagnostic::runtime(
                            RuntimeErrorKind::UnknownField,
                            format!("variant `{}` has no case `{case}`", variant.name),
                        )
                        .with_span(arm.span)
                        .into());
                    }
                }
            }
        }
        for arm in arms {
            match &arm.pattern {
                MatchPattern::Wildcard => return self.execute_block(&arm.body),
                MatchPattern::Case { case, binding } if *case == variant.case => {
                    let frame = Environment::with_parent(Rc::clone(&self.env));
                    frame.borrow_mut().define(
                        binding,
                        variant.value.clone(),
                        TypeName::Var,
                        false,
                        arm.span,
                    )?;
                    return self.in_scope(frame, |this| this.execute_statements(&arm.body));
                }
                MatchPattern::Case { .. } => {}
            }
        }
        Ok(Flow::Next)
    }

    fn define_type(&mut self, def: TypeDef, members: &[Field], span: SourceSpan) -> Result<()> {
        let name = def.name().to_string();
        if self.types.contains_key(&name) {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::Redeclaration,
                format!("type `{name}` is already defined"),
            )
            .with_span(span)
            .into());
        }
        for member in members {
            if let TypeName::Custom(referenced) = &member.ty {
                if *referenced != name && !self.types.contains_key(referenced) {
                    return Err(undefined_type(referenced, member.span));
                }
            }
        }
        tracing::debug!(%name, members = members.len(), "registered type");
        self.types.insert(name, Rc::new(def));
        Ok(())
    }

    fn lookup_type(&self, name: &str, span: SourceSpan) -> Result<Rc<TypeDef>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| undefined_type(name, span))
    }

    /// Converts `value` for a slot of type `ty`, or reports which slot rejected it.
    fn check_type(
        &self,
        value: Value,
        ty: &TypeName,
        span: SourceSpan,
        slot: &str,
    ) -> Result<Value> {
        if let TypeName::Custom(name) = ty {
            self.lookup_type(name, span)?;
        }
        value.coerce_to(ty).ok_or_else(|| {
            type_mismatch(
                format!("{slot} expects `{ty}`, found `{}`", value.type_name()),
                span,
            )
        })
    }

    fn condition(&mut self, expr: &Expr, what: &str) -> Result<bool> {
        self.evaluate(expr)?.expect_bool(what, expr.span)
    }

    fn closure(&self, decl: &Rc<FunctionDecl>) -> Value {
        Value::new(ValueKind::Function(Closure {
            decl: Rc::clone(decl),
            env: Rc::clone(&self.env),
        }))
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        self.tick(expr.span)?;
        self.descend(expr.span, |this| this.evaluate_inner(expr))
    }

    fn evaluate_inner(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Variable(name) => Environment::get(&self.env, name, expr.span),
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                binary(*op, &left_value, &right_value, expr.span)
            }
            ExprKind::Logical { op, left, right } => {
                let left_value = self.condition(left, "logical operand")?;
                let short_circuit = match op {
                    LogicalOp::And => !left_value,
                    LogicalOp::Or => left_value,
                };
                if short_circuit {
                    return Ok(Value::bool(left_value));
                }
                Ok(Value::bool(self.condition(right, "logical operand")?))
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                unary(*op, &value, expr.span)
            }
            ExprKind::Cast { ty, expr: operand } => {
                let value = self.evaluate(operand)?;
                cast(&value, ty, expr.span)
            }
            ExprKind::Copy(operand) => self.evaluate(operand)?.deep_copy(expr.span),
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                self.assign(target, value)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate(arg)?);
                }
                self.call(&callee_value, arg_values, expr.span)
            }
            ExprKind::Index { target, index } => {
                let target_value = self.evaluate(target)?;
                let index_value = self.evaluate(index)?;
                self.index(&target_value, &index_value, index.span)
            }
            ExprKind::Field { target, field } => {
                let target_value = self.evaluate(target)?;
                self.field(&target_value, field, expr.span)
            }
            ExprKind::List(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::StructLiteral { name, values } => self.construct_struct(name, values, expr.span),
            ExprKind::VariantLiteral { name, case, value } => {
                self.construct_variant(name, case, value, expr.span)
            }
            ExprKind::Lambda(decl) => Ok(self.closure(decl)),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<Value> {
        match &target.kind {
            ExprKind::Variable(name) => Environment::assign(&self.env, name, value, target.span),
            ExprKind::Field {
                target: owner,
                field,
            } => {
                let owner_value = self.evaluate(owner)?;
                let ValueKind::Struct(instance) = &*owner_value.0 else {
                    return Err(type_mismatch(
                        format!(
                            "field assignment expects a struct, found `{}`",
                            owner_value.type_name()
                        ),
                        owner.span,
                    ));
                };
                let def = self.lookup_type(&instance.name, owner.span)?;
                let field_type = match def.as_ref() {
                    TypeDef::Struct { fields, .. } => {
                        fields.iter().find(|f| &f.name == field).map(|f| &f.ty)
                    }
                    TypeDef::Variant { .. } => None,
                };
                let Some(field_type) = field_type else {
                    return Err(unknown_field(&instance.name, field, target.span));
                };
                let stored = self.check_type(
                    value,
                    field_type,
                    target.span,
                    &format!("field `{}.{field}`", instance.name),
                )?;
                instance
                    .fields
                    .borrow_mut()
                    .insert(field.clone(), stored.clone());
                Ok(stored)
            }
            ExprKind::Index {
                target: owner,
                index,
            } => {
                let owner_value = self.evaluate(owner)?;
                let index_value = self.evaluate(index)?;
                match &*owner_value.0 {
                    ValueKind::List(values) => {
                        let mut values = values.borrow_mut();
                        let slot = list_index(&index_value, values.len(), index.span)?;
                        values[slot] = value.clone();
                        Ok(value)
                    }
                    ValueKind::String(_) => Err(Diagnostic::runtime(
                        RuntimeErrorKind::InvalidOperation,
                        "strings are immutable",
                    )
                    .with_span(target.span)
                    .into()),
                    _ => Err(type_mismatch(
                        format!(
                            "index assignment expects a list, found `{}`",
                            owner_value.type_name()
                        ),
                        owner.span,
                    )),
                }
            }
            _ => Err(Diagnostic::runtime(
                RuntimeErrorKind::InvalidOperation,
                "invalid assignment target",
            )
            .with_span(target.span)
            .into()),
        }
    }

    pub fn call(&mut self, callee: &Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match &*callee.0 {
            ValueKind::NativeFunction(native) => {
                tracing::trace!(function = native.name, args = args.len(), "native call");
                native.call(&mut *self.output, &args, span)
            }
            ValueKind::Function(closure) => self.call_closure(closure, args, span),
            _ => Err(Diagnostic::runtime(
                RuntimeErrorKind::NotCallable,
                format!("value of type `{}` is not callable", callee.type_name()),
            )
            .with_span(span)
            .into()),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        let decl = Rc::clone(&closure.decl);
        let name = decl.name.as_deref().unwrap_or("anonymous function");
        if args.len() != decl.params.len() {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::ArityMismatch,
                format!(
                    "`{name}` expected {} arguments but received {}",
                    decl.params.len(),
                    args.len()
                ),
            )
            .with_span(span)
            .into());
        }
        if self.call_depth >= self.config.max_call_depth {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::RecursionLimit,
                format!(
                    "call depth exceeded the limit of {}",
                    self.config.max_call_depth
                ),
            )
            .with_span(span)
            .with_note(format!("while calling `{name}`"))
            .into());
        }

        let frame = Environment::with_parent(Rc::clone(&closure.env));
        for (param, arg) in decl.params.iter().zip(args) {
            let value =
                self.check_type(arg, &param.ty, span, &format!("parameter `{}`", param.name))?;
            frame
                .borrow_mut()
                .define(&param.name, value, param.ty.clone(), false, param.span)?;
        }

        tracing::trace!(function = name, depth = self.call_depth + 1, "call");
        self.call_depth += 1;
        let flow = self.in_scope(frame, |this| this.execute_statements(&decl.body));
        self.call_depth -= 1;

        match (flow?, &decl.return_type) {
            (Flow::Return(value, _), None) => Ok(value),
            (Flow::Return(value, return_span), Some(ty)) => {
                self.check_type(value, ty, return_span, &format!("return type of `{name}`"))
            }
            (Flow::Next | Flow::Value(_), None | Some(TypeName::Var)) => Ok(Value::null()),
            (Flow::Next | Flow::Value(_), Some(ty)) => Err(Diagnostic::runtime(
                RuntimeErrorKind::MissingReturn,
                format!("`{name}` finished without returning a value of type `{ty}`"),
            )
            .with_span(span)
            .into()),
            (Flow::Break(escaped), _) => {
                Err(control_flow("`break` cannot leave a function body", escaped))
            }
            (Flow::Continue(escaped), _) => {
                Err(control_flow("`continue` cannot leave a function body", escaped))
            }
        }
    }

    fn construct_struct(&mut self, name: &str, values: &[Expr], span: SourceSpan) -> Result<Value> {
        let def = self.lookup_type(name, span)?;
        let TypeDef::Struct { fields, .. } = def.as_ref() else {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::InvalidOperation,
                format!("`{name}` is a variant, not a struct"),
            )
            .with_span(span)
            .with_note(format!("construct it with `{name}::case(value)`"))
            .into());
        };
        if values.len() != fields.len() {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::ArityMismatch,
                format!(
                    "struct `{name}` has {} members but {} values were given",
                    fields.len(),
                    values.len()
                ),
            )
            .with_span(span)
            .into());
        }
        let mut members = IndexMap::with_capacity(fields.len());
        for (field, expr) in fields.iter().zip(values) {
            let value = self.evaluate(expr)?;
            let value = self.check_type(
                value,
                &field.ty,
                expr.span,
                &format!("field `{name}.{}`", field.name),
            )?;
            members.insert(field.name.clone(), value);
        }
        Ok(Value::new(ValueKind::Struct(StructValue {
            name: name.to_string(),
            fields: RefCell::new(members),
        })))
    }

    fn construct_variant(
        &mut self,
        name: &str,
        case: &str,
        payload: &Expr,
        span: SourceSpan,
    ) -> Result<Value> {
        let def = self.lookup_type(name, span)?;
        let TypeDef::Variant { cases, .. } = def.as_ref() else {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::InvalidOperation,
                format!("`{name}` is a struct, not a variant"),
            )
            .with_span(span)
            .into());
        };
        let Some(declared) = cases.iter().find(|declared| declared.name == case) else {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::UnknownField,
                format!("variant `{name}` has no case `{case}`"),
            )
            .with_span(span)
            .into());
        };
        let value = self.evaluate(payload)?;
        let value = self.check_type(
            value,
            &declared.ty,
            payload.span,
            &format!("case `{name}::{case}`"),
        )?;
        Ok(Value::new(ValueKind::Variant(VariantValue {
            name: name.to_string(),
            case: case.to_string(),
            value,
        })))
    }

    fn index(&self, target: &Value, index: &Value, span: SourceSpan) -> Result<Value> {
        match &*target.0 {
            ValueKind::List(values) => {
                let values = values.borrow();
                let slot = list_index(index, values.len(), span)?;
                Ok(values[slot].clone())
            }
            ValueKind::String(text) => {
                let slot = list_index(index, text.chars().count(), span)?;
                let ch = text.chars().nth(slot).map(String::from).unwrap_or_default();
                Ok(Value::string(ch))
            }
            _ => Err(type_mismatch(
                format!("cannot index into `{}`", target.type_name()),
                span,
            )),
        }
    }

    fn field(&self, target: &Value, field: &str, span: SourceSpan) -> Result<Value> {
        match &*target.0 {
            ValueKind::Struct(instance) => instance
                .fields
                .borrow()
                .get(field)
                .cloned()
                .ok_or_else(|| unknown_field(&instance.name, field, span)),
            _ => Err(type_mismatch(
                format!("field access expects a struct, found `{}`", target.type_name()),
                span,
            )),
        }
    }

    fn iterate(&self, value: &Value, span: SourceSpan) -> Result<Vec<Value>> {
        match &*value.0 {
            ValueKind::List(values) => Ok(values.borrow().clone()),
            ValueKind::String(text) => Ok(text.chars().map(Value::string).collect()),
            _ => Err(type_mismatch(
                format!("cannot iterate over `{}`", value.type_name()),
                span,
            )),
        }
    }
}

fn is_entry_point(value: &Value) -> bool {
    matches!(&*value.0, ValueKind::Function(closure) if closure.decl.params.is_empty())
}

/// Result of executing a statement. Control signals carry the span of the
/// statement that raised them so an escaping signal can be reported.
enum Flow {
    Next,
    Value(Value),
    Return(Value, SourceSpan),
    Break(SourceSpan),
    Continue(SourceSpan),
}

fn literal(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::int(*n),
        Literal::Float(n) => Value::float(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Null => Value::null(),
    }
}

enum Operands {
    Int(i64, i64),
    Float(f64, f64),
}

fn numeric_operands(op: BinaryOp, left: &Value, right: &Value, span: SourceSpan) -> Result<Operands> {
    match (&*left.0, &*right.0) {
        (ValueKind::Int(a), ValueKind::Int(b)) => Ok(Operands::Int(*a, *b)),
        (ValueKind::Int(a), ValueKind::Float(b)) => Ok(Operands::Float(*a as f64, *b)),
        (ValueKind::Float(a), ValueKind::Int(b)) => Ok(Operands::Float(*a, *b as f64)),
        (ValueKind::Float(a), ValueKind::Float(b)) => Ok(Operands::Float(*a, *b)),
        _ => Err(type_mismatch(
            format!(
                "`{}` cannot be applied to `{}` and `{}`",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value, span: SourceSpan) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add => {
            if let (ValueKind::String(a), ValueKind::String(b)) = (&*left.0, &*right.0) {
                return Ok(Value::string(format!("{a}{b}")));
            }
            arithmetic(op, left, right, span)
        }
        Sub | Mul | Div | Mod => arithmetic(op, left, right, span),
        Equal => Ok(Value::bool(values_equal(left, right, span)?)),
        NotEqual => Ok(Value::bool(!values_equal(left, right, span)?)),
        Less | LessEqual | Greater | GreaterEqual => {
            let ordering = match numeric_operands(op, left, right, span)? {
                Operands::Int(a, b) => a.partial_cmp(&b),
                Operands::Float(a, b) => a.partial_cmp(&b),
            };
            let result = ordering.is_some_and(|ordering| match op {
                Less => ordering.is_lt(),
                LessEqual => ordering.is_le(),
                Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            });
            Ok(Value::bool(result))
        }
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value, span: SourceSpan) -> Result<Value> {
    use BinaryOp::*;
    match numeric_operands(op, left, right, span)? {
        Operands::Int(a, b) => {
            if matches!(op, Div | Mod) && b == 0 {
                return Err(division_by_zero(span));
            }
            let result = match op {
                Add => a.checked_add(b),
                Sub => a.checked_sub(b),
                Mul => a.checked_mul(b),
                Div => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result.map(Value::int).ok_or_else(|| {
                Diagnostic::runtime(
                    RuntimeErrorKind::Overflow,
                    format!("integer overflow in `{a} {} {b}`", op.symbol()),
                )
                .with_span(span)
                .into()
            })
        }
        Operands::Float(a, b) => {
            if matches!(op, Div | Mod) && b == 0.0 {
                return Err(division_by_zero(span));
            }
            let result = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            };
            Ok(Value::float(result))
        }
    }
}

fn values_equal(left: &Value, right: &Value, span: SourceSpan) -> Result<bool> {
    match (&*left.0, &*right.0) {
        (ValueKind::Unit, ValueKind::Unit) => Ok(true),
        (ValueKind::Unit, _) | (_, ValueKind::Unit) => Ok(false),
        (ValueKind::Bool(a), ValueKind::Bool(b)) => Ok(a == b),
        (ValueKind::String(a), ValueKind::String(b)) => Ok(a == b),
        (ValueKind::Int(a), ValueKind::Int(b)) => Ok(a == b),
        (ValueKind::Int(_) | ValueKind::Float(_), ValueKind::Int(_) | ValueKind::Float(_)) => {
            match numeric_operands(BinaryOp::Equal, left, right, span)? {
                Operands::Float(a, b) => Ok(a == b),
                Operands::Int(a, b) => Ok(a == b),
            }
        }
        _ => Err(type_mismatch(
            format!(
                "cannot compare `{}` with `{}`",
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

fn unary(op: UnaryOp, value: &Value, span: SourceSpan) -> Result<Value> {
    match (op, &*value.0) {
        (UnaryOp::Negate, ValueKind::Int(n)) => n.checked_neg().map(Value::int).ok_or_else(|| {
            Diagnostic::runtime(RuntimeErrorKind::Overflow, format!("integer overflow in `-{n}`"))
                .with_span(span)
                .into()
        }),
        (UnaryOp::Negate, ValueKind::Float(n)) => Ok(Value::float(-n)),
        (UnaryOp::Not, ValueKind::Bool(b)) => Ok(Value::bool(!b)),
        (UnaryOp::Negate, _) => Err(type_mismatch(
            format!("unary `-` expects a number, found `{}`", value.type_name()),
            span,
        )),
        (UnaryOp::Not, _) => Err(type_mismatch(
            format!("`not` expects `bool`, found `{}`", value.type_name()),
            span,
        )),
    }
}

fn cast(value: &Value, ty: &TypeName, span: SourceSpan) -> Result<Value> {
    let invalid = || -> SiuError {
        Diagnostic::runtime(
            RuntimeErrorKind::InvalidCast,
            format!("cannot cast `{}` to `{ty}`", value.type_name()),
        )
        .with_span(span)
        .into()
    };
    match (ty, &*value.0) {
        (TypeName::Int, ValueKind::Int(n)) => Ok(Value::int(*n)),
        (TypeName::Int, ValueKind::Float(n)) => {
            // i64 covers [-2^63, 2^63)
            const BOUND: f64 = 9_223_372_036_854_775_808.0;
            let truncated = n.trunc();
            if !(-BOUND..BOUND).contains(&truncated) {
                return Err(Diagnostic::runtime(
                    RuntimeErrorKind::Overflow,
                    format!("{n:?} does not fit in an `int`"),
                )
                .with_span(span)
                .into());
            }
            Ok(Value::int(truncated as i64))
        }
        (TypeName::Int, ValueKind::Bool(b)) => Ok(Value::int(i64::from(*b))),
        (TypeName::Int, ValueKind::String(s)) => {
            s.trim().parse::<i64>().map(Value::int).map_err(|_| invalid())
        }
        (TypeName::Float, ValueKind::Int(n)) => Ok(Value::float(*n as f64)),
        (TypeName::Float, ValueKind::Float(n)) => Ok(Value::float(*n)),
        (TypeName::Float, ValueKind::Bool(b)) => Ok(Value::float(if *b { 1.0 } else { 0.0 })),
        (TypeName::Float, ValueKind::String(s)) => {
            s.trim().parse::<f64>().map(Value::float).map_err(|_| invalid())
        }
        (TypeName::String, _) => Ok(Value::string(value.to_string())),
        (TypeName::Bool, ValueKind::Bool(b)) => Ok(Value::bool(*b)),
        (TypeName::Bool, ValueKind::Int(n)) => Ok(Value::bool(*n != 0)),
        (TypeName::Bool, ValueKind::Float(n)) => Ok(Value::bool(*n != 0.0)),
        (TypeName::Bool, ValueKind::String(s)) => Ok(Value::bool(!s.is_empty())),
        _ => Err(invalid()),
    }
}

fn list_index(index: &Value, len: usize, span: SourceSpan) -> Result<usize> {
    let ValueKind::Int(n) = &*index.0 else {
        return Err(type_mismatch(
            format!("index must be `int`, found `{}`", index.type_name()),
            span,
        ));
    };
    usize::try_from(*n)
        .ok()
        .filter(|slot| *slot < len)
        .ok_or_else(|| {
            Diagnostic::runtime(
                RuntimeErrorKind::IndexOutOfBounds,
                format!("index {n} out of bounds for length {len}"),
            )
            .with_span(span)
            .into()
        })
}

fn type_mismatch(message: String, span: SourceSpan) -> SiuError {
    Diagnostic::runtime(RuntimeErrorKind::TypeMismatch, message)
        .with_span(span)
        .into()
}

fn eval_depth_exceeded(limit: usize, span: SourceSpan) -> SiuError {
    Diagnostic::runtime(
        RuntimeErrorKind::RecursionLimit,
        format!("evaluation nesting exceeded the limit of {limit}"),
    )
    .with_span(span)
    .into()
}

fn division_by_zero(span: SourceSpan) -> SiuError {
    Diagnostic::runtime(RuntimeErrorKind::DivisionByZero, "division by zero")
        .with_span(span)
        .into()
}

fn control_flow(message: &str, span: SourceSpan) -> SiuError {
    Diagnostic::runtime(RuntimeErrorKind::ControlFlow, message)
        .with_span(span)
        .into()
}

fn undefined_type(name: &str, span: SourceSpan) -> SiuError {
    Diagnostic::runtime(
        RuntimeErrorKind::UndefinedType,
        format!("type `{name}` is not defined"),
    )
    .with_span(span)
    .into()
}

fn unknown_field(owner: &str, field: &str, span: SourceSpan) -> SiuError {
    Diagnostic::runtime(
        RuntimeErrorKind::UnknownField,
        format!("`{owner}` has no field `{field}`"),
    )
    .with_span(span)
    .into()
}
