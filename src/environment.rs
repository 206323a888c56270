use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::TypeName,
    diagnostics::{Diagnostic, Result, RuntimeErrorKind, SourceSpan},
    value::Value,
};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One lexical frame. Lookups and assignments walk outward through `parent`.
#[derive(Default)]
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

    /// Binds `name` in this frame. The value must already conform to `ty`.
    pub fn define(
        &mut self,
        name: &str,
        value: Value,
        ty: TypeName,
        constant: bool,
        span: SourceSpan,
    ) -> Result<()> {
        if self.bindings.contains_key(name) {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::Redeclaration,
                format!("`{name}` is already declared in this scope"),
            )
            .with_span(span)
            .into());
        }
        self.bindings.insert(
            name.to_string(),
            Binding {
                value,
                ty,
                constant,
            },
        );
        Ok(())
    }

    /// Binds a prelude constant, replacing any earlier binding of `name`.
    pub fn define_builtin(&mut self, name: &str, value: Value) {
        self.bindings.insert(
            name.to_string(),
            Binding {
                value,
                ty: TypeName::Fn,
                constant: true,
            },
        );
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).map(|binding| binding.value.clone())
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Updates the nearest binding of `name`, returning the value as stored.
    pub fn assign(env: &EnvironmentRef, name: &str, value: Value, span: SourceSpan) -> Result<Value> {
        let mut frame = env.borrow_mut();
        if let Some(binding) = frame.bindings.get_mut(name) {
            if binding.constant {
                return Err(Diagnostic::runtime(
                    RuntimeErrorKind::ConstAssignment,
                    format!("cannot assign to constant `{name}`"),
                )
                .with_span(span)
                .into());
            }
            let Some(stored) = value.coerce_to(&binding.ty) else {
                return Err(Diagnostic::runtime(
                    RuntimeErrorKind::TypeMismatch,
                    format!(
                        "cannot assign `{}` to `{name}` of type `{}`",
                        value.type_name(),
                        binding.ty
                    ),
                )
                .with_span(span)
                .into());
            };
            binding.value = stored.clone();
            return Ok(stored);
        }
        let parent = frame.parent.clone();
        drop(frame);
        match parent {
            Some(parent) => Environment::assign(&parent, name, value, span),
            None => Err(unbound(name, span)),
        }
    }

    pub fn get(env: &EnvironmentRef, name: &str, span: SourceSpan) -> Result<Value> {
        if let Some(binding) = env.borrow().bindings.get(name) {
            return Ok(binding.value.clone());
        }
        let parent = env.borrow().parent.clone();
        match parent {
            Some(parent) => Environment::get(&parent, name, span),
            None => Err(unbound(name, span)),
        }
    }
}

fn unbound(name: &str, span: SourceSpan) -> crate::diagnostics::SiuError {
    Diagnostic::runtime(
        RuntimeErrorKind::UnboundIdentifier,
        format!("unbound identifier `{name}`"),
    )
    .with_span(span)
    .into()
}

#[derive(Clone)]
pub struct Binding {
    pub value: Value,
    pub ty: TypeName,
    pub constant: bool,
}
