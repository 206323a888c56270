use std::{cell::RefCell, collections::HashMap, fmt, io::Write, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::{FunctionDecl, TypeName},
    diagnostics::{Diagnostic, Result, RuntimeErrorKind, SourceSpan},
    environment::EnvironmentRef,
};

/// Lists, structs and variants nested deeper than this are elided when displayed
/// and refused by [`Value::deep_copy`].
pub const MAX_VALUE_DEPTH: usize = 128;

/// A runtime value. Cloning shares the underlying object, so lists, structs
/// and variants alias; primitives are never mutated in place.
#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn null() -> Self {
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

    pub fn list(values: Vec<Value>) -> Self {
        Self::new(ValueKind::List(RefCell::new(values)))
    }

    pub fn is_null(&self) -> bool {
        matches!(&*self.0, ValueKind::Unit)
    }

    pub fn type_name(&self) -> &str {
        match &*self.0 {
            ValueKind::Unit => "null",
            ValueKind::Bool(_) => "bool",
            ValueKind::Int(_) => "int",
            ValueKind::Float(_) => "float",
            ValueKind::String(_) => "string",
            ValueKind::List(_) => "list",
            ValueKind::Struct(value) => &value.name,
            ValueKind::Variant(value) => &value.name,
            ValueKind::Function(_) | ValueKind::NativeFunction(_) => "fn",
        }
    }

    pub fn expect_bool(&self, what: &str, span: SourceSpan) -> Result<bool> {
        match &*self.0 {
            ValueKind::Bool(b) => Ok(*b),
            _ => Err(Diagnostic::runtime(
                RuntimeErrorKind::TypeMismatch,
                format!("{what} must be `bool`, found `{}`", self.type_name()),
            )
            .with_span(span)
            .into()),
        }
    }

    /// Whether a slot declared as `ty` may hold this value as-is or after widening.
    pub fn conforms_to(&self, ty: &TypeName) -> bool {
        match (ty, &*self.0) {
            (TypeName::Var, _) => true,
            (TypeName::Int, ValueKind::Int(_)) => true,
            (TypeName::Float, ValueKind::Float(_) | ValueKind::Int(_)) => true,
            (TypeName::String, ValueKind::String(_)) => true,
            (TypeName::Bool, ValueKind::Bool(_)) => true,
            (TypeName::Fn, ValueKind::Function(_) | ValueKind::NativeFunction(_)) => true,
            (TypeName::List, ValueKind::List(_)) => true,
            (TypeName::Custom(name), ValueKind::Struct(value)) => &value.name == name,
            (TypeName::Custom(name), ValueKind::Variant(value)) => &value.name == name,
            // reference slots may be empty
            (TypeName::Fn | TypeName::List | TypeName::Custom(_), ValueKind::Unit) => true,
            _ => false,
        }
    }

    /// The value as stored in a slot of type `ty`, or `None` when it does not conform.
    pub fn coerce_to(&self, ty: &TypeName) -> Option<Value> {
        if !self.conforms_to(ty) {
            return None;
        }
        match (ty, &*self.0) {
            (TypeName::Float, ValueKind::Int(n)) => Some(Value::float(*n as f64)),
            _ => Some(self.clone()),
        }
    }

    /// Recursively copies lists, structs and variants. Functions and primitives are
    /// shared. A value reached twice is copied once, so cycles carry over to the copy.
    pub fn deep_copy(&self, span: SourceSpan) -> Result<Value> {
        self.copy_into(&mut HashMap::new(), 0, span)
    }

    fn copy_into(
        &self,
        copies: &mut HashMap<*const ValueKind, Value>,
        depth: usize,
        span: SourceSpan,
    ) -> Result<Value> {
        let key = Rc::as_ptr(&self.0);
        if let Some(copy) = copies.get(&key) {
            return Ok(copy.clone());
        }
        if depth >= MAX_VALUE_DEPTH {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::InvalidOperation,
                format!("cannot copy a value nested deeper than {MAX_VALUE_DEPTH} levels"),
            )
            .with_span(span)
            .into());
        }
        match &*self.0 {
            ValueKind::List(values) => {
                let copy = Value::list(Vec::new());
                copies.insert(key, copy.clone());
                let items = values
                    .borrow()
                    .iter()
                    .map(|item| item.copy_into(copies, depth + 1, span))
                    .collect::<Result<Vec<_>>>()?;
                if let ValueKind::List(target) = &*copy.0 {
                    *target.borrow_mut() = items;
                }
                Ok(copy)
            }
            ValueKind::Struct(value) => {
                let copy = Value::new(ValueKind::Struct(StructValue {
                    name: value.name.clone(),
                    fields: RefCell::new(IndexMap::new()),
                }));
                copies.insert(key, copy.clone());
                let mut fields = IndexMap::with_capacity(value.fields.borrow().len());
                for (name, field) in value.fields.borrow().iter() {
                    fields.insert(name.clone(), field.copy_into(copies, depth + 1, span)?);
                }
                if let ValueKind::Struct(target) = &*copy.0 {
                    *target.fields.borrow_mut() = fields;
                }
                Ok(copy)
            }
            ValueKind::Variant(value) => {
                let copy = Value::new(ValueKind::Variant(VariantValue {
                    name: value.name.clone(),
                    case: value.case.clone(),
                    value: value.value.copy_into(copies, depth + 1, span)?,
                }));
                copies.insert(key, copy.clone());
                Ok(copy)
            }
            _ => Ok(self.clone()),
        }
    }

    /// `path` holds the lists, structs and variants currently being rendered;
    /// revisiting one of them, or nesting past [`MAX_VALUE_DEPTH`], prints an ellipsis.
    fn render(
        &self,
        f: &mut fmt::Formatter<'_>,
        path: &mut Vec<*const ValueKind>,
        nested: bool,
    ) -> fmt::Result {
        let key = Rc::as_ptr(&self.0);
        let elided = path.contains(&key) || path.len() >= MAX_VALUE_DEPTH;
        match &*self.0 {
            ValueKind::Unit => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n:?}"),
            ValueKind::String(s) if nested => write!(f, "{s:?}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::List(_) if elided => write!(f, "[...]"),
            ValueKind::List(values) => {
                path.push(key);
                write!(f, "[")?;
                for (idx, value) in values.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    value.render(f, path, true)?;
                }
                path.pop();
                write!(f, "]")
            }
            ValueKind::Struct(value) if elided => write!(f, "{} {{ ... }}", value.name),
            ValueKind::Struct(value) => {
                path.push(key);
                write!(f, "{} {{", value.name)?;
                for (idx, (name, field)) in value.fields.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {name}: ")?;
                    field.render(f, path, true)?;
                }
                path.pop();
                write!(f, " }}")
            }
            ValueKind::Variant(value) if elided => write!(f, "{}::{}(...)", value.name, value.case),
            ValueKind::Variant(value) => {
                path.push(key);
                write!(f, "{}::{}(", value.name, value.case)?;
                value.value.render(f, path, true)?;
                path.pop();
                write!(f, ")")
            }
            ValueKind::Function(closure) => match &closure.decl.name {
                Some(name) => write!(f, "<fn {name}>"),
                None => write!(f, "<fn anonymous>"),
            },
            ValueKind::NativeFunction(native) => write!(f, "<native fn {}>", native.name),
        }
    }
}

/// Quotes strings, as they appear inside lists and structs.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &mut Vec::new(), true)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &mut Vec::new(), false)
    }
}

pub enum ValueKind {
    /// `null`, also the result of statements and calls that produce nothing.
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(RefCell<Vec<Value>>),
    Struct(StructValue),
    Variant(VariantValue),
    Function(Closure),
    NativeFunction(NativeFunction),
}

pub struct StructValue {
    pub name: String,
    pub fields: RefCell<IndexMap<String, Value>>,
}

pub struct VariantValue {
    pub name: String,
    pub case: String,
    pub value: Value,
}

/// A function value: the shared declaration plus the frame it was created in.
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub env: EnvironmentRef,
}

pub type NativeCallback = fn(&mut dyn Write, &[Value], SourceSpan) -> Result<Value>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    /// `None` accepts any number of arguments.
    pub arity: Option<usize>,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn call(&self, output: &mut dyn Write, args: &[Value], span: SourceSpan) -> Result<Value> {
        if let Some(arity) = self.arity {
            if args.len() != arity {
                return Err(Diagnostic::runtime(
                    RuntimeErrorKind::ArityMismatch,
                    format!(
                        "function `{}` expected {} arguments but received {}",
                        self.name,
                        arity,
                        args.len()
                    ),
                )
                .with_span(span)
                .into());
            }
        }
        (self.callback)(output, args, span)
    }
}
