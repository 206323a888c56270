use std::io::Write;

use crate::{
    diagnostics::{Diagnostic, Result, RuntimeErrorKind, SourceSpan},
    environment::EnvironmentRef,
    value::{NativeCallback, NativeFunction, Value, ValueKind},
};

/// Binds the prelude into `env` as constants.
pub fn install(env: &EnvironmentRef) {
    let mut scope = env.borrow_mut();
    for function in [
        native("print", None, io_print),
        native("len", Some(1), collections_len),
        native("push", Some(2), collections_push),
    ] {
        if let ValueKind::NativeFunction(native) = &*function.0 {
            let name = native.name;
            scope.define_builtin(name, function.clone());
        }
    }
}

fn native(name: &'static str, arity: Option<usize>, callback: NativeCallback) -> Value {
    Value::new(ValueKind::NativeFunction(NativeFunction {
        name,
        arity,
        callback,
    }))
}

fn io_print(output: &mut dyn Write, args: &[Value], _span: SourceSpan) -> Result<Value> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(output, "{line}")?;
    Ok(Value::null())
}

fn collections_len(_output: &mut dyn Write, args: &[Value], span: SourceSpan) -> Result<Value> {
    let len = match &*args[0].0 {
        ValueKind::List(values) => values.borrow().len(),
        ValueKind::String(text) => text.chars().count(),
        _ => {
            return Err(Diagnostic::runtime(
                RuntimeErrorKind::TypeMismatch,
                format!(
                    "len expects a list or string, found `{}`",
                    args[0].type_name()
                ),
            )
            .with_span(span)
            .into());
        }
    };
    Ok(Value::int(len as i64))
}

fn collections_push(_output: &mut dyn Write, args: &[Value], span: SourceSpan) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::List(values) => {
            values.borrow_mut().push(args[1].clone());
            Ok(Value::null())
        }
        _ => Err(Diagnostic::runtime(
            RuntimeErrorKind::TypeMismatch,
            format!("push expects a list, found `{}`", args[0].type_name()),
        )
        .with_span(span)
        .into()),
    }
}
