//! Static checks run between parsing and evaluation.

use crate::{
    ast::{Expr, ExprKind, FunctionDecl, MatchArm, Program, Stmt, StmtKind},
    diagnostics::{Diagnostic, DiagnosticKind},
};

/// Verifies every function's `return` statements against its declared return type:
/// a function without one must not return a value, and a function with one must not
/// use a bare `return;`.
pub fn check_program(program: &Program) -> Result<(), Diagnostic> {
    let mut checker = ReturnChecker { function: None };
    for stmt in &program.items {
        checker.stmt(stmt)?;
    }
    Ok(())
}

struct ReturnChecker<'a> {
    function: Option<&'a FunctionDecl>,
}

impl<'a> ReturnChecker<'a> {
    fn function(&mut self, decl: &'a FunctionDecl) -> Result<(), Diagnostic> {
        let enclosing = self.function.replace(decl);
        let result = self.block(&decl.body);
        self.function = enclosing;
        result
    }

    fn block(&mut self, stmts: &'a [Stmt]) -> Result<(), Diagnostic> {
        stmts.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn stmt(&mut self, stmt: &'a Stmt) -> Result<(), Diagnostic> {
        match &stmt.kind {
            StmtKind::VarDecl { initializer, .. } => self.expr(initializer),
            StmtKind::Function(decl) => self.function(decl),
            StmtKind::StructDef { .. }
            | StmtKind::VariantDef { .. }
            | StmtKind::Break
            | StmtKind::Continue => Ok(()),
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Block(stmts) => self.block(stmts),
            StmtKind::If {
                branches,
                else_branch,
            } => {
                for (condition, body) in branches {
                    self.expr(condition)?;
                    self.block(body)?;
                }
                match else_branch {
                    Some(body) => self.block(body),
                    None => Ok(()),
                }
            }
            StmtKind::While { condition, body } => {
                self.expr(condition)?;
                self.block(body)
            }
            StmtKind::For { iterable, body, .. } => {
                self.expr(iterable)?;
                self.block(body)
            }
            StmtKind::Match { subject, arms } => {
                self.expr(subject)?;
                arms.iter()
                    .try_for_each(|arm: &'a MatchArm| self.block(&arm.body))
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value)?;
                }
                self.check_return(stmt, value.is_some())
            }
        }
    }

    fn check_return(&self, stmt: &Stmt, has_value: bool) -> Result<(), Diagnostic> {
        // top-level returns are reported by the evaluator
        let Some(decl) = self.function else {
            return Ok(());
        };
        let name = decl.name.as_deref().unwrap_or("anonymous function");
        match (&decl.return_type, has_value) {
            (None, true) => Err(Diagnostic::new(
                DiagnosticKind::Check,
                format!("`{name}` has no return type but returns a value"),
            )
            .with_span(stmt.span)
            .with_note("declare a return type with `: type` after the parameters")),
            (Some(ty), false) => Err(Diagnostic::new(
                DiagnosticKind::Check,
                format!("`{name}` must return a value of type `{ty}`"),
            )
            .with_span(stmt.span)),
            _ => Ok(()),
        }
    }

    fn expr(&mut self, expr: &'a Expr) -> Result<(), Diagnostic> {
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) => Ok(()),
            ExprKind::Binary { left, right, .. }
            | ExprKind::Logical { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::Unary { expr, .. }
            | ExprKind::Cast { expr, .. }
            | ExprKind::Copy(expr) => self.expr(expr),
            ExprKind::Assign { target, value } => {
                self.expr(target)?;
                self.expr(value)
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee)?;
                args.iter().try_for_each(|arg| self.expr(arg))
            }
            ExprKind::Index { target, index } => {
                self.expr(target)?;
                self.expr(index)
            }
            ExprKind::Field { target, .. } => self.expr(target),
            ExprKind::List(values) | ExprKind::StructLiteral { values, .. } => {
                values.iter().try_for_each(|value| self.expr(value))
            }
            ExprKind::VariantLiteral { value, .. } => self.expr(value),
            ExprKind::Lambda(decl) => self.function(decl),
        }
    }
}
