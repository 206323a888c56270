//! Indented tree rendering of a parsed program, used by `siu ast`.

use std::fmt::Write;

use crate::ast::{
    Expr, ExprKind, Field, FunctionDecl, Literal, LogicalOp, MatchPattern, Program, Stmt,
    StmtKind, UnaryOp,
};

pub fn render_program(program: &Program) -> String {
    let mut printer = TreePrinter::default();
    printer.line(0, "Program");
    for stmt in &program.items {
        printer.stmt(1, stmt);
    }
    printer.out
}

#[derive(Default)]
struct TreePrinter {
    out: String,
}

impl TreePrinter {
    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}{}", "  ".repeat(depth), text.as_ref());
    }

    fn block(&mut self, depth: usize, label: &str, stmts: &[Stmt]) {
        self.line(depth, label);
        for stmt in stmts {
            self.stmt(depth + 1, stmt);
        }
    }

    fn members(&mut self, depth: usize, members: &[Field]) {
        for member in members {
            self.line(depth, format!("{} {}", member.ty, member.name));
        }
    }

    fn function(&mut self, depth: usize, decl: &FunctionDecl) {
        let params = decl
            .params
            .iter()
            .map(|param| format!("{} {}", param.ty, param.name))
            .collect::<Vec<_>>()
            .join(", ");
        let name = decl.name.as_deref().unwrap_or("<lambda>");
        match &decl.return_type {
            Some(ty) => self.line(depth, format!("Function {name}({params}): {ty}")),
            None => self.line(depth, format!("Function {name}({params})")),
        }
        for stmt in &decl.body {
            self.stmt(depth + 1, stmt);
        }
    }

    fn stmt(&mut self, depth: usize, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl {
                name,
                ty,
                constant,
                initializer,
            } => {
                let prefix = if *constant { "Const" } else { "Let" };
                self.line(depth, format!("{prefix} {ty} {name}"));
                self.expr(depth + 1, initializer);
            }
            StmtKind::Function(decl) => self.function(depth, decl),
            StmtKind::StructDef { name, fields } => {
                self.line(depth, format!("Struct {name}"));
                self.members(depth + 1, fields);
            }
            StmtKind::VariantDef { name, cases } => {
                self.line(depth, format!("Variant {name}"));
                self.members(depth + 1, cases);
            }
            StmtKind::Expr(expr) => self.expr(depth, expr),
            StmtKind::Block(stmts) => self.block(depth, "Block", stmts),
            StmtKind::If {
                branches,
                else_branch,
            } => {
                self.line(depth, "If");
                for (condition, body) in branches {
                    self.line(depth + 1, "Branch");
                    self.expr(depth + 2, condition);
                    self.block(depth + 2, "Then", body);
                }
                if let Some(body) = else_branch {
                    self.block(depth + 1, "Else", body);
                }
            }
            StmtKind::While { condition, body } => {
                self.line(depth, "While");
                self.expr(depth + 1, condition);
                self.block(depth + 1, "Body", body);
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                self.line(depth, format!("For {binding}"));
                self.expr(depth + 1, iterable);
                self.block(depth + 1, "Body", body);
            }
            StmtKind::Match { subject, arms } => {
                self.line(depth, "Match");
                self.expr(depth + 1, subject);
                for arm in arms {
                    let label = match &arm.pattern {
                        MatchPattern::Case { case, binding } => format!("Case {case}({binding})"),
                        MatchPattern::Wildcard => "Case _".to_string(),
                    };
                    self.block(depth + 1, &label, &arm.body);
                }
            }
            StmtKind::Return(value) => {
                self.line(depth, "Return");
                if let Some(value) = value {
                    self.expr(depth + 1, value);
                }
            }
            StmtKind::Break => self.line(depth, "Break"),
            StmtKind::Continue => self.line(depth, "Continue"),
        }
    }

    fn expr(&mut self, depth: usize, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let text = match literal {
                    Literal::Int(n) => n.to_string(),
                    Literal::Float(n) => format!("{n:?}"),
                    Literal::Bool(b) => b.to_string(),
                    Literal::String(s) => format!("{s:?}"),
                    Literal::Null => "null".to_string(),
                };
                self.line(depth, format!("Literal {text}"));
            }
            ExprKind::Variable(name) => self.line(depth, format!("Variable {name}")),
            ExprKind::Binary { op, left, right } => {
                self.line(depth, format!("Binary {}", op.symbol()));
                self.expr(depth + 1, left);
                self.expr(depth + 1, right);
            }
            ExprKind::Logical { op, left, right } => {
                let symbol = match op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                self.line(depth, format!("Logical {symbol}"));
                self.expr(depth + 1, left);
                self.expr(depth + 1, right);
            }
            ExprKind::Unary { op, expr: operand } => {
                let symbol = match op {
                    UnaryOp::Negate => "-",
                    UnaryOp::Not => "not",
                };
                self.line(depth, format!("Unary {symbol}"));
                self.expr(depth + 1, operand);
            }
            ExprKind::Cast { ty, expr: operand } => {
                self.line(depth, format!("Cast {ty}"));
                self.expr(depth + 1, operand);
            }
            ExprKind::Copy(operand) => {
                self.line(depth, "Copy");
                self.expr(depth + 1, operand);
            }
            ExprKind::Assign { target, value } => {
                self.line(depth, "Assign");
                self.expr(depth + 1, target);
                self.expr(depth + 1, value);
            }
            ExprKind::Call { callee, args } => {
                self.line(depth, "Call");
                self.expr(depth + 1, callee);
                for arg in args {
                    self.expr(depth + 1, arg);
                }
            }
            ExprKind::Index { target, index } => {
                self.line(depth, "Index");
                self.expr(depth + 1, target);
                self.expr(depth + 1, index);
            }
            ExprKind::Field { target, field } => {
                self.line(depth, format!("Field {field}"));
                self.expr(depth + 1, target);
            }
            ExprKind::List(values) => {
                self.line(depth, "List");
                for value in values {
                    self.expr(depth + 1, value);
                }
            }
            ExprKind::StructLiteral { name, values } => {
                self.line(depth, format!("StructLiteral {name}"));
                for value in values {
                    self.expr(depth + 1, value);
                }
            }
            ExprKind::VariantLiteral { name, case, value } => {
                self.line(depth, format!("VariantLiteral {name}::{case}"));
                self.expr(depth + 1, value);
            }
            ExprKind::Lambda(decl) => self.function(depth, decl),
        }
    }
}
