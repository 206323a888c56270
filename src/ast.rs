use std::{fmt, rc::Rc};

use crate::diagnostics::SourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// A declared type: in declarations, parameters, return types, fields and casts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeName {
    Int,
    Float,
    String,
    Bool,
    Fn,
    List,
    /// Accepts any value.
    Var,
    /// A `struct` or `variant` defined in the program.
    Custom(String),
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeName::Int => f.write_str("int"),
            TypeName::Float => f.write_str("float"),
            TypeName::String => f.write_str("string"),
            TypeName::Bool => f.write_str("bool"),
            TypeName::Fn => f.write_str("fn"),
            TypeName::List => f.write_str("list"),
            TypeName::Var => f.write_str("var"),
            TypeName::Custom(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeName,
    pub span: SourceSpan,
}

/// A typed member of a `struct` or a case of a `variant`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeName,
    pub span: SourceSpan,
}

/// Shared by named definitions and lambdas. Closures hold it through an `Rc`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeName>,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Cast {
        ty: TypeName,
        expr: Box<Expr>,
    },
    /// `@expr`: deep copy of a list, struct or variant.
    Copy(Box<Expr>),
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Field {
        target: Box<Expr>,
        field: String,
    },
    List(Vec<Expr>),
    StructLiteral {
        name: String,
        values: Vec<Expr>,
    },
    VariantLiteral {
        name: String,
        case: String,
        value: Box<Expr>,
    },
    Lambda(Rc<FunctionDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchPattern {
    /// `case(binding)`
    Case { case: String, binding: String },
    /// `_`
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: MatchPattern,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    VarDecl {
        name: String,
        ty: TypeName,
        constant: bool,
        initializer: Expr,
    },
    Function(Rc<FunctionDecl>),
    StructDef {
        name: String,
        fields: Vec<Field>,
    },
    VariantDef {
        name: String,
        cases: Vec<Field>,
    },
    Expr(Expr),
    Block(Vec<Stmt>),
    /// `if`, any number of `elif`/`else if`, and an optional `else`.
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        binding: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Match {
        subject: Expr,
        arms: Vec<MatchArm>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub items: Vec<Stmt>,
}

impl Program {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
