//! Abstract Syntax Tree for the inspection language.

use std::fmt;

/// Span of a construct in the source text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLoc {
    pub first_line: usize,
    pub first_column: usize,
    pub last_line: usize,
    pub last_column: usize,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first_line, self.first_column)
    }
}

/// Unit of an offset type or literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitRef {
    /// Explicit number of bits, as in `offset<int<32>,8>`.
    Bits(u64),
    /// Predefined (`B`, `Kib`, ...) or declared unit.
    Named(String),
}

/// Type as written in the source; resolved against the environment at evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Int(u32),
    Uint(u32),
    String,
    Offset(Box<TypeExpr>, UnitRef),
    Struct(Vec<FieldDecl>),
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    BitNot,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// `TYPE @ [IOS :] OFFSET`, strict unless written with `@!`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapExpr {
    pub ty: TypeExpr,
    pub strict: bool,
    pub ios: Option<Box<Expr>>,
    pub offset: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal. `value` holds the raw bits.
    Int { value: u64, width: u32, signed: bool },
    Str(Vec<u8>),
    Offset { magnitude: Box<Expr>, unit: UnitRef },
    Var(String),
    Field(Box<Expr>, String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Cast(Box<Expr>, TypeExpr),
    Map(MapExpr),
    /// Struct constructor. Anonymous when `name` is `None`.
    StructCons { name: Option<String>, fields: Vec<(String, Expr)> },
    Call { name: String, args: Vec<Expr> },
}

/// Assignment target.
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    /// Variable, optionally followed by a field path: `a`, `a.b.c`.
    Path(String, Vec<String>),
    Map(MapExpr),
}

/// Name, location and source text shared by every declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclHead {
    pub name: String,
    pub loc: SourceLoc,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var { head: DeclHead, init: Expr },
    Type { head: DeclHead, ty: TypeExpr },
    Unit { head: DeclHead, value: Expr },
    Assign { target: LValue, value: Expr, loc: SourceLoc },
    Expr { expr: Expr, loc: SourceLoc },
}

impl Stmt {
    pub fn loc(&self) -> SourceLoc {
        match self {
            Stmt::Var { head, .. } | Stmt::Type { head, .. } | Stmt::Unit { head, .. } => head.loc,
            Stmt::Assign { loc, .. } | Stmt::Expr { loc, .. } => *loc,
        }
    }
}
