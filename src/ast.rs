// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::*;

use core::{cmp, fmt, ops::Deref};
use std::rc::Rc;

pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> cmp::Ord for NodeRef<T> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        Rc::as_ptr(&self.r).cmp(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::PartialOrd for NodeRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

pub type Ref<T> = NodeRef<T>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StrKind {
    // A plain (possibly raw or unicode-prefixed) string literal.
    Plain,
    Bytes,
    // f-strings are not literals: their value depends on interpolation.
    Formatted,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    MatMul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

/// A keyword argument `name=value`, or `**value` when `arg` is `None`.
#[derive(Debug, Clone)]
pub struct Keyword {
    pub span: Span,
    pub arg: Option<Span>,
    pub value: Ref<Expr>,
}

#[derive(Debug, Clone)]
pub struct Comprehension {
    pub span: Span,
    pub target: Ref<Expr>,
    pub iter: Ref<Expr>,
    pub ifs: Vec<Ref<Expr>>,
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub span: Span,
    pub annotation: Option<Ref<Expr>>,
    pub default: Option<Ref<Expr>>,
}

impl Param {
    pub fn name(&self) -> &str {
        self.span.text()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Parameters {
    // Positional parameters, positional-only ones included.
    pub args: Vec<Param>,
    pub vararg: Option<Param>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<Param>,
}

impl Parameters {
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.args
            .iter()
            .chain(self.vararg.iter())
            .chain(self.kwonly.iter())
            .chain(self.kwarg.iter())
    }
}

#[derive(Debug)]
pub enum Expr {
    Name {
        span: Span,
        eidx: u32,
    },

    Str {
        span: Span,
        value: String,
        kind: StrKind,
        eidx: u32,
    },

    Number {
        span: Span,
        eidx: u32,
    },

    // None, True, False and `...`
    Constant {
        span: Span,
        eidx: u32,
    },

    Attribute {
        span: Span,
        value: Ref<Expr>,
        attr: Span,
        eidx: u32,
    },

    Subscript {
        span: Span,
        value: Ref<Expr>,
        index: Ref<Expr>,
        eidx: u32,
    },

    Slice {
        span: Span,
        lower: Option<Ref<Expr>>,
        upper: Option<Ref<Expr>>,
        step: Option<Ref<Expr>>,
        eidx: u32,
    },

    Call {
        span: Span,
        func: Ref<Expr>,
        args: Vec<Ref<Expr>>,
        keywords: Vec<Keyword>,
        eidx: u32,
    },

    Starred {
        span: Span,
        value: Ref<Expr>,
        eidx: u32,
    },

    List {
        span: Span,
        items: Vec<Ref<Expr>>,
        eidx: u32,
    },

    Tuple {
        span: Span,
        items: Vec<Ref<Expr>>,
        eidx: u32,
    },

    Set {
        span: Span,
        items: Vec<Ref<Expr>>,
        eidx: u32,
    },

    // A `None` key marks a `**mapping` entry.
    Dict {
        span: Span,
        items: Vec<(Option<Ref<Expr>>, Ref<Expr>)>,
        eidx: u32,
    },

    ListCompr {
        span: Span,
        elt: Ref<Expr>,
        generators: Vec<Comprehension>,
        eidx: u32,
    },

    SetCompr {
        span: Span,
        elt: Ref<Expr>,
        generators: Vec<Comprehension>,
        eidx: u32,
    },

    GeneratorExpr {
        span: Span,
        elt: Ref<Expr>,
        generators: Vec<Comprehension>,
        eidx: u32,
    },

    DictCompr {
        span: Span,
        key: Ref<Expr>,
        value: Ref<Expr>,
        generators: Vec<Comprehension>,
        eidx: u32,
    },

    Lambda {
        span: Span,
        params: Parameters,
        body: Ref<Expr>,
        eidx: u32,
    },

    UnaryExpr {
        span: Span,
        op: UnaryOp,
        operand: Ref<Expr>,
        eidx: u32,
    },

    BinExpr {
        span: Span,
        op: BinOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
        eidx: u32,
    },

    BoolExpr {
        span: Span,
        op: BoolOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
        eidx: u32,
    },

    Compare {
        span: Span,
        lhs: Ref<Expr>,
        comparisons: Vec<(CmpOp, Ref<Expr>)>,
        eidx: u32,
    },

    IfExpr {
        span: Span,
        test: Ref<Expr>,
        body: Ref<Expr>,
        orelse: Ref<Expr>,
        eidx: u32,
    },

    NamedExpr {
        span: Span,
        target: Ref<Expr>,
        value: Ref<Expr>,
        eidx: u32,
    },

    Await {
        span: Span,
        value: Ref<Expr>,
        eidx: u32,
    },

    Yield {
        span: Span,
        value: Option<Ref<Expr>>,
        from: bool,
        eidx: u32,
    },
}

impl Expr {
    pub const fn span(&self) -> &Span {
        match *self {
            Self::Name { ref span, .. }
            | Self::Str { ref span, .. }
            | Self::Number { ref span, .. }
            | Self::Constant { ref span, .. }
            | Self::Attribute { ref span, .. }
            | Self::Subscript { ref span, .. }
            | Self::Slice { ref span, .. }
            | Self::Call { ref span, .. }
            | Self::Starred { ref span, .. }
            | Self::List { ref span, .. }
            | Self::Tuple { ref span, .. }
            | Self::Set { ref span, .. }
            | Self::Dict { ref span, .. }
            | Self::ListCompr { ref span, .. }
            | Self::SetCompr { ref span, .. }
            | Self::GeneratorExpr { ref span, .. }
            | Self::DictCompr { ref span, .. }
            | Self::Lambda { ref span, .. }
            | Self::UnaryExpr { ref span, .. }
            | Self::BinExpr { ref span, .. }
            | Self::BoolExpr { ref span, .. }
            | Self::Compare { ref span, .. }
            | Self::IfExpr { ref span, .. }
            | Self::NamedExpr { ref span, .. }
            | Self::Await { ref span, .. }
            | Self::Yield { ref span, .. } => span,
        }
    }

    pub const fn eidx(&self) -> u32 {
        match *self {
            Self::Name { eidx, .. }
            | Self::Str { eidx, .. }
            | Self::Number { eidx, .. }
            | Self::Constant { eidx, .. }
            | Self::Attribute { eidx, .. }
            | Self::Subscript { eidx, .. }
            | Self::Slice { eidx, .. }
            | Self::Call { eidx, .. }
            | Self::Starred { eidx, .. }
            | Self::List { eidx, .. }
            | Self::Tuple { eidx, .. }
            | Self::Set { eidx, .. }
            | Self::Dict { eidx, .. }
            | Self::ListCompr { eidx, .. }
            | Self::SetCompr { eidx, .. }
            | Self::GeneratorExpr { eidx, .. }
            | Self::DictCompr { eidx, .. }
            | Self::Lambda { eidx, .. }
            | Self::UnaryExpr { eidx, .. }
            | Self::BinExpr { eidx, .. }
            | Self::BoolExpr { eidx, .. }
            | Self::Compare { eidx, .. }
            | Self::IfExpr { eidx, .. }
            | Self::NamedExpr { eidx, .. }
            | Self::Await { eidx, .. }
            | Self::Yield { eidx, .. } => eidx,
        }
    }

    /// Identifier of a `Name` expression.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name { span, .. } => Some(span.text()),
            _ => None,
        }
    }

    /// Value of a plain string literal. Bytes and f-strings are not literals.
    pub fn string_literal(&self) -> Option<&str> {
        match self {
            Self::Str {
                value,
                kind: StrKind::Plain,
                ..
            } => Some(value.as_str()),
            _ => None,
        }
    }
}

/// One name in an import statement. `name` is the dotted module path
/// (or the imported member for `from` imports).
#[derive(Debug, Clone)]
pub struct Alias {
    pub span: Span,
    pub name: String,
    pub asname: Option<Span>,
}

impl Alias {
    /// The name the import binds in the importing scope.
    pub fn bound_name(&self) -> &str {
        match &self.asname {
            Some(asname) => asname.text(),
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WithItem {
    pub context: Ref<Expr>,
    pub vars: Option<Ref<Expr>>,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub span: Span,
    pub typ: Option<Ref<Expr>>,
    pub name: Option<Span>,
    pub body: Vec<Ref<Stmt>>,
}

#[derive(Debug)]
pub struct FunctionDef {
    pub span: Span,
    pub name: Span,
    pub params: Parameters,
    pub returns: Option<Ref<Expr>>,
    pub decorators: Vec<Ref<Expr>>,
    pub body: Vec<Ref<Stmt>>,
    pub is_async: bool,
    pub sidx: u32,
}

#[derive(Debug)]
pub struct ClassDef {
    pub span: Span,
    pub name: Span,
    pub bases: Vec<Ref<Expr>>,
    pub keywords: Vec<Keyword>,
    pub decorators: Vec<Ref<Expr>>,
    pub body: Vec<Ref<Stmt>>,
    pub sidx: u32,
}

#[derive(Debug)]
pub enum Stmt {
    Expr {
        span: Span,
        value: Ref<Expr>,
        sidx: u32,
    },

    // a = b = value
    Assign {
        span: Span,
        targets: Vec<Ref<Expr>>,
        value: Ref<Expr>,
        sidx: u32,
    },

    AugAssign {
        span: Span,
        target: Ref<Expr>,
        op: BinOp,
        value: Ref<Expr>,
        sidx: u32,
    },

    AnnAssign {
        span: Span,
        target: Ref<Expr>,
        annotation: Ref<Expr>,
        value: Option<Ref<Expr>>,
        sidx: u32,
    },

    Import {
        span: Span,
        names: Vec<Alias>,
        sidx: u32,
    },

    ImportFrom {
        span: Span,
        module: Option<String>,
        level: u32,
        names: Vec<Alias>,
        sidx: u32,
    },

    FunctionDef(Ref<FunctionDef>),

    ClassDef(Ref<ClassDef>),

    Return {
        span: Span,
        value: Option<Ref<Expr>>,
        sidx: u32,
    },

    If {
        span: Span,
        test: Ref<Expr>,
        body: Vec<Ref<Stmt>>,
        orelse: Vec<Ref<Stmt>>,
        sidx: u32,
    },

    For {
        span: Span,
        target: Ref<Expr>,
        iter: Ref<Expr>,
        body: Vec<Ref<Stmt>>,
        orelse: Vec<Ref<Stmt>>,
        is_async: bool,
        sidx: u32,
    },

    While {
        span: Span,
        test: Ref<Expr>,
        body: Vec<Ref<Stmt>>,
        orelse: Vec<Ref<Stmt>>,
        sidx: u32,
    },

    With {
        span: Span,
        items: Vec<WithItem>,
        body: Vec<Ref<Stmt>>,
        is_async: bool,
        sidx: u32,
    },

    Try {
        span: Span,
        body: Vec<Ref<Stmt>>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Ref<Stmt>>,
        finalbody: Vec<Ref<Stmt>>,
        sidx: u32,
    },

    Raise {
        span: Span,
        exc: Option<Ref<Expr>>,
        cause: Option<Ref<Expr>>,
        sidx: u32,
    },

    Assert {
        span: Span,
        test: Ref<Expr>,
        msg: Option<Ref<Expr>>,
        sidx: u32,
    },

    Delete {
        span: Span,
        targets: Vec<Ref<Expr>>,
        sidx: u32,
    },

    Global {
        span: Span,
        names: Vec<Span>,
        sidx: u32,
    },

    Nonlocal {
        span: Span,
        names: Vec<Span>,
        sidx: u32,
    },

    Pass {
        span: Span,
        sidx: u32,
    },

    Break {
        span: Span,
        sidx: u32,
    },

    Continue {
        span: Span,
        sidx: u32,
    },
}

impl Stmt {
    pub fn span(&self) -> &Span {
        match self {
            Self::FunctionDef(def) => &def.span,
            Self::ClassDef(def) => &def.span,
            Self::Expr { span, .. }
            | Self::Assign { span, .. }
            | Self::AugAssign { span, .. }
            | Self::AnnAssign { span, .. }
            | Self::Import { span, .. }
            | Self::ImportFrom { span, .. }
            | Self::Return { span, .. }
            | Self::If { span, .. }
            | Self::For { span, .. }
            | Self::While { span, .. }
            | Self::With { span, .. }
            | Self::Try { span, .. }
            | Self::Raise { span, .. }
            | Self::Assert { span, .. }
            | Self::Delete { span, .. }
            | Self::Global { span, .. }
            | Self::Nonlocal { span, .. }
            | Self::Pass { span, .. }
            | Self::Break { span, .. }
            | Self::Continue { span, .. } => span,
        }
    }

    pub fn sidx(&self) -> u32 {
        match self {
            Self::FunctionDef(def) => def.sidx,
            Self::ClassDef(def) => def.sidx,
            Self::Expr { sidx, .. }
            | Self::Assign { sidx, .. }
            | Self::AugAssign { sidx, .. }
            | Self::AnnAssign { sidx, .. }
            | Self::Import { sidx, .. }
            | Self::ImportFrom { sidx, .. }
            | Self::Return { sidx, .. }
            | Self::If { sidx, .. }
            | Self::For { sidx, .. }
            | Self::While { sidx, .. }
            | Self::With { sidx, .. }
            | Self::Try { sidx, .. }
            | Self::Raise { sidx, .. }
            | Self::Assert { sidx, .. }
            | Self::Delete { sidx, .. }
            | Self::Global { sidx, .. }
            | Self::Nonlocal { sidx, .. }
            | Self::Pass { sidx, .. }
            | Self::Break { sidx, .. }
            | Self::Continue { sidx, .. } => *sidx,
        }
    }
}

#[derive(Debug)]
pub struct Module {
    pub source: Source,
    pub body: Vec<Ref<Stmt>>,
    // Number of expressions in the module.
    pub num_expressions: u32,
    // Number of statements in the module.
    pub num_statements: u32,
}

pub type ExprRef = Ref<Expr>;
pub type StmtRef = Ref<Stmt>;
