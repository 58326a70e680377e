use la_arena::{Arena, Idx};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

pub use gosift_lexer::Span;

// ── ID types ──────────────────────────────────────────────────────

pub type ExprId = Idx<Expr>;
pub type TypeExprId = Idx<TypeExpr>;
pub type StmtId = Idx<Stmt>;

// ── File ──────────────────────────────────────────────────────────

/// A parsed source file: the package clause, imports, top-level
/// declarations, and the arenas every node ID points into.
#[derive(Debug, Clone)]
pub struct File {
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub exprs: Arena<Expr>,
    pub type_exprs: Arena<TypeExpr>,
    pub stmts: Arena<Stmt>,
}

impl File {
    pub fn new(package: Ident) -> Self {
        Self {
            package,
            imports: Vec::new(),
            decls: Vec::new(),
            exprs: Arena::new(),
            type_exprs: Arena::new(),
            stmts: Arena::new(),
        }
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    pub fn type_expr(&self, id: TypeExprId) -> &TypeExpr {
        &self.type_exprs[id]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    /// Strip any number of enclosing parentheses from an expression.
    pub fn strip_parens(&self, mut id: ExprId) -> ExprId {
        while let ExprKind::Paren(inner) = &self.exprs[id].kind {
            id = *inner;
        }
        id
    }

    /// Strip parentheses from a type expression.
    pub fn strip_type_parens(&self, mut id: TypeExprId) -> TypeExprId {
        while let TypeExprKind::Paren(inner) = &self.type_exprs[id].kind {
            id = *inner;
        }
        id
    }
}

/// An identifier with its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: SmolStr,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<SmolStr>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    /// The blank identifier consumes a slot but never a binding.
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// Import declaration entry: `import alias "path"`.
#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub alias: Option<Ident>,
    pub path: SmolStr,
    pub span: Span,
}

impl ImportSpec {
    /// The name the import is referred to by in this file: the alias if
    /// given, otherwise the last path segment.
    pub fn local_name(&self) -> SmolStr {
        match &self.alias {
            Some(alias) => alias.name.clone(),
            None => SmolStr::new(self.path.rsplit('/').next().unwrap_or(&self.path)),
        }
    }
}

// ── Declarations ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Decl {
    Gen(GenDecl),
    Func(FuncDecl),
}

/// A grouped `var`/`const`/`type` declaration.
#[derive(Debug, Clone)]
pub struct GenDecl {
    pub keyword: DeclKeyword,
    pub specs: Vec<Spec>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKeyword {
    Var,
    Const,
    Type,
}

#[derive(Debug, Clone)]
pub enum Spec {
    Value(ValueSpec),
    Type(TypeSpec),
}

/// `names... [Type] [= values...]`
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub type_ann: Option<TypeExprId>,
    pub values: Vec<ExprId>,
    pub span: Span,
}

/// `type Name Type`
#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_expr: TypeExprId,
    pub span: Span,
}

/// Function or method declaration. `sig` always points at a
/// `TypeExpr::Func` node; the receiver list is kept as parsed so the
/// walker can reject malformed shapes itself.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: Ident,
    pub recv: Vec<Field>,
    pub sig: TypeExprId,
    pub body: Option<Vec<StmtId>>,
    pub span: Span,
}

/// A field group: `a, b Type` in parameter/result/struct-field lists.
#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<Ident>,
    pub type_expr: TypeExprId,
    pub span: Span,
}

// ── Expressions ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Ident(SmolStr),
    IntLit(i64),
    FloatLit(f64),
    StringLit(SmolStr),
    RuneLit(char),
    /// `T{elems...}`; `type_expr` is None inside a surrounding composite
    /// literal whose element type is implied.
    CompositeLit {
        type_expr: Option<TypeExprId>,
        elems: Vec<ExprId>,
    },
    /// `key: value` element of a composite literal.
    KeyValue { key: ExprId, value: ExprId },
    Paren(ExprId),
    /// `x.sel`
    Selector { x: ExprId, sel: Ident },
    /// `x[index]`
    Index { x: ExprId, index: ExprId },
    /// `x[low:high]`
    Slice {
        x: ExprId,
        low: Option<ExprId>,
        high: Option<ExprId>,
    },
    /// `x.(T)`; `type_expr` is None for the `x.(type)` guard form.
    TypeAssert {
        x: ExprId,
        type_expr: Option<TypeExprId>,
    },
    /// `fun(args...)`; `ellipsis` marks `fun(args...)` spreading.
    Call {
        fun: ExprId,
        args: Vec<ExprId>,
        ellipsis: bool,
    },
    /// `*x` in expression position.
    Star(ExprId),
    Unary { op: UnaryOp, x: ExprId },
    Binary { op: BinaryOp, x: ExprId, y: ExprId },
    /// `func(...) ... { body }`
    FuncLit { sig: TypeExprId, body: Vec<StmtId> },
    /// A type in expression position (conversion target, `make`/`new`
    /// argument).
    TypeLit(TypeExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaryOp {
    /// `+x`
    Plus,
    /// `-x`
    Minus,
    /// `!x`
    Not,
    /// `^x`
    Xor,
    /// `&x`
    Addr,
    /// `<-x`
    Recv,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::Xor => "^",
            UnaryOp::Addr => "&",
            UnaryOp::Recv => "<-",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    LogAnd,
    LogOr,
    Eql,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eql
                | BinaryOp::Neq
                | BinaryOp::Lss
                | BinaryOp::Leq
                | BinaryOp::Gtr
                | BinaryOp::Geq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogAnd | BinaryOp::LogOr)
    }

    /// Binding strength, strongest first (mul 5 .. logical-or 1).
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::And
            | BinaryOp::AndNot => 5,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => 4,
            BinaryOp::Eql
            | BinaryOp::Neq
            | BinaryOp::Lss
            | BinaryOp::Leq
            | BinaryOp::Gtr
            | BinaryOp::Geq => 3,
            BinaryOp::LogAnd => 2,
            BinaryOp::LogOr => 1,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::AndNot => "&^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
            BinaryOp::Eql => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lss => "<",
            BinaryOp::Leq => "<=",
            BinaryOp::Gtr => ">",
            BinaryOp::Geq => ">=",
        };
        write!(f, "{}", s)
    }
}

// ── Statements ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// Assignment token: `:=` declares, `=` assigns, `op=` is a compound
/// assignment (typed like a plain assignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignTok {
    Define,
    Assign,
    OpAssign(BinaryOp),
}

impl AssignTok {
    pub fn is_define(self) -> bool {
        matches!(self, AssignTok::Define)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Decl(GenDecl),
    Labeled { label: Ident, stmt: StmtId },
    Expr(ExprId),
    Send { chan: ExprId, value: ExprId },
    IncDec { x: ExprId, inc: bool },
    Assign {
        lhs: Vec<ExprId>,
        rhs: Vec<ExprId>,
        tok: AssignTok,
    },
    Go(ExprId),
    Defer(ExprId),
    Return { results: Vec<ExprId> },
    Branch {
        kind: BranchKind,
        label: Option<Ident>,
    },
    Block(Vec<StmtId>),
    If {
        init: Option<StmtId>,
        cond: ExprId,
        body: Vec<StmtId>,
        else_stmt: Option<StmtId>,
    },
    Switch {
        init: Option<StmtId>,
        tag: Option<ExprId>,
        cases: Vec<CaseClause>,
    },
    /// `switch [init;] guard { cases }` where guard is either
    /// `x.(type)` as an expression statement or `v := x.(type)`.
    TypeSwitch {
        init: Option<StmtId>,
        guard: StmtId,
        cases: Vec<TypeCaseClause>,
    },
    Select { clauses: Vec<CommClause> },
    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        post: Option<StmtId>,
        body: Vec<StmtId>,
    },
    Range {
        key: Option<ExprId>,
        value: Option<ExprId>,
        tok: AssignTok,
        x: ExprId,
        body: Vec<StmtId>,
    },
    Empty,
}

/// One `case exprs:`/`default:` clause of a value switch.
#[derive(Debug, Clone)]
pub struct CaseClause {
    pub exprs: Vec<ExprId>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

/// One `case T1, T2:`/`default:` clause of a type switch.
#[derive(Debug, Clone)]
pub struct TypeCaseClause {
    pub types: Vec<TypeExprId>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

/// One `case send/recv:`/`default:` clause of a select.
#[derive(Debug, Clone)]
pub struct CommClause {
    pub comm: Option<StmtId>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

// ── Type expressions ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    Ident(SmolStr),
    /// `pkg.Name`
    Qualified { package: SmolStr, name: SmolStr },
    Pointer(TypeExprId),
    Array { len: ExprId, elem: TypeExprId },
    Slice(TypeExprId),
    Map { key: TypeExprId, value: TypeExprId },
    Chan { dir: ChanDir, elem: TypeExprId },
    Ellipsis(TypeExprId),
    Func {
        params: Vec<Field>,
        results: Vec<Field>,
    },
    Interface { methods: Vec<MethodElem> },
    Struct { fields: Vec<Field> },
    Paren(TypeExprId),
}

/// A named method in an interface type.
#[derive(Debug, Clone)]
pub struct MethodElem {
    pub name: Ident,
    pub sig: TypeExprId,
    pub span: Span,
}
