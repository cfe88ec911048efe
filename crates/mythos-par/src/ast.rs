//! AST node definitions.
//!
//! Nodes carry no type information; every node records its [`Span`] for
//! error localisation downstream.

use mythos_util::{Span, Symbol};

/// AST root: the whole source file.
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression in statement position
    Expr(ExprStmt),

    /// Free-standing `{ ... }` block
    Block(Block),

    /// `if` / `elif`* / `else`?
    If(IfStmt),

    /// `while cond { ... }`
    While(WhileStmt),

    /// `for name in iterable { ... }`
    ForIn(ForInStmt),

    /// `function name(params) { ... }`
    Function(FunctionDecl),

    /// `return` with optional value
    Return(ReturnStmt),

    /// `break`
    Break(BreakStmt),

    /// `continue`
    Continue(ContinueStmt),

    /// `class Name extends Base { methods }`
    Class(ClassDecl),

    /// `try { } catch e { } finally { }`
    Try(TryStmt),

    /// `throw expr`
    Throw(ThrowStmt),

    /// `match expr { case v { } default { } }`
    Match(MatchStmt),

    /// `scene Name { ... }`
    Scene(SceneDecl),

    /// `web.app { route "/path" { ... } }`
    WebApp(WebAppDecl),

    /// `import name` / `from name import a, b`
    Import(ImportStmt),

    /// `export <declaration>`
    Export(ExportStmt),

    /// `const NAME = expr`
    Const(ConstDecl),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(s) => s.span,
            Stmt::Block(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::ForIn(s) => s.span,
            Stmt::Function(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Break(s) => s.span,
            Stmt::Continue(s) => s.span,
            Stmt::Class(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Throw(s) => s.span,
            Stmt::Match(s) => s.span,
            Stmt::Scene(s) => s.span,
            Stmt::WebApp(s) => s.span,
            Stmt::Import(s) => s.span,
            Stmt::Export(s) => s.span,
            Stmt::Const(s) => s.span,
        }
    }
}

/// Expression statement.
#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

/// Braced statement list.
#[derive(Debug, Clone)]
pub struct Block {
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// If statement with any number of elif branches.
#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    pub elif_branches: Vec<(Expr, Block)>,
    pub else_block: Option<Block>,
    pub span: Span,
}

/// While loop.
#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Block,
    pub span: Span,
}

/// For-in loop over an iterable value.
#[derive(Debug, Clone)]
pub struct ForInStmt {
    pub var: Symbol,
    pub iterable: Expr,
    pub body: Block,
    pub span: Span,
}

/// Function declaration; also used for class methods and carried inside
/// lambda expressions after parsing.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Symbol,
    pub params: Vec<Symbol>,
    pub body: Block,
    pub is_async: bool,
    pub span: Span,
}

/// Return statement.
#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

/// Break statement.
#[derive(Debug, Clone)]
pub struct BreakStmt {
    pub span: Span,
}

/// Continue statement.
#[derive(Debug, Clone)]
pub struct ContinueStmt {
    pub span: Span,
}

/// Class declaration with method list and optional base class name.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Symbol,
    pub base: Option<Symbol>,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

/// Try statement; at least one of `catch`/`finally` is present.
#[derive(Debug, Clone)]
pub struct TryStmt {
    pub body: Block,
    pub catch: Option<CatchClause>,
    pub finally: Option<Block>,
    pub span: Span,
}

/// Catch clause with its binding name.
#[derive(Debug, Clone)]
pub struct CatchClause {
    pub binding: Symbol,
    pub body: Block,
    pub span: Span,
}

/// Throw statement.
#[derive(Debug, Clone)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

/// Match statement.
#[derive(Debug, Clone)]
pub struct MatchStmt {
    pub subject: Expr,
    pub arms: Vec<MatchArm>,
    pub default: Option<Block>,
    pub span: Span,
}

/// One `case value { body }` arm.
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub value: Expr,
    pub body: Block,
    pub span: Span,
}

/// Scene declaration; the body becomes a setup function handed to the
/// host `__scene` builtin.
#[derive(Debug, Clone)]
pub struct SceneDecl {
    pub name: Symbol,
    pub body: Block,
    pub span: Span,
}

/// `web.app` block of route declarations.
#[derive(Debug, Clone)]
pub struct WebAppDecl {
    pub routes: Vec<RouteDecl>,
    pub span: Span,
}

/// One `route "/path" { body }` entry.
#[derive(Debug, Clone)]
pub struct RouteDecl {
    pub path: Symbol,
    pub body: Block,
    pub span: Span,
}

/// Import statement. `names` is empty for `import name`, and holds the
/// imported names for `from name import a, b`.
#[derive(Debug, Clone)]
pub struct ImportStmt {
    pub module: Symbol,
    pub names: Vec<Symbol>,
    pub span: Span,
}

/// Export wrapper around a declaration.
#[derive(Debug, Clone)]
pub struct ExportStmt {
    pub inner: Box<Stmt>,
    pub span: Span,
}

/// Const declaration.
#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: Symbol,
    pub value: Expr,
    pub span: Span,
}

/// An expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Numeric literal
    Number(NumberLit),

    /// String literal
    Str(StrLit),

    /// `true` / `false`
    Bool(BoolLit),

    /// `null`
    Null(NullLit),

    /// Identifier reference
    Ident(IdentExpr),

    /// Prefix operator application
    Unary(UnaryExpr),

    /// Arithmetic / comparison operator application
    Binary(BinaryExpr),

    /// Short-circuiting `and` / `or`
    Logical(LogicalExpr),

    /// Plain or compound assignment
    Assign(AssignExpr),

    /// `[a, b, c]`
    Array(ArrayLit),

    /// `{key: value, ...}`
    Object(ObjectLit),

    /// `obj.name`
    Member(MemberExpr),

    /// `obj[index]`
    Index(IndexExpr),

    /// `callee(args)`
    Call(CallExpr),

    /// `recv.name(args)` - bound call
    MethodCall(MethodCallExpr),

    /// `super.name(args)`
    SuperCall(SuperCallExpr),

    /// `(params) -> expr` or `(params) -> { ... }`
    Lambda(LambdaExpr),

    /// `new Class(args)`
    New(NewExpr),

    /// `this`
    This(ThisExpr),

    /// `await expr` - compiles transparently
    Await(AwaitExpr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(e) => e.span,
            Expr::Str(e) => e.span,
            Expr::Bool(e) => e.span,
            Expr::Null(e) => e.span,
            Expr::Ident(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::Binary(e) => e.span,
            Expr::Logical(e) => e.span,
            Expr::Assign(e) => e.span,
            Expr::Array(e) => e.span,
            Expr::Object(e) => e.span,
            Expr::Member(e) => e.span,
            Expr::Index(e) => e.span,
            Expr::Call(e) => e.span,
            Expr::MethodCall(e) => e.span,
            Expr::SuperCall(e) => e.span,
            Expr::Lambda(e) => e.span,
            Expr::New(e) => e.span,
            Expr::This(e) => e.span,
            Expr::Await(e) => e.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumberLit {
    pub value: f64,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StrLit {
    pub value: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BoolLit {
    pub value: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct NullLit {
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IdentExpr {
    pub name: Symbol,
    pub span: Span,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Numeric negation
    Neg,
    /// Logical `not`
    Not,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op: UnOp,
    pub operand: Box<Expr>,
    pub span: Span,
}

/// Non-short-circuiting binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub op: BinOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub span: Span,
}

/// Short-circuiting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct LogicalExpr {
    pub op: LogicalOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub span: Span,
}

/// Assignment; `op` is `Some` for compound forms (`+=` etc).
///
/// The target is an identifier, member access, or index access; the
/// parser rejects anything else.
#[derive(Debug, Clone)]
pub struct AssignExpr {
    pub target: Box<Expr>,
    pub op: Option<BinOp>,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ArrayLit {
    pub elements: Vec<Expr>,
    pub span: Span,
}

/// Object literal; keys keep their written order.
#[derive(Debug, Clone)]
pub struct ObjectLit {
    pub entries: Vec<(Symbol, Expr)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MemberExpr {
    pub object: Box<Expr>,
    pub name: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IndexExpr {
    pub object: Box<Expr>,
    pub index: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodCallExpr {
    pub recv: Box<Expr>,
    pub method: Symbol,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SuperCallExpr {
    pub method: Symbol,
    pub args: Vec<Expr>,
    pub span: Span,
}

/// Arrow function body: a bare expression or a block.
#[derive(Debug, Clone)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct LambdaExpr {
    pub params: Vec<Symbol>,
    pub body: LambdaBody,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct NewExpr {
    pub class: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ThisExpr {
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AwaitExpr {
    pub value: Box<Expr>,
    pub span: Span,
}
