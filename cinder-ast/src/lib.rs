#![forbid(unsafe_code)]

//! The Cinder abstract syntax tree.
//!
//! Cinder is a small typed intermediate language whose type system tracks,
//! at compile time, which memory locations currently hold readable data.
//! This crate defines the syntax only: nodes carry no semantic information.
//! Name resolution and typing results live in side tables owned by the
//! semantic-analysis crate, keyed by the [`NodeId`] each node carries.

use std::fmt;

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

pub type Ident = Spanned<String>;

/// A stable handle identifying one AST node within a compilation.
///
/// Handles are minted by an [`AstBuilder`] and never reused, so they can key
/// side tables (resolutions, realized types) across passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Mints [`NodeId`]s and offers shorthand constructors for AST nodes.
///
/// The parser owns one builder per compilation; tests use it directly in
/// place of a parser.
#[derive(Default, Debug)]
pub struct AstBuilder {
    next: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    fn ident(&mut self, name: &str) -> Ident {
        Ident::new(span(0, 0), name.to_string())
    }

    // --- Expressions ---

    pub fn ident_expr(&mut self, name: &str) -> Expr {
        Expr {
            id: self.node_id(),
            span: span(0, 0),
            kind: ExprKind::Ident(name.to_string()),
        }
    }

    pub fn bool_lit(&mut self, value: bool) -> Expr {
        Expr {
            id: self.node_id(),
            span: span(0, 0),
            kind: ExprKind::BoolLit(value),
        }
    }

    pub fn int_lit(&mut self, value: i64) -> Expr {
        Expr {
            id: self.node_id(),
            span: span(0, 0),
            kind: ExprKind::IntLit(value),
        }
    }

    pub fn void_lit(&mut self) -> Expr {
        Expr {
            id: self.node_id(),
            span: span(0, 0),
            kind: ExprKind::VoidLit,
        }
    }

    pub fn member(&mut self, base: Expr, offset: usize) -> Expr {
        Expr {
            id: self.node_id(),
            span: span(0, 0),
            kind: ExprKind::Member {
                base: Box::new(base),
                offset,
            },
        }
    }

    // --- Type signatures ---

    pub fn ident_sign(&mut self, name: &str) -> Sign {
        Sign {
            id: self.node_id(),
            span: span(0, 0),
            kind: SignKind::Ident(name.to_string()),
        }
    }

    pub fn loc_sign(&mut self, location: &str) -> Sign {
        let location = self.ident(location);
        Sign {
            id: self.node_id(),
            span: span(0, 0),
            kind: SignKind::Loc(location),
        }
    }

    pub fn func_sign(&mut self, params: Vec<Sign>, output: Sign) -> Sign {
        Sign {
            id: self.node_id(),
            span: span(0, 0),
            kind: SignKind::Func {
                params,
                output: Box::new(output),
            },
        }
    }

    pub fn tuple_sign(&mut self, members: Vec<Sign>) -> Sign {
        Sign {
            id: self.node_id(),
            span: span(0, 0),
            kind: SignKind::Tuple(members),
        }
    }

    pub fn assumption(&mut self, ident: &str, sign: Sign) -> AssumptionSign {
        AssumptionSign {
            id: self.node_id(),
            ident: self.ident(ident),
            sign,
            span: span(0, 0),
        }
    }

    pub fn bundled_sign(&mut self, base: Sign, assumptions: Vec<AssumptionSign>) -> Sign {
        Sign {
            id: self.node_id(),
            span: span(0, 0),
            kind: SignKind::Bundled {
                base: Box::new(base),
                assumptions,
            },
        }
    }

    pub fn quantified_param(&mut self, name: &str) -> QuantifiedParamDecl {
        QuantifiedParamDecl {
            id: self.node_id(),
            name: self.ident(name),
            span: span(0, 0),
        }
    }

    pub fn universal_sign(&mut self, params: Vec<QuantifiedParamDecl>, base: Sign) -> Sign {
        self.quantified_sign(Quantifier::Universal, params, base)
    }

    pub fn quantified_sign(
        &mut self,
        quantifier: Quantifier,
        params: Vec<QuantifiedParamDecl>,
        base: Sign,
    ) -> Sign {
        Sign {
            id: self.node_id(),
            span: span(0, 0),
            kind: SignKind::Quantified {
                quantifier,
                params,
                base: Box::new(base),
            },
        }
    }

    pub fn unscoped_sign(&mut self, base: Sign) -> Sign {
        Sign {
            id: self.node_id(),
            span: span(0, 0),
            kind: SignKind::Qualified {
                base: Box::new(base),
                quals: vec![TypeQual::Unscoped],
            },
        }
    }

    // --- Declarations ---

    pub fn param(&mut self, name: &str) -> ParamDecl {
        ParamDecl {
            id: self.node_id(),
            name: self.ident(name),
            span: span(0, 0),
        }
    }

    pub fn loc_decl(&mut self, name: &str) -> LocDecl {
        LocDecl {
            id: self.node_id(),
            name: self.ident(name),
            span: span(0, 0),
        }
    }

    pub fn func(
        &mut self,
        name: &str,
        params: Vec<ParamDecl>,
        sign: Sign,
        body: Option<Block>,
    ) -> FuncDecl {
        FuncDecl {
            id: self.node_id(),
            name: self.ident(name),
            params,
            sign,
            body,
            span: span(0, 0),
        }
    }

    // --- Statements ---

    pub fn block(&mut self, stmts: Vec<Stmt>) -> Block {
        Block {
            id: self.node_id(),
            stmts,
            span: span(0, 0),
        }
    }

    pub fn alloc(
        &mut self,
        name: &str,
        segment: MemSegment,
        sign: Sign,
        loc: Option<LocDecl>,
    ) -> Stmt {
        Stmt::Alloc(AllocStmt {
            id: self.node_id(),
            name: self.ident(name),
            segment,
            sign,
            loc,
            span: span(0, 0),
        })
    }

    pub fn salloc(&mut self, name: &str, sign: Sign) -> Stmt {
        self.alloc(name, MemSegment::Stack, sign, None)
    }

    pub fn halloc(&mut self, name: &str, sign: Sign) -> Stmt {
        self.alloc(name, MemSegment::Heap, sign, None)
    }

    pub fn free(&mut self, expr: Expr) -> Stmt {
        Stmt::Free(FreeStmt {
            expr,
            span: span(0, 0),
        })
    }

    pub fn store(&mut self, rvalue: Expr, lvalue: Expr) -> Stmt {
        Stmt::Store(StoreStmt {
            rvalue,
            lvalue,
            span: span(0, 0),
        })
    }

    pub fn load(&mut self, name: &str, lvalue: Expr) -> Stmt {
        Stmt::Load(LoadStmt {
            id: self.node_id(),
            name: self.ident(name),
            lvalue,
            span: span(0, 0),
        })
    }

    pub fn call(&mut self, name: &str, callee: Expr, args: Vec<Expr>) -> Stmt {
        Stmt::Call(CallStmt {
            id: self.node_id(),
            name: self.ident(name),
            callee,
            args,
            span: span(0, 0),
        })
    }

    pub fn if_stmt(&mut self, cond: Expr, then_body: Block, else_body: Option<Block>) -> Stmt {
        Stmt::If(IfStmt {
            cond,
            then_body,
            else_body,
            span: span(0, 0),
        })
    }

    pub fn ret(&mut self, value: Expr) -> Stmt {
        Stmt::Return(ReturnStmt {
            value,
            span: span(0, 0),
        })
    }
}

/// A compilation goal reached by a semantic-analysis pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Goal {
    /// All names have been properly resolved.
    NamesResolved,
    /// All type signatures have been properly realized.
    TypesResolved,
    /// All declarations have been properly type-checked.
    TypeChecked,
}

impl Goal {
    fn bit(self) -> u8 {
        match self {
            Goal::NamesResolved => 1 << 0,
            Goal::TypesResolved => 1 << 1,
            Goal::TypeChecked => 1 << 2,
        }
    }
}

/// The set of goals a module has reached.
///
/// Reset every time the module's declarations change, and updated at the end
/// of each pass. Passes never gate on this set (they are all safely
/// re-runnable); the driver reads it to decide whether a module is ready for
/// code generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GoalSet(u8);

impl GoalSet {
    pub fn insert(&mut self, goal: Goal) {
        self.0 |= goal.bit();
    }

    pub fn remove(&mut self, goal: Goal) {
        self.0 &= !goal.bit();
    }

    pub fn contains(self, goal: Goal) -> bool {
        self.0 & goal.bit() != 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every pass has completed successfully.
    pub fn is_complete(self) -> bool {
        self.contains(Goal::NamesResolved)
            && self.contains(Goal::TypesResolved)
            && self.contains(Goal::TypeChecked)
    }
}

/// A collection of top-level function declarations.
#[derive(Debug)]
pub struct Module {
    name: String,
    funcs: Vec<FuncDecl>,
    goals: GoalSet,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            funcs: Vec::new(),
            goals: GoalSet::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn funcs(&self) -> &[FuncDecl] {
        &self.funcs
    }

    /// Mutable access to the declarations. Any edit invalidates the goals.
    pub fn funcs_mut(&mut self) -> &mut Vec<FuncDecl> {
        self.goals.clear();
        &mut self.funcs
    }

    pub fn push_func(&mut self, func: FuncDecl) {
        self.goals.clear();
        self.funcs.push(func);
    }

    pub fn goals(&self) -> GoalSet {
        self.goals
    }

    pub fn add_goal(&mut self, goal: Goal) {
        self.goals.insert(goal);
    }

    pub fn remove_goal(&mut self, goal: Goal) {
        self.goals.remove(goal);
    }

    pub fn clear_goals(&mut self) {
        self.goals.clear();
    }
}

/// A function declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: Ident,
    pub params: Vec<ParamDecl>,
    pub sign: Sign,
    /// `None` for a prologue (forward declaration without a body).
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub id: NodeId,
    pub name: Ident,
    pub span: Span,
}

/// The declaration of a named cell location, introduced by `... at a`.
#[derive(Clone, Debug, PartialEq)]
pub struct LocDecl {
    pub id: NodeId,
    pub name: Ident,
    pub span: Span,
}

/// An abstract location name bound by a quantified signature.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantifiedParamDecl {
    pub id: NodeId,
    pub name: Ident,
    pub span: Span,
}

/// A brace-delimited block of statements; a declaration context.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// The end of a block, as a zero-length span. Diagnostics about capabilities
/// leaked past the block are anchored here.
impl Block {
    pub fn end_span(&self) -> Span {
        let end = self.span.offset() + self.span.len();
        span(end, 0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Alloc(AllocStmt),
    Free(FreeStmt),
    Store(StoreStmt),
    Load(LoadStmt),
    Call(CallStmt),
    If(IfStmt),
    Return(ReturnStmt),
    Block(Block),
}

/// The memory segment an allocation statement draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemSegment {
    /// Scoped storage, implicitly collected at the end of the declaring block.
    Stack,
    /// Long-lived storage, collected by an explicit `free`.
    Heap,
}

/// `name = salloc Sign [at loc]` / `name = halloc Sign [at loc]`.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocStmt {
    pub id: NodeId,
    pub name: Ident,
    pub segment: MemSegment,
    pub sign: Sign,
    /// The named location of the allocated cell, if the program gives one.
    pub loc: Option<LocDecl>,
    pub span: Span,
}

/// `free expr`.
#[derive(Clone, Debug, PartialEq)]
pub struct FreeStmt {
    pub expr: Expr,
    pub span: Span,
}

/// `store rvalue, lvalue`.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreStmt {
    pub rvalue: Expr,
    pub lvalue: Expr,
    pub span: Span,
}

/// `name = load lvalue`.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadStmt {
    pub id: NodeId,
    pub name: Ident,
    pub lvalue: Expr,
    pub span: Span,
}

/// `name = call callee, args...`.
#[derive(Clone, Debug, PartialEq)]
pub struct CallStmt {
    pub id: NodeId,
    pub name: Ident,
    pub callee: Expr,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Block,
    pub else_body: Option<Block>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    BoolLit(bool),
    IntLit(i64),
    VoidLit,
    Ident(String),
    /// A 0-based member projection into an aggregate, `base.offset`.
    Member { base: Box<Expr>, offset: usize },
}

impl Expr {
    /// Decomposes an l-value into its base expression and the member-offset
    /// path leading from the base to the designated storage.
    ///
    /// A plain identifier is its own base with an empty path; a chain of
    /// member projections unwinds to the innermost base.
    pub fn storage_ref(&self) -> (&Expr, Vec<usize>) {
        let mut expr = self;
        let mut path = Vec::new();
        while let ExprKind::Member { base, offset } = &expr.kind {
            path.push(*offset);
            expr = base;
        }
        path.reverse();
        (expr, path)
    }

    pub fn ident_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// The kind of a quantified signature. Only presentation depends on the
/// quantifier; instantiation treats all quantified names uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Universal,
    Existential,
}

/// A syntactic type qualifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeQual {
    /// The assumption is not bound to any lexical scope.
    Unscoped,
}

/// A syntactic type signature.
#[derive(Clone, Debug, PartialEq)]
pub struct Sign {
    pub id: NodeId,
    pub span: Span,
    pub kind: SignKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SignKind {
    /// A reference to a named type declaration.
    Ident(String),
    /// `!a` — the singleton type of the location named `a`.
    Loc(Ident),
    Func {
        params: Vec<Sign>,
        output: Box<Sign>,
    },
    Tuple(Vec<Sign>),
    /// `base + [x: T] + ...` — a base signature bundled with assumptions
    /// about the typing environment.
    Bundled {
        base: Box<Sign>,
        assumptions: Vec<AssumptionSign>,
    },
    /// `\A params . base` or `\E params . base`.
    Quantified {
        quantifier: Quantifier,
        params: Vec<QuantifiedParamDecl>,
        base: Box<Sign>,
    },
    Qualified {
        base: Box<Sign>,
        quals: Vec<TypeQual>,
    },
}

/// One `[ident: sign]` clause of a bundled signature.
#[derive(Clone, Debug, PartialEq)]
pub struct AssumptionSign {
    pub id: NodeId,
    pub ident: Ident,
    pub sign: Sign,
    pub span: Span,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::BoolLit(value) => write!(f, "{value}"),
            ExprKind::IntLit(value) => write!(f, "{value}"),
            ExprKind::VoidLit => write!(f, "void"),
            ExprKind::Ident(name) => write!(f, "{name}"),
            ExprKind::Member { base, offset } => write!(f, "{base}.{offset}"),
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SignKind::Ident(name) => write!(f, "{name}"),
            SignKind::Loc(location) => write!(f, "!{}", location.node),
            SignKind::Func { params, output } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {output}")
            }
            SignKind::Tuple(members) => {
                write!(f, "{{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, "}}")
            }
            SignKind::Bundled { base, assumptions } => {
                write!(f, "{base}")?;
                for assumption in assumptions {
                    write!(f, " + {assumption}")?;
                }
                Ok(())
            }
            SignKind::Quantified {
                quantifier,
                params,
                base,
            } => {
                let marker = match quantifier {
                    Quantifier::Universal => "\\A",
                    Quantifier::Existential => "\\E",
                };
                write!(f, "{marker} ")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param.name.node)?;
                }
                write!(f, " . {base}")
            }
            SignKind::Qualified { base, quals } => {
                for qual in quals {
                    match qual {
                        TypeQual::Unscoped => write!(f, "unscoped ")?,
                    }
                }
                write!(f, "{base}")
            }
        }
    }
}

impl fmt::Display for AssumptionSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}: {}]", self.ident.node, self.sign)
    }
}
