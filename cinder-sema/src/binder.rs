//! The name binder.
//!
//! Resolves every identifier of a module to the declaration it refers to and
//! records the resolution in the compilation context. Scopes nest lexically:
//! the module's functions, then a function's parameters, then each block's
//! local bindings, with quantified signatures opening a scope of their own.
//! Lookup walks outward and falls back to the built-in declarations.
//!
//! Each scope is populated before its statements are visited, so a name may
//! refer to a declaration appearing later in the same block.

use std::collections::HashMap;

use cinder_ast::{
    AssumptionSign, Block, Expr, ExprKind, FuncDecl, Goal, Ident, Module, Sign, SignKind, Stmt,
};

use crate::context::{DeclRef, Sema};
use crate::diag::DiagnosticConsumer;
use crate::error::SemanticError;

#[derive(Default)]
struct Scope {
    decls: HashMap<String, Vec<DeclRef>>,
}

impl Scope {
    fn declare(&mut self, name: &str, decl: DeclRef) {
        self.decls.entry(name.to_string()).or_default().push(decl);
    }

    /// The first declaration of `name` in this scope, in declaration order.
    fn first(&self, name: &str) -> Option<DeclRef> {
        self.decls.get(name).and_then(|decls| decls.first().copied())
    }
}

pub struct NameBinder<'a> {
    sema: &'a mut Sema,
    consumer: &'a mut dyn DiagnosticConsumer,
    scopes: Vec<Scope>,
    has_errors: bool,
}

impl<'a> NameBinder<'a> {
    pub fn new(sema: &'a mut Sema, consumer: &'a mut dyn DiagnosticConsumer) -> Self {
        NameBinder {
            sema,
            consumer,
            scopes: Vec::new(),
            has_errors: false,
        }
    }

    /// Binds every name of the module.
    ///
    /// Always runs to completion; reaches the [`Goal::NamesResolved`] goal
    /// only if no diagnostic was produced.
    pub fn run(&mut self, module: &mut Module) {
        self.has_errors = false;
        module.clear_goals();

        let mut top = Scope::default();
        for func in module.funcs() {
            top.declare(&func.name.node, DeclRef::Func(func.id));
            self.sema
                .decl_names
                .insert(func.id, func.name.node.clone());
        }
        self.scopes.push(top);

        for func in module.funcs() {
            self.check_duplicate(&func.name, DeclRef::Func(func.id));
            self.bind_func(func);
        }
        self.scopes.pop();

        if !self.has_errors {
            module.add_goal(Goal::NamesResolved);
        }
    }

    fn report(&mut self, diagnostic: SemanticError) {
        self.has_errors = true;
        self.consumer.consume(diagnostic);
    }

    /// Reports a declaration whose name is already taken by an earlier
    /// sibling in the innermost scope.
    fn check_duplicate(&mut self, name: &Ident, me: DeclRef) {
        let duplicate = self
            .scopes
            .last()
            .is_some_and(|scope| scope.first(&name.node) != Some(me));
        if duplicate {
            self.report(SemanticError::new(
                format!("duplicate declaration '{}'", name.node),
                Some(name.span),
            ));
        }
    }

    fn lookup(&self, name: &str) -> Option<DeclRef> {
        for scope in self.scopes.iter().rev() {
            if let Some(decl) = scope.first(name) {
                return Some(decl);
            }
        }
        self.sema.builtins.lookup(name)
    }

    fn bind_func(&mut self, func: &FuncDecl) {
        let mut scope = Scope::default();
        for param in &func.params {
            scope.declare(&param.name.node, DeclRef::Param(param.id));
            self.sema
                .decl_names
                .insert(param.id, param.name.node.clone());
        }
        self.scopes.push(scope);

        for param in &func.params {
            self.check_duplicate(&param.name, DeclRef::Param(param.id));
        }
        self.bind_sign(&func.sign);
        if let Some(body) = &func.body {
            self.bind_block(body);
        }

        self.scopes.pop();
    }

    fn bind_block(&mut self, block: &Block) {
        let mut scope = Scope::default();
        for stmt in &block.stmts {
            match stmt {
                Stmt::Alloc(alloc) => {
                    scope.declare(&alloc.name.node, DeclRef::Local(alloc.id));
                    self.sema
                        .decl_names
                        .insert(alloc.id, alloc.name.node.clone());
                    if let Some(loc) = &alloc.loc {
                        scope.declare(&loc.name.node, DeclRef::Loc(loc.id));
                        self.sema.decl_names.insert(loc.id, loc.name.node.clone());
                    }
                }
                Stmt::Load(load) => {
                    scope.declare(&load.name.node, DeclRef::Local(load.id));
                    self.sema.decl_names.insert(load.id, load.name.node.clone());
                }
                Stmt::Call(call) => {
                    scope.declare(&call.name.node, DeclRef::Local(call.id));
                    self.sema.decl_names.insert(call.id, call.name.node.clone());
                }
                _ => {}
            }
        }
        self.scopes.push(scope);

        for stmt in &block.stmts {
            self.bind_stmt(stmt);
        }

        self.scopes.pop();
    }

    fn bind_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Alloc(alloc) => {
                self.check_duplicate(&alloc.name, DeclRef::Local(alloc.id));
                if let Some(loc) = &alloc.loc {
                    self.check_duplicate(&loc.name, DeclRef::Loc(loc.id));
                }
                self.bind_sign(&alloc.sign);
            }
            Stmt::Free(free) => self.bind_expr(&free.expr),
            Stmt::Store(store) => {
                self.bind_expr(&store.rvalue);
                self.bind_expr(&store.lvalue);
            }
            Stmt::Load(load) => {
                self.check_duplicate(&load.name, DeclRef::Local(load.id));
                self.bind_expr(&load.lvalue);
            }
            Stmt::Call(call) => {
                self.check_duplicate(&call.name, DeclRef::Local(call.id));
                self.bind_expr(&call.callee);
                for arg in &call.args {
                    self.bind_expr(arg);
                }
            }
            Stmt::If(if_stmt) => {
                self.bind_expr(&if_stmt.cond);
                self.bind_block(&if_stmt.then_body);
                if let Some(else_body) = &if_stmt.else_body {
                    self.bind_block(else_body);
                }
            }
            Stmt::Return(ret) => self.bind_expr(&ret.value),
            Stmt::Block(block) => self.bind_block(block),
        }
    }

    fn bind_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => match self.lookup(name) {
                Some(decl) => {
                    self.sema.resolutions.insert(expr.id, decl);
                }
                None => self.report(SemanticError::new(
                    format!("cannot find '{name}' in scope"),
                    Some(expr.span),
                )),
            },
            ExprKind::Member { base, .. } => self.bind_expr(base),
            ExprKind::BoolLit(_) | ExprKind::IntLit(_) | ExprKind::VoidLit => {}
        }
    }

    fn bind_sign(&mut self, sign: &Sign) {
        match &sign.kind {
            SignKind::Ident(name) => match self.lookup(name) {
                Some(decl @ DeclRef::BuiltinType(_)) => {
                    self.sema.resolutions.insert(sign.id, decl);
                }
                Some(_) => self.report(SemanticError::new(
                    format!("'{name}' is not a type"),
                    Some(sign.span),
                )),
                None => self.report(SemanticError::new(
                    format!("cannot find '{name}' in scope"),
                    Some(sign.span),
                )),
            },
            SignKind::Loc(location) => match self.lookup(&location.node) {
                Some(decl) => {
                    self.sema.resolutions.insert(sign.id, decl);
                }
                None => self.report(SemanticError::new(
                    format!("cannot find '{}' in scope", location.node),
                    Some(location.span),
                )),
            },
            SignKind::Func { params, output } => {
                for param in params {
                    self.bind_sign(param);
                }
                self.bind_sign(output);
            }
            SignKind::Tuple(members) => {
                for member in members {
                    self.bind_sign(member);
                }
            }
            SignKind::Bundled { base, assumptions } => {
                self.bind_sign(base);
                for assumption in assumptions {
                    self.bind_assumption(assumption);
                }
            }
            SignKind::Quantified { params, base, .. } => {
                let mut scope = Scope::default();
                for param in params {
                    scope.declare(&param.name.node, DeclRef::Quantified(param.id));
                    self.sema
                        .decl_names
                        .insert(param.id, param.name.node.clone());
                }
                self.scopes.push(scope);
                for param in params {
                    self.check_duplicate(&param.name, DeclRef::Quantified(param.id));
                }
                self.bind_sign(base);
                self.scopes.pop();
            }
            SignKind::Qualified { base, .. } => self.bind_sign(base),
        }
    }

    fn bind_assumption(&mut self, assumption: &AssumptionSign) {
        match self.lookup(&assumption.ident.node) {
            Some(decl) => {
                self.sema.resolutions.insert(assumption.id, decl);
            }
            None => self.report(SemanticError::new(
                format!("cannot find '{}' in scope", assumption.ident.node),
                Some(assumption.ident.span),
            )),
        }
        self.bind_sign(&assumption.sign);
    }
}
