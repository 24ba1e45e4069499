//! The type checker.
//!
//! Checks every function body against its realized signature, threading a
//! flow-sensitive typing context through the statements. The context maps
//! symbols to types; a binding for a location symbol is the capability to
//! read and write that location, and is treated linearly: allocations
//! produce it, stores update it in place, and frees and capability-consuming
//! calls remove it.
//!
//! Each statement checks in isolation: a failure is reported and the
//! statement's effects on the context are skipped, but checking continues
//! with the next statement.

use cinder_ast::{
    AllocStmt, Block, CallStmt, Expr, ExprKind, FreeStmt, FuncDecl, Goal, IfStmt, LoadStmt,
    MemSegment, Module, Quantifier, ReturnStmt, Stmt, StoreStmt,
};

use crate::context::{DeclRef, Sema};
use crate::diag::DiagnosticConsumer;
use crate::error::SemanticError;
use crate::solver::{Constraint, Operand, TypeSolver};
use crate::symbol::Symbol;
use crate::types::{QualTy, TyKind, TypingContext};

pub struct TypeChecker<'a> {
    sema: &'a mut Sema,
    consumer: &'a mut dyn DiagnosticConsumer,
    /// The typing context at the current program point.
    gamma: TypingContext,
    /// The declared output type of the function being checked.
    func_output: Option<QualTy>,
    next_synth: u32,
    has_errors: bool,
}

impl<'a> TypeChecker<'a> {
    pub fn new(sema: &'a mut Sema, consumer: &'a mut dyn DiagnosticConsumer) -> Self {
        TypeChecker {
            sema,
            consumer,
            gamma: TypingContext::new(),
            func_output: None,
            next_synth: 0,
            has_errors: false,
        }
    }

    /// Checks every function body of the module.
    ///
    /// Reaches the [`Goal::TypeChecked`] goal only if no diagnostic was
    /// produced. Functions whose declared type failed to realize are
    /// skipped silently; the realizer already reported them.
    pub fn run(&mut self, module: &mut Module) {
        self.has_errors = false;
        module.remove_goal(Goal::TypeChecked);

        for func in module.funcs() {
            self.gamma = TypingContext::new();
            self.check_func(func);
        }

        if !self.has_errors {
            module.add_goal(Goal::TypeChecked);
        }
    }

    fn report(&mut self, diagnostic: SemanticError) {
        self.has_errors = true;
        self.consumer.consume(diagnostic);
    }

    fn fresh_loc(&mut self) -> Symbol {
        let id = self.next_synth;
        self.next_synth += 1;
        Symbol::synth(id, true)
    }

    fn check_func(&mut self, func: &FuncDecl) {
        let Some(body) = &func.body else { return };
        let Some(decl_ty) = self.sema.decl_type(func.id) else {
            return;
        };
        let bare = match self.sema.store.kind(decl_ty.ty) {
            TyKind::Quantified { base, .. } => *base,
            _ => decl_ty.ty,
        };
        let TyKind::Func { output, .. } = self.sema.store.kind(bare).clone() else {
            return;
        };
        self.func_output = Some(output);

        // Bind the parameters, opening bundled parameter types into the
        // entry context. A bundle assumption that contradicts an existing
        // binding is reported and dropped.
        for param in &func.params {
            let Some(param_ty) = self.sema.decl_type(param.id) else {
                continue;
            };
            let symbol = Symbol::decl(param.id);
            match self.sema.store.opened(param_ty) {
                Some((base, assumptions)) => {
                    self.gamma.insert(symbol, base);
                    for (key, value) in assumptions.iter() {
                        match self.gamma.get(key) {
                            Some(existing) if existing != value => {
                                let diagnostic = SemanticError::inconsistent_assumption(
                                    &self.sema.symbol_name(key),
                                    &self.sema.display_qual(value),
                                    param.span,
                                );
                                self.report(diagnostic);
                            }
                            _ => {
                                self.gamma.insert(key, value);
                            }
                        }
                    }
                }
                None => {
                    self.gamma.insert(symbol, param_ty);
                }
            }
        }

        self.check_block(body);
    }

    fn check_block(&mut self, block: &Block) {
        let mut locals: Vec<Symbol> = Vec::new();
        let mut stack_locs: Vec<Symbol> = Vec::new();

        for stmt in &block.stmts {
            if let Err(diagnostic) = self.check_stmt(stmt) {
                self.report(diagnostic);
            }
            match stmt {
                Stmt::Alloc(alloc) => {
                    let symbol = Symbol::decl(alloc.id);
                    locals.push(symbol);
                    if alloc.segment == MemSegment::Stack {
                        if let Some(bound) = self.gamma.get(symbol) {
                            if let TyKind::Loc(loc) = self.sema.store.kind(bound.ty) {
                                stack_locs.push(*loc);
                            }
                        }
                    }
                }
                Stmt::Load(load) => locals.push(Symbol::decl(load.id)),
                Stmt::Call(call) => locals.push(Symbol::decl(call.id)),
                _ => {}
            }
        }

        // Local value bindings go out of scope here.
        for symbol in locals {
            self.gamma.remove(symbol);
        }

        // Stack storage is collected when its block ends, which requires
        // the capability to still be here. A capability that was freed or
        // consumed on some path, or leaked out through a returned bundle,
        // is reported at the block's closing brace.
        for loc in stack_locs {
            if self.gamma.remove(loc).is_none() {
                let diagnostic = SemanticError::missing_capability(
                    &self.sema.symbol_name(loc),
                    "Any",
                    block.end_span(),
                );
                self.report(diagnostic);
            }
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), SemanticError> {
        match stmt {
            Stmt::Alloc(alloc) => {
                self.check_alloc(alloc);
                Ok(())
            }
            Stmt::Free(free) => self.check_free(free),
            Stmt::Store(store) => self.check_store(store),
            Stmt::Load(load) => self.check_load(load),
            Stmt::Call(call) => self.check_call(call),
            Stmt::If(if_stmt) => self.check_if(if_stmt),
            Stmt::Return(ret) => self.check_return(ret),
            Stmt::Block(inner) => {
                self.check_block(inner);
                Ok(())
            }
        }
    }

    /// Binds the allocated name to the singleton type of a fresh (or named)
    /// location, and produces the capability for that location at junk
    /// type. Skipped silently if the storage signature failed to realize.
    fn check_alloc(&mut self, alloc: &AllocStmt) {
        let Some(storage) = self.sema.sign_type(alloc.sign.id) else {
            return;
        };
        let loc = match &alloc.loc {
            Some(decl) => Symbol::loc_decl(decl.id),
            None => self.fresh_loc(),
        };
        let loc_ty = self.sema.store.loc(loc);
        self.gamma.insert(Symbol::decl(alloc.id), QualTy::new(loc_ty));
        let junk = self.sema.store.junk(storage.ty);
        self.gamma.insert(loc, QualTy::with_quals(junk, storage.quals));
    }

    /// Consumes the capability for the freed location.
    fn check_free(&mut self, free: &FreeStmt) -> Result<(), SemanticError> {
        let expr_ty = self.type_of(&free.expr)?;
        let TyKind::Loc(loc) = *self.sema.store.kind(expr_ty.ty) else {
            return Err(SemanticError::free_on_non_pointer(
                &free.expr,
                &self.sema.display_qual(expr_ty),
            ));
        };
        if self.gamma.remove(loc).is_none() {
            return Err(SemanticError::missing_capability(
                &self.sema.symbol_name(loc),
                "Any",
                free.span,
            ));
        }
        Ok(())
    }

    /// Strong update: the stored value's type replaces the storage type at
    /// the written path, regardless of what the location held before.
    fn check_store(&mut self, store: &StoreStmt) -> Result<(), SemanticError> {
        let rvalue_ty = self.type_of(&store.rvalue)?;
        let (base, path) = store.lvalue.storage_ref();
        let base_ty = self.type_of(base)?;
        let TyKind::Loc(loc) = *self.sema.store.kind(base_ty.ty) else {
            return Err(SemanticError::invalid_lvalue(base));
        };
        let Some(cell_ty) = self.gamma.get(loc) else {
            return Err(SemanticError::missing_capability(
                &self.sema.symbol_name(loc),
                "Any",
                store.span,
            ));
        };
        let Some(storage_ty) = self.sema.store.dereference(cell_ty, &path) else {
            return Err(SemanticError::invalid_member_offset(&store.lvalue));
        };
        if !self.sema.store.is_qual_subtype(rvalue_ty, storage_ty) {
            return Err(SemanticError::invalid_type_conversion(
                &self.sema.display_qual(rvalue_ty),
                &self.sema.display_qual(storage_ty),
                store.rvalue.span,
            ));
        }
        let updated = self.sema.store.store_at(cell_ty, &path, rvalue_ty);
        self.gamma.insert(loc, updated);
        Ok(())
    }

    /// Binds the loaded name to the type currently stored at the designated
    /// path. Loading does not consume the capability.
    fn check_load(&mut self, load: &LoadStmt) -> Result<(), SemanticError> {
        let (base, path) = load.lvalue.storage_ref();
        let base_ty = self.type_of(base)?;
        let TyKind::Loc(loc) = *self.sema.store.kind(base_ty.ty) else {
            return Err(SemanticError::invalid_lvalue(base));
        };
        let Some(cell_ty) = self.gamma.get(loc) else {
            return Err(SemanticError::missing_capability(
                &self.sema.symbol_name(loc),
                "Any",
                load.span,
            ));
        };
        let Some(stored_ty) = self.sema.store.dereference(cell_ty, &path) else {
            return Err(SemanticError::invalid_member_offset(&load.lvalue));
        };
        self.gamma.insert(Symbol::decl(load.id), stored_ty);
        Ok(())
    }

    fn check_call(&mut self, call: &CallStmt) -> Result<(), SemanticError> {
        let callee_ty = self.type_of(&call.callee)?;
        let (params, output, quantified) = match self.sema.store.kind(callee_ty.ty).clone() {
            TyKind::Func { params, output } => (params, output, Vec::new()),
            TyKind::Quantified {
                quantifier: Quantifier::Universal,
                params: names,
                base,
            } => match self.sema.store.kind(base).clone() {
                TyKind::Func { params, output } => (params, output, names),
                _ => {
                    return Err(SemanticError::call_to_non_function(
                        &call.callee,
                        &self.sema.display_qual(callee_ty),
                    ));
                }
            },
            _ => {
                return Err(SemanticError::call_to_non_function(
                    &call.callee,
                    &self.sema.display_qual(callee_ty),
                ));
            }
        };

        // One constraint per argument/parameter pair. A failure typing one
        // argument is reported here and the pair skipped; the rest of the
        // call is still solved.
        let mut constraints = Vec::with_capacity(call.args.len());
        for (arg, &param) in call.args.iter().zip(&params) {
            match self.type_of(arg) {
                Ok(arg_ty) => constraints.push(Constraint {
                    lhs: Operand::Type(arg_ty),
                    rhs: Operand::Type(param),
                }),
                Err(diagnostic) => self.report(diagnostic),
            }
        }

        let sema = &mut *self.sema;
        let solver = TypeSolver::new(
            &mut sema.store,
            &sema.decl_names,
            &self.gamma,
            quantified,
            constraints,
        );
        let Some(solution) = solver.solve() else {
            let args: Vec<String> = call
                .args
                .iter()
                .map(|arg| match self.type_of(arg) {
                    Ok(ty) => self.sema.display_qual(ty),
                    Err(_) => "_".to_string(),
                })
                .collect();
            return Err(SemanticError::invalid_call_arg_types(
                &call.callee,
                &args.join(", "),
            ));
        };

        // Consume the capabilities the call used up.
        for &(key, _) in &solution.assumptions {
            if key.is_loc_ref() {
                self.gamma.remove(key);
            }
        }

        // Bind the call's result, opening a bundled output into the
        // context: the callee handed those capabilities back. A produced
        // assumption that contradicts a binding still live in the context
        // is reported and dropped, as at function entry.
        let output = self.sema.store.substitute_qual(output, &solution.substitutions);
        match self.sema.store.opened(output) {
            Some((base, assumptions)) => {
                self.gamma.insert(Symbol::decl(call.id), base);
                for (key, value) in assumptions.iter() {
                    match self.gamma.get(key) {
                        Some(existing) if existing != value => {
                            let diagnostic = SemanticError::inconsistent_assumption(
                                &self.sema.symbol_name(key),
                                &self.sema.display_qual(value),
                                call.span,
                            );
                            self.report(diagnostic);
                        }
                        _ => {
                            self.gamma.insert(key, value);
                        }
                    }
                }
            }
            None => {
                self.gamma.insert(Symbol::decl(call.id), output);
            }
        }
        Ok(())
    }

    /// Checks both branches from the same entry context and joins the two
    /// exit contexts.
    fn check_if(&mut self, if_stmt: &IfStmt) -> Result<(), SemanticError> {
        let cond_ty = self.type_of(&if_stmt.cond)?;
        let bool_ty = QualTy::new(self.sema.store.bool_ty());
        if !self.sema.store.is_qual_subtype(cond_ty, bool_ty) {
            return Err(SemanticError::invalid_type_conversion(
                &self.sema.display_qual(cond_ty),
                &self.sema.display_qual(bool_ty),
                if_stmt.cond.span,
            ));
        }

        let entry = self.gamma.clone();
        self.check_block(&if_stmt.then_body);
        let after_then = std::mem::replace(&mut self.gamma, entry);
        if let Some(else_body) = &if_stmt.else_body {
            self.check_block(else_body);
        }
        let joined = self.sema.store.join_contexts(&after_then, &self.gamma);
        self.gamma = joined;
        Ok(())
    }

    /// The returned value must convert to the declared output, and every
    /// capability a bundled output promises must be available here.
    fn check_return(&mut self, ret: &ReturnStmt) -> Result<(), SemanticError> {
        let value_ty = self.type_of(&ret.value)?;
        let Some(output) = self.func_output else {
            return Ok(());
        };
        let (base, assumptions) = self
            .sema
            .store
            .opened(output)
            .unwrap_or_else(|| (output, TypingContext::new()));

        if !self.sema.store.is_qual_subtype(value_ty, base) {
            return Err(SemanticError::invalid_type_conversion(
                &self.sema.display_qual(value_ty),
                &self.sema.display_qual(base),
                ret.value.span,
            ));
        }

        for (key, promised) in assumptions.iter() {
            match self.gamma.get(key) {
                None => {
                    let diagnostic = SemanticError::return_missing_capability(
                        &self.sema.symbol_name(key),
                        &self.sema.display_qual(promised),
                        ret.span,
                    );
                    self.report(diagnostic);
                }
                Some(current) if !self.sema.store.is_qual_subtype(current, promised) => {
                    let diagnostic = SemanticError::invalid_capability_conversion(
                        &self.sema.symbol_name(key),
                        &self.sema.display_qual(current),
                        &self.sema.display_qual(promised),
                        ret.span,
                    );
                    self.report(diagnostic);
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// The type of an expression at the current program point.
    fn type_of(&self, expr: &Expr) -> Result<QualTy, SemanticError> {
        match &expr.kind {
            ExprKind::BoolLit(_) => Ok(QualTy::new(self.sema.store.bool_ty())),
            ExprKind::IntLit(_) => Ok(QualTy::new(self.sema.store.int32())),
            ExprKind::VoidLit => Ok(QualTy::new(self.sema.store.void())),
            ExprKind::Ident(_) => {
                let Some(decl) = self.sema.resolution(expr.id) else {
                    return Err(SemanticError::undefined_expr_type(expr));
                };
                match decl {
                    DeclRef::Func(node) => self
                        .sema
                        .decl_type(node)
                        .ok_or_else(|| SemanticError::undefined_expr_type(expr)),
                    DeclRef::BuiltinFunc(ty) => Ok(ty),
                    other => {
                        let Some(symbol) = other.symbol() else {
                            return Err(SemanticError::undefined_expr_type(expr));
                        };
                        self.gamma
                            .get(symbol)
                            .ok_or_else(|| SemanticError::undefined_expr_type(expr))
                    }
                }
            }
            ExprKind::Member { base, offset } => {
                let base_ty = self.type_of(base)?;
                let bare = match self.sema.store.kind(base_ty.ty) {
                    TyKind::Junk(inner) => *inner,
                    _ => base_ty.ty,
                };
                let TyKind::Tuple(members) = self.sema.store.kind(bare) else {
                    return Err(SemanticError::member_access_in_scalar(
                        expr,
                        &self.sema.display_ty(bare),
                    ));
                };
                members
                    .get(*offset)
                    .copied()
                    .ok_or_else(|| SemanticError::invalid_member_offset(expr))
            }
        }
    }
}
