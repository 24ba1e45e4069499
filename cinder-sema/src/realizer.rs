//! The type realizer.
//!
//! Walks every type signature of a module and realizes it into an interned
//! semantic type. Function declarations additionally get their signature
//! checked for function shape and their parameters assigned the realized
//! parameter types. A child signature that fails to realize is replaced by
//! the error type, so a single bad leaf does not take down the whole
//! signature.

use cinder_ast::{Block, FuncDecl, Goal, Module, Sign, SignKind, Stmt, TypeQual};

use crate::context::{DeclRef, Sema};
use crate::diag::DiagnosticConsumer;
use crate::error::SemanticError;
use crate::types::{QualSet, QualTy, TyKind, TypingContext};

pub struct TypeRealizer<'a> {
    sema: &'a mut Sema,
    consumer: &'a mut dyn DiagnosticConsumer,
    has_errors: bool,
}

impl<'a> TypeRealizer<'a> {
    pub fn new(sema: &'a mut Sema, consumer: &'a mut dyn DiagnosticConsumer) -> Self {
        TypeRealizer {
            sema,
            consumer,
            has_errors: false,
        }
    }

    /// Realizes every signature of the module.
    ///
    /// Reaches the [`Goal::TypesResolved`] goal only if no diagnostic was
    /// produced; always invalidates [`Goal::TypeChecked`] first.
    pub fn run(&mut self, module: &mut Module) {
        self.has_errors = false;
        module.remove_goal(Goal::TypesResolved);
        module.remove_goal(Goal::TypeChecked);

        for func in module.funcs() {
            self.realize_func(func);
        }

        if !self.has_errors {
            module.add_goal(Goal::TypesResolved);
        }
    }

    fn report(&mut self, diagnostic: SemanticError) {
        self.has_errors = true;
        self.consumer.consume(diagnostic);
    }

    fn realize_func(&mut self, func: &FuncDecl) {
        let sign_ty = self.realize_sign(&func.sign);

        // The declared type must be a function type, possibly behind one
        // layer of quantification.
        let func_params = sign_ty.and_then(|qt| {
            let bare = match self.sema.store.kind(qt.ty) {
                TyKind::Quantified { base, .. } => *base,
                _ => qt.ty,
            };
            match self.sema.store.kind(bare) {
                TyKind::Func { params, .. } => Some(params.clone()),
                _ => None,
            }
        });

        match (sign_ty, func_params) {
            (Some(sign_ty), Some(params)) => {
                self.sema.decl_types.insert(func.id, sign_ty);
                if func.params.len() != params.len() {
                    self.report(SemanticError::new(
                        "incompatible function signature",
                        Some(func.sign.span),
                    ));
                }
                for (decl, ty) in func.params.iter().zip(params) {
                    self.sema.decl_types.insert(decl.id, ty);
                }
            }
            _ => {
                self.report(SemanticError::new(
                    format!("'{}' is not a function type", func.sign),
                    Some(func.sign.span),
                ));
            }
        }

        if let Some(body) = &func.body {
            self.realize_block(body);
        }
    }

    fn realize_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            match stmt {
                Stmt::Alloc(alloc) => {
                    self.realize_sign(&alloc.sign);
                }
                Stmt::If(if_stmt) => {
                    self.realize_block(&if_stmt.then_body);
                    if let Some(else_body) = &if_stmt.else_body {
                        self.realize_block(else_body);
                    }
                }
                Stmt::Block(inner) => self.realize_block(inner),
                _ => {}
            }
        }
    }

    fn realize_sign(&mut self, sign: &Sign) -> Option<QualTy> {
        let ty = self.realize_sign_kind(sign)?;
        self.sema.sign_types.insert(sign.id, ty);
        Some(ty)
    }

    fn realize_sign_kind(&mut self, sign: &Sign) -> Option<QualTy> {
        match &sign.kind {
            SignKind::Ident(_) => match self.sema.resolution(sign.id)? {
                DeclRef::BuiltinType(builtin) => {
                    Some(QualTy::new(self.sema.store.builtin(builtin)))
                }
                _ => None,
            },
            SignKind::Loc(_) => {
                let symbol = self.sema.resolution(sign.id)?.symbol()?;
                Some(QualTy::new(self.sema.store.loc(symbol)))
            }
            SignKind::Func { params, output } => {
                let error = QualTy::new(self.sema.store.error_ty());
                let params: Vec<QualTy> = params
                    .iter()
                    .map(|p| self.realize_sign(p).unwrap_or(error))
                    .collect();
                let output = self.realize_sign(output).unwrap_or(error);
                Some(QualTy::new(self.sema.store.func(params, output)))
            }
            SignKind::Tuple(members) => {
                let error = QualTy::new(self.sema.store.error_ty());
                let members: Vec<QualTy> = members
                    .iter()
                    .map(|m| self.realize_sign(m).unwrap_or(error))
                    .collect();
                Some(QualTy::new(self.sema.store.tuple(members)))
            }
            SignKind::Bundled { base, assumptions } => {
                let base_ty = self.realize_sign(base)?;
                let error = QualTy::new(self.sema.store.error_ty());
                let mut bundle = TypingContext::new();
                for assumption in assumptions {
                    let Some(symbol) = self
                        .sema
                        .resolution(assumption.id)
                        .and_then(DeclRef::symbol)
                    else {
                        continue;
                    };
                    if bundle.contains(symbol) {
                        // Later assumptions about the same symbol are
                        // dropped; the first one wins.
                        self.report(SemanticError::new(
                            "inconsistent assumption",
                            Some(assumption.span),
                        ));
                        continue;
                    }
                    let value = self.realize_sign(&assumption.sign).unwrap_or(error);
                    bundle.insert(symbol, value);
                }
                Some(QualTy::with_quals(
                    self.sema.store.bundled(base_ty.ty, bundle),
                    base_ty.quals,
                ))
            }
            SignKind::Quantified {
                quantifier,
                params,
                base,
            } => {
                let base_ty = self.realize_sign(base)?;
                debug_assert!(base_ty.quals.is_empty());
                let names = params.iter().map(|p| p.name.node.clone()).collect();
                Some(QualTy::new(self.sema.store.quantified(
                    *quantifier,
                    names,
                    base_ty.ty,
                )))
            }
            SignKind::Qualified { base, quals } => {
                let base_ty = self.realize_sign(base)?;
                let mut set = base_ty.quals;
                for qual in quals {
                    match qual {
                        TypeQual::Unscoped => set = set.union(QualSet::UNSCOPED),
                    }
                }
                Some(QualTy::with_quals(base_ty.ty, set))
            }
        }
    }
}
