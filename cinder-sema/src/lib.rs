#![forbid(unsafe_code)]

//! Semantic analysis for Cinder modules.
//!
//! Analysis is three passes over a module, each re-runnable and each
//! recording what it learns in a shared [`Sema`] context:
//!
//! 1. [`NameBinder`] resolves every identifier to its declaration.
//! 2. [`TypeRealizer`] turns every type signature into an interned
//!    semantic type.
//! 3. [`TypeChecker`] checks every function body, tracking the memory
//!    capabilities each statement consumes and produces.
//!
//! Passes report through a [`DiagnosticConsumer`] and never abort early. The
//! module's goal set records which passes completed without diagnostics;
//! [`run_sema`] chains all three.

mod binder;
mod checker;
mod context;
mod diag;
mod error;
mod realizer;
mod solver;
mod symbol;
mod types;

pub use binder::NameBinder;
pub use checker::TypeChecker;
pub use context::{Builtins, DeclRef, Sema};
pub use diag::{DiagnosticBag, DiagnosticConsumer};
pub use error::SemanticError;
pub use realizer::TypeRealizer;
pub use solver::{Constraint, Operand, Solution, TypeSolver};
pub use symbol::Symbol;
pub use types::{
    BuiltinTy, QualSet, QualTy, SymbolSubst, Ty, TyKind, TypeStore, TypingContext,
};

use cinder_ast::Module;

/// Runs the full analysis pipeline over a module.
///
/// The module's goal set is complete afterwards exactly when no pass
/// produced a diagnostic.
pub fn run_sema(module: &mut Module, sema: &mut Sema, consumer: &mut dyn DiagnosticConsumer) {
    NameBinder::new(sema, consumer).run(module);
    TypeRealizer::new(sema, consumer).run(module);
    TypeChecker::new(sema, consumer).run(module);
}
