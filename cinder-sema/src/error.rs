use cinder_ast::{Expr, Span};
use miette::Diagnostic;
use thiserror::Error;

/// A diagnostic produced by a semantic-analysis pass.
///
/// Passes recover after reporting: a semantic error never aborts the pass,
/// it only withholds the pass's goal from the module.
#[derive(Clone, Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(cinder::sema))]
pub struct SemanticError {
    pub message: String,
    #[label]
    pub span: Option<Span>,
}

impl SemanticError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        SemanticError {
            message: message.into(),
            span,
        }
    }

    pub fn undefined_expr_type(expr: &Expr) -> Self {
        Self::new(
            format!("cannot determine the type of expression '{expr}'"),
            Some(expr.span),
        )
    }

    pub fn invalid_type_conversion(found: &str, expected: &str, span: Span) -> Self {
        Self::new(
            format!("cannot convert value of type '{found}' to expected type '{expected}'"),
            Some(span),
        )
    }

    pub fn invalid_capability_conversion(
        key: &str,
        found: &str,
        expected: &str,
        span: Span,
    ) -> Self {
        Self::new(
            format!(
                "cannot convert capability '[{key}: {found}]' to expected capability \
                 '[{key}: {expected}]'"
            ),
            Some(span),
        )
    }

    pub fn inconsistent_assumption(key: &str, ty: &str, span: Span) -> Self {
        Self::new(format!("inconsistent assumption '[{key}: {ty}]'"), Some(span))
    }

    pub fn invalid_lvalue(expr: &Expr) -> Self {
        Self::new(format!("invalid l-value '{expr}'"), Some(expr.span))
    }

    pub fn missing_capability(symbol: &str, ty: &str, span: Span) -> Self {
        Self::new(format!("missing capability [{symbol}: {ty}]"), Some(span))
    }

    pub fn return_missing_capability(symbol: &str, ty: &str, span: Span) -> Self {
        Self::new(
            format!("function return requires missing capability '[{symbol}: {ty}]'"),
            Some(span),
        )
    }

    pub fn call_to_non_function(expr: &Expr, ty: &str) -> Self {
        Self::new(format!("call to non-function type '{ty}'"), Some(expr.span))
    }

    pub fn free_on_non_pointer(expr: &Expr, ty: &str) -> Self {
        Self::new(
            format!("invalid free statement on non-pointer type '{ty}'"),
            Some(expr.span),
        )
    }

    pub fn invalid_call_arg_types(callee: &Expr, args: &str) -> Self {
        Self::new(
            format!("cannot call function '{callee}' with arguments list of type '{args}'"),
            Some(callee.span),
        )
    }

    pub fn member_access_in_scalar(expr: &Expr, ty: &str) -> Self {
        Self::new(
            format!("member access into non-tuple type '{ty}'"),
            Some(expr.span),
        )
    }

    pub fn invalid_member_offset(expr: &Expr) -> Self {
        Self::new(
            format!("invalid member offset '{expr}'"),
            Some(expr.span),
        )
    }
}
