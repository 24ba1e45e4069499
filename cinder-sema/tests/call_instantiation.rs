use cinder_ast::{AstBuilder, FuncDecl, Module};
use cinder_sema::{DiagnosticBag, Sema, run_sema};

fn analyze(module: &mut Module) -> DiagnosticBag {
    let mut sema = Sema::new();
    let mut bag = DiagnosticBag::new();
    run_sema(module, &mut sema, &mut bag);
    bag
}

/// `helper : \A a . (!a + [a: Int32]) -> Void + [a: Int32]` — a prologue
/// that borrows an initialized `Int32` cell and hands the capability back.
fn capability_neutral_helper(b: &mut AstBuilder) -> FuncDecl {
    let a = b.quantified_param("a");
    let base = b.loc_sign("a");
    let in_value = b.ident_sign("Int32");
    let in_assumption = b.assumption("a", in_value);
    let param_sign = b.bundled_sign(base, vec![in_assumption]);
    let out_base = b.ident_sign("Void");
    let out_value = b.ident_sign("Int32");
    let out_assumption = b.assumption("a", out_value);
    let output = b.bundled_sign(out_base, vec![out_assumption]);
    let inner = b.func_sign(vec![param_sign], output);
    let sign = b.universal_sign(vec![a], inner);
    let p = b.param("p");
    b.func("helper", vec![p], sign, None)
}

#[test]
fn builtin_arithmetic_calls_type_as_declared() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let output = b.ident_sign("Int32");
    let sign = b.func_sign(vec![], output);
    let callee = b.ident_expr("add_Int32");
    let lhs = b.int_lit(1);
    let rhs = b.int_lit(2);
    let call = b.call("r", callee, vec![lhs, rhs]);
    let result = b.ident_expr("r");
    let ret = b.ret(result);
    let body = b.block(vec![call, ret]);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert!(
        bag.is_empty(),
        "unexpected diagnostics: {:?}",
        bag.diagnostics()
    );
}

#[test]
fn builtin_calls_reject_mismatched_arguments() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let callee = b.ident_expr("add_Int32");
    let lhs = b.int_lit(1);
    let rhs = b.bool_lit(true);
    let call = b.call("r", callee, vec![lhs, rhs]);
    let body = b.block(vec![call]);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(
        bag.count_containing("cannot call function 'add_Int32'"),
        1,
        "diagnostics: {:?}",
        bag.diagnostics()
    );
}

#[test]
fn calling_a_non_function_value_is_reported() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let param_sign = b.ident_sign("Int32");
    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![param_sign], output);
    let x = b.param("x");
    let callee = b.ident_expr("x");
    let call = b.call("r", callee, vec![]);
    let body = b.block(vec![call]);
    let func = b.func("main", vec![x], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(bag.count_containing("call to non-function type 'Int32'"), 1);
}

#[test]
fn universal_callees_instantiate_against_the_context() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let helper = capability_neutral_helper(&mut b);
    module.push_func(helper);

    // The helper borrows the cell and hands the capability back, so the
    // stack collection at block exit still finds it.
    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let storage = b.ident_sign("Int32");
    let alloc = b.salloc("p", storage);
    let value = b.int_lit(1);
    let cell = b.ident_expr("p");
    let init = b.store(value, cell);
    let callee = b.ident_expr("helper");
    let arg = b.ident_expr("p");
    let call = b.call("r", callee, vec![arg]);
    let body = b.block(vec![alloc, init, call]);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert!(
        bag.is_empty(),
        "unexpected diagnostics: {:?}",
        bag.diagnostics()
    );
    assert!(module.goals().is_complete());
}

#[test]
fn instantiation_fails_when_the_cell_holds_the_wrong_type() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let helper = capability_neutral_helper(&mut b);
    module.push_func(helper);

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let storage = b.ident_sign("Bool");
    let alloc = b.salloc("p", storage);
    let value = b.bool_lit(true);
    let cell = b.ident_expr("p");
    let init = b.store(value, cell);
    let callee = b.ident_expr("helper");
    let arg = b.ident_expr("p");
    let call = b.call("r", callee, vec![arg]);
    let body = b.block(vec![alloc, init, call]);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(
        bag.count_containing("cannot call function 'helper'"),
        1,
        "diagnostics: {:?}",
        bag.diagnostics()
    );
}

#[test]
fn existential_callees_cannot_be_applied() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    // g : \E a . (!a) -> Void — the location is hidden, not instantiable
    // at a call site.
    let a = b.quantified_param("a");
    let param_sign = b.loc_sign("a");
    let output = b.ident_sign("Void");
    let inner = b.func_sign(vec![param_sign], output);
    let sign = b.quantified_sign(cinder_ast::Quantifier::Existential, vec![a], inner);
    let p = b.param("p");
    let g = b.func("g", vec![p], sign, None);
    module.push_func(g);

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let storage = b.ident_sign("Int32");
    let alloc = b.salloc("p", storage);
    let callee = b.ident_expr("g");
    let arg = b.ident_expr("p");
    let call = b.call("r", callee, vec![arg]);
    let body = b.block(vec![alloc, call]);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(
        bag.count_containing("call to non-function type"),
        1,
        "diagnostics: {:?}",
        bag.diagnostics()
    );
}

#[test]
fn produced_capabilities_that_clash_with_live_ones_are_inconsistent() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    // g : \A a . (!a) -> Void + [a: Int32] promises a capability for a
    // cell it never took. Instantiated against live storage, the produced
    // capability contradicts the binding the context still holds; the
    // existing binding wins.
    let a = b.quantified_param("a");
    let param_sign = b.loc_sign("a");
    let out_base = b.ident_sign("Void");
    let out_value = b.ident_sign("Int32");
    let out_assumption = b.assumption("a", out_value);
    let output = b.bundled_sign(out_base, vec![out_assumption]);
    let inner = b.func_sign(vec![param_sign], output);
    let sign = b.universal_sign(vec![a], inner);
    let p = b.param("p");
    let g = b.func("g", vec![p], sign, None);
    module.push_func(g);

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let storage = b.ident_sign("Int32");
    let alloc = b.salloc("p", storage);
    let callee = b.ident_expr("g");
    let arg = b.ident_expr("p");
    let call = b.call("r", callee, vec![arg]);
    let body = b.block(vec![alloc, call]);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(
        bag.count_containing("inconsistent assumption"),
        1,
        "diagnostics: {:?}",
        bag.diagnostics()
    );
}

#[test]
fn consumed_capabilities_do_not_come_back() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    // `sink : \A a . (!a + [a: Int32]) -> Void` keeps the capability.
    let a = b.quantified_param("a");
    let base = b.loc_sign("a");
    let in_value = b.ident_sign("Int32");
    let in_assumption = b.assumption("a", in_value);
    let param_sign = b.bundled_sign(base, vec![in_assumption]);
    let output = b.ident_sign("Void");
    let inner = b.func_sign(vec![param_sign], output);
    let sign = b.universal_sign(vec![a], inner);
    let p = b.param("p");
    let sink = b.func("sink", vec![p], sign, None);
    module.push_func(sink);

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let storage = b.ident_sign("Int32");
    let alloc = b.halloc("p", storage);
    let value = b.int_lit(1);
    let cell = b.ident_expr("p");
    let init = b.store(value, cell);
    let callee = b.ident_expr("sink");
    let arg = b.ident_expr("p");
    let call = b.call("r", callee, vec![arg]);
    let cell = b.ident_expr("p");
    let free = b.free(cell);
    let body = b.block(vec![alloc, init, call, free]);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(
        bag.count_containing("missing capability"),
        1,
        "diagnostics: {:?}",
        bag.diagnostics()
    );
}
