use cinder_ast::{AstBuilder, Goal, Module};
use cinder_sema::{DiagnosticBag, Sema, run_sema};

fn analyze(module: &mut Module) -> DiagnosticBag {
    let mut sema = Sema::new();
    let mut bag = DiagnosticBag::new();
    run_sema(module, &mut sema, &mut bag);
    bag
}

#[test]
fn function_declarations_require_a_function_signature() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let sign = b.ident_sign("Int32");
    let func = b.func("f", vec![], sign, None);
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(
        bag.count_containing("'Int32' is not a function type"),
        1,
        "diagnostics: {:?}",
        bag.diagnostics()
    );
    assert!(!module.goals().contains(Goal::TypesResolved));
}

#[test]
fn parameter_count_must_match_the_signature() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let x = b.param("x");
    let func = b.func("f", vec![x], sign, None);
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(bag.count_containing("incompatible function signature"), 1);
}

#[test]
fn duplicate_bundle_assumptions_are_inconsistent() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    // \A a . (!a + [a: Int32] + [a: Int64]) -> Void
    let a = b.quantified_param("a");
    let base = b.loc_sign("a");
    let first_sign = b.ident_sign("Int32");
    let first = b.assumption("a", first_sign);
    let second_sign = b.ident_sign("Int64");
    let second = b.assumption("a", second_sign);
    let param_sign = b.bundled_sign(base, vec![first, second]);
    let output = b.ident_sign("Void");
    let inner = b.func_sign(vec![param_sign], output);
    let sign = b.universal_sign(vec![a], inner);
    let p = b.param("p");
    let func = b.func("f", vec![p], sign, None);
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(
        bag.count_containing("inconsistent assumption"),
        1,
        "diagnostics: {:?}",
        bag.diagnostics()
    );
    assert!(!module.goals().contains(Goal::TypesResolved));
}

#[test]
fn a_bad_leaf_does_not_hide_the_function_shape() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    // The output names an unknown type; the parameter list still realizes
    // and the declaration keeps its function shape, so only the binder
    // complains.
    let param_sign = b.ident_sign("Int32");
    let output = b.ident_sign("Quux");
    let sign = b.func_sign(vec![param_sign], output);
    let x = b.param("x");
    let func = b.func("f", vec![x], sign, None);
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(bag.count_containing("cannot find 'Quux' in scope"), 1);
    assert_eq!(bag.count_containing("is not a function type"), 0);
    assert_eq!(bag.len(), 1, "diagnostics: {:?}", bag.diagnostics());
}
