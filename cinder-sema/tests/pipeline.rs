use cinder_ast::{AstBuilder, Goal, Module};
use cinder_sema::{DiagnosticBag, Sema, run_sema};

fn analyze(module: &mut Module) -> DiagnosticBag {
    let mut sema = Sema::new();
    let mut bag = DiagnosticBag::new();
    run_sema(module, &mut sema, &mut bag);
    bag
}

#[test]
fn identity_function_reaches_every_goal() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let param_sign = b.ident_sign("Int32");
    let output_sign = b.ident_sign("Int32");
    let sign = b.func_sign(vec![param_sign], output_sign);
    let x = b.param("x");
    let value = b.ident_expr("x");
    let ret = b.ret(value);
    let body = b.block(vec![ret]);
    let func = b.func("id", vec![x], sign, Some(body));
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
fn prologues_without_bodies_are_accepted() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let output_sign = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output_sign);
    let func = b.func("extern_hook", vec![], sign, None);
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
fn editing_the_module_invalidates_its_goals() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let output_sign = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output_sign);
    let func = b.func("first", vec![], sign, None);
    module.push_func(func);

    let bag = analyze(&mut module);
    assert!(bag.is_empty());
    assert!(module.goals().is_complete());

    let output_sign = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output_sign);
    let func = b.func("second", vec![], sign, None);
    module.push_func(func);
    assert!(module.goals().is_empty());

    let bag = analyze(&mut module);
    assert!(bag.is_empty());
    assert!(module.goals().is_complete());
}

#[test]
fn failed_analysis_withholds_the_goal_but_keeps_later_passes_running() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    // The body refers to an unbound name; binding fails but realization
    // still completes.
    let output_sign = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output_sign);
    let missing = b.ident_expr("nowhere");
    let free = b.free(missing);
    let body = b.block(vec![free]);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert!(!bag.is_empty());
    assert!(!module.goals().contains(Goal::NamesResolved));
    assert!(module.goals().contains(Goal::TypesResolved));
}
