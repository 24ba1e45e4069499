use cinder_ast::{AstBuilder, Module, span};
use cinder_sema::{DiagnosticBag, Sema, run_sema};

fn analyze(module: &mut Module) -> DiagnosticBag {
    let mut sema = Sema::new();
    let mut bag = DiagnosticBag::new();
    run_sema(module, &mut sema, &mut bag);
    bag
}

#[test]
fn stack_storage_is_collected_at_block_exit() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let storage = b.ident_sign("Int32");
    let alloc = b.salloc("x", storage);
    let body = b.block(vec![alloc]);
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
fn consumed_stack_capability_is_reported_at_the_blocks_end() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    // Freeing stack storage consumes the capability the block-exit
    // collection needs, so the leak is reported at the closing brace.
    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let storage = b.ident_sign("Int32");
    let alloc = b.salloc("x", storage);
    let freed = b.ident_expr("x");
    let free = b.free(freed);
    let mut body = b.block(vec![alloc, free]);
    body.span = span(10, 20);
    let func = b.func("main", vec![], sign, Some(body));
    module.push_func(func);

    let bag = analyze(&mut module);
    assert_eq!(
        bag.count_containing("missing capability"),
        1,
        "diagnostics: {:?}",
        bag.diagnostics()
    );
    let diagnostic = &bag.diagnostics()[0];
    assert_eq!(diagnostic.span, Some(span(30, 0)));
}

#[test]
fn heap_storage_may_outlive_its_block() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let storage = b.ident_sign("Int32");
    let alloc = b.halloc("x", storage);
    let body = b.block(vec![alloc]);
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
fn nested_blocks_collect_their_own_stack_storage() {
    let mut b = AstBuilder::new();
    let mut module = Module::new("main");

    let output = b.ident_sign("Void");
    let sign = b.func_sign(vec![], output);
    let inner_storage = b.ident_sign("Bool");
    let inner_alloc = b.salloc("y", inner_storage);
    let inner = b.block(vec![inner_alloc]);
    let outer_storage = b.ident_sign("Int32");
    let outer_alloc = b.salloc("x", outer_storage);
    let body = b.block(vec![outer_alloc, cinder_ast::Stmt::Block(inner)]);
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
