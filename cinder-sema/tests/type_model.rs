use cinder_sema::{QualSet, QualTy, Symbol, TypeStore};

#[test]
fn structurally_equal_types_share_a_handle() {
    let mut store = TypeStore::new();
    let int32 = QualTy::new(store.int32());
    let void = QualTy::new(store.void());

    let t1 = store.tuple(vec![int32, int32]);
    let t2 = store.tuple(vec![int32, int32]);
    assert_eq!(t1, t2);

    let f1 = store.func(vec![int32], void);
    let f2 = store.func(vec![int32], void);
    assert_eq!(f1, f2);

    assert_ne!(t1, f1);
    let t3 = store.tuple(vec![int32]);
    assert_ne!(t1, t3);
}

#[test]
fn subtyping_is_identity_plus_any_junk_and_error() {
    let mut store = TypeStore::new();
    let int32 = store.int32();
    let bool_ty = store.bool_ty();

    assert!(store.is_subtype(int32, int32));
    assert!(store.is_subtype(int32, store.any()));
    assert!(!store.is_subtype(store.any(), int32));
    assert!(!store.is_subtype(int32, bool_ty));

    let junk = store.junk(int32);
    assert!(store.is_subtype(int32, junk));
    assert!(!store.is_subtype(junk, int32));
    assert!(!store.is_subtype(bool_ty, junk));

    assert!(store.is_subtype(store.error_ty(), int32));
    assert!(!store.is_subtype(int32, store.error_ty()));
}

#[test]
fn qualified_subtyping_requires_a_superset_of_qualifiers() {
    let store = TypeStore::new();
    let plain = QualTy::new(store.int32());
    let unscoped = QualTy::with_quals(store.int32(), QualSet::UNSCOPED);

    assert!(store.is_qual_subtype(unscoped, plain));
    assert!(!store.is_qual_subtype(plain, unscoped));
    assert!(store.is_qual_subtype(unscoped, unscoped));
}

#[test]
fn join_widens_disagreements_to_any() {
    let store = TypeStore::new();
    assert_eq!(store.join(store.int32(), store.int32()), store.int32());
    assert_eq!(store.join(store.int32(), store.bool_ty()), store.any());

    let lhs = QualTy::with_quals(store.int32(), QualSet::UNSCOPED);
    let rhs = QualTy::new(store.int32());
    let joined = store.join_qual(lhs, rhs);
    assert_eq!(joined.ty, store.int32());
    assert!(joined.quals.is_empty());
}

#[test]
fn joining_contexts_intersects_their_domains() {
    let store = TypeStore::new();
    let a = Symbol::synth(0, true);
    let b = Symbol::synth(1, true);
    let int32 = QualTy::new(store.int32());
    let bool_ty = QualTy::new(store.bool_ty());

    let lhs = [(a, int32), (b, int32)].into_iter().collect();
    let rhs = [(a, bool_ty)].into_iter().collect();
    let joined = store.join_contexts(&lhs, &rhs);

    assert_eq!(joined.len(), 1);
    assert_eq!(joined.get(a).map(|ty| ty.ty), Some(store.any()));
    assert!(joined.get(b).is_none());
}

#[test]
fn dereference_descends_through_junk_layouts() {
    let mut store = TypeStore::new();
    let int32 = QualTy::new(store.int32());
    let bool_ty = QualTy::new(store.bool_ty());
    let pair = store.tuple(vec![int32, bool_ty]);
    let junk_pair = QualTy::new(store.junk(pair));

    assert_eq!(store.dereference(junk_pair, &[]), Some(junk_pair));
    assert_eq!(store.dereference(junk_pair, &[0]), Some(int32));
    assert_eq!(store.dereference(junk_pair, &[1]), Some(bool_ty));
    assert_eq!(store.dereference(junk_pair, &[2]), None);
    assert_eq!(store.dereference(int32, &[0]), None);
}

#[test]
fn storing_into_junk_splits_the_layout() {
    let mut store = TypeStore::new();
    let int32 = QualTy::new(store.int32());
    let bool_ty = QualTy::new(store.bool_ty());
    let pair = store.tuple(vec![int32, bool_ty]);
    let junk_pair = QualTy::new(store.junk(pair));

    let updated = store.store_at(junk_pair, &[0], int32);
    let junk_bool = QualTy::new(store.junk(bool_ty.ty));
    let expected = QualTy::new(store.tuple(vec![int32, junk_bool]));
    assert_eq!(updated, expected);
}
