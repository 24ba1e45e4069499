//! The semantic type model.
//!
//! All types live in a [`TypeStore`], which hash-conses every structurally
//! distinct type exactly once. A [`Ty`] is a handle into the store, so handle
//! equality is structural equality and contexts of types stay cheap to clone
//! and compare.

use std::collections::{BTreeMap, HashMap};

use cinder_ast::Quantifier;

use crate::symbol::Symbol;

/// A handle to an interned bare type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ty(u32);

/// A built-in scalar type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinTy {
    /// The supertype of every type.
    Any,
    Void,
    Bool,
    Int32,
    Int64,
}

impl BuiltinTy {
    pub const ALL: [BuiltinTy; 5] = [
        BuiltinTy::Any,
        BuiltinTy::Void,
        BuiltinTy::Bool,
        BuiltinTy::Int32,
        BuiltinTy::Int64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinTy::Any => "Any",
            BuiltinTy::Void => "Void",
            BuiltinTy::Bool => "Bool",
            BuiltinTy::Int32 => "Int32",
            BuiltinTy::Int64 => "Int64",
        }
    }
}

/// A set of type qualifiers, stored as a bitset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualSet(u8);

impl QualSet {
    pub const NONE: QualSet = QualSet(0);
    /// The qualified assumption is not bound to any lexical scope.
    pub const UNSCOPED: QualSet = QualSet(1 << 0);

    pub fn union(self, other: QualSet) -> QualSet {
        QualSet(self.0 | other.0)
    }

    pub fn intersection(self, other: QualSet) -> QualSet {
        QualSet(self.0 & other.0)
    }

    pub fn is_superset(self, other: QualSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn contains(self, other: QualSet) -> bool {
        self.is_superset(other)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A bare type together with its qualifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualTy {
    pub ty: Ty,
    pub quals: QualSet,
}

impl QualTy {
    pub fn new(ty: Ty) -> Self {
        QualTy {
            ty,
            quals: QualSet::NONE,
        }
    }

    pub fn with_quals(ty: Ty, quals: QualSet) -> Self {
        QualTy { ty, quals }
    }
}

impl From<Ty> for QualTy {
    fn from(ty: Ty) -> Self {
        QualTy::new(ty)
    }
}

/// The structure of an interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TyKind {
    Builtin(BuiltinTy),
    Func { params: Vec<QualTy>, output: QualTy },
    Tuple(Vec<QualTy>),
    /// The singleton type of one memory location.
    Loc(Symbol),
    /// Uninitialized storage laid out for a value of the base type.
    Junk(Ty),
    /// A base type packed with assumptions that cross a function boundary.
    Bundled {
        base: Ty,
        assumptions: TypingContext,
    },
    /// A type quantified over abstract location names.
    Quantified {
        quantifier: Quantifier,
        params: Vec<String>,
        base: Ty,
    },
    /// The type of an expression that failed to type. A subtype of every
    /// type, so one failure does not cascade.
    Error,
}

/// A substitution of symbols for symbols, accumulated by the solver.
pub type SymbolSubst = BTreeMap<Symbol, Symbol>;

/// A finite map from symbols to qualified types.
///
/// Backed by a B-tree so that iteration order is deterministic; the solver
/// enumerates candidate locations in this order when it instantiates a
/// quantified signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypingContext {
    map: BTreeMap<Symbol, QualTy>,
}

impl TypingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: Symbol) -> Option<QualTy> {
        self.map.get(&symbol).copied()
    }

    pub fn insert(&mut self, symbol: Symbol, ty: QualTy) -> Option<QualTy> {
        self.map.insert(symbol, ty)
    }

    pub fn remove(&mut self, symbol: Symbol) -> Option<QualTy> {
        self.map.remove(&symbol)
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.map.contains_key(&symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, QualTy)> + '_ {
        self.map.iter().map(|(&symbol, &ty)| (symbol, ty))
    }

    pub fn keys(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.map.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl FromIterator<(Symbol, QualTy)> for TypingContext {
    fn from_iter<I: IntoIterator<Item = (Symbol, QualTy)>>(iter: I) -> Self {
        TypingContext {
            map: iter.into_iter().collect(),
        }
    }
}

/// The owner of all interned types in one compilation context.
pub struct TypeStore {
    kinds: Vec<TyKind>,
    table: HashMap<TyKind, Ty>,
    builtins: [Ty; 5],
    error: Ty,
}

impl TypeStore {
    pub fn new() -> Self {
        let mut store = TypeStore {
            kinds: Vec::new(),
            table: HashMap::new(),
            builtins: [Ty(0); 5],
            error: Ty(0),
        };
        for (i, builtin) in BuiltinTy::ALL.into_iter().enumerate() {
            store.builtins[i] = store.intern(TyKind::Builtin(builtin));
        }
        store.error = store.intern(TyKind::Error);
        store
    }

    fn intern(&mut self, kind: TyKind) -> Ty {
        if let Some(&ty) = self.table.get(&kind) {
            return ty;
        }
        let ty = Ty(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.table.insert(kind, ty);
        ty
    }

    /// The structure behind a handle.
    pub fn kind(&self, ty: Ty) -> &TyKind {
        &self.kinds[ty.0 as usize]
    }

    // --- Accessors for the pre-interned types ---

    pub fn builtin(&self, builtin: BuiltinTy) -> Ty {
        let index = BuiltinTy::ALL
            .iter()
            .position(|&b| b == builtin)
            .unwrap_or(0);
        self.builtins[index]
    }

    pub fn any(&self) -> Ty {
        self.builtin(BuiltinTy::Any)
    }

    pub fn void(&self) -> Ty {
        self.builtin(BuiltinTy::Void)
    }

    pub fn bool_ty(&self) -> Ty {
        self.builtin(BuiltinTy::Bool)
    }

    pub fn int32(&self) -> Ty {
        self.builtin(BuiltinTy::Int32)
    }

    pub fn int64(&self) -> Ty {
        self.builtin(BuiltinTy::Int64)
    }

    pub fn error_ty(&self) -> Ty {
        self.error
    }

    // --- Constructors ---

    pub fn func(&mut self, params: Vec<QualTy>, output: QualTy) -> Ty {
        self.intern(TyKind::Func { params, output })
    }

    pub fn tuple(&mut self, members: Vec<QualTy>) -> Ty {
        self.intern(TyKind::Tuple(members))
    }

    pub fn loc(&mut self, location: Symbol) -> Ty {
        self.intern(TyKind::Loc(location))
    }

    pub fn junk(&mut self, base: Ty) -> Ty {
        debug_assert!(!matches!(self.kind(base), TyKind::Junk(_)));
        self.intern(TyKind::Junk(base))
    }

    pub fn bundled(&mut self, base: Ty, assumptions: TypingContext) -> Ty {
        debug_assert!(!matches!(self.kind(base), TyKind::Bundled { .. }));
        self.intern(TyKind::Bundled { base, assumptions })
    }

    pub fn quantified(&mut self, quantifier: Quantifier, params: Vec<String>, base: Ty) -> Ty {
        self.intern(TyKind::Quantified {
            quantifier,
            params,
            base,
        })
    }

    // --- Relations ---

    /// Whether `lhs` is a subtype of `rhs`.
    ///
    /// Subtyping is mostly identity: every type is a subtype of `Any` and of
    /// the junk type over any of its supertypes, the error type is a subtype
    /// of everything, and nothing else relates.
    pub fn is_subtype(&self, lhs: Ty, rhs: Ty) -> bool {
        if lhs == rhs || rhs == self.any() || lhs == self.error {
            return true;
        }
        if let TyKind::Junk(base) = *self.kind(rhs) {
            return self.is_subtype(lhs, base);
        }
        false
    }

    /// Qualified subtyping: the bare types must relate and the left side
    /// must carry at least the qualifiers the right side demands.
    pub fn is_qual_subtype(&self, lhs: QualTy, rhs: QualTy) -> bool {
        lhs.quals.is_superset(rhs.quals) && self.is_subtype(lhs.ty, rhs.ty)
    }

    /// The least upper bound of two bare types. Anything short of equality
    /// widens to `Any`.
    pub fn join(&self, lhs: Ty, rhs: Ty) -> Ty {
        if lhs == rhs { lhs } else { self.any() }
    }

    pub fn join_qual(&self, lhs: QualTy, rhs: QualTy) -> QualTy {
        QualTy {
            ty: self.join(lhs.ty, rhs.ty),
            quals: lhs.quals.intersection(rhs.quals),
        }
    }

    /// Merges the typing contexts of two control-flow branches.
    ///
    /// The result's domain is the intersection of both domains; a capability
    /// produced on only one branch does not survive the merge. Bindings
    /// common to both map to the join of their two types.
    pub fn join_contexts(&self, lhs: &TypingContext, rhs: &TypingContext) -> TypingContext {
        lhs.iter()
            .filter_map(|(symbol, lhs_ty)| {
                let rhs_ty = rhs.get(symbol)?;
                Some((symbol, self.join_qual(lhs_ty, rhs_ty)))
            })
            .collect()
    }

    // --- Operations ---

    /// Splits a bundled type into its base and assumptions; `None` if the
    /// type carries no bundle.
    pub fn opened(&self, ty: QualTy) -> Option<(QualTy, TypingContext)> {
        match self.kind(ty.ty) {
            TyKind::Bundled { base, assumptions } => Some((
                QualTy::with_quals(*base, ty.quals),
                assumptions.clone(),
            )),
            _ => None,
        }
    }

    /// Rewrites every location symbol of `ty` through `subst`.
    pub fn substitute(&mut self, ty: Ty, subst: &SymbolSubst) -> Ty {
        if subst.is_empty() {
            return ty;
        }
        match self.kind(ty).clone() {
            TyKind::Builtin(_) | TyKind::Error => ty,
            TyKind::Loc(symbol) => match subst.get(&symbol) {
                Some(&replacement) => self.loc(replacement),
                None => ty,
            },
            TyKind::Func { params, output } => {
                let params = params
                    .iter()
                    .map(|&p| self.substitute_qual(p, subst))
                    .collect();
                let output = self.substitute_qual(output, subst);
                self.func(params, output)
            }
            TyKind::Tuple(members) => {
                let members = members
                    .iter()
                    .map(|&m| self.substitute_qual(m, subst))
                    .collect();
                self.tuple(members)
            }
            TyKind::Junk(base) => {
                let base = self.substitute(base, subst);
                self.junk(base)
            }
            TyKind::Bundled { base, assumptions } => {
                let base = self.substitute(base, subst);
                let assumptions = assumptions
                    .iter()
                    .map(|(key, value)| {
                        let key = subst.get(&key).copied().unwrap_or(key);
                        (key, self.substitute_qual(value, subst))
                    })
                    .collect();
                self.bundled(base, assumptions)
            }
            TyKind::Quantified {
                quantifier,
                params,
                base,
            } => {
                let base = self.substitute(base, subst);
                self.quantified(quantifier, params, base)
            }
        }
    }

    pub fn substitute_qual(&mut self, ty: QualTy, subst: &SymbolSubst) -> QualTy {
        QualTy {
            ty: self.substitute(ty.ty, subst),
            quals: ty.quals,
        }
    }

    /// Follows a member-offset path through the structural layout of `ty`.
    ///
    /// Junk layers are transparent: the path descends into the layout the
    /// junk storage was allocated for. `None` if the path does not designate
    /// storage within `ty`.
    pub fn dereference(&self, ty: QualTy, path: &[usize]) -> Option<QualTy> {
        let Some((&offset, rest)) = path.split_first() else {
            return Some(ty);
        };
        match self.kind(ty.ty) {
            TyKind::Tuple(members) => {
                let member = members.get(offset).copied()?;
                self.dereference(member, rest)
            }
            TyKind::Junk(base) => self.dereference(QualTy::new(*base), path),
            _ => None,
        }
    }

    /// The type of `ty` after a strong update writing a value of type
    /// `stored` at `path`.
    ///
    /// Writing into junk-typed tuple storage splits the junk into a tuple of
    /// junk members, so initializing one member leaves the others
    /// uninitialized.
    ///
    /// # Panics
    ///
    /// Panics if `path` does not designate storage within `ty`. Callers
    /// dereference the path first.
    pub fn store_at(&mut self, ty: QualTy, path: &[usize], stored: QualTy) -> QualTy {
        let Some((&offset, rest)) = path.split_first() else {
            return stored;
        };
        let mut members = match self.kind(ty.ty).clone() {
            TyKind::Tuple(members) => members,
            TyKind::Junk(base) => match self.kind(base).clone() {
                TyKind::Tuple(members) => {
                    let mut junked = Vec::with_capacity(members.len());
                    for member in members {
                        let ty = self.junk(member.ty);
                        junked.push(QualTy::with_quals(ty, member.quals));
                    }
                    junked
                }
                _ => panic!("type is not dereferenceable"),
            },
            _ => panic!("type is not dereferenceable"),
        };
        members[offset] = self.store_at(members[offset], rest, stored);
        QualTy::with_quals(self.tuple(members), ty.quals)
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        TypeStore::new()
    }
}
