//! The compilation context shared by all semantic-analysis passes.
//!
//! AST nodes carry no semantic state. The binder, realizer, and checker
//! record their results in the side tables of a [`Sema`], keyed by node
//! handle, so every pass stays re-runnable over an edited module.

use std::collections::HashMap;

use cinder_ast::NodeId;

use crate::symbol::Symbol;
use crate::types::{BuiltinTy, QualTy, Ty, TyKind, TypeStore};

/// The resolution of a name to the declaration it refers to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeclRef {
    /// A top-level function declaration.
    Func(NodeId),
    /// A function parameter.
    Param(NodeId),
    /// A block-local value binding (allocation, load, or call result).
    Local(NodeId),
    /// A named cell location, declared by `... at a`.
    Loc(NodeId),
    /// An abstract location bound by a quantified signature.
    Quantified(NodeId),
    /// A built-in type.
    BuiltinType(BuiltinTy),
    /// A built-in function, carrying its type directly.
    BuiltinFunc(QualTy),
}

impl DeclRef {
    /// The symbol this declaration binds in a typing context, if it binds
    /// one. Built-ins have no symbol.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            DeclRef::Func(node)
            | DeclRef::Param(node)
            | DeclRef::Local(node)
            | DeclRef::Quantified(node) => Some(Symbol::decl(node)),
            DeclRef::Loc(node) => Some(Symbol::loc_decl(node)),
            DeclRef::BuiltinType(_) | DeclRef::BuiltinFunc(_) => None,
        }
    }
}

/// The built-in declarations every module can see.
///
/// Covers the scalar types and, for each built-in integer type, the usual
/// arithmetic and comparison functions.
pub struct Builtins {
    funcs: HashMap<String, QualTy>,
}

impl Builtins {
    pub fn new(store: &mut TypeStore) -> Self {
        let mut funcs = HashMap::new();
        let bool_ty = QualTy::new(store.bool_ty());
        for int in [BuiltinTy::Int32, BuiltinTy::Int64] {
            let operand = QualTy::new(store.builtin(int));
            let arith = QualTy::new(store.func(vec![operand, operand], operand));
            for op in ["add", "sub", "mul", "div"] {
                funcs.insert(format!("{op}_{}", int.name()), arith);
            }
            let compare = QualTy::new(store.func(vec![operand, operand], bool_ty));
            for op in ["eq", "ne", "gt", "ge", "lt", "le"] {
                funcs.insert(format!("{op}_{}", int.name()), compare);
            }
        }
        Builtins { funcs }
    }

    /// Resolves a name against the built-in declarations. Functions shadow
    /// types, though no built-in carries both roles.
    pub fn lookup(&self, name: &str) -> Option<DeclRef> {
        if let Some(&ty) = self.funcs.get(name) {
            return Some(DeclRef::BuiltinFunc(ty));
        }
        BuiltinTy::ALL
            .into_iter()
            .find(|b| b.name() == name)
            .map(DeclRef::BuiltinType)
    }
}

/// The semantic state of one compilation.
pub struct Sema {
    pub store: TypeStore,
    pub builtins: Builtins,
    /// Name resolutions, keyed by the node of the referring expression,
    /// signature, or assumption clause.
    pub resolutions: HashMap<NodeId, DeclRef>,
    /// The source name of each declaration, for symbol display.
    pub decl_names: HashMap<NodeId, String>,
    /// Realized types of signatures.
    pub sign_types: HashMap<NodeId, QualTy>,
    /// Realized types of function and parameter declarations.
    pub decl_types: HashMap<NodeId, QualTy>,
}

impl Sema {
    pub fn new() -> Self {
        let mut store = TypeStore::new();
        let builtins = Builtins::new(&mut store);
        Sema {
            store,
            builtins,
            resolutions: HashMap::new(),
            decl_names: HashMap::new(),
            sign_types: HashMap::new(),
            decl_types: HashMap::new(),
        }
    }

    pub fn resolution(&self, node: NodeId) -> Option<DeclRef> {
        self.resolutions.get(&node).copied()
    }

    pub fn decl_name(&self, node: NodeId) -> Option<&str> {
        self.decl_names.get(&node).map(String::as_str)
    }

    pub fn sign_type(&self, node: NodeId) -> Option<QualTy> {
        self.sign_types.get(&node).copied()
    }

    pub fn decl_type(&self, node: NodeId) -> Option<QualTy> {
        self.decl_types.get(&node).copied()
    }

    /// The display name of a symbol. Synthesized symbols print as `#n`.
    pub fn symbol_name(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::Decl { node, .. } => match self.decl_name(node) {
                Some(name) => name.to_string(),
                None => format!("#d{}", node.index()),
            },
            Symbol::Synth { id, .. } => format!("#{id}"),
        }
    }

    pub fn display_ty(&self, ty: Ty) -> String {
        match self.store.kind(ty) {
            TyKind::Builtin(builtin) => builtin.name().to_string(),
            TyKind::Error => "<error>".to_string(),
            TyKind::Loc(symbol) => format!("!{}", self.symbol_name(*symbol)),
            TyKind::Junk(base) => format!("Junk<{}>", self.display_ty(*base)),
            TyKind::Func { params, output } => {
                let params: Vec<String> =
                    params.iter().map(|&p| self.display_qual(p)).collect();
                format!("({}) -> {}", params.join(", "), self.display_qual(*output))
            }
            TyKind::Tuple(members) => {
                let members: Vec<String> =
                    members.iter().map(|&m| self.display_qual(m)).collect();
                format!("{{{}}}", members.join(", "))
            }
            TyKind::Bundled { base, assumptions } => {
                let mut text = self.display_ty(*base);
                for (key, value) in assumptions.iter() {
                    text.push_str(&format!(
                        " + [{}: {}]",
                        self.symbol_name(key),
                        self.display_qual(value)
                    ));
                }
                text
            }
            TyKind::Quantified {
                quantifier,
                params,
                base,
            } => {
                let marker = match quantifier {
                    cinder_ast::Quantifier::Universal => "\\A",
                    cinder_ast::Quantifier::Existential => "\\E",
                };
                format!("{marker} {} . {}", params.join(", "), self.display_ty(*base))
            }
        }
    }

    pub fn display_qual(&self, ty: QualTy) -> String {
        if ty.quals.is_empty() {
            self.display_ty(ty.ty)
        } else {
            format!("unscoped {}", self.display_ty(ty.ty))
        }
    }
}

impl Default for Sema {
    fn default() -> Self {
        Sema::new()
    }
}
