use cinder_ast::NodeId;

/// A symbol that can occur in the domain of a typing context.
///
/// Symbols uniquely identify a named entity. They satisfy the following
/// properties:
/// * Two symbols referring to the same declaration are equal.
/// * Two symbols referring to different declarations are different, even if
///   those declarations have the same name.
///
/// Declaration-backed symbols are derived from the declaration's [`NodeId`]
/// and are meaningful only while that declaration exists. Synthesized symbols
/// carry an integer minted by the type checker's private allocator and are
/// valid for the lifetime of the compilation context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    /// A symbol backed by a named declaration.
    Decl { node: NodeId, loc: bool },
    /// A freshly minted symbol with no declaration behind it.
    Synth { id: u32, loc: bool },
}

impl Symbol {
    /// The symbol of an ordinary value declaration.
    pub fn decl(node: NodeId) -> Self {
        Symbol::Decl { node, loc: false }
    }

    /// The symbol of a declared cell location.
    pub fn loc_decl(node: NodeId) -> Self {
        Symbol::Decl { node, loc: true }
    }

    /// A synthesized symbol.
    pub fn synth(id: u32, loc: bool) -> Self {
        Symbol::Synth { id, loc }
    }

    /// Whether the symbol refers to a memory location.
    ///
    /// Location-referring symbols are consumed linearly: a call that uses
    /// such an assumption removes it from the typing context.
    pub fn is_loc_ref(self) -> bool {
        match self {
            Symbol::Decl { loc, .. } | Symbol::Synth { loc, .. } => loc,
        }
    }

    /// The declaration behind this symbol, if any.
    pub fn decl_node(self) -> Option<NodeId> {
        match self {
            Symbol::Decl { node, .. } => Some(node),
            Symbol::Synth { .. } => None,
        }
    }
}
