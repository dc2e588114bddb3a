use std::fmt;

use serde::{Deserialize, Serialize};

/// Type name used by the remote server for "every node type".
pub const NODE: &str = "Node";
/// Type name used by the remote server for "every link type".
pub const LINK: &str = "Link";
/// Type name matching every atom.
pub const ATOM: &str = "Atom";

/// An immutable graph atom.
///
/// Nodes are identified by type and name, links by type and their ordered
/// outgoing set. Two atoms with the same content are the same atom; this is
/// what makes stores against the remote server idempotent.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Atom {
    Node { ty: String, name: String },
    Link { ty: String, outgoing: Vec<Atom> },
}

impl Atom {
    pub fn node(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Node {
            ty: ty.into(),
            name: name.into(),
        }
    }

    pub fn link(ty: impl Into<String>, outgoing: Vec<Atom>) -> Self {
        Self::Link {
            ty: ty.into(),
            outgoing,
        }
    }

    /// The type name, e.g. `ConceptNode`.
    pub fn ty(&self) -> &str {
        match self {
            Self::Node { ty, .. } | Self::Link { ty, .. } => ty,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link { .. })
    }

    /// Node name, or `None` for links.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Node { name, .. } => Some(name),
            Self::Link { .. } => None,
        }
    }

    /// Outgoing set; empty for nodes.
    pub fn outgoing(&self) -> &[Atom] {
        match self {
            Self::Node { .. } => &[],
            Self::Link { outgoing, .. } => outgoing,
        }
    }

    /// Returns `true` if `self` appears directly in this atom's outgoing set.
    pub fn contains(&self, child: &Atom) -> bool {
        self.outgoing().iter().any(|a| a == child)
    }

    /// Whether this atom belongs to the named type.
    ///
    /// The full type hierarchy lives with the host application; here only
    /// the three root categories are understood, plus exact type names.
    pub fn is_a(&self, ty: &str) -> bool {
        match ty {
            ATOM => true,
            NODE => self.is_node(),
            LINK => self.is_link(),
            other => self.ty() == other,
        }
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { ty, name } => write!(f, "({ty} {name:?})"),
            Self::Link { ty, outgoing } => {
                write!(f, "({ty}")?;
                for child in outgoing {
                    write!(f, " {child}")?;
                }
                write!(f, ")")
            }
        }
    }
}
