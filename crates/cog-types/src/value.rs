use serde::{Deserialize, Serialize};

use crate::atom::Atom;

/// An immutable typed datum attached to an atom under a key atom.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// `(FloatValue 1 2 3)`
    Float(Vec<f64>),
    /// `(StringValue "a" "b")`
    String(Vec<String>),
    /// `(LinkValue ...)`, a vector of nested values.
    List(Vec<Value>),
    /// `(stv strength confidence)`
    Truth { strength: f64, confidence: f64 },
    /// An atom used as a value.
    Atom(Atom),
    /// `(VoidValue)`
    Void,
}

impl Value {
    /// The default truth value, `(stv 1 0)`.
    pub const fn default_truth() -> Self {
        Self::Truth {
            strength: 1.0,
            confidence: 0.0,
        }
    }

    pub fn floats(values: impl IntoIterator<Item = f64>) -> Self {
        Self::Float(values.into_iter().collect())
    }

    pub fn strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::String(values.into_iter().map(Into::into).collect())
    }

    /// Atoms referenced anywhere inside this value.
    pub fn atoms(&self) -> Vec<&Atom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Atom>) {
        match self {
            Self::Atom(a) => out.push(a),
            Self::List(vs) => vs.iter().for_each(|v| v.collect_atoms(out)),
            _ => {}
        }
    }
}
