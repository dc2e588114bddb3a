use cog_types::AtomSpace;

use crate::decode::{expect, peek, read_string, read_symbol, skip_whitespace};
use crate::encode::quote_string;
use crate::error::{SexprError, SexprResult};

/// A decoded atomspace frame: its name and the frames it sits on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameExpr {
    pub name: String,
    pub parents: Vec<FrameExpr>,
}

impl FrameExpr {
    pub fn new(name: impl Into<String>, parents: Vec<FrameExpr>) -> Self {
        Self {
            name: name.into(),
            parents,
        }
    }
}

/// Encode a frame and its ancestry, e.g.
/// `(AtomSpace "top" (AtomSpace "base"))`.
pub fn encode_frame(space: &AtomSpace) -> String {
    let mut out = String::from("(AtomSpace ");
    out.push_str(&quote_string(space.name()));
    for parent in space.parents() {
        out.push(' ');
        out.push_str(&encode_frame(parent));
    }
    out.push(')');
    out
}

/// Decode a frame expression starting at `*pos`.
pub fn decode_frame(s: &str, pos: &mut usize) -> SexprResult<FrameExpr> {
    let mut p = skip_whitespace(s, *pos);
    p = expect(s, p, '(', "'('")?;
    let (ty, after) = read_symbol(s, p);
    if ty != "AtomSpace" {
        return Err(SexprError::Unexpected {
            pos: p,
            expected: "AtomSpace",
            found: peek(s, p)?,
        });
    }
    p = skip_whitespace(s, after);

    let mut name = String::new();
    if peek(s, p)? == '"' {
        let (n, after) = read_string(s, p)?;
        name = n;
        p = after;
    }

    let mut parents = Vec::new();
    loop {
        p = skip_whitespace(s, p);
        if peek(s, p)? == ')' {
            p += 1;
            break;
        }
        parents.push(decode_frame(s, &mut p)?);
    }
    *pos = p;
    Ok(FrameExpr { name, parents })
}
