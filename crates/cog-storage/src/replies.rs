//! Decoding of server replies into atoms, values and key/value pairs.

use cog_sexpr::{decode_atom, decode_value, next_expr, skip_whitespace, NextExpr};
use cog_types::{Atom, AtomSpace, Handle, Value};
use tracing::warn;

use crate::error::{StorageError, StorageResult};

/// A reply starting with `()` means the server does not know the thing
/// asked about.
pub fn is_known(reply: &str) -> bool {
    !reply.starts_with("()")
}

/// Decode a single value reply. `()` and `#f` mean no value.
pub fn decode_value_reply(reply: &str) -> StorageResult<Option<Value>> {
    let start = skip_whitespace(reply, 0);
    let body = &reply[start..];
    if body.is_empty() || body.starts_with("()") || body.starts_with("#f") {
        return Ok(None);
    }
    let mut pos = start;
    Ok(Some(decode_value(reply, &mut pos)?))
}

/// Decode a flat list of atoms, `(expr expr ...)`.
///
/// A list cut short inside an expression ends the batch; the atoms decoded
/// so far are returned.
pub fn decode_atom_list(reply: &str) -> StorageResult<Vec<Atom>> {
    let (Some(open), Some(end)) = (reply.find('('), reply.rfind(')')) else {
        return Err(StorageError::Malformed(format!(
            "expected an atom list, got {:?}",
            reply.trim_end()
        )));
    };
    let mut atoms = Vec::new();
    let mut from = open + 1;
    while from < end {
        match next_expr(reply, from, end) {
            NextExpr::Found { start, end: last } => {
                let mut pos = start;
                atoms.push(decode_atom(reply, &mut pos)?);
                from = last + 1;
            }
            NextExpr::Exhausted => break,
            NextExpr::Unbalanced { depth } => {
                warn!(depth, decoded = atoms.len(), "atom list truncated at unbalanced expression");
                break;
            }
        }
    }
    Ok(atoms)
}

/// Decode `((KEY . VALUE) (KEY2 . VALUE2) ...)` onto `handle`.
///
/// With a writable `space`, the key atoms, any atoms inside the values and
/// the owning atom are added to it. A read-only space is left untouched
/// and the values stay on the handle alone. Returns the number of pairs.
pub fn decode_alist(space: Option<&AtomSpace>, handle: &Handle, alist: &str) -> StorageResult<usize> {
    let mut pos = skip_whitespace(alist, 0);
    if pos >= alist.len() {
        return Ok(0);
    }
    if !alist[pos..].starts_with('(') {
        return Err(StorageError::Malformed(format!(
            "badly formed alist at {pos}: {:?}",
            &alist[pos..]
        )));
    }
    pos += 1;

    let space = space.filter(|s| !s.is_read_only());
    let mut pairs = 0;
    while let Some(open) = alist[pos..].find('(') {
        pos += open + 1;
        let key = decode_atom(alist, &mut pos)?;
        let sep = alist[pos..]
            .find(" . ")
            .ok_or_else(|| StorageError::Malformed(format!("missing ' . ' after key {key}")))?;
        pos += sep + 3;
        let value = decode_value(alist, &mut pos)?;

        if let Some(space) = space {
            space.add(key.clone())?;
            for atom in value.atoms() {
                space.add(atom.clone())?;
            }
            space.add(handle.atom().clone())?;
        }
        handle.set_value(key, Some(value));
        pairs += 1;
    }
    Ok(pairs)
}
