//! Request lines understood by the CogServer in s-expression mode.
//!
//! Every builder returns one newline-terminated line. Identical lines are
//! collapsed by the channel while pending, so builders must be
//! deterministic for equal arguments.

use cog_sexpr::{encode_atom, encode_atom_values, encode_frame, encode_value, quote_string};
use cog_types::{Atom, AtomSpace, Handle, Value};

/// Write an atom with all of its values, or reset it to the default truth
/// value when it carries none.
pub fn store_atom(handle: &Handle) -> String {
    let atom = encode_atom(handle.atom());
    if handle.has_values() {
        format!("(cog-set-values! {atom} {})\n", encode_atom_values(handle))
    } else {
        format!("(cog-set-tv! {atom} {})\n", encode_value(&Value::default_truth()))
    }
}

pub fn remove_atom(atom: &Atom, recursive: bool) -> String {
    if recursive {
        format!("(cog-extract-recursive! {})\n", encode_atom(atom))
    } else {
        format!("(cog-extract! {})\n", encode_atom(atom))
    }
}

/// A missing local value is sent as `#f`, which clears the remote one.
pub fn store_value(atom: &Atom, key: &Atom, value: Option<&Value>) -> String {
    let value = value.map_or_else(|| "#f".to_string(), encode_value);
    format!("(cog-set-value! {} {} {value})\n", encode_atom(atom), encode_atom(key))
}

pub fn update_value(atom: &Atom, key: &Atom, delta: &Value) -> String {
    format!(
        "(cog-update-value! {} {} {})\n",
        encode_atom(atom),
        encode_atom(key),
        encode_value(delta)
    )
}

pub fn load_value(atom: &Atom, key: &Atom) -> String {
    format!("(cog-value {} {})\n", encode_atom(atom), encode_atom(key))
}

/// Ask whether the server holds an atom: `(cog-node 'T "name")` or
/// `(cog-link 'T <outgoing...>)`.
pub fn probe_atom(atom: &Atom) -> String {
    match atom {
        Atom::Node { ty, name } => format!("(cog-node '{ty} {})\n", quote_string(name)),
        Atom::Link { ty, outgoing } => {
            let mut out = format!("(cog-link '{ty}");
            for child in outgoing {
                out.push(' ');
                out.push_str(&encode_atom(child));
            }
            out.push_str(")\n");
            out
        }
    }
}

pub fn keys_alist(atom: &Atom) -> String {
    format!("(cog-keys->alist {})\n", encode_atom(atom))
}

pub fn incoming_set(atom: &Atom) -> String {
    format!("(cog-incoming-set {})\n", encode_atom(atom))
}

pub fn incoming_by_type(atom: &Atom, ty: &str) -> String {
    format!("(cog-incoming-by-type {} '{ty})\n", encode_atom(atom))
}

/// Every atom of a type; `subtypes` adds the `#t` flag.
pub fn get_atoms(ty: &str, subtypes: bool) -> String {
    if subtypes {
        format!("(cog-get-atoms '{ty} #t)\n")
    } else {
        format!("(cog-get-atoms '{ty})\n")
    }
}

pub fn clear_space() -> &'static str {
    "(cog-atomspace-clear)\n"
}

/// `(cog-execute-cache! Q K [META [#t]])`. `fresh` only applies with a
/// metadata key.
pub fn execute_cache(query: &Atom, key: &Atom, meta: Option<&Atom>, fresh: bool) -> String {
    let mut out = format!("(cog-execute-cache! {} {}", encode_atom(query), encode_atom(key));
    if let Some(meta) = meta {
        out.push(' ');
        out.push_str(&encode_atom(meta));
        if fresh {
            out.push_str(" #t");
        }
    }
    out.push_str(")\n");
    out
}

pub fn set_proxy(proxy: &Atom) -> String {
    format!("(cog-set-proxy! {})\n", encode_atom(proxy))
}

pub fn proxy_open() -> &'static str {
    "(cog-proxy-open)\n"
}

pub fn proxy_close() -> &'static str {
    "(cog-proxy-close)\n"
}

pub fn define_top_space(space: &AtomSpace) -> String {
    format!("(define *-bogus-top-space-* {})\n", encode_frame(space))
}

pub fn current_space() -> &'static str {
    "(cog-atomspace)\n"
}
