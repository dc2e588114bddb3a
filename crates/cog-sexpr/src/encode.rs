use std::fmt::Write;

use cog_types::{Atom, Handle, Value};

/// Quote a string for the wire, escaping `"` and `\`.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Encode an atom, e.g. `(ListLink (ConceptNode "a") (ConceptNode "b"))`.
pub fn encode_atom(atom: &Atom) -> String {
    let mut out = String::new();
    write_atom(&mut out, atom);
    out
}

fn write_atom(out: &mut String, atom: &Atom) {
    match atom {
        Atom::Node { ty, name } => {
            let _ = write!(out, "({ty} {})", quote_string(name));
        }
        Atom::Link { ty, outgoing } => {
            out.push('(');
            out.push_str(ty);
            for child in outgoing {
                out.push(' ');
                write_atom(out, child);
            }
            out.push(')');
        }
    }
}

/// Encode a value, e.g. `(FloatValue 1 2 3)` or `(stv 1 0)`.
pub fn encode_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Float(fs) => {
            out.push_str("(FloatValue");
            for f in fs {
                let _ = write!(out, " {f}");
            }
            out.push(')');
        }
        Value::String(ss) => {
            out.push_str("(StringValue");
            for s in ss {
                out.push(' ');
                out.push_str(&quote_string(s));
            }
            out.push(')');
        }
        Value::List(vs) => {
            out.push_str("(LinkValue");
            for v in vs {
                out.push(' ');
                write_value(out, v);
            }
            out.push(')');
        }
        Value::Truth {
            strength,
            confidence,
        } => {
            let _ = write!(out, "(stv {strength} {confidence})");
        }
        Value::Atom(a) => write_atom(out, a),
        Value::Void => out.push_str("(VoidValue)"),
    }
}

/// Encode every key/value pair on a handle as an association list,
/// `((KEY . VALUE)(KEY2 . VALUE2))`.
pub fn encode_atom_values(handle: &Handle) -> String {
    let mut out = String::from("(");
    for (key, value) in handle.values() {
        out.push('(');
        write_atom(&mut out, &key);
        out.push_str(" . ");
        write_value(&mut out, &value);
        out.push(')');
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_encoding() {
        let a = Atom::node("ConceptNode", "cat");
        assert_eq!(encode_atom(&a), "(ConceptNode \"cat\")");
    }

    #[test]
    fn link_encoding() {
        let l = Atom::link(
            "ListLink",
            vec![Atom::node("ConceptNode", "a"), Atom::node("ConceptNode", "b")],
        );
        assert_eq!(
            encode_atom(&l),
            "(ListLink (ConceptNode \"a\") (ConceptNode \"b\"))"
        );
        assert_eq!(encode_atom(&Atom::link("ListLink", vec![])), "(ListLink)");
    }

    #[test]
    fn names_are_escaped() {
        let a = Atom::node("ConceptNode", "say \"hi\" \\o/");
        assert_eq!(
            encode_atom(&a),
            "(ConceptNode \"say \\\"hi\\\" \\\\o/\")"
        );
    }

    #[test]
    fn value_encodings() {
        assert_eq!(encode_value(&Value::default_truth()), "(stv 1 0)");
        assert_eq!(
            encode_value(&Value::floats([1.0, 2.5, -3.0])),
            "(FloatValue 1 2.5 -3)"
        );
        assert_eq!(
            encode_value(&Value::strings(["a", "b"])),
            "(StringValue \"a\" \"b\")"
        );
        assert_eq!(encode_value(&Value::Void), "(VoidValue)");
        assert_eq!(
            encode_value(&Value::List(vec![
                Value::floats([1.0]),
                Value::Atom(Atom::node("ConceptNode", "x")),
            ])),
            "(LinkValue (FloatValue 1) (ConceptNode \"x\"))"
        );
    }

    #[test]
    fn atom_values_alist() {
        let h = Handle::new(Atom::node("ConceptNode", "cat"));
        assert_eq!(encode_atom_values(&h), "()");
        h.set_value(
            Atom::node("PredicateNode", "k"),
            Some(Value::floats([1.0])),
        );
        assert_eq!(
            encode_atom_values(&h),
            "(((PredicateNode \"k\") . (FloatValue 1)))"
        );
    }
}
