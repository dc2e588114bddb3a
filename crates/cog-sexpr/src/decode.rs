use cog_types::{Atom, Value};

use crate::error::{SexprError, SexprResult};

/// Position of the first non-whitespace byte at or after `pos`.
pub fn skip_whitespace(s: &str, pos: usize) -> usize {
    let bytes = s.as_bytes();
    let mut p = pos;
    while p < bytes.len() && bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    p
}

pub(crate) fn peek(s: &str, pos: usize) -> SexprResult<char> {
    s[pos..]
        .chars()
        .next()
        .ok_or(SexprError::UnexpectedEnd { pos })
}

pub(crate) fn expect(s: &str, pos: usize, want: char, expected: &'static str) -> SexprResult<usize> {
    let found = peek(s, pos)?;
    if found != want {
        return Err(SexprError::Unexpected {
            pos,
            expected,
            found,
        });
    }
    Ok(pos + want.len_utf8())
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'(' || b == b')' || b == b'"'
}

/// Read a bare symbol, dropping a leading quote (`'ConceptNode`).
pub(crate) fn read_symbol(s: &str, pos: usize) -> (&str, usize) {
    let bytes = s.as_bytes();
    let mut start = pos;
    if start < bytes.len() && bytes[start] == b'\'' {
        start += 1;
    }
    let mut end = start;
    while end < bytes.len() && !is_delimiter(bytes[end]) {
        end += 1;
    }
    (&s[start..end], end)
}

pub(crate) fn read_string(s: &str, pos: usize) -> SexprResult<(String, usize)> {
    let open = expect(s, pos, '"', "'\"'")?;
    let mut out = String::new();
    let mut chars = s[open..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, open + i + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            _ => out.push(c),
        }
    }
    Err(SexprError::UnterminatedString { pos })
}

fn read_number(s: &str, pos: usize) -> SexprResult<(f64, usize)> {
    let (token, end) = read_symbol(s, pos);
    if token.is_empty() {
        return Err(SexprError::Unexpected {
            pos,
            expected: "number",
            found: peek(s, pos)?,
        });
    }
    let n = token.parse::<f64>().map_err(|_| SexprError::BadNumber {
        pos,
        token: token.to_string(),
    })?;
    Ok((n, end))
}

/// Decode one atom starting at `*pos`; on success `*pos` is just past it.
pub fn decode_atom(s: &str, pos: &mut usize) -> SexprResult<Atom> {
    let mut p = skip_whitespace(s, *pos);
    p = expect(s, p, '(', "'('")?;
    let (ty, after) = read_symbol(s, p);
    if ty.is_empty() {
        return Err(SexprError::Unexpected {
            pos: p,
            expected: "type name",
            found: peek(s, p)?,
        });
    }
    let ty = ty.to_string();
    p = skip_whitespace(s, after);

    let atom = match peek(s, p)? {
        '"' => {
            let (name, after) = read_string(s, p)?;
            p = skip_whitespace(s, after);
            p = expect(s, p, ')', "')'")?;
            Atom::Node { ty, name }
        }
        _ => {
            let mut outgoing = Vec::new();
            loop {
                p = skip_whitespace(s, p);
                if peek(s, p)? == ')' {
                    p += 1;
                    break;
                }
                outgoing.push(decode_atom(s, &mut p)?);
            }
            Atom::Link { ty, outgoing }
        }
    };
    *pos = p;
    Ok(atom)
}

/// Decode one value starting at `*pos`; on success `*pos` is just past it.
///
/// Anything that is not a known value type is decoded as an atom.
pub fn decode_value(s: &str, pos: &mut usize) -> SexprResult<Value> {
    let start = skip_whitespace(s, *pos);
    let mut p = expect(s, start, '(', "'('")?;
    let (ty, after) = read_symbol(s, p);
    p = after;

    let value = match ty {
        "FloatValue" => {
            let mut fs = Vec::new();
            loop {
                p = skip_whitespace(s, p);
                if peek(s, p)? == ')' {
                    p += 1;
                    break;
                }
                let (f, after) = read_number(s, p)?;
                fs.push(f);
                p = after;
            }
            Value::Float(fs)
        }
        "StringValue" => {
            let mut ss = Vec::new();
            loop {
                p = skip_whitespace(s, p);
                if peek(s, p)? == ')' {
                    p += 1;
                    break;
                }
                let (st, after) = read_string(s, p)?;
                ss.push(st);
                p = after;
            }
            Value::String(ss)
        }
        "LinkValue" => {
            let mut vs = Vec::new();
            loop {
                p = skip_whitespace(s, p);
                if peek(s, p)? == ')' {
                    p += 1;
                    break;
                }
                vs.push(decode_value(s, &mut p)?);
            }
            Value::List(vs)
        }
        "stv" | "SimpleTruthValue" => {
            let (strength, after) = read_number(s, skip_whitespace(s, p))?;
            let (confidence, after) = read_number(s, skip_whitespace(s, after))?;
            p = expect(s, skip_whitespace(s, after), ')', "')'")?;
            Value::Truth {
                strength,
                confidence,
            }
        }
        "VoidValue" => {
            p = expect(s, skip_whitespace(s, p), ')', "')'")?;
            Value::Void
        }
        _ => {
            p = start;
            Value::Atom(decode_atom(s, &mut p)?)
        }
    };
    *pos = p;
    Ok(value)
}

/// Result of scanning for the next parenthesized expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextExpr {
    /// A balanced expression spanning `start..=end`.
    Found { start: usize, end: usize },
    /// Only whitespace (or nothing) remains in the range.
    Exhausted,
    /// Nesting went negative, or the range ended inside an expression.
    Unbalanced { depth: i32 },
}

/// Find the next balanced `( ... )` expression in `s[from..to]`.
///
/// Parentheses inside quoted strings are ignored.
pub fn next_expr(s: &str, from: usize, to: usize) -> NextExpr {
    let bytes = s.as_bytes();
    let to = to.min(bytes.len());
    let mut depth: i32 = 0;
    let mut start = None;
    let mut in_string = false;
    let mut p = from;
    while p < to {
        let b = bytes[p];
        if in_string {
            match b {
                b'\\' => p += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'(' => {
                    if depth == 0 {
                        start = Some(p);
                    }
                    depth += 1;
                }
                b')' => {
                    depth -= 1;
                    if depth < 0 {
                        return NextExpr::Unbalanced { depth };
                    }
                    if depth == 0 {
                        if let Some(start) = start {
                            return NextExpr::Found { start, end: p };
                        }
                    }
                }
                _ => {}
            }
        }
        p += 1;
    }
    if depth > 0 {
        NextExpr::Unbalanced { depth }
    } else {
        NextExpr::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_atom, encode_value};
    use proptest::prelude::*;

    fn decode_one(s: &str) -> Atom {
        let mut pos = 0;
        decode_atom(s, &mut pos).unwrap()
    }

    #[test]
    fn decode_node() {
        assert_eq!(
            decode_one("(ConceptNode \"cat\")"),
            Atom::node("ConceptNode", "cat")
        );
    }

    #[test]
    fn decode_link_and_position() {
        let s = "  (ListLink (ConceptNode \"a\")(ConceptNode \"b\")) trailing";
        let mut pos = 0;
        let l = decode_atom(s, &mut pos).unwrap();
        assert_eq!(l.outgoing().len(), 2);
        assert_eq!(&s[pos..], " trailing");
    }

    #[test]
    fn decode_escaped_name() {
        assert_eq!(
            decode_one(r#"(ConceptNode "a \"b\" \\c")"#),
            Atom::node("ConceptNode", "a \"b\" \\c")
        );
    }

    #[test]
    fn decode_empty_link() {
        assert_eq!(decode_one("(ListLink)"), Atom::link("ListLink", vec![]));
    }

    #[test]
    fn decode_rejects_garbage() {
        let mut pos = 0;
        assert!(matches!(
            decode_atom("ConceptNode", &mut pos),
            Err(SexprError::Unexpected { .. })
        ));
        let mut pos = 0;
        assert!(matches!(
            decode_atom("(ConceptNode \"cat", &mut pos),
            Err(SexprError::UnterminatedString { .. })
        ));
        let mut pos = 0;
        assert!(matches!(
            decode_atom("(ListLink (ConceptNode \"a\")", &mut pos),
            Err(SexprError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn decode_values() {
        let mut pos = 0;
        assert_eq!(
            decode_value("(FloatValue 1 2.5 -3)", &mut pos).unwrap(),
            Value::floats([1.0, 2.5, -3.0])
        );
        let mut pos = 0;
        assert_eq!(
            decode_value("(SimpleTruthValue 0.5 0.25)", &mut pos).unwrap(),
            Value::Truth { strength: 0.5, confidence: 0.25 }
        );
        let mut pos = 0;
        assert_eq!(
            decode_value("(ConceptNode \"x\")", &mut pos).unwrap(),
            Value::Atom(Atom::node("ConceptNode", "x"))
        );
        let mut pos = 0;
        assert!(matches!(
            decode_value("(FloatValue 1 x)", &mut pos),
            Err(SexprError::BadNumber { .. })
        ));
    }

    #[test]
    fn next_expr_walks_a_list() {
        let s = "((ConceptNode \"a\") (ConceptNode \")\"))";
        let end = s.rfind(')').unwrap();
        let first = next_expr(s, 1, end);
        let NextExpr::Found { start, end: e } = first else {
            panic!("expected expression, got {first:?}");
        };
        assert_eq!(&s[start..=e], "(ConceptNode \"a\")");
        let second = next_expr(s, e + 1, end);
        let NextExpr::Found { start, end: e2 } = second else {
            panic!("expected expression, got {second:?}");
        };
        assert_eq!(&s[start..=e2], "(ConceptNode \")\")");
        assert_eq!(next_expr(s, e2 + 1, end), NextExpr::Exhausted);
    }

    #[test]
    fn next_expr_reports_unbalanced() {
        assert_eq!(
            next_expr("(ListLink (ConceptNode \"a\")", 0, 27),
            NextExpr::Unbalanced { depth: 1 }
        );
        assert_eq!(next_expr(" ) (", 0, 4), NextExpr::Unbalanced { depth: -1 });
    }

    fn arb_atom() -> impl Strategy<Value = Atom> {
        let leaf = ("[A-Z][a-zA-Z]{0,8}Node", "[ -~]{0,12}")
            .prop_map(|(ty, name)| Atom::node(ty, name));
        leaf.prop_recursive(3, 16, 4, |inner| {
            ("[A-Z][a-zA-Z]{0,8}Link", prop::collection::vec(inner, 0..4))
                .prop_map(|(ty, out)| Atom::link(ty, out))
        })
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            prop::collection::vec(-1.0e6f64..1.0e6, 0..5).prop_map(Value::Float),
            prop::collection::vec("[ -~]{0,8}", 0..4).prop_map(Value::String),
            (0.0f64..1.0, 0.0f64..1.0)
                .prop_map(|(s, c)| Value::Truth { strength: s, confidence: c }),
            arb_atom().prop_map(Value::Atom),
            Just(Value::Void),
        ]
    }

    proptest! {
        #[test]
        fn atoms_survive_the_wire(atom in arb_atom()) {
            let wire = encode_atom(&atom);
            let mut pos = 0;
            prop_assert_eq!(decode_atom(&wire, &mut pos).unwrap(), atom);
            prop_assert_eq!(pos, wire.len());
        }

        #[test]
        fn values_survive_the_wire(value in arb_value()) {
            let wire = encode_value(&value);
            let mut pos = 0;
            prop_assert_eq!(decode_value(&wire, &mut pos).unwrap(), value);
        }
    }
}
