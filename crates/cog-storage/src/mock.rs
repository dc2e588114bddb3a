//! A small in-process CogServer for storage tests. It interprets the
//! request forms the backend sends against an in-memory atomspace.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use cog_sexpr::{decode_atom, decode_value, encode_atom, encode_atom_values, encode_value, skip_whitespace};
use cog_types::{AtomSpace, Handle, Value};

use crate::replies::decode_alist;

struct Inner {
    remote: Arc<AtomSpace>,
    frame: Mutex<Option<String>>,
    received: Mutex<Vec<String>>,
    stop: AtomicBool,
}

pub(crate) struct MockCogServer {
    addr: SocketAddr,
    inner: Arc<Inner>,
}

impl MockCogServer {
    pub(crate) fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let inner = Arc::new(Inner {
            remote: Arc::new(AtomSpace::new("remote")),
            frame: Mutex::new(None),
            received: Mutex::new(Vec::new()),
            stop: AtomicBool::new(false),
        });
        let accept = Arc::clone(&inner);
        thread::spawn(move || {
            for stream in listener.incoming() {
                if accept.stop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let inner = Arc::clone(&accept);
                thread::spawn(move || serve(stream, inner));
            }
        });
        Self { addr, inner }
    }

    pub(crate) fn uri(&self) -> String {
        format!("cog://127.0.0.1:{}/test", self.addr.port())
    }

    /// The server-side atomspace.
    pub(crate) fn remote(&self) -> Arc<AtomSpace> {
        Arc::clone(&self.inner.remote)
    }

    pub(crate) fn received(&self) -> Vec<String> {
        self.inner.received.lock().unwrap().clone()
    }
}

impl Drop for MockCogServer {
    fn drop(&mut self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
    }
}

fn serve(stream: TcpStream, inner: Arc<Inner>) {
    let Ok(mut writer) = stream.try_clone() else { return };
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let reply = if line == "sexpr\n" {
            "sexpr mode enabled".to_string()
        } else {
            inner.received.lock().unwrap().push(line.clone());
            respond(&inner, &line)
        };
        if writer.write_all(reply.as_bytes()).is_err() {
            return;
        }
    }
}

/// Read `'Type`.
fn quoted_symbol(s: &str, pos: &mut usize) -> String {
    let start = skip_whitespace(s, *pos) + 1;
    let len = s[start..]
        .find(|c: char| c.is_whitespace() || c == ')')
        .unwrap_or(s.len() - start);
    *pos = start + len;
    s[start..start + len].to_string()
}

fn atom_list<'a>(atoms: impl IntoIterator<Item = &'a Handle>) -> String {
    let body: Vec<String> = atoms.into_iter().map(|h| encode_atom(h.atom())).collect();
    format!("({})\n", body.join(" "))
}

fn add_values(old: Option<Value>, delta: Value) -> Value {
    match (old, delta) {
        (Some(Value::Float(mut acc)), Value::Float(d)) => {
            if acc.len() < d.len() {
                acc.resize(d.len(), 0.0);
            }
            for (a, x) in acc.iter_mut().zip(d) {
                *a += x;
            }
            Value::Float(acc)
        }
        (_, delta) => delta,
    }
}

fn respond(inner: &Inner, line: &str) -> String {
    let remote = &inner.remote;
    let head_end = line[1..]
        .find(|c: char| c.is_whitespace() || c == ')')
        .map_or(line.len(), |i| i + 1);
    let head = &line[1..head_end];
    let mut pos = head_end;
    let atom = |pos: &mut usize| decode_atom(line, pos).unwrap();

    match head {
        "cog-set-tv!" => {
            remote.add(atom(&mut pos)).unwrap();
            "(stv 1 0)\n".into()
        }
        "cog-set-values!" => {
            let h = remote.add(atom(&mut pos)).unwrap();
            decode_alist(Some(remote.as_ref()), &h, &line[pos..]).unwrap();
            "()\n".into()
        }
        "cog-set-value!" => {
            let h = remote.add(atom(&mut pos)).unwrap();
            let key = remote.add(atom(&mut pos)).unwrap().atom().clone();
            if line[skip_whitespace(line, pos)..].starts_with("#f") {
                h.set_value(key, None);
            } else {
                h.set_value(key, Some(decode_value(line, &mut pos).unwrap()));
            }
            "()\n".into()
        }
        "cog-update-value!" => {
            let h = remote.add(atom(&mut pos)).unwrap();
            let key = atom(&mut pos);
            let delta = decode_value(line, &mut pos).unwrap();
            h.set_value(key.clone(), Some(add_values(h.value(&key), delta)));
            "()\n".into()
        }
        "cog-value" => {
            let a = atom(&mut pos);
            let key = atom(&mut pos);
            match remote.get(&a).and_then(|h| h.value(&key)) {
                Some(v) => format!("{}\n", encode_value(&v)),
                None => "()\n".into(),
            }
        }
        "cog-extract!" | "cog-extract-recursive!" => {
            let ok = remote.remove(&atom(&mut pos), head == "cog-extract-recursive!").is_ok();
            (if ok { "#t\n" } else { "#f\n" }).into()
        }
        "cog-node" | "cog-link" => {
            let body = line[pos..].trim_start().trim_start_matches('\'');
            let probe = format!("({body}");
            let a = decode_atom(&probe, &mut 0).unwrap();
            match remote.get(&a) {
                Some(h) => format!("{}\n", encode_atom(h.atom())),
                None => "()\n".into(),
            }
        }
        "cog-keys->alist" => match remote.get(&atom(&mut pos)) {
            Some(h) => format!("{}\n", encode_atom_values(&h)),
            None => "()\n".into(),
        },
        "cog-incoming-set" => atom_list(&remote.incoming(&atom(&mut pos))),
        "cog-incoming-by-type" => {
            let a = atom(&mut pos);
            let ty = quoted_symbol(line, &mut pos);
            atom_list(&remote.incoming_by_type(&a, &ty))
        }
        "cog-get-atoms" => {
            let ty = quoted_symbol(line, &mut pos);
            atom_list(&remote.atoms_of_type(&ty))
        }
        "cog-atomspace-clear" => {
            remote.clear();
            "#t\n".into()
        }
        "cog-execute-cache!" => "(FloatValue 1 2 3)\n".into(),
        "cog-proxy-open" | "cog-proxy-close" | "cog-set-proxy!" => "#t\n".into(),
        "define" => {
            let expr = line[pos..]
                .trim()
                .trim_start_matches("*-bogus-top-space-*")
                .trim()
                .strip_suffix(')')
                .unwrap_or_default()
                .to_string();
            *inner.frame.lock().unwrap() = Some(expr);
            "()\n".into()
        }
        "cog-atomspace" => match inner.frame.lock().unwrap().as_ref() {
            Some(frame) => format!("{frame}\n"),
            None => "(AtomSpace \"remote\")\n".into(),
        },
        _ => "()\n".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cog_types::Atom;

    fn inner() -> Inner {
        Inner {
            remote: Arc::new(AtomSpace::new("remote")),
            frame: Mutex::new(None),
            received: Mutex::new(Vec::new()),
            stop: AtomicBool::new(false),
        }
    }

    #[test]
    fn interprets_probe_and_listing() {
        let inner = inner();
        inner.remote.add(Atom::node("ConceptNode", "cat")).unwrap();
        assert_eq!(
            respond(&inner, "(cog-node 'ConceptNode \"cat\")\n"),
            "(ConceptNode \"cat\")\n"
        );
        assert_eq!(respond(&inner, "(cog-node 'ConceptNode \"dog\")\n"), "()\n");
        assert_eq!(
            respond(&inner, "(cog-get-atoms 'Node #t)\n"),
            "((ConceptNode \"cat\"))\n"
        );
    }

    #[test]
    fn accumulates_float_deltas() {
        let inner = inner();
        let req = "(cog-update-value! (ConceptNode \"c\") (PredicateNode \"k\") (FloatValue 1 2))\n";
        respond(&inner, req);
        respond(&inner, req);
        assert_eq!(
            respond(&inner, "(cog-value (ConceptNode \"c\") (PredicateNode \"k\"))\n"),
            "(FloatValue 2 4)\n"
        );
    }
}
