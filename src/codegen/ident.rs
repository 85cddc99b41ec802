use std::fmt::{self, Write};

/// Words that cannot be used as plain Rust identifiers but are accepted as
/// raw identifiers.
static KEYWORDS: phf::Set<&'static str> = phf::phf_set! {
    "as", "break", "const", "continue", "else", "enum", "extern", "false", "fn",
    "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "async", "await", "dyn", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "typeof", "unsized", "virtual", "yield",
    "try", "gen",
};

/// Keywords that cannot even be raw identifiers.
static RESERVED: phf::Set<&'static str> = phf::phf_set! {
    "self", "Self", "super", "crate",
};

/// A source name rendered as a valid Rust identifier.
///
/// Source identifiers may contain any alphanumeric character, while Rust only
/// takes XID characters. Every non-ASCII character is spelled out as
/// `_u{hex}_`, so `é_1` becomes `_ue9__1`.
pub struct Ident<'a>(pub &'a str);

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.0;
        if RESERVED.contains(name) {
            write!(f, "{name}_")
        } else if KEYWORDS.contains(name) {
            write!(f, "r#{name}")
        } else {
            write_ascii(f, name)
        }
    }
}

/// The local variable that holds a record read by `read <name>`.
///
/// Reader names may collide with prelude items (`None`, `Ok`) that would turn
/// a `let` into a refutable pattern, so records are bound under a prefix.
pub struct Binding<'a>(pub &'a str);

impl fmt::Display for Binding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("record_")?;
        write_ascii(f, self.0)
    }
}

fn write_ascii(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            f.write_char(c)?;
        } else {
            write!(f, "_u{:x}_", u32::from(c))?;
        }
    }
    Ok(())
}
