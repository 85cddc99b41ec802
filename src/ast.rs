// root ::= (map | reader | bitflag | main)*
// reader ::= reader ID where EOL ('|' rule EOL)* end
// rule ::= ID ':' NUMBER [as ID]
// map ::= map ID where EOL ('|' NUMBER '>' ANY EOL)* end
// bitflag ::= bitflag ID where EOL ('|' NUMBER '>' ID EOL)* end
// main ::= main '{' (instruction EOL)* '}'
// instruction ::= read ID
//               | goto ID '.' ID

use std::{collections::BTreeMap, fmt, num::NonZeroU64};

/// One compiled source file.
#[derive(Debug, PartialEq, Default)]
pub struct Root {
    pub readers: Vec<Reader>,
    pub tables: Vec<Map>,
    pub bitflags: Vec<Bitflag>,
    /// The `main` block, if any. A root without one compiles to a program
    /// that performs no reads.
    pub code: Option<Vec<Instruction>>,
}

/// A named group of fixed-width fields, read in declaration order.
#[derive(Debug, PartialEq)]
pub struct Reader {
    pub name: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, PartialEq)]
pub struct Rule {
    pub name: String,
    pub bytes_to_read: NonZeroU64,
    /// `None` renders as hexadecimal.
    pub format: Option<FormatSpec>,
}

impl Rule {
    pub fn format_or_default(&self) -> &FormatSpec {
        self.format.as_ref().unwrap_or(&FormatSpec::Hex)
    }
}

#[derive(Debug, PartialEq)]
pub struct Map {
    pub name: String,
    pub table: BTreeMap<u64, Literal>,
}

/// The value half of a map entry, kept verbatim from the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Number(u64),
    /// Identifier, string, syntax or end-of-line token text.
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Text(s) => f.write_str(s),
        }
    }
}

/// Rows are `(mask, label)` pairs in source order. Duplicate masks are kept.
#[derive(Debug, PartialEq)]
pub struct Bitflag {
    pub name: String,
    pub rows: Vec<(u64, String)>,
}

#[derive(Debug, PartialEq)]
pub enum Instruction {
    /// Seeks to the absolute offset held by a field of a previously read
    /// record.
    Goto {
        reader_name: String,
        field_name: String,
    },
    /// Reads one record and binds it to a variable named after the reader.
    Read { reader_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatSpec {
    Int,
    Hex,
    Bin,
    Str,
    Bytes,
    /// A map or bitflag, looked up by name when the generated program runs.
    Named(String),
}

/// The formats a rule may name after `as` that are not map or bitflag lookups.
pub static BUILTIN_FORMATS: phf::Map<&'static str, FormatSpec> = phf::phf_map! {
    "int" => FormatSpec::Int,
    "hex" => FormatSpec::Hex,
    "bin" => FormatSpec::Bin,
    "str" => FormatSpec::Str,
    "bytes" => FormatSpec::Bytes,
};

impl FormatSpec {
    pub fn name(&self) -> &str {
        match self {
            FormatSpec::Int => "int",
            FormatSpec::Hex => "hex",
            FormatSpec::Bin => "bin",
            FormatSpec::Str => "str",
            FormatSpec::Bytes => "bytes",
            FormatSpec::Named(name) => name,
        }
    }
}
