//! Support code for the programs generated by `fmtc`.
//!
//! The compiler pastes this file verbatim into every generated program as
//! `mod rt`. It may only depend on `std` and must never name itself through
//! `crate::` paths.

use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    ops::BitOr,
    process,
};

pub type Stream = BufReader<File>;

#[derive(Debug)]
pub enum Error {
    Usage(String),
    Open { path: String, source: io::Error },
    Io(io::Error),
    MissingKey { map: &'static str, value: u128 },
    NotAscii { field: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Usage(program) => write!(f, "usage: {program} <FILE>"),
            Error::Open { path, source } => write!(f, "could not open {path}: {source}"),
            Error::Io(error) => write!(f, "{error}"),
            Error::MissingKey { map, value } => write!(f, "no entry for {value} in map {map}"),
            Error::NotAscii { field } => write!(f, "field {field} is not valid ascii"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { source, .. } | Error::Io(source) => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

/// Opens the file named by the single command line argument.
pub fn open_from_args() -> Result<Stream, Error> {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| String::from("reader"));
    match (args.next(), args.next()) {
        (Some(path), None) => match File::open(&path) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(source) => Err(Error::Open { path, source }),
        },
        _ => Err(Error::Usage(program)),
    }
}

/// Moves the stream to an absolute offset from its start.
pub fn seek<S: Seek>(stream: &mut S, offset: u128) -> Result<(), Error> {
    let Ok(offset) = u64::try_from(offset) else {
        let error = io::Error::new(io::ErrorKind::InvalidInput, "seek offset out of range");
        return Err(Error::Io(error));
    };
    stream.seek(SeekFrom::Start(offset))?;
    Ok(())
}

/// How a field is rendered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    Int,
    Hex,
    Bin,
    Str,
    Bytes,
    /// A map or bitflag set, resolved through [`Symbols`] when the field is
    /// read.
    Named(&'static str),
}

/// Decimal rendering of a little-endian unsigned integer of any width.
#[allow(clippy::cast_possible_truncation)]
pub fn int(raw: &[u8]) -> String {
    if raw.len() <= 16 {
        return le_value(raw).to_string();
    }
    // Schoolbook division by ten over the big-endian digits.
    let mut digits: Vec<u8> = raw.iter().rev().copied().collect();
    let mut out = Vec::new();
    loop {
        let mut rem = 0u32;
        let mut nonzero = false;
        for digit in &mut digits {
            let cur = rem << 8 | u32::from(*digit);
            *digit = (cur / 10) as u8;
            rem = cur % 10;
            nonzero |= *digit != 0;
        }
        out.push(char::from(b'0' + rem as u8));
        if !nonzero {
            break;
        }
    }
    out.iter().rev().collect()
}

/// `0x`-prefixed lowercase hex without leading zeros.
pub fn hex(raw: &[u8]) -> String {
    let digits: String = raw.iter().rev().map(|b| format!("{b:02x}")).collect();
    prefixed("0x", &digits)
}

/// `0b`-prefixed binary without leading zeros.
pub fn bin(raw: &[u8]) -> String {
    let digits: String = raw.iter().rev().map(|b| format!("{b:08b}")).collect();
    prefixed("0b", &digits)
}

fn prefixed(prefix: &str, digits: &str) -> String {
    match digits.trim_start_matches('0') {
        "" => format!("{prefix}0"),
        trimmed => format!("{prefix}{trimmed}"),
    }
}

/// The bytes as read, rendered as a `b'...'` literal.
pub fn bytes(raw: &[u8]) -> String {
    let quote = if raw.contains(&b'\'') && !raw.contains(&b'"') {
        '"'
    } else {
        '\''
    };
    let mut out = format!("b{quote}");
    for &byte in raw {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if char::from(b) == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(char::from(byte)),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out.push(quote);
    out
}

/// The bytes as read, decoded as ASCII.
pub fn ascii(raw: &[u8]) -> Option<String> {
    raw.is_ascii()
        .then(|| raw.iter().copied().map(char::from).collect())
}

fn le_value(raw: &[u8]) -> u128 {
    raw[..raw.len().min(16)]
        .iter()
        .rev()
        .fold(0, |acc, &byte| acc << 8 | u128::from(byte))
}

pub struct Map {
    pub name: &'static str,
    pub entries: &'static [(u128, &'static str)],
}

impl Map {
    pub fn get(&self, value: u128) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(key, _)| *key == value)
            .map(|(_, label)| *label)
    }
}

pub struct Flag {
    pub mask: u128,
    pub label: &'static str,
}

/// A combination of flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flags {
    pub bits: u128,
    pub labels: Vec<&'static str>,
}

impl From<&Flag> for Flags {
    fn from(flag: &Flag) -> Self {
        Flags {
            bits: flag.mask,
            labels: vec![flag.label],
        }
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(mut self, rhs: Flags) -> Flags {
        self.bits |= rhs.bits;
        self.labels.extend(rhs.labels);
        self
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels.join(" | "))
    }
}

pub struct BitflagSet {
    pub name: &'static str,
    pub flags: &'static [Flag],
}

impl BitflagSet {
    /// Combines, in declaration order, every flag sharing a bit with `value`.
    pub fn get(&self, value: u128) -> Option<Flags> {
        self.flags
            .iter()
            .filter(|flag| flag.mask & value != 0)
            .map(Flags::from)
            .reduce(|acc, flags| acc | flags)
    }
}

#[derive(Copy, Clone)]
pub enum Resolver {
    Map(&'static Map),
    Bitflag(&'static BitflagSet),
}

impl Resolver {
    pub fn render(&self, value: u128) -> Result<String, Error> {
        match self {
            Resolver::Map(map) => map
                .get(value)
                .map(String::from)
                .ok_or(Error::MissingKey {
                    map: map.name,
                    value,
                }),
            Resolver::Bitflag(set) => Ok(set
                .get(value)
                .map_or_else(|| String::from("None"), |flags| flags.to_string())),
        }
    }
}

/// A name that is neither a declared map nor a declared bitflag set.
#[derive(Debug, PartialEq, Eq)]
pub struct Unresolved<'a>(pub &'a str);

impl fmt::Display for Unresolved<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No such map or bitflag {}", self.0)
    }
}

/// Every declared map and bitflag set, by name.
pub struct Symbols {
    resolvers: HashMap<&'static str, Resolver>,
}

impl Symbols {
    pub fn new(maps: &'static [Map], bitflags: &'static [BitflagSet]) -> Symbols {
        let mut resolvers = HashMap::with_capacity(maps.len() + bitflags.len());
        for set in bitflags {
            resolvers.insert(set.name, Resolver::Bitflag(set));
        }
        // Maps shadow bitflag sets of the same name.
        for map in maps {
            resolvers.insert(map.name, Resolver::Map(map));
        }
        Symbols { resolvers }
    }

    pub fn lookup<'a>(&self, name: &'a str) -> Result<Resolver, Unresolved<'a>> {
        self.resolvers.get(name).copied().ok_or(Unresolved(name))
    }

    /// Like [`Symbols::lookup`], but an unknown name ends the program with a
    /// diagnostic and a success status.
    pub fn resolve(&self, name: &str) -> Resolver {
        match self.lookup(name) {
            Ok(resolver) => resolver,
            Err(unresolved) => {
                println!("{unresolved}");
                process::exit(0);
            }
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: usize,
    pub format: Format,
}

impl FieldSpec {
    /// Consumes up to `width` bytes. Bytes past the end of the input read as
    /// zero: they leave the numeric renderings unchanged and are only spelled
    /// out by `bytes` and `str`.
    pub fn read<R: Read>(&self, stream: &mut R, symbols: &Symbols) -> Result<Field, Error> {
        let mut raw = Vec::new();
        let limit = u64::try_from(self.width).unwrap_or(u64::MAX);
        Read::take(&mut *stream, limit).read_to_end(&mut raw)?;
        let value = le_value(&raw);
        let formatted = match self.format {
            Format::Int => int(&raw),
            Format::Hex => hex(&raw),
            Format::Bin => bin(&raw),
            Format::Bytes => bytes(&self.padded(&raw)),
            Format::Str => ascii(&self.padded(&raw)).ok_or(Error::NotAscii { field: self.name })?,
            Format::Named(name) => symbols.resolve(name).render(value)?,
        };
        Ok(Field {
            raw,
            value,
            formatted,
        })
    }

    fn padded(&self, raw: &[u8]) -> Vec<u8> {
        let mut padded = raw.to_vec();
        padded.resize(self.width, 0);
        padded
    }
}

/// One field of a read record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Field {
    /// The bytes as read, least significant first. Shorter than the declared
    /// width when the input ended early.
    pub raw: Vec<u8>,
    /// `raw` as a little-endian unsigned integer, truncated to 128 bits.
    pub value: u128,
    pub formatted: String,
}

/// A record type with a fixed field layout.
pub trait Record: Sized {
    const NAME: &'static str;
    const LAYOUT: &'static [FieldSpec];

    /// Builds the record from its fields, in layout order.
    fn from_fields(fields: Vec<Field>) -> Self;

    /// The record fields, in layout order.
    fn fields(&self) -> Vec<&Field>;
}

/// Reads every field of `T` in declaration order.
pub fn read<T: Record, R: Read>(stream: &mut R, symbols: &Symbols) -> Result<T, Error> {
    let mut fields = Vec::with_capacity(T::LAYOUT.len());
    for spec in T::LAYOUT {
        fields.push(spec.read(stream, symbols)?);
    }
    Ok(T::from_fields(fields))
}

/// Displays a record as its name followed by one `name = value` line per
/// field.
pub struct Dump<'a, T>(pub &'a T);

impl<T: Record> fmt::Display for Dump<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", T::NAME)?;
        for (spec, field) in T::LAYOUT.iter().zip(self.0.fields()) {
            writeln!(f, "  {} = {}", spec.name, field.formatted)?;
        }
        Ok(())
    }
}

pub fn show<T: Record>(record: &T) {
    print!("{}", Dump(record));
}
