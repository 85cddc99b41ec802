use std::{fmt, ops::Range};

use crate::lexer;

/// A lexed token.
///
/// Two tokens are equal when both their value and their category match; the
/// span only records where the token came from.
#[derive(Clone)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Token {}

impl PartialEq<TokenKind> for Token {
    fn eq(&self, other: &TokenKind) -> bool {
        self.kind == *other
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap_or(u32::MAX))
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns the 1-based line and column of the span start within `src`.
    pub fn line_col(&self, src: &str) -> (usize, usize) {
        let before = &src[..self.lo.min(src.len())];
        let line = before.matches('\n').count() + 1;
        let col = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        (line, col)
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", self.span)?;
        }
        self.inner.fmt(f)
    }
}

impl<T: std::error::Error> std::error::Error for Spanned<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// The value of a token, tagged with its category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Keywords are identifiers too; the parser matches them by text.
    Identifier(String),
    Number(u64),
    /// Any single character that starts no other token.
    Syntax(char),
    /// The text between two double quotes, quotes excluded.
    String(String),
    EndOfLine,
    Error(lexer::Error),
}

impl TokenKind {
    pub fn category(&self) -> Category {
        match self {
            TokenKind::Identifier(_) => Category::Identifier,
            TokenKind::Number(_) => Category::Number,
            TokenKind::Syntax(_) => Category::Syntax,
            TokenKind::String(_) => Category::String,
            TokenKind::EndOfLine => Category::EndOfLine,
            TokenKind::Error(_) => Category::Error,
        }
    }

    /// Whether this token's literal text is exactly `text`.
    pub fn has_text(&self, text: &str) -> bool {
        match self {
            TokenKind::Identifier(s) | TokenKind::String(s) => s == text,
            TokenKind::Syntax(c) => text.chars().eq(std::iter::once(*c)),
            TokenKind::EndOfLine => text == "\n",
            TokenKind::Number(_) | TokenKind::Error(_) => false,
        }
    }

    pub fn is_identifier(&self, text: &str) -> bool {
        matches!(self, TokenKind::Identifier(s) if s == text)
    }

    pub fn is_syntax(&self, c: char) -> bool {
        *self == TokenKind::Syntax(c)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(s) => write!(f, "identifier `{s}`"),
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Syntax(c) => write!(f, "`{c}`"),
            TokenKind::String(s) => write!(f, "string {s:?}"),
            TokenKind::EndOfLine => f.write_str("end of line"),
            TokenKind::Error(e) => write!(f, "invalid token ({e})"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Identifier,
    Number,
    Syntax,
    String,
    EndOfLine,
    Error,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Identifier => "identifier",
            Category::Number => "number",
            Category::Syntax => "syntax",
            Category::String => "string",
            Category::EndOfLine => "end of line",
            Category::Error => "error",
        })
    }
}
