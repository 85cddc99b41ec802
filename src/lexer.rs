use std::iter::Peekable;

use crate::token::{Span, Token, TokenKind};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 4_096;

/// Lexes the provided string, producing the tokens into the provided buffer.
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    Lexer::new(src, tokens).lex();
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn tokenize(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(src.len() / 3 + 1);
    lex(src, &mut tokens);
    tokens
}

/// The only lexical condition the lexer reports. Every other malformed input
/// (such as an unterminated string) simply runs to the end of the source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("number literal does not fit in 64 bits")]
    NumberOverflow,
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    ///
    /// Tokens are written into the provided tokens buffer. Unlike most
    /// lexers there is no end-of-file token: the parser detects the end of
    /// the buffer itself.
    fn lex(mut self) {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        while let Some(c) = self.peek() {
            self.current_lo = self.cursor;
            if let Some(kind) = self.scan_token_kind(c) {
                self.produce(kind);
            }
        }
    }

    /// Scans the token that starts with `c`, the current (not yet consumed)
    /// character. Returns `None` for skipped whitespace.
    fn scan_token_kind(&mut self, c: char) -> Option<TokenKind> {
        let kind = match c {
            '\n' => self.advance_with(TokenKind::EndOfLine),
            c if c.is_whitespace() => {
                self.advance();
                return None;
            }
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphanumeric() => self.identifier(),
            '"' => self.string(),
            c => self.advance_with(TokenKind::Syntax(c)),
        };
        Some(kind)
    }

    /// Lexes a decimal or hexadecimal number.
    ///
    /// An `x` switches the scan into hex mode wherever it shows up in the
    /// digit run, so `12x34` lexes as a single hex number. Only the digits
    /// after the `x` make up the hex value.
    fn number(&mut self) -> TokenKind {
        let mut hex_start = None;
        while let Some(c) = self.peek() {
            match c {
                c if c.is_ascii_digit() => {}
                'a'..='f' if hex_start.is_some() => {}
                'x' if hex_start.is_none() => hex_start = Some(self.cursor + 1),
                _ => break,
            }
            self.advance();
        }
        let parsed = match hex_start {
            Some(start) => {
                let digits = &self.src[start..self.cursor];
                if digits.is_empty() {
                    Ok(0)
                } else {
                    u64::from_str_radix(digits, 16)
                }
            }
            None => self.substr().parse(),
        };
        match parsed {
            Ok(number) => TokenKind::Number(number),
            Err(_) => TokenKind::Error(Error::NumberOverflow),
        }
    }

    fn identifier(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: char| c.is_alphanumeric() || c == '_';
        while self.peek().is_some_and(valid_identifier_suffix) {
            self.advance();
        }
        TokenKind::Identifier(self.substr().to_string())
    }

    /// Lexes a string token. There are no escape sequences; an unclosed
    /// string takes the rest of the input.
    fn string(&mut self) -> TokenKind {
        assert_eq!(self.advance(), Some('"'));
        let start = self.cursor;
        while self.peek().is_some_and(|c| c != '"') {
            self.advance();
        }
        let contents = self.src[start..self.cursor].to_string();
        // Closing quote, if any.
        self.advance();
        TokenKind::String(contents)
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            tokens,
        }
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> Option<char> {
        self.iter.next().inspect(|c| self.cursor += c.len_utf8())
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        &self.src[self.current_lo..self.cursor]
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        let span = self.span();
        self.tokens.push(Token::new(kind, span));
    }
}
