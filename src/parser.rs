use std::{fmt, num::NonZeroU64};

use crate::{
    ast::{Bitflag, FormatSpec, Instruction, Literal, Map, Reader, Root, Rule, BUILTIN_FORMATS},
    lexer,
    token::{Category, Span, Spanned, Token, TokenKind},
};

pub type ParseResult<T> = Result<T, Spanned<Error>>;

/// Lexes and parses the provided source.
pub fn parse_source(src: &str) -> ParseResult<Root> {
    let tokens = lexer::tokenize(src);
    parse(&tokens)
}

/// Parses a whole token sequence into a [`Root`].
///
/// Parsing stops at the first syntax error; no partial tree is returned.
pub fn parse(tokens: &[Token]) -> ParseResult<Root> {
    Parser::new(tokens).parse_root()
}

struct Parser<'tok> {
    tokens: &'tok [Token],
    cursor: usize,
}

impl<'tok> Parser<'tok> {
    fn parse_root(&mut self) -> ParseResult<Root> {
        let mut root = Root::default();
        self.skip_lines();
        while let Some(token) = self.peek() {
            let keyword = match &token.kind {
                TokenKind::Identifier(ident) => ident.as_str(),
                _ => "",
            };
            match keyword {
                "map" => root.tables.push(self.parse_map()?),
                "reader" => root.readers.push(self.parse_reader()?),
                "bitflag" => root.bitflags.push(self.parse_bitflag()?),
                // A later `main` block replaces any earlier one.
                "main" => root.code = Some(self.parse_main()?),
                _ => {
                    let error = match token.kind {
                        TokenKind::Error(e) => Error::Lexer(e),
                        ref other => Error::InvalidDeclaration(other.clone()),
                    };
                    return Err(token.span().wrap(error));
                }
            }
            self.skip_lines();
        }
        Ok(root)
    }

    fn parse_reader(&mut self) -> ParseResult<Reader> {
        let (name, rules) = self.parse_block("reader", Parser::parse_rule)?;
        Ok(Reader { name, rules })
    }

    fn parse_rule(&mut self) -> ParseResult<Rule> {
        let name = self.parse_ident()?;
        self.consume_syntax(":")?;
        let (width, width_span) = self.parse_number()?;
        let Some(bytes_to_read) = NonZeroU64::new(width) else {
            return Err(width_span.wrap(Error::ZeroWidth { rule: name }));
        };
        let format = if self.take_keyword("as") {
            Some(self.parse_format()?)
        } else {
            None
        };
        Ok(Rule {
            name,
            bytes_to_read,
            format,
        })
    }

    fn parse_format(&mut self) -> ParseResult<FormatSpec> {
        let name = self.parse_ident()?;
        Ok(match BUILTIN_FORMATS.get(name.as_str()) {
            Some(builtin) => builtin.clone(),
            None => FormatSpec::Named(name),
        })
    }

    fn parse_map(&mut self) -> ParseResult<Map> {
        let (name, entries) = self.parse_block("map", |p| {
            let (key, _) = p.parse_number()?;
            p.consume_syntax(">")?;
            let value = p.parse_literal()?;
            Ok((key, value))
        })?;
        // Later entries overwrite earlier ones with the same key.
        let table = entries.into_iter().collect();
        Ok(Map { name, table })
    }

    fn parse_bitflag(&mut self) -> ParseResult<Bitflag> {
        let (name, rows) = self.parse_block("bitflag", |p| {
            let (mask, _) = p.parse_number()?;
            p.consume_syntax(">")?;
            let label = p.parse_ident()?;
            Ok((mask, label))
        })?;
        Ok(Bitflag { name, rows })
    }

    /// Parses `keyword ID where EOL ('|' entry EOL)* end`, the shape shared by
    /// every declaration but `main`.
    fn parse_block<T>(
        &mut self,
        keyword: &'static str,
        mut parse_entry: impl FnMut(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<(String, Vec<T>)> {
        self.consume_keyword(keyword)?;
        let name = self.parse_ident()?;
        self.consume_keyword("where")?;
        self.consume_eol()?;
        let mut entries = Vec::new();
        while !self.is_keyword("end") {
            self.consume_syntax("|")?;
            entries.push(parse_entry(self)?);
            self.consume_eol()?;
        }
        self.consume_keyword("end")?;
        Ok((name, entries))
    }

    fn parse_main(&mut self) -> ParseResult<Vec<Instruction>> {
        self.consume_keyword("main")?;
        self.consume_syntax("{")?;
        let mut instructions = Vec::new();
        while !self.is_syntax('}') {
            self.skip_lines();
            instructions.push(self.parse_instruction()?);
            self.consume_eol()?;
        }
        self.consume_syntax("}")?;
        Ok(instructions)
    }

    fn parse_instruction(&mut self) -> ParseResult<Instruction> {
        let token = self.consume(Expected::Category(Category::Identifier))?;
        let TokenKind::Identifier(ref keyword) = token.kind else {
            unreachable!()
        };
        match keyword.as_str() {
            "read" => {
                let reader_name = self.parse_ident()?;
                Ok(Instruction::Read { reader_name })
            }
            "goto" => {
                let reader_name = self.parse_ident()?;
                self.consume_syntax(".")?;
                let field_name = self.parse_ident()?;
                Ok(Instruction::Goto {
                    reader_name,
                    field_name,
                })
            }
            other => Err(token
                .span()
                .wrap(Error::InvalidInstruction(other.to_string()))),
        }
    }

    fn parse_ident(&mut self) -> ParseResult<String> {
        match &self.consume(Expected::Category(Category::Identifier))?.kind {
            TokenKind::Identifier(ident) => Ok(ident.clone()),
            _ => unreachable!(),
        }
    }

    fn parse_number(&mut self) -> ParseResult<(u64, Span)> {
        let token = self.consume(Expected::Category(Category::Number))?;
        match token.kind {
            TokenKind::Number(number) => Ok((number, token.span())),
            _ => unreachable!(),
        }
    }

    /// Takes whatever token comes next as a map value.
    fn parse_literal(&mut self) -> ParseResult<Literal> {
        let token = self.consume(Expected::Any)?;
        let literal = match &token.kind {
            TokenKind::Number(number) => Literal::Number(*number),
            TokenKind::Identifier(text) | TokenKind::String(text) => Literal::Text(text.clone()),
            TokenKind::Syntax(c) => Literal::Text(c.to_string()),
            TokenKind::EndOfLine => Literal::Text("\n".to_string()),
            TokenKind::Error(e) => return Err(token.span().wrap(Error::Lexer(*e))),
        };
        Ok(literal)
    }
}

impl<'tok> Parser<'tok> {
    fn new(tokens: &'tok [Token]) -> Parser<'tok> {
        Parser { tokens, cursor: 0 }
    }

    /// Returns the current token, if the input isn't exhausted.
    fn peek(&self) -> Option<&'tok Token> {
        self.tokens.get(self.cursor)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.kind.is_identifier(keyword))
    }

    fn is_syntax(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.kind.is_syntax(c))
    }

    /// Advances if the current token is the provided keyword, returning true.
    /// If not, returns false and doesn't advance.
    fn take_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the expectation, returning it.
    /// If not, fails with an error describing both.
    fn consume(&mut self, expected: Expected) -> ParseResult<&'tok Token> {
        let Some(token) = self.peek() else {
            return Err(self.eof_span().wrap(Error::UnexpectedEof { expected }));
        };
        if expected.matches(&token.kind) {
            self.cursor += 1;
            return Ok(token);
        }
        let error = match token.kind {
            TokenKind::Error(e) => Error::Lexer(e),
            ref actual => Error::Unexpected {
                actual: actual.clone(),
                expected,
            },
        };
        Err(token.span().wrap(error))
    }

    fn consume_keyword(&mut self, keyword: &'static str) -> ParseResult<&'tok Token> {
        self.consume(Expected::Literal(Category::Identifier, keyword))
    }

    fn consume_syntax(&mut self, c: &'static str) -> ParseResult<&'tok Token> {
        self.consume(Expected::Literal(Category::Syntax, c))
    }

    fn consume_eol(&mut self) -> ParseResult<&'tok Token> {
        self.consume(Expected::Category(Category::EndOfLine))
    }

    fn skip_lines(&mut self) {
        while self.peek().is_some_and(|t| t.kind == TokenKind::EndOfLine) {
            self.cursor += 1;
        }
    }

    /// An empty span just past the last token.
    fn eof_span(&self) -> Span {
        let lo = self.tokens.last().map_or(0, |t| t.span().hi());
        Span::new_of_length(lo, 0)
    }
}

/// What the parser was looking for when it failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Any,
    Category(Category),
    /// A token of the category whose text is exactly the given value.
    Literal(Category, &'static str),
}

impl Expected {
    fn matches(&self, kind: &TokenKind) -> bool {
        match *self {
            Expected::Any => true,
            Expected::Category(category) => kind.category() == category,
            Expected::Literal(category, value) => {
                kind.category() == category && kind.has_text(value)
            }
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Any => f.write_str("any token"),
            Expected::Category(category) => write!(f, "{category}"),
            Expected::Literal(category, value) => write!(f, "{category} `{value}`"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected {actual}, expected {expected}")]
    Unexpected {
        actual: TokenKind,
        expected: Expected,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: Expected },
    #[error("unexpected {0}, expected `map`, `reader`, `bitflag` or `main`")]
    InvalidDeclaration(TokenKind),
    #[error("invalid instruction `{0}`, expected `read` or `goto`")]
    InvalidInstruction(String),
    #[error("rule `{rule}` must read at least one byte")]
    ZeroWidth { rule: String },
    #[error(transparent)]
    Lexer(#[from] lexer::Error),
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::util::test_utils::parse_tests;

    parse_tests! {
        fn test_header_scenario() {
            let program = "
                reader H where
                | magic : 2 as bytes
                | size : 4 as hex
                end
                main {
                read H
                }
            ";
            let tree_ok = "
                reader H
                  rule magic 2 as bytes
                  rule size 4 as hex
                main
                  read H
            ";
        }

        fn test_empty_program() {
            let program = "\n\n\n";
            let tree_ok = "";
        }

        fn test_default_format() {
            let program = "
                reader R where
                | a : 2
                | b : 4 as hex
                | c : 1 as int
                | d : 1 as bin
                | e : 8 as str
                | f : 2 as Machine
                end
            ";
            let tree_ok = "
                reader R
                  rule a 2
                  rule b 4 as hex
                  rule c 1 as int
                  rule d 1 as bin
                  rule e 8 as str
                  rule f 2 as Machine (named)
            ";
        }

        fn test_map_values_any_token() {
            let program = r#"
                map Machine where
                | 0x14c > "x86 (32 bits)"
                | 0x8664 > "amd64 (64 bits)"
                | 1 > 42
                | 2 > ident
                | 3 > $
                end
            "#;
            let tree_ok = r#"
                map Machine
                  1 => 42
                  2 => "ident"
                  3 => "$"
                  332 => "x86 (32 bits)"
                  34404 => "amd64 (64 bits)"
            "#;
        }

        fn test_map_duplicate_keys_last_wins() {
            let program = r#"
                map M where
                | 1 > "first"
                | 1 > "second"
                end
            "#;
            let tree_ok = r#"
                map M
                  1 => "second"
            "#;
        }

        fn test_bitflag_rows_keep_order() {
            let program = "
                bitflag Flags where
                | 4 > C
                | 1 > A
                | 1 > A_AGAIN
                end
            ";
            let tree_ok = "
                bitflag Flags
                  4 => C
                  1 => A
                  1 => A_AGAIN
            ";
        }

        fn test_main_with_goto() {
            let program = "
                main {

                read H
                goto H.size

                read Body
                }
            ";
            let tree_ok = "
                main
                  read H
                  goto H.size
                  read Body
            ";
        }

        fn test_inline_empty_main() {
            let program = "main {}";
            let tree_ok = "main";
        }

        fn test_last_main_wins() {
            let program = "
                main {
                read A
                }
                main {
                read B
                }
            ";
            let tree_ok = "
                main
                  read B
            ";
        }

        fn test_declarations_in_any_order() {
            let program = "
                main {
                read R
                }
                bitflag F where
                | 1 > A
                end
                reader R where
                | x : 1 as F
                end
                map M where
                end
            ";
            let tree_ok = "
                reader R
                  rule x 1 as F (named)
                map M
                bitflag F
                  1 => A
                main
                  read R
            ";
        }

        fn test_invalid_declaration() {
            let program = "readers X where\nend\n";
            let expected_error = "0..7: unexpected identifier `readers`, expected `map`, `reader`, `bitflag` or `main`";
        }

        fn test_invalid_instruction() {
            let program = "main {\nskip H\n}";
            let expected_error = "7..11: invalid instruction `skip`, expected `read` or `goto`";
        }

        fn test_missing_where() {
            let program = "reader H\n| a : 1\nend";
            let expected_error = "8..9: unexpected end of line, expected identifier `where`";
        }

        fn test_missing_colon() {
            let program = "reader H where\n| a 1\nend";
            let expected_error = "19..20: unexpected number 1, expected syntax `:`";
        }

        fn test_missing_end() {
            let program = "reader H where\n| a : 1\n";
            let expected_error = "23..23: unexpected end of input, expected syntax `|`";
        }

        fn test_zero_width() {
            let program = "reader H where\n| a : 0\nend";
            let expected_error = "21..22: rule `a` must read at least one byte";
        }

        fn test_number_overflow() {
            let program = "map M where\n| 99999999999999999999 > x\nend";
            let expected_error = "14..34: number literal does not fit in 64 bits";
        }

        fn test_bitflag_label_must_be_identifier() {
            let program = "bitflag F where\n| 1 > \"A\"\nend";
            let expected_error = r#"22..25: unexpected string "A", expected identifier"#;
        }

        fn test_blank_line_before_main_close() {
            let program = "main {\nread H\n\n}";
            let expected_error = "15..16: unexpected `}`, expected identifier";
        }
    }

    #[test]
    fn test_block_counts() {
        let src = indoc! {"
            map A where
            | 1 > a
            end
            map B where
            end
            reader R where
            | x : 4
            end
            bitflag F where
            | 1 > X
            end
            bitflag G where
            end
            bitflag H where
            end
        "};
        let root = parse_source(src).unwrap();
        assert_eq!(root.tables.len(), 2);
        assert_eq!(root.readers.len(), 1);
        assert_eq!(root.bitflags.len(), 3);
        assert_eq!(root.code, None);
    }

    #[test]
    fn test_header_ast() {
        let src = indoc! {"
            reader H where
            | magic : 2 as bytes
            | size : 4 as hex
            end
            main {
            read H
            goto H.size
            }
        "};
        let root = parse_source(src).unwrap();
        let expected = Root {
            readers: vec![Reader {
                name: "H".into(),
                rules: vec![
                    Rule {
                        name: "magic".into(),
                        bytes_to_read: NonZeroU64::new(2).unwrap(),
                        format: Some(FormatSpec::Bytes),
                    },
                    Rule {
                        name: "size".into(),
                        bytes_to_read: NonZeroU64::new(4).unwrap(),
                        format: Some(FormatSpec::Hex),
                    },
                ],
            }],
            tables: vec![],
            bitflags: vec![],
            code: Some(vec![
                Instruction::Read {
                    reader_name: "H".into(),
                },
                Instruction::Goto {
                    reader_name: "H".into(),
                    field_name: "size".into(),
                },
            ]),
        };
        assert_eq!(root, expected);
    }

    #[test]
    fn test_error_carries_token_and_expectation() {
        let error = parse_source("map M where\n| 1 2 x\nend").unwrap_err();
        assert_eq!(
            error.inner,
            Error::Unexpected {
                actual: TokenKind::Number(2),
                expected: Expected::Literal(Category::Syntax, ">"),
            }
        );
    }

    #[test]
    fn test_pe_format() {
        let root = parse_source(include_str!("../formats/pe.fmt")).unwrap();
        assert_eq!(root.readers.len(), 5);
        assert_eq!(root.tables.len(), 2);
        assert_eq!(root.bitflags.len(), 2);
        assert_eq!(root.code.map(|code| code.len()), Some(6));
    }
}
