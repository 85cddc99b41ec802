/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The code generator takes an AST, mapping it into the source of a
/// standalone Rust program.
pub mod codegen;

pub mod ast;
pub mod token;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

/// Runs the whole pipeline over `src`, returning the generated program.
pub fn compile(src: &str) -> parser::ParseResult<String> {
    let root = parser::parse_source(src)?;
    Ok(codegen::generate(&root))
}
