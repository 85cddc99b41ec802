use std::fmt::Write;

use crate::{parser, token::Spanned};

/// Renders a parse error as `path:line:col: message`, followed by the
/// offending source line with the span underlined.
pub fn render_error(path: &str, src: &str, error: &Spanned<parser::Error>) -> String {
    let Spanned { span, inner: error } = error;
    let (line, col) = span.line_col(src);
    let mut out = format!("{path}:{line}:{col}: {error}");

    let Some(text) = src.lines().nth(line - 1) else {
        return out;
    };
    let width = src
        .get(span.lo..span.hi())
        .map_or(0, |s| s.chars().take_while(|&c| c != '\n').count())
        .max(1);
    let gutter = line.to_string();
    let pad = " ".repeat(gutter.len());
    // Infallible: writing into a String.
    let _ = write!(
        out,
        "\n{pad} |\n{gutter} | {text}\n{pad} | {caret:>col$}",
        caret = "^".repeat(width),
        col = col - 1 + width,
    );
    out
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse_source;

    #[test]
    fn test_render_unexpected() {
        let src = "reader H where\n| a 1\nend";
        let error = parse_source(src).unwrap_err();
        let expected = indoc! {"
            h.fmt:2:5: unexpected number 1, expected syntax `:`
              |
            2 | | a 1
              |     ^"};
        assert_eq!(render_error("h.fmt", src, &error), expected);
    }

    #[test]
    fn test_render_multichar_span() {
        let src = "main {\nskip H\n}";
        let error = parse_source(src).unwrap_err();
        let expected = indoc! {"
            m.fmt:2:1: invalid instruction `skip`, expected `read` or `goto`
              |
            2 | skip H
              | ^^^^"};
        assert_eq!(render_error("m.fmt", src, &error), expected);
    }

    #[test]
    fn test_render_at_end_of_input() {
        let src = "reader H where";
        let error = parse_source(src).unwrap_err();
        let expected = indoc! {"
            e.fmt:1:15: unexpected end of input, expected end of line
              |
            1 | reader H where
              |               ^"};
        assert_eq!(render_error("e.fmt", src, &error), expected);
    }
}
