use crate::{parser, util::fmt::tree};

/// What a parse test expects from its program.
pub enum Expect {
    /// The printed tree, compared with surrounding whitespace trimmed.
    Tree(&'static str),
    /// The error, formatted with its span (`{:#}`).
    Error(&'static str),
}

#[track_caller]
pub fn check_parse(program: &str, expect: Expect) {
    let outcome = parser::parse_source(program);
    match (expect, outcome) {
        (Expect::Tree(expected), Ok(root)) => {
            let actual = tree::print_root_string(&root);
            ::pretty_assertions::assert_eq!(actual.trim(), expected.trim());
        }
        (Expect::Error(expected), Err(error)) => {
            ::pretty_assertions::assert_eq!(format!("{error:#}"), expected);
        }
        (Expect::Tree(_), Err(error)) => panic!("expected a tree, got error: {error:#}"),
        (Expect::Error(expected), Ok(root)) => panic!(
            "expected error `{expected}`, got tree:\n{}",
            tree::print_root_string(&root)
        ),
    }
}

/// Declares one `#[test]` per program:
///
/// ```ignore
/// fn test_name() {
///     let program = "...";
///     let tree_ok = "...";        // or
///     let expected_error = "...";
/// }
/// ```
macro_rules! parse_tests {
    ($(
        fn $test_name:ident() {
            let program = $program:expr;
            let $expect:ident = $expected:expr;
        }
    )*) => {
        $(
            #[test]
            fn $test_name() {
                crate::util::test_utils::check_parse(
                    $program,
                    parse_tests!(@expect $expect $expected),
                );
            }
        )*
    };

    (@expect tree_ok $expected:expr) => {
        crate::util::test_utils::Expect::Tree(::indoc::indoc! { $expected })
    };
    (@expect expected_error $expected:expr) => {
        crate::util::test_utils::Expect::Error($expected)
    };
}
pub(crate) use parse_tests;
